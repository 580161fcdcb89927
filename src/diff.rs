use crate::hunk::parse_hunk_header;
use crate::types::{DiffFile, DiffLine, FileStatus, Hunk, LineKind};

/// Split a unified diff into files and hunks for display.
///
/// Only what the text view needs is recovered: file names, status, and the
/// hunk bodies. Lines that do not fit that shape are dropped.
pub fn split_diff(diff: &str) -> Vec<DiffFile> {
    let mut files: Vec<DiffFile> = Vec::new();

    for line in diff.lines() {
        if let Some(rest) = line.strip_prefix("diff --git ") {
            files.push(start_file(rest));
            continue;
        }

        let Some(file) = files.last_mut() else {
            continue;
        };

        if line.starts_with("@@") {
            match parse_hunk_header(line) {
                Ok(anchor) => file.hunks.push(Hunk {
                    anchor,
                    lines: Vec::new(),
                }),
                Err(e) => tracing::debug!(error = %e, "skipping unparsable hunk"),
            }
            continue;
        }

        match file.hunks.last_mut() {
            Some(hunk) => push_body_line(hunk, line),
            None => read_file_header(file, line),
        }
    }

    files
}

/// `a/old b/new` from the `diff --git` line; names are refined by later header lines
fn start_file(names: &str) -> DiffFile {
    let (old_path, new_path) = match names.find(" b/") {
        Some(idx) => (
            names[..idx].trim_start_matches("a/").to_string(),
            names[idx + 3..].to_string(),
        ),
        None => (names.to_string(), names.to_string()),
    };

    DiffFile {
        old_path,
        new_path,
        status: FileStatus::Modified,
        hunks: Vec::new(),
    }
}

fn read_file_header(file: &mut DiffFile, line: &str) {
    if line.starts_with("new file mode") {
        file.status = FileStatus::Added;
    } else if line.starts_with("deleted file mode") {
        file.status = FileStatus::Deleted;
    } else if let Some(from) = line.strip_prefix("rename from ") {
        file.status = FileStatus::Renamed;
        file.old_path = from.to_string();
    } else if let Some(to) = line.strip_prefix("rename to ") {
        file.status = FileStatus::Renamed;
        file.new_path = to.to_string();
    } else if let Some(old) = line.strip_prefix("--- a/") {
        file.old_path = old.to_string();
    } else if let Some(new) = line.strip_prefix("+++ b/") {
        file.new_path = new.to_string();
    }
}

fn push_body_line(hunk: &mut Hunk, line: &str) {
    let kind = match line.as_bytes().first() {
        Some(b'+') => LineKind::Add,
        Some(b'-') => LineKind::Del,
        Some(b' ') | None => LineKind::Context,
        // "\ No newline at end of file" and anything unexpected
        _ => return,
    };

    hunk.lines.push(DiffLine {
        kind,
        text: line.to_string(),
    });
}

/// Indented text view of a diff between two commits
pub fn render_diff(base_sha: &str, head_sha: &str, files: &[DiffFile]) -> String {
    let mut out = format!("diff from {} to {}\n", base_sha, head_sha);

    for file in files {
        out.push_str(&format!(
            "\t{} {} -> {}:\n",
            file.status.badge(),
            file.old_path,
            file.new_path
        ));
        for hunk in &file.hunks {
            let (added, deleted) = hunk.line_counts();
            out.push_str(&format!(
                "\t\tstarting from original line number {} and spanning {} (+{} -{})\n",
                hunk.anchor.original_line, hunk.anchor.original_length, added, deleted
            ));
            for line in &hunk.lines {
                out.push_str("\t\t\t");
                out.push_str(&line.text);
                out.push('\n');
            }
        }
    }

    out
}
