use serde::Deserialize;

use crate::hunk::HunkAnchor;

/// Parsed PR information from URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrInfo {
    pub owner: String,
    pub repo: String,
    pub number: u32,
}

impl PrInfo {
    /// Full repository name (owner/repo)
    pub fn repo_full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

/// The PR fields needed for the summary line and the diff range
#[derive(Debug, Clone)]
pub struct PullRequestDetails {
    pub title: String,
    pub author: String,
    pub changed_files: u32,
    pub base_sha: String,
    pub head_sha: String,
}

impl PullRequestDetails {
    pub fn summary(&self) -> String {
        format!(
            "{} by {}. Number of changed files {}",
            self.title, self.author, self.changed_files
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentUser {
    #[serde(default)]
    pub login: Option<String>,
}

/// A review comment exactly as the pulls comments endpoint returns it.
///
/// Every field is optional and records are decoded one at a time with
/// [`RawReviewComment::from_value`], so a single bad record does not fail the
/// whole page; the normalizer reports what is missing or undecodable.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawReviewComment {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub user: Option<CommentUser>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub diff_hunk: Option<String>,
    #[serde(default)]
    pub original_position: Option<u32>,
    #[serde(default)]
    pub in_reply_to_id: Option<u64>,
    #[serde(default)]
    pub created_at: Option<String>,
    /// Why the record could not be decoded, when it could not
    #[serde(skip)]
    pub decode_error: Option<String>,
}

impl RawReviewComment {
    /// Decode one element of a comments page.
    ///
    /// A record with wrongly typed fields is kept as a placeholder carrying
    /// its id and timestamp, so it is reported instead of dropping the page.
    pub fn from_value(value: serde_json::Value) -> Self {
        match RawReviewComment::deserialize(&value) {
            Ok(raw) => raw,
            Err(e) => Self {
                id: value.get("id").and_then(|v| v.as_u64()),
                created_at: value
                    .get("created_at")
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
                decode_error: Some(e.to_string()),
                ..Default::default()
            },
        }
    }
}

/// A review comment anchored to a file and a line in the updated file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub id: u64,
    pub author: String,
    pub body: String,
    pub path: String,
    pub line: u32,
    /// `None` starts a new thread
    pub in_reply_to: Option<u64>,
}

/// Represents the status of a file in the diff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Added,
    Deleted,
    Modified,
    Renamed,
}

impl FileStatus {
    pub fn badge(&self) -> &'static str {
        match self {
            FileStatus::Added => "[A]",
            FileStatus::Deleted => "[D]",
            FileStatus::Modified => "[M]",
            FileStatus::Renamed => "[R]",
        }
    }
}

/// Type of a diff line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Context,
    Add,
    Del,
}

/// A single line of a hunk body, marker included
#[derive(Debug, Clone)]
pub struct DiffLine {
    pub kind: LineKind,
    pub text: String,
}

/// A hunk in a diff (a contiguous block of changes)
#[derive(Debug, Clone)]
pub struct Hunk {
    pub anchor: HunkAnchor,
    pub lines: Vec<DiffLine>,
}

impl Hunk {
    /// Added and deleted line counts
    pub fn line_counts(&self) -> (usize, usize) {
        self.lines.iter().fold((0, 0), |(add, del), line| match line.kind {
            LineKind::Add => (add + 1, del),
            LineKind::Del => (add, del + 1),
            LineKind::Context => (add, del),
        })
    }
}

/// A file in the diff
#[derive(Debug, Clone)]
pub struct DiffFile {
    pub old_path: String,
    pub new_path: String,
    pub status: FileStatus,
    pub hunks: Vec<Hunk>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_full_name() {
        let pr = PrInfo {
            owner: "atmiguel".to_string(),
            repo: "cerealnotes".to_string(),
            number: 33,
        };
        assert_eq!(pr.repo_full_name(), "atmiguel/cerealnotes");
    }

    #[test]
    fn test_summary_line() {
        let details = PullRequestDetails {
            title: "Add notes API".to_string(),
            author: "octocat".to_string(),
            changed_files: 4,
            base_sha: "aaa".to_string(),
            head_sha: "bbb".to_string(),
        };
        assert_eq!(details.summary(), "Add notes API by octocat. Number of changed files 4");
    }

    #[test]
    fn test_file_status_badge() {
        assert_eq!(FileStatus::Added.badge(), "[A]");
        assert_eq!(FileStatus::Renamed.badge(), "[R]");
    }

    #[test]
    fn test_raw_comment_deserialize() {
        let json = r#"{
            "id": 2,
            "user": { "login": "octocat" },
            "body": "Looks good",
            "path": "x.go",
            "diff_hunk": "@@ -94,6 +94,59 @@\n func main() {",
            "original_position": 1,
            "in_reply_to_id": 1,
            "created_at": "2018-03-01T10:00:00Z",
            "commit_id": "ignored"
        }"#;
        let raw: RawReviewComment = serde_json::from_str(json).unwrap();
        assert_eq!(raw.id, Some(2));
        assert_eq!(raw.user.unwrap().login.as_deref(), Some("octocat"));
        assert_eq!(raw.in_reply_to_id, Some(1));
        assert_eq!(raw.original_position, Some(1));
    }

    #[test]
    fn test_raw_comment_deserialize_with_nulls() {
        let json = r#"{ "id": 5, "original_position": null, "in_reply_to_id": null }"#;
        let raw: RawReviewComment = serde_json::from_str(json).unwrap();
        assert_eq!(raw.id, Some(5));
        assert!(raw.original_position.is_none());
        assert!(raw.in_reply_to_id.is_none());
        assert!(raw.user.is_none());
    }

    #[test]
    fn test_from_value_user_without_login() {
        let value = serde_json::json!({ "id": 2, "user": { "id": 5 }, "body": "x" });
        let raw = RawReviewComment::from_value(value);
        assert_eq!(raw.id, Some(2));
        assert!(raw.decode_error.is_none());
        assert!(raw.user.unwrap().login.is_none());
    }

    #[test]
    fn test_from_value_out_of_range_field() {
        let value = serde_json::json!({
            "id": 3,
            "original_position": -1,
            "created_at": "2018-03-01T10:00:00Z"
        });
        let raw = RawReviewComment::from_value(value);
        assert_eq!(raw.id, Some(3));
        assert_eq!(raw.created_at.as_deref(), Some("2018-03-01T10:00:00Z"));
        assert!(raw.decode_error.unwrap().contains("-1"));
        assert!(raw.original_position.is_none());
    }
}
