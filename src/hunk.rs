use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::CommentError;

/// `@@ -old_start[,old_len] +new_start[,new_len] @@ optional context`
static HUNK_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").expect("hunk header pattern")
});

/// The four numbers of a unified-diff hunk header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HunkAnchor {
    pub original_line: u32,
    pub original_length: u32,
    pub updated_line: u32,
    pub updated_length: u32,
}

impl HunkAnchor {
    /// Absolute line in the updated file for a 1-based position inside the hunk body.
    ///
    /// Position 1 is the first line after the header, so it maps to `updated_line`.
    pub fn line_for_position(&self, id: u64, position: u32) -> Result<u32, CommentError> {
        if position == 0 {
            return Err(CommentError::MissingPosition { id });
        }

        self.updated_line
            .checked_add(position - 1)
            .ok_or(CommentError::PositionOutOfRange {
                id,
                updated_line: self.updated_line,
                position,
            })
    }
}

impl fmt::Display for HunkAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "@@ -{},{} +{},{} @@",
            self.original_line, self.original_length, self.updated_line, self.updated_length
        )
    }
}

/// Parse a hunk header line into a [`HunkAnchor`].
///
/// A missing span length means a one-line span. Trailing context after the
/// closing `@@` (usually a function name) is ignored.
pub fn parse_hunk_header(header: &str) -> Result<HunkAnchor, CommentError> {
    let malformed = || CommentError::MalformedHunkHeader {
        header: header.to_string(),
    };

    let caps = HUNK_HEADER.captures(header).ok_or_else(malformed)?;

    let number = |idx: usize| -> Result<u32, CommentError> {
        match caps.get(idx) {
            Some(m) => m.as_str().parse().map_err(|_| malformed()),
            None => Ok(1),
        }
    };

    Ok(HunkAnchor {
        original_line: number(1)?,
        original_length: number(2)?,
        updated_line: number(3)?,
        updated_length: number(4)?,
    })
}
