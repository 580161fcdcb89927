use thiserror::Error;

/// Reasons a single review comment cannot be turned into a thread entry.
///
/// These are per-comment failures: the caller decides whether one of them
/// skips the comment or aborts the whole batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommentError {
    /// The diff snippet does not start with a `@@ -a,b +c,d @@` header
    #[error("malformed hunk header: {header:?}")]
    MalformedHunkHeader { header: String },

    /// `original_position` was absent or zero
    #[error("comment {id} has no position inside its hunk")]
    MissingPosition { id: u64 },

    /// A required field of the API record was absent
    #[error("review comment record is missing `{field}`")]
    InvalidRecord { field: &'static str },

    /// The record's fields had the wrong types
    #[error("review comment record could not be decoded: {reason}")]
    UndecodableRecord { reason: String },

    /// The derived line number does not fit in a `u32`
    #[error("comment {id}: position {position} past line {updated_line} overflows")]
    PositionOutOfRange {
        id: u64,
        updated_line: u32,
        position: u32,
    },
}

/// A comment left out of the thread store, with the reason why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedComment {
    /// Id of the raw record, when it had one
    pub id: Option<u64>,
    pub reason: CommentError,
}

impl std::fmt::Display for SkippedComment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.id {
            Some(id) => write!(f, "comment {}: {}", id, self.reason),
            None => write!(f, "comment without id: {}", self.reason),
        }
    }
}

impl std::error::Error for SkippedComment {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CommentError::MalformedHunkHeader {
            header: "@@ -1,2 +1,2".to_string(),
        };
        assert_eq!(err.to_string(), "malformed hunk header: \"@@ -1,2 +1,2\"");

        let err = CommentError::MissingPosition { id: 7 };
        assert_eq!(err.to_string(), "comment 7 has no position inside its hunk");

        let err = CommentError::InvalidRecord { field: "path" };
        assert_eq!(err.to_string(), "review comment record is missing `path`");
    }

    #[test]
    fn test_skipped_comment_display() {
        let skipped = SkippedComment {
            id: Some(12),
            reason: CommentError::MissingPosition { id: 12 },
        };
        assert_eq!(
            skipped.to_string(),
            "comment 12: comment 12 has no position inside its hunk"
        );

        let skipped = SkippedComment {
            id: None,
            reason: CommentError::InvalidRecord { field: "id" },
        };
        assert_eq!(
            skipped.to_string(),
            "comment without id: review comment record is missing `id`"
        );
    }
}
