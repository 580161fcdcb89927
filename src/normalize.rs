use crate::error::{CommentError, SkippedComment};
use crate::hunk::parse_hunk_header;
use crate::types::{Comment, RawReviewComment};

/// Turn one raw API record into a [`Comment`] anchored at a line of the updated file.
pub fn normalize_comment(raw: &RawReviewComment) -> Result<Comment, CommentError> {
    if let Some(reason) = &raw.decode_error {
        return Err(CommentError::UndecodableRecord {
            reason: reason.clone(),
        });
    }

    let id = raw.id.ok_or(CommentError::InvalidRecord { field: "id" })?;
    let author = raw
        .user
        .as_ref()
        .and_then(|u| u.login.clone())
        .ok_or(CommentError::InvalidRecord { field: "user" })?;
    let body = raw
        .body
        .clone()
        .ok_or(CommentError::InvalidRecord { field: "body" })?;
    let path = raw
        .path
        .clone()
        .ok_or(CommentError::InvalidRecord { field: "path" })?;
    let diff_hunk = raw
        .diff_hunk
        .as_deref()
        .ok_or(CommentError::InvalidRecord { field: "diff_hunk" })?;
    let position = raw
        .original_position
        .ok_or(CommentError::MissingPosition { id })?;

    let anchor = parse_hunk_header(hunk_header_line(diff_hunk))?;
    let line = anchor.line_for_position(id, position)?;

    Ok(Comment {
        id,
        author,
        body,
        path,
        line,
        in_reply_to: raw.in_reply_to_id,
    })
}

/// The header is the first `@@` line of the snippet GitHub embeds in the comment
fn hunk_header_line(diff_hunk: &str) -> &str {
    diff_hunk
        .lines()
        .find(|l| l.starts_with("@@"))
        .unwrap_or_else(|| diff_hunk.lines().next().unwrap_or(""))
}

/// Normalize a batch, keeping input order and collecting the records that failed
pub fn normalize_all(raws: &[RawReviewComment]) -> (Vec<Comment>, Vec<SkippedComment>) {
    let mut comments = Vec::with_capacity(raws.len());
    let mut skipped = Vec::new();

    for raw in raws {
        match normalize_comment(raw) {
            Ok(comment) => comments.push(comment),
            Err(reason) => {
                tracing::debug!(id = ?raw.id, %reason, "skipping review comment");
                skipped.push(SkippedComment { id: raw.id, reason });
            }
        }
    }

    (comments, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CommentUser;

    fn raw(id: u64, reply_to: Option<u64>, hunk: &str, position: u32) -> RawReviewComment {
        RawReviewComment {
            id: Some(id),
            user: Some(CommentUser {
                login: Some("octocat".to_string()),
            }),
            body: Some(format!("comment {}", id)),
            path: Some("x.go".to_string()),
            diff_hunk: Some(hunk.to_string()),
            original_position: Some(position),
            in_reply_to_id: reply_to,
            created_at: Some("2018-03-01T10:00:00Z".to_string()),
            decode_error: None,
        }
    }

    #[test]
    fn test_normalize_root_comment() {
        let comment = normalize_comment(&raw(1, None, "@@ -94,6 +94,59 @@", 1)).unwrap();
        assert_eq!(
            comment,
            Comment {
                id: 1,
                author: "octocat".to_string(),
                body: "comment 1".to_string(),
                path: "x.go".to_string(),
                line: 94,
                in_reply_to: None,
            }
        );
    }

    #[test]
    fn test_normalize_reply_keeps_parent() {
        let comment = normalize_comment(&raw(2, Some(1), "@@ -94,6 +94,59 @@", 1)).unwrap();
        assert_eq!(comment.in_reply_to, Some(1));
    }

    #[test]
    fn test_normalize_uses_header_of_multiline_snippet() {
        let hunk = "@@ -10,4 +12,5 @@ impl Foo {\n     fn a() {}\n+    fn b() {}\n     fn c() {}";
        let comment = normalize_comment(&raw(3, None, hunk, 3)).unwrap();
        assert_eq!(comment.line, 14);
    }

    #[test]
    fn test_normalize_malformed_hunk() {
        let err = normalize_comment(&raw(4, None, "@@ -94,6 +94,59", 1)).unwrap_err();
        assert!(matches!(err, CommentError::MalformedHunkHeader { .. }));
    }

    #[test]
    fn test_normalize_snippet_without_header() {
        let err = normalize_comment(&raw(4, None, " fn main() {}\n+x", 1)).unwrap_err();
        assert_eq!(
            err,
            CommentError::MalformedHunkHeader {
                header: " fn main() {}".to_string()
            }
        );
    }

    #[test]
    fn test_normalize_missing_position() {
        let mut record = raw(5, None, "@@ -1,1 +1,1 @@", 1);
        record.original_position = None;
        assert_eq!(
            normalize_comment(&record).unwrap_err(),
            CommentError::MissingPosition { id: 5 }
        );

        record.original_position = Some(0);
        assert_eq!(
            normalize_comment(&record).unwrap_err(),
            CommentError::MissingPosition { id: 5 }
        );
    }

    #[test]
    fn test_normalize_missing_fields() {
        let mut record = raw(6, None, "@@ -1,1 +1,1 @@", 1);
        record.path = None;
        assert_eq!(
            normalize_comment(&record).unwrap_err(),
            CommentError::InvalidRecord { field: "path" }
        );

        let mut record = raw(6, None, "@@ -1,1 +1,1 @@", 1);
        record.user = None;
        assert_eq!(
            normalize_comment(&record).unwrap_err(),
            CommentError::InvalidRecord { field: "user" }
        );

        let mut record = raw(6, None, "@@ -1,1 +1,1 @@", 1);
        record.user = Some(CommentUser { login: None });
        assert_eq!(
            normalize_comment(&record).unwrap_err(),
            CommentError::InvalidRecord { field: "user" }
        );

        let record = RawReviewComment::default();
        assert_eq!(
            normalize_comment(&record).unwrap_err(),
            CommentError::InvalidRecord { field: "id" }
        );
    }

    #[test]
    fn test_normalize_undecodable_record() {
        let record = RawReviewComment::from_value(serde_json::json!({
            "id": 8,
            "original_position": -1
        }));
        let err = normalize_comment(&record).unwrap_err();
        assert!(matches!(err, CommentError::UndecodableRecord { .. }));
    }

    #[test]
    fn test_normalize_all_collects_skips() {
        let raws = vec![
            raw(1, None, "@@ -94,6 +94,59 @@", 1),
            raw(2, None, "not a hunk", 1),
            raw(3, Some(1), "@@ -94,6 +94,59 @@", 1),
        ];
        let (comments, skipped) = normalize_all(&raws);

        assert_eq!(comments.iter().map(|c| c.id).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].id, Some(2));
        assert!(matches!(
            skipped[0].reason,
            CommentError::MalformedHunkHeader { .. }
        ));
    }
}
