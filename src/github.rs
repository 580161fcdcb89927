use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::Deserialize;
use std::process::{Output, Stdio};
use std::time::Instant;
use tokio::process::Command;
use url::Url;

use crate::types::{PrInfo, PullRequestDetails, RawReviewComment};

/// Run `gh` with the given arguments and log how long it took
async fn run_gh(args: &[&str], operation: &str) -> Result<Output> {
    let start = Instant::now();
    let output = Command::new("gh")
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .with_context(|| format!("Failed to run gh for {}", operation))?;

    tracing::debug!(
        operation,
        elapsed_ms = start.elapsed().as_millis() as u64,
        success = output.status.success(),
        "gh finished"
    );

    Ok(output)
}

/// Parse a GitHub PR URL into owner, repo, and PR number
pub fn parse_pr_url(url_str: &str) -> Result<PrInfo> {
    let url = Url::parse(url_str.trim()).context("Invalid URL")?;

    if url.host_str() != Some("github.com") {
        return Err(anyhow!("Only github.com URLs are supported"));
    }

    let segments: Vec<_> = url
        .path_segments()
        .ok_or_else(|| anyhow!("Invalid PR URL path"))?
        .collect();

    // Expected format: /owner/repo/pull/123
    if segments.len() < 4 || segments[2] != "pull" {
        return Err(anyhow!(
            "Invalid PR URL format. Expected: https://github.com/owner/repo/pull/123"
        ));
    }

    let number: u32 = segments[3]
        .parse()
        .context("PR number must be a valid integer")?;

    Ok(PrInfo {
        owner: segments[0].to_string(),
        repo: segments[1].to_string(),
        number,
    })
}

/// Check if gh CLI is installed and authenticated
pub async fn check_gh_cli() -> Result<()> {
    let output = run_gh(&["auth", "status"], "gh auth status")
        .await
        .context("Failed to run 'gh' CLI. Is it installed?")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("not logged") {
            return Err(anyhow!(
                "Not authenticated with GitHub CLI. Run: gh auth login"
            ));
        }
        return Err(anyhow!("gh auth check failed: {}", stderr));
    }

    Ok(())
}

#[derive(Debug, Deserialize)]
struct GhUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct GhRef {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct GhPullRequest {
    title: String,
    user: GhUser,
    #[serde(default)]
    changed_files: u32,
    base: GhRef,
    head: GhRef,
}

/// Fetch the title, author, and base/head commits of a PR
pub async fn fetch_pr_details(pr: &PrInfo) -> Result<PullRequestDetails> {
    let path = format!("repos/{}/pulls/{}", pr.repo_full_name(), pr.number);
    let output = run_gh(&["api", &path], "fetch_pr_details")
        .await
        .context("Failed to fetch PR details")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("404") {
            return Err(anyhow!(
                "PR not found: {}/pull/{}",
                pr.repo_full_name(),
                pr.number
            ));
        }
        return Err(anyhow!("Failed to fetch PR details: {}", stderr));
    }

    let details: GhPullRequest =
        serde_json::from_slice(&output.stdout).context("Failed to parse PR details")?;

    Ok(PullRequestDetails {
        title: details.title,
        author: details.user.login,
        changed_files: details.changed_files,
        base_sha: details.base.sha,
        head_sha: details.head.sha,
    })
}

/// Fetch the unified diff between two commits of the PR's repository
pub async fn fetch_compare_diff(pr: &PrInfo, base_sha: &str, head_sha: &str) -> Result<String> {
    let path = format!(
        "repos/{}/compare/{}...{}",
        pr.repo_full_name(),
        base_sha,
        head_sha
    );
    let output = run_gh(
        &["api", &path, "-H", "Accept: application/vnd.github.v3.diff"],
        "fetch_compare_diff",
    )
    .await
    .context("Failed to fetch diff")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("Failed to fetch diff: {}", stderr));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

// ============================================================================
// Review comment pagination
// ============================================================================

/// One page of review comments
#[derive(Debug, Clone)]
pub struct CommentPage {
    pub comments: Vec<RawReviewComment>,
    /// Number of the last page, from the `Link` header; `None` when everything fit on one page
    pub last_page: Option<u32>,
}

/// Source of review comment pages, so the pagination logic can be tested without `gh`
#[allow(async_fn_in_trait)]
pub trait CommentPages {
    async fn fetch_page(&self, pr: &PrInfo, page: u32) -> Result<CommentPage>;
}

/// Fetches pages through `gh api --include`
pub struct GhCommentPages {
    per_page: u32,
}

impl GhCommentPages {
    pub fn new(per_page: u32) -> Self {
        Self { per_page }
    }
}

impl CommentPages for GhCommentPages {
    async fn fetch_page(&self, pr: &PrInfo, page: u32) -> Result<CommentPage> {
        let path = format!(
            "repos/{}/pulls/{}/comments?per_page={}&page={}",
            pr.repo_full_name(),
            pr.number,
            self.per_page,
            page
        );
        let output = run_gh(&["api", "--include", &path], &format!("comments page {}", page))
            .await
            .context("Failed to fetch review comments")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "Failed to fetch review comments page {}: {}",
                page,
                stderr
            ));
        }

        let raw = String::from_utf8(output.stdout).context("Invalid UTF-8")?;
        let (headers, body) = split_included_response(&raw);

        let comments = decode_comment_page(body)
            .with_context(|| format!("Failed to parse review comments page {}", page))?;

        Ok(CommentPage {
            comments,
            last_page: link_header(headers).and_then(parse_last_page),
        })
    }
}

/// Decode a page body record by record.
///
/// Only a body that is not a JSON array fails; bad records become
/// placeholders that the normalizer reports.
fn decode_comment_page(body: &str) -> Result<Vec<RawReviewComment>> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }

    let records: Vec<serde_json::Value> = serde_json::from_str(body)?;
    Ok(records.into_iter().map(RawReviewComment::from_value).collect())
}

/// Split `gh api --include` output into the header block and the body
fn split_included_response(raw: &str) -> (&str, &str) {
    for separator in ["\r\n\r\n", "\n\n"] {
        if let Some((headers, body)) = raw.split_once(separator) {
            return (headers, body);
        }
    }
    ("", raw)
}

/// Value of the `Link` header, if present
fn link_header(headers: &str) -> Option<&str> {
    headers.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        name.trim()
            .eq_ignore_ascii_case("link")
            .then(|| value.trim())
    })
}

/// Page number of the `rel="last"` entry of a `Link` header
fn parse_last_page(link: &str) -> Option<u32> {
    link.split(',')
        .map(str::trim)
        .find(|part| part.contains(r#"rel="last""#))
        .and_then(|part| {
            let start = part.find('<')? + 1;
            let end = part.find('>')?;
            let url = Url::parse(part.get(start..end)?).ok()?;
            url.query_pairs()
                .find(|(key, _)| key == "page")
                .and_then(|(_, value)| value.parse().ok())
        })
}

/// Fetch every review comment of a PR, oldest first.
///
/// Page 1 tells how many pages exist; the rest are requested concurrently.
/// Any failed page fails the whole fetch.
pub async fn fetch_review_comments<S: CommentPages>(
    source: &S,
    pr: &PrInfo,
) -> Result<Vec<RawReviewComment>> {
    let start = Instant::now();
    let first = source.fetch_page(pr, 1).await?;
    let last_page = first.last_page.unwrap_or(1);

    let rest = try_join_all((2..=last_page).map(|page| source.fetch_page(pr, page))).await?;

    let mut pages = Vec::with_capacity(rest.len() + 1);
    pages.push(first.comments);
    pages.extend(rest.into_iter().map(|p| p.comments));

    let comments = merge_pages(pages);
    tracing::debug!(
        pages = last_page,
        comments = comments.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "fetched review comments"
    );

    Ok(comments)
}

/// Flatten pages and sort by creation time, ties broken by id.
///
/// Records without a parseable timestamp sort first.
pub fn merge_pages(pages: Vec<Vec<RawReviewComment>>) -> Vec<RawReviewComment> {
    let mut comments: Vec<RawReviewComment> = pages.into_iter().flatten().collect();
    comments.sort_by_cached_key(|c| {
        let created = c
            .created_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        (created, c.id)
    });
    comments
}
