use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use rethread::config::{Config, InvalidCommentPolicy};
use rethread::diff::{render_diff, split_diff};
use rethread::github::{
    check_gh_cli, fetch_compare_diff, fetch_pr_details, fetch_review_comments, parse_pr_url,
    GhCommentPages,
};
use rethread::threads::assemble_threads;

#[derive(Parser)]
#[command(name = "rethread")]
#[command(about = "Rebuild the review-comment threads of a GitHub PR")]
#[command(version)]
struct Args {
    /// GitHub PR URL (e.g., https://github.com/owner/repo/pull/123)
    pr_url: String,

    /// Also print the PR diff
    #[arg(long)]
    diff: bool,

    /// Fail instead of skipping comments that cannot be anchored to a line
    #[arg(long)]
    strict: bool,

    /// Config file to use instead of ~/.config/rethread/config.toml
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("RETHREAD_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };
    let policy = if args.strict {
        InvalidCommentPolicy::Abort
    } else {
        config.report.on_invalid_comment
    };

    check_gh_cli().await?;

    let pr = parse_pr_url(&args.pr_url)?;
    eprintln!(
        "Fetching PR #{} from {}...",
        pr.number,
        pr.repo_full_name()
    );

    // All comment pages must arrive before any thread is assembled
    let pages = GhCommentPages::new(config.fetch.per_page);
    let (details, raw_comments) =
        tokio::try_join!(fetch_pr_details(&pr), fetch_review_comments(&pages, &pr))?;

    println!("{}", details.summary());

    let assembled = assemble_threads(&raw_comments, policy)?;
    let report = assembled.store.render();
    tracing::info!(
        total_comments = report.comments_visited,
        "rendered review threads"
    );

    if report.text.is_empty() {
        eprintln!("No review comments found.");
    } else {
        print!("{}", report.text);
    }

    if !assembled.skipped.is_empty() {
        eprintln!("Skipped {} review comments:", assembled.skipped.len());
        for skipped in &assembled.skipped {
            eprintln!("  {}", skipped);
        }
    }

    if args.diff || config.report.show_diff {
        let raw_diff = fetch_compare_diff(&pr, &details.base_sha, &details.head_sha).await?;
        let files = split_diff(&raw_diff);
        print!("{}", render_diff(&details.base_sha, &details.head_sha, &files));
    }

    Ok(())
}
