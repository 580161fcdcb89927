//! Rebuild GitHub pull-request review threads from the flat list of review
//! comments the REST API returns, anchored by file and updated line.

pub mod config;
pub mod diff;
pub mod error;
pub mod github;
pub mod hunk;
pub mod normalize;
pub mod threads;
pub mod types;
