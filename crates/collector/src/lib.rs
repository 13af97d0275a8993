//! RepoStats Data Collector
//!
//! Fetches repositories and their per-repository datasets from the GitHub API
//! and persists them through the database layer.

pub mod client;
pub mod github;
pub mod orchestrator;
pub mod pagination;
pub mod sync;
pub mod transport;
mod types;

pub use client::GithubClient;
pub use orchestrator::{ExtrasPlan, Orchestrator, RepoExtras};
pub use sync::{sync, SyncReport};

use chrono::NaiveDate;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("HTTP transport failed: {0}")]
    Transport(String),

    #[error("API error: {status} from {url}: {body}")]
    Status { status: u16, url: String, body: String },

    #[error("Malformed response from {url}: {message}")]
    Parse { url: String, message: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Request limiter closed")]
    LimiterClosed,

    #[error("Fetch task failed: {0}")]
    Task(String),

    #[error("Database error: {0}")]
    Database(#[from] repostats_database::DatabaseError),
}

pub type Result<T> = std::result::Result<T, CollectorError>;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Configuration for the API client
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub api_url: String,
    pub github_token: Option<String>,
    pub user_agent: String,
    /// Maximum number of HTTP requests in flight across the whole process
    pub concurrency: usize,
    /// Total timeout of one physical request
    pub timeout: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            github_token: None,
            user_agent: format!("repostats/{}", env!("CARGO_PKG_VERSION")),
            concurrency: 10,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Kind of account whose repositories are listed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    User,
    Org,
}

impl FromStr for TargetKind {
    type Err = CollectorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(TargetKind::User),
            "org" | "organization" => Ok(TargetKind::Org),
            other => Err(CollectorError::Config(format!(
                "unknown target type '{}', expected 'user' or 'org'",
                other
            ))),
        }
    }
}

/// What one sync cycle fetches
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub target: String,
    pub target_kind: TargetKind,
    /// Keep only the first N repositories in API order
    pub max_repos: Option<usize>,
    pub include_contributors: bool,
    /// Fetch commit activity and pull requests
    pub include_dora: bool,
    /// Drop pull requests created before this date
    pub prs_since: Option<NaiveDate>,
    /// Keep at most this many pull requests per repository
    pub max_prs_per_repo: Option<usize>,
}

impl SyncOptions {
    pub fn new(target: impl Into<String>, target_kind: TargetKind) -> Self {
        Self {
            target: target.into(),
            target_kind,
            max_repos: None,
            include_contributors: false,
            include_dora: false,
            prs_since: None,
            max_prs_per_repo: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_target_kind() {
        assert_eq!("user".parse::<TargetKind>().unwrap(), TargetKind::User);
        assert_eq!(" ORG ".parse::<TargetKind>().unwrap(), TargetKind::Org);
        assert_eq!(
            "organization".parse::<TargetKind>().unwrap(),
            TargetKind::Org
        );
        assert!(matches!(
            "team".parse::<TargetKind>(),
            Err(CollectorError::Config(_))
        ));
    }

    #[test]
    fn default_config_matches_documented_values() {
        let config = CollectorConfig::default();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.concurrency, 10);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.user_agent.starts_with("repostats/"));
    }
}
