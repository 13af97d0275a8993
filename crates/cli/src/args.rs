//! Command-line and environment configuration

use anyhow::{bail, Result};
use chrono::NaiveDate;
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args, Parser, Subcommand};
use repostats_collector::{CollectorConfig, SyncOptions, TargetKind, DEFAULT_API_URL};
use repostats_database::Namespace;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "repostats")]
#[command(about = "RepoStats - GitHub repository statistics collector")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "DB_PATH", default_value = "data.db")]
    pub database: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch repositories and their datasets, then recompute aggregates
    Sync(SyncArgs),

    /// Recompute aggregates from stored data and print them
    Aggregate {
        /// Namespace to read (defaults to the unsuffixed tables)
        #[arg(short, long, env = "DB_NAMESPACE")]
        namespace: Option<String>,
    },

    /// Write CSV reports for a namespace
    Export {
        /// Directory receiving the CSV files
        out_dir: PathBuf,

        /// Namespace to read (defaults to the unsuffixed tables)
        #[arg(short, long, env = "DB_NAMESPACE")]
        namespace: Option<String>,
    },
}

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Sync repositories of this user
    #[arg(long, conflicts_with = "org")]
    pub user: Option<String>,

    /// Sync repositories of this organization
    #[arg(long)]
    pub org: Option<String>,

    /// Target account when neither --user nor --org is given
    #[arg(long, env = "GITHUB_TARGET")]
    pub target: Option<String>,

    /// Kind of --target account: user or org
    #[arg(long, env = "GITHUB_TARGET_TYPE", default_value = "user")]
    pub target_type: String,

    /// API token sent as a bearer credential
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Maximum number of requests in flight
    #[arg(long, env = "CONCURRENCY", default_value_t = 10)]
    pub concurrency: usize,

    /// Only sync the first N repositories
    #[arg(long, env = "MAX_REPOS")]
    pub max_repos: Option<usize>,

    /// Fetch contributor counts
    #[arg(
        long,
        env = "INCLUDE_CONTRIBUTORS",
        action = ArgAction::SetTrue,
        value_parser = BoolishValueParser::new()
    )]
    pub include_contributors: bool,

    /// Fetch commit activity and pull requests
    #[arg(
        long,
        env = "INCLUDE_DORA",
        action = ArgAction::SetTrue,
        value_parser = BoolishValueParser::new()
    )]
    pub include_dora: bool,

    /// Ignore pull requests created before this date (YYYY-MM-DD)
    #[arg(long, env = "PRS_SINCE")]
    pub prs_since: Option<NaiveDate>,

    /// Keep at most N pull requests per repository
    #[arg(long, env = "MAX_PRS_PER_REPO")]
    pub max_prs_per_repo: Option<usize>,

    /// Do not recompute aggregates after syncing
    #[arg(long)]
    pub skip_aggregates: bool,

    /// API root URL
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Per-request timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT", default_value_t = 30)]
    pub timeout_secs: u64,
}

impl SyncArgs {
    /// Target account and kind; --user and --org take precedence over --target
    pub fn target(&self) -> Result<(String, TargetKind)> {
        if let Some(ref user) = self.user {
            return Ok((user.clone(), TargetKind::User));
        }
        if let Some(ref org) = self.org {
            return Ok((org.clone(), TargetKind::Org));
        }
        match self.target.as_deref().map(str::trim) {
            Some(target) if !target.is_empty() => {
                Ok((target.to_string(), self.target_type.parse()?))
            }
            _ => bail!("no target account: pass --user, --org or set GITHUB_TARGET"),
        }
    }

    pub fn sync_options(&self) -> Result<SyncOptions> {
        let (target, kind) = self.target()?;
        let mut options = SyncOptions::new(target, kind);
        options.max_repos = self.max_repos;
        options.include_contributors = self.include_contributors;
        options.include_dora = self.include_dora;
        options.prs_since = self.prs_since;
        options.max_prs_per_repo = self.max_prs_per_repo;
        Ok(options)
    }

    pub fn collector_config(&self) -> CollectorConfig {
        CollectorConfig {
            api_url: self.api_url.clone(),
            github_token: self.token.clone().filter(|t| !t.trim().is_empty()),
            concurrency: self.concurrency,
            timeout: Duration::from_secs(self.timeout_secs),
            ..CollectorConfig::default()
        }
    }
}

/// Namespace named on the command line, or the default one
pub fn namespace_arg(namespace: Option<&str>) -> Namespace {
    namespace.map(Namespace::new).unwrap_or_default()
}
