//! RepoStats Aggregator
//!
//! Derives summary metrics from the stored repositories and their datasets and
//! writes them back as aggregate rows.

use repostats_database::{Database, LanguageCounter, NewAggregate};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("Database error: {0}")]
    Database(#[from] repostats_database::DatabaseError),

    #[error("Failed to build metric payload: {0}")]
    Payload(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AnalyzerError>;

pub const TOTAL_REPOS: &str = "total_repos";
pub const TOTAL_STARS: &str = "total_stars";
pub const STARS_BY_LANGUAGE: &str = "stars_by_language";
pub const FORKS_BY_LANGUAGE: &str = "forks_by_language";
pub const TOP_REPOS_BY_STARS: &str = "top_repos_by_stars";
pub const DORA_COMMITS_BY_WEEK: &str = "dora_commits_by_week";
pub const DORA_PRS_TOTAL: &str = "dora_prs_total";

const TOP_REPOS_LIMIT: i64 = 10;
const COMMIT_WEEKS: i64 = 26;

/// What one recomputation wrote
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComputeSummary {
    /// Aggregate rows written
    pub rows: usize,
    /// Distinct metric names written
    pub metrics: Vec<&'static str>,
}

#[derive(Serialize)]
struct TopRepoEntry<'a> {
    full_name: &'a str,
    stars: i64,
}

#[derive(Serialize)]
struct WeekEntry<'a> {
    week_start: &'a str,
    commits: i64,
}

/// Aggregate metric calculator
pub struct Analyzer;

impl Analyzer {
    /// Recompute every metric from the current contents of `db`
    ///
    /// All rows are written in one transaction, replacing the previous rows of
    /// each computed metric even when it yields no rows this time. Running it
    /// twice without new data yields the same values.
    pub async fn compute(db: &Database) -> Result<ComputeSummary> {
        let mut aggregates = Vec::new();
        let mut metrics = vec![
            TOTAL_REPOS,
            TOTAL_STARS,
            STARS_BY_LANGUAGE,
            FORKS_BY_LANGUAGE,
            TOP_REPOS_BY_STARS,
        ];

        aggregates.push(NewAggregate::scalar(TOTAL_REPOS, db.repository_count().await? as f64));
        aggregates.push(NewAggregate::scalar(TOTAL_STARS, db.total_stars().await? as f64));

        for (metric, counter) in [
            (STARS_BY_LANGUAGE, LanguageCounter::Stars),
            (FORKS_BY_LANGUAGE, LanguageCounter::Forks),
        ] {
            for row in db.sum_by_language(counter).await? {
                aggregates.push(NewAggregate::keyed(metric, row.language, row.total as f64));
            }
        }

        aggregates.push(Self::top_repos(db).await?);

        if db.commit_activity_count().await? > 0 {
            aggregates.push(Self::commits_by_week(db).await?);
            metrics.push(DORA_COMMITS_BY_WEEK);
        }

        if db.pull_request_count().await? > 0 {
            aggregates.push(Self::prs_total(db).await?);
            metrics.push(DORA_PRS_TOTAL);
        }

        let rows = db.replace_aggregates(&metrics, &aggregates).await?;
        info!(
            namespace = %db.namespace(),
            rows = rows,
            metrics = metrics.len(),
            "Computed aggregates"
        );

        Ok(ComputeSummary { rows, metrics })
    }

    async fn top_repos(db: &Database) -> Result<NewAggregate> {
        let top = db.top_repositories(TOP_REPOS_LIMIT).await?;
        let entries: Vec<_> = top
            .iter()
            .map(|r| TopRepoEntry {
                full_name: &r.full_name,
                stars: r.stars,
            })
            .collect();

        Ok(NewAggregate::scalar(TOP_REPOS_BY_STARS, top.len() as f64)
            .with_payload(serde_json::to_value(entries)?))
    }

    async fn commits_by_week(db: &Database) -> Result<NewAggregate> {
        let weeks = db.commits_by_week(COMMIT_WEEKS).await?;
        let series: Vec<_> = weeks
            .iter()
            .map(|w| WeekEntry {
                week_start: &w.week_start,
                commits: w.commits,
            })
            .collect();

        Ok(NewAggregate::scalar(DORA_COMMITS_BY_WEEK, weeks.len() as f64)
            .with_payload(serde_json::to_value(series)?))
    }

    async fn prs_total(db: &Database) -> Result<NewAggregate> {
        let states = db.pull_request_state_counts().await?;
        let total: i64 = states.iter().map(|s| s.count).sum();
        let by_state: Map<String, Value> = states
            .into_iter()
            .map(|s| (s.state, Value::from(s.count)))
            .collect();

        Ok(NewAggregate::scalar(DORA_PRS_TOTAL, total as f64).with_payload(Value::Object(by_state)))
    }
}
