//! Database models for RepoStats

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A remote repository, keyed by its stable numeric id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Repository {
    pub repo_id: i64,
    pub name: String,
    pub full_name: String,
    pub owner_login: Option<String>,
    pub private: bool,
    pub fork: bool,
    pub archived: bool,
    pub disabled: bool,
    pub html_url: Option<String>,
    pub description: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub pushed_at: Option<String>,
    pub stargazers_count: Option<i64>,
    pub watchers_count: Option<i64>,
    pub forks_count: Option<i64>,
    pub open_issues_count: Option<i64>,
    pub language: Option<String>,
    pub size: Option<i64>,
    pub license: Option<String>,
}

/// Language byte counts for one repository
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepoLanguages {
    pub repo_id: i64,
    pub languages: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContributorCount {
    pub login: String,
    pub contributions: i64,
}

/// Contributor counts for one repository
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepoContributors {
    pub repo_id: i64,
    pub contributors: Vec<ContributorCount>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitWeek {
    pub week_start: NaiveDate,
    pub total: i64,
}

/// Weekly commit totals for one repository, oldest week first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepoCommitActivity {
    pub repo_id: i64,
    pub weeks: Vec<CommitWeek>,
}

/// A pull request; `state` is one of "open", "closed" or "merged"
#[derive(Debug, Clone, PartialEq)]
pub struct PullRequestRecord {
    pub number: i64,
    pub state: Option<String>,
    pub created_at: Option<String>,
    pub merged_at: Option<String>,
    pub closed_at: Option<String>,
}

/// Pull requests for one repository, in API order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepoPullRequests {
    pub repo_id: i64,
    pub pull_requests: Vec<PullRequestRecord>,
}

/// A stored aggregate metric
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateMetric {
    pub metric: String,
    pub key: Option<String>,
    pub value: f64,
    pub computed_at: String,
    pub payload: Option<serde_json::Value>,
}

/// Input for writing an aggregate metric
#[derive(Debug, Clone, PartialEq)]
pub struct NewAggregate {
    pub metric: String,
    pub key: Option<String>,
    pub value: f64,
    pub payload: Option<serde_json::Value>,
}

impl NewAggregate {
    pub fn scalar(metric: &str, value: f64) -> Self {
        Self {
            metric: metric.to_string(),
            key: None,
            value,
            payload: None,
        }
    }

    pub fn keyed(metric: &str, key: impl Into<String>, value: f64) -> Self {
        Self {
            metric: metric.to_string(),
            key: Some(key.into()),
            value,
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// Repository counter that can be summed per language
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageCounter {
    Stars,
    Forks,
}

impl LanguageCounter {
    pub(crate) fn column(self) -> &'static str {
        match self {
            LanguageCounter::Stars => "stargazers_count",
            LanguageCounter::Forks => "forks_count",
        }
    }
}

/// Summed counter for one primary language
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct LanguageTotal {
    pub language: String,
    pub total: i64,
}

/// Repository ranked by stars
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct TopRepository {
    pub full_name: String,
    pub stars: i64,
    pub forks: i64,
    pub language: Option<String>,
}

/// Commits summed across repositories for one week
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct WeeklyCommits {
    pub week_start: String,
    pub commits: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct StateCount {
    pub state: String,
    pub count: i64,
}

/// Commit-activity row joined with its repository
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct CommitActivityRow {
    pub full_name: String,
    pub week_start: String,
    pub total: i64,
}

/// Pull-request row joined with its repository
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct PullRequestRow {
    pub full_name: String,
    pub number: i64,
    pub state: Option<String>,
    pub created_at: Option<String>,
    pub merged_at: Option<String>,
    pub closed_at: Option<String>,
}
