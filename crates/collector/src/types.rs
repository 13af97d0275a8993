//! Wire shapes of the API responses we consume

use repostats_database::{ContributorCount, PullRequestRecord, Repository};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct RepoResponse {
    id: i64,
    name: String,
    full_name: String,
    owner: Option<OwnerResponse>,
    #[serde(default)]
    private: bool,
    #[serde(default)]
    fork: bool,
    #[serde(default)]
    archived: bool,
    #[serde(default)]
    disabled: bool,
    html_url: Option<String>,
    description: Option<String>,
    created_at: Option<String>,
    updated_at: Option<String>,
    pushed_at: Option<String>,
    stargazers_count: Option<i64>,
    watchers_count: Option<i64>,
    forks_count: Option<i64>,
    open_issues_count: Option<i64>,
    language: Option<String>,
    size: Option<i64>,
    license: Option<LicenseResponse>,
}

#[derive(Debug, Deserialize)]
struct OwnerResponse {
    login: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LicenseResponse {
    name: Option<String>,
}

impl From<RepoResponse> for Repository {
    fn from(r: RepoResponse) -> Self {
        Repository {
            repo_id: r.id,
            name: r.name,
            full_name: r.full_name,
            owner_login: r.owner.and_then(|o| o.login),
            private: r.private,
            fork: r.fork,
            archived: r.archived,
            disabled: r.disabled,
            html_url: r.html_url,
            description: r.description,
            created_at: r.created_at,
            updated_at: r.updated_at,
            pushed_at: r.pushed_at,
            stargazers_count: r.stargazers_count,
            watchers_count: r.watchers_count,
            forks_count: r.forks_count,
            open_issues_count: r.open_issues_count,
            language: r.language,
            size: r.size,
            license: r.license.and_then(|l| l.name),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContributorResponse {
    login: Option<String>,
    #[serde(default)]
    contributions: i64,
}

impl ContributorResponse {
    /// Anonymous contributors carry no login and are skipped
    pub(crate) fn into_count(self) -> Option<ContributorCount> {
        let login = self.login?;
        Some(ContributorCount {
            login,
            contributions: self.contributions,
        })
    }
}

/// One entry of the weekly commit-activity statistics
#[derive(Debug, Deserialize)]
pub(crate) struct WeekResponse {
    /// Week start as Unix seconds
    pub week: i64,
    pub total: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PullResponse {
    number: i64,
    state: Option<String>,
    created_at: Option<String>,
    merged_at: Option<String>,
    closed_at: Option<String>,
}

impl From<PullResponse> for PullRequestRecord {
    fn from(p: PullResponse) -> Self {
        let state = if p.merged_at.is_some() {
            Some("merged".to_string())
        } else {
            p.state
        };

        PullRequestRecord {
            number: p.number,
            state,
            created_at: p.created_at,
            merged_at: p.merged_at,
            closed_at: p.closed_at,
        }
    }
}
