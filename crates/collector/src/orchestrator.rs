//! Concurrent per-repository fetches
//!
//! Repositories are processed in fixed-size batches. Every repository of a
//! batch is fetched concurrently (the client's limiter is the only cap on
//! requests in flight) and the whole batch finishes before the next one starts.

use crate::client::GithubClient;
use crate::{CollectorError, Result, SyncOptions};
use chrono::{DateTime, NaiveDate, Utc};
use repostats_database::{CommitWeek, ContributorCount, PullRequestRecord, Repository};
use std::collections::BTreeMap;
use std::future::Future;
use tokio::task::JoinSet;
use tracing::{debug, info};

pub const EXTRAS_BATCH_SIZE: usize = 50;

/// Pull-request fetches page through much more data per repository
pub const PULL_REQUEST_BATCH_SIZE: usize = 10;

/// Which optional datasets to fetch next to languages
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtrasPlan {
    pub contributors: bool,
    pub commit_activity: bool,
    pub pull_requests: bool,
    pub prs_since: Option<NaiveDate>,
    pub max_prs_per_repo: Option<usize>,
}

impl ExtrasPlan {
    pub fn from_options(options: &SyncOptions) -> Self {
        Self {
            contributors: options.include_contributors,
            commit_activity: options.include_dora,
            pull_requests: options.include_dora,
            prs_since: options.prs_since,
            max_prs_per_repo: options.max_prs_per_repo,
        }
    }

    pub fn batch_size(&self) -> usize {
        if self.pull_requests {
            PULL_REQUEST_BATCH_SIZE
        } else {
            EXTRAS_BATCH_SIZE
        }
    }
}

/// Extra datasets of one repository; `None` means the dataset was not requested
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepoExtras {
    pub repo_id: i64,
    pub languages: BTreeMap<String, i64>,
    pub contributors: Option<Vec<ContributorCount>>,
    pub commit_weeks: Option<Vec<CommitWeek>>,
    pub pull_requests: Option<Vec<PullRequestRecord>>,
}

pub struct Orchestrator {
    client: GithubClient,
    plan: ExtrasPlan,
}

impl Orchestrator {
    pub fn new(client: GithubClient, plan: ExtrasPlan) -> Self {
        Self { client, plan }
    }

    /// Fetch extras batch by batch, handing each finished batch to `on_batch`
    ///
    /// Results within a batch follow the order of `repos`. The first failure,
    /// either while fetching or from `on_batch`, stops the run; batches
    /// already handed over stay handled.
    pub async fn run<T, F, Fut>(&self, repos: &[Repository], mut on_batch: F) -> Result<Vec<T>>
    where
        F: FnMut(Vec<RepoExtras>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let batch_size = self.plan.batch_size();
        let batches = repos.len().div_ceil(batch_size);
        let mut outputs = Vec::with_capacity(batches);

        for (index, chunk) in repos.chunks(batch_size).enumerate() {
            let extras = self.fetch_batch(chunk).await?;
            info!(
                batch = index + 1,
                batches = batches,
                repos = chunk.len(),
                "Fetched extras batch"
            );
            outputs.push(on_batch(extras).await?);
        }

        Ok(outputs)
    }

    async fn fetch_batch(&self, repos: &[Repository]) -> Result<Vec<RepoExtras>> {
        let mut tasks = JoinSet::new();

        for (index, repo) in repos.iter().enumerate() {
            let client = self.client.clone();
            let plan = self.plan.clone();
            let repo_id = repo.repo_id;
            let (owner, name) = repo_path(repo);

            tasks.spawn(async move {
                let extras = fetch_repo(&client, &plan, repo_id, &owner, &name).await;
                (index, extras)
            });
        }

        let mut slots: Vec<Option<RepoExtras>> = vec![None; repos.len()];
        while let Some(joined) = tasks.join_next().await {
            let (index, extras) = match joined {
                Ok(done) => done,
                Err(e) => {
                    tasks.abort_all();
                    return Err(CollectorError::Task(e.to_string()));
                }
            };
            match extras {
                Ok(extras) => slots[index] = Some(extras),
                Err(e) => {
                    tasks.abort_all();
                    return Err(e);
                }
            }
        }

        Ok(slots.into_iter().flatten().collect())
    }
}

/// Owner and repository name used in per-repository URLs
fn repo_path(repo: &Repository) -> (String, String) {
    if let Some(owner) = repo.owner_login.as_deref() {
        return (owner.to_string(), repo.name.clone());
    }
    match repo.full_name.split_once('/') {
        Some((owner, name)) => (owner.to_string(), name.to_string()),
        None => (repo.full_name.clone(), repo.name.clone()),
    }
}

async fn fetch_repo(
    client: &GithubClient,
    plan: &ExtrasPlan,
    repo_id: i64,
    owner: &str,
    name: &str,
) -> Result<RepoExtras> {
    let contributors = async {
        if plan.contributors {
            client.list_repo_contributors(owner, name).await.map(Some)
        } else {
            Ok(None)
        }
    };
    let commit_weeks = async {
        if plan.commit_activity {
            client.get_commit_activity(owner, name).await.map(Some)
        } else {
            Ok(None)
        }
    };
    let pull_requests = async {
        if plan.pull_requests {
            client.list_pull_requests(owner, name).await.map(Some)
        } else {
            Ok(None)
        }
    };

    let (languages, contributors, commit_weeks, pull_requests) = tokio::try_join!(
        client.get_repo_languages(owner, name),
        contributors,
        commit_weeks,
        pull_requests
    )?;

    let pull_requests =
        pull_requests.map(|prs| filter_pull_requests(prs, plan.prs_since, plan.max_prs_per_repo));

    debug!(owner = owner, repo = name, languages = languages.len(), "Fetched repository extras");

    Ok(RepoExtras {
        repo_id,
        languages,
        contributors,
        commit_weeks,
        pull_requests,
    })
}

/// Drop pull requests created before `since`, then keep at most `cap`
///
/// A pull request without a readable creation time is kept.
pub fn filter_pull_requests(
    prs: Vec<PullRequestRecord>,
    since: Option<NaiveDate>,
    cap: Option<usize>,
) -> Vec<PullRequestRecord> {
    prs.into_iter()
        .filter(|pr| match (since, created_date(pr)) {
            (Some(since), Some(created)) => created >= since,
            _ => true,
        })
        .take(cap.unwrap_or(usize::MAX))
        .collect()
}

fn created_date(pr: &PullRequestRecord) -> Option<NaiveDate> {
    let created = pr.created_at.as_deref()?;
    DateTime::parse_from_rfc3339(created)
        .ok()
        .map(|at| at.with_timezone(&Utc).date_naive())
}
