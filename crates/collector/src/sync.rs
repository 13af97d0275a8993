//! One full fetch cycle for a target account

use crate::client::GithubClient;
use crate::orchestrator::{ExtrasPlan, Orchestrator, RepoExtras};
use crate::{Result, SyncOptions};
use repostats_database::{
    Database, RepoCommitActivity, RepoContributors, RepoLanguages, RepoPullRequests,
};
use std::ops::AddAssign;
use tracing::info;

/// Rows written during one sync
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub repositories: usize,
    pub languages: usize,
    pub contributors: usize,
    pub commit_weeks: usize,
    pub pull_requests: usize,
}

impl AddAssign for SyncReport {
    fn add_assign(&mut self, other: Self) {
        self.repositories += other.repositories;
        self.languages += other.languages;
        self.contributors += other.contributors;
        self.commit_weeks += other.commit_weeks;
        self.pull_requests += other.pull_requests;
    }
}

/// Fetch the target's repositories and their extras into `db`
///
/// Repositories are written before any extras. Each orchestrator batch is
/// persisted as soon as it completes, so a failure keeps the batches before it.
pub async fn sync(
    client: &GithubClient,
    db: &Database,
    options: &SyncOptions,
) -> Result<SyncReport> {
    info!(
        account = %options.target,
        namespace = %db.namespace(),
        "Starting sync"
    );

    let mut repos = client.list_repos(&options.target, options.target_kind).await?;
    if let Some(max) = options.max_repos {
        repos.truncate(max);
    }

    let mut report = SyncReport {
        repositories: db.upsert_repositories(&repos).await?,
        ..SyncReport::default()
    };
    info!(account = %options.target, repos = repos.len(), "Stored repositories");

    let orchestrator = Orchestrator::new(client.clone(), ExtrasPlan::from_options(options));
    let batches = orchestrator
        .run(&repos, |extras| persist_extras(db, extras))
        .await?;
    for batch in batches {
        report += batch;
    }

    info!(
        account = %options.target,
        repos = report.repositories,
        languages = report.languages,
        contributors = report.contributors,
        commit_weeks = report.commit_weeks,
        pull_requests = report.pull_requests,
        "Sync complete"
    );
    Ok(report)
}

async fn persist_extras(db: &Database, extras: Vec<RepoExtras>) -> Result<SyncReport> {
    let mut languages = Vec::with_capacity(extras.len());
    let mut contributors = Vec::new();
    let mut commit_activity = Vec::new();
    let mut pull_requests = Vec::new();

    for item in extras {
        languages.push(RepoLanguages {
            repo_id: item.repo_id,
            languages: item.languages,
        });
        if let Some(list) = item.contributors {
            contributors.push(RepoContributors {
                repo_id: item.repo_id,
                contributors: list,
            });
        }
        if let Some(weeks) = item.commit_weeks {
            commit_activity.push(RepoCommitActivity {
                repo_id: item.repo_id,
                weeks,
            });
        }
        if let Some(prs) = item.pull_requests {
            pull_requests.push(RepoPullRequests {
                repo_id: item.repo_id,
                pull_requests: prs,
            });
        }
    }

    Ok(SyncReport {
        repositories: 0,
        languages: db.upsert_languages(&languages).await?,
        contributors: db.upsert_contributors(&contributors).await?,
        commit_weeks: db.upsert_commit_activity(&commit_activity).await?,
        pull_requests: db.upsert_pull_requests(&pull_requests).await?,
    })
}
