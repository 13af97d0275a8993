//! GitHub API endpoints

use crate::client::GithubClient;
use crate::types::{ContributorResponse, PullResponse, RepoResponse, WeekResponse};
use crate::{CollectorError, Result, TargetKind};
use chrono::DateTime;
use repostats_database::{CommitWeek, ContributorCount, PullRequestRecord, Repository};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

fn query(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl GithubClient {
    /// List every repository of a user or organization, most recently updated first
    pub async fn list_repos(&self, target: &str, kind: TargetKind) -> Result<Vec<Repository>> {
        let scope = match kind {
            TargetKind::User => "users",
            TargetKind::Org => "orgs",
        };
        let url = format!("{}/{}/{}/repos", self.api_url(), scope, target);
        let records = self
            .collect(&url, &query(&[("type", "all"), ("sort", "updated")]))
            .await?;

        let repos = records
            .into_iter()
            .map(|record| {
                serde_json::from_value::<RepoResponse>(record)
                    .map(Repository::from)
                    .map_err(|e| CollectorError::Parse {
                        url: url.clone(),
                        message: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(account = target, count = repos.len(), "Listed repositories");
        Ok(repos)
    }

    /// Language byte counts of one repository
    pub async fn get_repo_languages(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<BTreeMap<String, i64>> {
        let url = format!("{}/repos/{}/{}/languages", self.api_url(), owner, repo);
        let body = self.request(Method::GET, &url, &[]).await?;

        let Value::Object(map) = body else {
            return Ok(BTreeMap::new());
        };

        let mut languages = BTreeMap::new();
        for (language, bytes) in map {
            match bytes.as_i64() {
                Some(bytes) => {
                    languages.insert(language, bytes);
                }
                None => warn!(
                    owner = owner,
                    repo = repo,
                    language = %language,
                    "Skipping non-integer language size"
                ),
            }
        }
        Ok(languages)
    }

    /// Contributors of one repository with their contribution counts
    pub async fn list_repo_contributors(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<ContributorCount>> {
        let url = format!("{}/repos/{}/{}/contributors", self.api_url(), owner, repo);
        let records = self.collect(&url, &[]).await?;

        Ok(parse_lenient::<ContributorResponse>(records, owner, repo, "contributor")
            .into_iter()
            .filter_map(ContributorResponse::into_count)
            .collect())
    }

    /// Weekly commit totals of one repository, oldest week first
    ///
    /// The statistics endpoint answers 202 with an empty object while it is
    /// still computing; that yields no weeks.
    pub async fn get_commit_activity(&self, owner: &str, repo: &str) -> Result<Vec<CommitWeek>> {
        let url = format!(
            "{}/repos/{}/{}/stats/commit_activity",
            self.api_url(),
            owner,
            repo
        );
        let body = self.request(Method::GET, &url, &[]).await?;

        let Value::Array(entries) = body else {
            debug!(owner = owner, repo = repo, "Commit activity not available yet");
            return Ok(Vec::new());
        };

        let mut weeks: Vec<CommitWeek> =
            parse_lenient::<WeekResponse>(entries, owner, repo, "commit week")
                .into_iter()
                .filter_map(|w| match DateTime::from_timestamp(w.week, 0) {
                    Some(start) => Some(CommitWeek {
                        week_start: start.date_naive(),
                        total: w.total,
                    }),
                    None => {
                        warn!(
                            owner = owner,
                            repo = repo,
                            week = w.week,
                            "Skipping out-of-range commit week"
                        );
                        None
                    }
                })
                .collect();
        weeks.sort_by_key(|w| w.week_start);

        Ok(weeks)
    }

    /// Pull requests of one repository in every state, newest first
    pub async fn list_pull_requests(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<PullRequestRecord>> {
        let url = format!("{}/repos/{}/{}/pulls", self.api_url(), owner, repo);
        let records = self
            .collect(
                &url,
                &query(&[("state", "all"), ("sort", "created"), ("direction", "desc")]),
            )
            .await?;

        Ok(parse_lenient::<PullResponse>(records, owner, repo, "pull request")
            .into_iter()
            .map(PullRequestRecord::from)
            .collect())
    }
}

/// Deserialize each record on its own, skipping the malformed ones
fn parse_lenient<T: DeserializeOwned>(
    records: Vec<Value>,
    owner: &str,
    repo: &str,
    what: &str,
) -> Vec<T> {
    records
        .into_iter()
        .filter_map(|record| match serde_json::from_value(record) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!(owner = owner, repo = repo, error = %e, "Skipping malformed {}", what);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use crate::CollectorConfig;
    use chrono::NaiveDate;
    use serde_json::json;
    use std::sync::Arc;

    const API: &str = "https://api.test";

    fn client(transport: &MockTransport) -> GithubClient {
        let config = CollectorConfig {
            api_url: API.to_string(),
            ..CollectorConfig::default()
        };
        GithubClient::with_transport(Arc::new(transport.clone()), &config)
    }

    fn repo_json(id: i64, name: &str) -> Value {
        json!({
            "id": id,
            "name": name,
            "full_name": format!("acme/{}", name),
            "owner": {"login": "acme"},
            "stargazers_count": id * 10
        })
    }

    #[tokio::test]
    async fn lists_org_repositories_across_pages() {
        let transport = MockTransport::new();
        let base = format!("{}/orgs/acme/repos?type=all&sort=updated&per_page=100", API);
        transport.push_json(
            format!("{}&page=1", base),
            200,
            json!([repo_json(1, "one"), repo_json(2, "two")]),
        );
        transport.push_json(format!("{}&page=2", base), 200, json!([]));

        let repos = client(&transport).list_repos("acme", TargetKind::Org).await.unwrap();

        let names: Vec<_> = repos.iter().map(|r| r.full_name.as_str()).collect();
        assert_eq!(names, ["acme/one", "acme/two"]);
        assert_eq!(repos[1].stargazers_count, Some(20));
    }

    #[tokio::test]
    async fn user_listing_uses_users_scope() {
        let transport = MockTransport::new();
        transport.push_json(
            format!("{}/users/octo/repos?type=all&sort=updated&per_page=100&page=1", API),
            200,
            json!([]),
        );

        let repos = client(&transport).list_repos("octo", TargetKind::User).await.unwrap();
        assert!(repos.is_empty());
    }

    #[tokio::test]
    async fn malformed_repository_is_fatal() {
        let transport = MockTransport::new();
        transport.push_json(
            format!("{}/users/octo/repos?type=all&sort=updated&per_page=100&page=1", API),
            200,
            json!([{"name": "no-id"}]),
        );
        transport.push_json(
            format!("{}/users/octo/repos?type=all&sort=updated&per_page=100&page=2", API),
            200,
            json!([]),
        );

        let err = client(&transport)
            .list_repos("octo", TargetKind::User)
            .await
            .unwrap_err();
        assert!(matches!(err, CollectorError::Parse { .. }));
    }

    #[tokio::test]
    async fn languages_skip_non_integer_sizes() {
        let transport = MockTransport::new();
        transport.push_json(
            format!("{}/repos/acme/tool/languages", API),
            200,
            json!({"Rust": 5000, "Shell": 120, "Weird": "lots"}),
        );

        let languages = client(&transport).get_repo_languages("acme", "tool").await.unwrap();
        assert_eq!(languages.len(), 2);
        assert_eq!(languages["Rust"], 5000);
        assert_eq!(languages["Shell"], 120);
    }

    #[tokio::test]
    async fn contributors_skip_anonymous_and_malformed_entries() {
        let transport = MockTransport::new();
        let base = format!("{}/repos/acme/tool/contributors?per_page=100", API);
        transport.push_json(
            format!("{}&page=1", base),
            200,
            json!([
                {"login": "alice", "contributions": 40},
                {"type": "Anonymous", "contributions": 2},
                {"login": "bob", "contributions": "many"},
                {"login": "carol", "contributions": 3}
            ]),
        );
        transport.push_json(format!("{}&page=2", base), 200, json!([]));

        let contributors = client(&transport)
            .list_repo_contributors("acme", "tool")
            .await
            .unwrap();

        let logins: Vec<_> = contributors.iter().map(|c| c.login.as_str()).collect();
        assert_eq!(logins, ["alice", "carol"]);
    }

    #[tokio::test]
    async fn commit_activity_is_sorted_and_lenient() {
        let transport = MockTransport::new();
        transport.push_json(
            format!("{}/repos/acme/tool/stats/commit_activity", API),
            200,
            json!([
                {"week": 1_704_672_000, "total": 4, "days": [0, 1, 1, 1, 1, 0, 0]},
                {"week": 1_704_067_200, "total": 2, "days": [0, 0, 2, 0, 0, 0, 0]},
                {"total": 9}
            ]),
        );

        let weeks = client(&transport).get_commit_activity("acme", "tool").await.unwrap();

        assert_eq!(
            weeks,
            vec![
                CommitWeek {
                    week_start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                    total: 2
                },
                CommitWeek {
                    week_start: NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(),
                    total: 4
                },
            ]
        );
    }

    #[tokio::test]
    async fn commit_activity_still_computing_is_empty() {
        let transport = MockTransport::new();
        transport.push_json(
            format!("{}/repos/acme/tool/stats/commit_activity", API),
            202,
            json!({}),
        );

        let weeks = client(&transport).get_commit_activity("acme", "tool").await.unwrap();
        assert!(weeks.is_empty());
    }

    #[tokio::test]
    async fn pull_requests_request_all_states() {
        let transport = MockTransport::new();
        let base = format!(
            "{}/repos/acme/tool/pulls?state=all&sort=created&direction=desc&per_page=100",
            API
        );
        transport.push_json(
            format!("{}&page=1", base),
            200,
            json!([
                {"number": 3, "state": "open", "created_at": "2024-03-01T00:00:00Z"},
                {"number": 2, "state": "closed", "merged_at": "2024-02-02T00:00:00Z"},
                {"state": "closed"}
            ]),
        );
        transport.push_json(format!("{}&page=2", base), 200, json!([]));

        let prs = client(&transport).list_pull_requests("acme", "tool").await.unwrap();

        let states: Vec<_> = prs.iter().map(|p| (p.number, p.state.as_deref())).collect();
        assert_eq!(states, [(3, Some("open")), (2, Some("merged"))]);
    }
}
