//! Database query functions
//!
//! Every bulk write runs inside one transaction: a failing record rolls back
//! the whole call.

use crate::models::*;
use crate::schema::Database;
use crate::{DatabaseError, Result};
use chrono::Utc;
use std::collections::BTreeSet;
use tracing::debug;

/// Raw aggregate row as stored; `key` is '' for scalar metrics
#[derive(sqlx::FromRow)]
struct AggregateRow {
    metric: String,
    key: String,
    value: f64,
    computed_at: String,
    extra_json: Option<String>,
}

impl TryFrom<AggregateRow> for AggregateMetric {
    type Error = DatabaseError;

    fn try_from(row: AggregateRow) -> Result<Self> {
        let payload = row
            .extra_json
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;

        Ok(Self {
            metric: row.metric,
            key: (!row.key.is_empty()).then_some(row.key),
            value: row.value,
            computed_at: row.computed_at,
            payload,
        })
    }
}

impl Database {
    // ==================== Repositories ====================

    /// Insert or update repositories by id
    ///
    /// Uses `ON CONFLICT DO UPDATE` rather than `INSERT OR REPLACE`; a replace
    /// deletes the old row first and would cascade to the dependent tables.
    pub async fn upsert_repositories(&self, repos: &[Repository]) -> Result<usize> {
        if repos.is_empty() {
            return Ok(0);
        }

        let sql = format!(
            "INSERT INTO {} (
                repo_id, name, full_name, owner_login, private, fork, archived, disabled,
                html_url, description, created_at, updated_at, pushed_at,
                stargazers_count, watchers_count, forks_count, open_issues_count,
                language, size, license
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(repo_id) DO UPDATE SET
                name = excluded.name,
                full_name = excluded.full_name,
                owner_login = excluded.owner_login,
                private = excluded.private,
                fork = excluded.fork,
                archived = excluded.archived,
                disabled = excluded.disabled,
                html_url = excluded.html_url,
                description = excluded.description,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at,
                pushed_at = excluded.pushed_at,
                stargazers_count = excluded.stargazers_count,
                watchers_count = excluded.watchers_count,
                forks_count = excluded.forks_count,
                open_issues_count = excluded.open_issues_count,
                language = excluded.language,
                size = excluded.size,
                license = excluded.license",
            self.tables().repositories
        );

        let mut tx = self.pool().begin().await?;
        for repo in repos {
            sqlx::query(&sql)
                .bind(repo.repo_id)
                .bind(&repo.name)
                .bind(&repo.full_name)
                .bind(&repo.owner_login)
                .bind(repo.private)
                .bind(repo.fork)
                .bind(repo.archived)
                .bind(repo.disabled)
                .bind(&repo.html_url)
                .bind(&repo.description)
                .bind(&repo.created_at)
                .bind(&repo.updated_at)
                .bind(&repo.pushed_at)
                .bind(repo.stargazers_count)
                .bind(repo.watchers_count)
                .bind(repo.forks_count)
                .bind(repo.open_issues_count)
                .bind(&repo.language)
                .bind(repo.size)
                .bind(&repo.license)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        debug!(count = repos.len(), "Upserted repositories");
        Ok(repos.len())
    }

    /// Get all repositories ordered by full name
    pub async fn get_repositories(&self) -> Result<Vec<Repository>> {
        let sql = format!(
            "SELECT * FROM {} ORDER BY full_name",
            self.tables().repositories
        );
        let rows = sqlx::query_as::<_, Repository>(&sql)
            .fetch_all(self.pool())
            .await?;

        Ok(rows)
    }

    /// Get a repository by id
    pub async fn get_repository(&self, repo_id: i64) -> Result<Repository> {
        let sql = format!(
            "SELECT * FROM {} WHERE repo_id = ?",
            self.tables().repositories
        );
        sqlx::query_as::<_, Repository>(&sql)
            .bind(repo_id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Repository ID: {}", repo_id)))
    }

    // ==================== Per-repository datasets ====================

    /// Insert or update language byte counts; languages absent from the input are kept
    pub async fn upsert_languages(&self, items: &[RepoLanguages]) -> Result<usize> {
        let sql = format!(
            "INSERT INTO {} (repo_id, language, bytes) VALUES (?, ?, ?)
             ON CONFLICT(repo_id, language) DO UPDATE SET bytes = excluded.bytes",
            self.tables().languages
        );

        let mut tx = self.pool().begin().await?;
        let mut written = 0;
        for item in items {
            for (language, bytes) in &item.languages {
                sqlx::query(&sql)
                    .bind(item.repo_id)
                    .bind(language)
                    .bind(*bytes)
                    .execute(&mut *tx)
                    .await?;
                written += 1;
            }
        }
        tx.commit().await?;

        debug!(rows = written, "Upserted languages");
        Ok(written)
    }

    /// Insert or update contributor counts; contributors absent from the input are kept
    pub async fn upsert_contributors(&self, items: &[RepoContributors]) -> Result<usize> {
        let sql = format!(
            "INSERT INTO {} (repo_id, login, contributions) VALUES (?, ?, ?)
             ON CONFLICT(repo_id, login) DO UPDATE SET contributions = excluded.contributions",
            self.tables().contributors
        );

        let mut tx = self.pool().begin().await?;
        let mut written = 0;
        for item in items {
            for contributor in &item.contributors {
                sqlx::query(&sql)
                    .bind(item.repo_id)
                    .bind(&contributor.login)
                    .bind(contributor.contributions)
                    .execute(&mut *tx)
                    .await?;
                written += 1;
            }
        }
        tx.commit().await?;

        debug!(rows = written, "Upserted contributors");
        Ok(written)
    }

    /// Insert or update weekly commit totals
    pub async fn upsert_commit_activity(&self, items: &[RepoCommitActivity]) -> Result<usize> {
        let sql = format!(
            "INSERT INTO {} (repo_id, week_start, total) VALUES (?, ?, ?)
             ON CONFLICT(repo_id, week_start) DO UPDATE SET total = excluded.total",
            self.tables().commit_activity
        );

        let mut tx = self.pool().begin().await?;
        let mut written = 0;
        for item in items {
            for week in &item.weeks {
                sqlx::query(&sql)
                    .bind(item.repo_id)
                    .bind(week.week_start.format("%Y-%m-%d").to_string())
                    .bind(week.total)
                    .execute(&mut *tx)
                    .await?;
                written += 1;
            }
        }
        tx.commit().await?;

        debug!(rows = written, "Upserted commit activity");
        Ok(written)
    }

    /// Insert or update pull requests by (repository, number)
    pub async fn upsert_pull_requests(&self, items: &[RepoPullRequests]) -> Result<usize> {
        let sql = format!(
            "INSERT INTO {} (repo_id, number, state, created_at, merged_at, closed_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(repo_id, number) DO UPDATE SET
                state = excluded.state,
                created_at = excluded.created_at,
                merged_at = excluded.merged_at,
                closed_at = excluded.closed_at",
            self.tables().pull_requests
        );

        let mut tx = self.pool().begin().await?;
        let mut written = 0;
        for item in items {
            for pr in &item.pull_requests {
                sqlx::query(&sql)
                    .bind(item.repo_id)
                    .bind(pr.number)
                    .bind(&pr.state)
                    .bind(&pr.created_at)
                    .bind(&pr.merged_at)
                    .bind(&pr.closed_at)
                    .execute(&mut *tx)
                    .await?;
                written += 1;
            }
        }
        tx.commit().await?;

        debug!(rows = written, "Upserted pull requests");
        Ok(written)
    }

    // ==================== Aggregate inputs ====================

    pub async fn repository_count(&self) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.tables().repositories);
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(self.pool()).await?;
        Ok(count)
    }

    pub async fn total_stars(&self) -> Result<i64> {
        let sql = format!(
            "SELECT COALESCE(SUM(stargazers_count), 0) FROM {}",
            self.tables().repositories
        );
        let total: i64 = sqlx::query_scalar(&sql).fetch_one(self.pool()).await?;
        Ok(total)
    }

    /// Sum a counter per non-null primary language, largest first
    pub async fn sum_by_language(&self, counter: LanguageCounter) -> Result<Vec<LanguageTotal>> {
        let sql = format!(
            "SELECT language, COALESCE(SUM({column}), 0) AS total
             FROM {table}
             WHERE language IS NOT NULL
             GROUP BY language
             ORDER BY total DESC, language ASC",
            column = counter.column(),
            table = self.tables().repositories
        );
        let rows = sqlx::query_as::<_, LanguageTotal>(&sql)
            .fetch_all(self.pool())
            .await?;

        Ok(rows)
    }

    /// Repositories with the most stars, ties broken by full name
    pub async fn top_repositories(&self, limit: i64) -> Result<Vec<TopRepository>> {
        let sql = format!(
            "SELECT full_name,
                    COALESCE(stargazers_count, 0) AS stars,
                    COALESCE(forks_count, 0) AS forks,
                    language
             FROM {}
             ORDER BY stars DESC, full_name ASC
             LIMIT ?",
            self.tables().repositories
        );
        let rows = sqlx::query_as::<_, TopRepository>(&sql)
            .bind(limit)
            .fetch_all(self.pool())
            .await?;

        Ok(rows)
    }

    pub async fn commit_activity_count(&self) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.tables().commit_activity);
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(self.pool()).await?;
        Ok(count)
    }

    /// Commits summed across repositories for the most recent `weeks` week starts, oldest first
    pub async fn commits_by_week(&self, weeks: i64) -> Result<Vec<WeeklyCommits>> {
        let sql = format!(
            "SELECT week_start, commits FROM (
                 SELECT week_start, SUM(total) AS commits
                 FROM {}
                 GROUP BY week_start
                 ORDER BY week_start DESC
                 LIMIT ?
             ) ORDER BY week_start ASC",
            self.tables().commit_activity
        );
        let rows = sqlx::query_as::<_, WeeklyCommits>(&sql)
            .bind(weeks)
            .fetch_all(self.pool())
            .await?;

        Ok(rows)
    }

    pub async fn pull_request_count(&self) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.tables().pull_requests);
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(self.pool()).await?;
        Ok(count)
    }

    /// Pull-request counts per state, with a missing state reported as "unknown"
    pub async fn pull_request_state_counts(&self) -> Result<Vec<StateCount>> {
        let sql = format!(
            "SELECT COALESCE(state, 'unknown') AS state, COUNT(*) AS count
             FROM {}
             GROUP BY COALESCE(state, 'unknown')
             ORDER BY state",
            self.tables().pull_requests
        );
        let rows = sqlx::query_as::<_, StateCount>(&sql)
            .fetch_all(self.pool())
            .await?;

        Ok(rows)
    }

    // ==================== Aggregates ====================

    /// Replace every stored row of the metrics in `names`, then write `rows`
    ///
    /// A named metric with no new rows ends up empty, so keys that are no
    /// longer produced (e.g. a language that disappeared) do not linger.
    /// Rows of metrics outside `names` are upserted by (metric, key).
    pub async fn replace_aggregates(&self, names: &[&str], rows: &[NewAggregate]) -> Result<usize> {
        let table = &self.tables().aggregates;
        let insert = format!(
            "INSERT INTO {} (metric, key, value, computed_at, extra_json)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(metric, key) DO UPDATE SET
                value = excluded.value,
                computed_at = excluded.computed_at,
                extra_json = excluded.extra_json",
            table
        );
        let delete = format!("DELETE FROM {} WHERE metric = ?", table);
        let computed_at = Utc::now().to_rfc3339();

        let mut tx = self.pool().begin().await?;

        for name in names.iter().collect::<BTreeSet<_>>() {
            sqlx::query(&delete).bind(*name).execute(&mut *tx).await?;
        }

        for metric in rows {
            let extra_json = metric
                .payload
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;

            sqlx::query(&insert)
                .bind(&metric.metric)
                .bind(metric.key.as_deref().unwrap_or(""))
                .bind(metric.value)
                .bind(&computed_at)
                .bind(extra_json)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        debug!(metrics = names.len(), count = rows.len(), "Replaced aggregates");
        Ok(rows.len())
    }

    /// Get all aggregate rows ordered by metric and key
    pub async fn get_aggregates(&self) -> Result<Vec<AggregateMetric>> {
        let sql = format!(
            "SELECT metric, key, value, computed_at, extra_json FROM {} ORDER BY metric, key",
            self.tables().aggregates
        );
        sqlx::query_as::<_, AggregateRow>(&sql)
            .fetch_all(self.pool())
            .await?
            .into_iter()
            .map(AggregateMetric::try_from)
            .collect()
    }

    /// Get one aggregate row; `key` is `None` for scalar metrics
    pub async fn get_aggregate(
        &self,
        metric: &str,
        key: Option<&str>,
    ) -> Result<Option<AggregateMetric>> {
        let sql = format!(
            "SELECT metric, key, value, computed_at, extra_json FROM {}
             WHERE metric = ? AND key = ?",
            self.tables().aggregates
        );
        sqlx::query_as::<_, AggregateRow>(&sql)
            .bind(metric)
            .bind(key.unwrap_or(""))
            .fetch_optional(self.pool())
            .await?
            .map(AggregateMetric::try_from)
            .transpose()
    }

    // ==================== Report rows ====================

    /// Commit activity joined with repository names
    pub async fn get_commit_activity_rows(&self) -> Result<Vec<CommitActivityRow>> {
        let sql = format!(
            "SELECT r.full_name, c.week_start, c.total
             FROM {commits} c
             INNER JOIN {repos} r ON r.repo_id = c.repo_id
             ORDER BY r.full_name, c.week_start",
            commits = self.tables().commit_activity,
            repos = self.tables().repositories
        );
        let rows = sqlx::query_as::<_, CommitActivityRow>(&sql)
            .fetch_all(self.pool())
            .await?;

        Ok(rows)
    }

    /// Pull requests joined with repository names
    pub async fn get_pull_request_rows(&self) -> Result<Vec<PullRequestRow>> {
        let sql = format!(
            "SELECT r.full_name, p.number, p.state, p.created_at, p.merged_at, p.closed_at
             FROM {pulls} p
             INNER JOIN {repos} r ON r.repo_id = p.repo_id
             ORDER BY r.full_name, p.number",
            pulls = self.tables().pull_requests,
            repos = self.tables().repositories
        );
        let rows = sqlx::query_as::<_, PullRequestRow>(&sql)
            .fetch_all(self.pool())
            .await?;

        Ok(rows)
    }
}
