//! Database schema and connection management

use crate::namespace::{Namespace, Tables};
use crate::{DatabaseError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// Database connection wrapper bound to one namespace
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    namespace: Namespace,
    tables: Tables,
}

impl Database {
    /// Connect to an existing database or create a new one
    pub async fn connect(path: &Path, namespace: Namespace) -> Result<Self> {
        let url = format!("sqlite:{}?mode=rwc", path.display());

        let options = SqliteConnectOptions::from_str(&url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self::with_pool(pool, namespace);
        db.run_migrations().await?;

        info!(namespace = %db.namespace, "Database connected: {}", path.display());
        Ok(db)
    }

    /// Connect to an in-memory database (for testing)
    pub async fn in_memory(namespace: Namespace) -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let db = Self::with_pool(pool, namespace);
        db.run_migrations().await?;

        info!(namespace = %db.namespace, "In-memory database initialized");
        Ok(db)
    }

    fn with_pool(pool: SqlitePool, namespace: Namespace) -> Self {
        let tables = Tables::for_namespace(&namespace);
        Self {
            pool,
            namespace,
            tables,
        }
    }

    /// Get a reference to the connection pool
    ///
    /// Readers that need arbitrary queries pair this with [`Database::tables`].
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Table identifiers for this database's namespace
    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    /// Create the namespace's tables and indexes if absent
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(&schema_sql(&self.tables))
            .execute(&self.pool)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;

        debug!(namespace = %self.namespace, "Schema ready");
        Ok(())
    }
}

fn schema_sql(t: &Tables) -> String {
    format!(
        r#"
-- Repositories
CREATE TABLE IF NOT EXISTS {repos} (
    repo_id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    full_name TEXT NOT NULL,
    owner_login TEXT,
    private INTEGER NOT NULL DEFAULT 0,
    fork INTEGER NOT NULL DEFAULT 0,
    archived INTEGER NOT NULL DEFAULT 0,
    disabled INTEGER NOT NULL DEFAULT 0,
    html_url TEXT,
    description TEXT,
    created_at TEXT,
    updated_at TEXT,
    pushed_at TEXT,
    stargazers_count INTEGER,
    watchers_count INTEGER,
    forks_count INTEGER,
    open_issues_count INTEGER,
    language TEXT,
    size INTEGER,
    license TEXT
);

CREATE INDEX IF NOT EXISTS idx_{repos}_language ON {repos}(language);
CREATE INDEX IF NOT EXISTS idx_{repos}_stars ON {repos}(stargazers_count DESC);

-- Language byte counts
CREATE TABLE IF NOT EXISTS {languages} (
    repo_id INTEGER NOT NULL REFERENCES {repos}(repo_id) ON DELETE CASCADE,
    language TEXT NOT NULL,
    bytes INTEGER NOT NULL,
    PRIMARY KEY (repo_id, language)
);

-- Contributor counts
CREATE TABLE IF NOT EXISTS {contributors} (
    repo_id INTEGER NOT NULL REFERENCES {repos}(repo_id) ON DELETE CASCADE,
    login TEXT NOT NULL,
    contributions INTEGER NOT NULL,
    PRIMARY KEY (repo_id, login)
);

-- Weekly commit activity
CREATE TABLE IF NOT EXISTS {commits} (
    repo_id INTEGER NOT NULL REFERENCES {repos}(repo_id) ON DELETE CASCADE,
    week_start TEXT NOT NULL,
    total INTEGER NOT NULL,
    PRIMARY KEY (repo_id, week_start)
);

-- Pull requests
CREATE TABLE IF NOT EXISTS {pulls} (
    repo_id INTEGER NOT NULL REFERENCES {repos}(repo_id) ON DELETE CASCADE,
    number INTEGER NOT NULL,
    state TEXT,
    created_at TEXT,
    merged_at TEXT,
    closed_at TEXT,
    PRIMARY KEY (repo_id, number)
);

-- Aggregates; scalar metrics use '' as key so the primary key conflicts on upsert
CREATE TABLE IF NOT EXISTS {aggregates} (
    metric TEXT NOT NULL,
    key TEXT NOT NULL DEFAULT '',
    value REAL NOT NULL,
    computed_at TEXT NOT NULL,
    extra_json TEXT,
    PRIMARY KEY (metric, key)
);
"#,
        repos = t.repositories,
        languages = t.languages,
        contributors = t.contributors,
        commits = t.commit_activity,
        pulls = t.pull_requests,
        aggregates = t.aggregates,
    )
}
