//! CSV report export
//!
//! Reads a namespace's tables and writes flat CSV files. Nothing is written
//! back to the database.

use anyhow::{Context, Result};
use csv::WriterBuilder;
use repostats_database::{Database, LanguageCounter};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const TOP_REPOS_LIMIT: i64 = 50;

#[derive(Serialize)]
struct LanguageStarsRow<'a> {
    language: &'a str,
    total_stars: i64,
}

/// Write every report for `db` into `out_dir`, returning the files written
///
/// Commit-activity and pull-request reports are only written when their
/// tables hold rows.
pub async fn export_reports(db: &Database, out_dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;
    let mut written = Vec::new();

    let top = db.top_repositories(TOP_REPOS_LIMIT).await?;
    written.push(write_csv(
        &out_dir.join("top_repos.csv"),
        &["full_name", "stars", "forks", "language"],
        &top,
    )?);

    let languages = db.sum_by_language(LanguageCounter::Stars).await?;
    let language_rows: Vec<_> = languages
        .iter()
        .map(|l| LanguageStarsRow {
            language: &l.language,
            total_stars: l.total,
        })
        .collect();
    written.push(write_csv(
        &out_dir.join("stars_by_language.csv"),
        &["language", "total_stars"],
        &language_rows,
    )?);

    let commits = db.get_commit_activity_rows().await?;
    if !commits.is_empty() {
        written.push(write_csv(
            &out_dir.join("commit_activity.csv"),
            &["full_name", "week_start", "total"],
            &commits,
        )?);
    }

    let pulls = db.get_pull_request_rows().await?;
    if !pulls.is_empty() {
        written.push(write_csv(
            &out_dir.join("pull_requests.csv"),
            &["full_name", "number", "state", "created_at", "merged_at", "closed_at"],
            &pulls,
        )?);
    }

    info!(
        namespace = %db.namespace(),
        files = written.len(),
        "Exported reports to {}",
        out_dir.display()
    );
    Ok(written)
}

/// Write a header row and then one record per row
fn write_csv<T: Serialize>(path: &Path, headers: &[&str], rows: &[T]) -> Result<PathBuf> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;

    writer.write_record(headers)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    debug!(rows = rows.len(), "Wrote {}", path.display());
    Ok(path.to_path_buf())
}
