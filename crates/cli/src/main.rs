//! RepoStats CLI
//!
//! Batch runner: sync a GitHub account, recompute aggregates, export reports.

use anyhow::Result;
use clap::Parser;
use repostats_analyzer::Analyzer;
use repostats_cli::{export_reports, namespace_arg, Cli, Commands, SyncArgs};
use repostats_collector::{sync, GithubClient};
use repostats_database::{Database, Namespace};
use std::path::Path;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .init();

    match cli.command {
        Commands::Sync(args) => {
            run_sync(&cli.database, &args).await?;
        }
        Commands::Aggregate { namespace } => {
            aggregate(&cli.database, namespace_arg(namespace.as_deref())).await?;
        }
        Commands::Export { out_dir, namespace } => {
            let db = Database::connect(&cli.database, namespace_arg(namespace.as_deref())).await?;
            let files = export_reports(&db, &out_dir).await?;
            for file in files {
                println!("Wrote {}", file.display());
            }
        }
    }

    Ok(())
}

async fn run_sync(path: &Path, args: &SyncArgs) -> Result<()> {
    let options = args.sync_options()?;
    let config = args.collector_config();

    if config.github_token.is_none() {
        warn!("GITHUB_TOKEN not set. API rate limits will be restricted.");
    }

    let db = Database::connect(path, Namespace::new(&options.target)).await?;
    let client = GithubClient::new(&config)?;

    let report = sync(&client, &db, &options).await?;
    println!(
        "Synced {}: {} repositories, {} languages, {} contributors, \
         {} commit weeks, {} pull requests",
        options.target,
        report.repositories,
        report.languages,
        report.contributors,
        report.commit_weeks,
        report.pull_requests
    );

    if args.skip_aggregates {
        info!("Skipping aggregate computation");
        return Ok(());
    }

    let summary = Analyzer::compute(&db).await?;
    println!(
        "Computed {} aggregate rows across {} metrics",
        summary.rows,
        summary.metrics.len()
    );
    Ok(())
}

async fn aggregate(path: &Path, namespace: Namespace) -> Result<()> {
    let db = Database::connect(path, namespace).await?;
    Analyzer::compute(&db).await?;

    println!("{:<24} {:<24} {:>12}  {}", "METRIC", "KEY", "VALUE", "PAYLOAD");
    println!("{}", "-".repeat(72));

    for metric in db.get_aggregates().await? {
        let payload = match metric.payload {
            Some(ref payload) => payload.to_string(),
            None => "-".to_string(),
        };
        println!(
            "{:<24} {:<24} {:>12}  {}",
            metric.metric,
            metric.key.as_deref().unwrap_or("-"),
            metric.value,
            payload
        );
    }

    Ok(())
}
