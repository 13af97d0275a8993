use chrono::NaiveDate;
use repostats_cli::export_reports;
use repostats_database::{
    CommitWeek, Database, Namespace, PullRequestRecord, RepoCommitActivity, RepoPullRequests,
    Repository,
};

fn repo(id: i64, full_name: &str, stars: i64, language: Option<&str>) -> Repository {
    Repository {
        repo_id: id,
        name: full_name.rsplit('/').next().unwrap().to_string(),
        full_name: full_name.to_string(),
        owner_login: Some("acme".to_string()),
        private: false,
        fork: false,
        archived: false,
        disabled: false,
        html_url: None,
        description: None,
        created_at: None,
        updated_at: None,
        pushed_at: None,
        stargazers_count: Some(stars),
        watchers_count: None,
        forks_count: Some(2),
        open_issues_count: None,
        language: language.map(str::to_string),
        size: None,
        license: None,
    }
}

async fn seeded(dir: &std::path::Path) -> Database {
    let db = Database::connect(&dir.join("stats.db"), Namespace::new("acme"))
        .await
        .unwrap();
    db.upsert_repositories(&[
        repo(1, "acme/api", 10, Some("Python")),
        repo(2, "acme/web", 5, Some("JavaScript")),
        repo(3, "acme/etl", 0, Some("Python")),
        repo(4, "acme/docs", 5, None),
    ])
    .await
    .unwrap();
    db
}

fn lines(path: &std::path::Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn exports_core_reports_without_dora_tables() {
    let dir = tempfile::tempdir().unwrap();
    let db = seeded(dir.path()).await;
    let out = dir.path().join("reports");

    let files = export_reports(&db, &out).await.unwrap();

    assert_eq!(files.len(), 2);
    assert_eq!(
        lines(&out.join("top_repos.csv")),
        [
            "full_name,stars,forks,language",
            "acme/api,10,2,Python",
            "acme/docs,5,2,",
            "acme/web,5,2,JavaScript",
            "acme/etl,0,2,Python",
        ]
    );
    assert_eq!(
        lines(&out.join("stars_by_language.csv")),
        ["language,total_stars", "Python,10", "JavaScript,5"]
    );
    assert!(!out.join("commit_activity.csv").exists());
    assert!(!out.join("pull_requests.csv").exists());
}

#[tokio::test]
async fn exports_dora_reports_when_present() {
    let dir = tempfile::tempdir().unwrap();
    let db = seeded(dir.path()).await;
    db.upsert_commit_activity(&[RepoCommitActivity {
        repo_id: 2,
        weeks: vec![CommitWeek {
            week_start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            total: 7,
        }],
    }])
    .await
    .unwrap();
    db.upsert_pull_requests(&[RepoPullRequests {
        repo_id: 1,
        pull_requests: vec![PullRequestRecord {
            number: 12,
            state: Some("merged".to_string()),
            created_at: Some("2024-01-02T00:00:00Z".to_string()),
            merged_at: Some("2024-01-03T00:00:00Z".to_string()),
            closed_at: None,
        }],
    }])
    .await
    .unwrap();
    let out = dir.path().join("reports");

    let files = export_reports(&db, &out).await.unwrap();

    assert_eq!(files.len(), 4);
    assert_eq!(
        lines(&out.join("commit_activity.csv")),
        ["full_name,week_start,total", "acme/web,2024-01-01,7"]
    );
    assert_eq!(
        lines(&out.join("pull_requests.csv")),
        [
            "full_name,number,state,created_at,merged_at,closed_at",
            "acme/api,12,merged,2024-01-02T00:00:00Z,2024-01-03T00:00:00Z,",
        ]
    );
}

#[tokio::test]
async fn export_reads_only_its_namespace() {
    let dir = tempfile::tempdir().unwrap();
    let _acme = seeded(dir.path()).await;
    let other = Database::connect(&dir.path().join("stats.db"), Namespace::new("other"))
        .await
        .unwrap();
    let out = dir.path().join("other");

    export_reports(&other, &out).await.unwrap();

    assert_eq!(lines(&out.join("top_repos.csv")), ["full_name,stars,forks,language"]);
}
