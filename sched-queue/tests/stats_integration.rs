//! Integration tests for sched-queue stats and show

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to escape path for TOML on Windows
fn escape_path_for_toml(path: &str) -> String {
    path.replace('\\', "\\\\")
}

/// Helper to create a test environment with config and database
fn setup_test_env() -> (TempDir, String, String) {
    let temp_dir = TempDir::new().unwrap();

    let config_dir = temp_dir.path().join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let data_dir = temp_dir.path().join("data");
    fs::create_dir_all(&data_dir).unwrap();

    let config_path = config_dir.join("config.toml");
    let db_path = data_dir.join("posts.db");

    let config_content = format!(
        r#"
[database]
path = "{}"

[[accounts]]
platform = "twitter"
identity = "tester"
"#,
        escape_path_for_toml(&db_path.to_string_lossy())
    );
    fs::write(&config_path, config_content).unwrap();

    (
        temp_dir,
        config_path.to_string_lossy().to_string(),
        db_path.to_string_lossy().to_string(),
    )
}

async fn seed_post(db_path: &str, offset_secs: i64) -> String {
    use libschedcast::{Database, Platform, Post};

    let db = Database::new(db_path).await.unwrap();
    let now = chrono::Utc::now().timestamp();
    let mut post = Post::new("Counting heads".to_string(), vec![Platform::Twitter]);
    post.scheduled_at = now + offset_secs;
    db.enqueue(&mut post, now).await.unwrap();
    post.id
}

#[tokio::test]
async fn test_stats_empty_queue() {
    let (_temp_dir, config_path, _db_path) = setup_test_env();

    let mut cmd = Command::cargo_bin("sched-queue").unwrap();

    cmd.env("SCHEDCAST_CONFIG", &config_path)
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("Total:     0"));
}

#[tokio::test]
async fn test_stats_counts_states() {
    let (_temp_dir, config_path, db_path) = setup_test_env();

    // Two pending, one due, one cancelled
    seed_post(&db_path, 3600).await;
    seed_post(&db_path, 7200).await;
    seed_post(&db_path, -60).await;
    let cancelled = seed_post(&db_path, 3600).await;
    let db = libschedcast::Database::new(&db_path).await.unwrap();
    db.cancel(&cancelled).await.unwrap();

    let mut cmd = Command::cargo_bin("sched-queue").unwrap();

    let output = cmd
        .env("SCHEDCAST_CONFIG", &config_path)
        .args(["stats", "--format", "json"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["pending"], 2);
    assert_eq!(json["due"], 1);
    assert_eq!(json["cancelled"], 1);
    assert_eq!(json["total"], 4);
}

#[tokio::test]
async fn test_show_includes_deliveries() {
    use libschedcast::types::Delivery;
    use libschedcast::Platform;

    let (_temp_dir, config_path, db_path) = setup_test_env();
    let post_id = seed_post(&db_path, -60).await;

    let db = libschedcast::Database::new(&db_path).await.unwrap();
    db.record_delivery(&Delivery::succeeded(
        post_id.clone(),
        Platform::Twitter,
        "tw-123".to_string(),
    ))
    .await
    .unwrap();

    let mut cmd = Command::cargo_bin("sched-queue").unwrap();

    let output = cmd
        .env("SCHEDCAST_CONFIG", &config_path)
        .args(["show", &post_id])
        .output()
        .unwrap();

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["post"]["id"], post_id.as_str());
    assert_eq!(json["deliveries"][0]["platform"], "twitter");
    assert_eq!(json["deliveries"][0]["success"], true);
    assert_eq!(json["deliveries"][0]["platform_post_id"], "tw-123");
}

#[tokio::test]
async fn test_show_unknown_post_fails() {
    let (_temp_dir, config_path, _db_path) = setup_test_env();

    let mut cmd = Command::cargo_bin("sched-queue").unwrap();

    cmd.env("SCHEDCAST_CONFIG", &config_path)
        .args(["show", "missing"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("not found"));
}
