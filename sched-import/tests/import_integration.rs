//! Integration tests for sched-import

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

[[accounts]]
platform = "linkedin"
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

fn write_csv(temp_dir: &TempDir, name: &str, content: &str) -> String {
    let path = temp_dir.path().join(name);
    fs::write(&path, content).unwrap();
    path.to_string_lossy().to_string()
}

#[tokio::test]
async fn test_import_valid_rows() {
    let (temp_dir, config_path, db_path) = setup_test_env();
    let csv_path = write_csv(
        &temp_dir,
        "posts.csv",
        "content,platforms,scheduled_time\n\
         First post,twitter,2030-01-06 09:00\n\
         Second post,\"twitter,linkedin\",2030-01-07 09:00\n",
    );

    let mut cmd = Command::cargo_bin("sched-import").unwrap();

    cmd.env("SCHEDCAST_CONFIG", &config_path)
        .arg(&csv_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 2 post(s)"));

    let db = libschedcast::Database::new(&db_path).await.unwrap();
    let stats = db.stats().await.unwrap();
    assert_eq!(stats.pending, 2);
}

#[tokio::test]
async fn test_reimport_skips_duplicates() {
    let (temp_dir, config_path, db_path) = setup_test_env();
    let csv_path = write_csv(
        &temp_dir,
        "posts.csv",
        "content,platforms,scheduled_time\n\
         First post,twitter,2030-01-06 09:00\n\
         Second post,linkedin,2030-01-07 09:00\n",
    );

    let mut cmd = Command::cargo_bin("sched-import").unwrap();
    cmd.env("SCHEDCAST_CONFIG", &config_path)
        .arg(&csv_path)
        .assert()
        .success();

    let mut cmd = Command::cargo_bin("sched-import").unwrap();
    cmd.env("SCHEDCAST_CONFIG", &config_path)
        .arg(&csv_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 0 post(s)"))
        .stdout(predicate::str::contains("skipped 2 duplicate(s)"));

    let db = libschedcast::Database::new(&db_path).await.unwrap();
    let stats = db.stats().await.unwrap();
    assert_eq!(stats.total(), 2);
}

#[tokio::test]
async fn test_bad_rows_reported_but_import_succeeds() {
    let (temp_dir, config_path, db_path) = setup_test_env();
    let csv_path = write_csv(
        &temp_dir,
        "posts.csv",
        "content,platforms,scheduled_time\n\
         Good post,twitter,2030-01-06 09:00\n\
         ,twitter,2030-01-06 10:00\n\
         Bad platform,myspace,2030-01-06 11:00\n",
    );

    let mut cmd = Command::cargo_bin("sched-import").unwrap();

    cmd.env("SCHEDCAST_CONFIG", &config_path)
        .arg(&csv_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 1 post(s)"))
        .stdout(predicate::str::contains("rejected 2 row(s)"))
        .stdout(predicate::str::contains("row 2"))
        .stdout(predicate::str::contains("row 3"));

    let db = libschedcast::Database::new(&db_path).await.unwrap();
    let stats = db.stats().await.unwrap();
    assert_eq!(stats.total(), 1);
}

#[tokio::test]
async fn test_missing_content_column_aborts() {
    let (temp_dir, config_path, db_path) = setup_test_env();
    let csv_path = write_csv(
        &temp_dir,
        "posts.csv",
        "text,platforms\nHello,twitter\n",
    );

    let mut cmd = Command::cargo_bin("sched-import").unwrap();

    cmd.env("SCHEDCAST_CONFIG", &config_path)
        .arg(&csv_path)
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("content"));

    let db = libschedcast::Database::new(&db_path).await.unwrap();
    let stats = db.stats().await.unwrap();
    assert_eq!(stats.total(), 0);
}

#[tokio::test]
async fn test_dry_run_enqueues_nothing() {
    let (temp_dir, config_path, db_path) = setup_test_env();
    let csv_path = write_csv(
        &temp_dir,
        "posts.csv",
        "content,platforms,scheduled_time\nFirst post,twitter,2030-01-06 09:00\n",
    );

    let mut cmd = Command::cargo_bin("sched-import").unwrap();

    cmd.env("SCHEDCAST_CONFIG", &config_path)
        .arg(&csv_path)
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("Would import 1 post(s)"));

    let db = libschedcast::Database::new(&db_path).await.unwrap();
    let stats = db.stats().await.unwrap();
    assert_eq!(stats.total(), 0);
}

#[tokio::test]
async fn test_json_report() {
    let (temp_dir, config_path, _db_path) = setup_test_env();
    let csv_path = write_csv(
        &temp_dir,
        "posts.csv",
        "content,platforms,scheduled_time\n\
         First post,twitter,2030-01-06 09:00\n\
         ,twitter,2030-01-06 10:00\n",
    );

    let mut cmd = Command::cargo_bin("sched-import").unwrap();

    let output = cmd
        .env("SCHEDCAST_CONFIG", &config_path)
        .args([&csv_path, "--format", "json"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["accepted"].as_array().unwrap().len(), 1);
    assert_eq!(json["skipped_duplicates"], 0);
    assert_eq!(json["rejected"][0]["row"], 2);
    assert_eq!(json["dry_run"], false);
}

#[tokio::test]
async fn test_missing_file_fails() {
    let (_temp_dir, config_path, _db_path) = setup_test_env();

    let mut cmd = Command::cargo_bin("sched-import").unwrap();

    cmd.env("SCHEDCAST_CONFIG", &config_path)
        .arg("/nonexistent/posts.csv")
        .assert()
        .failure()
        .code(3);
}
