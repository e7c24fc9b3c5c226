//! Integration tests for the CLI binary.
//!
//! These run the built `tilecache` binary against a config file that points
//! the store directory and the log file into a temporary directory. Nothing
//! here touches the network: downloads run with `--offline`.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

/// Run the CLI with `--config <config>` and capture output.
fn run_cli(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tilecache"))
        .args(args)
        .arg("--config")
        .arg(config)
        .output()
        .expect("Failed to execute CLI command")
}

/// Assert a command succeeded.
fn assert_success(output: &Output, context: &str) {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        panic!(
            "{} failed:\nstdout: {}\nstderr: {}",
            context, stdout, stderr
        );
    }
}

/// Writes a config rooted in `temp` and returns its path.
fn write_config(temp: &TempDir) -> PathBuf {
    let path = temp.path().join("config.ini");
    let content = format!(
        "[store]\ndirectory = {}\n\n[logging]\nfile = {}\n",
        temp.path().join("stores").display(),
        temp.path().join("logs").join("tilecache.log").display()
    );
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_config_path_prints_override() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("custom.ini");

    let output = run_cli(&config, &["config", "path"]);
    assert_success(&output, "config path");
    assert!(String::from_utf8_lossy(&output.stdout).contains("custom.ini"));
}

#[test]
fn test_config_init_then_show() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("nested").join("config.ini");

    let output = run_cli(&config, &["config", "init"]);
    assert_success(&output, "config init");
    assert!(config.exists());

    let output = run_cli(&config, &["config", "show"]);
    assert_success(&output, "config show");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[download]"));
    assert!(stdout.contains("max_concurrent = 6"));
}

#[test]
fn test_invalid_config_exits_with_error() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("config.ini");
    fs::write(&config, "[download]\nmax_concurrent = many\n").unwrap();

    let output = run_cli(&config, &["config", "show"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("max_concurrent"));
}

#[test]
fn test_stats_of_missing_store() {
    let temp = TempDir::new().unwrap();
    let config = write_config(&temp);

    let output = run_cli(&config, &["stats", "--name", "nowhere"]);
    assert_success(&output, "stats");
    assert!(String::from_utf8_lossy(&output.stdout).contains("(no tiles)"));
}

#[test]
fn test_offline_download_records_coverage() {
    let temp = TempDir::new().unwrap();
    let config = write_config(&temp);

    let output = run_cli(
        &config,
        &[
            "download",
            "--name",
            "lake",
            "--north",
            "46.5",
            "--west",
            "6.5",
            "--south",
            "46.2",
            "--east",
            "6.9",
            "--min-zoom",
            "6",
            "--max-zoom",
            "7",
            "--offline",
        ],
    );
    assert_success(&output, "offline download");
    assert!(temp.path().join("stores").join("lake.db").exists());

    let output = run_cli(&config, &["stats", "--name", "lake"]);
    assert_success(&output, "stats");
    assert!(String::from_utf8_lossy(&output.stdout).contains("Total:"));

    let output = run_cli(&config, &["dedupe", "--name", "lake"]);
    assert_success(&output, "dedupe");
    assert!(String::from_utf8_lossy(&output.stdout).contains("Removed 0 duplicate rows"));
}

#[test]
fn test_download_rejects_inverted_zoom_range() {
    let temp = TempDir::new().unwrap();
    let config = write_config(&temp);

    let output = run_cli(
        &config,
        &[
            "download", "--name", "bad", "--north", "46.5", "--west", "6.5", "--south", "46.2",
            "--east", "6.9", "--min-zoom", "9", "--max-zoom", "7",
        ],
    );
    assert_eq!(output.status.code(), Some(2));
}
