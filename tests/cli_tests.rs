//! Tests for the fleetcost binary that need no AWS access
//!
//! Everything here fails (or finishes) before any client is built.

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn fleetcost(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_fleetcost"))
        .current_dir(dir)
        .args(args)
        .output()
        .expect("Failed to execute fleetcost")
}

#[test]
fn test_no_arguments_prints_usage() {
    let temp_dir = TempDir::new().unwrap();
    let output = fleetcost(temp_dir.path(), &[]);

    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage: fleetcost <QUERY_SPEC> <PRICE_LIST>"));
}

#[test]
fn test_one_argument_prints_usage() {
    let temp_dir = TempDir::new().unwrap();
    let output = fleetcost(temp_dir.path(), &["queries.txt"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stdout).contains("Usage:"));
}

#[test]
fn test_three_arguments_prints_usage() {
    let temp_dir = TempDir::new().unwrap();
    let output = fleetcost(temp_dir.path(), &["a.txt", "b.csv", "c.csv"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stdout).contains("Usage:"));
}

#[test]
fn test_init_config_writes_loadable_file() {
    let temp_dir = TempDir::new().unwrap();
    let output = fleetcost(temp_dir.path(), &["--init-config", "fleetcost.toml"]);

    assert!(output.status.success());
    let path = temp_dir.path().join("fleetcost.toml");
    let config = fleetcost::config::Config::load(Some(&path)).unwrap();
    assert_eq!(config.report.path, Path::new("amqa-3year.csv"));
}

#[test]
fn test_malformed_price_list_fails_before_any_query() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("queries.txt"), "m5.large:SELECT 1\n").unwrap();
    // Header plus a row far shorter than the offer-file layout
    std::fs::write(
        temp_dir.path().join("price.csv"),
        "SKU,OfferTermCode,RateCode,TermType\nabc,def,ghi,Reserved\n",
    )
    .unwrap();

    let output = fleetcost(
        temp_dir.path(),
        &["--config", "missing.toml", "queries.txt", "price.csv"],
    );

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Malformed price list row 2"), "stderr: {}", stderr);
    assert!(!temp_dir.path().join("amqa-3year.csv").exists());
}

#[test]
fn test_malformed_query_spec_fails_before_any_query() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("queries.txt"), "m5.large SELECT 1\n").unwrap();
    std::fs::write(temp_dir.path().join("price.csv"), "SKU\n").unwrap();

    let output = fleetcost(
        temp_dir.path(),
        &["--config", "missing.toml", "queries.txt", "price.csv"],
    );

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Malformed query spec line 1"), "stderr: {}", stderr);
}

#[test]
fn test_invalid_utilization_is_config_error() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("queries.txt"), "m5.large:SELECT 1\n").unwrap();
    std::fs::write(temp_dir.path().join("price.csv"), "SKU\n").unwrap();

    let output = fleetcost(
        temp_dir.path(),
        &[
            "--config",
            "missing.toml",
            "--utilization",
            "1.5",
            "queries.txt",
            "price.csv",
        ],
    );

    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn test_unknown_output_format_prints_usage() {
    let temp_dir = TempDir::new().unwrap();
    let output = fleetcost(
        temp_dir.path(),
        &["--output", "xml", "queries.txt", "price.csv"],
    );

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stdout).contains("Usage:"));
}

#[test]
fn test_instance_type_named_like_report_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("queries.txt"), "amqa-3year:SELECT 1\n").unwrap();
    std::fs::write(temp_dir.path().join("price.csv"), "SKU\n").unwrap();

    let output = fleetcost(
        temp_dir.path(),
        &["--config", "missing.toml", "queries.txt", "price.csv"],
    );

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("would overwrite the report"), "stderr: {}", stderr);
    assert!(!temp_dir.path().join("amqa-3year.csv").exists());
}
