#![allow(clippy::unwrap_used)]
//! Integration tests for the one-shot `scan` command.

use std::fs;
use std::path::Path;

use alt_audit_cli::cli::{Cli, Commands, run_scan};
use clap::Parser;
use tempfile::TempDir;

const SITE_YAML: &str = "
attachments:
  - { id: 1, title: Hero, url: 'https://example.com/hero.png' }
  - { id: 2, title: Logo, url: 'https://example.com/logo.png', alt: Company logo }
content:
  - { id: 7, kind: post, title: Launch, content: '<p><img src=\"https://example.com/x.png\"></p>' }
";

fn scan(dir: &Path, extra: &[&str]) -> anyhow::Result<String> {
    let snapshot = dir.join("site.yaml");
    fs::write(&snapshot, SITE_YAML).unwrap();
    let reports = dir.join("reports");

    let mut argv = vec![
        "alt-audit".to_owned(),
        "scan".to_owned(),
        "--snapshot".to_owned(),
        snapshot.display().to_string(),
        "--report-dir".to_owned(),
        reports.display().to_string(),
        "--secret".to_owned(),
        "s".to_owned(),
    ];
    argv.extend(extra.iter().map(|s| (*s).to_owned()));

    let Commands::Scan(args) = Cli::try_parse_from(argv).unwrap().command else {
        panic!("expected scan");
    };
    let mut out = Vec::new();
    run_scan(&args, &mut out)?;
    Ok(String::from_utf8(out).unwrap())
}

#[test]
fn test_scan_prints_summary_and_writes_report() {
    let tmp = TempDir::new().unwrap();
    let text = scan(tmp.path(), &[]).unwrap();

    assert!(text.contains("Findings:  2"));
    assert!(text.contains("Download:  http://127.0.0.1:8000/download?file=images-without-alt-text-"));
    let reports: Vec<_> = fs::read_dir(tmp.path().join("reports"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert!(reports.iter().any(|n| n.starts_with("images-without-alt-text-")));
    assert!(reports.iter().any(|n| n.starts_with("temp-")));
    assert!(reports.iter().any(|n| n == ".htaccess"));
}

#[test]
fn test_scan_json_with_selected_sources() {
    let tmp = TempDir::new().unwrap();
    let text = scan(
        tmp.path(),
        &["--json", "--sources", "content", "--no-working-copy"],
    )
    .unwrap();

    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["success"], true);
    assert_eq!(value["data"]["count"], 1);
    let names: Vec<_> = fs::read_dir(tmp.path().join("reports"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert!(!names.iter().any(|n| n.starts_with("temp-")));
}

#[test]
fn test_scan_missing_snapshot_fails() {
    let tmp = TempDir::new().unwrap();
    let Commands::Scan(args) = Cli::try_parse_from([
        "alt-audit",
        "scan",
        "--snapshot",
        tmp.path().join("nope.json").to_str().unwrap(),
        "--secret",
        "s",
    ])
    .unwrap()
    .command
    else {
        panic!("expected scan");
    };
    let err = run_scan(&args, &mut Vec::new()).unwrap_err();
    assert!(format!("{err:#}").contains("Failed to read snapshot"));
}
