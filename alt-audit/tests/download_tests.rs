//! Integration tests for authorized report downloads.

#![allow(clippy::unwrap_used)]

use std::fs;
use std::sync::Arc;

use alt_audit::{
    AuthorizationFailure, Caller, ContentStore, DownloadGateway, DownloadRequest, ExportConfig,
    ExportError, ExportRequest, ExportService, NonceAction, NonceIssuer, ScanOptions, SiteSnapshot,
    StaticAuthorizer,
};
use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

const ADMIN: &str = "admin-session";
const SECRET: &str = "test-secret";

fn now() -> DateTime<Utc> {
    Utc.timestamp_opt(1_714_559_400, 0).unwrap()
}

fn gateway(dir: &std::path::Path) -> DownloadGateway {
    DownloadGateway::new(
        dir,
        Arc::new(StaticAuthorizer::new([ADMIN])),
        NonceIssuer::new(SECRET),
    )
}

fn download_request(session: &str, file: &str) -> DownloadRequest {
    let caller = Caller::new(session);
    DownloadRequest {
        nonce: NonceIssuer::new(SECRET).issue_at(NonceAction::Download, &caller, now()),
        caller,
        file: file.to_owned(),
    }
}

#[test]
fn test_fetch_existing_report() {
    let tmp = TempDir::new().unwrap();
    let name = "images-without-alt-text-2024-05-01-10-30-00.csv";
    fs::write(tmp.path().join(name), "Image ID\n1\n").unwrap();

    let download = gateway(tmp.path())
        .fetch_at(&download_request(ADMIN, name), now())
        .unwrap();

    assert_eq!(download.filename, name);
    assert_eq!(download.body, b"Image ID\n1\n");
    assert_eq!(download.content_type(), "text/csv");
    assert_eq!(download.content_length(), 11);
    assert_eq!(
        download.content_disposition(),
        format!("attachment; filename=\"{name}\"")
    );
}

#[test]
fn test_fetch_rejects_bad_tokens_and_callers() {
    let tmp = TempDir::new().unwrap();
    let name = "images-without-alt-text-a.csv";
    fs::write(tmp.path().join(name), "x").unwrap();
    let gw = gateway(tmp.path());

    let mut req = download_request(ADMIN, name);
    req.nonce = "nope".to_owned();
    assert!(matches!(
        gw.fetch_at(&req, now()),
        Err(ExportError::Authorization(AuthorizationFailure::InvalidNonce))
    ));

    // An export token cannot be replayed as a download token.
    let caller = Caller::new(ADMIN);
    req.nonce = NonceIssuer::new(SECRET).issue_at(NonceAction::Export, &caller, now());
    assert!(matches!(
        gw.fetch_at(&req, now()),
        Err(ExportError::Authorization(AuthorizationFailure::InvalidNonce))
    ));

    let err = gw
        .fetch_at(&download_request("visitor", name), now())
        .unwrap_err();
    assert!(matches!(
        err,
        ExportError::Authorization(AuthorizationFailure::MissingCapability)
    ));
    assert_eq!(
        err.user_message(),
        "You do not have permission to perform this action."
    );
}

#[test]
fn test_fetch_validates_file_names() {
    let tmp = TempDir::new().unwrap();
    let reports = tmp.path().join("reports");
    fs::create_dir(&reports).unwrap();
    fs::write(tmp.path().join("images-without-alt-text-x.csv"), "outside").unwrap();
    fs::write(reports.join("index.php"), "<?php // Silence is golden").unwrap();
    let gw = gateway(&reports);

    let cases = [
        ("", "Invalid file name."),
        ("../", "Invalid file name."),
        ("index.php", "Invalid file type."),
        (".htaccess", "Invalid file type."),
        ("temp-abc.csv", "Invalid file type."),
        ("images-without-alt-text-x.txt", "Invalid file type."),
    ];
    for (file, message) in cases {
        let err = gw
            .fetch_at(&download_request(ADMIN, file), now())
            .unwrap_err();
        assert!(
            matches!(&err, ExportError::Validation(m) if m == message),
            "{file:?}: {err:?}"
        );
    }

    // Traversal is reduced to a basename inside the report directory.
    let err = gw
        .fetch_at(
            &download_request(ADMIN, "../images-without-alt-text-x.csv"),
            now(),
        )
        .unwrap_err();
    assert!(matches!(err, ExportError::NotFound(ref m) if m == "File not found."));
}

#[test]
fn test_exported_report_downloads_through_service_gateway() {
    let tmp = TempDir::new().unwrap();
    let snap = Arc::new(
        SiteSnapshot::from_yaml(
            "attachments:\n  - { id: 7, title: Owl, url: 'https://example.com/owl.jpg' }\n",
        )
        .unwrap(),
    );
    let svc = ExportService::new(
        snap as Arc<dyn ContentStore>,
        None,
        Arc::new(StaticAuthorizer::new([ADMIN])),
        NonceIssuer::new(SECRET),
        ExportConfig::new(tmp.path(), "https://example.com/dl"),
    );
    let caller = Caller::new(ADMIN);
    let summary = svc
        .run(&ExportRequest {
            options: ScanOptions::default(),
            nonce: svc.nonces().issue(NonceAction::Export, &caller),
            caller: caller.clone(),
        })
        .unwrap();

    let url = summary.download_url.unwrap();
    let nonce = url.rsplit("nonce=").next().unwrap().to_owned();
    let download = svc
        .download_gateway()
        .fetch(&DownloadRequest {
            caller,
            nonce,
            file: summary.report.filename.clone(),
        })
        .unwrap();

    assert_eq!(download.body, fs::read(&summary.report.path).unwrap());
    assert!(String::from_utf8(download.body).unwrap().contains("https://example.com/owl.jpg"));
}
