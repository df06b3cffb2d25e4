//! CSV report writer.
//!
//! Reports land in a single directory that is guarded on creation with two
//! constant files: an `index.php` that blocks directory listings and an
//! `.htaccess` that denies all web access. Report files are never modified
//! after they are written.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use chrono::NaiveDateTime;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::config::ExportConfig;
use crate::finding::Finding;

/// Every report filename starts with this prefix.
pub const REPORT_PREFIX: &str = "images-without-alt-text-";

/// Report file extension.
pub const REPORT_EXTENSION: &str = "csv";

/// Prefix of the secondary working copy written next to each report.
pub const WORKING_COPY_PREFIX: &str = "temp-";

/// Fixed CSV header.
pub const REPORT_HEADER: [&str; 5] = ["Image ID", "Image URL", "Image Title", "Attached To", "Edit URL"];

/// Guard files written when the report directory is first created.
pub const GUARD_FILES: &[(&str, &str)] = &[
    ("index.php", "<?php // Silence is golden"),
    (".htaccess", "Deny from all"),
];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// Upper bound on `-N` suffixes tried when two exports share a timestamp.
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// A report written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub struct ReportFile {
    /// Location on disk.
    pub path: PathBuf,
    /// File name inside the report directory.
    pub filename: String,
    /// Caller-facing retrieval locator.
    pub url: String,
    /// Number of data rows (header excluded).
    pub rows: usize,
}

/// Report filename for an export started at `timestamp` (before collision suffixes).
#[must_use]
pub fn report_filename(timestamp: NaiveDateTime) -> String {
    format!("{}.{REPORT_EXTENSION}", report_stem(timestamp))
}

fn report_stem(timestamp: NaiveDateTime) -> String {
    format!("{REPORT_PREFIX}{}", timestamp.format(TIMESTAMP_FORMAT))
}

/// Whether `name` looks like a report this crate produced.
#[must_use]
pub fn is_report_filename(name: &str) -> bool {
    name.starts_with(REPORT_PREFIX)
        && Path::new(name)
            .extension()
            .is_some_and(|ext| ext == REPORT_EXTENSION)
}

/// Working-copy filename derived from the request time.
#[must_use]
pub fn working_copy_filename(requested_at: NaiveDateTime) -> String {
    let stamp = requested_at.format("%Y-%m-%dT%H:%M:%S%.9f").to_string();
    let digest = Sha256::digest(stamp.as_bytes());
    format!("{WORKING_COPY_PREFIX}{}.{REPORT_EXTENSION}", hex::encode(digest))
}

/// Writes findings to timestamped CSV files in one directory.
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    dir: PathBuf,
    download_base_url: String,
}

impl ReportBuilder {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, download_base_url: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            download_base_url: download_base_url.into(),
        }
    }

    #[must_use]
    pub fn from_config(config: &ExportConfig) -> Self {
        Self::new(config.report_dir.clone(), config.download_base_url.clone())
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Retrieval locator for a report file.
    #[must_use]
    pub fn url_for(&self, filename: &str) -> String {
        format!("{}?file={filename}", self.download_base_url)
    }

    /// Create the report directory if needed. Returns `true` if it was created.
    ///
    /// A freshly created directory also receives the [`GUARD_FILES`].
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or a guard file cannot be written.
    pub fn ensure_dir(&self) -> anyhow::Result<bool> {
        if self.dir.is_dir() {
            return Ok(false);
        }

        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create report directory {}", self.dir.display()))?;
        for (name, body) in GUARD_FILES {
            let path = self.dir.join(name);
            fs::write(&path, body)
                .with_context(|| format!("Failed to write guard file {}", path.display()))?;
        }
        info!(dir = %self.dir.display(), "created report directory");
        Ok(true)
    }

    /// Write `findings` as a new CSV report stamped with `timestamp`.
    ///
    /// An empty `findings` slice still produces a header-only report.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be prepared, no free filename
    /// is found, or writing the CSV fails.
    pub fn write(&self, findings: &[Finding], timestamp: NaiveDateTime) -> anyhow::Result<ReportFile> {
        self.write_through(findings, timestamp, |file| file)
    }

    /// [`ReportBuilder::write`] with the opened report file wrapped by `sink`.
    ///
    /// A report that fails part-way is removed so it can never be downloaded.
    fn write_through<W, F>(
        &self,
        findings: &[Finding],
        timestamp: NaiveDateTime,
        sink: F,
    ) -> anyhow::Result<ReportFile>
    where
        W: io::Write,
        F: FnOnce(fs::File) -> W,
    {
        self.ensure_dir()?;

        let stem = report_stem(timestamp);
        let (path, filename, file) = self.create_unique(&stem)?;

        if let Err(err) = write_rows(sink(file), findings) {
            if let Err(cleanup) = fs::remove_file(&path) {
                warn!(path = %path.display(), error = %cleanup, "failed to remove partial report");
            }
            return Err(err.context(format!("Failed to write report {}", path.display())));
        }

        debug!(path = %path.display(), rows = findings.len(), "report written");
        Ok(ReportFile {
            url: self.url_for(&filename),
            path,
            filename,
            rows: findings.len(),
        })
    }

    /// Copy `report` to a `temp-<hash>.csv` working file. Returns the copy's path.
    ///
    /// # Errors
    ///
    /// Returns an error if the copy fails.
    pub fn write_working_copy(
        &self,
        report: &ReportFile,
        requested_at: NaiveDateTime,
    ) -> anyhow::Result<PathBuf> {
        let target = self.dir.join(working_copy_filename(requested_at));
        fs::copy(&report.path, &target).with_context(|| {
            format!(
                "Failed to copy {} to {}",
                report.path.display(),
                target.display()
            )
        })?;
        Ok(target)
    }

    fn create_unique(&self, stem: &str) -> anyhow::Result<(PathBuf, String, fs::File)> {
        for attempt in 1..=MAX_NAME_ATTEMPTS {
            let filename = if attempt == 1 {
                format!("{stem}.{REPORT_EXTENSION}")
            } else {
                format!("{stem}-{attempt}.{REPORT_EXTENSION}")
            };
            let path = self.dir.join(&filename);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, filename, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to create {}", path.display()));
                }
            }
        }
        bail!("No free report filename for {stem} after {MAX_NAME_ATTEMPTS} attempts")
    }
}

fn write_rows<W: io::Write>(out: W, findings: &[Finding]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(REPORT_HEADER)?;
    for finding in findings {
        writer.write_record(finding.to_record())?;
    }
    writer.flush()?;
    Ok(())
}
