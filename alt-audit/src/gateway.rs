//! Authorized download of previously generated reports.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::auth::{Authorizer, Caller, Capability, NonceAction, NonceIssuer};
use crate::error::{AuthorizationFailure, ExportError};
use crate::report::is_report_filename;

/// MIME type of every download.
pub const CSV_CONTENT_TYPE: &str = "text/csv";

/// One download request.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub caller: Caller,
    /// Anti-forgery token for [`NonceAction::Download`].
    pub nonce: String,
    /// Requested file name, untrusted.
    pub file: String,
}

/// A report ready to be streamed.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct Download {
    pub filename: String,
    pub body: Vec<u8>,
}

impl Download {
    #[must_use]
    pub fn content_type(&self) -> &'static str {
        CSV_CONTENT_TYPE
    }

    #[must_use]
    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.filename)
    }

    /// Exact body length in bytes.
    #[must_use]
    pub fn content_length(&self) -> u64 {
        u64::try_from(self.body.len()).unwrap_or(u64::MAX)
    }
}

/// Reduce an untrusted file name to a safe basename.
///
/// Path components are dropped and only ASCII letters, digits, `.`, `-` and
/// `_` survive. Leading dots are stripped so hidden files cannot be named.
#[must_use]
pub fn sanitize_file_name(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    cleaned.trim_start_matches('.').to_owned()
}

/// Serves report files from the report directory to authorized callers.
pub struct DownloadGateway {
    report_dir: PathBuf,
    authorizer: Arc<dyn Authorizer>,
    nonces: NonceIssuer,
}

impl DownloadGateway {
    #[must_use]
    pub fn new(
        report_dir: impl Into<PathBuf>,
        authorizer: Arc<dyn Authorizer>,
        nonces: NonceIssuer,
    ) -> Self {
        Self {
            report_dir: report_dir.into(),
            authorizer,
            nonces,
        }
    }

    /// Fetch a report now.
    ///
    /// # Errors
    ///
    /// See [`DownloadGateway::fetch_at`].
    pub fn fetch(&self, request: &DownloadRequest) -> Result<Download, ExportError> {
        self.fetch_at(request, Utc::now())
    }

    /// Fetch a report, checking the token as of `now`.
    ///
    /// # Errors
    ///
    /// - [`ExportError::Authorization`] if the token or capability check fails
    /// - [`ExportError::Validation`] if the file name is empty or not a report name
    /// - [`ExportError::NotFound`] if no such report exists
    /// - [`ExportError::UnexpectedScan`] if the file exists but cannot be read
    pub fn fetch_at(
        &self,
        request: &DownloadRequest,
        now: DateTime<Utc>,
    ) -> Result<Download, ExportError> {
        if !self
            .nonces
            .verify_at(&request.nonce, NonceAction::Download, &request.caller, now)
        {
            return Err(AuthorizationFailure::InvalidNonce.into());
        }
        if !self
            .authorizer
            .has_capability(&request.caller, Capability::ManageOptions)
        {
            return Err(AuthorizationFailure::MissingCapability.into());
        }

        let filename = sanitize_file_name(&request.file);
        if filename.is_empty() {
            return Err(ExportError::Validation("Invalid file name.".to_owned()));
        }
        if !is_report_filename(&filename) {
            warn!(file = %request.file, "rejected download of non-report file");
            return Err(ExportError::Validation("Invalid file type.".to_owned()));
        }

        let path = self.report_dir.join(&filename);
        if !path.is_file() {
            return Err(ExportError::NotFound("File not found.".to_owned()));
        }
        let body = fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ExportError::NotFound("File not found.".to_owned()),
            _ => ExportError::UnexpectedScan(
                anyhow::Error::new(e).context(format!("Failed to read {}", path.display())),
            ),
        })?;

        debug!(file = %filename, bytes = body.len(), "serving report");
        Ok(Download { filename, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_paths_and_specials() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("..\\secret.csv"), "secret.csv");
        assert_eq!(sanitize_file_name(".htaccess"), "htaccess");
        assert_eq!(
            sanitize_file_name("images-without-alt-text-2024 01.csv"),
            "images-without-alt-text-202401.csv"
        );
        assert_eq!(sanitize_file_name("dir/"), "");
        assert_eq!(sanitize_file_name(""), "");
    }

    #[test]
    fn test_download_headers() {
        let download = Download {
            filename: "images-without-alt-text-x.csv".to_owned(),
            body: b"a,b\n".to_vec(),
        };
        assert_eq!(download.content_type(), "text/csv");
        assert_eq!(
            download.content_disposition(),
            "attachment; filename=\"images-without-alt-text-x.csv\""
        );
        assert_eq!(download.content_length(), 4);
    }
}
