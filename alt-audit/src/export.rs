//! Export orchestration.
//!
//! One [`ExportService::run`] call is one export request: authorize, scan every
//! enabled source, write the CSV, summarize. Everything is synchronous and
//! request-scoped; the only shared state is the injected stores and the report
//! directory.

use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::auth::{Authorizer, Caller, Capability, NonceAction, NonceIssuer};
use crate::config::{DEFAULT_BATCH_SIZE, ExportConfig, ScanOptions};
use crate::error::{AuthorizationFailure, ErrorKind, ExportError};
use crate::gateway::DownloadGateway;
use crate::report::{ReportBuilder, ReportFile};
use crate::scanner::AltTextScanner;
use crate::store::{CommerceStore, ContentStore};

/// Raw admin form submission.
///
/// Checkboxes are enabled only when their value is exactly `"1"`; an absent or
/// unparseable batch size falls back to [`DEFAULT_BATCH_SIZE`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportForm {
    #[serde(default)]
    pub include_media_library: Option<String>,
    #[serde(default, alias = "include_post_content")]
    pub include_content_images: Option<String>,
    #[serde(default, alias = "include_woo_products")]
    pub include_commerce_images: Option<String>,
    #[serde(default)]
    pub batch_size: Option<String>,
    #[serde(default, alias = "natf_nonce")]
    pub nonce: Option<String>,
}

impl ExportForm {
    /// Scan options selected by the form.
    #[must_use]
    pub fn options(&self) -> ScanOptions {
        let checked = |field: Option<&str>| field == Some("1");
        ScanOptions {
            include_media_library: checked(self.include_media_library.as_deref()),
            include_content_images: checked(self.include_content_images.as_deref()),
            include_commerce_images: checked(self.include_commerce_images.as_deref()),
            batch_size: self
                .batch_size
                .as_deref()
                .and_then(|raw| raw.trim().parse().ok())
                .unwrap_or(DEFAULT_BATCH_SIZE),
        }
    }

    /// Turn the form into a request on behalf of `caller`.
    #[must_use]
    pub fn into_request(self, caller: Caller) -> ExportRequest {
        ExportRequest {
            options: self.options(),
            nonce: self.nonce.unwrap_or_default(),
            caller,
        }
    }
}

/// One export request.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub options: ScanOptions,
    /// Anti-forgery token for [`NonceAction::Export`].
    pub nonce: String,
    pub caller: Caller,
}

/// Outcome of a successful export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub struct ExportSummary {
    pub count: usize,
    pub message: String,
    /// Present only when `count > 0`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip)]
    pub report: ReportFile,
}

/// `data` member of the JSON envelope returned to the admin UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseData {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

/// JSON envelope: `{success, data: {message, count?, download_url?}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportResponse {
    pub success: bool,
    pub data: ResponseData,
    /// Class of the failure behind an unsuccessful response.
    #[serde(skip)]
    pub failure: Option<ErrorKind>,
}

impl ExportResponse {
    #[must_use]
    pub fn from_result(result: &Result<ExportSummary, ExportError>) -> Self {
        match result {
            Ok(summary) => Self {
                success: true,
                data: ResponseData {
                    message: summary.message.clone(),
                    count: Some(summary.count),
                    download_url: summary.download_url.clone(),
                },
                failure: None,
            },
            Err(err) => Self {
                success: false,
                data: ResponseData {
                    message: err.user_message(),
                    count: None,
                    download_url: None,
                },
                failure: Some(err.kind()),
            },
        }
    }
}

/// Escape text for use inside a double-quoted HTML attribute.
fn escape_attr(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
    out
}

/// User-facing summary message for `count` findings.
///
/// The link target is HTML-escaped; `download_url` itself stays raw.
#[must_use]
pub fn summary_message(count: usize, download_url: Option<&str>) -> String {
    let href = download_url.map(escape_attr);
    match (count, href.as_deref()) {
        (0, _) => "Great news! No images without alt text were found.".to_owned(),
        (1, None) => "Found 1 image without alt text.".to_owned(),
        (n, None) => format!("Found {n} images without alt text."),
        (1, Some(url)) => {
            format!("Found 1 image without alt text. <a href=\"{url}\" target=\"_blank\">Download CSV</a>")
        }
        (n, Some(url)) => {
            format!("Found {n} images without alt text. <a href=\"{url}\" target=\"_blank\">Download CSV</a>")
        }
    }
}

/// Log a failed request: refusals as warnings, unexpected failures as errors
/// with the full cause chain.
pub fn log_export_failure(err: &ExportError, caller: &Caller) {
    match err {
        ExportError::UnexpectedScan(cause) => {
            error!(session = %caller.session, error = %format!("{cause:#}"), "export failed");
        }
        other => warn!(session = %caller.session, error = %other, "request refused"),
    }
}

/// Runs export requests against injected stores.
pub struct ExportService {
    store: Arc<dyn ContentStore>,
    commerce: Option<Arc<dyn CommerceStore>>,
    authorizer: Arc<dyn Authorizer>,
    nonces: NonceIssuer,
    config: ExportConfig,
}

impl ExportService {
    #[must_use]
    pub fn new(
        store: Arc<dyn ContentStore>,
        commerce: Option<Arc<dyn CommerceStore>>,
        authorizer: Arc<dyn Authorizer>,
        nonces: NonceIssuer,
        config: ExportConfig,
    ) -> Self {
        Self {
            store,
            commerce,
            authorizer,
            nonces,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    #[must_use]
    pub fn nonces(&self) -> &NonceIssuer {
        &self.nonces
    }

    #[must_use]
    pub fn authorizer(&self) -> &dyn Authorizer {
        self.authorizer.as_ref()
    }

    /// Gateway serving this service's reports under the same authorization.
    #[must_use]
    pub fn download_gateway(&self) -> DownloadGateway {
        DownloadGateway::new(
            self.config.report_dir.clone(),
            Arc::clone(&self.authorizer),
            self.nonces.clone(),
        )
    }

    /// Whether commerce images can be scanned.
    #[must_use]
    pub fn has_commerce(&self) -> bool {
        self.commerce.is_some()
    }

    /// Run an export now.
    ///
    /// # Errors
    ///
    /// See [`ExportService::run_at`].
    pub fn run(&self, request: &ExportRequest) -> Result<ExportSummary, ExportError> {
        self.run_at(request, Local::now().naive_local(), Utc::now())
    }

    /// Run an export as if started at `local_time` (report name) / `utc_time` (token checks).
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Authorization`] before any work if the caller lacks
    /// the capability or the token does not verify, and
    /// [`ExportError::UnexpectedScan`] if a source listing or the report write fails.
    pub fn run_at(
        &self,
        request: &ExportRequest,
        local_time: NaiveDateTime,
        utc_time: DateTime<Utc>,
    ) -> Result<ExportSummary, ExportError> {
        self.authorize(request, utc_time)?;

        let scanner = AltTextScanner::new(self.store.as_ref(), self.commerce.as_deref());
        if request.options.include_commerce_images && !scanner.has_commerce() {
            info!("commerce images requested but no commerce store is configured");
        }
        let findings = scanner
            .scan(&request.options)
            .map_err(|e| ExportError::UnexpectedScan(e.into()))?;

        let builder = ReportBuilder::from_config(&self.config);
        let report = builder
            .write(&findings, local_time)
            .map_err(ExportError::UnexpectedScan)?;

        if self.config.keep_working_copy
            && let Err(err) = builder.write_working_copy(&report, local_time)
        {
            // The canonical report is already on disk; the copy is secondary.
            warn!(error = %format!("{err:#}"), "failed to write working copy");
        }

        let count = findings.len();
        let download_url = (count > 0).then(|| {
            let token = self.nonces.issue_at(NonceAction::Download, &request.caller, utc_time);
            format!("{}&nonce={token}", report.url)
        });

        info!(
            count,
            report = %report.path.display(),
            media = request.options.include_media_library,
            content = request.options.include_content_images,
            commerce = request.options.include_commerce_images,
            batch_size = request.options.batch_size,
            "export complete"
        );

        Ok(ExportSummary {
            count,
            message: summary_message(count, download_url.as_deref()),
            download_url,
            report,
        })
    }

    /// Run an export and wrap the outcome in the JSON envelope.
    ///
    /// Never fails: unexpected errors are logged and reported generically.
    #[must_use]
    pub fn respond(&self, request: &ExportRequest) -> ExportResponse {
        let result = self.run(request);
        if let Err(err) = &result {
            log_export_failure(err, &request.caller);
        }
        ExportResponse::from_result(&result)
    }

    fn authorize(&self, request: &ExportRequest, now: DateTime<Utc>) -> Result<(), ExportError> {
        if !self
            .nonces
            .verify_at(&request.nonce, NonceAction::Export, &request.caller, now)
        {
            return Err(AuthorizationFailure::InvalidNonce.into());
        }
        if !self
            .authorizer
            .has_capability(&request.caller, Capability::ManageOptions)
        {
            return Err(AuthorizationFailure::MissingCapability.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> ExportForm {
        let body = pairs
            .iter()
            .map(|(k, v)| format!("\"{k}\": \"{v}\""))
            .collect::<Vec<_>>()
            .join(",");
        serde_json::from_str(&format!("{{{body}}}")).unwrap()
    }

    #[test]
    fn test_form_checkboxes_require_exact_one() {
        let opts = form(&[
            ("include_media_library", "1"),
            ("include_content_images", "on"),
            ("include_commerce_images", "0"),
        ])
        .options();
        assert!(opts.include_media_library);
        assert!(!opts.include_content_images);
        assert!(!opts.include_commerce_images);
    }

    #[test]
    fn test_form_accepts_legacy_field_names() {
        let f = form(&[
            ("include_post_content", "1"),
            ("include_woo_products", "1"),
            ("natf_nonce", "abc"),
        ]);
        let opts = f.options();
        assert!(!opts.include_media_library);
        assert!(opts.include_content_images);
        assert!(opts.include_commerce_images);
        assert_eq!(f.into_request(Caller::new("s")).nonce, "abc");
    }

    #[test]
    fn test_form_batch_size_parsing() {
        assert_eq!(form(&[("batch_size", "250")]).options().batch_size, 250);
        assert_eq!(form(&[("batch_size", "0")]).options().batch_size, 0);
        assert_eq!(form(&[("batch_size", "lots")]).options().batch_size, 100);
        assert_eq!(form(&[("batch_size", "-5")]).options().batch_size, 100);
        assert_eq!(form(&[]).options().batch_size, 100);
    }

    #[test]
    fn test_summary_message_branches() {
        assert_eq!(
            summary_message(0, None),
            "Great news! No images without alt text were found."
        );
        assert_eq!(summary_message(1, None), "Found 1 image without alt text.");
        let msg = summary_message(2, Some("https://x/dl?file=a.csv"));
        assert!(msg.starts_with("Found 2 images without alt text."));
        assert!(msg.contains("href=\"https://x/dl?file=a.csv\""));
    }

    #[test]
    fn test_summary_link_is_html_escaped() {
        let msg = summary_message(1, Some("https://x/dl?file=a.csv&nonce=abc"));
        assert!(msg.contains("href=\"https://x/dl?file=a.csv&amp;nonce=abc\""));
        assert!(!msg.contains("&nonce="));

        let msg = summary_message(3, Some("https://x/\"><script>?file=a.csv"));
        assert!(msg.contains("href=\"https://x/&quot;&gt;&lt;script&gt;?file=a.csv\""));
        assert!(!msg.contains("<script>"));
    }

    #[test]
    fn test_response_envelope_shape() {
        let err: Result<ExportSummary, ExportError> =
            Err(AuthorizationFailure::InvalidNonce.into());
        let response = ExportResponse::from_result(&err);
        assert_eq!(response.failure, Some(ErrorKind::Authorization));
        let json = serde_json::to_value(response).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"success": false, "data": {"message": "Security check failed."}})
        );
    }
}
