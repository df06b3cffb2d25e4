//! # alt-audit
//!
//! Finds images that lack alternative text and exports them as a CSV report.
//!
//! The crate separates the **scanners** (media library, inline content images,
//! commerce product images) from the **record stores** they read through
//! ([`ContentStore`], [`CommerceStore`]), and from the request-scoped
//! [`ExportService`] that authorizes a caller, runs the scan and writes the
//! report. Reports are served back through the [`DownloadGateway`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use alt_audit::{
//!     Caller, ExportConfig, ExportRequest, ExportService, NonceAction, NonceIssuer,
//!     ScanOptions, SiteSnapshot, StaticAuthorizer,
//! };
//!
//! let snapshot = Arc::new(SiteSnapshot::load(Path::new("site.yaml")).unwrap());
//! let caller = Caller::new("admin");
//! let nonces = NonceIssuer::new("server-secret");
//! let service = ExportService::new(
//!     snapshot.clone(),
//!     Some(snapshot),
//!     Arc::new(StaticAuthorizer::new(["admin"])),
//!     nonces.clone(),
//!     ExportConfig::new("reports", "https://example.com/download"),
//! );
//!
//! let request = ExportRequest {
//!     options: ScanOptions::default(),
//!     nonce: nonces.issue(NonceAction::Export, &caller),
//!     caller,
//! };
//! let summary = service.run(&request).unwrap();
//! println!("{}", summary.message);
//! ```

mod auth;
mod config;
mod error;
mod export;
mod finding;
mod gateway;
pub mod output;
mod report;
pub mod scanner;
mod snapshot;
mod store;

pub use auth::{Authorizer, Caller, Capability, NonceAction, NonceIssuer, StaticAuthorizer};
pub use config::{BATCH_SIZE_CHOICES, DEFAULT_BATCH_SIZE, ExportConfig, ScanOptions};
pub use error::{AuthorizationFailure, ErrorKind, ExportError};
pub use export::{
    ExportForm, ExportRequest, ExportResponse, ExportService, ExportSummary, ResponseData,
    log_export_failure, summary_message,
};
pub use finding::{Finding, INLINE_IMAGE_ID, ScanSource, UNATTACHED_CONTEXT, is_missing_alt};
pub use gateway::{Download, DownloadGateway, DownloadRequest, sanitize_file_name};
pub use report::{
    GUARD_FILES, REPORT_HEADER, REPORT_PREFIX, ReportBuilder, ReportFile, is_report_filename,
    report_filename,
};
pub use scanner::AltTextScanner;
pub use snapshot::{AttachmentRecord, ContentRecord, ProductRecord, SiteSnapshot};
pub use store::{
    ALT_TEXT_ATTRIBUTE, CommerceStore, ContentKind, ContentStore, IMAGE_MIME_FILTER,
    ProductHandle, RecordId, RecordStatus, StoreError,
};
