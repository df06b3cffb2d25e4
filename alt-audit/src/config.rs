//! Configuration types for alt-text exports.
//!
//! Split into per-request scan options (what to look at) and service-level
//! export config (where reports go). Request options never carry filesystem
//! concerns.

use std::path::PathBuf;

/// Batch size used when a request does not name a usable one.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Batch sizes offered by the admin form.
pub const BATCH_SIZE_CHOICES: &[usize] = &[50, 100, 250, 500];

/// Per-request scan options.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct ScanOptions {
    /// Scan standalone media-library records.
    pub include_media_library: bool,
    /// Scan inline `<img>` tags inside post and page content.
    pub include_content_images: bool,
    /// Scan product featured and gallery images (ignored without a commerce store).
    pub include_commerce_images: bool,
    /// Maximum records fetched per source. `0` scans nothing.
    pub batch_size: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            include_media_library: true,
            include_content_images: true,
            include_commerce_images: true,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl ScanOptions {
    /// Options with every source disabled; enable the ones you need.
    #[must_use]
    pub fn none(batch_size: usize) -> Self {
        Self {
            include_media_library: false,
            include_content_images: false,
            include_commerce_images: false,
            batch_size,
        }
    }

    #[must_use]
    pub fn with_media_library(mut self, enabled: bool) -> Self {
        self.include_media_library = enabled;
        self
    }

    #[must_use]
    pub fn with_content_images(mut self, enabled: bool) -> Self {
        self.include_content_images = enabled;
        self
    }

    #[must_use]
    pub fn with_commerce_images(mut self, enabled: bool) -> Self {
        self.include_commerce_images = enabled;
        self
    }
}

/// Service-level export configuration.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ExportConfig {
    /// Directory that receives report files. Must not be publicly indexed.
    pub report_dir: PathBuf,
    /// Base URL of the download endpoint; `?file=<name>` is appended.
    pub download_base_url: String,
    /// Also write a `temp-<hash>.csv` copy of every report.
    pub keep_working_copy: bool,
}

impl ExportConfig {
    #[must_use]
    pub fn new(report_dir: impl Into<PathBuf>, download_base_url: impl Into<String>) -> Self {
        Self {
            report_dir: report_dir.into(),
            download_base_url: download_base_url.into(),
            keep_working_copy: true,
        }
    }

    #[must_use]
    pub fn with_working_copy(mut self, keep: bool) -> Self {
        self.keep_working_copy = keep;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_match_admin_form() {
        let opts = ScanOptions::default();
        assert!(opts.include_media_library);
        assert!(opts.include_content_images);
        assert!(opts.include_commerce_images);
        assert_eq!(opts.batch_size, 100);
        assert!(BATCH_SIZE_CHOICES.contains(&opts.batch_size));
    }

    #[test]
    fn test_builder_toggles_sources() {
        let opts = ScanOptions::none(50).with_media_library(true);
        assert!(opts.include_media_library);
        assert!(!opts.include_content_images);
        assert!(!opts.include_commerce_images);
        assert_eq!(opts.batch_size, 50);
    }
}
