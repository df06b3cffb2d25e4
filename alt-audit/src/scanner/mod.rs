//! Alt-text scanners.
//!
//! Each sub-module handles one record source:
//! - `media`: media-library attachments
//! - `content`: inline `<img>` tags in published posts and pages
//! - `commerce`: product featured and gallery images
//!
//! Every source fetches at most `batch_size` records. A record that fails to
//! load is logged and skipped; only a failed listing query aborts a source.

pub mod commerce;
pub mod content;
pub mod media;

use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ScanOptions;
use crate::finding::{Finding, ScanSource, is_missing_alt};
use crate::store::{ALT_TEXT_ATTRIBUTE, CommerceStore, ContentStore, RecordId, StoreError};

/// Why a single record produced no findings.
#[derive(Debug, Error)]
pub(crate) enum RecordFailure {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("image has no resolvable URL")]
    EmptyUrl,
    #[error("product could not be resolved")]
    UnresolvedProduct,
}

/// Scans the enabled sources of one content store.
pub struct AltTextScanner<'a> {
    store: &'a dyn ContentStore,
    commerce: Option<&'a dyn CommerceStore>,
}

impl<'a> AltTextScanner<'a> {
    #[must_use]
    pub fn new(store: &'a dyn ContentStore, commerce: Option<&'a dyn CommerceStore>) -> Self {
        Self { store, commerce }
    }

    /// Whether the commerce extension is available.
    #[must_use]
    pub fn has_commerce(&self) -> bool {
        self.commerce.is_some()
    }

    /// Run every enabled source and concatenate the findings.
    ///
    /// Order is always media library, content images, commerce images.
    ///
    /// # Errors
    ///
    /// Returns an error if a source's listing query fails.
    pub fn scan(&self, options: &ScanOptions) -> Result<Vec<Finding>, StoreError> {
        let mut findings = Vec::new();
        if options.include_media_library {
            findings.extend(self.scan_media_library(options.batch_size)?);
        }
        if options.include_content_images {
            findings.extend(self.scan_content_images(options.batch_size)?);
        }
        if options.include_commerce_images {
            findings.extend(self.scan_commerce_images(options.batch_size)?);
        }
        Ok(findings)
    }

    /// Media-library attachments with missing alt text.
    ///
    /// # Errors
    ///
    /// Returns an error if the attachment listing fails.
    pub fn scan_media_library(&self, batch_size: usize) -> Result<Vec<Finding>, StoreError> {
        media::scan(self.store, batch_size)
    }

    /// Inline images with missing alt text in published posts and pages.
    ///
    /// # Errors
    ///
    /// Returns an error if the content listing fails.
    pub fn scan_content_images(&self, batch_size: usize) -> Result<Vec<Finding>, StoreError> {
        content::scan(self.store, batch_size)
    }

    /// Product images with missing alt text. Empty without a commerce store.
    ///
    /// # Errors
    ///
    /// Returns an error if the product listing fails.
    pub fn scan_commerce_images(&self, batch_size: usize) -> Result<Vec<Finding>, StoreError> {
        match self.commerce {
            Some(commerce) => commerce::scan(self.store, commerce, batch_size),
            None => {
                debug!("commerce store not configured; skipping product images");
                Ok(Vec::new())
            }
        }
    }
}

/// Fold per-record results into one list, logging and dropping failures.
pub(crate) fn fold_records<I>(source: ScanSource, results: I) -> Vec<Finding>
where
    I: IntoIterator<Item = (RecordId, Result<Vec<Finding>, RecordFailure>)>,
{
    results
        .into_iter()
        .fold(Vec::new(), |mut acc, (id, result)| {
            match result {
                Ok(findings) => acc.extend(findings),
                Err(err) => warn!(record = %id, ?source, error = %err, "skipping record"),
            }
            acc
        })
}

/// Alt-text test shared by the media and commerce paths.
pub(crate) fn attachment_missing_alt(
    store: &dyn ContentStore,
    id: RecordId,
) -> Result<bool, StoreError> {
    let alt = store.get_attribute(id, ALT_TEXT_ATTRIBUTE)?;
    Ok(is_missing_alt(alt.as_deref()))
}

/// Resolve an attachment URL, rejecting empty ones.
pub(crate) fn attachment_url(
    store: &dyn ContentStore,
    id: RecordId,
) -> Result<String, RecordFailure> {
    let url = store.resolve_url(id)?;
    if url.trim().is_empty() {
        return Err(RecordFailure::EmptyUrl);
    }
    Ok(url)
}
