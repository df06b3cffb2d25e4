//! Media-library scanner.

use tracing::debug;

use crate::finding::{Finding, ScanSource, UNATTACHED_CONTEXT};
use crate::scanner::{RecordFailure, attachment_missing_alt, attachment_url, fold_records};
use crate::store::{ContentStore, IMAGE_MIME_FILTER, RecordId, RecordStatus, StoreError};

/// Scan up to `batch_size` image attachments.
///
/// # Errors
///
/// Returns an error if the attachment listing fails.
pub fn scan(store: &dyn ContentStore, batch_size: usize) -> Result<Vec<Finding>, StoreError> {
    let ids = store.query_attachments(IMAGE_MIME_FILTER, RecordStatus::Inherit, batch_size)?;
    let scanned = ids.len();

    let findings = fold_records(
        ScanSource::MediaLibrary,
        ids.into_iter()
            .take(batch_size)
            .map(|id| (id, inspect_attachment(store, id))),
    );

    debug!(scanned, findings = findings.len(), "media library scanned");
    Ok(findings)
}

fn inspect_attachment(store: &dyn ContentStore, id: RecordId) -> Result<Vec<Finding>, RecordFailure> {
    if !attachment_missing_alt(store, id)? {
        return Ok(Vec::new());
    }

    let image_url = attachment_url(store, id)?;
    let image_label = store.get_title(id)?;
    let context_label = match store.get_parent(id)? {
        Some(parent) => store.get_title(parent)?,
        None => UNATTACHED_CONTEXT.to_owned(),
    };
    let edit_locator = store.edit_locator_for(id)?;

    Ok(vec![Finding::new(
        ScanSource::MediaLibrary,
        Some(id),
        image_url,
        image_label,
        context_label,
        edit_locator,
    )])
}
