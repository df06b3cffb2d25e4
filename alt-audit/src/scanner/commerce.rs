//! Product image scanner for the optional commerce extension.

use std::fmt;

use tracing::{debug, warn};

use crate::finding::{Finding, ScanSource};
use crate::scanner::{RecordFailure, attachment_missing_alt, attachment_url, fold_records};
use crate::store::{CommerceStore, ContentStore, ProductHandle, RecordId, RecordStatus, StoreError};

/// Role an image plays on a product page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRole {
    Featured,
    Gallery,
}

impl fmt::Display for ImageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Featured => write!(f, "Featured"),
            Self::Gallery => write!(f, "Gallery"),
        }
    }
}

/// Scan up to `batch_size` published products.
///
/// # Errors
///
/// Returns an error if the product listing fails.
pub fn scan(
    store: &dyn ContentStore,
    commerce: &dyn CommerceStore,
    batch_size: usize,
) -> Result<Vec<Finding>, StoreError> {
    let ids = commerce.query_products(RecordStatus::Publish, batch_size)?;
    let scanned = ids.len();

    let findings = fold_records(
        ScanSource::CommerceImages,
        ids.into_iter()
            .take(batch_size)
            .map(|id| (id, inspect_product(store, commerce, id))),
    );

    debug!(scanned, findings = findings.len(), "commerce images scanned");
    Ok(findings)
}

fn inspect_product(
    store: &dyn ContentStore,
    commerce: &dyn CommerceStore,
    id: RecordId,
) -> Result<Vec<Finding>, RecordFailure> {
    let product = commerce
        .load_product(id)?
        .ok_or(RecordFailure::UnresolvedProduct)?;
    let product_name = product.name();

    let images = product
        .featured_image_id()
        .map(|image| (image, ImageRole::Featured))
        .into_iter()
        .chain(
            product
                .gallery_image_ids()
                .into_iter()
                .map(|image| (image, ImageRole::Gallery)),
        );

    // A broken image must not hide the product's other images.
    let mut findings = Vec::new();
    for (image, role) in images {
        match inspect_image(store, image, role, &product_name) {
            Ok(Some(finding)) => findings.push(finding),
            Ok(None) => {}
            Err(err) => {
                warn!(product = %id, image = %image, %role, error = %err, "skipping product image");
            }
        }
    }
    Ok(findings)
}

fn inspect_image(
    store: &dyn ContentStore,
    image: RecordId,
    role: ImageRole,
    product_name: &str,
) -> Result<Option<Finding>, RecordFailure> {
    if !attachment_missing_alt(store, image)? {
        return Ok(None);
    }

    let image_url = attachment_url(store, image)?;
    let title = store.get_title(image)?;
    let edit_locator = store.edit_locator_for(image)?;

    Ok(Some(Finding::new(
        ScanSource::CommerceImages,
        Some(image),
        image_url,
        format!("{title} ({role})"),
        product_name.to_owned(),
        edit_locator,
    )))
}

/// Product handle backed by plain values, for stores that resolve products eagerly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticProduct {
    pub name: String,
    pub featured_image: Option<RecordId>,
    pub gallery: Vec<RecordId>,
}

impl ProductHandle for StaticProduct {
    fn featured_image_id(&self) -> Option<RecordId> {
        self.featured_image
    }

    fn gallery_image_ids(&self) -> Vec<RecordId> {
        self.gallery.clone()
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_suffixes() {
        assert_eq!(ImageRole::Featured.to_string(), "Featured");
        assert_eq!(ImageRole::Gallery.to_string(), "Gallery");
    }

    #[test]
    fn test_static_product_handle() {
        let product = StaticProduct {
            name: "Mug".to_owned(),
            featured_image: Some(RecordId(7)),
            gallery: vec![RecordId(8), RecordId(9)],
        };
        let handle: &dyn ProductHandle = &product;
        assert_eq!(handle.name(), "Mug");
        assert_eq!(handle.featured_image_id(), Some(RecordId(7)));
        assert_eq!(handle.gallery_image_ids(), vec![RecordId(8), RecordId(9)]);
    }
}
