//! In-memory content store loaded from a site snapshot file.
//!
//! A snapshot is a JSON or YAML document listing attachments, posts/pages and
//! (optionally) products. The `products` key doubles as the commerce extension
//! switch: when it is absent the snapshot exposes no [`CommerceStore`].
//!
//! ```yaml
//! edit_base_url: https://example.com/wp-admin/post.php
//! attachments:
//!   - { id: 10, title: Dog, url: https://example.com/dog.jpg, alt: "dog" }
//! content:
//!   - { id: 1, kind: post, title: Hello, content: '<img src="a.jpg">' }
//! products:
//!   - { id: 50, name: Mug, featured_image: 10, gallery: [11] }
//! ```

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::scanner::commerce::StaticProduct;
use crate::store::{
    ALT_TEXT_ATTRIBUTE, CommerceStore, ContentKind, ContentStore, ProductHandle, RecordId,
    RecordStatus, StoreError,
};

fn default_attachment_status() -> RecordStatus {
    RecordStatus::Inherit
}

fn default_mime_type() -> String {
    "image/jpeg".to_owned()
}

/// A media-library attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRecord {
    pub id: RecordId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_mime_type")]
    pub mime_type: String,
    #[serde(default = "default_attachment_status")]
    pub status: RecordStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

/// A post or page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: RecordId,
    #[serde(default)]
    pub kind: ContentKind,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: RecordStatus,
    #[serde(default)]
    pub content: String,
}

/// A commerce product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: RecordId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: RecordStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub featured_image: Option<RecordId>,
    #[serde(default)]
    pub gallery: Vec<RecordId>,
}

/// Snapshot of a site's records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteSnapshot {
    /// Edit locators are `<edit_base_url>?post=<id>&action=edit`. Empty disables them.
    #[serde(default)]
    pub edit_base_url: String,
    #[serde(default)]
    pub attachments: Vec<AttachmentRecord>,
    #[serde(default)]
    pub content: Vec<ContentRecord>,
    /// `None` means the commerce extension is not installed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub products: Option<Vec<ProductRecord>>,
}

impl SiteSnapshot {
    /// Load a snapshot, choosing the parser from the file extension
    /// (`.yaml`/`.yml` for YAML, anything else is read as JSON).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Self::from_yaml(&text)
                .with_context(|| format!("Invalid YAML snapshot {}", path.display())),
            _ => Self::from_json(&text)
                .with_context(|| format!("Invalid JSON snapshot {}", path.display())),
        }
    }

    /// # Errors
    ///
    /// Returns an error if `text` is not a valid JSON snapshot.
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// # Errors
    ///
    /// Returns an error if `text` is not a valid YAML snapshot.
    pub fn from_yaml(text: &str) -> anyhow::Result<Self> {
        serde_saphyr::from_str(text).map_err(|e| anyhow::anyhow!("{e}"))
    }

    /// Whether the snapshot carries a commerce extension.
    #[must_use]
    pub fn has_commerce(&self) -> bool {
        self.products.is_some()
    }

    fn attachment(&self, id: RecordId) -> Result<&AttachmentRecord, StoreError> {
        self.attachments
            .iter()
            .find(|a| a.id == id)
            .ok_or(StoreError::RecordNotFound(id))
    }

    fn title_of(&self, id: RecordId) -> Option<&str> {
        if let Some(a) = self.attachments.iter().find(|a| a.id == id) {
            return Some(&a.title);
        }
        if let Some(c) = self.content.iter().find(|c| c.id == id) {
            return Some(&c.title);
        }
        self.products
            .iter()
            .flatten()
            .find(|p| p.id == id)
            .map(|p| p.name.as_str())
    }

    fn exists(&self, id: RecordId) -> bool {
        self.title_of(id).is_some()
    }
}

impl ContentStore for SiteSnapshot {
    fn query_attachments(
        &self,
        mime_filter: &str,
        status: RecordStatus,
        limit: usize,
    ) -> Result<Vec<RecordId>, StoreError> {
        Ok(self
            .attachments
            .iter()
            .filter(|a| a.status == status && a.mime_type.starts_with(mime_filter))
            .take(limit)
            .map(|a| a.id)
            .collect())
    }

    fn get_attribute(&self, id: RecordId, key: &str) -> Result<Option<String>, StoreError> {
        let attachment = self.attachment(id)?;
        if key == ALT_TEXT_ATTRIBUTE {
            Ok(attachment.alt.clone())
        } else {
            Ok(None)
        }
    }

    fn resolve_url(&self, id: RecordId) -> Result<String, StoreError> {
        Ok(self.attachment(id)?.url.clone())
    }

    fn get_title(&self, id: RecordId) -> Result<String, StoreError> {
        self.title_of(id)
            .map(ToOwned::to_owned)
            .ok_or(StoreError::RecordNotFound(id))
    }

    fn get_parent(&self, id: RecordId) -> Result<Option<RecordId>, StoreError> {
        Ok(self.attachment(id)?.parent)
    }

    fn edit_locator_for(&self, id: RecordId) -> Result<String, StoreError> {
        if !self.exists(id) {
            return Err(StoreError::RecordNotFound(id));
        }
        if self.edit_base_url.is_empty() {
            return Ok(String::new());
        }
        Ok(format!("{}?post={id}&action=edit", self.edit_base_url))
    }

    fn query_content_records(
        &self,
        kinds: &[ContentKind],
        status: RecordStatus,
        limit: usize,
    ) -> Result<Vec<RecordId>, StoreError> {
        Ok(self
            .content
            .iter()
            .filter(|c| c.status == status && kinds.contains(&c.kind))
            .take(limit)
            .map(|c| c.id)
            .collect())
    }

    fn get_rendered_content(&self, id: RecordId) -> Result<String, StoreError> {
        self.content
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.content.clone())
            .ok_or(StoreError::RecordNotFound(id))
    }

    fn url_to_record_id(&self, url: &str) -> Option<RecordId> {
        // Query strings and fragments do not change which file is served.
        let bare = url.split(['?', '#']).next().unwrap_or(url);
        if bare.is_empty() {
            return None;
        }
        self.attachments
            .iter()
            .find(|a| a.url == bare)
            .map(|a| a.id)
    }
}

impl CommerceStore for SiteSnapshot {
    fn query_products(
        &self,
        status: RecordStatus,
        limit: usize,
    ) -> Result<Vec<RecordId>, StoreError> {
        let Some(products) = &self.products else {
            return Ok(Vec::new());
        };
        Ok(products
            .iter()
            .filter(|p| p.status == status)
            .take(limit)
            .map(|p| p.id)
            .collect())
    }

    fn load_product(&self, id: RecordId) -> Result<Option<Box<dyn ProductHandle>>, StoreError> {
        Ok(self.products.iter().flatten().find(|p| p.id == id).map(|p| {
            Box::new(StaticProduct {
                name: p.name.clone(),
                featured_image: p.featured_image,
                gallery: p.gallery.clone(),
            }) as Box<dyn ProductHandle>
        }))
    }
}
