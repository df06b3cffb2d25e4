//! Content store boundary.
//!
//! The scanner never talks to a database directly. It consumes the narrow,
//! read-only query surface below, which a host application implements over
//! its own records. [`crate::snapshot::SiteSnapshot`] is the in-memory
//! implementation used by the CLI and the tests.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Attribute key holding an attachment's alt text.
pub const ALT_TEXT_ATTRIBUTE: &str = "_wp_attachment_image_alt";

/// MIME filter used when listing media-library attachments.
pub const IMAGE_MIME_FILTER: &str = "image";

/// Identifier of a record in the content store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RecordId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Publication status used to filter record queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    /// Published post, page or product.
    #[default]
    Publish,
    /// Attachments inherit the status of their parent.
    Inherit,
    Draft,
    Private,
}

/// Kind of rich-text content record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    #[default]
    Post,
    Page,
}

/// Failure reading a single record from the store.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The record does not exist (deleted between listing and reading, bad id).
    #[error("record {0} not found")]
    RecordNotFound(RecordId),
    /// Any other backend failure.
    #[error("content store error: {0}")]
    Backend(String),
}

/// Read-only accessor over media and content records.
pub trait ContentStore: Send + Sync {
    /// List attachment ids whose MIME type starts with `mime_filter`, in store order.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing itself cannot be produced.
    fn query_attachments(
        &self,
        mime_filter: &str,
        status: RecordStatus,
        limit: usize,
    ) -> Result<Vec<RecordId>, StoreError>;

    /// Read a string attribute of a record. `Ok(None)` means the attribute is not set.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read.
    fn get_attribute(&self, id: RecordId, key: &str) -> Result<Option<String>, StoreError>;

    /// Public URL of an attachment.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read.
    fn resolve_url(&self, id: RecordId) -> Result<String, StoreError>;

    /// Human title of any record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read.
    fn get_title(&self, id: RecordId) -> Result<String, StoreError>;

    /// Record this one is attached to, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read.
    fn get_parent(&self, id: RecordId) -> Result<Option<RecordId>, StoreError>;

    /// Locator an operator can follow to edit the record. May be empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read.
    fn edit_locator_for(&self, id: RecordId) -> Result<String, StoreError>;

    /// List content records of the given kinds, in store order.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing itself cannot be produced.
    fn query_content_records(
        &self,
        kinds: &[ContentKind],
        status: RecordStatus,
        limit: usize,
    ) -> Result<Vec<RecordId>, StoreError>;

    /// Markup body of a content record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read.
    fn get_rendered_content(&self, id: RecordId) -> Result<String, StoreError>;

    /// Map an image URL back to the attachment that serves it.
    fn url_to_record_id(&self, url: &str) -> Option<RecordId>;
}

/// Product entity resolved by a [`CommerceStore`].
pub trait ProductHandle {
    fn featured_image_id(&self) -> Option<RecordId>;
    fn gallery_image_ids(&self) -> Vec<RecordId>;
    fn name(&self) -> String;
}

/// Optional commerce extension providing products with featured and gallery images.
pub trait CommerceStore: Send + Sync {
    /// List product ids in store order.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing itself cannot be produced.
    fn query_products(&self, status: RecordStatus, limit: usize)
    -> Result<Vec<RecordId>, StoreError>;

    /// Resolve a product entity. `Ok(None)` means the id is not a usable product.
    ///
    /// # Errors
    ///
    /// Returns an error if the product cannot be loaded.
    fn load_product(&self, id: RecordId) -> Result<Option<Box<dyn ProductHandle>>, StoreError>;
}
