//! Report rows.

use serde::Serialize;

use crate::store::RecordId;

/// CSV value written for images that do not resolve to a media record.
pub const INLINE_IMAGE_ID: &str = "N/A (Inline)";

/// Context label for media records with no parent.
pub const UNATTACHED_CONTEXT: &str = "None";

/// Which scanner produced a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanSource {
    MediaLibrary,
    ContentImages,
    CommerceImages,
}

/// One image lacking usable alt text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub struct Finding {
    /// Media record backing the image; `None` for inline-only images.
    pub image_id: Option<RecordId>,
    /// Source URL of the image. Never empty.
    pub image_url: String,
    /// Record title or a fixed descriptor.
    pub image_label: String,
    /// Title of the owning post, page or product, or [`UNATTACHED_CONTEXT`].
    pub context_label: String,
    /// Where an operator fixes the image. May be empty.
    pub edit_locator: String,
    pub source: ScanSource,
}

impl Finding {
    #[must_use]
    pub fn new(
        source: ScanSource,
        image_id: Option<RecordId>,
        image_url: String,
        image_label: String,
        context_label: String,
        edit_locator: String,
    ) -> Self {
        Self {
            image_id,
            image_url,
            image_label,
            context_label,
            edit_locator,
            source,
        }
    }

    /// The five CSV fields, in header order.
    #[must_use]
    pub fn to_record(&self) -> [String; 5] {
        [
            self.image_id
                .map_or_else(|| INLINE_IMAGE_ID.to_owned(), |id| id.to_string()),
            self.image_url.clone(),
            self.image_label.clone(),
            self.context_label.clone(),
            self.edit_locator.clone(),
        ]
    }
}

/// Alt text counts as missing when absent or blank after trimming.
#[must_use]
pub fn is_missing_alt(alt: Option<&str>) -> bool {
    alt.is_none_or(|text| text.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_alt_rules() {
        assert!(is_missing_alt(None));
        assert!(is_missing_alt(Some("")));
        assert!(is_missing_alt(Some("  \t\n")));
        assert!(!is_missing_alt(Some("dog")));
        assert!(!is_missing_alt(Some("  dog  ")));
    }

    #[test]
    fn test_inline_finding_uses_sentinel_id() {
        let finding = Finding::new(
            ScanSource::ContentImages,
            None,
            "a.jpg".to_owned(),
            "Inline image in content".to_owned(),
            "Hello".to_owned(),
            String::new(),
        );
        let record = finding.to_record();
        assert_eq!(record[0], INLINE_IMAGE_ID);
        assert_eq!(record[1], "a.jpg");
        assert_eq!(record[4], "");
    }
}
