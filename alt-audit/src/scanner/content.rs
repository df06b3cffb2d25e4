//! Inline image scanner for post and page content.
//!
//! Content is scanned as text: a regex finds `<img ...>` tags and a second
//! regex tokenizes their attributes. This is not an HTML parser:
//! markup inside comments or scripts is scanned like any other text.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::finding::{Finding, ScanSource};
use crate::scanner::{RecordFailure, fold_records};
use crate::store::{ContentKind, ContentStore, RecordId, RecordStatus, StoreError};

/// Label written for every inline image.
pub const INLINE_IMAGE_LABEL: &str = "Inline image in content";

/// Content kinds whose markup is scanned.
pub const SCANNED_KINDS: &[ContentKind] = &[ContentKind::Post, ContentKind::Page];

/// Opening `<img>` tag, case-insensitive, up to the first `>`.
static IMG_TAG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    match Regex::new(r"(?i)<img\b[^>]*>") {
        Ok(regex) => regex,
        Err(err) => panic!("Invalid img tag regex: {err}"),
    }
});

/// One attribute: name, then an optional double-quoted, single-quoted or bare value.
static ATTRIBUTE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    match Regex::new(concat!(
        r"([A-Za-z_:][-A-Za-z0-9_:.]*)",   // attribute name
        r"(?:\s*=\s*(?:",
        r#""([^"]*)""#,                    // "double quoted"
        r"|'([^']*)'",                     // 'single quoted'
        r"|([^\s'=<>`]+)",                 // bare
        r"))?",
    )) {
        Ok(regex) => regex,
        Err(err) => panic!("Invalid attribute regex: {err}"),
    }
});

/// The attributes of one `<img>` tag that matter for the alt-text check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImgTag<'a> {
    /// Value of `src`, if the attribute is present.
    pub src: Option<&'a str>,
    /// Value of `alt`, if the attribute is present. A bare `alt` is `Some("")`.
    pub alt: Option<&'a str>,
}

impl<'a> ImgTag<'a> {
    /// No `alt` attribute, or one whose value is blank.
    #[must_use]
    pub fn is_missing_alt(&self) -> bool {
        crate::finding::is_missing_alt(self.alt)
    }

    /// Trimmed `src`, or `None` when the image cannot be attributed.
    #[must_use]
    pub fn image_url(&self) -> Option<&'a str> {
        self.src.map(str::trim).filter(|src| !src.is_empty())
    }
}

/// Extract every `<img>` tag from markup, in document order.
#[must_use]
pub fn parse_img_tags(markup: &str) -> Vec<ImgTag<'_>> {
    IMG_TAG_PATTERN
        .find_iter(markup)
        .map(|tag| parse_attributes(tag.as_str()))
        .collect()
}

fn parse_attributes(tag: &str) -> ImgTag<'_> {
    // Skip the "<img" prefix so "img" is not read as an attribute name.
    let body = tag.get(4..).unwrap_or_default();
    let mut parsed = ImgTag {
        src: None,
        alt: None,
    };

    for caps in ATTRIBUTE_PATTERN.captures_iter(body) {
        let Some(name) = caps.get(1) else {
            continue;
        };
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map_or("", |m| m.as_str());

        // First occurrence wins, as in browsers.
        if name.as_str().eq_ignore_ascii_case("src") && parsed.src.is_none() {
            parsed.src = Some(value);
        } else if name.as_str().eq_ignore_ascii_case("alt") && parsed.alt.is_none() {
            parsed.alt = Some(value);
        }
    }
    parsed
}

/// Scan up to `batch_size` published posts and pages.
///
/// # Errors
///
/// Returns an error if the content listing fails.
pub fn scan(store: &dyn ContentStore, batch_size: usize) -> Result<Vec<Finding>, StoreError> {
    let ids = store.query_content_records(SCANNED_KINDS, RecordStatus::Publish, batch_size)?;
    let scanned = ids.len();

    let findings = fold_records(
        ScanSource::ContentImages,
        ids.into_iter()
            .take(batch_size)
            .map(|id| (id, inspect_content(store, id))),
    );

    debug!(scanned, findings = findings.len(), "content images scanned");
    Ok(findings)
}

fn inspect_content(store: &dyn ContentStore, id: RecordId) -> Result<Vec<Finding>, RecordFailure> {
    let markup = store.get_rendered_content(id)?;
    let urls: Vec<&str> = parse_img_tags(&markup)
        .into_iter()
        .filter(ImgTag::is_missing_alt)
        .filter_map(|tag| tag.image_url())
        .collect();

    if urls.is_empty() {
        return Ok(Vec::new());
    }

    let context_label = store.get_title(id)?;
    let edit_locator = store.edit_locator_for(id)?;

    Ok(urls
        .into_iter()
        .map(|url| {
            Finding::new(
                ScanSource::ContentImages,
                store.url_to_record_id(url),
                url.to_owned(),
                INLINE_IMAGE_LABEL.to_owned(),
                context_label.clone(),
                edit_locator.clone(),
            )
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(markup: &str) -> ImgTag<'_> {
        let tags = parse_img_tags(markup);
        assert_eq!(tags.len(), 1, "expected one tag in {markup:?}, got {tags:?}");
        tags[0]
    }

    #[test]
    fn test_img_without_alt_attribute() {
        let tag = single(r#"<p><img src="a.jpg"></p>"#);
        assert!(tag.is_missing_alt());
        assert_eq!(tag.image_url(), Some("a.jpg"));
    }

    #[test]
    fn test_img_with_empty_alt() {
        let tag = single(r#"<img src="b.jpg" alt="">"#);
        assert!(tag.is_missing_alt());
        assert_eq!(tag.image_url(), Some("b.jpg"));
    }

    #[test]
    fn test_img_with_whitespace_alt() {
        let tag = single("<img alt='   ' src='w.png' />");
        assert!(tag.is_missing_alt());
        assert_eq!(tag.image_url(), Some("w.png"));
    }

    #[test]
    fn test_img_with_alt_text() {
        let tag = single(r#"<img src="c.jpg" alt="cat">"#);
        assert!(!tag.is_missing_alt());
    }

    #[test]
    fn test_bare_alt_counts_as_empty() {
        let tag = single(r#"<img alt src="d.jpg">"#);
        assert_eq!(tag.alt, Some(""));
        assert!(tag.is_missing_alt());
    }

    #[test]
    fn test_data_alt_is_not_alt() {
        let tag = single(r#"<img data-alt="caption" src="e.jpg">"#);
        assert_eq!(tag.alt, None);
        assert!(tag.is_missing_alt());
    }

    #[test]
    fn test_alt_inside_other_attribute_value_is_ignored() {
        let tag = single(r#"<img title="alt=fake" src="f.jpg">"#);
        assert_eq!(tag.alt, None);
    }

    #[test]
    fn test_uppercase_tag_and_attributes() {
        let tag = single(r#"<IMG SRC="G.JPG" ALT="Logo">"#);
        assert_eq!(tag.src, Some("G.JPG"));
        assert!(!tag.is_missing_alt());
    }

    #[test]
    fn test_unquoted_values() {
        let tag = single("<img src=h.jpg alt=horse>");
        assert_eq!(tag.src, Some("h.jpg"));
        assert_eq!(tag.alt, Some("horse"));
    }

    #[test]
    fn test_missing_src_cannot_be_attributed() {
        let tag = single(r#"<img alt="">"#);
        assert!(tag.is_missing_alt());
        assert_eq!(tag.image_url(), None);

        let tag = single(r#"<img src="  " alt="">"#);
        assert_eq!(tag.image_url(), None);
    }

    #[test]
    fn test_multiline_tag_and_document_order() {
        let markup = "<img\n  src=\"one.jpg\"\n  alt=\"\"><span>x</span><img src=\"two.jpg\">";
        let tags = parse_img_tags(markup);
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].src, Some("one.jpg"));
        assert_eq!(tags[1].src, Some("two.jpg"));
    }

    #[test]
    fn test_non_img_tags_are_ignored() {
        assert!(parse_img_tags(r#"<imgur src="x"><picture><source srcset="a.jpg"></picture>"#).is_empty());
    }
}
