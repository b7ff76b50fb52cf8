//! Best-effort URL extraction from Postimages HTML.
//!
//! The upload form answers with an HTML page rather than a structured payload, so the relay
//! pattern-matches the body against the URL shapes the site is known to emit. The strategies run
//! in a fixed order and the first match wins; reordering them changes observable behavior for
//! bodies that contain more than one shape, so the order is part of the contract:
//!
//! 1. direct image URL on the `i.postimg.cc` CDN,
//! 2. direct image URL on a numbered legacy CDN host (`s12.postimg.org`),
//! 3. URL on the `postimg.cc` page-link domain,
//! 4. the content of an `og:image` meta tag.
//!
//! Matching is case-insensitive and unanchored. There is no external contract version behind any
//! of this; when the site changes its markup the patterns degrade to extraction failures, never
//! to wrong URLs.

use once_cell::sync::Lazy;
use regex::Regex;

static DIRECT_CDN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)https?://i\.postimg\.cc/[^\s"'<>)]+"#).unwrap());

static LEGACY_CDN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)https?://s\d+\.postimg\.org/[^\s"'<>)]+"#).unwrap());

static PAGE_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)https?://postimg\.cc/[^\s"'<>)]+"#).unwrap());

static OG_IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<meta property=["']og:image["'] content=["']([^"']+)["']"#).unwrap());

/// A URL recovered from an upstream response body.
///
/// The distinction drives the relay's secondary fetch: a page link points at HTML that still has
/// to be dereferenced, a direct URL is already the answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageUrl {
    /// Points straight at image bytes on a CDN host
    Direct(String),
    /// Points at an HTML page that embeds the direct image URL
    PageLink(String),
}

impl ImageUrl {
    /// The URL string, regardless of kind.
    pub fn into_value(self) -> String {
        match self {
            ImageUrl::Direct(url) | ImageUrl::PageLink(url) => url,
        }
    }
}

/// Run the ordered fallback chain over a response body.
///
/// Returns the first match, or `None` when no strategy recognizes anything.
pub fn extract_image_url(body: &str) -> Option<ImageUrl> {
    if let Some(m) = DIRECT_CDN.find(body) {
        return Some(ImageUrl::Direct(m.as_str().to_owned()));
    }
    if let Some(m) = LEGACY_CDN.find(body) {
        return Some(ImageUrl::Direct(m.as_str().to_owned()));
    }
    if let Some(m) = PAGE_LINK.find(body) {
        return Some(ImageUrl::PageLink(m.as_str().to_owned()));
    }
    if let Some(captures) = OG_IMAGE.captures(body) {
        return Some(classify(captures[1].to_owned()));
    }
    None
}

/// An og:image tag can advertise either kind of URL; sort it by its own shape.
fn classify(url: String) -> ImageUrl {
    if PAGE_LINK.is_match(&url) && !DIRECT_CDN.is_match(&url) && !LEGACY_CDN.is_match(&url) {
        ImageUrl::PageLink(url)
    } else {
        ImageUrl::Direct(url)
    }
}
