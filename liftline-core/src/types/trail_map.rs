//! Trail-map types.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// What a discovered URL points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// A raster image that can be served as-is.
    Image,
    /// A document (PDF) that must be rendered before serving.
    Document,
}

impl SourceKind {
    /// Guesses the kind from the URL path extension.
    ///
    /// Anything that is not a PDF is treated as an image; the probe decides
    /// whether it really is one.
    pub fn from_url(url: &str) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        if path.to_ascii_lowercase().ends_with(".pdf") {
            SourceKind::Document
        } else {
            SourceKind::Image
        }
    }

    /// Returns true if a probe's `Content-Type` is compatible with this kind.
    ///
    /// Hosts that send `application/octet-stream` or nothing at all get the
    /// benefit of the doubt.
    pub fn accepts_content_type(&self, content_type: &str) -> bool {
        let ct = content_type.to_ascii_lowercase();
        if ct.is_empty() || ct.starts_with("application/octet-stream") || ct.starts_with("binary/") {
            return true;
        }
        match self {
            SourceKind::Image => ct.starts_with("image/"),
            SourceKind::Document => ct.starts_with("application/pdf") || ct.starts_with("application/x-pdf"),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Image => write!(f, "image"),
            SourceKind::Document => write!(f, "document"),
        }
    }
}

/// A candidate trail-map location produced by one discovery strategy.
///
/// Ephemeral: built fresh on every resolution pass and never cached on its own.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredSource {
    /// Absolute URL of the asset
    pub url: String,
    /// Image or document
    pub kind: SourceKind,
    /// Whether the existence probe succeeded
    pub validated: bool,
    /// Name of the strategy that produced it
    pub strategy: String,
}

impl DiscoveredSource {
    /// Creates an unvalidated candidate, inferring the kind from the URL.
    pub fn candidate(url: impl Into<String>, strategy: impl Into<String>) -> Self {
        let url = url.into();
        let kind = SourceKind::from_url(&url);
        Self {
            url,
            kind,
            validated: false,
            strategy: strategy.into(),
        }
    }

    /// Creates an unvalidated candidate with an explicit kind.
    pub fn with_kind(url: impl Into<String>, kind: SourceKind, strategy: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind,
            validated: false,
            strategy: strategy.into(),
        }
    }

    /// Marks this candidate as validated.
    pub fn validated(mut self) -> Self {
        self.validated = true;
        self
    }
}

/// A trail-map image ready to be served.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrailMapPayload {
    /// Raw image bytes
    pub bytes: Bytes,
    /// MIME type sent as `Content-Type`
    pub content_type: String,
}

impl TrailMapPayload {
    /// Creates a payload.
    pub fn new(bytes: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: content_type.into(),
        }
    }

    /// Size of the image in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if the payload holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Guesses an image MIME type from a URL when the server did not send one.
pub fn content_type_for_url(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
    if path.ends_with(".png") {
        "image/png"
    } else if path.ends_with(".webp") {
        "image/webp"
    } else if path.ends_with(".gif") {
        "image/gif"
    } else if path.ends_with(".pdf") {
        "application/pdf"
    } else {
        "image/jpeg"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("https://a.test/maps/trail-map.pdf", SourceKind::Document ; "pdf")]
    #[test_case("https://a.test/maps/Trail-Map.PDF?v=3", SourceKind::Document ; "pdf with query")]
    #[test_case("https://a.test/maps/trail-map.jpg", SourceKind::Image ; "jpg")]
    #[test_case("https://a.test/maps/trail-map", SourceKind::Image ; "no extension")]
    fn test_kind_from_url(url: &str, expected: SourceKind) {
        assert_eq!(SourceKind::from_url(url), expected);
    }

    #[test]
    fn test_accepts_content_type() {
        assert!(SourceKind::Image.accepts_content_type("image/jpeg"));
        assert!(!SourceKind::Image.accepts_content_type("text/html; charset=utf-8"));
        assert!(SourceKind::Document.accepts_content_type("application/pdf"));
        assert!(!SourceKind::Document.accepts_content_type("image/png"));
        assert!(SourceKind::Document.accepts_content_type(""));
    }

    #[test]
    fn test_candidate_infers_kind() {
        let src = DiscoveredSource::candidate("https://a.test/map.pdf", "document");
        assert_eq!(src.kind, SourceKind::Document);
        assert!(!src.validated);
        assert!(src.validated().validated);
    }

    #[test]
    fn test_content_type_for_url() {
        assert_eq!(content_type_for_url("https://a.test/x.PNG"), "image/png");
        assert_eq!(content_type_for_url("https://a.test/x.jpg?w=10"), "image/jpeg");
    }
}
