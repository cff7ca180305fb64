//! Core types shared by sources, the consensus aggregator and the formatter
//!
//! Candidates are validated when constructed so that malformed provider
//! responses are rejected at the adapter boundary instead of leaking
//! half-filled records into the merge.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// Candidate
// ============================================================================

/// Whether a candidate came from a real identification service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// An external identification provider answered
    Service,
    /// Local guess with no provider behind it
    Heuristic,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Service => write!(f, "service"),
            Provenance::Heuristic => write!(f, "heuristic"),
        }
    }
}

/// One species suggestion from one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Scientific name as reported (display form)
    pub scientific_name: String,
    /// Common name, empty when the provider gave none
    pub common_name: String,
    /// Provider-reported confidence (0-100)
    pub confidence: f64,
    /// Botanical family if known
    pub family: Option<String>,
    /// Name of the source that produced this candidate
    pub source_name: String,
    /// Static trust weight of that source (0, 1]
    pub source_weight: f64,
    /// Service or heuristic origin
    pub provenance: Provenance,
}

impl Candidate {
    /// Build a validated candidate
    ///
    /// # Errors
    /// Returns `SourceError::Malformed` if the scientific name is blank, the
    /// confidence is not a finite value in 0-100, or the weight is outside (0, 1].
    pub fn new(
        scientific_name: impl Into<String>,
        common_name: impl Into<String>,
        confidence: f64,
        family: Option<String>,
        source: &SourceTag,
    ) -> Result<Self, SourceError> {
        let scientific_name = scientific_name.into().trim().to_string();
        if scientific_name.is_empty() {
            return Err(SourceError::Malformed(format!(
                "{}: candidate without scientific name",
                source.name
            )));
        }
        if !confidence.is_finite() || !(0.0..=100.0).contains(&confidence) {
            return Err(SourceError::Malformed(format!(
                "{}: confidence {} out of range for '{}'",
                source.name, confidence, scientific_name
            )));
        }
        if !is_valid_weight(source.weight) {
            return Err(SourceError::Malformed(format!(
                "{}: weight {} out of range",
                source.name, source.weight
            )));
        }

        let family = family
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty());

        Ok(Self {
            scientific_name,
            common_name: common_name.into().trim().to_string(),
            confidence,
            family,
            source_name: source.name.clone(),
            source_weight: source.weight,
            provenance: source.provenance,
        })
    }

    /// Confidence after applying the source weight
    pub fn weighted_confidence(&self) -> f64 {
        self.confidence * self.source_weight
    }

    /// Merge key: lower-cased, trimmed, internal whitespace collapsed
    pub fn species_key(&self) -> String {
        species_key(&self.scientific_name)
    }
}

/// Normalise a scientific name into a merge key
pub fn species_key(scientific_name: &str) -> String {
    scientific_name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Weights must lie in (0, 1]
pub fn is_valid_weight(weight: f64) -> bool {
    weight.is_finite() && weight > 0.0 && weight <= 1.0
}

/// Identity stamped on every candidate a source produces
#[derive(Debug, Clone, PartialEq)]
pub struct SourceTag {
    pub name: String,
    pub weight: f64,
    pub provenance: Provenance,
}

impl SourceTag {
    pub fn new(name: impl Into<String>, weight: f64, provenance: Provenance) -> Self {
        Self {
            name: name.into(),
            weight,
            provenance,
        }
    }
}

// ============================================================================
// Image payload
// ============================================================================

/// Image formats accepted for identification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
        }
    }
}

/// Validated image handed to every source
#[derive(Debug, Clone)]
pub struct ImagePayload {
    bytes: Vec<u8>,
    format: ImageFormat,
    filename: Option<String>,
}

impl ImagePayload {
    /// Validate raw bytes as an identifiable image
    ///
    /// # Errors
    /// - `EmptyImage` for a zero-length payload
    /// - `TooLarge` when the payload exceeds `max_bytes`
    /// - `UnsupportedFormat` when the bytes are not JPEG or PNG
    pub fn from_bytes(
        bytes: Vec<u8>,
        filename: Option<String>,
        max_bytes: usize,
    ) -> Result<Self, IdentificationError> {
        if bytes.is_empty() {
            return Err(IdentificationError::EmptyImage);
        }
        if bytes.len() > max_bytes {
            return Err(IdentificationError::TooLarge {
                size: bytes.len(),
                limit: max_bytes,
            });
        }

        let format = match infer::get(&bytes).map(|kind| kind.mime_type()) {
            Some("image/jpeg") => ImageFormat::Jpeg,
            Some("image/png") => ImageFormat::Png,
            Some(other) => return Err(IdentificationError::UnsupportedFormat(other.to_string())),
            None => {
                return Err(IdentificationError::UnsupportedFormat(
                    "unrecognised data".to_string(),
                ))
            }
        };

        let filename = filename
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty());

        Ok(Self {
            bytes,
            format,
            filename,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Filename for multipart uploads (hint or a generated default)
    pub fn upload_filename(&self) -> String {
        self.filename
            .clone()
            .unwrap_or_else(|| format!("plant.{}", self.format.extension()))
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Failure of a single source (always contained by the aggregator)
#[derive(Debug, Error)]
pub enum SourceError {
    /// Credentials or endpoint missing
    #[error("Source not configured: {0}")]
    NotConfigured(String),

    /// Transport failure (connect, timeout, TLS)
    #[error("Network error: {0}")]
    Network(String),

    /// Provider rejected the credentials
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Provider quota exhausted
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Non-success HTTP status
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    /// Response body could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),

    /// Response decoded but violated the candidate contract
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl SourceError {
    /// Classify a non-success HTTP status
    pub fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        match status.as_u16() {
            401 | 403 => SourceError::Auth(format!("{} {}", status, body)),
            429 => SourceError::RateLimited(format!("{} {}", status, body)),
            code => SourceError::Api { status: code, body },
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SourceError::Parse(err.to_string())
        } else {
            SourceError::Network(err.to_string())
        }
    }
}

/// Input rejected before any source is consulted
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentificationError {
    #[error("Invalid input: image payload is empty")]
    EmptyImage,

    #[error("Invalid input: unsupported image format ({0}); expected JPEG or PNG")]
    UnsupportedFormat(String),

    #[error("Invalid input: image is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const JPEG_HEADER: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xE0];
    const PNG_HEADER: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    fn tag() -> SourceTag {
        SourceTag::new("Test", 0.5, Provenance::Service)
    }

    #[test]
    fn test_species_key_normalisation() {
        assert_eq!(species_key("Rosa canina"), "rosa canina");
        assert_eq!(species_key("  rosa   CANINA \t"), "rosa canina");
        assert_eq!(species_key("Rosa\ncanina"), "rosa canina");
    }

    #[test]
    fn test_candidate_trims_and_tags() {
        let c = Candidate::new(" Rosa canina ", " Dog rose ", 80.0, Some("  ".into()), &tag()).unwrap();
        assert_eq!(c.scientific_name, "Rosa canina");
        assert_eq!(c.common_name, "Dog rose");
        assert_eq!(c.family, None, "Blank family treated as unknown");
        assert_eq!(c.source_name, "Test");
        assert_eq!(c.weighted_confidence(), 40.0);
    }

    #[test]
    fn test_candidate_rejects_blank_name() {
        let result = Candidate::new("   ", "x", 50.0, None, &tag());
        assert!(matches!(result, Err(SourceError::Malformed(_))));
    }

    #[test]
    fn test_candidate_rejects_bad_confidence() {
        assert!(Candidate::new("Rosa", "", 101.0, None, &tag()).is_err());
        assert!(Candidate::new("Rosa", "", -1.0, None, &tag()).is_err());
        assert!(Candidate::new("Rosa", "", f64::NAN, None, &tag()).is_err());
    }

    #[test]
    fn test_candidate_rejects_bad_weight() {
        let zero = SourceTag::new("Zero", 0.0, Provenance::Service);
        assert!(Candidate::new("Rosa", "", 50.0, None, &zero).is_err());
        let over = SourceTag::new("Over", 1.5, Provenance::Service);
        assert!(Candidate::new("Rosa", "", 50.0, None, &over).is_err());
    }

    #[test]
    fn test_payload_detects_jpeg_and_png() {
        let mut jpeg = JPEG_HEADER.to_vec();
        jpeg.extend_from_slice(&[0u8; 32]);
        let payload = ImagePayload::from_bytes(jpeg, None, 1024).unwrap();
        assert_eq!(payload.format(), ImageFormat::Jpeg);
        assert_eq!(payload.upload_filename(), "plant.jpg");

        let mut png = PNG_HEADER.to_vec();
        png.extend_from_slice(&[0u8; 32]);
        let payload = ImagePayload::from_bytes(png, Some("leaf.png".into()), 1024).unwrap();
        assert_eq!(payload.format(), ImageFormat::Png);
        assert_eq!(payload.filename(), Some("leaf.png"));
    }

    #[test]
    fn test_payload_rejects_empty() {
        let result = ImagePayload::from_bytes(Vec::new(), None, 1024);
        assert_eq!(result.unwrap_err(), IdentificationError::EmptyImage);
    }

    #[test]
    fn test_payload_rejects_oversize() {
        let mut jpeg = JPEG_HEADER.to_vec();
        jpeg.extend_from_slice(&[0u8; 64]);
        let result = ImagePayload::from_bytes(jpeg, None, 16);
        assert!(matches!(result, Err(IdentificationError::TooLarge { limit: 16, .. })));
    }

    #[test]
    fn test_payload_rejects_non_image() {
        let result = ImagePayload::from_bytes(b"hello, this is not an image".to_vec(), None, 1024);
        assert!(matches!(result, Err(IdentificationError::UnsupportedFormat(_))));

        // GIF is an image but not one we forward
        let gif = b"GIF89a\x01\x00\x01\x00\x00\x00\x00".to_vec();
        let result = ImagePayload::from_bytes(gif, None, 1024);
        assert_eq!(
            result.unwrap_err(),
            IdentificationError::UnsupportedFormat("image/gif".to_string())
        );
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            SourceError::from_status(reqwest::StatusCode::UNAUTHORIZED, String::new()),
            SourceError::Auth(_)
        ));
        assert!(matches!(
            SourceError::from_status(reqwest::StatusCode::TOO_MANY_REQUESTS, String::new()),
            SourceError::RateLimited(_)
        ));
        assert!(matches!(
            SourceError::from_status(reqwest::StatusCode::BAD_GATEWAY, "oops".into()),
            SourceError::Api { status: 502, .. }
        ));
    }
}
