//! Source adapters
//!
//! Each adapter wraps one identification provider behind the `PlantSource`
//! capability interface. The set of adapters is fixed; `Source` is the tagged
//! variant the aggregator is normally built from.
//!
//! # Adapters
//! 1. **google_vision** - Google Cloud Vision labels filtered to plants (weight 0.5)
//! 2. **plantnet** - Pl@ntNet botanical identification (weight 0.25)
//! 3. **inaturalist** - iNaturalist computer vision, Plantae only (weight 0.2)
//! 4. **local_heuristic** - deterministic byte-pattern guess, no network (weight 0.1)
//!
//! Adapters never mutate shared state. A failing adapter returns `Err`; the
//! aggregator contains it.

pub mod google_vision;
pub mod inaturalist;
pub mod local_heuristic;
pub mod plant_filter;
pub mod plantnet;

use crate::config::SourcesConfig;
use crate::types::{Candidate, ImagePayload, Provenance, SourceError, SourceTag};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{info, warn};

pub use google_vision::GoogleVisionSource;
pub use inaturalist::INaturalistSource;
pub use local_heuristic::LocalHeuristicSource;
pub use plantnet::PlantNetSource;

/// Connection timeout shared by every HTTP adapter
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Capability interface every identification source implements
///
/// # Example
/// ```rust,ignore
/// #[async_trait::async_trait]
/// impl PlantSource for MySource {
///     fn name(&self) -> &str { "Mine" }
///     fn weight(&self) -> f64 { 0.3 }
///     fn provenance(&self) -> Provenance { Provenance::Service }
///
///     async fn identify(&self, image: &ImagePayload) -> Result<Vec<Candidate>, SourceError> {
///         let tag = self.tag();
///         Ok(vec![Candidate::new("Rosa canina", "", 70.0, None, &tag)?])
///     }
/// }
/// ```
#[async_trait]
pub trait PlantSource: Send + Sync {
    /// Adapter identity, used as `source_name` on candidates and in reports
    fn name(&self) -> &str;

    /// Static trust weight in (0, 1]
    fn weight(&self) -> f64;

    /// Whether this adapter is a real service or a local guess
    fn provenance(&self) -> Provenance {
        Provenance::Service
    }

    /// Identity stamped on candidates
    fn tag(&self) -> SourceTag {
        SourceTag::new(self.name(), self.weight(), self.provenance())
    }

    /// Propose candidate species for an image
    ///
    /// # Errors
    /// Any `SourceError`; the aggregator records it and continues with the
    /// other sources.
    async fn identify(&self, image: &ImagePayload) -> Result<Vec<Candidate>, SourceError>;
}

/// The fixed set of identification sources
pub enum Source {
    GoogleVision(GoogleVisionSource),
    PlantNet(PlantNetSource),
    INaturalist(INaturalistSource),
    LocalHeuristic(LocalHeuristicSource),
}

#[async_trait]
impl PlantSource for Source {
    fn name(&self) -> &str {
        match self {
            Source::GoogleVision(s) => s.name(),
            Source::PlantNet(s) => s.name(),
            Source::INaturalist(s) => s.name(),
            Source::LocalHeuristic(s) => s.name(),
        }
    }

    fn weight(&self) -> f64 {
        match self {
            Source::GoogleVision(s) => s.weight(),
            Source::PlantNet(s) => s.weight(),
            Source::INaturalist(s) => s.weight(),
            Source::LocalHeuristic(s) => s.weight(),
        }
    }

    fn provenance(&self) -> Provenance {
        match self {
            Source::GoogleVision(s) => s.provenance(),
            Source::PlantNet(s) => s.provenance(),
            Source::INaturalist(s) => s.provenance(),
            Source::LocalHeuristic(s) => s.provenance(),
        }
    }

    async fn identify(&self, image: &ImagePayload) -> Result<Vec<Candidate>, SourceError> {
        match self {
            Source::GoogleVision(s) => s.identify(image).await,
            Source::PlantNet(s) => s.identify(image).await,
            Source::INaturalist(s) => s.identify(image).await,
            Source::LocalHeuristic(s) => s.identify(image).await,
        }
    }
}

/// Build the enabled sources in registration order
///
/// Order is Google Vision, Pl@ntNet, iNaturalist, local heuristic. A source
/// that is enabled but lacks credentials is skipped with a warning.
///
/// # Errors
/// Returns `NotConfigured` if an HTTP client cannot be constructed.
pub fn build_sources(config: &SourcesConfig) -> Result<Vec<Source>, SourceError> {
    let mut sources = Vec::new();

    let google = &config.google_vision;
    let google_key = google.api_key.as_deref().filter(|k| !k.trim().is_empty());
    match (google.enabled.unwrap_or(google_key.is_some()), google_key) {
        (true, Some(key)) => sources.push(Source::GoogleVision(GoogleVisionSource::new(
            google,
            key.to_string(),
        )?)),
        (true, None) => warn!(source = "Google Vision", "Enabled but no API key configured, skipping"),
        (false, _) => {}
    }

    let plantnet = &config.plantnet;
    let plantnet_key = plantnet.api_key.as_deref().filter(|k| !k.trim().is_empty());
    match (plantnet.enabled.unwrap_or(plantnet_key.is_some()), plantnet_key) {
        (true, Some(key)) => sources.push(Source::PlantNet(PlantNetSource::new(
            plantnet,
            key.to_string(),
        )?)),
        (true, None) => warn!(source = "PlantNet", "Enabled but no API key configured, skipping"),
        (false, _) => {}
    }

    let inat = &config.inaturalist;
    let inat_token = inat.token.as_deref().filter(|t| !t.trim().is_empty());
    match (inat.enabled, inat_token) {
        (true, Some(token)) => sources.push(Source::INaturalist(INaturalistSource::new(
            inat,
            token.to_string(),
        )?)),
        (true, None) => warn!(source = "iNaturalist", "Enabled but no token configured, skipping"),
        (false, _) => {}
    }

    if config.local_heuristic.enabled {
        sources.push(Source::LocalHeuristic(LocalHeuristicSource::new(
            config.local_heuristic.weight,
        )));
    }

    info!(
        count = sources.len(),
        sources = ?sources.iter().map(|s| s.name().to_string()).collect::<Vec<_>>(),
        "Identification sources configured"
    );

    Ok(sources)
}

/// HTTP client with per-adapter request timeout
pub(crate) fn http_client(request_timeout: Duration) -> Result<Client, SourceError> {
    Client::builder()
        .timeout(request_timeout)
        .connect_timeout(CONNECT_TIMEOUT)
        .user_agent(concat!("huerta-id/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| SourceError::NotConfigured(format!("HTTP client: {}", e)))
}

/// Read a non-success response into a classified error
pub(crate) async fn error_for_status(response: reqwest::Response) -> SourceError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    SourceError::from_status(status, truncate_body(body))
}

fn truncate_body(mut body: String) -> String {
    const MAX: usize = 300;
    if body.len() > MAX {
        let mut cut = MAX;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push('…');
    }
    body
}
