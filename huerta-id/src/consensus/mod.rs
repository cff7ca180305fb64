//! Consensus aggregator
//!
//! Dispatches one image to every enabled source concurrently, waits for all
//! of them (each bounded by a timeout), then merges, scores and ranks the
//! candidates into an `IdentificationResult`.
//!
//! # Architecture
//! - **sources:** propose candidates, fail independently
//! - **merge:** pure grouping and scoring, no I/O (`merge::merge_candidates`)
//! - **this module:** fan-out, failure containment, per-source reporting
//!
//! A failed or timed-out source contributes nothing and is recorded in the
//! summary; it never fails the call.

pub mod merge;
pub mod scoring;

use crate::config::{IdentificationConfig, IdentifierConfig};
use crate::sources::{build_sources, PlantSource};
use crate::types::{IdentificationError, ImagePayload, Provenance};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use merge::{merge_candidates, SpeciesAggregate};
use scoring::ScoringParams;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Immutable aggregator parameters
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatorSettings {
    pub scoring: ScoringParams,
    /// Ranked species kept in a result
    pub top_n: usize,
    /// Deadline applied to each source call
    pub source_timeout: Duration,
    /// Largest accepted image
    pub max_image_bytes: usize,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self::from(&IdentificationConfig::default())
    }
}

impl From<&IdentificationConfig> for AggregatorSettings {
    fn from(config: &IdentificationConfig) -> Self {
        Self {
            scoring: config.scoring,
            top_n: config.top_n,
            source_timeout: config.source_timeout(),
            max_image_bytes: config.max_image_bytes,
        }
    }
}

/// Outcome of one source call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Succeeded,
    Failed,
    TimedOut,
}

/// Per-source entry in the consultation summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceReport {
    pub source_name: String,
    pub weight: f64,
    pub status: SourceStatus,
    pub candidate_count: usize,
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsultationSummary {
    /// One report per enabled source, in registration order
    pub sources: Vec<SourceReport>,
    /// Candidates received before merging
    pub total_raw_candidates: usize,
    /// Distinct species before truncation
    pub unified_species: usize,
    /// Top species was proposed by more than one source
    pub consensus_found: bool,
}

/// Ranked answer for one image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentificationResult {
    pub request_id: Uuid,
    pub completed_at: DateTime<Utc>,
    /// Best first, at most `top_n`
    pub species: Vec<SpeciesAggregate>,
    pub summary: ConsultationSummary,
    pub sources_consulted: usize,
}

impl IdentificationResult {
    pub fn top(&self) -> Option<&SpeciesAggregate> {
        self.species.first()
    }

    pub fn is_found(&self) -> bool {
        !self.species.is_empty()
    }
}

/// Enabled source as listed by `enabled_sources`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub name: String,
    pub weight: f64,
    pub provenance: Provenance,
}

/// Multi-source identification pipeline
///
/// Holds no per-request state; one instance serves concurrent requests.
///
/// # Example
/// ```rust,ignore
/// let aggregator = ConsensusAggregator::from_config(&config)?;
/// let result = aggregator.identify(bytes, Some("leaf.jpg".into())).await?;
/// if let Some(top) = result.top() {
///     println!("{} ({}%)", top.scientific_name, top.final_confidence);
/// }
/// ```
pub struct ConsensusAggregator {
    sources: Vec<Arc<dyn PlantSource>>,
    settings: AggregatorSettings,
}

impl ConsensusAggregator {
    /// Create an aggregator over explicit sources (registration order kept)
    pub fn new(sources: Vec<Arc<dyn PlantSource>>, settings: AggregatorSettings) -> Self {
        Self { sources, settings }
    }

    /// Validate configuration and build the enabled sources
    ///
    /// # Errors
    /// `Config` for invalid values or an HTTP client that cannot be built.
    pub fn from_config(config: &IdentifierConfig) -> huerta_common::Result<Self> {
        config.validate()?;

        let sources = build_sources(&config.sources)
            .map_err(|e| huerta_common::Error::Config(e.to_string()))?
            .into_iter()
            .map(|source| Arc::new(source) as Arc<dyn PlantSource>)
            .collect();

        Ok(Self::new(
            sources,
            AggregatorSettings::from(&config.identification),
        ))
    }

    pub fn settings(&self) -> &AggregatorSettings {
        &self.settings
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Sources that will be consulted, in registration order
    pub fn enabled_sources(&self) -> Vec<SourceInfo> {
        self.sources
            .iter()
            .map(|s| SourceInfo {
                name: s.name().to_string(),
                weight: s.weight(),
                provenance: s.provenance(),
            })
            .collect()
    }

    /// Validate raw image bytes and identify them
    ///
    /// # Errors
    /// `IdentificationError` when the input is rejected; no source is
    /// consulted in that case.
    pub async fn identify(
        &self,
        bytes: Vec<u8>,
        filename_hint: Option<String>,
    ) -> Result<IdentificationResult, IdentificationError> {
        let payload = ImagePayload::from_bytes(bytes, filename_hint, self.settings.max_image_bytes)
            .map_err(|e| {
                warn!(error = %e, "Image rejected before dispatch");
                e
            })?;

        Ok(self.aggregate(&payload).await)
    }

    /// Consult every source and merge their answers
    pub async fn aggregate(&self, image: &ImagePayload) -> IdentificationResult {
        let request_id = Uuid::new_v4();
        let started = Instant::now();

        info!(
            request_id = %request_id,
            sources = self.sources.len(),
            bytes = image.len(),
            format = ?image.format(),
            "Starting identification"
        );

        let timeout = self.settings.source_timeout;
        let calls = self.sources.iter().map(|source| async move {
            let call_started = Instant::now();
            let outcome = tokio::time::timeout(timeout, source.identify(image)).await;
            let elapsed_ms = call_started.elapsed().as_millis() as u64;
            (source, outcome, elapsed_ms)
        });

        // join_all keeps input order, so merging follows registration order
        let outcomes = join_all(calls).await;

        let mut candidates = Vec::new();
        let mut reports = Vec::with_capacity(outcomes.len());

        for (source, outcome, elapsed_ms) in outcomes {
            let name = source.name().to_string();
            let report = match outcome {
                Ok(Ok(found)) => {
                    debug!(
                        request_id = %request_id,
                        source = %name,
                        candidates = found.len(),
                        elapsed_ms,
                        "Source answered"
                    );
                    let count = found.len();
                    candidates.extend(found);
                    SourceReport {
                        source_name: name,
                        weight: source.weight(),
                        status: SourceStatus::Succeeded,
                        candidate_count: count,
                        error: None,
                        elapsed_ms,
                    }
                }
                Ok(Err(e)) => {
                    warn!(
                        request_id = %request_id,
                        source = %name,
                        error = %e,
                        elapsed_ms,
                        "Source failed (isolated)"
                    );
                    SourceReport {
                        source_name: name,
                        weight: source.weight(),
                        status: SourceStatus::Failed,
                        candidate_count: 0,
                        error: Some(e.to_string()),
                        elapsed_ms,
                    }
                }
                Err(_) => {
                    warn!(
                        request_id = %request_id,
                        source = %name,
                        timeout_ms = timeout.as_millis() as u64,
                        "Source timed out (isolated)"
                    );
                    SourceReport {
                        source_name: name,
                        weight: source.weight(),
                        status: SourceStatus::TimedOut,
                        candidate_count: 0,
                        error: Some(format!("timed out after {} ms", timeout.as_millis())),
                        elapsed_ms,
                    }
                }
            };
            reports.push(report);
        }

        let total_raw_candidates = candidates.len();
        let mut species = merge_candidates(&candidates, &self.settings.scoring);
        let unified_species = species.len();
        species.truncate(self.settings.top_n);

        let consensus_found = species.first().map_or(false, |top| top.has_consensus());

        info!(
            request_id = %request_id,
            raw_candidates = total_raw_candidates,
            species = unified_species,
            top = species.first().map(|s| s.scientific_name.as_str()).unwrap_or("-"),
            consensus = consensus_found,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Identification complete"
        );

        IdentificationResult {
            request_id,
            completed_at: Utc::now(),
            species,
            summary: ConsultationSummary {
                sources: reports,
                total_raw_candidates,
                unified_species,
                consensus_found,
            },
            sources_consulted: self.sources.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Candidate, SourceError};
    use async_trait::async_trait;

    struct Fixed {
        name: &'static str,
        weight: f64,
        species: Vec<(&'static str, f64)>,
    }

    #[async_trait]
    impl PlantSource for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        fn weight(&self) -> f64 {
            self.weight
        }

        async fn identify(&self, _image: &ImagePayload) -> Result<Vec<Candidate>, SourceError> {
            let tag = self.tag();
            self.species
                .iter()
                .map(|(name, confidence)| Candidate::new(*name, "", *confidence, None, &tag))
                .collect()
        }
    }

    fn jpeg() -> Vec<u8> {
        let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
        bytes.extend_from_slice(&[0u8; 64]);
        bytes
    }

    #[tokio::test]
    async fn test_invalid_input_fails_before_dispatch() {
        let aggregator = ConsensusAggregator::new(Vec::new(), AggregatorSettings::default());
        let err = aggregator.identify(Vec::new(), None).await.unwrap_err();
        assert_eq!(err, IdentificationError::EmptyImage);
    }

    #[tokio::test]
    async fn test_no_sources_is_not_found() {
        let aggregator = ConsensusAggregator::new(Vec::new(), AggregatorSettings::default());
        let result = aggregator.identify(jpeg(), None).await.unwrap();
        assert!(!result.is_found());
        assert_eq!(result.sources_consulted, 0);
        assert!(result.summary.sources.is_empty());
        assert!(!result.summary.consensus_found);
    }

    #[tokio::test]
    async fn test_summary_counts() {
        let sources: Vec<Arc<dyn PlantSource>> = vec![
            Arc::new(Fixed {
                name: "A",
                weight: 0.5,
                species: vec![("Rosa canina", 80.0), ("Bellis perennis", 40.0)],
            }),
            Arc::new(Fixed {
                name: "B",
                weight: 0.3,
                species: vec![("rosa canina", 60.0)],
            }),
        ];
        let aggregator = ConsensusAggregator::new(sources, AggregatorSettings::default());
        let result = aggregator.identify(jpeg(), None).await.unwrap();

        assert_eq!(result.summary.total_raw_candidates, 3);
        assert_eq!(result.summary.unified_species, 2);
        assert!(result.summary.consensus_found);
        assert_eq!(result.top().unwrap().scientific_name, "Rosa canina");
        assert_eq!(result.summary.sources[0].candidate_count, 2);
        assert_eq!(result.summary.sources[1].status, SourceStatus::Succeeded);
    }

    #[test]
    fn test_enabled_sources_from_default_config() {
        let aggregator = ConsensusAggregator::from_config(&IdentifierConfig::default()).unwrap();
        let sources = aggregator.enabled_sources();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].provenance, Provenance::Heuristic);
        assert_eq!(aggregator.settings().top_n, 5);
    }

    #[test]
    fn test_from_config_rejects_invalid() {
        let mut config = IdentifierConfig::default();
        config.identification.top_n = 0;
        assert!(ConsensusAggregator::from_config(&config).is_err());
    }
}
