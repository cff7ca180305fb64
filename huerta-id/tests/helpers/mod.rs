//! Test Helper Utilities
//!
//! Mock identification sources and sample images shared by the
//! integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use huerta_id::consensus::{AggregatorSettings, ConsensusAggregator};
use huerta_id::sources::PlantSource;
use huerta_id::types::{Candidate, ImagePayload, Provenance, SourceError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Minimal JPEG-signed payload (content is irrelevant to mock sources)
pub fn sample_jpeg() -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00];
    bytes.extend((0..512u32).map(|i| (i % 251) as u8));
    bytes
}

/// Minimal PNG-signed payload
pub fn sample_png() -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.extend_from_slice(&[0u8; 64]);
    bytes
}

/// Source returning a fixed candidate list
pub struct StaticSource {
    name: String,
    weight: f64,
    provenance: Provenance,
    species: Vec<(String, String, f64, Option<String>)>,
    calls: AtomicUsize,
}

impl StaticSource {
    pub fn new(name: &str, weight: f64) -> Self {
        Self {
            name: name.to_string(),
            weight,
            provenance: Provenance::Service,
            species: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Add a candidate (scientific name, confidence)
    pub fn with(mut self, scientific_name: &str, confidence: f64) -> Self {
        self.species
            .push((scientific_name.to_string(), String::new(), confidence, None));
        self
    }

    /// Add a candidate with common name and family
    pub fn with_details(
        mut self,
        scientific_name: &str,
        common_name: &str,
        confidence: f64,
        family: &str,
    ) -> Self {
        self.species.push((
            scientific_name.to_string(),
            common_name.to_string(),
            confidence,
            Some(family.to_string()),
        ));
        self
    }

    pub fn heuristic(mut self) -> Self {
        self.provenance = Provenance::Heuristic;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlantSource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn provenance(&self) -> Provenance {
        self.provenance
    }

    async fn identify(&self, _image: &ImagePayload) -> Result<Vec<Candidate>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let tag = self.tag();
        self.species
            .iter()
            .map(|(scientific, common, confidence, family)| {
                Candidate::new(scientific.as_str(), common.as_str(), *confidence, family.clone(), &tag)
            })
            .collect()
    }
}

/// Source that always fails
pub struct FailingSource {
    name: String,
    weight: f64,
}

impl FailingSource {
    pub fn new(name: &str, weight: f64) -> Self {
        Self {
            name: name.to_string(),
            weight,
        }
    }
}

#[async_trait]
impl PlantSource for FailingSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    async fn identify(&self, _image: &ImagePayload) -> Result<Vec<Candidate>, SourceError> {
        Err(SourceError::Network("connection refused".to_string()))
    }
}

/// Source that answers after a delay
pub struct SlowSource {
    inner: StaticSource,
    delay: Duration,
}

impl SlowSource {
    pub fn new(inner: StaticSource, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl PlantSource for SlowSource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn weight(&self) -> f64 {
        self.inner.weight()
    }

    async fn identify(&self, image: &ImagePayload) -> Result<Vec<Candidate>, SourceError> {
        tokio::time::sleep(self.delay).await;
        self.inner.identify(image).await
    }
}

/// Aggregator over the given sources with default settings
pub fn aggregator(sources: Vec<Arc<dyn PlantSource>>) -> ConsensusAggregator {
    ConsensusAggregator::new(sources, AggregatorSettings::default())
}

/// Aggregator with a custom per-source timeout
pub fn aggregator_with_timeout(
    sources: Vec<Arc<dyn PlantSource>>,
    timeout: Duration,
) -> ConsensusAggregator {
    let settings = AggregatorSettings {
        source_timeout: timeout,
        ..AggregatorSettings::default()
    };
    ConsensusAggregator::new(sources, settings)
}
