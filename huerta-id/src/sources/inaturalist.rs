//! iNaturalist computer vision adapter
//!
//! iNaturalist scores every kind of organism, so results are filtered to
//! taxa in kingdom Plantae (iconic taxon or ancestry). Requests are limited
//! to `requests_per_second` (default 1) to respect the public API policy.
//!
//! Scores are read on a 0-100 scale (`combined_score`, else `vision_score`).
//!
//! # API Reference
//! - Endpoint: https://api.inaturalist.org/v1/computervision/score_image
//! - Documentation: https://api.inaturalist.org/v1/docs/

use super::{error_for_status, http_client, PlantSource};
use crate::config::INaturalistConfig;
use crate::types::{Candidate, ImagePayload, SourceError, SourceTag};
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

pub const SOURCE_NAME: &str = "iNaturalist";

const PLANTAE: &str = "Plantae";

/// iNaturalist source
pub struct INaturalistSource {
    client: Client,
    endpoint: String,
    token: String,
    locale: String,
    weight: f64,
    /// Internally synchronised; shared by concurrent requests
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl INaturalistSource {
    pub fn new(config: &INaturalistConfig, token: String) -> Result<Self, SourceError> {
        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            client: http_client(Duration::from_secs(config.request_timeout_secs))?,
            endpoint: config.endpoint.clone(),
            token,
            locale: config.locale.clone(),
            weight: config.weight,
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
        })
    }
}

#[async_trait]
impl PlantSource for INaturalistSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    async fn identify(&self, image: &ImagePayload) -> Result<Vec<Candidate>, SourceError> {
        self.rate_limiter.until_ready().await;

        debug!(source = SOURCE_NAME, bytes = image.len(), "Scoring image");

        let part = Part::bytes(image.bytes().to_vec())
            .file_name(image.upload_filename())
            .mime_str(image.format().mime_type())
            .map_err(|e| SourceError::Malformed(format!("multipart part: {}", e)))?;
        let form = Form::new()
            .part("image", part)
            .text("locale", self.locale.clone());

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_for_status(response).await);
        }

        let body: ScoreResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("iNaturalist response: {}", e)))?;

        let candidates = parse_scores(body, &self.tag())?;
        debug!(source = SOURCE_NAME, candidates = candidates.len(), "Plant taxa kept");
        Ok(candidates)
    }
}

// ============================================================================
// Response model
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ScoreResponse {
    #[serde(default)]
    pub results: Vec<ScoredTaxon>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ScoredTaxon {
    pub combined_score: Option<f64>,
    pub vision_score: Option<f64>,
    pub taxon: Option<Taxon>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Taxon {
    #[serde(default)]
    pub name: String,
    pub rank: Option<String>,
    pub iconic_taxon_name: Option<String>,
    pub preferred_common_name: Option<String>,
    pub common_name: Option<CommonName>,
    #[serde(default)]
    pub ancestors: Vec<Ancestor>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CommonName {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Ancestor {
    #[serde(default)]
    pub name: String,
    pub rank: Option<String>,
    pub iconic_taxon_name: Option<String>,
}

impl Taxon {
    fn is_plant(&self) -> bool {
        self.iconic_taxon_name.as_deref() == Some(PLANTAE)
            || self.ancestors.iter().any(|a| {
                a.name == PLANTAE || a.iconic_taxon_name.as_deref() == Some(PLANTAE)
            })
    }

    /// Preferred common name, then common name, then the scientific name
    fn display_common_name(&self) -> String {
        self.preferred_common_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| {
                self.common_name
                    .as_ref()
                    .map(|c| c.name.as_str())
                    .filter(|n| !n.trim().is_empty())
            })
            .unwrap_or(&self.name)
            .to_string()
    }

    fn family(&self) -> Option<String> {
        self.ancestors
            .iter()
            .find(|a| a.rank.as_deref() == Some("family"))
            .map(|a| a.name.clone())
    }
}

/// Turn a score_image response into plant candidates, strongest first
pub fn parse_scores(body: ScoreResponse, tag: &SourceTag) -> Result<Vec<Candidate>, SourceError> {
    let mut candidates = Vec::new();

    for scored in body.results {
        let Some(taxon) = scored.taxon.as_ref().filter(|t| t.is_plant()) else {
            continue;
        };
        let score = scored.combined_score.or(scored.vision_score).unwrap_or(0.0);

        candidates.push(Candidate::new(
            taxon.name.as_str(),
            taxon.display_common_name(),
            score.round().clamp(0.0, 100.0),
            taxon.family(),
            tag,
        )?);
    }

    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    Ok(candidates)
}
