//! Pl@ntNet adapter
//!
//! Uploads the image as multipart form data to `v2/identify/{project}`.
//! Pl@ntNet is a botanical service so every result is a plant; results below
//! 20% confidence are dropped.
//!
//! A 404 from Pl@ntNet means "no species recognised" and yields an empty list.
//!
//! # API Reference
//! - Endpoint: https://my-api.plantnet.org/v2/identify/{project}
//! - Documentation: https://my.plantnet.org/doc/openapi

use super::{error_for_status, http_client, PlantSource};
use crate::config::PlantNetConfig;
use crate::types::{Candidate, ImagePayload, SourceError, SourceTag};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const SOURCE_NAME: &str = "PlantNet";

/// Results must reach this confidence
const MIN_CONFIDENCE: f64 = 20.0;

/// Pl@ntNet identification source
pub struct PlantNetSource {
    client: Client,
    endpoint: String,
    api_key: String,
    project: String,
    lang: String,
    max_results: u32,
    weight: f64,
}

impl PlantNetSource {
    pub fn new(config: &PlantNetConfig, api_key: String) -> Result<Self, SourceError> {
        Ok(Self {
            client: http_client(Duration::from_secs(config.request_timeout_secs))?,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key,
            project: config.project.clone(),
            lang: config.lang.clone(),
            max_results: config.max_results,
            weight: config.weight,
        })
    }

    fn url(&self) -> String {
        format!("{}/{}", self.endpoint, self.project)
    }
}

#[async_trait]
impl PlantSource for PlantNetSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    async fn identify(&self, image: &ImagePayload) -> Result<Vec<Candidate>, SourceError> {
        debug!(
            source = SOURCE_NAME,
            project = %self.project,
            bytes = image.len(),
            "Submitting image"
        );

        let part = Part::bytes(image.bytes().to_vec())
            .file_name(image.upload_filename())
            .mime_str(image.format().mime_type())
            .map_err(|e| SourceError::Malformed(format!("multipart part: {}", e)))?;
        let form = Form::new().part("images", part);

        let max_results = self.max_results.to_string();
        let response = self
            .client
            .post(self.url())
            .query(&[
                ("api-key", self.api_key.as_str()),
                ("lang", self.lang.as_str()),
                ("nb-results", max_results.as_str()),
                ("include-related-images", "false"),
            ])
            .multipart(form)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(source = SOURCE_NAME, "No species recognised");
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(error_for_status(response).await);
        }

        let body: IdentifyResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("PlantNet response: {}", e)))?;

        let candidates = parse_results(body, &self.lang, &self.tag())?;
        debug!(source = SOURCE_NAME, candidates = candidates.len(), "Species kept");
        Ok(candidates)
    }
}

// ============================================================================
// Response model
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct IdentifyResponse {
    #[serde(default)]
    pub results: Vec<ResultEntry>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ResultEntry {
    pub score: f64,
    pub species: Species,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Species {
    #[serde(default)]
    pub scientific_name_without_author: String,
    pub family: Option<Taxon>,
    pub genus: Option<Taxon>,
    #[serde(default)]
    pub common_names: Vec<CommonName>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Taxon {
    #[serde(default)]
    pub scientific_name_without_author: String,
}

/// v2 returns plain strings already in the requested language; older
/// projects still return `{name, lang}` objects.
#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CommonName {
    Plain(String),
    Tagged { name: String, lang: Option<String> },
}

impl CommonName {
    fn name(&self) -> &str {
        match self {
            CommonName::Plain(name) => name,
            CommonName::Tagged { name, .. } => name,
        }
    }

    fn matches_lang(&self, lang: &str) -> bool {
        match self {
            CommonName::Plain(_) => false,
            CommonName::Tagged { lang: Some(l), .. } => l.eq_ignore_ascii_case(lang),
            CommonName::Tagged { lang: None, .. } => false,
        }
    }
}

/// Preferred language, then English, then the first name listed
fn pick_common_name(names: &[CommonName], lang: &str) -> String {
    names
        .iter()
        .find(|n| n.matches_lang(lang))
        .or_else(|| names.iter().find(|n| n.matches_lang("en")))
        .or_else(|| names.first())
        .map(|n| n.name().to_string())
        .unwrap_or_default()
}

/// Turn an identify response into candidates
pub fn parse_results(
    body: IdentifyResponse,
    lang: &str,
    tag: &SourceTag,
) -> Result<Vec<Candidate>, SourceError> {
    body.results
        .into_iter()
        .map(|entry| {
            let family = entry
                .species
                .family
                .map(|f| f.scientific_name_without_author);
            Candidate::new(
                entry.species.scientific_name_without_author,
                pick_common_name(&entry.species.common_names, lang),
                (entry.score * 100.0).round().clamp(0.0, 100.0),
                family,
                tag,
            )
        })
        .filter(|c| c.as_ref().map_or(true, |c| c.confidence >= MIN_CONFIDENCE))
        .collect()
}
