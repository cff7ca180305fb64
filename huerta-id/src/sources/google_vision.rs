//! Google Cloud Vision adapter
//!
//! Sends the image to `images:annotate` requesting label, web and object
//! detection, then keeps only plant-related detections.
//!
//! # Mapping
//! - Labels: scientific name from the generic-label table (`Rose` → `Rosa spp.`)
//! - Web entities: top 5 plant entities, description used as the name
//!   (entities without a score count as 0.7)
//! - Objects: description used as the name
//!
//! Detections at or below 30% are dropped; the 8 strongest are returned.
//!
//! # API Reference
//! - Endpoint: https://vision.googleapis.com/v1/images:annotate
//! - Documentation: https://cloud.google.com/vision/docs/reference/rest

use super::plant_filter::{common_name_for_label, is_plant_related, scientific_name_for_label};
use super::{error_for_status, http_client, PlantSource};
use crate::config::GoogleVisionConfig;
use crate::types::{Candidate, ImagePayload, SourceError, SourceTag};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

pub const SOURCE_NAME: &str = "Google Vision";

/// Detections must be strictly above this confidence
const MIN_CONFIDENCE: f64 = 30.0;

/// Maximum candidates returned per call
const MAX_RESULTS: usize = 8;

/// Maximum web entities considered
const MAX_WEB_ENTITIES: usize = 5;

/// Score assumed for web entities the API returns without one
const DEFAULT_WEB_SCORE: f64 = 0.7;

/// Google Cloud Vision source
pub struct GoogleVisionSource {
    client: Client,
    endpoint: String,
    api_key: String,
    weight: f64,
}

impl GoogleVisionSource {
    pub fn new(config: &GoogleVisionConfig, api_key: String) -> Result<Self, SourceError> {
        Ok(Self {
            client: http_client(Duration::from_secs(config.request_timeout_secs))?,
            endpoint: config.endpoint.clone(),
            api_key,
            weight: config.weight,
        })
    }

    fn request_body(image: &ImagePayload) -> serde_json::Value {
        json!({
            "requests": [{
                "image": { "content": general_purpose::STANDARD.encode(image.bytes()) },
                "features": [
                    { "type": "LABEL_DETECTION", "maxResults": 20 },
                    { "type": "WEB_DETECTION", "maxResults": 10 },
                    { "type": "OBJECT_LOCALIZATION", "maxResults": 10 }
                ]
            }]
        })
    }
}

#[async_trait]
impl PlantSource for GoogleVisionSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    async fn identify(&self, image: &ImagePayload) -> Result<Vec<Candidate>, SourceError> {
        debug!(source = SOURCE_NAME, bytes = image.len(), "Requesting image annotation");

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&Self::request_body(image))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_for_status(response).await);
        }

        let body: AnnotateResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("Vision response: {}", e)))?;

        let candidates = parse_annotations(body, &self.tag())?;
        debug!(source = SOURCE_NAME, candidates = candidates.len(), "Plant detections kept");
        Ok(candidates)
    }
}

// ============================================================================
// Response model
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct AnnotateResponse {
    #[serde(default)]
    pub responses: Vec<AnnotateImageResponse>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotateImageResponse {
    #[serde(default)]
    pub label_annotations: Vec<EntityAnnotation>,
    pub web_detection: Option<WebDetection>,
    #[serde(default)]
    pub localized_object_annotations: Vec<LocalizedObject>,
    pub error: Option<Status>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct EntityAnnotation {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub score: f64,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebDetection {
    #[serde(default)]
    pub web_entities: Vec<WebEntity>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct WebEntity {
    pub description: Option<String>,
    pub score: Option<f64>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LocalizedObject {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub score: f64,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Status {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

/// Scale a 0-1 score to a whole percentage within 0-100
///
/// Web entity scores are not normalised and can exceed 1.
fn to_percent(score: f64) -> f64 {
    (score * 100.0).round().clamp(0.0, 100.0)
}

/// Turn an annotate response into plant candidates
///
/// # Errors
/// `Api` when the per-image response carries an error status.
pub fn parse_annotations(
    body: AnnotateResponse,
    tag: &SourceTag,
) -> Result<Vec<Candidate>, SourceError> {
    let Some(image) = body.responses.into_iter().next() else {
        return Ok(Vec::new());
    };

    if let Some(status) = image.error.filter(|s| s.code != 0) {
        return Err(SourceError::Api {
            status: 200,
            body: format!("Vision error {}: {}", status.code, status.message),
        });
    }

    let mut candidates = Vec::new();

    for label in image
        .label_annotations
        .iter()
        .filter(|l| is_plant_related(&l.description))
    {
        candidates.push(Candidate::new(
            scientific_name_for_label(&label.description),
            common_name_for_label(&label.description),
            to_percent(label.score),
            None,
            tag,
        )?);
    }

    let web_entities = image
        .web_detection
        .map(|w| w.web_entities)
        .unwrap_or_default();
    for entity in web_entities
        .iter()
        .filter_map(|e| {
            e.description
                .as_deref()
                .filter(|d| is_plant_related(d))
                .map(|d| (d, e.score.unwrap_or(DEFAULT_WEB_SCORE)))
        })
        .take(MAX_WEB_ENTITIES)
    {
        let (description, score) = entity;
        candidates.push(Candidate::new(
            description,
            common_name_for_label(description),
            to_percent(score),
            None,
            tag,
        )?);
    }

    for object in image
        .localized_object_annotations
        .iter()
        .filter(|o| is_plant_related(&o.name))
    {
        candidates.push(Candidate::new(
            object.name.as_str(),
            common_name_for_label(&object.name),
            to_percent(object.score),
            None,
            tag,
        )?);
    }

    candidates.retain(|c| c.confidence > MIN_CONFIDENCE);
    // Stable: equal confidences keep label, web, object order
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    candidates.truncate(MAX_RESULTS);

    Ok(candidates)
}
