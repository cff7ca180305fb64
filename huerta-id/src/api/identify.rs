//! Identification API handlers
//!
//! POST /identify takes the raw image as the request body; an optional
//! `filename` query parameter is forwarded to providers as the upload name.

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::consensus::{IdentificationResult, SourceInfo};
use crate::formatter::FormattedIdentification;
use crate::{error::ApiResult, AppState};

/// POST /identify query parameters
#[derive(Debug, Default, Deserialize)]
pub struct IdentifyParams {
    pub filename: Option<String>,
}

/// POST /identify response
#[derive(Debug, Serialize, Deserialize)]
pub struct IdentifyResponse {
    pub result: IdentificationResult,
    pub formatted: FormattedIdentification,
}

/// GET /sources response
#[derive(Debug, Serialize, Deserialize)]
pub struct SourcesResponse {
    pub sources: Vec<SourceInfo>,
}

/// POST /identify
///
/// Rejected input returns 400/413/415; source failures never fail the request.
pub async fn identify_image(
    State(state): State<AppState>,
    Query(params): Query<IdentifyParams>,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<Json<IdentifyResponse>> {
    let body = body?;
    tracing::debug!(bytes = body.len(), filename = ?params.filename, "Identify request");

    let result = state
        .aggregator
        .identify(body.to_vec(), params.filename)
        .await?;
    let formatted = state.formatter.format(&result);

    Ok(Json(IdentifyResponse { result, formatted }))
}

/// GET /sources
pub async fn list_sources(State(state): State<AppState>) -> Json<SourcesResponse> {
    Json(SourcesResponse {
        sources: state.aggregator.enabled_sources(),
    })
}

/// Build identification routes
pub fn identify_routes() -> Router<AppState> {
    Router::new()
        .route("/identify", post(identify_image))
        .route("/sources", get(list_sources))
}
