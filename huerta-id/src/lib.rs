//! huerta-id library interface
//!
//! Multi-source plant identification: provider adapters, consensus
//! aggregation and result formatting, plus the thin HTTP surface used by the
//! chat bot and the REST backend.

pub mod api;
pub mod config;
pub mod consensus;
pub mod error;
pub mod formatter;
pub mod sources;
pub mod types;

pub use crate::error::{ApiError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use consensus::ConsensusAggregator;
use formatter::{ChatFormatter, ResultFormatter};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Identification pipeline (immutable after startup)
    pub aggregator: Arc<ConsensusAggregator>,
    /// Renders results into chat-ready text
    pub formatter: Arc<dyn ResultFormatter>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(aggregator: ConsensusAggregator) -> Self {
        Self {
            aggregator: Arc::new(aggregator),
            formatter: Arc::new(ChatFormatter),
            startup_time: Utc::now(),
        }
    }

    /// Replace the default chat formatter
    pub fn with_formatter(mut self, formatter: Arc<dyn ResultFormatter>) -> Self {
        self.formatter = formatter;
        self
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.aggregator.settings().max_image_bytes;

    Router::new()
        .merge(api::identify_routes())
        .merge(api::health_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
