//! HTTP API handlers for huerta-id
//!
//! POST /identify, GET /sources, GET /health

pub mod health;
pub mod identify;

pub use health::health_routes;
pub use identify::identify_routes;
