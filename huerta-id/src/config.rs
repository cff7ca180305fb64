//! Configuration for huerta-id
//!
//! Loaded from TOML (see `huerta_common::config`) with credentials resolved
//! ENV → TOML. The identification core never reads this file itself; the
//! binary builds an `IdentifierConfig` and passes it in.

use crate::consensus::scoring::ScoringParams;
use crate::types::is_valid_weight;
use huerta_common::config::{resolve_secret, LoggingConfig};
use huerta_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const GOOGLE_VISION_KEY_ENV: &str = "HUERTA_GOOGLE_VISION_API_KEY";
pub const PLANTNET_KEY_ENV: &str = "HUERTA_PLANTNET_API_KEY";
pub const INATURALIST_TOKEN_ENV: &str = "HUERTA_INATURALIST_TOKEN";

/// Complete service configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub logging: LoggingConfig,
    pub server: ServerConfig,
    #[serde(flatten)]
    pub identifier: IdentifierConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5740,
        }
    }
}

/// Everything the identification core needs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentifierConfig {
    pub identification: IdentificationConfig,
    pub sources: SourcesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentificationConfig {
    /// Ranked species kept in a result
    pub top_n: usize,
    /// Per-source deadline
    pub source_timeout_secs: u64,
    /// Largest accepted image
    pub max_image_bytes: usize,
    pub scoring: ScoringParams,
}

impl Default for IdentificationConfig {
    fn default() -> Self {
        Self {
            top_n: 5,
            source_timeout_secs: 20,
            max_image_bytes: 10 * 1024 * 1024,
            scoring: ScoringParams::default(),
        }
    }
}

impl IdentificationConfig {
    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub google_vision: GoogleVisionConfig,
    pub plantnet: PlantNetConfig,
    pub inaturalist: INaturalistConfig,
    pub local_heuristic: LocalHeuristicConfig,
}

/// Google Cloud Vision `images:annotate`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleVisionConfig {
    /// `None` means "enabled when an API key is available"
    pub enabled: Option<bool>,
    pub weight: f64,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for GoogleVisionConfig {
    fn default() -> Self {
        Self {
            enabled: None,
            weight: 0.5,
            endpoint: "https://vision.googleapis.com/v1/images:annotate".to_string(),
            api_key: None,
            request_timeout_secs: 15,
        }
    }
}

/// Pl@ntNet identification API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlantNetConfig {
    pub enabled: Option<bool>,
    pub weight: f64,
    pub endpoint: String,
    pub api_key: Option<String>,
    /// Flora project ("all", "k-world-flora", "useful", ...)
    pub project: String,
    /// Preferred language for common names
    pub lang: String,
    pub max_results: u32,
    pub request_timeout_secs: u64,
}

impl Default for PlantNetConfig {
    fn default() -> Self {
        Self {
            enabled: None,
            weight: 0.25,
            endpoint: "https://my-api.plantnet.org/v2/identify".to_string(),
            api_key: None,
            project: "all".to_string(),
            lang: "es".to_string(),
            max_results: 5,
            request_timeout_secs: 15,
        }
    }
}

/// iNaturalist computer vision
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct INaturalistConfig {
    /// Disabled unless explicitly enabled and a token is available
    pub enabled: bool,
    pub weight: f64,
    pub endpoint: String,
    pub token: Option<String>,
    pub locale: String,
    pub requests_per_second: u32,
    pub request_timeout_secs: u64,
}

impl Default for INaturalistConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            weight: 0.2,
            endpoint: "https://api.inaturalist.org/v1/computervision/score_image".to_string(),
            token: None,
            locale: "es".to_string(),
            requests_per_second: 1,
            request_timeout_secs: 25,
        }
    }
}

/// Local byte-pattern fallback
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalHeuristicConfig {
    pub enabled: bool,
    pub weight: f64,
}

impl Default for LocalHeuristicConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            weight: 0.1,
        }
    }
}

impl IdentifierConfig {
    /// Fill credentials from the environment (ENV beats TOML)
    pub fn resolve_credentials(&mut self) {
        let sources = &mut self.sources;

        sources.google_vision.api_key = resolve_secret(
            "Google Vision API key",
            GOOGLE_VISION_KEY_ENV,
            sources.google_vision.api_key.as_deref(),
        );
        sources.plantnet.api_key = resolve_secret(
            "Pl@ntNet API key",
            PLANTNET_KEY_ENV,
            sources.plantnet.api_key.as_deref(),
        );
        sources.inaturalist.token = resolve_secret(
            "iNaturalist token",
            INATURALIST_TOKEN_ENV,
            sources.inaturalist.token.as_deref(),
        );
    }

    /// Reject values the aggregator cannot work with
    pub fn validate(&self) -> Result<()> {
        let id = &self.identification;
        if id.top_n == 0 {
            return Err(Error::Config("identification.top_n must be at least 1".to_string()));
        }
        if id.source_timeout_secs == 0 {
            return Err(Error::Config(
                "identification.source_timeout_secs must be positive".to_string(),
            ));
        }
        if id.max_image_bytes == 0 {
            return Err(Error::Config(
                "identification.max_image_bytes must be positive".to_string(),
            ));
        }
        id.scoring.validate()?;

        let weights = [
            ("sources.google_vision.weight", self.sources.google_vision.weight),
            ("sources.plantnet.weight", self.sources.plantnet.weight),
            ("sources.inaturalist.weight", self.sources.inaturalist.weight),
            ("sources.local_heuristic.weight", self.sources.local_heuristic.weight),
        ];
        for (field, weight) in weights {
            if !is_valid_weight(weight) {
                return Err(Error::Config(format!(
                    "{} must be in (0, 1], got {}",
                    field, weight
                )));
            }
        }

        if self.sources.inaturalist.requests_per_second == 0 {
            return Err(Error::Config(
                "sources.inaturalist.requests_per_second must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = IdentifierConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.identification.top_n, 5);
        assert_eq!(config.sources.google_vision.weight, 0.5);
        assert!(!config.sources.inaturalist.enabled);
        assert!(config.sources.local_heuristic.enabled);
    }

    #[test]
    fn test_parse_full_file() {
        let toml = r#"
            [logging]
            level = "debug"

            [server]
            port = 8080

            [identification]
            top_n = 3
            source_timeout_secs = 10

            [identification.scoring]
            vote_bonus = 12.0

            [sources.plantnet]
            api_key = "pn-key"
            project = "useful"

            [sources.local_heuristic]
            enabled = false
        "#;

        let config: ServiceConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.identifier.identification.top_n, 3);
        assert_eq!(config.identifier.identification.scoring.vote_bonus, 12.0);
        assert_eq!(config.identifier.identification.scoring.average_factor, 0.5);
        assert_eq!(config.identifier.sources.plantnet.api_key.as_deref(), Some("pn-key"));
        assert_eq!(config.identifier.sources.plantnet.project, "useful");
        assert_eq!(config.identifier.sources.plantnet.weight, 0.25);
        assert!(!config.identifier.sources.local_heuristic.enabled);
    }

    #[test]
    fn test_validate_rejects_bad_weight() {
        let mut config = IdentifierConfig::default();
        config.sources.plantnet.weight = 1.2;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sources.plantnet.weight"));
    }

    #[test]
    fn test_validate_rejects_zero_top_n() {
        let mut config = IdentifierConfig::default();
        config.identification.top_n = 0;
        assert!(config.validate().is_err());
    }
}
