//! Result formatting for chat replies
//!
//! Renders an `IdentificationResult` into a self-contained message plus the
//! headline fields callers need to store or act on. Formatting is a trait so
//! other presentations can replace the chat layout.

use crate::consensus::merge::SpeciesAggregate;
use crate::consensus::IdentificationResult;
use serde::{Deserialize, Serialize};

/// Shown when no source supplied a common name
pub const UNKNOWN_COMMON_NAME: &str = "Nombre común no disponible";
/// Shown when no source supplied a family
pub const UNKNOWN_FAMILY: &str = "Desconocida";

/// Runner-ups listed when there is no consensus
const MAX_ALTERNATIVES: usize = 2;

/// Rendered identification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedIdentification {
    pub found: bool,
    /// Complete chat-ready text
    pub message: String,
    pub scientific_name: Option<String>,
    pub common_name: Option<String>,
    pub family: Option<String>,
    /// Final confidence of the top species (0-100)
    pub confidence: Option<u8>,
    /// Top species was proposed by more than one source
    pub consensus: bool,
    /// Sources that voted for the top species
    pub source_count: usize,
}

pub trait ResultFormatter: Send + Sync {
    fn format(&self, result: &IdentificationResult) -> FormattedIdentification;
}

/// Spanish chat layout used by the bot
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatFormatter;

impl ChatFormatter {
    fn not_found(result: &IdentificationResult) -> FormattedIdentification {
        let message = format!(
            "❌ No pude identificar esta planta con ninguna de las fuentes disponibles.\n\n\
             🔍 Fuentes consultadas: {}\n📊 Resultados recibidos: {}",
            result.sources_consulted, result.summary.total_raw_candidates
        );

        FormattedIdentification {
            found: false,
            message,
            scientific_name: None,
            common_name: None,
            family: None,
            confidence: None,
            consensus: false,
            source_count: 0,
        }
    }

    fn display_common_name(species: &SpeciesAggregate) -> &str {
        if species.common_name.is_empty() {
            UNKNOWN_COMMON_NAME
        } else {
            &species.common_name
        }
    }
}

impl ResultFormatter for ChatFormatter {
    fn format(&self, result: &IdentificationResult) -> FormattedIdentification {
        let Some(top) = result.top() else {
            return Self::not_found(result);
        };

        let consensus = top.has_consensus();
        let family = top.family.as_deref().unwrap_or(UNKNOWN_FAMILY);
        let mut message = String::new();

        message.push_str(if consensus {
            "🌿 **IDENTIFICACIÓN CON CONSENSO**\n\n"
        } else {
            "🌿 **IDENTIFICACIÓN INDIVIDUAL**\n\n"
        });

        message.push_str(&format!("📋 **{}**\n", top.scientific_name));
        message.push_str(&format!("🏷️ {}\n", Self::display_common_name(top)));
        message.push_str(&format!("👨‍🔬 Familia: {}\n", family));
        message.push_str(&format!("🎯 Confianza: {}%\n", top.final_confidence));
        let agreeing = if top.heuristic_only {
            top.vote_count
        } else {
            top.service_vote_count
        };
        message.push_str(&format!(
            "🗳️ Consenso: {} fuente{}\n",
            agreeing,
            if agreeing == 1 { "" } else { "s" }
        ));

        if top.heuristic_only {
            message.push_str(
                "⚠️ Estimación local sin verificar: ningún servicio de identificación \
                 confirmó esta especie.\n",
            );
        } else if top.has_heuristic_vote() {
            message.push_str(
                "⚠️ Incluye una estimación local sin verificar que no cuenta para el consenso.\n",
            );
        }

        message.push_str("\n📊 **FUENTES:**\n");
        for vote in &top.sources {
            message.push_str(&format!("• {}: {}%\n", vote.source_name, vote.confidence.round()));
        }

        if !consensus && result.species.len() > 1 {
            message.push_str("\n🤔 **ALTERNATIVAS:**\n");
            for (i, alt) in result.species.iter().skip(1).take(MAX_ALTERNATIVES).enumerate() {
                message.push_str(&format!(
                    "{}. {} ({}%)\n",
                    i + 2,
                    alt.scientific_name,
                    alt.final_confidence
                ));
            }
        }

        message.push_str(&format!(
            "\n🔧 Fuentes: {} | Resultados: {}",
            result.sources_consulted, result.summary.total_raw_candidates
        ));

        FormattedIdentification {
            found: true,
            message,
            scientific_name: Some(top.scientific_name.clone()),
            common_name: Some(Self::display_common_name(top).to_string()),
            family: Some(family.to_string()),
            confidence: Some(top.final_confidence),
            consensus,
            source_count: top.sources.len(),
        }
    }
}
