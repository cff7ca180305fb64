//! Species merge and ranking
//!
//! Pure computation over candidates already collected from every source.
//! Candidates are grouped by normalised scientific name, one vote per source
//! per species, then scored and ranked.
//!
//! Ranking is deterministic: consensus score descending, then vote count
//! descending, then first-insertion order.

use crate::consensus::scoring::{final_confidence, ScoringParams};
use crate::types::{species_key, Candidate, Provenance};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Placeholder strings some providers return instead of leaving a field empty
const PLACEHOLDERS: &[&str] = &[
    "unknown",
    "desconocida",
    "desconocido",
    "nombre común no disponible",
    "common name not available",
];

/// One source's contribution to a species
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceVote {
    pub source_name: String,
    pub confidence: f64,
    pub weight: f64,
    pub weighted_confidence: f64,
    pub provenance: Provenance,
}

/// Merged, scored record for one species across all sources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesAggregate {
    /// Display name (first occurrence)
    pub scientific_name: String,
    pub common_name: String,
    pub family: Option<String>,
    /// One entry per source, in merge order
    pub sources: Vec<SourceVote>,
    pub total_confidence: f64,
    pub weighted_confidence: f64,
    pub vote_count: usize,
    pub consensus_score: f64,
    pub average_confidence: f64,
    /// Consensus score rounded and clamped to 0-100
    pub final_confidence: u8,
    /// Votes cast by identification services (heuristic votes excluded)
    pub service_vote_count: usize,
    /// True when no real identification service proposed this species
    pub heuristic_only: bool,
}

impl SpeciesAggregate {
    fn from_candidate(candidate: &Candidate) -> Self {
        Self {
            scientific_name: candidate.scientific_name.clone(),
            common_name: candidate.common_name.clone(),
            family: candidate.family.clone(),
            sources: Vec::new(),
            total_confidence: 0.0,
            weighted_confidence: 0.0,
            vote_count: 0,
            consensus_score: 0.0,
            average_confidence: 0.0,
            final_confidence: 0,
            service_vote_count: 0,
            heuristic_only: true,
        }
    }

    /// Fold one candidate into this aggregate
    fn apply(&mut self, candidate: &Candidate) {
        let weighted = candidate.weighted_confidence();

        match self
            .sources
            .iter_mut()
            .find(|vote| vote.source_name == candidate.source_name)
        {
            Some(existing) => {
                // Same source proposed the species twice: still one vote,
                // keep the stronger suggestion.
                if candidate.confidence > existing.confidence {
                    self.total_confidence += candidate.confidence - existing.confidence;
                    self.weighted_confidence += weighted - existing.weighted_confidence;
                    existing.confidence = candidate.confidence;
                    existing.weighted_confidence = weighted;
                }
            }
            None => {
                self.sources.push(SourceVote {
                    source_name: candidate.source_name.clone(),
                    confidence: candidate.confidence,
                    weight: candidate.source_weight,
                    weighted_confidence: weighted,
                    provenance: candidate.provenance,
                });
                self.total_confidence += candidate.confidence;
                self.weighted_confidence += weighted;
                self.vote_count += 1;
                if candidate.provenance == Provenance::Service {
                    self.service_vote_count += 1;
                }
            }
        }

        if candidate.provenance == Provenance::Service {
            self.heuristic_only = false;
        }

        // Later filled-in values replace earlier empty or placeholder ones
        if is_informative(&candidate.common_name) {
            self.common_name = candidate.common_name.clone();
        }
        if let Some(family) = candidate.family.as_deref().filter(|f| is_informative(f)) {
            self.family = Some(family.to_string());
        }
    }

    /// More than one identification service agrees on this species
    ///
    /// Heuristic votes still count toward the score but never make consensus.
    pub fn has_consensus(&self) -> bool {
        self.service_vote_count > 1
    }

    /// At least one vote came from the local heuristic
    pub fn has_heuristic_vote(&self) -> bool {
        self.sources
            .iter()
            .any(|vote| vote.provenance == Provenance::Heuristic)
    }

    fn finalize(&mut self, params: &ScoringParams) {
        self.consensus_score =
            params.consensus_score(self.weighted_confidence, self.total_confidence, self.vote_count);
        self.average_confidence = if self.vote_count > 0 {
            self.total_confidence / self.vote_count as f64
        } else {
            0.0
        };
        self.final_confidence = final_confidence(self.consensus_score);
    }
}

fn is_informative(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && !PLACEHOLDERS.contains(&value.to_lowercase().as_str())
}

/// Merge candidates into ranked species aggregates
///
/// `candidates` must be in merge order (source registration order, then the
/// order each source reported them). Returns every species, best first.
pub fn merge_candidates(candidates: &[Candidate], params: &ScoringParams) -> Vec<SpeciesAggregate> {
    let mut species: Vec<SpeciesAggregate> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for candidate in candidates {
        let key = candidate.species_key();
        let slot = *index.entry(key).or_insert_with(|| {
            species.push(SpeciesAggregate::from_candidate(candidate));
            species.len() - 1
        });
        species[slot].apply(candidate);
    }

    for aggregate in &mut species {
        aggregate.finalize(params);
    }

    // Stable sort: equal score and votes keep insertion order
    species.sort_by(|a, b| {
        b.consensus_score
            .total_cmp(&a.consensus_score)
            .then_with(|| b.vote_count.cmp(&a.vote_count))
    });

    debug!(
        candidates = candidates.len(),
        species = species.len(),
        "Merged candidates into species aggregates"
    );

    species
}

/// True when two scientific names merge into the same species
pub fn same_species(a: &str, b: &str) -> bool {
    species_key(a) == species_key(b)
}
