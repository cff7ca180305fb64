//! Local byte-pattern heuristic
//!
//! Offline fallback that never touches the network. It does not recognise
//! anything: it derives a stable fingerprint from the image bytes and uses it
//! to pick plausible common species from a built-in catalogue of European
//! weeds, wildflowers and trees. Candidates are tagged
//! `Provenance::Heuristic` so the aggregator and formatter can tell them
//! apart from real identifications.
//!
//! The same bytes always produce the same candidates.
//!
//! # Algorithm
//! 1. SHA-256 of the image; the first 8 digest bytes form the fingerprint
//! 2. Fingerprint divisibility selects leaf, flower and stem feature lists
//! 3. Three catalogue species at `fingerprint % (len - 10)` are appended
//! 4. Duplicates removed, first 5 kept
//! 5. Confidence `62.3 - 12 * rank + jitter` (jitter 0-8 from the digest),
//!    floor 30, +5 when the leading bytes look green and textured

use super::PlantSource;
use crate::types::{Candidate, ImagePayload, Provenance, SourceError};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::debug;

pub const SOURCE_NAME: &str = "Local Heuristic";

/// Candidates returned per call
const MAX_CANDIDATES: usize = 5;

/// Leading bytes inspected for colour statistics
const SAMPLE_BYTES: usize = 1000;

const BASE_CONFIDENCE: f64 = 62.3;
const RANK_PENALTY: f64 = 12.0;
const MAX_JITTER: f64 = 8.0;
const MIN_CONFIDENCE: f64 = 30.0;
const PLANT_LIKE_BONUS: f64 = 5.0;
const MAX_CONFIDENCE: f64 = 92.0;

struct CatalogEntry {
    scientific: &'static str,
    common: &'static str,
    family: &'static str,
}

const fn entry(scientific: &'static str, common: &'static str, family: &'static str) -> CatalogEntry {
    CatalogEntry {
        scientific,
        common,
        family,
    }
}

/// Common species, most frequent first
const CATALOG: &[CatalogEntry] = &[
    entry("Taraxacum officinale", "Diente de león", "Asteraceae"),
    entry("Plantago major", "Llantén mayor", "Plantaginaceae"),
    entry("Trifolium repens", "Trébol blanco", "Fabaceae"),
    entry("Bellis perennis", "Margarita común", "Asteraceae"),
    entry("Rumex obtusifolius", "Acedera", "Polygonaceae"),
    entry("Capsella bursa-pastoris", "Bolsa de pastor", "Brassicaceae"),
    entry("Stellaria media", "Pamplina", "Caryophyllaceae"),
    entry("Veronica persica", "Verónica pérsica", "Plantaginaceae"),
    entry("Poa annua", "Poa anual", "Poaceae"),
    entry("Matricaria chamomilla", "Manzanilla", "Asteraceae"),
    entry("Chenopodium album", "Cenizo", "Amaranthaceae"),
    entry("Lamium purpureum", "Lamio púrpura", "Lamiaceae"),
    entry("Galium aparine", "Amor de hortelano", "Rubiaceae"),
    entry("Urtica dioica", "Ortiga", "Urticaceae"),
    entry("Polygonum aviculare", "Centinodia", "Polygonaceae"),
    entry("Sonchus oleraceus", "Cerraja", "Asteraceae"),
    entry("Portulaca oleracea", "Verdolaga", "Portulacaceae"),
    entry("Amaranthus retroflexus", "Bledo", "Amaranthaceae"),
    entry("Echinochloa crus-galli", "Pasto de agua", "Poaceae"),
    entry("Digitaria sanguinalis", "Garranchuelo", "Poaceae"),
    entry("Setaria viridis", "Almorejo", "Poaceae"),
    entry("Convolvulus arvensis", "Correhuela", "Convolvulaceae"),
    entry("Cirsium arvense", "Cardo cundidor", "Asteraceae"),
    entry("Artemisia vulgaris", "Artemisa", "Asteraceae"),
    entry("Achillea millefolium", "Milenrama", "Asteraceae"),
    entry("Heracleum sphondylium", "Branca ursina", "Apiaceae"),
    entry("Daucus carota", "Zanahoria silvestre", "Apiaceae"),
    entry("Malva sylvestris", "Malva", "Malvaceae"),
    entry("Geranium molle", "Geranio silvestre", "Geraniaceae"),
    entry("Rosa canina", "Rosa silvestre", "Rosaceae"),
    entry("Quercus robur", "Roble común", "Fagaceae"),
    entry("Fagus sylvatica", "Haya", "Fagaceae"),
    entry("Acer pseudoplatanus", "Arce blanco", "Sapindaceae"),
    entry("Betula pendula", "Abedul", "Betulaceae"),
    entry("Pinus sylvestris", "Pino silvestre", "Pinaceae"),
    entry("Picea abies", "Abeto rojo", "Pinaceae"),
    entry("Alnus glutinosa", "Aliso", "Betulaceae"),
    entry("Corylus avellana", "Avellano", "Betulaceae"),
    entry("Prunus spinosa", "Endrino", "Rosaceae"),
    entry("Sambucus nigra", "Saúco", "Adoxaceae"),
    entry("Viburnum opulus", "Mundillo", "Adoxaceae"),
    entry("Hedera helix", "Hiedra", "Araliaceae"),
];

const FLOWERING: &[&str] = &[
    "Bellis perennis",
    "Matricaria chamomilla",
    "Taraxacum officinale",
    "Achillea millefolium",
];

const BROAD_LEAVED: &[&str] = &[
    "Plantago major",
    "Trifolium repens",
    "Urtica dioica",
    "Rumex obtusifolius",
    "Stellaria media",
    "Capsella bursa-pastoris",
];

const VISIBLE_STEM: &[&str] = &[
    "Artemisia vulgaris",
    "Achillea millefolium",
    "Sonchus oleraceus",
    "Heracleum sphondylium",
];

/// Colour statistics over the leading bytes read as RGB triples
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ByteProfile {
    /// Share of triples where green dominates and exceeds 100
    pub green_ratio: f64,
    /// Share of triples with a channel gap above 30
    pub complexity_ratio: f64,
}

impl ByteProfile {
    pub fn analyze(bytes: &[u8]) -> Self {
        let sample = &bytes[..bytes.len().min(SAMPLE_BYTES)];
        if sample.is_empty() {
            return Self {
                green_ratio: 0.0,
                complexity_ratio: 0.0,
            };
        }

        let mut greenish = 0usize;
        let mut complex = 0usize;
        for triple in sample.chunks(3) {
            let r = i32::from(triple[0]);
            let g = i32::from(triple.get(1).copied().unwrap_or(0));
            let b = i32::from(triple.get(2).copied().unwrap_or(0));

            if g > r && g > b && g > 100 {
                greenish += 1;
            }
            if (r - g).abs() > 30 || (g - b).abs() > 30 {
                complex += 1;
            }
        }

        let triples = sample.len() as f64 / 3.0;
        Self {
            green_ratio: greenish as f64 / triples,
            complexity_ratio: complex as f64 / triples,
        }
    }

    pub fn looks_like_plant(&self) -> bool {
        self.green_ratio > 0.15 && self.complexity_ratio > 0.25
    }
}

/// Deterministic offline fallback source
pub struct LocalHeuristicSource {
    weight: f64,
}

impl LocalHeuristicSource {
    pub fn new(weight: f64) -> Self {
        Self { weight }
    }

    /// Catalogue species chosen for a fingerprint, in rank order
    fn select_species(fingerprint: u64) -> Vec<&'static CatalogEntry> {
        let mut names: Vec<&str> = Vec::new();

        if fingerprint % 5 == 0 || fingerprint % 11 == 0 {
            names.extend_from_slice(FLOWERING);
        }
        if fingerprint % 3 == 0 || fingerprint % 7 == 0 {
            names.extend_from_slice(BROAD_LEAVED);
        }
        if fingerprint % 7 == 0 || fingerprint % 13 == 0 {
            names.extend_from_slice(VISIBLE_STEM);
        }

        let start = (fingerprint % (CATALOG.len() - 10) as u64) as usize;
        names.extend(CATALOG[start..start + 3].iter().map(|e| e.scientific));

        let mut selected: Vec<&'static CatalogEntry> = Vec::new();
        for name in names {
            if selected.iter().any(|e| e.scientific == name) {
                continue;
            }
            if let Some(found) = CATALOG.iter().find(|e| e.scientific == name) {
                selected.push(found);
            }
            if selected.len() == MAX_CANDIDATES {
                break;
            }
        }
        selected
    }

    fn guess(&self, bytes: &[u8]) -> Result<Vec<Candidate>, SourceError> {
        let digest = Sha256::digest(bytes);
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        let fingerprint = u64::from_be_bytes(head);

        let profile = ByteProfile::analyze(bytes);
        let bonus = if profile.looks_like_plant() {
            PLANT_LIKE_BONUS
        } else {
            0.0
        };

        let tag = self.tag();
        let candidates = Self::select_species(fingerprint)
            .into_iter()
            .enumerate()
            .map(|(rank, species)| {
                let jitter = f64::from(digest[8 + rank]) / 255.0 * MAX_JITTER;
                let confidence = (BASE_CONFIDENCE - RANK_PENALTY * rank as f64 + jitter)
                    .max(MIN_CONFIDENCE)
                    + bonus;
                Candidate::new(
                    species.scientific,
                    species.common,
                    confidence.min(MAX_CONFIDENCE).round(),
                    Some(species.family.to_string()),
                    &tag,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            source = SOURCE_NAME,
            fingerprint = %format!("{:016x}", fingerprint),
            green_ratio = profile.green_ratio,
            complexity_ratio = profile.complexity_ratio,
            candidates = candidates.len(),
            "Heuristic guess computed"
        );

        Ok(candidates)
    }
}

#[async_trait]
impl PlantSource for LocalHeuristicSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn provenance(&self) -> Provenance {
        Provenance::Heuristic
    }

    async fn identify(&self, image: &ImagePayload) -> Result<Vec<Candidate>, SourceError> {
        self.guess(image.bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jpeg(seed: u8) -> Vec<u8> {
        let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
        bytes.extend((0..2048u32).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)));
        bytes
    }

    #[test]
    fn test_catalog_large_enough_for_offset_window() {
        assert!(CATALOG.len() > 13);
        for name in FLOWERING.iter().chain(BROAD_LEAVED).chain(VISIBLE_STEM) {
            assert!(
                CATALOG.iter().any(|e| e.scientific == *name),
                "{} missing from catalogue",
                name
            );
        }
    }

    #[test]
    fn test_deterministic() {
        let source = LocalHeuristicSource::new(0.1);
        let first = source.guess(&jpeg(7)).unwrap();
        let second = source.guess(&jpeg(7)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_candidate_bounds() {
        let source = LocalHeuristicSource::new(0.1);
        for seed in 0..32 {
            let candidates = source.guess(&jpeg(seed)).unwrap();
            assert!(!candidates.is_empty());
            assert!(candidates.len() <= MAX_CANDIDATES);
            for c in &candidates {
                assert!(c.confidence >= MIN_CONFIDENCE && c.confidence <= MAX_CONFIDENCE);
                assert_eq!(c.provenance, Provenance::Heuristic);
                assert_eq!(c.source_name, SOURCE_NAME);
                assert!(c.family.is_some());
            }
            let mut keys: Vec<_> = candidates.iter().map(|c| c.species_key()).collect();
            keys.sort();
            keys.dedup();
            assert_eq!(keys.len(), candidates.len(), "No duplicate species");
        }
    }

    #[test]
    fn test_feature_lists_selected_by_fingerprint() {
        // 0 is divisible by everything: flowers first, then leaves
        let species = LocalHeuristicSource::select_species(0);
        let names: Vec<_> = species.iter().map(|e| e.scientific).collect();
        assert_eq!(
            names,
            vec![
                "Bellis perennis",
                "Matricaria chamomilla",
                "Taraxacum officinale",
                "Achillea millefolium",
                "Plantago major",
            ]
        );

        // 1 matches no feature: only the catalogue window
        let species = LocalHeuristicSource::select_species(1);
        let names: Vec<_> = species.iter().map(|e| e.scientific).collect();
        assert_eq!(names, vec!["Plantago major", "Trifolium repens", "Bellis perennis"]);
    }

    #[test]
    fn test_profile_green_and_textured() {
        let green: Vec<u8> = std::iter::repeat([20u8, 200, 40]).take(100).flatten().collect();
        let profile = ByteProfile::analyze(&green);
        assert!((profile.green_ratio - 1.0).abs() < 1e-9);
        assert!((profile.complexity_ratio - 1.0).abs() < 1e-9);
        assert!(profile.looks_like_plant());

        let grey = vec![128u8; 300];
        let profile = ByteProfile::analyze(&grey);
        assert_eq!(profile.green_ratio, 0.0);
        assert!(!profile.looks_like_plant());
    }

    #[test]
    fn test_profile_only_reads_leading_bytes() {
        let mut bytes = vec![128u8; SAMPLE_BYTES];
        bytes.extend(std::iter::repeat([20u8, 200, 40]).take(500).flatten());
        let profile = ByteProfile::analyze(&bytes);
        assert_eq!(profile.green_ratio, 0.0);
    }
}
