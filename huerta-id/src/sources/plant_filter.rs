//! Plant relevance filter for general-purpose vision labels
//!
//! General image labelling services describe everything in a photo. Only
//! labels that mention a plant term and none of the excluded terms are kept.

/// Substrings that mark a label as plant related
const PLANT_KEYWORDS: &[&str] = &[
    "plant", "flower", "leaf", "tree", "grass", "herb", "botanical", "flora",
    "vegetation", "bloom", "petal", "stem", "root", "branch", "succulent",
    "cactus", "rose", "daisy", "lily", "orchid", "fern", "moss", "algae",
    "fungi", "mushroom", "garden", "wildflower", "houseplant", "shrub", "vine",
    "bamboo", "palm",
];

/// Substrings that disqualify a label even when a plant term also matches
const EXCLUDED_KEYWORDS: &[&str] = &[
    "person", "human", "animal", "car", "building", "food", "clothing",
    "furniture", "electronic", "tool", "machine", "vehicle",
];

/// Generic labels with a known botanical taxon
const SCIENTIFIC_NAMES: &[(&str, &str)] = &[
    ("rose", "Rosa spp."),
    ("daisy", "Bellis perennis"),
    ("dandelion", "Taraxacum officinale"),
    ("sunflower", "Helianthus annuus"),
    ("lily", "Lilium spp."),
    ("orchid", "Orchidaceae"),
    ("cactus", "Cactaceae"),
    ("succulent", "Crassulaceae"),
    ("fern", "Pteridophyta"),
    ("grass", "Poaceae"),
    ("moss", "Bryophyta"),
    ("palm", "Arecaceae"),
    ("bamboo", "Bambuseae"),
];

/// Spanish display names for common English labels
const COMMON_NAMES_ES: &[(&str, &str)] = &[
    ("plant", "Planta"),
    ("flower", "Flor"),
    ("leaf", "Hoja"),
    ("tree", "Árbol"),
    ("grass", "Pasto"),
    ("herb", "Hierba"),
    ("rose", "Rosa"),
    ("daisy", "Margarita"),
    ("dandelion", "Diente de león"),
    ("sunflower", "Girasol"),
    ("lily", "Lirio"),
    ("orchid", "Orquídea"),
    ("cactus", "Cactus"),
    ("succulent", "Suculenta"),
    ("fern", "Helecho"),
    ("moss", "Musgo"),
    ("palm", "Palmera"),
    ("bamboo", "Bambú"),
    ("wildflower", "Flor silvestre"),
    ("houseplant", "Planta de interior"),
];

/// True when a label describes plant matter
pub fn is_plant_related(label: &str) -> bool {
    let label = label.trim().to_lowercase();
    if label.is_empty() {
        return false;
    }
    if EXCLUDED_KEYWORDS.iter().any(|k| label.contains(k)) {
        return false;
    }
    PLANT_KEYWORDS.iter().any(|k| label.contains(k))
}

/// Map a generic label to a taxon, falling back to "<label> spp."
pub fn scientific_name_for_label(label: &str) -> String {
    let label = label.trim();
    let key = label.to_lowercase();
    SCIENTIFIC_NAMES
        .iter()
        .find(|(common, _)| *common == key)
        .map(|(_, scientific)| scientific.to_string())
        .unwrap_or_else(|| format!("{} spp.", label))
}

/// Spanish display name for a label, or the label itself
pub fn common_name_for_label(label: &str) -> String {
    let label = label.trim();
    let key = label.to_lowercase();
    COMMON_NAMES_ES
        .iter()
        .find(|(english, _)| *english == key)
        .map(|(_, spanish)| spanish.to_string())
        .unwrap_or_else(|| label.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plant_labels_accepted() {
        assert!(is_plant_related("Flower"));
        assert!(is_plant_related("Flowering plant"));
        assert!(is_plant_related("Houseplant"));
        assert!(is_plant_related("Rosa canina wildflower"));
    }

    #[test]
    fn test_excluded_labels_rejected() {
        assert!(!is_plant_related("Person"));
        assert!(!is_plant_related("Plant-based food"), "Excluded term wins");
        assert!(!is_plant_related("Garden tool"));
        assert!(!is_plant_related("Sky"));
        assert!(!is_plant_related(""));
    }

    #[test]
    fn test_scientific_mapping() {
        assert_eq!(scientific_name_for_label("Daisy"), "Bellis perennis");
        assert_eq!(scientific_name_for_label("rose"), "Rosa spp.");
        assert_eq!(scientific_name_for_label("Shrub"), "Shrub spp.");
    }

    #[test]
    fn test_common_name_translation() {
        assert_eq!(common_name_for_label("Dandelion"), "Diente de león");
        assert_eq!(common_name_for_label("Houseplant"), "Planta de interior");
        assert_eq!(common_name_for_label("Monstera"), "Monstera");
    }
}
