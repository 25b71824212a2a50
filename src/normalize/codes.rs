//! Canonical codes for buildings, ITPs and meters.
//!
//! Two spellings that fold to the same code are the same entity; that is the
//! only deduplication the loader performs.

use unicode_normalization::UnicodeNormalization;

/// NFC-compose, collapse non-alphanumeric runs into `_` and trim separators at the edges.
fn fold(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;
    for c in raw.nfc() {
        if c.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c);
        } else {
            pending_sep = true;
        }
    }
    if out.is_empty() { None } else { Some(out) }
}

/// Building and ITP codes are upper-case.
pub fn normalize_entity_code(raw: &str) -> Option<String> {
    fold(raw).map(|s| s.to_uppercase())
}

/// Meter codes are lower-case.
pub fn normalize_meter_code(raw: &str) -> Option<String> {
    fold(raw).map(|s| s.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_code_collapses_punctuation() {
        assert_eq!(normalize_entity_code("Дом №5 (ГВС)").as_deref(), Some("ДОМ_5_ГВС"));
        assert_eq!(normalize_entity_code("  itp-12 / A ").as_deref(), Some("ITP_12_A"));
        assert_eq!(normalize_entity_code("BUILDING__XVS").as_deref(), Some("BUILDING_XVS"));
    }

    #[test]
    fn spellings_converge_on_one_code() {
        let a = normalize_entity_code("Дом 5 ГВС");
        let b = normalize_entity_code("дом №5, (гвс)");
        assert_eq!(a, b);
    }

    #[test]
    fn decomposed_input_is_composed_first() {
        // "й" as "и" + combining breve
        let decomposed = "Свои\u{0306}";
        assert_eq!(normalize_entity_code(decomposed).as_deref(), Some("СВОЙ"));
    }

    #[test]
    fn meter_code_is_lower_case() {
        assert_eq!(normalize_meter_code("HVS Jan").as_deref(), Some("hvs_jan"));
        assert_eq!(normalize_meter_code("СЧ-001.A").as_deref(), Some("сч_001_a"));
    }

    #[test]
    fn empty_input_yields_none() {
        assert_eq!(normalize_entity_code(""), None);
        assert_eq!(normalize_entity_code("   "), None);
        assert_eq!(normalize_meter_code("--__--"), None);
        assert_eq!(normalize_meter_code("()"), None);
    }
}
