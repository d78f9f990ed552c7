use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

use super::checksum::{digits_of, luhn_valid, verhoeff_valid};
use super::patterns::*;
use super::{DetectedEntity, DetectionError, EntityDetector};

pub const DEFAULT_LANGUAGE: &str = "en";

/// One regex-backed recognizer: a label, a pattern, a base score and a
/// validator that rejects matches failing a checksum or range rule.
struct PatternDefinition {
    entity_type: &'static str,
    regex: &'static Lazy<Regex>,
    score: f64,
    validate: fn(&str) -> bool,
}

static DEFINITIONS: &[PatternDefinition] = &[
    PatternDefinition {
        entity_type: "EMAIL_ADDRESS",
        regex: &EMAIL_REGEX,
        score: 1.0,
        validate: accept_any,
    },
    PatternDefinition {
        entity_type: "CREDIT_CARD",
        regex: &CREDIT_CARD_REGEX,
        score: 1.0,
        validate: valid_card_number,
    },
    PatternDefinition {
        entity_type: "IN_AADHAAR",
        regex: &AADHAAR_REGEX,
        score: 1.0,
        validate: valid_aadhaar,
    },
    PatternDefinition {
        entity_type: "US_SSN",
        regex: &SSN_REGEX,
        score: 0.85,
        validate: valid_ssn,
    },
    PatternDefinition {
        entity_type: "IP_ADDRESS",
        regex: &IP_ADDRESS_REGEX,
        score: 0.6,
        validate: accept_any,
    },
    PatternDefinition {
        entity_type: "PHONE_NUMBER",
        regex: &PHONE_REGEX,
        score: 0.4,
        validate: accept_any,
    },
];

fn accept_any(_value: &str) -> bool {
    true
}

fn valid_card_number(value: &str) -> bool {
    let digits = digits_of(value);
    (13..=19).contains(&digits.len()) && luhn_valid(&digits)
}

fn valid_aadhaar(value: &str) -> bool {
    let digits = digits_of(value);
    digits.len() == 12 && verhoeff_valid(&digits)
}

fn valid_ssn(value: &str) -> bool {
    let mut parts = value.split('-');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(area), Some(group), Some(serial)) => {
            area != "000"
                && area != "666"
                && !area.starts_with('9')
                && group != "00"
                && serial != "0000"
        }
        _ => false,
    }
}

/// Labels the default recognizer knows how to find
pub fn supported_entities() -> Vec<&'static str> {
    DEFINITIONS.iter().map(|d| d.entity_type).collect()
}

/// Regex and checksum based entity detector for a single working language
#[derive(Clone)]
pub struct PatternRecognizer {
    language: String,
    min_score: f64,
    definitions: Vec<&'static PatternDefinition>,
}

impl std::fmt::Debug for PatternRecognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternRecognizer")
            .field("language", &self.language)
            .field("min_score", &self.min_score)
            .field("entities", &self.entities())
            .finish()
    }
}

impl Default for PatternRecognizer {
    fn default() -> Self {
        Self::new(DEFAULT_LANGUAGE)
    }
}

impl PatternRecognizer {
    /// Recognizer with every built-in pattern enabled
    pub fn new(language: &str) -> Self {
        Self {
            language: language.to_string(),
            min_score: 0.0,
            definitions: DEFINITIONS.iter().collect(),
        }
    }

    /// Restricts detection to the given labels. An empty list keeps all.
    pub fn with_entities<S: AsRef<str>>(mut self, entities: &[S]) -> Result<Self, DetectionError> {
        if entities.is_empty() {
            return Ok(self);
        }
        let mut selected = Vec::with_capacity(entities.len());
        for name in entities {
            let name = name.as_ref();
            let definition = DEFINITIONS
                .iter()
                .find(|d| d.entity_type == name)
                .ok_or_else(|| DetectionError::UnknownEntity(name.to_string()))?;
            selected.push(definition);
        }
        self.definitions = selected;
        Ok(self)
    }

    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn entities(&self) -> Vec<&'static str> {
        self.definitions.iter().map(|d| d.entity_type).collect()
    }

    fn candidates(&self, text: &str) -> Vec<DetectedEntity> {
        let mut found = Vec::new();
        for definition in &self.definitions {
            if definition.score < self.min_score {
                continue;
            }
            for m in definition.regex.find_iter(text) {
                if (definition.validate)(m.as_str()) {
                    found.push(DetectedEntity::new(
                        definition.entity_type,
                        m.start(),
                        m.end(),
                        definition.score,
                    ));
                }
            }
        }
        found
    }
}

/// Drops every span that sits inside an already accepted span of greater or
/// equal score, then orders the survivors by position.
fn remove_contained(mut candidates: Vec<DetectedEntity>) -> Vec<DetectedEntity> {
    candidates.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| b.len().cmp(&a.len()))
            .then_with(|| a.start.cmp(&b.start))
    });

    let mut kept: Vec<DetectedEntity> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !kept.iter().any(|k| k.contains(&candidate)) {
            kept.push(candidate);
        }
    }
    kept.sort_by_key(|e| (e.start, e.end));
    kept
}

impl EntityDetector for PatternRecognizer {
    fn detect(&self, text: &str, language: &str) -> Result<Vec<DetectedEntity>, DetectionError> {
        if !language.eq_ignore_ascii_case(&self.language) {
            return Err(DetectionError::UnsupportedLanguage(language.to_string()));
        }
        let entities = remove_contained(self.candidates(text));
        trace!("Pattern recognizer found {} entities", entities.len());
        Ok(entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(entities: &[DetectedEntity]) -> Vec<&str> {
        entities.iter().map(|e| e.entity_type.as_str()).collect()
    }

    #[test]
    fn test_detects_email() {
        let recognizer = PatternRecognizer::default();
        let text = "alice@example.com";
        let found = recognizer.detect(text, "en").unwrap();
        assert_eq!(labels(&found), vec!["EMAIL_ADDRESS"]);
        assert_eq!((found[0].start, found[0].end), (0, text.len()));
    }

    #[test]
    fn test_email_and_phone_in_one_text() {
        let recognizer = PatternRecognizer::default();
        let found = recognizer
            .detect("Reach alice@example.com or 415-555-0132", "en")
            .unwrap();
        assert_eq!(labels(&found), vec!["EMAIL_ADDRESS", "PHONE_NUMBER"]);
    }

    #[test]
    fn test_card_is_not_also_a_phone() {
        let recognizer = PatternRecognizer::default();
        let found = recognizer.detect("card 4111 1111 1111 1111", "en").unwrap();
        assert_eq!(labels(&found), vec!["CREDIT_CARD"]);
    }

    #[test]
    fn test_card_failing_luhn_is_ignored() {
        let recognizer = PatternRecognizer::default();
        let found = recognizer.detect("4111111111111112", "en").unwrap();
        assert!(found.iter().all(|e| e.entity_type != "CREDIT_CARD"));
    }

    #[test]
    fn test_aadhaar_with_valid_checksum() {
        let recognizer = PatternRecognizer::default();
        let found = recognizer.detect("ID 2345 6789 0124", "en").unwrap();
        assert_eq!(labels(&found), vec!["IN_AADHAAR"]);
    }

    #[test]
    fn test_ssn_range_rules() {
        let recognizer = PatternRecognizer::default();
        assert_eq!(labels(&recognizer.detect("123-45-6789", "en").unwrap()), vec!["US_SSN"]);
        assert!(recognizer.detect("000-45-6789", "en").unwrap().is_empty());
        assert!(recognizer.detect("666-45-6789", "en").unwrap().is_empty());
    }

    #[test]
    fn test_ip_address() {
        let recognizer = PatternRecognizer::default();
        let found = recognizer.detect("from 192.168.1.20", "en").unwrap();
        assert_eq!(labels(&found), vec!["IP_ADDRESS"]);
    }

    #[test]
    fn test_plain_text_has_no_entities() {
        let recognizer = PatternRecognizer::default();
        assert!(recognizer.detect("Alice", "en").unwrap().is_empty());
        assert!(recognizer.detect("XXXXXX", "en").unwrap().is_empty());
    }

    #[test]
    fn test_unsupported_language() {
        let recognizer = PatternRecognizer::default();
        let err = recognizer.detect("alice@example.com", "fr").unwrap_err();
        assert!(matches!(err, DetectionError::UnsupportedLanguage(lang) if lang == "fr"));
    }

    #[test]
    fn test_entity_selection() {
        let recognizer = PatternRecognizer::default()
            .with_entities(&["PHONE_NUMBER"])
            .unwrap();
        let found = recognizer
            .detect("alice@example.com 415-555-0132", "en")
            .unwrap();
        assert_eq!(labels(&found), vec!["PHONE_NUMBER"]);

        let err = PatternRecognizer::default().with_entities(&["PASSPORT"]).unwrap_err();
        assert!(matches!(err, DetectionError::UnknownEntity(_)));
    }

    #[test]
    fn test_min_score_filters_weak_patterns() {
        let recognizer = PatternRecognizer::default().with_min_score(0.5);
        assert!(recognizer.detect("415-555-0132", "en").unwrap().is_empty());
    }

    #[test]
    fn test_detection_is_deterministic() {
        let recognizer = PatternRecognizer::default();
        let text = "bob@example.org, 4111-1111-1111-1111, 10.0.0.1";
        let first = recognizer.detect(text, "en").unwrap();
        let second = recognizer.detect(text, "en").unwrap();
        assert_eq!(first, second);
    }
}
