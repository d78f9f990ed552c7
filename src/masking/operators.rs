use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use super::MaskingError;

/// Literal used by the default uniform policy
pub const DEFAULT_REPLACEMENT: &str = "XXXXXX";

fn default_masking_char() -> char {
    '*'
}

/// How one detected span is rewritten
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operator {
    /// Swap the span for a fixed value
    Replace { new_value: String },
    /// Overwrite characters of the span with `masking_char`.
    /// `chars_to_mask: None` masks the whole span.
    Mask {
        #[serde(default = "default_masking_char")]
        masking_char: char,
        #[serde(default)]
        chars_to_mask: Option<usize>,
        #[serde(default)]
        from_end: bool,
    },
    /// SHA-256 of the span, lowercase hex
    Hash,
    /// `<ENTITY_TYPE>` placeholder
    Generalize,
    /// Remove the span entirely
    Redact,
}

impl Default for Operator {
    fn default() -> Self {
        Operator::Replace {
            new_value: DEFAULT_REPLACEMENT.to_string(),
        }
    }
}

impl Operator {
    pub fn apply(&self, original: &str, entity_type: &str) -> String {
        match self {
            Operator::Replace { new_value } => new_value.clone(),
            Operator::Mask {
                masking_char,
                chars_to_mask,
                from_end,
            } => {
                let total = original.chars().count();
                let count = chars_to_mask.unwrap_or(total).min(total);
                let (first, last) = if *from_end {
                    (total - count, total)
                } else {
                    (0, count)
                };
                original
                    .chars()
                    .enumerate()
                    .map(|(i, c)| if i >= first && i < last { *masking_char } else { c })
                    .collect()
            }
            Operator::Hash => hex::encode(Sha256::digest(original.as_bytes())),
            Operator::Generalize => format!("<{}>", entity_type),
            Operator::Redact => String::new(),
        }
    }
}

/// Replacement policy handed to the masking engine on every call
///
/// `default` applies to any entity type without an entry in `per_entity`.
/// The default value is the uniform policy: every span becomes `XXXXXX`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatorConfig {
    pub default: Operator,
    pub per_entity: BTreeMap<String, Operator>,
}

impl OperatorConfig {
    /// A single operator for every entity type
    pub fn uniform(operator: Operator) -> Self {
        Self {
            default: operator,
            per_entity: BTreeMap::new(),
        }
    }

    pub fn with_entity(mut self, entity_type: impl Into<String>, operator: Operator) -> Self {
        self.per_entity.insert(entity_type.into(), operator);
        self
    }

    /// Operator for a label. Keys match case-insensitively since layered
    /// config sources may lowercase them.
    pub fn operator_for(&self, entity_type: &str) -> &Operator {
        self.per_entity
            .get(entity_type)
            .or_else(|| {
                self.per_entity
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(entity_type))
                    .map(|(_, operator)| operator)
            })
            .unwrap_or(&self.default)
    }

    pub fn validate(&self) -> Result<(), MaskingError> {
        check_operator("default", &self.default)?;
        for (entity_type, operator) in &self.per_entity {
            if entity_type.trim().is_empty() {
                return Err(MaskingError::InvalidOperator(
                    "per-entity operator with an empty entity type".to_string(),
                ));
            }
            check_operator(entity_type, operator)?;
        }
        Ok(())
    }
}

fn check_operator(name: &str, operator: &Operator) -> Result<(), MaskingError> {
    if let Operator::Mask { masking_char, .. } = operator {
        if masking_char.is_control() {
            return Err(MaskingError::InvalidOperator(format!(
                "{}: masking char must be printable",
                name
            )));
        }
    }
    Ok(())
}
