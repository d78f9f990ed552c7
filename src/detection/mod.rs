pub mod checksum;
pub mod patterns;
pub mod recognizer;

use serde::{Deserialize, Serialize};

pub use recognizer::PatternRecognizer;

/// A single PII occurrence located inside one piece of text
///
/// `start` and `end` are UTF-8 byte offsets into the text that was analyzed,
/// `entity_type` is an open label such as `EMAIL_ADDRESS`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedEntity {
    pub entity_type: String,
    pub start: usize,
    pub end: usize,
    pub score: f64,
}

impl DetectedEntity {
    pub fn new(entity_type: impl Into<String>, start: usize, end: usize, score: f64) -> Self {
        Self {
            entity_type: entity_type.into(),
            start,
            end,
            score,
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when `other` lies entirely within this span
    pub fn contains(&self, other: &DetectedEntity) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),
    #[error("unknown entity type in recognizer configuration: {0}")]
    UnknownEntity(String),
    #[error("recognizer failure: {0}")]
    Recognizer(String),
}

/// Locates PII spans in a text
///
/// Implementations are shared across worker threads, so they must be
/// stateless per call or synchronize internally. Identical input under the
/// same configuration must produce identical output.
pub trait EntityDetector: Send + Sync {
    fn detect(&self, text: &str, language: &str) -> Result<Vec<DetectedEntity>, DetectionError>;
}
