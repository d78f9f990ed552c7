pub mod anonymizer;
pub mod operators;

pub use anonymizer::Anonymizer;
pub use operators::{Operator, OperatorConfig, DEFAULT_REPLACEMENT};

use crate::detection::DetectedEntity;

#[derive(Debug, thiserror::Error)]
pub enum MaskingError {
    #[error("span {start}..{end} is out of bounds or splits a character (text length {len})")]
    InvalidSpan { start: usize, end: usize, len: usize },
    #[error("invalid operator configuration: {0}")]
    InvalidOperator(String),
}

/// Rewrites the detected spans of a text according to an operator policy
///
/// The engine resolves overlapping and nested spans itself. Implementations
/// are shared across worker threads.
pub trait MaskingEngine: Send + Sync {
    fn mask(
        &self,
        text: &str,
        entities: &[DetectedEntity],
        operators: &OperatorConfig,
    ) -> Result<String, MaskingError>;
}
