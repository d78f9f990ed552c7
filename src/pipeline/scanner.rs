use crate::detection::{DetectionError, EntityDetector};
use crate::masking::{MaskingEngine, MaskingError, OperatorConfig};

/// Result of scanning one cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    /// Cell text after masking, or the original text when nothing was found
    pub masked: String,
    /// One label per detected occurrence, duplicates kept, in detector order
    pub entity_types: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error(transparent)]
    Detection(#[from] DetectionError),
    #[error(transparent)]
    Masking(#[from] MaskingError),
}

/// Runs detection and masking on a single cell
///
/// The caller is expected to skip blank cells; the scanner analyzes whatever
/// it is given.
pub struct CellScanner<'a> {
    detector: &'a dyn EntityDetector,
    engine: &'a dyn MaskingEngine,
    operators: &'a OperatorConfig,
    language: &'a str,
}

impl<'a> CellScanner<'a> {
    pub fn new(
        detector: &'a dyn EntityDetector,
        engine: &'a dyn MaskingEngine,
        operators: &'a OperatorConfig,
        language: &'a str,
    ) -> Self {
        Self {
            detector,
            engine,
            operators,
            language,
        }
    }

    pub fn scan(&self, cell: &str) -> Result<ScanOutcome, ScanError> {
        let entities = self.detector.detect(cell, self.language)?;
        if entities.is_empty() {
            return Ok(ScanOutcome {
                masked: cell.to_string(),
                entity_types: Vec::new(),
            });
        }

        let masked = self.engine.mask(cell, &entities, self.operators)?;
        let entity_types = entities.into_iter().map(|e| e.entity_type).collect();
        Ok(ScanOutcome {
            masked,
            entity_types,
        })
    }
}
