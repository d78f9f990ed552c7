//! CSV de-identification pipeline
//!
//! Raw CSV text goes through the [`GridProcessor`], which hands every
//! non-blank data cell to the [`CellScanner`]. The per-type counts collected
//! on the way are rendered by [`build_report`].

pub mod grid;
pub mod report;
pub mod scanner;

use std::sync::Arc;
use tracing::{info, instrument};

use crate::detection::{recognizer::DEFAULT_LANGUAGE, DetectionError, EntityDetector, PatternRecognizer};
use crate::masking::{Anonymizer, MaskingEngine, MaskingError, OperatorConfig};

pub use grid::{GridProcessor, LineEnding};
pub use report::{build_report, display_label, EntityCounts};
pub use scanner::{CellScanner, ScanError, ScanOutcome};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("input is not valid UTF-8: {0}")]
    Decoding(#[from] std::str::Utf8Error),

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("entity detection failed at row {row}, column {column}: {source}")]
    Detection {
        row: usize,
        column: usize,
        #[source]
        source: DetectionError,
    },

    #[error("masking failed at row {row}, column {column}: {source}")]
    Masking {
        row: usize,
        column: usize,
        #[source]
        source: MaskingError,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// True when the input itself was at fault rather than the service
    pub fn is_input_error(&self) -> bool {
        matches!(self, PipelineError::Decoding(_) | PipelineError::MalformedInput(_))
    }
}

/// Everything one successful run produces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeidentifiedOutput {
    pub csv: String,
    pub report: String,
    pub counts: EntityCounts,
}

/// Entry point used by the transport layer and the CLI
///
/// Holds shared handles to the detector and masking engine, built once at
/// startup and reused by every invocation. Cloning is cheap.
#[derive(Clone)]
pub struct Deidentifier {
    detector: Arc<dyn EntityDetector>,
    engine: Arc<dyn MaskingEngine>,
    operators: OperatorConfig,
    language: String,
    line_ending: LineEnding,
}

impl std::fmt::Debug for Deidentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deidentifier")
            .field("operators", &self.operators)
            .field("language", &self.language)
            .field("line_ending", &self.line_ending)
            .finish_non_exhaustive()
    }
}

impl Default for Deidentifier {
    fn default() -> Self {
        Self::new(Arc::new(PatternRecognizer::default()), Arc::new(Anonymizer::new()))
    }
}

impl Deidentifier {
    pub fn new(detector: Arc<dyn EntityDetector>, engine: Arc<dyn MaskingEngine>) -> Self {
        Self {
            detector,
            engine,
            operators: OperatorConfig::default(),
            language: DEFAULT_LANGUAGE.to_string(),
            line_ending: LineEnding::default(),
        }
    }

    pub fn with_operators(mut self, operators: OperatorConfig) -> Self {
        self.operators = operators;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = line_ending;
        self
    }

    pub fn operators(&self) -> &OperatorConfig {
        &self.operators
    }

    /// De-identifies raw upload bytes, which must be UTF-8
    pub fn deidentify_bytes(&self, input: &[u8]) -> Result<DeidentifiedOutput, PipelineError> {
        let text = std::str::from_utf8(input)?;
        self.deidentify(text)
    }

    /// De-identifies CSV text and builds the summary report
    ///
    /// Either every non-blank data cell is scanned and the full report is
    /// built, or an error is returned and nothing else.
    #[instrument(skip_all, fields(bytes = csv_text.len()))]
    pub fn deidentify(&self, csv_text: &str) -> Result<DeidentifiedOutput, PipelineError> {
        let scanner = CellScanner::new(
            self.detector.as_ref(),
            self.engine.as_ref(),
            &self.operators,
            &self.language,
        );
        let (csv, counts) = GridProcessor::new(scanner, self.line_ending).process(csv_text)?;
        let report = build_report(&counts);

        info!(
            "De-identification finished: {} entities across {} types",
            counts.total(),
            counts.len()
        );
        Ok(DeidentifiedOutput {
            csv,
            report,
            counts,
        })
    }
}
