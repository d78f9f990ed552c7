//! Layered application configuration
//!
//! Built-in defaults, then `deidentifier.toml` (or an explicit file), then
//! `DEIDENTIFY_*` environment variables with `__` between nested keys, e.g.
//! `DEIDENTIFY_SERVER__PORT=9000`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::api::config::ApiConfig;
use crate::detection::recognizer::DEFAULT_LANGUAGE;
use crate::detection::PatternRecognizer;
use crate::masking::{Anonymizer, OperatorConfig};
use crate::pipeline::{Deidentifier, LineEnding};

pub const DEFAULT_CONFIG_FILE: &str = "deidentifier";
pub const ENV_PREFIX: &str = "DEIDENTIFY";

/// Options for the de-identification pipeline itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Working language handed to the detector
    pub language: String,

    /// Line terminator of the output CSV
    pub line_ending: LineEnding,

    /// Detector results below this score are ignored
    pub min_score: f64,

    /// Entity types to detect; empty means every built-in type
    pub entities: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            line_ending: LineEnding::default(),
            min_score: 0.0,
            entities: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Write logs to a timestamped file in this directory instead of stderr
    pub log_dir: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ApiConfig,
    pub pipeline: PipelineConfig,
    pub operators: OperatorConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Loads the configuration layers
    ///
    /// `path`, when given, must exist. Without it the default file is read
    /// only if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        builder = match path {
            Some(path) => {
                debug!("Loading configuration from {}", path.display());
                builder.add_source(::config::File::from(path).required(true))
            }
            None => builder.add_source(::config::File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };
        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        );

        let settings = builder.build().context("Failed to read configuration")?;
        let config: Self = settings
            .try_deserialize()
            .context("Invalid configuration")?;
        config.server.validate().context("Invalid server configuration")?;
        Ok(config)
    }

    /// Builds the shared pipeline described by this configuration
    pub fn build_deidentifier(&self) -> Result<Deidentifier> {
        self.operators
            .validate()
            .context("Invalid masking operators")?;

        let recognizer = PatternRecognizer::new(&self.pipeline.language)
            .with_entities(&self.pipeline.entities)
            .context("Invalid entity selection")?
            .with_min_score(self.pipeline.min_score);
        debug!("Recognizer configured: {:?}", recognizer);

        Ok(Deidentifier::new(Arc::new(recognizer), Arc::new(Anonymizer::new()))
            .with_operators(self.operators.clone())
            .with_language(self.pipeline.language.clone())
            .with_line_ending(self.pipeline.line_ending))
    }
}
