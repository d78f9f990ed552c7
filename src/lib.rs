//! De-identification of CSV uploads.
//!
//! Every non-blank data cell is run through an [`detection::EntityDetector`]
//! and a [`masking::MaskingEngine`]; the result is a masked copy of the CSV
//! plus a summary report of the entity types found.

pub mod api;
pub mod detection;
pub mod masking;
pub mod pipeline;
pub mod settings;
pub mod utils;

pub use pipeline::{DeidentifiedOutput, Deidentifier, PipelineError};
