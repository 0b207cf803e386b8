//! Export of validated models to the model-generation stage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use thiserror::Error;

use crate::model::TopologyModel;
use crate::validation::ValidationOutcome;

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Refusing to export an invalid topology ({0} violations)")]
    InvalidTopology(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Destination for validated models
pub trait ModelSink {
    fn write_model(&mut self, model: &TopologyModel) -> Result<(), ExportError>;
}

/// Send a pipeline outcome to `sink`; invalid outcomes are refused
pub fn export(outcome: &ValidationOutcome, sink: &mut dyn ModelSink) -> Result<(), ExportError> {
    match outcome {
        ValidationOutcome::Validated(model) => sink.write_model(model),
        ValidationOutcome::Invalid(report) => Err(ExportError::InvalidTopology(report.violations.len())),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEnvelope {
    pub schema_version: u32,
    pub generated_at: DateTime<Utc>,
    pub model: TopologyModel,
}

impl ModelEnvelope {
    pub fn new(model: TopologyModel) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            generated_at: Utc::now(),
            model,
        }
    }
}

/// Writes a `ModelEnvelope` as JSON
pub struct JsonModelSink<W: Write> {
    writer: W,
    pretty: bool,
}

impl<W: Write> JsonModelSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, pretty: false }
    }

    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ModelSink for JsonModelSink<W> {
    fn write_model(&mut self, model: &TopologyModel) -> Result<(), ExportError> {
        let envelope = ModelEnvelope::new(model.clone());
        if self.pretty {
            serde_json::to_writer_pretty(&mut self.writer, &envelope)?;
        } else {
            serde_json::to_writer(&mut self.writer, &envelope)?;
        }
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        tracing::debug!(
            "Exported model with {} buses and {} connections",
            model.buses.len(),
            model.connections.len()
        );
        Ok(())
    }
}
