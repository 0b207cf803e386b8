//! Core analysis API shared by the CLI and library callers.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::{ConfigError, EngineConfig};
use crate::detection::{DetectionError, VerificationError};
use crate::engine::{EngineError, RunStats, TopologyEngine};
use crate::export::ExportError;
use crate::line_params::LineParamError;
use crate::model::Component;
use crate::overrides::{reconcile, OverrideSet};
use crate::validation::{ValidationContext, ValidationOutcome};

#[derive(Debug, thiserror::Error)]
pub enum SldGraphError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("Export error: {0}")]
    Export(#[from] ExportError),
    #[error("Detection error: {0}")]
    Detection(#[from] DetectionError),
    #[error("Line parameter error: {0}")]
    LineParam(#[from] LineParamError),
    #[error("Verification error: {0}")]
    Verification(#[from] VerificationError),
}

/// Options for analysis runs.
#[derive(Clone, Debug, Default)]
pub struct AnalysisOptions {
    pub config: EngineConfig,
    /// Treat any warning as a failure when deciding pass/fail
    pub strict: bool,
}

impl AnalysisOptions {
    pub fn with_config_file(path: &Path) -> Result<Self, SldGraphError> {
        Ok(Self {
            config: EngineConfig::from_file(path)?,
            ..Self::default()
        })
    }
}

/// Outcome of analyzing one snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    pub outcome: ValidationOutcome,
    pub stats: RunStats,
}

impl AnalysisResult {
    pub fn is_valid(&self) -> bool {
        self.outcome.is_valid()
    }

    pub fn warning_count(&self) -> usize {
        self.outcome.warnings().len()
    }

    pub fn violation_count(&self) -> usize {
        self.outcome.violations().len()
    }

    /// Valid, and in strict mode also free of warnings
    pub fn passes(&self, strict: bool) -> bool {
        self.is_valid() && !(strict && self.warning_count() > 0)
    }
}

pub struct SldGraphCore;

impl SldGraphCore {
    /// Read a component snapshot (JSON array of components).
    pub fn load_snapshot(path: &Path) -> Result<Vec<Component>, SldGraphError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse_snapshot(&content)
    }

    pub fn parse_snapshot(json: &str) -> Result<Vec<Component>, SldGraphError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Run the full pipeline over a snapshot.
    pub fn analyze(components: &[Component], options: &AnalysisOptions) -> Result<AnalysisResult, SldGraphError> {
        let engine = TopologyEngine::new(options.config.clone())?;
        let run = engine.run(components)?;
        Ok(AnalysisResult {
            file: None,
            outcome: run.outcome,
            stats: run.stats,
        })
    }

    /// Load and analyze a snapshot file.
    pub fn analyze_file(path: &Path, options: &AnalysisOptions) -> Result<AnalysisResult, SldGraphError> {
        let components = Self::load_snapshot(path)?;
        let mut result = Self::analyze(&components, options)?;
        result.file = Some(path.to_path_buf());
        Ok(result)
    }

    /// Run the pipeline, layer manual overrides on the resolved model, and
    /// validate the reconciled model.
    pub fn analyze_with_overrides(
        components: &[Component],
        overrides: &OverrideSet,
        options: &AnalysisOptions,
    ) -> Result<AnalysisResult, SldGraphError> {
        let engine = TopologyEngine::new(options.config.clone())?;
        let run = engine.run(components)?;
        if overrides.is_empty() {
            return Ok(AnalysisResult {
                file: None,
                outcome: run.outcome,
                stats: run.stats,
            });
        }

        let model = reconcile(&run.model, &run.components, overrides, engine.config());
        let ctx = ValidationContext {
            components: &run.components,
            model: &model,
            point_device_max_edges: engine.config().point_device_max_edges,
        };
        let outcome = engine.validator().validate(&ctx);

        let mut stats = run.stats;
        stats.bus_count = model.buses.len();
        stats.connection_count = model.connections.len();
        Ok(AnalysisResult {
            file: None,
            outcome,
            stats,
        })
    }
}
