//! Engine Configuration
//!
//! Tunable constants of the inference pipeline. Every field has a default,
//! so a JSON config file only needs to list what it changes:
//!
//! ```json
//! {
//!   "k_neighbors": 6,
//!   "adjacency_threshold": 250.0,
//!   "compatibility": [
//!     { "a": "source", "b": "load", "prior": 0.5 }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::model::ComponentType;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// One entry of the type-compatibility table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityEntry {
    pub a: ComponentType,
    pub b: ComponentType,
    pub prior: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Neighbours examined per component by the candidate generator
    pub k_neighbors: usize,

    /// Center-to-center distance (pixels) below which two components may connect
    pub adjacency_threshold: f64,

    /// Weight of the geometric score in edge weight and confidence
    pub geometric_weight: f64,

    /// Weight of the type-compatibility prior in edge weight and confidence
    pub compatibility_weight: f64,

    /// Share of proximity inside the geometric score
    pub proximity_weight: f64,

    /// Share of axis alignment inside the geometric score
    pub alignment_weight: f64,

    /// Maximum resolved edges on a breaker or switch
    pub point_device_max_edges: usize,

    pub bus_prefix: String,

    /// Zero-padded width of the bus sequence number
    pub bus_name_width: usize,

    /// Entries overriding or extending the built-in compatibility table
    pub compatibility: Vec<CompatibilityEntry>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            k_neighbors: 4,
            adjacency_threshold: 200.0,
            geometric_weight: 0.6,
            compatibility_weight: 0.4,
            proximity_weight: 0.75,
            alignment_weight: 0.25,
            point_device_max_edges: 2,
            bus_prefix: "母线_".to_string(),
            bus_name_width: 3,
            compatibility: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Load a config from a JSON file and validate it
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&content)?;
        tracing::info!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    /// Parse a config from a JSON string and validate it
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.k_neighbors == 0 {
            return Err(invalid("k_neighbors", "must be at least 1"));
        }
        if !(self.adjacency_threshold.is_finite() && self.adjacency_threshold > 0.0) {
            return Err(invalid("adjacency_threshold", "must be a positive number"));
        }
        for (field, value) in [
            ("geometric_weight", self.geometric_weight),
            ("compatibility_weight", self.compatibility_weight),
            ("proximity_weight", self.proximity_weight),
            ("alignment_weight", self.alignment_weight),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(field, format!("{} is outside [0, 1]", value)));
            }
        }
        if self.point_device_max_edges == 0 {
            return Err(invalid("point_device_max_edges", "must be at least 1"));
        }
        if self.bus_name_width == 0 {
            return Err(invalid("bus_name_width", "must be at least 1"));
        }
        for entry in &self.compatibility {
            if !(0.0..=1.0).contains(&entry.prior) {
                return Err(invalid(
                    "compatibility",
                    format!("prior {} for {}↔{} is outside [0, 1]", entry.prior, entry.a, entry.b),
                ));
            }
        }
        Ok(())
    }

    /// Bus name for a 1-based sequence number
    pub fn bus_name(&self, sequence: usize) -> String {
        format!("{}{:0width$}", self.bus_prefix, sequence, width = self.bus_name_width)
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}
