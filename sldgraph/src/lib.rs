//! sldgraph - topology inference for power single-line diagrams
//!
//! Turns verified bounding-box detections of diagram symbols (sources,
//! transformers, breakers, switches, nodes, PTs, loads) into a validated
//! graph of buses and connections, ready for electrical model generation.
//!
//! # Quick Start
//!
//! ```no_run
//! use sldgraph::{AnalysisOptions, SldGraphCore};
//! use std::path::Path;
//!
//! let result = SldGraphCore::analyze_file(
//!     Path::new("components.json"),
//!     &AnalysisOptions::default(),
//! ).unwrap();
//!
//! if let Some(model) = result.outcome.model() {
//!     for bus in &model.buses {
//!         println!("{}: {:?}", bus.name, bus.member_component_ids);
//!     }
//! }
//! ```
//!
//! # Features
//!
//! - **Candidate generation**: grid-indexed kNN plus a type compatibility table
//! - **Resolution**: maximum spanning forest with point-device trimming
//! - **Validation**: pluggable topology rules; invalid models are never exported
//! - **Workflow**: detection filtering, manual verification, pinned overrides,
//!   line parameter templates

pub mod config;
pub mod core;
pub mod detection;
pub mod engine;
pub mod export;
pub mod line_params;
pub mod model;
pub mod overrides;
pub mod validation;

// Re-export main types
pub use crate::core::{AnalysisOptions, AnalysisResult, SldGraphCore, SldGraphError};
pub use config::EngineConfig;
pub use engine::{CancellationToken, EngineError, PipelineState, ProgressObserver, TopologyEngine};
pub use export::{JsonModelSink, ModelSink};
pub use model::{Bus, Component, ComponentType, ResolvedConnection, TopologyModel, Warning, WarningKind};
pub use validation::{ValidationEngine, ValidationOutcome, ValidationReport, Violation, ViolationKind};

/// Load a component snapshot (convenience wrapper).
pub fn load_snapshot(path: &std::path::Path) -> Result<Vec<Component>, SldGraphError> {
    SldGraphCore::load_snapshot(path)
}

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        AnalysisOptions, AnalysisResult, Component, ComponentType, EngineConfig, SldGraphCore, SldGraphError,
        TopologyEngine, TopologyModel, ValidationOutcome,
    };
}
