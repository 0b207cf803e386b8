//! Topology Inference Engine
//!
//! Turns a verified component snapshot into buses and connections:
//! geometry index, candidate generation, resolution, scoring, then
//! validation.

pub mod admission;
pub mod candidates;
pub mod compatibility;
pub mod geometry;
pub mod pipeline;
pub mod resolver;
pub mod scoring;

pub use admission::{admit_components, Admission};
pub use candidates::CandidateEdgeGenerator;
pub use compatibility::CompatibilityTable;
pub use geometry::{GeometryIndex, Neighbor};
pub use pipeline::{
    CancellationToken, EngineError, EngineRun, EngineTask, NoopObserver, PipelineState, PipelineTracker,
    ProgressObserver, RunStats, TopologyEngine,
};
pub use resolver::{group_buses, isolated_warning, AcceptedEdge, BusGrouping, Resolution, TopologyResolver};
pub use scoring::{percent_label, round3, ConfidenceBand, ConfidenceScorer};
