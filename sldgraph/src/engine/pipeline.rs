//! Pipeline orchestration.
//!
//! One run walks `Idle → Building → Candidating → Resolving → Scoring` and
//! ends in `Validated` or `Invalid`. Each stage consumes the previous
//! stage's output only. Cancellation is checked between stages; a cancelled
//! run returns an error and nothing partial.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;

use super::admission::admit_components;
use super::candidates::CandidateEdgeGenerator;
use super::geometry::GeometryIndex;
use super::resolver::TopologyResolver;
use super::scoring::ConfidenceScorer;
use crate::config::{ConfigError, EngineConfig};
use crate::model::{Component, TopologyModel};
use crate::validation::{ValidationContext, ValidationEngine, ValidationOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Idle,
    Building,
    Candidating,
    Resolving,
    Scoring,
    Validated,
    Invalid,
}

impl PipelineState {
    /// The computing stages, in run order
    pub const STAGES: [PipelineState; 4] = [
        PipelineState::Building,
        PipelineState::Candidating,
        PipelineState::Resolving,
        PipelineState::Scoring,
    ];

    pub fn can_transition_to(self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Idle, Building)
                | (Building, Candidating)
                | (Candidating, Resolving)
                | (Resolving, Scoring)
                | (Scoring, Validated)
                | (Scoring, Invalid)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Validated | PipelineState::Invalid)
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PipelineState::Idle => "idle",
            PipelineState::Building => "building",
            PipelineState::Candidating => "candidating",
            PipelineState::Resolving => "resolving",
            PipelineState::Scoring => "scoring",
            PipelineState::Validated => "validated",
            PipelineState::Invalid => "invalid",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Engine is busy with another run")]
    Busy,

    #[error("Run cancelled at stage {stage}")]
    Cancelled { stage: PipelineState },

    #[error("Illegal pipeline transition from {from} to {to}")]
    IllegalTransition { from: PipelineState, to: PipelineState },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Background worker failed: {0}")]
    Worker(String),
}

/// Tracks the current state of one run and rejects illegal moves
#[derive(Debug, Clone)]
pub struct PipelineTracker {
    state: PipelineState,
    history: Vec<PipelineState>,
}

impl PipelineTracker {
    pub fn new() -> Self {
        Self {
            state: PipelineState::Idle,
            history: vec![PipelineState::Idle],
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    pub fn advance(&mut self, next: PipelineState) -> Result<(), EngineError> {
        if !self.state.can_transition_to(next) {
            return Err(EngineError::IllegalTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        self.history.push(next);
        Ok(())
    }

    /// Discard everything and start again from `Idle`
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for PipelineTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Cooperative cancellation flag shared between caller and worker
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Receives per-stage checkpoints from a running pipeline
pub trait ProgressObserver: Send + Sync {
    fn stage_started(&self, _stage: PipelineState) {}

    /// `items` is the size of the stage's output (components indexed,
    /// candidates proposed, edges accepted, connections scored)
    fn stage_completed(&self, _stage: PipelineState, _items: usize) {}
}

pub struct NoopObserver;

impl ProgressObserver for NoopObserver {}

/// Counters describing one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub input_components: usize,
    pub admitted_components: usize,
    pub candidate_edges: usize,
    pub trimmed_edges: usize,
    pub substituted_edges: usize,
    pub bus_count: usize,
    pub connection_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineRun {
    pub outcome: ValidationOutcome,
    pub stats: RunStats,
    /// Admitted components, in input order
    #[serde(skip)]
    pub components: Vec<Component>,
    /// Model as resolved, before validation
    #[serde(skip)]
    pub model: TopologyModel,
}

/// Held for the duration of a run; releases the busy flag on drop
struct BusyGuard {
    flag: Arc<AtomicBool>,
}

impl BusyGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<Self, EngineError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| EngineError::Busy)?;
        Ok(Self { flag: Arc::clone(flag) })
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Runs the topology pipeline, at most one run at a time.
///
/// Clones share the busy flag.
#[derive(Clone)]
pub struct TopologyEngine {
    config: Arc<EngineConfig>,
    validator: Arc<ValidationEngine>,
    busy: Arc<AtomicBool>,
}

impl TopologyEngine {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            validator: Arc::new(ValidationEngine::with_default_rules()),
            busy: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn with_validator(mut self, validator: ValidationEngine) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn validator(&self) -> &ValidationEngine {
        &self.validator
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn run(&self, snapshot: &[Component]) -> Result<EngineRun, EngineError> {
        self.run_with(snapshot, &CancellationToken::new(), &NoopObserver)
    }

    pub fn run_with(
        &self,
        snapshot: &[Component],
        token: &CancellationToken,
        observer: &dyn ProgressObserver,
    ) -> Result<EngineRun, EngineError> {
        let _guard = BusyGuard::acquire(&self.busy)?;
        execute(&self.config, &self.validator, snapshot, token, observer)
    }

    /// Run on tokio's blocking pool.
    ///
    /// The busy flag is taken before this returns, so a concurrent request
    /// fails with `Busy` immediately rather than when the task is polled.
    pub fn spawn(
        &self,
        snapshot: Vec<Component>,
        token: CancellationToken,
        observer: Arc<dyn ProgressObserver>,
    ) -> Result<EngineTask, EngineError> {
        let guard = BusyGuard::acquire(&self.busy)?;
        let config = Arc::clone(&self.config);
        let validator = Arc::clone(&self.validator);

        let handle = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            execute(&config, &validator, &snapshot, &token, observer.as_ref())
        });
        Ok(EngineTask { handle })
    }
}

/// Handle to a run on the blocking pool
pub struct EngineTask {
    handle: JoinHandle<Result<EngineRun, EngineError>>,
}

impl EngineTask {
    pub async fn wait(self) -> Result<EngineRun, EngineError> {
        self.handle
            .await
            .map_err(|e| EngineError::Worker(e.to_string()))?
    }
}

fn checkpoint(token: &CancellationToken, tracker: &PipelineTracker) -> Result<(), EngineError> {
    if token.is_cancelled() {
        tracing::info!("Pipeline cancelled at stage {}", tracker.state());
        return Err(EngineError::Cancelled {
            stage: tracker.state(),
        });
    }
    Ok(())
}

fn enter(
    stage: PipelineState,
    tracker: &mut PipelineTracker,
    token: &CancellationToken,
    observer: &dyn ProgressObserver,
) -> Result<(), EngineError> {
    checkpoint(token, tracker)?;
    tracker.advance(stage)?;
    tracing::debug!("Entering stage {}", stage);
    observer.stage_started(stage);
    Ok(())
}

fn execute(
    config: &EngineConfig,
    validator: &ValidationEngine,
    snapshot: &[Component],
    token: &CancellationToken,
    observer: &dyn ProgressObserver,
) -> Result<EngineRun, EngineError> {
    let mut tracker = PipelineTracker::new();
    let mut stats = RunStats {
        input_components: snapshot.len(),
        ..RunStats::default()
    };

    enter(PipelineState::Building, &mut tracker, token, observer)?;
    let admission = admit_components(snapshot);
    let components = admission.admitted;
    let index = GeometryIndex::build(&components);
    stats.admitted_components = index.len();
    observer.stage_completed(PipelineState::Building, index.len());

    enter(PipelineState::Candidating, &mut tracker, token, observer)?;
    let candidates = CandidateEdgeGenerator::from_config(config).generate(&index, &components);
    stats.candidate_edges = candidates.len();
    observer.stage_completed(PipelineState::Candidating, candidates.len());

    enter(PipelineState::Resolving, &mut tracker, token, observer)?;
    let resolution = TopologyResolver::from_config(config).resolve(&components, &candidates);
    stats.trimmed_edges = resolution.trimmed;
    stats.substituted_edges = resolution.substituted;
    stats.bus_count = resolution.buses.len();
    observer.stage_completed(PipelineState::Resolving, resolution.accepted.len());

    enter(PipelineState::Scoring, &mut tracker, token, observer)?;
    let connections = ConfidenceScorer::from_config(config).connections(&resolution.accepted);
    stats.connection_count = connections.len();
    observer.stage_completed(PipelineState::Scoring, connections.len());

    checkpoint(token, &tracker)?;
    let mut warnings = admission.warnings;
    warnings.extend(resolution.warnings);
    let model = TopologyModel {
        buses: resolution.buses,
        connections,
        warnings,
    };

    let ctx = ValidationContext {
        components: &components,
        model: &model,
        point_device_max_edges: config.point_device_max_edges,
    };
    let outcome = validator.validate(&ctx);
    let terminal = if outcome.is_valid() {
        PipelineState::Validated
    } else {
        PipelineState::Invalid
    };
    tracker.advance(terminal)?;

    tracing::info!(
        "Pipeline {}: {} components, {} candidates, {} buses, {} connections, {} warnings",
        terminal,
        stats.admitted_components,
        stats.candidate_edges,
        stats.bus_count,
        stats.connection_count,
        outcome.warnings().len()
    );

    Ok(EngineRun {
        outcome,
        stats,
        components,
        model,
    })
}
