//! Confidence Scorer
//!
//! `confidence = clamp(wg * geometric + wt * compatibility, 0, 1)` with
//! `wg = 0.6`, `wt = 0.4` by default. The same weighted sum is the edge
//! weight used by the resolver, so the scorer is the single place the
//! formula lives. Values are always recomputed from their inputs.

use serde::{Deserialize, Serialize};

use super::resolver::AcceptedEdge;
use crate::config::EngineConfig;
use crate::model::{CandidateEdge, Provenance, ResolvedConnection};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceScorer {
    pub geometric_weight: f64,
    pub compatibility_weight: f64,
}

impl ConfidenceScorer {
    pub fn new(geometric_weight: f64, compatibility_weight: f64) -> Self {
        Self {
            geometric_weight,
            compatibility_weight,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.geometric_weight, config.compatibility_weight)
    }

    pub fn score(&self, geometric_score: f64, type_compatibility: f64) -> f64 {
        let raw = self.geometric_weight * geometric_score + self.compatibility_weight * type_compatibility;
        if raw.is_nan() {
            return 0.0;
        }
        raw.clamp(0.0, 1.0)
    }

    pub fn score_edge(&self, edge: &CandidateEdge) -> f64 {
        self.score(edge.geometric_score, edge.type_compatibility)
    }

    /// Turn accepted edges into connections, numbered `c1..cn` in order
    pub fn connections(&self, accepted: &[AcceptedEdge]) -> Vec<ResolvedConnection> {
        accepted
            .iter()
            .enumerate()
            .map(|(i, a)| ResolvedConnection {
                id: format!("c{}", i + 1),
                from_component_id: a.edge.from_id.clone(),
                to_component_id: a.edge.to_id.clone(),
                bus_name: a.bus_name.clone(),
                confidence: self.score_edge(&a.edge),
                geometric_score: a.edge.geometric_score,
                type_compatibility: a.edge.type_compatibility,
                provenance: Provenance::Engine,
            })
            .collect()
    }

    /// Recompute the confidence of every connection in place.
    ///
    /// Manual connections keep their pinned confidence.
    pub fn rescore(&self, connections: &mut [ResolvedConnection]) {
        for connection in connections {
            if connection.provenance == Provenance::Engine {
                connection.confidence = self.score(connection.geometric_score, connection.type_compatibility);
            }
        }
    }
}

impl Default for ConfidenceScorer {
    fn default() -> Self {
        Self::new(0.6, 0.4)
    }
}

/// Round to three decimals for display
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Percent label with one decimal, e.g. `0.95 -> "95.0%"`
pub fn percent_label(confidence: f64) -> String {
    format!("{:.1}%", confidence * 100.0)
}

/// Coarse confidence grading used when presenting connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

impl ConfidenceBand {
    pub fn of(confidence: f64) -> Self {
        if confidence >= 0.9 {
            ConfidenceBand::High
        } else if confidence >= 0.8 {
            ConfidenceBand::Medium
        } else {
            ConfidenceBand::Low
        }
    }
}

impl std::fmt::Display for ConfidenceBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfidenceBand::High => write!(f, "high"),
            ConfidenceBand::Medium => write!(f, "medium"),
            ConfidenceBand::Low => write!(f, "low"),
        }
    }
}
