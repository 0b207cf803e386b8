//! Candidate Edge Generator
//!
//! Proposes connections between geometrically adjacent, type-compatible
//! components. Each component looks at its K nearest neighbours; a pair is
//! proposed when the center distance is below the adjacency threshold and
//! the type pair has a compatibility prior. Unordered pairs are
//! deduplicated, keeping the higher geometric score.

use std::collections::BTreeMap;

use super::compatibility::CompatibilityTable;
use super::geometry::GeometryIndex;
use crate::config::EngineConfig;
use crate::model::{BoundingBox, CandidateEdge, Component};

#[derive(Debug, Clone)]
pub struct CandidateEdgeGenerator {
    pub k_neighbors: usize,
    pub adjacency_threshold: f64,
    pub proximity_weight: f64,
    pub alignment_weight: f64,
    pub table: CompatibilityTable,
}

impl CandidateEdgeGenerator {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            k_neighbors: config.k_neighbors,
            adjacency_threshold: config.adjacency_threshold,
            proximity_weight: config.proximity_weight,
            alignment_weight: config.alignment_weight,
            table: CompatibilityTable::with_overrides(&config.compatibility),
        }
    }

    /// Generate candidates for `components`, which must be the set `index`
    /// was built from. Output is sorted by `(from_id, to_id)`.
    pub fn generate(&self, index: &GeometryIndex<'_>, components: &[Component]) -> Vec<CandidateEdge> {
        let mut by_pair: BTreeMap<(String, String), CandidateEdge> = BTreeMap::new();

        for component in components {
            for neighbor in index.k_nearest(&component.id, self.k_neighbors) {
                if neighbor.distance >= self.adjacency_threshold {
                    continue;
                }
                let other = neighbor.component;
                let Some(prior) = self.table.prior(component.component_type, other.component_type) else {
                    continue;
                };

                let geometric = self.geometric_score(
                    &component.bounding_box,
                    &other.bounding_box,
                    neighbor.distance,
                );
                let edge = CandidateEdge::new(&component.id, &other.id, geometric, prior);
                let key = (edge.from_id.clone(), edge.to_id.clone());

                match by_pair.get(&key) {
                    Some(existing) if existing.geometric_score >= edge.geometric_score => {}
                    _ => {
                        by_pair.insert(key, edge);
                    }
                }
            }
        }

        tracing::debug!(
            "Generated {} candidate edges from {} components",
            by_pair.len(),
            components.len()
        );
        by_pair.into_values().collect()
    }

    /// Proximity and alignment blended into [0, 1].
    ///
    /// Proximity falls linearly from 1 at zero distance to 0 at the
    /// threshold; alignment is the stronger axis-projection overlap.
    pub fn geometric_score(&self, a: &BoundingBox, b: &BoundingBox, distance: f64) -> f64 {
        let proximity = (1.0 - distance / self.adjacency_threshold).clamp(0.0, 1.0);
        let alignment = a.horizontal_overlap(b).max(a.vertical_overlap(b));
        (self.proximity_weight * proximity + self.alignment_weight * alignment).clamp(0.0, 1.0)
    }
}

impl Default for CandidateEdgeGenerator {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}
