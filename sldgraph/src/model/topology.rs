//! Topology Graph
//!
//! Read-only graph view of a resolved [`TopologyModel`] using petgraph.
//! Component nodes are joined by connection edges, which enables:
//! - Neighbor and degree queries
//! - Path finding between components
//! - Bus membership lookups

use petgraph::graph::{NodeIndex, UnGraph};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::schema::*;

/// Node weight: the component and the bus it sits on (if any)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyNode {
    pub component: Component,
    pub bus_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TopologyGraph {
    graph: UnGraph<TopologyNode, ResolvedConnection>,

    /// Index mapping: component id -> node index
    component_indices: HashMap<String, NodeIndex>,

    bus_names: Vec<String>,
}

impl TopologyGraph {
    /// Build the graph from the components and the resolved model.
    ///
    /// Connections whose endpoints are not among `components` are skipped.
    pub fn from_model(components: &[Component], model: &TopologyModel) -> Self {
        let mut graph = UnGraph::new_undirected();
        let mut component_indices = HashMap::new();

        for component in components {
            if component_indices.contains_key(&component.id) {
                continue;
            }
            let bus_name = model
                .buses_for_component(&component.id)
                .first()
                .map(|s| s.to_string());
            let idx = graph.add_node(TopologyNode {
                component: component.clone(),
                bus_name,
            });
            component_indices.insert(component.id.clone(), idx);
        }

        for connection in &model.connections {
            let from = component_indices.get(&connection.from_component_id);
            let to = component_indices.get(&connection.to_component_id);
            if let (Some(&a), Some(&b)) = (from, to) {
                graph.add_edge(a, b, connection.clone());
            }
        }

        Self {
            graph,
            component_indices,
            bus_names: model.buses.iter().map(|b| b.name.clone()).collect(),
        }
    }

    pub fn get_component(&self, id: &str) -> Option<&Component> {
        self.component_indices
            .get(id)
            .and_then(|&idx| self.graph.node_weight(idx))
            .map(|n| &n.component)
    }

    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.graph.node_weights().map(|n| &n.component)
    }

    /// Ids of the components directly connected to `id`, sorted
    pub fn neighbors(&self, id: &str) -> Vec<&str> {
        let Some(&idx) = self.component_indices.get(id) else {
            return Vec::new();
        };

        let mut ids: Vec<&str> = self
            .graph
            .neighbors(idx)
            .filter_map(|n| self.graph.node_weight(n))
            .map(|n| n.component.id.as_str())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    pub fn degree(&self, id: &str) -> usize {
        self.component_indices
            .get(id)
            .map(|&idx| self.graph.edges(idx).count())
            .unwrap_or(0)
    }

    pub fn connections_for_component(&self, id: &str) -> Vec<&ResolvedConnection> {
        let Some(&idx) = self.component_indices.get(id) else {
            return Vec::new();
        };

        self.graph.edges(idx).map(|edge| edge.weight()).collect()
    }

    /// Components on a bus, in id order
    pub fn components_on_bus(&self, bus_name: &str) -> Vec<&Component> {
        let mut members: Vec<&Component> = self
            .graph
            .node_weights()
            .filter(|n| n.bus_name.as_deref() == Some(bus_name))
            .map(|n| &n.component)
            .collect();
        members.sort_by(|a, b| a.id.cmp(&b.id));
        members
    }

    /// Components with no connection at all
    pub fn isolated_components(&self) -> Vec<&Component> {
        let mut isolated: Vec<&Component> = self
            .graph
            .node_indices()
            .filter(|&idx| self.graph.edges(idx).next().is_none())
            .filter_map(|idx| self.graph.node_weight(idx))
            .map(|n| &n.component)
            .collect();
        isolated.sort_by(|a, b| a.id.cmp(&b.id));
        isolated
    }

    /// Find a path between two components through resolved connections
    pub fn find_path(&self, from_id: &str, to_id: &str) -> Option<Vec<String>> {
        use petgraph::algo::astar;

        let from_idx = self.component_indices.get(from_id)?;
        let to_idx = self.component_indices.get(to_id)?;

        let result = astar(&self.graph, *from_idx, |n| n == *to_idx, |_| 1, |_| 0);

        result.map(|(_, path)| {
            path.into_iter()
                .filter_map(|idx| self.graph.node_weight(idx))
                .map(|n| n.component.id.clone())
                .collect()
        })
    }

    pub fn stats(&self) -> TopologyStats {
        TopologyStats {
            component_count: self.component_indices.len(),
            bus_count: self.bus_names.len(),
            connection_count: self.graph.edge_count(),
            isolated_count: self.isolated_components().len(),
            manual_connection_count: self
                .graph
                .edge_weights()
                .filter(|c| c.provenance == Provenance::Manual)
                .count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyStats {
    pub component_count: usize,
    pub bus_count: usize,
    pub connection_count: usize,
    pub isolated_count: usize,
    pub manual_connection_count: usize,
}
