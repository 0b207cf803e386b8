//! Topology Resolver
//!
//! Reduces candidate edges to a consistent connection forest and assigns
//! buses.
//!
//! 1. Rank candidates by weight (descending), ties by `(from_id, to_id)`.
//! 2. Maximum-weight spanning forest (Kruskal over the ranking).
//! 3. Point devices (breakers, switches) keep their best two edges. When a
//!    trimmed edge splits a group, the best-ranked candidate that rejoins
//!    the two sides through a different partner is substituted.
//! 4. Each connected group with two or more members becomes a bus, named in
//!    ascending order of the group's smallest component id.

use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableUnGraph};
use petgraph::unionfind::UnionFind;
use petgraph::visit::{Bfs, EdgeRef};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use super::scoring::ConfidenceScorer;
use crate::config::EngineConfig;
use crate::model::{Bus, CandidateEdge, Component, Warning, WarningKind};

/// A candidate edge that survived resolution, tagged with its bus
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedEdge {
    pub edge: CandidateEdge,
    pub bus_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub buses: Vec<Bus>,
    /// Ordered by bus, then by `(from_id, to_id)`
    pub accepted: Vec<AcceptedEdge>,
    /// Components left without any edge, sorted by id
    pub isolated: Vec<String>,
    pub warnings: Vec<Warning>,
    /// Edges removed from over-connected point devices
    pub trimmed: usize,
    /// Edges added back to keep trimmed groups connected
    pub substituted: usize,
}

#[derive(Debug, Clone)]
struct RankedEdge<'a> {
    edge: &'a CandidateEdge,
    a: usize,
    b: usize,
    weight: f64,
}

impl RankedEdge<'_> {
    fn touches(&self, node: usize) -> bool {
        self.a == node || self.b == node
    }
}

type Forest = StableUnGraph<usize, usize>;

#[derive(Debug, Clone)]
pub struct TopologyResolver {
    scorer: ConfidenceScorer,
    point_device_max_edges: usize,
    config: EngineConfig,
}

impl TopologyResolver {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            scorer: ConfidenceScorer::from_config(config),
            point_device_max_edges: config.point_device_max_edges,
            config: config.clone(),
        }
    }

    /// Resolve `candidates` over the admitted `components`.
    ///
    /// Candidates that reference unknown components or loop back onto the
    /// same component are ignored.
    pub fn resolve(&self, components: &[Component], candidates: &[CandidateEdge]) -> Resolution {
        let positions: HashMap<&str, usize> = components
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id.as_str(), i))
            .collect();

        let ranked = self.rank(candidates, &positions);
        let mut forest = Forest::with_capacity(components.len(), ranked.len());
        for i in 0..components.len() {
            forest.add_node(i);
        }

        let mut uf = UnionFind::new(components.len());
        for (rank, edge) in ranked.iter().enumerate() {
            if uf.union(edge.a, edge.b) {
                forest.add_edge(NodeIndex::new(edge.a), NodeIndex::new(edge.b), rank);
            }
        }

        let mut resolution = Resolution::default();

        let mut point_devices: Vec<usize> = (0..components.len())
            .filter(|&i| components[i].component_type.is_point_device())
            .collect();
        point_devices.sort_by(|&x, &y| components[x].id.cmp(&components[y].id));
        for device in point_devices {
            self.trim_point_device(device, &mut forest, &ranked, components, &mut resolution);
        }

        self.assign_buses(&forest, &ranked, components, &mut resolution);

        tracing::debug!(
            "Resolved {} buses, {} edges, {} isolated ({} trimmed, {} substituted)",
            resolution.buses.len(),
            resolution.accepted.len(),
            resolution.isolated.len(),
            resolution.trimmed,
            resolution.substituted
        );
        resolution
    }

    /// Edge weight, identical to the confidence formula
    pub fn weight(&self, edge: &CandidateEdge) -> f64 {
        self.scorer.score_edge(edge)
    }

    fn rank<'a>(&self, candidates: &'a [CandidateEdge], positions: &HashMap<&str, usize>) -> Vec<RankedEdge<'a>> {
        let mut seen: HashSet<(usize, usize)> = HashSet::new();
        let mut ranked: Vec<RankedEdge<'a>> = Vec::with_capacity(candidates.len());

        for edge in candidates {
            let (Some(&a), Some(&b)) = (positions.get(edge.from_id.as_str()), positions.get(edge.to_id.as_str())) else {
                tracing::debug!("Ignoring candidate {:?} with unknown endpoint", edge.pair());
                continue;
            };
            if a == b || !seen.insert((a.min(b), a.max(b))) {
                continue;
            }
            ranked.push(RankedEdge {
                edge,
                a,
                b,
                weight: self.weight(edge),
            });
        }

        ranked.sort_by(|x, y| {
            y.weight
                .partial_cmp(&x.weight)
                .unwrap_or(Ordering::Equal)
                .then_with(|| x.edge.pair().cmp(&y.edge.pair()))
        });
        ranked
    }

    fn has_capacity(&self, forest: &Forest, node: usize, components: &[Component]) -> bool {
        !components[node].component_type.is_point_device()
            || forest.edges(NodeIndex::new(node)).count() < self.point_device_max_edges
    }

    fn trim_point_device(
        &self,
        device: usize,
        forest: &mut Forest,
        ranked: &[RankedEdge<'_>],
        components: &[Component],
        resolution: &mut Resolution,
    ) {
        let device_node = NodeIndex::new(device);

        loop {
            let mut incident: Vec<(usize, EdgeIndex, usize)> = forest
                .edges(device_node)
                .map(|e| {
                    let partner = if e.source() == device_node { e.target() } else { e.source() };
                    (*e.weight(), e.id(), partner.index())
                })
                .collect();
            if incident.len() <= self.point_device_max_edges {
                return;
            }

            incident.sort_by_key(|(rank, _, _)| *rank);
            let Some(&(rank, edge_id, partner)) = incident.last() else {
                return;
            };
            forest.remove_edge(edge_id);
            resolution.trimmed += 1;
            tracing::debug!(
                "Trimmed {}-{} from point device {}",
                components[device].id,
                components[partner].id,
                components[device].id
            );

            let near = reachable(forest, device);
            if near.contains(&partner) {
                continue;
            }
            let far = reachable(forest, partner);

            let substitute = ranked.iter().enumerate().find(|(r, e)| {
                *r != rank
                    && !e.touches(device)
                    && ((near.contains(&e.a) && far.contains(&e.b)) || (near.contains(&e.b) && far.contains(&e.a)))
                    && self.has_capacity(forest, e.a, components)
                    && self.has_capacity(forest, e.b, components)
            });

            if let Some((r, e)) = substitute {
                forest.add_edge(NodeIndex::new(e.a), NodeIndex::new(e.b), r);
                resolution.substituted += 1;
                tracing::debug!(
                    "Substituted {}-{} to keep group connected",
                    e.edge.from_id,
                    e.edge.to_id
                );
            }
        }
    }

    fn assign_buses(
        &self,
        forest: &Forest,
        ranked: &[RankedEdge<'_>],
        components: &[Component],
        resolution: &mut Resolution,
    ) {
        let ids: Vec<&str> = components.iter().map(|c| c.id.as_str()).collect();
        let links: Vec<(usize, usize)> = forest
            .edge_indices()
            .filter_map(|e| forest.edge_endpoints(e))
            .map(|(a, b)| (a.index(), b.index()))
            .collect();
        let grouping = group_buses(&ids, &links, &self.config);

        let mut accepted: BTreeMap<(usize, String, String), AcceptedEdge> = BTreeMap::new();
        for edge in forest.edge_indices() {
            let (Some(&rank), Some((a, _))) = (forest.edge_weight(edge), forest.edge_endpoints(edge)) else {
                continue;
            };
            let Some(seq) = grouping.bus_of[a.index()] else {
                continue;
            };
            let candidate = ranked[rank].edge;
            accepted.insert(
                (seq, candidate.from_id.clone(), candidate.to_id.clone()),
                AcceptedEdge {
                    edge: candidate.clone(),
                    bus_name: grouping.buses[seq].name.clone(),
                },
            );
        }

        resolution.accepted = accepted.into_values().collect();
        resolution.warnings.extend(grouping.isolated.iter().map(|id| isolated_warning(id)));
        resolution.isolated = grouping.isolated;
        resolution.buses = grouping.buses;
    }
}

/// Connected groups of components, named as buses
#[derive(Debug, Clone, Default)]
pub struct BusGrouping {
    pub buses: Vec<Bus>,
    /// Index into `buses` for each input position; `None` when isolated
    pub bus_of: Vec<Option<usize>>,
    /// Ids without any link, sorted
    pub isolated: Vec<String>,
}

/// Group `ids` by the undirected `links` between their positions.
///
/// Every group with at least two members becomes a bus; buses are named in
/// ascending order of their smallest member id.
pub fn group_buses(ids: &[&str], links: &[(usize, usize)], config: &EngineConfig) -> BusGrouping {
    let mut uf = UnionFind::new(ids.len());
    let mut linked = vec![false; ids.len()];
    for &(a, b) in links {
        uf.union(a, b);
        linked[a] = true;
        linked[b] = true;
    }

    let mut grouping = BusGrouping {
        bus_of: vec![None; ids.len()],
        ..Default::default()
    };

    // root -> members, for linked positions only
    let mut groups: HashMap<usize, BTreeSet<String>> = HashMap::new();
    for (i, id) in ids.iter().enumerate() {
        if linked[i] {
            groups.entry(uf.find(i)).or_default().insert(id.to_string());
        } else {
            grouping.isolated.push(id.to_string());
        }
    }
    grouping.isolated.sort();

    let mut ordered: Vec<(usize, BTreeSet<String>)> = groups.into_iter().collect();
    ordered.sort_by(|x, y| x.1.iter().next().cmp(&y.1.iter().next()));

    let mut seq_of_root: HashMap<usize, usize> = HashMap::new();
    for (seq, (root, members)) in ordered.into_iter().enumerate() {
        seq_of_root.insert(root, seq);
        grouping.buses.push(Bus {
            name: config.bus_name(seq + 1),
            member_component_ids: members,
        });
    }
    for i in 0..ids.len() {
        if linked[i] {
            grouping.bus_of[i] = seq_of_root.get(&uf.find(i)).copied();
        }
    }
    grouping
}

pub fn isolated_warning(id: &str) -> Warning {
    Warning::for_component(
        WarningKind::IsolatedComponent,
        id,
        format!("Component {} has no connection to any other component", id),
    )
}

impl Default for TopologyResolver {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

fn reachable(forest: &Forest, start: usize) -> HashSet<usize> {
    let mut seen = HashSet::new();
    let mut bfs = Bfs::new(forest, NodeIndex::new(start));
    while let Some(node) = bfs.next(forest) {
        seen.insert(node.index());
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoundingBox, ComponentType};

    fn comp(id: &str, t: ComponentType) -> Component {
        Component::new(id, t, BoundingBox::new(0.0, 0.0, 10.0, 10.0)).verified()
    }

    fn edge(a: &str, b: &str, g: f64, t: f64) -> CandidateEdge {
        CandidateEdge::new(a, b, g, t)
    }

    fn accepted_pairs(resolution: &Resolution) -> Vec<(String, String)> {
        resolution
            .accepted
            .iter()
            .map(|a| (a.edge.from_id.clone(), a.edge.to_id.clone()))
            .collect()
    }

    #[test]
    fn test_empty_input() {
        let resolution = TopologyResolver::default().resolve(&[], &[]);
        assert!(resolution.buses.is_empty());
        assert!(resolution.accepted.is_empty());
        assert!(resolution.isolated.is_empty());
    }

    #[test]
    fn test_max_spanning_tree_drops_weakest_cycle_edge() {
        let components = vec![
            comp("n1", ComponentType::Node),
            comp("n2", ComponentType::Node),
            comp("n3", ComponentType::Node),
        ];
        let candidates = vec![
            edge("n1", "n2", 0.9, 0.6),
            edge("n2", "n3", 0.8, 0.6),
            edge("n1", "n3", 0.2, 0.6),
        ];
        let resolution = TopologyResolver::default().resolve(&components, &candidates);

        assert_eq!(resolution.buses.len(), 1);
        assert_eq!(resolution.buses[0].name, "母线_001");
        assert_eq!(resolution.buses[0].len(), 3);
        assert_eq!(
            accepted_pairs(&resolution),
            vec![("n1".to_string(), "n2".to_string()), ("n2".to_string(), "n3".to_string())]
        );
    }

    #[test]
    fn test_equal_weights_prefer_smaller_pair() {
        let components = vec![
            comp("a", ComponentType::Node),
            comp("b", ComponentType::Node),
            comp("c", ComponentType::Node),
        ];
        let candidates = vec![
            edge("b", "c", 0.5, 0.6),
            edge("a", "c", 0.5, 0.6),
            edge("a", "b", 0.5, 0.6),
        ];
        let resolution = TopologyResolver::default().resolve(&components, &candidates);
        assert_eq!(
            accepted_pairs(&resolution),
            vec![("a".to_string(), "b".to_string()), ("a".to_string(), "c".to_string())]
        );
    }

    #[test]
    fn test_point_device_trim_substitutes_edge() {
        // breaker hub with three nodes; the weakest hub edge is replaced by n2-n3
        let components = vec![
            comp("b1", ComponentType::CircuitBreaker),
            comp("n1", ComponentType::Node),
            comp("n2", ComponentType::Node),
            comp("n3", ComponentType::Node),
        ];
        let candidates = vec![
            edge("b1", "n1", 0.9, 0.9),
            edge("b1", "n2", 0.8, 0.9),
            edge("b1", "n3", 0.7, 0.9),
            edge("n1", "n3", 0.3, 0.6),
            edge("n2", "n3", 0.5, 0.6),
        ];
        let resolution = TopologyResolver::default().resolve(&components, &candidates);

        assert_eq!(resolution.trimmed, 1);
        assert_eq!(resolution.substituted, 1);
        assert_eq!(resolution.buses.len(), 1);
        assert_eq!(resolution.buses[0].len(), 4);
        let pairs = accepted_pairs(&resolution);
        assert!(pairs.contains(&("n2".to_string(), "n3".to_string())));
        assert!(!pairs.contains(&("b1".to_string(), "n3".to_string())));
        assert_eq!(pairs.iter().filter(|(a, b)| a == "b1" || b == "b1").count(), 2);
    }

    #[test]
    fn test_trim_without_substitute_isolates_leaf() {
        let components = vec![
            comp("b1", ComponentType::CircuitBreaker),
            comp("s1", ComponentType::Source),
            comp("s2", ComponentType::Source),
            comp("s3", ComponentType::Source),
        ];
        let candidates = vec![
            edge("b1", "s1", 0.9, 1.0),
            edge("b1", "s2", 0.8, 1.0),
            edge("b1", "s3", 0.7, 1.0),
        ];
        let resolution = TopologyResolver::default().resolve(&components, &candidates);

        assert_eq!(resolution.trimmed, 1);
        assert_eq!(resolution.substituted, 0);
        assert_eq!(resolution.isolated, vec!["s3".to_string()]);
        assert_eq!(resolution.warnings.len(), 1);
        assert_eq!(resolution.warnings[0].kind, WarningKind::IsolatedComponent);
    }

    #[test]
    fn test_substitute_respects_other_point_device_capacity() {
        // sw1 is already saturated, so the only rejoin path through it is refused
        let components = vec![
            comp("b1", ComponentType::CircuitBreaker),
            comp("n1", ComponentType::Node),
            comp("n2", ComponentType::Node),
            comp("n3", ComponentType::Node),
            comp("sw1", ComponentType::Switch),
            comp("n4", ComponentType::Node),
        ];
        let candidates = vec![
            edge("b1", "n1", 0.9, 0.9),
            edge("b1", "n2", 0.8, 0.9),
            edge("b1", "n3", 0.7, 0.9),
            edge("n1", "sw1", 0.9, 0.9),
            edge("n4", "sw1", 0.9, 0.9),
            edge("n3", "sw1", 0.1, 0.9),
        ];
        let resolution = TopologyResolver::default().resolve(&components, &candidates);

        let pairs = accepted_pairs(&resolution);
        assert!(!pairs.contains(&("n3".to_string(), "sw1".to_string())));
        assert_eq!(resolution.isolated, vec!["n3".to_string()]);
    }

    #[test]
    fn test_bus_names_follow_smallest_member_id() {
        let components = vec![
            comp("z1", ComponentType::Node),
            comp("z2", ComponentType::Node),
            comp("a1", ComponentType::Node),
            comp("a2", ComponentType::Node),
        ];
        let candidates = vec![edge("z1", "z2", 0.9, 0.6), edge("a1", "a2", 0.1, 0.6)];
        let resolution = TopologyResolver::default().resolve(&components, &candidates);

        assert_eq!(resolution.buses[0].name, "母线_001");
        assert!(resolution.buses[0].contains("a1"));
        assert_eq!(resolution.buses[1].name, "母线_002");
        assert!(resolution.buses[1].contains("z1"));
        assert_eq!(resolution.accepted[0].bus_name, "母线_001");
    }

    #[test]
    fn test_ignores_unknown_and_duplicate_candidates() {
        let components = vec![comp("n1", ComponentType::Node), comp("n2", ComponentType::Node)];
        let candidates = vec![
            edge("n1", "n2", 0.9, 0.6),
            edge("n2", "n1", 0.1, 0.6),
            edge("n1", "ghost", 0.9, 0.6),
        ];
        let resolution = TopologyResolver::default().resolve(&components, &candidates);
        assert_eq!(resolution.accepted.len(), 1);
        assert_eq!(resolution.accepted[0].edge.geometric_score, 0.9);
    }
}
