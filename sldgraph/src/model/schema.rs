//! Topology Data Types
//!
//! Core records exchanged between the pipeline stages. These types are:
//! - Immutable once handed to the engine: every stage reads a snapshot and
//!   produces a new value
//! - Serializable: the JSON shape is the contract with the manual
//!   verification stage (input) and the model generation stage (output)
//!
//! Coordinates are image pixel space, origin top-left.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Electrical device class of a detected symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentType {
    Source,
    Transformer,
    CircuitBreaker,
    Switch,
    Node,
    PotentialTransformer,
    Load,
}

impl ComponentType {
    pub const ALL: [ComponentType; 7] = [
        ComponentType::Source,
        ComponentType::Transformer,
        ComponentType::CircuitBreaker,
        ComponentType::Switch,
        ComponentType::Node,
        ComponentType::PotentialTransformer,
        ComponentType::Load,
    ];

    /// Two-terminal devices that may carry at most two connections
    pub fn is_point_device(&self) -> bool {
        matches!(self, ComponentType::CircuitBreaker | ComponentType::Switch)
    }

    /// Stable kebab-case key, identical to the serialized form
    pub fn key(&self) -> &'static str {
        match self {
            ComponentType::Source => "source",
            ComponentType::Transformer => "transformer",
            ComponentType::CircuitBreaker => "circuit-breaker",
            ComponentType::Switch => "switch",
            ComponentType::Node => "node",
            ComponentType::PotentialTransformer => "potential-transformer",
            ComponentType::Load => "load",
        }
    }

    /// Label used on diagrams produced by the detection model
    pub fn diagram_label(&self) -> &'static str {
        match self {
            ComponentType::Source => "电源",
            ComponentType::Transformer => "变压器",
            ComponentType::CircuitBreaker => "断路器",
            ComponentType::Switch => "开关",
            ComponentType::Node => "节点",
            ComponentType::PotentialTransformer => "PT变压器",
            ComponentType::Load => "负荷",
        }
    }

    /// Parse either a diagram label or an English name.
    ///
    /// Accepts the kebab-case key, common spellings ("breaker", "pt",
    /// "generator") and the Chinese labels emitted by the detector.
    pub fn from_label(label: &str) -> Option<Self> {
        let trimmed = label.trim();
        if let Some(t) = Self::ALL.iter().find(|t| t.diagram_label() == trimmed) {
            return Some(*t);
        }

        let normalized = trimmed.to_lowercase().replace(['_', ' '], "-");
        match normalized.as_str() {
            "source" | "generator" | "grid" | "supply" => Some(ComponentType::Source),
            "transformer" | "xfmr" => Some(ComponentType::Transformer),
            "circuit-breaker" | "breaker" | "cb" => Some(ComponentType::CircuitBreaker),
            "switch" | "disconnector" | "sw" => Some(ComponentType::Switch),
            "node" | "junction" => Some(ComponentType::Node),
            "potential-transformer" | "pt" | "voltage-transformer" | "vt" | "pt变压器" => {
                Some(ComponentType::PotentialTransformer)
            }
            "load" => Some(ComponentType::Load),
            _ => None,
        }
    }
}

impl std::fmt::Display for ComponentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// A 2D point in pixel space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Axis-aligned rectangle `(x1, y1)`-`(x2, y2)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Build from the `[x1, y1, x2, y2]` array form used by detection records
    pub fn from_array(bbox: [f64; 4]) -> Self {
        Self::new(bbox[0], bbox[1], bbox[2], bbox[3])
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> Point {
        Point::new((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// Zero or negative area, or any non-finite coordinate
    pub fn is_degenerate(&self) -> bool {
        let finite = [self.x1, self.y1, self.x2, self.y2]
            .iter()
            .all(|v| v.is_finite());
        !finite || self.x1 >= self.x2 || self.y1 >= self.y2
    }

    /// Overlap ratio of the projections onto the x axis, relative to the
    /// narrower box. 0.0 when the projections are disjoint.
    pub fn horizontal_overlap(&self, other: &BoundingBox) -> f64 {
        overlap_ratio(self.x1, self.x2, other.x1, other.x2)
    }

    /// Same as [`horizontal_overlap`](Self::horizontal_overlap) on the y axis
    pub fn vertical_overlap(&self, other: &BoundingBox) -> f64 {
        overlap_ratio(self.y1, self.y2, other.y1, other.y2)
    }
}

fn overlap_ratio(a1: f64, a2: f64, b1: f64, b2: f64) -> f64 {
    let overlap = a2.min(b2) - a1.max(b1);
    let smaller = (a2 - a1).min(b2 - b1);
    if overlap <= 0.0 || smaller <= 0.0 {
        return 0.0;
    }
    (overlap / smaller).clamp(0.0, 1.0)
}

/// One detected electrical device instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: String,

    #[serde(rename = "type")]
    pub component_type: ComponentType,

    pub bounding_box: BoundingBox,

    #[serde(default)]
    pub verified: bool,
}

impl Component {
    pub fn new(id: impl Into<String>, component_type: ComponentType, bounding_box: BoundingBox) -> Self {
        Self {
            id: id.into(),
            component_type,
            bounding_box,
            verified: false,
        }
    }

    pub fn verified(mut self) -> Self {
        self.verified = true;
        self
    }

    pub fn center(&self) -> Point {
        self.bounding_box.center()
    }
}

/// A hypothesis that two components are electrically connected.
///
/// The pair is unordered; constructors normalize it so `from_id < to_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateEdge {
    pub from_id: String,
    pub to_id: String,
    pub geometric_score: f64,
    pub type_compatibility: f64,
}

impl CandidateEdge {
    pub fn new(a: &str, b: &str, geometric_score: f64, type_compatibility: f64) -> Self {
        let (from_id, to_id) = if a <= b { (a, b) } else { (b, a) };
        Self {
            from_id: from_id.to_string(),
            to_id: to_id.to_string(),
            geometric_score,
            type_compatibility,
        }
    }

    pub fn pair(&self) -> (&str, &str) {
        (&self.from_id, &self.to_id)
    }

    pub fn touches(&self, id: &str) -> bool {
        self.from_id == id || self.to_id == id
    }

    /// The endpoint opposite to `id`, if `id` is an endpoint
    pub fn other(&self, id: &str) -> Option<&str> {
        if self.from_id == id {
            Some(&self.to_id)
        } else if self.to_id == id {
            Some(&self.from_id)
        } else {
            None
        }
    }
}

/// An electrical node formed by grouping connected components
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bus {
    pub name: String,
    pub member_component_ids: BTreeSet<String>,
}

impl Bus {
    pub fn contains(&self, id: &str) -> bool {
        self.member_component_ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.member_component_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.member_component_ids.is_empty()
    }
}

/// Who produced a connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    #[default]
    Engine,
    Manual,
}

/// An accepted connection, output of the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedConnection {
    pub id: String,
    pub from_component_id: String,
    pub to_component_id: String,
    pub bus_name: String,
    pub confidence: f64,
    pub geometric_score: f64,
    pub type_compatibility: f64,
    #[serde(default)]
    pub provenance: Provenance,
}

impl ResolvedConnection {
    pub fn touches(&self, id: &str) -> bool {
        self.from_component_id == id || self.to_component_id == id
    }
}

/// Category of a non-fatal diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WarningKind {
    DegenerateBbox,
    IsolatedComponent,
    InvalidTopology,
    DuplicateId,
    UnverifiedComponent,
    StaleOverride,
}

impl std::fmt::Display for WarningKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WarningKind::DegenerateBbox => "degenerate-bbox",
            WarningKind::IsolatedComponent => "isolated-component",
            WarningKind::InvalidTopology => "invalid-topology",
            WarningKind::DuplicateId => "duplicate-id",
            WarningKind::UnverifiedComponent => "unverified-component",
            WarningKind::StaleOverride => "stale-override",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    pub kind: WarningKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_id: Option<String>,
    pub message: String,
}

impl Warning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            component_id: None,
            message: message.into(),
        }
    }

    pub fn for_component(kind: WarningKind, component_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            component_id: Some(component_id.into()),
            message: message.into(),
        }
    }
}

/// The resolved graph handed to the model generation stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologyModel {
    pub buses: Vec<Bus>,
    pub connections: Vec<ResolvedConnection>,
    pub warnings: Vec<Warning>,
}

impl TopologyModel {
    pub fn bus(&self, name: &str) -> Option<&Bus> {
        self.buses.iter().find(|b| b.name == name)
    }

    /// Names of every bus the component belongs to (at most one when valid)
    pub fn buses_for_component(&self, id: &str) -> Vec<&str> {
        self.buses
            .iter()
            .filter(|b| b.contains(id))
            .map(|b| b.name.as_str())
            .collect()
    }

    pub fn connections_for_component<'a>(
        &'a self,
        id: &'a str,
    ) -> impl Iterator<Item = &'a ResolvedConnection> + 'a {
        self.connections.iter().filter(move |c| c.touches(id))
    }

    pub fn warnings_of(&self, kind: WarningKind) -> impl Iterator<Item = &Warning> {
        self.warnings.iter().filter(move |w| w.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_type_labels() {
        assert_eq!(ComponentType::from_label("断路器"), Some(ComponentType::CircuitBreaker));
        assert_eq!(ComponentType::from_label("PT变压器"), Some(ComponentType::PotentialTransformer));
        assert_eq!(ComponentType::from_label("Circuit Breaker"), Some(ComponentType::CircuitBreaker));
        assert_eq!(ComponentType::from_label("potential_transformer"), Some(ComponentType::PotentialTransformer));
        assert_eq!(ComponentType::from_label("capacitor"), None);

        for t in ComponentType::ALL {
            assert_eq!(ComponentType::from_label(t.key()), Some(t));
            assert_eq!(ComponentType::from_label(t.diagram_label()), Some(t));
        }
    }

    #[test]
    fn test_component_type_serde() {
        let json = serde_json::to_string(&ComponentType::CircuitBreaker).unwrap();
        assert_eq!(json, "\"circuit-breaker\"");
        let parsed: ComponentType = serde_json::from_str("\"potential-transformer\"").unwrap();
        assert_eq!(parsed, ComponentType::PotentialTransformer);
    }

    #[test]
    fn test_degenerate_boxes() {
        assert!(!BoundingBox::new(0.0, 0.0, 10.0, 5.0).is_degenerate());
        assert!(BoundingBox::new(0.0, 0.0, 0.0, 5.0).is_degenerate());
        assert!(BoundingBox::new(10.0, 0.0, 5.0, 5.0).is_degenerate());
        assert!(BoundingBox::new(0.0, f64::NAN, 10.0, 5.0).is_degenerate());
    }

    #[test]
    fn test_overlap_ratios() {
        let a = BoundingBox::new(0.0, 0.0, 70.0, 40.0);
        let b = BoundingBox::new(80.0, 0.0, 130.0, 60.0);
        assert_eq!(a.horizontal_overlap(&b), 0.0);
        // y: [0,40] vs [0,60], overlap 40, smaller extent 40
        assert!((a.vertical_overlap(&b) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_candidate_edge_normalizes_pair() {
        let edge = CandidateEdge::new("b1", "a1", 0.5, 0.9);
        assert_eq!(edge.pair(), ("a1", "b1"));
        assert_eq!(edge.other("a1"), Some("b1"));
        assert_eq!(edge.other("zz"), None);
    }

    #[test]
    fn test_component_deserializes_without_verified() {
        let json = r#"{"id":"s1","type":"source","bounding_box":{"x1":0,"y1":0,"x2":10,"y2":10}}"#;
        let c: Component = serde_json::from_str(json).unwrap();
        assert!(!c.verified);
        assert_eq!(c.component_type, ComponentType::Source);
    }

    #[test]
    fn test_connections_for_component_with_owned_id() {
        let connection = |id: &str, a: &str, b: &str| ResolvedConnection {
            id: id.to_string(),
            from_component_id: a.to_string(),
            to_component_id: b.to_string(),
            bus_name: "母线_001".to_string(),
            confidence: 0.9,
            geometric_score: 0.9,
            type_compatibility: 0.9,
            provenance: Provenance::default(),
        };
        let model = TopologyModel {
            buses: vec![],
            connections: vec![
                connection("c1", "b1", "s1"),
                connection("c2", "b1", "t1"),
                connection("c3", "n1", "t1"),
            ],
            warnings: vec![],
        };

        let query = String::from("t1");
        let ids: Vec<&str> = model.connections_for_component(&query).map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c2", "c3"]);
        assert_eq!(model.connections_for_component("zz").count(), 0);
        assert_eq!(model.connections[0].provenance, Provenance::Engine);
    }

    #[test]
    fn test_provenance_defaults_to_engine_when_missing() {
        let json = r#"{"id":"c1","from_component_id":"a","to_component_id":"b","bus_name":"母线_001",
            "confidence":0.5,"geometric_score":0.5,"type_compatibility":0.5}"#;
        let c: ResolvedConnection = serde_json::from_str(json).unwrap();
        assert_eq!(c.provenance, Provenance::Engine);
    }
}
