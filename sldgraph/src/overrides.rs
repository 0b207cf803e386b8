//! Manual overrides
//!
//! Reviewer edits are pinned on top of engine output instead of replacing
//! it. Re-running the engine never loses them: `reconcile` reapplies the
//! whole set to every fresh engine model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::engine::{group_buses, isolated_warning};
use crate::model::{Component, Provenance, ResolvedConnection, TopologyModel, Warning, WarningKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum EditAction {
    /// Force a connection between two components
    Connect { a: String, b: String },
    /// Suppress any engine connection between two components
    Disconnect { a: String, b: String },
}

impl EditAction {
    /// Endpoints, smaller id first
    pub fn pair(&self) -> (&str, &str) {
        let (a, b) = match self {
            EditAction::Connect { a, b } | EditAction::Disconnect { a, b } => (a.as_str(), b.as_str()),
        };
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualEdit {
    pub id: Uuid,
    #[serde(flatten)]
    pub action: EditAction,
    pub created_at: DateTime<Utc>,
}

/// Ordered list of pinned edits. A later edit of the same pair wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverrideSet {
    edits: Vec<ManualEdit>,
}

impl OverrideSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&mut self, a: &str, b: &str) -> Uuid {
        self.push(EditAction::Connect {
            a: a.to_string(),
            b: b.to_string(),
        })
    }

    pub fn disconnect(&mut self, a: &str, b: &str) -> Uuid {
        self.push(EditAction::Disconnect {
            a: a.to_string(),
            b: b.to_string(),
        })
    }

    fn push(&mut self, action: EditAction) -> Uuid {
        let id = Uuid::new_v4();
        self.edits.push(ManualEdit {
            id,
            action,
            created_at: Utc::now(),
        });
        id
    }

    pub fn remove(&mut self, id: Uuid) -> Option<ManualEdit> {
        let position = self.edits.iter().position(|e| e.id == id)?;
        Some(self.edits.remove(position))
    }

    pub fn edits(&self) -> &[ManualEdit] {
        &self.edits
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }
}

/// Layer `overrides` over an engine model.
///
/// Engine connections named by a `Disconnect` are dropped; `Connect` edits
/// become manual connections with confidence 1.0. Buses and connection ids
/// are recomputed with the engine's naming rules. Edits naming components
/// outside `components` are skipped with a `stale-override` warning. The
/// result is not validated here.
pub fn reconcile(
    engine_model: &TopologyModel,
    components: &[Component],
    overrides: &OverrideSet,
    config: &EngineConfig,
) -> TopologyModel {
    let positions: HashMap<&str, usize> = components
        .iter()
        .enumerate()
        .map(|(i, c)| (c.id.as_str(), i))
        .collect();

    let mut warnings: Vec<Warning> = engine_model
        .warnings
        .iter()
        .filter(|w| w.kind != WarningKind::IsolatedComponent)
        .cloned()
        .collect();

    // effective action per pair, last edit wins
    let mut pinned: BTreeMap<(String, String), &ManualEdit> = BTreeMap::new();
    for edit in overrides.edits() {
        let (a, b) = edit.action.pair();
        let unknown: Vec<&str> = [a, b].into_iter().filter(|id| !positions.contains_key(id)).collect();
        if a == b || !unknown.is_empty() {
            tracing::warn!("Skipping stale override {} ({}-{})", edit.id, a, b);
            let message = if a == b {
                format!("Override {} connects {} to itself", edit.id, a)
            } else {
                format!("Override {} references unknown component(s): {}", edit.id, unknown.join(", "))
            };
            warnings.push(Warning::new(WarningKind::StaleOverride, message));
            continue;
        }
        pinned.insert((a.to_string(), b.to_string()), edit);
    }

    let mut edges: BTreeMap<(String, String), ResolvedConnection> = BTreeMap::new();
    for connection in engine_model
        .connections
        .iter()
        .filter(|c| c.provenance == Provenance::Engine)
    {
        let key = normalized(&connection.from_component_id, &connection.to_component_id);
        if pinned.contains_key(&key) {
            continue;
        }
        edges.insert(key, connection.clone());
    }

    for ((a, b), edit) in &pinned {
        if let EditAction::Connect { .. } = edit.action {
            edges.insert(
                (a.clone(), b.clone()),
                ResolvedConnection {
                    id: String::new(),
                    from_component_id: a.clone(),
                    to_component_id: b.clone(),
                    bus_name: String::new(),
                    confidence: 1.0,
                    geometric_score: 1.0,
                    type_compatibility: 1.0,
                    provenance: Provenance::Manual,
                },
            );
        }
    }

    // engine edges may mention components missing from `components`
    let mut links = Vec::new();
    let mut kept = Vec::new();
    for ((a, b), connection) in edges {
        let (Some(&pa), Some(&pb)) = (positions.get(a.as_str()), positions.get(b.as_str())) else {
            continue;
        };
        links.push((pa, pb));
        kept.push((pa, connection));
    }

    let ids: Vec<&str> = components.iter().map(|c| c.id.as_str()).collect();
    let grouping = group_buses(&ids, &links, config);

    let mut ordered: Vec<(usize, ResolvedConnection)> = kept
        .into_iter()
        .filter_map(|(pa, mut connection)| {
            let seq = grouping.bus_of[pa]?;
            connection.bus_name = grouping.buses[seq].name.clone();
            Some((seq, connection))
        })
        .collect();
    ordered.sort_by(|x, y| {
        x.0.cmp(&y.0)
            .then_with(|| x.1.from_component_id.cmp(&y.1.from_component_id))
            .then_with(|| x.1.to_component_id.cmp(&y.1.to_component_id))
    });

    let connections: Vec<ResolvedConnection> = ordered
        .into_iter()
        .enumerate()
        .map(|(i, (_, mut connection))| {
            connection.id = format!("c{}", i + 1);
            connection
        })
        .collect();

    warnings.extend(grouping.isolated.iter().map(|id| isolated_warning(id)));

    tracing::debug!(
        "Reconciled {} overrides into {} connections on {} buses",
        overrides.len(),
        connections.len(),
        grouping.buses.len()
    );

    TopologyModel {
        buses: grouping.buses,
        connections,
        warnings,
    }
}

fn normalized(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}
