//! Type compatibility priors.
//!
//! Static table keyed by an unordered pair of component types. A pair that
//! is absent from the table can never be connected.

use std::collections::BTreeMap;

use crate::config::CompatibilityEntry;
use crate::model::ComponentType;

use ComponentType::*;

const BUILTIN_PRIORS: &[(ComponentType, ComponentType, f64)] = &[
    (Source, CircuitBreaker, 1.00),
    (Source, Switch, 0.80),
    (Source, Node, 0.70),
    (Source, Transformer, 0.60),
    (CircuitBreaker, Transformer, 0.95),
    (CircuitBreaker, Node, 0.90),
    (CircuitBreaker, Switch, 0.70),
    (CircuitBreaker, Load, 0.80),
    (Transformer, Node, 0.95),
    (Transformer, Switch, 0.70),
    (Transformer, Load, 0.70),
    (Node, PotentialTransformer, 0.90),
    (Node, Switch, 0.90),
    (Node, Load, 0.90),
    (Node, Node, 0.60),
    (Switch, Load, 0.80),
    (Switch, PotentialTransformer, 0.60),
];

#[derive(Debug, Clone, PartialEq)]
pub struct CompatibilityTable {
    priors: BTreeMap<(ComponentType, ComponentType), f64>,
}

impl CompatibilityTable {
    /// An empty table: every pair is incompatible
    pub fn empty() -> Self {
        Self {
            priors: BTreeMap::new(),
        }
    }

    pub fn builtin() -> Self {
        let mut table = Self::empty();
        for &(a, b, prior) in BUILTIN_PRIORS {
            table.insert(a, b, prior);
        }
        table
    }

    /// Built-in table with config entries applied on top
    pub fn with_overrides(entries: &[CompatibilityEntry]) -> Self {
        let mut table = Self::builtin();
        for entry in entries {
            table.insert(entry.a, entry.b, entry.prior);
        }
        table
    }

    pub fn insert(&mut self, a: ComponentType, b: ComponentType, prior: f64) {
        self.priors.insert(key(a, b), prior.clamp(0.0, 1.0));
    }

    /// Prior for a type pair in either order; `None` if incompatible
    pub fn prior(&self, a: ComponentType, b: ComponentType) -> Option<f64> {
        self.priors.get(&key(a, b)).copied()
    }

    pub fn is_compatible(&self, a: ComponentType, b: ComponentType) -> bool {
        self.prior(a, b).is_some()
    }

    /// Every compatible pair with its prior, in a stable order
    pub fn entries(&self) -> impl Iterator<Item = (ComponentType, ComponentType, f64)> + '_ {
        self.priors.iter().map(|(&(a, b), &p)| (a, b, p))
    }

    pub fn len(&self) -> usize {
        self.priors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.priors.is_empty()
    }
}

impl Default for CompatibilityTable {
    fn default() -> Self {
        Self::builtin()
    }
}

fn key(a: ComponentType, b: ComponentType) -> (ComponentType, ComponentType) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}
