//! Topology validation
//!
//! Checks a resolved model against structural invariants before it may be
//! exported. Failure is a value (`ValidationOutcome::Invalid`), not an error.

pub mod rules;

pub use rules::*;

use serde::{Deserialize, Serialize};

use crate::model::{TopologyModel, Warning};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ViolationKind {
    MultiBusMembership,
    IsolatedComponent,
    UndersizedBus,
    PointDeviceOverload,
    DanglingConnection,
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ViolationKind::MultiBusMembership => "multi-bus-membership",
            ViolationKind::IsolatedComponent => "isolated-component",
            ViolationKind::UndersizedBus => "undersized-bus",
            ViolationKind::PointDeviceOverload => "point-device-overload",
            ViolationKind::DanglingConnection => "dangling-connection",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Violation {
    pub rule_id: String,
    pub kind: ViolationKind,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bus_name: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ValidationReport {
    pub violations: Vec<Violation>,
    pub warnings: Vec<Warning>,
}

impl ValidationReport {
    pub fn has_errors(&self) -> bool {
        self.violations.iter().any(|v| v.severity == Severity::Error)
    }

    pub fn violations_of(&self, kind: ViolationKind) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(move |v| v.kind == kind)
    }
}

/// Result of a pipeline run: a model that may be exported, or the reasons
/// it may not.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ValidationOutcome {
    Validated(TopologyModel),
    Invalid(ValidationReport),
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Validated(_))
    }

    pub fn model(&self) -> Option<&TopologyModel> {
        match self {
            ValidationOutcome::Validated(model) => Some(model),
            ValidationOutcome::Invalid(_) => None,
        }
    }

    pub fn warnings(&self) -> &[Warning] {
        match self {
            ValidationOutcome::Validated(model) => &model.warnings,
            ValidationOutcome::Invalid(report) => &report.warnings,
        }
    }

    pub fn violations(&self) -> &[Violation] {
        match self {
            ValidationOutcome::Validated(_) => &[],
            ValidationOutcome::Invalid(report) => &report.violations,
        }
    }
}
