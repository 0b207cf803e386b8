use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::{Severity, ValidationOutcome, ValidationReport, Violation, ViolationKind};
use crate::model::{Component, ComponentType, TopologyModel, Warning, WarningKind};

/// What a rule sees: the admitted components and the resolved model
pub struct ValidationContext<'a> {
    pub components: &'a [Component],
    pub model: &'a TopologyModel,
    pub point_device_max_edges: usize,
}

impl<'a> ValidationContext<'a> {
    pub fn new(components: &'a [Component], model: &'a TopologyModel) -> Self {
        Self {
            components,
            model,
            point_device_max_edges: 2,
        }
    }

    fn connection_counts(&self) -> HashMap<&str, usize> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for connection in &self.model.connections {
            *counts.entry(connection.from_component_id.as_str()).or_default() += 1;
            *counts.entry(connection.to_component_id.as_str()).or_default() += 1;
        }
        counts
    }
}

pub trait TopologyRule: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn severity(&self) -> Severity;
    fn check(&self, ctx: &ValidationContext<'_>) -> Vec<Violation>;

    fn violation(&self, kind: ViolationKind, message: String) -> Violation {
        Violation {
            rule_id: self.id().to_string(),
            kind,
            severity: self.severity(),
            component_id: None,
            bus_name: None,
            message,
        }
    }
}

pub struct ValidationEngine {
    rules: Vec<Arc<dyn TopologyRule>>,
}

impl ValidationEngine {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with_default_rules() -> Self {
        let mut engine = Self::new();
        engine.add_rule(Arc::new(SingleBusMembershipRule));
        engine.add_rule(Arc::new(IsolatedSourceRule));
        engine.add_rule(Arc::new(BusSizeRule));
        engine.add_rule(Arc::new(PointDeviceDegreeRule));
        engine.add_rule(Arc::new(ConnectionConsistencyRule));
        engine
    }

    pub fn add_rule(&mut self, rule: Arc<dyn TopologyRule>) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> impl Iterator<Item = &dyn TopologyRule> {
        self.rules.iter().map(|r| r.as_ref())
    }

    pub fn check(&self, ctx: &ValidationContext<'_>) -> Vec<Violation> {
        let mut violations = Vec::new();
        for rule in &self.rules {
            violations.extend(rule.check(ctx));
        }
        violations
    }

    /// Run every rule and decide the outcome.
    ///
    /// Each violation is mirrored as an `invalid-topology` warning. Only
    /// error-severity violations make the outcome invalid.
    pub fn validate(&self, ctx: &ValidationContext<'_>) -> ValidationOutcome {
        let violations = self.check(ctx);
        let mut warnings = ctx.model.warnings.clone();

        for violation in &violations {
            tracing::warn!("Topology violation [{}]: {}", violation.rule_id, violation.message);
            let warning = match &violation.component_id {
                Some(id) => Warning::for_component(WarningKind::InvalidTopology, id, violation.message.clone()),
                None => Warning::new(WarningKind::InvalidTopology, violation.message.clone()),
            };
            warnings.push(warning);
        }

        let report = ValidationReport { violations, warnings };
        if report.has_errors() {
            ValidationOutcome::Invalid(report)
        } else {
            let mut model = ctx.model.clone();
            model.warnings = report.warnings;
            ValidationOutcome::Validated(model)
        }
    }
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self::with_default_rules()
    }
}

// Rule implementations

pub struct SingleBusMembershipRule;

impl TopologyRule for SingleBusMembershipRule {
    fn id(&self) -> &str {
        "single-bus-membership"
    }

    fn name(&self) -> &str {
        "Single Bus Membership"
    }

    fn description(&self) -> &str {
        "A component belongs to at most one bus"
    }

    fn severity(&self) -> Severity {
        Severity::Error
    }

    fn check(&self, ctx: &ValidationContext<'_>) -> Vec<Violation> {
        let mut memberships: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for bus in &ctx.model.buses {
            for id in &bus.member_component_ids {
                memberships.entry(id.as_str()).or_default().push(bus.name.as_str());
            }
        }

        memberships
            .into_iter()
            .filter(|(_, buses)| buses.len() > 1)
            .map(|(id, buses)| Violation {
                component_id: Some(id.to_string()),
                ..self.violation(
                    ViolationKind::MultiBusMembership,
                    format!("Component {} belongs to several buses: {}", id, buses.join(", ")),
                )
            })
            .collect()
    }
}

pub struct IsolatedSourceRule;

impl TopologyRule for IsolatedSourceRule {
    fn id(&self) -> &str {
        "isolated-source"
    }

    fn name(&self) -> &str {
        "Isolated Source"
    }

    fn description(&self) -> &str {
        "Every source feeds at least one connection"
    }

    fn severity(&self) -> Severity {
        Severity::Error
    }

    fn check(&self, ctx: &ValidationContext<'_>) -> Vec<Violation> {
        let counts = ctx.connection_counts();
        ctx.components
            .iter()
            .filter(|c| c.component_type == ComponentType::Source)
            .filter(|c| counts.get(c.id.as_str()).copied().unwrap_or(0) == 0)
            .map(|c| Violation {
                component_id: Some(c.id.clone()),
                ..self.violation(
                    ViolationKind::IsolatedComponent,
                    format!("Source {} is not connected to anything", c.id),
                )
            })
            .collect()
    }
}

pub struct BusSizeRule;

impl TopologyRule for BusSizeRule {
    fn id(&self) -> &str {
        "bus-size"
    }

    fn name(&self) -> &str {
        "Bus Size"
    }

    fn description(&self) -> &str {
        "Every bus groups at least two components"
    }

    fn severity(&self) -> Severity {
        Severity::Error
    }

    fn check(&self, ctx: &ValidationContext<'_>) -> Vec<Violation> {
        ctx.model
            .buses
            .iter()
            .filter(|bus| bus.len() < 2)
            .map(|bus| Violation {
                bus_name: Some(bus.name.clone()),
                ..self.violation(
                    ViolationKind::UndersizedBus,
                    format!("Bus {} has {} member(s)", bus.name, bus.len()),
                )
            })
            .collect()
    }
}

pub struct PointDeviceDegreeRule;

impl TopologyRule for PointDeviceDegreeRule {
    fn id(&self) -> &str {
        "point-device-degree"
    }

    fn name(&self) -> &str {
        "Point Device Degree"
    }

    fn description(&self) -> &str {
        "Breakers and switches have at most two connections"
    }

    fn severity(&self) -> Severity {
        Severity::Error
    }

    fn check(&self, ctx: &ValidationContext<'_>) -> Vec<Violation> {
        let counts = ctx.connection_counts();
        ctx.components
            .iter()
            .filter(|c| c.component_type.is_point_device())
            .filter_map(|c| {
                let degree = counts.get(c.id.as_str()).copied().unwrap_or(0);
                (degree > ctx.point_device_max_edges).then(|| Violation {
                    component_id: Some(c.id.clone()),
                    ..self.violation(
                        ViolationKind::PointDeviceOverload,
                        format!(
                            "{} {} has {} connections (max {})",
                            c.component_type, c.id, degree, ctx.point_device_max_edges
                        ),
                    )
                })
            })
            .collect()
    }
}

pub struct ConnectionConsistencyRule;

impl TopologyRule for ConnectionConsistencyRule {
    fn id(&self) -> &str {
        "connection-consistency"
    }

    fn name(&self) -> &str {
        "Connection Consistency"
    }

    fn description(&self) -> &str {
        "Connections reference an existing bus containing both endpoints"
    }

    fn severity(&self) -> Severity {
        Severity::Error
    }

    fn check(&self, ctx: &ValidationContext<'_>) -> Vec<Violation> {
        let mut violations = Vec::new();
        for connection in &ctx.model.connections {
            let message = match ctx.model.bus(&connection.bus_name) {
                None => format!(
                    "Connection {} references unknown bus {}",
                    connection.id, connection.bus_name
                ),
                Some(bus) if !bus.contains(&connection.from_component_id) || !bus.contains(&connection.to_component_id) => {
                    format!(
                        "Connection {} ({}-{}) is not contained in bus {}",
                        connection.id, connection.from_component_id, connection.to_component_id, bus.name
                    )
                }
                Some(_) => continue,
            };
            violations.push(Violation {
                bus_name: Some(connection.bus_name.clone()),
                ..self.violation(ViolationKind::DanglingConnection, message)
            });
        }
        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoundingBox, Bus, Provenance, ResolvedConnection};

    fn comp(id: &str, t: ComponentType) -> Component {
        Component::new(id, t, BoundingBox::new(0.0, 0.0, 10.0, 10.0)).verified()
    }

    fn bus(name: &str, members: &[&str]) -> Bus {
        Bus {
            name: name.to_string(),
            member_component_ids: members.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn conn(id: &str, a: &str, b: &str, bus: &str) -> ResolvedConnection {
        ResolvedConnection {
            id: id.to_string(),
            from_component_id: a.to_string(),
            to_component_id: b.to_string(),
            bus_name: bus.to_string(),
            confidence: 0.9,
            geometric_score: 0.9,
            type_compatibility: 0.9,
            provenance: Provenance::Engine,
        }
    }

    #[test]
    fn test_default_rules_registered() {
        let engine = ValidationEngine::with_default_rules();
        let ids: Vec<&str> = engine.rules().map(|r| r.id()).collect();
        assert_eq!(
            ids,
            vec![
                "single-bus-membership",
                "isolated-source",
                "bus-size",
                "point-device-degree",
                "connection-consistency",
            ]
        );
    }

    #[test]
    fn test_valid_model_passes() {
        let components = vec![comp("B", ComponentType::CircuitBreaker), comp("S", ComponentType::Source)];
        let model = TopologyModel {
            buses: vec![bus("母线_001", &["B", "S"])],
            connections: vec![conn("c1", "B", "S", "母线_001")],
            warnings: vec![],
        };
        let outcome = ValidationEngine::default().validate(&ValidationContext::new(&components, &model));
        assert!(outcome.is_valid());
        assert_eq!(outcome.model(), Some(&model));
    }

    #[test]
    fn test_isolated_source_is_violation() {
        let components = vec![comp("S", ComponentType::Source)];
        let model = TopologyModel::default();
        let outcome = ValidationEngine::default().validate(&ValidationContext::new(&components, &model));

        let ValidationOutcome::Invalid(report) = outcome else {
            panic!("expected invalid outcome");
        };
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].kind, ViolationKind::IsolatedComponent);
        assert_eq!(report.violations[0].component_id.as_deref(), Some("S"));
        assert_eq!(report.warnings[0].kind, WarningKind::InvalidTopology);
    }

    #[test]
    fn test_structural_violations() {
        let components = vec![
            comp("sw", ComponentType::Switch),
            comp("n1", ComponentType::Node),
            comp("n2", ComponentType::Node),
            comp("n3", ComponentType::Node),
        ];
        let model = TopologyModel {
            buses: vec![bus("母线_001", &["sw", "n1", "n2", "n3"]), bus("母线_002", &["n1"])],
            connections: vec![
                conn("c1", "n1", "sw", "母线_001"),
                conn("c2", "n2", "sw", "母线_001"),
                conn("c3", "n3", "sw", "母线_001"),
                conn("c4", "n1", "n2", "母线_009"),
            ],
            warnings: vec![],
        };
        let violations = ValidationEngine::default().check(&ValidationContext::new(&components, &model));
        let kinds: Vec<ViolationKind> = violations.iter().map(|v| v.kind).collect();

        assert_eq!(
            kinds,
            vec![
                ViolationKind::MultiBusMembership,
                ViolationKind::UndersizedBus,
                ViolationKind::PointDeviceOverload,
                ViolationKind::DanglingConnection,
            ]
        );
        assert_eq!(violations[0].component_id.as_deref(), Some("n1"));
        assert_eq!(violations[1].bus_name.as_deref(), Some("母线_002"));
        assert_eq!(violations[2].component_id.as_deref(), Some("sw"));
    }

    struct AdvisoryRule;

    impl TopologyRule for AdvisoryRule {
        fn id(&self) -> &str {
            "advisory"
        }
        fn name(&self) -> &str {
            "Advisory"
        }
        fn description(&self) -> &str {
            "Flags every bus"
        }
        fn severity(&self) -> Severity {
            Severity::Warning
        }
        fn check(&self, ctx: &ValidationContext<'_>) -> Vec<Violation> {
            ctx.model
                .buses
                .iter()
                .map(|b| self.violation(ViolationKind::UndersizedBus, format!("advisory for {}", b.name)))
                .collect()
        }
    }

    #[test]
    fn test_warning_severity_does_not_invalidate() {
        let components = vec![comp("a", ComponentType::Node), comp("b", ComponentType::Node)];
        let model = TopologyModel {
            buses: vec![bus("母线_001", &["a", "b"])],
            connections: vec![conn("c1", "a", "b", "母线_001")],
            warnings: vec![],
        };
        let mut engine = ValidationEngine::new();
        engine.add_rule(Arc::new(AdvisoryRule));

        let outcome = engine.validate(&ValidationContext::new(&components, &model));
        assert!(outcome.is_valid());
        assert_eq!(outcome.warnings().len(), 1);
        assert_eq!(outcome.warnings()[0].kind, WarningKind::InvalidTopology);
    }
}
