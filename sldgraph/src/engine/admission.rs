//! Input admission: decides which snapshot components the engine may use.
//!
//! Bad records are excluded with a warning, never fatal.

use std::collections::HashSet;

use crate::model::{Component, Warning, WarningKind};

#[derive(Debug, Clone, Default)]
pub struct Admission {
    pub admitted: Vec<Component>,
    pub warnings: Vec<Warning>,
}

/// Filter a snapshot down to components the engine can index.
///
/// Input order is preserved. The first occurrence of an id wins.
pub fn admit_components(snapshot: &[Component]) -> Admission {
    let mut admission = Admission::default();
    let mut seen: HashSet<&str> = HashSet::new();

    for component in snapshot {
        if !seen.insert(component.id.as_str()) {
            tracing::warn!("Excluding duplicate component id {}", component.id);
            admission.warnings.push(Warning::for_component(
                WarningKind::DuplicateId,
                &component.id,
                format!("Component id {} appears more than once; later record ignored", component.id),
            ));
            continue;
        }

        if !component.verified {
            tracing::warn!("Excluding unverified component {}", component.id);
            admission.warnings.push(Warning::for_component(
                WarningKind::UnverifiedComponent,
                &component.id,
                format!("Component {} has not been verified", component.id),
            ));
            continue;
        }

        if component.bounding_box.is_degenerate() {
            let b = &component.bounding_box;
            tracing::warn!("Excluding component {} with degenerate bounding box", component.id);
            admission.warnings.push(Warning::for_component(
                WarningKind::DegenerateBbox,
                &component.id,
                format!(
                    "Component {} has a zero-area bounding box ({}, {})-({}, {})",
                    component.id, b.x1, b.y1, b.x2, b.y2
                ),
            ));
            continue;
        }

        admission.admitted.push(component.clone());
    }

    admission
}
