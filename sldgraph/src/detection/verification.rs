//! Manual verification session.
//!
//! A reviewer confirms, corrects or deletes detections. The session then
//! freezes the verified components into a `ComponentSnapshot`, which is the
//! only thing the engine ever sees.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Detection;
use crate::model::{BoundingBox, Component, ComponentType};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VerificationError {
    #[error("Unknown component: {0}")]
    UnknownComponent(String),

    #[error("Unrecognized detection labels: {}", .0.join(", "))]
    UnknownLabels(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationEntry {
    pub id: String,
    pub component_type: ComponentType,
    pub confidence: f64,
    pub bbox: [f64; 4],
    pub verified: bool,
    pub corrected: bool,
}

#[derive(Debug, Clone, Default)]
pub struct VerificationSession {
    entries: Vec<VerificationEntry>,
}

impl VerificationSession {
    /// Start a session from detector output.
    ///
    /// Every label must map to a component type.
    pub fn from_detections(detections: Vec<Detection>) -> Result<Self, VerificationError> {
        let mut unknown = Vec::new();
        let mut entries = Vec::with_capacity(detections.len());

        for detection in detections {
            match detection.component_type() {
                Some(component_type) => entries.push(VerificationEntry {
                    id: detection.id,
                    component_type,
                    confidence: detection.confidence,
                    bbox: detection.bbox,
                    verified: false,
                    corrected: false,
                }),
                None => unknown.push(detection.class),
            }
        }

        if !unknown.is_empty() {
            return Err(VerificationError::UnknownLabels(unknown));
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[VerificationEntry] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&VerificationEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    fn entry_mut(&mut self, id: &str) -> Result<&mut VerificationEntry, VerificationError> {
        self.entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| VerificationError::UnknownComponent(id.to_string()))
    }

    pub fn verify(&mut self, id: &str) -> Result<(), VerificationError> {
        self.entry_mut(id)?.verified = true;
        Ok(())
    }

    /// Change the type of a detection; this also verifies it
    pub fn correct_type(&mut self, id: &str, component_type: ComponentType) -> Result<(), VerificationError> {
        let entry = self.entry_mut(id)?;
        entry.component_type = component_type;
        entry.corrected = true;
        entry.verified = true;
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Result<VerificationEntry, VerificationError> {
        let position = self
            .entries
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| VerificationError::UnknownComponent(id.to_string()))?;
        Ok(self.entries.remove(position))
    }

    pub fn verify_all(&mut self) {
        for entry in &mut self.entries {
            entry.verified = true;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn verified_count(&self) -> usize {
        self.entries.iter().filter(|e| e.verified).count()
    }

    pub fn corrected_count(&self) -> usize {
        self.entries.iter().filter(|e| e.corrected).count()
    }

    /// True when there is at least one entry and every entry is verified
    pub fn all_verified(&self) -> bool {
        !self.entries.is_empty() && self.entries.iter().all(|e| e.verified)
    }

    /// Freeze the verified entries, in session order
    pub fn snapshot(&self) -> ComponentSnapshot {
        let components: Vec<Component> = self
            .entries
            .iter()
            .filter(|e| e.verified)
            .map(|e| Component {
                id: e.id.clone(),
                component_type: e.component_type,
                bounding_box: BoundingBox::from_array(e.bbox),
                verified: true,
            })
            .collect();
        ComponentSnapshot::new(components)
    }
}

/// Read-only set of components handed to the engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentSnapshot {
    components: Vec<Component>,
}

impl ComponentSnapshot {
    pub fn new(components: Vec<Component>) -> Self {
        Self { components }
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn into_components(self) -> Vec<Component> {
        self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl std::ops::Deref for ComponentSnapshot {
    type Target = [Component];

    fn deref(&self) -> &Self::Target {
        &self.components
    }
}
