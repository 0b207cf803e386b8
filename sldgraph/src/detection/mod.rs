//! Detection intake
//!
//! Raw detector records, confidence filtering and label parsing. The
//! detector itself is an external collaborator; this module only consumes
//! its JSON output.

pub mod verification;

pub use verification::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use crate::model::{BoundingBox, Component, ComponentType};

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.5;

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Confidence threshold {0} is outside [0, 1]")]
    InvalidThreshold(f64),
}

/// One detector hit: `{ id, class, confidence, bbox: [x1, y1, x2, y2] }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub id: String,
    pub class: String,
    pub confidence: f64,
    pub bbox: [f64; 4],
}

impl Detection {
    pub fn component_type(&self) -> Option<ComponentType> {
        ComponentType::from_label(&self.class)
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_array(self.bbox)
    }

    /// Unverified component for this detection, if its label is known
    pub fn to_component(&self) -> Option<Component> {
        Some(Component::new(&self.id, self.component_type()?, self.bounding_box()))
    }
}

pub fn parse_detections_str(json: &str) -> Result<Vec<Detection>, DetectionError> {
    Ok(serde_json::from_str(json)?)
}

pub fn load_detections(path: &Path) -> Result<Vec<Detection>, DetectionError> {
    let content = std::fs::read_to_string(path)?;
    parse_detections_str(&content)
}

/// Keep detections with `confidence >= threshold`, in input order
pub fn filter_by_confidence(detections: &[Detection], threshold: f64) -> Result<Vec<Detection>, DetectionError> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(DetectionError::InvalidThreshold(threshold));
    }
    let kept: Vec<Detection> = detections
        .iter()
        .filter(|d| d.confidence >= threshold)
        .cloned()
        .collect();
    tracing::debug!(
        "Kept {} of {} detections at threshold {}",
        kept.len(),
        detections.len(),
        threshold
    );
    Ok(kept)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionSummary {
    pub total: usize,
    pub by_type: BTreeMap<ComponentType, usize>,
    /// Labels that map to no component type, deduplicated
    pub unknown_labels: Vec<String>,
}

impl DetectionSummary {
    pub fn from_detections(detections: &[Detection]) -> Self {
        let mut summary = DetectionSummary {
            total: detections.len(),
            ..Default::default()
        };
        for detection in detections {
            match detection.component_type() {
                Some(t) => *summary.by_type.entry(t).or_default() += 1,
                None => {
                    if !summary.unknown_labels.contains(&detection.class) {
                        summary.unknown_labels.push(detection.class.clone());
                    }
                }
            }
        }
        summary
    }

    pub fn count(&self, component_type: ComponentType) -> usize {
        self.by_type.get(&component_type).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Detection> {
        serde_json::from_str(
            r#"[
                {"class": "变压器", "confidence": 0.95, "bbox": [100, 150, 200, 250], "id": "t1"},
                {"class": "断路器", "confidence": 0.88, "bbox": [300, 200, 350, 280], "id": "b1"},
                {"class": "节点", "confidence": 0.92, "bbox": [450, 180, 470, 200], "id": "n1"},
                {"class": "电源", "confidence": 0.96, "bbox": [50, 100, 120, 140], "id": "s1"},
                {"class": "PT变压器", "confidence": 0.83, "bbox": [500, 300, 580, 350], "id": "pt1"},
                {"class": "开关", "confidence": 0.79, "bbox": [250, 350, 290, 380], "id": "sw1"}
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_filter_by_confidence() {
        let detections = sample();
        assert_eq!(filter_by_confidence(&detections, DEFAULT_CONFIDENCE_THRESHOLD).unwrap().len(), 6);

        let kept = filter_by_confidence(&detections, 0.85).unwrap();
        let ids: Vec<&str> = kept.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "b1", "n1", "s1"]);

        // inclusive bound
        assert_eq!(filter_by_confidence(&detections, 0.96).unwrap().len(), 1);
        assert!(matches!(
            filter_by_confidence(&detections, 1.5),
            Err(DetectionError::InvalidThreshold(_))
        ));
    }

    #[test]
    fn test_summary_counts_types() {
        let mut detections = sample();
        detections.push(Detection {
            id: "x1".to_string(),
            class: "电容".to_string(),
            confidence: 0.9,
            bbox: [0.0, 0.0, 1.0, 1.0],
        });
        let summary = DetectionSummary::from_detections(&detections);
        assert_eq!(summary.total, 7);
        assert_eq!(summary.count(ComponentType::Transformer), 1);
        assert_eq!(summary.count(ComponentType::Load), 0);
        assert_eq!(summary.unknown_labels, vec!["电容".to_string()]);
    }

    #[test]
    fn test_to_component() {
        let detections = sample();
        let component = detections[4].to_component().unwrap();
        assert_eq!(component.id, "pt1");
        assert_eq!(component.component_type, ComponentType::PotentialTransformer);
        assert_eq!(component.bounding_box, BoundingBox::new(500.0, 300.0, 580.0, 350.0));
        assert!(!component.verified);
    }
}
