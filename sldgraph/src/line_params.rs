//! Line parameters between resolved buses.
//!
//! Sequence impedances per km (ohm), capacitances per km (nF) and ampacity
//! (A). Lines reference buses by name, so they are checked against the
//! model they were entered for.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::model::TopologyModel;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LineParamError {
    #[error("Unknown line: {0}")]
    UnknownLine(String),

    #[error("Unknown line template: {0}")]
    UnknownTemplate(String),

    #[error("Invalid line length {0} km; must be positive and finite")]
    InvalidLength(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    Overhead,
    Cable,
    Busbar,
}

impl LineKind {
    pub fn label(&self) -> &'static str {
        match self {
            LineKind::Overhead => "架空线",
            LineKind::Cable => "电缆",
            LineKind::Busbar => "母线",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "架空线" | "overhead" => Some(LineKind::Overhead),
            "电缆" | "cable" => Some(LineKind::Cable),
            "母线" | "busbar" => Some(LineKind::Busbar),
            _ => None,
        }
    }
}

impl std::fmt::Display for LineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElectricalParams {
    pub r1: f64,
    pub x1: f64,
    pub r0: f64,
    pub x0: f64,
    pub c1: f64,
    pub c0: f64,
    pub ampacity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LineTemplate {
    pub key: &'static str,
    pub kind: LineKind,
    pub params: ElectricalParams,
}

pub const LINE_TEMPLATES: &[LineTemplate] = &[
    LineTemplate {
        key: "架空线_10kV",
        kind: LineKind::Overhead,
        params: ElectricalParams {
            r1: 0.0648,
            x1: 0.3378,
            r0: 0.2580,
            x0: 1.0170,
            c1: 13.5,
            c0: 9.5,
            ampacity: 400.0,
        },
    },
    LineTemplate {
        key: "电缆_10kV",
        kind: LineKind::Cable,
        params: ElectricalParams {
            r1: 0.0324,
            x1: 0.0845,
            r0: 0.0972,
            x0: 0.2535,
            c1: 280.0,
            c0: 230.0,
            ampacity: 600.0,
        },
    },
    LineTemplate {
        key: "母线_10kV",
        kind: LineKind::Busbar,
        params: ElectricalParams {
            r1: 0.0100,
            x1: 0.0500,
            r0: 0.0300,
            x0: 0.1500,
            c1: 500.0,
            c0: 400.0,
            ampacity: 1000.0,
        },
    },
];

pub fn template(key: &str) -> Option<&'static LineTemplate> {
    LINE_TEMPLATES.iter().find(|t| t.key == key)
}

/// Default template for a kind
pub fn template_for(kind: LineKind) -> &'static LineTemplate {
    match kind {
        LineKind::Overhead => &LINE_TEMPLATES[0],
        LineKind::Cable => &LINE_TEMPLATES[1],
        LineKind::Busbar => &LINE_TEMPLATES[2],
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineParameter {
    pub id: String,
    pub from_bus: String,
    pub to_bus: String,
    pub length_km: f64,
    pub kind: LineKind,
    #[serde(flatten)]
    pub params: ElectricalParams,
}

/// A line whose endpoint names no bus of the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnknownBusReference {
    pub line_id: String,
    pub bus_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineParameterTable {
    lines: Vec<LineParameter>,
    next_id: usize,
}

impl LineParameterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a line with the kind's default template; returns its id
    pub fn add_line(
        &mut self,
        from_bus: &str,
        to_bus: &str,
        length_km: f64,
        kind: LineKind,
    ) -> Result<String, LineParamError> {
        check_length(length_km)?;
        self.next_id += 1;
        let id = format!("line{}", self.next_id);
        self.lines.push(LineParameter {
            id: id.clone(),
            from_bus: from_bus.to_string(),
            to_bus: to_bus.to_string(),
            length_km,
            kind,
            params: template_for(kind).params,
        });
        Ok(id)
    }

    pub fn get(&self, id: &str) -> Option<&LineParameter> {
        self.lines.iter().find(|l| l.id == id)
    }

    pub fn lines(&self) -> &[LineParameter] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn line_mut(&mut self, id: &str) -> Result<&mut LineParameter, LineParamError> {
        self.lines
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| LineParamError::UnknownLine(id.to_string()))
    }

    /// Edit a line in place. The edit is rolled back if it leaves an
    /// invalid length.
    pub fn update<F>(&mut self, id: &str, edit: F) -> Result<(), LineParamError>
    where
        F: FnOnce(&mut LineParameter),
    {
        let line = self.line_mut(id)?;
        let before = line.clone();
        edit(line);
        line.id = before.id.clone();
        if let Err(e) = check_length(line.length_km) {
            *line = before;
            return Err(e);
        }
        Ok(())
    }

    /// Overwrite the electrical parameters from a template. Kind, endpoints
    /// and length are left alone.
    pub fn apply_template(&mut self, id: &str, key: &str) -> Result<(), LineParamError> {
        let template = template(key).ok_or_else(|| LineParamError::UnknownTemplate(key.to_string()))?;
        self.line_mut(id)?.params = template.params;
        Ok(())
    }

    /// Copy kind and electrical parameters, not endpoints or length
    pub fn copy_parameters(&mut self, from_id: &str, to_id: &str) -> Result<(), LineParamError> {
        let source = self
            .get(from_id)
            .ok_or_else(|| LineParamError::UnknownLine(from_id.to_string()))?;
        let (kind, params) = (source.kind, source.params);
        let target = self.line_mut(to_id)?;
        target.kind = kind;
        target.params = params;
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Result<LineParameter, LineParamError> {
        let position = self
            .lines
            .iter()
            .position(|l| l.id == id)
            .ok_or_else(|| LineParamError::UnknownLine(id.to_string()))?;
        Ok(self.lines.remove(position))
    }

    /// Every endpoint that names no bus of `model`
    pub fn check_against(&self, model: &TopologyModel) -> Vec<UnknownBusReference> {
        let names: BTreeSet<&str> = model.buses.iter().map(|b| b.name.as_str()).collect();
        let mut unknown = Vec::new();
        for line in &self.lines {
            for bus in [&line.from_bus, &line.to_bus] {
                if !names.contains(bus.as_str()) {
                    unknown.push(UnknownBusReference {
                        line_id: line.id.clone(),
                        bus_name: bus.clone(),
                    });
                }
            }
        }
        unknown
    }
}

fn check_length(length_km: f64) -> Result<(), LineParamError> {
    if length_km.is_finite() && length_km > 0.0 {
        Ok(())
    } else {
        Err(LineParamError::InvalidLength(length_km))
    }
}
