//! Topology Model Module
//!
//! Data records shared by every pipeline stage, plus a petgraph-backed view
//! of a resolved topology for connectivity queries.

pub mod schema;
pub mod topology;

pub use schema::*;
pub use topology::{TopologyGraph, TopologyNode, TopologyStats};
