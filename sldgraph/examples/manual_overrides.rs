//! Manual override example: pin a reviewer's edits over the engine output,
//! re-run, and export the reconciled model as JSON.

use anyhow::Context;
use sldgraph::export::export;
use sldgraph::model::Provenance;
use sldgraph::overrides::OverrideSet;
use sldgraph::prelude::*;
use sldgraph::JsonModelSink;
use std::path::Path;

fn main() -> anyhow::Result<()> {
    let path = Path::new("tests/fixtures/substation.json");
    let components = SldGraphCore::load_snapshot(path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    let options = AnalysisOptions::default();

    let before = SldGraphCore::analyze(&components, &options)?;
    println!(
        "Engine only: {} connections, {} warnings",
        before.stats.connection_count,
        before.warning_count()
    );

    // The switch sits too far from the breaker bay to be picked up.
    let mut overrides = OverrideSet::new();
    overrides.connect("sw1", "n1");

    let after = SldGraphCore::analyze_with_overrides(&components, &overrides, &options)?;
    println!(
        "With overrides: {} connections, {} warnings",
        after.stats.connection_count,
        after.warning_count()
    );

    if let Some(model) = after.outcome.model() {
        for c in model.connections.iter().filter(|c| c.provenance == Provenance::Manual) {
            println!("  pinned {}: {} - {} on {}", c.id, c.from_component_id, c.to_component_id, c.bus_name);
        }
    }

    println!();
    let mut sink = JsonModelSink::new(std::io::stdout()).pretty();
    export(&after.outcome, &mut sink).context("reconciled model was rejected")?;

    println!("\nOverrides (persist alongside the snapshot):");
    println!("{}", serde_json::to_string_pretty(&overrides)?);
    Ok(())
}
