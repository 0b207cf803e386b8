//! Simple analysis example: infer the topology of a component snapshot and print it.

use anyhow::Context;
use sldgraph::engine::round3;
use sldgraph::prelude::*;
use std::path::Path;

fn main() -> anyhow::Result<()> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "tests/fixtures/substation.json".to_string());
    let path = Path::new(&path);

    if !path.exists() {
        eprintln!("File not found: {}", path.display());
        eprintln!("Usage: cargo run --example simple_analysis [path/to/components.json]");
        std::process::exit(1);
    }

    let result = SldGraphCore::analyze_file(path, &AnalysisOptions::default())
        .with_context(|| format!("analysis of {} failed", path.display()))?;

    println!("Topology for: {}", path.display());
    println!(
        "{} of {} components admitted, {} candidate edges",
        result.stats.admitted_components, result.stats.input_components, result.stats.candidate_edges
    );
    println!();

    match &result.outcome {
        ValidationOutcome::Validated(model) => {
            for bus in &model.buses {
                let members: Vec<&str> = bus.member_component_ids.iter().map(|s| s.as_str()).collect();
                println!("{}: {}", bus.name, members.join(", "));
            }
            println!();
            for c in &model.connections {
                println!(
                    "  {} {} - {} ({})",
                    c.id,
                    c.from_component_id,
                    c.to_component_id,
                    round3(c.confidence)
                );
            }
        }
        ValidationOutcome::Invalid(report) => {
            println!("Topology is INVALID:");
            for v in &report.violations {
                println!("  - [{}] {}", v.kind, v.message);
            }
        }
    }

    let warnings = result.outcome.warnings();
    if !warnings.is_empty() {
        println!("\nWarnings:");
        for w in warnings {
            println!("  - [{}] {}", w.kind, w.message);
        }
    }

    Ok(())
}
