use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sldgraph::model::BoundingBox;
use sldgraph::prelude::*;
use std::path::PathBuf;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Rows of breaker-node-transformer bays spaced along a grid
fn synthetic_snapshot(bays: usize) -> Vec<Component> {
    let kinds = [
        ComponentType::Source,
        ComponentType::CircuitBreaker,
        ComponentType::Node,
        ComponentType::Transformer,
        ComponentType::Switch,
        ComponentType::Load,
    ];
    let mut components = Vec::with_capacity(bays * kinds.len());
    for bay in 0..bays {
        let x = (bay % 20) as f64 * 150.0;
        let y0 = (bay / 20) as f64 * 700.0;
        for (row, kind) in kinds.iter().enumerate() {
            let y = y0 + row as f64 * 100.0;
            components.push(
                Component::new(
                    format!("{}{}", kind.key(), bay),
                    *kind,
                    BoundingBox::new(x, y, x + 40.0, y + 40.0),
                )
                .verified(),
            );
        }
    }
    components
}

fn bench_analyze_fixture(c: &mut Criterion) {
    let components = SldGraphCore::load_snapshot(&fixture_path("substation.json")).unwrap();
    let options = AnalysisOptions::default();

    c.bench_function("analyze_substation", |b| {
        b.iter(|| SldGraphCore::analyze(black_box(&components), black_box(&options)));
    });
}

fn bench_analyze_synthetic(c: &mut Criterion) {
    let components = synthetic_snapshot(200);
    let engine = TopologyEngine::new(EngineConfig::default()).unwrap();

    c.bench_function("engine_run_1200_components", |b| {
        b.iter(|| engine.run(black_box(&components)));
    });
}

criterion_group!(benches, bench_analyze_fixture, bench_analyze_synthetic);
criterion_main!(benches);
