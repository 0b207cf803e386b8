//! sldgraph CLI - single-line-diagram topology inference from the command line.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use sldgraph::detection::{filter_by_confidence, load_detections, Detection, DetectionSummary};
use sldgraph::engine::{percent_label, round3, ConfidenceBand};
use sldgraph::line_params::LINE_TEMPLATES;
use sldgraph::overrides::OverrideSet;
use sldgraph::{AnalysisOptions, AnalysisResult, SldGraphCore, ValidationEngine, ValidationOutcome};
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(name = "sldgraph")]
#[command(about = "Single-line diagram topology inference tool", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Infer buses and connections from a verified component snapshot
    Analyze {
        /// Path to a JSON array of components
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Engine configuration (JSON)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Manual overrides to layer over the engine output (JSON)
        #[arg(long, value_name = "FILE")]
        overrides: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,

        /// Exit with error code if the topology is invalid
        #[arg(long)]
        fail_on_invalid: bool,

        /// Exit with error code if any warning is reported
        #[arg(long)]
        strict: bool,
    },

    /// Filter raw detections by confidence
    Filter {
        /// Path to a JSON array of detections
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Minimum confidence to keep, in [0, 1]
        #[arg(short, long, default_value_t = 0.5)]
        threshold: f64,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// List topology validation rules (descriptions with --verbose)
    Rules,

    /// List built-in line parameter templates
    Templates,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Analyze {
            file,
            config,
            overrides,
            format,
            fail_on_invalid,
            strict,
        } => handle_analyze(&file, config.as_deref(), overrides.as_deref(), format, fail_on_invalid, strict),
        Commands::Filter {
            file,
            threshold,
            format,
        } => handle_filter(&file, threshold, format),
        Commands::Rules => {
            handle_rules(cli.verbose);
            Ok(0)
        }
        Commands::Templates => {
            handle_templates();
            Ok(0)
        }
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };
    process::exit(exit_code);
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn handle_analyze(
    file: &Path,
    config: Option<&Path>,
    overrides: Option<&Path>,
    format: OutputFormat,
    fail_on_invalid: bool,
    strict: bool,
) -> anyhow::Result<i32> {
    let mut options = match config {
        Some(path) => AnalysisOptions::with_config_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => AnalysisOptions::default(),
    };
    options.strict = strict;

    let components = SldGraphCore::load_snapshot(file)
        .with_context(|| format!("failed to read snapshot {}", file.display()))?;

    let mut result = match overrides {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read overrides {}", path.display()))?;
            let set: OverrideSet = serde_json::from_str(&content)
                .with_context(|| format!("failed to parse overrides {}", path.display()))?;
            SldGraphCore::analyze_with_overrides(&components, &set, &options)?
        }
        None => SldGraphCore::analyze(&components, &options)?,
    };
    result.file = Some(file.to_path_buf());

    match format {
        OutputFormat::Human => output_human(&result),
        OutputFormat::Json => output_json(&result)?,
    }

    if fail_on_invalid && !result.is_valid() {
        return Ok(1);
    }
    if options.strict && !result.passes(true) {
        return Ok(1);
    }
    Ok(0)
}

fn output_human(result: &AnalysisResult) {
    if let Some(file) = &result.file {
        println!("\nFile: {}", file.display());
    }
    println!("{}", "─".repeat(60));

    match &result.outcome {
        ValidationOutcome::Validated(model) => {
            println!("  Status: VALID");

            if !model.buses.is_empty() {
                println!("\n  BUSES:");
                for bus in &model.buses {
                    let members: Vec<&str> = bus.member_component_ids.iter().map(|s| s.as_str()).collect();
                    println!("    {} [{}]", bus.name, members.join(", "));
                }
            }

            if !model.connections.is_empty() {
                println!("\n  CONNECTIONS:");
                for c in &model.connections {
                    println!(
                        "    {}: {} - {} on {} ({}, {}, {}, {:?})",
                        c.id,
                        c.from_component_id,
                        c.to_component_id,
                        c.bus_name,
                        round3(c.confidence),
                        percent_label(c.confidence),
                        ConfidenceBand::of(c.confidence),
                        c.provenance
                    );
                }
            }
        }
        ValidationOutcome::Invalid(report) => {
            println!("  Status: INVALID");
            println!("\n  VIOLATIONS:");
            for v in &report.violations {
                println!("    - [{}] {}", v.kind, v.message);
                if let Some(ref comp) = v.component_id {
                    println!("      Component: {}", comp);
                }
            }
        }
    }

    let warnings = result.outcome.warnings();
    if !warnings.is_empty() {
        println!("\n  WARNINGS:");
        for w in warnings {
            println!("    - [{}] {}", w.kind, w.message);
        }
    }

    println!("\n  Summary:");
    println!("    Components: {} of {} admitted", result.stats.admitted_components, result.stats.input_components);
    println!("    Candidates: {}", result.stats.candidate_edges);
    println!("    Buses:      {}", result.stats.bus_count);
    println!("    Connections: {}", result.stats.connection_count);
    println!("    Warnings:   {}", result.warning_count());
    println!("    Violations: {}", result.violation_count());
}

fn output_json(result: &AnalysisResult) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(())
}

fn handle_filter(file: &Path, threshold: f64, format: OutputFormat) -> anyhow::Result<i32> {
    let detections =
        load_detections(file).with_context(|| format!("failed to read detections {}", file.display()))?;
    let kept = filter_by_confidence(&detections, threshold)?;
    let summary = DetectionSummary::from_detections(&kept);

    match format {
        OutputFormat::Human => output_detections_human(&detections, &kept, &summary, threshold),
        OutputFormat::Json => {
            let output = serde_json::json!({
                "threshold": threshold,
                "total": detections.len(),
                "kept": kept,
                "summary": summary,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(0)
}

fn output_detections_human(all: &[Detection], kept: &[Detection], summary: &DetectionSummary, threshold: f64) {
    println!(
        "Kept {} of {} detections (threshold {}):\n",
        kept.len(),
        all.len(),
        percent_label(threshold)
    );
    for d in kept {
        let label = match d.component_type() {
            Some(t) => t.key().to_string(),
            None => format!("unknown ({})", d.class),
        };
        println!(
            "  {:<8} {:<24} {:>6}  [{}, {}, {}, {}]",
            d.id,
            label,
            percent_label(d.confidence),
            d.bbox[0],
            d.bbox[1],
            d.bbox[2],
            d.bbox[3]
        );
    }

    if !summary.by_type.is_empty() {
        println!("\n  By type:");
        for (t, count) in &summary.by_type {
            println!("    {:<24} {}", t.key(), count);
        }
    }
    if !summary.unknown_labels.is_empty() {
        println!("\n  Unknown labels: {}", summary.unknown_labels.join(", "));
    }
}

fn handle_rules(verbose: bool) {
    println!("Available validation rules:\n");

    let engine = ValidationEngine::with_default_rules();
    for rule in engine.rules() {
        println!("  {}", rule.id());
        println!("    {}", rule.name());
        if verbose {
            println!("    {}", rule.description());
        }
        println!();
    }
}

fn handle_templates() {
    println!("Line parameter templates (per km):\n");
    for t in LINE_TEMPLATES {
        let p = &t.params;
        println!("  {} ({})", t.key, t.kind);
        println!(
            "    r1={} x1={} r0={} x0={} c1={} c0={} ampacity={}",
            p.r1, p.x1, p.r0, p.x0, p.c1, p.c0, p.ampacity
        );
        println!();
    }
}
