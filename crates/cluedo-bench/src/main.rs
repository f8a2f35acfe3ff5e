use std::path::PathBuf;

use clap::Parser;

use cluedo_bench::config::{BenchmarkConfig, ResolvedOutputs};
use cluedo_bench::logging::init_logging;
use cluedo_bench::simulation::SimulationRunner;

/// Simulated-game benchmarking harness for the deduction engine.
#[derive(Debug, Parser)]
#[command(
    name = "cluedo-bench",
    author,
    version,
    about = "Deterministic deduction benchmark over seeded Cluedo games"
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "bench/bench.yaml")]
    config: PathBuf,

    /// Override the run identifier (substitutes {run_id} templates).
    #[arg(long, value_name = "RUN_ID")]
    run_id: Option<String>,

    /// Override the number of games to play.
    #[arg(long, value_name = "GAMES")]
    games: Option<usize>,

    /// Override the RNG seed for deal generation.
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Exit after validating the configuration (no games are played).
    #[arg(long)]
    validate_only: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = BenchmarkConfig::from_path(&cli.config)?;

    if let Some(run_id) = cli.run_id {
        config.run_id = run_id;
    }

    if let Some(games) = cli.games {
        config.games.count = games;
    }

    if let Some(seed) = cli.seed {
        config.games.seed = Some(seed);
    }

    config.validate()?;

    let outputs: ResolvedOutputs = config.resolved_outputs();
    let agent_count = config.agents.len();
    let run_id = config.run_id.clone();
    let games = config.games.count;
    let rotations = config.games.rotation_count(agent_count);

    println!(
        "Loaded configuration '{run_id}' with {agent_count} agents ({games} games, {rotations} rotation{})",
        if rotations == 1 { "" } else { "s" }
    );

    let runner = SimulationRunner::new(config.clone(), outputs.clone())?;

    if cli.validate_only {
        println!("Validation-only mode: simulation skipped.");
        return Ok(());
    }

    let _logging_guard = init_logging(&config.logging, &outputs, &run_id)?;

    let summary = runner.run()?;
    println!(
        "Simulation complete for '{run_id}': {} games × {} rotations → {} rows at {}",
        summary.games_played,
        summary.rotations,
        summary.rows_written,
        summary.jsonl_path.display()
    );
    println!("Summary table: {}", summary.summary_path.display());
    if let Some(plot_path) = summary.plot_path.as_ref() {
        println!("Turns-to-certainty plot: {}", plot_path.display());
    }
    if let Some(telemetry_path) = summary.telemetry_path.as_ref() {
        println!("Telemetry log: {}", telemetry_path.display());
    }
    if let Some(outputs) = summary.telemetry_outputs.as_ref() {
        println!("Telemetry summary (JSON): {}", outputs.json_path.display());
        println!(
            "Telemetry summary (Markdown): {}",
            outputs.markdown_path.display()
        );
        let deduction = &outputs.summary.deduction;
        match deduction.avg_passes {
            Some(avg) => println!(
                "  Deduction: {} ingested, {} rejected, avg {:.2} passes",
                deduction.ingested, deduction.rejected, avg
            ),
            None => println!("  Deduction: {} events captured", deduction.ingested),
        }
        if !deduction.rule_firings.is_empty() {
            println!("  Rule firings: {:?}", deduction.rule_firings);
        }
    }

    Ok(())
}
