//! `evac` — drive the rescue engine from the command line.
//!
//! Two subcommands:
//!
//! - `evac run <building.json>` — one simulation with a per-tick progress
//!   line and a final stats table; optionally writes a CSV tick trace.
//! - `evac benchmark <building.json> --trials N` — independent seeded
//!   trials in parallel (the core stays single-threaded; parallelism is
//!   across trials), summarized into a JSON array.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use tracing_subscriber::EnvFilter;

use ev_core::SimRng;
use ev_graph::BuildingConfig;
use ev_model::{ModelConfig, RescueModel};
use ev_output::{CsvTraceWriter, JsonTrialWriter, TickTraceRow, TrialRecorder, TrialSummary};
use ev_sim::{Simulation, SimulationBuilder};

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "evac", about = "Building-evacuation rescue engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one evacuation and print the outcome.
    Run {
        /// Building config JSON.
        building: PathBuf,
        /// Number of responders.
        #[arg(long, default_value_t = 2)]
        firefighters: usize,
        /// Optimizer fire-proximity weight (w_f ≥ 0).
        #[arg(long, default_value_t = 0.0)]
        fire_weight: f64,
        /// Kernel and planner seed.
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Give up after this many ticks.
        #[arg(long, default_value_t = 600)]
        max_ticks: u64,
        /// Directory for a per-tick CSV trace (skipped if absent).
        #[arg(long)]
        trace_dir: Option<PathBuf>,
    },
    /// Run many seeded trials and write a JSON summary array.
    Benchmark {
        /// Building config JSON.
        config: PathBuf,
        #[arg(long, default_value_t = 20)]
        trials: u64,
        #[arg(long, default_value_t = 0.0)]
        fire_weight: f64,
        #[arg(long, default_value_t = 2)]
        firefighters: usize,
        /// Output file for the JSON trial array.
        #[arg(long, short, default_value = "benchmark.json")]
        output: PathBuf,
        #[arg(long, default_value_t = 600)]
        max_ticks: u64,
        /// Root seed; per-trial seeds derive from it deterministically.
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    match Cli::parse().command {
        Command::Run {
            building,
            firefighters,
            fire_weight,
            seed,
            max_ticks,
            trace_dir,
        } => run_once(&building, firefighters, fire_weight, seed, max_ticks, trace_dir),
        Command::Benchmark {
            config,
            trials,
            fire_weight,
            firefighters,
            output,
            max_ticks,
            seed,
        } => benchmark(&config, trials, fire_weight, firefighters, &output, max_ticks, seed),
    }
}

// ── Single run ────────────────────────────────────────────────────────────────

fn run_once(
    building: &PathBuf,
    firefighters: usize,
    fire_weight: f64,
    seed: u64,
    max_ticks: u64,
    trace_dir: Option<PathBuf>,
) -> Result<()> {
    let config = BuildingConfig::from_path(building)
        .with_context(|| format!("loading {}", building.display()))?;
    let mut sim = SimulationBuilder::new(&config, firefighters, seed).build()?;
    let mut model = RescueModel::new(ModelConfig {
        fire_priority_weight: fire_weight,
        sweep_seed: seed,
        ..ModelConfig::default()
    });

    let mut trace = match &trace_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            Some(CsvTraceWriter::new(dir)?)
        }
        None => None,
    };

    println!(
        "=== evac run — {} responders, seed {} ===",
        firefighters, seed
    );
    println!(
        "Building: {} vertices, {} edges, fire at {:?}",
        sim.graph().vertex_count(),
        sim.graph().edge_count(),
        sim.vertex_name(sim.fire_origin()),
    );

    let t0 = Instant::now();
    let mut recorder = TrialRecorder::new();
    for _ in 0..max_ticks {
        if sim.stats().remaining == 0 {
            break;
        }
        let state = sim.read();
        let actions = model.decide(&state);
        let result = sim.update(&actions);
        recorder.observe(&result);

        if let Some(trace) = trace.as_mut() {
            let stats = sim.stats();
            trace.write_tick(&TickTraceRow {
                tick: result.tick.0,
                phase: model.phase().to_string(),
                rescued: stats.rescued,
                dead: stats.dead,
                remaining: stats.remaining,
                edges_existing: state.existing_edges().len(),
            })?;
        }
        if !result.events.is_empty() {
            println!(
                "T{:<5} phase={:<6} rescued={:<3} dead={:<3} events={}",
                result.tick.0,
                model.phase().to_string(),
                sim.stats().rescued,
                sim.stats().dead,
                result.events.len()
            );
        }
    }
    if let Some(trace) = trace.as_mut() {
        trace.finish()?;
    }

    // Final table.
    let stats = sim.stats();
    println!();
    println!("Finished in {:.3} s", t0.elapsed().as_secs_f64());
    println!("{:<16} {:>8}", "metric", "value");
    println!("{}", "-".repeat(26));
    println!("{:<16} {:>8}", "ticks", stats.tick);
    println!("{:<16} {:>8.1}", "minutes", stats.time_minutes);
    println!("{:<16} {:>8}", "total", stats.total_initial);
    println!("{:<16} {:>8}", "rescued", stats.rescued);
    println!("{:<16} {:>8}", "dead", stats.dead);
    println!("{:<16} {:>8}", "unaccounted", stats.remaining);
    println!("{:<16} {:>8}", "replans", model.replan_count());

    let summary = recorder.finish(
        &stats,
        seed,
        sim.vertex_name(sim.fire_origin()),
        model.replan_count(),
    );
    println!(
        "survival rate: {:.1}%  (last rescue at T{})",
        summary.survival_rate * 100.0,
        summary.last_rescue_tick
    );
    Ok(())
}

// ── Benchmark sweep ───────────────────────────────────────────────────────────

fn benchmark(
    config_path: &PathBuf,
    trials: u64,
    fire_weight: f64,
    firefighters: usize,
    output: &PathBuf,
    max_ticks: u64,
    root_seed: u64,
) -> Result<()> {
    if trials == 0 {
        bail!("--trials must be ≥ 1");
    }
    let config = BuildingConfig::from_path(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    // Derive per-trial seeds up front so parallel scheduling can't change them.
    let mut root = SimRng::new(root_seed);
    let seeds: Vec<u64> = (0..trials).map(|i| {
        let mut child = root.child(i);
        child.random()
    }).collect();

    println!(
        "=== evac benchmark — {} trials, {} responders, w_f = {} ===",
        trials, firefighters, fire_weight
    );
    let t0 = Instant::now();

    // Each trial is an independent single-threaded simulation; Rayon only
    // fans out across trials.
    let summaries: Vec<TrialSummary> = seeds
        .par_iter()
        .map(|&seed| run_trial(&config, firefighters, fire_weight, seed, max_ticks))
        .collect::<Result<Vec<_>>>()?;

    let mut writer = JsonTrialWriter::new(output);
    writer.extend(summaries.iter().cloned());
    writer.finish()?;

    let mean_survival: f64 =
        summaries.iter().map(|s| s.survival_rate).sum::<f64>() / summaries.len() as f64;
    let incomplete = summaries.iter().filter(|s| s.rescued + s.dead < s.total_initial).count();
    println!(
        "{} trials in {:.2} s → {}",
        summaries.len(),
        t0.elapsed().as_secs_f64(),
        output.display()
    );
    println!("mean survival rate: {:.1}%", mean_survival * 100.0);
    if incomplete > 0 {
        println!("{incomplete} trial(s) hit the tick limit with occupants unaccounted");
    }
    Ok(())
}

fn run_trial(
    config: &BuildingConfig,
    firefighters: usize,
    fire_weight: f64,
    seed: u64,
    max_ticks: u64,
) -> Result<TrialSummary> {
    let mut sim: Simulation = SimulationBuilder::new(config, firefighters, seed).build()?;
    let mut model = RescueModel::new(ModelConfig {
        fire_priority_weight: fire_weight,
        sweep_seed: seed,
        ..ModelConfig::default()
    });

    let mut recorder = TrialRecorder::new();
    for _ in 0..max_ticks {
        if sim.stats().remaining == 0 {
            break;
        }
        let state = sim.read();
        let actions = model.decide(&state);
        let result = sim.update(&actions);
        recorder.observe(&result);
    }

    let origin = sim.vertex_name(sim.fire_origin()).to_owned();
    Ok(recorder.finish(&sim.stats(), seed, origin, model.replan_count()))
}
