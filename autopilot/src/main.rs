use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};

use sidearm_autopilot::pathing::{PathConfig, PathGraph};
use sidearm_autopilot::runner::{run_duel, run_matrix, write_json};
use sidearm_autopilot::scenario::{self, Scenario};

#[derive(Parser)]
#[command(name = "sidearm", about = "Shooter-platformer autopilot harness")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one scenario to completion and print the metrics.
    Run {
        /// Canned scenario name, or a path to a scenario JSON file.
        #[arg(long, default_value = "arena")]
        scenario: String,
        #[arg(long, default_value_t = 1800)]
        ticks: i32,
        /// Write the metrics report here as JSON.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Run every canned scenario in parallel and summarize.
    Bench {
        #[arg(long, default_value_t = 1800)]
        ticks: i32,
        #[arg(long)]
        jobs: Option<usize>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Build the movement graph for a scenario and report its coverage.
    Graph {
        #[arg(long, default_value = "arena")]
        scenario: String,
    },
}

fn resolve_scenario(name: &str) -> Result<Scenario> {
    if let Some(scenario) = scenario::canned(name) {
        return Ok(scenario);
    }
    let path = PathBuf::from(name);
    if path.exists() {
        return Scenario::load(&path);
    }
    Err(anyhow!(
        "unknown scenario '{name}' (canned: {})",
        scenario::canned_names().join(", ")
    ))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            scenario,
            ticks,
            out,
        } => {
            let scenario = resolve_scenario(&scenario)?;
            let metrics = run_duel(&scenario, ticks)?;
            println!(
                "{}: {} ticks, winner {:?}, {} events, {} shots",
                metrics.scenario, metrics.ticks, metrics.winner, metrics.damage_events,
                metrics.shots_fired
            );
            if let Some(path) = out {
                write_json(&path, &metrics)?;
                println!("report written to {}", path.display());
            }
        }
        Command::Bench { ticks, jobs, out } => {
            let scenarios: Vec<Scenario> = scenario::canned_names()
                .iter()
                .filter_map(|name| scenario::canned(name))
                .collect();
            let reports = run_matrix(&scenarios, ticks, jobs)?;
            for metrics in &reports {
                println!(
                    "{:<12} winner {:?} after {} ticks ({} events)",
                    metrics.scenario, metrics.winner, metrics.ticks, metrics.damage_events
                );
            }
            if let Some(path) = out {
                write_json(&path, &reports)?;
                println!("report written to {}", path.display());
            }
        }
        Command::Graph { scenario } => {
            let scenario = resolve_scenario(&scenario)?;
            let world = scenario.world();
            let graph = PathGraph::build(
                &world.level,
                &world.properties,
                scenario.spawn_a,
                PathConfig::default(),
            );
            println!(
                "{}: {} reachable tiles of {}x{}",
                scenario.name,
                graph.visited_tiles(),
                world.level.width(),
                world.level.height()
            );
            let across = graph.distance(scenario.spawn_a, scenario.spawn_b);
            match across {
                Some(ticks) => println!(
                    "spawn to spawn: {ticks:.0} ticks ({:.1}s)",
                    ticks / world.properties.ticks_per_second
                ),
                None => println!("spawn to spawn: unreachable"),
            }
        }
    }
    Ok(())
}
