//! Headless duels: both units planner-driven, the world advanced by the
//! simulator acting as the host game loop (real bullets, pickups live).

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use rayon::prelude::*;
use serde::Serialize;

use sidearm_core::sim::{SimFlags, Simulation};

use crate::director;
use crate::planner::Planner;
use crate::scenario::Scenario;
use crate::telemetry::TracingSink;

#[derive(Clone, Debug, Serialize)]
pub struct RunMetrics {
    pub scenario: String,
    pub ticks: i32,
    pub winner: Option<i32>,
    /// Health of every unit still standing at the end.
    pub survivors: BTreeMap<i32, f64>,
    pub damage_events: usize,
    pub shots_fired: u32,
    pub jump_ticks: u32,
    pub mine_flags: u32,
}

pub fn run_duel(scenario: &Scenario, max_ticks: i32) -> Result<RunMetrics> {
    if max_ticks <= 0 {
        return Err(anyhow!("max_ticks must be > 0"));
    }

    let mut sim = Simulation::new(
        scenario.world(),
        SimFlags {
            pickups: true,
            real_fire: true,
            ..SimFlags::default()
        },
    );
    let unit_ids: Vec<i32> = sim.world.units.keys().copied().collect();
    let mut planners: BTreeMap<i32, Planner> = unit_ids
        .iter()
        .map(|id| (*id, Planner::new()))
        .collect();
    let mut sink = TracingSink;

    let mut shots_fired = 0;
    let mut jump_ticks = 0;
    let mut mine_flags = 0;
    let mut ticks = 0;

    for _ in 0..max_ticks {
        let alive: Vec<i32> = sim
            .world
            .units
            .values()
            .filter(|unit| unit.health > 0.0)
            .map(|unit| unit.id)
            .collect();
        let players: Vec<i32> = dedup_players(&sim, &alive);
        if players.len() < 2 {
            break;
        }

        let mut actions = BTreeMap::new();
        for id in &alive {
            let Some(planner) = planners.get_mut(id) else {
                continue;
            };
            let directive = director::directive(&sim.world, *id);
            let action = planner.act(&sim.world, *id, &directive, &mut sink);
            if action.shoot {
                shots_fired += 1;
            }
            if action.jump {
                jump_ticks += 1;
            }
            if action.plant_mine {
                mine_flags += 1;
            }
            actions.insert(*id, action);
        }

        sim.simulate(&actions);
        sim.world.units.retain(|_, unit| unit.health > 0.0);
        ticks += 1;
    }

    let survivors: BTreeMap<i32, f64> = sim
        .world
        .units
        .values()
        .map(|unit| (unit.id, unit.health))
        .collect();
    let remaining: Vec<i32> = {
        let alive: Vec<i32> = sim.world.units.keys().copied().collect();
        dedup_players(&sim, &alive)
    };
    let winner = match remaining.as_slice() {
        [player] => Some(*player),
        _ => None,
    };

    Ok(RunMetrics {
        scenario: scenario.name.clone(),
        ticks,
        winner,
        survivors,
        damage_events: sim.events.len(),
        shots_fired,
        jump_ticks,
        mine_flags,
    })
}

fn dedup_players(sim: &Simulation, unit_ids: &[i32]) -> Vec<i32> {
    let mut players: Vec<i32> = unit_ids
        .iter()
        .filter_map(|id| sim.world.unit(*id).map(|unit| unit.player_id))
        .collect();
    players.sort_unstable();
    players.dedup();
    players
}

/// Write any serializable report next to its parents, creating them.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed creating directory {}", parent.display()))?;
    }
    let encoded = serde_json::to_string_pretty(value).context("failed encoding report")?;
    fs::write(path, encoded).with_context(|| format!("failed writing {}", path.display()))
}

/// Run a set of scenarios concurrently. Each duel owns its world outright,
/// so this parallelism needs no synchronization.
pub fn run_matrix(
    scenarios: &[Scenario],
    max_ticks: i32,
    jobs: Option<usize>,
) -> Result<Vec<RunMetrics>> {
    if scenarios.is_empty() {
        return Err(anyhow!("matrix requires at least one scenario"));
    }

    let run_one = |scenario: &Scenario| -> Result<RunMetrics> {
        run_duel(scenario, max_ticks)
            .with_context(|| format!("duel failed in scenario '{}'", scenario.name))
    };

    let results: Vec<Result<RunMetrics>> = if let Some(jobs) = jobs {
        if jobs == 0 {
            return Err(anyhow!("--jobs must be >= 1 when provided"));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build()
            .context("failed to build rayon threadpool")?;
        pool.install(|| scenarios.par_iter().map(run_one).collect())
    } else {
        scenarios.par_iter().map(run_one).collect()
    };

    let mut reports = Vec::with_capacity(results.len());
    for result in results {
        reports.push(result?);
    }
    Ok(reports)
}
