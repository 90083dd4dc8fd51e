//! Receding-horizon rollout search.
//!
//! Two phases per tick. First the most threatening enemy policy is found by
//! simulating the acting unit holding still against every enemy candidate
//! and keeping whichever scores worst for us. Then every self-candidate is
//! rolled out against that policy - trusted only for a few ticks before it
//! degrades to neutral, since the prediction may simply be wrong - and the
//! damage-event streams are scored. Only the first action of the winner is
//! ever executed; the whole search runs again next tick.

use std::collections::BTreeMap;

use sidearm_core::geom::{distance_sqr, Vec2, EPS};
use sidearm_core::sim::{SimFlags, Simulation};
use sidearm_core::types::{UnitAction, World};

use crate::pathing::PathGraph;
use crate::policy;
use crate::telemetry::DebugSink;

#[derive(Clone, Debug)]
pub struct SearchConfig {
    /// Rollout horizon in ticks.
    pub horizon: usize,
    /// How long the predicted enemy policy is trusted before degrading to
    /// neutral.
    pub enemy_commit_ticks: usize,
    /// Per-tick exponential decay on event value.
    pub decay: f64,
    /// Amplifier on damage taken: a life lost outweighs a life taken.
    pub self_damage_weight: f64,
    /// Scale on the goal-progress term (path ticks x importance).
    pub path_weight: f64,
    /// Score band, scaled by target importance, inside which the tie-break
    /// ladder decides instead of the raw score.
    pub epsilon: f64,
    /// The first `fine_ticks` of a rollout run at `micro_fine` subdivision,
    /// the rest at `micro_coarse`.
    pub fine_ticks: usize,
    pub micro_fine: u32,
    pub micro_coarse: u32,
    /// Path cost charged when the goal is unknown to the graph.
    pub unknown_distance: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            horizon: 30,
            enemy_commit_ticks: 8,
            decay: 0.92,
            self_damage_weight: 1.8,
            path_weight: 0.1,
            epsilon: 1e-3,
            fine_ticks: 4,
            micro_fine: 20,
            micro_coarse: 5,
            unknown_distance: 1_000.0,
        }
    }
}

/// Per-tick goal feed from the host's heuristics. The core treats it as an
/// opaque scoring input.
#[derive(Clone, Debug)]
pub struct Directive {
    pub goal: Vec2,
    pub importance: f64,
    pub focus_enemy: Option<i32>,
    /// The action the caller would take without the planner; used as the
    /// fallback and as the tie-break reference.
    pub base_action: UnitAction,
}

struct RolloutOutcome {
    score: f64,
    events: usize,
    first: UnitAction,
}

/// Pick this tick's movement override, or `None` when no candidate policy
/// produced a single damage event - then the caller's own action stands.
pub fn plan(
    world: &World,
    me: i32,
    directive: &Directive,
    graph: &PathGraph,
    config: &SearchConfig,
    sink: &mut dyn DebugSink,
) -> Option<UnitAction> {
    world.unit(me)?;
    let enemy = directive
        .focus_enemy
        .filter(|id| world.unit(*id).is_some())
        .or_else(|| nearest_enemy(world, me))?;

    // Phase 1: the enemy policy that hurts a passive us the most.
    let neutral = policy::neutral(config.horizon);
    let mut worst: Option<(f64, Vec<UnitAction>)> = None;
    for counter in policy::candidate_chains(config.horizon) {
        let outcome = rollout(world, me, enemy, &neutral, &counter, graph, directive, config);
        if worst
            .as_ref()
            .is_none_or(|(score, _)| outcome.score < *score)
        {
            worst = Some((outcome.score, counter));
        }
    }
    let (threat_score, worst_chain) = worst?;
    sink.log(&format!(
        "worst enemy policy scores {threat_score:.2} against a passive self"
    ));

    // Trust the prediction only briefly.
    let commit = config.enemy_commit_ticks.min(config.horizon);
    let enemy_plan = policy::concat(
        worst_chain[..commit].to_vec(),
        &policy::neutral(config.horizon - commit),
    );

    // Phase 2: our candidates against the committed threat.
    let mut best: Option<RolloutOutcome> = None;
    let mut any_events = false;
    for candidate in policy::candidate_chains(config.horizon) {
        let outcome = rollout(
            world,
            me,
            enemy,
            &candidate,
            &enemy_plan,
            graph,
            directive,
            config,
        );
        sink.rollout_scored(&outcome.first, outcome.score, outcome.events);
        if outcome.events > 0 {
            any_events = true;
        }
        let replace = match &best {
            None => true,
            Some(current) => prefer(&outcome, current, directive, config),
        };
        if replace {
            best = Some(outcome);
        }
    }

    // Nothing observable anywhere: defer to the caller's default.
    if !any_events {
        return None;
    }
    best.map(|outcome| outcome.first)
}

fn nearest_enemy(world: &World, me: i32) -> Option<i32> {
    let my_unit = world.unit(me)?;
    let mut nearest: Option<(f64, i32)> = None;
    for id in world.enemies_of(my_unit.player_id) {
        let Some(enemy) = world.unit(id) else {
            continue;
        };
        let separation = distance_sqr(my_unit.position, enemy.position);
        if nearest.is_none_or(|(best, _)| separation < best) {
            nearest = Some((separation, id));
        }
    }
    nearest.map(|(_, id)| id)
}

#[allow(clippy::too_many_arguments)]
fn rollout(
    world: &World,
    me: i32,
    enemy: i32,
    my_chain: &[UnitAction],
    enemy_chain: &[UnitAction],
    graph: &PathGraph,
    directive: &Directive,
    config: &SearchConfig,
) -> RolloutOutcome {
    let first = my_chain.first().copied().unwrap_or_default();
    let mut sim = Simulation::new(
        world.clone(),
        SimFlags {
            pickups: true,
            suicide: true,
            micro_ticks: config.micro_fine,
            ..SimFlags::default()
        },
    );

    for tick in 0..config.horizon {
        let mut my_action = my_chain.get(tick).copied().unwrap_or_default();
        let mut enemy_action = enemy_chain.get(tick).copied().unwrap_or_default();
        // Refresh aim and trigger from the simulated positions so speculative
        // fire tracks the rollout, not the stale snapshot.
        if let (Some(mine), Some(theirs)) = (sim.world.unit(me), sim.world.unit(enemy)) {
            my_action.aim = theirs.center() - mine.center();
            my_action.shoot = true;
            enemy_action.aim = mine.center() - theirs.center();
            enemy_action.shoot = true;
        }
        let mut actions = BTreeMap::new();
        actions.insert(me, my_action);
        actions.insert(enemy, enemy_action);
        let micro = if tick < config.fine_ticks {
            config.micro_fine
        } else {
            config.micro_coarse
        };
        sim.simulate_with(&actions, Some(micro));
    }

    let score = score_rollout(&sim, world, me, directive, graph, config);
    RolloutOutcome {
        score,
        events: sim.events.len(),
        first,
    }
}

fn score_rollout(
    sim: &Simulation,
    start_world: &World,
    me: i32,
    directive: &Directive,
    graph: &PathGraph,
    config: &SearchConfig,
) -> f64 {
    let my_player = start_world.unit(me).map(|unit| unit.player_id);
    let mut remaining_health = start_world.unit(me).map_or(0.0, |unit| unit.health);

    let mut score = 0.0;
    for event in &sim.events {
        let Some(target) = start_world.unit(event.unit_id) else {
            continue;
        };
        // Teammate outcomes are already priced into the enemy's side of the
        // ledger; counting them again double-penalises.
        if Some(target.player_id) == my_player && event.unit_id != me {
            continue;
        }
        let probability = if event.real {
            1.0
        } else {
            event.probability.min(1.0)
        };
        let decay = config.decay.powi(event.tick);

        if event.unit_id == me {
            if event.damage > 0.0 {
                // Damage beyond death is irrelevant; clamp to what is left.
                let effective = event.damage.min(remaining_health);
                remaining_health = (remaining_health - effective).max(0.0);
                score -= config.self_damage_weight * effective * probability * decay;
            } else {
                score += -event.damage * probability * decay;
            }
        } else {
            score += event.damage * probability * decay;
        }
    }

    // Goal progress: stalling far from the target is a cost in itself.
    let end_position = sim
        .world
        .unit(me)
        .map_or(directive.goal, |unit| unit.position);
    let path_ticks = graph
        .distance(end_position, directive.goal)
        .unwrap_or(config.unknown_distance);
    score - path_ticks * directive.importance * config.path_weight
}

/// Is `candidate` preferable to `current`? Inside the epsilon band the
/// tie-break ladder compares first actions against the caller's own intent:
/// matching velocity sign wins, then matching jump, then matching jump-down.
fn prefer(
    candidate: &RolloutOutcome,
    current: &RolloutOutcome,
    directive: &Directive,
    config: &SearchConfig,
) -> bool {
    let epsilon = config.epsilon * directive.importance.abs();
    if (candidate.score - current.score).abs() >= epsilon {
        return candidate.score > current.score;
    }

    let target = &directive.base_action;
    let candidate_direction = same_direction(candidate.first.velocity, target.velocity);
    let current_direction = same_direction(current.first.velocity, target.velocity);
    if candidate_direction != current_direction {
        return candidate_direction;
    }
    if candidate.first.jump != current.first.jump {
        return candidate.first.jump == target.jump;
    }
    if candidate.first.jump_down != current.first.jump_down {
        return candidate.first.jump_down == target.jump_down;
    }
    candidate.score > current.score
}

fn same_direction(a: f64, b: f64) -> bool {
    a * b > 0.0 || (a.abs() < EPS && b.abs() < EPS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(score: f64, velocity: f64, jump: bool) -> RolloutOutcome {
        RolloutOutcome {
            score,
            events: 1,
            first: UnitAction {
                velocity,
                jump,
                ..UnitAction::default()
            },
        }
    }

    fn directive_toward(velocity: f64) -> Directive {
        Directive {
            goal: Vec2::new(10.0, 1.0),
            importance: 1.0,
            focus_enemy: None,
            base_action: UnitAction {
                velocity,
                jump: false,
                ..UnitAction::default()
            },
        }
    }

    #[test]
    fn clear_score_gap_ignores_the_ladder() {
        let config = SearchConfig::default();
        let directive = directive_toward(100.0);
        // Much better score wins even with the "wrong" direction.
        assert!(prefer(
            &outcome(5.0, -100.0, false),
            &outcome(1.0, 100.0, false),
            &directive,
            &config
        ));
    }

    #[test]
    fn ties_fall_back_to_matching_the_caller_intent() {
        let config = SearchConfig::default();
        let directive = directive_toward(100.0);
        // Same score: matching velocity sign wins.
        assert!(prefer(
            &outcome(1.0, 100.0, false),
            &outcome(1.0, -100.0, false),
            &directive,
            &config
        ));
        assert!(!prefer(
            &outcome(1.0, -100.0, false),
            &outcome(1.0, 100.0, false),
            &directive,
            &config
        ));
        // Same direction: matching jump flag breaks the tie.
        assert!(!prefer(
            &outcome(1.0, 100.0, true),
            &outcome(1.0, 100.0, false),
            &directive,
            &config
        ));
    }
}
