//! Hit estimation: should the trigger be pulled this tick?
//!
//! One virtual bullet fan is rolled out against a small set of enemy
//! counter-policies. Each fan sample that strikes a unit fills that unit's
//! angle slot; the final per-unit chance is the fraction of slots that hit
//! under *every* counter-policy, so the enemy's best dodge is priced in.

use std::collections::BTreeMap;

use sidearm_core::geom::Vec2;
use sidearm_core::sim::{SimFlags, Simulation, VIRTUAL_FAN_HALF_WIDTH};
use sidearm_core::types::{WeaponKind, World};

use crate::policy;

#[derive(Clone, Debug)]
pub struct GunneryConfig {
    /// Rollout length in ticks.
    pub horizon: usize,
    pub micro_ticks: u32,
    /// Hard ceiling on acceptable self/teammate hit chance.
    pub friendly_fire_limit: f64,
    /// Required enemy hit chance per weapon class. Rapid-fire weapons can
    /// gamble on cheap bullets; single-shot and explosive ones cannot.
    pub pistol_threshold: f64,
    pub rifle_threshold: f64,
    pub rocket_threshold: f64,
}

impl Default for GunneryConfig {
    fn default() -> Self {
        Self {
            horizon: 25,
            micro_ticks: 5,
            friendly_fire_limit: 0.09,
            pistol_threshold: 0.35,
            rifle_threshold: 0.15,
            rocket_threshold: 0.5,
        }
    }
}

impl GunneryConfig {
    pub fn threshold_for(&self, kind: WeaponKind) -> f64 {
        match kind {
            WeaponKind::Pistol => self.pistol_threshold,
            WeaponKind::AssaultRifle => self.rifle_threshold,
            WeaponKind::RocketLauncher => self.rocket_threshold,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShotDecision {
    pub shoot: bool,
    pub friendly_risk: f64,
    pub enemy_chance: f64,
}

impl ShotDecision {
    fn hold() -> Self {
        Self {
            shoot: false,
            friendly_risk: 0.0,
            enemy_chance: 0.0,
        }
    }
}

/// Enemy counter-policies the shot must beat: left/right, ground/air.
const COUNTER_POLICIES: [(f64, bool); 4] =
    [(-1.0, false), (1.0, false), (-1.0, true), (1.0, true)];

/// Estimate the shot from `me` toward `enemy` along `aim` and decide.
pub fn evaluate_shot(
    world: &World,
    me: i32,
    enemy: i32,
    aim: Vec2,
    config: &GunneryConfig,
) -> ShotDecision {
    let Some(unit) = world.unit(me) else {
        return ShotDecision::hold();
    };
    let Some(weapon) = unit.weapon.as_ref() else {
        return ShotDecision::hold();
    };
    // Not about to be ready: no point estimating.
    if weapon
        .fire_timer
        .is_some_and(|timer| timer > 1.0 / world.properties.ticks_per_second)
    {
        return ShotDecision::hold();
    }
    if world.unit(enemy).is_none() {
        return ShotDecision::hold();
    }

    let my_player = unit.player_id;
    let threshold = config.threshold_for(weapon.kind);
    let slots = 2 * VIRTUAL_FAN_HALF_WIDTH as usize + 1;

    let mut per_policy_hits: Vec<BTreeMap<i32, Vec<bool>>> = Vec::new();
    for (direction, jump) in COUNTER_POLICIES {
        let mut sim = Simulation::new(
            world.clone(),
            SimFlags {
                shooting: false,
                hit_slots: true,
                micro_ticks: config.micro_ticks,
                ..SimFlags::default()
            },
        );
        sim.spawn_virtual_fan(me, aim);

        let counter = policy::chain(config.horizon, direction, jump, false);
        for action in &counter {
            let mut actions = BTreeMap::new();
            actions.insert(enemy, *action);
            sim.simulate(&actions);
            if sim.world.bullets.is_empty() {
                break;
            }
        }
        per_policy_hits.push(sim.bullet_hits);
    }

    // Geometry alone can underestimate certainty: if one counter-policy
    // takes at least one full bullet more than the best dodge, the shot is
    // landing no matter what the enemy does - mark that rollout fully hit.
    let unit_ids: Vec<i32> = world.units.keys().copied().collect();
    for unit_id in &unit_ids {
        let counts: Vec<usize> = per_policy_hits
            .iter()
            .map(|hits| {
                hits.get(unit_id)
                    .map_or(0, |flags| flags.iter().filter(|hit| **hit).count())
            })
            .collect();
        let Some(floor) = counts.iter().copied().min() else {
            continue;
        };
        for (rollout, count) in counts.iter().enumerate() {
            if *count > floor {
                if let Some(flags) = per_policy_hits[rollout].get_mut(unit_id) {
                    flags.iter_mut().for_each(|hit| *hit = true);
                }
            }
        }
    }

    let chance_for = |unit_id: i32| -> f64 {
        let certain_slots = (0..slots)
            .filter(|slot| {
                per_policy_hits.iter().all(|hits| {
                    hits.get(&unit_id)
                        .and_then(|flags| flags.get(*slot))
                        .copied()
                        .unwrap_or(false)
                })
            })
            .count();
        certain_slots as f64 / slots as f64
    };

    // Friendly risk covers the shooter too: a rocket cannot hit its owner
    // directly, but its splash can.
    let mut friendly_risk: f64 = 0.0;
    let mut enemy_chance: f64 = 0.0;
    for target in world.units.values() {
        let chance = chance_for(target.id);
        if target.player_id == my_player {
            friendly_risk = friendly_risk.max(chance);
        } else {
            enemy_chance = enemy_chance.max(chance);
        }
    }

    ShotDecision {
        shoot: enemy_chance > threshold && friendly_risk <= config.friendly_fire_limit,
        friendly_risk,
        enemy_chance,
    }
}
