//! Forward simulator.
//!
//! Advances an exclusively-owned [`World`] copy tick by tick under a per-unit
//! action map. Each tick is subdivided into micro-ticks for integration
//! accuracy; the caller picks the subdivision per call, trading speed for
//! precision over the length of a rollout.
//!
//! The simulator never fails: a unit id without a matching unit, or a firing
//! weapon without a timer, is a broken caller invariant and trips a
//! `debug_assert` instead of a recoverable error.

use std::collections::BTreeMap;

use crate::geom::{
    angle_between, angle_delta, approx_eq, distance_sqr, jump_pad_collision, units_collision,
    wall_collision, Rect, Vec2, EPS,
};
use crate::types::{
    Bullet, BulletKind, DamageEvent, Item, JumpState, Tile, Unit, UnitAction, VirtualShot, Weapon,
    World,
};

/// Angular samples on each side of the aim line in hit-slot mode.
pub const VIRTUAL_FAN_HALF_WIDTH: i32 = 12;

/// Offset that keeps a snapped unit strictly clear of the blocking cell.
const BOUNDARY_EPS: f64 = 1e-9;

/// A fire timer at or below this is "elapsed".
const FIRE_READY_EPS: f64 = 1e-9;

/// What the simulation spends time on. The planner runs full-rule rollouts;
/// the movement-cost graph builder runs movement only; the hit estimator runs
/// bullets only, in hit-slot mode.
#[derive(Clone, Copy, Debug)]
pub struct SimFlags {
    pub move_units: bool,
    pub bullets: bool,
    pub shooting: bool,
    pub pickups: bool,
    pub suicide: bool,
    /// Record virtual hits per fan angle slot instead of applying damage.
    pub hit_slots: bool,
    /// Shots fired inside this simulation are real bullets, not hypotheses.
    /// Only a host-side game loop sets this; rollouts never do.
    pub real_fire: bool,
    pub micro_ticks: u32,
}

impl Default for SimFlags {
    fn default() -> Self {
        Self {
            move_units: true,
            bullets: true,
            shooting: true,
            pickups: false,
            suicide: false,
            hit_slots: false,
            real_fire: false,
            micro_ticks: crate::constants::DEFAULT_MICRO_TICKS,
        }
    }
}

pub struct Simulation {
    pub world: World,
    pub events: Vec<DamageEvent>,
    /// Per unit: which fan angle slots have struck it (hit-slot mode only).
    pub bullet_hits: BTreeMap<i32, Vec<bool>>,
    flags: SimFlags,
    start_tick: i32,
    micro_ticks: u32,
    dt: f64,
    fan_half_width: i32,
}

impl Simulation {
    pub fn new(world: World, flags: SimFlags) -> Self {
        let micro_ticks = flags.micro_ticks.max(1);
        let dt = 1.0 / (world.properties.ticks_per_second * micro_ticks as f64);
        let fan_half_width = if flags.hit_slots {
            VIRTUAL_FAN_HALF_WIDTH
        } else {
            0
        };
        let bullet_hits = if flags.hit_slots {
            world
                .units
                .keys()
                .map(|id| (*id, vec![false; 2 * VIRTUAL_FAN_HALF_WIDTH as usize + 1]))
                .collect()
        } else {
            BTreeMap::new()
        };
        let start_tick = world.current_tick;
        Self {
            world,
            events: Vec::new(),
            bullet_hits,
            flags,
            start_tick,
            micro_ticks,
            dt,
            fan_half_width,
        }
    }

    /// Ticks elapsed since this simulation was created.
    pub fn elapsed_ticks(&self) -> i32 {
        self.world.current_tick - self.start_tick
    }

    /// Advance one tick with the configured micro-tick subdivision.
    pub fn simulate(&mut self, actions: &BTreeMap<i32, UnitAction>) {
        self.simulate_with(actions, None);
    }

    /// Advance one tick, optionally overriding the micro-tick subdivision for
    /// this call only (denser early in a rollout, coarser later).
    pub fn simulate_with(&mut self, actions: &BTreeMap<i32, UnitAction>, micro_ticks: Option<u32>) {
        if let Some(micro) = micro_ticks {
            self.micro_ticks = micro.max(1);
            self.dt = 1.0 / (self.world.properties.ticks_per_second * self.micro_ticks as f64);
        }
        self.world.current_tick += 1;

        if self.flags.shooting {
            for (id, action) in actions {
                self.track_aim(*id, action);
            }
        }

        for micro in 0..self.micro_ticks {
            for (id, action) in actions {
                if self.flags.move_units {
                    self.move_x(*id, action);
                    self.move_y(*id, action);
                }
                if self.flags.shooting {
                    self.simulate_shoot(*id, action);
                }
                if self.flags.pickups {
                    self.collect_loot(*id);
                }
                if self.flags.suicide && micro == 0 {
                    self.simulate_mine_trade(*id);
                }
            }
            if self.flags.bullets {
                self.step_bullets();
            }
        }
    }

    /// Seed one hypothetical fan from `unit_id`'s weapon without firing it
    /// (no timer, magazine or recoil changes). Used by the hit estimator.
    pub fn spawn_virtual_fan(&mut self, unit_id: i32, aim: Vec2) {
        let fan = self.build_fan(unit_id, aim);
        self.world.bullets.extend(fan);
    }

    /// Re-aim spread growth, applied once per tick before the micro loop:
    /// swinging the barrel widens the cone by the angular delta.
    fn track_aim(&mut self, id: i32, action: &UnitAction) {
        let Some(weapon) = self
            .world
            .units
            .get_mut(&id)
            .and_then(|unit| unit.weapon.as_mut())
        else {
            return;
        };
        let aim_angle = action.aim.angle();
        if let Some(last) = weapon.last_angle {
            weapon.spread = (weapon.spread + angle_delta(last, aim_angle))
                .clamp(weapon.params.min_spread, weapon.params.max_spread);
        }
        weapon.last_angle = Some(aim_angle);
    }

    fn move_x(&mut self, id: i32, action: &UnitAction) {
        let max_speed = self.world.properties.unit_max_horizontal_speed;
        let velocity = action.velocity.clamp(-max_speed, max_speed);
        let move_distance = velocity * self.dt;

        let Some(unit) = self.world.units.get(&id) else {
            debug_assert!(false, "action for unknown unit {id}");
            return;
        };
        let swept = unit.rect().shifted(move_distance, 0.0);
        let half_width = unit.size.x / 2.0;
        let x = unit.position.x;
        let blocked_by_unit = units_collision(&swept, id, &self.world.units);
        let blocked_by_wall = wall_collision(&swept, &self.world.level, true, false);

        let new_x = if !blocked_by_wall && !blocked_by_unit {
            Some(x + move_distance)
        } else if !blocked_by_unit {
            // Snap flush against the blocking cell instead of moving.
            Some(if move_distance < 0.0 {
                x.floor() + half_width + BOUNDARY_EPS
            } else {
                (x + 1.0).floor() - half_width - BOUNDARY_EPS
            })
        } else {
            None
        };
        if let Some(new_x) = new_x {
            if let Some(unit) = self.world.units.get_mut(&id) {
                unit.position.x = new_x;
            }
        }
    }

    fn move_y(&mut self, id: i32, action: &UnitAction) {
        let pad_speed = self.world.properties.jump_pad_jump_speed;
        let pad_time = self.world.properties.jump_pad_jump_time;
        let jump_speed = self.world.properties.unit_jump_speed;

        let Some(unit) = self.world.units.get(&id) else {
            return;
        };
        let on_pad = jump_pad_collision(&unit.rect(), &self.world.level);
        let pad_flight = approx_eq(unit.jump_state.speed, pad_speed, EPS);
        if !on_pad && !pad_flight && (!unit.jump_state.can_jump || !action.jump) {
            self.fall_down(id, action);
            return;
        }

        if on_pad {
            // Pad contact overrides whatever the controller asked for.
            if let Some(unit) = self.world.units.get_mut(&id) {
                unit.jump_state.speed = pad_speed;
                unit.jump_state.max_time = pad_time;
                unit.jump_state.can_cancel = false;
            }
        }

        let Some(unit) = self.world.units.get(&id) else {
            return;
        };
        if !unit.jump_state.can_cancel {
            if unit.jump_state.max_time <= 0.0 {
                if let Some(unit) = self.world.units.get_mut(&id) {
                    unit.jump_state = JumpState::falling();
                }
                self.fall_down(id, action);
            } else {
                if let Some(unit) = self.world.units.get_mut(&id) {
                    unit.jump_state.max_time -= self.dt;
                }
                self.rise(id, pad_speed);
            }
            return;
        }

        if action.jump {
            if unit.jump_state.max_time <= EPS {
                if let Some(unit) = self.world.units.get_mut(&id) {
                    unit.jump_state = JumpState::falling();
                }
                self.fall_down(id, action);
            } else {
                if let Some(unit) = self.world.units.get_mut(&id) {
                    unit.jump_state.max_time -= self.dt;
                }
                self.rise(id, jump_speed);
            }
        }
    }

    /// One micro-tick of upward movement. A blocked rise kills the jump
    /// without moving the unit.
    fn rise(&mut self, id: i32, speed: f64) {
        let move_distance = speed * self.dt;
        let Some(unit) = self.world.units.get(&id) else {
            return;
        };
        let swept = unit.rect().shifted(0.0, move_distance);
        let blocked = wall_collision(&swept, &self.world.level, true, false)
            || units_collision(&swept, id, &self.world.units);
        if let Some(unit) = self.world.units.get_mut(&id) {
            if blocked {
                unit.jump_state.can_jump = false;
            } else {
                unit.position.y += move_distance;
            }
        }
    }

    fn fall_down(&mut self, id: i32, action: &UnitAction) {
        let fall_distance = self.world.properties.unit_fall_speed * self.dt;
        let Some(unit) = self.world.units.get(&id) else {
            return;
        };
        let rect = unit.rect();
        let supported_before = wall_collision(&rect, &self.world.level, action.jump_down, false);
        let swept = rect.shifted(0.0, -fall_distance);
        let landed = wall_collision(&swept, &self.world.level, action.jump_down, supported_before)
            || units_collision(&swept, id, &self.world.units);
        let grounded = JumpState::grounded(&self.world.properties);
        if let Some(unit) = self.world.units.get_mut(&id) {
            if landed {
                unit.jump_state = grounded;
            } else {
                unit.jump_state = JumpState::falling();
                unit.position.y -= fall_distance;
            }
        }
    }

    fn simulate_shoot(&mut self, id: i32, action: &UnitAction) {
        let current_tick = self.world.current_tick;
        let Some(unit) = self.world.units.get(&id) else {
            return;
        };
        let Some(weapon) = unit.weapon.as_ref() else {
            return;
        };
        let ready = weapon.fire_timer.is_none_or(|timer| timer <= FIRE_READY_EPS);

        if !action.shoot || !ready {
            let dt = self.dt;
            if let Some(weapon) = self
                .world
                .units
                .get_mut(&id)
                .and_then(|unit| unit.weapon.as_mut())
            {
                if let Some(timer) = weapon.fire_timer {
                    weapon.fire_timer = Some(timer - dt);
                }
                weapon.spread = (weapon.spread - weapon.params.aim_speed * dt)
                    .clamp(weapon.params.min_spread, weapon.params.max_spread);
            }
            return;
        }

        // Fire. The fan uses the pre-recoil spread.
        let fan = self.build_fan(id, action.aim);
        if let Some(weapon) = self
            .world
            .units
            .get_mut(&id)
            .and_then(|unit| unit.weapon.as_mut())
        {
            weapon.magazine -= 1;
            if weapon.magazine == 0 {
                weapon.magazine = weapon.params.magazine_size;
                weapon.fire_timer = Some(weapon.params.reload_time);
            } else {
                weapon.fire_timer = Some(weapon.params.fire_rate);
            }
            weapon.spread = (weapon.spread + weapon.params.recoil)
                .clamp(weapon.params.min_spread, weapon.params.max_spread);
            weapon.last_fire_tick = Some(current_tick);
        }
        self.world.bullets.extend(fan);
    }

    /// `2n+1` virtual samples spanning the current spread cone. In normal
    /// rollouts `n = 0`: one bullet straight along the aim line.
    fn build_fan(&self, id: i32, aim: Vec2) -> Vec<Bullet> {
        let Some(unit) = self.world.units.get(&id) else {
            return Vec::new();
        };
        let Some(weapon) = unit.weapon.as_ref() else {
            debug_assert!(false, "fan requested for unarmed unit {id}");
            return Vec::new();
        };
        let half = self.fan_half_width;
        let aim_angle = aim.angle();
        let origin = unit.center();
        let mut fan = Vec::with_capacity(2 * half as usize + 1);
        for i in -half..=half {
            let angle = aim_angle + weapon.spread * i as f64 / half.max(1) as f64;
            let kind = if self.flags.real_fire {
                BulletKind::Real
            } else {
                BulletKind::Virtual(VirtualShot {
                    shoot_tick: self.world.current_tick,
                    shoot_position: origin,
                    spread: weapon.spread,
                    angle_index: (i + half) as usize,
                })
            };
            fan.push(Bullet {
                weapon_kind: weapon.kind,
                unit_id: unit.id,
                player_id: unit.player_id,
                position: origin,
                velocity: Vec2::new(
                    angle.cos() * weapon.params.bullet.speed,
                    angle.sin() * weapon.params.bullet.speed,
                ),
                damage: weapon.params.bullet.damage,
                size: weapon.params.bullet.size,
                explosion: weapon.params.explosion,
                kind,
            });
        }
        fan
    }

    fn step_bullets(&mut self) {
        let dt = self.dt;
        let mut survivors: Vec<Bullet> = Vec::with_capacity(self.world.bullets.len());
        let mut spent_fans: Vec<(i32, Vec2)> = Vec::new();
        let bullets = std::mem::take(&mut self.world.bullets);

        for mut bullet in bullets {
            if fan_is_spent(&bullet, &spent_fans) {
                continue;
            }
            bullet.position = bullet.position + bullet.velocity * dt;
            let rect = bullet.rect();
            if wall_collision(&rect, &self.world.level, true, false) {
                self.explode(&bullet, None);
                continue;
            }

            let mut hit_unit = None;
            for (unit_id, unit) in &self.world.units {
                if bullet.unit_id == *unit_id {
                    continue;
                }
                // A hypothetical bullet that has flown past its mark counts
                // as a hit; exact sub-tick geometry is not worth simulating.
                let passed_target = match &bullet.kind {
                    BulletKind::Virtual(shot) if !self.flags.hit_slots => {
                        bullet.player_id != unit.player_id
                            && distance_sqr(shot.shoot_position, unit.center())
                                < distance_sqr(shot.shoot_position, bullet.position)
                    }
                    _ => false,
                };
                if passed_target || rect.intersects(&unit.rect()) {
                    hit_unit = Some(*unit_id);
                    break;
                }
            }

            if let Some(unit_id) = hit_unit {
                self.explode(&bullet, Some(unit_id));
                if !self.flags.hit_slots {
                    if let BulletKind::Virtual(shot) = bullet.kind {
                        spent_fans.push((shot.shoot_tick, shot.shoot_position));
                    }
                }
            } else {
                survivors.push(bullet);
            }
        }

        // Fan-mates of a bullet that found a unit are withdrawn so one burst
        // cannot be scored more than once against the same target.
        survivors.retain(|bullet| !fan_is_spent(bullet, &spent_fans));
        self.world.bullets = survivors;
    }

    fn explode(&mut self, bullet: &Bullet, hit_unit: Option<i32>) {
        let tick_offset = self.elapsed_ticks();
        let shoot_delay = match &bullet.kind {
            BulletKind::Real => 0,
            BulletKind::Virtual(shot) => self.world.current_tick - shot.shoot_tick,
        };

        if let Some(unit_id) = hit_unit {
            let Some(target) = self.world.units.get(&unit_id) else {
                debug_assert!(false, "bullet exploded on unknown unit {unit_id}");
                return;
            };
            // Hypothetical friendly fire is never scored as damage. Hit-slot
            // mode still records it - the estimator exists precisely to bound
            // friendly-fire risk before a real trigger pull.
            if !bullet.is_real() && bullet.player_id == target.player_id && !self.flags.hit_slots {
                return;
            }
            if self.flags.hit_slots && !bullet.is_real() {
                self.mark_hit_slot(unit_id, &bullet.kind);
            } else {
                let (probability, aim_angle) = self.hit_probability(bullet, target);
                let max_health = self.world.properties.unit_max_health;
                if let Some(target) = self.world.units.get_mut(&unit_id) {
                    target.health = (target.health - bullet.damage).clamp(0.0, max_health);
                }
                self.events.push(DamageEvent {
                    tick: tick_offset,
                    unit_id,
                    damage: bullet.damage,
                    real: bullet.is_real(),
                    probability,
                    shoot_delay,
                    aim_angle,
                });
            }
        }

        if let Some(explosion) = bullet.explosion {
            let blast = Rect::around(bullet.position, explosion.radius);
            let caught: Vec<i32> = self
                .world
                .units
                .iter()
                .filter(|(_, unit)| blast.intersects(&unit.rect()))
                .map(|(id, _)| *id)
                .collect();
            for unit_id in caught {
                if self.flags.hit_slots && !bullet.is_real() {
                    self.mark_hit_slot(unit_id, &bullet.kind);
                } else {
                    let max_health = self.world.properties.unit_max_health;
                    if let Some(unit) = self.world.units.get_mut(&unit_id) {
                        unit.health = (unit.health - explosion.damage).clamp(0.0, max_health);
                    }
                    self.events.push(DamageEvent {
                        tick: tick_offset,
                        unit_id,
                        damage: explosion.damage,
                        real: bullet.is_real(),
                        probability: 1.0,
                        shoot_delay,
                        aim_angle: 0.0,
                    });
                }
            }
        }
    }

    fn mark_hit_slot(&mut self, unit_id: i32, kind: &BulletKind) {
        let BulletKind::Virtual(shot) = kind else {
            return;
        };
        if let Some(slots) = self.bullet_hits.get_mut(&unit_id) {
            if let Some(slot) = slots.get_mut(shot.angle_index) {
                *slot = true;
            }
        }
    }

    /// Analytic hit chance of a virtual bullet: the angular width of the
    /// target rectangle seen from the firing point against the doubled
    /// spread cone, discounted by how stale the speculative shot is. The
    /// discount horizon shrinks as the aim line steepens - lobbed shots age
    /// faster than flat ones.
    fn hit_probability(&self, bullet: &Bullet, target: &Unit) -> (f64, f64) {
        let BulletKind::Virtual(shot) = &bullet.kind else {
            return (1.0, 0.0);
        };
        let rect = target.rect();
        let origin = shot.shoot_position;
        let diag_a = angle_between(
            Vec2::new(rect.right - origin.x, rect.top - origin.y),
            Vec2::new(rect.left - origin.x, rect.bottom - origin.y),
        );
        let diag_b = angle_between(
            Vec2::new(rect.left - origin.x, rect.top - origin.y),
            Vec2::new(rect.right - origin.x, rect.bottom - origin.y),
        );
        let target_span = diag_a.max(diag_b);
        let cone_span = 2.0 * shot.spread;

        let aim = target.center() - origin;
        let mut elevation = aim.angle().rem_euclid(std::f64::consts::PI).to_degrees();
        if elevation > 90.0 {
            elevation = 180.0 - elevation;
        }

        let age = (self.world.current_tick - shot.shoot_tick) as f64;
        let geometric = if cone_span < EPS {
            1.0
        } else {
            (target_span / cone_span).min(1.0)
        };
        let horizon = 12.0 - elevation / 15.0;
        let probability = geometric * (1.0 - age / horizon).max(0.0);
        (probability, elevation)
    }

    fn collect_loot(&mut self, id: i32) {
        let Some(unit) = self.world.units.get(&id) else {
            return;
        };
        let unit_rect = unit.rect();
        let unarmed = unit.weapon.is_none();
        let mut taken = None;
        for (index, loot) in self.world.loot_boxes.iter().enumerate() {
            if !unit_rect.intersects(&loot.rect()) {
                continue;
            }
            match loot.item {
                Item::HealthPack { health } => {
                    taken = Some((index, Some(health), None));
                    break;
                }
                Item::WeaponPickup { kind } if unarmed => {
                    taken = Some((index, None, Some(kind)));
                    break;
                }
                Item::WeaponPickup { .. } => {}
            }
        }
        let Some((index, heal, weapon_kind)) = taken else {
            return;
        };

        let tick_offset = self.elapsed_ticks();
        let max_health = self.world.properties.unit_max_health;
        if let Some(unit) = self.world.units.get_mut(&id) {
            if let Some(heal) = heal {
                unit.health = (unit.health + heal).clamp(0.0, max_health);
                self.events.push(DamageEvent {
                    tick: tick_offset,
                    unit_id: id,
                    damage: -heal,
                    real: true,
                    probability: 0.0,
                    shoot_delay: 0,
                    aim_angle: 0.0,
                });
            }
            if let Some(kind) = weapon_kind {
                unit.weapon = Some(Weapon::new(kind));
            }
        }
        self.world.loot_boxes.remove(index);
    }

    /// Kill credit for a favorable mine self-destruct, once per tick.
    fn simulate_mine_trade(&mut self, id: i32) {
        let Some(killed) = mine_trade(&self.world, id) else {
            return;
        };
        let tick_offset = self.elapsed_ticks();
        let kill_credit = self.world.properties.unit_max_health;
        for unit_id in killed {
            self.events.push(DamageEvent {
                tick: tick_offset,
                unit_id,
                damage: kill_credit,
                real: false,
                probability: 1.0,
                shoot_delay: 0,
                aim_angle: 0.0,
            });
        }
    }
}

/// Would detonating a mine under `unit_id` right now trade favorably?
/// Returns the enemy units the blast would finish off, or `None` when the
/// unit cannot detonate or the trade loses material.
pub fn mine_trade(world: &World, unit_id: i32) -> Option<Vec<i32>> {
    let unit = world.units.get(&unit_id)?;
    let props = &world.properties;

    let standing = approx_eq(unit.position.y, unit.position.y.floor(), 0.01);
    let support = matches!(
        world.level.tile_at(unit.position.x, unit.position.y - 1.0),
        Tile::Wall | Tile::Platform
    );
    let weapon_idle = unit.weapon.as_ref().is_some_and(|weapon| {
        weapon
            .fire_timer
            .is_none_or(|timer| timer <= 1.0 / props.ticks_per_second)
    });
    if !(standing && unit.jump_state.can_jump && support && weapon_idle && unit.mines > 0) {
        return None;
    }

    // The mine sits a quarter tile above the floor; its half-width comes off
    // the nominal blast square.
    let reach = props.mine_explosion_radius - 1.0 / 6.0 - 0.001;
    let blast = Rect {
        left: unit.position.x - reach,
        top: unit.position.y + 0.25 + reach,
        right: unit.position.x + reach,
        bottom: unit.position.y + 0.25 - reach,
    };

    let mut my_units = 0;
    let mut enemy_units = 0;
    let mut my_killed = 0;
    let mut killed_enemies = Vec::new();
    for other in world.units.values() {
        if other.player_id == unit.player_id {
            my_units += 1;
        } else {
            enemy_units += 1;
        }
        if blast.intersects(&other.rect())
            && (other.health <= props.mine_explosion_damage || unit.mines > 1)
        {
            if other.player_id == unit.player_id {
                my_killed += 1;
            } else {
                killed_enemies.push(other.id);
            }
        }
    }

    let favorable = killed_enemies.len() == 2
        || (killed_enemies.len() == 1 && my_killed == 0)
        || (killed_enemies.len() == 1 && my_killed == 1 && enemy_units <= my_units);
    if favorable {
        Some(killed_enemies)
    } else {
        None
    }
}

fn fan_is_spent(bullet: &Bullet, spent: &[(i32, Vec2)]) -> bool {
    let BulletKind::Virtual(shot) = &bullet.kind else {
        return false;
    };
    spent.iter().any(|(tick, position)| {
        *tick == shot.shoot_tick
            && approx_eq(position.x, shot.shoot_position.x, EPS)
            && approx_eq(position.y, shot.shoot_position.y, EPS)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Level, LootBox, Properties, Unit, WeaponKind};

    fn open_room(width: i32, height: i32) -> Level {
        let mut tiles = vec![vec![Tile::Empty; height as usize]; width as usize];
        for (x, column) in tiles.iter_mut().enumerate() {
            column[0] = Tile::Wall;
            if x == 0 || x == width as usize - 1 {
                for tile in column.iter_mut() {
                    *tile = Tile::Wall;
                }
            }
        }
        Level { tiles }
    }

    fn unit_at(id: i32, player_id: i32, x: f64, y: f64) -> Unit {
        let props = Properties::default();
        Unit {
            player_id,
            id,
            health: props.unit_max_health,
            position: Vec2::new(x, y),
            size: props.unit_size,
            jump_state: JumpState::grounded(&props),
            mines: 0,
            weapon: None,
        }
    }

    fn world_with(level: Level, units: Vec<Unit>) -> World {
        World {
            current_tick: 0,
            properties: Properties::default(),
            level,
            units: units.into_iter().map(|unit| (unit.id, unit)).collect(),
            bullets: Vec::new(),
            loot_boxes: Vec::new(),
        }
    }

    fn chain_actions(id: i32, action: UnitAction) -> BTreeMap<i32, UnitAction> {
        let mut actions = BTreeMap::new();
        actions.insert(id, action);
        actions
    }

    #[test]
    fn wall_stop_snaps_flush_to_boundary() {
        let mut level = open_room(12, 8);
        for y in 1..4 {
            level.tiles[6][y] = Tile::Wall;
        }
        let world = world_with(level, vec![unit_at(1, 0, 5.4, 1.0)]);
        let mut sim = Simulation::new(
            world,
            SimFlags {
                micro_ticks: 20,
                ..SimFlags::default()
            },
        );
        let run = chain_actions(
            1,
            UnitAction {
                velocity: 10.0,
                ..UnitAction::default()
            },
        );
        for _ in 0..3 {
            sim.simulate(&run);
        }
        let unit = sim.world.unit(1).unwrap();
        let right_edge = unit.position.x + unit.size.x / 2.0;
        assert!(
            (right_edge - 6.0).abs() < 1e-6,
            "right edge {right_edge} not flush with wall at 6"
        );
        assert!(right_edge < 6.0, "unit penetrated the wall");
    }

    #[test]
    fn jump_arc_peaks_and_returns_to_launch_tile() {
        let world = world_with(open_room(12, 12), vec![unit_at(1, 0, 5.5, 1.0)]);
        let props = world.properties.clone();
        let mut sim = Simulation::new(
            world,
            SimFlags {
                micro_ticks: 100,
                ..SimFlags::default()
            },
        );
        let jump_ticks = (props.unit_jump_time * props.ticks_per_second).round() as usize;
        let up = chain_actions(
            1,
            UnitAction {
                jump: true,
                ..UnitAction::default()
            },
        );
        let idle = chain_actions(1, UnitAction::default());

        let mut peak = 1.0_f64;
        for _ in 0..jump_ticks {
            sim.simulate(&up);
            peak = peak.max(sim.world.unit(1).unwrap().position.y);
        }
        for _ in 0..jump_ticks + 5 {
            sim.simulate(&idle);
            peak = peak.max(sim.world.unit(1).unwrap().position.y);
        }

        let expected_peak = 1.0 + props.unit_jump_speed * props.unit_jump_time;
        assert!(
            peak > expected_peak - 0.2 && peak <= expected_peak + 0.01,
            "peak {peak}, expected about {expected_peak}"
        );
        let unit = sim.world.unit(1).unwrap();
        assert!(unit.jump_state.can_jump, "unit should have landed");
        assert!((unit.position.y - 1.0).abs() < 0.05);
        assert_eq!(unit.position.x as i32, 5);
    }

    #[test]
    fn jump_pad_forces_non_cancellable_rise() {
        let mut level = open_room(12, 12);
        level.tiles[5][1] = Tile::JumpPad;
        let world = world_with(level, vec![unit_at(1, 0, 5.5, 1.0)]);
        let mut sim = Simulation::new(
            world,
            SimFlags {
                micro_ticks: 20,
                ..SimFlags::default()
            },
        );
        // No jump input at all: the pad still launches the unit.
        let idle = chain_actions(1, UnitAction::default());
        for _ in 0..3 {
            sim.simulate(&idle);
        }
        let unit = sim.world.unit(1).unwrap();
        assert!(unit.position.y > 1.3, "pad did not launch: y {}", unit.position.y);
        assert!(!unit.jump_state.can_cancel);
        assert!(approx_eq(
            unit.jump_state.speed,
            sim.world.properties.jump_pad_jump_speed,
            EPS
        ));
    }

    #[test]
    fn same_world_and_actions_are_bit_identical() {
        let mut shooter = unit_at(1, 0, 3.5, 1.0);
        shooter.weapon = Some(Weapon::new(WeaponKind::AssaultRifle));
        let target = unit_at(2, 1, 8.5, 1.0);
        let world = world_with(open_room(14, 10), vec![shooter, target]);

        let mut actions = BTreeMap::new();
        actions.insert(
            1,
            UnitAction {
                velocity: 10.0,
                jump: true,
                aim: Vec2::new(1.0, 0.0),
                shoot: true,
                ..UnitAction::default()
            },
        );
        actions.insert(
            2,
            UnitAction {
                velocity: -10.0,
                ..UnitAction::default()
            },
        );

        let flags = SimFlags {
            micro_ticks: 10,
            ..SimFlags::default()
        };
        let mut sim_a = Simulation::new(world.clone(), flags);
        let mut sim_b = Simulation::new(world, flags);
        for _ in 0..30 {
            sim_a.simulate(&actions);
            sim_b.simulate(&actions);
        }
        assert_eq!(sim_a.world, sim_b.world);
        assert_eq!(sim_a.events, sim_b.events);
    }

    #[test]
    fn rollouts_share_nothing() {
        let mut shooter = unit_at(1, 0, 3.5, 1.0);
        shooter.weapon = Some(Weapon::new(WeaponKind::Pistol));
        let world = world_with(open_room(14, 10), vec![shooter, unit_at(2, 1, 8.5, 1.0)]);

        let mut fired = Simulation::new(world.clone(), SimFlags::default());
        let idle = Simulation::new(world, SimFlags::default());

        let shoot = chain_actions(
            1,
            UnitAction {
                aim: Vec2::new(1.0, 0.0),
                shoot: true,
                ..UnitAction::default()
            },
        );
        fired.simulate(&shoot);

        let fired_weapon = fired.world.unit(1).unwrap().weapon.unwrap();
        let idle_weapon = idle.world.unit(1).unwrap().weapon.unwrap();
        assert!(fired_weapon.fire_timer.is_some());
        assert!(idle_weapon.fire_timer.is_none());
        assert_eq!(idle_weapon.magazine, idle_weapon.params.magazine_size);
    }

    #[test]
    fn health_and_spread_stay_bounded() {
        let mut shooter = unit_at(1, 0, 3.5, 1.0);
        shooter.weapon = Some(Weapon::new(WeaponKind::AssaultRifle));
        let target = unit_at(2, 1, 5.2, 1.0);
        let world = world_with(open_room(14, 10), vec![shooter, target]);
        let mut sim = Simulation::new(
            world,
            SimFlags {
                micro_ticks: 10,
                ..SimFlags::default()
            },
        );

        let mut actions = BTreeMap::new();
        actions.insert(
            1,
            UnitAction {
                aim: Vec2::new(1.0, 0.0),
                shoot: true,
                ..UnitAction::default()
            },
        );
        actions.insert(2, UnitAction::default());

        for _ in 0..120 {
            sim.simulate(&actions);
            for unit in sim.world.units.values() {
                assert!(unit.health >= 0.0 && unit.health <= 100.0);
                if let Some(weapon) = &unit.weapon {
                    assert!(
                        weapon.spread >= weapon.params.min_spread - EPS
                            && weapon.spread <= weapon.params.max_spread + EPS
                    );
                }
            }
        }
        assert!(sim.world.unit(2).unwrap().health < 100.0, "no damage landed");
    }

    #[test]
    fn real_bullet_hit_is_certain() {
        let target = unit_at(2, 1, 7.5, 1.0);
        let mut world = world_with(open_room(14, 10), vec![unit_at(1, 0, 3.5, 1.0), target]);
        world.bullets.push(Bullet {
            weapon_kind: WeaponKind::Pistol,
            unit_id: 1,
            player_id: 0,
            position: Vec2::new(4.0, 1.9),
            velocity: Vec2::new(50.0, 0.0),
            damage: 20.0,
            size: 0.2,
            explosion: None,
            kind: BulletKind::Real,
        });
        let mut sim = Simulation::new(world, SimFlags::default());
        let actions = BTreeMap::new();
        for _ in 0..10 {
            sim.simulate(&actions);
        }
        assert_eq!(sim.events.len(), 1);
        let event = &sim.events[0];
        assert!(event.real);
        assert_eq!(event.probability, 1.0);
        assert_eq!(event.unit_id, 2);
        assert_eq!(sim.world.unit(2).unwrap().health, 80.0);
    }

    fn virtual_test_bullet(origin: Vec2, shoot_tick: i32, spread: f64) -> Bullet {
        Bullet {
            weapon_kind: WeaponKind::Pistol,
            unit_id: 1,
            player_id: 0,
            position: origin,
            velocity: Vec2::new(50.0, 0.0),
            damage: 20.0,
            size: 0.2,
            explosion: None,
            kind: BulletKind::Virtual(VirtualShot {
                shoot_tick,
                shoot_position: origin,
                spread,
                angle_index: 0,
            }),
        }
    }

    #[test]
    fn virtual_probability_tracks_cone_overlap() {
        // Point blank: the whole cone lies inside the target's angular span
        // and the hit lands within the shot tick, so probability is exactly 1.
        let shooter = unit_at(1, 0, 3.5, 1.0);
        let origin = shooter.center();
        let mut world = world_with(
            open_room(14, 10),
            vec![shooter.clone(), unit_at(2, 1, 4.7, 1.0)],
        );
        world.bullets.push(virtual_test_bullet(origin, 1, 0.5));
        let mut sim = Simulation::new(world, SimFlags::default());
        sim.simulate(&BTreeMap::new());
        assert_eq!(sim.events.len(), 1);
        assert!(!sim.events[0].real);
        assert_eq!(sim.events[0].probability, 1.0);

        // At range the cone only partially overlaps the target: the
        // probability must be strictly between 0 and 1.
        let mut world = world_with(open_room(14, 10), vec![shooter, unit_at(2, 1, 8.5, 1.0)]);
        world.bullets.push(virtual_test_bullet(origin, 1, 0.5));
        let mut sim = Simulation::new(world, SimFlags::default());
        for _ in 0..10 {
            sim.simulate(&BTreeMap::new());
            if !sim.events.is_empty() {
                break;
            }
        }
        assert_eq!(sim.events.len(), 1);
        let probability = sim.events[0].probability;
        assert!(
            probability > 0.0 && probability < 1.0,
            "expected partial-overlap probability, got {probability}"
        );
    }

    #[test]
    fn one_fan_scores_once_per_target() {
        let mut world = world_with(
            open_room(14, 10),
            vec![unit_at(1, 0, 3.5, 1.0), unit_at(2, 1, 6.5, 1.0)],
        );
        let origin = Vec2::new(3.5, 1.9);
        for angle_index in 0..2usize {
            let angle = 0.05 * angle_index as f64;
            world.bullets.push(Bullet {
                weapon_kind: WeaponKind::Pistol,
                unit_id: 1,
                player_id: 0,
                position: origin,
                velocity: Vec2::new(angle.cos() * 50.0, angle.sin() * 50.0),
                damage: 20.0,
                size: 0.2,
                explosion: None,
                kind: BulletKind::Virtual(VirtualShot {
                    shoot_tick: 0,
                    shoot_position: origin,
                    spread: 0.5,
                    angle_index,
                }),
            });
        }
        let mut sim = Simulation::new(world, SimFlags::default());
        for _ in 0..20 {
            sim.simulate(&BTreeMap::new());
        }
        assert_eq!(
            sim.events.len(),
            1,
            "fan-mates must not double-count the same target"
        );
        assert!(sim.world.bullets.is_empty());
    }

    #[test]
    fn health_pack_heals_clamped_and_emits_negative_event() {
        let mut hurt = unit_at(1, 0, 5.5, 1.0);
        hurt.health = 60.0;
        let mut world = world_with(open_room(12, 8), vec![hurt]);
        world.loot_boxes.push(LootBox {
            position: Vec2::new(5.5, 1.0),
            size: Vec2::new(0.5, 0.5),
            item: Item::HealthPack { health: 50.0 },
        });
        let mut sim = Simulation::new(
            world,
            SimFlags {
                pickups: true,
                micro_ticks: 5,
                ..SimFlags::default()
            },
        );
        sim.simulate(&chain_actions(1, UnitAction::default()));
        assert_eq!(sim.world.unit(1).unwrap().health, 100.0);
        assert!(sim.world.loot_boxes.is_empty());
        assert_eq!(sim.events.len(), 1);
        assert_eq!(sim.events[0].damage, -50.0);
        assert!(sim.events[0].real);
    }

    #[test]
    fn unarmed_unit_picks_up_weapon() {
        let mut world = world_with(open_room(12, 8), vec![unit_at(1, 0, 5.5, 1.0)]);
        world.loot_boxes.push(LootBox {
            position: Vec2::new(5.5, 1.0),
            size: Vec2::new(0.5, 0.5),
            item: Item::WeaponPickup {
                kind: WeaponKind::AssaultRifle,
            },
        });
        let mut sim = Simulation::new(
            world,
            SimFlags {
                pickups: true,
                micro_ticks: 5,
                ..SimFlags::default()
            },
        );
        sim.simulate(&chain_actions(1, UnitAction::default()));
        let weapon = sim.world.unit(1).unwrap().weapon.expect("weapon equipped");
        assert_eq!(weapon.kind, WeaponKind::AssaultRifle);
        assert!(sim.world.loot_boxes.is_empty());
    }

    #[test]
    fn mine_trade_requires_favorable_exchange() {
        let mut bomber = unit_at(1, 0, 5.5, 1.0);
        bomber.weapon = Some(Weapon::new(WeaponKind::Pistol));
        bomber.mines = 2;
        let victim = unit_at(2, 1, 7.0, 1.0);
        let world = world_with(open_room(14, 8), vec![bomber, victim]);

        // 1-for-1 in an even matchup is acceptable.
        let killed = mine_trade(&world, 1).expect("trade should be favorable");
        assert_eq!(killed, vec![2]);

        // With only one mine and a healthy enemy, nothing dies: no trade.
        let mut world_single = world.clone();
        if let Some(unit) = world_single.units.get_mut(&1) {
            unit.mines = 1;
        }
        assert!(mine_trade(&world_single, 1).is_none());

        // Out of blast range: no trade.
        let mut world_far = world;
        if let Some(unit) = world_far.units.get_mut(&2) {
            unit.position.x = 12.5;
        }
        assert!(mine_trade(&world_far, 1).is_none());
    }
}
