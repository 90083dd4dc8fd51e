//! Data model of the duel world.
//!
//! Every type here has value semantics: `clone` is a deep copy and nothing is
//! shared behind a pointer, so a cloned [`World`] is a fully independent
//! rollout snapshot.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::geom::{Rect, Vec2};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tile {
    Empty,
    Wall,
    Platform,
    Ladder,
    JumpPad,
}

/// Static tile grid, indexed `tiles[x][y]` with `y` growing upward.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub tiles: Vec<Vec<Tile>>,
}

impl Level {
    pub fn width(&self) -> i32 {
        self.tiles.len() as i32
    }

    pub fn height(&self) -> i32 {
        self.tiles.first().map_or(0, |column| column.len() as i32)
    }

    /// Tile under a continuous point. Anything off the grid reads as `Wall`
    /// so degenerate probes stay collisions instead of panics.
    #[inline]
    pub fn tile_at(&self, x: f64, y: f64) -> Tile {
        if x < 0.0 || y < 0.0 {
            return Tile::Wall;
        }
        self.tile(x as i32, y as i32)
    }

    #[inline]
    pub fn tile(&self, x: i32, y: i32) -> Tile {
        if x < 0 || y < 0 {
            return Tile::Wall;
        }
        self.tiles
            .get(x as usize)
            .and_then(|column| column.get(y as usize))
            .copied()
            .unwrap_or(Tile::Wall)
    }
}

/// Host game constants as supplied with the world snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Properties {
    pub ticks_per_second: f64,
    pub unit_size: Vec2,
    pub unit_max_horizontal_speed: f64,
    pub unit_fall_speed: f64,
    pub unit_jump_speed: f64,
    pub unit_jump_time: f64,
    pub unit_max_health: f64,
    pub jump_pad_jump_speed: f64,
    pub jump_pad_jump_time: f64,
    pub health_pack_health: f64,
    pub mine_explosion_radius: f64,
    pub mine_explosion_damage: f64,
}

impl Default for Properties {
    fn default() -> Self {
        Self {
            ticks_per_second: constants::TICKS_PER_SECOND,
            unit_size: Vec2::new(constants::UNIT_SIZE_X, constants::UNIT_SIZE_Y),
            unit_max_horizontal_speed: constants::UNIT_MAX_HORIZONTAL_SPEED,
            unit_fall_speed: constants::UNIT_FALL_SPEED,
            unit_jump_speed: constants::UNIT_JUMP_SPEED,
            unit_jump_time: constants::UNIT_JUMP_TIME,
            unit_max_health: constants::UNIT_MAX_HEALTH,
            jump_pad_jump_speed: constants::JUMP_PAD_JUMP_SPEED,
            jump_pad_jump_time: constants::JUMP_PAD_JUMP_TIME,
            health_pack_health: constants::HEALTH_PACK_HEALTH,
            mine_explosion_radius: constants::MINE_EXPLOSION_RADIUS,
            mine_explosion_damage: constants::MINE_EXPLOSION_DAMAGE,
        }
    }
}

/// Vertical movement state machine.
///
/// `can_cancel = false` marks a jump-pad launch: the rise runs to the end of
/// its timer no matter what the controller asks for.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct JumpState {
    pub can_jump: bool,
    pub speed: f64,
    pub max_time: f64,
    pub can_cancel: bool,
}

impl JumpState {
    /// Standing on support with the full jump budget available.
    pub fn grounded(properties: &Properties) -> Self {
        Self {
            can_jump: true,
            speed: properties.unit_jump_speed,
            max_time: properties.unit_jump_time,
            can_cancel: true,
        }
    }

    pub fn falling() -> Self {
        Self {
            can_jump: false,
            speed: 0.0,
            max_time: 0.0,
            can_cancel: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeaponKind {
    Pistol,
    AssaultRifle,
    RocketLauncher,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BulletParams {
    pub speed: f64,
    pub damage: f64,
    pub size: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExplosionParams {
    pub radius: f64,
    pub damage: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeaponParams {
    pub magazine_size: i32,
    pub fire_rate: f64,
    pub reload_time: f64,
    pub min_spread: f64,
    pub max_spread: f64,
    pub recoil: f64,
    pub aim_speed: f64,
    pub bullet: BulletParams,
    pub explosion: Option<ExplosionParams>,
}

/// Weapon as carried by a unit. `fire_timer = None` means ready to fire.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Weapon {
    pub kind: WeaponKind,
    pub params: WeaponParams,
    pub magazine: i32,
    pub spread: f64,
    pub fire_timer: Option<f64>,
    pub last_angle: Option<f64>,
    pub last_fire_tick: Option<i32>,
}

impl Weapon {
    /// A freshly picked-up weapon: full magazine, settled spread.
    pub fn new(kind: WeaponKind) -> Self {
        let params = constants::weapon_params(kind);
        Self {
            kind,
            params,
            magazine: params.magazine_size,
            spread: params.min_spread,
            fire_timer: None,
            last_angle: None,
            last_fire_tick: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub player_id: i32,
    pub id: i32,
    pub health: f64,
    pub position: Vec2,
    pub size: Vec2,
    pub jump_state: JumpState,
    pub mines: i32,
    pub weapon: Option<Weapon>,
}

impl Unit {
    /// Bounding rectangle; position is the centre of the feet.
    #[inline]
    pub fn rect(&self) -> Rect {
        Rect {
            left: self.position.x - self.size.x / 2.0,
            top: self.position.y + self.size.y,
            right: self.position.x + self.size.x / 2.0,
            bottom: self.position.y,
        }
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.position.x, self.position.y + self.size.y / 2.0)
    }
}

/// Provenance of a hypothetical (search-only) bullet: enough to score a hit
/// analytically and to recognise fan-mates fired in the same burst.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct VirtualShot {
    pub shoot_tick: i32,
    pub shoot_position: Vec2,
    pub spread: f64,
    pub angle_index: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum BulletKind {
    /// Fired in the actual game; deterministic damage on contact.
    Real,
    /// Produced inside a rollout; damage is probability-weighted.
    Virtual(VirtualShot),
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bullet {
    pub weapon_kind: WeaponKind,
    pub unit_id: i32,
    pub player_id: i32,
    pub position: Vec2,
    pub velocity: Vec2,
    pub damage: f64,
    pub size: f64,
    pub explosion: Option<ExplosionParams>,
    pub kind: BulletKind,
}

impl Bullet {
    #[inline]
    pub fn is_real(&self) -> bool {
        matches!(self.kind, BulletKind::Real)
    }

    #[inline]
    pub fn rect(&self) -> Rect {
        let half = self.size / 2.0;
        Rect {
            left: self.position.x - half,
            top: self.position.y + half,
            right: self.position.x + half,
            bottom: self.position.y - half,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Item {
    WeaponPickup { kind: WeaponKind },
    HealthPack { health: f64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LootBox {
    pub position: Vec2,
    pub size: Vec2,
    pub item: Item,
}

impl LootBox {
    #[inline]
    pub fn rect(&self) -> Rect {
        Rect {
            left: self.position.x - self.size.x / 2.0,
            top: self.position.y + self.size.y,
            right: self.position.x + self.size.x / 2.0,
            bottom: self.position.y,
        }
    }
}

/// One tick of control for one unit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitAction {
    pub velocity: f64,
    pub jump: bool,
    pub jump_down: bool,
    pub aim: Vec2,
    pub shoot: bool,
    pub reload: bool,
    pub swap_weapon: bool,
    pub plant_mine: bool,
}

/// The one observable a rollout exposes to the scorer.
/// Negative `damage` is a heal.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DamageEvent {
    /// Ticks since the rollout started.
    pub tick: i32,
    pub unit_id: i32,
    pub damage: f64,
    pub real: bool,
    pub probability: f64,
    /// Ticks between the speculative shot and the hit (virtual only).
    pub shoot_delay: i32,
    /// Aim elevation at scoring time, degrees folded to `[0, 90]`. Diagnostic.
    pub aim_angle: f64,
}

/// Complete world snapshot. Units are keyed by id in a `BTreeMap` so that
/// per-tick iteration order - and therefore simulation output - is
/// deterministic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct World {
    pub current_tick: i32,
    pub properties: Properties,
    pub level: Level,
    pub units: BTreeMap<i32, Unit>,
    pub bullets: Vec<Bullet>,
    pub loot_boxes: Vec<LootBox>,
}

impl World {
    pub fn unit(&self, id: i32) -> Option<&Unit> {
        self.units.get(&id)
    }

    /// Ids of units on the other team, in id order.
    pub fn enemies_of(&self, player_id: i32) -> Vec<i32> {
        self.units
            .values()
            .filter(|unit| unit.player_id != player_id)
            .map(|unit| unit.id)
            .collect()
    }
}
