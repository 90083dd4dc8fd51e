//! Standard rule-set values.
//!
//! These are the host game's published constants. The simulator never reads
//! them directly - everything flows through [`crate::types::Properties`], so a
//! host that ships different tuning can override any of them.

use crate::types::{BulletParams, ExplosionParams, WeaponKind, WeaponParams};

// Timing
pub const TICKS_PER_SECOND: f64 = 60.0;
/// Micro-tick subdivision used when the caller does not override it.
pub const DEFAULT_MICRO_TICKS: u32 = 100;

// Units
pub const UNIT_SIZE_X: f64 = 0.9;
pub const UNIT_SIZE_Y: f64 = 1.8;
pub const UNIT_MAX_HORIZONTAL_SPEED: f64 = 10.0;
pub const UNIT_FALL_SPEED: f64 = 10.0;
pub const UNIT_JUMP_SPEED: f64 = 10.0;
pub const UNIT_JUMP_TIME: f64 = 0.55;
pub const UNIT_MAX_HEALTH: f64 = 100.0;

// Jump pads
pub const JUMP_PAD_JUMP_SPEED: f64 = 20.0;
pub const JUMP_PAD_JUMP_TIME: f64 = 0.525;

// Loot
pub const HEALTH_PACK_HEALTH: f64 = 50.0;
pub const LOOT_BOX_SIZE_X: f64 = 0.5;
pub const LOOT_BOX_SIZE_Y: f64 = 0.5;

// Mines
pub const MINE_EXPLOSION_RADIUS: f64 = 3.0;
pub const MINE_EXPLOSION_DAMAGE: f64 = 50.0;

/// Parameter table for the three weapon classes.
pub fn weapon_params(kind: WeaponKind) -> WeaponParams {
    match kind {
        WeaponKind::Pistol => WeaponParams {
            magazine_size: 8,
            fire_rate: 0.4,
            reload_time: 1.0,
            min_spread: 0.05,
            max_spread: 0.5,
            recoil: 0.5,
            aim_speed: 1.0,
            bullet: BulletParams {
                speed: 50.0,
                damage: 20.0,
                size: 0.2,
            },
            explosion: None,
        },
        WeaponKind::AssaultRifle => WeaponParams {
            magazine_size: 20,
            fire_rate: 0.1,
            reload_time: 1.0,
            min_spread: 0.1,
            max_spread: 0.5,
            recoil: 0.2,
            aim_speed: 1.9,
            bullet: BulletParams {
                speed: 50.0,
                damage: 5.0,
                size: 0.2,
            },
            explosion: None,
        },
        WeaponKind::RocketLauncher => WeaponParams {
            magazine_size: 1,
            fire_rate: 1.0,
            reload_time: 1.0,
            min_spread: 0.1,
            max_spread: 0.5,
            recoil: 1.0,
            aim_speed: 1.0,
            bullet: BulletParams {
                speed: 30.0,
                damage: 30.0,
                size: 0.4,
            },
            explosion: Some(ExplosionParams {
                radius: 3.0,
                damage: 50.0,
            }),
        },
    }
}
