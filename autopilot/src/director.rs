//! Goal selection - the thin heuristic collaborator in front of the planner.
//!
//! Picks where the unit should be heading and how much that matters, then
//! sketches the naive action the planner falls back to. The planner never
//! looks past the resulting [`Directive`].

use sidearm_core::geom::{distance_sqr, Vec2};
use sidearm_core::types::{Item, Tile, UnitAction, WeaponKind, World};

use crate::search::Directive;

/// Importance ladder for health-pack runs as the unit gets hurt.
const HURT_IMPORTANCE: [(f64, f64); 3] = [(90.0, 10.0), (80.0, 50.0), (60.0, 100.0)];

/// Preferred squared standoff distance, wider against rocket launchers.
const STANDOFF_SQR: f64 = 9.0;
const ROCKET_STANDOFF_SQR: f64 = 81.0;

pub fn directive(world: &World, unit_id: i32) -> Directive {
    let Some(me) = world.unit(unit_id) else {
        return Directive {
            goal: Vec2::ZERO,
            importance: 1.0,
            focus_enemy: None,
            base_action: UnitAction::default(),
        };
    };

    let nearest_enemy = world
        .units
        .values()
        .filter(|unit| unit.player_id != me.player_id)
        .min_by(|a, b| {
            distance_sqr(me.position, a.position)
                .total_cmp(&distance_sqr(me.position, b.position))
        });

    let nearest_weapon = world
        .loot_boxes
        .iter()
        .filter(|loot| {
            matches!(loot.item, Item::WeaponPickup { kind } if kind != WeaponKind::RocketLauncher)
        })
        .min_by(|a, b| {
            distance_sqr(me.position, a.position)
                .total_cmp(&distance_sqr(me.position, b.position))
        });

    let nearest_health_pack = world
        .loot_boxes
        .iter()
        .filter(|loot| matches!(loot.item, Item::HealthPack { .. }))
        .min_by(|a, b| {
            distance_sqr(me.position, a.position)
                .total_cmp(&distance_sqr(me.position, b.position))
        });

    let mut goal = me.position;
    let mut importance = 1.0;

    if me.weapon.is_none() {
        if let Some(loot) = nearest_weapon {
            goal = loot.position;
        }
    } else if let Some(pack) = nearest_health_pack.filter(|pack| {
        me.health <= HURT_IMPORTANCE[0].0
            && nearest_enemy.is_none_or(|enemy| {
                // Skip the pack when the enemy stands between us and it.
                !((me.position.x < enemy.position.x && enemy.position.x < pack.position.x)
                    || (me.position.x > enemy.position.x && enemy.position.x > pack.position.x))
            })
    }) {
        goal = pack.position;
        for (health_bar, value) in HURT_IMPORTANCE {
            if me.health <= health_bar {
                importance = value;
            }
        }
    } else if let Some(enemy) = nearest_enemy {
        let standoff = if enemy
            .weapon
            .as_ref()
            .is_some_and(|weapon| weapon.kind == WeaponKind::RocketLauncher)
        {
            ROCKET_STANDOFF_SQR
        } else {
            STANDOFF_SQR
        };
        if distance_sqr(me.position, enemy.position) > standoff {
            goal = enemy.position;
        } else {
            // Too close: back off toward the far corner on our side.
            let width = world.level.width() as f64;
            let height = world.level.height() as f64;
            goal = if me.position.x > enemy.position.x {
                Vec2::new(width - 2.0, height - 2.0)
            } else {
                Vec2::new(1.0, height - 2.0)
            };
        }
    }

    let aim = nearest_enemy
        .map(|enemy| enemy.center() - me.center())
        .unwrap_or(Vec2::ZERO);

    // Naive movement: run at the goal, hop over walls in the way.
    let mut jump = goal.y > me.position.y;
    if goal.x > me.position.x
        && world.level.tile_at(me.position.x + 1.0, me.position.y) == Tile::Wall
    {
        jump = true;
    }
    if goal.x < me.position.x
        && world.level.tile_at(me.position.x - 1.0, me.position.y) == Tile::Wall
    {
        jump = true;
    }

    let base_action = UnitAction {
        velocity: (goal.x - me.position.x) * 100.0,
        jump,
        jump_down: !jump,
        aim,
        shoot: false,
        ..UnitAction::default()
    };

    Directive {
        goal,
        importance,
        focus_enemy: nearest_enemy.map(|enemy| enemy.id),
        base_action,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::{level_from_ascii, world_with_units};
    use sidearm_core::types::{LootBox, Weapon};

    fn room() -> sidearm_core::types::Level {
        level_from_ascii(
            "####################\n\
             #..................#\n\
             #..................#\n\
             #..................#\n\
             ####################",
        )
    }

    #[test]
    fn unarmed_unit_heads_for_a_weapon() {
        let mut world = world_with_units(room(), &[(1, 1, 3.5, 1.0), (2, 2, 16.5, 1.0)]);
        world.loot_boxes.push(LootBox {
            position: Vec2::new(9.5, 1.0),
            size: Vec2::new(0.5, 0.5),
            item: Item::WeaponPickup {
                kind: WeaponKind::Pistol,
            },
        });
        let directive = directive(&world, 1);
        assert_eq!(directive.goal, Vec2::new(9.5, 1.0));
        assert!(directive.base_action.velocity > 0.0);
        assert_eq!(directive.focus_enemy, Some(2));
    }

    #[test]
    fn hurt_unit_values_the_health_pack_by_the_ladder() {
        let mut world = world_with_units(room(), &[(1, 1, 3.5, 1.0), (2, 2, 16.5, 1.0)]);
        world.loot_boxes.push(LootBox {
            position: Vec2::new(6.5, 1.0),
            size: Vec2::new(0.5, 0.5),
            item: Item::HealthPack { health: 50.0 },
        });
        if let Some(unit) = world.units.get_mut(&1) {
            unit.weapon = Some(Weapon::new(WeaponKind::Pistol));
            unit.health = 55.0;
        }
        let directive = directive(&world, 1);
        assert_eq!(directive.goal, Vec2::new(6.5, 1.0));
        assert_eq!(directive.importance, 100.0);
    }

    #[test]
    fn healthy_armed_unit_closes_on_the_enemy() {
        let mut world = world_with_units(room(), &[(1, 1, 3.5, 1.0), (2, 2, 16.5, 1.0)]);
        if let Some(unit) = world.units.get_mut(&1) {
            unit.weapon = Some(Weapon::new(WeaponKind::Pistol));
        }
        let directive = directive(&world, 1);
        assert_eq!(directive.goal, Vec2::new(16.5, 1.0));
        assert!(directive.base_action.velocity > 0.0);
        assert!(directive.base_action.aim.x > 0.0);
    }
}
