use anyhow::Result;
use std::collections::BTreeMap;

use sidearm_autopilot::director;
use sidearm_autopilot::planner::Planner;
use sidearm_autopilot::scenario::{arena, level_from_ascii, world_with_units};
use sidearm_autopilot::search::Directive;
use sidearm_autopilot::telemetry::NullSink;
use sidearm_core::geom::Vec2;
use sidearm_core::sim::{SimFlags, Simulation};
use sidearm_core::types::{UnitAction, Weapon, WeaponKind};

fn quiet_room() -> sidearm_core::types::Level {
    level_from_ascii(
        "######################\n\
         #....................#\n\
         #....................#\n\
         #....................#\n\
         #....................#\n\
         #....................#\n\
         #....................#\n\
         ######################",
    )
}

#[test]
fn no_events_means_no_override() {
    // Unarmed units far apart: no rollout can produce a single damage event,
    // so the caller's base action must come back untouched.
    let world = world_with_units(quiet_room(), &[(1, 1, 2.5, 1.0), (2, 2, 19.5, 1.0)]);
    let base_action = UnitAction {
        velocity: 77.0,
        jump: false,
        jump_down: true,
        ..UnitAction::default()
    };
    let directive = Directive {
        goal: Vec2::new(19.5, 1.0),
        importance: 1.0,
        focus_enemy: Some(2),
        base_action,
    };
    let mut planner = Planner::new();
    let action = planner.act(&world, 1, &directive, &mut NullSink);
    assert_eq!(action.velocity, base_action.velocity);
    assert_eq!(action.jump, base_action.jump);
    assert_eq!(action.jump_down, base_action.jump_down);
    assert!(!action.shoot, "unarmed unit cannot shoot");
    assert!(!action.plant_mine);
}

#[test]
fn planner_dodges_an_incoming_rocket() {
    // A rocket slaved to our position arrives in ~15 ticks. Any sideways or
    // vertical move beats standing in the blast; the planner must override
    // the caller's stand-still intent.
    let mut world = world_with_units(quiet_room(), &[(1, 1, 10.5, 1.0), (2, 2, 19.5, 1.0)]);
    if let Some(unit) = world.units.get_mut(&2) {
        unit.weapon = Some(Weapon::new(WeaponKind::RocketLauncher));
    }
    world.bullets.push(sidearm_core::types::Bullet {
        weapon_kind: WeaponKind::RocketLauncher,
        unit_id: 2,
        player_id: 2,
        position: Vec2::new(18.0, 1.9),
        velocity: Vec2::new(-30.0, 0.0),
        damage: 30.0,
        size: 0.4,
        explosion: Some(sidearm_core::types::ExplosionParams {
            radius: 3.0,
            damage: 50.0,
        }),
        kind: sidearm_core::types::BulletKind::Real,
    });

    let directive = Directive {
        goal: Vec2::new(10.5, 1.0),
        importance: 0.2,
        focus_enemy: Some(2),
        base_action: UnitAction::default(),
    };
    let mut planner = Planner::new();
    let action = planner.act(&world, 1, &directive, &mut NullSink);
    assert!(
        action.velocity.abs() > 0.0 || action.jump,
        "planner stood still in front of a rocket: {action:?}"
    );
}

#[test]
fn duel_smoke_produces_damage_and_a_result() -> Result<()> {
    use sidearm_autopilot::runner::{run_duel, write_json};

    let metrics = run_duel(&arena(), 400)?;
    assert!(metrics.ticks > 0);
    assert!(
        metrics.shots_fired > 0,
        "two armed units never fired in {} ticks",
        metrics.ticks
    );

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("reports/arena.json");
    write_json(&path, &metrics)?;
    assert!(path.exists());
    Ok(())
}

#[test]
fn receding_horizon_replans_from_fresh_state() {
    // Drive a few host ticks with the planner in the loop; the planner must
    // keep functioning on every snapshot (graph reuse, no stale state).
    let mut sim = Simulation::new(
        arena().world(),
        SimFlags {
            pickups: true,
            real_fire: true,
            micro_ticks: 20,
            ..SimFlags::default()
        },
    );
    let mut planners: BTreeMap<i32, Planner> = [(1, Planner::new()), (2, Planner::new())].into();
    for _ in 0..5 {
        let mut actions = BTreeMap::new();
        for id in [1, 2] {
            if sim.world.unit(id).is_none() {
                continue;
            }
            let directive = director::directive(&sim.world, id);
            let Some(planner) = planners.get_mut(&id) else {
                continue;
            };
            actions.insert(id, planner.act(&sim.world, id, &directive, &mut NullSink));
        }
        sim.simulate(&actions);
    }
    assert_eq!(sim.world.current_tick, 5);
    for planner in planners.values() {
        assert!(planner.graph().is_some(), "graph should be built and kept");
    }
}
