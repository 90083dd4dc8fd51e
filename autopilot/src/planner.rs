//! Per-tick decision assembly.
//!
//! The planner owns the lazily-built movement graph and stitches the pieces
//! together each tick: aim at the focus enemy, gate the trigger through the
//! hit estimator, override movement with the rollout search when it found
//! anything worth reacting to, and raise the mine flag on a favorable trade.

use sidearm_core::sim::mine_trade;
use sidearm_core::types::{UnitAction, World};

use crate::gunnery::{self, GunneryConfig};
use crate::pathing::{PathConfig, PathGraph};
use crate::search::{self, Directive, SearchConfig};
use crate::telemetry::DebugSink;

pub struct Planner {
    pub search: SearchConfig,
    pub gunnery: GunneryConfig,
    pub path: PathConfig,
    graph: Option<PathGraph>,
}

impl Default for Planner {
    fn default() -> Self {
        Self::new()
    }
}

impl Planner {
    pub fn new() -> Self {
        Self {
            search: SearchConfig::default(),
            gunnery: GunneryConfig::default(),
            path: PathConfig::default(),
            graph: None,
        }
    }

    /// The movement graph, once built. Exposed for diagnostics.
    pub fn graph(&self) -> Option<&PathGraph> {
        self.graph.as_ref()
    }

    /// Decide this tick's action for `unit_id`.
    pub fn act(
        &mut self,
        world: &World,
        unit_id: i32,
        directive: &Directive,
        sink: &mut dyn DebugSink,
    ) -> UnitAction {
        let Some(me) = world.unit(unit_id) else {
            return directive.base_action;
        };

        // The tile layout is static: one build per lifetime.
        if self.graph.is_none() {
            let graph = PathGraph::build(
                &world.level,
                &world.properties,
                me.position,
                self.path.clone(),
            );
            sink.log(&format!(
                "movement graph built: {} reachable tiles",
                graph.visited_tiles()
            ));
            self.graph = Some(graph);
        }
        let Some(graph) = self.graph.as_ref() else {
            return directive.base_action;
        };

        let mut action = directive.base_action;
        sink.mark(directive.goal, "goal");

        let focus = directive
            .focus_enemy
            .filter(|id| world.unit(*id).is_some());
        if let Some(enemy) = focus.and_then(|id| world.unit(id)) {
            action.aim = enemy.center() - me.center();
        }

        action.shoot = match (focus, me.weapon.as_ref()) {
            (Some(enemy_id), Some(_)) => {
                let decision =
                    gunnery::evaluate_shot(world, unit_id, enemy_id, action.aim, &self.gunnery);
                sink.log(&format!(
                    "shot gate: enemy {:.2}, friendly {:.2} -> {}",
                    decision.enemy_chance,
                    decision.friendly_risk,
                    if decision.shoot { "fire" } else { "hold" }
                ));
                decision.shoot
            }
            _ => false,
        };

        if let Some(movement) = search::plan(world, unit_id, directive, graph, &self.search, sink) {
            action.velocity = movement.velocity;
            action.jump = movement.jump;
            action.jump_down = movement.jump_down;
        } else {
            sink.log("search found no events; keeping caller action");
        }

        action.plant_mine = mine_trade(world, unit_id).is_some();
        action
    }
}
