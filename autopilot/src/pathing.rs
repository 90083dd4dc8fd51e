//! Movement-cost graph.
//!
//! Precomputes, for every reachable standable tile, the minimal simulated
//! travel time to every other tile. Built once per level from the unit's
//! spawn position (the tile layout is static), read-only afterwards.
//!
//! Discovery runs single-chain traversal simulations on a lone-unit world:
//! from a tile centre, each candidate movement chain is advanced until the
//! unit settles on a different tile, and the elapsed ticks (plus a fractional
//! horizontal settle penalty) become an edge weight. Closure is
//! Floyd-Warshall over the visited subset.

use std::collections::BTreeMap;

use sidearm_core::geom::{approx_eq, Vec2, EPS};
use sidearm_core::sim::{SimFlags, Simulation};
use sidearm_core::types::{JumpState, Level, Properties, Unit, UnitAction, World};

use crate::policy;

/// Sentinel weight for a pair with no discovered route.
pub const UNREACHABLE: u16 = u16::MAX;

/// Probe unit id inside traversal worlds.
const PROBE_ID: i32 = 0;

#[derive(Clone, Debug)]
pub struct PathConfig {
    /// Micro-ticks per traversal simulation tick. Traversals run thousands of
    /// short simulations, so this is much coarser than a combat rollout.
    pub micro_ticks: u32,
    /// Give up on a chain that has not settled after this many ticks.
    pub tick_cap: i32,
    /// Ticks charged per tile of horizontal offset from the landing tile's
    /// centre, approximating the time to finish the move.
    pub settle_cost: f64,
    /// How far from an unknown destination tile to look for a known one.
    pub snap_radius: i32,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            micro_ticks: 4,
            tick_cap: 90,
            settle_cost: 3.0,
            snap_radius: 3,
        }
    }
}

/// Movement chains tried from every tile: (direction, jump, jump_down).
/// The do-nothing chain is omitted - it never leaves the tile.
const TRAVERSAL_CHAINS: [(f64, bool, bool); 8] = [
    (-1.0, false, false),
    (-1.0, true, false),
    (-1.0, false, true),
    (1.0, false, false),
    (1.0, true, false),
    (1.0, false, true),
    (0.0, true, false),
    (0.0, false, true),
];

pub struct PathGraph {
    height: i32,
    nodes: usize,
    dist: Vec<u16>,
    visited: Vec<bool>,
    level: Level,
    properties: Properties,
    config: PathConfig,
}

impl PathGraph {
    /// Explore every tile reachable from `spawn` and close the distances.
    pub fn build(
        level: &Level,
        properties: &Properties,
        spawn: Vec2,
        config: PathConfig,
    ) -> PathGraph {
        let width = level.width().max(1);
        let height = level.height().max(1);
        let nodes = (width * height) as usize;
        let mut graph = PathGraph {
            height,
            nodes,
            dist: vec![UNREACHABLE; nodes * nodes],
            visited: vec![false; nodes],
            level: level.clone(),
            properties: properties.clone(),
            config,
        };

        let Some((start, _)) = graph.settle_from(spawn) else {
            return graph;
        };

        // Explicit worklist instead of recursion: the visited set keyed by
        // tile index bounds the walk on any map.
        let mut stack = vec![start];
        graph.visited[start] = true;
        while let Some(tile) = stack.pop() {
            for (direction, jump, jump_down) in TRAVERSAL_CHAINS {
                let Some((landing, cost)) = graph.traverse(tile, direction, jump, jump_down)
                else {
                    continue;
                };
                if landing == tile {
                    continue;
                }
                let slot = &mut graph.dist[tile * graph.nodes + landing];
                *slot = (*slot).min(cost);
                if !graph.visited[landing] {
                    graph.visited[landing] = true;
                    stack.push(landing);
                }
            }
        }

        graph.close();
        graph
    }

    pub fn visited_tiles(&self) -> usize {
        self.visited.iter().filter(|seen| **seen).count()
    }

    /// Closed-form travel time in ticks from a literal position to a goal
    /// position. `src` need not be a graph node: a one-shot settle simulation
    /// finds the tile it first lands on and its cost is added. `None` means
    /// the goal is not connected to anything known - treat as very far.
    pub fn distance(&self, src: Vec2, dst: Vec2) -> Option<f64> {
        let goal = self.snap_to_visited(self.tile_index(dst)?)?;
        let (origin, local_cost) = self.resolve_src(src)?;
        if origin == goal {
            return Some(local_cost);
        }
        let weight = self.dist[origin * self.nodes + goal];
        if weight == UNREACHABLE {
            None
        } else {
            Some(local_cost + weight as f64)
        }
    }

    /// Travel time between two tile centres, if both are known.
    pub fn tile_distance(&self, src: (i32, i32), dst: (i32, i32)) -> Option<f64> {
        let from = self.index_of(src.0, src.1)?;
        let to = self.index_of(dst.0, dst.1)?;
        if !self.visited[from] || !self.visited[to] {
            return None;
        }
        if from == to {
            return Some(0.0);
        }
        let weight = self.dist[from * self.nodes + to];
        if weight == UNREACHABLE {
            None
        } else {
            Some(weight as f64)
        }
    }

    fn resolve_src(&self, src: Vec2) -> Option<(usize, f64)> {
        let (tile, ticks) = self.settle_from(src)?;
        let origin = if self.visited[tile] {
            tile
        } else {
            self.snap_to_visited(tile)?
        };
        Some((origin, ticks as f64))
    }

    /// Nearest visited tile within the snap radius, scanning outward ring by
    /// ring in a fixed order so queries are deterministic.
    fn snap_to_visited(&self, tile: usize) -> Option<usize> {
        if self.visited[tile] {
            return Some(tile);
        }
        let x = tile as i32 / self.height;
        let y = tile as i32 % self.height;
        for radius in 1..=self.config.snap_radius {
            for dx in -radius..=radius {
                for dy in -radius..=radius {
                    if dx.abs() != radius && dy.abs() != radius {
                        continue;
                    }
                    if let Some(candidate) = self.index_of(x + dx, y + dy) {
                        if self.visited[candidate] {
                            return Some(candidate);
                        }
                    }
                }
            }
        }
        None
    }

    /// Simulate one movement chain from a tile centre until the unit settles
    /// on a different tile. Returns the landing tile index and the rounded
    /// edge weight, or `None` for a chain that gets stuck or times out.
    fn traverse(
        &self,
        tile: usize,
        direction: f64,
        jump: bool,
        jump_down: bool,
    ) -> Option<(usize, u16)> {
        let x = tile as i32 / self.height;
        let y = tile as i32 % self.height;
        let start = Vec2::new(x as f64 + 0.5, y as f64);
        let mut sim = self.probe_simulation(start, JumpState::grounded(&self.properties));

        let mut actions = BTreeMap::new();
        actions.insert(
            PROBE_ID,
            UnitAction {
                velocity: direction * policy::RAW_CHAIN_SPEED,
                jump,
                jump_down,
                ..UnitAction::default()
            },
        );

        let mut last_position = start;
        for tick in 1..=self.config.tick_cap {
            sim.simulate(&actions);
            let unit = sim.world.unit(PROBE_ID)?;
            if let Some(landing) = self.settled_tile(unit) {
                if landing != tile {
                    let offset = (unit.position.x - landing_center_x(landing, self.height)).abs();
                    let cost = (tick as f64 + offset * self.config.settle_cost).round();
                    return Some((landing, cost.min(f64::from(UNREACHABLE - 1)) as u16));
                }
            }
            if approx_eq(unit.position.x, last_position.x, 1e-9)
                && approx_eq(unit.position.y, last_position.y, 1e-9)
            {
                return None;
            }
            last_position = unit.position;
        }
        None
    }

    /// Fall from a literal position until the unit lands; the tile it lands
    /// on and the ticks it took. Used both to seed the build and to resolve
    /// mid-air query sources.
    fn settle_from(&self, position: Vec2) -> Option<(usize, i32)> {
        let mut sim = self.probe_simulation(position, JumpState::falling());
        let mut actions = BTreeMap::new();
        actions.insert(PROBE_ID, UnitAction::default());

        let mut last_y = position.y;
        for tick in 1..=self.config.tick_cap {
            sim.simulate(&actions);
            let unit = sim.world.unit(PROBE_ID)?;
            if let Some(tile) = self.settled_tile(unit) {
                return Some((tile, tick));
            }
            if approx_eq(unit.position.y, last_y, 1e-9) {
                return None;
            }
            last_y = unit.position.y;
        }
        None
    }

    /// The tile a unit has come to rest on: freshly grounded with the full
    /// jump budget, or grabbed by a jump pad.
    fn settled_tile(&self, unit: &Unit) -> Option<usize> {
        let grounded = unit.jump_state.can_jump
            && unit.jump_state.can_cancel
            && approx_eq(unit.jump_state.max_time, self.properties.unit_jump_time, EPS);
        let pad_grabbed = !unit.jump_state.can_cancel && unit.jump_state.max_time > 0.0;
        if grounded || pad_grabbed {
            self.index_of(unit.position.x.floor() as i32, unit.position.y.floor() as i32)
        } else {
            None
        }
    }

    fn probe_simulation(&self, position: Vec2, jump_state: JumpState) -> Simulation {
        let unit = Unit {
            player_id: 0,
            id: PROBE_ID,
            health: self.properties.unit_max_health,
            position,
            size: self.properties.unit_size,
            jump_state,
            mines: 0,
            weapon: None,
        };
        let world = World {
            current_tick: 0,
            properties: self.properties.clone(),
            level: self.level.clone(),
            units: [(PROBE_ID, unit)].into_iter().collect(),
            bullets: Vec::new(),
            loot_boxes: Vec::new(),
        };
        Simulation::new(
            world,
            SimFlags {
                bullets: false,
                shooting: false,
                micro_ticks: self.config.micro_ticks,
                ..SimFlags::default()
            },
        )
    }

    /// All-pairs closure over the visited subset. Unvisited tiles never
    /// relax, so the cube is over reachable tiles only.
    fn close(&mut self) {
        let members: Vec<usize> = (0..self.nodes).filter(|tile| self.visited[*tile]).collect();
        for &tile in &members {
            self.dist[tile * self.nodes + tile] = 0;
        }
        for &k in &members {
            for &i in &members {
                let through = self.dist[i * self.nodes + k];
                if through == UNREACHABLE {
                    continue;
                }
                for &j in &members {
                    let tail = self.dist[k * self.nodes + j];
                    if tail == UNREACHABLE {
                        continue;
                    }
                    let candidate = u32::from(through) + u32::from(tail);
                    let slot = &mut self.dist[i * self.nodes + j];
                    if candidate < u32::from(*slot) {
                        *slot = candidate.min(u32::from(UNREACHABLE - 1)) as u16;
                    }
                }
            }
        }
    }

    fn tile_index(&self, position: Vec2) -> Option<usize> {
        self.index_of(position.x.floor() as i32, position.y.floor() as i32)
    }

    fn index_of(&self, x: i32, y: i32) -> Option<usize> {
        let width = self.nodes as i32 / self.height;
        if x < 0 || y < 0 || x >= width || y >= self.height {
            return None;
        }
        Some((x * self.height + y) as usize)
    }
}

fn landing_center_x(tile: usize, height: i32) -> f64 {
    (tile as i32 / height) as f64 + 0.5
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::level_from_ascii;

    fn flat_room() -> Level {
        level_from_ascii(
            "################\n\
             #..............#\n\
             #..............#\n\
             #..............#\n\
             ################",
        )
    }

    #[test]
    fn flat_room_distances_are_symmetric_and_monotonic() {
        let level = flat_room();
        let properties = Properties::default();
        let graph = PathGraph::build(
            &level,
            &properties,
            Vec2::new(7.5, 1.0),
            PathConfig::default(),
        );
        assert!(graph.visited_tiles() >= 12, "floor tiles not discovered");

        let there = graph.tile_distance((2, 1), (12, 1)).expect("reachable");
        let back = graph.tile_distance((12, 1), (2, 1)).expect("reachable");
        assert_eq!(there, back, "flat walk should cost the same both ways");

        let mut previous = 0.0;
        for x in 3..=12 {
            let distance = graph.tile_distance((2, 1), (x, 1)).expect("reachable");
            assert!(
                distance >= previous,
                "distance to ({x},1) went down: {distance} < {previous}"
            );
            previous = distance;
        }
    }

    #[test]
    fn metric_laws_hold_on_visited_tiles() {
        let level = level_from_ascii(
            "##############\n\
             #............#\n\
             #............#\n\
             #....####....#\n\
             #............#\n\
             ##############",
        );
        let properties = Properties::default();
        let graph = PathGraph::build(
            &level,
            &properties,
            Vec2::new(2.5, 1.0),
            PathConfig::default(),
        );

        let tiles: Vec<(i32, i32)> = (1..13)
            .flat_map(|x| (1..5).map(move |y| (x, y)))
            .filter(|&(x, y)| graph.tile_distance((x, y), (x, y)) == Some(0.0))
            .collect();
        assert!(tiles.len() >= 8);

        for &a in &tiles {
            for &b in &tiles {
                let Some(direct) = graph.tile_distance(a, b) else {
                    continue;
                };
                for &c in &tiles {
                    let (Some(first), Some(second)) =
                        (graph.tile_distance(a, c), graph.tile_distance(c, b))
                    else {
                        continue;
                    };
                    assert!(
                        direct <= first + second + EPS,
                        "triangle inequality violated: {a:?}->{b:?} {direct} > {first}+{second} via {c:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn mid_air_source_settles_before_lookup() {
        let level = flat_room();
        let properties = Properties::default();
        let graph = PathGraph::build(
            &level,
            &properties,
            Vec2::new(7.5, 1.0),
            PathConfig::default(),
        );
        // Query from above the floor: the probe falls, lands, and the local
        // cost is added on top of the closed distance.
        let airborne = graph
            .distance(Vec2::new(2.5, 3.0), Vec2::new(12.5, 1.0))
            .expect("reachable after settling");
        let grounded = graph
            .distance(Vec2::new(2.5, 1.0), Vec2::new(12.5, 1.0))
            .expect("reachable");
        assert!(airborne > grounded, "falling first must cost extra time");
    }

    #[test]
    fn unknown_destination_reports_none() {
        let level = level_from_ascii(
            "##########\n\
             #....#...#\n\
             #....#...#\n\
             ##########",
        );
        let properties = Properties::default();
        let graph = PathGraph::build(
            &level,
            &properties,
            Vec2::new(2.5, 1.0),
            PathConfig {
                snap_radius: 1,
                ..PathConfig::default()
            },
        );
        // The right-hand room is sealed off: no snap candidate in radius.
        assert!(graph.distance(Vec2::new(2.5, 1.0), Vec2::new(8.5, 1.0)).is_none());
    }
}
