//! Level and world construction for tests, benchmarks and the CLI.
//!
//! Levels are drawn as ASCII art, top row first: `#` wall, `-` platform,
//! `H` ladder, `^` jump pad, anything else empty. Scenario files are the
//! same thing in JSON so fixtures can live on disk.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use sidearm_core::geom::Vec2;
use sidearm_core::types::{
    Item, JumpState, Level, LootBox, Properties, Tile, Unit, Weapon, WeaponKind, World,
};

/// Parse an ASCII grid into a level. Rows are given top to bottom; ragged
/// rows are padded with empty tiles.
pub fn level_from_ascii(art: &str) -> Level {
    let rows: Vec<&str> = art.lines().map(str::trim).filter(|row| !row.is_empty()).collect();
    let height = rows.len();
    let width = rows.iter().map(|row| row.chars().count()).max().unwrap_or(0);
    let mut tiles = vec![vec![Tile::Empty; height]; width];
    for (row_index, row) in rows.iter().enumerate() {
        let y = height - 1 - row_index;
        for (x, glyph) in row.chars().enumerate() {
            tiles[x][y] = match glyph {
                '#' => Tile::Wall,
                '-' => Tile::Platform,
                'H' => Tile::Ladder,
                '^' => Tile::JumpPad,
                _ => Tile::Empty,
            };
        }
    }
    Level { tiles }
}

/// Units as (id, player, x, y) standing on the ground, full health, unarmed.
pub fn world_with_units(level: Level, specs: &[(i32, i32, f64, f64)]) -> World {
    let properties = Properties::default();
    let units = specs
        .iter()
        .map(|&(id, player_id, x, y)| {
            (
                id,
                Unit {
                    player_id,
                    id,
                    health: properties.unit_max_health,
                    position: Vec2::new(x, y),
                    size: properties.unit_size,
                    jump_state: JumpState::grounded(&properties),
                    mines: 0,
                    weapon: None,
                },
            )
        })
        .collect();
    World {
        current_tick: 0,
        properties,
        level,
        units,
        bullets: Vec::new(),
        loot_boxes: Vec::new(),
    }
}

/// A self-contained duel setup, loadable from JSON.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub rows: Vec<String>,
    pub spawn_a: Vec2,
    pub spawn_b: Vec2,
    #[serde(default)]
    pub weapon_a: Option<WeaponKind>,
    #[serde(default)]
    pub weapon_b: Option<WeaponKind>,
    #[serde(default)]
    pub mines_each: i32,
    #[serde(default)]
    pub loot: Vec<LootBox>,
}

impl Scenario {
    pub fn world(&self) -> World {
        let level = level_from_ascii(&self.rows.join("\n"));
        let mut world = world_with_units(
            level,
            &[
                (1, 1, self.spawn_a.x, self.spawn_a.y),
                (2, 2, self.spawn_b.x, self.spawn_b.y),
            ],
        );
        if let Some(unit) = world.units.get_mut(&1) {
            unit.weapon = self.weapon_a.map(Weapon::new);
            unit.mines = self.mines_each;
        }
        if let Some(unit) = world.units.get_mut(&2) {
            unit.weapon = self.weapon_b.map(Weapon::new);
            unit.mines = self.mines_each;
        }
        world.loot_boxes = self.loot.clone();
        world
    }

    pub fn load(path: &Path) -> Result<Scenario> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed reading scenario {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing scenario {}", path.display()))
    }
}

/// Flat arena with a centre platform, a health pack and a jump pad.
pub fn arena() -> Scenario {
    Scenario {
        name: "arena".to_string(),
        rows: vec![
            "########################".to_string(),
            "#......................#".to_string(),
            "#......................#".to_string(),
            "#.........--...........#".to_string(),
            "#......................#".to_string(),
            "#....................^.#".to_string(),
            "########################".to_string(),
        ],
        spawn_a: Vec2::new(3.5, 1.0),
        spawn_b: Vec2::new(20.5, 1.0),
        weapon_a: Some(WeaponKind::AssaultRifle),
        weapon_b: Some(WeaponKind::Pistol),
        mines_each: 0,
        loot: vec![LootBox {
            position: Vec2::new(11.5, 4.0),
            size: Vec2::new(0.5, 0.5),
            item: Item::HealthPack { health: 50.0 },
        }],
    }
}

/// Two rooms joined over a wall - movement has to go up and over.
pub fn ridge() -> Scenario {
    Scenario {
        name: "ridge".to_string(),
        rows: vec![
            "######################".to_string(),
            "#....................#".to_string(),
            "#....................#".to_string(),
            "#....................#".to_string(),
            "#.........##.........#".to_string(),
            "#.........##.........#".to_string(),
            "######################".to_string(),
        ],
        spawn_a: Vec2::new(4.5, 1.0),
        spawn_b: Vec2::new(17.5, 1.0),
        weapon_a: Some(WeaponKind::Pistol),
        weapon_b: Some(WeaponKind::Pistol),
        mines_each: 0,
        loot: Vec::new(),
    }
}

pub fn canned(name: &str) -> Option<Scenario> {
    match name {
        "arena" => Some(arena()),
        "ridge" => Some(ridge()),
        _ => None,
    }
}

pub fn canned_names() -> Vec<&'static str> {
    vec!["arena", "ridge"]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_round_trip_places_tiles() {
        let level = level_from_ascii(
            "#####\n\
             #.H.#\n\
             #-^.#\n\
             #####",
        );
        assert_eq!(level.width(), 5);
        assert_eq!(level.height(), 4);
        assert_eq!(level.tile(0, 0), Tile::Wall);
        assert_eq!(level.tile(2, 2), Tile::Ladder);
        assert_eq!(level.tile(1, 1), Tile::Platform);
        assert_eq!(level.tile(2, 1), Tile::JumpPad);
        assert_eq!(level.tile(3, 2), Tile::Empty);
    }

    #[test]
    fn scenario_serde_round_trip() {
        let scenario = arena();
        let encoded = serde_json::to_string(&scenario).expect("serialize");
        let decoded: Scenario = serde_json::from_str(&encoded).expect("deserialize");
        assert_eq!(decoded.name, scenario.name);
        let world = decoded.world();
        assert_eq!(world.units.len(), 2);
        assert_eq!(world.loot_boxes.len(), 1);
        assert!(world.unit(1).and_then(|u| u.weapon).is_some());
    }
}
