//! Sidearm core - deterministic duel engine for a tick-based 2D
//! shooter-platformer.
//!
//! This crate contains the full movement, weapon and bullet rules as a pure
//! value-semantics simulation: cloning a [`types::World`] yields a fully
//! independent copy, so planner rollouts can never alias each other's state.

pub mod constants;
pub mod geom;
pub mod sim;
pub mod types;

// Re-export key items
pub use geom::{Rect, Vec2};
pub use sim::{SimFlags, Simulation};
pub use types::{DamageEvent, Level, Properties, Tile, Unit, UnitAction, World};
