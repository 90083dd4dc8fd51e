//! Injected diagnostics sink.
//!
//! The planner annotates its work through this trait; every method has a
//! no-op default so the decision path never depends on a sink being wired
//! up or behaving.

use sidearm_core::geom::Vec2;
use sidearm_core::types::UnitAction;

pub trait DebugSink {
    fn log(&mut self, _message: &str) {}

    /// A point of interest (candidate landing spot, goal, blast centre).
    fn mark(&mut self, _position: Vec2, _label: &str) {}

    /// One scored rollout: the candidate's first action, its score, and how
    /// many damage events it produced.
    fn rollout_scored(&mut self, _first: &UnitAction, _score: f64, _events: usize) {}
}

/// Discards everything.
pub struct NullSink;

impl DebugSink for NullSink {}

/// Forwards annotations to `tracing` at debug/trace level.
pub struct TracingSink;

impl DebugSink for TracingSink {
    fn log(&mut self, message: &str) {
        tracing::debug!(target: "sidearm", "{message}");
    }

    fn mark(&mut self, position: Vec2, label: &str) {
        tracing::trace!(target: "sidearm", x = position.x, y = position.y, "{label}");
    }

    fn rollout_scored(&mut self, first: &UnitAction, score: f64, events: usize) {
        tracing::trace!(
            target: "sidearm",
            velocity = first.velocity,
            jump = first.jump,
            jump_down = first.jump_down,
            events,
            "rollout score {score:.3}"
        );
    }
}
