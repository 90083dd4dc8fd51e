//! Sidearm autopilot - the per-tick decision maker built on
//! [`sidearm_core`].
//!
//! Given a world snapshot and a goal directive from the host's heuristics,
//! the planner enumerates short action chains, rolls them out against
//! adversarial counter-policies in the forward simulator, gates the trigger
//! through a hit estimator, and emits one action for the current tick.

pub mod director;
pub mod gunnery;
pub mod pathing;
pub mod planner;
pub mod policy;
pub mod runner;
pub mod scenario;
pub mod search;
pub mod telemetry;

pub use planner::Planner;
pub use search::Directive;
pub use telemetry::{DebugSink, NullSink, TracingSink};
