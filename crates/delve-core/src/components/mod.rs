//! Component definitions for the ECS simulation.
//!
//! Components are pure data structs attached to entities.
//! They have no behavior - that lives in systems.
//!
//! [`AiState`] and [`PathfindingState`] come from `delve-logic` and are
//! stored on entities as-is.

mod actor;
mod combat;
mod common;

pub use actor::*;
pub use combat::*;
pub use common::*;

pub use delve_logic::behavior::AiState;
pub use delve_logic::path_cache::PathfindingState;
