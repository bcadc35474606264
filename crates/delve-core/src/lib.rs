//! Delve Core - turn-based dungeon simulation engine
//!
//! Hosts the pure logic of `delve-logic` on an ECS world:
//! - **Entities**: the player, monsters, corpses
//! - **Components**: pure data attached to entities (Position, Health, AiState, ...)
//! - **Systems**: the turn loop, the AI driver and the per-entity path cache
//!
//! # Example
//!
//! ```rust,no_run
//! use delve_core::prelude::*;
//!
//! let map = GameMap::bordered_room(20, 12);
//! let mut engine = SimulationEngine::new(map, EngineConfig::default());
//! engine.spawn_player(Point::new(2, 2), 20);
//! engine.spawn_monster(Point::new(15, 8), Archetype::Hunter, "orc", 8, 2);
//!
//! loop {
//!     let report = engine.run();
//!     if let TurnOutcome::AwaitingInput(_) = report.outcome {
//!         engine.queue_player_action(Action::Wait { cost: 100 });
//!     }
//! }
//! ```

pub mod actions;
pub mod components;
pub mod config;
pub mod engine;
pub mod fov;
pub mod map;
pub mod persistence;
pub mod systems;
pub mod world;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::actions::{execute_action, Action, ActionError};
    pub use crate::components::*;
    pub use crate::config::EngineConfig;
    pub use crate::engine::SimulationEngine;
    pub use crate::map::{GameMap, Tile};
    pub use crate::systems::{TurnOutcome, TurnReport};
    pub use crate::world::{EntityId, GameWorld, SharedWorld};
    pub use delve_logic::behavior::Archetype;
    pub use delve_logic::grid::{Delta, Point};
    pub use delve_logic::path_strategy::PathStrategy;
}
