//! Engine configuration.
//!
//! Every section has a `Default` built from `delve_logic::constants`, and
//! every field is optional in JSON, so a config file only needs to name the
//! values it changes:
//!
//! ```
//! use delve_core::config::EngineConfig;
//!
//! let config = EngineConfig::from_json(r#"{ "seed": 7, "pathfinding": { "jps_threshold": 30 } }"#).unwrap();
//! assert_eq!(config.seed, 7);
//! assert_eq!(config.pathfinding.jps_threshold, 30);
//! assert_eq!(config.pathfinding.occupied_cost, 10);
//! ```

use delve_logic::pathfinding::PathfindingConfig;
use delve_logic::schedule::SchedulerConfig;
use serde::{Deserialize, Serialize};

use crate::systems::TurnLoopConfig;

/// Seed used when none is configured.
pub const DEFAULT_SEED: u64 = 0x5eed;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub scheduler: SchedulerConfig,
    pub pathfinding: PathfindingConfig,
    pub turn_loop: TurnLoopConfig,
    /// Seed for the engine's RNG. Same seed and inputs, same run.
    pub seed: u64,
    /// Record pathfinding search traces.
    pub debug_pathfinding: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            pathfinding: PathfindingConfig::default(),
            turn_loop: TurnLoopConfig::default(),
            seed: DEFAULT_SEED,
            debug_pathfinding: false,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
