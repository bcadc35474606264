//! Game constants: action costs, combat, scheduling and pathing tunables.
//!
//! None of the thresholds below are contracts. They are policy values that
//! the configuration structs use as defaults, and every one of them can be
//! overridden through [`crate::schedule::SchedulerConfig`] or
//! [`crate::pathfinding::PathfindingConfig`].

/// Game-time cost of each action kind.
pub mod costs {
    /// One cardinal step.
    pub const MOVE: u64 = 100;
    /// One melee attack.
    pub const ATTACK: u64 = 100;
    /// A plain wait / look-around turn.
    pub const WAIT: u64 = 100;
    /// Recovery wait queued after an AI attack.
    pub const RECOVERY: u64 = 50;
    /// Delay added when a non-player action fails, so a persistently
    /// failing actor cannot pin the queue at one time slot.
    pub const FAILURE_PENALTY: u64 = 50;
}

/// Melee defaults.
pub mod combat {
    /// Damage dealt by an attacker without an explicit damage value.
    pub const UNARMED_DAMAGE: i32 = 1;
}

/// Turn scheduler tunables.
pub mod scheduling {
    /// Operations between dead-entry sweeps under normal load.
    pub const CLEANUP_BASE_THRESHOLD: u32 = 100;
    /// Above this many live entities the sweep runs twice as often.
    pub const LARGE_ENTITY_COUNT: usize = 1000;
    /// Above this many queued entries the sweep runs twice as often.
    pub const LARGE_QUEUE_LEN: usize = 500;
    /// Below this many live entities (and a small queue) sweeps halve in frequency.
    pub const SMALL_ENTITY_COUNT: usize = 100;
    pub const SMALL_QUEUE_LEN: usize = 50;
    /// Hard cap on pops per loop invocation.
    pub const MAX_LOOP_ITERATIONS: u32 = 1000;
}

/// Pathfinding tunables.
pub mod pathing {
    /// Direct requests longer than this (Manhattan) use Jump-Point-Search.
    pub const JPS_THRESHOLD: u32 = 15;
    /// Extra cost for stepping onto a cell held by a movement-blocking entity.
    pub const OCCUPIED_COST: u32 = 10;
    /// Max Manhattan distance from a detour cell to its path neighbours.
    pub const DETOUR_RADIUS: u32 = 2;
    /// Ticks after which a cached path is recomputed regardless.
    pub const RECOMPUTE_INTERVAL: u64 = 500;
    /// Cached path longer than this multiple of the direct distance is stale.
    pub const INEFFICIENCY_FACTOR: u32 = 2;
    /// Radius around the searcher scanned for other path-followers.
    pub const GROUP_SEARCH_RADIUS: u32 = 8;
    /// Two targets within this distance count as "the same" destination.
    pub const GROUP_TARGET_RADIUS: u32 = 5;
    /// More than this many crowding followers escalates Direct to AvoidEntities.
    pub const GROUP_ESCALATION_COUNT: usize = 2;
    /// Longest path kept in an entity's cache.
    pub const MAX_PATH_LENGTH: usize = 200;
    /// Node expansions allowed per search before giving up.
    pub const MAX_SEARCH_NODES: usize = 20_000;
    /// Search traces retained while debug mode is on.
    pub const TRACE_CAPACITY: usize = 64;
}

/// AI behavior tunables.
pub mod behavior {
    /// Most movement steps queued by a single decision.
    pub const MAX_MOVE_BATCH: u32 = 3;
    /// Tiles of remaining distance per queued step.
    pub const TILES_PER_STEP: u32 = 4;
    /// How far a fleeing actor projects its escape point.
    pub const FLEE_DISTANCE: i32 = 6;
    /// Chance an idle wanderer waits instead of stepping.
    pub const IDLE_WAIT_CHANCE: f64 = 0.3;
    /// Chance the fallback policy waits instead of random-walking.
    pub const FALLBACK_WAIT_CHANCE: f64 = 0.5;
    /// Sight radius assumed for actors without a viewshed.
    pub const DEFAULT_SIGHT_RADIUS: i32 = 8;
}
