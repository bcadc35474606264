//! Path cache system - keeps each entity's `PathfindingState` fresh

use std::collections::{BTreeMap, HashSet};

use delve_logic::grid::{Delta, Point};
use delve_logic::path_cache::{escalate_for_congestion, PathfindingState};
use delve_logic::path_strategy::PathStrategy;
use delve_logic::pathfinding::{is_path_valid, Pathfinder, PathfindingConfig};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::components::{Corpse, Position, Viewshed};
use crate::world::{EntityId, GameWorld, WorldGrid};

/// Refresh `entity`'s cached path toward `target`, recomputing only when a
/// trigger fires. Creates the cache on first use. Returns whether the cache
/// holds a usable path afterwards.
pub fn update_pathfinding(
    world: &mut GameWorld,
    pathfinder: &Pathfinder,
    entity: EntityId,
    target: Point,
    strategy: PathStrategy,
    now: u64,
) -> bool {
    let Some(position) = world.position(entity) else {
        debug!("{} has no position, skipping path update", entity);
        return false;
    };
    let config = pathfinder.config();
    let mut state = world
        .get::<PathfindingState>(entity)
        .unwrap_or_else(|| PathfindingState::with_max_length(config.max_path_length));
    if !state.enabled {
        return false;
    }
    state.advance_to(position);

    let crowding = congestion_around(world, entity, position, target, config);
    let strategy = escalate_for_congestion(strategy, crowding, config);

    {
        let grid = search_grid(world, entity, strategy);
        let walkable = is_path_valid(&grid, &state.path);
        if let Some(reason) =
            state.recompute_reason(position, target, strategy, now, walkable, config)
        {
            debug!(
                "{} repaths {} -> {} ({:?}, {})",
                entity, position, target, reason, strategy
            );
            match pathfinder.find_path(&grid, position, target, strategy) {
                Some(path) => state.store(path, target, strategy, now),
                None => state.invalidate(target, strategy, now),
            }
        }
    }

    let valid = state.valid;
    world.set(entity, state);
    valid
}

/// Grid for `entity`'s search. Stealthy routes hide from the player's view.
fn search_grid<'a>(
    world: &'a GameWorld,
    entity: EntityId,
    strategy: PathStrategy,
) -> WorldGrid<'a> {
    let grid = WorldGrid::new(world, Some(entity));
    if strategy != PathStrategy::Stealthy {
        return grid;
    }
    let observed = world
        .player()
        .filter(|&p| p != entity)
        .and_then(|p| world.get::<Viewshed>(p))
        .map(|v| v.visible)
        .unwrap_or_default();
    grid.with_observed(observed)
}

/// Other path followers near `position` whose target lies near `target`.
fn congestion_around(
    world: &GameWorld,
    entity: EntityId,
    position: Point,
    target: Point,
    config: &PathfindingConfig,
) -> usize {
    world
        .ecs()
        .query::<(&Position, &PathfindingState)>()
        .without::<&Corpse>()
        .iter()
        .filter(|(e, _)| EntityId::from(*e) != entity)
        .filter(|(_, (pos, state))| {
            pos.point().manhattan(position) <= config.group_search_radius
                && state
                    .target
                    .is_some_and(|t| t.manhattan(target) <= config.group_target_radius)
        })
        .count()
}

/// Next step along the cached path, or zero if there is none.
pub fn pathfinding_move(world: &GameWorld, entity: EntityId) -> Delta {
    match (
        world.position(entity),
        world.get::<PathfindingState>(entity),
    ) {
        (Some(position), Some(state)) => state.next_step(position),
        _ => Delta::ZERO,
    }
}

/// Every cached path, in entity order.
pub fn path_dump(world: &GameWorld) -> Vec<(EntityId, Vec<Point>)> {
    let mut dump: Vec<(EntityId, Vec<Point>)> = world
        .ecs()
        .query::<&PathfindingState>()
        .iter()
        .map(|(e, state)| (EntityId::from(e), state.path.clone()))
        .collect();
    dump.sort_by_key(|(id, _)| *id);
    dump
}

/// How many caches use each strategy, keyed by strategy name.
pub fn strategy_distribution(world: &GameWorld) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for (_, state) in world.ecs().query::<&PathfindingState>().iter() {
        *counts.entry(state.strategy.name().to_string()).or_insert(0) += 1;
    }
    counts
}

/// Mean remaining steps over valid cached paths. Zero when there are none.
pub fn average_path_length(world: &GameWorld) -> f64 {
    let lengths: Vec<usize> = world
        .ecs()
        .query::<&PathfindingState>()
        .iter()
        .filter(|(_, s)| s.valid)
        .map(|(_, s)| s.remaining_steps())
        .collect();
    if lengths.is_empty() {
        return 0.0;
    }
    lengths.iter().sum::<usize>() as f64 / lengths.len() as f64
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathfindingStats {
    pub tracked: usize,
    pub valid: usize,
    pub average_path_length: f64,
    pub strategies: BTreeMap<String, usize>,
    pub debug: bool,
    pub recent_searches: usize,
    pub failed_searches: usize,
}

pub fn pathfinding_stats(world: &GameWorld, pathfinder: &Pathfinder) -> PathfindingStats {
    let mut tracked = 0;
    let mut valid = 0;
    for (_, state) in world.ecs().query::<&PathfindingState>().iter() {
        tracked += 1;
        if state.valid {
            valid += 1;
        }
    }
    let traces = pathfinder.recent_traces();
    PathfindingStats {
        tracked,
        valid,
        average_path_length: average_path_length(world),
        strategies: strategy_distribution(world),
        debug: pathfinder.is_debug(),
        recent_searches: traces.len(),
        failed_searches: traces.iter().filter(|t| t.path_len.is_none()).count(),
    }
}

/// Cells of every valid cached path, for overlay rendering.
pub fn path_cells(world: &GameWorld) -> HashSet<Point> {
    world
        .ecs()
        .query::<&PathfindingState>()
        .iter()
        .filter(|(_, s)| s.valid)
        .flat_map(|(_, s)| s.path.clone())
        .collect()
}
