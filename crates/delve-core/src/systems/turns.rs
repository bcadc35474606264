//! Turn loop - pops actors off the turn queue and executes their actions

use delve_logic::constants::{costs, scheduling};
use delve_logic::pathfinding::Pathfinder;
use delve_logic::schedule::TurnQueue;
use log::{debug, info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::actions::{execute_action, label};
use crate::components::{Actor, AiControlled, Corpse};
use crate::fov::refresh_viewshed;
use crate::systems::ai::take_turn;
use crate::world::{EntityId, GameWorld};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnLoopConfig {
    /// Pops per `run_turns` call before control returns to the caller.
    pub max_iterations: u32,
    /// Delay added to a non-player actor whose action failed.
    pub failure_penalty: u64,
}

impl Default for TurnLoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: scheduling::MAX_LOOP_ITERATIONS,
            failure_penalty: costs::FAILURE_PENALTY,
        }
    }
}

/// Why `run_turns` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnOutcome {
    /// The player is up and has nothing queued. Its entry is back in the
    /// queue at its original time.
    AwaitingInput(EntityId),
    QueueEmpty,
    IterationCapReached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnReport {
    pub outcome: TurnOutcome,
    pub iterations: u32,
    pub actions_executed: u32,
    pub failures: u32,
    /// Entries discarded because their entity could no longer act.
    pub dropped: u32,
    pub cleanups: u32,
}

impl TurnReport {
    fn new(outcome: TurnOutcome) -> Self {
        Self {
            outcome,
            iterations: 0,
            actions_executed: 0,
            failures: 0,
            dropped: 0,
            cleanups: 0,
        }
    }
}

/// Exists, can hold actions, and is neither a corpse nor out of health.
pub fn is_valid_turn_actor(world: &GameWorld, entity: EntityId) -> bool {
    world.entity_exists(entity)
        && world.has::<Actor>(entity)
        && !world.has::<Corpse>(entity)
        && world.is_alive(entity)
}

/// Run turns until the player needs input, the queue drains, or the
/// iteration cap is hit.
pub fn run_turns<R: Rng>(
    world: &mut GameWorld,
    scheduler: &mut TurnQueue<EntityId>,
    pathfinder: &Pathfinder,
    rng: &mut R,
    config: &TurnLoopConfig,
) -> TurnReport {
    let mut report = TurnReport::new(TurnOutcome::IterationCapReached);

    while report.iterations < config.max_iterations {
        report.iterations += 1;

        let entity_count = world.entity_count();
        if let Some(metrics) = scheduler.cleanup_dead_entities(entity_count, |id| {
            is_valid_turn_actor(world, id)
        }) {
            report.cleanups += 1;
            info!(
                "turn queue cleanup: removed {} of {} entries in {:?}",
                metrics.removed, metrics.before, metrics.duration
            );
        }

        let Some(entry) = scheduler.next() else {
            report.outcome = TurnOutcome::QueueEmpty;
            break;
        };
        let entity = entry.entity;

        if !is_valid_turn_actor(world, entity) {
            debug!("dropping {} from the turn queue", entity);
            report.dropped += 1;
            continue;
        }

        if world.peek_next_action(entity).is_none() {
            if world.is_player(entity) {
                scheduler.add(entity, entry.time);
                report.outcome = TurnOutcome::AwaitingInput(entity);
                break;
            }
            if world.has::<AiControlled>(entity) {
                take_turn(world, pathfinder, entity, entry.time, rng);
            }
            if world.peek_next_action(entity).is_none() {
                scheduler.add(entity, entry.time);
                continue;
            }
        }

        let Some(action) = world.next_action(entity) else {
            scheduler.add(entity, entry.time);
            continue;
        };
        match execute_action(world, entity, action) {
            Ok(cost) => {
                report.actions_executed += 1;
                let next = entry.time.saturating_add(cost);
                scheduler.advance_time(next);
                scheduler.add(entity, next);
                refresh_viewshed(world, entity);
            }
            Err(err) => {
                report.failures += 1;
                warn!("{} failed to {}: {}", label(world, entity), action.name(), err);
                let retry = if world.is_player(entity) {
                    entry.time
                } else {
                    entry.time.saturating_add(config.failure_penalty)
                };
                scheduler.add(entity, retry);
            }
        }
    }

    report
}
