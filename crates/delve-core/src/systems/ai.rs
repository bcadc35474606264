//! AI driver - turns an actor's behavior state into queued actions
//!
//! Called by the turn loop when an AI-controlled actor comes up with an
//! empty queue. The decision itself (which state to be in) is the pure
//! transition table in `delve_logic::behavior`; this module gathers the
//! senses, writes the new state back, and translates it into actions.

use delve_logic::behavior::{
    flee_point, movement_budget, AiState, Archetype, BehaviorState, Senses,
};
use delve_logic::constants::behavior::{FALLBACK_WAIT_CHANCE, FLEE_DISTANCE, IDLE_WAIT_CHANCE};
use delve_logic::grid::{Delta, Point};
use delve_logic::path_cache::PathfindingState;
use delve_logic::pathfinding::Pathfinder;
use log::{debug, warn};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::actions::{is_hostile, Action};
use crate::components::Health;
use crate::fov::can_see;
use crate::systems::pathing::update_pathfinding;
use crate::world::{EntityId, GameWorld};

/// Decide and queue actions for `entity`. Returns how many were queued.
pub fn take_turn<R: Rng>(
    world: &mut GameWorld,
    pathfinder: &Pathfinder,
    entity: EntityId,
    now: u64,
    rng: &mut R,
) -> usize {
    let Some(position) = world.position(entity) else {
        warn!("{} has no position, waiting", entity);
        return queue(world, entity, vec![Action::wait()]);
    };
    let senses = sense(world, entity, position);

    let Some(mut ai) = world.get::<AiState>(entity) else {
        debug!("{} has no AI state, using fallback policy", entity);
        let actions = fallback_actions(world, entity, position, &senses, rng);
        return queue(world, entity, actions);
    };

    let previous = ai.state;
    let transition = ai.transition(&senses);
    world.update::<AiState, _>(entity, |state| state.apply(transition));
    ai.apply(transition);
    if ai.state != previous {
        debug!("{} {} -> {}", entity, previous, ai.state);
    }

    let actions = match ai.state {
        BehaviorState::Attacking => attack_actions(world, entity, position),
        BehaviorState::Idle => idle_actions(world, &ai, position, rng),
        BehaviorState::Chasing
        | BehaviorState::Fleeing
        | BehaviorState::Searching
        | BehaviorState::Patrolling => {
            match goal_for(world, &ai, position, &senses, rng) {
                Some(goal) if goal != position => {
                    move_actions(world, pathfinder, entity, &ai, position, goal, now)
                }
                _ => vec![Action::wait()],
            }
        }
    };
    queue(world, entity, actions)
}

fn queue(world: &mut GameWorld, entity: EntityId, actions: Vec<Action>) -> usize {
    let mut queued = 0;
    for action in actions {
        if world.add_action(entity, action) {
            queued += 1;
        }
    }
    queued
}

/// Senses toward the player, if there is a living one.
fn sense(world: &GameWorld, entity: EntityId, position: Point) -> Senses {
    let health_fraction = world.get::<Health>(entity).and_then(|h| h.fraction());
    let target = world
        .player()
        .filter(|&p| p != entity && world.is_alive(p))
        .and_then(|p| world.position(p));
    match target {
        Some(at) => Senses {
            target_position: Some(at),
            target_visible: can_see(world, entity, at),
            target_distance: Some(position.manhattan(at)),
            health_fraction,
        },
        None => Senses {
            health_fraction,
            ..Default::default()
        },
    }
}

/// Where a moving state heads this turn.
fn goal_for<R: Rng>(
    world: &GameWorld,
    ai: &AiState,
    position: Point,
    senses: &Senses,
    rng: &mut R,
) -> Option<Point> {
    match ai.state {
        BehaviorState::Fleeing => {
            let threat = senses.target_position.or(ai.last_known_target)?;
            Some(world.map().clamp(flee_point(position, threat, FLEE_DISTANCE)))
        }
        BehaviorState::Patrolling if position.manhattan(ai.home) <= ai.patrol_radius => {
            patrol_step(world, ai, position, rng)
        }
        _ => ai.destination(senses),
    }
}

/// A random walkable neighbour that stays within the patrol radius.
fn patrol_step<R: Rng>(
    world: &GameWorld,
    ai: &AiState,
    position: Point,
    rng: &mut R,
) -> Option<Point> {
    let options: Vec<Point> = open_neighbors(world, position)
        .into_iter()
        .filter(|p| p.manhattan(ai.home) <= ai.patrol_radius)
        .collect();
    options.choose(rng).copied()
}

fn move_actions(
    world: &mut GameWorld,
    pathfinder: &Pathfinder,
    entity: EntityId,
    ai: &AiState,
    position: Point,
    goal: Point,
    now: u64,
) -> Vec<Action> {
    let budget = movement_budget(position.manhattan(goal)) as usize;
    let mut actions = Vec::with_capacity(budget);

    if update_pathfinding(world, pathfinder, entity, goal, ai.route_strategy(), now) {
        if let Some(state) = world.get::<PathfindingState>(entity) {
            let mut at = position;
            for next in state.upcoming(position, budget) {
                actions.push(Action::step(next - at));
                at = next;
            }
        }
    }

    if actions.is_empty() {
        let step = directional_step(world, position, goal);
        if step.is_zero() {
            actions.push(Action::wait());
        } else {
            actions.push(Action::step(step));
        }
    }
    actions
}

/// Straight-line step toward `goal` with no pathfinding: the larger axis
/// first, the other axis if that cell is closed. Zero if neither is open.
pub fn directional_step(world: &GameWorld, from: Point, goal: Point) -> Delta {
    let dx = goal.x - from.x;
    let dy = goal.y - from.y;
    let primary = from.step_toward(goal);
    let secondary = if primary.dx != 0 {
        Delta::new(0, dy.signum())
    } else {
        Delta::new(dx.signum(), 0)
    };
    [primary, secondary]
        .into_iter()
        .filter(|d| !d.is_zero())
        .find(|&d| is_open(world, from + d))
        .unwrap_or(Delta::ZERO)
}

fn is_open(world: &GameWorld, p: Point) -> bool {
    world.is_walkable(p) && world.blocker_at(p).is_none()
}

fn open_neighbors(world: &GameWorld, from: Point) -> Vec<Point> {
    from.cardinal_neighbors()
        .into_iter()
        .filter(|&p| is_open(world, p))
        .collect()
}

/// Attack the first hostile, health-bearing neighbour, then recover.
fn attack_actions(world: &GameWorld, entity: EntityId, position: Point) -> Vec<Action> {
    let target = position.cardinal_neighbors().into_iter().find_map(|p| {
        world.entities_at(p).into_iter().find(|&other| {
            is_hostile(world, entity, other) && world.has::<Health>(other) && world.is_alive(other)
        })
    });
    match target {
        Some(target) => vec![Action::Attack { target }, Action::recover()],
        None => vec![Action::wait()],
    }
}

fn idle_actions<R: Rng>(
    world: &GameWorld,
    ai: &AiState,
    position: Point,
    rng: &mut R,
) -> Vec<Action> {
    if ai.archetype != Archetype::Wander || rng.gen_bool(IDLE_WAIT_CHANCE) {
        return vec![Action::wait()];
    }
    match open_neighbors(world, position).choose(rng) {
        Some(&next) => vec![Action::step(next - position)],
        None => vec![Action::wait()],
    }
}

/// Minimal policy for actors without an `AiState`: attack an adjacent
/// visible target, step toward a visible one, otherwise wander or wait.
fn fallback_actions<R: Rng>(
    world: &GameWorld,
    entity: EntityId,
    position: Point,
    senses: &Senses,
    rng: &mut R,
) -> Vec<Action> {
    if let (true, Some(at)) = (senses.target_visible, senses.target_position) {
        if position.is_adjacent(at) {
            if let Some(attack @ Action::Attack { .. }) =
                attack_actions(world, entity, position).first().copied()
            {
                return vec![attack];
            }
        }
        let step = directional_step(world, position, at);
        if !step.is_zero() {
            return vec![Action::step(step)];
        }
    }

    let options = open_neighbors(world, position);
    if options.is_empty() || rng.gen_bool(FALLBACK_WAIT_CHANCE) {
        return vec![Action::wait()];
    }
    match options.choose(rng) {
        Some(&next) => vec![Action::step(next - position)],
        None => vec![Action::wait()],
    }
}
