//! Queued actions and their execution against the world.
//!
//! Movement collision lives entirely in [`execute_action`]: a step into a
//! hostile, health-bearing blocker becomes a melee attack, a step into any
//! other blocker fails. There is no separate collision check.

use delve_logic::constants::{combat, costs};
use delve_logic::grid::{Delta, Point};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::components::{
    AiState, Attacker, BlocksMovement, Corpse, Health, Name, PathfindingState, Position, Viewshed,
};
use crate::world::{EntityId, GameWorld};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// One cardinal step.
    Move { dx: i32, dy: i32 },
    Attack { target: EntityId },
    Wait { cost: u64 },
}

impl Action {
    pub fn step(delta: Delta) -> Self {
        Action::Move {
            dx: delta.dx,
            dy: delta.dy,
        }
    }

    pub fn wait() -> Self {
        Action::Wait { cost: costs::WAIT }
    }

    /// Short pause after an attack.
    pub fn recover() -> Self {
        Action::Wait {
            cost: costs::RECOVERY,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::Move { .. } => "move",
            Action::Attack { .. } => "attack",
            Action::Wait { .. } => "wait",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("entity {0} does not exist")]
    MissingEntity(EntityId),
    #[error("entity {0} has no position")]
    NoPosition(EntityId),
    #[error("({dx}, {dy}) is not a single cardinal step")]
    InvalidStep { dx: i32, dy: i32 },
    #[error("{0} is outside the map")]
    OutOfBounds(Point),
    #[error("{0} is not walkable")]
    NotWalkable(Point),
    #[error("{at} is blocked by {by}")]
    Blocked { at: Point, by: EntityId },
    #[error("{0} cannot be attacked")]
    InvalidTarget(EntityId),
    #[error("{0} is out of reach")]
    OutOfReach(EntityId),
}

/// Only the player and non-players fight each other.
pub fn is_hostile(world: &GameWorld, a: EntityId, b: EntityId) -> bool {
    a != b && world.is_player(a) != world.is_player(b)
}

/// Execute `action` for `entity`, returning the game-time cost.
pub fn execute_action(
    world: &mut GameWorld,
    entity: EntityId,
    action: Action,
) -> Result<u64, ActionError> {
    if !world.entity_exists(entity) {
        return Err(ActionError::MissingEntity(entity));
    }
    match action {
        Action::Move { dx, dy } => move_or_bump(world, entity, Delta::new(dx, dy)),
        Action::Attack { target } => attack(world, entity, target),
        Action::Wait { cost } => Ok(cost),
    }
}

fn move_or_bump(world: &mut GameWorld, entity: EntityId, delta: Delta) -> Result<u64, ActionError> {
    let from = world
        .position(entity)
        .ok_or(ActionError::NoPosition(entity))?;
    if !delta.is_cardinal_step() {
        return Err(ActionError::InvalidStep {
            dx: delta.dx,
            dy: delta.dy,
        });
    }
    let to = from + delta;
    if !world.in_bounds(to) {
        return Err(ActionError::OutOfBounds(to));
    }
    if !world.is_walkable(to) {
        return Err(ActionError::NotWalkable(to));
    }

    if let Some(other) = world.blocker_at(to).filter(|&o| o != entity) {
        if is_hostile(world, entity, other) && world.has::<Health>(other) {
            return attack(world, entity, other);
        }
        return Err(ActionError::Blocked { at: to, by: other });
    }

    world.set(entity, Position::from(to));
    world.update::<Viewshed, _>(entity, |v| v.dirty = true);
    Ok(costs::MOVE)
}

fn attack(world: &mut GameWorld, attacker: EntityId, target: EntityId) -> Result<u64, ActionError> {
    if attacker == target || !world.has::<Health>(target) || !world.is_alive(target) {
        return Err(ActionError::InvalidTarget(target));
    }
    let from = world
        .position(attacker)
        .ok_or(ActionError::NoPosition(attacker))?;
    let at = world
        .position(target)
        .ok_or(ActionError::InvalidTarget(target))?;
    if !from.is_adjacent(at) {
        return Err(ActionError::OutOfReach(target));
    }

    let damage = world
        .get::<Attacker>(attacker)
        .map_or(combat::UNARMED_DAMAGE, |a| a.damage);
    let fatal = world
        .update::<Health, _>(target, |h| h.take_damage(damage))
        .unwrap_or(false);
    debug!("{} hits {} for {}", label(world, attacker), label(world, target), damage);

    if fatal {
        kill(world, target);
    }
    Ok(costs::ATTACK)
}

/// Turn `entity` into a corpse: it stops blocking, never acts again, and
/// loses its AI and path caches.
pub fn kill(world: &mut GameWorld, entity: EntityId) {
    info!("{} dies", label(world, entity));
    world.set(entity, Corpse);
    world.remove::<BlocksMovement>(entity);
    world.remove::<AiState>(entity);
    world.remove::<PathfindingState>(entity);
    world.clear_actions(entity);
}

pub(crate) fn label(world: &GameWorld, entity: EntityId) -> String {
    world
        .get::<Name>(entity)
        .map_or_else(|| entity.to_string(), |n| n.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Actor, AiControlled};
    use crate::map::GameMap;
    use delve_logic::behavior::Archetype;

    fn arena() -> (GameWorld, EntityId) {
        let mut world = GameWorld::new(GameMap::bordered_room(7, 7));
        let player = world.spawn((
            Position::new(2, 2),
            Actor::new(),
            Health::new(10),
            Attacker { damage: 3 },
            BlocksMovement,
        ));
        world.set_player(player);
        (world, player)
    }

    fn monster(world: &mut GameWorld, at: Point, hp: i32) -> EntityId {
        world.spawn((
            Position::from(at),
            Actor::new(),
            Health::new(hp),
            BlocksMovement,
            AiControlled,
        ))
    }

    #[test]
    fn test_move_into_floor() {
        let (mut world, player) = arena();
        assert_eq!(
            execute_action(&mut world, player, Action::Move { dx: 1, dy: 0 }),
            Ok(costs::MOVE)
        );
        assert_eq!(world.position(player), Some(Point::new(3, 2)));
    }

    #[test]
    fn test_move_into_wall_fails() {
        let (mut world, player) = arena();
        world.set(player, Position::new(1, 1));
        assert_eq!(
            execute_action(&mut world, player, Action::Move { dx: -1, dy: 0 }),
            Err(ActionError::NotWalkable(Point::new(0, 1)))
        );
        assert_eq!(world.position(player), Some(Point::new(1, 1)));
    }

    #[test]
    fn test_diagonal_move_rejected() {
        let (mut world, player) = arena();
        assert_eq!(
            execute_action(&mut world, player, Action::Move { dx: 1, dy: 1 }),
            Err(ActionError::InvalidStep { dx: 1, dy: 1 })
        );
    }

    #[test]
    fn test_bump_into_hostile_attacks() {
        let (mut world, player) = arena();
        let orc = monster(&mut world, Point::new(3, 2), 5);
        assert_eq!(
            execute_action(&mut world, player, Action::Move { dx: 1, dy: 0 }),
            Ok(costs::ATTACK)
        );
        assert_eq!(world.position(player), Some(Point::new(2, 2)));
        assert_eq!(world.get::<Health>(orc).map(|h| h.current), Some(2));
    }

    #[test]
    fn test_bump_into_friendly_blocks() {
        let (mut world, _) = arena();
        let a = monster(&mut world, Point::new(4, 4), 5);
        let b = monster(&mut world, Point::new(5, 4), 5);
        assert_eq!(
            execute_action(&mut world, a, Action::Move { dx: 1, dy: 0 }),
            Err(ActionError::Blocked {
                at: Point::new(5, 4),
                by: b
            })
        );
    }

    #[test]
    fn test_killing_blow_leaves_corpse() {
        let (mut world, player) = arena();
        let rat = monster(&mut world, Point::new(2, 3), 3);
        world.add_action(rat, Action::wait());
        assert_eq!(
            execute_action(&mut world, player, Action::Attack { target: rat }),
            Ok(costs::ATTACK)
        );
        assert!(world.has::<Corpse>(rat));
        assert!(!world.has::<BlocksMovement>(rat));
        assert!(world.peek_next_action(rat).is_none());
        assert!(!world.is_alive(rat));

        // The cell is free again.
        assert_eq!(
            execute_action(&mut world, player, Action::Move { dx: 0, dy: 1 }),
            Ok(costs::MOVE)
        );
        assert_eq!(
            execute_action(&mut world, player, Action::Attack { target: rat }),
            Err(ActionError::InvalidTarget(rat))
        );
    }

    #[test]
    fn test_kill_drops_ai_and_path_caches() {
        let (mut world, _) = arena();
        let orc = monster(&mut world, Point::new(4, 4), 2);
        world.set(orc, AiState::for_archetype(Archetype::Hunter, Point::new(4, 4)));
        world.set(orc, PathfindingState::default());

        kill(&mut world, orc);
        assert!(world.has::<Corpse>(orc));
        assert!(!world.has::<AiState>(orc));
        assert!(!world.has::<PathfindingState>(orc));
    }

    #[test]
    fn test_attack_needs_adjacency() {
        let (mut world, player) = arena();
        let far = monster(&mut world, Point::new(5, 5), 3);
        assert_eq!(
            execute_action(&mut world, player, Action::Attack { target: far }),
            Err(ActionError::OutOfReach(far))
        );
    }

    #[test]
    fn test_unarmed_damage() {
        let (mut world, player) = arena();
        let a = monster(&mut world, Point::new(3, 2), 5);
        execute_action(&mut world, a, Action::Attack { target: player }).unwrap();
        assert_eq!(
            world.get::<Health>(player).map(|h| h.current),
            Some(10 - combat::UNARMED_DAMAGE)
        );
    }

    #[test]
    fn test_missing_entity() {
        let (mut world, _) = arena();
        let ghost = EntityId(u64::MAX);
        assert_eq!(
            execute_action(&mut world, ghost, Action::wait()),
            Err(ActionError::MissingEntity(ghost))
        );
    }
}
