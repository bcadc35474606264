//! World query surface.
//!
//! [`GameWorld`] wraps the hecs `World` together with the tile map and the
//! player designation. Systems go through its typed accessors instead of
//! touching hecs directly, and mutate components through
//! [`GameWorld::update`], which writes back in place so no mutation can be
//! lost to a forgotten `set`.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use delve_logic::grid::Point;
use delve_logic::pathfinding::GridMap;
use hecs::{Component, DynamicBundle, Entity, World};
use serde::{Deserialize, Serialize};

use crate::actions::Action;
use crate::components::{Actor, BlocksMovement, Corpse, Health, Player, Position};
use crate::map::GameMap;

/// Stable, ordered handle for an entity. Ties in the turn queue are broken
/// by this value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct EntityId(pub u64);

impl EntityId {
    /// The hecs handle, if these bits can name one.
    pub fn entity(self) -> Option<Entity> {
        Entity::from_bits(self.0)
    }
}

impl From<Entity> for EntityId {
    fn from(entity: Entity) -> Self {
        Self(entity.to_bits().get())
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub struct GameWorld {
    world: World,
    map: GameMap,
    player: Option<EntityId>,
}

impl GameWorld {
    pub fn new(map: GameMap) -> Self {
        Self {
            world: World::new(),
            map,
            player: None,
        }
    }

    pub fn map(&self) -> &GameMap {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut GameMap {
        &mut self.map
    }

    /// Read-only access to the ECS for queries.
    pub fn ecs(&self) -> &World {
        &self.world
    }

    pub fn spawn(&mut self, components: impl DynamicBundle) -> EntityId {
        EntityId::from(self.world.spawn(components))
    }

    pub fn despawn(&mut self, id: EntityId) -> bool {
        let removed = id
            .entity()
            .map(|e| self.world.despawn(e).is_ok())
            .unwrap_or(false);
        if removed && self.player == Some(id) {
            self.player = None;
        }
        removed
    }

    pub fn entity_count(&self) -> usize {
        self.world.len() as usize
    }

    pub fn entity_exists(&self, id: EntityId) -> bool {
        id.entity().is_some_and(|e| self.world.contains(e))
    }

    pub fn has<T: Component>(&self, id: EntityId) -> bool {
        id.entity()
            .and_then(|e| self.world.entity(e).ok())
            .is_some_and(|r| r.has::<T>())
    }

    /// Copy of a component.
    pub fn get<T: Component + Clone>(&self, id: EntityId) -> Option<T> {
        let entity = id.entity()?;
        let component = self.world.get::<&T>(entity).ok()?;
        Some((*component).clone())
    }

    /// Insert or replace a component. False if the entity is gone.
    pub fn set<T: Component>(&mut self, id: EntityId, component: T) -> bool {
        id.entity()
            .map(|e| self.world.insert_one(e, component).is_ok())
            .unwrap_or(false)
    }

    pub fn remove<T: Component>(&mut self, id: EntityId) -> Option<T> {
        let entity = id.entity()?;
        self.world.remove_one::<T>(entity).ok()
    }

    /// Mutate a component in place. `None` if the entity or component is
    /// missing, in which case `f` is not called.
    pub fn update<T: Component, R>(
        &mut self,
        id: EntityId,
        f: impl FnOnce(&mut T) -> R,
    ) -> Option<R> {
        let entity = id.entity()?;
        let mut component = self.world.get::<&mut T>(entity).ok()?;
        Some(f(&mut *component))
    }

    pub fn position(&self, id: EntityId) -> Option<Point> {
        self.get::<Position>(id).map(|p| p.point())
    }

    /// Entities standing on `p`, in id order.
    pub fn entities_at(&self, p: Point) -> Vec<EntityId> {
        let mut found: Vec<EntityId> = self
            .world
            .query::<&Position>()
            .iter()
            .filter(|(_, pos)| pos.point() == p)
            .map(|(e, _)| EntityId::from(e))
            .collect();
        found.sort();
        found
    }

    /// The movement-blocking entity on `p`, if any.
    pub fn blocker_at(&self, p: Point) -> Option<EntityId> {
        let mut blockers: Vec<EntityId> = self
            .world
            .query::<(&Position, &BlocksMovement)>()
            .without::<&Corpse>()
            .iter()
            .filter(|(_, (pos, _))| pos.point() == p)
            .map(|(e, _)| EntityId::from(e))
            .collect();
        blockers.sort();
        blockers.first().copied()
    }

    /// Cells currently held by movement blockers, optionally ignoring one.
    pub fn blocked_cells(&self, except: Option<EntityId>) -> HashSet<Point> {
        self.world
            .query::<(&Position, &BlocksMovement)>()
            .without::<&Corpse>()
            .iter()
            .filter(|(e, _)| Some(EntityId::from(*e)) != except)
            .map(|(_, (pos, _))| pos.point())
            .collect()
    }

    pub fn in_bounds(&self, p: Point) -> bool {
        self.map.in_bounds(p)
    }

    pub fn is_walkable(&self, p: Point) -> bool {
        self.map.is_walkable(p)
    }

    pub fn is_opaque(&self, p: Point) -> bool {
        self.map.is_opaque(p)
    }

    /// Exists, is not a corpse, and has health left if it has health at all.
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.entity_exists(id)
            && !self.has::<Corpse>(id)
            && self
                .get::<Health>(id)
                .map_or(true, |h| !h.is_exhausted())
    }

    pub fn peek_next_action(&self, id: EntityId) -> Option<Action> {
        let entity = id.entity()?;
        let actor = self.world.get::<&Actor>(entity).ok()?;
        actor.peek().cloned()
    }

    pub fn next_action(&mut self, id: EntityId) -> Option<Action> {
        self.update::<Actor, _>(id, Actor::pop).flatten()
    }

    /// Queue an action. False if the entity has no actor capability.
    pub fn add_action(&mut self, id: EntityId, action: Action) -> bool {
        self.update::<Actor, _>(id, |actor| actor.push(action))
            .is_some()
    }

    pub fn clear_actions(&mut self, id: EntityId) {
        self.update::<Actor, _>(id, Actor::clear);
    }

    pub fn player(&self) -> Option<EntityId> {
        self.player.filter(|&id| self.entity_exists(id))
    }

    /// Designate `id` as the player, tagging it with [`Player`].
    pub fn set_player(&mut self, id: EntityId) -> bool {
        if !self.set(id, Player) {
            return false;
        }
        if let Some(previous) = self.player.filter(|&p| p != id) {
            self.remove::<Player>(previous);
        }
        self.player = Some(id);
        true
    }

    pub fn is_player(&self, id: EntityId) -> bool {
        self.player == Some(id)
    }
}

/// Thread-shareable world handle. A poisoned lock is recovered, not
/// propagated.
#[derive(Clone)]
pub struct SharedWorld(Arc<RwLock<GameWorld>>);

impl SharedWorld {
    pub fn new(world: GameWorld) -> Self {
        Self(Arc::new(RwLock::new(world)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, GameWorld> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, GameWorld> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// [`GridMap`] view of the world for one search: occupancy excludes the
/// searcher, and observation is an optional observer's visible set.
pub struct WorldGrid<'a> {
    map: &'a GameMap,
    occupied: HashSet<Point>,
    observed: HashSet<Point>,
}

impl<'a> WorldGrid<'a> {
    pub fn new(world: &'a GameWorld, searcher: Option<EntityId>) -> Self {
        Self {
            map: world.map(),
            occupied: world.blocked_cells(searcher),
            observed: HashSet::new(),
        }
    }

    pub fn with_observed(mut self, observed: HashSet<Point>) -> Self {
        self.observed = observed;
        self
    }
}

impl GridMap for WorldGrid<'_> {
    fn in_bounds(&self, p: Point) -> bool {
        self.map.in_bounds(p)
    }

    fn is_walkable(&self, p: Point) -> bool {
        self.map.is_walkable(p)
    }

    fn is_occupied(&self, p: Point) -> bool {
        self.occupied.contains(&p)
    }

    fn is_observed(&self, p: Point) -> bool {
        self.observed.contains(&p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Name;

    fn world() -> GameWorld {
        GameWorld::new(GameMap::bordered_room(8, 8))
    }

    #[test]
    fn test_entity_id_roundtrip() {
        let mut w = world();
        let id = w.spawn((Position::new(1, 1),));
        assert_eq!(id.entity().map(EntityId::from), Some(id));
        assert!(w.entity_exists(id));
        assert!(w.despawn(id));
        assert!(!w.entity_exists(id));
        assert!(!w.entity_exists(EntityId(0)));
    }

    #[test]
    fn test_update_writes_back() {
        let mut w = world();
        let id = w.spawn((Health::new(10),));
        let fatal = w.update::<Health, _>(id, |h| h.take_damage(4));
        assert_eq!(fatal, Some(false));
        assert_eq!(w.get::<Health>(id).map(|h| h.current), Some(6));
        assert_eq!(w.update::<Name, _>(id, |_| ()), None);
    }

    #[test]
    fn test_spatial_queries() {
        let mut w = world();
        let a = w.spawn((Position::new(2, 2), BlocksMovement));
        let b = w.spawn((Position::new(2, 2), Name::new("item")));
        let dead = w.spawn((Position::new(3, 3), BlocksMovement, Corpse));

        assert_eq!(w.entities_at(Point::new(2, 2)), vec![a, b]);
        assert_eq!(w.blocker_at(Point::new(2, 2)), Some(a));
        assert_eq!(w.blocker_at(Point::new(3, 3)), None);
        assert!(w.blocked_cells(Some(a)).is_empty());
        assert!(!w.is_alive(dead));
    }

    #[test]
    fn test_action_queue_surface() {
        let mut w = world();
        let id = w.spawn((Actor::new(),));
        assert!(w.peek_next_action(id).is_none());
        assert!(w.add_action(id, Action::Wait { cost: 100 }));
        assert!(w.add_action(id, Action::Move { dx: 1, dy: 0 }));
        assert_eq!(w.peek_next_action(id), Some(Action::Wait { cost: 100 }));
        assert_eq!(w.next_action(id), Some(Action::Wait { cost: 100 }));
        assert_eq!(w.next_action(id), Some(Action::Move { dx: 1, dy: 0 }));
        assert_eq!(w.next_action(id), None);

        let no_actor = w.spawn((Position::new(1, 1),));
        assert!(!w.add_action(no_actor, Action::Wait { cost: 100 }));
    }

    #[test]
    fn test_player_designation() {
        let mut w = world();
        let first = w.spawn((Actor::new(),));
        let second = w.spawn((Actor::new(),));
        assert!(w.set_player(first));
        assert!(w.has::<Player>(first));
        assert!(w.set_player(second));
        assert!(!w.has::<Player>(first));
        assert_eq!(w.player(), Some(second));
        w.despawn(second);
        assert_eq!(w.player(), None);
    }

    #[test]
    fn test_world_grid_ignores_searcher() {
        let mut w = world();
        let me = w.spawn((Position::new(2, 2), BlocksMovement));
        w.spawn((Position::new(4, 4), BlocksMovement));
        let grid = WorldGrid::new(&w, Some(me));
        assert!(!grid.is_occupied(Point::new(2, 2)));
        assert!(grid.is_occupied(Point::new(4, 4)));
        assert!(grid.is_passable(Point::new(4, 4)));
        assert!(!grid.is_passable(Point::new(0, 0)));
    }

    #[test]
    fn test_shared_world_survives_poison() {
        let shared = SharedWorld::new(world());
        let clone = shared.clone();
        let _ = std::thread::spawn(move || {
            let _guard = clone.write();
            panic!("poison the lock");
        })
        .join();
        assert_eq!(shared.read().entity_count(), 0);
        shared.write().spawn((Position::new(1, 1),));
        assert_eq!(shared.read().entity_count(), 1);
    }
}
