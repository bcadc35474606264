//! Simulation engine - main entry point for running the dungeon

use std::io::{Read, Write};

use delve_logic::behavior::{AiState, Archetype};
use delve_logic::constants::behavior::DEFAULT_SIGHT_RADIUS;
use delve_logic::grid::Point;
use delve_logic::pathfinding::Pathfinder;
use delve_logic::schedule::{CleanupMetrics, TurnQueue};
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::actions::Action;
use crate::components::*;
use crate::config::EngineConfig;
use crate::fov::refresh_viewshed;
use crate::map::GameMap;
use crate::persistence::{load_schedule, save_schedule, SaveError};
use crate::systems::{
    is_valid_turn_actor, pathfinding_stats, run_turns, PathfindingStats, TurnReport,
};
use crate::world::{EntityId, GameWorld, SharedWorld};

/// Main simulation engine
pub struct SimulationEngine {
    world: SharedWorld,
    scheduler: TurnQueue<EntityId>,
    pathfinder: Pathfinder,
    rng: StdRng,
    config: EngineConfig,
    last_report: Option<TurnReport>,
}

/// Point-in-time summary for debugging and the harness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStats {
    pub time: u64,
    pub entities: usize,
    pub queued: usize,
    pub living_monsters: usize,
    pub player_alive: bool,
    pub total_cleanups: u64,
    pub total_removed: u64,
    pub last_report: Option<TurnReport>,
    pub pathfinding: PathfindingStats,
}

impl SimulationEngine {
    pub fn new(map: GameMap, config: EngineConfig) -> Self {
        let pathfinder =
            Pathfinder::new(config.pathfinding.clone()).with_debug(config.debug_pathfinding);
        Self {
            world: SharedWorld::new(GameWorld::new(map)),
            scheduler: TurnQueue::with_config(config.scheduler.clone()),
            pathfinder,
            rng: StdRng::seed_from_u64(config.seed),
            config,
            last_report: None,
        }
    }

    /// Shared handle to the world, for observers on other threads.
    pub fn world(&self) -> &SharedWorld {
        &self.world
    }

    pub fn scheduler(&self) -> &TurnQueue<EntityId> {
        &self.scheduler
    }

    pub fn pathfinder(&self) -> &Pathfinder {
        &self.pathfinder
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn time(&self) -> u64 {
        self.scheduler.current_time()
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.pathfinder.set_debug(debug);
    }

    /// Spawn the player and give it the first turn slot at the current time.
    pub fn spawn_player(&mut self, at: Point, hp: i32) -> EntityId {
        let mut world = self.world.write();
        let id = world.spawn((
            Position::from(at),
            Actor::new(),
            Health::new(hp),
            Attacker { damage: 2 },
            BlocksMovement,
            Viewshed::new(DEFAULT_SIGHT_RADIUS),
            Name::new("player"),
        ));
        world.set_player(id);
        refresh_viewshed(&mut world, id);
        self.scheduler.add(id, self.scheduler.current_time());
        info!("player spawned at {}", at);
        id
    }

    /// Spawn an AI monster driven by `archetype`'s state machine.
    pub fn spawn_monster(
        &mut self,
        at: Point,
        archetype: Archetype,
        name: &str,
        hp: i32,
        damage: i32,
    ) -> EntityId {
        let id = self.world.write().spawn((
            Position::from(at),
            Actor::new(),
            Health::new(hp),
            Attacker { damage },
            BlocksMovement,
            AiControlled,
            Viewshed::new(DEFAULT_SIGHT_RADIUS),
            Name::new(name),
            AiState::for_archetype(archetype, at),
        ));
        self.scheduler.add(id, self.scheduler.current_time());
        id
    }

    /// Spawn a monster with no state machine; it runs the fallback policy.
    pub fn spawn_simple_monster(&mut self, at: Point, name: &str, hp: i32) -> EntityId {
        let id = self.world.write().spawn((
            Position::from(at),
            Actor::new(),
            Health::new(hp),
            BlocksMovement,
            AiControlled,
            Name::new(name),
        ));
        self.scheduler.add(id, self.scheduler.current_time());
        id
    }

    /// Gated dead-entry sweep of the turn queue. `None` when the adaptive
    /// threshold has not been reached yet.
    pub fn cleanup_dead_entities(&mut self) -> Option<CleanupMetrics> {
        let world = self.world.read();
        let entity_count = world.entity_count();
        let metrics = self
            .scheduler
            .cleanup_dead_entities(entity_count, |id| is_valid_turn_actor(&world, id))?;
        info!(
            "turn queue cleanup: removed {} of {} entries in {:?}",
            metrics.removed, metrics.before, metrics.duration
        );
        Some(metrics)
    }

    /// Sweep the turn queue now, ignoring the threshold.
    pub fn force_cleanup(&mut self) -> CleanupMetrics {
        let world = self.world.read();
        self.scheduler
            .force_cleanup(|id| is_valid_turn_actor(&world, id))
    }

    /// Schedule `id` at `time`. False if it cannot take turns.
    pub fn schedule(&mut self, id: EntityId, time: u64) -> bool {
        if !is_valid_turn_actor(&self.world.read(), id) {
            return false;
        }
        self.scheduler.add(id, time);
        true
    }

    /// Drop every turn entry for `id`. Returns how many were removed.
    pub fn deschedule(&mut self, id: EntityId) -> usize {
        self.scheduler.remove(id)
    }

    /// Queue an action for the player. False if there is no living player.
    pub fn queue_player_action(&mut self, action: Action) -> bool {
        let mut world = self.world.write();
        let player = world.player().filter(|&p| world.is_alive(p));
        match player {
            Some(player) => world.add_action(player, action),
            None => false,
        }
    }

    /// One invocation of the turn loop.
    pub fn run(&mut self) -> TurnReport {
        let mut world = self.world.write();
        let report = run_turns(
            &mut world,
            &mut self.scheduler,
            &self.pathfinder,
            &mut self.rng,
            &self.config.turn_loop,
        );
        self.last_report = Some(report);
        report
    }

    pub fn snapshot_stats(&self) -> EngineStats {
        let world = self.world.read();
        let player_alive = world.player().is_some_and(|p| world.is_alive(p));
        let living_monsters = world
            .ecs()
            .query::<&AiControlled>()
            .without::<&Corpse>()
            .iter()
            .count();
        EngineStats {
            time: self.scheduler.current_time(),
            entities: world.entity_count(),
            queued: self.scheduler.len(),
            living_monsters,
            player_alive,
            total_cleanups: self.scheduler.total_cleanups(),
            total_removed: self.scheduler.total_removed(),
            last_report: self.last_report,
            pathfinding: pathfinding_stats(&world, &self.pathfinder),
        }
    }

    /// Save the turn schedule to a writer
    pub fn save_schedule<W: Write>(&self, writer: W) -> Result<(), SaveError> {
        save_schedule(writer, &self.scheduler)
    }

    /// Replace the turn schedule with one read from `reader`
    pub fn load_schedule<R: Read>(&mut self, reader: R) -> Result<(), SaveError> {
        let snapshot = load_schedule(reader)?;
        self.scheduler.restore(snapshot);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::TurnOutcome;

    fn new_engine() -> SimulationEngine {
        SimulationEngine::new(GameMap::bordered_room(20, 12), EngineConfig::default())
    }

    #[test]
    fn test_player_turn_awaits_input() {
        let mut engine = new_engine();
        let player = engine.spawn_player(Point::new(2, 2), 20);
        assert_eq!(engine.run().outcome, TurnOutcome::AwaitingInput(player));

        assert!(engine.queue_player_action(Action::Move { dx: 1, dy: 0 }));
        let report = engine.run();
        assert_eq!(report.actions_executed, 1);
        assert_eq!(report.outcome, TurnOutcome::AwaitingInput(player));
        assert_eq!(engine.time(), 100);
        assert_eq!(engine.world().read().position(player), Some(Point::new(3, 2)));
    }

    #[test]
    fn test_monsters_act_between_player_turns() {
        let mut engine = new_engine();
        engine.spawn_player(Point::new(2, 2), 20);
        let orc = engine.spawn_monster(Point::new(8, 2), Archetype::Hunter, "orc", 6, 1);

        engine.run();
        engine.queue_player_action(Action::wait());
        engine.run();
        let world = engine.world().read();
        assert_ne!(world.position(orc), Some(Point::new(8, 2)));
        assert_eq!(
            world.get::<AiState>(orc).map(|ai| ai.state),
            Some(delve_logic::behavior::BehaviorState::Chasing)
        );
    }

    #[test]
    fn test_stats_snapshot_serializes() {
        let mut engine = new_engine();
        engine.spawn_player(Point::new(2, 2), 20);
        engine.spawn_monster(Point::new(10, 5), Archetype::Wander, "rat", 3, 1);
        engine.run();
        let stats = engine.snapshot_stats();
        assert_eq!(stats.entities, 2);
        assert_eq!(stats.living_monsters, 1);
        assert!(stats.player_alive);
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"pathfinding\""));
    }

    #[test]
    fn test_schedule_save_and_load() {
        let mut engine = new_engine();
        let player = engine.spawn_player(Point::new(2, 2), 20);
        engine.queue_player_action(Action::wait());
        engine.run();

        let mut buffer = Vec::new();
        engine.save_schedule(&mut buffer).unwrap();
        let mut other = new_engine();
        other.load_schedule(&buffer[..]).unwrap();
        assert_eq!(other.time(), engine.time());
        assert_eq!(other.scheduler().peek().map(|e| e.entity), Some(player));
    }

    #[test]
    fn test_forced_cleanup_drops_dead_entries() {
        let mut engine = new_engine();
        let player = engine.spawn_player(Point::new(2, 2), 20);
        let rat = engine.spawn_monster(Point::new(6, 6), Archetype::Passive, "rat", 3, 1);
        let bat = engine.spawn_monster(Point::new(9, 6), Archetype::Wander, "bat", 3, 1);
        {
            let mut world = engine.world().write();
            crate::actions::kill(&mut world, rat);
            world.despawn(bat);
        }

        let metrics = engine.force_cleanup();
        assert_eq!((metrics.before, metrics.removed), (3, 2));
        assert!(engine.scheduler().contains(player));
        assert!(!engine.scheduler().contains(rat));
        assert_eq!(engine.snapshot_stats().total_removed, 2);
    }

    #[test]
    fn test_gated_cleanup_waits_for_threshold() {
        let mut engine = new_engine();
        let player = engine.spawn_player(Point::new(2, 2), 20);
        let rat = engine.spawn_monster(Point::new(6, 6), Archetype::Passive, "rat", 3, 1);
        crate::actions::kill(&mut engine.world().write(), rat);

        assert!(engine.cleanup_dead_entities().is_none());
        for _ in 0..400 {
            engine.deschedule(player);
            engine.schedule(player, 0);
        }
        let metrics = engine.cleanup_dead_entities().unwrap();
        assert_eq!(metrics.removed, 1);
        assert_eq!(engine.scheduler().len(), 1);
    }

    #[test]
    fn test_schedule_and_deschedule() {
        let mut engine = new_engine();
        let player = engine.spawn_player(Point::new(2, 2), 20);
        assert_eq!(engine.deschedule(player), 1);
        assert_eq!(engine.deschedule(player), 0);
        assert!(engine.scheduler().is_empty());

        assert!(engine.schedule(player, 250));
        assert_eq!(engine.scheduler().peek().map(|e| e.time), Some(250));

        let ghost = engine.spawn_player(Point::new(4, 4), 5);
        engine.world().write().despawn(ghost);
        assert!(!engine.schedule(ghost, 0));
    }

    #[test]
    fn test_no_player_action_without_player() {
        let mut engine = new_engine();
        assert!(!engine.queue_player_action(Action::wait()));
    }
}
