//! AI decision state machine.
//!
//! An [`AiState`] pairs a static [`Archetype`] (what kind of creature this
//! is) with a dynamic [`BehaviorState`] (what it is doing right now). Each
//! turn the host gathers [`Senses`] and asks [`AiState::transition`] for the
//! next state. Transitions are pure: randomness only enters later, when the
//! host turns a state into concrete actions.

use serde::{Deserialize, Serialize};

use crate::constants::behavior::{MAX_MOVE_BATCH, TILES_PER_STEP};
use crate::grid::Point;
use crate::path_strategy::PathStrategy;

/// Static disposition of an AI actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Archetype {
    /// Never pursues; flees when hurt.
    Passive,
    /// Roams near home, chases when provoked.
    Wander,
    /// Holds a small patrol around home.
    Guard,
    /// Long aggro range, persistent search.
    Hunter,
    /// Always runs from a visible threat.
    Fleeing,
    /// Hunts in groups, routing around its packmates.
    Pack,
}

impl Archetype {
    pub fn all() -> &'static [Archetype] {
        &[
            Archetype::Passive,
            Archetype::Wander,
            Archetype::Guard,
            Archetype::Hunter,
            Archetype::Fleeing,
            Archetype::Pack,
        ]
    }

    pub fn name(self) -> &'static str {
        match self {
            Archetype::Passive => "passive",
            Archetype::Wander => "wander",
            Archetype::Guard => "guard",
            Archetype::Hunter => "hunter",
            Archetype::Fleeing => "fleeing",
            Archetype::Pack => "pack",
        }
    }

    /// Whether the archetype's resting state is a patrol rather than idling.
    pub fn patrols(self) -> bool {
        matches!(self, Archetype::Guard | Archetype::Wander)
    }

    /// Route shaping this archetype asks for by default.
    pub fn preferred_strategy(self) -> PathStrategy {
        match self {
            Archetype::Hunter | Archetype::Pack => PathStrategy::AvoidEntities,
            Archetype::Fleeing => PathStrategy::Stealthy,
            Archetype::Passive | Archetype::Wander | Archetype::Guard => PathStrategy::Direct,
        }
    }
}

/// What an AI actor is currently doing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BehaviorState {
    #[default]
    Idle,
    Patrolling,
    Chasing,
    Fleeing,
    Attacking,
    Searching,
}

impl BehaviorState {
    pub fn name(self) -> &'static str {
        match self {
            BehaviorState::Idle => "idle",
            BehaviorState::Patrolling => "patrolling",
            BehaviorState::Chasing => "chasing",
            BehaviorState::Fleeing => "fleeing",
            BehaviorState::Attacking => "attacking",
            BehaviorState::Searching => "searching",
        }
    }

    /// States that request a multi-step move from the pathfinder.
    pub fn is_moving(self) -> bool {
        matches!(
            self,
            BehaviorState::Chasing
                | BehaviorState::Fleeing
                | BehaviorState::Searching
                | BehaviorState::Patrolling
        )
    }
}

impl std::fmt::Display for BehaviorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-entity AI data. Stored on the entity and written back after every
/// decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiState {
    pub archetype: Archetype,
    pub state: BehaviorState,
    pub home: Point,
    pub patrol_radius: u32,
    pub aggro_range: u32,
    /// Health fraction in `[0, 1]` at or below which a visible target
    /// triggers flight.
    pub flee_threshold: f32,
    pub last_known_target: Option<Point>,
    pub search_turns: u32,
    pub max_search_turns: u32,
}

impl AiState {
    /// Preset tuned for `archetype`, starting idle at `home`.
    pub fn for_archetype(archetype: Archetype, home: Point) -> Self {
        let (aggro_range, flee_threshold, patrol_radius, max_search_turns) = match archetype {
            Archetype::Passive => (0, 0.5, 0, 0),
            Archetype::Wander => (5, 0.25, 6, 5),
            Archetype::Guard => (7, 0.0, 3, 8),
            Archetype::Hunter => (12, 0.15, 0, 15),
            Archetype::Fleeing => (0, 1.0, 0, 3),
            Archetype::Pack => (10, 0.3, 4, 10),
        };
        Self {
            archetype,
            state: BehaviorState::Idle,
            home,
            patrol_radius,
            aggro_range,
            flee_threshold,
            last_known_target: None,
            search_turns: 0,
            max_search_turns,
        }
    }

    pub fn with_flee_threshold(mut self, threshold: f32) -> Self {
        self.flee_threshold = clamp_threshold(threshold);
        self
    }

    /// `flee_threshold` forced into `[0, 1]`, whatever was stored.
    pub fn effective_flee_threshold(&self) -> f32 {
        clamp_threshold(self.flee_threshold)
    }

    pub fn with_aggro_range(mut self, range: u32) -> Self {
        self.aggro_range = range;
        self
    }

    /// Next state for the given senses. Pure and deterministic.
    pub fn transition(&self, senses: &Senses) -> Transition {
        let keep = Transition {
            state: self.state,
            search_turns: self.search_turns,
            last_known_target: self.last_known_target,
        };
        let seen = if senses.target_visible {
            senses.target_position
        } else {
            None
        };

        if let (Some(fraction), Some(target)) = (senses.health_fraction, seen) {
            if fraction <= self.effective_flee_threshold() {
                return Transition {
                    state: BehaviorState::Fleeing,
                    last_known_target: Some(target),
                    ..keep
                };
            }
        }

        if senses.target_distance == Some(1) {
            return Transition {
                state: BehaviorState::Attacking,
                last_known_target: senses.target_position.or(keep.last_known_target),
                ..keep
            };
        }

        if let (Some(target), Some(distance)) = (seen, senses.target_distance) {
            if distance <= self.aggro_range {
                return Transition {
                    state: BehaviorState::Chasing,
                    search_turns: 0,
                    last_known_target: Some(target),
                };
            }
        }

        if self.state == BehaviorState::Chasing
            && !senses.target_visible
            && self.last_known_target.is_some()
        {
            return Transition {
                state: BehaviorState::Searching,
                search_turns: 0,
                ..keep
            };
        }

        if self.state == BehaviorState::Searching {
            let search_turns = self.search_turns + 1;
            if search_turns >= self.max_search_turns {
                return Transition {
                    state: BehaviorState::Idle,
                    search_turns: 0,
                    last_known_target: None,
                };
            }
            return Transition {
                search_turns,
                ..keep
            };
        }

        let state = if self.archetype.patrols() {
            BehaviorState::Patrolling
        } else {
            BehaviorState::Idle
        };
        Transition { state, ..keep }
    }

    pub fn apply(&mut self, transition: Transition) {
        self.state = transition.state;
        self.search_turns = transition.search_turns;
        self.last_known_target = transition.last_known_target;
    }

    /// Transition and apply in one go. Returns the new state.
    pub fn step(&mut self, senses: &Senses) -> BehaviorState {
        let transition = self.transition(senses);
        self.apply(transition);
        self.state
    }

    /// Where the current state wants to go, if anywhere.
    pub fn destination(&self, senses: &Senses) -> Option<Point> {
        match self.state {
            BehaviorState::Chasing => senses.target_position.or(self.last_known_target),
            BehaviorState::Searching => self.last_known_target,
            BehaviorState::Patrolling => Some(self.home),
            BehaviorState::Fleeing | BehaviorState::Attacking | BehaviorState::Idle => None,
        }
    }

    /// Route shaping for the current state.
    pub fn route_strategy(&self) -> PathStrategy {
        route_strategy(self.archetype, self.state)
    }
}

/// What an AI actor perceives at the start of its turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Senses {
    pub target_position: Option<Point>,
    pub target_visible: bool,
    pub target_distance: Option<u32>,
    /// `None` when the actor has no meaningful health.
    pub health_fraction: Option<f32>,
}

impl Senses {
    /// Senses for an actor at `from` looking toward `target`.
    pub fn toward(from: Point, target: Point, visible: bool) -> Self {
        Self {
            target_position: Some(target),
            target_visible: visible,
            target_distance: Some(from.manhattan(target)),
            health_fraction: None,
        }
    }

    pub fn with_health(mut self, current: i32, max: i32) -> Self {
        self.health_fraction = health_fraction(current, max);
        self
    }
}

/// NaN counts as zero.
fn clamp_threshold(threshold: f32) -> f32 {
    if threshold.is_nan() {
        0.0
    } else {
        threshold.clamp(0.0, 1.0)
    }
}

/// `current / max`, or `None` when `max` is not positive.
pub fn health_fraction(current: i32, max: i32) -> Option<f32> {
    if max <= 0 {
        return None;
    }
    Some(current.max(0) as f32 / max as f32)
}

/// Result of [`AiState::transition`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub state: BehaviorState,
    pub search_turns: u32,
    pub last_known_target: Option<Point>,
}

/// Steps to queue for a move of `distance` tiles.
pub fn movement_budget(distance: u32) -> u32 {
    (distance / TILES_PER_STEP).clamp(1, MAX_MOVE_BATCH)
}

/// Fleeing always sneaks; otherwise the archetype decides.
pub fn route_strategy(archetype: Archetype, state: BehaviorState) -> PathStrategy {
    if state == BehaviorState::Fleeing {
        PathStrategy::Stealthy
    } else {
        archetype.preferred_strategy()
    }
}

/// Point `distance` tiles from `from`, directly away from `threat`.
/// When standing on the threat, runs east.
pub fn flee_point(from: Point, threat: Point, distance: i32) -> Point {
    let dx = (from.x - threat.x).signum();
    let dy = (from.y - threat.y).signum();
    if dx == 0 && dy == 0 {
        return from.offset(distance, 0);
    }
    from.offset(dx * distance, dy * distance)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visible_at(distance: u32) -> Senses {
        Senses {
            target_position: Some(Point::new(distance as i32, 0)),
            target_visible: true,
            target_distance: Some(distance),
            health_fraction: Some(1.0),
        }
    }

    fn unseen() -> Senses {
        Senses {
            health_fraction: Some(1.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_low_health_flees_regardless_of_state() {
        for &state in &[
            BehaviorState::Idle,
            BehaviorState::Chasing,
            BehaviorState::Attacking,
            BehaviorState::Searching,
        ] {
            let mut ai = AiState::for_archetype(Archetype::Hunter, Point::new(0, 0))
                .with_flee_threshold(0.3);
            ai.state = state;
            let senses = visible_at(4).with_health(20, 100);
            assert_eq!(ai.transition(&senses).state, BehaviorState::Fleeing);
        }
    }

    #[test]
    fn test_flee_requires_visible_target() {
        let ai = AiState::for_archetype(Archetype::Pack, Point::new(0, 0));
        let senses = Senses {
            health_fraction: Some(0.1),
            ..Default::default()
        };
        assert_ne!(ai.transition(&senses).state, BehaviorState::Fleeing);
    }

    #[test]
    fn test_healthless_actor_never_flees() {
        let ai = AiState::for_archetype(Archetype::Fleeing, Point::new(0, 0));
        let senses = Senses::toward(Point::new(0, 0), Point::new(3, 0), true).with_health(0, 0);
        assert_eq!(senses.health_fraction, None);
        assert_ne!(ai.transition(&senses).state, BehaviorState::Fleeing);
    }

    #[test]
    fn test_adjacent_target_is_attacked_even_unseen() {
        let ai = AiState::for_archetype(Archetype::Guard, Point::new(0, 0));
        let senses = Senses {
            target_visible: false,
            ..visible_at(1)
        };
        assert_eq!(ai.transition(&senses).state, BehaviorState::Attacking);
    }

    #[test]
    fn test_chase_within_aggro_range() {
        let mut ai = AiState::for_archetype(Archetype::Wander, Point::new(0, 0));
        ai.search_turns = 3;
        let t = ai.transition(&visible_at(5));
        assert_eq!(t.state, BehaviorState::Chasing);
        assert_eq!(t.search_turns, 0);
        assert_eq!(t.last_known_target, Some(Point::new(5, 0)));

        // Out of range falls through to the patrol default.
        assert_eq!(ai.transition(&visible_at(6)).state, BehaviorState::Patrolling);
    }

    #[test]
    fn test_lost_target_leads_to_search_then_idle() {
        let mut ai = AiState::for_archetype(Archetype::Hunter, Point::new(0, 0));
        ai.step(&visible_at(8));
        assert_eq!(ai.state, BehaviorState::Chasing);

        assert_eq!(ai.step(&unseen()), BehaviorState::Searching);
        assert_eq!(ai.search_turns, 0);
        assert_eq!(ai.last_known_target, Some(Point::new(8, 0)));

        for turn in 1..ai.max_search_turns {
            assert_eq!(ai.step(&unseen()), BehaviorState::Searching);
            assert_eq!(ai.search_turns, turn);
        }
        assert_eq!(ai.step(&unseen()), BehaviorState::Idle);
        assert_eq!(ai.search_turns, 0);
        assert_eq!(ai.last_known_target, None);
    }

    #[test]
    fn test_archetype_defaults() {
        for &archetype in Archetype::all() {
            let ai = AiState::for_archetype(archetype, Point::new(2, 2));
            let expected = if archetype.patrols() {
                BehaviorState::Patrolling
            } else {
                BehaviorState::Idle
            };
            assert_eq!(ai.transition(&unseen()).state, expected, "{:?}", archetype);
            assert!((0.0..=1.0).contains(&ai.flee_threshold));
        }
    }

    #[test]
    fn test_transition_is_deterministic() {
        let ai = AiState::for_archetype(Archetype::Pack, Point::new(1, 1));
        let senses = Senses::toward(Point::new(1, 1), Point::new(5, 4), true).with_health(7, 10);
        let first = ai.transition(&senses);
        for _ in 0..50 {
            assert_eq!(ai.transition(&senses), first);
        }
    }

    #[test]
    fn test_flee_threshold_clamped() {
        let ai = AiState::for_archetype(Archetype::Guard, Point::new(0, 0));
        assert_eq!(ai.clone().with_flee_threshold(1.7).flee_threshold, 1.0);
        assert_eq!(ai.clone().with_flee_threshold(-0.2).flee_threshold, 0.0);
        assert_eq!(ai.with_flee_threshold(f32::NAN).flee_threshold, 0.0);
    }

    #[test]
    fn test_stored_threshold_out_of_range_is_clamped_on_transition() {
        let mut ai = AiState::for_archetype(Archetype::Guard, Point::new(0, 0));
        ai.flee_threshold = 1.7;
        assert_eq!(ai.effective_flee_threshold(), 1.0);
        assert_eq!(ai.transition(&visible_at(4)).state, BehaviorState::Fleeing);

        ai.flee_threshold = f32::NAN;
        assert_eq!(ai.effective_flee_threshold(), 0.0);
        let wounded = visible_at(4).with_health(5, 10);
        assert_ne!(ai.transition(&wounded).state, BehaviorState::Fleeing);
    }

    #[test]
    fn test_loaded_threshold_out_of_range_is_clamped_on_transition() {
        let ai = AiState::for_archetype(Archetype::Hunter, Point::new(0, 0));
        let mut value = serde_json::to_value(&ai).unwrap();
        value["flee_threshold"] = serde_json::json!(-0.5);
        let loaded: AiState = serde_json::from_value(value).unwrap();

        assert_eq!(loaded.effective_flee_threshold(), 0.0);
        let wounded = visible_at(4).with_health(1, 10);
        assert_ne!(loaded.transition(&wounded).state, BehaviorState::Fleeing);
    }

    #[test]
    fn test_movement_budget_bounds() {
        assert_eq!(movement_budget(0), 1);
        assert_eq!(movement_budget(3), 1);
        assert_eq!(movement_budget(8), 2);
        assert_eq!(movement_budget(100), MAX_MOVE_BATCH);
    }

    #[test]
    fn test_route_strategy() {
        assert_eq!(
            route_strategy(Archetype::Guard, BehaviorState::Fleeing),
            PathStrategy::Stealthy
        );
        assert_eq!(
            route_strategy(Archetype::Pack, BehaviorState::Chasing),
            PathStrategy::AvoidEntities
        );
        assert_eq!(
            route_strategy(Archetype::Wander, BehaviorState::Patrolling),
            PathStrategy::Direct
        );
    }

    #[test]
    fn test_flee_point_runs_away() {
        let from = Point::new(5, 5);
        assert_eq!(flee_point(from, Point::new(3, 5), 4), Point::new(9, 5));
        assert_eq!(flee_point(from, Point::new(6, 6), 2), Point::new(3, 3));
        assert_eq!(flee_point(from, from, 3), Point::new(8, 5));
    }

    #[test]
    fn test_destination_per_state() {
        let mut ai = AiState::for_archetype(Archetype::Guard, Point::new(2, 2));
        let senses = visible_at(4);
        ai.state = BehaviorState::Patrolling;
        assert_eq!(ai.destination(&senses), Some(Point::new(2, 2)));
        ai.state = BehaviorState::Chasing;
        assert_eq!(ai.destination(&senses), Some(Point::new(4, 0)));
        ai.state = BehaviorState::Idle;
        assert_eq!(ai.destination(&senses), None);
    }
}
