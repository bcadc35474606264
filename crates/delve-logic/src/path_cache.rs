//! Per-entity cached path and the policy deciding when to recompute it.

use serde::{Deserialize, Serialize};

use crate::constants::pathing;
use crate::grid::{Delta, Point};
use crate::path_strategy::PathStrategy;
use crate::pathfinding::{next_move, PathfindingConfig};

/// Why a cached path must be recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecomputeReason {
    Empty,
    TargetChanged,
    StrategyChanged,
    Invalidated,
    /// A cell on the path is no longer walkable.
    Blocked,
    IntervalElapsed,
    /// The entity is not standing on its own path.
    OffPath,
    /// The path was truncated and has been walked to its end.
    Exhausted,
    /// The path is much longer than the direct distance.
    Inefficient,
}

/// Cached route for one entity.
///
/// `valid` implies a non-empty path whose cells were walkable when it was
/// stored. Hosts should call [`PathfindingState::advance_to`] with the
/// entity's position before reading from the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathfindingState {
    pub path: Vec<Point>,
    pub target: Option<Point>,
    pub strategy: PathStrategy,
    pub valid: bool,
    pub last_recompute: u64,
    pub max_length: usize,
    pub enabled: bool,
}

impl Default for PathfindingState {
    fn default() -> Self {
        Self {
            path: Vec::new(),
            target: None,
            strategy: PathStrategy::Direct,
            valid: false,
            last_recompute: 0,
            max_length: pathing::MAX_PATH_LENGTH,
            enabled: true,
        }
    }
}

impl PathfindingState {
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            max_length: max_length.max(1),
            ..Default::default()
        }
    }

    /// First trigger that demands a recompute, checked in a fixed order.
    /// `path_walkable` is the caller's `is_path_valid` verdict for the
    /// current path.
    pub fn recompute_reason(
        &self,
        position: Point,
        target: Point,
        strategy: PathStrategy,
        now: u64,
        path_walkable: bool,
        config: &PathfindingConfig,
    ) -> Option<RecomputeReason> {
        if self.path.is_empty() {
            return Some(RecomputeReason::Empty);
        }
        if self.target != Some(target) {
            return Some(RecomputeReason::TargetChanged);
        }
        if self.strategy != strategy {
            return Some(RecomputeReason::StrategyChanged);
        }
        if !self.valid {
            return Some(RecomputeReason::Invalidated);
        }
        if !path_walkable {
            return Some(RecomputeReason::Blocked);
        }
        if now.saturating_sub(self.last_recompute) >= config.recompute_interval {
            return Some(RecomputeReason::IntervalElapsed);
        }
        if self.path.first() != Some(&position) {
            return Some(RecomputeReason::OffPath);
        }
        if self.path.len() == 1 && position != target {
            return Some(RecomputeReason::Exhausted);
        }
        let steps = (self.path.len() - 1) as u64;
        let direct = u64::from(position.manhattan(target));
        if steps > direct * u64::from(config.inefficiency_factor) {
            return Some(RecomputeReason::Inefficient);
        }
        None
    }

    /// Drop the points behind `position`. No-op when off the path.
    pub fn advance_to(&mut self, position: Point) {
        if let Some(i) = self.path.iter().position(|&p| p == position) {
            self.path.drain(..i);
        }
    }

    /// Store a fresh search result, truncated to `max_length` points.
    pub fn store(&mut self, mut path: Vec<Point>, target: Point, strategy: PathStrategy, now: u64) {
        path.truncate(self.max_length.max(1));
        self.valid = !path.is_empty();
        self.path = path;
        self.target = Some(target);
        self.strategy = strategy;
        self.last_recompute = now;
    }

    /// Mark the cache unusable after a failed search.
    pub fn invalidate(&mut self, target: Point, strategy: PathStrategy, now: u64) {
        self.path.clear();
        self.valid = false;
        self.target = Some(target);
        self.strategy = strategy;
        self.last_recompute = now;
    }

    pub fn next_step(&self, position: Point) -> Delta {
        if !self.valid || !self.enabled {
            return Delta::ZERO;
        }
        next_move(&self.path, position)
    }

    /// Up to `count` path points following `position`.
    pub fn upcoming(&self, position: Point, count: usize) -> Vec<Point> {
        if !self.valid || !self.enabled {
            return Vec::new();
        }
        match self.path.iter().position(|&p| p == position) {
            Some(i) => self.path.iter().skip(i + 1).take(count).copied().collect(),
            None => Vec::new(),
        }
    }

    /// Remaining steps along the cached path.
    pub fn remaining_steps(&self) -> usize {
        self.path.len().saturating_sub(1)
    }
}

/// Congestion heuristic: when more than `group_escalation_count` nearby
/// followers already head for roughly the same target, a direct request is
/// upgraded to avoid entities.
pub fn escalate_for_congestion(
    requested: PathStrategy,
    crowding: usize,
    config: &PathfindingConfig,
) -> PathStrategy {
    if requested == PathStrategy::Direct && crowding > config.group_escalation_count {
        PathStrategy::AvoidEntities
    } else {
        requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(y: i32, xs: std::ops::RangeInclusive<i32>) -> Vec<Point> {
        xs.map(|x| Point::new(x, y)).collect()
    }

    fn fresh(path: Vec<Point>, target: Point) -> PathfindingState {
        let mut state = PathfindingState::default();
        state.store(path, target, PathStrategy::Direct, 10);
        state
    }

    #[test]
    fn test_empty_cache_needs_compute() {
        let state = PathfindingState::default();
        let config = PathfindingConfig::default();
        assert_eq!(
            state.recompute_reason(
                Point::new(1, 1),
                Point::new(5, 1),
                PathStrategy::Direct,
                0,
                false,
                &config
            ),
            Some(RecomputeReason::Empty)
        );
    }

    #[test]
    fn test_fresh_path_is_reused() {
        let config = PathfindingConfig::default();
        let target = Point::new(5, 1);
        let state = fresh(line(1, 1..=5), target);
        assert_eq!(
            state.recompute_reason(Point::new(1, 1), target, PathStrategy::Direct, 20, true, &config),
            None
        );
    }

    #[test]
    fn test_recompute_triggers() {
        let config = PathfindingConfig::default();
        let target = Point::new(5, 1);
        let state = fresh(line(1, 1..=5), target);
        let at = Point::new(1, 1);

        let reason = |pos, tgt, strategy, now, walkable| {
            state.recompute_reason(pos, tgt, strategy, now, walkable, &config)
        };
        assert_eq!(
            reason(at, Point::new(6, 1), PathStrategy::Direct, 20, true),
            Some(RecomputeReason::TargetChanged)
        );
        assert_eq!(
            reason(at, target, PathStrategy::Stealthy, 20, true),
            Some(RecomputeReason::StrategyChanged)
        );
        assert_eq!(
            reason(at, target, PathStrategy::Direct, 20, false),
            Some(RecomputeReason::Blocked)
        );
        assert_eq!(
            reason(at, target, PathStrategy::Direct, 10 + config.recompute_interval, true),
            Some(RecomputeReason::IntervalElapsed)
        );
        assert_eq!(
            reason(Point::new(3, 3), target, PathStrategy::Direct, 20, true),
            Some(RecomputeReason::OffPath)
        );
    }

    #[test]
    fn test_inefficient_detour_is_dropped() {
        let config = PathfindingConfig::default();
        // Nine steps to an adjacent target.
        let mut path = line(1, 1..=5);
        path.extend(line(2, 1..=5).into_iter().rev());
        let state = fresh(path, Point::new(1, 2));
        assert_eq!(
            state.recompute_reason(
                Point::new(1, 1),
                Point::new(1, 2),
                PathStrategy::Direct,
                20,
                true,
                &config
            ),
            Some(RecomputeReason::Inefficient)
        );
    }

    #[test]
    fn test_truncated_path_exhausts() {
        let config = PathfindingConfig::default();
        let mut state = PathfindingState::with_max_length(3);
        let target = Point::new(5, 1);
        state.store(line(1, 1..=5), target, PathStrategy::Direct, 0);
        assert_eq!(state.path.len(), 3);

        state.advance_to(Point::new(3, 1));
        assert_eq!(state.path, vec![Point::new(3, 1)]);
        assert_eq!(
            state.recompute_reason(Point::new(3, 1), target, PathStrategy::Direct, 5, true, &config),
            Some(RecomputeReason::Exhausted)
        );
    }

    #[test]
    fn test_advance_and_step() {
        let mut state = fresh(line(1, 1..=4), Point::new(4, 1));
        state.advance_to(Point::new(2, 1));
        assert_eq!(state.path.first(), Some(&Point::new(2, 1)));
        assert_eq!(state.next_step(Point::new(2, 1)), Delta::new(1, 0));
        assert_eq!(
            state.upcoming(Point::new(2, 1), 5),
            vec![Point::new(3, 1), Point::new(4, 1)]
        );
        assert_eq!(state.remaining_steps(), 2);

        state.advance_to(Point::new(9, 9));
        assert_eq!(state.path.len(), 3);
    }

    #[test]
    fn test_disabled_or_invalid_cache_yields_no_step() {
        let mut state = fresh(line(1, 1..=3), Point::new(3, 1));
        state.enabled = false;
        assert_eq!(state.next_step(Point::new(1, 1)), Delta::ZERO);

        let mut state = fresh(line(1, 1..=3), Point::new(3, 1));
        state.invalidate(Point::new(3, 1), PathStrategy::Direct, 0);
        assert!(state.path.is_empty());
        assert_eq!(state.next_step(Point::new(1, 1)), Delta::ZERO);
    }

    #[test]
    fn test_congestion_escalation() {
        let config = PathfindingConfig::default();
        assert_eq!(
            escalate_for_congestion(PathStrategy::Direct, 2, &config),
            PathStrategy::Direct
        );
        assert_eq!(
            escalate_for_congestion(PathStrategy::Direct, 3, &config),
            PathStrategy::AvoidEntities
        );
        assert_eq!(
            escalate_for_congestion(PathStrategy::Stealthy, 5, &config),
            PathStrategy::Stealthy
        );
    }
}
