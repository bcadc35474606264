//! Time-ordered turn queue.
//!
//! Every schedulable entity holds one [`TurnEntry`] giving the game time at
//! which it may act next. The queue pops the smallest `(time, entity)` pair,
//! so entries sharing a time slot come out in increasing id order and a
//! replay with the same inputs yields the same turn order.
//!
//! Dead entries are not removed eagerly. Hosts call
//! [`TurnQueue::cleanup_dead_entities`] freely; the sweep itself only runs
//! once enough queue operations have accumulated, with the threshold
//! adapting to load (see [`SchedulerConfig::threshold_for`]).

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::constants::scheduling;

/// An entity and the game time of its next action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TurnEntry<Id> {
    pub time: u64,
    pub entity: Id,
}

impl<Id: Ord> Ord for TurnEntry<Id> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .cmp(&other.time)
            .then_with(|| self.entity.cmp(&other.entity))
    }
}

impl<Id: Ord> PartialOrd for TurnEntry<Id> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Cleanup cadence policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub cleanup_base_threshold: u32,
    pub large_entity_count: usize,
    pub large_queue_len: usize,
    pub small_entity_count: usize,
    pub small_queue_len: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cleanup_base_threshold: scheduling::CLEANUP_BASE_THRESHOLD,
            large_entity_count: scheduling::LARGE_ENTITY_COUNT,
            large_queue_len: scheduling::LARGE_QUEUE_LEN,
            small_entity_count: scheduling::SMALL_ENTITY_COUNT,
            small_queue_len: scheduling::SMALL_QUEUE_LEN,
        }
    }
}

impl SchedulerConfig {
    /// Operations that must accumulate before a sweep runs.
    ///
    /// Halved under heavy load (many entities or a long queue), doubled when
    /// both are small, otherwise the base value.
    pub fn threshold_for(&self, entity_count: usize, queue_len: usize) -> u32 {
        let base = self.cleanup_base_threshold.max(1);
        if entity_count > self.large_entity_count || queue_len > self.large_queue_len {
            (base / 2).max(1)
        } else if entity_count < self.small_entity_count && queue_len < self.small_queue_len {
            base.saturating_mul(2)
        } else {
            base
        }
    }
}

/// Outcome of one dead-entry sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupMetrics {
    pub removed: usize,
    pub before: usize,
    pub after: usize,
    pub duration: Duration,
}

/// Persistable image of the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerSnapshot<Id> {
    pub current_time: u64,
    /// Entries in pop order.
    pub entries: Vec<TurnEntry<Id>>,
}

/// Min-ordered turn queue plus the simulation clock.
#[derive(Debug, Clone)]
pub struct TurnQueue<Id> {
    heap: BinaryHeap<Reverse<TurnEntry<Id>>>,
    current_time: u64,
    ops_since_cleanup: u32,
    total_cleanups: u64,
    total_removed: u64,
    config: SchedulerConfig,
}

impl<Id: Copy + Ord> Default for TurnQueue<Id> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Id: Copy + Ord> TurnQueue<Id> {
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    pub fn with_config(config: SchedulerConfig) -> Self {
        Self {
            heap: BinaryHeap::new(),
            current_time: 0,
            ops_since_cleanup: 0,
            total_cleanups: 0,
            total_removed: 0,
            config,
        }
    }

    /// Schedule `entity` at `time`. Past and future times are both accepted.
    pub fn add(&mut self, entity: Id, time: u64) {
        self.heap.push(Reverse(TurnEntry { time, entity }));
        self.ops_since_cleanup = self.ops_since_cleanup.saturating_add(1);
    }

    /// Pop the earliest entry, lowest id first on ties.
    pub fn next(&mut self) -> Option<TurnEntry<Id>> {
        let entry = self.heap.pop().map(|Reverse(e)| e)?;
        self.ops_since_cleanup = self.ops_since_cleanup.saturating_add(1);
        Some(entry)
    }

    pub fn peek(&self) -> Option<TurnEntry<Id>> {
        self.heap.peek().map(|Reverse(e)| *e)
    }

    /// Drop every entry for `entity`. Returns how many were dropped.
    pub fn remove(&mut self, entity: Id) -> usize {
        let before = self.heap.len();
        self.heap.retain(|Reverse(e)| e.entity != entity);
        let removed = before - self.heap.len();
        if removed > 0 {
            self.ops_since_cleanup = self.ops_since_cleanup.saturating_add(1);
        }
        removed
    }

    /// Replace whatever entry `entity` has with one at `time`.
    pub fn reschedule(&mut self, entity: Id, time: u64) {
        self.remove(entity);
        self.add(entity, time);
    }

    pub fn contains(&self, entity: Id) -> bool {
        self.heap.iter().any(|Reverse(e)| e.entity == entity)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn current_time(&self) -> u64 {
        self.current_time
    }

    /// Move the clock forward to `time`. Earlier times are ignored.
    pub fn advance_time(&mut self, time: u64) {
        if time > self.current_time {
            self.current_time = time;
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn ops_since_cleanup(&self) -> u32 {
        self.ops_since_cleanup
    }

    pub fn total_cleanups(&self) -> u64 {
        self.total_cleanups
    }

    pub fn total_removed(&self) -> u64 {
        self.total_removed
    }

    /// Sweep out entries whose entity fails `is_valid`, if the adaptive
    /// operation threshold has been reached. Returns `None` when gated.
    pub fn cleanup_dead_entities(
        &mut self,
        entity_count: usize,
        is_valid: impl FnMut(Id) -> bool,
    ) -> Option<CleanupMetrics> {
        let threshold = self.config.threshold_for(entity_count, self.heap.len());
        if self.ops_since_cleanup < threshold {
            return None;
        }
        Some(self.force_cleanup(is_valid))
    }

    /// Sweep unconditionally. Surviving entries keep their times.
    pub fn force_cleanup(&mut self, mut is_valid: impl FnMut(Id) -> bool) -> CleanupMetrics {
        let started = Instant::now();
        let before = self.heap.len();

        let entries = std::mem::take(&mut self.heap).into_vec();
        self.heap = entries
            .into_iter()
            .filter(|Reverse(e)| is_valid(e.entity))
            .collect();

        let after = self.heap.len();
        let removed = before - after;
        self.ops_since_cleanup = 0;
        self.total_cleanups += 1;
        self.total_removed += removed as u64;

        CleanupMetrics {
            removed,
            before,
            after,
            duration: started.elapsed(),
        }
    }

    /// All entries in pop order.
    pub fn entries(&self) -> Vec<TurnEntry<Id>> {
        let mut entries: Vec<TurnEntry<Id>> = self.heap.iter().map(|Reverse(e)| *e).collect();
        entries.sort();
        entries
    }

    pub fn snapshot(&self) -> SchedulerSnapshot<Id> {
        SchedulerSnapshot {
            current_time: self.current_time,
            entries: self.entries(),
        }
    }

    /// Replace the queue contents and clock with `snapshot`.
    pub fn restore(&mut self, snapshot: SchedulerSnapshot<Id>) {
        self.heap = snapshot.entries.into_iter().map(Reverse).collect();
        self.current_time = snapshot.current_time;
        self.ops_since_cleanup = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tiny deterministic generator so ordering tests cover many shapes.
    fn lcg(seed: &mut u64) -> u64 {
        *seed = seed
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        *seed >> 33
    }

    #[test]
    fn test_next_returns_global_minimum() {
        let mut seed = 7;
        for round in 0..20 {
            let mut queue = TurnQueue::new();
            let mut held = Vec::new();
            for id in 0..(10 + round) {
                let time = lcg(&mut seed) % 20;
                queue.add(id, time);
                held.push((time, id));
            }
            held.sort();
            for expected in held {
                let entry = queue.next().unwrap();
                assert_eq!((entry.time, entry.entity), expected);
            }
            assert!(queue.next().is_none());
        }
    }

    #[test]
    fn test_equal_times_pop_in_id_order() {
        let mut queue = TurnQueue::new();
        queue.add(7u64, 50);
        queue.add(3u64, 50);
        assert_eq!(queue.next().unwrap().entity, 3);
        assert_eq!(queue.next().unwrap().entity, 7);
    }

    #[test]
    fn test_interleaved_add_and_next() {
        let mut queue = TurnQueue::new();
        queue.add(1u32, 100);
        queue.add(2u32, 30);
        assert_eq!(queue.next().unwrap(), TurnEntry { time: 30, entity: 2 });
        queue.add(3u32, 10);
        queue.add(4u32, 100);
        assert_eq!(queue.next().unwrap().entity, 3);
        assert_eq!(queue.next().unwrap().entity, 1);
        assert_eq!(queue.next().unwrap().entity, 4);
    }

    #[test]
    fn test_peek_is_non_destructive() {
        let mut queue = TurnQueue::new();
        assert!(queue.peek().is_none());
        queue.add(9u32, 5);
        queue.add(2u32, 6);
        assert_eq!(queue.peek().unwrap().entity, 9);
        assert_eq!(queue.peek().unwrap().entity, 9);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_remove_and_reschedule() {
        let mut queue = TurnQueue::new();
        queue.add(1u32, 10);
        queue.add(2u32, 20);
        assert_eq!(queue.remove(1), 1);
        assert_eq!(queue.remove(1), 0);
        assert!(!queue.contains(1));

        queue.reschedule(2, 5);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.peek().unwrap().time, 5);
    }

    #[test]
    fn test_clock_is_monotonic() {
        let mut queue: TurnQueue<u32> = TurnQueue::new();
        queue.advance_time(200);
        queue.advance_time(100);
        assert_eq!(queue.current_time(), 200);
        queue.add(1, 10);
        queue.next();
        assert_eq!(queue.current_time(), 200);
    }

    #[test]
    fn test_adaptive_threshold() {
        let config = SchedulerConfig::default();
        assert_eq!(config.threshold_for(2000, 10), 50);
        assert_eq!(config.threshold_for(200, 600), 50);
        assert_eq!(config.threshold_for(50, 20), 200);
        assert_eq!(config.threshold_for(50, 60), 100);
        assert_eq!(config.threshold_for(500, 100), 100);
    }

    #[test]
    fn test_cleanup_is_gated_by_operation_count() {
        let config = SchedulerConfig {
            cleanup_base_threshold: 4,
            ..Default::default()
        };
        let mut queue = TurnQueue::with_config(config);
        queue.add(1u32, 10);
        queue.add(2u32, 20);
        // Small world doubles the threshold to 8 operations.
        assert!(queue.cleanup_dead_entities(2, |_| false).is_none());
        for id in 3..9u32 {
            queue.add(id, 30);
        }
        let metrics = queue.cleanup_dead_entities(8, |id| id % 2 == 0).unwrap();
        assert_eq!(metrics.before, 8);
        assert_eq!(metrics.removed, 4);
        assert_eq!(metrics.after, 4);
        assert_eq!(queue.ops_since_cleanup(), 0);
        assert_eq!(queue.total_cleanups(), 1);
        assert_eq!(queue.total_removed(), 4);
    }

    #[test]
    fn test_cleanup_keeps_live_entry_times() {
        let mut queue = TurnQueue::new();
        queue.add(1u32, 40);
        queue.add(2u32, 15);
        queue.add(3u32, 25);
        queue.force_cleanup(|id| id != 3);
        assert_eq!(
            queue.entries(),
            vec![
                TurnEntry { time: 15, entity: 2 },
                TurnEntry { time: 40, entity: 1 }
            ]
        );
    }

    #[test]
    fn test_snapshot_restore() {
        let mut queue = TurnQueue::new();
        queue.add(5u32, 300);
        queue.add(4u32, 100);
        queue.advance_time(90);
        let snapshot = queue.snapshot();
        assert_eq!(snapshot.entries[0].entity, 4);

        let json = serde_json::to_string(&snapshot).unwrap();
        let mut restored: TurnQueue<u32> = TurnQueue::new();
        restored.restore(serde_json::from_str(&json).unwrap());
        assert_eq!(restored.current_time(), 90);
        assert_eq!(restored.next().unwrap().entity, 4);
        assert_eq!(restored.next().unwrap().entity, 5);
    }
}
