//! Grid search over cardinal-movement dungeons.
//!
//! The search core is written against [`SearchSpace`], the three
//! capabilities every best-first grid search needs: neighbours, step cost
//! and an admissible estimate. [`CardinalGrid`] provides them for any
//! [`GridMap`]: four-way movement, unit cost plus a surcharge for cells held
//! by a movement-blocking entity, and Manhattan estimation.
//!
//! [`Pathfinder::find_path`] picks the algorithm: A* for short requests and
//! for every non-direct strategy, Jump-Point-Search for long direct ones.
//! The raw shortest path is then shaped by the requested
//! [`PathStrategy`](crate::path_strategy::PathStrategy).

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use std::sync::{Mutex, PoisonError};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::constants::pathing;
use crate::grid::{Delta, Point};
use crate::path_strategy::{apply_strategy, PathStrategy};

/// Terrain and occupancy as seen by the search.
pub trait GridMap {
    fn in_bounds(&self, p: Point) -> bool;

    /// Terrain walkability, ignoring entities.
    fn is_walkable(&self, p: Point) -> bool;

    /// Whether a movement-blocking entity currently stands on `p`.
    fn is_occupied(&self, _p: Point) -> bool {
        false
    }

    /// Whether `p` is inside the designated observer's field of view.
    fn is_observed(&self, _p: Point) -> bool {
        false
    }

    fn is_passable(&self, p: Point) -> bool {
        self.in_bounds(p) && self.is_walkable(p)
    }
}

/// The contract a best-first search needs from its caller.
pub trait SearchSpace {
    fn neighbors(&self, p: Point) -> Vec<Point>;
    fn cost(&self, from: Point, to: Point) -> u32;
    /// Admissible estimate of the remaining cost.
    fn estimation(&self, from: Point, to: Point) -> u32;
}

/// Four-way movement over a [`GridMap`].
pub struct CardinalGrid<'a, G: ?Sized> {
    grid: &'a G,
    occupied_cost: u32,
}

impl<'a, G: GridMap + ?Sized> CardinalGrid<'a, G> {
    pub fn new(grid: &'a G, occupied_cost: u32) -> Self {
        Self {
            grid,
            occupied_cost,
        }
    }
}

impl<G: GridMap + ?Sized> SearchSpace for CardinalGrid<'_, G> {
    fn neighbors(&self, p: Point) -> Vec<Point> {
        p.cardinal_neighbors()
            .into_iter()
            .filter(|&n| self.grid.is_passable(n))
            .collect()
    }

    fn cost(&self, _from: Point, to: Point) -> u32 {
        if self.grid.is_occupied(to) {
            1 + self.occupied_cost
        } else {
            1
        }
    }

    fn estimation(&self, from: Point, to: Point) -> u32 {
        from.manhattan(to)
    }
}

/// Tunable search policy. Defaults come from [`crate::constants::pathing`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathfindingConfig {
    pub jps_threshold: u32,
    pub occupied_cost: u32,
    pub detour_radius: u32,
    pub recompute_interval: u64,
    pub inefficiency_factor: u32,
    pub group_search_radius: u32,
    pub group_target_radius: u32,
    pub group_escalation_count: usize,
    pub max_path_length: usize,
    pub max_search_nodes: usize,
    pub trace_capacity: usize,
}

impl Default for PathfindingConfig {
    fn default() -> Self {
        Self {
            jps_threshold: pathing::JPS_THRESHOLD,
            occupied_cost: pathing::OCCUPIED_COST,
            detour_radius: pathing::DETOUR_RADIUS,
            recompute_interval: pathing::RECOMPUTE_INTERVAL,
            inefficiency_factor: pathing::INEFFICIENCY_FACTOR,
            group_search_radius: pathing::GROUP_SEARCH_RADIUS,
            group_target_radius: pathing::GROUP_TARGET_RADIUS,
            group_escalation_count: pathing::GROUP_ESCALATION_COUNT,
            max_path_length: pathing::MAX_PATH_LENGTH,
            max_search_nodes: pathing::MAX_SEARCH_NODES,
            trace_capacity: pathing::TRACE_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    AStar,
    JumpPoint,
}

/// One search as recorded in debug mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchTrace {
    pub from: Point,
    pub to: Point,
    pub strategy: PathStrategy,
    pub algorithm: Algorithm,
    pub nodes_expanded: usize,
    /// `None` when no route was found.
    pub path_len: Option<usize>,
}

struct SearchOutcome {
    path: Option<Vec<Point>>,
    nodes_expanded: usize,
}

/// Stateless search service. The only interior state is the debug trace
/// ring, which stays empty unless debug mode is switched on.
#[derive(Debug)]
pub struct Pathfinder {
    config: PathfindingConfig,
    debug: bool,
    traces: Mutex<VecDeque<SearchTrace>>,
}

impl Default for Pathfinder {
    fn default() -> Self {
        Self::new(PathfindingConfig::default())
    }
}

impl Pathfinder {
    pub fn new(config: PathfindingConfig) -> Self {
        Self {
            config,
            debug: false,
            traces: Mutex::new(VecDeque::new()),
        }
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
        if !debug {
            self.clear_traces();
        }
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    pub fn config(&self) -> &PathfindingConfig {
        &self.config
    }

    /// Shortest route from `from` to `to`, shaped by `strategy`.
    ///
    /// Returns `None` if either endpoint is not walkable or no route exists
    /// within the node budget. A returned path starts at `from`, ends at
    /// `to`, and every consecutive pair is one cardinal step.
    pub fn find_path<G: GridMap + ?Sized>(
        &self,
        grid: &G,
        from: Point,
        to: Point,
        strategy: PathStrategy,
    ) -> Option<Vec<Point>> {
        if !grid.is_passable(from) || !grid.is_passable(to) {
            if self.debug {
                debug!("path {} -> {} rejected: endpoint not walkable", from, to);
            }
            return None;
        }

        let use_jps =
            strategy == PathStrategy::Direct && from.manhattan(to) > self.config.jps_threshold;

        let (algorithm, outcome) = if use_jps {
            let outcome = self.run_jump_point(grid, from, to);
            if outcome.path.is_some() {
                (Algorithm::JumpPoint, outcome)
            } else {
                let space = CardinalGrid::new(grid, self.config.occupied_cost);
                (Algorithm::AStar, self.run_a_star(&space, from, to))
            }
        } else {
            let space = CardinalGrid::new(grid, self.config.occupied_cost);
            (Algorithm::AStar, self.run_a_star(&space, from, to))
        };

        let path = outcome
            .path
            .map(|raw| apply_strategy(grid, raw, strategy, self.config.detour_radius));

        self.record(SearchTrace {
            from,
            to,
            strategy,
            algorithm,
            nodes_expanded: outcome.nodes_expanded,
            path_len: path.as_ref().map(Vec::len),
        });

        path
    }

    /// Plain A* over any search space.
    pub fn a_star<S: SearchSpace + ?Sized>(
        &self,
        space: &S,
        from: Point,
        to: Point,
    ) -> Option<Vec<Point>> {
        self.run_a_star(space, from, to).path
    }

    /// Cardinal Jump-Point-Search, expanded back into single steps.
    /// Ignores occupancy: every passable cell costs one.
    pub fn jump_point_search<G: GridMap + ?Sized>(
        &self,
        grid: &G,
        from: Point,
        to: Point,
    ) -> Option<Vec<Point>> {
        if !grid.is_passable(from) || !grid.is_passable(to) {
            return None;
        }
        self.run_jump_point(grid, from, to).path
    }

    /// Most recent debug traces, oldest first. Empty outside debug mode.
    pub fn recent_traces(&self) -> Vec<SearchTrace> {
        self.traces
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn clear_traces(&self) {
        self.traces
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn record(&self, trace: SearchTrace) {
        if !self.debug {
            return;
        }
        debug!(
            "path {} -> {} via {:?}/{}: {} nodes, len {:?}",
            trace.from,
            trace.to,
            trace.algorithm,
            trace.strategy,
            trace.nodes_expanded,
            trace.path_len
        );
        let mut traces = self.traces.lock().unwrap_or_else(PoisonError::into_inner);
        while traces.len() >= self.config.trace_capacity.max(1) {
            traces.pop_front();
        }
        traces.push_back(trace);
    }

    fn run_a_star<S: SearchSpace + ?Sized>(
        &self,
        space: &S,
        from: Point,
        to: Point,
    ) -> SearchOutcome {
        let mut open = BinaryHeap::new();
        let mut came_from: HashMap<Point, Point> = HashMap::new();
        let mut g_score: HashMap<Point, u32> = HashMap::new();
        let mut closed: HashSet<Point> = HashSet::new();
        let mut expanded = 0;

        g_score.insert(from, 0);
        open.push(Reverse((space.estimation(from, to), 0u32, from)));

        while let Some(Reverse((_, g, current))) = open.pop() {
            if current == to {
                return SearchOutcome {
                    path: Some(reconstruct_path(&came_from, current)),
                    nodes_expanded: expanded,
                };
            }
            if !closed.insert(current) {
                continue;
            }
            expanded += 1;
            if expanded > self.config.max_search_nodes {
                break;
            }

            for next in space.neighbors(current) {
                if closed.contains(&next) {
                    continue;
                }
                let tentative = g.saturating_add(space.cost(current, next));
                if g_score.get(&next).map_or(true, |&old| tentative < old) {
                    g_score.insert(next, tentative);
                    came_from.insert(next, current);
                    let f = tentative.saturating_add(space.estimation(next, to));
                    open.push(Reverse((f, tentative, next)));
                }
            }
        }

        SearchOutcome {
            path: None,
            nodes_expanded: expanded,
        }
    }

    fn run_jump_point<G: GridMap + ?Sized>(
        &self,
        grid: &G,
        from: Point,
        to: Point,
    ) -> SearchOutcome {
        let mut open = BinaryHeap::new();
        let mut parent: HashMap<Point, Point> = HashMap::new();
        let mut g_score: HashMap<Point, u32> = HashMap::new();
        let mut closed: HashSet<Point> = HashSet::new();
        let mut expanded = 0;

        g_score.insert(from, 0);
        open.push(Reverse((from.manhattan(to), 0u32, from)));

        while let Some(Reverse((_, g, current))) = open.pop() {
            if current == to {
                let jump_points = reconstruct_path(&parent, current);
                return SearchOutcome {
                    path: Some(expand_jump_points(&jump_points)),
                    nodes_expanded: expanded,
                };
            }
            if !closed.insert(current) {
                continue;
            }
            expanded += 1;
            if expanded > self.config.max_search_nodes {
                break;
            }

            for dir in pruned_directions(grid, current, parent.get(&current).copied()) {
                let Some(jump) = jump(grid, current, dir, to) else {
                    continue;
                };
                if closed.contains(&jump) {
                    continue;
                }
                let tentative = g.saturating_add(current.manhattan(jump));
                if g_score.get(&jump).map_or(true, |&old| tentative < old) {
                    g_score.insert(jump, tentative);
                    parent.insert(jump, current);
                    let f = tentative.saturating_add(jump.manhattan(to));
                    open.push(Reverse((f, tentative, jump)));
                }
            }
        }

        SearchOutcome {
            path: None,
            nodes_expanded: expanded,
        }
    }
}

/// Whether a cached path can still be walked: non-empty and every cell
/// walkable. Occupancy is deliberately not checked here.
pub fn is_path_valid<G: GridMap + ?Sized>(grid: &G, path: &[Point]) -> bool {
    !path.is_empty() && path.iter().all(|&p| grid.is_passable(p))
}

/// Step from `current` to the following path point, or zero when
/// `current` is not on the path or is its last point.
pub fn next_move(path: &[Point], current: Point) -> Delta {
    path.iter()
        .position(|&p| p == current)
        .and_then(|i| path.get(i + 1))
        .map(|&next| next - current)
        .unwrap_or(Delta::ZERO)
}

fn reconstruct_path(came_from: &HashMap<Point, Point>, end: Point) -> Vec<Point> {
    let mut path = vec![end];
    let mut node = end;
    while let Some(&prev) = came_from.get(&node) {
        path.push(prev);
        node = prev;
    }
    path.reverse();
    path
}

/// Directions worth exploring from `p`, given the direction of arrival.
fn pruned_directions<G: GridMap + ?Sized>(
    grid: &G,
    p: Point,
    parent: Option<Point>,
) -> Vec<Delta> {
    let candidates: Vec<Delta> = match parent {
        None => p.cardinal_neighbors().iter().map(|&n| n - p).collect(),
        Some(par) => {
            let dx = (p.x - par.x).signum();
            let dy = (p.y - par.y).signum();
            if dx != 0 {
                vec![Delta::new(0, -1), Delta::new(0, 1), Delta::new(dx, 0)]
            } else {
                vec![Delta::new(-1, 0), Delta::new(1, 0), Delta::new(0, dy)]
            }
        }
    };
    candidates
        .into_iter()
        .filter(|&d| grid.is_passable(p + d))
        .collect()
}

/// Scan from `from` in direction `dir` until a jump point, the goal, or a
/// wall. Vertical scans probe both horizontal directions at every cell;
/// horizontal scans never recurse, so depth stays at two.
fn jump<G: GridMap + ?Sized>(grid: &G, from: Point, dir: Delta, goal: Point) -> Option<Point> {
    let mut p = from + dir;
    loop {
        if !grid.is_passable(p) {
            return None;
        }
        if p == goal {
            return Some(p);
        }
        if dir.dx != 0 {
            let forced = (grid.is_passable(p.offset(0, -1))
                && !grid.is_passable(p.offset(-dir.dx, -1)))
                || (grid.is_passable(p.offset(0, 1)) && !grid.is_passable(p.offset(-dir.dx, 1)));
            if forced {
                return Some(p);
            }
        } else {
            let forced = (grid.is_passable(p.offset(-1, 0))
                && !grid.is_passable(p.offset(-1, -dir.dy)))
                || (grid.is_passable(p.offset(1, 0)) && !grid.is_passable(p.offset(1, -dir.dy)));
            if forced {
                return Some(p);
            }
            if jump(grid, p, Delta::new(1, 0), goal).is_some()
                || jump(grid, p, Delta::new(-1, 0), goal).is_some()
            {
                return Some(p);
            }
        }
        p = p + dir;
    }
}

/// Consecutive jump points are axis-aligned; fill in the cells between.
fn expand_jump_points(jump_points: &[Point]) -> Vec<Point> {
    let mut path = Vec::new();
    let Some(&first) = jump_points.first() else {
        return path;
    };
    path.push(first);
    for pair in jump_points.windows(2) {
        let mut p = pair[0];
        while p != pair[1] {
            p = p + p.step_toward(pair[1]);
            path.push(p);
        }
    }
    path
}
