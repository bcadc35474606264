//! Route-shaping passes applied after the shortest-path search.
//!
//! Strategies never re-run the search. They walk the interior of a finished
//! path and swap individual cells for a nearby alternative, re-stitching
//! the path so it still consists of single cardinal steps.

use serde::{Deserialize, Serialize};

use crate::grid::Point;
use crate::pathfinding::GridMap;

/// Named post-processing policy for a raw shortest path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathStrategy {
    /// Shortest path as found.
    #[default]
    Direct,
    /// Step around cells held by movement-blocking entities.
    AvoidEntities,
    /// Reserved for corridor-width preferences; currently leaves the path as is.
    PreferOpen,
    /// Step around cells the designated observer can see.
    Stealthy,
}

impl PathStrategy {
    pub fn all() -> &'static [PathStrategy] {
        &[
            PathStrategy::Direct,
            PathStrategy::AvoidEntities,
            PathStrategy::PreferOpen,
            PathStrategy::Stealthy,
        ]
    }

    pub fn name(self) -> &'static str {
        match self {
            PathStrategy::Direct => "direct",
            PathStrategy::AvoidEntities => "avoid_entities",
            PathStrategy::PreferOpen => "prefer_open",
            PathStrategy::Stealthy => "stealthy",
        }
    }
}

impl std::fmt::Display for PathStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Apply `strategy` to `path`. Endpoints are never moved.
pub fn apply_strategy<G: GridMap + ?Sized>(
    grid: &G,
    path: Vec<Point>,
    strategy: PathStrategy,
    detour_radius: u32,
) -> Vec<Point> {
    match strategy {
        PathStrategy::Direct | PathStrategy::PreferOpen => path,
        PathStrategy::AvoidEntities => {
            reroute_interior(grid, path, detour_radius, &|p: Point| grid.is_occupied(p))
        }
        PathStrategy::Stealthy => {
            reroute_interior(grid, path, detour_radius, &|p: Point| grid.is_observed(p))
        }
    }
}

fn reroute_interior<G: GridMap + ?Sized>(
    grid: &G,
    mut path: Vec<Point>,
    radius: u32,
    avoid: &dyn Fn(Point) -> bool,
) -> Vec<Point> {
    let mut i = 1;
    while i + 1 < path.len() {
        if !avoid(path[i]) {
            i += 1;
            continue;
        }
        match find_detour(grid, &path, i, radius, avoid) {
            Some(replacement) => {
                let len = replacement.len();
                path.splice(i..=i, replacement);
                i += len;
            }
            None => i += 1,
        }
    }
    path
}

/// Replacement cells for `path[i]`: a neighbour of it within `radius` of
/// both path neighbours, plus the bridging cells that keep steps cardinal.
fn find_detour<G: GridMap + ?Sized>(
    grid: &G,
    path: &[Point],
    i: usize,
    radius: u32,
    avoid: &dyn Fn(Point) -> bool,
) -> Option<Vec<Point>> {
    let prev = path[i - 1];
    let current = path[i];
    let next = path[i + 1];
    let usable =
        |p: Point| grid.is_passable(p) && !avoid(p) && p != current && !path.contains(&p);

    for candidate in current.cardinal_neighbors() {
        if !usable(candidate) {
            continue;
        }
        if candidate.manhattan(prev) > radius || candidate.manhattan(next) > radius {
            continue;
        }
        let Some(before) = bridge(prev, candidate, &usable) else {
            continue;
        };
        let Some(after) = bridge(candidate, next, &usable) else {
            continue;
        };
        let mut replacement = before;
        replacement.push(candidate);
        replacement.extend(after);
        return Some(replacement);
    }
    None
}

/// Cells strictly between `from` and `to` that make the hop cardinal.
fn bridge(from: Point, to: Point, usable: &dyn Fn(Point) -> bool) -> Option<Vec<Point>> {
    match from.manhattan(to) {
        1 => Some(Vec::new()),
        2 if from.x == to.x || from.y == to.y => {
            let mid = Point::new((from.x + to.x) / 2, (from.y + to.y) / 2);
            usable(mid).then(|| vec![mid])
        }
        2 => [Point::new(from.x, to.y), Point::new(to.x, from.y)]
            .into_iter()
            .find(|&corner| usable(corner))
            .map(|corner| vec![corner]),
        _ => None,
    }
}
