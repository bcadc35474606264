//! Integer grid geometry shared by the map, pathfinding and AI.

use serde::{Deserialize, Serialize};

/// A cell on the dungeon grid.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance, the metric of cardinal-only movement.
    pub fn manhattan(self, other: Point) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// The four cardinal neighbours in N, E, S, W order.
    pub fn cardinal_neighbors(self) -> [Point; 4] {
        Direction::ALL.map(|d| self + d.delta())
    }

    pub fn is_adjacent(self, other: Point) -> bool {
        self.manhattan(other) == 1
    }

    /// Unit cardinal step toward `to` along the axis with the larger gap.
    /// Ties go to the horizontal axis. Zero if already there.
    pub fn step_toward(self, to: Point) -> Delta {
        let dx = to.x - self.x;
        let dy = to.y - self.y;
        if dx == 0 && dy == 0 {
            Delta::ZERO
        } else if dx.abs() >= dy.abs() {
            Delta::new(dx.signum(), 0)
        } else {
            Delta::new(0, dy.signum())
        }
    }
}

impl std::ops::Add<Delta> for Point {
    type Output = Point;
    fn add(self, d: Delta) -> Point {
        self.offset(d.dx, d.dy)
    }
}

impl std::ops::Sub for Point {
    type Output = Delta;
    fn sub(self, other: Point) -> Delta {
        Delta::new(self.x - other.x, self.y - other.y)
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Offset between two cells.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Delta {
    pub dx: i32,
    pub dy: i32,
}

impl Delta {
    pub const ZERO: Self = Self { dx: 0, dy: 0 };

    pub const fn new(dx: i32, dy: i32) -> Self {
        Self { dx, dy }
    }

    pub fn between(from: Point, to: Point) -> Self {
        to - from
    }

    pub fn is_zero(self) -> bool {
        self.dx == 0 && self.dy == 0
    }

    /// True for exactly one tile along one axis.
    pub fn is_cardinal_step(self) -> bool {
        self.dx.abs() + self.dy.abs() == 1
    }
}

/// The four movement directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    pub fn delta(self) -> Delta {
        match self {
            Direction::North => Delta::new(0, -1),
            Direction::East => Delta::new(1, 0),
            Direction::South => Delta::new(0, 1),
            Direction::West => Delta::new(-1, 0),
        }
    }
}
