//! Common components used across multiple entity types.

use std::collections::HashSet;

use delve_logic::constants::behavior::DEFAULT_SIGHT_RADIUS;
use delve_logic::grid::Point;
use serde::{Deserialize, Serialize};

/// Grid cell an entity occupies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

impl From<Point> for Position {
    fn from(p: Point) -> Self {
        Self { x: p.x, y: p.y }
    }
}

/// Display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Name(pub String);

impl Name {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl std::fmt::Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cells an entity can currently see. Recomputed lazily when `dirty`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewshed {
    pub radius: i32,
    pub visible: HashSet<Point>,
    pub dirty: bool,
}

impl Viewshed {
    pub fn new(radius: i32) -> Self {
        Self {
            radius: radius.max(0),
            visible: HashSet::new(),
            dirty: true,
        }
    }

    pub fn can_see(&self, p: Point) -> bool {
        self.visible.contains(&p)
    }
}

impl Default for Viewshed {
    fn default() -> Self {
        Self::new(DEFAULT_SIGHT_RADIUS)
    }
}
