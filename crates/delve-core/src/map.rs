//! Dungeon tile map.

use delve_logic::grid::Point;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tile {
    #[default]
    Floor,
    Wall,
}

impl Tile {
    pub fn is_walkable(self) -> bool {
        self == Tile::Floor
    }

    pub fn is_opaque(self) -> bool {
        self == Tile::Wall
    }
}

/// Row-major grid of tiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameMap {
    width: i32,
    height: i32,
    tiles: Vec<Tile>,
}

impl GameMap {
    /// All-floor map.
    pub fn new(width: i32, height: i32) -> Self {
        let width = width.max(0);
        let height = height.max(0);
        Self {
            width,
            height,
            tiles: vec![Tile::Floor; (width * height) as usize],
        }
    }

    /// Floor surrounded by a one-tile wall border.
    pub fn bordered_room(width: i32, height: i32) -> Self {
        let mut map = Self::new(width, height);
        for x in 0..map.width {
            map.set_tile(Point::new(x, 0), Tile::Wall);
            map.set_tile(Point::new(x, map.height - 1), Tile::Wall);
        }
        for y in 0..map.height {
            map.set_tile(Point::new(0, y), Tile::Wall);
            map.set_tile(Point::new(map.width - 1, y), Tile::Wall);
        }
        map
    }

    /// Parse `#` as wall and anything else as floor. Short rows are padded
    /// with wall.
    pub fn from_ascii(rows: &[&str]) -> Self {
        let height = rows.len() as i32;
        let width = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0) as i32;
        let mut map = Self::new(width, height);
        for y in 0..height {
            let row: Vec<char> = rows[y as usize].chars().collect();
            for x in 0..width {
                let tile = match row.get(x as usize) {
                    Some('#') | None => Tile::Wall,
                    Some(_) => Tile::Floor,
                };
                map.set_tile(Point::new(x, y), tile);
            }
        }
        map
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn in_bounds(&self, p: Point) -> bool {
        p.x >= 0 && p.y >= 0 && p.x < self.width && p.y < self.height
    }

    fn index(&self, p: Point) -> Option<usize> {
        self.in_bounds(p)
            .then(|| (p.y * self.width + p.x) as usize)
    }

    /// `None` outside the map.
    pub fn tile(&self, p: Point) -> Option<Tile> {
        self.index(p).map(|i| self.tiles[i])
    }

    /// No-op outside the map.
    pub fn set_tile(&mut self, p: Point, tile: Tile) {
        if let Some(i) = self.index(p) {
            self.tiles[i] = tile;
        }
    }

    pub fn is_walkable(&self, p: Point) -> bool {
        self.tile(p).is_some_and(Tile::is_walkable)
    }

    /// Out-of-bounds cells block sight.
    pub fn is_opaque(&self, p: Point) -> bool {
        self.tile(p).map_or(true, Tile::is_opaque)
    }

    /// Clamp `p` into the map rectangle.
    pub fn clamp(&self, p: Point) -> Point {
        Point::new(
            p.x.clamp(0, (self.width - 1).max(0)),
            p.y.clamp(0, (self.height - 1).max(0)),
        )
    }

    pub fn floor_count(&self) -> usize {
        self.tiles.iter().filter(|t| t.is_walkable()).count()
    }
}
