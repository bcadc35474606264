//! Ray-cast field of view.
//!
//! Rays are Bresenham lines from the origin to every cell on the perimeter
//! of the square of side `2 * radius + 1`. A ray reveals cells until it
//! leaves the map or hits an opaque tile; the opaque tile itself is seen.
//! Cells beyond the Euclidean radius are discarded.

use std::collections::HashSet;

use delve_logic::constants::behavior::DEFAULT_SIGHT_RADIUS;
use delve_logic::grid::Point;

use crate::components::{Position, Viewshed};
use crate::map::GameMap;
use crate::world::{EntityId, GameWorld};

/// Cells on the line from `from` to `to`, both included.
pub fn bresenham(from: Point, to: Point) -> Vec<Point> {
    let dx = (to.x - from.x).abs();
    let dy = -(to.y - from.y).abs();
    let sx = if from.x < to.x { 1 } else { -1 };
    let sy = if from.y < to.y { 1 } else { -1 };
    let mut err = dx + dy;
    let mut p = from;
    let mut line = Vec::with_capacity((dx - dy) as usize + 1);
    loop {
        line.push(p);
        if p == to {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            p.x += sx;
        }
        if e2 <= dx {
            err += dx;
            p.y += sy;
        }
    }
    line
}

fn within_radius(origin: Point, p: Point, radius: i32) -> bool {
    let dx = (p.x - origin.x) as i64;
    let dy = (p.y - origin.y) as i64;
    let r = radius as i64;
    dx * dx + dy * dy <= r * r
}

pub fn field_of_view(map: &GameMap, origin: Point, radius: i32) -> HashSet<Point> {
    let mut visible = HashSet::new();
    if !map.in_bounds(origin) {
        return visible;
    }
    visible.insert(origin);
    if radius <= 0 {
        return visible;
    }

    let mut perimeter = Vec::with_capacity(8 * radius as usize);
    for d in -radius..=radius {
        perimeter.push(origin.offset(d, -radius));
        perimeter.push(origin.offset(d, radius));
        perimeter.push(origin.offset(-radius, d));
        perimeter.push(origin.offset(radius, d));
    }

    for edge in perimeter {
        for p in bresenham(origin, edge).into_iter().skip(1) {
            if !map.in_bounds(p) {
                break;
            }
            if within_radius(origin, p, radius) {
                visible.insert(p);
            }
            if map.is_opaque(p) {
                break;
            }
        }
    }
    visible
}

/// Whether `to` is visible from `from`: within `radius` and no opaque tile
/// strictly between them.
pub fn line_of_sight(map: &GameMap, from: Point, to: Point, radius: i32) -> bool {
    if !within_radius(from, to, radius) {
        return false;
    }
    let line = bresenham(from, to);
    let interior = line.len().saturating_sub(1);
    line.iter()
        .take(interior)
        .skip(1)
        .all(|&p| !map.is_opaque(p))
}

/// Whether `viewer` can currently see `target`, using its viewshed radius
/// or the default sight radius.
pub fn can_see(world: &GameWorld, viewer: EntityId, target: Point) -> bool {
    let Some(from) = world.position(viewer) else {
        return false;
    };
    let radius = world
        .get::<Viewshed>(viewer)
        .map_or(DEFAULT_SIGHT_RADIUS, |v| v.radius);
    line_of_sight(world.map(), from, target, radius)
}

/// Recompute `entity`'s viewshed if it is dirty. Returns true if it ran.
pub fn refresh_viewshed(world: &mut GameWorld, entity: EntityId) -> bool {
    let Some(viewshed) = world.get::<Viewshed>(entity) else {
        return false;
    };
    if !viewshed.dirty {
        return false;
    }
    let Some(pos) = world.get::<Position>(entity) else {
        return false;
    };
    let visible = field_of_view(world.map(), pos.point(), viewshed.radius);
    world
        .update::<Viewshed, _>(entity, |v| {
            v.visible = visible;
            v.dirty = false;
        })
        .is_some()
}
