//! Pure simulation logic for Delve.
//!
//! This crate contains the algorithmic heart of the dungeon engine, kept
//! independent of any ECS or front end. Functions take plain data and
//! return results, so everything here is unit-testable without a world.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`behavior`] | Archetypes, AI state data and the priority-ordered transition table |
//! | [`constants`] | Action costs, scheduling and pathing tunables |
//! | [`grid`] | Integer grid points, deltas and cardinal directions |
//! | [`path_cache`] | Per-entity cached path and its recompute triggers |
//! | [`path_strategy`] | Route-shaping passes applied to raw shortest paths |
//! | [`pathfinding`] | A* and Jump-Point-Search over cardinal grids |
//! | [`schedule`] | Time-ordered turn queue with adaptive dead-entry cleanup |

pub mod behavior;
pub mod constants;
pub mod grid;
pub mod path_cache;
pub mod path_strategy;
pub mod pathfinding;
pub mod schedule;
