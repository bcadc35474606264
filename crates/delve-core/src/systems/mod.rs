//! Systems - logic that operates on components

mod ai;
mod pathing;
mod turns;

pub use ai::*;
pub use pathing::*;
pub use turns::*;
