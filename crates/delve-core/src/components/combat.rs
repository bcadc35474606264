//! Health, damage and the markers that follow from them.

use serde::{Deserialize, Serialize};

use delve_logic::behavior::health_fraction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub current: i32,
    pub max: i32,
}

impl Health {
    pub fn new(max: i32) -> Self {
        Self { current: max, max }
    }

    pub fn is_exhausted(&self) -> bool {
        self.current <= 0
    }

    /// `current / max`, or `None` when `max` is not positive.
    pub fn fraction(&self) -> Option<f32> {
        health_fraction(self.current, self.max)
    }

    /// Apply `amount` damage, returning true if this blow was fatal.
    pub fn take_damage(&mut self, amount: i32) -> bool {
        let was_alive = !self.is_exhausted();
        self.current -= amount.max(0);
        was_alive && self.is_exhausted()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attacker {
    pub damage: i32,
}

/// Remains of a dead actor. Never takes a turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Corpse;

/// Occupies its cell: raises path cost there and turns moves into bumps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlocksMovement;
