//! Turn-taking components.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::actions::Action;

/// Actor capability: anything with this component can hold a turn slot.
/// Actions are consumed front to back, one per turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub queue: VecDeque<Action>,
}

impl Actor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn peek(&self) -> Option<&Action> {
        self.queue.front()
    }

    pub fn pop(&mut self) -> Option<Action> {
        self.queue.pop_front()
    }

    pub fn push(&mut self, action: Action) {
        self.queue.push_back(action);
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Marks the player-controlled entity. The turn loop halts when it runs dry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player;

/// Marks entities whose empty action queue is refilled by the AI driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiControlled;
