//! Save/Load of the turn schedule
//!
//! Uses bincode for a compact binary image of the turn queue: the clock
//! and every pending entry in pop order. Entity handles are stored as raw
//! ids, so a schedule only makes sense alongside the world it came from.

use std::io::{Read, Write};

use delve_logic::schedule::{SchedulerSnapshot, TurnQueue};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::world::EntityId;

/// Version number for the schedule format (increment when format changes)
pub const SAVE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct SaveData {
    version: u32,
    schedule: SchedulerSnapshot<EntityId>,
}

/// Errors that can occur during save/load
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Bincode(#[from] Box<bincode::ErrorKind>),
    #[error("Save version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

pub fn save_schedule<W: Write>(writer: W, queue: &TurnQueue<EntityId>) -> Result<(), SaveError> {
    let data = SaveData {
        version: SAVE_VERSION,
        schedule: queue.snapshot(),
    };
    bincode::serialize_into(writer, &data)?;
    Ok(())
}

pub fn load_schedule<R: Read>(reader: R) -> Result<SchedulerSnapshot<EntityId>, SaveError> {
    let data: SaveData = bincode::deserialize_from(reader)?;
    if data.version != SAVE_VERSION {
        return Err(SaveError::VersionMismatch {
            expected: SAVE_VERSION,
            found: data.version,
        });
    }
    Ok(data.schedule)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_survives_save_load() {
        let mut queue = TurnQueue::new();
        queue.add(EntityId(7), 50);
        queue.add(EntityId(3), 50);
        queue.add(EntityId(9), 20);
        queue.advance_time(20);

        let mut buffer = Vec::new();
        save_schedule(&mut buffer, &queue).expect("save failed");

        let mut restored = TurnQueue::new();
        restored.restore(load_schedule(&buffer[..]).expect("load failed"));
        assert_eq!(restored.current_time(), 20);
        let order: Vec<EntityId> = std::iter::from_fn(|| restored.next().map(|e| e.entity)).collect();
        assert_eq!(order, vec![EntityId(9), EntityId(3), EntityId(7)]);
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let data = SaveData {
            version: SAVE_VERSION + 1,
            schedule: SchedulerSnapshot {
                current_time: 0,
                entries: Vec::new(),
            },
        };
        let buffer = bincode::serialize(&data).unwrap();
        match load_schedule(&buffer[..]) {
            Err(SaveError::VersionMismatch { expected, found }) => {
                assert_eq!(expected, SAVE_VERSION);
                assert_eq!(found, SAVE_VERSION + 1);
            }
            other => panic!("expected version mismatch, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_truncated_input_is_an_error() {
        assert!(matches!(
            load_schedule(&[1u8, 0][..]),
            Err(SaveError::Bincode(_))
        ));
    }
}
