//! Direct-indexed dispatch table.
//!
//! Spends `max_id + 1` slots of memory to answer every probe with a single
//! bounds-checked array read. Built once by iterating the id table and
//! writing each position at its numeric id's index; a second write to the
//! same index means duplicate ids, which the direct engine rejects as
//! unsupported at construction time.

use types::MsgId;

use crate::engine::IdTable;
use crate::error::{RegistryError, RegistryResult};

/// O(1) id-to-ordinal lookup table.
#[derive(Debug, Clone)]
pub(crate) struct DirectTable {
    slots: Box<[Option<u32>]>,
}

impl DirectTable {
    /// Build the slot array, rejecting duplicate ids.
    pub(crate) fn build<T: IdTable + ?Sized>(table: &T) -> RegistryResult<Self> {
        let entries = table.entries();
        let width = (0..entries)
            .map(|pos| table.id_at(pos) as usize + 1)
            .max()
            .unwrap_or(0);

        let mut slots = vec![None; width].into_boxed_slice();
        for pos in 0..entries {
            let index = table.id_at(pos) as usize;
            if let Some(prev) = slots[index] {
                return Err(RegistryError::DuplicateDirectId {
                    id: index as MsgId,
                    first: table.name_at(prev as usize),
                    second: table.name_at(pos),
                });
            }
            slots[index] = Some(pos as u32);
        }

        Ok(Self { slots })
    }

    /// Bounds-checked O(1) probe. Direct tables hold unique ids, so any
    /// non-zero duplicate offset is a miss.
    pub(crate) fn locate(&self, id: MsgId, offset: u16) -> Option<usize> {
        if offset != 0 {
            return None;
        }
        self.slots
            .get(id as usize)
            .copied()
            .flatten()
            .map(|pos| pos as usize)
    }

    /// Number of slots the table spans (`max_id + 1`).
    #[cfg(test)]
    pub(crate) fn width(&self) -> usize {
        self.slots.len()
    }
}
