//! Binary-search dispatch over sorted id tables.
//!
//! The strong variant narrows a recursive midpoint split down to the single
//! position holding the probed id. The weak variant reuses the same search
//! to land anywhere inside a duplicate run, then resolves the run's start
//! and length from the [`RunTable`] - a cache computed by one linear scan at
//! construction time - and answers `run_start + offset` when the offset lies
//! inside the run. Sortedness makes equal-id runs contiguous, which is what
//! keeps duplicate dispatch at O(log n).

use types::MsgId;

use crate::engine::IdTable;

/// Find the position of `id` in a strictly increasing table.
pub(crate) fn locate_strong<T: IdTable + ?Sized>(table: &T, id: MsgId) -> Option<usize> {
    search(table, 0, table.entries(), id)
}

/// Recursive midpoint split over `[from, from + count)`.
fn search<T: IdTable + ?Sized>(table: &T, from: usize, count: usize, id: MsgId) -> Option<usize> {
    if count == 0 {
        return None;
    }
    let mid = from + count / 2;
    match id.cmp(&table.id_at(mid)) {
        std::cmp::Ordering::Equal => Some(mid),
        std::cmp::Ordering::Less => search(table, from, mid - from, id),
        std::cmp::Ordering::Greater => search(table, mid + 1, from + count - mid - 1, id),
    }
}

/// Cached duplicate-run geometry for a weakly sorted table.
///
/// For every position, records the start of the contiguous equal-id run
/// containing it and the run's total length. Equal for all members of one
/// run; built by a single left-to-right scan.
#[derive(Debug, Clone)]
pub(crate) struct RunTable {
    run_start: Box<[u32]>,
    run_len: Box<[u32]>,
}

impl RunTable {
    pub(crate) fn build<T: IdTable + ?Sized>(table: &T) -> Self {
        let entries = table.entries();
        let mut run_start = vec![0u32; entries].into_boxed_slice();
        let mut run_len = vec![0u32; entries].into_boxed_slice();

        let mut pos = 0;
        while pos < entries {
            let id = table.id_at(pos);
            let start = pos;
            let mut end = pos + 1;
            while end < entries && table.id_at(end) == id {
                end += 1;
            }
            for member in start..end {
                run_start[member] = start as u32;
                run_len[member] = (end - start) as u32;
            }
            pos = end;
        }

        Self { run_start, run_len }
    }

    /// Run geometry for the run containing `pos`: `(start, length)`.
    fn run_at(&self, pos: usize) -> (usize, usize) {
        (self.run_start[pos] as usize, self.run_len[pos] as usize)
    }
}

/// Find the position matching `(id, offset)` in a weakly sorted table.
pub(crate) fn locate_weak<T: IdTable + ?Sized>(
    table: &T,
    runs: &RunTable,
    id: MsgId,
    offset: u16,
) -> Option<usize> {
    let hit = search(table, 0, table.entries(), id)?;
    let (start, len) = runs.run_at(hit);
    let offset = offset as usize;
    if offset < len {
        Some(start + offset)
    } else {
        None
    }
}
