//! Linear-scan dispatch.
//!
//! O(n) worst case with no sortedness requirement, which makes it the only
//! engine valid for sets whose ids are resolved at runtime. For small dense
//! id constants the sequential comparison chain typically compiles down to a
//! jump table anyway. The weak variant counts how many earlier positions
//! share the probed id, so duplicate offsets resolve in registration order
//! even when the duplicates are not contiguous.

use types::MsgId;

use crate::engine::IdTable;

/// First position holding `id`, scanning in registration order.
pub(crate) fn locate_strong<T: IdTable + ?Sized>(table: &T, id: MsgId) -> Option<usize> {
    (0..table.entries()).find(|&pos| table.id_at(pos) == id)
}

/// Position of the `offset`-th occurrence of `id` in registration order.
pub(crate) fn locate_weak<T: IdTable + ?Sized>(
    table: &T,
    id: MsgId,
    offset: u16,
) -> Option<usize> {
    let mut seen = 0u16;
    for pos in 0..table.entries() {
        if table.id_at(pos) == id {
            if seen == offset {
                return Some(pos);
            }
            seen += 1;
        }
    }
    None
}
