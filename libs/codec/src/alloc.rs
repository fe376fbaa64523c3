//! # Message Allocators and Owned Handles
//!
//! ## Purpose
//!
//! The two allocation disciplines behind the message factory. The dynamic
//! allocator produces independently owned heap values with independent
//! lifetimes. The in-place allocator is an arena of one: a single aligned
//! storage region sized to the largest registered message, holding at most
//! one live value across the whole factory. A create against an occupied
//! slot fails with `SlotOccupied` - it never silently reuses storage - and
//! releasing the returned handle runs the value's destructor and frees the
//! slot before any subsequent create can succeed. That single-outstanding-
//! object discipline is what guarantees zero dynamic allocation per message
//! on constrained targets.
//!
//! ## Concurrency
//!
//! The slot allocator's occupancy flag is a `Cell`, so the type is `!Sync`
//! and the compiler enforces the protocol's contract that in-place
//! create/release traffic is externally serialized. The heap allocator has
//! no state and is freely shareable.

use std::alloc::Layout;
use std::cell::Cell;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

use types::{DescriptorSet, GenericMessage, Message, MessageVtable, MsgId};

use crate::error::AllocError;

/// Exclusively owned handle to a message value.
///
/// Carries the release behavior of the discipline that produced it: heap
/// handles drop like any box, slot handles run the value's destructor in
/// place and mark the arena free.
pub struct MsgPtr<'a> {
    inner: PtrInner<'a>,
}

enum PtrInner<'a> {
    Heap(Box<dyn Message>),
    Slot {
        value: NonNull<dyn Message>,
        vtable: &'static MessageVtable,
        occupancy: &'a Cell<bool>,
    },
}

impl<'a> MsgPtr<'a> {
    pub(crate) fn heap(value: Box<dyn Message>) -> Self {
        Self {
            inner: PtrInner::Heap(value),
        }
    }

    /// # Safety
    /// `value` must point at a live, in-place constructed instance of
    /// `vtable`'s type whose storage stays valid for `'a`, and `occupancy`
    /// must be the flag guarding that storage (already set to occupied).
    pub(crate) unsafe fn slot(
        value: NonNull<dyn Message>,
        vtable: &'static MessageVtable,
        occupancy: &'a Cell<bool>,
    ) -> Self {
        Self {
            inner: PtrInner::Slot {
                value,
                vtable,
                occupancy,
            },
        }
    }

    /// True when this handle owns the single in-place slot.
    pub fn is_in_place(&self) -> bool {
        matches!(self.inner, PtrInner::Slot { .. })
    }

    /// Wire id of the owned message.
    pub fn wire_id(&self) -> MsgId {
        (**self).wire_id()
    }

    /// Downcast the owned message to a concrete type.
    pub fn downcast_ref<T: Message>(&self) -> Option<&T> {
        (**self).downcast_ref::<T>()
    }

    /// Downcast the owned message to a concrete type, mutably.
    pub fn downcast_mut<T: Message>(&mut self) -> Option<&mut T> {
        (**self).downcast_mut::<T>()
    }
}

impl Deref for MsgPtr<'_> {
    type Target = dyn Message;

    fn deref(&self) -> &Self::Target {
        match &self.inner {
            PtrInner::Heap(value) => value.as_ref(),
            // Valid while the handle lives: the slot cannot be reallocated
            // before the occupancy flag is cleared in our Drop.
            PtrInner::Slot { value, .. } => unsafe { value.as_ref() },
        }
    }
}

impl DerefMut for MsgPtr<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.inner {
            PtrInner::Heap(value) => value.as_mut(),
            PtrInner::Slot { value, .. } => unsafe { value.as_mut() },
        }
    }
}

impl Drop for MsgPtr<'_> {
    fn drop(&mut self) {
        if let PtrInner::Slot {
            value,
            vtable,
            occupancy,
        } = &self.inner
        {
            // Destructor first, then free the slot for the next create. The
            // vtable entry pairs with the create_in_place that produced the
            // value.
            unsafe { (vtable.drop_in_place)(*value) };
            occupancy.set(false);
        }
    }
}

impl std::fmt::Debug for MsgPtr<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MsgPtr")
            .field("type", &self.type_name())
            .field("wire_id", &self.wire_id())
            .field("in_place", &self.is_in_place())
            .finish()
    }
}

/// Allocation discipline consumed by the message factory.
pub trait MessageAllocator {
    /// Produce an owned instance of the type described by `vtable`.
    fn allocate(
        &self,
        vtable: &'static MessageVtable,
        id: MsgId,
        offset: u16,
    ) -> Result<MsgPtr<'_>, AllocError>;

    /// Whether a create could currently succeed (storage-wise).
    fn can_allocate(&self) -> bool {
        true
    }

    /// Whether a message of the given layout fits this allocator. Checked
    /// for every descriptor at factory construction.
    fn fits(&self, layout: Layout) -> bool {
        let _ = layout;
        true
    }

    /// Fixed storage capacity in bytes, if this allocator has one.
    fn capacity(&self) -> Option<usize> {
        None
    }
}

/// Dynamic discipline: every create yields an independently owned heap
/// value; releasing one handle never affects another.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapAllocator;

impl MessageAllocator for HeapAllocator {
    fn allocate(
        &self,
        vtable: &'static MessageVtable,
        id: MsgId,
        offset: u16,
    ) -> Result<MsgPtr<'_>, AllocError> {
        Ok(MsgPtr::heap((vtable.create_boxed)(id, offset)))
    }
}

/// In-place discipline: one aligned storage region, at most one live value.
pub struct SlotAllocator {
    storage: NonNull<u8>,
    layout: Layout,
    occupied: Cell<bool>,
}

/// Clears the occupancy flag on unwind; a panicking message constructor
/// must not wedge the slot.
struct OccupancyGuard<'a>(&'a Cell<bool>);

impl Drop for OccupancyGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl SlotAllocator {
    /// Allocate a slot with an explicit layout.
    pub fn with_layout(layout: Layout) -> Self {
        let storage = if layout.size() == 0 {
            // Aligned dangling pointer; nothing is ever written through it
            // beyond zero-sized values.
            NonNull::new(layout.align() as *mut u8).unwrap_or(NonNull::dangling())
        } else {
            // SAFETY: layout has non-zero size.
            let raw = unsafe { std::alloc::alloc(layout) };
            NonNull::new(raw).unwrap_or_else(|| std::alloc::handle_alloc_error(layout))
        };
        Self {
            storage,
            layout,
            occupied: Cell::new(false),
        }
    }

    /// Allocate a slot sized to the largest message in the set, including
    /// the generic fallback wrapper when that capability is enabled.
    pub fn for_set(set: &DescriptorSet, include_generic: bool) -> Self {
        let extra = include_generic.then(Layout::new::<GenericMessage>);
        Self::with_layout(set.max_layout(extra))
    }

    /// Capacity of the slot in bytes.
    pub fn capacity(&self) -> usize {
        self.layout.size()
    }

    /// True while a live value occupies the slot.
    pub fn is_occupied(&self) -> bool {
        self.occupied.get()
    }
}

impl MessageAllocator for SlotAllocator {
    fn allocate(
        &self,
        vtable: &'static MessageVtable,
        id: MsgId,
        offset: u16,
    ) -> Result<MsgPtr<'_>, AllocError> {
        if self.occupied.get() {
            return Err(AllocError::SlotOccupied);
        }
        if !self.fits(vtable.layout) {
            return Err(AllocError::SlotTooSmall {
                message: vtable.name,
                required: vtable.layout.size(),
                capacity: self.capacity(),
            });
        }

        self.occupied.set(true);
        let reset = OccupancyGuard(&self.occupied);
        // SAFETY: the slot is unoccupied, sized and aligned for any layout
        // accepted by `fits`, and stays allocated for the handle's lifetime.
        let value = unsafe { (vtable.create_in_place)(self.storage, id, offset) };
        // Construction completed; the handle now owns the release.
        std::mem::forget(reset);
        Ok(unsafe { MsgPtr::slot(value, vtable, &self.occupied) })
    }

    fn can_allocate(&self) -> bool {
        !self.occupied.get()
    }

    fn fits(&self, layout: Layout) -> bool {
        layout.size() <= self.layout.size() && layout.align() <= self.layout.align()
    }

    fn capacity(&self) -> Option<usize> {
        Some(self.layout.size())
    }
}

impl Drop for SlotAllocator {
    fn drop(&mut self) {
        // Outstanding handles borrow the allocator, so the slot is free here
        // unless a handle was leaked - in which case the value's destructor
        // was skipped by the leak and only the storage is reclaimed.
        if self.layout.size() > 0 {
            // SAFETY: allocated in with_layout with the same layout.
            unsafe { std::alloc::dealloc(self.storage.as_ptr(), self.layout) };
        }
    }
}

impl std::fmt::Debug for SlotAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotAllocator")
            .field("capacity", &self.capacity())
            .field("align", &self.layout.align())
            .field("occupied", &self.occupied.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::{define_message, vtable_of};

    define_message! { pub struct Small { pub a: u8 } => id = 1; }
    define_message! { pub struct Large { pub xs: [u64; 4] } => id = 2; }

    fn set() -> DescriptorSet {
        DescriptorSet::builder()
            .register::<Small>()
            .register::<Large>()
            .build()
    }

    #[test]
    fn heap_allocator_yields_independent_values() {
        let alloc = HeapAllocator;
        let a = alloc.allocate(vtable_of::<Small>(), 1, 0).expect("alloc a");
        let b = alloc.allocate(vtable_of::<Large>(), 2, 0).expect("alloc b");

        assert!(alloc.can_allocate());
        assert_eq!(a.wire_id(), 1);
        assert_eq!(b.wire_id(), 2);
        drop(a);
        // b unaffected by releasing a
        assert!(b.downcast_ref::<Large>().is_some());
    }

    #[test]
    fn slot_allocator_enforces_single_outstanding_value() {
        let alloc = SlotAllocator::for_set(&set(), false);
        assert!(alloc.can_allocate());

        let first = alloc.allocate(vtable_of::<Small>(), 1, 0).expect("first");
        assert!(first.is_in_place());
        assert!(!alloc.can_allocate());

        let second = alloc.allocate(vtable_of::<Large>(), 2, 0);
        assert_eq!(second.err(), Some(AllocError::SlotOccupied));

        drop(first);
        assert!(alloc.can_allocate());
        let third = alloc.allocate(vtable_of::<Large>(), 2, 0).expect("third");
        assert_eq!(third.wire_id(), 2);
    }

    #[test]
    fn slot_is_sized_to_the_largest_message() {
        let alloc = SlotAllocator::for_set(&set(), false);
        assert!(alloc.capacity() >= std::mem::size_of::<Large>());
        assert!(alloc.fits(Layout::new::<Small>()));
        assert!(alloc.fits(Layout::new::<Large>()));
    }

    #[test]
    fn undersized_slot_reports_too_small() {
        let alloc = SlotAllocator::with_layout(Layout::new::<u8>());
        let err = alloc
            .allocate(vtable_of::<Large>(), 2, 0)
            .expect_err("layout exceeds slot");
        assert!(matches!(err, AllocError::SlotTooSmall { .. }));
        // The failed attempt must not leave the slot marked occupied.
        assert!(alloc.can_allocate());
    }

    #[test]
    fn slot_release_runs_destructors() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        static DROPS: AtomicUsize = AtomicUsize::new(0);

        #[derive(Debug, Default)]
        struct Probe;

        impl Drop for Probe {
            fn drop(&mut self) {
                DROPS.fetch_add(1, Ordering::SeqCst);
            }
        }

        impl Message for Probe {
            fn wire_id(&self) -> MsgId {
                77
            }
            fn type_name(&self) -> &'static str {
                "Probe"
            }
            fn as_any(&self) -> &dyn std::any::Any {
                self
            }
            fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
                self
            }
        }

        impl types::ProtocolMessage for Probe {
            const WIRE_ID: Option<MsgId> = Some(77);
            const NAME: &'static str = "Probe";
            fn current_wire_id() -> MsgId {
                77
            }
            fn from_wire(_id: MsgId, _offset: u16) -> Self {
                Probe
            }
        }

        let alloc = SlotAllocator::with_layout(Layout::new::<Probe>());
        let handle = alloc.allocate(vtable_of::<Probe>(), 77, 0).expect("probe");
        assert_eq!(DROPS.load(Ordering::SeqCst), 0);
        drop(handle);
        assert_eq!(DROPS.load(Ordering::SeqCst), 1);
        assert!(alloc.can_allocate());
    }

    #[test]
    fn panicking_constructor_leaves_the_slot_free() {
        #[derive(Debug)]
        struct Exploding {
            _pad: u64,
        }

        impl Message for Exploding {
            fn wire_id(&self) -> MsgId {
                88
            }
            fn type_name(&self) -> &'static str {
                "Exploding"
            }
            fn as_any(&self) -> &dyn std::any::Any {
                self
            }
            fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
                self
            }
        }

        impl types::ProtocolMessage for Exploding {
            const WIRE_ID: Option<MsgId> = Some(88);
            const NAME: &'static str = "Exploding";
            fn current_wire_id() -> MsgId {
                88
            }
            fn from_wire(_id: MsgId, _offset: u16) -> Self {
                panic!("constructor failure")
            }
        }

        let alloc = SlotAllocator::with_layout(Layout::new::<Exploding>());
        let unwound = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = alloc.allocate(vtable_of::<Exploding>(), 88, 0);
        }));
        assert!(unwound.is_err());
        // The failed construction must not leave the slot marked occupied.
        assert!(alloc.can_allocate());
        assert!(alloc.allocate(vtable_of::<Small>(), 1, 0).is_ok());
    }

    #[test]
    fn zero_size_slot_handles_field_less_messages() {
        define_message! { pub struct Empty {} => id = 3; }

        let set = DescriptorSet::builder().register::<Empty>().build();
        let alloc = SlotAllocator::for_set(&set, false);
        assert_eq!(alloc.capacity(), 0);

        let handle = alloc.allocate(vtable_of::<Empty>(), 3, 0).expect("empty");
        assert_eq!(handle.wire_id(), 3);
        drop(handle);
        assert!(alloc.can_allocate());
    }

    #[test]
    fn slot_too_small_check_failure_precedes_occupancy() {
        let alloc = SlotAllocator::with_layout(Layout::new::<u64>());
        let ok = alloc.allocate(vtable_of::<Small>(), 1, 0).expect("fits");
        drop(ok);

        let err = alloc.allocate(vtable_of::<Large>(), 2, 0);
        assert!(matches!(err, Err(AllocError::SlotTooSmall { .. })));
        assert!(alloc.allocate(vtable_of::<Small>(), 1, 0).is_ok());
    }
}
