//! # Message Descriptors and Type Vtables
//!
//! ## Purpose
//!
//! The descriptor set is the ordered registry of message types a codec
//! instance knows about. Each entry pairs a type-erased vtable (constructor
//! trampolines, layout, metadata) with the type's wire id source and its
//! ordinal registration position. Registration order is load-bearing: for
//! duplicate ids, the ordinal order defines the zero-based duplicate-offset
//! numbering the dispatch engines resolve against.
//!
//! ## Architecture Role
//!
//! ```text
//! ProtocolMessage impls → [DescriptorSet] → codec dispatch/factory
//!          ↑                    ↓                    ↓
//!   define_message!       Vtable Metadata      Strategy Selection
//!   Concrete Types        Ordinal Order        Engine Tables
//! ```
//!
//! The set itself is pure data. Classification, strategy selection and the
//! engine tables built from it live in the codec crate; the descriptor set
//! never changes after `build()`.

use std::alloc::Layout;
use std::any::TypeId;
use std::ptr::NonNull;

use tracing::trace;

use crate::message::{Message, MsgId, ProtocolMessage};

/// Type-erased function table for one concrete message type.
///
/// One `&'static` instance exists per type (see [`vtable_of`]). The
/// constructor entries are the type-only trampolines the message factory
/// dispatches through: `create_boxed` serves the heap allocation discipline,
/// `create_in_place` and `drop_in_place` serve the single-slot arena.
#[derive(Debug)]
pub struct MessageVtable {
    /// Type name for diagnostics and error reporting.
    pub name: &'static str,
    /// Accessor for the concrete type's `TypeId`.
    pub type_id: fn() -> TypeId,
    /// Memory layout of the concrete type, used to size the in-place arena.
    pub layout: Layout,
    /// Build-time constant wire id, `None` for dynamic-id types.
    pub static_id: Option<MsgId>,
    /// Construct a fresh instance on the heap.
    pub create_boxed: fn(MsgId, u16) -> Box<dyn Message>,
    /// Construct a fresh instance into caller-provided storage.
    ///
    /// # Safety
    /// `dst` must be valid for writes of `layout` bytes and satisfy its
    /// alignment, and must not alias a live value.
    pub create_in_place: unsafe fn(NonNull<u8>, MsgId, u16) -> NonNull<dyn Message>,
    /// Run the destructor of a value previously produced by
    /// `create_in_place`, without freeing its storage.
    ///
    /// # Safety
    /// `value` must point at a live, in-place constructed instance of this
    /// vtable's type.
    pub drop_in_place: unsafe fn(NonNull<dyn Message>),
}

fn create_boxed_raw<T: ProtocolMessage>(id: MsgId, offset: u16) -> Box<dyn Message> {
    Box::new(T::from_wire(id, offset))
}

/// # Safety
/// `dst` must be valid for writes of `Layout::new::<T>()` and properly
/// aligned for `T`.
unsafe fn create_in_place_raw<T: ProtocolMessage>(
    dst: NonNull<u8>,
    id: MsgId,
    offset: u16,
) -> NonNull<dyn Message> {
    let typed = dst.as_ptr() as *mut T;
    typed.write(T::from_wire(id, offset));
    NonNull::new_unchecked(typed as *mut dyn Message)
}

/// # Safety
/// `value` must point at a live message value; its storage is left intact.
unsafe fn drop_in_place_raw(value: NonNull<dyn Message>) {
    std::ptr::drop_in_place(value.as_ptr());
}

trait HasVtable {
    const VTABLE: MessageVtable;
}

impl<T: ProtocolMessage> HasVtable for T {
    const VTABLE: MessageVtable = MessageVtable {
        name: T::NAME,
        type_id: TypeId::of::<T>,
        layout: Layout::new::<T>(),
        static_id: T::WIRE_ID,
        create_boxed: create_boxed_raw::<T>,
        create_in_place: create_in_place_raw::<T>,
        drop_in_place: drop_in_place_raw,
    };
}

/// The canonical `&'static` vtable for a message type.
///
/// Relies on constant promotion, so repeated calls for the same `T` are
/// free.
pub fn vtable_of<T: ProtocolMessage>() -> &'static MessageVtable {
    &<T as HasVtable>::VTABLE
}

/// How a descriptor's wire id is obtained.
#[derive(Debug, Clone, Copy)]
pub enum WireIdSource {
    /// Id is a build-time constant.
    Static(MsgId),
    /// Id is resolved through a call. The function must return a stable
    /// value once the type has been registered.
    Dynamic(fn() -> MsgId),
}

impl WireIdSource {
    /// Resolve the current wire id.
    pub fn resolve(&self) -> MsgId {
        match self {
            WireIdSource::Static(id) => *id,
            WireIdSource::Dynamic(f) => f(),
        }
    }

    /// The build-time constant id, if there is one.
    pub fn static_id(&self) -> Option<MsgId> {
        match self {
            WireIdSource::Static(id) => Some(*id),
            WireIdSource::Dynamic(_) => None,
        }
    }

    /// Whether the id is known at build time.
    pub fn is_static(&self) -> bool {
        matches!(self, WireIdSource::Static(_))
    }
}

/// Static metadata pairing a message type with its wire id and registration
/// order.
#[derive(Debug, Clone, Copy)]
pub struct MessageDescriptor {
    vtable: &'static MessageVtable,
    id: WireIdSource,
    ordinal: u16,
}

impl MessageDescriptor {
    /// The type-erased function table for this descriptor's message type.
    pub fn vtable(&self) -> &'static MessageVtable {
        self.vtable
    }

    /// Resolve the descriptor's wire id (a call for dynamic-id types).
    pub fn wire_id(&self) -> MsgId {
        self.id.resolve()
    }

    /// The build-time constant id, if there is one.
    pub fn static_id(&self) -> Option<MsgId> {
        self.id.static_id()
    }

    /// Whether this descriptor's id is known at build time.
    pub fn has_static_id(&self) -> bool {
        self.id.is_static()
    }

    /// Index of this descriptor within its set. For duplicate ids the
    /// ordinal order defines the duplicate-offset numbering.
    pub fn ordinal(&self) -> u16 {
        self.ordinal
    }

    /// Type name for diagnostics.
    pub fn name(&self) -> &'static str {
        self.vtable.name
    }

    /// Memory layout of the concrete message type.
    pub fn layout(&self) -> Layout {
        self.vtable.layout
    }
}

/// Ordered, immutable collection of message descriptors.
///
/// Built once through [`DescriptorSet::builder`] and never mutated
/// afterwards; every dispatch table in the codec crate is derived from it.
#[derive(Debug, Clone, Default)]
pub struct DescriptorSet {
    descriptors: Vec<MessageDescriptor>,
}

impl DescriptorSet {
    /// Start building a descriptor set.
    pub fn builder() -> DescriptorSetBuilder {
        DescriptorSetBuilder::default()
    }

    /// Number of registered descriptors.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// True when no descriptors are registered.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Descriptor at the given ordinal position.
    pub fn get(&self, ordinal: usize) -> Option<&MessageDescriptor> {
        self.descriptors.get(ordinal)
    }

    /// Iterate descriptors in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &MessageDescriptor> {
        self.descriptors.iter()
    }

    /// Number of descriptors sharing `id` (0, 1 or more).
    pub fn count(&self, id: MsgId) -> usize {
        self.descriptors.iter().filter(|d| d.wire_id() == id).count()
    }

    /// Largest build-time constant id in the set, when all ids are static.
    ///
    /// Returns `None` for an empty set or when any descriptor resolves its
    /// id at runtime; the direct-table heuristic only applies to fully
    /// static sets.
    pub fn max_static_id(&self) -> Option<MsgId> {
        self.descriptors
            .iter()
            .map(|d| d.static_id())
            .collect::<Option<Vec<_>>>()
            .and_then(|ids| ids.into_iter().max())
    }

    /// Combined layout able to hold any registered message plus the given
    /// extra layouts. Used to size the single-slot arena.
    pub fn max_layout(&self, extra: impl IntoIterator<Item = Layout>) -> Layout {
        let mut size = 0usize;
        let mut align = 1usize;
        for layout in self.descriptors.iter().map(|d| d.layout()).chain(extra) {
            size = size.max(layout.size());
            align = align.max(layout.align());
        }
        // Size and alignment both come from already-valid layouts.
        Layout::from_size_align(size, align).expect("max of valid layouts is a valid layout")
    }
}

/// Builder for [`DescriptorSet`]; registration order is preserved.
#[derive(Debug, Default)]
pub struct DescriptorSetBuilder {
    descriptors: Vec<MessageDescriptor>,
}

impl DescriptorSetBuilder {
    /// Register a message type at the next ordinal position.
    ///
    /// Types with `WIRE_ID = None` are registered with a dynamic id source
    /// backed by [`ProtocolMessage::current_wire_id`].
    pub fn register<T: ProtocolMessage>(mut self) -> Self {
        let id = match T::WIRE_ID {
            Some(value) => WireIdSource::Static(value),
            None => WireIdSource::Dynamic(T::current_wire_id),
        };
        debug_assert!(
            self.descriptors.len() < usize::from(u16::MAX),
            "descriptor ordinal space exhausted"
        );
        let ordinal = u16::try_from(self.descriptors.len()).unwrap_or(u16::MAX);
        trace!(
            name = T::NAME,
            ordinal,
            static_id = ?T::WIRE_ID,
            "registered message descriptor"
        );
        self.descriptors.push(MessageDescriptor {
            vtable: vtable_of::<T>(),
            id,
            ordinal,
        });
        self
    }

    /// Finalize the set.
    pub fn build(self) -> DescriptorSet {
        DescriptorSet {
            descriptors: self.descriptors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::define_message;

    define_message! {
        /// Fixture heartbeat message.
        pub struct Heartbeat { pub seq: u64 } => id = 100;
    }

    define_message! {
        /// Fixture trade report.
        pub struct TradeReport { pub price: i64, pub volume: i64 } => id = 1;
    }

    #[test]
    fn registration_assigns_ordinals_in_order() {
        let set = DescriptorSet::builder()
            .register::<TradeReport>()
            .register::<Heartbeat>()
            .build();

        assert_eq!(set.len(), 2);
        assert_eq!(set.get(0).map(|d| d.name()), Some("TradeReport"));
        assert_eq!(set.get(1).map(|d| d.ordinal()), Some(1));
        assert_eq!(set.get(1).map(|d| d.wire_id()), Some(100));
        assert!(set.get(2).is_none());
    }

    #[test]
    fn count_reflects_duplicate_registration() {
        let set = DescriptorSet::builder()
            .register::<Heartbeat>()
            .register::<Heartbeat>()
            .register::<TradeReport>()
            .build();

        assert_eq!(set.count(100), 2);
        assert_eq!(set.count(1), 1);
        assert_eq!(set.count(42), 0);
    }

    #[test]
    fn max_static_id_covers_all_descriptors() {
        let set = DescriptorSet::builder()
            .register::<TradeReport>()
            .register::<Heartbeat>()
            .build();
        assert_eq!(set.max_static_id(), Some(100));

        let empty = DescriptorSet::builder().build();
        assert_eq!(empty.max_static_id(), None);
    }

    #[test]
    fn max_layout_accommodates_largest_message() {
        let set = DescriptorSet::builder()
            .register::<Heartbeat>()
            .register::<TradeReport>()
            .build();

        let layout = set.max_layout(None);
        assert!(layout.size() >= std::mem::size_of::<TradeReport>());
        assert!(layout.align() >= std::mem::align_of::<Heartbeat>());
    }

    #[test]
    fn vtable_constructs_and_drops_boxed_values() {
        let vtable = vtable_of::<Heartbeat>();
        assert_eq!(vtable.name, "Heartbeat");
        assert_eq!(vtable.static_id, Some(100));
        assert_eq!((vtable.type_id)(), TypeId::of::<Heartbeat>());

        let boxed = (vtable.create_boxed)(100, 0);
        assert_eq!(boxed.wire_id(), 100);
        assert!(boxed.is::<Heartbeat>());
    }

    #[test]
    fn vtable_in_place_construction_round_trips() {
        let vtable = vtable_of::<TradeReport>();

        // TradeReport is i64-aligned, so a plain u8 stack array is not
        // guaranteed to satisfy the vtable's layout; over-align manually.
        #[repr(align(8))]
        struct Aligned([u8; std::mem::size_of::<TradeReport>()]);
        let mut aligned = Aligned([0u8; std::mem::size_of::<TradeReport>()]);
        let dst = NonNull::new(aligned.0.as_mut_ptr()).expect("stack storage");

        let value = unsafe { (vtable.create_in_place)(dst, 1, 0) };
        let msg = unsafe { value.as_ref() };
        assert_eq!(msg.wire_id(), 1);
        unsafe { (vtable.drop_in_place)(value) };
    }
}
