//! # Core Message Traits
//!
//! ## Purpose
//!
//! Defines the two-level trait contract every Keel wire message satisfies:
//! [`Message`] is the object-safe runtime view (numeric wire id, type name,
//! `Any`-based downcasting) and [`ProtocolMessage`] is the compile-time view
//! (optional build-time constant id, factory constructor). The split mirrors
//! the protocol's two id resolution paths: most message types carry their id
//! as a build-time constant, while dynamic-only types resolve it through a
//! call at registration time.
//!
//! ## Integration Points
//!
//! - **Descriptor Registration**: `DescriptorSet` captures `WIRE_ID` or
//!   `current_wire_id` per registered type
//! - **Dispatch**: handlers receive `&dyn Message` on the fallback path and
//!   concrete `&T` on the matched path
//! - **Factory Construction**: `from_wire` is the uniform constructor the
//!   allocator trampolines call

use std::any::Any;

/// Numeric wire identifier for a message type.
///
/// The protocol fixes message-type identifiers to `u16`, the same way the
/// TLV type registry fixes type numbers to a concrete integer width. Within
/// a descriptor set the identifier doubles as a direct-table index, so it
/// must stay a small dense integer for the fast dispatch path to apply.
pub type MsgId = u16;

/// Object-safe runtime view of a wire message.
///
/// Every concrete message type implements this, usually through the
/// [`define_message!`](crate::define_message) macro. The trait is
/// deliberately minimal: the dispatch core only ever needs the numeric id
/// and a way to recover the concrete type on the matched path.
pub trait Message: Any {
    /// Numeric wire id of this message instance.
    ///
    /// For statically-identified types this returns the build-time constant;
    /// for dynamic types it is the runtime accessor the protocol resolves
    /// ids through.
    fn wire_id(&self) -> MsgId;

    /// Human-readable type name for logging and error reporting.
    fn type_name(&self) -> &'static str;

    /// Upcast for downcasting to the concrete message type.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting to the concrete message type.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl dyn Message {
    /// Returns `true` if the concrete type of this message is `T`.
    pub fn is<T: Message>(&self) -> bool {
        self.as_any().is::<T>()
    }

    /// Downcast to a concrete message type.
    pub fn downcast_ref<T: Message>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Downcast to a concrete message type, mutably.
    pub fn downcast_mut<T: Message>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

/// Compile-time contract for registrable message types.
///
/// This is what the descriptor builder, the typed dispatcher and the message
/// factory require of a concrete type. `WIRE_ID` is `Some` for the common
/// case of a build-time constant id; dynamic-only types set it to `None` and
/// resolve their id through [`current_wire_id`](ProtocolMessage::current_wire_id)
/// instead, which collapses the whole set's sortedness classification to
/// `Unsorted` and forces the linear dispatch engine.
pub trait ProtocolMessage: Message + Sized {
    /// Build-time constant wire id, or `None` when the id is only known at
    /// runtime.
    const WIRE_ID: Option<MsgId>;

    /// Type name used for descriptor metadata and diagnostics.
    const NAME: &'static str;

    /// Resolve the current wire id for this type.
    ///
    /// Called once at registration for dynamic-id types and on every
    /// comparison the linear engine performs against such a descriptor. The
    /// returned value must be stable from the moment the type is registered;
    /// dispatch tables are built once and never rebuilt.
    fn current_wire_id() -> MsgId;

    /// Uniform factory constructor.
    ///
    /// Produces an empty instance ready for field decoding. `id` and
    /// `offset` identify which descriptor the factory matched; most types
    /// ignore both (their identity is the type itself), the generic fallback
    /// message records `id`.
    fn from_wire(id: MsgId, offset: u16) -> Self;
}
