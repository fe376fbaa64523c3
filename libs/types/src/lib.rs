//! # Keel Message Type Library
//!
//! ## Purpose
//!
//! Pure data layer of the Keel binary protocol framework: the message trait
//! contract, the type-erased vtable machinery, the ordered descriptor set
//! the codec derives its dispatch tables from, and the generic fallback
//! message for unrecognized ids. No dispatch rules or allocation logic live
//! here - those belong to the codec crate.
//!
//! ## Design Philosophy
//!
//! - **Registration order is semantic**: duplicate-id handling is defined by
//!   ordinal position, so the descriptor set is an ordered collection
//! - **Static first, dynamic possible**: wire ids are build-time constants
//!   for the common case; dynamic-only types opt into runtime resolution at
//!   the cost of linear dispatch
//! - **Type erasure at the edge**: concrete types are erased exactly once,
//!   into a per-type `&'static MessageVtable`, and recovered via `Any`
//!   downcasts on the matched dispatch path
//! - **Build once, read forever**: a built `DescriptorSet` is immutable;
//!   every derived table inherits that contract
//!
//! ## Architecture Role
//!
//! ```text
//! define_message! → [types] → codec (strategy, engines, factory)
//!        ↑             ↓              ↓
//!   Concrete       Descriptors   Dispatch Tables
//!   Messages       Vtables       Allocators
//! ```

pub mod descriptor;
pub mod generic;
pub mod macros;
pub mod message;

pub use descriptor::{
    vtable_of, DescriptorSet, DescriptorSetBuilder, MessageDescriptor, MessageVtable, WireIdSource,
};
pub use generic::GenericMessage;
pub use message::{Message, MsgId, ProtocolMessage};
