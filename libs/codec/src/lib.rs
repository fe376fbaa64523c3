//! # Keel Protocol Codec - Dispatch and Allocation Core
//!
//! ## Purpose
//!
//! This crate contains the "Rules" layer of the Keel framework: given a
//! numeric message-type identifier extracted from a wire frame, it routes
//! to strongly-typed handling code and constructs concrete message objects.
//! The framework targets resource-constrained environments, so both
//! operations are usable without dynamic memory (single-slot in-place
//! allocation) and resolve to the fastest feasible algorithm for the
//! statically-known set of message types.
//!
//! ## Integration Points
//!
//! - **Descriptor Sets**: registered message types come from `libs/types`
//! - **Typed Dispatch**: `Dispatcher<H>` monomorphizes per-handler
//!   trampolines - matched frames arrive as concrete `&T` references
//! - **Polymorphic Dispatch**: `PolyRegistry` keeps handlers decoupled from
//!   concrete types via virtual trampolines
//! - **Message Construction**: `MessageFactory` composes instance-free
//!   dispatch with a heap or in-place allocation discipline
//! - **Process-Wide Tables**: `OnceRegistry` documents and enforces the
//!   build-once / read-only-thereafter contract
//!
//! ## Architecture Role
//!
//! ```text
//! libs/types → [codec dispatch core] → protocol stack / application
//!     ↑               ↓                        ↓
//! Pure Data     Strategy Selection        Typed Handlers
//! Descriptors   Engine Tables             Owned Messages
//! Vtables       Allocators                Generic Fallback
//! ```
//!
//! ## Strategy Selection
//!
//! A descriptor set is classified once (static ids? sorted? duplicates?)
//! and mapped deterministically to one of six strategies: a no-op for the
//! empty set, a direct-indexed table for dense static unique ids, binary
//! search (strong/weak) for sorted sets, and linear scan otherwise. All
//! engines answer every `(id, offset)` probe identically - the algorithms
//! differ only in cost. The direct-table density heuristic is a tuning
//! constant carried in [`DispatchConfig`], not a hard-coded law.
//!
//! ## Error Philosophy
//!
//! Unknown ids and an occupied in-place slot are normal outcomes, returned
//! as values. Misconfiguration - incompatible strategy overrides, duplicate
//! ids under a direct table, an undersized slot - is rejected when tables
//! are built, never deferred to a dispatch call.

// Core modules
pub mod alloc;
pub mod analyzer;
pub mod config;
pub mod dispatch;
mod engine;
pub mod error;
pub mod factory;
pub mod polymorphic;
pub mod registry;
pub mod strategy;

// Re-export key types for convenience
pub use alloc::{HeapAllocator, MessageAllocator, MsgPtr, SlotAllocator};
pub use analyzer::{classify, SetClassification, Sortedness};
pub use config::{DirectTableHeuristic, DispatchConfig};
pub use dispatch::{Dispatcher, DispatcherBuilder, HandleMessage, MessageHandler};
pub use error::{AllocError, CreateError, CreateResult, RegistryError, RegistryResult};
pub use factory::{FactoryBuilder, MessageFactory};
pub use polymorphic::{PolyHandler, PolyRegistry, PolyRegistryBuilder};
pub use registry::OnceRegistry;
pub use strategy::{select_strategy, StrategyKind};

// Re-export the type layer so downstream crates can depend on codec alone
pub use types::{
    DescriptorSet, DescriptorSetBuilder, GenericMessage, Message, MessageDescriptor,
    MessageVtable, MsgId, ProtocolMessage,
};
