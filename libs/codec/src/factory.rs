//! # Message Factory
//!
//! ## Purpose
//!
//! Turns a wire id (plus duplicate offset) into an owned message instance:
//! the instance-free dispatch mode composed with an allocation discipline.
//! The engine locates the matching descriptor exactly as any dispatch does;
//! the descriptor's vtable constructor entries are the type-only trampolines
//! the allocator materializes the value through. Failure is a plain return
//! value - `InvalidId` when nothing matches, `AllocFailure` when a
//! descriptor matched but storage could not be produced - never a panic.
//!
//! ## Integration Points
//!
//! - **Strategy Selector**: the factory's engine is selected by the same
//!   rules as every other dispatch table and is introspectable through
//!   `active_strategy()`
//! - **Allocators**: heap for independent lifetimes, single-slot arena for
//!   zero-dynamic-allocation targets
//! - **Generic Fallback**: when enabled, unrecognized ids materialize as
//!   `GenericMessage` wrappers instead of failing

use tracing::{debug, warn};
use types::{vtable_of, DescriptorSet, GenericMessage, MsgId, ProtocolMessage};

use crate::alloc::{HeapAllocator, MessageAllocator, MsgPtr, SlotAllocator};
use crate::analyzer::{classify, SetClassification};
use crate::config::DispatchConfig;
use crate::engine::DispatchEngine;
use crate::error::{CreateError, CreateResult, RegistryError, RegistryResult};
use crate::strategy::{select_strategy, StrategyKind};

/// Message factory bound to one allocation discipline.
///
/// Built once from a descriptor set; all state except the allocator's slot
/// occupancy is read-only thereafter.
pub struct MessageFactory<A: MessageAllocator = HeapAllocator> {
    set: DescriptorSet,
    engine: DispatchEngine,
    classification: SetClassification,
    allocator: A,
    generic_fallback: bool,
}

impl MessageFactory<HeapAllocator> {
    /// Start building a factory.
    pub fn builder() -> FactoryBuilder {
        FactoryBuilder::new()
    }
}

impl<A: MessageAllocator> MessageFactory<A> {
    /// Construct an owned instance of the message type registered for
    /// `(id, offset)`.
    pub fn create(&self, id: MsgId, offset: u16) -> CreateResult<MsgPtr<'_>> {
        let invalid = || CreateError::InvalidId {
            id,
            offset,
            registered: self.set.len(),
        };
        let pos = self
            .engine
            .locate(&self.set, id, offset)
            .ok_or_else(invalid)?;
        // Engine positions always index the set; the guard keeps this path
        // panic-free regardless.
        let descriptor = self.set.get(pos).ok_or_else(invalid)?;
        self.allocator
            .allocate(descriptor.vtable(), id, offset)
            .map_err(|source| CreateError::AllocFailure { id, source })
    }

    /// Construct a [`GenericMessage`] wrapper carrying `id`, bypassing
    /// normal dispatch matching.
    ///
    /// Returns `None` unless the generic-message capability was enabled at
    /// build time, or when the allocator cannot currently produce storage.
    pub fn create_generic(&self, id: MsgId) -> Option<MsgPtr<'_>> {
        if !self.generic_fallback {
            warn!(id, "create_generic called with the generic fallback disabled");
            return None;
        }
        self.allocator
            .allocate(vtable_of::<GenericMessage>(), id, 0)
            .ok()
    }

    /// Whether a create could currently succeed, storage-wise. Always true
    /// under the heap discipline; false while the in-place slot is occupied.
    pub fn can_allocate(&self) -> bool {
        self.allocator.can_allocate()
    }

    /// Number of descriptors sharing `id` (0, 1 or more), independent of
    /// allocation state.
    pub fn count(&self, id: MsgId) -> usize {
        self.set.count(id)
    }

    /// True iff no two descriptors share a wire id.
    pub fn has_unique_ids(&self) -> bool {
        !self.classification.has_duplicates
    }

    /// The dispatch algorithm selected for this factory.
    pub fn active_strategy(&self) -> StrategyKind {
        self.engine.kind()
    }

    /// The registered descriptor set.
    pub fn descriptors(&self) -> &DescriptorSet {
        &self.set
    }

    /// Classification computed at build time.
    pub fn classification(&self) -> SetClassification {
        self.classification
    }
}

impl<A: MessageAllocator + std::fmt::Debug> std::fmt::Debug for MessageFactory<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageFactory")
            .field("descriptors", &self.set.len())
            .field("strategy", &self.active_strategy())
            .field("allocator", &self.allocator)
            .field("generic_fallback", &self.generic_fallback)
            .finish()
    }
}

/// Builder for [`MessageFactory`].
#[derive(Debug, Default)]
pub struct FactoryBuilder {
    set: types::DescriptorSetBuilder,
    config: DispatchConfig,
}

impl FactoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a message type at the next ordinal position.
    pub fn register<T: ProtocolMessage>(mut self) -> Self {
        self.set = self.set.register::<T>();
        self
    }

    /// Replace the dispatch configuration.
    pub fn with_config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Enable materialization of unrecognized ids as `GenericMessage`.
    pub fn enable_generic_messages(mut self) -> Self {
        self.config.generic_fallback = true;
        self
    }

    fn prepare(self) -> RegistryResult<(DescriptorSet, DispatchEngine, SetClassification, bool)> {
        let set = self.set.build();
        let classification = classify(&set);
        let kind = select_strategy(&classification, &set, &self.config)?;
        let engine = DispatchEngine::build(kind, &set)?;
        debug!(
            strategy = kind.name(),
            descriptors = set.len(),
            generic_fallback = self.config.generic_fallback,
            "message factory built"
        );
        Ok((set, engine, classification, self.config.generic_fallback))
    }

    /// Build a factory under the dynamic (heap) discipline.
    pub fn build(self) -> RegistryResult<MessageFactory<HeapAllocator>> {
        let (set, engine, classification, generic_fallback) = self.prepare()?;
        Ok(MessageFactory {
            set,
            engine,
            classification,
            allocator: HeapAllocator,
            generic_fallback,
        })
    }

    /// Build a factory under the in-place discipline, with the single slot
    /// sized to the largest registered message.
    pub fn build_in_place(self) -> RegistryResult<MessageFactory<SlotAllocator>> {
        let (set, engine, classification, generic_fallback) = self.prepare()?;
        let allocator = SlotAllocator::for_set(&set, generic_fallback);
        Ok(MessageFactory {
            set,
            engine,
            classification,
            allocator,
            generic_fallback,
        })
    }

    /// Build a factory over a caller-supplied allocator.
    ///
    /// Every registered descriptor's layout is validated against the
    /// allocator here; an undersized in-place region is rejected at build
    /// time rather than surfacing as runtime `AllocFailure`s.
    pub fn build_with_allocator<A: MessageAllocator>(
        self,
        allocator: A,
    ) -> RegistryResult<MessageFactory<A>> {
        let (set, engine, classification, generic_fallback) = self.prepare()?;

        let capacity = allocator.capacity().unwrap_or(0);
        for descriptor in set.iter() {
            if !allocator.fits(descriptor.layout()) {
                return Err(RegistryError::SlotTooSmall {
                    message: descriptor.name(),
                    required: descriptor.layout().size(),
                    align: descriptor.layout().align(),
                    capacity,
                });
            }
        }
        if generic_fallback && !allocator.fits(std::alloc::Layout::new::<GenericMessage>()) {
            return Err(RegistryError::SlotTooSmall {
                message: GenericMessage::NAME,
                required: std::mem::size_of::<GenericMessage>(),
                align: std::mem::align_of::<GenericMessage>(),
                capacity,
            });
        }

        Ok(MessageFactory {
            set,
            engine,
            classification,
            allocator,
            generic_fallback,
        })
    }
}
