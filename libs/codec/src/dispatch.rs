//! # Typed Message Dispatch
//!
//! ## Purpose
//!
//! The compile-time-substitution dispatch mode: a [`Dispatcher`] is built
//! for one handler type `H`, and registration monomorphizes a pair of plain
//! function-pointer trampolines per message type - no virtual calls on the
//! dispatch path. A matched probe re-types the incoming `&dyn Message` to
//! the descriptor's concrete type and invokes `H`'s specialized
//! `on_message`; a miss silently falls back to the handler's single generic
//! `on_unmatched` method rather than erroring, which lets one handler
//! provide a uniform fallback for unknown frames.
//!
//! ## Integration Points
//!
//! - **Strategy Selector**: the builder classifies the registered set and
//!   materializes one engine before the first dispatch
//! - **Message Factory**: `dispatch_type` is the instance-free matching mode
//!   the factory's allocation path is built on
//! - **Polymorphic Registry**: the decoupled-handler alternative when `H`
//!   cannot name the concrete message types

use tracing::debug;
use types::{DescriptorSet, Message, MsgId, ProtocolMessage};

use crate::analyzer::{classify, SetClassification};
use crate::config::DispatchConfig;
use crate::engine::DispatchEngine;
use crate::error::RegistryResult;
use crate::strategy::{select_strategy, StrategyKind};

/// Base contract for dispatch handlers.
///
/// `Out` is uniform across all message types handled in one dispatch call;
/// `on_unmatched` is the generic fallback invoked whenever no descriptor
/// matches the probed `(id, offset)` pair.
pub trait MessageHandler {
    type Out;

    /// Fallback for probes that match no descriptor (unknown id, offset
    /// beyond the duplicate run, or a mismatched instance).
    fn on_unmatched(&mut self, msg: &dyn Message) -> Self::Out;
}

/// Per-type handling capability for a concrete message type.
///
/// Both methods have defaults so a handler only implements the mode it
/// uses: `on_message` for by-object dispatch (defaults to the unmatched
/// fallback), `on_message_type` for the instance-free factory-style mode
/// (defaults to a no-op).
pub trait HandleMessage<T: ProtocolMessage>: MessageHandler {
    /// Handle a matched message, re-typed to its concrete type.
    fn on_message(&mut self, msg: &T) -> Self::Out {
        self.on_unmatched(msg)
    }

    /// Type-only notification for a matched descriptor; no instance exists.
    fn on_message_type(&mut self) {}
}

/// Monomorphized trampoline pair for one descriptor.
struct Trampolines<H: MessageHandler> {
    by_object: fn(&mut H, &dyn Message) -> H::Out,
    by_type: fn(&mut H),
}

fn dispatch_as<T, H>(handler: &mut H, msg: &dyn Message) -> H::Out
where
    T: ProtocolMessage,
    H: HandleMessage<T>,
{
    match msg.downcast_ref::<T>() {
        Some(typed) => handler.on_message(typed),
        // The caller handed an instance whose concrete type differs from
        // the matched descriptor; treat it as unmatched rather than erroring.
        None => handler.on_unmatched(msg),
    }
}

fn dispatch_type_as<T, H>(handler: &mut H)
where
    T: ProtocolMessage,
    H: HandleMessage<T>,
{
    handler.on_message_type()
}

/// A built dispatch table bound to one handler type.
///
/// Construction happens exactly once; afterwards the table is read-only and
/// every dispatch is a bounded, synchronous computation.
pub struct Dispatcher<H: MessageHandler> {
    set: DescriptorSet,
    engine: DispatchEngine,
    classification: SetClassification,
    trampolines: Vec<Trampolines<H>>,
}

impl<H: MessageHandler> Dispatcher<H> {
    /// Start building a dispatcher.
    pub fn builder() -> DispatcherBuilder<H> {
        DispatcherBuilder::new()
    }

    /// Dispatch a message instance by `(id, offset)`.
    ///
    /// On a match the handler's `on_message` for the descriptor's concrete
    /// type runs; otherwise `on_unmatched(msg)` runs with the instance
    /// unmodified.
    pub fn dispatch(&self, id: MsgId, offset: u16, msg: &dyn Message, handler: &mut H) -> H::Out {
        match self.engine.locate(&self.set, id, offset) {
            Some(pos) => (self.trampolines[pos].by_object)(handler, msg),
            None => handler.on_unmatched(msg),
        }
    }

    /// Instance-free dispatch; returns whether a descriptor matched.
    pub fn dispatch_type(&self, id: MsgId, offset: u16, handler: &mut H) -> bool {
        match self.engine.locate(&self.set, id, offset) {
            Some(pos) => {
                (self.trampolines[pos].by_type)(handler);
                true
            }
            None => false,
        }
    }

    /// The dispatch algorithm selected for this table.
    pub fn active_strategy(&self) -> StrategyKind {
        self.engine.kind()
    }

    /// True iff no two descriptors share a wire id.
    pub fn has_unique_ids(&self) -> bool {
        !self.classification.has_duplicates
    }

    /// Number of descriptors sharing `id`.
    pub fn count(&self, id: MsgId) -> usize {
        self.set.count(id)
    }

    /// The registered descriptor set.
    pub fn descriptors(&self) -> &DescriptorSet {
        &self.set
    }
}

/// Builder for [`Dispatcher`]; registration order defines duplicate-offset
/// numbering.
pub struct DispatcherBuilder<H: MessageHandler> {
    set: types::DescriptorSetBuilder,
    trampolines: Vec<Trampolines<H>>,
    config: DispatchConfig,
}

impl<H: MessageHandler> Default for DispatcherBuilder<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: MessageHandler> DispatcherBuilder<H> {
    pub fn new() -> Self {
        Self {
            set: DescriptorSet::builder(),
            trampolines: Vec::new(),
            config: DispatchConfig::default(),
        }
    }

    /// Replace the dispatch configuration (strategy override, direct-table
    /// heuristic).
    pub fn with_config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a message type the handler can process.
    pub fn register<T>(mut self) -> Self
    where
        T: ProtocolMessage,
        H: HandleMessage<T>,
    {
        self.set = self.set.register::<T>();
        self.trampolines.push(Trampolines {
            by_object: dispatch_as::<T, H>,
            by_type: dispatch_type_as::<T, H>,
        });
        self
    }

    /// Classify the set, select a strategy and build the dispatch table.
    pub fn build(self) -> RegistryResult<Dispatcher<H>> {
        let set = self.set.build();
        let classification = classify(&set);
        let kind = select_strategy(&classification, &set, &self.config)?;
        let engine = DispatchEngine::build(kind, &set)?;
        debug!(
            strategy = kind.name(),
            descriptors = set.len(),
            "typed dispatcher built"
        );
        Ok(Dispatcher {
            set,
            engine,
            classification,
            trampolines: self.trampolines,
        })
    }
}
