//! # Polymorphic Dispatch Registry
//!
//! ## Purpose
//!
//! The virtual-trampoline realization of direct-table and binary-search
//! dispatch, used when the handler must stay decoupled from the concrete
//! message types. Where the typed [`Dispatcher`](crate::dispatch::Dispatcher)
//! monomorphizes a trampoline per `(type, handler)` pair, this registry
//! stores one boxed trait object per registered type; every id comparison
//! during a binary probe goes through the trampoline's virtual `wire_id()`
//! call, and a matched probe hands the object-safe handler the resolved
//! type's vtable metadata instead of a concrete reference.
//!
//! Trampolines are precomputed once, in descriptor order, then stably
//! sorted by wire id - registration order is preserved inside equal-id
//! runs, so duplicate offsets resolve exactly as the plain engines resolve
//! them. The registry only ever realizes the `Direct`, `BinarySearchStrong`
//! or `BinarySearchWeak` strategies (plus `None` for the empty set): after
//! the sort, a binary engine is always valid.

use std::marker::PhantomData;

use tracing::debug;
use types::{vtable_of, DescriptorSet, Message, MessageVtable, MsgId, ProtocolMessage};

use crate::analyzer::classify;
use crate::config::DispatchConfig;
use crate::engine::{DispatchEngine, IdTable};
use crate::error::RegistryResult;
use crate::strategy::StrategyKind;

/// Object-safe handler for polymorphic dispatch.
///
/// Decoupled from concrete message types: a matched probe supplies the
/// resolved type's `&'static MessageVtable` alongside the untyped instance.
pub trait PolyHandler {
    /// Handle a matched message.
    fn on_message(&mut self, msg: &dyn Message, vtable: &'static MessageVtable);

    /// Type-only notification for a matched descriptor; no instance exists.
    fn on_message_type(&mut self, vtable: &'static MessageVtable) {
        let _ = vtable;
    }

    /// Fallback for probes that match no descriptor.
    fn on_unmatched(&mut self, msg: &dyn Message);
}

/// Virtual trampoline bound to one concrete message type.
trait PolyTrampoline: Send + Sync {
    /// Wire id resolved through a virtual call per probe.
    fn wire_id(&self) -> MsgId;

    /// Metadata of the bound type.
    fn vtable(&self) -> &'static MessageVtable;

    /// Invoke the handler for a matched instance.
    fn invoke(&self, msg: &dyn Message, handler: &mut dyn PolyHandler);

    /// Invoke the handler's type-only hook.
    fn invoke_type(&self, handler: &mut dyn PolyHandler);
}

struct Trampoline<T: ProtocolMessage>(PhantomData<fn() -> T>);

impl<T: ProtocolMessage + Send + Sync> PolyTrampoline for Trampoline<T> {
    fn wire_id(&self) -> MsgId {
        T::current_wire_id()
    }

    fn vtable(&self) -> &'static MessageVtable {
        vtable_of::<T>()
    }

    fn invoke(&self, msg: &dyn Message, handler: &mut dyn PolyHandler) {
        if msg.is::<T>() {
            handler.on_message(msg, vtable_of::<T>());
        } else {
            // Instance type differs from the matched descriptor.
            handler.on_unmatched(msg);
        }
    }

    fn invoke_type(&self, handler: &mut dyn PolyHandler) {
        handler.on_message_type(vtable_of::<T>());
    }
}

/// Sorted trampoline array the engines probe through virtual id calls.
struct TrampolineTable(Vec<Box<dyn PolyTrampoline>>);

impl IdTable for TrampolineTable {
    fn entries(&self) -> usize {
        self.0.len()
    }

    fn id_at(&self, pos: usize) -> MsgId {
        self.0[pos].wire_id()
    }

    fn name_at(&self, pos: usize) -> &'static str {
        self.0[pos].vtable().name
    }
}

/// Build-once dispatch registry over virtual trampolines.
pub struct PolyRegistry {
    trampolines: TrampolineTable,
    engine: DispatchEngine,
    has_duplicates: bool,
}

impl PolyRegistry {
    /// Start building a registry.
    pub fn builder() -> PolyRegistryBuilder {
        PolyRegistryBuilder::new()
    }

    /// Dispatch a message instance by `(id, offset)` through the matched
    /// trampoline, or fall back to `on_unmatched`.
    pub fn dispatch(&self, id: MsgId, offset: u16, msg: &dyn Message, handler: &mut dyn PolyHandler) {
        match self.engine.locate(&self.trampolines, id, offset) {
            Some(pos) => self.trampolines.0[pos].invoke(msg, handler),
            None => handler.on_unmatched(msg),
        }
    }

    /// Instance-free dispatch; returns whether a descriptor matched.
    pub fn dispatch_type(&self, id: MsgId, offset: u16, handler: &mut dyn PolyHandler) -> bool {
        match self.engine.locate(&self.trampolines, id, offset) {
            Some(pos) => {
                self.trampolines.0[pos].invoke_type(handler);
                true
            }
            None => false,
        }
    }

    /// The dispatch algorithm selected for this registry.
    pub fn active_strategy(&self) -> StrategyKind {
        self.engine.kind()
    }

    /// True iff no two registered types share a wire id.
    pub fn has_unique_ids(&self) -> bool {
        !self.has_duplicates
    }

    /// Number of registered types sharing `id`.
    pub fn count(&self, id: MsgId) -> usize {
        (0..self.trampolines.entries())
            .filter(|&pos| self.trampolines.id_at(pos) == id)
            .count()
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.trampolines.entries()
    }

    /// True when no types are registered.
    pub fn is_empty(&self) -> bool {
        self.trampolines.entries() == 0
    }
}

/// Builder for [`PolyRegistry`].
pub struct PolyRegistryBuilder {
    trampolines: Vec<Box<dyn PolyTrampoline>>,
    set: types::DescriptorSetBuilder,
    config: DispatchConfig,
}

impl Default for PolyRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PolyRegistryBuilder {
    pub fn new() -> Self {
        Self {
            trampolines: Vec::new(),
            set: DescriptorSet::builder(),
            config: DispatchConfig::default(),
        }
    }

    /// Replace the dispatch configuration. Only the direct-table heuristic
    /// applies here; the registry keeps its trampolines sorted, so its
    /// non-direct strategy is always a binary search.
    pub fn with_config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a message type.
    pub fn register<T: ProtocolMessage + Send + Sync>(mut self) -> Self {
        self.trampolines.push(Box::new(Trampoline::<T>(PhantomData)));
        self.set = self.set.register::<T>();
        self
    }

    /// Sort the trampolines, pick a strategy and build the probe engine.
    pub fn build(self) -> RegistryResult<PolyRegistry> {
        let set = self.set.build();
        let classification = classify(&set);

        // Stable sort by resolved id: registration order survives inside
        // equal-id runs, preserving duplicate-offset numbering.
        let mut trampolines = self.trampolines;
        trampolines.sort_by_key(|t| t.wire_id());
        let table = TrampolineTable(trampolines);

        let kind = if table.entries() == 0 {
            StrategyKind::None
        } else if classification.all_ids_static
            && !classification.has_duplicates
            && set
                .max_static_id()
                .is_some_and(|max_id| self.config.direct_table.admits(set.len(), max_id))
        {
            StrategyKind::Direct
        } else if classification.has_duplicates {
            StrategyKind::BinarySearchWeak
        } else {
            StrategyKind::BinarySearchStrong
        };

        let engine = DispatchEngine::build(kind, &table)?;
        debug!(
            strategy = kind.name(),
            types = table.entries(),
            "polymorphic registry built"
        );
        Ok(PolyRegistry {
            trampolines: table,
            engine,
            has_duplicates: classification.has_duplicates,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::define_message;

    define_message! { pub struct Alpha {} => id = 1; }
    define_message! { pub struct Beta { pub v: u32 } => id = 2; }
    define_message! { pub struct BetaPrime {} => id = 2; }
    define_message! { pub struct Gamma {} => id = 900; }

    #[derive(Default)]
    struct NameCollector {
        matched: Vec<&'static str>,
        unmatched: usize,
    }

    impl PolyHandler for NameCollector {
        fn on_message(&mut self, _msg: &dyn Message, vtable: &'static MessageVtable) {
            self.matched.push(vtable.name);
        }

        fn on_message_type(&mut self, vtable: &'static MessageVtable) {
            self.matched.push(vtable.name);
        }

        fn on_unmatched(&mut self, _msg: &dyn Message) {
            self.unmatched += 1;
        }
    }

    #[test]
    fn dense_unique_ids_build_a_direct_registry() {
        let registry = PolyRegistry::builder()
            .register::<Alpha>()
            .register::<Beta>()
            .build()
            .expect("registry");
        assert_eq!(registry.active_strategy(), StrategyKind::Direct);
        assert!(registry.has_unique_ids());

        let mut handler = NameCollector::default();
        let beta = Beta { v: 9 };
        registry.dispatch(2, 0, &beta, &mut handler);
        assert_eq!(handler.matched, vec!["Beta"]);
        assert_eq!(handler.unmatched, 0);
    }

    #[test]
    fn sparse_ids_probe_through_virtual_binary_search() {
        let registry = PolyRegistry::builder()
            .register::<Gamma>()
            .register::<Alpha>()
            .build()
            .expect("registry");
        assert_eq!(registry.active_strategy(), StrategyKind::BinarySearchStrong);

        let mut handler = NameCollector::default();
        assert!(registry.dispatch_type(900, 0, &mut handler));
        assert!(registry.dispatch_type(1, 0, &mut handler));
        assert!(!registry.dispatch_type(5, 0, &mut handler));
        assert_eq!(handler.matched, vec!["Gamma", "Alpha"]);
    }

    #[test]
    fn duplicate_ids_sort_stably_and_resolve_offsets() {
        let registry = PolyRegistry::builder()
            .register::<Beta>()
            .register::<BetaPrime>()
            .register::<Alpha>()
            .build()
            .expect("registry");
        assert_eq!(registry.active_strategy(), StrategyKind::BinarySearchWeak);
        assert!(!registry.has_unique_ids());
        assert_eq!(registry.count(2), 2);

        let mut handler = NameCollector::default();
        assert!(registry.dispatch_type(2, 0, &mut handler));
        assert!(registry.dispatch_type(2, 1, &mut handler));
        assert!(!registry.dispatch_type(2, 2, &mut handler));
        assert_eq!(handler.matched, vec!["Beta", "BetaPrime"]);
    }

    #[test]
    fn unknown_id_falls_back_to_unmatched() {
        let registry = PolyRegistry::builder().register::<Alpha>().build().expect("registry");

        let mut handler = NameCollector::default();
        let alpha = Alpha::default();
        registry.dispatch(42, 0, &alpha, &mut handler);
        assert_eq!(handler.unmatched, 1);
        assert!(handler.matched.is_empty());
    }

    #[test]
    fn empty_registry_selects_none() {
        let registry = PolyRegistry::builder().build().expect("registry");
        assert_eq!(registry.active_strategy(), StrategyKind::None);
        assert!(registry.is_empty());

        let mut handler = NameCollector::default();
        assert!(!registry.dispatch_type(0, 0, &mut handler));
    }
}
