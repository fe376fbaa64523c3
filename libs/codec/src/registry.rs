//! Process-wide, build-once dispatch state.
//!
//! Dispatch tables are constructed exactly once, before any concurrent
//! reader observes them, and never mutated afterwards. [`OnceRegistry`]
//! makes that contract explicit: a named `OnceCell` wrapper whose `init`
//! reports double-initialization as a `RegistryError` instead of silently
//! dropping the second value. After a successful `init`, concurrent reads
//! are safe because no mutation ever occurs again.

use once_cell::sync::OnceCell;
use tracing::debug;

use crate::error::{RegistryError, RegistryResult};

/// Named init-once container for process-wide dispatch state.
///
/// ```rust
/// use codec::{MessageFactory, OnceRegistry};
/// use codec::alloc::HeapAllocator;
///
/// static FACTORY: OnceRegistry<MessageFactory<HeapAllocator>> =
///     OnceRegistry::new("message_factory");
/// ```
#[derive(Debug)]
pub struct OnceRegistry<T> {
    name: &'static str,
    cell: OnceCell<T>,
}

impl<T> OnceRegistry<T> {
    /// Create an empty registry. Usable in `static` position.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            cell: OnceCell::new(),
        }
    }

    /// Install the value. Fails if the registry was already initialized;
    /// the tables this guards are build-once by contract.
    pub fn init(&self, value: T) -> RegistryResult<&T> {
        match self.cell.try_insert(value) {
            Ok(installed) => {
                debug!(registry = self.name, "registry initialized");
                Ok(installed)
            }
            Err(_) => Err(RegistryError::AlreadyInitialized {
                registry: self.name,
            }),
        }
    }

    /// The installed value, if initialization has happened.
    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    /// Install via `init` on first call, return the existing value
    /// afterwards. For callers that prefer lazy construction over a
    /// designated initialization point.
    pub fn get_or_init(&self, init: impl FnOnce() -> T) -> &T {
        self.cell.get_or_init(init)
    }

    /// Whether `init` has completed.
    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }

    /// The registry's diagnostic name.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_before_init_is_none() {
        let registry: OnceRegistry<u32> = OnceRegistry::new("empty");
        assert!(registry.get().is_none());
        assert!(!registry.is_initialized());
    }

    #[test]
    fn second_init_is_rejected() {
        let registry: OnceRegistry<u32> = OnceRegistry::new("double");
        assert_eq!(registry.init(1).copied(), Ok(1));
        let err = registry.init(2).expect_err("second init");
        assert_eq!(
            err,
            RegistryError::AlreadyInitialized { registry: "double" }
        );
        assert_eq!(registry.get(), Some(&1));
    }

    #[test]
    fn static_position_supports_shared_reads() {
        static SHARED: OnceRegistry<Vec<u16>> = OnceRegistry::new("shared");
        SHARED.get_or_init(|| vec![1, 2, 3]);
        assert_eq!(SHARED.get().map(Vec::len), Some(3));
        assert_eq!(SHARED.name(), "shared");
    }
}
