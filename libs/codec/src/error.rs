//! Error taxonomy for dispatch-table construction and message creation
//!
//! Two families of failures exist and they are surfaced very differently.
//! Construction-time misconfiguration (forcing a sorted strategy onto an
//! unsorted set, duplicate ids in a direct table, an in-place slot too small
//! for a registered type) is a programmer error and is rejected when the
//! table is built, never deferred to a dispatch call. Runtime creation
//! failures (`InvalidId`, `AllocFailure`) are normal, expected outcomes and
//! travel as `Result` values - nothing in this crate panics over them.

use thiserror::Error;
use types::MsgId;

use crate::analyzer::Sortedness;
use crate::strategy::StrategyKind;

/// Construction-time errors for descriptor tables and registries.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RegistryError {
    /// Two descriptors claimed the same direct-table index. A dense array
    /// cell cannot represent two descriptors.
    #[error("direct table collision on id {id}: claimed by {first} and {second} (duplicate ids require a weak engine)")]
    DuplicateDirectId {
        id: MsgId,
        first: &'static str,
        second: &'static str,
    },

    /// An explicit strategy override is incompatible with the descriptor
    /// set's classification.
    #[error("forced strategy {requested:?} rejected: {detail} (sortedness: {sortedness:?}, {descriptors} descriptors)")]
    StrategyMismatch {
        requested: StrategyKind,
        sortedness: Sortedness,
        descriptors: usize,
        detail: String,
    },

    /// The in-place arena cannot hold one of the registered message types.
    #[error("in-place slot too small: {message} needs {required} bytes (align {align}), slot holds {capacity}")]
    SlotTooSmall {
        message: &'static str,
        required: usize,
        align: usize,
        capacity: usize,
    },

    /// A process-wide registry was initialized twice.
    #[error("registry '{registry}' already initialized (tables are build-once, read-only thereafter)")]
    AlreadyInitialized { registry: &'static str },
}

impl RegistryError {
    /// Create a StrategyMismatch with classification context attached.
    pub fn strategy_mismatch(
        requested: StrategyKind,
        sortedness: Sortedness,
        descriptors: usize,
        detail: impl Into<String>,
    ) -> Self {
        Self::StrategyMismatch {
            requested,
            sortedness,
            descriptors,
            detail: detail.into(),
        }
    }
}

/// Allocation failures reported by a message allocator.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AllocError {
    /// The single-slot arena already holds a live message. Recoverable:
    /// release the outstanding handle and retry.
    #[error("single-slot arena occupied by a live message - release the outstanding handle before creating another")]
    SlotOccupied,

    /// A message's layout exceeds the arena's capacity. Only reachable with
    /// an explicitly sized allocator; factory-built arenas are validated at
    /// construction.
    #[error("slot capacity {capacity} bytes cannot hold {message} ({required} bytes)")]
    SlotTooSmall {
        message: &'static str,
        required: usize,
        capacity: usize,
    },
}

/// Message-creation failures surfaced by the factory.
///
/// The wire-facing tri-state (`None` / `InvalidId` / `AllocFailure`) maps
/// onto `Result<MsgPtr, CreateError>`: success is `Ok`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CreateError {
    /// The identifier/offset pair matches no descriptor. A normal outcome
    /// for frames from newer peers, not an exceptional one.
    #[error("no descriptor for message id {id} at duplicate offset {offset} ({registered} descriptors registered)")]
    InvalidId {
        id: MsgId,
        offset: u16,
        registered: usize,
    },

    /// A descriptor matched but the allocator could not produce storage.
    #[error("descriptor matched id {id} but allocation failed: {source}")]
    AllocFailure {
        id: MsgId,
        #[source]
        source: AllocError,
    },
}

impl CreateError {
    /// True for the no-matching-descriptor outcome.
    pub fn is_invalid_id(&self) -> bool {
        matches!(self, CreateError::InvalidId { .. })
    }

    /// True when a descriptor matched but storage could not be produced.
    pub fn is_alloc_failure(&self) -> bool {
        matches!(self, CreateError::AllocFailure { .. })
    }
}

/// Result type for table and registry construction.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

/// Result type for factory create operations.
pub type CreateResult<T> = std::result::Result<T, CreateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_error_classification() {
        let invalid = CreateError::InvalidId {
            id: 9,
            offset: 0,
            registered: 3,
        };
        assert!(invalid.is_invalid_id());
        assert!(!invalid.is_alloc_failure());

        let alloc = CreateError::AllocFailure {
            id: 9,
            source: AllocError::SlotOccupied,
        };
        assert!(alloc.is_alloc_failure());
    }

    #[test]
    fn error_messages_carry_diagnostic_context() {
        let err = RegistryError::DuplicateDirectId {
            id: 5,
            first: "TradeReport",
            second: "QuoteUpdate",
        };
        let text = err.to_string();
        assert!(text.contains("id 5"));
        assert!(text.contains("TradeReport"));
        assert!(text.contains("QuoteUpdate"));

        let err = RegistryError::strategy_mismatch(
            StrategyKind::Direct,
            Sortedness::Unsorted,
            4,
            "ids are not statically known",
        );
        assert!(err.to_string().contains("ids are not statically known"));
    }
}
