//! # Dispatch Strategy Selection
//!
//! ## Purpose
//!
//! Maps a descriptor set's classification to exactly one dispatch strategy.
//! Selection is deterministic and total: every set - including the empty
//! one, which selects the no-op `None` strategy - resolves to a single
//! `StrategyKind`, once, at table construction. An explicit override always
//! wins but is validated against the engine's preconditions; forcing a
//! sorted strategy onto an unsorted set is a build-time error, never a
//! deferred runtime surprise.
//!
//! ## Selection Rules (priority order)
//!
//! 1. Explicit override (validated).
//! 2. Empty set ⇒ `None`.
//! 3. All ids static, no duplicates, and the id space dense enough for the
//!    configured heuristic ⇒ `Direct`.
//! 4. Strongly sorted ⇒ `BinarySearchStrong`.
//! 5. Weakly sorted ⇒ `BinarySearchWeak`.
//! 6. Otherwise ⇒ `LinearStrong` / `LinearWeak` by duplicate presence.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use tracing::debug;
use types::DescriptorSet;

use crate::analyzer::{SetClassification, Sortedness};
use crate::config::DispatchConfig;
use crate::error::{RegistryError, RegistryResult};

/// The dispatch algorithm in effect for a built table.
///
/// Selected once and immutable thereafter; exposed through
/// `active_strategy()` so calling code can assert on, or branch over, which
/// algorithm is live.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    TryFromPrimitive,
    IntoPrimitive,
    Serialize,
    Deserialize,
)]
#[repr(u8)]
pub enum StrategyKind {
    /// No-op strategy for the empty descriptor set; never matches.
    None = 0,
    /// Direct-indexed table, O(1), dense static unique ids only.
    Direct = 1,
    /// Binary search over strictly increasing ids.
    BinarySearchStrong = 2,
    /// Binary search over non-decreasing ids with contiguous duplicate runs.
    BinarySearchWeak = 3,
    /// Sequential scan, first match wins (unique ids).
    LinearStrong = 4,
    /// Sequential scan with duplicate-offset tracking.
    LinearWeak = 5,
}

impl StrategyKind {
    /// Whether this strategy requires the descriptor set to be sorted.
    pub fn requires_sorted(&self) -> bool {
        matches!(
            self,
            StrategyKind::BinarySearchStrong | StrategyKind::BinarySearchWeak
        )
    }

    /// Human-readable name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::None => "none",
            StrategyKind::Direct => "direct",
            StrategyKind::BinarySearchStrong => "binary_search_strong",
            StrategyKind::BinarySearchWeak => "binary_search_weak",
            StrategyKind::LinearStrong => "linear_strong",
            StrategyKind::LinearWeak => "linear_weak",
        }
    }
}

/// Select the dispatch strategy for a classified descriptor set.
pub fn select_strategy(
    class: &SetClassification,
    set: &DescriptorSet,
    config: &DispatchConfig,
) -> RegistryResult<StrategyKind> {
    if let Some(forced) = config.strategy_override {
        validate_override(forced, class, set)?;
        debug!(strategy = forced.name(), "dispatch strategy forced by override");
        return Ok(forced);
    }

    let selected = if set.is_empty() {
        StrategyKind::None
    } else if class.all_ids_static
        && !class.has_duplicates
        && set
            .max_static_id()
            .is_some_and(|max_id| config.direct_table.admits(set.len(), max_id))
    {
        StrategyKind::Direct
    } else {
        match class.sortedness {
            Sortedness::Strong => StrategyKind::BinarySearchStrong,
            Sortedness::Weak => StrategyKind::BinarySearchWeak,
            Sortedness::Unsorted if class.has_duplicates => StrategyKind::LinearWeak,
            Sortedness::Unsorted => StrategyKind::LinearStrong,
        }
    };

    debug!(
        strategy = selected.name(),
        descriptors = set.len(),
        all_ids_static = class.all_ids_static,
        sortedness = ?class.sortedness,
        has_duplicates = class.has_duplicates,
        "dispatch strategy selected"
    );
    Ok(selected)
}

fn validate_override(
    forced: StrategyKind,
    class: &SetClassification,
    set: &DescriptorSet,
) -> RegistryResult<()> {
    let mismatch = |detail: &str| {
        Err(RegistryError::strategy_mismatch(
            forced,
            class.sortedness,
            set.len(),
            detail,
        ))
    };

    match forced {
        StrategyKind::Direct => {
            if !class.all_ids_static {
                return mismatch("direct table requires build-time constant ids");
            }
            if class.has_duplicates {
                return mismatch("direct table cannot represent duplicate ids");
            }
            Ok(())
        }
        StrategyKind::BinarySearchStrong => {
            if class.sortedness != Sortedness::Strong {
                return mismatch("binary search (strong) requires strictly increasing ids");
            }
            Ok(())
        }
        StrategyKind::BinarySearchWeak => {
            if class.sortedness == Sortedness::Unsorted {
                return mismatch("binary search (weak) requires at least weakly sorted ids");
            }
            Ok(())
        }
        StrategyKind::LinearStrong => {
            if class.has_duplicates {
                return mismatch("linear (strong) cannot resolve duplicate offsets");
            }
            Ok(())
        }
        // LinearWeak works for any set; None is a valid no-op override.
        StrategyKind::LinearWeak | StrategyKind::None => Ok(()),
    }
}
