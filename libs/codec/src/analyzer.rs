//! # Sort/Uniqueness Analyzer
//!
//! ## Purpose
//!
//! Classifies an ordered descriptor set before any dispatch table is built:
//! are all wire ids known at build time, is the id sequence unsorted, weakly
//! sorted (non-decreasing, duplicates allowed) or strongly sorted (strictly
//! increasing), and does the set contain duplicates at all. The strategy
//! selector consumes the classification once; nothing here is re-evaluated
//! at dispatch time.
//!
//! Any descriptor whose id is resolved at runtime collapses the sortedness
//! classification to `Unsorted` - runtime ids cannot participate in the
//! ordering guarantees the binary engines rely on. Duplicate detection does
//! resolve runtime ids, so linear strong/weak selection and
//! `has_unique_ids()` stay accurate for dynamic sets.

use types::DescriptorSet;

/// Ordering classification of a descriptor set's id sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Sortedness {
    /// No ordering guarantee (includes any set with runtime-resolved ids).
    Unsorted,
    /// Ids are non-decreasing; equal ids form contiguous runs.
    Weak,
    /// Ids are strictly increasing.
    Strong,
}

/// Result of analyzing a descriptor set. Pure function of the set,
/// evaluated once at table construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetClassification {
    /// True when every descriptor carries a build-time constant id.
    pub all_ids_static: bool,
    /// Ordering of the id sequence in registration order.
    pub sortedness: Sortedness,
    /// True when at least two descriptors resolve to the same id.
    pub has_duplicates: bool,
}

/// Classify a descriptor set.
pub fn classify(set: &DescriptorSet) -> SetClassification {
    let all_ids_static = set.iter().all(|d| d.has_static_id());

    let sortedness = if !all_ids_static {
        Sortedness::Unsorted
    } else {
        let mut sortedness = Sortedness::Strong;
        let mut prev: Option<types::MsgId> = None;
        for descriptor in set.iter() {
            // all_ids_static guarantees static_id is present
            let id = descriptor.static_id().unwrap_or_else(|| descriptor.wire_id());
            if let Some(prev) = prev {
                if id < prev {
                    sortedness = Sortedness::Unsorted;
                    break;
                }
                if id == prev {
                    sortedness = Sortedness::Weak;
                }
            }
            prev = Some(id);
        }
        sortedness
    };

    let mut resolved: Vec<types::MsgId> = set.iter().map(|d| d.wire_id()).collect();
    resolved.sort_unstable();
    let has_duplicates = resolved.windows(2).any(|pair| pair[0] == pair[1]);

    SetClassification {
        all_ids_static,
        sortedness,
        has_duplicates,
    }
}
