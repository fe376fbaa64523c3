//! # Dispatch Configuration Module
//!
//! Provides configurable dispatch-selection parameters to avoid hardcoded
//! values and enable deployment-specific tuning. The direct-table heuristic
//! in particular is a tuning constant, not a correctness requirement - its
//! optimality is workload-dependent, so it is carried here rather than baked
//! into the selector.

use serde::{Deserialize, Serialize};

use crate::strategy::StrategyKind;

/// Dispatch selection configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DispatchConfig {
    /// Explicit strategy override. Always wins over the selection rules;
    /// incompatible overrides are rejected at table construction.
    pub strategy_override: Option<StrategyKind>,

    /// Density heuristic deciding when a direct-indexed table is worth its
    /// memory footprint.
    pub direct_table: DirectTableHeuristic,

    /// Whether unrecognized ids may be materialized as `GenericMessage`
    /// through the factory's generic fallback.
    pub generic_fallback: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            strategy_override: None,
            direct_table: DirectTableHeuristic::default(),
            generic_fallback: false,
        }
    }
}

/// Direct-table admission heuristic.
///
/// A direct table spends `max_id + 1` slots to get O(1) dispatch, so it is
/// only selected when the id space is dense enough: the maximum id must lie
/// within `max_slack` of the descriptor count, or within `max_load_ratio`
/// times the count.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DirectTableHeuristic {
    /// Absolute slack: admit when `max_id <= count + max_slack`.
    pub max_slack: u16,
    /// Relative slack: admit when `max_id <= count * max_load_ratio`.
    pub max_load_ratio: f64,
}

impl Default for DirectTableHeuristic {
    fn default() -> Self {
        Self {
            max_slack: 10,
            max_load_ratio: 1.1,
        }
    }
}

impl DirectTableHeuristic {
    /// Whether a set of `count` descriptors with maximum id `max_id`
    /// qualifies for direct-indexed dispatch.
    pub fn admits(&self, count: usize, max_id: types::MsgId) -> bool {
        if count == 0 {
            return false;
        }
        let max_id = max_id as usize;
        max_id <= count + self.max_slack as usize
            || (max_id as f64) <= (count as f64) * self.max_load_ratio
    }
}
