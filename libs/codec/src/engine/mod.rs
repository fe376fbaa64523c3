//! # Dispatch Engines
//!
//! ## Purpose
//!
//! The three interchangeable lookup algorithms behind every dispatch table:
//! direct-indexed table, binary search (strong and weak variants) and linear
//! scan. All engines answer the same question - which ordinal position, if
//! any, matches an `(id, offset)` pair - and for any valid pair they must
//! select the *same* position. That cross-engine agreement is a correctness
//! requirement of the protocol, not an incidental detail, and is enforced by
//! property tests below.
//!
//! ## Architecture Role
//!
//! Engines search over the [`IdTable`] abstraction rather than descriptor
//! sets directly, so the identical algorithms serve both the plain
//! descriptor tables (ids read from descriptor metadata) and the polymorphic
//! trampoline registry (ids read through a virtual call per probe).
//!
//! Auxiliary structures (the direct slot array, the duplicate-run table) are
//! computed once at construction and never mutated afterwards.

pub(crate) mod binary;
pub(crate) mod direct;
pub(crate) mod linear;

use types::{DescriptorSet, MsgId};

use crate::error::{RegistryError, RegistryResult};
use crate::strategy::StrategyKind;

pub(crate) use binary::RunTable;
pub(crate) use direct::DirectTable;

/// Read-only view of an ordered id sequence an engine can search.
pub(crate) trait IdTable {
    /// Number of entries.
    fn entries(&self) -> usize;
    /// Wire id at a position. May go through a virtual call (polymorphic
    /// registry) or a function pointer (dynamic-id descriptors).
    fn id_at(&self, pos: usize) -> MsgId;
    /// Type name at a position, for construction-time diagnostics.
    fn name_at(&self, pos: usize) -> &'static str;
}

impl IdTable for DescriptorSet {
    fn entries(&self) -> usize {
        self.len()
    }

    fn id_at(&self, pos: usize) -> MsgId {
        self.get(pos).map(|d| d.wire_id()).unwrap_or(MsgId::MAX)
    }

    fn name_at(&self, pos: usize) -> &'static str {
        self.get(pos).map(|d| d.name()).unwrap_or("<out of range>")
    }
}

/// A selected strategy together with its prepared lookup structures.
///
/// Built exactly once per table; `locate` is the single matching contract
/// shared by the typed dispatcher, the polymorphic registry and the factory.
#[derive(Debug, Clone)]
pub(crate) enum DispatchEngine {
    /// Matches nothing; the strategy of the empty descriptor set.
    None,
    /// O(1) direct-indexed table.
    Direct(DirectTable),
    /// Recursive midpoint search, strictly increasing ids.
    BinaryStrong,
    /// Recursive midpoint search plus cached duplicate runs.
    BinaryWeak(RunTable),
    /// Sequential scan, first equal id wins.
    LinearStrong,
    /// Sequential scan with duplicate-offset counting.
    LinearWeak,
}

impl DispatchEngine {
    /// Build the engine for an already-selected strategy.
    pub(crate) fn build<T: IdTable + ?Sized>(
        kind: StrategyKind,
        table: &T,
    ) -> RegistryResult<Self> {
        match kind {
            StrategyKind::None => {
                if table.entries() > 0 {
                    // A non-empty table under the no-op strategy would make
                    // every id unreachable; treat as misconfiguration.
                    return Err(RegistryError::strategy_mismatch(
                        kind,
                        crate::analyzer::Sortedness::Unsorted,
                        table.entries(),
                        "no-op strategy forced onto a non-empty descriptor set",
                    ));
                }
                Ok(DispatchEngine::None)
            }
            StrategyKind::Direct => Ok(DispatchEngine::Direct(DirectTable::build(table)?)),
            StrategyKind::BinarySearchStrong => Ok(DispatchEngine::BinaryStrong),
            StrategyKind::BinarySearchWeak => {
                Ok(DispatchEngine::BinaryWeak(RunTable::build(table)))
            }
            StrategyKind::LinearStrong => Ok(DispatchEngine::LinearStrong),
            StrategyKind::LinearWeak => Ok(DispatchEngine::LinearWeak),
        }
    }

    /// Ordinal position matching `(id, offset)`, if any.
    ///
    /// `offset` selects among duplicate-id descriptors (zero-based, in
    /// registration order); an offset beyond the duplicate run is no match.
    pub(crate) fn locate<T: IdTable + ?Sized>(
        &self,
        table: &T,
        id: MsgId,
        offset: u16,
    ) -> Option<usize> {
        match self {
            DispatchEngine::None => None,
            DispatchEngine::Direct(direct) => direct.locate(id, offset),
            DispatchEngine::BinaryStrong => {
                binary::locate_strong(table, id).filter(|_| offset == 0)
            }
            DispatchEngine::BinaryWeak(runs) => binary::locate_weak(table, runs, id, offset),
            DispatchEngine::LinearStrong => {
                linear::locate_strong(table, id).filter(|_| offset == 0)
            }
            DispatchEngine::LinearWeak => linear::locate_weak(table, id, offset),
        }
    }

    /// The strategy this engine realizes.
    pub(crate) fn kind(&self) -> StrategyKind {
        match self {
            DispatchEngine::None => StrategyKind::None,
            DispatchEngine::Direct(_) => StrategyKind::Direct,
            DispatchEngine::BinaryStrong => StrategyKind::BinarySearchStrong,
            DispatchEngine::BinaryWeak(_) => StrategyKind::BinarySearchWeak,
            DispatchEngine::LinearStrong => StrategyKind::LinearStrong,
            DispatchEngine::LinearWeak => StrategyKind::LinearWeak,
        }
    }
}

#[cfg(test)]
impl IdTable for Vec<MsgId> {
    fn entries(&self) -> usize {
        self.len()
    }

    fn id_at(&self, pos: usize) -> MsgId {
        self[pos]
    }

    fn name_at(&self, _pos: usize) -> &'static str {
        "<test id>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn engine(kind: StrategyKind, ids: &Vec<MsgId>) -> DispatchEngine {
        DispatchEngine::build(kind, ids).expect("engine build")
    }

    /// All applicable engines must agree on every (id, offset) probe.
    fn assert_agreement(ids: &Vec<MsgId>, kinds: &[StrategyKind]) {
        let engines: Vec<DispatchEngine> = kinds.iter().map(|k| engine(*k, ids)).collect();
        let max_id = ids.iter().copied().max().unwrap_or(0);

        for id in 0..=max_id.saturating_add(1) {
            for offset in 0..=(ids.len() as u16 + 1) {
                let results: Vec<Option<usize>> = engines
                    .iter()
                    .map(|e| e.locate(ids, id, offset))
                    .collect();
                for window in results.windows(2) {
                    assert_eq!(
                        window[0], window[1],
                        "engines disagree on id={id} offset={offset} for ids {ids:?} ({kinds:?})"
                    );
                }
            }
        }
    }

    #[test]
    fn none_engine_never_matches() {
        let ids: Vec<MsgId> = vec![];
        let engine = engine(StrategyKind::None, &ids);
        assert_eq!(engine.locate(&ids, 0, 0), None);
        assert_eq!(engine.locate(&ids, 42, 0), None);
    }

    #[test]
    fn none_engine_rejects_non_empty_tables() {
        let ids: Vec<MsgId> = vec![1, 2];
        assert!(DispatchEngine::build(StrategyKind::None, &ids).is_err());
    }

    #[test]
    fn duplicate_offsets_resolve_in_registration_order() {
        // [A(5), B(5), C(5)]: offsets 0..2 hit ordinals 0..2, offset 3 misses.
        let ids: Vec<MsgId> = vec![5, 5, 5];
        for kind in [StrategyKind::BinarySearchWeak, StrategyKind::LinearWeak] {
            let engine = engine(kind, &ids);
            assert_eq!(engine.locate(&ids, 5, 0), Some(0));
            assert_eq!(engine.locate(&ids, 5, 1), Some(1));
            assert_eq!(engine.locate(&ids, 5, 2), Some(2));
            assert_eq!(engine.locate(&ids, 5, 3), None);
            assert_eq!(engine.locate(&ids, 4, 0), None);
        }
    }

    #[test]
    fn strong_engines_agree_on_unique_sorted_ids() {
        let ids: Vec<MsgId> = vec![1, 2, 3, 7, 9];
        assert_agreement(
            &ids,
            &[
                StrategyKind::Direct,
                StrategyKind::BinarySearchStrong,
                StrategyKind::BinarySearchWeak,
                StrategyKind::LinearStrong,
                StrategyKind::LinearWeak,
            ],
        );
    }

    #[test]
    fn weak_engines_agree_on_duplicate_runs() {
        let ids: Vec<MsgId> = vec![1, 3, 3, 3, 8, 8, 12];
        assert_agreement(
            &ids,
            &[StrategyKind::BinarySearchWeak, StrategyKind::LinearWeak],
        );
    }

    proptest! {
        /// Engine agreement over arbitrary sorted id multisets.
        #[test]
        fn engines_agree_on_sorted_multisets(mut ids in proptest::collection::vec(0u16..64, 0..24)) {
            ids.sort_unstable();
            assert_agreement(
                &ids,
                &[StrategyKind::BinarySearchWeak, StrategyKind::LinearWeak],
            );
        }

        /// Unique sorted sets additionally admit the strong engines and,
        /// when dense, the direct table.
        #[test]
        fn engines_agree_on_unique_sorted_sets(ids in proptest::collection::btree_set(0u16..64, 0..24)) {
            let ids: Vec<MsgId> = ids.into_iter().collect();
            if ids.is_empty() {
                return Ok(());
            }
            assert_agreement(
                &ids,
                &[
                    StrategyKind::Direct,
                    StrategyKind::BinarySearchStrong,
                    StrategyKind::BinarySearchWeak,
                    StrategyKind::LinearStrong,
                    StrategyKind::LinearWeak,
                ],
            );
        }
    }
}
