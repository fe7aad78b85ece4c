//! Composite strategy: all-or-nothing evaluation across 2 to 5 subs.
//!
//! A composite holds an ordered list of sub-strategy handles; a composite
//! info carries one sub-info per sub. `can_lock` evaluates left to right:
//! the first rejection wraps as `StrategyFailed` and discards earlier
//! results (no `lock` calls have happened yet, so nothing rolls back);
//! victims from every preceding-cancellation sub-result merge into one
//! composite error. The orchestrator runs the whole evaluation under the
//! boundary gate, so no contradictory state can appear between inspection
//! and insert.

use super::{DynStrategy, Strategy};
use gk_common::error::{CompositeError, RegistryError};
use gk_common::{AcquireResult, BoundaryId, LockInfo, LockPayload, PayloadKind, StrategyId};
use std::collections::BTreeMap;

pub struct CompositeStrategy {
    id: StrategyId,
    subs: Vec<DynStrategy>,
}

impl CompositeStrategy {
    /// Build a composite over the given sub-strategies, in evaluation
    /// order. Arity is 2 to 5, matching composite infos.
    pub fn new(subs: Vec<DynStrategy>) -> Result<Self, CompositeError> {
        if !(2..=5).contains(&subs.len()) {
            return Err(CompositeError::InvalidArity { count: subs.len() });
        }
        let ids: Vec<StrategyId> = subs.iter().map(|sub| sub.strategy_id()).collect();
        Ok(CompositeStrategy {
            id: StrategyId::composite_of(ids.iter()),
            subs,
        })
    }

    pub fn sub_strategies(&self) -> &[DynStrategy] {
        &self.subs
    }

    /// Paired sub-strategies and entries, or the arity/kind error.
    fn zip_entries<'a>(
        &'a self,
        info: &'a LockInfo,
    ) -> Result<Vec<(&'a DynStrategy, &'a LockInfo)>, AcquireResult> {
        let LockPayload::Composite { entries } = info.payload() else {
            return Err(AcquireResult::Failure(
                RegistryError::PayloadMismatch {
                    strategy_id: self.id.clone(),
                    expected: PayloadKind::Composite,
                    actual: info.kind(),
                }
                .into(),
            ));
        };
        if entries.len() != self.subs.len() {
            return Err(AcquireResult::Failure(
                CompositeError::InvalidArity {
                    count: entries.len(),
                }
                .into(),
            ));
        }
        for (sub, entry) in self.subs.iter().zip(entries) {
            if sub.payload_kind() != entry.kind() {
                return Err(AcquireResult::Failure(
                    RegistryError::PayloadMismatch {
                        strategy_id: sub.strategy_id(),
                        expected: sub.payload_kind(),
                        actual: entry.kind(),
                    }
                    .into(),
                ));
            }
        }
        Ok(self.subs.iter().zip(entries).collect())
    }
}

impl Strategy for CompositeStrategy {
    fn strategy_id(&self) -> StrategyId {
        self.id.clone()
    }

    fn payload_kind(&self) -> PayloadKind {
        PayloadKind::Composite
    }

    fn can_lock(&self, boundary: &BoundaryId, info: &LockInfo) -> AcquireResult {
        let pairs = match self.zip_entries(info) {
            Ok(pairs) => pairs,
            Err(failure) => return failure,
        };

        let mut victims: Vec<LockInfo> = Vec::new();
        for (index, (sub, entry)) in pairs.into_iter().enumerate() {
            match sub.can_lock(boundary, entry) {
                AcquireResult::Success => {}
                AcquireResult::SuccessWithPrecedingCancellation(err) => {
                    victims.extend(err.victim_info().into_iter().cloned());
                }
                AcquireResult::Failure(err) => {
                    return AcquireResult::Failure(
                        CompositeError::StrategyFailed {
                            index,
                            source: Box::new(err),
                        }
                        .into(),
                    );
                }
            }
        }

        if victims.is_empty() {
            AcquireResult::Success
        } else {
            AcquireResult::SuccessWithPrecedingCancellation(
                CompositeError::PrecedingActionsCancelled {
                    boundary: boundary.clone(),
                    victims,
                }
                .into(),
            )
        }
    }

    fn lock(&self, boundary: &BoundaryId, info: &LockInfo) {
        if let Ok(pairs) = self.zip_entries(info) {
            for (sub, entry) in pairs {
                sub.lock(boundary, entry);
            }
        }
    }

    fn unlock(&self, boundary: &BoundaryId, info: &LockInfo) {
        if let Ok(pairs) = self.zip_entries(info) {
            for (sub, entry) in pairs.into_iter().rev() {
                sub.unlock(boundary, entry);
            }
        }
    }

    fn cleanup(&self) {
        for sub in &self.subs {
            sub.cleanup();
        }
    }

    fn cleanup_boundary(&self, boundary: &BoundaryId) {
        for sub in &self.subs {
            sub.cleanup_boundary(boundary);
        }
    }

    fn current_locks(&self) -> BTreeMap<BoundaryId, Vec<LockInfo>> {
        let mut merged: BTreeMap<BoundaryId, Vec<LockInfo>> = BTreeMap::new();
        for sub in &self.subs {
            for (boundary, locks) in sub.current_locks() {
                merged.entry(boundary).or_default().extend(locks);
            }
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{PriorityStrategy, SingleExecutionStrategy};
    use gk_common::{ExecutionMode, LockError, Priority, PriorityBehavior};
    use std::sync::Arc;

    fn boundary() -> BoundaryId {
        BoundaryId::new("b1")
    }

    fn composite_pair() -> (Arc<SingleExecutionStrategy>, Arc<PriorityStrategy>, CompositeStrategy)
    {
        let single = Arc::new(SingleExecutionStrategy::new());
        let priority = Arc::new(PriorityStrategy::new());
        let composite = CompositeStrategy::new(vec![
            Arc::clone(&single) as DynStrategy,
            Arc::clone(&priority) as DynStrategy,
        ])
        .unwrap();
        (single, priority, composite)
    }

    fn composite_info(action: &str, priority: Priority) -> LockInfo {
        LockInfo::composite(
            action,
            vec![
                LockInfo::single_execution(action, ExecutionMode::Action),
                LockInfo::priority(action, priority, false),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_arity_bounds_on_construction() {
        let single = Arc::new(SingleExecutionStrategy::new()) as DynStrategy;
        assert!(matches!(
            CompositeStrategy::new(vec![single]),
            Err(CompositeError::InvalidArity { count: 1 })
        ));
    }

    #[test]
    fn test_id_encodes_sub_names() {
        let (_, _, composite) = composite_pair();
        assert_eq!(
            composite.strategy_id().as_str(),
            "composite:single_execution+priority"
        );
    }

    #[test]
    fn test_all_success_locks_every_sub() {
        let (single, priority, composite) = composite_pair();
        let info = composite_info("pay", Priority::High(PriorityBehavior::Exclusive));
        assert!(composite.can_lock(&boundary(), &info).is_success());
        composite.lock(&boundary(), &info);

        assert_eq!(single.current_locks()[&boundary()].len(), 1);
        assert_eq!(priority.current_locks()[&boundary()].len(), 1);

        composite.unlock(&boundary(), &info);
        assert!(single.current_locks().is_empty());
        assert!(priority.current_locks().is_empty());
    }

    #[test]
    fn test_first_failure_wraps_index_and_mutates_nothing() {
        let (single, priority, composite) = composite_pair();

        // Pre-existing lock for the same action id trips sub 0.
        let existing = LockInfo::single_execution("pay", ExecutionMode::Action);
        single.lock(&boundary(), &existing);
        let before = priority.current_locks();

        let info = composite_info("pay", Priority::High(PriorityBehavior::Exclusive));
        let result = composite.can_lock(&boundary(), &info);
        match result.error() {
            Some(LockError::Composite(CompositeError::StrategyFailed { index, source })) => {
                assert_eq!(*index, 0);
                assert!(matches!(**source, LockError::SingleExecution(_)));
            }
            other => panic!("expected StrategyFailed, got {:?}", other),
        }
        assert_eq!(priority.current_locks(), before);
    }

    #[test]
    fn test_victims_merge_across_subs() {
        let (_, priority, composite) = composite_pair();

        let holder =
            LockInfo::priority("old", Priority::Low(PriorityBehavior::Replaceable), false);
        priority.lock(&boundary(), &holder);

        let info = composite_info("new", Priority::High(PriorityBehavior::Exclusive));
        let result = composite.can_lock(&boundary(), &info);
        assert!(result.should_proceed());
        assert_eq!(result.victims(), vec![&holder]);
    }

    #[test]
    fn test_entry_count_mismatch_is_rejected() {
        let (_, _, composite) = composite_pair();
        let info = LockInfo::composite(
            "x",
            vec![
                LockInfo::single_execution("x", ExecutionMode::Action),
                LockInfo::priority("x", Priority::None, false),
                LockInfo::single_execution("y", ExecutionMode::Action),
            ],
        )
        .unwrap();
        // Three entries against a two-sub composite.
        assert!(composite.can_lock(&boundary(), &info).is_failure());
    }

    #[test]
    fn test_entry_kind_mismatch_is_rejected() {
        let (_, _, composite) = composite_pair();
        let info = LockInfo::composite(
            "x",
            vec![
                LockInfo::priority("x", Priority::None, false),
                LockInfo::single_execution("x", ExecutionMode::Action),
            ],
        )
        .unwrap();
        // Entries in the wrong order for (single_execution, priority).
        let result = composite.can_lock(&boundary(), &info);
        assert!(matches!(
            result.error(),
            Some(LockError::Registry(RegistryError::PayloadMismatch { .. }))
        ));
    }
}
