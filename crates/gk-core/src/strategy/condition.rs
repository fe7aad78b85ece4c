//! Dynamic-condition strategy: the caller's predicate decides.
//!
//! `can_lock` evaluates the info's condition thunk exactly once and returns
//! its verdict verbatim; the store still tracks granted locks so inspection
//! and release behave like every other strategy. Unlock removes *all* locks
//! sharing the action id in the boundary, accommodating multi-step flows
//! where several infos share one id.

use super::{payload_mismatch, Strategy};
use crate::logging::report_issue;
use crate::store::LockStore;
use gk_common::{
    strategy_ids, AcquireResult, BoundaryId, LockInfo, LockPayload, PayloadKind, StrategyId,
};
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct DynamicConditionStrategy {
    store: LockStore,
}

impl DynamicConditionStrategy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Strategy for DynamicConditionStrategy {
    fn strategy_id(&self) -> StrategyId {
        StrategyId::new(strategy_ids::DYNAMIC_CONDITION)
    }

    fn payload_kind(&self) -> PayloadKind {
        PayloadKind::Condition
    }

    fn can_lock(&self, _boundary: &BoundaryId, info: &LockInfo) -> AcquireResult {
        let LockPayload::Condition { condition } = info.payload() else {
            return payload_mismatch(self, info);
        };
        condition.evaluate()
    }

    fn lock(&self, boundary: &BoundaryId, info: &LockInfo) {
        if !self.store.add(boundary, info) {
            report_issue(&format!(
                "dynamic_condition: duplicate insert ignored for {} on '{}'",
                info, boundary
            ));
        }
    }

    fn unlock(&self, boundary: &BoundaryId, info: &LockInfo) {
        // All instances of the action id, not just this unique id.
        self.store.remove_action(boundary, info.action_id());
    }

    fn cleanup(&self) {
        self.store.cleanup();
    }

    fn cleanup_boundary(&self, boundary: &BoundaryId) {
        self.store.cleanup_boundary(boundary);
    }

    fn current_locks(&self) -> BTreeMap<BoundaryId, Vec<LockInfo>> {
        self.store.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gk_common::error::ConditionError;
    use gk_common::LockError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn boundary() -> BoundaryId {
        BoundaryId::new("b1")
    }

    #[test]
    fn test_condition_verdict_is_returned_verbatim() {
        let strategy = DynamicConditionStrategy::new();
        let allow = LockInfo::condition("sync", || AcquireResult::Success);
        assert!(strategy.can_lock(&boundary(), &allow).is_success());

        let deny = LockInfo::condition("sync", || {
            AcquireResult::Failure(ConditionError::not_met_with_hint("sync", "quota exhausted").into())
        });
        let result = strategy.can_lock(&boundary(), &deny);
        match result.error() {
            Some(LockError::Condition(ConditionError::ConditionNotMet { hint, .. })) => {
                assert_eq!(hint.as_deref(), Some("quota exhausted"));
            }
            other => panic!("expected ConditionNotMet, got {:?}", other),
        }
    }

    #[test]
    fn test_condition_is_evaluated_exactly_once() {
        let strategy = DynamicConditionStrategy::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let info = LockInfo::condition("sync", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            AcquireResult::Success
        });
        strategy.can_lock(&boundary(), &info);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_granted_locks_are_tracked() {
        let strategy = DynamicConditionStrategy::new();
        let info = LockInfo::condition("sync", || AcquireResult::Success);
        strategy.lock(&boundary(), &info);
        assert_eq!(strategy.current_locks()[&boundary()], vec![info]);
    }

    #[test]
    fn test_unlock_removes_every_instance_of_the_action() {
        let strategy = DynamicConditionStrategy::new();
        let step1 = LockInfo::condition("wizard", || AcquireResult::Success);
        let step2 = LockInfo::condition("wizard", || AcquireResult::Success);
        let other = LockInfo::condition("unrelated", || AcquireResult::Success);
        strategy.lock(&boundary(), &step1);
        strategy.lock(&boundary(), &step2);
        strategy.lock(&boundary(), &other);

        // One unlock clears both wizard steps but not the unrelated lock.
        strategy.unlock(&boundary(), &step1);
        assert_eq!(strategy.current_locks()[&boundary()], vec![other]);
    }
}
