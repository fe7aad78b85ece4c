//! Concurrency-limited strategy: bounded parallelism per concurrency key.
//!
//! Locks are counted under their `concurrency_id`, falling back to the
//! action id when none is named. `Unlimited` always admits; `Limited(n)`
//! admits while fewer than `n` matching locks are held.

use super::{payload_mismatch, Strategy};
use crate::logging::report_issue;
use crate::store::LockStore;
use gk_common::error::ConcurrencyError;
use gk_common::{
    strategy_ids, AcquireResult, BoundaryId, ConcurrencyId, ConcurrencyLimit, LockInfo,
    LockPayload, PayloadKind, StrategyId,
};
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct ConcurrencyLimitedStrategy {
    store: LockStore,
}

impl ConcurrencyLimitedStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// The key a lock is counted under.
    fn key_of(info: &LockInfo) -> Option<ConcurrencyId> {
        match info.payload() {
            LockPayload::Concurrency { concurrency_id, .. } => Some(
                concurrency_id
                    .clone()
                    .unwrap_or_else(|| ConcurrencyId::new(info.action_id().as_str())),
            ),
            _ => None,
        }
    }
}

impl Strategy for ConcurrencyLimitedStrategy {
    fn strategy_id(&self) -> StrategyId {
        StrategyId::new(strategy_ids::CONCURRENCY_LIMITED)
    }

    fn payload_kind(&self) -> PayloadKind {
        PayloadKind::Concurrency
    }

    fn can_lock(&self, boundary: &BoundaryId, info: &LockInfo) -> AcquireResult {
        let LockPayload::Concurrency { limit, .. } = info.payload() else {
            return payload_mismatch(self, info);
        };
        // key_of is Some for any Concurrency payload.
        let Some(key) = Self::key_of(info) else {
            return payload_mismatch(self, info);
        };
        match limit {
            ConcurrencyLimit::Unlimited => AcquireResult::Success,
            ConcurrencyLimit::Limited(n) => {
                let current = self
                    .store
                    .locks(boundary)
                    .iter()
                    .filter(|held| Self::key_of(held).as_ref() == Some(&key))
                    .count();
                if current < n.get() {
                    AcquireResult::Success
                } else {
                    AcquireResult::Failure(
                        ConcurrencyError::ConcurrencyLimitReached {
                            boundary: boundary.clone(),
                            id: key,
                            limit: *limit,
                            current,
                        }
                        .into(),
                    )
                }
            }
        }
    }

    fn lock(&self, boundary: &BoundaryId, info: &LockInfo) {
        if !self.store.add(boundary, info) {
            report_issue(&format!(
                "concurrency_limited: duplicate insert ignored for {} on '{}'",
                info, boundary
            ));
        }
    }

    fn unlock(&self, boundary: &BoundaryId, info: &LockInfo) {
        self.store.remove(boundary, info);
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
