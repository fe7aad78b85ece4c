//! Single-execution strategy: at most one lock per boundary or per action.
//!
//! The scope is chosen per request by `ExecutionMode`:
//! - `None`: coordination disabled, every request succeeds
//! - `Boundary`: the boundary admits one lock at a time
//! - `Action`: the boundary admits one lock per action id at a time

use super::{payload_mismatch, Strategy};
use crate::logging::report_issue;
use crate::store::LockStore;
use gk_common::error::SingleExecutionError;
use gk_common::{
    strategy_ids, AcquireResult, BoundaryId, ExecutionMode, LockInfo, LockPayload, PayloadKind,
    StrategyId,
};
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct SingleExecutionStrategy {
    store: LockStore,
}

impl SingleExecutionStrategy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Strategy for SingleExecutionStrategy {
    fn strategy_id(&self) -> StrategyId {
        StrategyId::new(strategy_ids::SINGLE_EXECUTION)
    }

    fn payload_kind(&self) -> PayloadKind {
        PayloadKind::SingleExecution
    }

    fn can_lock(&self, boundary: &BoundaryId, info: &LockInfo) -> AcquireResult {
        let LockPayload::SingleExecution { mode } = info.payload() else {
            return payload_mismatch(self, info);
        };
        match mode {
            ExecutionMode::None => AcquireResult::Success,
            ExecutionMode::Boundary => match self.store.locks(boundary).into_iter().next() {
                None => AcquireResult::Success,
                Some(oldest) => AcquireResult::Failure(
                    SingleExecutionError::BoundaryAlreadyLocked {
                        boundary: boundary.clone(),
                        existing: oldest,
                    }
                    .into(),
                ),
            },
            ExecutionMode::Action => {
                match self
                    .store
                    .locks_for_action(boundary, info.action_id())
                    .into_iter()
                    .next()
                {
                    None => AcquireResult::Success,
                    Some(oldest) => AcquireResult::Failure(
                        SingleExecutionError::ActionAlreadyRunning {
                            boundary: boundary.clone(),
                            existing: oldest,
                        }
                        .into(),
                    ),
                }
            }
        }
    }

    fn lock(&self, boundary: &BoundaryId, info: &LockInfo) {
        if !self.store.add(boundary, info) {
            report_issue(&format!(
                "single_execution: duplicate insert ignored for {} on '{}'",
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
