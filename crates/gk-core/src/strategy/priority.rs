//! Priority-based strategy with holder-decided preemption.
//!
//! Rules, evaluated in order:
//! 1. `Priority::None` requests always succeed (and are still tracked).
//! 2. A same-action conflict rejects when either side blocks duplicates.
//! 3. The *current highest* is the most recently inserted non-`None` lock;
//!    with none present the request succeeds.
//! 4. Level comparison (`high > low > none`, behavior-independent) decides
//!    between rejection and preemption.
//! 5. At equal levels the *existing* lock's behavior decides: exclusive
//!    rejects the challenger, replaceable yields to it. The holder declares
//!    its replaceability at creation, so producers get predictable
//!    semantics without challenger-side tie-breaks.

use super::{payload_mismatch, Strategy};
use crate::logging::report_issue;
use crate::store::LockStore;
use gk_common::error::PriorityError;
use gk_common::{
    strategy_ids, AcquireResult, BoundaryId, LockInfo, LockPayload, PayloadKind, Priority,
    PriorityBehavior, StrategyId,
};
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct PriorityStrategy {
    store: LockStore,
}

impl PriorityStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    fn priority_of(info: &LockInfo) -> Option<Priority> {
        match info.payload() {
            LockPayload::Priority { priority, .. } => Some(*priority),
            _ => None,
        }
    }

    fn blocks_same_action(info: &LockInfo) -> bool {
        matches!(
            info.payload(),
            LockPayload::Priority {
                blocks_same_action: true,
                ..
            }
        )
    }
}

impl Strategy for PriorityStrategy {
    fn strategy_id(&self) -> StrategyId {
        StrategyId::new(strategy_ids::PRIORITY)
    }

    fn payload_kind(&self) -> PayloadKind {
        PayloadKind::Priority
    }

    fn can_lock(&self, boundary: &BoundaryId, info: &LockInfo) -> AcquireResult {
        let LockPayload::Priority {
            priority,
            blocks_same_action,
        } = info.payload()
        else {
            return payload_mismatch(self, info);
        };

        if priority.is_none() {
            return AcquireResult::Success;
        }

        let locks = self.store.locks(boundary);

        let same_action: Vec<&LockInfo> = locks
            .iter()
            .filter(|held| held.action_id() == info.action_id())
            .collect();
        if let Some(first) = same_action.first() {
            let holder_blocks = same_action.iter().any(|held| Self::blocks_same_action(held));
            if *blocks_same_action || holder_blocks {
                return AcquireResult::Failure(
                    PriorityError::BlockedBySameAction {
                        boundary: boundary.clone(),
                        action_id: info.action_id().clone(),
                        existing: (*first).clone(),
                    }
                    .into(),
                );
            }
        }

        // Current highest: the most recently inserted lock with a priority.
        // Insertion order is total under the boundary gate, so the last
        // matching element is authoritative.
        let current = locks.iter().rev().find(|held| {
            Self::priority_of(held).map(|p| !p.is_none()).unwrap_or(false)
        });
        let Some(current) = current else {
            return AcquireResult::Success;
        };
        // The filter above guarantees a non-None priority payload.
        let current_priority = Self::priority_of(current).unwrap_or(Priority::None);

        if current_priority.level() > priority.level() {
            return AcquireResult::Failure(
                PriorityError::HigherPriorityExists {
                    boundary: boundary.clone(),
                    requested: *priority,
                    highest: current.clone(),
                }
                .into(),
            );
        }
        if current_priority.level() < priority.level() {
            return AcquireResult::SuccessWithPrecedingCancellation(
                PriorityError::PrecedingActionCancelled {
                    boundary: boundary.clone(),
                    victim: current.clone(),
                }
                .into(),
            );
        }

        // Equal levels: the existing lock's self-declared behavior decides.
        match current_priority.behavior() {
            Some(PriorityBehavior::Exclusive) => AcquireResult::Failure(
                PriorityError::SamePriorityExclusiveConflict {
                    boundary: boundary.clone(),
                    priority: current_priority,
                    existing: current.clone(),
                }
                .into(),
            ),
            Some(PriorityBehavior::Replaceable) => AcquireResult::SuccessWithPrecedingCancellation(
                PriorityError::PrecedingActionCancelled {
                    boundary: boundary.clone(),
                    victim: current.clone(),
                }
                .into(),
            ),
            None => AcquireResult::Success,
        }
    }

    fn lock(&self, boundary: &BoundaryId, info: &LockInfo) {
        if !self.store.add(boundary, info) {
            report_issue(&format!(
                "priority: duplicate insert ignored for {} on '{}'",
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
