//! Conflict-resolution strategies sharing one protocol.
//!
//! A strategy answers three questions about a `(boundary, info)` pair:
//! may it proceed (`can_lock`, read-only), record that it did (`lock`),
//! and forget it (`unlock`, idempotent). The orchestrator guarantees that
//! `can_lock` + `lock` execute under the boundary gate, so strategies never
//! re-check on insert.

pub mod composite;
pub mod concurrency;
pub mod condition;
pub mod group;
pub mod priority;
pub mod single_execution;

pub use composite::CompositeStrategy;
pub use concurrency::ConcurrencyLimitedStrategy;
pub use condition::DynamicConditionStrategy;
pub use group::GroupCoordinationStrategy;
pub use priority::PriorityStrategy;
pub use single_execution::SingleExecutionStrategy;

use gk_common::{
    AcquireResult, BoundaryId, LockInfo, PayloadKind, RegistryError, StrategyId,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Uniform strategy contract.
///
/// `can_lock` must not mutate state; `lock` inserts unconditionally (the
/// caller has just observed a success variant under the boundary gate);
/// `unlock` removes idempotently.
pub trait Strategy: Send + Sync {
    /// Identity under which this strategy registers.
    fn strategy_id(&self) -> StrategyId;

    /// Payload variant this strategy evaluates.
    fn payload_kind(&self) -> PayloadKind;

    /// Read-only conflict inspection.
    fn can_lock(&self, boundary: &BoundaryId, info: &LockInfo) -> AcquireResult;

    /// Unconditional insert; pre-condition: a success variant was just
    /// observed under the boundary gate.
    fn lock(&self, boundary: &BoundaryId, info: &LockInfo);

    /// Idempotent remove.
    fn unlock(&self, boundary: &BoundaryId, info: &LockInfo);

    /// Drop all state across all boundaries.
    fn cleanup(&self);

    /// Drop all state for one boundary.
    fn cleanup_boundary(&self, boundary: &BoundaryId);

    /// Copy-out of every lock this strategy currently tracks.
    fn current_locks(&self) -> BTreeMap<BoundaryId, Vec<LockInfo>>;
}

/// Type-erased strategy handle as stored in the registry.
pub type DynStrategy = Arc<dyn Strategy>;

/// Rejection for an info whose payload variant does not match the strategy.
pub(crate) fn payload_mismatch(strategy: &dyn Strategy, info: &LockInfo) -> AcquireResult {
    AcquireResult::Failure(
        RegistryError::PayloadMismatch {
            strategy_id: strategy.strategy_id(),
            expected: strategy.payload_kind(),
            actual: info.kind(),
        }
        .into(),
    )
}
