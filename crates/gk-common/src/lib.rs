//! Gatekeep shared types, IDs, and errors.
//!
//! This crate provides foundational types shared across gk-core modules:
//! - Boundary, action, strategy, and instance identity types
//! - The polymorphic lock info (shared header + strategy payload)
//! - The three-valued acquisition result
//! - The closed error taxonomy with serializable record forms

pub mod error;
pub mod id;
pub mod info;
pub mod result;

pub use error::{
    CompositeError, ConcurrencyError, ConditionError, EngineError, ErrorRecord, GroupError,
    LockError, PriorityError, RegistryError, SingleExecutionError,
};
pub use id::{
    strategy_ids, ActionId, BoundaryId, ConcurrencyId, GroupId, StrategyId, UniqueId,
};
pub use info::{
    ConcurrencyLimit, Condition, ExecutionMode, GroupRole, GroupSet, InfoRecord, LeaderPolicy,
    LockInfo, LockPayload, PayloadKind, Priority, PriorityBehavior,
};
pub use result::AcquireResult;
