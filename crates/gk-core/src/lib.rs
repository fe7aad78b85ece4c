//! Gatekeep core action coordination engine.
//!
//! A thread-safe registry of logical locks indexed by caller-defined
//! boundaries and inspected by pluggable strategies. Before launching a
//! potentially-conflicting operation, the host asks the engine whether it
//! may proceed; the answer is proceed, proceed-but-preempt-a-running-peer,
//! or reject, with enough structure to cancel superseded work and release
//! the lock when the operation finishes.
//!
//! - [`engine::LockEngine`] — the single acquisition path (boundary gates,
//!   strategy dispatch, guards)
//! - [`strategy`] — the protocol and the six built-in strategies
//! - [`store::LockStore`] — per-boundary ordered lock state
//! - [`registry::StrategyRegistry`] — `StrategyId -> strategy` resolution
//! - [`token`] — unlock tokens, deferred release, RAII guards
//! - [`inspect`] — snapshots and the debug table
//! - [`logging`] — structured events and the issue reporter
//!
//! The engine is synchronous and blocking at its own surface and contains
//! no task runtime; hosts may call it from any number of threads.

pub mod engine;
pub mod inspect;
pub mod logging;
pub mod registry;
pub mod store;
pub mod strategy;
pub mod token;

pub use engine::{ConflictOverride, EngineConfig, LockEngine};
pub use inspect::{format_table, SnapshotEntry};
pub use registry::StrategyRegistry;
pub use store::LockStore;
pub use strategy::{
    CompositeStrategy, ConcurrencyLimitedStrategy, DynStrategy, DynamicConditionStrategy,
    GroupCoordinationStrategy, PriorityStrategy, SingleExecutionStrategy, Strategy,
};
pub use token::{LockGuard, Scheduler, ThreadScheduler, UnlockOption};

// Re-export the shared types so hosts depend on one crate.
pub use gk_common::{
    strategy_ids, AcquireResult, ActionId, BoundaryId, ConcurrencyId, ConcurrencyLimit,
    ErrorRecord, ExecutionMode, GroupId, GroupRole, GroupSet, InfoRecord, LeaderPolicy, LockError,
    LockInfo, LockPayload, PayloadKind, Priority, PriorityBehavior, StrategyId, UniqueId,
};
