//! Error taxonomy for lock acquisition and strategy registration.
//!
//! Errors are the engine's signaling mechanism, not exceptional control
//! flow: every rejection and every preemption obligation travels through
//! one of these types. Each error exposes:
//! - `describe()` — single-line summary (the `Display` form)
//! - `failure_reason()` — why the request was rejected or what must happen
//! - `victim_info()` — locks the caller must cancel, where applicable
//! - `existing_info()` — the conflicting lock named by a rejection
//! - `boundary_id()` — the boundary the decision was made on
//! - `help_anchor()` — stable documentation anchor
//!
//! A serializable [`ErrorRecord`] form exists for machine-readable output.

use crate::id::{ActionId, BoundaryId, ConcurrencyId, GroupId, StrategyId};
use crate::info::{
    ConcurrencyLimit, GroupSet, InfoRecord, LeaderPolicy, LockInfo, PayloadKind, Priority,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejections produced by the single-execution strategy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SingleExecutionError {
    #[error("boundary '{boundary}' is already locked by {existing}")]
    BoundaryAlreadyLocked {
        boundary: BoundaryId,
        existing: LockInfo,
    },

    #[error("action is already running on '{boundary}': {existing}")]
    ActionAlreadyRunning {
        boundary: BoundaryId,
        existing: LockInfo,
    },
}

/// Rejections and preemption obligations produced by the priority strategy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriorityError {
    #[error("higher priority lock active on '{boundary}': requested {requested}, holding {highest}")]
    HigherPriorityExists {
        boundary: BoundaryId,
        requested: Priority,
        highest: LockInfo,
    },

    #[error("same-priority conflict on '{boundary}': existing {priority} lock is exclusive")]
    SamePriorityExclusiveConflict {
        boundary: BoundaryId,
        priority: Priority,
        existing: LockInfo,
    },

    #[error("blocked by concurrent same action '{action_id}' on '{boundary}'")]
    BlockedBySameAction {
        boundary: BoundaryId,
        action_id: ActionId,
        existing: LockInfo,
    },

    /// Victim-carrying: the caller must cancel `victim` and release its lock
    /// before proceeding.
    #[error("preceding action must be cancelled on '{boundary}': {victim}")]
    PrecedingActionCancelled {
        boundary: BoundaryId,
        victim: LockInfo,
    },
}

/// Rejections produced by the group-coordination strategy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GroupError {
    #[error("no groups specified for action '{action_id}'")]
    NoGroupsSpecified { action_id: ActionId },

    #[error("leader cannot join non-empty groups {groups} on '{boundary}'")]
    LeaderCannotJoinNonEmpty {
        boundary: BoundaryId,
        groups: GroupSet,
    },

    #[error("member cannot join empty groups {groups} on '{boundary}'")]
    MemberCannotJoinEmpty {
        boundary: BoundaryId,
        groups: GroupSet,
    },

    #[error("action '{action_id}' already present in groups {groups} on '{boundary}'")]
    ActionAlreadyInGroup {
        boundary: BoundaryId,
        action_id: ActionId,
        groups: GroupSet,
        existing: LockInfo,
    },

    #[error(
        "blocked by leader '{leader_action}' of group '{group}' on '{boundary}' (policy {policy})"
    )]
    BlockedByExclusiveLeader {
        boundary: BoundaryId,
        leader_action: ActionId,
        group: GroupId,
        policy: LeaderPolicy,
        existing: LockInfo,
    },
}

/// Rejection produced by the concurrency-limited strategy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConcurrencyError {
    #[error("concurrency limit reached for '{id}' on '{boundary}': limit {limit}, current {current}")]
    ConcurrencyLimitReached {
        boundary: BoundaryId,
        id: ConcurrencyId,
        limit: ConcurrencyLimit,
        current: usize,
    },
}

/// Rejection produced by a dynamic-condition predicate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    #[error("condition not met for action '{action_id}'")]
    ConditionNotMet {
        action_id: ActionId,
        hint: Option<String>,
    },
}

impl ConditionError {
    pub fn not_met(action_id: impl Into<ActionId>) -> Self {
        ConditionError::ConditionNotMet {
            action_id: action_id.into(),
            hint: None,
        }
    }

    pub fn not_met_with_hint(action_id: impl Into<ActionId>, hint: impl Into<String>) -> Self {
        ConditionError::ConditionNotMet {
            action_id: action_id.into(),
            hint: Some(hint.into()),
        }
    }
}

/// Registration and resolution errors from the strategy registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("strategy '{0}' is not registered")]
    StrategyNotRegistered(StrategyId),

    #[error("strategy '{0}' is already registered")]
    StrategyAlreadyRegistered(StrategyId),

    #[error("info payload mismatch for strategy '{strategy_id}': expected {expected}, got {actual}")]
    PayloadMismatch {
        strategy_id: StrategyId,
        expected: PayloadKind,
        actual: PayloadKind,
    },
}

/// Failures of composite evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompositeError {
    /// A sub-strategy rejected the request; earlier sub-results were
    /// discarded without mutating any state.
    #[error("sub-strategy {index} rejected the request: {source}")]
    StrategyFailed {
        index: usize,
        source: Box<LockError>,
    },

    /// Victim-carrying: every victim collected across the sub-results must
    /// be cancelled before proceeding.
    #[error("preceding actions must be cancelled on '{boundary}'")]
    PrecedingActionsCancelled {
        boundary: BoundaryId,
        victims: Vec<LockInfo>,
    },

    #[error("composite info must carry 2 to 5 entries, got {count}")]
    InvalidArity { count: usize },

    #[error("composite entries must not nest another composite (entry {index})")]
    NestedComposite { index: usize },
}

/// Orchestrator-level outcomes of a per-call conflict override.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A rejection was upgraded by `CancelExisting`: the named existing lock
    /// becomes the victim the caller must cancel.
    #[error("existing lock preempted by override on '{boundary}': {victim}")]
    OverridePreemption {
        boundary: BoundaryId,
        victim: LockInfo,
    },

    /// A preemption success was downgraded to a rejection by `BlockNew`.
    #[error("request blocked by override on '{boundary}': {cause}")]
    OverrideBlocked {
        boundary: BoundaryId,
        cause: Box<LockError>,
    },
}

/// Unified error type covering every strategy and the registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    #[error(transparent)]
    SingleExecution(#[from] SingleExecutionError),

    #[error(transparent)]
    Priority(#[from] PriorityError),

    #[error(transparent)]
    Group(#[from] GroupError),

    #[error(transparent)]
    Concurrency(#[from] ConcurrencyError),

    #[error(transparent)]
    Condition(#[from] ConditionError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Composite(#[from] CompositeError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl LockError {
    /// Single-line summary (the `Display` form).
    pub fn describe(&self) -> String {
        self.to_string()
    }

    /// Strategy family the error originated from.
    pub fn category(&self) -> &'static str {
        match self {
            LockError::SingleExecution(_) => "single_execution",
            LockError::Priority(_) => "priority",
            LockError::Group(_) => "group_coordination",
            LockError::Concurrency(_) => "concurrency_limited",
            LockError::Condition(_) => "dynamic_condition",
            LockError::Registry(_) => "registry",
            LockError::Composite(_) => "composite",
            LockError::Engine(_) => "engine",
        }
    }

    /// Why the request was rejected, or what the caller must do.
    pub fn failure_reason(&self) -> String {
        match self {
            LockError::SingleExecution(e) => match e {
                SingleExecutionError::BoundaryAlreadyLocked { .. } => {
                    "the boundary permits one lock at a time and one is held".to_string()
                }
                SingleExecutionError::ActionAlreadyRunning { .. } => {
                    "an instance of this action is already running in the boundary".to_string()
                }
            },
            LockError::Priority(e) => match e {
                PriorityError::HigherPriorityExists { .. } => {
                    "a higher-priority lock is active and cannot be preempted".to_string()
                }
                PriorityError::SamePriorityExclusiveConflict { .. } => {
                    "the holder declared itself exclusive at this level".to_string()
                }
                PriorityError::BlockedBySameAction { .. } => {
                    "a concurrent lock with the same action id forbids duplicates".to_string()
                }
                PriorityError::PrecedingActionCancelled { .. } => {
                    "cancel the preceding action and release its lock, then proceed".to_string()
                }
            },
            LockError::Group(e) => match e {
                GroupError::NoGroupsSpecified { .. } => {
                    "group-coordination locks require at least one group".to_string()
                }
                GroupError::LeaderCannotJoinNonEmpty { .. } => {
                    "the leader's entry policy requires its groups in a stricter state".to_string()
                }
                GroupError::MemberCannotJoinEmpty { .. } => {
                    "members may only join groups that already have an occupant".to_string()
                }
                GroupError::ActionAlreadyInGroup { .. } => {
                    "the same action id is already present in a listed group".to_string()
                }
                GroupError::BlockedByExclusiveLeader { .. } => {
                    "an existing leader's policy excludes this kind of joiner".to_string()
                }
            },
            LockError::Concurrency(e) => match e {
                ConcurrencyError::ConcurrencyLimitReached { limit, current, .. } => format!(
                    "all {} slots under this key are in use (current {})",
                    limit, current
                ),
            },
            LockError::Condition(e) => match e {
                ConditionError::ConditionNotMet { hint, .. } => match hint {
                    Some(hint) => format!("the caller-supplied condition rejected: {}", hint),
                    None => "the caller-supplied condition rejected the request".to_string(),
                },
            },
            LockError::Registry(e) => match e {
                RegistryError::StrategyNotRegistered(_) => {
                    "no strategy with this id has been registered".to_string()
                }
                RegistryError::StrategyAlreadyRegistered(_) => {
                    "a strategy with this id is already registered".to_string()
                }
                RegistryError::PayloadMismatch { .. } => {
                    "the info payload does not match the strategy's expected kind".to_string()
                }
            },
            LockError::Composite(e) => match e {
                CompositeError::StrategyFailed { index, source } => format!(
                    "composite evaluation stopped at sub-strategy {}: {}",
                    index,
                    source.failure_reason()
                ),
                CompositeError::PrecedingActionsCancelled { victims, .. } => format!(
                    "cancel all {} preceding action(s) and release their locks, then proceed",
                    victims.len()
                ),
                CompositeError::InvalidArity { .. } => {
                    "composite locks coordinate between 2 and 5 sub-strategies".to_string()
                }
                CompositeError::NestedComposite { .. } => {
                    "composites are flat: entries cannot themselves be composites".to_string()
                }
            },
            LockError::Engine(e) => match e {
                EngineError::OverridePreemption { .. } => {
                    "the per-call override turned the conflicting lock into a victim".to_string()
                }
                EngineError::OverrideBlocked { .. } => {
                    "the per-call override refused to preempt the running peer".to_string()
                }
            },
        }
    }

    /// Locks the caller must cancel before proceeding. Non-empty only for
    /// victim-carrying (preemption) errors.
    pub fn victim_info(&self) -> Vec<&LockInfo> {
        match self {
            LockError::Priority(PriorityError::PrecedingActionCancelled { victim, .. }) => {
                vec![victim]
            }
            LockError::Composite(CompositeError::PrecedingActionsCancelled {
                victims, ..
            }) => victims.iter().collect(),
            LockError::Engine(EngineError::OverridePreemption { victim, .. }) => vec![victim],
            _ => Vec::new(),
        }
    }

    /// The conflicting lock a rejection names, when it names one.
    pub fn existing_info(&self) -> Option<&LockInfo> {
        match self {
            LockError::SingleExecution(SingleExecutionError::BoundaryAlreadyLocked {
                existing,
                ..
            })
            | LockError::SingleExecution(SingleExecutionError::ActionAlreadyRunning {
                existing,
                ..
            })
            | LockError::Priority(PriorityError::SamePriorityExclusiveConflict {
                existing, ..
            })
            | LockError::Priority(PriorityError::BlockedBySameAction { existing, .. })
            | LockError::Group(GroupError::ActionAlreadyInGroup { existing, .. })
            | LockError::Group(GroupError::BlockedByExclusiveLeader { existing, .. }) => {
                Some(existing)
            }
            LockError::Priority(PriorityError::HigherPriorityExists { highest, .. }) => {
                Some(highest)
            }
            _ => None,
        }
    }

    /// The boundary the decision was made on, when the error carries one.
    pub fn boundary_id(&self) -> Option<&BoundaryId> {
        match self {
            LockError::SingleExecution(SingleExecutionError::BoundaryAlreadyLocked {
                boundary,
                ..
            })
            | LockError::SingleExecution(SingleExecutionError::ActionAlreadyRunning {
                boundary,
                ..
            })
            | LockError::Priority(PriorityError::HigherPriorityExists { boundary, .. })
            | LockError::Priority(PriorityError::SamePriorityExclusiveConflict {
                boundary, ..
            })
            | LockError::Priority(PriorityError::BlockedBySameAction { boundary, .. })
            | LockError::Priority(PriorityError::PrecedingActionCancelled { boundary, .. })
            | LockError::Group(GroupError::LeaderCannotJoinNonEmpty { boundary, .. })
            | LockError::Group(GroupError::MemberCannotJoinEmpty { boundary, .. })
            | LockError::Group(GroupError::ActionAlreadyInGroup { boundary, .. })
            | LockError::Group(GroupError::BlockedByExclusiveLeader { boundary, .. })
            | LockError::Concurrency(ConcurrencyError::ConcurrencyLimitReached {
                boundary, ..
            })
            | LockError::Composite(CompositeError::PrecedingActionsCancelled { boundary, .. })
            | LockError::Engine(EngineError::OverridePreemption { boundary, .. })
            | LockError::Engine(EngineError::OverrideBlocked { boundary, .. }) => Some(boundary),
            LockError::Composite(CompositeError::StrategyFailed { source, .. }) => {
                source.boundary_id()
            }
            _ => None,
        }
    }

    /// Stable documentation anchor for this error kind.
    pub fn help_anchor(&self) -> Option<&'static str> {
        match self {
            LockError::SingleExecution(SingleExecutionError::BoundaryAlreadyLocked { .. }) => {
                Some("boundary-already-locked")
            }
            LockError::SingleExecution(SingleExecutionError::ActionAlreadyRunning { .. }) => {
                Some("action-already-running")
            }
            LockError::Priority(PriorityError::HigherPriorityExists { .. }) => {
                Some("higher-priority-exists")
            }
            LockError::Priority(PriorityError::SamePriorityExclusiveConflict { .. }) => {
                Some("same-priority-exclusive")
            }
            LockError::Priority(PriorityError::BlockedBySameAction { .. }) => {
                Some("blocked-by-same-action")
            }
            LockError::Priority(PriorityError::PrecedingActionCancelled { .. }) => {
                Some("preceding-action-cancelled")
            }
            LockError::Group(GroupError::LeaderCannotJoinNonEmpty { .. }) => {
                Some("leader-cannot-join-non-empty")
            }
            LockError::Group(GroupError::MemberCannotJoinEmpty { .. }) => {
                Some("member-cannot-join-empty")
            }
            LockError::Group(GroupError::ActionAlreadyInGroup { .. }) => {
                Some("action-already-in-group")
            }
            LockError::Group(GroupError::BlockedByExclusiveLeader { .. }) => {
                Some("blocked-by-exclusive-leader")
            }
            LockError::Concurrency(ConcurrencyError::ConcurrencyLimitReached { .. }) => {
                Some("concurrency-limit-reached")
            }
            LockError::Condition(ConditionError::ConditionNotMet { .. }) => {
                Some("condition-not-met")
            }
            LockError::Registry(RegistryError::StrategyNotRegistered(_)) => {
                Some("strategy-not-registered")
            }
            LockError::Registry(RegistryError::StrategyAlreadyRegistered(_)) => {
                Some("strategy-already-registered")
            }
            LockError::Registry(RegistryError::PayloadMismatch { .. }) => {
                Some("payload-mismatch")
            }
            LockError::Composite(CompositeError::StrategyFailed { .. }) => {
                Some("composite-strategy-failed")
            }
            LockError::Composite(CompositeError::PrecedingActionsCancelled { .. }) => {
                Some("composite-preceding-cancelled")
            }
            _ => None,
        }
    }

    /// Serializable record form for machine-readable output.
    pub fn record(&self) -> ErrorRecord {
        ErrorRecord {
            message: self.describe(),
            reason: self.failure_reason(),
            category: self.category().to_string(),
            anchor: self.help_anchor().map(str::to_string),
            boundary: self.boundary_id().cloned(),
            victims: self.victim_info().into_iter().map(InfoRecord::from).collect(),
        }
    }
}

/// Machine-readable error form (JSON output, structured logs).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub message: String,
    pub reason: String,
    pub category: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub boundary: Option<BoundaryId>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub victims: Vec<InfoRecord>,
}

impl ErrorRecord {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| format!(r#"{{"category":"{}","error":"serialization_failed"}}"#, self.category))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::info::{ExecutionMode, PriorityBehavior};

    fn boundary() -> BoundaryId {
        BoundaryId::new("b1")
    }

    #[test]
    fn test_describe_is_single_line() {
        let err: LockError = SingleExecutionError::BoundaryAlreadyLocked {
            boundary: boundary(),
            existing: LockInfo::single_execution("fetch", ExecutionMode::Boundary),
        }
        .into();
        assert!(!err.describe().contains('\n'));
        assert!(err.describe().contains("b1"));
    }

    #[test]
    fn test_victim_info_only_on_preemption_errors() {
        let victim = LockInfo::priority("old", Priority::Low(PriorityBehavior::Replaceable), false);
        let preempt: LockError = PriorityError::PrecedingActionCancelled {
            boundary: boundary(),
            victim: victim.clone(),
        }
        .into();
        assert_eq!(preempt.victim_info(), vec![&victim]);

        let reject: LockError = PriorityError::HigherPriorityExists {
            boundary: boundary(),
            requested: Priority::Low(PriorityBehavior::Exclusive),
            highest: victim.clone(),
        }
        .into();
        assert!(reject.victim_info().is_empty());
        assert_eq!(reject.existing_info(), Some(&victim));
    }

    #[test]
    fn test_composite_failure_wraps_inner_error() {
        let inner: LockError = ConditionError::not_met("sync").into();
        let err: LockError = CompositeError::StrategyFailed {
            index: 1,
            source: Box::new(inner),
        }
        .into();
        assert!(err.describe().contains("sub-strategy 1"));
        assert!(err.failure_reason().contains("condition"));
        assert_eq!(err.category(), "composite");
    }

    #[test]
    fn test_composite_victims_are_all_carried() {
        let v1 = LockInfo::priority("a", Priority::Low(PriorityBehavior::Replaceable), false);
        let v2 = LockInfo::priority("b", Priority::Low(PriorityBehavior::Replaceable), false);
        let err: LockError = CompositeError::PrecedingActionsCancelled {
            boundary: boundary(),
            victims: vec![v1.clone(), v2.clone()],
        }
        .into();
        assert_eq!(err.victim_info(), vec![&v1, &v2]);
    }

    #[test]
    fn test_boundary_id_recurses_through_composite() {
        let inner: LockError = SingleExecutionError::ActionAlreadyRunning {
            boundary: boundary(),
            existing: LockInfo::single_execution("x", ExecutionMode::Action),
        }
        .into();
        let err: LockError = CompositeError::StrategyFailed {
            index: 0,
            source: Box::new(inner),
        }
        .into();
        assert_eq!(err.boundary_id(), Some(&boundary()));
    }

    #[test]
    fn test_error_record_serializes() {
        let err: LockError = ConcurrencyError::ConcurrencyLimitReached {
            boundary: boundary(),
            id: ConcurrencyId::new("api"),
            limit: ConcurrencyLimit::limited(2).unwrap(),
            current: 2,
        }
        .into();
        let record = err.record();
        assert_eq!(record.category, "concurrency_limited");
        let json = record.to_json();
        assert!(json.contains("\"concurrency_limited\""));
        assert!(json.contains("concurrency-limit-reached"));
    }

    #[test]
    fn test_registry_errors_have_anchors() {
        let err: LockError = RegistryError::StrategyNotRegistered(StrategyId::new("nope")).into();
        assert_eq!(err.help_anchor(), Some("strategy-not-registered"));
        assert!(err.existing_info().is_none());
        assert!(err.boundary_id().is_none());
    }
}
