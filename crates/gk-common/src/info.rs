//! Polymorphic lock info: a shared header plus a strategy-specific payload.
//!
//! The original design space (one info type per strategy behind a protocol)
//! is flattened into a tagged union: every [`LockInfo`] carries the header
//! fields common to all strategies and a [`LockPayload`] variant owning the
//! strategy-specific configuration. Equality and hashing are defined solely
//! by the instance [`UniqueId`].

use crate::error::{CompositeError, GroupError};
use crate::id::{strategy_ids, ActionId, ConcurrencyId, GroupId, StrategyId, UniqueId};
use crate::result::AcquireResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Conflict scope for single-execution locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Coordination disabled: the request always succeeds.
    None,
    /// At most one lock per boundary.
    Boundary,
    /// At most one lock per action id within the boundary.
    Action,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::None => write!(f, "none"),
            ExecutionMode::Boundary => write!(f, "boundary"),
            ExecutionMode::Action => write!(f, "action"),
        }
    }
}

/// How a priority lock behaves when challenged at the same level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityBehavior {
    /// Same-level challengers are rejected.
    Exclusive,
    /// Same-level challengers preempt this lock.
    Replaceable,
}

impl fmt::Display for PriorityBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriorityBehavior::Exclusive => write!(f, "exclusive"),
            PriorityBehavior::Replaceable => write!(f, "replaceable"),
        }
    }
}

/// Priority level with self-declared challenge behavior.
///
/// Levels order `High > Low > None`, independent of behavior. The behavior
/// belongs to the *holder*: when a challenger arrives at the same level, the
/// existing lock's behavior decides the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    None,
    Low(PriorityBehavior),
    High(PriorityBehavior),
}

impl Priority {
    /// Numeric level used for comparisons (`High > Low > None`).
    pub fn level(&self) -> u8 {
        match self {
            Priority::None => 0,
            Priority::Low(_) => 1,
            Priority::High(_) => 2,
        }
    }

    pub fn behavior(&self) -> Option<PriorityBehavior> {
        match self {
            Priority::None => None,
            Priority::Low(b) | Priority::High(b) => Some(*b),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Priority::None)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::None => write!(f, "none"),
            Priority::Low(b) => write!(f, "low({})", b),
            Priority::High(b) => write!(f, "high({})", b),
        }
    }
}

/// Entry policy a group leader demands of its listed groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderPolicy {
    /// Every listed group must be empty at entry.
    EmptyGroup,
    /// Listed groups may hold leaders but no members at entry; later
    /// member joiners stay excluded while the leader holds.
    WithoutMembers,
    /// Listed groups may hold members but no other leader at entry; later
    /// leader joiners stay excluded while the leader holds.
    WithoutLeader,
}

impl fmt::Display for LeaderPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeaderPolicy::EmptyGroup => write!(f, "empty_group"),
            LeaderPolicy::WithoutMembers => write!(f, "without_members"),
            LeaderPolicy::WithoutLeader => write!(f, "without_leader"),
        }
    }
}

/// Role an action assumes inside its listed groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupRole {
    /// Membership with no join precondition and no leader-policy of its own.
    None,
    /// Requires at least one listed group to be non-empty.
    Member,
    /// Claims leadership of the listed groups under the given policy.
    Leader(LeaderPolicy),
}

impl GroupRole {
    pub fn is_leader(&self) -> bool {
        matches!(self, GroupRole::Leader(_))
    }
}

impl fmt::Display for GroupRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupRole::None => write!(f, "none"),
            GroupRole::Member => write!(f, "member"),
            GroupRole::Leader(policy) => write!(f, "leader({})", policy),
        }
    }
}

/// Ordered, de-duplicated set of group ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupSet(BTreeSet<GroupId>);

impl GroupSet {
    pub fn new(groups: impl IntoIterator<Item = GroupId>) -> Self {
        GroupSet(groups.into_iter().collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, group: &GroupId) -> bool {
        self.0.contains(group)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GroupId> {
        self.0.iter()
    }

    /// True when the two sets share at least one group.
    pub fn intersects(&self, other: &GroupSet) -> bool {
        self.0.intersection(&other.0).next().is_some()
    }

    /// The first group (in order) present in both sets.
    pub fn first_shared<'a>(&'a self, other: &'a GroupSet) -> Option<&'a GroupId> {
        self.0.intersection(&other.0).next()
    }
}

impl fmt::Display for GroupSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .0
            .iter()
            .map(GroupId::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "[{}]", joined)
    }
}

impl FromIterator<GroupId> for GroupSet {
    fn from_iter<T: IntoIterator<Item = GroupId>>(iter: T) -> Self {
        GroupSet(iter.into_iter().collect())
    }
}

/// Cap on concurrently held locks sharing one concurrency key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyLimit {
    Unlimited,
    Limited(NonZeroUsize),
}

impl ConcurrencyLimit {
    /// Build a bounded limit; `n` must be at least 1.
    pub fn limited(n: usize) -> Option<Self> {
        NonZeroUsize::new(n).map(ConcurrencyLimit::Limited)
    }
}

impl fmt::Display for ConcurrencyLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConcurrencyLimit::Unlimited => write!(f, "unlimited"),
            ConcurrencyLimit::Limited(n) => write!(f, "{}", n),
        }
    }
}

/// Caller-supplied pure predicate evaluated at acquisition time.
///
/// Runs on the calling thread inside the boundary gate: it must be short,
/// non-blocking, and free of side effects. It must not call back into the
/// engine or registry.
#[derive(Clone)]
pub struct Condition(Arc<dyn Fn() -> AcquireResult + Send + Sync>);

impl Condition {
    pub fn new(f: impl Fn() -> AcquireResult + Send + Sync + 'static) -> Self {
        Condition(Arc::new(f))
    }

    /// Evaluate the predicate once and return its verdict verbatim.
    pub fn evaluate(&self) -> AcquireResult {
        (self.0)()
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Condition(<dynamic>)")
    }
}

/// Discriminant of [`LockPayload`], used for registry type checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    SingleExecution,
    Priority,
    Group,
    Concurrency,
    Condition,
    Composite,
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PayloadKind::SingleExecution => "single_execution",
            PayloadKind::Priority => "priority",
            PayloadKind::Group => "group",
            PayloadKind::Concurrency => "concurrency",
            PayloadKind::Condition => "condition",
            PayloadKind::Composite => "composite",
        };
        write!(f, "{}", s)
    }
}

/// Strategy-specific configuration of a lock request.
#[derive(Debug, Clone)]
pub enum LockPayload {
    SingleExecution {
        mode: ExecutionMode,
    },
    Priority {
        priority: Priority,
        blocks_same_action: bool,
    },
    Group {
        groups: GroupSet,
        role: GroupRole,
    },
    Concurrency {
        concurrency_id: Option<ConcurrencyId>,
        limit: ConcurrencyLimit,
    },
    Condition {
        condition: Condition,
    },
    Composite {
        entries: Vec<LockInfo>,
    },
}

impl LockPayload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            LockPayload::SingleExecution { .. } => PayloadKind::SingleExecution,
            LockPayload::Priority { .. } => PayloadKind::Priority,
            LockPayload::Group { .. } => PayloadKind::Group,
            LockPayload::Concurrency { .. } => PayloadKind::Concurrency,
            LockPayload::Condition { .. } => PayloadKind::Condition,
            LockPayload::Composite { .. } => PayloadKind::Composite,
        }
    }

    /// Strategy-specific fields rendered for tables and debug output.
    fn detail(&self) -> String {
        match self {
            LockPayload::SingleExecution { mode } => format!("mode: {}", mode),
            LockPayload::Priority {
                priority,
                blocks_same_action,
            } => format!(
                "priority: {}, blocks_same_action: {}",
                priority, blocks_same_action
            ),
            LockPayload::Group { groups, role } => {
                format!("role: {}, groups: {}", role, groups)
            }
            LockPayload::Concurrency {
                concurrency_id,
                limit,
            } => match concurrency_id {
                Some(id) => format!("limit: {}, key: {}", limit, id),
                None => format!("limit: {}", limit),
            },
            LockPayload::Condition { .. } => "condition: <dynamic>".to_string(),
            LockPayload::Composite { entries } => {
                let subs = entries
                    .iter()
                    .map(|e| e.strategy_id().name().to_string())
                    .collect::<Vec<_>>()
                    .join("+");
                format!("entries: {} ({})", entries.len(), subs)
            }
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            LockPayload::SingleExecution { .. } => "SingleExecution",
            LockPayload::Priority { .. } => "Priority",
            LockPayload::Group { .. } => "GroupCoordination",
            LockPayload::Concurrency { .. } => "ConcurrencyLimited",
            LockPayload::Condition { .. } => "DynamicCondition",
            LockPayload::Composite { .. } => "Composite",
        }
    }
}

/// One lock request/occurrence: shared header plus strategy payload.
///
/// Constructors generate a fresh [`UniqueId`] and mark the info as a
/// cancellation target; [`LockInfo::exempt_from_cancellation`] opts out.
#[derive(Debug, Clone)]
pub struct LockInfo {
    strategy_id: StrategyId,
    action_id: ActionId,
    unique_id: UniqueId,
    cancellation_target: bool,
    payload: LockPayload,
}

impl LockInfo {
    fn with_payload(strategy_id: StrategyId, action_id: ActionId, payload: LockPayload) -> Self {
        LockInfo {
            strategy_id,
            action_id,
            unique_id: UniqueId::new(),
            cancellation_target: true,
            payload,
        }
    }

    /// Single-execution lock with the given conflict scope.
    pub fn single_execution(action_id: impl Into<ActionId>, mode: ExecutionMode) -> Self {
        Self::with_payload(
            StrategyId::new(strategy_ids::SINGLE_EXECUTION),
            action_id.into(),
            LockPayload::SingleExecution { mode },
        )
    }

    /// Priority lock. `blocks_same_action` rejects any concurrent lock
    /// sharing this action id, in either direction.
    pub fn priority(
        action_id: impl Into<ActionId>,
        priority: Priority,
        blocks_same_action: bool,
    ) -> Self {
        Self::with_payload(
            StrategyId::new(strategy_ids::PRIORITY),
            action_id.into(),
            LockPayload::Priority {
                priority,
                blocks_same_action,
            },
        )
    }

    /// Group-coordination lock over a non-empty group set.
    pub fn group(
        action_id: impl Into<ActionId>,
        groups: impl IntoIterator<Item = GroupId>,
        role: GroupRole,
    ) -> Result<Self, GroupError> {
        let action_id = action_id.into();
        let groups: GroupSet = groups.into_iter().collect();
        if groups.is_empty() {
            return Err(GroupError::NoGroupsSpecified {
                action_id: action_id.clone(),
            });
        }
        Ok(Self::with_payload(
            StrategyId::new(strategy_ids::GROUP_COORDINATION),
            action_id,
            LockPayload::Group { groups, role },
        ))
    }

    /// Concurrency-limited lock counted under the action id.
    pub fn concurrency(action_id: impl Into<ActionId>, limit: ConcurrencyLimit) -> Self {
        Self::with_payload(
            StrategyId::new(strategy_ids::CONCURRENCY_LIMITED),
            action_id.into(),
            LockPayload::Concurrency {
                concurrency_id: None,
                limit,
            },
        )
    }

    /// Concurrency-limited lock counted under an explicit key shared by
    /// several action kinds.
    pub fn concurrency_keyed(
        action_id: impl Into<ActionId>,
        concurrency_id: impl Into<ConcurrencyId>,
        limit: ConcurrencyLimit,
    ) -> Self {
        Self::with_payload(
            StrategyId::new(strategy_ids::CONCURRENCY_LIMITED),
            action_id.into(),
            LockPayload::Concurrency {
                concurrency_id: Some(concurrency_id.into()),
                limit,
            },
        )
    }

    /// Dynamic-condition lock: the predicate's verdict is returned verbatim
    /// at acquisition time.
    pub fn condition(
        action_id: impl Into<ActionId>,
        condition: impl Fn() -> AcquireResult + Send + Sync + 'static,
    ) -> Self {
        Self::with_payload(
            StrategyId::new(strategy_ids::DYNAMIC_CONDITION),
            action_id.into(),
            LockPayload::Condition {
                condition: Condition::new(condition),
            },
        )
    }

    /// Composite lock over 2 to 5 sub-infos, one per sub-strategy, evaluated
    /// in order with all-or-nothing semantics. Entries must not nest another
    /// composite.
    pub fn composite(
        action_id: impl Into<ActionId>,
        entries: Vec<LockInfo>,
    ) -> Result<Self, CompositeError> {
        if !(2..=5).contains(&entries.len()) {
            return Err(CompositeError::InvalidArity {
                count: entries.len(),
            });
        }
        if let Some(index) = entries
            .iter()
            .position(|e| matches!(e.payload, LockPayload::Composite { .. }))
        {
            return Err(CompositeError::NestedComposite { index });
        }
        let strategy_id = StrategyId::composite_of(entries.iter().map(|e| &e.strategy_id));
        Ok(Self::with_payload(
            strategy_id,
            action_id.into(),
            LockPayload::Composite { entries },
        ))
    }

    /// Mark this lock as exempt from preemption: per-call conflict overrides
    /// will never select it as a victim.
    pub fn exempt_from_cancellation(mut self) -> Self {
        self.cancellation_target = false;
        self
    }

    pub fn strategy_id(&self) -> &StrategyId {
        &self.strategy_id
    }

    pub fn action_id(&self) -> &ActionId {
        &self.action_id
    }

    pub fn unique_id(&self) -> UniqueId {
        self.unique_id
    }

    pub fn is_cancellation_target(&self) -> bool {
        self.cancellation_target
    }

    pub fn payload(&self) -> &LockPayload {
        &self.payload
    }

    pub fn kind(&self) -> PayloadKind {
        self.payload.kind()
    }

    /// `TypeName(actionId, uniqueId, ...strategy fields...)`.
    pub fn debug_description(&self) -> String {
        format!(
            "{}({}, {}, {})",
            self.payload.type_name(),
            self.action_id,
            self.unique_id.short(),
            self.payload.detail()
        )
    }

    /// Strategy-specific fields only, for the inspection table.
    pub fn additional_info(&self) -> String {
        self.payload.detail()
    }
}

impl PartialEq for LockInfo {
    fn eq(&self, other: &Self) -> bool {
        self.unique_id == other.unique_id
    }
}

impl Eq for LockInfo {}

impl Hash for LockInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.unique_id.hash(state);
    }
}

impl fmt::Display for LockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.debug_description())
    }
}

/// Serializable snapshot form of a [`LockInfo`].
///
/// The dynamic-condition thunk cannot serialize; every payload flattens to
/// its kind plus the rendered detail string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoRecord {
    pub strategy_id: StrategyId,
    pub action_id: ActionId,
    pub unique_id: UniqueId,
    pub cancellation_target: bool,
    pub kind: PayloadKind,
    pub detail: String,
}

impl From<&LockInfo> for InfoRecord {
    fn from(info: &LockInfo) -> Self {
        InfoRecord {
            strategy_id: info.strategy_id.clone(),
            action_id: info.action_id.clone(),
            unique_id: info.unique_id,
            cancellation_target: info.cancellation_target,
            kind: info.kind(),
            detail: info.payload.detail(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_is_by_unique_id_only() {
        let a = LockInfo::single_execution("fetch", ExecutionMode::Boundary);
        let b = LockInfo::single_execution("fetch", ExecutionMode::Boundary);
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_priority_levels_order_independent_of_behavior() {
        let high = Priority::High(PriorityBehavior::Replaceable);
        let low = Priority::Low(PriorityBehavior::Exclusive);
        assert!(high.level() > low.level());
        assert!(low.level() > Priority::None.level());
    }

    #[test]
    fn test_group_constructor_rejects_empty_set() {
        let err = LockInfo::group("join", Vec::<GroupId>::new(), GroupRole::Member).unwrap_err();
        assert!(matches!(err, GroupError::NoGroupsSpecified { .. }));
    }

    #[test]
    fn test_composite_arity_bounds() {
        let one = vec![LockInfo::single_execution("x", ExecutionMode::Action)];
        assert!(matches!(
            LockInfo::composite("x", one),
            Err(CompositeError::InvalidArity { count: 1 })
        ));

        let six = (0..6)
            .map(|_| LockInfo::single_execution("x", ExecutionMode::Action))
            .collect();
        assert!(matches!(
            LockInfo::composite("x", six),
            Err(CompositeError::InvalidArity { count: 6 })
        ));
    }

    #[test]
    fn test_composite_rejects_nested_composite() {
        let inner = LockInfo::composite(
            "x",
            vec![
                LockInfo::single_execution("x", ExecutionMode::Action),
                LockInfo::priority("x", Priority::None, false),
            ],
        )
        .unwrap();
        let err = LockInfo::composite(
            "x",
            vec![LockInfo::single_execution("x", ExecutionMode::Action), inner],
        )
        .unwrap_err();
        assert!(matches!(err, CompositeError::NestedComposite { index: 1 }));
    }

    #[test]
    fn test_composite_strategy_id_encodes_sub_names() {
        let info = LockInfo::composite(
            "pay",
            vec![
                LockInfo::single_execution("pay", ExecutionMode::Action),
                LockInfo::priority("pay", Priority::High(PriorityBehavior::Exclusive), false),
            ],
        )
        .unwrap();
        assert_eq!(
            info.strategy_id().as_str(),
            "composite:single_execution+priority"
        );
    }

    #[test]
    fn test_debug_description_format() {
        let info = LockInfo::single_execution("fetchUser", ExecutionMode::Boundary);
        let description = info.debug_description();
        assert!(description.starts_with("SingleExecution(fetchUser, "));
        assert!(description.ends_with("mode: boundary)"));
    }

    #[test]
    fn test_cancellation_target_default_and_exemption() {
        let info = LockInfo::priority("sync", Priority::Low(PriorityBehavior::Replaceable), false);
        assert!(info.is_cancellation_target());
        let exempt = info.exempt_from_cancellation();
        assert!(!exempt.is_cancellation_target());
    }

    #[test]
    fn test_info_record_round_trip() {
        let info = LockInfo::concurrency_keyed(
            "download",
            "api",
            ConcurrencyLimit::limited(3).unwrap(),
        );
        let record = InfoRecord::from(&info);
        assert_eq!(record.kind, PayloadKind::Concurrency);
        assert_eq!(record.detail, "limit: 3, key: api");
        let json = serde_json::to_string(&record).unwrap();
        let back: InfoRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
