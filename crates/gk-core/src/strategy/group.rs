//! Group-coordination strategy: leaders and members over named groups.
//!
//! An action joins one or more groups in a role. Members need an occupied
//! group; leaders demand an entry state from their groups (`LeaderPolicy`)
//! and keep excluding conflicting joiners while they hold the lock. Group
//! membership is not stored separately: it is materialized by filtering the
//! boundary's locks on group-set intersection.

use super::{payload_mismatch, Strategy};
use crate::logging::report_issue;
use crate::store::LockStore;
use gk_common::error::GroupError;
use gk_common::{
    strategy_ids, AcquireResult, BoundaryId, GroupRole, GroupSet, LeaderPolicy, LockInfo,
    LockPayload, PayloadKind, StrategyId,
};
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct GroupCoordinationStrategy {
    store: LockStore,
}

impl GroupCoordinationStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    fn group_fields(info: &LockInfo) -> Option<(&GroupSet, GroupRole)> {
        match info.payload() {
            LockPayload::Group { groups, role } => Some((groups, *role)),
            _ => None,
        }
    }

    /// Existing locks sharing at least one of the listed groups.
    fn occupants<'a>(locks: &'a [LockInfo], groups: &GroupSet) -> Vec<&'a LockInfo> {
        locks
            .iter()
            .filter(|held| {
                Self::group_fields(held)
                    .map(|(held_groups, _)| held_groups.intersects(groups))
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Whether an existing leader's policy excludes a joiner of this role.
    ///
    /// `EmptyGroup` is an entry precondition only: once the leader is in,
    /// later joiners are not turned away by it. `None`-role joiners skip
    /// the leader-policy check entirely.
    fn leader_excludes(policy: LeaderPolicy, joiner: GroupRole) -> bool {
        matches!(
            (policy, joiner),
            (LeaderPolicy::WithoutMembers, GroupRole::Member)
                | (LeaderPolicy::WithoutLeader, GroupRole::Leader(_))
        )
    }
}

impl Strategy for GroupCoordinationStrategy {
    fn strategy_id(&self) -> StrategyId {
        StrategyId::new(strategy_ids::GROUP_COORDINATION)
    }

    fn payload_kind(&self) -> PayloadKind {
        PayloadKind::Group
    }

    fn can_lock(&self, boundary: &BoundaryId, info: &LockInfo) -> AcquireResult {
        let Some((groups, role)) = Self::group_fields(info) else {
            return payload_mismatch(self, info);
        };
        if groups.is_empty() {
            // Constructors refuse empty sets; guard against hand-built infos.
            return AcquireResult::Failure(
                GroupError::NoGroupsSpecified {
                    action_id: info.action_id().clone(),
                }
                .into(),
            );
        }

        let locks = self.store.locks(boundary);
        let occupants = Self::occupants(&locks, groups);

        match role {
            GroupRole::None => {}
            GroupRole::Member => {
                if occupants.is_empty() {
                    return AcquireResult::Failure(
                        GroupError::MemberCannotJoinEmpty {
                            boundary: boundary.clone(),
                            groups: groups.clone(),
                        }
                        .into(),
                    );
                }
            }
            GroupRole::Leader(policy) => {
                let violated = match policy {
                    LeaderPolicy::EmptyGroup => !occupants.is_empty(),
                    LeaderPolicy::WithoutMembers => {
                        occupants.iter().any(|held| {
                            Self::group_fields(held)
                                .map(|(_, held_role)| !held_role.is_leader())
                                .unwrap_or(false)
                        })
                    }
                    LeaderPolicy::WithoutLeader => {
                        occupants.iter().any(|held| {
                            Self::group_fields(held)
                                .map(|(_, held_role)| held_role.is_leader())
                                .unwrap_or(false)
                        })
                    }
                };
                if violated {
                    return AcquireResult::Failure(
                        GroupError::LeaderCannotJoinNonEmpty {
                            boundary: boundary.clone(),
                            groups: groups.clone(),
                        }
                        .into(),
                    );
                }
            }
        }

        // A holding leader keeps enforcing its policy against later joiners.
        for held in &occupants {
            if let Some((held_groups, GroupRole::Leader(policy))) = Self::group_fields(held) {
                if Self::leader_excludes(policy, role) {
                    if let Some(shared) = held_groups.first_shared(groups) {
                        return AcquireResult::Failure(
                            GroupError::BlockedByExclusiveLeader {
                                boundary: boundary.clone(),
                                leader_action: held.action_id().clone(),
                                group: shared.clone(),
                                policy,
                                existing: (*held).clone(),
                            }
                            .into(),
                        );
                    }
                }
            }
        }

        if let Some(duplicate) = occupants
            .iter()
            .find(|held| held.action_id() == info.action_id())
        {
            let shared: GroupSet = Self::group_fields(duplicate)
                .map(|(held_groups, _)| {
                    held_groups
                        .iter()
                        .filter(|g| groups.contains(g))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            return AcquireResult::Failure(
                GroupError::ActionAlreadyInGroup {
                    boundary: boundary.clone(),
                    action_id: info.action_id().clone(),
                    groups: shared,
                    existing: (*duplicate).clone(),
                }
                .into(),
            );
        }

        AcquireResult::Success
    }

    fn lock(&self, boundary: &BoundaryId, info: &LockInfo) {
        if !self.store.add(boundary, info) {
            report_issue(&format!(
                "group_coordination: duplicate insert ignored for {} on '{}'",
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

#[cfg(test)]
mod tests {
    use super::*;
    use gk_common::{GroupId, LockError};

    fn boundary() -> BoundaryId {
        BoundaryId::new("b1")
    }

    fn g(name: &str) -> GroupId {
        GroupId::new(name)
    }

    fn leader(action: &str, groups: &[&str], policy: LeaderPolicy) -> LockInfo {
        LockInfo::group(
            action,
            groups.iter().map(|name| g(name)),
            GroupRole::Leader(policy),
        )
        .unwrap()
    }

    fn member(action: &str, groups: &[&str]) -> LockInfo {
        LockInfo::group(action, groups.iter().map(|name| g(name)), GroupRole::Member).unwrap()
    }

    #[test]
    fn test_leader_requires_empty_group() {
        let strategy = GroupCoordinationStrategy::new();
        let first = leader("l1", &["g"], LeaderPolicy::EmptyGroup);
        assert!(strategy.can_lock(&boundary(), &first).is_success());
        strategy.lock(&boundary(), &first);

        let second = leader("l2", &["g"], LeaderPolicy::EmptyGroup);
        assert!(matches!(
            strategy.can_lock(&boundary(), &second).error(),
            Some(LockError::Group(GroupError::LeaderCannotJoinNonEmpty { .. }))
        ));
    }

    #[test]
    fn test_member_requires_occupied_group() {
        let strategy = GroupCoordinationStrategy::new();
        let lonely = member("m1", &["g"]);
        assert!(matches!(
            strategy.can_lock(&boundary(), &lonely).error(),
            Some(LockError::Group(GroupError::MemberCannotJoinEmpty { .. }))
        ));
    }

    #[test]
    fn test_empty_group_policy_is_entry_only() {
        let strategy = GroupCoordinationStrategy::new();
        let boss = leader("boss", &["g"], LeaderPolicy::EmptyGroup);
        strategy.lock(&boundary(), &boss);

        // The policy gated the leader's own entry; members still join.
        let joiner = member("m1", &["g"]);
        assert!(strategy.can_lock(&boundary(), &joiner).is_success());
    }

    #[test]
    fn test_without_members_leader_blocks_later_members() {
        let strategy = GroupCoordinationStrategy::new();
        let boss = leader("boss", &["g"], LeaderPolicy::WithoutMembers);
        strategy.lock(&boundary(), &boss);

        let joiner = member("m1", &["g"]);
        let result = strategy.can_lock(&boundary(), &joiner);
        match result.error() {
            Some(LockError::Group(GroupError::BlockedByExclusiveLeader {
                leader_action,
                policy,
                ..
            })) => {
                assert_eq!(leader_action.as_str(), "boss");
                assert_eq!(*policy, LeaderPolicy::WithoutMembers);
            }
            other => panic!("expected BlockedByExclusiveLeader, got {:?}", other),
        }

        // Role-none joiners skip the leader-policy check.
        let bystander = LockInfo::group("watch", [g("g")], GroupRole::None).unwrap();
        assert!(strategy.can_lock(&boundary(), &bystander).is_success());
    }

    #[test]
    fn test_without_members_leader_admits_other_leaders() {
        let strategy = GroupCoordinationStrategy::new();
        let first = leader("l1", &["g"], LeaderPolicy::WithoutMembers);
        strategy.lock(&boundary(), &first);

        // Another without-members leader joins a group holding only leaders.
        let second = leader("l2", &["g"], LeaderPolicy::WithoutMembers);
        assert!(strategy.can_lock(&boundary(), &second).is_success());

        // A member is excluded by both holders' policies.
        let m = member("m1", &["g"]);
        assert!(strategy.can_lock(&boundary(), &m).is_failure());
    }

    #[test]
    fn test_without_leader_policy_admits_members_only() {
        let strategy = GroupCoordinationStrategy::new();
        let seed = LockInfo::group("seed", [g("g")], GroupRole::None).unwrap();
        strategy.lock(&boundary(), &seed);

        let lead = leader("l1", &["g"], LeaderPolicy::WithoutLeader);
        assert!(strategy.can_lock(&boundary(), &lead).is_success());
        strategy.lock(&boundary(), &lead);

        // Members still welcome.
        let m = member("m1", &["g"]);
        assert!(strategy.can_lock(&boundary(), &m).is_success());
        strategy.lock(&boundary(), &m);

        // A rival with the same policy trips its own entry check first.
        let rival = leader("l2", &["g"], LeaderPolicy::WithoutLeader);
        assert!(matches!(
            strategy.can_lock(&boundary(), &rival).error(),
            Some(LockError::Group(GroupError::LeaderCannotJoinNonEmpty { .. }))
        ));
    }

    #[test]
    fn test_standing_leader_policy_blocks_cross_policy_leader() {
        let strategy = GroupCoordinationStrategy::new();
        let incumbent = leader("l1", &["g"], LeaderPolicy::WithoutLeader);
        strategy.lock(&boundary(), &incumbent);

        // The rival's own entry check passes (no members in the group),
        // but the incumbent's standing policy excludes leaders.
        let rival = leader("l2", &["g"], LeaderPolicy::WithoutMembers);
        match strategy.can_lock(&boundary(), &rival).error() {
            Some(LockError::Group(GroupError::BlockedByExclusiveLeader { policy, .. })) => {
                assert_eq!(*policy, LeaderPolicy::WithoutLeader);
            }
            other => panic!("expected BlockedByExclusiveLeader, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_action_in_group_is_rejected() {
        let strategy = GroupCoordinationStrategy::new();
        let seed = LockInfo::group("sync", [g("g")], GroupRole::None).unwrap();
        strategy.lock(&boundary(), &seed);

        let dup = member("sync", &["g"]);
        assert!(matches!(
            strategy.can_lock(&boundary(), &dup).error(),
            Some(LockError::Group(GroupError::ActionAlreadyInGroup { .. }))
        ));

        // The same action in a disjoint group is fine.
        let elsewhere = LockInfo::group("sync", [g("other")], GroupRole::None).unwrap();
        assert!(strategy.can_lock(&boundary(), &elsewhere).is_success());
    }

    #[test]
    fn test_membership_spans_any_shared_group() {
        let strategy = GroupCoordinationStrategy::new();
        let wide = LockInfo::group("wide", [g("a"), g("b")], GroupRole::None).unwrap();
        strategy.lock(&boundary(), &wide);

        // Joining either listed group sees the occupant.
        let m = member("m1", &["b"]);
        assert!(strategy.can_lock(&boundary(), &m).is_success());

        let lead = leader("l1", &["b"], LeaderPolicy::EmptyGroup);
        assert!(strategy.can_lock(&boundary(), &lead).is_failure());
    }

    #[test]
    fn test_release_reopens_group() {
        let strategy = GroupCoordinationStrategy::new();
        let lead = leader("l1", &["g"], LeaderPolicy::EmptyGroup);
        strategy.lock(&boundary(), &lead);
        strategy.unlock(&boundary(), &lead);

        let next = leader("l2", &["g"], LeaderPolicy::EmptyGroup);
        assert!(strategy.can_lock(&boundary(), &next).is_success());
    }
}
