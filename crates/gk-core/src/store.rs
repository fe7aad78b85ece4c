//! Per-boundary lock state container.
//!
//! Each stateful strategy owns one [`LockStore`]: a map from boundary to an
//! insertion-ordered `UniqueId -> LockInfo` table plus a secondary
//! `ActionId -> {UniqueId}` index. Every public operation is atomic with
//! respect to one internal critical section per call; enumeration returns
//! copies, never references into the store.
//!
//! Invariants maintained here:
//! - a `UniqueId` appears at most once, and always in both indexes
//! - enumeration yields locks in monotonic insertion order
//! - removal of an absent id is a silent no-op
//! - boundary cleanup drops both indexes in one critical section

use gk_common::{ActionId, BoundaryId, LockInfo, UniqueId};
use indexmap::IndexMap;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct BoundaryLocks {
    order: IndexMap<UniqueId, LockInfo>,
    by_action: HashMap<ActionId, HashSet<UniqueId>>,
}

impl BoundaryLocks {
    fn insert(&mut self, info: LockInfo) -> bool {
        let unique_id = info.unique_id();
        if self.order.contains_key(&unique_id) {
            return false;
        }
        self.by_action
            .entry(info.action_id().clone())
            .or_default()
            .insert(unique_id);
        self.order.insert(unique_id, info);
        true
    }

    fn remove(&mut self, unique_id: UniqueId) -> Option<LockInfo> {
        // shift_remove keeps the remaining entries in insertion order.
        let removed = self.order.shift_remove(&unique_id)?;
        if let Some(ids) = self.by_action.get_mut(removed.action_id()) {
            ids.remove(&unique_id);
            if ids.is_empty() {
                self.by_action.remove(removed.action_id());
            }
        }
        Some(removed)
    }
}

/// Thread-safe, insertion-ordered lock registry keyed by boundary.
#[derive(Debug, Default)]
pub struct LockStore {
    inner: Mutex<HashMap<BoundaryId, BoundaryLocks>>,
}

impl LockStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, HashMap<BoundaryId, BoundaryLocks>> {
        // A panic inside a caller-supplied condition thunk must not wedge
        // the store for the rest of the process.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a lock. Returns `false` (and changes nothing) when the same
    /// `UniqueId` is already present.
    pub fn add(&self, boundary: &BoundaryId, info: &LockInfo) -> bool {
        let mut map = self.guard();
        map.entry(boundary.clone())
            .or_default()
            .insert(info.clone())
    }

    /// Remove a lock by its `UniqueId`. Idempotent: absent ids return
    /// `false` without changing anything.
    pub fn remove(&self, boundary: &BoundaryId, info: &LockInfo) -> bool {
        let mut map = self.guard();
        let Some(locks) = map.get_mut(boundary) else {
            return false;
        };
        let removed = locks.remove(info.unique_id()).is_some();
        if locks.order.is_empty() {
            map.remove(boundary);
        }
        removed
    }

    /// Remove every lock sharing the action id, returning them in insertion
    /// order. Used by the dynamic-condition strategy's unlock semantics.
    pub fn remove_action(&self, boundary: &BoundaryId, action_id: &ActionId) -> Vec<LockInfo> {
        let mut map = self.guard();
        let Some(locks) = map.get_mut(boundary) else {
            return Vec::new();
        };
        let doomed: Vec<UniqueId> = locks
            .order
            .iter()
            .filter(|(_, info)| info.action_id() == action_id)
            .map(|(id, _)| *id)
            .collect();
        let removed = doomed
            .into_iter()
            .filter_map(|id| locks.remove(id))
            .collect();
        if locks.order.is_empty() {
            map.remove(boundary);
        }
        removed
    }

    /// True when the boundary holds at least one lock for the action id.
    pub fn contains(&self, boundary: &BoundaryId, action_id: &ActionId) -> bool {
        self.guard()
            .get(boundary)
            .map(|locks| locks.by_action.contains_key(action_id))
            .unwrap_or(false)
    }

    /// Number of locks held for the action id within the boundary.
    pub fn count(&self, boundary: &BoundaryId, action_id: &ActionId) -> usize {
        self.guard()
            .get(boundary)
            .and_then(|locks| locks.by_action.get(action_id))
            .map(HashSet::len)
            .unwrap_or(0)
    }

    /// All locks in the boundary, in insertion order.
    pub fn locks(&self, boundary: &BoundaryId) -> Vec<LockInfo> {
        self.guard()
            .get(boundary)
            .map(|locks| locks.order.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Locks for one action id, in insertion order.
    pub fn locks_for_action(&self, boundary: &BoundaryId, action_id: &ActionId) -> Vec<LockInfo> {
        self.guard()
            .get(boundary)
            .map(|locks| {
                locks
                    .order
                    .values()
                    .filter(|info| info.action_id() == action_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Action ids currently holding at least one lock in the boundary.
    pub fn action_ids(&self, boundary: &BoundaryId) -> BTreeSet<ActionId> {
        self.guard()
            .get(boundary)
            .map(|locks| locks.by_action.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_empty(&self, boundary: &BoundaryId) -> bool {
        self.guard()
            .get(boundary)
            .map(|locks| locks.order.is_empty())
            .unwrap_or(true)
    }

    /// Drop every lock across every boundary.
    pub fn cleanup(&self) {
        self.guard().clear();
    }

    /// Drop both indexes of one boundary in a single critical section.
    pub fn cleanup_boundary(&self, boundary: &BoundaryId) {
        self.guard().remove(boundary);
    }

    /// Copy-out of the full state, boundaries in sorted order, locks in
    /// insertion order.
    pub fn snapshot(&self) -> BTreeMap<BoundaryId, Vec<LockInfo>> {
        self.guard()
            .iter()
            .map(|(boundary, locks)| {
                (
                    boundary.clone(),
                    locks.order.values().cloned().collect::<Vec<_>>(),
                )
            })
            .collect()
    }

    pub fn boundaries(&self) -> Vec<BoundaryId> {
        self.guard().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gk_common::{ExecutionMode, LockInfo};

    fn boundary() -> BoundaryId {
        BoundaryId::new("b1")
    }

    fn info(action: &str) -> LockInfo {
        LockInfo::single_execution(action, ExecutionMode::Action)
    }

    #[test]
    fn test_add_updates_both_indexes() {
        let store = LockStore::new();
        let lock = info("fetch");
        assert!(store.add(&boundary(), &lock));
        assert!(store.contains(&boundary(), &ActionId::new("fetch")));
        assert_eq!(store.count(&boundary(), &ActionId::new("fetch")), 1);
        assert_eq!(store.locks(&boundary()), vec![lock]);
    }

    #[test]
    fn test_duplicate_unique_id_is_rejected_without_change() {
        let store = LockStore::new();
        let lock = info("fetch");
        assert!(store.add(&boundary(), &lock));
        assert!(!store.add(&boundary(), &lock));
        assert_eq!(store.count(&boundary(), &ActionId::new("fetch")), 1);
    }

    #[test]
    fn test_enumeration_preserves_insertion_order() {
        let store = LockStore::new();
        let locks: Vec<LockInfo> = (0..5).map(|i| info(&format!("a{}", i))).collect();
        for lock in &locks {
            store.add(&boundary(), lock);
        }
        assert_eq!(store.locks(&boundary()), locks);

        // Removal from the middle keeps the rest in order.
        store.remove(&boundary(), &locks[2]);
        let remaining = store.locks(&boundary());
        assert_eq!(
            remaining,
            vec![
                locks[0].clone(),
                locks[1].clone(),
                locks[3].clone(),
                locks[4].clone()
            ]
        );
    }

    #[test]
    fn test_remove_is_idempotent() {
        let store = LockStore::new();
        let lock = info("fetch");
        store.add(&boundary(), &lock);
        assert!(store.remove(&boundary(), &lock));
        assert!(!store.remove(&boundary(), &lock));
        assert!(store.is_empty(&boundary()));
    }

    #[test]
    fn test_secondary_index_tracks_multiple_instances() {
        let store = LockStore::new();
        let first = info("fetch");
        let second = info("fetch");
        store.add(&boundary(), &first);
        store.add(&boundary(), &second);
        assert_eq!(store.count(&boundary(), &ActionId::new("fetch")), 2);

        store.remove(&boundary(), &first);
        assert!(store.contains(&boundary(), &ActionId::new("fetch")));
        store.remove(&boundary(), &second);
        assert!(!store.contains(&boundary(), &ActionId::new("fetch")));
    }

    #[test]
    fn test_remove_action_clears_all_instances_in_order() {
        let store = LockStore::new();
        let a1 = info("a");
        let b = info("b");
        let a2 = info("a");
        store.add(&boundary(), &a1);
        store.add(&boundary(), &b);
        store.add(&boundary(), &a2);

        let removed = store.remove_action(&boundary(), &ActionId::new("a"));
        assert_eq!(removed, vec![a1, a2]);
        assert_eq!(store.locks(&boundary()), vec![b]);
    }

    #[test]
    fn test_cleanup_boundary_is_scoped() {
        let store = LockStore::new();
        let other = BoundaryId::new("b2");
        store.add(&boundary(), &info("x"));
        store.add(&other, &info("y"));

        store.cleanup_boundary(&boundary());
        assert!(store.is_empty(&boundary()));
        assert!(!store.is_empty(&other));

        store.cleanup();
        assert!(store.is_empty(&other));
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let store = LockStore::new();
        let lock = info("fetch");
        store.add(&boundary(), &lock);
        let snapshot = store.snapshot();
        store.cleanup();
        assert_eq!(snapshot.get(&boundary()), Some(&vec![lock]));
    }

    #[test]
    fn test_action_ids_set() {
        let store = LockStore::new();
        store.add(&boundary(), &info("b"));
        store.add(&boundary(), &info("a"));
        let ids = store.action_ids(&boundary());
        assert_eq!(
            ids.into_iter().collect::<Vec<_>>(),
            vec![ActionId::new("a"), ActionId::new("b")]
        );
    }
}
