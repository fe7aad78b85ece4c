//! Fuzz target for the lock state container.
//!
//! Applies arbitrary operation sequences to a `LockStore` and checks the
//! primary/secondary index invariants after every step. Must never panic.

#![no_main]

use gk_common::{ActionId, BoundaryId, ExecutionMode, LockInfo};
use gk_core::LockStore;
use libfuzzer_sys::fuzz_target;

#[derive(arbitrary::Arbitrary, Debug)]
enum Op {
    Add { boundary: u8, action: u8 },
    RemoveOldest { boundary: u8 },
    RemoveAction { boundary: u8, action: u8 },
    CleanupBoundary { boundary: u8 },
    Cleanup,
}

fn boundary(tag: u8) -> BoundaryId {
    BoundaryId::new(format!("b{}", tag % 4))
}

fn action(tag: u8) -> ActionId {
    ActionId::new(format!("a{}", tag % 8))
}

fn check_invariants(store: &LockStore, boundary: &BoundaryId) {
    let locks = store.locks(boundary);
    for info in &locks {
        assert!(store.contains(boundary, info.action_id()));
    }
    for action_id in store.action_ids(boundary) {
        let by_enumeration = locks
            .iter()
            .filter(|info| info.action_id() == &action_id)
            .count();
        assert_eq!(store.count(boundary, &action_id), by_enumeration);
        assert!(by_enumeration > 0);
    }
}

fuzz_target!(|ops: Vec<Op>| {
    let store = LockStore::new();
    for op in ops {
        match op {
            Op::Add { boundary: b, action: a } => {
                let info = LockInfo::single_execution(
                    action(a).as_str(),
                    ExecutionMode::Action,
                );
                assert!(store.add(&boundary(b), &info));
                check_invariants(&store, &boundary(b));
            }
            Op::RemoveOldest { boundary: b } => {
                if let Some(info) = store.locks(&boundary(b)).into_iter().next() {
                    assert!(store.remove(&boundary(b), &info));
                    // Second removal of the same id is a silent no-op.
                    assert!(!store.remove(&boundary(b), &info));
                }
                check_invariants(&store, &boundary(b));
            }
            Op::RemoveAction { boundary: b, action: a } => {
                let removed = store.remove_action(&boundary(b), &action(a));
                assert!(removed.iter().all(|info| info.action_id() == &action(a)));
                assert!(!store.contains(&boundary(b), &action(a)));
                check_invariants(&store, &boundary(b));
            }
            Op::CleanupBoundary { boundary: b } => {
                store.cleanup_boundary(&boundary(b));
                assert!(store.locks(&boundary(b)).is_empty());
            }
            Op::Cleanup => {
                store.cleanup();
                assert!(store.snapshot().is_empty());
            }
        }
    }
});
