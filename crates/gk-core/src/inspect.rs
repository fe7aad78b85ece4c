//! Debug inspection: cross-strategy snapshots and a table renderer.

use crate::registry::StrategyRegistry;
use crate::strategy::Strategy;
use gk_common::{BoundaryId, InfoRecord, StrategyId, UniqueId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// One current lock as seen by inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// Strategy that tracks the lock.
    pub strategy_id: StrategyId,
    /// Snapshot form of the lock info.
    pub info: InfoRecord,
}

/// Collect every current lock across the registry, grouped by boundary.
///
/// Strategies are visited in id order so output is deterministic; a lock
/// reachable through several registrations (a composite and its standalone
/// subs share state) appears once, under the first strategy visited.
pub fn snapshot(registry: &StrategyRegistry) -> BTreeMap<BoundaryId, Vec<SnapshotEntry>> {
    let mut strategies = registry.strategies();
    strategies.sort_by_key(|s| s.strategy_id());

    let mut result: BTreeMap<BoundaryId, Vec<SnapshotEntry>> = BTreeMap::new();
    let mut seen: HashSet<UniqueId> = HashSet::new();
    for strategy in strategies {
        let strategy_id = strategy.strategy_id();
        for (boundary, locks) in strategy.current_locks() {
            for info in locks {
                if !seen.insert(info.unique_id()) {
                    continue;
                }
                result.entry(boundary.clone()).or_default().push(SnapshotEntry {
                    strategy_id: strategy_id.clone(),
                    info: InfoRecord::from(&info),
                });
            }
        }
    }
    result
}

/// Render a snapshot as an aligned text table with columns
/// `Strategy | Boundary | ActionId/UniqueId | Additional`.
pub fn format_table(snapshot: &BTreeMap<BoundaryId, Vec<SnapshotEntry>>) -> String {
    const HEADERS: [&str; 4] = ["Strategy", "Boundary", "ActionId/UniqueId", "Additional"];

    let mut rows: Vec<[String; 4]> = Vec::new();
    for (boundary, entries) in snapshot {
        for entry in entries {
            rows.push([
                entry.strategy_id.to_string(),
                boundary.to_string(),
                format!(
                    "{} ({})",
                    entry.info.action_id,
                    entry.info.unique_id.short()
                ),
                entry.info.detail.clone(),
            ]);
        }
    }

    let mut widths: [usize; 4] = [0; 4];
    for (i, header) in HEADERS.iter().enumerate() {
        widths[i] = header.len();
    }
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let render = |cells: [&str; 4]| -> String {
        format!(
            "{:<w0$}  {:<w1$}  {:<w2$}  {:<w3$}",
            cells[0],
            cells[1],
            cells[2],
            cells[3],
            w0 = widths[0],
            w1 = widths[1],
            w2 = widths[2],
            w3 = widths[3],
        )
        .trim_end()
        .to_string()
    };

    let mut out = String::new();
    out.push_str(&render(HEADERS));
    out.push('\n');
    out.push_str(&"-".repeat(widths.iter().sum::<usize>() + 6));
    out.push('\n');
    if rows.is_empty() {
        out.push_str("(no locks held)\n");
        return out;
    }
    for row in &rows {
        out.push_str(&render([
            row[0].as_str(),
            row[1].as_str(),
            row[2].as_str(),
            row[3].as_str(),
        ]));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use gk_common::{ExecutionMode, LockInfo, Priority, PriorityBehavior};

    #[test]
    fn test_snapshot_groups_by_boundary() {
        let registry = StrategyRegistry::with_defaults();
        let b1 = BoundaryId::new("b1");
        let b2 = BoundaryId::new("b2");

        let fetch = LockInfo::single_execution("fetch", ExecutionMode::Boundary);
        let sync = LockInfo::priority("sync", Priority::High(PriorityBehavior::Exclusive), false);
        registry.resolve_for(&fetch).unwrap().lock(&b1, &fetch);
        registry.resolve_for(&sync).unwrap().lock(&b2, &sync);

        let snapshot = snapshot(&registry);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[&b1][0].info.action_id.as_str(), "fetch");
        assert_eq!(snapshot[&b2][0].info.action_id.as_str(), "sync");
    }

    #[test]
    fn test_snapshot_serializes_to_json() {
        let registry = StrategyRegistry::with_defaults();
        let b1 = BoundaryId::new("b1");
        let fetch = LockInfo::single_execution("fetch", ExecutionMode::Boundary);
        registry.resolve_for(&fetch).unwrap().lock(&b1, &fetch);

        let json = serde_json::to_string(&snapshot(&registry)).unwrap();
        assert!(json.contains("\"b1\""));
        assert!(json.contains("single_execution"));
    }

    #[test]
    fn test_table_contains_headers_and_rows() {
        let registry = StrategyRegistry::with_defaults();
        let b1 = BoundaryId::new("b1");
        let fetch = LockInfo::single_execution("fetch", ExecutionMode::Boundary);
        registry.resolve_for(&fetch).unwrap().lock(&b1, &fetch);

        let table = format_table(&snapshot(&registry));
        assert!(table.contains("Strategy"));
        assert!(table.contains("ActionId/UniqueId"));
        assert!(table.contains("fetch ("));
        assert!(table.contains("mode: boundary"));
    }

    #[test]
    fn test_empty_snapshot_renders_placeholder() {
        let registry = StrategyRegistry::with_defaults();
        let table = format_table(&snapshot(&registry));
        assert!(table.contains("(no locks held)"));
    }
}
