//! Process-wide strategy registry.
//!
//! Maps `StrategyId -> DynStrategy` behind one RwLock. Registration is
//! unique per id; resolution failures and payload-kind mismatches surface
//! as [`RegistryError`]. A process-wide default registry carrying the five
//! built-ins lives behind `StrategyRegistry::global()`; tests construct
//! isolated instances instead of swapping the global.

use crate::logging::event_names;
use crate::strategy::{
    ConcurrencyLimitedStrategy, DynStrategy, DynamicConditionStrategy, GroupCoordinationStrategy,
    PriorityStrategy, SingleExecutionStrategy, Strategy,
};
use gk_common::{BoundaryId, LockInfo, RegistryError, StrategyId};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

#[derive(Default)]
pub struct StrategyRegistry {
    inner: RwLock<HashMap<StrategyId, DynStrategy>>,
}

impl StrategyRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-loaded with the five built-in strategies. Composites
    /// are configuration-specific and registered by the host.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        let defaults: [DynStrategy; 5] = [
            Arc::new(SingleExecutionStrategy::new()),
            Arc::new(PriorityStrategy::new()),
            Arc::new(GroupCoordinationStrategy::new()),
            Arc::new(ConcurrencyLimitedStrategy::new()),
            Arc::new(DynamicConditionStrategy::new()),
        ];
        for strategy in defaults {
            // Fresh registry, fresh ids: registration cannot collide.
            let _ = registry.register(strategy);
        }
        registry
    }

    /// The process-wide default registry.
    pub fn global() -> &'static StrategyRegistry {
        static GLOBAL: OnceLock<StrategyRegistry> = OnceLock::new();
        GLOBAL.get_or_init(StrategyRegistry::with_defaults)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<StrategyId, DynStrategy>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<StrategyId, DynStrategy>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a strategy under its own id.
    pub fn register(&self, strategy: DynStrategy) -> Result<(), RegistryError> {
        let id = strategy.strategy_id();
        let mut map = self.write();
        if map.contains_key(&id) {
            return Err(RegistryError::StrategyAlreadyRegistered(id));
        }
        tracing::debug!(
            target: "gk_core::registry",
            event = event_names::STRATEGY_REGISTERED,
            strategy = %id,
        );
        map.insert(id, strategy);
        Ok(())
    }

    /// Resolve a strategy handle by id.
    pub fn resolve(&self, id: &StrategyId) -> Result<DynStrategy, RegistryError> {
        self.read()
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::StrategyNotRegistered(id.clone()))
    }

    /// Resolve the strategy for an info and verify the payload kind matches
    /// what the strategy expects.
    pub fn resolve_for(&self, info: &LockInfo) -> Result<DynStrategy, RegistryError> {
        let strategy = self.resolve(info.strategy_id())?;
        if strategy.payload_kind() != info.kind() {
            return Err(RegistryError::PayloadMismatch {
                strategy_id: strategy.strategy_id(),
                expected: strategy.payload_kind(),
                actual: info.kind(),
            });
        }
        Ok(strategy)
    }

    /// Remove every registration. Test isolation only.
    pub fn unregister_all(&self) {
        self.write().clear();
    }

    /// Registered ids, unordered.
    pub fn ids(&self) -> Vec<StrategyId> {
        self.read().keys().cloned().collect()
    }

    /// Registered strategy handles, unordered.
    pub fn strategies(&self) -> Vec<DynStrategy> {
        self.read().values().cloned().collect()
    }

    /// Clear lock state in every registered strategy.
    pub fn cleanup(&self) {
        for strategy in self.strategies() {
            strategy.cleanup();
        }
    }

    /// Clear one boundary's lock state in every registered strategy.
    pub fn cleanup_boundary(&self, boundary: &BoundaryId) {
        for strategy in self.strategies() {
            strategy.cleanup_boundary(boundary);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::CompositeStrategy;
    use gk_common::{strategy_ids, ExecutionMode, Priority};

    #[test]
    fn test_defaults_cover_the_built_ins() {
        let registry = StrategyRegistry::with_defaults();
        for id in [
            strategy_ids::SINGLE_EXECUTION,
            strategy_ids::PRIORITY,
            strategy_ids::GROUP_COORDINATION,
            strategy_ids::CONCURRENCY_LIMITED,
            strategy_ids::DYNAMIC_CONDITION,
        ] {
            assert!(registry.resolve(&StrategyId::new(id)).is_ok(), "{}", id);
        }
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let registry = StrategyRegistry::with_defaults();
        let dup: DynStrategy = Arc::new(crate::strategy::SingleExecutionStrategy::new());
        assert!(matches!(
            registry.register(dup),
            Err(RegistryError::StrategyAlreadyRegistered(_))
        ));
    }

    #[test]
    fn test_unknown_id_fails_resolution() {
        let registry = StrategyRegistry::new();
        assert!(matches!(
            registry.resolve(&StrategyId::new("nope")),
            Err(RegistryError::StrategyNotRegistered(_))
        ));
    }

    #[test]
    fn test_resolve_for_checks_payload_kind() {
        let registry = StrategyRegistry::with_defaults();
        // An info whose strategy id names single_execution but whose payload
        // is a priority payload cannot be hand-built through constructors;
        // the mismatch check instead guards composite ids resolving to a
        // non-composite strategy and vice versa.
        let composite_info = LockInfo::composite(
            "x",
            vec![
                LockInfo::single_execution("x", ExecutionMode::Action),
                LockInfo::priority("x", Priority::None, false),
            ],
        )
        .unwrap();
        // No composite registered under that id yet.
        assert!(matches!(
            registry.resolve_for(&composite_info),
            Err(RegistryError::StrategyNotRegistered(_))
        ));

        let single = registry
            .resolve(&StrategyId::new(strategy_ids::SINGLE_EXECUTION))
            .unwrap();
        let priority = registry
            .resolve(&StrategyId::new(strategy_ids::PRIORITY))
            .unwrap();
        let composite = CompositeStrategy::new(vec![single, priority]).unwrap();
        registry.register(Arc::new(composite)).unwrap();
        assert!(registry.resolve_for(&composite_info).is_ok());
    }

    #[test]
    fn test_unregister_all_empties_the_registry() {
        let registry = StrategyRegistry::with_defaults();
        registry.unregister_all();
        assert!(registry.ids().is_empty());
    }

    #[test]
    fn test_cleanup_fans_out() {
        let registry = StrategyRegistry::with_defaults();
        let boundary = BoundaryId::new("b1");
        let info = LockInfo::single_execution("fetch", ExecutionMode::Boundary);
        let strategy = registry.resolve_for(&info).unwrap();
        strategy.lock(&boundary, &info);
        assert!(!strategy.current_locks().is_empty());

        registry.cleanup();
        assert!(strategy.current_locks().is_empty());
    }
}
