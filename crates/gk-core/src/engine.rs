//! Acquisition orchestrator: boundary gates, strategy dispatch, guards.
//!
//! The engine is the single externally-facing acquisition path. For each
//! request it takes the boundary's gate, resolves the strategy, runs
//! `can_lock`, and on a success variant runs `lock` *inside the gate*
//! before minting a [`LockGuard`]. The gate closes the TOCTOU window
//! between inspection and insert; it is never held during the caller's
//! operation itself.
//!
//! Cancelling a preempted peer is the caller's obligation: cancel its
//! effect, then release its lock ([`LockEngine::unlock_victims`] covers
//! the second half). The engine does not do this automatically because
//! peer cancellation is a host-task concern.

use crate::inspect::{self, SnapshotEntry};
use crate::logging::{report_issue, LockEvent};
use crate::registry::StrategyRegistry;
use crate::strategy::Strategy;
use crate::token::{LockGuard, Scheduler, ThreadScheduler, UnlockOption, UnlockToken};
use gk_common::error::EngineError;
use gk_common::{AcquireResult, BoundaryId, LockError, LockInfo};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;

/// Engine construction options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Emit one structured record per `can_lock` decision.
    pub logging_enabled: bool,
    /// Delay applied by `UnlockOption::Transition`, mapped to the host's
    /// UI animation duration.
    pub transition_delay: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            logging_enabled: false,
            transition_delay: Duration::from_millis(350),
        }
    }
}

impl EngineConfig {
    pub fn with_logging(mut self, enabled: bool) -> Self {
        self.logging_enabled = enabled;
        self
    }

    pub fn with_transition_delay(mut self, delay: Duration) -> Self {
        self.transition_delay = delay;
        self
    }
}

/// Per-call conflict override applied on top of the strategy's verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictOverride {
    /// Pass the strategy's verdict through unchanged.
    #[default]
    UseStrategyDefault,
    /// Upgrade a rejection naming an existing cancellation-target lock into
    /// a preemption success with that lock as the victim.
    CancelExisting,
    /// Downgrade a preemption success into a rejection.
    BlockNew,
}

fn apply_conflict_override(
    result: AcquireResult,
    conflict: ConflictOverride,
    boundary: &BoundaryId,
) -> AcquireResult {
    match conflict {
        ConflictOverride::UseStrategyDefault => result,
        ConflictOverride::CancelExisting => match result {
            AcquireResult::Failure(err) => {
                let victim = err
                    .existing_info()
                    .filter(|existing| existing.is_cancellation_target())
                    .cloned();
                match victim {
                    Some(victim) => AcquireResult::SuccessWithPrecedingCancellation(
                        EngineError::OverridePreemption {
                            boundary: boundary.clone(),
                            victim,
                        }
                        .into(),
                    ),
                    None => AcquireResult::Failure(err),
                }
            }
            other => other,
        },
        ConflictOverride::BlockNew => match result {
            AcquireResult::SuccessWithPrecedingCancellation(err) => AcquireResult::Failure(
                EngineError::OverrideBlocked {
                    boundary: boundary.clone(),
                    cause: Box::new(err),
                }
                .into(),
            ),
            other => other,
        },
    }
}

/// The action coordination engine.
pub struct LockEngine {
    registry: Arc<StrategyRegistry>,
    gates: Mutex<HashMap<BoundaryId, Arc<Mutex<()>>>>,
    scheduler: Arc<dyn Scheduler>,
    config: EngineConfig,
}

impl LockEngine {
    /// An isolated engine over a fresh registry carrying the built-ins.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_registry(Arc::new(StrategyRegistry::with_defaults()), config)
    }

    /// An engine over a caller-supplied registry.
    pub fn with_registry(registry: Arc<StrategyRegistry>, config: EngineConfig) -> Self {
        LockEngine {
            registry,
            gates: Mutex::new(HashMap::new()),
            scheduler: Arc::new(ThreadScheduler),
            config,
        }
    }

    /// Replace the release scheduler (typically the host's main loop).
    pub fn with_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// The process-wide default engine.
    pub fn global() -> &'static LockEngine {
        static GLOBAL: OnceLock<LockEngine> = OnceLock::new();
        GLOBAL.get_or_init(|| LockEngine::new(EngineConfig::default()))
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The boundary's gate, created lazily and kept for the session.
    fn gate(&self, boundary: &BoundaryId) -> Arc<Mutex<()>> {
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(gates.entry(boundary.clone()).or_default())
    }

    /// Acquire with immediate release semantics and no override.
    pub fn acquire(
        &self,
        boundary: &BoundaryId,
        info: LockInfo,
    ) -> (AcquireResult, Option<LockGuard>) {
        self.acquire_with(
            boundary,
            info,
            UnlockOption::Immediate,
            ConflictOverride::UseStrategyDefault,
        )
    }

    /// Acquire applying a per-call conflict override.
    pub fn acquire_overriding(
        &self,
        boundary: &BoundaryId,
        info: LockInfo,
        conflict: ConflictOverride,
    ) -> (AcquireResult, Option<LockGuard>) {
        self.acquire_with(boundary, info, UnlockOption::Immediate, conflict)
    }

    /// Full acquisition path: gate, resolve, inspect, insert, mint guard.
    pub fn acquire_with(
        &self,
        boundary: &BoundaryId,
        info: LockInfo,
        unlock_option: UnlockOption,
        conflict: ConflictOverride,
    ) -> (AcquireResult, Option<LockGuard>) {
        let gate = self.gate(boundary);
        let _held = gate.lock().unwrap_or_else(PoisonError::into_inner);

        let strategy = match self.registry.resolve_for(&info) {
            Ok(strategy) => strategy,
            Err(err) => {
                let result = AcquireResult::Failure(err.into());
                self.log_decision(&result, boundary, &info);
                return (result, None);
            }
        };

        let result =
            apply_conflict_override(strategy.can_lock(boundary, &info), conflict, boundary);
        self.log_decision(&result, boundary, &info);

        if result.should_proceed() {
            strategy.lock(boundary, &info);
            let token = UnlockToken::new(boundary.clone(), info, strategy, unlock_option);
            let guard = LockGuard::new(
                token,
                Arc::clone(&self.scheduler),
                self.config.transition_delay,
            );
            (result, Some(guard))
        } else {
            (result, None)
        }
    }

    /// Release a guard now; equivalent to `guard.unlock()`.
    pub fn release(&self, guard: LockGuard) {
        guard.unlock();
    }

    /// Release every victim carried by a preemption error. Call after
    /// cancelling the victims' effects.
    pub fn unlock_victims(&self, error: &LockError) {
        let victims = error.victim_info();
        if victims.is_empty() {
            return;
        }
        let Some(boundary) = error.boundary_id() else {
            report_issue("unlock_victims: preemption error without a boundary");
            return;
        };
        for victim in victims {
            match self.registry.resolve(victim.strategy_id()) {
                Ok(strategy) => strategy.unlock(boundary, victim),
                Err(err) => report_issue(&format!(
                    "unlock_victims: cannot release {}: {}",
                    victim, err
                )),
            }
        }
    }

    /// Global reset: clear every strategy's state. Gates survive (they are
    /// tiny and may be mid-acquire on other threads).
    pub fn cleanup(&self) {
        self.registry.cleanup();
        tracing::debug!(target: "gk_core::engine", event = "cleanup.performed", scope = "all");
    }

    /// Per-boundary reset; also evicts the boundary's gate.
    pub fn cleanup_boundary(&self, boundary: &BoundaryId) {
        self.registry.cleanup_boundary(boundary);
        self.gates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(boundary);
        tracing::debug!(
            target: "gk_core::engine",
            event = "cleanup.performed",
            scope = %boundary,
        );
    }

    /// Current locks across all registered strategies, grouped by boundary.
    pub fn snapshot(&self) -> BTreeMap<BoundaryId, Vec<SnapshotEntry>> {
        inspect::snapshot(&self.registry)
    }

    fn log_decision(&self, result: &AcquireResult, boundary: &BoundaryId, info: &LockInfo) {
        if !self.config.logging_enabled {
            return;
        }
        let event = LockEvent::from_decision(result, boundary, info);
        match result {
            AcquireResult::Failure(_) => tracing::warn!(
                target: "gk_core::engine",
                event = %event.event,
                boundary = %event.boundary,
                strategy = %event.strategy,
                action = %event.action_id,
                outcome = %event.outcome,
                reason = event.reason.as_deref().unwrap_or_default(),
            ),
            _ => tracing::info!(
                target: "gk_core::engine",
                event = %event.event,
                boundary = %event.boundary,
                strategy = %event.strategy,
                action = %event.action_id,
                outcome = %event.outcome,
                cancelled = event.cancelled.len(),
            ),
        }
    }
}
