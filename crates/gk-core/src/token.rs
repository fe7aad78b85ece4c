//! Unlock tokens, release scheduling, and the RAII lock guard.
//!
//! A successful acquisition returns a [`LockGuard`] owning one
//! [`UnlockToken`]. Invoking the guard (or dropping it) fires the token
//! once, which runs `strategy.unlock(boundary, info)` per the configured
//! [`UnlockOption`]. Deferred options post to a caller-supplied
//! [`Scheduler`]; the engine never hard-codes a runtime.

use crate::logging::event_names;
use crate::strategy::{DynStrategy, Strategy};
use gk_common::{BoundaryId, LockInfo};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// When the release takes effect after the token fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnlockOption {
    /// Release synchronously on the calling thread.
    Immediate,
    /// Defer to the next iteration of the host's main loop.
    NextTick,
    /// Delay by the platform UI-transition duration configured on the
    /// engine.
    Transition,
    /// Delay by a caller-specified duration.
    Delayed(Duration),
}

/// Deferred-task abstraction over the host's scheduler.
///
/// Typically backed by the host's main loop; [`ThreadScheduler`] is the
/// standalone default.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, delay: Duration, task: Box<dyn FnOnce() + Send + 'static>);
}

/// Default scheduler: one spawned thread per deferred release.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadScheduler;

impl Scheduler for ThreadScheduler {
    fn schedule(&self, delay: Duration, task: Box<dyn FnOnce() + Send + 'static>) {
        std::thread::spawn(move || {
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
            task();
        });
    }
}

/// Captured release: `(boundary, info, strategy, option)`.
pub struct UnlockToken {
    boundary: BoundaryId,
    info: LockInfo,
    strategy: DynStrategy,
    option: UnlockOption,
}

impl UnlockToken {
    pub(crate) fn new(
        boundary: BoundaryId,
        info: LockInfo,
        strategy: DynStrategy,
        option: UnlockOption,
    ) -> Self {
        UnlockToken {
            boundary,
            info,
            strategy,
            option,
        }
    }

    /// Run or schedule the release per the token's option.
    fn fire(self, scheduler: &Arc<dyn Scheduler>, transition_delay: Duration) {
        let UnlockToken {
            boundary,
            info,
            strategy,
            option,
        } = self;
        let delay = match option {
            UnlockOption::Immediate => {
                strategy.unlock(&boundary, &info);
                tracing::debug!(
                    target: "gk_core::token",
                    event = event_names::RELEASE_FIRED,
                    boundary = %boundary,
                    info = %info,
                );
                return;
            }
            UnlockOption::NextTick => Duration::ZERO,
            UnlockOption::Transition => transition_delay,
            UnlockOption::Delayed(delay) => delay,
        };
        tracing::debug!(
            target: "gk_core::token",
            event = event_names::RELEASE_SCHEDULED,
            boundary = %boundary,
            info = %info,
            delay_ms = delay.as_millis() as u64,
        );
        scheduler.schedule(
            delay,
            Box::new(move || {
                strategy.unlock(&boundary, &info);
                tracing::debug!(
                    target: "gk_core::token",
                    event = event_names::RELEASE_FIRED,
                    boundary = %boundary,
                    info = %info,
                );
            }),
        );
    }
}

/// Movable owner of an unlock token.
///
/// Dropping the guard without having unlocked fires the token once.
/// Unlock is idempotent at the strategy level, so a raced double release
/// stays harmless.
pub struct LockGuard {
    token: Option<UnlockToken>,
    scheduler: Arc<dyn Scheduler>,
    transition_delay: Duration,
}

impl LockGuard {
    pub(crate) fn new(
        token: UnlockToken,
        scheduler: Arc<dyn Scheduler>,
        transition_delay: Duration,
    ) -> Self {
        LockGuard {
            token: Some(token),
            scheduler,
            transition_delay,
        }
    }

    pub fn boundary(&self) -> Option<&BoundaryId> {
        self.token.as_ref().map(|t| &t.boundary)
    }

    pub fn info(&self) -> Option<&LockInfo> {
        self.token.as_ref().map(|t| &t.info)
    }

    /// Release with the option captured at acquisition.
    pub fn unlock(mut self) {
        self.fire(None);
    }

    /// Release with a different option than captured.
    pub fn unlock_with(mut self, option: UnlockOption) {
        self.fire(Some(option));
    }

    fn fire(&mut self, override_option: Option<UnlockOption>) {
        if let Some(mut token) = self.token.take() {
            if let Some(option) = override_option {
                token.option = option;
            }
            token.fire(&self.scheduler, self.transition_delay);
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.fire(None);
    }
}

impl fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.token {
            Some(token) => write!(
                f,
                "LockGuard({}, {}, {:?})",
                token.boundary, token.info, token.option
            ),
            None => write!(f, "LockGuard(released)"),
        }
    }
}
