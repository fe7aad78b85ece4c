//! Structured event definitions for acquisition logging.
//!
//! One [`LockEvent`] is emitted per `can_lock` decision (when logging is
//! enabled on the engine) and per release. Events follow a consistent
//! schema for machine-parseable JSONL output.

use chrono::{DateTime, Utc};
use gk_common::{AcquireResult, ActionId, BoundaryId, InfoRecord, LockInfo, StrategyId, UniqueId};
use serde::{Deserialize, Serialize};

/// Log levels for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// Standard event names used in logging.
pub mod event_names {
    // Acquisition decisions
    pub const ACQUIRE_SUCCEEDED: &str = "acquire.succeeded";
    pub const ACQUIRE_PREEMPTED: &str = "acquire.preempted";
    pub const ACQUIRE_REJECTED: &str = "acquire.rejected";

    // Release lifecycle
    pub const RELEASE_FIRED: &str = "release.fired";
    pub const RELEASE_SCHEDULED: &str = "release.scheduled";

    // Maintenance
    pub const CLEANUP_PERFORMED: &str = "cleanup.performed";
    pub const STRATEGY_REGISTERED: &str = "registry.registered";
}

/// A structured log event for one acquisition decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockEvent {
    /// Timestamp when the decision was made.
    pub ts: DateTime<Utc>,

    /// Log level.
    pub level: Level,

    /// Event name (e.g., "acquire.succeeded").
    pub event: String,

    /// Boundary the decision was made on.
    pub boundary: BoundaryId,

    /// Strategy that evaluated the request.
    pub strategy: StrategyId,

    /// Requesting action.
    pub action_id: ActionId,

    /// Requesting lock instance.
    pub unique_id: UniqueId,

    /// Stable outcome label (`success` / `success_with_cancellation` /
    /// `failure`).
    pub outcome: String,

    /// Rejection or preemption reason, when the result carries an error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Victims the caller must cancel, for preemption outcomes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cancelled: Vec<InfoRecord>,
}

impl LockEvent {
    /// Build the event for one `can_lock` decision.
    pub fn from_decision(result: &AcquireResult, boundary: &BoundaryId, info: &LockInfo) -> Self {
        let (level, event) = match result {
            AcquireResult::Success => (Level::Info, event_names::ACQUIRE_SUCCEEDED),
            AcquireResult::SuccessWithPrecedingCancellation(_) => {
                (Level::Info, event_names::ACQUIRE_PREEMPTED)
            }
            AcquireResult::Failure(_) => (Level::Warn, event_names::ACQUIRE_REJECTED),
        };
        LockEvent {
            ts: Utc::now(),
            level,
            event: event.to_string(),
            boundary: boundary.clone(),
            strategy: info.strategy_id().clone(),
            action_id: info.action_id().clone(),
            unique_id: info.unique_id(),
            outcome: result.outcome_label().to_string(),
            reason: result.error().map(|e| e.failure_reason()),
            cancelled: result.victims().into_iter().map(InfoRecord::from).collect(),
        }
    }

    /// Serialize to a single JSONL line.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"event":"{}","error":"serialization_failed"}}"#, self.event)
        })
    }
}
