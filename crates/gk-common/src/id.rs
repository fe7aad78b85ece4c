//! Boundary, action, strategy, and instance identity types.
//!
//! A lock request is addressed by four identities:
//! - `BoundaryId`: the caller-defined scope conflicts are decided within.
//! - `ActionId`: the *kind* of action (many live instances may share it).
//! - `UniqueId`: one specific lock occurrence, fresh per info instance.
//! - `StrategyId`: which conflict policy evaluates the request.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Caller-supplied conflict scope (a screen, feature, or session tag).
///
/// The engine never inspects the tag; equality and hash are the only
/// operations performed on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoundaryId(String);

impl BoundaryId {
    /// Create a boundary id from any string-like tag.
    pub fn new(tag: impl Into<String>) -> Self {
        BoundaryId(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BoundaryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for BoundaryId {
    fn from(tag: &str) -> Self {
        BoundaryId(tag.to_string())
    }
}

impl From<String> for BoundaryId {
    fn from(tag: String) -> Self {
        BoundaryId(tag)
    }
}

/// Name of a *kind* of action (e.g., `"fetchUser_123"`).
///
/// Not unique: several concurrent lock instances may carry the same
/// action id. Instance identity is [`UniqueId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(String);

impl ActionId {
    pub fn new(name: impl Into<String>) -> Self {
        ActionId(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ActionId {
    fn from(name: &str) -> Self {
        ActionId(name.to_string())
    }
}

impl From<String> for ActionId {
    fn from(name: String) -> Self {
        ActionId(name)
    }
}

/// Fresh 128-bit identifier attached to each lock info instance.
///
/// Uniquely identifies one lock occurrence across its lifetime; info
/// equality is defined solely by this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UniqueId(uuid::Uuid);

impl UniqueId {
    /// Generate a new random id.
    pub fn new() -> Self {
        UniqueId(uuid::Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }

    /// Hyphen-free short form for table output (first 8 hex digits).
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for UniqueId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// String-valued strategy identifier, optionally carrying configuration
/// in the form `"name:config"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrategyId(String);

impl StrategyId {
    pub fn new(name: impl Into<String>) -> Self {
        StrategyId(name.into())
    }

    /// Build a configured id of the form `"name:config"`.
    pub fn configured(name: &str, config: &str) -> Self {
        StrategyId(format!("{}:{}", name, config))
    }

    /// Build the id of a composite over the given sub-strategy ids:
    /// `"composite:<name>+<name>..."`.
    pub fn composite_of<'a>(subs: impl IntoIterator<Item = &'a StrategyId>) -> Self {
        let joined = subs
            .into_iter()
            .map(|s| s.name())
            .collect::<Vec<_>>()
            .join("+");
        StrategyId::configured(strategy_ids::COMPOSITE, &joined)
    }

    /// The base name, with any `:config` suffix stripped.
    pub fn name(&self) -> &str {
        match self.0.split_once(':') {
            Some((name, _)) => name,
            None => &self.0,
        }
    }

    /// The configuration suffix, when present.
    pub fn config(&self) -> Option<&str> {
        self.0.split_once(':').map(|(_, config)| config)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StrategyId {
    fn from(id: &str) -> Self {
        StrategyId(id.to_string())
    }
}

/// A named coordination group for group-coordination locks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(String);

impl GroupId {
    pub fn new(name: impl Into<String>) -> Self {
        GroupId(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for GroupId {
    fn from(name: &str) -> Self {
        GroupId(name.to_string())
    }
}

/// Key under which concurrency-limited locks are counted.
///
/// Falls back to the action id when the info does not name one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConcurrencyId(String);

impl ConcurrencyId {
    pub fn new(key: impl Into<String>) -> Self {
        ConcurrencyId(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConcurrencyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ConcurrencyId {
    fn from(key: &str) -> Self {
        ConcurrencyId(key.to_string())
    }
}

/// Well-known ids of the built-in strategies.
pub mod strategy_ids {
    pub const SINGLE_EXECUTION: &str = "single_execution";
    pub const PRIORITY: &str = "priority";
    pub const GROUP_COORDINATION: &str = "group_coordination";
    pub const CONCURRENCY_LIMITED: &str = "concurrency_limited";
    pub const DYNAMIC_CONDITION: &str = "dynamic_condition";
    pub const COMPOSITE: &str = "composite";
}
