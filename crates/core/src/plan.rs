// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plan items: the unit of work submitted to the queue.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Unique identifier of a plan item: 128 random bits, hex-encoded
/// (32 lowercase characters). Assigned by the manager at insert time and
/// stable for the lifetime of the item, across moves, restarts, and
/// re-queueing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanUid(String);

impl PlanUid {
    /// Generate a new random UID.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Create a UID from an existing string (parsing/deserialization).
    pub fn from_string(uid: impl Into<String>) -> Self {
        Self(uid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for PlanUid {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PlanUid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PlanUid {
    fn from(s: &str) -> Self {
        Self::from_string(s)
    }
}

impl From<String> for PlanUid {
    fn from(s: String) -> Self {
        Self::from_string(s)
    }
}

impl AsRef<str> for PlanUid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for PlanUid {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for PlanUid {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// A plan as submitted by a client: no UID, no timestamp. The manager turns
/// a spec into a [`PlanItem`] when the item is placed in the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSpec {
    /// Plan name, resolved against the worker environment's allowed plans.
    pub name: String,
    /// Positional arguments.
    #[serde(default)]
    pub args: Vec<Value>,
    /// Keyword arguments; insertion order is preserved on the wire.
    #[serde(default)]
    pub kwargs: IndexMap<String, Value>,
    /// Free-form metadata carried with the item but not interpreted.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub meta: serde_json::Map<String, Value>,
}

impl PlanSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            kwargs: IndexMap::new(),
            meta: serde_json::Map::new(),
        }
    }

    /// Promote the spec into a queue item with a freshly assigned UID.
    pub fn into_item(self, plan_uid: PlanUid, added_at_epoch_ms: u64) -> PlanItem {
        PlanItem {
            plan_uid,
            name: self.name,
            args: self.args,
            kwargs: self.kwargs,
            meta: self.meta,
            added_at_epoch_ms,
        }
    }
}

/// A submitted unit of work, as held in the queue, the running slot, and
/// history entries.
///
/// Wire format: `{plan_uid, name, args, kwargs, meta?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanItem {
    pub plan_uid: PlanUid,
    pub name: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: IndexMap<String, Value>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub meta: serde_json::Map<String, Value>,
    /// Insert timestamp (unix epoch milliseconds).
    #[serde(default)]
    pub added_at_epoch_ms: u64,
}

impl PlanItem {
    /// Fallback item for a UID the worker reports but the rehydrated queue
    /// store does not know (snapshot lost or unavailable).
    pub fn placeholder(plan_uid: PlanUid) -> Self {
        Self {
            plan_uid,
            name: "<unknown>".to_string(),
            args: Vec::new(),
            kwargs: IndexMap::new(),
            meta: serde_json::Map::new(),
            added_at_epoch_ms: 0,
        }
    }
}

#[cfg(test)]
#[path = "plan_tests.rs"]
mod tests;
