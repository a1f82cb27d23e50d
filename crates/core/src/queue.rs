// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The plan queue: an ordered sequence of plan items with stable UIDs.
//!
//! Positions are zero-indexed from the front; negative positions count from
//! the back. Insertion clamps out-of-range integer positions (`> len` to the
//! back, `< -len` to the front); get, remove, and move destinations reject
//! them. UID-addressed operations fail on unknown UIDs.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::plan::{PlanItem, PlanUid};

/// Where to place an item on insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueuePosition {
    Front,
    Back,
    /// Integer position; out-of-range values clamp to front/back.
    Index(i64),
    /// Directly before the item with the given UID; unknown UID fails.
    BeforeUid(PlanUid),
    /// Directly after the item with the given UID; unknown UID fails.
    AfterUid(PlanUid),
}

impl Default for QueuePosition {
    fn default() -> Self {
        Self::Back
    }
}

/// How to address an existing item (get/remove/move source).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemRef {
    /// Integer position; out-of-range values are rejected.
    Index(i64),
    Uid(PlanUid),
}

/// Where to move an item to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveDestination {
    Front,
    Back,
    /// Final position of the item in the resulting queue; out-of-range
    /// values are rejected.
    Index(i64),
    BeforeUid(PlanUid),
    AfterUid(PlanUid),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("queue is empty")]
    Empty,

    #[error("position {0} is out of range")]
    OutOfRange(i64),

    #[error("unknown plan UID {0}")]
    UnknownUid(String),

    #[error("plan UID {0} is already in the queue")]
    DuplicateUid(String),

    #[error("cannot move an item relative to itself")]
    MoveOntoSelf,
}

/// Ordered queue of plan items. UIDs are unique; all mutations preserve
/// UID stability.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanQueue {
    items: VecDeque<PlanItem>,
}

impl PlanQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a queue from a persisted snapshot.
    pub fn from_items(items: Vec<PlanItem>) -> Self {
        Self { items: items.into() }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlanItem> {
        self.items.iter()
    }

    /// Full queue contents, front first.
    pub fn snapshot(&self) -> Vec<PlanItem> {
        self.items.iter().cloned().collect()
    }

    pub fn contains_uid(&self, uid: &PlanUid) -> bool {
        self.index_of(uid).is_some()
    }

    fn index_of(&self, uid: &PlanUid) -> Option<usize> {
        self.items.iter().position(|item| item.plan_uid == *uid)
    }

    /// Resolve an insertion position to an index in `[0, len]`, clamping
    /// out-of-range integers.
    fn resolve_insert(&self, pos: &QueuePosition) -> Result<usize, QueueError> {
        let len = self.items.len() as i64;
        match pos {
            QueuePosition::Front => Ok(0),
            QueuePosition::Back => Ok(len as usize),
            QueuePosition::Index(i) => {
                let idx = if *i < 0 { len + i } else { *i };
                Ok(idx.clamp(0, len) as usize)
            }
            QueuePosition::BeforeUid(uid) => self
                .index_of(uid)
                .ok_or_else(|| QueueError::UnknownUid(uid.to_string())),
            QueuePosition::AfterUid(uid) => self
                .index_of(uid)
                .map(|i| i + 1)
                .ok_or_else(|| QueueError::UnknownUid(uid.to_string())),
        }
    }

    /// Resolve an item reference to an index in `[0, len)`, rejecting
    /// out-of-range integers.
    fn resolve_ref(&self, item: &ItemRef) -> Result<usize, QueueError> {
        match item {
            ItemRef::Index(i) => self.resolve_strict(*i),
            ItemRef::Uid(uid) => self
                .index_of(uid)
                .ok_or_else(|| QueueError::UnknownUid(uid.to_string())),
        }
    }

    fn resolve_strict(&self, i: i64) -> Result<usize, QueueError> {
        let len = self.items.len() as i64;
        let idx = if i < 0 { len + i } else { i };
        if idx < 0 || idx >= len {
            return Err(QueueError::OutOfRange(i));
        }
        Ok(idx as usize)
    }

    /// Insert an item at the given position. Returns the index the item
    /// landed at.
    pub fn insert(&mut self, item: PlanItem, pos: &QueuePosition) -> Result<usize, QueueError> {
        if self.contains_uid(&item.plan_uid) {
            return Err(QueueError::DuplicateUid(item.plan_uid.to_string()));
        }
        let idx = self.resolve_insert(pos)?;
        self.items.insert(idx, item);
        Ok(idx)
    }

    /// Look up an item without removing it. `None` addresses the back of
    /// the queue.
    pub fn get(&self, item: Option<&ItemRef>) -> Result<&PlanItem, QueueError> {
        match item {
            Some(r) => {
                let idx = self.resolve_ref(r)?;
                self.items.get(idx).ok_or(QueueError::Empty)
            }
            None => self.items.back().ok_or(QueueError::Empty),
        }
    }

    /// Remove an item. `None` removes from the back of the queue.
    pub fn remove(&mut self, item: Option<&ItemRef>) -> Result<PlanItem, QueueError> {
        let idx = match item {
            Some(r) => self.resolve_ref(r)?,
            None => self.items.len().checked_sub(1).ok_or(QueueError::Empty)?,
        };
        self.items.remove(idx).ok_or(QueueError::Empty)
    }

    /// Move an item. The destination index refers to the item's final
    /// position in the resulting queue. Returns the moved item (cloned) and
    /// its final index.
    pub fn move_item(
        &mut self,
        src: &ItemRef,
        dst: &MoveDestination,
    ) -> Result<(PlanItem, usize), QueueError> {
        let src_idx = self.resolve_ref(src)?;
        // Validate positional destinations against the current length before
        // mutating, so failures leave the queue unchanged.
        let dst_idx = match dst {
            MoveDestination::Front => Some(0),
            MoveDestination::Back => Some(self.items.len() - 1),
            MoveDestination::Index(i) => Some(self.resolve_strict(*i)?),
            MoveDestination::BeforeUid(_) | MoveDestination::AfterUid(_) => None,
        };

        let moved = self.items.remove(src_idx).ok_or(QueueError::Empty)?;

        let dst_idx = match (dst_idx, dst) {
            (Some(idx), _) => idx,
            (None, MoveDestination::BeforeUid(uid)) => match self.index_of(uid) {
                Some(idx) => idx,
                None => {
                    let err = if moved.plan_uid == *uid {
                        QueueError::MoveOntoSelf
                    } else {
                        QueueError::UnknownUid(uid.to_string())
                    };
                    self.items.insert(src_idx, moved);
                    return Err(err);
                }
            },
            (None, MoveDestination::AfterUid(uid)) => match self.index_of(uid) {
                Some(idx) => idx + 1,
                None => {
                    let err = if moved.plan_uid == *uid {
                        QueueError::MoveOntoSelf
                    } else {
                        QueueError::UnknownUid(uid.to_string())
                    };
                    self.items.insert(src_idx, moved);
                    return Err(err);
                }
            },
            // Positional destinations were resolved above.
            (None, _) => src_idx,
        };

        let item = moved.clone();
        self.items.insert(dst_idx, moved);
        Ok((item, dst_idx))
    }

    /// Remove and return the front item.
    pub fn pop_front(&mut self) -> Option<PlanItem> {
        self.items.pop_front()
    }

    /// Re-queue an item at the front (environment destroy / worker crash
    /// recovery path).
    pub fn push_front(&mut self, item: PlanItem) {
        self.items.push_front(item);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
