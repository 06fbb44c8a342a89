//! Last-value status store shared with the HTTP boundary.
//!
//! Holds one string per fixed key. Handlers overwrite unconditionally;
//! readers take a consistent snapshot under a read lock and never wait on
//! an in-flight job.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// The fixed set of status keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusKey {
    Narration,
    Quest,
    Villager,
    QuestCheck,
}

impl StatusKey {
    pub const ALL: [StatusKey; 4] = [
        StatusKey::Narration,
        StatusKey::Quest,
        StatusKey::Villager,
        StatusKey::QuestCheck,
    ];

    /// Wire name used in the status JSON.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Narration => "narration",
            Self::Quest => "quest",
            Self::Villager => "villager",
            Self::QuestCheck => "quest_check",
        }
    }
}

impl std::fmt::Display for StatusKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time copy of every status value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub narration: String,
    pub quest: String,
    pub villager: String,
    pub quest_check: String,
}

impl StatusSnapshot {
    pub fn get(&self, key: StatusKey) -> &str {
        match key {
            StatusKey::Narration => &self.narration,
            StatusKey::Quest => &self.quest,
            StatusKey::Villager => &self.villager,
            StatusKey::QuestCheck => &self.quest_check,
        }
    }

    fn slot_mut(&mut self, key: StatusKey) -> &mut String {
        match key {
            StatusKey::Narration => &mut self.narration,
            StatusKey::Quest => &mut self.quest,
            StatusKey::Villager => &mut self.villager,
            StatusKey::QuestCheck => &mut self.quest_check,
        }
    }
}

/// Cloneable handle to the shared status values.
#[derive(Debug, Clone, Default)]
pub struct StatusStore {
    inner: Arc<RwLock<StatusSnapshot>>,
}

impl StatusStore {
    /// Create a store with every key set to the empty string.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the value for `key`.
    pub fn set(&self, key: StatusKey, value: impl Into<String>) {
        let value = value.into();
        // A poisoned lock only means a writer panicked mid-assignment of a
        // whole String; the data is still a valid snapshot.
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *guard.slot_mut(key) = value;
    }

    /// Current value for `key`.
    pub fn get(&self, key: StatusKey) -> String {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        guard.get(key).to_owned()
    }

    /// Consistent copy of all values.
    pub fn snapshot(&self) -> StatusSnapshot {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
