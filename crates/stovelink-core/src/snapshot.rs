//! Last-known value set for all commands.
//!
//! The snapshot is owned by the client facade and written only from its
//! update loop; readers get a clone. Each response replaces one entry
//! whole, so a reader never observes a half-written decode.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::StoveUpdate;
use crate::value::StoveValue;

/// One decoded value plus the time it was received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// The decoded value.
    pub value: StoveValue,
    /// When the value arrived from the device.
    pub updated_at: DateTime<Utc>,
}

/// The latest known value for every command that has answered so far.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoveSnapshot {
    entries: HashMap<String, SnapshotEntry>,
}

impl StoveSnapshot {
    /// Creates an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one update, replacing any previous entry for the command.
    pub fn apply(&mut self, update: &StoveUpdate) {
        self.entries.insert(
            update.command.clone(),
            SnapshotEntry {
                value: update.value.clone(),
                updated_at: update.received_at,
            },
        );
    }

    /// Returns the entry for a command, if it has ever answered.
    pub fn get(&self, command: &str) -> Option<&SnapshotEntry> {
        self.entries.get(command)
    }

    /// Returns the decoded value for a command.
    pub fn value(&self, command: &str) -> Option<&StoveValue> {
        self.entries.get(command).map(|entry| &entry.value)
    }

    /// True if every listed command has an entry.
    pub fn contains_all<'a>(&self, commands: impl IntoIterator<Item = &'a str>) -> bool {
        commands.into_iter().all(|name| self.entries.contains_key(name))
    }

    /// Number of commands with a known value.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no command has answered yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over entries in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SnapshotEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    /// Drops all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
