//! Journal of vault operations
//!
//! Every public vault operation opens a [`JournalCollection`], appends notes while
//! it runs and commits the collection into the vault's bounded [`Journal`] once it
//! is finished, whatever the outcome.

use std::collections::VecDeque;

use alloy_primitives::Address;
use candid::CandidType;
use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::utils::error::{ManagerError, ManagerResult};

/// Category of a journal entry
#[derive(Clone, Copy, CandidType, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum LogType {
    Info,
    Governance,
    Allocation,
    Rebalance,
    Withdrawal,
    Harvest,
    Distribution,
    Rebase,
    ExecutionResult,
}

/// Journal entry
#[derive(Clone, CandidType, Debug, Deserialize, Serialize)]
pub struct JournalEntry {
    /// Block timestamp in seconds
    pub timestamp: u64,
    pub entry: ManagerResult<()>,
    pub log_type: LogType,
    /// Strategy the entry refers to, if any
    pub strategy: Option<String>,
    pub note: Option<String>,
}

impl JournalEntry {
    /// Create a new instance of a journal entry
    /// Fills the `timestamp`, `entry` and `log_type` fields
    pub fn new(timestamp: u64, entry: ManagerResult<()>, log_type: LogType) -> Self {
        Self {
            timestamp,
            entry,
            log_type,
            strategy: None,
            note: None,
        }
    }

    /// Fills the `strategy` field of the entry
    pub fn strategy(&mut self, strategy: Address) -> &mut Self {
        self.strategy = Some(strategy.to_string());
        self
    }

    /// Fills the `note` field of the entry
    pub fn note<S: AsRef<str>>(&mut self, text: S) -> &mut Self {
        self.note = Some(text.as_ref().to_string());
        self
    }

    pub fn is_err(&self) -> bool {
        self.entry.is_err()
    }

    /// RFC 3339 rendering of the timestamp
    pub fn formatted_timestamp(&self) -> String {
        DateTime::from_timestamp(self.timestamp as i64, 0)
            .map(|time| time.to_rfc3339())
            .unwrap_or_else(|| self.timestamp.to_string())
    }
}

/// Entries produced by a single vault operation
#[derive(Debug, Default)]
pub struct JournalCollection {
    timestamp: u64,
    entries: Vec<JournalEntry>,
}

impl JournalCollection {
    /// Opens an empty collection stamped with the current block time.
    pub fn open(timestamp: u64) -> Self {
        Self {
            timestamp,
            entries: vec![],
        }
    }

    pub fn append_note<S: AsRef<str>>(
        &mut self,
        entry: ManagerResult<()>,
        log_type: LogType,
        note: S,
    ) -> &mut Self {
        let mut journal_entry = JournalEntry::new(self.timestamp, entry, log_type);
        journal_entry.note(note);
        self.entries.push(journal_entry);
        self
    }

    pub fn append_strategy_note<S: AsRef<str>>(
        &mut self,
        strategy: Address,
        entry: ManagerResult<()>,
        log_type: LogType,
        note: S,
    ) -> &mut Self {
        let mut journal_entry = JournalEntry::new(self.timestamp, entry, log_type);
        journal_entry.strategy(strategy).note(note);
        self.entries.push(journal_entry);
        self
    }

    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }
}

/// Bounded store of committed entries. The oldest entries are pruned first.
#[derive(Debug)]
pub struct Journal {
    capacity: usize,
    entries: VecDeque<JournalEntry>,
}

impl Journal {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Commits the collection to the store
    pub fn commit(&mut self, collection: JournalCollection) {
        for entry in collection.entries {
            if self.entries.len() == self.capacity {
                self.entries.pop_front();
            }
            self.entries.push_back(entry);
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &JournalEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries of a given type, oldest first
    pub fn entries_of(&self, log_type: LogType) -> Vec<&JournalEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.log_type == log_type)
            .collect()
    }

    pub fn to_json(&self) -> ManagerResult<String> {
        serde_json::to_string(&self.entries)
            .map_err(|err| ManagerError::DecodingError(err.to_string()))
    }
}
