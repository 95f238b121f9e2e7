//! Formation table: how many instances of each process type to export.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::FormationError;

/// Reserved key applying to every process type without an explicit entry
pub const WILDCARD: &str = "all";

/// Desired replica count for one process type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawEntry")]
pub struct FormationEntry {
    pub count: u32,
}

/// Accepts both `web = 2` and `web = { count = 2 }`
#[derive(Deserialize)]
#[serde(untagged)]
enum RawEntry {
    Count(u32),
    Table { count: u32 },
}

impl From<RawEntry> for FormationEntry {
    fn from(raw: RawEntry) -> Self {
        match raw {
            RawEntry::Count(count) | RawEntry::Table { count } => FormationEntry { count },
        }
    }
}

/// Mapping from process type (or `all`) to replica count
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormationTable {
    entries: HashMap<String, FormationEntry>,
}

impl FormationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the count for a process type, replacing any previous entry
    pub fn insert(&mut self, name: impl Into<String>, count: u32) {
        self.entries.insert(name.into(), FormationEntry { count });
    }

    /// Builder-style variant of [`FormationTable::insert`]
    pub fn with(mut self, name: impl Into<String>, count: u32) -> Self {
        self.insert(name, count);
        self
    }

    /// Number of instances to export for `name`.
    ///
    /// An exact entry wins over the wildcard; a type named nowhere resolves
    /// to zero and is skipped by every format.
    pub fn resolve(&self, name: &str) -> u32 {
        self.entries
            .get(name)
            .or_else(|| self.entries.get(WILDCARD))
            .map(|entry| entry.count)
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse the command-line form `all=1,web=2`
    pub fn parse(input: &str) -> Result<Self, FormationError> {
        let mut table = Self::new();

        for part in input.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }

            let (name, count) = part
                .split_once('=')
                .ok_or_else(|| FormationError::MissingCount(part.to_string()))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(FormationError::EmptyName(part.to_string()));
            }
            let count = count
                .trim()
                .parse::<u32>()
                .map_err(|e| FormationError::InvalidCount {
                    entry: part.to_string(),
                    reason: e.to_string(),
                })?;

            table.insert(name, count);
        }

        Ok(table)
    }
}

impl std::str::FromStr for FormationTable {
    type Err = FormationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
