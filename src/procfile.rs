//! Procfile parsing
//!
//! A Procfile lists one process type per line in the form `<name>: <command>`.
//! Blank lines and lines starting with `#` are ignored. Declaration order is
//! preserved because it determines each process type's port block.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ProcfileError;

static LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^:\s]+)\s*:\s*(.*)$").expect("procfile line regex"));

static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("process name regex"));

/// One process type declared in a Procfile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub name: String,
    pub command: String,
    pub command_args: Vec<String>,
}

impl ProcessEntry {
    /// Create an entry, shell-splitting the command line into arguments
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Result<Self, shell_words::ParseError> {
        let command = command.into();
        let command_args = shell_words::split(&command)?;
        Ok(Self {
            name: name.into(),
            command,
            command_args,
        })
    }
}

/// Parse Procfile contents into ordered process entries
pub fn parse(contents: &str) -> Result<Vec<ProcessEntry>, ProcfileError> {
    let mut entries = Vec::new();
    let mut seen = HashSet::new();

    for (idx, raw) in contents.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let caps = LINE_RE
            .captures(trimmed)
            .ok_or_else(|| ProcfileError::MalformedLine {
                line,
                content: trimmed.to_string(),
            })?;
        let name = caps[1].to_string();
        let command = caps[2].trim().to_string();

        if !NAME_RE.is_match(&name) {
            return Err(ProcfileError::InvalidName { line, name });
        }
        if command.is_empty() {
            return Err(ProcfileError::EmptyCommand { line, name });
        }
        if !seen.insert(name.clone()) {
            return Err(ProcfileError::DuplicateName { line, name });
        }

        let entry = ProcessEntry::new(name.clone(), command).map_err(|e| {
            ProcfileError::UnbalancedQuotes {
                line,
                name,
                reason: e.to_string(),
            }
        })?;
        entries.push(entry);
    }

    Ok(entries)
}

/// Read and parse a Procfile from disk
pub fn load(path: &Path) -> Result<Vec<ProcessEntry>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read Procfile: {}", path.display()))?;
    parse(&contents).with_context(|| format!("Failed to parse Procfile: {}", path.display()))
}
