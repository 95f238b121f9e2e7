//! Dotenv-style environment file parsing
//!
//! Produces the `env` map exposed to templates and written out as one file per
//! key by the runit format.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::error::EnvFileError;

/// Parse `KEY=VALUE` lines. Supports `export KEY=VALUE`, `#` comments, and
/// single or double quoted values.
pub fn parse(contents: &str) -> Result<BTreeMap<String, String>, EnvFileError> {
    let mut env = BTreeMap::new();

    for (idx, raw) in contents.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed).trim_start();

        let (key, value) = trimmed
            .split_once('=')
            .ok_or_else(|| EnvFileError::MalformedLine {
                line,
                content: trimmed.to_string(),
            })?;
        let key = key.trim();
        if !is_valid_key(key) {
            return Err(EnvFileError::InvalidKey {
                line,
                key: key.to_string(),
            });
        }

        env.insert(key.to_string(), unquote(value.trim()).to_string());
    }

    Ok(env)
}

/// Read and parse an environment file from disk
pub fn load(path: &Path) -> Result<BTreeMap<String, String>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read env file: {}", path.display()))?;
    parse(&contents).with_context(|| format!("Failed to parse env file: {}", path.display()))
}

fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        let env = parse("DATABASE_URL=postgres://localhost/db\nDEBUG=1").unwrap();
        assert_eq!(env.get("DATABASE_URL").unwrap(), "postgres://localhost/db");
        assert_eq!(env.get("DEBUG").unwrap(), "1");
    }

    #[test]
    fn test_parse_quotes_and_export() {
        let env = parse("export GREETING=\"hello world\"\nNAME='app'\nEMPTY=").unwrap();
        assert_eq!(env.get("GREETING").unwrap(), "hello world");
        assert_eq!(env.get("NAME").unwrap(), "app");
        assert_eq!(env.get("EMPTY").unwrap(), "");
    }

    #[test]
    fn test_parse_keeps_equals_in_value() {
        let env = parse("QUERY=a=b&c=d").unwrap();
        assert_eq!(env.get("QUERY").unwrap(), "a=b&c=d");
    }

    #[test]
    fn test_parse_skips_comments() {
        let env = parse("# comment\n\nKEY=value\n").unwrap();
        assert_eq!(env.len(), 1);
    }

    #[test]
    fn test_parse_rejects_missing_equals() {
        let err = parse("KEY value").unwrap_err();
        assert!(matches!(err, EnvFileError::MalformedLine { line: 1, .. }));
    }

    #[test]
    fn test_parse_rejects_bad_key() {
        let err = parse("1KEY=value").unwrap_err();
        assert_eq!(
            err,
            EnvFileError::InvalidKey {
                line: 1,
                key: "1KEY".to_string()
            }
        );
    }
}
