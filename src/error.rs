//! Error types for the export engine and its input parsers.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort an export run
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("template '{name}' could not be loaded: {reason}")]
    TemplateLoad { name: String, reason: String },

    #[error("error rendering template '{name}': {source}")]
    Render {
        name: String,
        #[source]
        source: handlebars::RenderError,
    },

    #[error("{action} {}: {source}", .path.display())]
    FileSystem {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl ExportError {
    pub(crate) fn fs(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ExportError::FileSystem {
            action,
            path: path.into(),
            source,
        }
    }

    /// Path of the artifact involved, if the error came from the filesystem
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            ExportError::FileSystem { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Errors produced while parsing a Procfile
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProcfileError {
    #[error("line {line}: expected '<name>: <command>', got '{content}'")]
    MalformedLine { line: usize, content: String },

    #[error("line {line}: invalid process name '{name}' (allowed: letters, digits, '-' and '_')")]
    InvalidName { line: usize, name: String },

    #[error("line {line}: process '{name}' has an empty command")]
    EmptyCommand { line: usize, name: String },

    #[error("line {line}: process '{name}' is already defined")]
    DuplicateName { line: usize, name: String },

    #[error("line {line}: command for '{name}' cannot be split into arguments: {reason}")]
    UnbalancedQuotes {
        line: usize,
        name: String,
        reason: String,
    },
}

/// Errors produced while parsing a formation string such as `all=1,web=2`
#[derive(Error, Debug, PartialEq, Eq)]
pub enum FormationError {
    #[error("formation entry '{0}' must have the form <process>=<count>")]
    MissingCount(String),

    #[error("formation entry '{entry}' has an invalid count: {reason}")]
    InvalidCount { entry: String, reason: String },

    #[error("formation entry '{0}' has an empty process name")]
    EmptyName(String),
}

/// Errors produced while parsing a dotenv-style environment file
#[derive(Error, Debug, PartialEq, Eq)]
pub enum EnvFileError {
    #[error("line {line}: expected KEY=VALUE, got '{content}'")]
    MalformedLine { line: usize, content: String },

    #[error("line {line}: invalid variable name '{key}'")]
    InvalidKey { line: usize, key: String },
}
