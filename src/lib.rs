//! procfile-export - turn a Procfile into process supervisor configuration
//!
//! The library exposes the export engine used by the `procfile-export`
//! binary: Procfile and env file parsing, formation resolution, port
//! assignment, template variables and the per-format writers.

pub mod config;
pub mod env_file;
pub mod error;
pub mod export;
pub mod logging;
pub mod procfile;
pub mod templates;

pub use error::{EnvFileError, ExportError, FormationError, ProcfileError};
pub use export::{export, export_to_disk, ExportRequest, ExportSummary, Format};
pub use procfile::ProcessEntry;
