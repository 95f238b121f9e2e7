//! Output writer shared by every format
//!
//! Rendering happens in [`OutputWriter`]; the filesystem sits behind the
//! [`ArtifactSink`] trait so tests can observe or fail individual writes.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use tracing::info;

use crate::error::ExportError;
use crate::export::vars::TemplateVariables;
use crate::templates::TemplateSet;

/// Mode applied to every generated file: rwxr-xr-x
pub const ARTIFACT_MODE: u32 = 0o755;

/// Filesystem boundary for generated artifacts
pub trait ArtifactSink {
    /// Create a directory and any missing parents
    fn create_dir_all(&mut self, path: &Path) -> Result<(), ExportError>;

    /// Create or truncate `path`, write `contents`, and apply `mode`
    fn write_file(&mut self, path: &Path, contents: &[u8], mode: u32) -> Result<(), ExportError>;
}

/// Writes artifacts to the local filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct FsSink;

impl ArtifactSink for FsSink {
    fn create_dir_all(&mut self, path: &Path) -> Result<(), ExportError> {
        fs::create_dir_all(path).map_err(|e| ExportError::fs("error creating directory", path, e))
    }

    fn write_file(&mut self, path: &Path, contents: &[u8], mode: u32) -> Result<(), ExportError> {
        // The handle is closed when it goes out of scope on every path below.
        let mut file =
            File::create(path).map_err(|e| ExportError::fs("error creating file", path, e))?;
        file.write_all(contents)
            .map_err(|e| ExportError::fs("error writing output", path, e))?;
        file.sync_all()
            .map_err(|e| ExportError::fs("error syncing output", path, e))?;
        set_mode(path, mode)
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<(), ExportError> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|e| ExportError::fs("error setting mode", path, e))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<(), ExportError> {
    Ok(())
}

/// Renders templates and hands the result to a sink
pub struct OutputWriter<'a, S: ArtifactSink> {
    templates: &'a TemplateSet,
    sink: &'a mut S,
}

impl<'a, S: ArtifactSink> OutputWriter<'a, S> {
    pub fn new(templates: &'a TemplateSet, sink: &'a mut S) -> Self {
        Self { templates, sink }
    }

    /// Create a directory, logging `label` as the artifact name
    pub fn create_dir(&mut self, path: &Path, label: &str) -> Result<(), ExportError> {
        info!("creating: {}", label);
        self.sink.create_dir_all(path)
    }

    /// Render `template` against `variables` into `path`
    pub fn write(
        &mut self,
        template: &str,
        path: &Path,
        variables: &TemplateVariables,
        label: &str,
    ) -> Result<(), ExportError> {
        info!("writing: {}", label);
        let rendered = self.templates.render(template, variables)?;
        self.sink
            .write_file(path, rendered.as_bytes(), ARTIFACT_MODE)
    }

    /// Write literal `contents` into `path`
    pub fn write_raw(&mut self, path: &Path, contents: &str, label: &str) -> Result<(), ExportError> {
        info!("writing: {}", label);
        self.sink
            .write_file(path, contents.as_bytes(), ARTIFACT_MODE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::Format;
    use tempfile::TempDir;

    #[test]
    fn test_fs_sink_writes_and_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("run");
        let mut sink = FsSink;

        sink.write_file(&path, b"first version", ARTIFACT_MODE).unwrap();
        sink.write_file(&path, b"second", ARTIFACT_MODE).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
    }

    #[cfg(unix)]
    #[test]
    fn test_fs_sink_sets_executable_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("run");
        FsSink.write_file(&path, b"#!/bin/sh", ARTIFACT_MODE).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_fs_sink_missing_parent_is_filesystem_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing").join("run");

        let err = FsSink.write_file(&path, b"x", ARTIFACT_MODE).unwrap_err();
        assert!(matches!(err, ExportError::FileSystem { .. }));
        assert_eq!(err.path(), Some(path.as_path()));
    }

    #[test]
    fn test_create_dir_all_nested() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a").join("b").join("c");
        FsSink.create_dir_all(&path).unwrap();
        assert!(path.is_dir());
        // Already existing directories are fine
        FsSink.create_dir_all(&path).unwrap();
    }

    #[test]
    fn test_output_writer_renders_template() {
        let temp_dir = TempDir::new().unwrap();
        let templates = TemplateSet::embedded(Format::SystemdUser).unwrap();
        let mut sink = FsSink;
        let mut writer = OutputWriter::new(&templates, &mut sink);

        let vars = TemplateVariables::new()
            .with("description", "web-1 process for myapp")
            .with("command", "python app.py")
            .with("port", 5000);
        let path = temp_dir.path().join("myapp-web-1.service");
        writer
            .write("service", &path, &vars, "myapp-web-1.service")
            .unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("Description=web-1 process for myapp"));
        assert!(contents.contains("Environment=PORT=5000"));
    }

    #[test]
    fn test_output_writer_render_failure_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let templates = TemplateSet::embedded(Format::SystemdUser).unwrap();
        let mut sink = FsSink;
        let mut writer = OutputWriter::new(&templates, &mut sink);

        let path = temp_dir.path().join("x.service");
        let err = writer
            .write("nope", &path, &TemplateVariables::new(), "x.service")
            .unwrap_err();
        assert!(matches!(err, ExportError::TemplateLoad { .. }));
        assert!(!path.exists());
    }
}
