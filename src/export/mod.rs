//! Export engine
//!
//! Turns an ordered list of process types plus a formation table into
//! supervisor artifacts for one of the built-in formats:
//!
//! - `launchd`: one property list per instance
//! - `runit`: one service directory per instance with `run`, `log/run`, `env/`
//! - `systemd`: one service unit per instance plus an aggregate `.target`
//! - `systemd-user`: one per-user service unit per instance
//!
//! Every format shares the same loop: resolve the instance count, assign a
//! port, build variables, write. The first failure aborts the run; artifacts
//! written before it stay on disk.

pub mod formation;
pub mod layout;
pub mod port;
pub mod vars;
pub mod writer;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ExportError;
use crate::procfile::ProcessEntry;
use crate::templates::TemplateSet;

pub use formation::{FormationEntry, FormationTable};
pub use layout::Instance;
pub use port::{port_for, PORT_BLOCK_SIZE};
pub use vars::{build_variables, TemplateVariables};
pub use writer::{ArtifactSink, FsSink, OutputWriter};

use layout::Emitter;

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Format {
    Launchd,
    Runit,
    Systemd,
    SystemdUser,
}

impl Format {
    /// All formats in display order
    pub fn all() -> &'static [Format] {
        &[
            Format::Launchd,
            Format::Runit,
            Format::Systemd,
            Format::SystemdUser,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Launchd => "launchd",
            Format::Runit => "runit",
            Format::Systemd => "systemd",
            Format::SystemdUser => "systemd-user",
        }
    }

    pub fn from_key(key: &str) -> Option<Format> {
        match key.to_lowercase().as_str() {
            "launchd" => Some(Format::Launchd),
            "runit" => Some(Format::Runit),
            "systemd" => Some(Format::Systemd),
            "systemd-user" | "systemd_user" => Some(Format::SystemdUser),
            _ => None,
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Inputs for one export run
#[derive(Debug, Clone, Copy)]
pub struct ExportRequest<'a> {
    pub app: &'a str,
    pub entries: &'a [ProcessEntry],
    pub formation: &'a FormationTable,
    pub location: &'a Path,
    pub base_port: u32,
    pub variables: &'a TemplateVariables,
}

/// Artifacts produced by a successful export
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    /// Files and per-instance directories in the order they were written.
    /// The output location itself is not listed.
    pub written: Vec<PathBuf>,
}

impl ExportSummary {
    pub fn len(&self) -> usize {
        self.written.len()
    }

    pub fn is_empty(&self) -> bool {
        self.written.is_empty()
    }
}

/// Every instance the formation selects, in export order
pub fn plan<'a>(entries: &'a [ProcessEntry], formation: &FormationTable, base_port: u32) -> Vec<Instance<'a>> {
    let mut instances = Vec::new();
    for (ordinal, entry) in entries.iter().enumerate() {
        let count = formation.resolve(&entry.name);
        debug!(process_type = %entry.name, count, "resolved formation");
        for num in 1..=count {
            instances.push(Instance {
                ordinal,
                entry,
                num,
                port: port_for(ordinal, num, base_port),
            });
        }
    }
    instances
}

/// Export with the format of `templates`, writing through `sink`
pub fn export<S: ArtifactSink>(
    request: &ExportRequest<'_>,
    templates: &TemplateSet,
    sink: &mut S,
) -> Result<ExportSummary, ExportError> {
    let format = templates.format();
    let writer = OutputWriter::new(templates, sink);
    let mut emitter = Emitter::new(format, request.app, request.location, writer);

    emitter.create_location()?;

    for instance in plan(request.entries, request.formation, request.base_port) {
        let process_name = instance.process_name();
        debug!(instance = %process_name, port = instance.port, "exporting instance");
        let vars = build_variables(
            request.app,
            instance.entry,
            &process_name,
            instance.num,
            instance.port,
            request.variables,
        );
        emitter.emit(&instance, vars)?;
    }

    let written = emitter.finish(request.variables)?;
    Ok(ExportSummary { written })
}

/// Export to the local filesystem, loading templates from `templates_dir`
/// when given
pub fn export_to_disk(
    format: Format,
    request: &ExportRequest<'_>,
    templates_dir: Option<&Path>,
) -> Result<ExportSummary, ExportError> {
    let templates = TemplateSet::load(format, templates_dir)?;
    export(request, &templates, &mut FsSink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::TempDir;

    /// Fails the nth `write_file` call (1-based), delegating everything else
    struct FailingSink {
        fail_on: usize,
        writes: usize,
    }

    impl ArtifactSink for FailingSink {
        fn create_dir_all(&mut self, path: &Path) -> Result<(), ExportError> {
            FsSink.create_dir_all(path)
        }

        fn write_file(&mut self, path: &Path, contents: &[u8], mode: u32) -> Result<(), ExportError> {
            self.writes += 1;
            if self.writes == self.fail_on {
                return Err(ExportError::fs(
                    "error creating file",
                    path,
                    std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
                ));
            }
            FsSink.write_file(path, contents, mode)
        }
    }

    fn entries() -> Vec<ProcessEntry> {
        vec![
            ProcessEntry::new("web", "python app.py").unwrap(),
            ProcessEntry::new("worker", "celery worker").unwrap(),
        ]
    }

    fn base_vars() -> TemplateVariables {
        let mut vars = TemplateVariables::new().with("description", "");
        let mut env = BTreeMap::new();
        env.insert("DEBUG".to_string(), "1".to_string());
        vars.set_env(&env);
        vars
    }

    fn names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_format_keys() {
        for format in Format::all() {
            assert_eq!(Format::from_key(format.as_str()), Some(*format));
        }
        assert_eq!(Format::from_key("SYSTEMD"), Some(Format::Systemd));
        assert_eq!(Format::from_key("upstart"), None);
    }

    #[test]
    fn test_plan_orders_by_type_then_instance() {
        let entries = entries();
        let formation = FormationTable::new().with("web", 2).with("worker", 1);
        let plan: Vec<(String, u32)> = plan(&entries, &formation, 5000)
            .iter()
            .map(|i| (i.process_name(), i.port))
            .collect();
        assert_eq!(
            plan,
            vec![
                ("web-1".to_string(), 5000),
                ("web-2".to_string(), 5001),
                ("worker-1".to_string(), 5100),
            ]
        );
    }

    #[test]
    fn test_plan_skips_unlisted_types() {
        let entries = entries();
        let formation = FormationTable::new().with("worker", 1);
        let plan = plan(&entries, &formation, 5000);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].entry.name, "worker");
        assert_eq!(plan[0].ordinal, 1);
        assert_eq!(plan[0].port, 5100);
    }

    #[test]
    fn test_export_creates_missing_location() {
        let temp_dir = TempDir::new().unwrap();
        let location = temp_dir.path().join("nested").join("out");
        let entries = entries();
        let formation = FormationTable::new().with("all", 1);
        let vars = base_vars();
        let request = ExportRequest {
            app: "myapp",
            entries: &entries,
            formation: &formation,
            location: &location,
            base_port: 5000,
            variables: &vars,
        };

        let summary = export_to_disk(Format::Launchd, &request, None).unwrap();
        assert_eq!(
            names(&location),
            vec!["myapp-web-1.plist", "myapp-worker-1.plist"]
        );
        assert_eq!(summary.len(), 2);
    }

    #[test]
    fn test_export_with_no_instances_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let entries = entries();
        let formation = FormationTable::new();
        let vars = base_vars();
        let request = ExportRequest {
            app: "myapp",
            entries: &entries,
            formation: &formation,
            location: temp_dir.path(),
            base_port: 5000,
            variables: &vars,
        };

        let summary = export_to_disk(Format::SystemdUser, &request, None).unwrap();
        assert!(summary.is_empty());
        assert!(temp_dir.path().is_dir());
        assert!(names(temp_dir.path()).is_empty());
    }

    #[test]
    fn test_systemd_user_layout() {
        let temp_dir = TempDir::new().unwrap();
        let entries = entries();
        let formation = FormationTable::new().with("web", 2);
        let vars = base_vars();
        let request = ExportRequest {
            app: "myapp",
            entries: &entries,
            formation: &formation,
            location: temp_dir.path(),
            base_port: 5000,
            variables: &vars,
        };

        export_to_disk(Format::SystemdUser, &request, None).unwrap();
        assert_eq!(
            names(temp_dir.path()),
            vec!["myapp-web-1.service", "myapp-web-2.service"]
        );
        let second = fs::read_to_string(temp_dir.path().join("myapp-web-2.service")).unwrap();
        assert!(second.contains("Environment=PORT=5001"));
        assert!(second.contains("Environment=PS=myapp-web.2"));
        assert!(second.contains("Description=web-2 process for myapp"));
    }

    #[test]
    fn test_runit_requires_env_map() {
        let temp_dir = TempDir::new().unwrap();
        let entries = entries();
        let formation = FormationTable::new().with("web", 1);
        let vars = TemplateVariables::new();
        let request = ExportRequest {
            app: "myapp",
            entries: &entries,
            formation: &formation,
            location: temp_dir.path(),
            base_port: 5000,
            variables: &vars,
        };

        let err = export_to_disk(Format::Runit, &request, None).unwrap_err();
        assert!(matches!(err, ExportError::InvalidConfiguration(_)));
        // run was written before the env map was needed
        assert!(temp_dir.path().join("myapp-web-1/run").exists());
        assert!(!temp_dir.path().join("myapp-web-1/log/run").exists());
    }

    #[test]
    fn test_runit_log_run_sees_port_and_ps() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("tpl");
        fs::create_dir_all(dir.join("runit/log")).unwrap();
        fs::write(dir.join("runit/run.hbs"), "run {{port}}").unwrap();
        fs::write(dir.join("runit/log/run.hbs"), "{{env.PORT}} {{env.PS}}").unwrap();

        let out = temp_dir.path().join("out");
        let entries = entries();
        let formation = FormationTable::new().with("worker", 1);
        let vars = base_vars();
        let request = ExportRequest {
            app: "myapp",
            entries: &entries,
            formation: &formation,
            location: &out,
            base_port: 5000,
            variables: &vars,
        };

        export_to_disk(Format::Runit, &request, Some(&dir)).unwrap();
        let log_run = fs::read_to_string(out.join("myapp-worker-1/log/run")).unwrap();
        assert_eq!(log_run, "5100 myapp-worker-1");
        // base variables keep no trace of the instance
        assert!(vars.env().unwrap().get("PORT").is_none());
    }

    #[test]
    fn test_abort_on_third_write() {
        let temp_dir = TempDir::new().unwrap();
        let entries = vec![ProcessEntry::new("web", "python app.py").unwrap()];
        let formation = FormationTable::new().with("web", 5);
        let vars = base_vars();
        let request = ExportRequest {
            app: "myapp",
            entries: &entries,
            formation: &formation,
            location: temp_dir.path(),
            base_port: 5000,
            variables: &vars,
        };

        let templates = TemplateSet::embedded(Format::SystemdUser).unwrap();
        let mut sink = FailingSink {
            fail_on: 3,
            writes: 0,
        };
        let err = export(&request, &templates, &mut sink).unwrap_err();

        assert!(matches!(err, ExportError::FileSystem { .. }));
        assert_eq!(sink.writes, 3);
        assert_eq!(
            names(temp_dir.path()),
            vec!["myapp-web-1.service", "myapp-web-2.service"]
        );
    }

    #[test]
    fn test_systemd_target_failure_keeps_services() {
        let temp_dir = TempDir::new().unwrap();
        let entries = entries();
        let formation = FormationTable::new().with("all", 1);
        let vars = base_vars();
        let request = ExportRequest {
            app: "myapp",
            entries: &entries,
            formation: &formation,
            location: temp_dir.path(),
            base_port: 5000,
            variables: &vars,
        };

        let templates = TemplateSet::embedded(Format::Systemd).unwrap();
        let mut sink = FailingSink {
            fail_on: 3,
            writes: 0,
        };
        assert!(export(&request, &templates, &mut sink).is_err());
        assert_eq!(
            names(temp_dir.path()),
            vec!["myapp-web.1.service", "myapp-worker.1.service"]
        );
    }
}
