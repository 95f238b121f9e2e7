//! Per-format artifact layout.
//!
//! The driver in [`super::export`] walks instances; this module decides where
//! each instance's artifacts go and what aggregate files follow.

use std::path::{Path, PathBuf};

use crate::error::ExportError;
use crate::export::vars::TemplateVariables;
use crate::export::writer::{ArtifactSink, OutputWriter};
use crate::export::Format;
use crate::procfile::ProcessEntry;

/// One numbered replica of a process type
#[derive(Debug, Clone, Copy)]
pub struct Instance<'a> {
    pub ordinal: usize,
    pub entry: &'a ProcessEntry,
    pub num: u32,
    pub port: u32,
}

impl Instance<'_> {
    /// `web-1`
    pub fn process_name(&self) -> String {
        format!("{}-{}", self.entry.name, self.num)
    }
}

pub(crate) struct Emitter<'a, S: ArtifactSink> {
    format: Format,
    app: &'a str,
    location: &'a Path,
    writer: OutputWriter<'a, S>,
    units: Vec<String>,
    written: Vec<PathBuf>,
}

impl<'a, S: ArtifactSink> Emitter<'a, S> {
    pub(crate) fn new(
        format: Format,
        app: &'a str,
        location: &'a Path,
        writer: OutputWriter<'a, S>,
    ) -> Self {
        Self {
            format,
            app,
            location,
            writer,
            units: Vec::new(),
            written: Vec::new(),
        }
    }

    pub(crate) fn create_location(&mut self) -> Result<(), ExportError> {
        self.writer
            .create_dir(self.location, &self.location.display().to_string())
    }

    pub(crate) fn emit(
        &mut self,
        instance: &Instance<'_>,
        vars: TemplateVariables,
    ) -> Result<(), ExportError> {
        let process_name = instance.process_name();
        match self.format {
            Format::Launchd => {
                let file_name = format!("{}-{}.plist", self.app, process_name);
                self.write_file("launchd", &file_name, &vars)
            }
            Format::SystemdUser => {
                let file_name = format!("{}-{}.service", self.app, process_name);
                self.write_file("service", &file_name, &vars)
            }
            Format::Systemd => {
                let file_name = format!(
                    "{}-{}.{}.service",
                    self.app, instance.entry.name, instance.num
                );
                self.write_file("service", &file_name, &vars)?;
                self.units.push(file_name);
                Ok(())
            }
            Format::Runit => self.emit_runit(instance, &process_name, vars),
        }
    }

    /// `app-type-num/` with `run`, `env/<KEY>` and `log/run`
    fn emit_runit(
        &mut self,
        instance: &Instance<'_>,
        process_name: &str,
        mut vars: TemplateVariables,
    ) -> Result<(), ExportError> {
        let dir_name = format!("{}-{}", self.app, process_name);
        let dir = self.location.join(&dir_name);

        for (path, label) in [
            (dir.clone(), dir_name.clone()),
            (dir.join("env"), format!("{}/env", dir_name)),
            (dir.join("log"), format!("{}/log", dir_name)),
        ] {
            self.writer.create_dir(&path, &label)?;
            self.written.push(path);
        }

        let run = dir.join("run");
        self.writer
            .write("run", &run, &vars, &format!("{}/run", dir_name))?;
        self.written.push(run);

        let mut env = vars.env()?;
        env.insert("PORT".to_string(), instance.port.to_string());
        env.insert("PS".to_string(), dir_name.clone());
        vars.set_env(&env);

        for (key, value) in &env {
            let path = dir.join("env").join(key);
            self.writer
                .write_raw(&path, value, &format!("{}/env/{}", dir_name, key))?;
            self.written.push(path);
        }

        let log_run = dir.join("log").join("run");
        self.writer
            .write("log", &log_run, &vars, &format!("{}/log/run", dir_name))?;
        self.written.push(log_run);

        Ok(())
    }

    /// Write aggregate artifacts and return every path written
    pub(crate) fn finish(mut self, base: &TemplateVariables) -> Result<Vec<PathBuf>, ExportError> {
        if self.format == Format::Systemd {
            let mut vars = base.clone();
            vars.insert("app", self.app);
            vars.insert("processes", self.units.clone());
            let file_name = format!("{}.target", self.app);
            self.write_file("target", &file_name, &vars)?;
        }
        Ok(self.written)
    }

    fn write_file(
        &mut self,
        template: &str,
        file_name: &str,
        vars: &TemplateVariables,
    ) -> Result<(), ExportError> {
        let path = self.location.join(file_name);
        self.writer.write(template, &path, vars, file_name)?;
        self.written.push(path);
        Ok(())
    }
}
