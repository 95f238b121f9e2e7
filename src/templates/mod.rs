//! Embedded output templates for each export format
//!
//! Every format has a fixed set of handlebars templates keyed by a logical
//! name (`service`, `target`, `run`, `log`, `launchd`). The built-in set is
//! compiled into the binary; a directory laid out the same way can replace it.
//!
//! ```text
//! templates/
//! ├── launchd/launchd.plist.hbs
//! ├── runit/run.hbs
//! ├── runit/log/run.hbs
//! ├── systemd/control.target.hbs
//! ├── systemd/program.service.hbs
//! └── systemd-user/program.service.hbs
//! ```

use std::fs;
use std::path::Path;

use handlebars::{handlebars_helper, Handlebars};
use serde::Serialize;

use crate::error::ExportError;
use crate::export::Format;

/// One template of a format's set
#[derive(Debug, Clone, Copy)]
pub struct TemplateSource {
    /// Logical name used by the emitters
    pub name: &'static str,
    /// Path relative to the templates root
    pub path: &'static str,
    /// Built-in template text
    pub embedded: &'static str,
}

static LAUNCHD_TEMPLATES: &[TemplateSource] = &[TemplateSource {
    name: "launchd",
    path: "launchd/launchd.plist.hbs",
    embedded: include_str!("launchd/launchd.plist.hbs"),
}];

static RUNIT_TEMPLATES: &[TemplateSource] = &[
    TemplateSource {
        name: "run",
        path: "runit/run.hbs",
        embedded: include_str!("runit/run.hbs"),
    },
    TemplateSource {
        name: "log",
        path: "runit/log/run.hbs",
        embedded: include_str!("runit/log/run.hbs"),
    },
];

static SYSTEMD_TEMPLATES: &[TemplateSource] = &[
    TemplateSource {
        name: "target",
        path: "systemd/control.target.hbs",
        embedded: include_str!("systemd/control.target.hbs"),
    },
    TemplateSource {
        name: "service",
        path: "systemd/program.service.hbs",
        embedded: include_str!("systemd/program.service.hbs"),
    },
];

static SYSTEMD_USER_TEMPLATES: &[TemplateSource] = &[TemplateSource {
    name: "service",
    path: "systemd-user/program.service.hbs",
    embedded: include_str!("systemd-user/program.service.hbs"),
}];

/// Templates required by a format
pub fn sources(format: Format) -> &'static [TemplateSource] {
    match format {
        Format::Launchd => LAUNCHD_TEMPLATES,
        Format::Runit => RUNIT_TEMPLATES,
        Format::Systemd => SYSTEMD_TEMPLATES,
        Format::SystemdUser => SYSTEMD_USER_TEMPLATES,
    }
}

/// Quote a value for a double-quoted systemd assignment. `%` starts a unit
/// specifier, so it is doubled.
pub fn escape_unit_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('%', "%%")
}

handlebars_helper!(unit_escape: |value: str| escape_unit_value(value));

/// Parsed templates for one format
pub struct TemplateSet {
    format: Format,
    registry: Handlebars<'static>,
}

impl std::fmt::Debug for TemplateSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateSet")
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl TemplateSet {
    /// Load the built-in templates for `format`
    pub fn embedded(format: Format) -> Result<Self, ExportError> {
        let mut set = Self::empty(format);
        for source in sources(format) {
            set.register(source.name, source.embedded)?;
        }
        Ok(set)
    }

    /// Load templates for `format` from `dir`, using the same relative paths
    /// as the built-in set. Every template of the format must be present.
    pub fn from_dir(format: Format, dir: &Path) -> Result<Self, ExportError> {
        let mut set = Self::empty(format);
        for source in sources(format) {
            let path = dir.join(source.path);
            let text = fs::read_to_string(&path).map_err(|e| ExportError::TemplateLoad {
                name: source.name.to_string(),
                reason: format!("{}: {}", path.display(), e),
            })?;
            set.register(source.name, &text)?;
        }
        Ok(set)
    }

    /// Load from `dir` when given, otherwise the built-in set
    pub fn load(format: Format, dir: Option<&Path>) -> Result<Self, ExportError> {
        match dir {
            Some(dir) => Self::from_dir(format, dir),
            None => Self::embedded(format),
        }
    }

    fn empty(format: Format) -> Self {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(false);
        // Property lists are XML and keep handlebars' entity escaping; unit
        // files and shell scripts are written verbatim.
        if format != Format::Launchd {
            registry.register_escape_fn(handlebars::no_escape);
        }
        registry.register_helper("unit_escape", Box::new(unit_escape));
        Self { format, registry }
    }

    fn register(&mut self, name: &str, text: &str) -> Result<(), ExportError> {
        self.registry
            .register_template_string(name, text)
            .map_err(|e| ExportError::TemplateLoad {
                name: name.to_string(),
                reason: e.to_string(),
            })
    }

    pub fn format(&self) -> Format {
        self.format
    }

    /// Render the template registered under `name`
    pub fn render<T: Serialize>(&self, name: &str, data: &T) -> Result<String, ExportError> {
        if !self.registry.has_template(name) {
            return Err(ExportError::TemplateLoad {
                name: name.to_string(),
                reason: format!("not part of the {} template set", self.format),
            });
        }
        self.registry
            .render(name, data)
            .map_err(|source| ExportError::Render {
                name: name.to_string(),
                source,
            })
    }
}
