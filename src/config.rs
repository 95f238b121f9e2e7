use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::export::{Format, TemplateVariables};

/// Name of the project-local config file
pub const LOCAL_CONFIG_FILE: &str = "procfile-export.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Defaults for the `export` subcommand; CLI flags take precedence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Application name used as the prefix of every artifact
    #[serde(default = "default_app")]
    pub app: String,
    #[serde(default = "default_format")]
    pub format: Format,
    /// Output directory
    #[serde(default = "default_location")]
    pub location: String,
    /// Base port; each process type gets a block of 100 ports from here
    #[serde(default = "default_port")]
    pub port: u32,
    #[serde(default = "default_procfile")]
    pub procfile: String,
    /// Optional dotenv file exposed to templates as `env`
    #[serde(default)]
    pub env_file: Option<String>,
    /// Formation in `name=count` form, e.g. `all=1,web=2`
    #[serde(default = "default_formation")]
    pub formation: String,
    /// Directory overriding the built-in templates
    #[serde(default)]
    pub templates_dir: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub working_directory: Option<String>,
    #[serde(default)]
    pub log_path: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Seconds to wait for a process to stop (systemd)
    #[serde(default)]
    pub timeout: Option<u32>,
}

fn default_app() -> String {
    "app".to_string()
}

fn default_format() -> Format {
    Format::Systemd
}

fn default_location() -> String {
    "export".to_string()
}

fn default_port() -> u32 {
    5000
}

fn default_procfile() -> String {
    "Procfile".to_string()
}

fn default_formation() -> String {
    "all=1".to_string()
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            app: default_app(),
            format: default_format(),
            location: default_location(),
            port: default_port(),
            procfile: default_procfile(),
            env_file: None,
            formation: default_formation(),
            templates_dir: None,
            user: None,
            group: None,
            working_directory: None,
            log_path: None,
            description: None,
            timeout: None,
        }
    }
}

impl ExportConfig {
    /// Base template variables shared by every instance of a run
    pub fn base_variables(&self, env: &BTreeMap<String, String>) -> TemplateVariables {
        let mut vars = TemplateVariables::new()
            .with("app", self.app.as_str())
            .with("location", self.location.as_str())
            .with("description", self.description.clone().unwrap_or_default());
        vars.set_env(env);

        let optional = [
            ("user", &self.user),
            ("group", &self.group),
            ("working_directory", &self.working_directory),
            ("log_path", &self.log_path),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                vars.insert(key, value.as_str());
            }
        }
        if let Some(timeout) = self.timeout {
            vars.insert("timeout", timeout);
        }

        vars
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for log files; logs go to stderr when unset
    #[serde(default)]
    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Config {
    /// User-wide config in `~/.config/procfile-export/config.toml`
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("procfile-export").join("config.toml"))
    }

    /// Load configuration from defaults, the project file, the user file, an
    /// explicit file and `PROCFILE_EXPORT__` environment variables, in that
    /// order of increasing precedence.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        Self::load_from(Path::new("."), config_path)
    }

    /// Like [`Config::load`] with the project file looked up in `dir`
    pub fn load_from(dir: &Path, config_path: Option<&str>) -> Result<Self> {
        // Start with embedded defaults so the tool works without config files
        let defaults = Config::default();
        let defaults_json =
            serde_json::to_string(&defaults).context("Failed to serialize default config")?;

        let mut builder = config::Config::builder().add_source(config::File::from_str(
            &defaults_json,
            config::FileFormat::Json,
        ));

        let local_config = dir.join(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            builder = builder.add_source(config::File::from(local_config));
        }

        if let Some(user_config) = Self::user_config_path() {
            if user_config.exists() {
                builder = builder.add_source(config::File::from(user_config));
            }
        }

        // Explicit config file (CLI override)
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("PROCFILE_EXPORT")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to load configuration")?;
        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Absolute path to the logs directory, if file logging is enabled
    pub fn logs_path(&self) -> Option<PathBuf> {
        self.logging.file.as_ref().map(|dir| {
            let path = PathBuf::from(dir);
            if path.is_absolute() {
                path
            } else {
                std::env::current_dir().unwrap_or_default().join(path)
            }
        })
    }
}
