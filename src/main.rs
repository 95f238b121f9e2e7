use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use procfile_export::config::{Config, ExportConfig};
use procfile_export::export::{self, ExportRequest, Format, FormationTable};
use procfile_export::{env_file, logging, procfile};

#[derive(Parser)]
#[command(name = "procfile-export")]
#[command(about = "Export a Procfile to launchd, runit or systemd configuration")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write supervisor configuration for every process instance
    Export {
        /// Output format (default: from config, otherwise systemd)
        #[arg(value_enum)]
        format: Option<Format>,

        /// Output directory (default: export)
        location: Option<String>,

        #[command(flatten)]
        input: InputArgs,

        /// Application name used to prefix every artifact
        #[arg(short, long)]
        app: Option<String>,

        /// Dotenv file whose variables are exported to every process
        #[arg(short, long)]
        env_file: Option<String>,

        /// Directory with templates overriding the built-in ones
        #[arg(long)]
        templates_dir: Option<String>,

        /// User the processes run as
        #[arg(short, long)]
        user: Option<String>,

        /// Group the processes run as
        #[arg(long)]
        group: Option<String>,

        /// Working directory of the processes
        #[arg(short, long)]
        working_directory: Option<String>,

        /// Directory for process logs
        #[arg(long)]
        log_path: Option<String>,

        /// Description used instead of "<process> process for <app>"
        #[arg(long)]
        description: Option<String>,

        /// Seconds to wait for a process to stop
        #[arg(short, long)]
        timeout: Option<u32>,
    },

    /// Show the instances and ports an export would produce
    Check {
        #[command(flatten)]
        input: InputArgs,
    },
}

#[derive(Args)]
struct InputArgs {
    /// Procfile path (default: Procfile)
    #[arg(short = 'f', long)]
    procfile: Option<String>,

    /// Instances per process type, e.g. all=1,web=2
    #[arg(short = 'm', long)]
    formation: Option<String>,

    /// Base port (default: 5000)
    #[arg(short, long)]
    port: Option<u32>,
}

impl InputArgs {
    fn apply(self, settings: &mut ExportConfig) {
        if let Some(procfile) = self.procfile {
            settings.procfile = procfile;
        }
        if let Some(formation) = self.formation {
            settings.formation = formation;
        }
        if let Some(port) = self.port {
            settings.port = port;
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first (needed for logging setup)
    let mut config = Config::load(cli.config.as_deref())?;
    let _logging_handle = logging::init_logging(&config, cli.debug)?;

    match cli.command {
        Commands::Export {
            format,
            location,
            input,
            app,
            env_file,
            templates_dir,
            user,
            group,
            working_directory,
            log_path,
            description,
            timeout,
        } => {
            let settings = &mut config.export;
            input.apply(settings);
            if let Some(format) = format {
                settings.format = format;
            }
            if let Some(location) = location {
                settings.location = location;
            }
            if let Some(app) = app {
                settings.app = app;
            }
            set_if_some(&mut settings.env_file, env_file);
            set_if_some(&mut settings.templates_dir, templates_dir);
            set_if_some(&mut settings.user, user);
            set_if_some(&mut settings.group, group);
            set_if_some(&mut settings.working_directory, working_directory);
            set_if_some(&mut settings.log_path, log_path);
            set_if_some(&mut settings.description, description);
            set_if_some(&mut settings.timeout, timeout);

            cmd_export(&config.export)
        }
        Commands::Check { input } => {
            input.apply(&mut config.export);
            cmd_check(&config.export)
        }
    }
}

fn set_if_some<T>(target: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *target = value;
    }
}

fn load_formation(settings: &ExportConfig) -> Result<FormationTable> {
    FormationTable::parse(&settings.formation)
        .with_context(|| format!("Invalid formation: {}", settings.formation))
}

fn cmd_export(settings: &ExportConfig) -> Result<()> {
    let entries = procfile::load(Path::new(&settings.procfile))?;
    let formation = load_formation(settings)?;
    let env = match &settings.env_file {
        Some(path) => env_file::load(Path::new(path))?,
        None => BTreeMap::new(),
    };
    let variables = settings.base_variables(&env);
    let location = PathBuf::from(&settings.location);

    let request = ExportRequest {
        app: &settings.app,
        entries: &entries,
        formation: &formation,
        location: &location,
        base_port: settings.port,
        variables: &variables,
    };

    let summary = export::export_to_disk(
        settings.format,
        &request,
        settings.templates_dir.as_deref().map(Path::new),
    )
    .with_context(|| format!("Failed to export {} configuration", settings.format))?;

    if summary.is_empty() {
        tracing::warn!(
            "formation '{}' selects no process types; nothing was exported",
            settings.formation
        );
    }
    println!(
        "Exported {} artifacts for {} to {}",
        summary.len(),
        settings.format,
        location.display()
    );
    Ok(())
}

fn cmd_check(settings: &ExportConfig) -> Result<()> {
    let entries = procfile::load(Path::new(&settings.procfile))?;
    let formation = load_formation(settings)?;
    let instances = export::plan(&entries, &formation, settings.port);

    println!(
        "{} process types, {} instances",
        entries.len(),
        instances.len()
    );
    println!("{}", "─".repeat(60));
    for instance in &instances {
        println!(
            "{:<20} port {:<6} {}",
            instance.process_name(),
            instance.port,
            instance.entry.command
        );
    }
    for entry in &entries {
        if formation.resolve(&entry.name) == 0 {
            println!("{:<20} (not scaled)", entry.name);
        }
    }

    Ok(())
}
