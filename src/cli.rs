//! The command line interface for the simulator.
use crate::log;
use crate::model::Model;
use crate::output::metadata::{RunKind, write_metadata};
use crate::output::{create_output_directory, get_output_dir, get_sensitivity_output_dir};
use crate::sensitivity::SensitivityAnalysis;
use crate::settings::Settings;
use ::log::{info, warn};
use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};

pub mod example;
use example::ExampleSubcommands;
pub mod settings;
use settings::SettingsSubcommands;

/// The command line interface for the simulator.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// The available commands.
    #[command(subcommand)]
    command: Option<Commands>,
    /// Flag to provide the CLI docs as markdown
    #[arg(long, hide = true)]
    markdown_help: bool,
}

/// Options for the run command
#[derive(Args, Default)]
pub struct RunOpts {
    /// Directory for output files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// Whether to overwrite the output directory if it already exists
    #[arg(long)]
    pub overwrite: bool,
    /// Whether to write additional information to CSV files
    #[arg(long)]
    pub debug_model: bool,
}

/// Options for the sensitivity command
#[derive(Args, Default)]
pub struct SensitivityOpts {
    /// Directory for output files (overrides the configuration file)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// Whether to overwrite the output directory if it already exists
    #[arg(long)]
    pub overwrite: bool,
}

/// The available commands.
#[derive(Subcommand)]
enum Commands {
    /// Run a simulation model.
    Run {
        /// Path to the model directory.
        model_dir: PathBuf,
        /// Other run options
        #[command(flatten)]
        opts: RunOpts,
    },
    /// Validate a model.
    Validate {
        /// The path to the model directory.
        model_dir: PathBuf,
    },
    /// Run a sensitivity analysis.
    Sensitivity {
        /// Path to the sensitivity configuration file.
        config_file: PathBuf,
        /// Other options
        #[command(flatten)]
        opts: SensitivityOpts,
    },
    /// Manage example models.
    Example {
        /// The available subcommands for managing example models.
        #[command(subcommand)]
        subcommand: ExampleSubcommands,
    },
    /// Manage the program settings file.
    Settings {
        /// The available subcommands for managing the settings file.
        #[command(subcommand)]
        subcommand: SettingsSubcommands,
    },
}

impl Commands {
    /// Execute the supplied CLI command
    fn execute(self) -> Result<()> {
        match self {
            Self::Run { model_dir, opts } => handle_run_command(&model_dir, &opts, None),
            Self::Validate { model_dir } => handle_validate_command(&model_dir, None),
            Self::Sensitivity { config_file, opts } => {
                handle_sensitivity_command(&config_file, &opts, None)
            }
            Self::Example { subcommand } => subcommand.execute(),
            Self::Settings { subcommand } => subcommand.execute(),
        }
    }
}

/// Parse CLI arguments and run the requested command
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    // Invoked as: `$ iamsim --markdown-help`
    if cli.markdown_help {
        clap_markdown::print_help_markdown::<Cli>();
        return Ok(());
    }

    let Some(command) = cli.command else {
        let help_str = Cli::command().render_long_help().to_string();
        println!("{help_str}");
        return Ok(());
    };

    command.execute()
}

/// Load program settings, if not provided by the caller
fn load_settings(settings: Option<Settings>) -> Result<Settings> {
    match settings {
        Some(settings) => Ok(settings),
        None => Settings::load().context("Failed to load settings."),
    }
}

/// Create the output folder and start logging to it.
///
/// The warning about overwriting has to wait until the logger is running.
fn prepare_output(output_path: &Path, overwrite: bool, settings: &Settings) -> Result<()> {
    let overwritten = create_output_directory(output_path, overwrite).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            output_path.display()
        )
    })?;

    log::init(Some(&settings.log_level), Some(output_path))
        .context("Failed to initialise logging.")?;
    info!("Output folder: {}", output_path.display());
    if overwritten {
        warn!("Output folder will be overwritten");
    }

    Ok(())
}

/// Handle the `run` command.
pub fn handle_run_command(
    model_path: &Path,
    opts: &RunOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let settings = load_settings(settings)?;

    let output_path = match &opts.output_dir {
        Some(path) => path.clone(),
        None => get_output_dir(model_path)?,
    };
    prepare_output(&output_path, opts.overwrite || settings.overwrite, &settings)?;

    let model = Model::from_path(model_path).context("Failed to load model.")?;
    info!("Loaded model from {}", model_path.display());

    crate::simulation::run(
        &model,
        &output_path,
        opts.debug_model || settings.debug_model,
    )?;
    write_metadata(&output_path, RunKind::Simulation, model_path)
        .context("Failed to save metadata.")?;
    info!("Simulation complete!");

    Ok(())
}

/// Handle the `validate` command.
pub fn handle_validate_command(model_path: &Path, settings: Option<Settings>) -> Result<()> {
    let settings = load_settings(settings)?;

    // No log files are written when validating
    log::init(Some(&settings.log_level), None).context("Failed to initialise logging.")?;

    Model::from_path(model_path).context("Failed to validate model.")?;
    info!("Model validation successful!");

    Ok(())
}

/// Handle the `sensitivity` command.
pub fn handle_sensitivity_command(
    config_path: &Path,
    opts: &SensitivityOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let settings = load_settings(settings)?;

    // The configuration is needed first, as it may say where to write outputs
    let analysis =
        SensitivityAnalysis::load(config_path).context("Failed to load sensitivity analysis.")?;

    let output_path = match (&opts.output_dir, &analysis.config().output_dir) {
        (Some(path), _) | (None, Some(path)) => path.clone(),
        (None, None) => get_sensitivity_output_dir(config_path)?,
    };
    prepare_output(&output_path, opts.overwrite || settings.overwrite, &settings)?;
    info!("Loaded sensitivity analysis from {}", config_path.display());

    // Parameters and raw outputs are saved even if the analysis fails
    let result = analysis.run(&output_path);
    write_metadata(&output_path, RunKind::Sensitivity, config_path)
        .context("Failed to save metadata.")?;
    result?;
    info!("Sensitivity analysis complete!");

    Ok(())
}
