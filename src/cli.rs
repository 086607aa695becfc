//! The command line interface for deropt.
use crate::input::{LoadedScenario, load_control_scenario, load_scenario};
use crate::log;
use crate::optimisation::solve::SolverOptions;
use crate::output::{
    create_output_directory, get_output_dir, write_multi_node_results, write_results,
};
use crate::settings::Settings;
use crate::simulation::control::run_control;
use crate::simulation::multi_node::run_multi_node;
use crate::simulation::run_scenario;
use ::log::{info, warn};
use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};

pub mod settings;
use settings::SettingsSubcommands;

/// The command line interface for deropt.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// The available commands.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Options shared by commands which write results
#[derive(Args)]
pub struct OutputOpts {
    /// Directory for output files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// Whether to overwrite the output directory if it already exists
    #[arg(long)]
    pub overwrite: bool,
}

/// Options for the run command
#[derive(Args)]
pub struct RunOpts {
    /// Output options
    #[command(flatten)]
    pub output: OutputOpts,
    /// Skip the business-as-usual comparison
    #[arg(long)]
    pub no_bau: bool,
}

/// Options for the control command
#[derive(Args)]
pub struct ControlOpts {
    /// Output options
    #[command(flatten)]
    pub output: OutputOpts,
    /// Reward per kWh left in storage at the end of the horizon
    #[arg(long, default_value_t = 0.0)]
    pub soc_preservation_weight: f64,
}

/// The available commands.
#[derive(Subcommand)]
enum Commands {
    /// Size and dispatch distributed energy resources for a scenario.
    Run {
        /// Path to the scenario file.
        scenario_path: PathBuf,
        /// Other run options
        #[command(flatten)]
        opts: RunOpts,
    },
    /// Dispatch existing equipment over a short horizon.
    Control {
        /// Path to the scenario file.
        scenario_path: PathBuf,
        /// Other control options
        #[command(flatten)]
        opts: ControlOpts,
    },
    /// Validate a scenario.
    Validate {
        /// Path to the scenario file.
        scenario_path: PathBuf,
    },
    /// Manage program settings.
    Settings {
        /// The available subcommands for managing settings.
        #[command(subcommand)]
        subcommand: SettingsSubcommands,
    },
}

impl Commands {
    /// Execute the supplied CLI command
    fn execute(self) -> Result<()> {
        match self {
            Self::Run {
                scenario_path,
                opts,
            } => handle_run_command(&scenario_path, &opts, None),
            Self::Control {
                scenario_path,
                opts,
            } => handle_control_command(&scenario_path, &opts, None),
            Self::Validate { scenario_path } => handle_validate_command(&scenario_path, None),
            Self::Settings { subcommand } => subcommand.execute(),
        }
    }
}

/// Parse CLI arguments and start deropt
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        let help_str = Cli::command().render_long_help().to_string();
        println!("{help_str}");
        return Ok(());
    };

    command.execute()
}

/// Load program settings, if not provided
fn settings_or_load(settings: Option<Settings>) -> Result<Settings> {
    match settings {
        Some(settings) => Ok(settings),
        None => Settings::load().context("Failed to load settings."),
    }
}

/// Create the output folder and start logging to it.
///
/// Returns the path to the output folder.
fn prepare_output(
    scenario_path: &Path,
    opts: &OutputOpts,
    settings: &Settings,
) -> Result<PathBuf> {
    let output_path = match &opts.output_dir {
        Some(path) => path.clone(),
        None => get_output_dir(scenario_path)?,
    };

    // The command-line flag can only enable overwriting
    let allow_overwrite = opts.overwrite || settings.overwrite;
    let overwrite = create_output_directory(&output_path, allow_overwrite).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            output_path.display()
        )
    })?;

    log::init(Some(&settings.log_level), Some(&output_path))
        .context("Failed to initialise logging.")?;
    info!("Output folder: {}", output_path.display());

    // NB: We have to wait until the logger is initialised to display this warning
    if overwrite {
        warn!("Output folder will be overwritten");
    }

    Ok(output_path)
}

/// Handle the `run` command.
pub fn handle_run_command(
    scenario_path: &Path,
    opts: &RunOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let settings = settings_or_load(settings)?;
    let output_path = prepare_output(scenario_path, &opts.output, &settings)?;
    let options = SolverOptions::from(&settings);

    let loaded = load_scenario(scenario_path).context("Failed to load scenario.")?;
    info!("Loaded scenario from {}", scenario_path.display());

    match loaded {
        LoadedScenario::Single(scenario) => {
            let results = run_scenario(&scenario, &options, !opts.no_bau)?;
            write_results(&output_path, &results, scenario.time_index.len())?;
        }
        LoadedScenario::MultiNode(nodes) => {
            let results = run_multi_node(&nodes, &options)?;
            let num_time_steps = nodes
                .first()
                .map_or(0, |node| node.scenario.time_index.len());
            write_multi_node_results(&output_path, &results, num_time_steps)?;
        }
    }
    info!("Optimisation complete!");

    Ok(())
}

/// Handle the `control` command.
pub fn handle_control_command(
    scenario_path: &Path,
    opts: &ControlOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let settings = settings_or_load(settings)?;
    let output_path = prepare_output(scenario_path, &opts.output, &settings)?;
    let options = SolverOptions::from(&settings);

    let scenario = load_control_scenario(scenario_path).context("Failed to load scenario.")?;
    info!("Loaded scenario from {}", scenario_path.display());

    let results = run_control(&scenario, &options, opts.soc_preservation_weight)?;
    write_results(&output_path, &results, scenario.time_index.len())?;
    info!("Dispatch complete!");

    Ok(())
}

/// Handle the `validate` command.
pub fn handle_validate_command(scenario_path: &Path, settings: Option<Settings>) -> Result<()> {
    let settings = settings_or_load(settings)?;

    // Initialise program logger (we won't save log files when running the validate command)
    log::init(Some(&settings.log_level), None).context("Failed to initialise logging.")?;

    load_scenario(scenario_path).context("Failed to validate scenario.")?;
    info!("Scenario validation successful!");

    Ok(())
}
