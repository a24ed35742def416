//! outcore CLI entrypoint.
//!
//! Runs the plan, apply, and refresh walks over a scenario file.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use outcore::cli::{Cli, Commands, OutputFormatter, Session};
use outcore::config::{find_config_file, ConfigParser, ConfigValidator, ScenarioConfig};
use outcore::error::{OutcoreError, Result};
use outcore::walker::WalkResult;

use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);

    match cli.command {
        Commands::Validate { warnings } => cmd_validate(cli.config.as_ref(), warnings, &formatter),
        Commands::Plan { destroy } => cmd_plan(cli.config.as_ref(), destroy, &formatter).await,
        Commands::Apply { destroy } => cmd_apply(cli.config.as_ref(), destroy, &formatter).await,
        Commands::Refresh => cmd_refresh(cli.config.as_ref(), &formatter).await,
    }
}

/// Validate the scenario.
fn cmd_validate(
    config_path: Option<&PathBuf>,
    show_warnings: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let config_file = resolve_config_path(config_path)?;
    info!("Validating scenario: {}", config_file.display());

    let config = load_config(&config_file)?;
    let result = ConfigValidator::new().check(&config);
    emit(&formatter.format_validation(&result, show_warnings))?;

    // Surface the first error as the command's failure.
    ConfigValidator::new().validate(&config).map(|_| ())
}

/// Show the planned changes.
async fn cmd_plan(
    config_path: Option<&PathBuf>,
    destroy: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let session = load_session(config_path)?;

    let plan = session.plan(destroy).await;
    emit(&formatter.format_plan(&plan.changes, &plan.result))?;

    ensure_success(&plan.result)
}

/// Plan, then apply the plan.
async fn cmd_apply(
    config_path: Option<&PathBuf>,
    destroy: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let session = load_session(config_path)?;

    let plan = session.plan(destroy).await;
    emit(&formatter.format_plan(&plan.changes, &plan.result))?;
    ensure_success(&plan.result)?;

    if !plan.changes.summary().has_changes() {
        debug!("Nothing to apply");
        return Ok(());
    }

    let applied = session.apply(plan.changes).await;
    emit(&formatter.format_walk(&applied.result, &applied.state))?;

    ensure_success(&applied.result)
}

/// Refresh stored values.
async fn cmd_refresh(config_path: Option<&PathBuf>, formatter: &OutputFormatter) -> Result<()> {
    let session = load_session(config_path)?;

    let refreshed = session.refresh().await;
    emit(&formatter.format_walk(&refreshed.result, &refreshed.state))?;

    ensure_success(&refreshed.result)
}

/// Resolves the scenario path from the argument or by searching upward.
fn resolve_config_path(config_path: Option<&PathBuf>) -> Result<PathBuf> {
    config_path.map_or_else(|| find_config_file("."), |path| Ok(path.clone()))
}

/// Loads `.env` next to the scenario, then the scenario with overrides.
fn load_config(config_file: &Path) -> Result<ScenarioConfig> {
    let parser = ConfigParser::new().with_base_path(
        config_file
            .parent()
            .unwrap_or_else(|| Path::new(".")),
    );
    parser.load_dotenv()?;
    parser.load_with_env(config_file)
}

/// Loads and validates the scenario.
fn load_session(config_path: Option<&PathBuf>) -> Result<Session> {
    let config_file = resolve_config_path(config_path)?;
    debug!("Loading scenario from: {}", config_file.display());

    let config = load_config(&config_file)?;
    ConfigValidator::new().validate(&config)?;

    Session::new(&config)
}

fn ensure_success(result: &WalkResult) -> Result<()> {
    if result.is_success() {
        Ok(())
    } else {
        Err(OutcoreError::WalkFailed {
            phase: result.phase,
            failed: result.failed,
        })
    }
}

/// Writes command output to stdout.
fn emit(output: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{output}")?;
    Ok(())
}
