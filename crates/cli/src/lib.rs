//! Launch CLI
//!
//! Command-line surface for `launch_core`: launches workspace binaries
//! (directly, under `cargo watch`, or under `cargo flamegraph`) with an
//! assembled log filter, and runs the CI pipeline locally.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use launch_core::config::LaunchConfig;
use launch_core::deps;
use launch_core::invocation::Invocation;
use launch_core::plan::{shell_quote, LaunchPlan};
use launch_core::runner::Runner;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Variable holding the launcher's own log filter
pub const LAUNCH_LOG_ENV: &str = "LAUNCH_LOG";

#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Launch - run workspace binaries and the CI pipeline locally",
    after_help = "Launching:\n  launch [OPTIONS] [w|watch|f|flame] <BIN> [ARGS]...\n\nOptions must come before the mode or binary name; everything after <BIN> is forwarded."
)]
pub struct Args {
    /// Print the launch plan instead of executing it
    #[arg(long)]
    pub dry_run: bool,

    /// Build with --release (run and watch modes)
    #[arg(long, env = "LAUNCH_RELEASE")]
    pub release: bool,

    /// Project config file (default: ./launch.toml if present)
    #[arg(long, env = "LAUNCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase launcher log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CliCommand {
    /// Run the CI pipeline locally
    #[command(subcommand)]
    Ci(CiCommand),
    /// Print the assembled log variable as a shell export
    Log {
        /// Print as JSON instead
        #[arg(long)]
        json: bool,
    },
    /// `[w|watch|f|flame] <BIN> [ARGS]...`
    #[command(external_subcommand)]
    Launch(Vec<OsString>),
}

#[derive(Subcommand, Debug, Clone)]
pub enum CiCommand {
    /// List stages and jobs
    List {
        #[arg(long)]
        json: bool,
    },
    /// Run all jobs, or the jobs matching the given job or stage names
    Run {
        /// Print the report as JSON (job output is captured into it)
        #[arg(long)]
        json: bool,
        /// Job or stage names
        selection: Vec<String>,
    },
    /// Check that dependency tables are sorted
    CheckDeps {
        /// Workspace root (default: current directory)
        path: Option<PathBuf>,
    },
}

/// Install the launcher's own subscriber
///
/// Reads `LAUNCH_LOG`, never `RUST_LOG`: that one belongs to the launched binary.
pub fn init_tracing(verbose: u8) {
    let fallback = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_env(LAUNCH_LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Load `.env` from the working directory, if there is one
pub fn load_dotenv(dir: &Path) {
    let env_path = dir.join(".env");
    if env_path.exists() {
        if let Err(e) = dotenvy::from_path(&env_path) {
            tracing::warn!("Failed to load {:?}: {}", env_path, e);
        }
    }
}

pub fn load_config(args: &Args, dir: &Path) -> Result<LaunchConfig> {
    let mut config = match &args.config {
        Some(path) => LaunchConfig::load_explicit(path),
        None => LaunchConfig::load(dir),
    }
    .context("Failed to load launcher config")?;
    if args.release {
        config.tools.release = true;
    }
    Ok(config)
}

/// Entry point behind `main`
pub async fn run(args: Args) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to resolve working directory")?;
    load_dotenv(&cwd);
    let config = load_config(&args, &cwd)?;

    match args.command.clone() {
        None => launch(&args, &config, Vec::new()),
        Some(CliCommand::Launch(tokens)) => launch(&args, &config, tokens),
        Some(CliCommand::Log { json }) => print_log(&config, json),
        Some(CliCommand::Ci(ci)) => run_ci(&config, &cwd, ci).await,
    }
}

fn launch(args: &Args, config: &LaunchConfig, tokens: Vec<OsString>) -> Result<()> {
    let plan = launch_plan(config, tokens)?;
    if args.dry_run {
        println!("{}", plan);
        return Ok(());
    }

    Err(launch_core::exec::handoff(&plan)).context("Launch handoff failed")
}

/// Resolve launch tokens into the process that would be handed off to
pub fn launch_plan(config: &LaunchConfig, tokens: Vec<OsString>) -> Result<LaunchPlan> {
    let invocation = Invocation::parse(tokens)?;
    let directives = config.directives();
    directives.validate()?;
    Ok(LaunchPlan::new(&invocation, &config.tools, &config.log_env, &directives))
}

fn print_log(config: &LaunchConfig, json: bool) -> Result<()> {
    println!("{}", render_log(config, json)?);
    Ok(())
}

/// The assembled log variable as a shell `export` line, or as JSON
pub fn render_log(config: &LaunchConfig, json: bool) -> Result<String> {
    let directives = config.directives();
    directives.validate()?;
    let value = directives.render();

    if json {
        let out = serde_json::json!({
            "env": config.log_env,
            "value": value,
            "sources": config.sources,
        });
        Ok(serde_json::to_string_pretty(&out)?)
    } else {
        Ok(format!("export {}={}", config.log_env, shell_quote(&value)))
    }
}

async fn run_ci(config: &LaunchConfig, cwd: &Path, command: CiCommand) -> Result<()> {
    match command {
        CiCommand::List { json } => {
            config.pipeline.validate()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&config.pipeline)?);
                return Ok(());
            }
            let all = config.pipeline.select::<&str>(&[])?;
            for (stage, jobs) in config.pipeline.by_stage(&all) {
                println!("{}:", stage);
                for job in jobs {
                    match job.builtin {
                        Some(builtin) => println!("  {:<20} <builtin {}>", job.name, builtin),
                        None => println!("  {:<20} {}", job.name, job.script.join(" && ")),
                    }
                }
            }
            Ok(())
        }
        CiCommand::Run { json, selection } => {
            let report = Runner::new(cwd)
                .echo_output(!json)
                .run(&config.pipeline, selection.as_slice())
                .await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report);
            }
            if !report.success() {
                anyhow::bail!("CI pipeline failed");
            }
            Ok(())
        }
        CiCommand::CheckDeps { path } => {
            let root = path.unwrap_or_else(|| cwd.to_path_buf());
            let violations = deps::check_workspace(&root)?;
            for v in &violations {
                println!("{}", v);
            }
            if !violations.is_empty() {
                anyhow::bail!("{} dependency order violation(s)", violations.len());
            }
            println!("all dependency tables are sorted");
            Ok(())
        }
    }
}
