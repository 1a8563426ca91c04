//! Command-line harness for the notes application's editing scenarios.
//!
//! Runs catalog scenarios against the browser automation agent (or the
//! built-in simulated editor) and inspects the mobile packaging descriptor.
//!
//! # Usage
//!
//! ```bash
//! # List scenarios; disabled ones show why
//! logbench list
//!
//! # Run every active scenario against the agent from config.json
//! logbench run
//!
//! # Run one scenario against a specific agent with a longer wait bound
//! logbench run hashtag-and-brackets-same-line --agent 127.0.0.1:9223 --timeout 10000
//!
//! # Run against the simulated editor without recording the result
//! logbench run --sim --no-record
//!
//! # Print the descriptor, stripped of development settings
//! logbench descriptor show --distribution
//!
//! # Emit capacitor.config.ts for a release build
//! logbench descriptor write capacitor.config.ts --distribution
//!
//! # List development settings that should not ship
//! logbench descriptor check --file capacitor.config.json
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use logbench_core::catalog;
use logbench_core::config::HarnessConfig;
use logbench_core::descriptor::PackagingDescriptor;
use logbench_core::driver::DriverConfig;
use logbench_core::executor::StepExecutor;
use logbench_core::report::ReportStore;
use logbench_core::runner::{RunOutcome, RunReport, RunSummary, ScenarioRunner};
use logbench_core::scenario::Scenario;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Run end-to-end editing scenarios against the notes application.
#[derive(Parser)]
#[command(name = "logbench")]
#[command(about = "Run editing scenarios and inspect the packaging descriptor")]
#[command(version)]
struct Cli {
    /// Output format: text or json
    #[arg(short, long, default_value = "text", global = true)]
    format: OutputFormat,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true, env = "LOGBENCH_LOG_FILE")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// List catalog scenarios
    List,

    /// Run scenarios (all of them if no names are given)
    Run {
        /// Scenario names
        names: Vec<String>,
        /// Use the built-in simulated editor; wins over --agent
        #[arg(long)]
        sim: bool,
        /// Agent address, overriding config.json
        #[arg(short, long, value_name = "HOST:PORT", value_parser = parse_agent, env = "LOGBENCH_AGENT")]
        agent: Option<(String, u16)>,
        /// Wait bound in milliseconds, overriding config.json
        #[arg(short = 'o', long, env = "LOGBENCH_TIMEOUT")]
        timeout: Option<u64>,
        /// Do not append the results to the run log
        #[arg(long)]
        no_record: bool,
    },

    /// Inspect or emit the packaging descriptor
    Descriptor {
        #[command(subcommand)]
        command: DescriptorCommand,
    },
}

#[derive(Subcommand)]
enum DescriptorCommand {
    /// Print the descriptor as JSON
    Show {
        /// Read the descriptor from a JSON file instead of the built-in one
        #[arg(long)]
        file: Option<PathBuf>,
        /// Strip development-only settings
        #[arg(long)]
        distribution: bool,
    },

    /// Write the descriptor; a .ts path gets the TypeScript module form
    Write {
        path: PathBuf,
        /// Strip development-only settings
        #[arg(long)]
        distribution: bool,
    },

    /// List development settings that should not ship
    Check {
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

fn parse_agent(s: &str) -> Result<(String, u16), String> {
    let (host, port) = s
        .rsplit_once(':')
        .ok_or_else(|| format!("expected HOST:PORT, got '{s}'"))?;
    if host.is_empty() {
        return Err(format!("missing host in '{s}'"));
    }
    let port = port
        .parse()
        .map_err(|_| format!("invalid port '{port}'"))?;
    Ok((host.to_string(), port))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = init_logging(cli.log_file.as_ref());

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

fn init_logging(log_file: Option<&PathBuf>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let Some(path) = log_file else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        return None;
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name = path.file_name().map(PathBuf::from).unwrap_or_else(|| "logbench.log".into());
    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();
    Some(guard)
}

#[derive(Debug)]
enum CliError {
    Connection(String),
    ScenarioFailed(String),
    UnknownScenario(String),
    Other(String),
}

impl CliError {
    fn exit_code(&self) -> ExitCode {
        match self {
            CliError::ScenarioFailed(_) | CliError::Other(_) => ExitCode::from(1),
            CliError::Connection(_) => ExitCode::from(2),
            CliError::UnknownScenario(_) => ExitCode::from(3),
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Connection(msg) => write!(f, "Connection error: {}", msg),
            CliError::ScenarioFailed(msg) => write!(f, "Scenario failed: {}", msg),
            CliError::UnknownScenario(name) => write!(f, "Unknown scenario: {}", name),
            CliError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::List => list(cli.format),
        Command::Run {
            ref names,
            sim,
            ref agent,
            timeout,
            no_record,
        } => {
            let config = HarnessConfig::load();
            let driver = if sim {
                DriverConfig::Simulated
            } else if let Some((host, port)) = agent {
                DriverConfig::Agent {
                    host: host.clone(),
                    port: *port,
                }
            } else {
                config.agent()
            };
            let wait = timeout.map_or(config.wait_timeout(), std::time::Duration::from_millis);
            let record = config.record_runs && !no_record;
            run_scenarios(names, driver, wait, record, cli.format).await
        }
        Command::Descriptor { ref command } => descriptor(command, cli.format),
    }
}

fn list(format: OutputFormat) -> Result<(), CliError> {
    let scenarios = catalog::all().map_err(|e| CliError::Other(e.to_string()))?;
    if format == OutputFormat::Json {
        let entries: Vec<_> = scenarios
            .iter()
            .map(|s| {
                serde_json::json!({
                    "name": s.name,
                    "title": s.title,
                    "issue": s.issue,
                    "active": s.is_active(),
                    "disabled_reason": s.disabled_reason(),
                    "steps": s.steps.len(),
                })
            })
            .collect();
        println!("{}", to_json(&entries)?);
        return Ok(());
    }

    for scenario in &scenarios {
        match scenario.disabled_reason() {
            None => println!("{}  {}", scenario.name, scenario.title),
            Some(reason) => println!("{}  {} (disabled: {})", scenario.name, scenario.title, reason),
        }
    }
    Ok(())
}

fn select(names: &[String]) -> Result<Vec<Scenario>, CliError> {
    let all = catalog::all().map_err(|e| CliError::Other(e.to_string()))?;
    if names.is_empty() {
        return Ok(all);
    }
    names
        .iter()
        .map(|name| {
            all.iter()
                .find(|s| &s.name == name)
                .cloned()
                .ok_or_else(|| CliError::UnknownScenario(name.clone()))
        })
        .collect()
}

async fn run_scenarios(
    names: &[String],
    driver: DriverConfig,
    wait: std::time::Duration,
    record: bool,
    format: OutputFormat,
) -> Result<(), CliError> {
    let scenarios = select(names)?;

    let target = match &driver {
        DriverConfig::Agent { host, port } => format!("{host}:{port}"),
        DriverConfig::Simulated => "simulated editor".to_string(),
    };
    let executor = StepExecutor::from_config_connected(driver)
        .await
        .map_err(|e| CliError::Connection(format!("Failed to connect to {}: {}", target, e)))?
        .with_wait_timeout(wait);
    info!(backend = %target, scenarios = scenarios.len(), "running scenarios");

    let summary = ScenarioRunner::new(executor).run_all(&scenarios).await;

    if record {
        let store = ReportStore::default_location();
        match store.append_all(&summary) {
            Ok(Some(path)) => info!(path = %path.display(), "results recorded"),
            Ok(None) => {}
            Err(e) => eprintln!("Warning: could not record results: {}", e),
        }
    }

    print_summary(&summary, format)?;

    if summary.is_success() {
        Ok(())
    } else {
        Err(CliError::ScenarioFailed(format!(
            "{} of {} scenario(s) failed",
            summary.failed(),
            summary.reports.len()
        )))
    }
}

fn print_summary(summary: &RunSummary, format: OutputFormat) -> Result<(), CliError> {
    if format == OutputFormat::Json {
        println!("{}", to_json(summary)?);
        return Ok(());
    }

    for report in &summary.reports {
        println!("{}", format_report(report));
    }
    eprintln!(
        "{} passed, {} failed, {} skipped",
        summary.passed(),
        summary.failed(),
        summary.skipped()
    );
    Ok(())
}

/// One line per report: `PASS name (12ms)`, `FAIL name: why`, `SKIP name: why`.
fn format_report(report: &RunReport) -> String {
    match &report.outcome {
        RunOutcome::Passed => format!("PASS {} ({}ms)", report.scenario, report.duration_ms),
        RunOutcome::Failed { error } => format!("FAIL {}: {}", report.scenario, error),
        RunOutcome::Skipped { reason } => format!("SKIP {}: {}", report.scenario, reason),
    }
}

fn descriptor(command: &DescriptorCommand, format: OutputFormat) -> Result<(), CliError> {
    match command {
        DescriptorCommand::Show { file, distribution } => {
            let descriptor = load_descriptor(file.as_ref())?;
            let descriptor = if *distribution {
                descriptor.for_distribution()
            } else {
                descriptor
            };
            print!("{}", descriptor.to_json_pretty());
            Ok(())
        }
        DescriptorCommand::Write { path, distribution } => {
            let descriptor = PackagingDescriptor::logseq();
            let descriptor = if *distribution {
                descriptor.for_distribution()
            } else {
                descriptor
            };
            descriptor
                .save(path)
                .map_err(|e| CliError::Other(e.to_string()))?;
            if format == OutputFormat::Json {
                println!("{}", serde_json::json!({ "written": path }));
            } else {
                eprintln!("Wrote {}", path.display());
            }
            Ok(())
        }
        DescriptorCommand::Check { file } => {
            let warnings = load_descriptor(file.as_ref())?.distribution_warnings();
            if format == OutputFormat::Json {
                let messages: Vec<String> = warnings.iter().map(ToString::to_string).collect();
                println!("{}", serde_json::json!({ "warnings": messages }));
            } else if warnings.is_empty() {
                eprintln!("No distribution warnings");
            } else {
                for warning in &warnings {
                    println!("warning: {}", warning);
                }
            }
            Ok(())
        }
    }
}

fn load_descriptor(file: Option<&PathBuf>) -> Result<PackagingDescriptor, CliError> {
    match file {
        Some(path) => PackagingDescriptor::load(path).map_err(|e| CliError::Other(e.to_string())),
        None => Ok(PackagingDescriptor::logseq()),
    }
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(value).map_err(|e| CliError::Other(e.to_string()))
}
