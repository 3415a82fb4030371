//! Calm CLI - Command-line interface for Synheart Calm
//!
//! Commands:
//! - simulate: Stream simulated readings through the live monitor
//! - classify: Classify a window of heart-rate samples
//! - guidance: Print breathing guidance for a state
//! - progress: Inspect and edit saved session progress
//! - doctor: Diagnose configuration and storage health

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::mpsc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use synheart_calm::classifier::StateClassifier;
use synheart_calm::config::CalmConfig;
use synheart_calm::generator::SampleGenerator;
use synheart_calm::guidance::{guidance_for, guidance_for_label};
use synheart_calm::monitor::MeditationMonitor;
use synheart_calm::progress::ProgressTracker;
use synheart_calm::storage::FileStore;
use synheart_calm::types::{BiometricReading, HeartRateSample};
use synheart_calm::{CalmError, CALM_VERSION, PRODUCER_NAME};

/// Calm - Biometric-adaptive meditation state engine
#[derive(Parser)]
#[command(name = "calm")]
#[command(author = "Synheart AI Inc")]
#[command(version = CALM_VERSION)]
#[command(about = "Classify meditation state and manage session progress", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream simulated readings through the live monitor
    Simulate {
        /// Number of readings to emit
        #[arg(long, default_value = "30")]
        ticks: usize,

        /// Override the tick interval in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Seed for reproducible readings
        #[arg(long)]
        seed: Option<u64>,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,
    },

    /// Classify a JSON array of heart-rate samples
    Classify {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,
    },

    /// Print breathing guidance for a state
    Guidance {
        /// State label, e.g. deep-meditation
        state: String,
    },

    /// Inspect and edit saved session progress
    Progress {
        /// Directory holding the progress store
        #[arg(long, default_value = ".calm")]
        store: PathBuf,

        #[command(subcommand)]
        action: ProgressAction,
    },

    /// Diagnose configuration and storage health
    Doctor {
        /// Directory holding the progress store
        #[arg(long)]
        store: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ProgressAction {
    /// Save a playback position
    Save {
        session_id: String,
        /// Current position in seconds
        position: f64,
        /// Total duration in seconds
        duration: f64,
        #[arg(long)]
        completed: bool,
    },
    /// Show saved progress for a session
    Get { session_id: String },
    /// Print the resume position (0 when the session should restart)
    Resume { session_id: String },
    /// Mark a session completed
    Complete { session_id: String },
    /// Delete a session's progress
    Clear { session_id: String },
    /// Purge progress older than the retention period
    Cleanup,
    /// List all saved progress
    List,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), CalmCliError> {
    let config = match &cli.config {
        Some(path) => CalmConfig::load(path)?,
        None => CalmConfig::default(),
    };

    match cli.command {
        Commands::Simulate {
            ticks,
            interval_ms,
            seed,
            output_format,
        } => cmd_simulate(config, ticks, interval_ms, seed, output_format),

        Commands::Classify {
            input,
            output_format,
        } => cmd_classify(&config, &input, output_format),

        Commands::Guidance { state } => {
            let guidance = guidance_for_label(Some(state.as_str()));
            println!("{}", serde_json::to_string_pretty(&guidance)?);
            Ok(())
        }

        Commands::Progress { store, action } => cmd_progress(&config, &store, action),

        Commands::Doctor { store, json } => {
            cmd_doctor(&config, cli.config.as_deref(), store.as_deref(), json)
        }
    }
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulationRecord {
    reading: BiometricReading,
    #[serde(flatten)]
    update: synheart_calm::MonitorUpdate,
}

fn cmd_simulate(
    mut config: CalmConfig,
    ticks: usize,
    interval_ms: Option<u64>,
    seed: Option<u64>,
    output_format: OutputFormat,
) -> Result<(), CalmCliError> {
    if let Some(interval) = interval_ms {
        config.generator.interval_ms = interval;
        config.validate()?;
    }

    let generator = match seed {
        Some(seed) => SampleGenerator::with_seed(config.generator.clone(), seed),
        None => SampleGenerator::new(config.generator.clone()),
    };
    let timeout = generator.interval() + Duration::from_secs(5);

    let (tx, rx) = mpsc::channel();
    let mut handle = generator.start(move |reading| {
        // The receiver hangs up once enough ticks were collected
        let _ = tx.send(reading);
    })?;

    let mut monitor = MeditationMonitor::with_config(&config);
    let mut stdout = io::stdout();

    for _ in 0..ticks {
        let reading = rx
            .recv_timeout(timeout)
            .map_err(|_| CalmCliError::Stalled)?;
        let Some(update) = monitor.push_reading(&reading) else {
            continue;
        };
        let record = SimulationRecord { reading, update };
        let line = match output_format {
            OutputFormat::Ndjson => serde_json::to_string(&record)?,
            OutputFormat::JsonPretty => serde_json::to_string_pretty(&record)?,
        };
        writeln!(stdout, "{}", line)?;
        stdout.flush()?;
    }

    handle.stop();
    Ok(())
}

fn cmd_classify(
    config: &CalmConfig,
    input: &Path,
    output_format: OutputFormat,
) -> Result<(), CalmCliError> {
    let input_data = if input.to_string_lossy() == "-" {
        // Nothing is piped in; reading would block on the terminal
        if atty::is(atty::Stream::Stdin) {
            return Err(CalmCliError::InteractiveStdin);
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    let window: Vec<HeartRateSample> = serde_json::from_str(&input_data)
        .map_err(|e| CalmCliError::ParseError(format!("Failed to parse samples: {}", e)))?;

    if window.is_empty() {
        return Err(CalmCliError::NoSamples);
    }

    let result = StateClassifier::new(config.classifier.clone()).classify(&window);
    let output = serde_json::json!({
        "result": result,
        "guidance": guidance_for(result.state),
    });

    match output_format {
        OutputFormat::Ndjson => println!("{}", serde_json::to_string(&output)?),
        OutputFormat::JsonPretty => println!("{}", serde_json::to_string_pretty(&output)?),
    }
    Ok(())
}

fn cmd_progress(
    config: &CalmConfig,
    store_dir: &Path,
    action: ProgressAction,
) -> Result<(), CalmCliError> {
    let store = FileStore::open(store_dir)?;
    let mut tracker = ProgressTracker::open(store, config.progress.clone());

    match action {
        ProgressAction::Save {
            session_id,
            position,
            duration,
            completed,
        } => {
            tracker.save_progress(&session_id, position, duration, completed);
            print_json(&tracker.get_progress(&session_id))?;
        }
        ProgressAction::Get { session_id } => match tracker.get_progress(&session_id) {
            Some(progress) => print_json(&progress)?,
            None => return Err(CalmError::UnknownSession(session_id).into()),
        },
        ProgressAction::Resume { session_id } => {
            println!(
                "{}",
                serde_json::json!({
                    "sessionId": session_id,
                    "canResume": tracker.can_resume(&session_id),
                    "resumeTime": tracker.get_resume_time(&session_id),
                })
            );
        }
        ProgressAction::Complete { session_id } => {
            if !tracker.mark_completed(&session_id) {
                return Err(CalmError::UnknownSession(session_id).into());
            }
            print_json(&tracker.get_progress(&session_id))?;
        }
        ProgressAction::Clear { session_id } => {
            tracker.clear_progress(&session_id);
        }
        ProgressAction::Cleanup => {
            let removed = tracker.cleanup_old_progress();
            println!("{}", serde_json::json!({ "removed": removed }));
        }
        ProgressAction::List => print_json(&tracker.all_progress())?,
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CalmCliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_doctor(
    config: &CalmConfig,
    config_path: Option<&Path>,
    store_dir: Option<&Path>,
    json: bool,
) -> Result<(), CalmCliError> {
    let checks = doctor_checks(config, config_path, store_dir);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: CALM_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Calm Doctor Report");
        println!("==================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(CalmCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn doctor_checks(
    config: &CalmConfig,
    config_path: Option<&Path>,
    store_dir: Option<&Path>,
) -> Vec<DoctorCheck> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "calm_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Calm version {}", CALM_VERSION),
    });

    checks.push(DoctorCheck {
        name: "config".to_string(),
        status: CheckStatus::Ok,
        message: match config_path {
            Some(path) => format!("Loaded {}", path.display()),
            None => "Using built-in defaults".to_string(),
        },
    });

    if let Some(dir) = store_dir {
        let progress_file = dir.join(format!("{}.json", config.progress.storage_key));
        if !progress_file.exists() {
            checks.push(DoctorCheck {
                name: "progress_store".to_string(),
                status: CheckStatus::Warning,
                message: "No saved progress yet".to_string(),
            });
        } else {
            match fs::read_to_string(&progress_file) {
                Ok(content) => match serde_json::from_str::<Vec<serde_json::Value>>(&content) {
                    Ok(records) => checks.push(DoctorCheck {
                        name: "progress_store".to_string(),
                        status: CheckStatus::Ok,
                        message: format!("Progress store valid ({} records)", records.len()),
                    }),
                    Err(e) => checks.push(DoctorCheck {
                        name: "progress_store".to_string(),
                        status: CheckStatus::Error,
                        message: format!("Progress store is not a JSON array: {}", e),
                    }),
                },
                Err(e) => checks.push(DoctorCheck {
                    name: "progress_store".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Cannot read progress store: {}", e),
                }),
            }
        }
    }

    checks
}

// Error types

#[derive(Debug)]
enum CalmCliError {
    Io(io::Error),
    Calm(CalmError),
    Json(serde_json::Error),
    NoSamples,
    InteractiveStdin,
    Stalled,
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for CalmCliError {
    fn from(e: io::Error) -> Self {
        CalmCliError::Io(e)
    }
}

impl From<CalmError> for CalmCliError {
    fn from(e: CalmError) -> Self {
        CalmCliError::Calm(e)
    }
}

impl From<serde_json::Error> for CalmCliError {
    fn from(e: serde_json::Error) -> Self {
        CalmCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<CalmCliError> for CliError {
    fn from(e: CalmCliError) -> Self {
        match e {
            CalmCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            CalmCliError::Calm(CalmError::InvalidConfig(msg)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: msg,
                hint: Some("Run 'calm doctor' to inspect the configuration".to_string()),
            },
            CalmCliError::Calm(CalmError::UnknownSession(id)) => CliError {
                code: "UNKNOWN_SESSION".to_string(),
                message: format!("No saved progress for session '{}'", id),
                hint: Some("Run 'calm progress list' to see saved sessions".to_string()),
            },
            CalmCliError::Calm(e) => CliError {
                code: "CALM_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            CalmCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            CalmCliError::InteractiveStdin => CliError {
                code: "NO_INPUT".to_string(),
                message: "stdin is a terminal, expected piped samples".to_string(),
                hint: Some("Pipe a JSON array into 'calm classify -i -' or pass a file".to_string()),
            },
            CalmCliError::NoSamples => CliError {
                code: "NO_SAMPLES".to_string(),
                message: "No samples found in input".to_string(),
                hint: Some("Provide a JSON array of {heartRate, timestamp} objects".to_string()),
            },
            CalmCliError::Stalled => CliError {
                code: "GENERATOR_STALLED".to_string(),
                message: "Sample generator stopped producing readings".to_string(),
                hint: Some("Re-run with --verbose for details".to_string()),
            },
            CalmCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            CalmCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Check input format".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_check(checks: &[DoctorCheck]) -> &DoctorCheck {
        checks
            .iter()
            .find(|c| c.name == "progress_store")
            .unwrap()
    }

    #[test]
    fn test_doctor_reports_only_calm_checks() {
        let checks = doctor_checks(&CalmConfig::default(), None, None);
        let names: Vec<&str> = checks.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["calm_version", "config"]);
    }

    #[test]
    fn test_doctor_progress_store_status() {
        let dir = tempfile::tempdir().unwrap();
        let config = CalmConfig::default();
        let file = dir.path().join("meditation_progress.json");

        let checks = doctor_checks(&config, None, Some(dir.path()));
        assert!(matches!(store_check(&checks).status, CheckStatus::Warning));

        fs::write(&file, "[]").unwrap();
        let checks = doctor_checks(&config, None, Some(dir.path()));
        assert!(matches!(store_check(&checks).status, CheckStatus::Ok));

        fs::write(&file, "{broken").unwrap();
        let checks = doctor_checks(&config, None, Some(dir.path()));
        assert!(matches!(store_check(&checks).status, CheckStatus::Error));
    }
}
