//! Ridelink CLI - Command-line interface for the notification relay core
//!
//! Commands:
//! - classify: Classify a single notification
//! - parse: Parse navigation cue text
//! - run: Process streaming notification events from stdin (streaming mode)
//! - validate: Validate a relay configuration file
//! - doctor: Diagnose relay configuration and environment

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use ridelink::classifier::NotificationClassifier;
use ridelink::call_tracker::CallStateTracker;
use ridelink::config::RelayConfig;
use ridelink::parser::NavigationParser;
use ridelink::transformer::DataTransformer;
use ridelink::types::{Category, FeedEvent, RawNotification, WirePayload};
use ridelink::{RelayError, RIDELINK_VERSION};

/// Ridelink - phone-side relay core for BLE handlebar displays
#[derive(Parser)]
#[command(name = "ridelink")]
#[command(version = RIDELINK_VERSION)]
#[command(about = "Turn OS notifications into compact display payloads", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a single notification
    Classify {
        /// App identifier (package name)
        #[arg(short, long)]
        source: String,

        /// Notification title
        #[arg(short, long, default_value = "")]
        title: String,

        /// Notification body text
        #[arg(long, default_value = "")]
        text: String,

        /// Expanded body text
        #[arg(long, default_value = "")]
        big_text: String,

        /// Configuration file with category definitions
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Parse navigation cue text into a structured event
    Parse {
        /// Cue text, e.g. "Turn left in 200m onto Main Street"
        text: String,
    },

    /// Process streaming notification events from stdin (streaming mode)
    Run {
        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Configuration file (defaults apply when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Flush output after each payload
        #[arg(long, default_value = "true")]
        flush: bool,
    },

    /// Validate a relay configuration file
    Validate {
        /// Configuration file path (use - for stdin)
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Diagnose relay configuration and environment
    Doctor {
        /// Check a configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one wire payload per line)
    Ndjson,
    /// Pretty-printed JSON per payload
    JsonPretty,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

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

fn run(cli: Cli) -> Result<(), RidelinkCliError> {
    match cli.command {
        Commands::Classify {
            source,
            title,
            text,
            big_text,
            config,
        } => cmd_classify(&source, &title, &text, &big_text, config.as_deref()),

        Commands::Parse { text } => cmd_parse(&text),

        Commands::Run {
            output_format,
            config,
            flush,
        } => cmd_run(output_format, config.as_deref(), flush),

        Commands::Validate { config } => cmd_validate(&config),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<RelayConfig, RidelinkCliError> {
    match path {
        Some(path) => {
            let json = fs::read_to_string(path)?;
            Ok(RelayConfig::from_json(&json)?)
        }
        None => Ok(RelayConfig::default()),
    }
}

fn cmd_classify(
    source: &str,
    title: &str,
    text: &str,
    big_text: &str,
    config: Option<&std::path::Path>,
) -> Result<(), RidelinkCliError> {
    let config = load_config(config)?;
    let classifier = NotificationClassifier::new(config.categories)?;

    let raw = RawNotification {
        source: source.to_string(),
        title: title.to_string(),
        text: text.to_string(),
        big_text: big_text.to_string(),
        phone_number: None,
        posted_at: chrono::Utc::now(),
    };

    println!("{}", serde_json::to_string_pretty(&classifier.classify(&raw))?);
    Ok(())
}

fn cmd_parse(text: &str) -> Result<(), RidelinkCliError> {
    let parser = NavigationParser::new()?;

    match parser.parse(text) {
        Some(event) => {
            println!("{}", serde_json::to_string_pretty(&event)?);
            Ok(())
        }
        None => Err(RidelinkCliError::NoCue),
    }
}

fn cmd_run(
    output_format: OutputFormat,
    config: Option<&std::path::Path>,
    flush: bool,
) -> Result<(), RidelinkCliError> {
    let config = load_config(config)?;
    let parser = NavigationParser::with_keywords(&config.keywords)?;
    let classifier = NotificationClassifier::new(config.categories)?;
    let transformer = DataTransformer::new(config.format);
    let mut tracker = CallStateTracker::new();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        let event: FeedEvent = serde_json::from_str(trimmed).map_err(|e| {
            RidelinkCliError::ParseError(format!("Failed to parse event: {}", e))
        })?;

        let payloads = process_event(&classifier, &parser, &transformer, &mut tracker, &event)?;

        for payload in payloads {
            write!(stdout, "{}", format_payload(&payload, &output_format)?)?;
            if flush {
                stdout.flush()?;
            }
        }
    }

    Ok(())
}

/// Run one feed event through the stateless pipeline, bypassing the link.
/// Payloads that the peripheral would receive go to stdout instead.
fn process_event(
    classifier: &NotificationClassifier,
    parser: &NavigationParser,
    transformer: &DataTransformer,
    tracker: &mut CallStateTracker,
    event: &FeedEvent,
) -> Result<Vec<WirePayload>, RidelinkCliError> {
    let classified = classifier.classify(&event.raw);
    let mut payloads = Vec::new();

    match classified.category {
        Category::Navigation if !event.removed => {
            let text = event.raw.combined_text();
            if parser.is_navigation_text(&text) {
                if let Some(nav) = parser.parse(&text) {
                    payloads.push(transformer.transform_navigation(&nav)?);
                }
            }
        }
        Category::PhoneCall => {
            if let Some(signal) = classifier.call_signal(&event.raw) {
                let now = Instant::now();
                let call_events = if event.removed {
                    tracker.observe_removed(&signal.key, now)
                } else {
                    tracker.observe(signal.key, signal.state, signal.outgoing_hint, now)
                };
                for call in call_events {
                    payloads.push(transformer.transform_call(&call)?);
                }
            }
        }
        _ => {}
    }

    Ok(payloads)
}

fn cmd_validate(config: &PathBuf) -> Result<(), RidelinkCliError> {
    let json = if config.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(config)?
    };

    let config = RelayConfig::from_json(&json)?;

    println!("Configuration valid");
    println!("  categories:        {}", config.categories.len());
    println!("  max_payload_bytes: {}", config.format.max_payload_bytes);
    println!("  peer_name:         {}", config.link.peer_name);
    Ok(())
}

fn cmd_doctor(config: Option<&std::path::Path>, json: bool) -> Result<(), RidelinkCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "ridelink_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Ridelink version {}", RIDELINK_VERSION),
    });

    match NavigationParser::new() {
        Ok(_) => checks.push(DoctorCheck {
            name: "parser".to_string(),
            status: CheckStatus::Ok,
            message: "Navigation patterns compiled".to_string(),
        }),
        Err(e) => checks.push(DoctorCheck {
            name: "parser".to_string(),
            status: CheckStatus::Error,
            message: format!("Pattern compilation failed: {}", e),
        }),
    }

    if let Some(config_path) = config {
        if config_path.exists() {
            match fs::read_to_string(config_path) {
                Ok(content) => match RelayConfig::from_json(&content) {
                    Ok(config) => {
                        checks.push(DoctorCheck {
                            name: "config".to_string(),
                            status: CheckStatus::Ok,
                            message: format!(
                                "Configuration valid ({} categories)",
                                config.categories.len()
                            ),
                        });
                    }
                    Err(e) => {
                        checks.push(DoctorCheck {
                            name: "config".to_string(),
                            status: CheckStatus::Error,
                            message: format!("Invalid configuration: {}", e),
                        });
                    }
                },
                Err(e) => {
                    checks.push(DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Error,
                        message: format!("Cannot read configuration file: {}", e),
                    });
                }
            }
        } else {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Warning,
                message: "Configuration file does not exist".to_string(),
            });
        }
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (streaming mode ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        version: RIDELINK_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Ridelink Doctor Report");
        println!("======================");
        println!("Version: {}", report.version);
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
        Err(RidelinkCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn format_payload(
    payload: &WirePayload,
    format: &OutputFormat,
) -> Result<String, RidelinkCliError> {
    match format {
        OutputFormat::Ndjson => Ok(format!("{}\n", payload.json)),
        OutputFormat::JsonPretty => {
            let value: serde_json::Value = serde_json::from_str(&payload.json)?;
            Ok(format!("{}\n", serde_json::to_string_pretty(&value)?))
        }
    }
}

// Error types

#[derive(Debug)]
enum RidelinkCliError {
    Io(io::Error),
    Relay(RelayError),
    Json(serde_json::Error),
    NoCue,
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for RidelinkCliError {
    fn from(e: io::Error) -> Self {
        RidelinkCliError::Io(e)
    }
}

impl From<RelayError> for RidelinkCliError {
    fn from(e: RelayError) -> Self {
        RidelinkCliError::Relay(e)
    }
}

impl From<serde_json::Error> for RidelinkCliError {
    fn from(e: serde_json::Error) -> Self {
        RidelinkCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<RidelinkCliError> for CliError {
    fn from(e: RidelinkCliError) -> Self {
        match e {
            RidelinkCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            RidelinkCliError::Relay(e) => CliError {
                code: "RELAY_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'ridelink doctor' for diagnostics".to_string()),
            },
            RidelinkCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            RidelinkCliError::NoCue => CliError {
                code: "NO_CUE".to_string(),
                message: "No navigation cue found in text".to_string(),
                hint: Some("Expected a direction phrase or a distance".to_string()),
            },
            RidelinkCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            RidelinkCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Expected one feed event per line as JSON".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
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
