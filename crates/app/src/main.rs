mod terminal;
mod time_fmt;
mod view;

use std::fmt;

use assess_core::model::RecordId;
use services::{
    ApiConfig, AppServices, AppServicesError, Clock, ConfigError, SessionSettings, TimerPolicy,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::terminal::TerminalInput;

const DEFAULT_DB_URL: &str = "sqlite://assess.sqlite3";

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidRecordId { raw: String },
    Config(ConfigError),
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidRecordId { raw } => write!(f, "invalid record id: {raw}"),
            ArgsError::Config(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<ConfigError> for ArgsError {
    fn from(err: ConfigError) -> Self {
        ArgsError::Config(err)
    }
}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  app [run]        [options]   take the assessment (resumes saved progress)");
    eprintln!("  app history      [options]   list previous results");
    eprintln!("  app show <id>    [options]   show one previous result");
    eprintln!("  app forget-id    [options]   clear this device's identifier, profile and progress");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>        local store (default {DEFAULT_DB_URL})");
    eprintln!("  --api <url>              assessment service base url");
    eprintln!("  --timer <reset|deduct>   countdown policy when resuming");
    eprintln!("  -v, --verbose            debug logging");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  ASSESS_DB_URL, ASSESS_API_BASE_URL, ASSESS_API_TIMEOUT_SECS,");
    eprintln!("  ASSESS_TIMER_POLICY, ASSESS_TIME_LIMIT_MINUTES, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Run,
    History,
    Show(RecordId),
    ForgetId,
}

struct Args {
    command: Command,
    db_url: String,
    api: ApiConfig,
    settings: SessionSettings,
    verbose: bool,
}

impl Args {
    fn parse(argv: Vec<String>) -> Result<Option<Self>, ArgsError> {
        let mut iter = argv.into_iter().peekable();

        let command = match iter.peek().map(String::as_str) {
            None => Command::Run,
            Some(first) if first.starts_with('-') => Command::Run,
            Some(_) => {
                let name = iter.next().unwrap_or_default();
                match name.as_str() {
                    "run" => Command::Run,
                    "history" => Command::History,
                    "forget-id" => Command::ForgetId,
                    "show" => {
                        let raw = require_value(&mut iter, "show")?;
                        let id = raw
                            .parse::<RecordId>()
                            .map_err(|_| ArgsError::InvalidRecordId { raw: raw.clone() })?;
                        Command::Show(id)
                    }
                    _ => return Err(ArgsError::UnknownArg(name)),
                }
            }
        };

        let mut db_url = std::env::var("ASSESS_DB_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map_or_else(|| DEFAULT_DB_URL.into(), normalize_sqlite_url);
        let mut api = ApiConfig::from_env()?;
        let mut settings = SessionSettings::from_env()?;
        let mut verbose = false;

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut iter, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--api" => {
                    let value = require_value(&mut iter, "--api")?;
                    api = ApiConfig::new(&value)?.with_timeout(api.timeout);
                }
                "--timer" => {
                    let value = require_value(&mut iter, "--timer")?;
                    settings.timer_policy = value.parse::<TimerPolicy>()?;
                }
                "--verbose" | "-v" => verbose = true,
                "--help" | "-h" => return Ok(None),
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Some(Self {
            command,
            db_url,
            api,
            settings,
            verbose,
        }))
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

/// Logs go to stderr so they do not interleave with the questionnaire on stdout.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let Some(args) = Args::parse(argv).inspect_err(|_| print_usage())? else {
        print_usage();
        return Ok(());
    };
    init_tracing(args.verbose);

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_file(&args.db_url)?;
    match args.command {
        // Never resolves an identifier, so a fresh install stays empty.
        Command::ForgetId => {
            AppServices::clear_sqlite(&args.db_url).await?;
            println!("Identifier, remembered profile and saved progress cleared.");
            Ok(())
        }
        Command::Run => {
            let services = open_services(&args).await?;
            let input = TerminalInput::spawn();
            terminal::run_assessment(&services, &input).await
        }
        Command::History => terminal::show_history(&open_services(&args).await?).await,
        Command::Show(id) => terminal::show_record(&open_services(&args).await?, id).await,
    }
}

async fn open_services(args: &Args) -> Result<AppServices, AppServicesError> {
    let services =
        AppServices::new_sqlite(&args.db_url, &args.api, Clock::default_clock(), args.settings)
            .await?;
    debug!(client_id = %services.client_id(), db = %args.db_url, "services ready");
    Ok(services)
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
