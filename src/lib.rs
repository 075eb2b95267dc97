use chrono::NaiveDate;
use chrono_tz::Tz;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::env;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod calendar;
pub mod date_range;
pub mod document;
pub mod journal;
pub mod notes;
pub mod section;
pub mod sync;

/// Built-in configuration defaults.
const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Result type used throughout this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The error type returned by all fallible operations within this crate.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Google Calendar error: {0}")]
    GoogleCalendar(#[from] calendar::google::ClientError),
    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),
    #[error("frontmatter error: {0}")]
    Frontmatter(#[from] serde_yaml::Error),
    #[error("invalid section marker: {0}")]
    Marker(#[from] section::MarkerError),
    #[error("invalid date range: {start} is after {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },
    #[error("invalid path format `{0}`")]
    InvalidPathFormat(String),
    #[error("unknown time zone `{0}`")]
    UnknownTimeZone(String),
}

/// Calendar configuration.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct CalendarConfig {
    /// Source for calendar events.
    pub event_source: calendar::EventSourceKind,
    /// Google calendar IDs to read. Falls back to `GOOGLE_CALENDAR_ID` if empty.
    #[serde(default)]
    pub calendar_ids: Vec<String>,
    /// IANA name of the time zone used to assign events to days, e.g. `Europe/Berlin`.
    /// Defaults to the system time zone.
    #[serde(default)]
    pub timezone: Option<String>,
    /// Page size for event queries.
    pub max_results: u32,
    /// Events used by the static event source.
    #[serde(default)]
    pub events: Vec<calendar::Event>,
}

impl CalendarConfig {
    /// Parses the configured time zone, or detects the system time zone if none is configured.
    pub fn time_zone(&self) -> Result<Tz> {
        match &self.timezone {
            Some(timezone) => parse_time_zone(timezone),
            None => Ok(system_time_zone()),
        }
    }
}

fn parse_time_zone(name: &str) -> Result<Tz> {
    name.parse()
        .map_err(|_| Error::UnknownTimeZone(name.to_owned()))
}

/// The time zone of the host. Falls back to UTC if it cannot be determined.
fn system_time_zone() -> Tz {
    let tz = iana_time_zone::get_timezone()
        .map_err(|err| format!("failed to detect system time zone: {err}"))
        .and_then(|name| parse_time_zone(&name).map_err(|err| err.to_string()));

    tz.unwrap_or_else(|err| {
        log::warn!("{err}, using UTC");
        Tz::UTC
    })
}

/// Daily note configuration.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct JournalConfig {
    /// Directory containing the daily notes.
    pub dir: PathBuf,
    /// strftime format of a daily note's path relative to `dir`.
    pub path_format: String,
    /// The line marking the section that lists the day's events.
    pub marker: String,
    /// Template rendering one event as an entry of the section.
    pub entry_template: String,
    /// Optional template file used for daily notes that do not exist yet.
    pub note_template: Option<PathBuf>,
}

/// Event note configuration.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct NotesConfig {
    /// Whether to maintain one note per event.
    pub enabled: bool,
    /// Directory containing the event notes.
    pub dir: PathBuf,
    /// Template for the body of new event notes.
    pub body_template: String,
}

/// Global application configuration.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct AppConfig {
    /// Calendar configuration section.
    pub calendar: CalendarConfig,
    /// Daily note configuration section.
    pub journal: JournalConfig,
    /// Event note configuration section.
    pub notes: NotesConfig,
}

impl AppConfig {
    /// Loads the application configuration from the built-in defaults, files in the `config/`
    /// directory, an optional explicit file and environment variables.
    pub fn load(config_file: Option<&Path>) -> Result<AppConfig> {
        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "development".into());

        log::debug!("loading configuration using {} environment", app_env);

        let mut builder = Config::builder()
            // Built-in defaults from `config/default.toml`.
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            // Optional environment specific config overrides, e.g. `config/production.toml`.
            .add_source(File::with_name(&format!("config/{}", app_env)).required(false))
            // Optional local config overrides from `config/local.toml` (on .gitignore).
            .add_source(File::with_name("config/local").required(false));

        if let Some(config_file) = config_file {
            builder = builder.add_source(File::from(config_file).required(true));
        }

        let config = builder
            // Config from environment variables prefixed with `G2M_`.
            .add_source(
                Environment::with_prefix("G2M")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        log::debug!("loaded configuration: {:?}", config);

        Ok(config)
    }
}
