use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use clap::Parser;
use dotenv::dotenv;
use gcal2md::date_range::{DateRange, Period};
use gcal2md::sync::Syncer;
use gcal2md::AppConfig;
use std::path::PathBuf;
use std::process::ExitCode;

/// Sync Google Calendar events into Markdown daily notes.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Period to sync, relative to today
    #[arg(value_enum, default_value_t = Period::Today)]
    period: Period,

    /// First day to sync (YYYY-MM-DD), overrides the period
    #[arg(long, value_name = "DATE", requires = "end")]
    start: Option<NaiveDate>,

    /// Last day to sync (YYYY-MM-DD), overrides the period
    #[arg(long, value_name = "DATE", requires = "start")]
    end: Option<NaiveDate>,

    /// Path to an additional config file
    #[arg(long, value_name = "FILE", env = "G2M_CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Show which files would change without writing them
    #[arg(long)]
    dry_run: bool,
}

impl Cli {
    /// Resolves the date range to sync.
    fn date_range(&self, today: NaiveDate) -> gcal2md::Result<DateRange> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => DateRange::new(start, end),
            _ => Ok(self.period.resolve(today)),
        }
    }
}

/// The current day in the time zone events are assigned to days in.
fn today(now: DateTime<Utc>, tz: &Tz) -> NaiveDate {
    now.with_timezone(tz).date_naive()
}

async fn run(cli: Cli) -> gcal2md::Result<bool> {
    let config = AppConfig::load(cli.config.as_deref())?;
    let tz = config.calendar.time_zone()?;
    let range = cli.date_range(today(Utc::now(), &tz))?;

    log::debug!("using time zone {}", tz);
    let syncer = Syncer::from_config(&config).await?;

    if cli.dry_run {
        log::info!("dry run enabled; no files will be written");
    }

    let report = syncer.sync(&range, cli.dry_run).await?;

    log::info!("sync completed for {}: {}", range, report);

    Ok(report.is_success())
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    dotenv().ok();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
