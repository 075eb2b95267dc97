use crate::calendar::{group_by_date, Calendar, Event};
use crate::date_range::DateRange;
use crate::document::DocumentStatus;
use crate::journal::Journal;
use crate::notes::EventNotes;
use crate::{AppConfig, Error, Result};
use std::fmt;
use std::path::PathBuf;

/// Outcome of a sync run.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Number of events fetched for the date range.
    pub events: usize,
    pub created: Vec<PathBuf>,
    pub updated: Vec<PathBuf>,
    pub unchanged: Vec<PathBuf>,
    /// Files that could not be updated, with the reason.
    pub failed: Vec<(PathBuf, Error)>,
}

impl SyncReport {
    /// Returns `true` if every file was processed successfully.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, path: PathBuf, result: Result<DocumentStatus>) {
        match result {
            Ok(DocumentStatus::Created) => {
                log::info!("created {}", path.display());
                self.created.push(path);
            }
            Ok(DocumentStatus::Updated) => {
                log::info!("updated {}", path.display());
                self.updated.push(path);
            }
            Ok(DocumentStatus::Unchanged) => {
                log::debug!("unchanged {}", path.display());
                self.unchanged.push(path);
            }
            Err(err) => {
                log::error!("failed to update {}: {err}", path.display());
                self.failed.push((path, err));
            }
        }
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} events, {} files created, {} updated, {} unchanged, {} failed",
            self.events,
            self.created.len(),
            self.updated.len(),
            self.unchanged.len(),
            self.failed.len()
        )
    }
}

/// Writes calendar events into the journal and event notes.
pub struct Syncer {
    calendar: Calendar,
    journal: Journal,
    notes: Option<EventNotes>,
}

impl Syncer {
    /// Creates a new `Syncer`.
    pub fn new(calendar: Calendar, journal: Journal, notes: Option<EventNotes>) -> Syncer {
        Syncer {
            calendar,
            journal,
            notes,
        }
    }

    /// Creates a new `Syncer` from configuration. Markers, paths and templates are validated
    /// before the calendar is contacted.
    pub async fn from_config(config: &AppConfig) -> Result<Syncer> {
        let tz = config.calendar.time_zone()?;
        let journal = Journal::new(&config.journal, tz)?;
        let notes = if config.notes.enabled {
            Some(EventNotes::new(&config.notes, tz)?)
        } else {
            None
        };

        let calendar = Calendar::from_config(&config.calendar).await?;

        Ok(Syncer::new(calendar, journal, notes))
    }

    /// Fetches the events of the date range and updates all affected files.
    ///
    /// Failing to fetch events is fatal and leaves every file untouched. A failure on one file is
    /// recorded in the report and does not prevent updating the others.
    pub async fn sync(&self, range: &DateRange, dry_run: bool) -> Result<SyncReport> {
        log::info!("fetching events from {}", range);

        let events = self.calendar.get_events(range).await?;

        log::info!("fetched {} events", events.len());

        let mut report = SyncReport {
            events: events.len(),
            ..SyncReport::default()
        };

        if let Some(notes) = &self.notes {
            for event in &events {
                report.record(notes.path_for(event), notes.update(event, dry_run));
            }
        }

        self.update_journal(range, events, dry_run, &mut report);

        Ok(report)
    }

    fn update_journal(
        &self,
        range: &DateRange,
        events: Vec<Event>,
        dry_run: bool,
        report: &mut SyncReport,
    ) {
        let events_by_date = group_by_date(events, &self.calendar.time_zone());

        for date in range.days() {
            let events = events_by_date
                .get(&date)
                .map(Vec::as_slice)
                .unwrap_or_default();

            match self.journal.update_day(date, events, dry_run) {
                Ok(Some(status)) => report.record(self.journal.path_for(date), Ok(status)),
                Ok(None) => {}
                Err(err) => report.record(self.journal.path_for(date), Err(err)),
            }
        }
    }
}
