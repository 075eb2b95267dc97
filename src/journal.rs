//! Daily notes listing the events of each day in a dedicated section.

use crate::calendar::templating::{Renderer, DAY_TEMPLATE, ENTRY_TEMPLATE};
use crate::calendar::Event;
use crate::document::{self, DocumentStatus};
use crate::section::{self, Marker};
use crate::{Error, JournalConfig, Result};
use chrono::format::{Item, StrftimeItems};
use chrono::NaiveDate;
use chrono_tz::Tz;
use std::fs;
use std::path::{Path, PathBuf};

/// A directory of daily notes.
pub struct Journal {
    dir: PathBuf,
    path_format: String,
    marker: Marker,
    renderer: Renderer,
    has_note_template: bool,
}

impl Journal {
    /// Creates a journal from configuration. Fails on an invalid marker, path format or
    /// template, before any note is touched.
    pub fn new(config: &JournalConfig, tz: Tz) -> Result<Journal> {
        let marker = Marker::new(config.marker.as_str())?;
        validate_path_format(&config.path_format)?;

        let mut renderer = Renderer::new(tz);
        renderer.add_template(ENTRY_TEMPLATE, config.entry_template.clone())?;

        let has_note_template = match &config.note_template {
            Some(path) => {
                let source = fs::read_to_string(path)?;
                renderer.add_template(DAY_TEMPLATE, source)?;
                true
            }
            None => false,
        };

        Ok(Journal {
            dir: config.dir.clone(),
            path_format: config.path_format.clone(),
            marker,
            renderer,
            has_note_template,
        })
    }

    /// The marker of the section holding the day's events.
    pub fn marker(&self) -> &Marker {
        &self.marker
    }

    /// Path of the daily note for `date`.
    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(date.format(&self.path_format).to_string())
    }

    /// Renders the events as section entries, keeping their order.
    pub fn render_entries(&self, events: &[Event]) -> Result<Vec<String>> {
        events
            .iter()
            .map(|event| self.renderer.render_entry(event))
            .collect()
    }

    /// Writes the day's events into its daily note.
    ///
    /// Returns `None` if there was nothing to do: the day has no events and either has no note or
    /// its note has no section to clear.
    pub fn update_day(
        &self,
        date: NaiveDate,
        events: &[Event],
        dry_run: bool,
    ) -> Result<Option<DocumentStatus>> {
        let path = self.path_for(date);

        if events.is_empty() && !path.exists() {
            return Ok(None);
        }

        let entries = self.render_entries(events)?;

        let status = document::update_document(&path, dry_run, |current| match current {
            Some(text) if entries.is_empty() && !section::contains(text, &self.marker) => {
                Ok(text.to_owned())
            }
            Some(text) => Ok(section::merge(text, &self.marker, &entries)),
            None => {
                let seed = self.new_note(date)?;
                Ok(section::merge(&seed, &self.marker, &entries))
            }
        })?;

        match status {
            DocumentStatus::Unchanged if events.is_empty() => Ok(None),
            status => Ok(Some(status)),
        }
    }

    /// Text of a daily note that does not exist yet. Without a template it is just the marker
    /// line, so new notes end with a newline.
    fn new_note(&self, date: NaiveDate) -> Result<String> {
        if self.has_note_template {
            self.renderer.render_day(DAY_TEMPLATE, date)
        } else {
            Ok(format!("{}\n", self.marker))
        }
    }

    /// The journal directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Rejects strftime formats chrono cannot render.
fn validate_path_format(path_format: &str) -> Result<()> {
    let invalid = StrftimeItems::new(path_format).any(|item| matches!(item, Item::Error));

    if invalid || path_format.trim().is_empty() {
        return Err(Error::InvalidPathFormat(path_format.to_owned()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::templating::DEFAULT_ENTRY_TEMPLATE;
    use crate::calendar::tests::event;

    macro_rules! date {
        ($y:expr, $m:expr, $d:expr) => {
            NaiveDate::from_ymd_opt($y, $m, $d).unwrap()
        };
    }

    fn config(dir: &Path) -> JournalConfig {
        JournalConfig {
            dir: dir.to_owned(),
            path_format: "%Y/%Y-%m/%Y-%m-%d.md".into(),
            marker: "## Activities".into(),
            entry_template: DEFAULT_ENTRY_TEMPLATE.into(),
            note_template: None,
        }
    }

    fn journal(config: &JournalConfig) -> Journal {
        Journal::new(config, chrono_tz::Europe::Berlin).unwrap()
    }

    #[test]
    fn rejects_invalid_configuration() {
        let dir = tempfile::tempdir().unwrap();

        let mut bad_marker = config(dir.path());
        bad_marker.marker = "".into();
        assert!(matches!(
            Journal::new(&bad_marker, chrono_tz::UTC),
            Err(Error::Marker(_))
        ));

        let mut bad_format = config(dir.path());
        bad_format.path_format = "%Q.md".into();
        assert!(matches!(
            Journal::new(&bad_format, chrono_tz::UTC),
            Err(Error::InvalidPathFormat(_))
        ));

        let mut bad_template = config(dir.path());
        bad_template.entry_template = "{{ title".into();
        assert!(matches!(
            Journal::new(&bad_template, chrono_tz::UTC),
            Err(Error::Template(_))
        ));

        let mut missing_template = config(dir.path());
        missing_template.note_template = Some(dir.path().join("missing.md"));
        assert!(matches!(
            Journal::new(&missing_template, chrono_tz::UTC),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn daily_note_paths() {
        let journal = journal(&config(Path::new("vault/journals")));

        assert_eq!(
            journal.path_for(date!(2024, 1, 3)),
            PathBuf::from("vault/journals/2024/2024-01/2024-01-03.md")
        );
    }

    #[test]
    fn creates_and_updates_daily_notes() {
        let dir = tempfile::tempdir().unwrap();
        let journal = journal(&config(dir.path()));
        let day = date!(2024, 1, 3);
        let path = journal.path_for(day);

        let events = [
            event("Standup", "2024-01-03T09:00:00", Some("2024-01-03T09:15:00")),
            event("Lunch", "2024-01-03T12:00:00", Some("2024-01-03T13:00:00")),
        ];

        assert_eq!(
            journal.update_day(day, &events, false).unwrap(),
            Some(DocumentStatus::Created)
        );
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "## Activities\n- 09:00 - 09:15 Standup\n- 12:00 - 13:00 Lunch\n"
        );
        // Syncing again leaves the new note as it is.
        assert_eq!(
            journal.update_day(day, &events, false).unwrap(),
            Some(DocumentStatus::Unchanged)
        );

        // The user adds their own notes.
        let edited = "# Wednesday\n\n## Activities\n- 09:00 - 09:15 Standup\n- 12:00 - 13:00 Lunch\n\n## Goal\n- [ ] write\n";
        fs::write(&path, edited).unwrap();

        assert_eq!(
            journal.update_day(day, &events, false).unwrap(),
            Some(DocumentStatus::Unchanged)
        );

        assert_eq!(
            journal.update_day(day, &events[1..], false).unwrap(),
            Some(DocumentStatus::Updated)
        );
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "# Wednesday\n\n## Activities\n- 12:00 - 13:00 Lunch\n\n## Goal\n- [ ] write\n"
        );
    }

    #[test]
    fn days_without_events() {
        let dir = tempfile::tempdir().unwrap();
        let journal = journal(&config(dir.path()));
        let day = date!(2024, 1, 3);
        let path = journal.path_for(day);

        // No note is created for an empty day.
        assert_eq!(journal.update_day(day, &[], false).unwrap(), None);
        assert!(!path.exists());

        // A note without the section is left alone.
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "# Wednesday\n").unwrap();
        assert_eq!(journal.update_day(day, &[], false).unwrap(), None);
        assert_eq!(fs::read_to_string(&path).unwrap(), "# Wednesday\n");

        // Stale entries of a cancelled event are cleared.
        fs::write(&path, "# Wednesday\n## Activities\n- 09:00 Gone\n").unwrap();
        assert_eq!(
            journal.update_day(day, &[], false).unwrap(),
            Some(DocumentStatus::Updated)
        );
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "# Wednesday\n## Activities\n"
        );
    }

    #[test]
    fn new_notes_from_template() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("daily.md");
        fs::write(
            &template,
            "# {{ formatted_date }}\n\n## Activities\n\n## Goal\n",
        )
        .unwrap();

        let mut config = config(dir.path());
        config.note_template = Some(template);
        let journal = journal(&config);
        let day = date!(2024, 1, 3);

        journal
            .update_day(
                day,
                &[event("Standup", "2024-01-03T09:00:00", None)],
                false,
            )
            .unwrap();

        assert_eq!(
            fs::read_to_string(journal.path_for(day)).unwrap(),
            "# Wednesday, 03 January 2024\n\n## Activities\n- 09:00 Standup\n\n## Goal\n"
        );
    }
}
