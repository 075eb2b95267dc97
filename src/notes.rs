//! One note per event, with the event's details kept in the note's YAML frontmatter.
//!
//! The frontmatter keys listed in [`OWNED_KEYS`] are rewritten on every sync. Other keys and the
//! note body belong to the user and are preserved.

use crate::calendar::templating::{Renderer, NOTE_TEMPLATE};
use crate::calendar::Event;
use crate::document::{self, DocumentStatus};
use crate::{NotesConfig, Result};
use chrono_tz::Tz;
use serde_yaml::{Mapping, Value};
use std::path::PathBuf;

/// Frontmatter keys written by the sync.
pub const OWNED_KEYS: [&str; 7] = [
    "title",
    "start-date",
    "end-date",
    "duration-minutes",
    "all-day",
    "calendar",
    "location",
];

const FRONTMATTER_DELIMITER: &str = "---";

/// A directory of event notes.
pub struct EventNotes {
    dir: PathBuf,
    renderer: Renderer,
    tz: Tz,
}

impl EventNotes {
    /// Creates the event notes from configuration, compiling the body template.
    pub fn new(config: &NotesConfig, tz: Tz) -> Result<EventNotes> {
        let mut renderer = Renderer::new(tz);
        renderer.add_template(NOTE_TEMPLATE, config.body_template.clone())?;

        Ok(EventNotes {
            dir: config.dir.clone(),
            renderer,
            tz,
        })
    }

    /// Path of the note for an event.
    pub fn path_for(&self, event: &Event) -> PathBuf {
        self.dir.join(format!("{}.md", file_stem(&event.id)))
    }

    /// Creates the event's note or refreshes the frontmatter of an existing one.
    pub fn update(&self, event: &Event, dry_run: bool) -> Result<DocumentStatus> {
        let path = self.path_for(event);

        document::update_document(&path, dry_run, |current| match current {
            Some(text) => update_frontmatter(text, self.frontmatter(event)),
            None => {
                let body = self.renderer.render_event(NOTE_TEMPLATE, event)?;
                with_frontmatter(&Mapping::new(), self.frontmatter(event), &body)
            }
        })
    }

    /// The frontmatter fields describing an event.
    fn frontmatter(&self, event: &Event) -> Vec<(&'static str, Value)> {
        let format = |date: chrono::DateTime<chrono::FixedOffset>| {
            Value::String(
                date.with_timezone(&self.tz)
                    .format("%Y-%m-%dT%H:%M")
                    .to_string(),
            )
        };
        let optional = |value: &Option<String>| value.clone().map_or(Value::Null, Value::String);

        vec![
            ("title", Value::String(event.title.clone())),
            ("start-date", format(event.start_date)),
            ("end-date", event.end_date.map_or(Value::Null, format)),
            (
                "duration-minutes",
                event
                    .duration()
                    .map_or(Value::Null, |duration| duration.num_minutes().into()),
            ),
            ("all-day", Value::Bool(event.all_day)),
            ("calendar", optional(&event.calendar)),
            ("location", optional(&event.location)),
        ]
    }
}

/// Turns an event ID into a safe file name.
fn file_stem(id: &str) -> String {
    let stem: String = id
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => c,
            _ => '_',
        })
        .collect();

    if stem.is_empty() {
        "event".to_owned()
    } else {
        stem
    }
}

/// Splits a document into its frontmatter and body.
///
/// Returns `None` if the document does not start with a `---` delimited frontmatter block.
pub fn split_frontmatter(text: &str) -> Option<(&str, &str)> {
    let mut offset = 0;
    let mut lines = text.split_inclusive('\n');

    let first = lines.next()?;
    if first.trim_end() != FRONTMATTER_DELIMITER {
        return None;
    }
    offset += first.len();
    let yaml_start = offset;

    for line in lines {
        if line.trim_end() == FRONTMATTER_DELIMITER {
            return Some((&text[yaml_start..offset], &text[offset + line.len()..]));
        }
        offset += line.len();
    }

    None
}

/// Replaces the owned frontmatter fields of a document, keeping all other fields and the body.
fn update_frontmatter(text: &str, fields: Vec<(&'static str, Value)>) -> Result<String> {
    match split_frontmatter(text) {
        Some((yaml, body)) => {
            let existing = if yaml.trim().is_empty() {
                Mapping::new()
            } else {
                serde_yaml::from_str(yaml)?
            };
            with_frontmatter(&existing, fields, body)
        }
        None => with_frontmatter(&Mapping::new(), fields, text),
    }
}

fn with_frontmatter(
    existing: &Mapping,
    fields: Vec<(&'static str, Value)>,
    body: &str,
) -> Result<String> {
    let mut frontmatter = existing.clone();

    for (key, value) in fields {
        frontmatter.insert(Value::String(key.to_owned()), value);
    }

    let yaml = serde_yaml::to_string(&frontmatter)?;

    Ok(format!(
        "{FRONTMATTER_DELIMITER}\n{yaml}{FRONTMATTER_DELIMITER}\n{body}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::tests::event;
    use std::fs;

    fn notes(dir: &std::path::Path) -> EventNotes {
        EventNotes::new(
            &NotesConfig {
                enabled: true,
                dir: dir.to_owned(),
                body_template: "# {{ title }}\n\n## Notes\n".into(),
            },
            chrono_tz::Europe::Berlin,
        )
        .unwrap()
    }

    fn frontmatter_of(text: &str) -> Mapping {
        let (yaml, _) = split_frontmatter(text).unwrap();
        serde_yaml::from_str(yaml).unwrap()
    }

    fn get<'a>(mapping: &'a Mapping, key: &str) -> &'a Value {
        mapping.get(&Value::String(key.to_owned())).unwrap()
    }

    #[test]
    fn split() {
        assert_eq!(
            split_frontmatter("---\na: 1\n---\nbody\n"),
            Some(("a: 1\n", "body\n"))
        );
        assert_eq!(split_frontmatter("---\n---\n"), Some(("", "")));
        assert_eq!(
            split_frontmatter("---\r\na: 1\r\n---\r\nbody"),
            Some(("a: 1\r\n", "body"))
        );
        assert_eq!(split_frontmatter("body\n---\n"), None);
        assert_eq!(split_frontmatter("---\nnever closed\n"), None);
    }

    #[test]
    fn file_stems() {
        assert_eq!(file_stem("abc_123-x"), "abc_123-x");
        assert_eq!(file_stem("a/b\\c:d"), "a_b_c_d");
        assert_eq!(file_stem(""), "event");
    }

    #[test]
    fn creates_note() {
        let dir = tempfile::tempdir().unwrap();
        let notes = notes(dir.path());

        let mut standup = event("Standup", "2024-01-03T09:00:00", Some("2024-01-03T09:15:00"));
        standup.calendar = Some("Work".into());

        assert_eq!(
            notes.update(&standup, false).unwrap(),
            DocumentStatus::Created
        );

        let text = fs::read_to_string(dir.path().join("standup.md")).unwrap();
        let (_, body) = split_frontmatter(&text).unwrap();
        assert_eq!(body, "# Standup\n\n## Notes\n");

        let frontmatter = frontmatter_of(&text);
        assert_eq!(get(&frontmatter, "title"), &Value::from("Standup"));
        assert_eq!(get(&frontmatter, "start-date"), &Value::from("2024-01-03T09:00"));
        assert_eq!(get(&frontmatter, "end-date"), &Value::from("2024-01-03T09:15"));
        assert_eq!(get(&frontmatter, "duration-minutes"), &Value::from(15));
        assert_eq!(get(&frontmatter, "all-day"), &Value::from(false));
        assert_eq!(get(&frontmatter, "calendar"), &Value::from("Work"));
        assert_eq!(get(&frontmatter, "location"), &Value::Null);

        // Syncing the same event again changes nothing.
        assert_eq!(
            notes.update(&standup, false).unwrap(),
            DocumentStatus::Unchanged
        );
    }

    #[test]
    fn refreshes_frontmatter_and_keeps_user_content() {
        let dir = tempfile::tempdir().unwrap();
        let notes = notes(dir.path());
        let path = dir.path().join("standup.md");

        fs::write(
            &path,
            "---\ntitle: Old title\npersona: engineer\n---\n# Standup\n\nDiscussed the release.\n",
        )
        .unwrap();

        let standup = event("Standup", "2024-01-03T10:00:00", Some("2024-01-03T10:30:00"));

        assert_eq!(
            notes.update(&standup, false).unwrap(),
            DocumentStatus::Updated
        );

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.ends_with("---\n# Standup\n\nDiscussed the release.\n"));

        let frontmatter = frontmatter_of(&text);
        assert_eq!(get(&frontmatter, "title"), &Value::from("Standup"));
        assert_eq!(get(&frontmatter, "persona"), &Value::from("engineer"));
        assert_eq!(get(&frontmatter, "duration-minutes"), &Value::from(30));

        // User keys keep their position in front of newly added ones.
        let keys: Vec<_> = frontmatter.keys().filter_map(Value::as_str).collect();
        assert_eq!(&keys[..2], &["title", "persona"]);
    }

    #[test]
    fn adds_frontmatter_to_plain_notes() {
        let dir = tempfile::tempdir().unwrap();
        let notes = notes(dir.path());
        let path = dir.path().join("standup.md");

        fs::write(&path, "just some text\n").unwrap();

        notes
            .update(&event("Standup", "2024-01-03T10:00:00", None), false)
            .unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("---\n"));
        assert!(text.ends_with("---\njust some text\n"));
        assert_eq!(get(&frontmatter_of(&text), "end-date"), &Value::Null);
    }

    #[test]
    fn invalid_frontmatter_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let notes = notes(dir.path());
        let path = dir.path().join("standup.md");

        fs::write(&path, "---\n- a list\n---\nbody\n").unwrap();

        assert!(notes
            .update(&event("Standup", "2024-01-03T10:00:00", None), false)
            .is_err());
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "---\n- a list\n---\nbody\n"
        );
    }
}
