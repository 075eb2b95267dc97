use super::Event;
use crate::Result;
use chrono::NaiveDate;
use chrono_tz::Tz;
use minijinja::value::Value;
use minijinja::{context, Environment};

/// Template rendering one journal entry per event.
pub const ENTRY_TEMPLATE: &str = "entry";
/// Template seeding a new daily note.
pub const DAY_TEMPLATE: &str = "day";
/// Template for the body of a new event note.
pub const NOTE_TEMPLATE: &str = "note";

/// The entry template used if none is configured.
pub const DEFAULT_ENTRY_TEMPLATE: &str =
    "{% if time %}- {{ time }} {{ title }}{% else %}- {{ title }}{% endif %}";

/// Renders events and days through minijinja templates.
///
/// Events expose a fixed set of fields to templates:
///
/// | field              | example                     |
/// |--------------------|-----------------------------|
/// | `id`               | `3q9v0a2k8n`                |
/// | `title`            | `Standup`                   |
/// | `calendar`         | `Work`                      |
/// | `date`             | `2024-01-03`                |
/// | `start_time`       | `09:00`                     |
/// | `end_time`         | `09:15`                     |
/// | `time`             | `09:00 - 09:15`             |
/// | `all_day`          | `false`                     |
/// | `duration_minutes` | `15`                        |
/// | `location`         | `Office`                    |
/// | `description`      | `Daily sync`                |
///
/// Times are formatted in the renderer's time zone. `start_time`, `end_time` and `time` are
/// empty for all-day events.
pub struct Renderer {
    env: Environment<'static>,
    tz: Tz,
}

impl Renderer {
    /// Creates a renderer without templates.
    pub fn new(tz: Tz) -> Renderer {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_keep_trailing_newline(true);

        Renderer { env, tz }
    }

    /// Compiles and registers a template under `name`.
    pub fn add_template(&mut self, name: &'static str, source: String) -> Result<()> {
        self.env.add_template_owned(name, source)?;
        Ok(())
    }

    /// Renders an event as a single entry, without trailing whitespace.
    pub fn render_entry(&self, event: &Event) -> Result<String> {
        let entry = self.render_event(ENTRY_TEMPLATE, event)?;
        Ok(entry.trim_end().to_owned())
    }

    /// Renders an event with the template registered under `name`.
    pub fn render_event(&self, name: &str, event: &Event) -> Result<String> {
        let rendered = self
            .env
            .get_template(name)?
            .render(self.event_context(event))?;
        Ok(rendered)
    }

    /// Renders the template registered under `name` for a day.
    pub fn render_day(&self, name: &str, date: NaiveDate) -> Result<String> {
        let ctx = context! {
            date => date.format("%Y-%m-%d").to_string(),
            formatted_date => date.format("%A, %d %B %Y").to_string(),
            year => date.format("%Y").to_string(),
            month => date.format("%Y-%m").to_string(),
        };

        let rendered = self.env.get_template(name)?.render(ctx)?;
        Ok(rendered)
    }

    /// Builds the template context for an event.
    pub fn event_context(&self, event: &Event) -> Value {
        let start = event.start_date.with_timezone(&self.tz);
        let end = event.end_date.map(|end_date| end_date.with_timezone(&self.tz));

        let (start_time, end_time, time) = if event.all_day {
            (String::new(), String::new(), String::new())
        } else {
            let start_time = start.format("%H:%M").to_string();

            match end {
                Some(end) => {
                    let end_time = end.format("%H:%M").to_string();
                    let time = if start.date_naive() == end.date_naive() {
                        // Single-day event, just format the end time.
                        format!("{start_time} - {end_time}")
                    } else {
                        // Multi-day event, format end date and time.
                        format!("{start_time} - {}", end.format("%Y-%m-%d %H:%M"))
                    };
                    (start_time, end_time, time)
                }
                None => (start_time.clone(), String::new(), start_time),
            }
        };

        context! {
            id => event.id,
            title => event.title,
            calendar => event.calendar.as_deref().unwrap_or_default(),
            date => start.format("%Y-%m-%d").to_string(),
            start_time => start_time,
            end_time => end_time,
            time => time,
            all_day => event.all_day,
            duration_minutes => event.duration().map(|duration| duration.num_minutes()),
            location => event.location.as_deref().unwrap_or_default(),
            description => event.description.as_deref().unwrap_or_default(),
        }
    }
}
