pub mod google;
pub mod templating;

use crate::date_range::DateRange;
use crate::{CalendarConfig, Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use google::GoogleCalendarClient;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Represents a single calendar event.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Identifier of the event, unique within its calendar.
    pub id: String,
    /// Display name of the calendar the event belongs to.
    #[serde(default)]
    pub calendar: Option<String>,
    /// The event title.
    pub title: String,
    /// The start date of the event.
    pub start_date: DateTime<FixedOffset>,
    /// The end date of the event, if any.
    #[serde(default)]
    pub end_date: Option<DateTime<FixedOffset>>,
    /// Whether the event lasts whole days rather than having a start and end time.
    #[serde(default)]
    pub all_day: bool,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Event {
    /// The day on which the event starts in the given time zone.
    pub fn start_day(&self, tz: &Tz) -> NaiveDate {
        self.start_date.with_timezone(tz).date_naive()
    }

    /// Duration of the event, if it has an end.
    pub fn duration(&self) -> Option<Duration> {
        self.end_date.map(|end_date| end_date - self.start_date)
    }

    /// Converts an event returned by the Google Calendar API.
    ///
    /// Returns `None` for cancelled events and events without a usable start.
    fn from_google(ev: google::models::Event, calendar: Option<&str>, tz: &Tz) -> Option<Event> {
        if ev.is_cancelled() {
            log::debug!("skipping cancelled event `{}`", ev.id);
            return None;
        }

        let Some(start) = to_datetime(&ev.start, tz) else {
            log::warn!("skipping event `{}` without a start date", ev.id);
            return None;
        };
        let end_date = ev.end.as_ref().and_then(|end| to_datetime(end, tz));

        Some(Event {
            id: ev.id,
            calendar: calendar.map(ToOwned::to_owned),
            title: ev.summary.unwrap_or_default(),
            start_date: start,
            end_date,
            all_day: ev.start.date_time.is_none(),
            location: ev.location.filter(|location| !location.is_empty()),
            description: ev.description.filter(|description| !description.is_empty()),
        })
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.title.fmt(f)
    }
}

/// Converts a timepoint into a date and time. All-day timepoints start at local midnight.
fn to_datetime(timepoint: &google::models::Timepoint, tz: &Tz) -> Option<DateTime<FixedOffset>> {
    match (timepoint.date_time, timepoint.date) {
        (Some(date_time), _) => Some(date_time),
        (None, Some(date)) => local_midnight(date, tz).map(|dt| dt.fixed_offset()),
        (None, None) => None,
    }
}

/// The first instant of `date` in the given time zone.
pub(crate) fn local_midnight(date: NaiveDate, tz: &Tz) -> Option<DateTime<Tz>> {
    let midnight = date.and_hms_opt(0, 0, 0)?;
    // Some zones skip midnight on DST changes; the earliest valid instant is close enough then.
    tz.from_local_datetime(&midnight)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(midnight + Duration::hours(1))).earliest())
}

/// Type alias for calendar events grouped by the day they start on.
pub type EventsByDate = IndexMap<NaiveDate, Vec<Event>>;

/// Represents sources of calendar events.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum EventSourceKind {
    /// Use static events from the application configuration.
    Static,
    /// Load events from Google Calendar.
    GoogleCalendar,
}

/// Trait that needs to be implemented by a source of calendar events.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Fetches events overlapping the date range from the source.
    async fn fetch_events(&self, range: &DateRange) -> Result<Vec<Event>>;
}

/// An `EventSource` that returns events from a static list.
pub struct StaticEventSource {
    events: Vec<Event>,
}

impl StaticEventSource {
    /// Creates a new `StaticEventSource` from an iterator.
    pub fn new<I>(iter: I) -> StaticEventSource
    where
        I: IntoIterator,
        I::Item: Into<Event>,
    {
        StaticEventSource {
            events: iter.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl EventSource for StaticEventSource {
    async fn fetch_events(&self, _range: &DateRange) -> Result<Vec<Event>> {
        Ok(self.events.clone())
    }
}

/// An `EventSource` reading one or more Google calendars.
#[derive(Debug)]
pub struct GoogleCalendarEventSource {
    client: GoogleCalendarClient,
    calendar_ids: Vec<String>,
    tz: Tz,
    page_size: u32,
}

impl GoogleCalendarEventSource {
    /// Creates a source for the configured calendars. Falls back to the `GOOGLE_CALENDAR_ID`
    /// environment variable if no calendar is configured.
    pub async fn new(config: &CalendarConfig) -> Result<GoogleCalendarEventSource> {
        let mut calendar_ids = config.calendar_ids.clone();

        if calendar_ids.is_empty() {
            match std::env::var("GOOGLE_CALENDAR_ID") {
                Ok(calendar_id) => calendar_ids.push(calendar_id),
                Err(_) => return Err(google::ClientError::MissingCalendarID.into()),
            }
        }

        Ok(GoogleCalendarEventSource {
            client: GoogleCalendarClient::new().await?,
            calendar_ids,
            tz: config.time_zone()?,
            page_size: config.max_results,
        })
    }
}

#[async_trait]
impl EventSource for GoogleCalendarEventSource {
    async fn fetch_events(&self, range: &DateRange) -> Result<Vec<Event>> {
        let time_range = utc_bounds(range, &self.tz)?;
        let mut events = Vec::new();

        for calendar_id in &self.calendar_ids {
            let calendar = self.client.get_calendar(calendar_id).await?;

            log::info!(
                "fetching events from calendar `{}` ({})",
                calendar.summary,
                calendar_id
            );

            let items = self
                .client
                .get_all_events(calendar_id, time_range.clone(), self.page_size)
                .await?;

            let count = items.len();

            events.extend(
                items
                    .into_iter()
                    .filter_map(|ev| Event::from_google(ev, Some(&calendar.summary), &self.tz)),
            );

            log::debug!(
                "fetched {} events from `{}`",
                count,
                calendar.summary
            );
        }

        Ok(events)
    }
}

/// Converts a range of days into the half-open range of instants it covers in the time zone.
fn utc_bounds(range: &DateRange, tz: &Tz) -> Result<std::ops::Range<DateTime<Utc>>> {
    let invalid = || Error::InvalidDateRange {
        start: range.start(),
        end: range.end(),
    };

    let day_after = range.end().succ_opt().ok_or_else(invalid)?;
    let start = local_midnight(range.start(), tz).ok_or_else(invalid)?;
    let end = local_midnight(day_after, tz).ok_or_else(invalid)?;

    Ok(start.with_timezone(&Utc)..end.with_timezone(&Utc))
}

#[async_trait]
impl<T> EventSource for Box<T>
where
    T: EventSource + ?Sized,
{
    async fn fetch_events(&self, range: &DateRange) -> Result<Vec<Event>> {
        (**self).fetch_events(range).await
    }
}

#[async_trait]
impl<T> EventSource for Arc<T>
where
    T: EventSource + ?Sized,
{
    async fn fetch_events(&self, range: &DateRange) -> Result<Vec<Event>> {
        (**self).fetch_events(range).await
    }
}

/// The `Calendar` type wraps an event source with additional functionality.
pub struct Calendar {
    event_source: Box<dyn EventSource>,
    tz: Tz,
}

impl Calendar {
    /// Creates a new `Calendar` from an event source. Event days are computed in `tz`.
    pub fn new<T>(event_source: T, tz: Tz) -> Calendar
    where
        T: EventSource + 'static,
    {
        Calendar {
            event_source: Box::new(event_source),
            tz,
        }
    }

    /// Creates a new `Calendar` from configuration.
    pub async fn from_config(config: &CalendarConfig) -> Result<Calendar> {
        let event_source: Box<dyn EventSource> = match config.event_source {
            EventSourceKind::Static => Box::new(StaticEventSource::new(config.events.clone())),
            EventSourceKind::GoogleCalendar => {
                Box::new(GoogleCalendarEventSource::new(config).await?)
            }
        };

        Ok(Calendar::new(event_source, config.time_zone()?))
    }

    /// The time zone used to assign events to days.
    pub fn time_zone(&self) -> Tz {
        self.tz
    }

    /// Fetches the events starting within the date range, sorted by start date.
    ///
    /// An event shared into several calendars is returned once, as it was first seen.
    pub async fn get_events(&self, range: &DateRange) -> Result<Vec<Event>> {
        let mut unique: IndexMap<String, Event> = IndexMap::new();

        for event in self.event_source.fetch_events(range).await? {
            if !range.contains(&event.start_day(&self.tz)) {
                continue;
            }

            if let Some(first) = unique.get(&event.id) {
                log::debug!(
                    "skipping duplicate of event `{}` from calendar {:?}, already seen in {:?}",
                    event.id,
                    event.calendar,
                    first.calendar
                );
                continue;
            }

            unique.insert(event.id.clone(), event);
        }

        let mut events: Vec<Event> = unique.into_values().collect();

        // Ensure events are always sorted by date. The sort is stable, so events starting at the
        // same time keep the order of the source.
        events.sort_by_key(|event| event.start_date);

        Ok(events)
    }

    /// Builds an index of day to list of events starting on that day.
    pub async fn get_events_by_date(&self, range: &DateRange) -> Result<EventsByDate> {
        let events = self.get_events(range).await?;
        Ok(group_by_date(events, &self.tz))
    }
}

/// Groups sorted events by the day they start on, preserving their order.
pub fn group_by_date(events: Vec<Event>, tz: &Tz) -> EventsByDate {
    let mut events_by_date: EventsByDate = IndexMap::new();

    for event in events {
        events_by_date
            .entry(event.start_day(tz))
            .or_default()
            .push(event);
    }

    events_by_date
}
