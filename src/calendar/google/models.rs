use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::Deserialize;

/// Start or end of an event. Timed events carry `date_time`, all-day events only `date`.
#[derive(Debug, Deserialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct Timepoint {
    pub date_time: Option<DateTime<FixedOffset>>,
    pub date: Option<NaiveDate>,
    pub time_zone: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct Event {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: Timepoint,
    pub end: Option<Timepoint>,
}

impl Event {
    /// Returns `true` if the event was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.status.as_deref() == Some("cancelled")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct Events {
    pub time_zone: Option<String>,
    #[serde(default)]
    pub items: Vec<Event>,
    pub next_page_token: Option<String>,
}

/// Calendar metadata returned by the `calendars/{id}` endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct CalendarInfo {
    pub id: String,
    pub summary: String,
    pub time_zone: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_events_page() {
        let json = r#"{
            "kind": "calendar#events",
            "summary": "Personal",
            "timeZone": "Europe/Berlin",
            "nextPageToken": "abcd",
            "items": [
                {
                    "id": "timed",
                    "status": "confirmed",
                    "summary": "Standup",
                    "location": "Office",
                    "start": { "dateTime": "2024-01-03T09:00:00+01:00", "timeZone": "Europe/Berlin" },
                    "end": { "dateTime": "2024-01-03T09:15:00+01:00", "timeZone": "Europe/Berlin" }
                },
                {
                    "id": "allday",
                    "summary": "Holiday",
                    "start": { "date": "2024-01-04" },
                    "end": { "date": "2024-01-05" }
                },
                {
                    "id": "gone",
                    "status": "cancelled",
                    "start": { "date": "2024-01-04" }
                }
            ]
        }"#;

        let events: Events = serde_json::from_str(json).unwrap();

        assert_eq!(events.time_zone.as_deref(), Some("Europe/Berlin"));
        assert_eq!(events.next_page_token.as_deref(), Some("abcd"));
        assert_eq!(events.items.len(), 3);

        let timed = &events.items[0];
        assert_eq!(timed.summary.as_deref(), Some("Standup"));
        assert_eq!(
            timed.start.date_time.unwrap().to_rfc3339(),
            "2024-01-03T09:00:00+01:00"
        );
        assert!(!timed.is_cancelled());

        let all_day = &events.items[1];
        assert!(all_day.start.date_time.is_none());
        assert_eq!(all_day.start.date, NaiveDate::from_ymd_opt(2024, 1, 4));

        assert!(events.items[2].is_cancelled());
        assert!(events.items[2].end.is_none());
    }
}
