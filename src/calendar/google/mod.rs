pub mod models;

use chrono::{DateTime, SecondsFormat, Utc};
use google_cloud_auth::token_source::TokenSource;
use indexmap::IndexMap;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING, AUTHORIZATION};
use reqwest::{Request, Response, Url};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, Middleware, Next};
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;
use task_local_extensions::Extensions;

const API_BASE_URL: &str = "https://www.googleapis.com/calendar/v3/";

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Error while authenticating with google.
    #[error("failed to authenticate: {0}")]
    GCloudAuth(#[from] google_cloud_auth::error::Error),

    /// Error while making a http request.
    #[error("failure requesting remote resource: {0}")]
    Request(#[from] reqwest::Error),

    /// Error while executing some middleware code.
    #[error("request middleware failed with: {0}")]
    RequestMiddleware(#[from] reqwest_middleware::Error),

    /// Error while building http headers.
    #[error("encountered invalid HTTP header value: {0}")]
    InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),

    /// Error when neither a calendar ID is configured nor `GOOGLE_CALENDAR_ID` is set.
    #[error("no calendar configured; set `calendar.calendar_ids` or `GOOGLE_CALENDAR_ID`")]
    MissingCalendarID,

    /// Error while building a request URL.
    #[error("invalid calendar ID `{0}`")]
    InvalidCalendarID(String),

    /// Error while obtaining an authentication token.
    #[error("failed to obtain authentication token: {0}")]
    Token(String),
}

impl From<ClientError> for reqwest_middleware::Error {
    fn from(err: ClientError) -> Self {
        reqwest_middleware::Error::Middleware(anyhow::Error::new(err))
    }
}

struct AuthMiddleware {
    token_source: Arc<dyn TokenSource>,
}

impl AuthMiddleware {
    fn new(token_source: Arc<dyn TokenSource>) -> AuthMiddleware {
        AuthMiddleware { token_source }
    }
}

#[async_trait::async_trait]
impl Middleware for AuthMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        let token = self
            .token_source
            .token()
            .await
            .map_err(|err| ClientError::Token(err.to_string()))?;

        let mut header = HeaderValue::try_from(format!("Bearer {}", token.access_token))
            .map_err(ClientError::from)?;
        header.set_sensitive(true);
        req.headers_mut().insert(AUTHORIZATION, header);
        next.run(req, extensions).await
    }
}

/// Google calendar client for making requests to the google calendar api
#[derive(Debug)]
pub struct GoogleCalendarClient {
    client: ClientWithMiddleware,
}

impl GoogleCalendarClient {
    /// Create a new google calendar client. It fetches the service account credentials from the
    /// environment via the GOOGLE_APPLICATION_CREDENTIALS variable pointing to the json key file
    /// generated in the google cloud console for the account.
    pub async fn new() -> Result<GoogleCalendarClient, ClientError> {
        // We only need readonly access.
        let scopes = ["https://www.googleapis.com/auth/calendar.readonly"];
        let config = google_cloud_auth::Config {
            audience: None,
            scopes: Some(&scopes),
        };

        let token_source: Arc<dyn TokenSource> =
            Arc::from(google_cloud_auth::create_token_source(config).await?);

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_str("gzip")?);

        let client = ClientBuilder::new(
            reqwest::Client::builder()
                .default_headers(headers)
                .timeout(Duration::from_secs(10))
                .build()?,
        )
        .with(AuthMiddleware::new(token_source))
        .build();

        Ok(GoogleCalendarClient { client })
    }

    /// Fetches the metadata of a calendar, most importantly its display name.
    pub async fn get_calendar(&self, calendar_id: &str) -> Result<models::CalendarInfo, ClientError> {
        let url = calendar_url(calendar_id, &[])?;

        let calendar = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<models::CalendarInfo>()
            .await?;

        Ok(calendar)
    }

    /// Queries events from the google calendar. The query can be filtered by a date range and the
    /// number of results can be limited to a certain number of events in which case the result
    /// might contain a page token that should be used in the next request to get the next page of
    /// events.
    pub async fn get_events(
        &self,
        calendar_id: &str,
        date_range: Option<Range<DateTime<Utc>>>,
        event_count: Option<u32>,
        next_page_token: Option<String>,
    ) -> Result<(Vec<models::Event>, Option<String>), ClientError> {
        let url = calendar_url(calendar_id, &["events"])?;
        let query = build_query_parameters(&date_range, &event_count, &next_page_token);

        let events = self
            .client
            .get(url)
            .query(&query)
            .send()
            .await?
            .error_for_status()?
            .json::<models::Events>()
            .await?;

        log::debug!(
            "fetched {} events from Google Calendar `{}`",
            events.items.len(),
            calendar_id
        );

        Ok((events.items, events.next_page_token))
    }

    /// Queries all events within the date range, following page tokens until the last page.
    pub async fn get_all_events(
        &self,
        calendar_id: &str,
        date_range: Range<DateTime<Utc>>,
        page_size: u32,
    ) -> Result<Vec<models::Event>, ClientError> {
        let mut events = Vec::new();
        let mut page_token = None;

        loop {
            let (page, next_page_token) = self
                .get_events(
                    calendar_id,
                    Some(date_range.clone()),
                    Some(page_size),
                    page_token,
                )
                .await?;

            events.extend(page);

            match next_page_token {
                Some(token) => page_token = Some(token),
                None => return Ok(events),
            }
        }
    }
}

/// Builds `calendars/{calendar_id}/...`, escaping the calendar ID as a single path segment.
fn calendar_url(calendar_id: &str, segments: &[&str]) -> Result<Url, ClientError> {
    let invalid = || ClientError::InvalidCalendarID(calendar_id.to_owned());

    let mut url = Url::parse(API_BASE_URL).map_err(|_| invalid())?;
    url.path_segments_mut()
        .map_err(|_| invalid())?
        .pop_if_empty()
        .push("calendars")
        .push(calendar_id)
        .extend(segments);

    Ok(url)
}

fn build_query_parameters(
    date_range: &Option<Range<DateTime<Utc>>>,
    event_count: &Option<u32>,
    next_page_token: &Option<String>,
) -> IndexMap<&'static str, String> {
    // Google requires rfc3339 format for the times with a fixed offset
    // see: https://developers.google.com/calendar/api/v3/reference/events/list

    let mut query_parameters: IndexMap<&'static str, String> = IndexMap::from([
        // expand recurring events into single instances
        ("singleEvents", "true".to_owned()),
        // order ascending by start time
        ("orderBy", "startTime".to_owned()),
    ]);

    if let Some(range) = date_range {
        // limit the events by a time frame
        query_parameters.insert(
            "timeMin",
            range.start.to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        query_parameters.insert(
            "timeMax",
            range.end.to_rfc3339_opts(SecondsFormat::Secs, true),
        );
    }

    if let Some(count) = event_count {
        // limit the number of events to a specific count
        query_parameters.insert("maxResults", count.to_string());
    }

    if let Some(token) = next_page_token {
        // page token returned by previous request to fetch the next page
        query_parameters.insert("pageToken", token.clone());
    }

    query_parameters
}
