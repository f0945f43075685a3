use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use crewbot_core::config::CalendarConfig;
use crewbot_core::TransportError;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::http::{ApiClient, Endpoint};

pub const SERVICE_NAME: &str = "calendar";

/// A meeting to put on the shared calendar. Start and end are RFC 3339
/// strings and are passed through to the calendar API unchecked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MeetingRequest {
    pub summary: String,
    pub start: String,
    pub end: String,
    pub attendees: Vec<String>,
}

#[async_trait]
pub trait CalendarService: Send + Sync {
    /// Creates the meeting and returns a link to it.
    async fn schedule(&self, meeting: &MeetingRequest) -> Result<String, TransportError>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedEvent {
    html_link: Option<String>,
}

/// Google Calendar v3 `events.insert` against one calendar.
pub struct GoogleCalendar {
    client: Arc<dyn ApiClient>,
    endpoint: Endpoint,
    time_zone: String,
}

impl GoogleCalendar {
    pub fn new(client: Arc<dyn ApiClient>, endpoint: Endpoint, time_zone: impl Into<String>) -> Self {
        Self { client, endpoint, time_zone: time_zone.into() }
    }

    /// Returns `None` unless the calendar is enabled and has an access token.
    pub fn from_config(client: Arc<dyn ApiClient>, config: &CalendarConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let token = config.access_token.clone()?;

        let url = format!(
            "{}/calendars/{}/events",
            config.base_url.trim_end_matches('/'),
            config.calendar_id
        );
        let endpoint =
            Endpoint::new(SERVICE_NAME, url, Duration::from_secs(config.timeout_secs))
                .with_bearer(token);
        Some(Self::new(client, endpoint, config.time_zone.clone()))
    }

    fn event_body(&self, meeting: &MeetingRequest) -> Value {
        let attendees: Vec<Value> =
            meeting.attendees.iter().map(|email| json!({ "email": email })).collect();
        json!({
            "summary": meeting.summary,
            "start": { "dateTime": meeting.start, "timeZone": self.time_zone },
            "end": { "dateTime": meeting.end, "timeZone": self.time_zone },
            "attendees": attendees,
        })
    }
}

#[async_trait]
impl CalendarService for GoogleCalendar {
    async fn schedule(&self, meeting: &MeetingRequest) -> Result<String, TransportError> {
        let body = self.event_body(meeting);
        let response = self.client.call(&self.endpoint, Some(&body)).await?;

        let created: CreatedEvent = serde_json::from_slice(&response)
            .map_err(|error| TransportError::decode(SERVICE_NAME, error.to_string()))?;
        created
            .html_link
            .ok_or_else(|| TransportError::decode(SERVICE_NAME, "response has no htmlLink"))
    }
}

/// Maps member names onto addresses in `domain`, skipping blank names.
pub fn attendee_emails<'a>(
    names: impl IntoIterator<Item = &'a str>,
    domain: &str,
) -> Vec<String> {
    names
        .into_iter()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| format!("{name}@{domain}"))
        .collect()
}
