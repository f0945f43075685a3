use std::time::Duration;

use thiserror::Error;

use crate::domain::event::EventId;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportErrorKind {
    #[error("network failure: {0}")]
    Network(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("response could not be decoded: {0}")]
    Decode(String),
}

/// Failure of a single outbound call to a named external service.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{service} request failed: {kind}")]
pub struct TransportError {
    pub service: String,
    pub kind: TransportErrorKind,
}

impl TransportError {
    pub fn new(service: impl Into<String>, kind: TransportErrorKind) -> Self {
        Self { service: service.into(), kind }
    }

    pub fn network(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(service, TransportErrorKind::Network(message.into()))
    }

    pub fn timeout(service: impl Into<String>, limit: Duration) -> Self {
        Self::new(service, TransportErrorKind::Timeout(limit))
    }

    pub fn status(service: impl Into<String>, status: u16) -> Self {
        Self::new(service, TransportErrorKind::Status(status))
    }

    pub fn decode(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(service, TransportErrorKind::Decode(message.into()))
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InvalidState {
    #[error("already a participant in event `{event_name}`")]
    AlreadyParticipant { event_name: String },
    #[error("not a participant in event `{event_name}`")]
    NotParticipant { event_name: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command `{0}`")]
    UnknownCommand(String),
    #[error("missing required argument `{0}`")]
    MissingArgument(&'static str),
    #[error("invalid value `{value}` for argument `{name}`")]
    InvalidArgument { name: &'static str, value: String },
    #[error("event {0} not found")]
    NotFound(EventId),
    #[error(transparent)]
    InvalidState(#[from] InvalidState),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("{0} integration is not configured")]
    Unavailable(&'static str),
}

impl CommandError {
    /// Text shown to the caller in place of a normal reply.
    pub fn user_message(&self) -> String {
        match self {
            Self::UnknownCommand(name) => {
                format!("Unknown command `{name}`. Try `help` to see what I can do.")
            }
            Self::MissingArgument(name) => {
                format!("Missing required argument `{name}`.")
            }
            Self::InvalidArgument { name, value } => {
                format!("`{value}` is not a valid value for `{name}`.")
            }
            Self::NotFound(_) => "Event not found.".to_owned(),
            Self::InvalidState(InvalidState::AlreadyParticipant { event_name }) => {
                format!("You are already a participant in the event: {event_name}.")
            }
            Self::InvalidState(InvalidState::NotParticipant { event_name }) => {
                format!("You were not part of the event: {event_name}.")
            }
            Self::Transport(error) => {
                format!("Sorry, there was an error with the {} API.", error.service)
            }
            Self::Unavailable(integration) => {
                format!("Sorry, the {integration} integration is not configured.")
            }
        }
    }

    pub fn class(&self) -> &'static str {
        match self {
            Self::UnknownCommand(_) => "unknown_command",
            Self::MissingArgument(_) | Self::InvalidArgument { .. } => "invalid_argument",
            Self::NotFound(_) => "not_found",
            Self::InvalidState(_) => "invalid_state",
            Self::Transport(_) => "transport",
            Self::Unavailable(_) => "unavailable",
        }
    }
}
