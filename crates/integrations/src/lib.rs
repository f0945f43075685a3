//! External API clients
//!
//! - **HTTP** (`http`) - the single-attempt [`ApiClient`] seam and its reqwest implementation
//! - **Inference** (`inference`) - conversational model endpoint, responses normalized to text
//! - **Quotes** (`quotes`) - random inspirational quote
//! - **Calendar** (`calendar`) - meeting creation against a calendar API
//!
//! Every client reports failures as [`crewbot_core::TransportError`]; turning
//! those into user-facing text is the caller's job.

pub mod calendar;
pub mod http;
pub mod inference;
pub mod quotes;

pub use calendar::{attendee_emails, CalendarService, GoogleCalendar, MeetingRequest};
pub use http::{ApiClient, Endpoint, HttpApiClient};
pub use inference::{HuggingFaceInference, InferenceService};
pub use quotes::{Quote, QuoteService, ZenQuotes};
