//! Core of the crewbot workspace: configuration, the error taxonomy, domain
//! records, the in-memory [`Registry`] and the inference response normalizer.

pub mod config;
pub mod domain;
pub mod errors;
pub mod normalize;
pub mod registry;

pub use domain::event::{Event, EventId};
pub use domain::profile::{parse_skills, UserId, UserProfile};
pub use errors::{CommandError, InvalidState, TransportError, TransportErrorKind};
pub use normalize::{normalize, normalize_bytes, InferenceResponse, FALLBACK_TEXT};
pub use registry::Registry;
