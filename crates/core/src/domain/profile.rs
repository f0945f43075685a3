use serde::{Deserialize, Serialize};

use crate::domain::event::EventId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub skills: Vec<String>,
    pub room: Option<String>,
    pub events: Vec<EventId>,
}

impl UserProfile {
    /// A fresh profile carrying only the given skills; `add_skills` replaces
    /// the whole record with one of these.
    pub fn with_skills(user_id: UserId, skills: Vec<String>) -> Self {
        Self { user_id, skills, room: None, events: Vec::new() }
    }
}

/// Splits a comma-separated skill list, keeping the caller's order.
///
/// Surrounding whitespace is trimmed from each tag and empty segments are dropped,
/// so `"rust, go,,sql"` yields `["rust", "go", "sql"]`.
pub fn parse_skills(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|skill| !skill.is_empty())
        .map(str::to_owned)
        .collect()
}
