use serde::{Deserialize, Serialize};

use crate::domain::profile::UserId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for EventId {
    type Err = std::num::ParseIntError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value.trim().parse::<u64>().map(Self)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub name: String,
    pub time: String,
    /// Insertion-ordered and duplicate-free; the first entry is the creator.
    pub participants: Vec<UserId>,
}

impl Event {
    pub fn new(id: EventId, name: impl Into<String>, time: impl Into<String>, creator: UserId) -> Self {
        Self { id, name: name.into(), time: time.into(), participants: vec![creator] }
    }

    pub fn has_participant(&self, user_id: &UserId) -> bool {
        self.participants.iter().any(|participant| participant == user_id)
    }

    pub fn creator(&self) -> Option<&UserId> {
        self.participants.first()
    }

    pub fn listing_line(&self) -> String {
        format!("{}. {} - {}", self.id, self.name, self.time)
    }
}

#[cfg(test)]
mod tests {
    use super::{Event, EventId};
    use crate::domain::profile::UserId;

    #[test]
    fn new_event_starts_with_creator_as_sole_participant() {
        let creator = UserId("U1".to_owned());
        let event = Event::new(EventId(1), "Study Group", "5pm", creator.clone());

        assert_eq!(event.participants, vec![creator.clone()]);
        assert_eq!(event.creator(), Some(&creator));
        assert_eq!(event.listing_line(), "1. Study Group - 5pm");
    }

    #[test]
    fn event_id_parses_trimmed_integers_only() {
        assert_eq!(" 42 ".parse::<EventId>(), Ok(EventId(42)));
        assert!("abc".parse::<EventId>().is_err());
        assert!("-1".parse::<EventId>().is_err());
    }
}
