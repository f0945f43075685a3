use std::collections::{BTreeMap, HashMap};

use tokio::sync::RwLock;

use crate::domain::event::{Event, EventId};
use crate::domain::profile::{UserId, UserProfile};
use crate::errors::{CommandError, InvalidState};

/// In-memory store of user profiles and events.
///
/// Nothing here is persisted: a registry starts empty and its contents go away
/// with it. Users and events live in independent maps; a profile's `events`
/// list is not kept in sync with event participation.
#[derive(Debug, Default)]
pub struct Registry {
    users: RwLock<HashMap<UserId, UserProfile>>,
    events: RwLock<EventTable>,
}

#[derive(Debug)]
struct EventTable {
    next_id: u64,
    events: BTreeMap<EventId, Event>,
}

impl Default for EventTable {
    fn default() -> Self {
        Self { next_id: 1, events: BTreeMap::new() }
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `profile`, replacing any previous profile for the same user.
    pub async fn put_user(&self, profile: UserProfile) {
        let mut users = self.users.write().await;
        users.insert(profile.user_id.clone(), profile);
    }

    pub async fn get_user(&self, user_id: &UserId) -> Option<UserProfile> {
        let users = self.users.read().await;
        users.get(user_id).cloned()
    }

    /// Creates an event with `creator` as its only participant and returns it.
    ///
    /// Ids come from a counter that only moves forward, so an id is never handed
    /// out twice even if events are removed in the future.
    pub async fn put_event(
        &self,
        name: impl Into<String>,
        time: impl Into<String>,
        creator: UserId,
    ) -> Event {
        let mut table = self.events.write().await;
        let id = EventId(table.next_id);
        table.next_id += 1;

        let event = Event::new(id, name, time, creator);
        table.events.insert(id, event.clone());
        event
    }

    pub async fn get_event(&self, id: EventId) -> Option<Event> {
        let table = self.events.read().await;
        table.events.get(&id).cloned()
    }

    pub async fn add_participant(
        &self,
        id: EventId,
        user_id: &UserId,
    ) -> Result<Event, CommandError> {
        let mut table = self.events.write().await;
        let event = table.events.get_mut(&id).ok_or(CommandError::NotFound(id))?;

        if event.has_participant(user_id) {
            return Err(InvalidState::AlreadyParticipant { event_name: event.name.clone() }.into());
        }

        event.participants.push(user_id.clone());
        Ok(event.clone())
    }

    pub async fn remove_participant(
        &self,
        id: EventId,
        user_id: &UserId,
    ) -> Result<Event, CommandError> {
        let mut table = self.events.write().await;
        let event = table.events.get_mut(&id).ok_or(CommandError::NotFound(id))?;

        let Some(position) = event.participants.iter().position(|participant| participant == user_id)
        else {
            return Err(InvalidState::NotParticipant { event_name: event.name.clone() }.into());
        };

        event.participants.remove(position);
        Ok(event.clone())
    }

    pub async fn all_events_ordered_by_id(&self) -> Vec<Event> {
        let table = self.events.read().await;
        table.events.values().cloned().collect()
    }

    pub async fn user_count(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn event_count(&self) -> usize {
        self.events.read().await.events.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::domain::event::EventId;
    use crate::domain::profile::{UserId, UserProfile};
    use crate::errors::{CommandError, InvalidState};
    use crate::registry::Registry;

    fn user(id: &str) -> UserId {
        UserId(id.to_owned())
    }

    #[tokio::test]
    async fn put_user_overwrites_instead_of_merging() {
        let registry = Registry::new();
        registry
            .put_user(UserProfile::with_skills(user("U1"), vec!["rust".to_owned(), "go".to_owned()]))
            .await;
        registry.put_user(UserProfile::with_skills(user("U1"), vec!["sql".to_owned()])).await;

        let profile = registry.get_user(&user("U1")).await.expect("profile");
        assert_eq!(profile.skills, vec!["sql"]);
        assert_eq!(registry.user_count().await, 1);
    }

    #[tokio::test]
    async fn event_ids_are_sequential_from_one() {
        let registry = Registry::new();
        let first = registry.put_event("Study Group", "5pm", user("U1")).await;
        let second = registry.put_event("Game Night", "8pm", user("U2")).await;

        assert_eq!(first.id, EventId(1));
        assert_eq!(second.id, EventId(2));
        assert_eq!(registry.event_count().await, 2);
    }

    #[tokio::test]
    async fn all_events_are_returned_in_ascending_id_order() {
        let registry = Registry::new();
        for name in ["a", "b", "c"] {
            registry.put_event(name, "now", user("U1")).await;
        }

        let ids: Vec<_> =
            registry.all_events_ordered_by_id().await.into_iter().map(|event| event.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn add_participant_keeps_set_semantics() {
        let registry = Registry::new();
        let event = registry.put_event("Study Group", "5pm", user("U1")).await;

        registry.add_participant(event.id, &user("U2")).await.expect("first join");
        let duplicate = registry.add_participant(event.id, &user("U2")).await;

        assert_eq!(
            duplicate,
            Err(CommandError::InvalidState(InvalidState::AlreadyParticipant {
                event_name: "Study Group".to_owned()
            }))
        );
        let stored = registry.get_event(event.id).await.expect("event");
        assert_eq!(stored.participants, vec![user("U1"), user("U2")]);
    }

    #[tokio::test]
    async fn creator_counts_as_participant() {
        let registry = Registry::new();
        let event = registry.put_event("Study Group", "5pm", user("U1")).await;

        assert!(matches!(
            registry.add_participant(event.id, &user("U1")).await,
            Err(CommandError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn missing_event_reports_not_found_without_mutation() {
        let registry = Registry::new();
        registry.put_event("Study Group", "5pm", user("U1")).await;

        assert_eq!(
            registry.add_participant(EventId(7), &user("U2")).await,
            Err(CommandError::NotFound(EventId(7)))
        );
        assert_eq!(
            registry.remove_participant(EventId(7), &user("U1")).await,
            Err(CommandError::NotFound(EventId(7)))
        );
        assert_eq!(registry.event_count().await, 1);
        let stored = registry.get_event(EventId(1)).await.expect("event");
        assert_eq!(stored.participants, vec![user("U1")]);
    }

    #[tokio::test]
    async fn remove_participant_requires_membership() {
        let registry = Registry::new();
        let event = registry.put_event("Study Group", "5pm", user("U1")).await;

        assert!(matches!(
            registry.remove_participant(event.id, &user("U2")).await,
            Err(CommandError::InvalidState(InvalidState::NotParticipant { .. }))
        ));

        let left = registry.remove_participant(event.id, &user("U1")).await.expect("leave");
        assert!(left.participants.is_empty());
    }

    #[tokio::test]
    async fn concurrent_joins_do_not_duplicate_participants() {
        let registry = Arc::new(Registry::new());
        let event_id = registry.put_event("Hackathon", "noon", user("U0")).await.id;

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move {
                registry.add_participant(event_id, &UserId("U9".to_owned())).await.is_ok()
            }));
        }

        let mut successes = 0;
        for task in tasks {
            if task.await.expect("join task") {
                successes += 1;
            }
        }

        assert_eq!(successes, 1);
        let stored = registry.get_event(event_id).await.expect("event");
        assert_eq!(stored.participants.len(), 2);
    }
}
