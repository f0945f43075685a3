use serde::Serialize;

use crewbot_core::Event;

/// Discord rejects message content longer than this.
pub const MAX_CONTENT_CHARS: usize = 2000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub content: String,
}

impl Reply {
    pub fn new(content: impl Into<String>) -> Self {
        let content = content.into();
        Self { content: clip(content) }
    }
}

fn clip(content: String) -> String {
    match content.char_indices().nth(MAX_CONTENT_CHARS - 1) {
        Some((index, _)) if content.chars().count() > MAX_CONTENT_CHARS => {
            format!("{}…", &content[..index])
        }
        _ => content,
    }
}

pub const CHALLENGES: [&str; 4] = [
    "Build a website together!",
    "Brainstorm ideas for a startup project!",
    "Collaborate on a new coding project!",
    "Create a digital artwork as a team!",
];

pub fn hello(display_name: &str) -> Reply {
    Reply::new(format!("Hello, {display_name}!"))
}

pub fn skills_added(display_name: &str, skills: &[String]) -> Reply {
    Reply::new(format!("{display_name}, your skills have been added: {}", skills.join(", ")))
}

pub fn question_required() -> Reply {
    Reply::new("Please provide a question or prompt.")
}

pub fn answer(text: &str) -> Reply {
    Reply::new(format!("Here's my answer: {text}"))
}

pub fn event_created(event: &Event) -> Reply {
    Reply::new(format!(
        "Event '{}' created! Time: {}. You are the first participant.",
        event.name, event.time
    ))
}

pub fn event_listing(events: &[Event]) -> Reply {
    if events.is_empty() {
        return Reply::new("No events available at the moment.");
    }

    let lines: Vec<String> = events.iter().map(Event::listing_line).collect();
    Reply::new(format!("Active events: \n{}", lines.join("\n")))
}

pub fn event_joined(event: &Event) -> Reply {
    Reply::new(format!("You've joined the event: {}!", event.name))
}

pub fn event_left(event: &Event) -> Reply {
    Reply::new(format!("You've left the event: {}.", event.name))
}

pub fn challenge(pick: &str) -> Reply {
    Reply::new(format!("New challenge: {pick}"))
}

pub fn inspiration(quote: &str) -> Reply {
    Reply::new(format!("Here's an inspiration for you: \n{quote}"))
}

pub fn meeting_scheduled(link: &str) -> Reply {
    Reply::new(format!("Meeting scheduled! Join here: {link}"))
}

pub fn help(catalog: &[(&'static str, &'static str)], prefix: &str) -> Reply {
    let lines: Vec<String> = catalog
        .iter()
        .map(|(name, description)| format!("• `{prefix}{name}` - {description}"))
        .collect();
    Reply::new(format!("Available commands:\n{}", lines.join("\n")))
}

#[cfg(test)]
mod tests {
    use crewbot_core::{Event, EventId, UserId};

    use super::{event_listing, help, skills_added, Reply, MAX_CONTENT_CHARS};

    fn event(id: u64, name: &str, time: &str) -> Event {
        Event::new(EventId(id), name, time, UserId("U1".to_owned()))
    }

    #[test]
    fn listing_joins_lines_in_given_order() {
        let reply = event_listing(&[event(1, "Study Group", "5pm"), event(2, "Game Night", "8pm")]);
        assert_eq!(reply.content, "Active events: \n1. Study Group - 5pm\n2. Game Night - 8pm");
    }

    #[test]
    fn empty_listing_has_fixed_text() {
        assert_eq!(event_listing(&[]).content, "No events available at the moment.");
    }

    #[test]
    fn skills_reply_echoes_parsed_list() {
        let reply = skills_added("ana", &["rust".to_owned(), "sql".to_owned()]);
        assert_eq!(reply.content, "ana, your skills have been added: rust, sql");
    }

    #[test]
    fn help_lists_prefixed_commands() {
        let reply = help(&[("hello", "Say hello"), ("inspire", "Get a quote")], "!");
        assert_eq!(reply.content, "Available commands:\n• `!hello` - Say hello\n• `!inspire` - Get a quote");
    }

    #[test]
    fn oversized_content_is_clipped_to_platform_limit() {
        let reply = Reply::new("x".repeat(MAX_CONTENT_CHARS + 50));
        assert_eq!(reply.content.chars().count(), MAX_CONTENT_CHARS);
        assert!(reply.content.ends_with('…'));

        let exact = Reply::new("y".repeat(MAX_CONTENT_CHARS));
        assert_eq!(exact.content.chars().count(), MAX_CONTENT_CHARS);
        assert!(!exact.content.ends_with('…'));
    }
}
