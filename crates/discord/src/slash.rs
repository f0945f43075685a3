//! Application command definitions registered with Discord on READY.

use serde::Serialize;

const CHAT_INPUT: u8 = 1;
const STRING_OPTION: u8 = 3;
const INTEGER_OPTION: u8 = 4;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SlashCommand {
    #[serde(rename = "type")]
    pub kind: u8,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SlashOption>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SlashOption {
    #[serde(rename = "type")]
    pub kind: u8,
    pub name: &'static str,
    pub description: &'static str,
    pub required: bool,
}

impl SlashOption {
    fn text(name: &'static str, description: &'static str) -> Self {
        Self { kind: STRING_OPTION, name, description, required: true }
    }

    fn integer(name: &'static str, description: &'static str) -> Self {
        Self { kind: INTEGER_OPTION, name, description, required: true }
    }
}

/// One definition per catalog entry. Option names match the argument names
/// the handlers read, so interaction options bind without translation.
pub fn slash_commands(catalog: &[(&'static str, &'static str)]) -> Vec<SlashCommand> {
    catalog
        .iter()
        .map(|(name, description)| SlashCommand {
            kind: CHAT_INPUT,
            name: (*name).to_owned(),
            description: (*description).to_owned(),
            options: options_for(name),
        })
        .collect()
}

fn options_for(command: &str) -> Vec<SlashOption> {
    match command {
        "add_skills" => vec![SlashOption::text("skills", "Comma-separated skills and interests")],
        "ask" => vec![SlashOption::text("question", "What do you want to know?")],
        "create_event" => vec![
            SlashOption::text("name", "Event name"),
            SlashOption::text("time", "When it happens"),
        ],
        "join_event" | "leave_event" => vec![SlashOption::integer("event_id", "Event number")],
        "schedule" => vec![
            SlashOption::text("summary", "Meeting title"),
            SlashOption::text("start", "Start time (RFC 3339)"),
            SlashOption::text("end", "End time (RFC 3339)"),
        ],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crewbot_core::Registry;
    use serde_json::{json, to_value};

    use super::slash_commands;
    use crate::commands::default_command_dispatcher;
    use crate::commands::tests::services;

    #[test]
    fn payload_carries_typed_options() {
        let commands = slash_commands(&[
            ("hello", "Say hello to the bot!"),
            ("join_event", "Join an existing event"),
            ("create_event", "Create a social event"),
        ]);

        assert_eq!(
            to_value(&commands).expect("serialize"),
            json!([
                { "type": 1, "name": "hello", "description": "Say hello to the bot!" },
                {
                    "type": 1,
                    "name": "join_event",
                    "description": "Join an existing event",
                    "options": [
                        { "type": 4, "name": "event_id", "description": "Event number", "required": true }
                    ]
                },
                {
                    "type": 1,
                    "name": "create_event",
                    "description": "Create a social event",
                    "options": [
                        { "type": 3, "name": "name", "description": "Event name", "required": true },
                        { "type": 3, "name": "time", "description": "When it happens", "required": true }
                    ]
                }
            ])
        );
    }

    #[test]
    fn every_registered_command_gets_a_definition() {
        let dispatcher = default_command_dispatcher(services(Arc::new(Registry::new())));
        let commands = slash_commands(&dispatcher.catalog());

        assert_eq!(commands.len(), dispatcher.handler_count());
        assert!(commands.iter().all(|command| !command.description.is_empty()));
        let ask = commands.iter().find(|command| command.name == "ask").expect("ask");
        assert_eq!(ask.options[0].name, "question");
    }
}
