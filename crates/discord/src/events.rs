use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::commands::{Caller, CommandArgs, CommandDispatcher, CommandInvocation};
use crate::replies::Reply;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscordEnvelope {
    pub event_id: String,
    pub event: DiscordEvent,
}

impl DiscordEnvelope {
    /// Where a reply to this envelope should go, if it can be answered at all.
    pub fn reply_target(&self) -> Option<ReplyTarget> {
        match &self.event {
            DiscordEvent::Interaction(interaction) => Some(ReplyTarget::Interaction {
                interaction_id: interaction.interaction_id.clone(),
                application_id: interaction.application_id.clone(),
                token: interaction.token.clone(),
            }),
            DiscordEvent::Message(message) => Some(ReplyTarget::Channel {
                channel_id: message.channel_id.clone(),
                reply_to: Some(message.message_id.clone()),
            }),
            DiscordEvent::Unsupported { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiscordEvent {
    Interaction(InteractionEvent),
    Message(MessageEvent),
    Unsupported { event_type: String },
}

impl DiscordEvent {
    pub fn event_type(&self) -> DiscordEventType {
        match self {
            Self::Interaction(_) => DiscordEventType::Interaction,
            Self::Message(_) => DiscordEventType::Message,
            Self::Unsupported { .. } => DiscordEventType::Unsupported,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DiscordEventType {
    Interaction,
    Message,
    Unsupported,
}

/// A slash-command interaction with its options flattened to strings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InteractionEvent {
    pub interaction_id: String,
    pub application_id: String,
    pub token: String,
    pub command: String,
    pub options: CommandArgs,
    pub channel_id: String,
    pub user_id: String,
    pub user_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageEvent {
    pub message_id: String,
    pub channel_id: String,
    pub author_id: String,
    pub author_name: String,
    pub author_is_bot: bool,
    pub content: String,
    /// Usernames of the users mentioned in the message.
    pub mentions: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplyTarget {
    Channel { channel_id: String, reply_to: Option<String> },
    /// Answered by acknowledging first, then editing the original response
    /// through the application webhook.
    Interaction { interaction_id: String, application_id: String, token: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(Reply),
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error("interaction `{0}` carries no command name")]
    MissingCommandName(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> DiscordEventType;
    async fn handle(
        &self,
        envelope: &DiscordEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<DiscordEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &DiscordEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Routes both interactions and prefixed text messages to one command dispatcher.
pub fn default_dispatcher(
    commands: Arc<CommandDispatcher>,
    command_prefix: impl Into<String>,
) -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(InteractionHandler::new(commands.clone()));
    dispatcher.register(PrefixedMessageHandler::new(commands, command_prefix));
    dispatcher
}

pub struct InteractionHandler {
    commands: Arc<CommandDispatcher>,
}

impl InteractionHandler {
    pub fn new(commands: Arc<CommandDispatcher>) -> Self {
        Self { commands }
    }
}

#[async_trait]
impl EventHandler for InteractionHandler {
    fn event_type(&self) -> DiscordEventType {
        DiscordEventType::Interaction
    }

    async fn handle(
        &self,
        envelope: &DiscordEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let DiscordEvent::Interaction(interaction) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        if interaction.command.trim().is_empty() {
            return Err(EventHandlerError::MissingCommandName(interaction.interaction_id.clone()));
        }

        let invocation = CommandInvocation::new(
            interaction.command.trim(),
            Caller::new(&interaction.user_id, &interaction.user_name),
        )
        .args(interaction.options.clone())
        .channel(&interaction.channel_id)
        .request_id(&interaction.interaction_id)
        .members(vec![interaction.user_name.clone()]);

        Ok(HandlerResult::Responded(self.commands.dispatch(&invocation).await))
    }
}

pub struct PrefixedMessageHandler {
    commands: Arc<CommandDispatcher>,
    prefix: String,
}

impl PrefixedMessageHandler {
    pub fn new(commands: Arc<CommandDispatcher>, prefix: impl Into<String>) -> Self {
        Self { commands, prefix: prefix.into() }
    }
}

#[async_trait]
impl EventHandler for PrefixedMessageHandler {
    fn event_type(&self) -> DiscordEventType {
        DiscordEventType::Message
    }

    async fn handle(
        &self,
        envelope: &DiscordEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let DiscordEvent::Message(message) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        if message.author_is_bot {
            return Ok(HandlerResult::Ignored);
        }
        let Some(parsed) = parse_prefixed_command(&message.content, &self.prefix) else {
            debug!(
                event_name = "ingress.discord.message_ignored",
                correlation_id = %ctx.correlation_id,
                "message has no command prefix"
            );
            return Ok(HandlerResult::Ignored);
        };

        let mut members = vec![message.author_name.clone()];
        for mention in &message.mentions {
            if !members.contains(mention) {
                members.push(mention.clone());
            }
        }

        let invocation = CommandInvocation::new(
            parsed.command,
            Caller::new(&message.author_id, &message.author_name),
        )
        .args(parsed.args)
        .channel(&message.channel_id)
        .request_id(&message.message_id)
        .members(members);

        Ok(HandlerResult::Responded(self.commands.dispatch(&invocation).await))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: String,
    pub args: CommandArgs,
}

/// Parses `!command remainder` into a command name and its bound arguments.
///
/// Returns `None` when the content does not start with `prefix` or nothing
/// follows the prefix.
pub fn parse_prefixed_command(content: &str, prefix: &str) -> Option<ParsedCommand> {
    let body = content.trim_start().strip_prefix(prefix)?;
    let body = body.trim();
    let (command, remainder) = match body.split_once(char::is_whitespace) {
        Some((command, remainder)) => (command, remainder.trim()),
        None => (body, ""),
    };
    if command.is_empty() {
        return None;
    }

    Some(ParsedCommand { command: command.to_owned(), args: bind_arguments(command, remainder) })
}

/// Binds the free text after a command name to that command's argument names.
pub fn bind_arguments(command: &str, remainder: &str) -> CommandArgs {
    let mut args = CommandArgs::new();
    match command {
        "ask" => args.insert("question", remainder),
        "add_skills" => args.insert("skills", remainder),
        "join_event" | "leave_event" => args.insert("event_id", remainder),
        "create_event" => bind_pipe_separated(&mut args, remainder, &["name", "time"]),
        "schedule" => bind_pipe_separated(&mut args, remainder, &["summary", "start", "end"]),
        _ => {}
    }
    args
}

fn bind_pipe_separated(args: &mut CommandArgs, remainder: &str, names: &[&str]) {
    if remainder.is_empty() {
        return;
    }
    for (name, value) in names.iter().zip(remainder.splitn(names.len(), '|')) {
        args.insert(*name, value.trim());
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crewbot_core::Registry;

    use super::{
        bind_arguments, default_dispatcher, parse_prefixed_command, DiscordEnvelope,
        DiscordEvent, EventContext, EventDispatcher, EventHandlerError, HandlerResult,
        InteractionEvent, MessageEvent, ReplyTarget,
    };
    use crate::commands::tests::services;
    use crate::commands::{default_command_dispatcher, CommandArgs};
    use crate::events::DispatchError;

    fn dispatcher() -> EventDispatcher {
        let commands =
            Arc::new(default_command_dispatcher(services(Arc::new(Registry::new()))));
        default_dispatcher(commands, "!")
    }

    fn message(content: &str) -> DiscordEnvelope {
        DiscordEnvelope {
            event_id: "m-1".to_owned(),
            event: DiscordEvent::Message(MessageEvent {
                message_id: "m-1".to_owned(),
                channel_id: "C1".to_owned(),
                author_id: "U1".to_owned(),
                author_name: "ana".to_owned(),
                author_is_bot: false,
                content: content.to_owned(),
                mentions: Vec::new(),
            }),
        }
    }

    fn responded(result: HandlerResult) -> String {
        match result {
            HandlerResult::Responded(reply) => reply.content,
            HandlerResult::Ignored => panic!("expected a reply"),
        }
    }

    #[test]
    fn prefix_parsing_binds_primary_argument() {
        let parsed = parse_prefixed_command("!ask what is rust?", "!").expect("command");
        assert_eq!(parsed.command, "ask");
        assert_eq!(parsed.args.get("question"), Some("what is rust?"));

        let join = parse_prefixed_command("  !join_event   3 ", "!").expect("command");
        assert_eq!(join.args.get("event_id"), Some("3"));
    }

    #[test]
    fn prefix_parsing_rejects_unprefixed_or_bare_prefix() {
        assert_eq!(parse_prefixed_command("ask what", "!"), None);
        assert_eq!(parse_prefixed_command("!", "!"), None);
        assert_eq!(parse_prefixed_command("!   ", "!"), None);
    }

    #[test]
    fn multi_argument_commands_split_on_pipe() {
        let args = bind_arguments("create_event", "Game Night | Friday 8pm");
        assert_eq!(args.get("name"), Some("Game Night"));
        assert_eq!(args.get("time"), Some("Friday 8pm"));

        let args = bind_arguments("schedule", "Sync|2026-10-20T10:00:00|2026-10-20T10:30:00");
        assert_eq!(args.get("summary"), Some("Sync"));
        assert_eq!(args.get("end"), Some("2026-10-20T10:30:00"));

        assert!(bind_arguments("create_event", "").is_empty());
        assert!(bind_arguments("hello", "extra words").is_empty());
    }

    #[tokio::test]
    async fn prefixed_message_reaches_command_dispatcher() {
        let result = dispatcher()
            .dispatch(&message("!hello"), &EventContext::default())
            .await
            .expect("dispatch");
        assert_eq!(responded(result), "Hello, ana!");
    }

    #[tokio::test]
    async fn create_event_with_missing_time_names_argument() {
        let result = dispatcher()
            .dispatch(&message("!create_event Game Night"), &EventContext::default())
            .await
            .expect("dispatch");
        assert_eq!(responded(result), "Missing required argument `time`.");
    }

    #[tokio::test]
    async fn bot_and_unprefixed_messages_are_ignored() {
        let dispatcher = dispatcher();

        let plain = dispatcher
            .dispatch(&message("hello there"), &EventContext::default())
            .await
            .expect("dispatch");
        assert_eq!(plain, HandlerResult::Ignored);

        let mut from_bot = message("!hello");
        if let DiscordEvent::Message(event) = &mut from_bot.event {
            event.author_is_bot = true;
        }
        let bot = dispatcher.dispatch(&from_bot, &EventContext::default()).await.expect("dispatch");
        assert_eq!(bot, HandlerResult::Ignored);
    }

    #[tokio::test]
    async fn interaction_options_become_arguments() {
        let envelope = DiscordEnvelope {
            event_id: "i-1".to_owned(),
            event: DiscordEvent::Interaction(InteractionEvent {
                interaction_id: "i-1".to_owned(),
                application_id: "A1".to_owned(),
                token: "tok".to_owned(),
                command: "add_skills".to_owned(),
                options: [("skills", "rust, go")].into_iter().collect::<CommandArgs>(),
                channel_id: "C1".to_owned(),
                user_id: "U1".to_owned(),
                user_name: "ana".to_owned(),
            }),
        };

        let result =
            dispatcher().dispatch(&envelope, &EventContext::default()).await.expect("dispatch");
        assert_eq!(responded(result), "ana, your skills have been added: rust, go");
        assert_eq!(
            envelope.reply_target(),
            Some(ReplyTarget::Interaction {
                interaction_id: "i-1".to_owned(),
                application_id: "A1".to_owned(),
                token: "tok".to_owned()
            })
        );
    }

    #[tokio::test]
    async fn interaction_without_name_is_a_dispatch_error() {
        let envelope = DiscordEnvelope {
            event_id: "i-2".to_owned(),
            event: DiscordEvent::Interaction(InteractionEvent {
                interaction_id: "i-2".to_owned(),
                application_id: "A1".to_owned(),
                token: "tok".to_owned(),
                command: " ".to_owned(),
                options: CommandArgs::new(),
                channel_id: "C1".to_owned(),
                user_id: "U1".to_owned(),
                user_name: "ana".to_owned(),
            }),
        };

        let error = dispatcher()
            .dispatch(&envelope, &EventContext::default())
            .await
            .expect_err("must fail");
        assert_eq!(
            error,
            DispatchError::Handler(EventHandlerError::MissingCommandName("i-2".to_owned()))
        );
    }

    #[tokio::test]
    async fn unsupported_events_are_ignored() {
        let envelope = DiscordEnvelope {
            event_id: "x".to_owned(),
            event: DiscordEvent::Unsupported { event_type: "TYPING_START".to_owned() },
        };
        let result =
            dispatcher().dispatch(&envelope, &EventContext::default()).await.expect("dispatch");

        assert_eq!(result, HandlerResult::Ignored);
        assert_eq!(envelope.reply_target(), None);
    }

    #[test]
    fn default_dispatcher_registers_handlers() {
        assert_eq!(dispatcher().handler_count(), 2);
    }
}
