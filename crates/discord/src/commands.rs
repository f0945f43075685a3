use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use tracing::{info, warn};

use crewbot_core::config::AppConfig;
use crewbot_core::{parse_skills, CommandError, EventId, Registry, UserId, UserProfile};
use crewbot_integrations::{
    attendee_emails, ApiClient, CalendarService, GoogleCalendar, HuggingFaceInference,
    InferenceService, MeetingRequest, QuoteService, ZenQuotes,
};

use crate::replies::{self, Reply, CHALLENGES};

/// Named string arguments of one invocation, in the order they sort by name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandArgs(BTreeMap<String, String>);

impl CommandArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Trimmed value of `name`; absent and blank values are both missing.
    pub fn required(&self, name: &'static str) -> Result<&str, CommandError> {
        match self.get(name).map(str::trim) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(CommandError::MissingArgument(name)),
        }
    }

    pub fn event_id(&self) -> Result<EventId, CommandError> {
        let raw = self.required("event_id")?;
        raw.parse()
            .map_err(|_| CommandError::InvalidArgument { name: "event_id", value: raw.to_owned() })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for CommandArgs
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(name, value)| (name.into(), value.into())).collect())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    pub display_name: String,
}

impl Caller {
    pub fn new(user_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self { user_id: UserId(user_id.into()), display_name: display_name.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandInvocation {
    pub command: String,
    pub args: CommandArgs,
    pub caller: Caller,
    pub channel_id: String,
    pub request_id: String,
    /// Display names of the people the invocation addresses; `schedule` invites them.
    pub channel_members: Vec<String>,
}

impl CommandInvocation {
    pub fn new(command: impl Into<String>, caller: Caller) -> Self {
        Self {
            command: command.into(),
            args: CommandArgs::new(),
            caller,
            channel_id: String::new(),
            request_id: String::new(),
            channel_members: Vec::new(),
        }
    }

    pub fn arg(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.insert(name, value);
        self
    }

    pub fn args(mut self, args: CommandArgs) -> Self {
        self.args = args;
        self
    }

    pub fn channel(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = channel_id.into();
        self
    }

    pub fn request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn members(mut self, members: Vec<String>) -> Self {
        self.channel_members = members;
        self
    }
}

#[async_trait]
pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    async fn handle(&self, invocation: &CommandInvocation) -> Result<Reply, CommandError>;
}

/// Everything the built-in handlers need besides the invocation itself.
#[derive(Clone)]
pub struct CommandServices {
    pub registry: Arc<Registry>,
    pub inference: Arc<dyn InferenceService>,
    pub quotes: Arc<dyn QuoteService>,
    pub calendar: Option<Arc<dyn CalendarService>>,
    pub attendee_domain: String,
    pub command_prefix: String,
}

impl CommandServices {
    /// Wires the HTTP-backed services; the calendar stays `None` unless it is
    /// enabled and has an access token.
    pub fn from_config(
        config: &AppConfig,
        registry: Arc<Registry>,
        client: Arc<dyn ApiClient>,
    ) -> Self {
        let calendar = GoogleCalendar::from_config(client.clone(), &config.calendar)
            .map(|calendar| Arc::new(calendar) as Arc<dyn CalendarService>);

        Self {
            registry,
            inference: Arc::new(HuggingFaceInference::from_config(
                client.clone(),
                &config.inference,
            )),
            quotes: Arc::new(ZenQuotes::from_config(client, &config.quotes)),
            calendar,
            attendee_domain: config.calendar.attendee_domain.clone(),
            command_prefix: config.discord.command_prefix.clone(),
        }
    }
}

#[derive(Default)]
pub struct CommandDispatcher {
    handlers: HashMap<&'static str, Arc<dyn CommandHandler>>,
}

impl CommandDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: CommandHandler + 'static,
    {
        self.handlers.insert(handler.name(), Arc::new(handler));
    }

    /// Runs the handler registered under the exact command name.
    pub async fn execute(&self, invocation: &CommandInvocation) -> Result<Reply, CommandError> {
        let Some(handler) = self.handlers.get(invocation.command.as_str()) else {
            return Err(CommandError::UnknownCommand(invocation.command.clone()));
        };
        handler.handle(invocation).await
    }

    /// Like [`execute`](Self::execute) but never fails: errors become their
    /// user-facing text.
    pub async fn dispatch(&self, invocation: &CommandInvocation) -> Reply {
        info!(
            event_name = "command.dispatch.started",
            correlation_id = %invocation.request_id,
            command = %invocation.command,
            user_id = %invocation.caller.user_id,
            channel_id = %invocation.channel_id,
            "dispatching command"
        );

        match self.execute(invocation).await {
            Ok(reply) => {
                info!(
                    event_name = "command.dispatch.completed",
                    correlation_id = %invocation.request_id,
                    command = %invocation.command,
                    "command completed"
                );
                reply
            }
            Err(error) => {
                let event_name = match error {
                    CommandError::UnknownCommand(_) => "command.dispatch.unknown",
                    _ => "command.dispatch.failed",
                };
                warn!(
                    event_name,
                    correlation_id = %invocation.request_id,
                    command = %invocation.command,
                    error_class = error.class(),
                    error = %error,
                    "command failed; replying with fallback text"
                );
                Reply::new(error.user_message())
            }
        }
    }

    /// Registered `(name, description)` pairs sorted by name.
    pub fn catalog(&self) -> Vec<(&'static str, &'static str)> {
        let mut catalog: Vec<_> =
            self.handlers.values().map(|handler| (handler.name(), handler.description())).collect();
        catalog.sort_unstable();
        catalog
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

pub fn default_command_dispatcher(services: CommandServices) -> CommandDispatcher {
    let mut dispatcher = CommandDispatcher::new();
    dispatcher.register(HelloCommand);
    dispatcher.register(AddSkillsCommand { registry: services.registry.clone() });
    dispatcher.register(AskCommand { inference: services.inference.clone() });
    dispatcher.register(CreateEventCommand { registry: services.registry.clone() });
    dispatcher.register(ListEventsCommand { registry: services.registry.clone() });
    dispatcher.register(JoinEventCommand { registry: services.registry.clone() });
    dispatcher.register(LeaveEventCommand { registry: services.registry.clone() });
    dispatcher.register(ChallengeCommand);
    dispatcher.register(InspireCommand { quotes: services.quotes.clone() });
    dispatcher.register(ScheduleCommand {
        calendar: services.calendar.clone(),
        attendee_domain: services.attendee_domain.clone(),
    });

    let mut catalog = dispatcher.catalog();
    catalog.push((HelpCommand::NAME, HelpCommand::DESCRIPTION));
    catalog.sort_unstable();
    dispatcher.register(HelpCommand { catalog, prefix: services.command_prefix });
    dispatcher
}

pub struct HelloCommand;

#[async_trait]
impl CommandHandler for HelloCommand {
    fn name(&self) -> &'static str {
        "hello"
    }

    fn description(&self) -> &'static str {
        "Say hello"
    }

    async fn handle(&self, invocation: &CommandInvocation) -> Result<Reply, CommandError> {
        Ok(replies::hello(&invocation.caller.display_name))
    }
}

pub struct AddSkillsCommand {
    registry: Arc<Registry>,
}

#[async_trait]
impl CommandHandler for AddSkillsCommand {
    fn name(&self) -> &'static str {
        "add_skills"
    }

    fn description(&self) -> &'static str {
        "Record your skills as a comma-separated list"
    }

    async fn handle(&self, invocation: &CommandInvocation) -> Result<Reply, CommandError> {
        let skills = parse_skills(invocation.args.required("skills")?);
        self.registry
            .put_user(UserProfile::with_skills(invocation.caller.user_id.clone(), skills.clone()))
            .await;
        Ok(replies::skills_added(&invocation.caller.display_name, &skills))
    }
}

pub struct AskCommand {
    inference: Arc<dyn InferenceService>,
}

#[async_trait]
impl CommandHandler for AskCommand {
    fn name(&self) -> &'static str {
        "ask"
    }

    fn description(&self) -> &'static str {
        "Ask the AI a question"
    }

    async fn handle(&self, invocation: &CommandInvocation) -> Result<Reply, CommandError> {
        let question = invocation.args.get("question").unwrap_or_default();
        if question.trim().is_empty() {
            return Ok(replies::question_required());
        }

        let text = self.inference.generate(question).await?;
        Ok(replies::answer(&text))
    }
}

pub struct CreateEventCommand {
    registry: Arc<Registry>,
}

#[async_trait]
impl CommandHandler for CreateEventCommand {
    fn name(&self) -> &'static str {
        "create_event"
    }

    fn description(&self) -> &'static str {
        "Create an event: name | time"
    }

    async fn handle(&self, invocation: &CommandInvocation) -> Result<Reply, CommandError> {
        let name = invocation.args.required("name")?;
        let time = invocation.args.required("time")?;
        let event =
            self.registry.put_event(name, time, invocation.caller.user_id.clone()).await;
        Ok(replies::event_created(&event))
    }
}

pub struct ListEventsCommand {
    registry: Arc<Registry>,
}

#[async_trait]
impl CommandHandler for ListEventsCommand {
    fn name(&self) -> &'static str {
        "list_events"
    }

    fn description(&self) -> &'static str {
        "List all events"
    }

    async fn handle(&self, _invocation: &CommandInvocation) -> Result<Reply, CommandError> {
        let events = self.registry.all_events_ordered_by_id().await;
        Ok(replies::event_listing(&events))
    }
}

pub struct JoinEventCommand {
    registry: Arc<Registry>,
}

#[async_trait]
impl CommandHandler for JoinEventCommand {
    fn name(&self) -> &'static str {
        "join_event"
    }

    fn description(&self) -> &'static str {
        "Join an event by id"
    }

    async fn handle(&self, invocation: &CommandInvocation) -> Result<Reply, CommandError> {
        let event_id = invocation.args.event_id()?;
        let event = self.registry.add_participant(event_id, &invocation.caller.user_id).await?;
        Ok(replies::event_joined(&event))
    }
}

pub struct LeaveEventCommand {
    registry: Arc<Registry>,
}

#[async_trait]
impl CommandHandler for LeaveEventCommand {
    fn name(&self) -> &'static str {
        "leave_event"
    }

    fn description(&self) -> &'static str {
        "Leave an event by id"
    }

    async fn handle(&self, invocation: &CommandInvocation) -> Result<Reply, CommandError> {
        let event_id = invocation.args.event_id()?;
        let event =
            self.registry.remove_participant(event_id, &invocation.caller.user_id).await?;
        Ok(replies::event_left(&event))
    }
}

pub struct ChallengeCommand;

#[async_trait]
impl CommandHandler for ChallengeCommand {
    fn name(&self) -> &'static str {
        "challenge"
    }

    fn description(&self) -> &'static str {
        "Get a random collaboration challenge"
    }

    async fn handle(&self, _invocation: &CommandInvocation) -> Result<Reply, CommandError> {
        let pick = CHALLENGES.choose(&mut rand::thread_rng()).copied().unwrap_or(CHALLENGES[0]);
        Ok(replies::challenge(pick))
    }
}

pub struct InspireCommand {
    quotes: Arc<dyn QuoteService>,
}

#[async_trait]
impl CommandHandler for InspireCommand {
    fn name(&self) -> &'static str {
        "inspire"
    }

    fn description(&self) -> &'static str {
        "Get an inspirational quote"
    }

    async fn handle(&self, _invocation: &CommandInvocation) -> Result<Reply, CommandError> {
        let quote = self.quotes.random_quote().await?;
        Ok(replies::inspiration(&quote.to_string()))
    }
}

pub struct ScheduleCommand {
    calendar: Option<Arc<dyn CalendarService>>,
    attendee_domain: String,
}

#[async_trait]
impl CommandHandler for ScheduleCommand {
    fn name(&self) -> &'static str {
        "schedule"
    }

    fn description(&self) -> &'static str {
        "Schedule a meeting: summary | start | end"
    }

    async fn handle(&self, invocation: &CommandInvocation) -> Result<Reply, CommandError> {
        let Some(calendar) = &self.calendar else {
            return Err(CommandError::Unavailable("calendar"));
        };

        let meeting = MeetingRequest {
            summary: invocation.args.required("summary")?.to_owned(),
            start: invocation.args.required("start")?.to_owned(),
            end: invocation.args.required("end")?.to_owned(),
            attendees: attendee_emails(
                invocation.channel_members.iter().map(String::as_str),
                &self.attendee_domain,
            ),
        };
        let link = calendar.schedule(&meeting).await?;
        Ok(replies::meeting_scheduled(&link))
    }
}

pub struct HelpCommand {
    catalog: Vec<(&'static str, &'static str)>,
    prefix: String,
}

impl HelpCommand {
    const NAME: &'static str = "help";
    const DESCRIPTION: &'static str = "Show this list";
}

#[async_trait]
impl CommandHandler for HelpCommand {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        Self::DESCRIPTION
    }

    async fn handle(&self, _invocation: &CommandInvocation) -> Result<Reply, CommandError> {
        Ok(replies::help(&self.catalog, &self.prefix))
    }
}
