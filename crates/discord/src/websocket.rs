use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crewbot_core::config::DiscordConfig;

use crate::commands::CommandArgs;
use crate::events::{DiscordEnvelope, DiscordEvent, InteractionEvent, MessageEvent, ReplyTarget};
use crate::gateway::{GatewayError, GatewayTransport};
use crate::replies::Reply;
use crate::slash::SlashCommand;

/// GUILDS | GUILD_MESSAGES | DIRECT_MESSAGES | MESSAGE_CONTENT
const GATEWAY_INTENTS: u64 = 37377;
const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg";
const APPLICATION_COMMAND: u8 = 2;
const DEFERRED_CHANNEL_MESSAGE_WITH_SOURCE: u8 = 5;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWrite = SplitSink<WsStream, Message>;
type SessionEvent = Result<DiscordEnvelope, GatewayError>;

/// A live gateway connection. The socket is owned by a spawned task so that
/// heartbeats keep flowing while handlers run.
struct GatewaySession {
    events: mpsc::UnboundedReceiver<SessionEvent>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

struct RestClient {
    http: reqwest::Client,
    bot_token: SecretString,
    api_base_url: String,
}

impl RestClient {
    fn authorization(&self) -> String {
        format!("Bot {}", self.bot_token.expose_secret())
    }

    async fn send_json(&self, method: Method, url: &str, body: &Value) -> Result<(), String> {
        let response = self
            .http
            .request(method, url)
            .header("Authorization", self.authorization())
            .json(body)
            .send()
            .await
            .map_err(|error| error.to_string())?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let detail = response.text().await.unwrap_or_default();
        Err(format!("status {status}: {detail}"))
    }

    async fn gateway_url(&self) -> Result<String, GatewayError> {
        #[derive(Deserialize)]
        struct GatewayBot {
            url: Option<String>,
        }

        let response = self
            .http
            .get(format!("{}/gateway/bot", self.api_base_url))
            .header("Authorization", self.authorization())
            .send()
            .await
            .map_err(|error| GatewayError::Connect(error.to_string()))?;
        if !response.status().is_success() {
            return Err(GatewayError::Connect(format!(
                "gateway lookup returned status {}",
                response.status()
            )));
        }
        let body: GatewayBot =
            response.json().await.map_err(|error| GatewayError::Connect(error.to_string()))?;
        Ok(body.url.unwrap_or_else(|| DEFAULT_GATEWAY_URL.to_owned()))
    }

    /// Bulk-overwrites the application's global commands.
    async fn register_commands(
        &self,
        application_id: &str,
        commands: &[SlashCommand],
    ) -> Result<(), String> {
        let body = serde_json::to_value(commands).map_err(|error| error.to_string())?;
        let url = format!("{}/applications/{application_id}/commands", self.api_base_url);
        self.send_json(Method::PUT, &url, &body).await
    }
}

/// Gateway websocket for inbound events plus the REST API for replies.
pub struct DiscordGatewayTransport {
    rest: Arc<RestClient>,
    gateway_url: Option<String>,
    slash_commands: Arc<Vec<SlashCommand>>,
    session: Mutex<Option<GatewaySession>>,
}

impl DiscordGatewayTransport {
    pub fn new(
        bot_token: SecretString,
        api_base_url: impl Into<String>,
        gateway_url: Option<String>,
    ) -> Self {
        Self {
            rest: Arc::new(RestClient {
                http: reqwest::Client::new(),
                bot_token,
                api_base_url: api_base_url.into().trim_end_matches('/').to_owned(),
            }),
            gateway_url,
            slash_commands: Arc::new(Vec::new()),
            session: Mutex::new(None),
        }
    }

    pub fn from_config(config: &DiscordConfig) -> Self {
        Self::new(config.bot_token.clone(), config.api_base_url.clone(), config.gateway_url.clone())
    }

    /// Commands to register each time the session becomes ready.
    pub fn with_commands(mut self, commands: Vec<SlashCommand>) -> Self {
        self.slash_commands = Arc::new(commands);
        self
    }

    async fn close_session(&self) -> Result<(), GatewayError> {
        let Some(mut session) = self.session.lock().await.take() else {
            return Ok(());
        };
        if let Some(shutdown) = session.shutdown.take() {
            let _ = shutdown.send(());
        }
        session.task.await.map_err(|error| GatewayError::Disconnect(error.to_string()))
    }
}

#[async_trait]
impl GatewayTransport for DiscordGatewayTransport {
    async fn connect(&self) -> Result<(), GatewayError> {
        self.close_session().await?;

        let base = match &self.gateway_url {
            Some(url) => url.clone(),
            None => self.rest.gateway_url().await?,
        };
        let url = websocket_url(&base);
        info!(event_name = "gateway.discord.connecting", url = %url, "connecting to discord gateway");

        let (stream, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|error| GatewayError::Connect(error.to_string()))?;
        let (mut write, mut read) = stream.split();

        let interval_ms = read_hello(&mut read).await?;
        let identify = json!({
            "op": 2,
            "d": {
                "token": self.rest.bot_token.expose_secret(),
                "intents": GATEWAY_INTENTS,
                "properties": { "os": std::env::consts::OS, "browser": "crewbot", "device": "crewbot" }
            }
        });
        send_payload(&mut write, &identify).await.map_err(|error| match error {
            GatewayError::Receive(detail) => GatewayError::Connect(detail),
            other => other,
        })?;

        let (events_tx, events) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown) = oneshot::channel();
        let session = SessionTask {
            write,
            read,
            heartbeat_period: Duration::from_millis(interval_ms.max(1)),
            rest: self.rest.clone(),
            slash_commands: self.slash_commands.clone(),
            events: events_tx,
        };
        let task = tokio::spawn(session.run(shutdown));
        *self.session.lock().await =
            Some(GatewaySession { events, shutdown: Some(shutdown_tx), task });

        info!(
            event_name = "gateway.discord.identified",
            heartbeat_interval_ms = interval_ms,
            "discord gateway identified"
        );
        Ok(())
    }

    async fn next_event(&self) -> Result<Option<DiscordEnvelope>, GatewayError> {
        let mut guard = self.session.lock().await;
        let session =
            guard.as_mut().ok_or_else(|| GatewayError::Receive("not connected".to_owned()))?;

        match session.events.recv().await {
            Some(Ok(envelope)) => Ok(Some(envelope)),
            Some(Err(error)) => Err(error),
            None => Err(GatewayError::Receive("gateway session ended".to_owned())),
        }
    }

    async fn acknowledge(&self, target: &ReplyTarget) -> Result<(), GatewayError> {
        let Some((url, body)) = acknowledge_request(&self.rest.api_base_url, target) else {
            return Ok(());
        };
        self.rest.send_json(Method::POST, &url, &body).await.map_err(GatewayError::Reply)
    }

    async fn reply(&self, target: &ReplyTarget, reply: &Reply) -> Result<(), GatewayError> {
        let (method, url, body) = reply_request(&self.rest.api_base_url, target, reply);
        self.rest.send_json(method, &url, &body).await.map_err(GatewayError::Reply)
    }

    async fn disconnect(&self) -> Result<(), GatewayError> {
        self.close_session().await
    }
}

/// Interactions get a deferred response right away; the real answer edits it.
fn acknowledge_request(api_base_url: &str, target: &ReplyTarget) -> Option<(String, Value)> {
    let ReplyTarget::Interaction { interaction_id, token, .. } = target else {
        return None;
    };
    Some((
        format!("{api_base_url}/interactions/{interaction_id}/{token}/callback"),
        json!({ "type": DEFERRED_CHANNEL_MESSAGE_WITH_SOURCE }),
    ))
}

fn reply_request(api_base_url: &str, target: &ReplyTarget, reply: &Reply) -> (Method, String, Value) {
    match target {
        ReplyTarget::Channel { channel_id, reply_to } => {
            let mut body = json!({ "content": reply.content });
            if let Some(message_id) = reply_to {
                body["message_reference"] =
                    json!({ "message_id": message_id, "fail_if_not_exists": false });
            }
            (Method::POST, format!("{api_base_url}/channels/{channel_id}/messages"), body)
        }
        ReplyTarget::Interaction { application_id, token, .. } => (
            Method::PATCH,
            format!("{api_base_url}/webhooks/{application_id}/{token}/messages/@original"),
            json!({ "content": reply.content }),
        ),
    }
}

struct SessionTask {
    write: WsWrite,
    read: SplitStream<WsStream>,
    heartbeat_period: Duration,
    rest: Arc<RestClient>,
    slash_commands: Arc<Vec<SlashCommand>>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionTask {
    async fn run(mut self, mut shutdown: oneshot::Receiver<()>) {
        let mut state = SessionState::default();
        let period = self.heartbeat_period;
        let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);

        let outcome = loop {
            tokio::select! {
                _ = &mut shutdown => break Ok(()),
                _ = heartbeat.tick() => {
                    let payload = match state.heartbeat_due() {
                        Ok(payload) => payload,
                        Err(error) => break Err(error),
                    };
                    if let Err(error) = send_payload(&mut self.write, &payload).await {
                        break Err(error);
                    }
                }
                frame = self.read.next() => {
                    let text = match frame {
                        None => break Err(GatewayError::Receive("gateway stream ended".to_owned())),
                        Some(Err(error)) => break Err(GatewayError::Receive(error.to_string())),
                        Some(Ok(Message::Close(frame))) => {
                            break Err(GatewayError::Receive(format!("gateway closed: {frame:?}")))
                        }
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(_)) => continue,
                    };
                    let payload: GatewayPayload = match serde_json::from_str(text.as_str()) {
                        Ok(payload) => payload,
                        Err(error) => {
                            debug!(error = %error, "skipping undecodable gateway frame");
                            continue;
                        }
                    };

                    match state.apply(payload) {
                        SessionStep::Skip => {}
                        SessionStep::Heartbeat => {
                            let payload = heartbeat_payload(state.sequence);
                            if let Err(error) = send_payload(&mut self.write, &payload).await {
                                break Err(error);
                            }
                        }
                        SessionStep::Ready(ready) => self.on_ready(ready),
                        SessionStep::Event(envelope) => {
                            if self.events.send(Ok(envelope)).is_err() {
                                break Ok(());
                            }
                        }
                        SessionStep::Fail(error) => break Err(error),
                    }
                }
            }
        };

        if let Err(error) = self.write.close().await {
            debug!(error = %error, "gateway socket close failed");
        }
        if let Err(error) = outcome {
            warn!(event_name = "gateway.discord.session_ended", error = %error, "gateway session ended");
            let _ = self.events.send(Err(error));
        }
    }

    fn on_ready(&self, ready: Ready) {
        info!(
            event_name = "gateway.discord.ready",
            bot_user_id = %ready.user.id,
            "discord session ready"
        );
        let Some(application) = ready.application else {
            return;
        };
        if self.slash_commands.is_empty() {
            return;
        }

        let rest = self.rest.clone();
        let commands = self.slash_commands.clone();
        tokio::spawn(async move {
            match rest.register_commands(&application.id, &commands).await {
                Ok(()) => info!(
                    event_name = "gateway.discord.commands_registered",
                    application_id = %application.id,
                    command_count = commands.len(),
                    "slash commands registered"
                ),
                Err(error) => warn!(
                    event_name = "gateway.discord.commands_failed",
                    application_id = %application.id,
                    error = %error,
                    "slash command registration failed"
                ),
            }
        });
    }
}

enum SessionStep {
    Skip,
    Heartbeat,
    Ready(Ready),
    Event(DiscordEnvelope),
    Fail(GatewayError),
}

/// Per-connection protocol state, kept apart from the socket.
struct SessionState {
    sequence: Option<u64>,
    self_user_id: Option<String>,
    heartbeat_acked: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self { sequence: None, self_user_id: None, heartbeat_acked: true }
    }
}

impl SessionState {
    /// The heartbeat timer fired. A previous beat without an op 11 ack means
    /// the connection is dead even if the socket looks open.
    fn heartbeat_due(&mut self) -> Result<Value, GatewayError> {
        if !self.heartbeat_acked {
            return Err(GatewayError::Receive("heartbeat was not acknowledged".to_owned()));
        }
        self.heartbeat_acked = false;
        Ok(heartbeat_payload(self.sequence))
    }

    fn apply(&mut self, payload: GatewayPayload) -> SessionStep {
        if let Some(sequence) = payload.s {
            self.sequence = Some(sequence);
        }

        match payload.op {
            0 => {}
            1 => return SessionStep::Heartbeat,
            7 => {
                return SessionStep::Fail(GatewayError::Receive(
                    "gateway requested reconnect".to_owned(),
                ))
            }
            9 => {
                return SessionStep::Fail(GatewayError::Receive(
                    "gateway session invalidated".to_owned(),
                ))
            }
            11 => {
                self.heartbeat_acked = true;
                return SessionStep::Skip;
            }
            _ => return SessionStep::Skip,
        }

        let event_type = payload.t.unwrap_or_default();
        if event_type == "READY" {
            return match serde_json::from_value::<Ready>(payload.d) {
                Ok(ready) => {
                    self.self_user_id = Some(ready.user.id.clone());
                    SessionStep::Ready(ready)
                }
                Err(_) => SessionStep::Skip,
            };
        }

        decode_dispatch(&event_type, payload.d, self.self_user_id.as_deref())
            .map(SessionStep::Event)
            .unwrap_or(SessionStep::Skip)
    }
}

async fn read_hello(read: &mut SplitStream<WsStream>) -> Result<u64, GatewayError> {
    while let Some(frame) = read.next().await {
        let frame = frame.map_err(|error| GatewayError::Connect(error.to_string()))?;
        let Message::Text(text) = frame else {
            continue;
        };
        let payload: GatewayPayload = serde_json::from_str(text.as_str())
            .map_err(|error| GatewayError::Connect(format!("malformed hello: {error}")))?;
        if payload.op != 10 {
            return Err(GatewayError::Connect(format!("expected hello, got op {}", payload.op)));
        }
        let hello: Hello = serde_json::from_value(payload.d)
            .map_err(|error| GatewayError::Connect(format!("malformed hello: {error}")))?;
        return Ok(hello.heartbeat_interval);
    }
    Err(GatewayError::Connect("gateway closed before hello".to_owned()))
}

async fn send_payload(write: &mut WsWrite, payload: &Value) -> Result<(), GatewayError> {
    write.send(Message::text(payload.to_string())).await.map_err(|error| {
        warn!(event_name = "gateway.discord.send_failed", error = %error, "gateway send failed");
        GatewayError::Receive(error.to_string())
    })
}

fn heartbeat_payload(sequence: Option<u64>) -> Value {
    json!({ "op": 1, "d": sequence })
}

fn websocket_url(base: &str) -> String {
    if base.contains('?') {
        base.to_owned()
    } else {
        format!("{}/?v=10&encoding=json", base.trim_end_matches('/'))
    }
}

#[derive(Deserialize)]
struct GatewayPayload {
    op: u8,
    #[serde(default)]
    d: Value,
    s: Option<u64>,
    t: Option<String>,
}

#[derive(Deserialize)]
struct Hello {
    heartbeat_interval: u64,
}

#[derive(Deserialize)]
struct Ready {
    user: DiscordUser,
    application: Option<ReadyApplication>,
}

#[derive(Deserialize)]
struct ReadyApplication {
    id: String,
}

#[derive(Deserialize)]
struct DiscordUser {
    id: String,
    username: String,
    #[serde(default)]
    bot: bool,
}

#[derive(Deserialize)]
struct MessageCreate {
    id: String,
    channel_id: String,
    author: DiscordUser,
    #[serde(default)]
    content: String,
    #[serde(default)]
    mentions: Vec<DiscordUser>,
}

#[derive(Deserialize)]
struct InteractionCreate {
    id: String,
    application_id: String,
    token: String,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    channel_id: Option<String>,
    data: Option<InteractionData>,
    member: Option<GuildMember>,
    user: Option<DiscordUser>,
}

#[derive(Deserialize)]
struct GuildMember {
    user: DiscordUser,
}

#[derive(Deserialize)]
struct InteractionData {
    name: String,
    #[serde(default)]
    options: Vec<InteractionOption>,
}

#[derive(Deserialize)]
struct InteractionOption {
    name: String,
    value: Option<Value>,
}

/// Turns one dispatch (op 0) payload into an envelope. Messages written by
/// `self_user_id` and payloads that fail to decode yield `None`.
fn decode_dispatch(
    event_type: &str,
    data: Value,
    self_user_id: Option<&str>,
) -> Option<DiscordEnvelope> {
    match event_type {
        "MESSAGE_CREATE" => {
            let message: MessageCreate = serde_json::from_value(data).ok()?;
            if self_user_id == Some(message.author.id.as_str()) {
                return None;
            }
            Some(DiscordEnvelope {
                event_id: message.id.clone(),
                event: DiscordEvent::Message(MessageEvent {
                    message_id: message.id,
                    channel_id: message.channel_id,
                    author_id: message.author.id,
                    author_name: message.author.username,
                    author_is_bot: message.author.bot,
                    content: message.content,
                    mentions: message.mentions.into_iter().map(|user| user.username).collect(),
                }),
            })
        }
        "INTERACTION_CREATE" => {
            let interaction: InteractionCreate = serde_json::from_value(data).ok()?;
            if interaction.kind != APPLICATION_COMMAND {
                return None;
            }
            let data = interaction.data?;
            let user = interaction.member.map(|member| member.user).or(interaction.user)?;
            let options: CommandArgs = data
                .options
                .into_iter()
                .filter_map(|option| option_text(option.value?).map(|value| (option.name, value)))
                .collect();

            Some(DiscordEnvelope {
                event_id: interaction.id.clone(),
                event: DiscordEvent::Interaction(InteractionEvent {
                    interaction_id: interaction.id,
                    application_id: interaction.application_id,
                    token: interaction.token,
                    command: data.name,
                    options,
                    channel_id: interaction.channel_id.unwrap_or_default(),
                    user_id: user.id,
                    user_name: user.username,
                }),
            })
        }
        other => Some(DiscordEnvelope {
            event_id: format!("dispatch-{}", other.to_ascii_lowercase()),
            event: DiscordEvent::Unsupported { event_type: other.to_owned() },
        }),
    }
}

fn option_text(value: Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use reqwest::Method;

    use super::{
        acknowledge_request, decode_dispatch, heartbeat_payload, reply_request, websocket_url,
        GatewayPayload, SessionState, SessionStep,
    };
    use crate::events::{DiscordEvent, ReplyTarget};
    use crate::replies::Reply;

    fn payload(value: serde_json::Value) -> GatewayPayload {
        serde_json::from_value(value).expect("gateway payload")
    }

    fn interaction_target() -> ReplyTarget {
        ReplyTarget::Interaction {
            interaction_id: "i-1".to_owned(),
            application_id: "A1".to_owned(),
            token: "tok".to_owned(),
        }
    }

    #[test]
    fn message_create_decodes_author_and_mentions() {
        let envelope = decode_dispatch(
            "MESSAGE_CREATE",
            json!({
                "id": "m-9",
                "channel_id": "C1",
                "author": { "id": "U1", "username": "ana" },
                "content": "!schedule Sync | a | b",
                "mentions": [{ "id": "U2", "username": "bo" }]
            }),
            Some("B0"),
        )
        .expect("envelope");

        let DiscordEvent::Message(message) = envelope.event else {
            panic!("expected message event");
        };
        assert_eq!(envelope.event_id, "m-9");
        assert_eq!(message.author_name, "ana");
        assert!(!message.author_is_bot);
        assert_eq!(message.mentions, vec!["bo"]);
    }

    #[test]
    fn own_messages_are_dropped() {
        let envelope = decode_dispatch(
            "MESSAGE_CREATE",
            json!({
                "id": "m-10",
                "channel_id": "C1",
                "author": { "id": "B0", "username": "crewbot", "bot": true },
                "content": "Hello, ana!"
            }),
            Some("B0"),
        );
        assert!(envelope.is_none());
    }

    #[test]
    fn slash_command_options_are_flattened_to_text() {
        let envelope = decode_dispatch(
            "INTERACTION_CREATE",
            json!({
                "id": "i-1",
                "application_id": "A1",
                "token": "tok",
                "type": 2,
                "channel_id": "C1",
                "member": { "user": { "id": "U1", "username": "ana" } },
                "data": {
                    "name": "join_event",
                    "options": [{ "name": "event_id", "type": 4, "value": 3 }]
                }
            }),
            None,
        )
        .expect("envelope");

        let DiscordEvent::Interaction(interaction) = envelope.event else {
            panic!("expected interaction event");
        };
        assert_eq!(interaction.command, "join_event");
        assert_eq!(interaction.options.get("event_id"), Some("3"));
        assert_eq!(interaction.user_name, "ana");
        assert_eq!(interaction.application_id, "A1");
    }

    #[test]
    fn non_command_interactions_are_dropped() {
        let envelope = decode_dispatch(
            "INTERACTION_CREATE",
            json!({ "id": "i-2", "application_id": "A1", "token": "tok", "type": 3, "user": { "id": "U1", "username": "ana" } }),
            None,
        );
        assert!(envelope.is_none());
    }

    #[test]
    fn other_dispatches_are_unsupported() {
        let envelope = decode_dispatch("TYPING_START", json!({}), None).expect("envelope");
        assert_eq!(envelope.event, DiscordEvent::Unsupported { event_type: "TYPING_START".to_owned() });
    }

    #[test]
    fn heartbeat_carries_last_sequence() {
        assert_eq!(heartbeat_payload(None), json!({ "op": 1, "d": null }));
        assert_eq!(heartbeat_payload(Some(42)), json!({ "op": 1, "d": 42 }));
    }

    #[test]
    fn websocket_url_adds_version_query() {
        assert_eq!(
            websocket_url("wss://gateway.discord.gg"),
            "wss://gateway.discord.gg/?v=10&encoding=json"
        );
        assert_eq!(websocket_url("ws://127.0.0.1:9000/?v=10"), "ws://127.0.0.1:9000/?v=10");
    }

    #[test]
    fn interactions_are_deferred_then_edited() {
        let api = "https://discord.test/api/v10";

        let (url, body) = acknowledge_request(api, &interaction_target()).expect("ack");
        assert_eq!(url, "https://discord.test/api/v10/interactions/i-1/tok/callback");
        assert_eq!(body, json!({ "type": 5 }));

        let (method, url, body) = reply_request(api, &interaction_target(), &Reply::new("done"));
        assert_eq!(method, Method::PATCH);
        assert_eq!(url, "https://discord.test/api/v10/webhooks/A1/tok/messages/@original");
        assert_eq!(body, json!({ "content": "done" }));
    }

    #[test]
    fn channel_replies_need_no_acknowledgement() {
        let target = ReplyTarget::Channel { channel_id: "C1".to_owned(), reply_to: Some("m-1".to_owned()) };

        assert!(acknowledge_request("https://discord.test", &target).is_none());
        let (method, url, body) = reply_request("https://discord.test", &target, &Reply::new("hi"));
        assert_eq!(method, Method::POST);
        assert_eq!(url, "https://discord.test/channels/C1/messages");
        assert_eq!(body["message_reference"]["message_id"], "m-1");
    }

    #[test]
    fn unacknowledged_heartbeat_fails_the_session() {
        let mut state = SessionState::default();

        assert_eq!(state.heartbeat_due().expect("first beat"), json!({ "op": 1, "d": null }));
        assert!(matches!(state.apply(payload(json!({ "op": 11 }))), SessionStep::Skip));
        assert!(state.heartbeat_due().is_ok());
        assert!(state.heartbeat_due().is_err(), "second beat without op 11 means a stale link");
    }

    #[test]
    fn heartbeats_carry_the_latest_sequence() {
        let mut state = SessionState::default();
        state.apply(payload(json!({ "op": 0, "s": 7, "t": "TYPING_START", "d": {} })));

        assert!(matches!(state.apply(payload(json!({ "op": 1 }))), SessionStep::Heartbeat));
        assert_eq!(state.heartbeat_due().expect("beat"), json!({ "op": 1, "d": 7 }));
    }

    #[test]
    fn ready_records_identity_and_application() {
        let mut state = SessionState::default();
        let step = state.apply(payload(json!({
            "op": 0,
            "s": 1,
            "t": "READY",
            "d": { "user": { "id": "B0", "username": "crewbot", "bot": true }, "application": { "id": "A1" } }
        })));

        let SessionStep::Ready(ready) = step else {
            panic!("expected ready");
        };
        assert_eq!(ready.application.map(|application| application.id), Some("A1".to_owned()));
        assert_eq!(state.self_user_id.as_deref(), Some("B0"));

        let own = state.apply(payload(json!({
            "op": 0,
            "t": "MESSAGE_CREATE",
            "d": { "id": "m-1", "channel_id": "C1", "author": { "id": "B0", "username": "crewbot" }, "content": "hi" }
        })));
        assert!(matches!(own, SessionStep::Skip));
    }

    #[test]
    fn reconnect_and_invalid_session_fail_the_session() {
        let mut state = SessionState::default();
        assert!(matches!(state.apply(payload(json!({ "op": 7 }))), SessionStep::Fail(_)));
        assert!(matches!(state.apply(payload(json!({ "op": 9, "d": false }))), SessionStep::Fail(_)));
    }
}
