use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::events::{DiscordEnvelope, EventContext, EventDispatcher, HandlerResult, ReplyTarget};
use crate::replies::Reply;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("gateway failed to connect: {0}")]
    Connect(String),
    #[error("gateway read failed: {0}")]
    Receive(String),
    #[error("reply delivery failed: {0}")]
    Reply(String),
    #[error("gateway disconnect failed: {0}")]
    Disconnect(String),
}

/// Connection supervision for the gateway session. This is not a retry policy
/// for individual API calls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

#[async_trait]
pub trait GatewayTransport: Send + Sync {
    async fn connect(&self) -> Result<(), GatewayError>;
    /// `Ok(None)` means the stream ended cleanly and the runner should stop.
    async fn next_event(&self) -> Result<Option<DiscordEnvelope>, GatewayError>;
    /// Called before the event is dispatched. Targets with an answer deadline
    /// are acknowledged here so a slow handler cannot miss it.
    async fn acknowledge(&self, _target: &ReplyTarget) -> Result<(), GatewayError> {
        Ok(())
    }
    async fn reply(&self, target: &ReplyTarget, reply: &Reply) -> Result<(), GatewayError>;
    async fn disconnect(&self) -> Result<(), GatewayError>;
}

#[derive(Default)]
pub struct NoopGatewayTransport;

#[async_trait]
impl GatewayTransport for NoopGatewayTransport {
    async fn connect(&self) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn next_event(&self) -> Result<Option<DiscordEnvelope>, GatewayError> {
        Ok(None)
    }

    async fn reply(&self, _target: &ReplyTarget, _reply: &Reply) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), GatewayError> {
        Ok(())
    }
}

pub struct GatewayRunner {
    transport: Arc<dyn GatewayTransport>,
    dispatcher: EventDispatcher,
    reconnect_policy: ReconnectPolicy,
}

impl Default for GatewayRunner {
    fn default() -> Self {
        Self {
            transport: Arc::new(NoopGatewayTransport),
            dispatcher: EventDispatcher::default(),
            reconnect_policy: ReconnectPolicy::default(),
        }
    }
}

impl GatewayRunner {
    pub fn new(
        transport: Arc<dyn GatewayTransport>,
        dispatcher: EventDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher, reconnect_policy }
    }

    /// Pumps events until the transport ends its stream or reconnects are
    /// exhausted. A session that got connected resets the attempt counter.
    pub async fn start(&self) -> Result<()> {
        let mut attempt = 0;
        loop {
            let mut connected = false;
            let Err(gateway_error) = self.connect_and_pump(attempt, &mut connected).await else {
                return Ok(());
            };
            if connected {
                attempt = 0;
            }

            warn!(
                event_name = "gateway.session.failed",
                attempt,
                max_retries = self.reconnect_policy.max_retries,
                error = %gateway_error,
                "gateway transport failed"
            );

            if attempt >= self.reconnect_policy.max_retries {
                warn!(
                    event_name = "gateway.session.exhausted",
                    max_retries = self.reconnect_policy.max_retries,
                    "gateway retries exhausted; continuing process without crash"
                );
                return Ok(());
            }

            let delay = self.reconnect_policy.backoff(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempt += 1;
        }
    }

    async fn connect_and_pump(
        &self,
        attempt: u32,
        connected: &mut bool,
    ) -> Result<(), GatewayError> {
        info!(event_name = "gateway.session.connecting", attempt, "opening gateway connection");
        self.transport.connect().await?;
        *connected = true;
        info!(event_name = "gateway.session.connected", attempt, "gateway connected");

        loop {
            let Some(envelope) = self.transport.next_event().await? else {
                info!(event_name = "gateway.session.closed", attempt, "gateway stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };

            info!(
                event_name = "ingress.discord.event_received",
                event_id = %envelope.event_id,
                event_type = ?envelope.event.event_type(),
                correlation_id = %envelope.event_id,
                "received gateway event"
            );

            let target = envelope.reply_target();
            if let Some(target) = &target {
                if let Err(error) = self.transport.acknowledge(target).await {
                    warn!(
                        event_name = "egress.discord.ack_failed",
                        correlation_id = %envelope.event_id,
                        error = %error,
                        "failed to acknowledge event; dispatching anyway"
                    );
                }
            }

            let context = EventContext { correlation_id: envelope.event_id.clone() };
            let reply = match self.dispatcher.dispatch(&envelope, &context).await {
                Ok(HandlerResult::Responded(reply)) => reply,
                Ok(HandlerResult::Ignored) => continue,
                Err(error) => {
                    warn!(
                        event_name = "ingress.discord.dispatch_failed",
                        event_id = %envelope.event_id,
                        correlation_id = %envelope.event_id,
                        error = %error,
                        "event dispatch failed; continuing gateway loop"
                    );
                    continue;
                }
            };

            let Some(target) = target else {
                continue;
            };
            match self.transport.reply(&target, &reply).await {
                Ok(()) => debug!(
                    event_name = "egress.discord.reply_sent",
                    correlation_id = %envelope.event_id,
                    "reply sent"
                ),
                Err(error) => warn!(
                    event_name = "egress.discord.reply_failed",
                    correlation_id = %envelope.event_id,
                    error = %error,
                    "failed to deliver reply; continuing gateway loop"
                ),
            }
        }
    }
}
