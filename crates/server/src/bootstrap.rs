use std::sync::Arc;

use crewbot_core::config::{AppConfig, ConfigError, LoadOptions};
use crewbot_core::Registry;
use crewbot_discord::{
    default_command_dispatcher, default_dispatcher, slash_commands, CommandDispatcher,
    CommandServices, DiscordGatewayTransport, GatewayRunner, GatewayTransport, ReconnectPolicy,
};
use crewbot_integrations::HttpApiClient;
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub registry: Arc<Registry>,
    pub commands: Arc<CommandDispatcher>,
    pub transport: Arc<dyn GatewayTransport>,
    pub gateway_runner: GatewayRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Loads configuration, failing fast before anything else starts.
pub fn load_config(options: LoadOptions) -> Result<AppConfig, BootstrapError> {
    Ok(AppConfig::load(options)?)
}

/// Builds the application around the real Discord gateway.
pub fn bootstrap_with_config(config: AppConfig) -> Application {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let discord = config.discord.clone();
    assemble(config, |commands| {
        Arc::new(
            DiscordGatewayTransport::from_config(&discord)
                .with_commands(slash_commands(&commands.catalog())),
        )
    })
}

/// Wires everything around the transport `connect` builds; it sees the
/// finished command dispatcher so it can advertise the commands.
pub fn assemble<F>(config: AppConfig, connect: F) -> Application
where
    F: FnOnce(&CommandDispatcher) -> Arc<dyn GatewayTransport>,
{
    let registry = Arc::new(Registry::new());
    let services =
        CommandServices::from_config(&config, registry.clone(), Arc::new(HttpApiClient::new()));
    let calendar_enabled = services.calendar.is_some();

    let commands = Arc::new(default_command_dispatcher(services));
    let transport = connect(commands.as_ref());
    let events = default_dispatcher(commands.clone(), config.discord.command_prefix.clone());
    let gateway_runner =
        GatewayRunner::new(transport.clone(), events, ReconnectPolicy::default());

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        command_count = commands.handler_count(),
        command_prefix = %config.discord.command_prefix,
        calendar_enabled,
        "application wired"
    );

    Application { config, registry, commands, transport, gateway_runner }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crewbot_core::config::{ConfigOverrides, LoadOptions};
    use crewbot_discord::{Caller, CommandInvocation, NoopGatewayTransport};

    use crate::bootstrap::{assemble, load_config};

    fn valid_overrides() -> ConfigOverrides {
        ConfigOverrides {
            discord_bot_token: Some("discord-test-token".to_string()),
            inference_api_key: Some("hf_test".to_string()),
            ..ConfigOverrides::default()
        }
    }

    #[test]
    fn bootstrap_fails_fast_on_invalid_config() {
        let result = load_config(LoadOptions {
            overrides: ConfigOverrides {
                command_prefix: Some("two words".to_string()),
                ..valid_overrides()
            },
            ..LoadOptions::default()
        });

        let message = result.err().expect("error").to_string();
        assert!(message.contains("discord.command_prefix"));
    }

    #[tokio::test]
    async fn assembled_application_shares_one_registry() {
        let config =
            load_config(LoadOptions { overrides: valid_overrides(), ..LoadOptions::default() })
                .expect("config should load with valid overrides");
        let app = assemble(config, |_| Arc::new(NoopGatewayTransport));

        let caller = Caller::new("U1", "ana");
        let reply = app
            .commands
            .dispatch(
                &CommandInvocation::new("create_event", caller)
                    .arg("name", "Study Group")
                    .arg("time", "5pm"),
            )
            .await;

        assert_eq!(reply.content, "Event 'Study Group' created! Time: 5pm. You are the first participant.");
        assert_eq!(app.registry.event_count().await, 1);
        app.gateway_runner.start().await.expect("noop transport ends immediately");
    }
}
