use std::sync::Arc;

use anyhow::{bail, Context};
use crewbot_core::config::{AppConfig, LoadOptions};
use crewbot_core::Registry;
use crewbot_discord::{
    default_command_dispatcher, Caller, CommandArgs, CommandInvocation, CommandServices,
};
use crewbot_integrations::HttpApiClient;
use uuid::Uuid;

use super::{CommandResult, EXIT_COMMAND, EXIT_CONFIG};

const COMMAND: &str = "invoke";

/// Runs a single bot command against an empty registry. Network-backed
/// commands (`ask`, `inspire`, `schedule`) reach the configured endpoints.
pub fn run(command: &str, raw_args: &[String], user_id: &str, user_name: &str) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(COMMAND, "config_validation", error.to_string(), EXIT_CONFIG)
        }
    };

    let args = match parse_args(raw_args) {
        Ok(args) => args,
        Err(error) => {
            return CommandResult::failure(COMMAND, "invalid_argument", format!("{error:#}"), EXIT_COMMAND)
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "runtime",
                format!("failed to initialize async runtime: {error}"),
                EXIT_COMMAND,
            )
        }
    };

    let invocation = build_invocation(command, args, user_id, user_name);

    runtime.block_on(async {
        let services =
            CommandServices::from_config(&config, Arc::new(Registry::new()), Arc::new(HttpApiClient::new()));
        let dispatcher = default_command_dispatcher(services);

        match dispatcher.execute(&invocation).await {
            Ok(reply) => CommandResult::success(COMMAND, reply.content),
            Err(error) => {
                CommandResult::failure(COMMAND, error.class(), error.user_message(), EXIT_COMMAND)
            }
        }
    })
}

/// The caller is the only channel member; members are display names, the
/// same as the gateway supplies.
fn build_invocation(
    command: &str,
    args: CommandArgs,
    user_id: &str,
    user_name: &str,
) -> CommandInvocation {
    CommandInvocation::new(command, Caller::new(user_id, user_name))
        .args(args)
        .channel("cli")
        .request_id(Uuid::new_v4().to_string())
        .members(vec![user_name.to_string()])
}

fn parse_args(raw_args: &[String]) -> anyhow::Result<CommandArgs> {
    raw_args.iter().map(|raw| parse_assignment(raw)).collect()
}

fn parse_assignment(raw: &str) -> anyhow::Result<(String, String)> {
    let (key, value) = raw
        .split_once('=')
        .with_context(|| format!("argument `{raw}` must be written as key=value"))?;
    let key = key.trim();
    if key.is_empty() {
        bail!("argument `{raw}` has an empty key");
    }
    Ok((key.to_string(), value.to_string()))
}
