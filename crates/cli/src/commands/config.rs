use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crewbot_core::config::{AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

use super::{CommandResult, EXIT_CONFIG};

struct FieldSources {
    file_doc: Option<Value>,
    file_path: Option<PathBuf>,
}

impl FieldSources {
    fn detect() -> Self {
        let file_path = detect_config_path();
        let file_doc = load_config_file_doc(file_path.as_deref());
        Self { file_doc, file_path }
    }

    fn line(&self, key_path: &str, value: &str, env_keys: &[&str]) -> String {
        format!("- {key_path} = {value} (source: {})", self.source(key_path, env_keys))
    }

    fn source(&self, key_path: &str, env_keys: &[&str]) -> String {
        if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
            return format!("env ({env_key})");
        }

        if let Some(doc) = &self.file_doc {
            if contains_path(doc, key_path) {
                let file_path = self
                    .file_path
                    .as_ref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "config file".to_string());
                return format!("file ({file_path})");
            }
        }

        "default".to_string()
    }
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("config", "config_validation", error.to_string(), EXIT_CONFIG)
        }
    };

    CommandResult::text(0, render(&config, &FieldSources::detect()))
}

fn render(config: &AppConfig, sources: &FieldSources) -> String {
    let discord = &config.discord;
    let inference = &config.inference;
    let calendar = &config.calendar;

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(sources.line(
        "discord.bot_token",
        &redact_token(discord.bot_token.expose_secret()),
        &["CREWBOT_DISCORD_BOT_TOKEN", "DISCORD_TOKEN"],
    ));
    lines.push(sources.line(
        "discord.command_prefix",
        &discord.command_prefix,
        &["CREWBOT_DISCORD_COMMAND_PREFIX"],
    ));
    lines.push(sources.line(
        "discord.api_base_url",
        &discord.api_base_url,
        &["CREWBOT_DISCORD_API_BASE_URL"],
    ));
    lines.push(sources.line(
        "discord.gateway_url",
        discord.gateway_url.as_deref().unwrap_or("<discovered>"),
        &["CREWBOT_DISCORD_GATEWAY_URL"],
    ));

    lines.push(sources.line(
        "inference.api_key",
        &redact_token(inference.api_key.expose_secret()),
        &["CREWBOT_INFERENCE_API_KEY", "HF_API_KEY"],
    ));
    lines.push(sources.line(
        "inference.endpoint",
        &inference.endpoint,
        &["CREWBOT_INFERENCE_ENDPOINT"],
    ));
    lines.push(sources.line(
        "inference.timeout_secs",
        &inference.timeout_secs.to_string(),
        &["CREWBOT_INFERENCE_TIMEOUT_SECS"],
    ));

    lines.push(sources.line("quotes.endpoint", &config.quotes.endpoint, &["CREWBOT_QUOTES_ENDPOINT"]));
    lines.push(sources.line(
        "quotes.timeout_secs",
        &config.quotes.timeout_secs.to_string(),
        &["CREWBOT_QUOTES_TIMEOUT_SECS"],
    ));

    lines.push(sources.line(
        "calendar.enabled",
        &calendar.enabled.to_string(),
        &["CREWBOT_CALENDAR_ENABLED"],
    ));
    lines.push(sources.line(
        "calendar.access_token",
        &redact_optional(calendar.access_token.as_ref()),
        &["CREWBOT_CALENDAR_ACCESS_TOKEN"],
    ));
    lines.push(sources.line("calendar.base_url", &calendar.base_url, &["CREWBOT_CALENDAR_BASE_URL"]));
    lines.push(sources.line("calendar.calendar_id", &calendar.calendar_id, &["CREWBOT_CALENDAR_ID"]));
    lines.push(sources.line(
        "calendar.time_zone",
        &calendar.time_zone,
        &["CREWBOT_CALENDAR_TIME_ZONE"],
    ));
    lines.push(sources.line(
        "calendar.attendee_domain",
        &calendar.attendee_domain,
        &["CREWBOT_CALENDAR_ATTENDEE_DOMAIN"],
    ));

    lines.push(sources.line(
        "server.bind_address",
        &config.server.bind_address,
        &["CREWBOT_SERVER_BIND_ADDRESS"],
    ));
    lines.push(sources.line(
        "server.health_check_port",
        &config.server.health_check_port.to_string(),
        &["CREWBOT_SERVER_HEALTH_CHECK_PORT"],
    ));
    lines.push(sources.line(
        "server.graceful_shutdown_secs",
        &config.server.graceful_shutdown_secs.to_string(),
        &["CREWBOT_SERVER_GRACEFUL_SHUTDOWN_SECS"],
    ));

    lines.push(sources.line(
        "logging.level",
        &config.logging.level,
        &["CREWBOT_LOGGING_LEVEL", "CREWBOT_LOG_LEVEL"],
    ));
    lines.push(sources.line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        &["CREWBOT_LOGGING_FORMAT", "CREWBOT_LOG_FORMAT"],
    ));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("crewbot.toml"), PathBuf::from("config/crewbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn redact_optional(token: Option<&SecretString>) -> String {
    token.map(|token| redact_token(token.expose_secret())).unwrap_or_else(|| "<unset>".to_string())
}

/// Keeps a recognizable key prefix such as `hf_` and hides everything else.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    match trimmed.split_once('_') {
        Some((prefix, rest)) if !rest.is_empty() && prefix.len() <= 4 => format!("{prefix}_***"),
        _ => "<redacted>".to_string(),
    }
}
