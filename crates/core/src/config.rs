use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_INFERENCE_ENDPOINT: &str =
    "https://api-inference.huggingface.co/models/microsoft/DialoGPT-medium";
pub const DEFAULT_QUOTES_ENDPOINT: &str = "https://zenquotes.io/api/random";
pub const DEFAULT_CALENDAR_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";
pub const DEFAULT_DISCORD_API_BASE_URL: &str = "https://discord.com/api/v10";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub discord: DiscordConfig,
    pub inference: InferenceConfig,
    pub quotes: QuotesConfig,
    pub calendar: CalendarConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DiscordConfig {
    pub bot_token: SecretString,
    pub command_prefix: String,
    pub api_base_url: String,
    pub gateway_url: Option<String>,
}

#[derive(Clone, Debug)]
pub struct InferenceConfig {
    pub api_key: SecretString,
    pub endpoint: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct QuotesConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct CalendarConfig {
    pub enabled: bool,
    pub access_token: Option<SecretString>,
    pub base_url: String,
    pub calendar_id: String,
    pub time_zone: String,
    pub attendee_domain: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub discord_bot_token: Option<String>,
    pub command_prefix: Option<String>,
    pub inference_api_key: Option<String>,
    pub inference_endpoint: Option<String>,
    pub quotes_endpoint: Option<String>,
    pub calendar_enabled: Option<bool>,
    pub calendar_access_token: Option<String>,
    pub calendar_base_url: Option<String>,
    pub health_check_port: Option<u16>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            discord: DiscordConfig {
                bot_token: String::new().into(),
                command_prefix: "!".to_string(),
                api_base_url: DEFAULT_DISCORD_API_BASE_URL.to_string(),
                gateway_url: None,
            },
            inference: InferenceConfig {
                api_key: String::new().into(),
                endpoint: DEFAULT_INFERENCE_ENDPOINT.to_string(),
                timeout_secs: 30,
            },
            quotes: QuotesConfig { endpoint: DEFAULT_QUOTES_ENDPOINT.to_string(), timeout_secs: 10 },
            calendar: CalendarConfig {
                enabled: false,
                access_token: None,
                base_url: DEFAULT_CALENDAR_BASE_URL.to_string(),
                calendar_id: "primary".to_string(),
                time_zone: "America/Los_Angeles".to_string(),
                attendee_domain: "example.com".to_string(),
                timeout_secs: 15,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                health_check_port: 8080,
                graceful_shutdown_secs: 10,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("crewbot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Whether `schedule` can reach the calendar API.
    pub fn calendar_ready(&self) -> bool {
        self.calendar.enabled
            && self
                .calendar
                .access_token
                .as_ref()
                .is_some_and(|token| !token.expose_secret().trim().is_empty())
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(discord) = patch.discord {
            if let Some(discord_bot_token_value) = discord.bot_token {
                self.discord.bot_token = secret_value(discord_bot_token_value);
            }
            if let Some(command_prefix) = discord.command_prefix {
                self.discord.command_prefix = command_prefix;
            }
            if let Some(api_base_url) = discord.api_base_url {
                self.discord.api_base_url = api_base_url;
            }
            if let Some(gateway_url) = discord.gateway_url {
                self.discord.gateway_url = Some(gateway_url);
            }
        }

        if let Some(inference) = patch.inference {
            if let Some(inference_api_key_value) = inference.api_key {
                self.inference.api_key = secret_value(inference_api_key_value);
            }
            if let Some(endpoint) = inference.endpoint {
                self.inference.endpoint = endpoint;
            }
            if let Some(timeout_secs) = inference.timeout_secs {
                self.inference.timeout_secs = timeout_secs;
            }
        }

        if let Some(quotes) = patch.quotes {
            if let Some(endpoint) = quotes.endpoint {
                self.quotes.endpoint = endpoint;
            }
            if let Some(timeout_secs) = quotes.timeout_secs {
                self.quotes.timeout_secs = timeout_secs;
            }
        }

        if let Some(calendar) = patch.calendar {
            if let Some(enabled) = calendar.enabled {
                self.calendar.enabled = enabled;
            }
            if let Some(calendar_access_token_value) = calendar.access_token {
                self.calendar.access_token = Some(secret_value(calendar_access_token_value));
            }
            if let Some(base_url) = calendar.base_url {
                self.calendar.base_url = base_url;
            }
            if let Some(calendar_id) = calendar.calendar_id {
                self.calendar.calendar_id = calendar_id;
            }
            if let Some(time_zone) = calendar.time_zone {
                self.calendar.time_zone = time_zone;
            }
            if let Some(attendee_domain) = calendar.attendee_domain {
                self.calendar.attendee_domain = attendee_domain;
            }
            if let Some(timeout_secs) = calendar.timeout_secs {
                self.calendar.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        let bot_token = read_env("CREWBOT_DISCORD_BOT_TOKEN").or_else(|| read_env("DISCORD_TOKEN"));
        if let Some(value) = bot_token {
            self.discord.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("CREWBOT_DISCORD_COMMAND_PREFIX") {
            self.discord.command_prefix = value;
        }
        if let Some(value) = read_env("CREWBOT_DISCORD_API_BASE_URL") {
            self.discord.api_base_url = value;
        }
        if let Some(value) = read_env("CREWBOT_DISCORD_GATEWAY_URL") {
            self.discord.gateway_url = Some(value);
        }

        let api_key = read_env("CREWBOT_INFERENCE_API_KEY").or_else(|| read_env("HF_API_KEY"));
        if let Some(value) = api_key {
            self.inference.api_key = secret_value(value);
        }
        if let Some(value) = read_env("CREWBOT_INFERENCE_ENDPOINT") {
            self.inference.endpoint = value;
        }
        if let Some(value) = read_env("CREWBOT_INFERENCE_TIMEOUT_SECS") {
            self.inference.timeout_secs = parse_u64("CREWBOT_INFERENCE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("CREWBOT_QUOTES_ENDPOINT") {
            self.quotes.endpoint = value;
        }
        if let Some(value) = read_env("CREWBOT_QUOTES_TIMEOUT_SECS") {
            self.quotes.timeout_secs = parse_u64("CREWBOT_QUOTES_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("CREWBOT_CALENDAR_ENABLED") {
            self.calendar.enabled = parse_bool("CREWBOT_CALENDAR_ENABLED", &value)?;
        }
        if let Some(value) = read_env("CREWBOT_CALENDAR_ACCESS_TOKEN") {
            self.calendar.access_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("CREWBOT_CALENDAR_BASE_URL") {
            self.calendar.base_url = value;
        }
        if let Some(value) = read_env("CREWBOT_CALENDAR_ID") {
            self.calendar.calendar_id = value;
        }
        if let Some(value) = read_env("CREWBOT_CALENDAR_TIME_ZONE") {
            self.calendar.time_zone = value;
        }
        if let Some(value) = read_env("CREWBOT_CALENDAR_ATTENDEE_DOMAIN") {
            self.calendar.attendee_domain = value;
        }
        if let Some(value) = read_env("CREWBOT_CALENDAR_TIMEOUT_SECS") {
            self.calendar.timeout_secs = parse_u64("CREWBOT_CALENDAR_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("CREWBOT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("CREWBOT_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port = parse_u16("CREWBOT_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("CREWBOT_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("CREWBOT_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("CREWBOT_LOGGING_LEVEL").or_else(|| read_env("CREWBOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CREWBOT_LOGGING_FORMAT").or_else(|| read_env("CREWBOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(discord_bot_token) = overrides.discord_bot_token {
            self.discord.bot_token = secret_value(discord_bot_token);
        }
        if let Some(command_prefix) = overrides.command_prefix {
            self.discord.command_prefix = command_prefix;
        }
        if let Some(inference_api_key) = overrides.inference_api_key {
            self.inference.api_key = secret_value(inference_api_key);
        }
        if let Some(inference_endpoint) = overrides.inference_endpoint {
            self.inference.endpoint = inference_endpoint;
        }
        if let Some(quotes_endpoint) = overrides.quotes_endpoint {
            self.quotes.endpoint = quotes_endpoint;
        }
        if let Some(enabled) = overrides.calendar_enabled {
            self.calendar.enabled = enabled;
        }
        if let Some(access_token) = overrides.calendar_access_token {
            self.calendar.access_token = Some(secret_value(access_token));
        }
        if let Some(base_url) = overrides.calendar_base_url {
            self.calendar.base_url = base_url;
        }
        if let Some(health_check_port) = overrides.health_check_port {
            self.server.health_check_port = health_check_port;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_discord(&self.discord)?;
        validate_inference(&self.inference)?;
        validate_quotes(&self.quotes)?;
        validate_calendar(&self.calendar)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("crewbot.toml"), PathBuf::from("config/crewbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_discord(discord: &DiscordConfig) -> Result<(), ConfigError> {
    if discord.bot_token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "discord.bot_token is required. Get it from https://discord.com/developers/applications > Your App > Bot > Token (env: CREWBOT_DISCORD_BOT_TOKEN or DISCORD_TOKEN)".to_string(),
        ));
    }

    let prefix = discord.command_prefix.trim();
    if prefix.is_empty() || prefix.chars().any(char::is_whitespace) {
        return Err(ConfigError::Validation(
            "discord.command_prefix must be a non-empty token without whitespace".to_string(),
        ));
    }

    validate_http_url("discord.api_base_url", &discord.api_base_url)?;
    if let Some(gateway_url) = &discord.gateway_url {
        if !gateway_url.starts_with("ws://") && !gateway_url.starts_with("wss://") {
            return Err(ConfigError::Validation(
                "discord.gateway_url must start with ws:// or wss://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_inference(inference: &InferenceConfig) -> Result<(), ConfigError> {
    if inference.api_key.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "inference.api_key is required (env: CREWBOT_INFERENCE_API_KEY or HF_API_KEY)"
                .to_string(),
        ));
    }

    validate_http_url("inference.endpoint", &inference.endpoint)?;
    validate_timeout("inference.timeout_secs", inference.timeout_secs)
}

fn validate_quotes(quotes: &QuotesConfig) -> Result<(), ConfigError> {
    validate_http_url("quotes.endpoint", &quotes.endpoint)?;
    validate_timeout("quotes.timeout_secs", quotes.timeout_secs)
}

fn validate_calendar(calendar: &CalendarConfig) -> Result<(), ConfigError> {
    if calendar.enabled {
        let missing = calendar
            .access_token
            .as_ref()
            .map(|value| value.expose_secret().trim().is_empty())
            .unwrap_or(true);
        if missing {
            return Err(ConfigError::Validation(
                "calendar.enabled is true but calendar.access_token is missing".to_string(),
            ));
        }
    }

    if calendar.calendar_id.trim().is_empty() {
        return Err(ConfigError::Validation("calendar.calendar_id must not be empty".to_string()));
    }
    if calendar.attendee_domain.trim().is_empty() || calendar.attendee_domain.contains('@') {
        return Err(ConfigError::Validation(
            "calendar.attendee_domain must be a bare domain such as `example.com`".to_string(),
        ));
    }

    validate_http_url("calendar.base_url", &calendar.base_url)?;
    validate_timeout("calendar.timeout_secs", calendar.timeout_secs)
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!("{key} must start with http:// or https://")))
    }
}

fn validate_timeout(key: &str, timeout_secs: u64) -> Result<(), ConfigError> {
    if timeout_secs == 0 || timeout_secs > 300 {
        return Err(ConfigError::Validation(format!("{key} must be in range 1..=300")));
    }
    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    discord: Option<DiscordPatch>,
    inference: Option<InferencePatch>,
    quotes: Option<QuotesPatch>,
    calendar: Option<CalendarPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DiscordPatch {
    bot_token: Option<String>,
    command_prefix: Option<String>,
    api_base_url: Option<String>,
    gateway_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct InferencePatch {
    api_key: Option<String>,
    endpoint: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct QuotesPatch {
    endpoint: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CalendarPatch {
    enabled: Option<bool>,
    access_token: Option<String>,
    base_url: Option<String>,
    calendar_id: Option<String>,
    time_zone: Option<String>,
    attendee_domain: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
