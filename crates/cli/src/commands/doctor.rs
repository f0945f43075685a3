use crewbot_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use serde::Serialize;

use super::{escape_json, CommandResult, EXIT_DOCTOR};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Skipped, details: details.into() }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report(AppConfig::load(LoadOptions::default()).map_err(|e| e.to_string()));
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { EXIT_DOCTOR };

    if json_output {
        let output = serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
        return CommandResult::text(exit_code, output);
    }

    CommandResult::text(exit_code, render_human(&report))
}

fn build_report(loaded: Result<AppConfig, String>) -> DoctorReport {
    let checks = match loaded {
        Ok(config) => vec![
            DoctorCheck::pass("config_validation", "configuration loaded and validated"),
            check_discord_token(&config),
            check_endpoints(&config),
            check_calendar(&config),
        ],
        Err(error) => {
            let skipped = "skipped because configuration did not load";
            vec![
                DoctorCheck::fail("config_validation", error),
                DoctorCheck::skipped("discord_token_readiness", skipped),
                DoctorCheck::skipped("endpoint_urls", skipped),
                DoctorCheck::skipped("calendar_readiness", skipped),
            ]
        }
    };

    // Skipped checks are informational once configuration has loaded.
    let failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let (overall_status, summary) = if failed {
        (CheckStatus::Fail, "doctor: one or more readiness checks failed")
    } else {
        (CheckStatus::Pass, "doctor: all readiness checks passed")
    };

    DoctorReport { overall_status, summary: summary.to_string(), checks }
}

fn check_discord_token(config: &AppConfig) -> DoctorCheck {
    let token = config.discord.bot_token.expose_secret();
    if token.chars().any(char::is_whitespace) {
        return DoctorCheck::fail(
            "discord_token_readiness",
            "discord.bot_token contains whitespace; copy the token again from the developer portal",
        );
    }
    if token.starts_with("Bot ") {
        return DoctorCheck::fail(
            "discord_token_readiness",
            "discord.bot_token must not include the `Bot ` prefix",
        );
    }

    DoctorCheck::pass("discord_token_readiness", "bot token present and well-formed")
}

fn check_endpoints(config: &AppConfig) -> DoctorCheck {
    let mut endpoints = vec![
        ("discord.api_base_url", config.discord.api_base_url.as_str()),
        ("inference.endpoint", config.inference.endpoint.as_str()),
        ("quotes.endpoint", config.quotes.endpoint.as_str()),
    ];
    if let Some(gateway_url) = config.discord.gateway_url.as_deref() {
        endpoints.push(("discord.gateway_url", gateway_url));
    }
    if config.calendar.enabled {
        endpoints.push(("calendar.base_url", config.calendar.base_url.as_str()));
    }

    let insecure: Vec<&str> = endpoints
        .iter()
        .filter(|(_, url)| !is_secure_url(url))
        .map(|(key, _)| *key)
        .collect();

    if insecure.is_empty() {
        DoctorCheck::pass("endpoint_urls", format!("{} endpoints use TLS", endpoints.len()))
    } else {
        DoctorCheck::fail(
            "endpoint_urls",
            format!("endpoints without TLS: {}", insecure.join(", ")),
        )
    }
}

fn is_secure_url(url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("wss://")
}

fn check_calendar(config: &AppConfig) -> DoctorCheck {
    if !config.calendar.enabled {
        return DoctorCheck::skipped("calendar_readiness", "calendar integration disabled");
    }
    if config.calendar_ready() {
        DoctorCheck::pass(
            "calendar_readiness",
            format!("scheduling into calendar `{}`", config.calendar.calendar_id),
        )
    } else {
        DoctorCheck::fail("calendar_readiness", "calendar enabled without an access token")
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}
