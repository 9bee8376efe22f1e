use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use skillmatch_core::config::{AppConfig, LoadOptions};
use toml::Value;

use crate::commands::CommandResult;

pub fn run(file: Option<PathBuf>) -> CommandResult {
    let options = LoadOptions {
        config_path: file.clone(),
        require_file: file.is_some(),
        ..LoadOptions::default()
    };
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult {
                exit_code: 2,
                output: format!("config validation failed: {error}"),
            }
        }
    };

    let config_file_path = file.or_else(detect_config_path);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    CommandResult { exit_code: 0, output: render(&config, config_file_path.as_deref(), config_file_doc.as_ref()) }
}

fn render(config: &AppConfig, file_path: Option<&Path>, file_doc: Option<&Value>) -> String {
    let entries: Vec<(&str, String)> = vec![
        ("database.url", config.database.url.clone()),
        ("database.max_connections", config.database.max_connections.to_string()),
        ("database.timeout_secs", config.database.timeout_secs.to_string()),
        ("slack.bot_token", redact_token(config.slack.bot_token.expose_secret())),
        ("slack.user_token", redact_optional(config.slack.user_token.as_ref(), redact_token)),
        ("slack.signing_secret", redact_optional(config.slack.signing_secret.as_ref(), |_| {
            "<redacted>".to_string()
        })),
        ("slack.api_base_url", config.slack.api_base_url.clone()),
        ("slack.channels", format!("[{}]", config.slack.channels.join(", "))),
        ("gateway.retry_initial_delay_ms", config.gateway.retry_initial_delay_ms.to_string()),
        ("gateway.retry_step_ms", config.gateway.retry_step_ms.to_string()),
        (
            "gateway.max_retries",
            config
                .gateway
                .max_retries
                .map(|retries| retries.to_string())
                .unwrap_or_else(|| "<unbounded>".to_string()),
        ),
        ("gateway.request_timeout_secs", config.gateway.request_timeout_secs.to_string()),
        ("chatbot.product_url", config.chatbot.product_url.clone()),
        ("chatbot.availability_url", config.chatbot.availability_url.clone()),
        ("chatbot.show_empty_stars", config.chatbot.show_empty_stars.to_string()),
        (
            "chatbot.idle_timeout_secs",
            config
                .chatbot
                .idle_timeout_secs
                .map(|secs| secs.to_string())
                .unwrap_or_else(|| "<never>".to_string()),
        ),
        ("server.bind_address", config.server.bind_address.clone()),
        ("server.port", config.server.port.to_string()),
        ("server.graceful_shutdown_secs", config.server.graceful_shutdown_secs.to_string()),
        ("logging.level", config.logging.level.clone()),
        ("logging.format", format!("{:?}", config.logging.format)),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value) in entries {
        let source = field_source(key, &env_key(key), file_doc, file_path);
        lines.push(render_line(key, &value, source));
    }
    lines.join("\n")
}

fn env_key(key_path: &str) -> String {
    format!("SKILLMATCH_{}", key_path.replace('.', "_").to_ascii_uppercase())
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("skillmatch.toml"), PathBuf::from("config/skillmatch.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
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

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_optional(secret: Option<&SecretString>, redact: impl Fn(&str) -> String) -> String {
    secret.map(|secret| redact(secret.expose_secret())).unwrap_or_else(|| "<unset>".to_string())
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use super::{contains_path, env_key, redact_token};

    #[test]
    fn env_keys_follow_the_section_field_convention() {
        assert_eq!(env_key("slack.bot_token"), "SKILLMATCH_SLACK_BOT_TOKEN");
        assert_eq!(env_key("chatbot.idle_timeout_secs"), "SKILLMATCH_CHATBOT_IDLE_TIMEOUT_SECS");
    }

    #[test]
    fn tokens_keep_only_their_prefix() {
        assert_eq!(redact_token("xoxb-123-456"), "xoxb-***");
        assert_eq!(redact_token("  "), "<empty>");
        assert_eq!(redact_token("opaque"), "<redacted>");
    }

    #[test]
    fn nested_keys_are_found_in_the_file_document() {
        let doc: toml::Value = "[gateway]\nmax_retries = 3\n".parse().expect("toml");
        assert!(contains_path(&doc, "gateway.max_retries"));
        assert!(!contains_path(&doc, "gateway.retry_step_ms"));
    }
}
