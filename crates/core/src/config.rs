use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub slack: SlackConfig,
    pub gateway: GatewayConfig,
    pub chatbot: ChatbotConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub bot_token: SecretString,
    /// User token for `users.profile.get`; custom profile field labels are only returned to
    /// user tokens. Falls back to the bot token when unset.
    pub user_token: Option<SecretString>,
    pub signing_secret: Option<SecretString>,
    pub api_base_url: String,
    /// Channels operators may broadcast to, listed by `GET /api/slack/channels`.
    pub channels: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub retry_initial_delay_ms: u64,
    pub retry_step_ms: u64,
    /// `None` retries a rate-limited call until it succeeds.
    pub max_retries: Option<u32>,
    pub request_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ChatbotConfig {
    pub product_url: String,
    pub availability_url: String,
    pub show_empty_stars: bool,
    /// `None` keeps participants until the next roster rebuild.
    pub idle_timeout_secs: Option<u64>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
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
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub slack_bot_token: Option<String>,
    pub slack_signing_secret: Option<String>,
    pub slack_api_base_url: Option<String>,
    pub server_port: Option<u16>,
    pub gateway_max_retries: Option<u32>,
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
            database: DatabaseConfig {
                url: "sqlite://skillmatch.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            slack: SlackConfig {
                bot_token: String::new().into(),
                user_token: None,
                signing_secret: None,
                api_base_url: "https://slack.com/api".to_string(),
                channels: Vec::new(),
            },
            gateway: GatewayConfig {
                retry_initial_delay_ms: 2_000,
                retry_step_ms: 2_000,
                max_retries: None,
                request_timeout_secs: 30,
            },
            chatbot: ChatbotConfig {
                product_url: "http://skill-match.mybluemix.net".to_string(),
                availability_url:
                    "https://w3-01.ibm.com/services/tools/marketplace/displayMyHoursPlan.wss"
                        .to_string(),
                show_empty_stars: true,
                idle_timeout_secs: None,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
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
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from("skillmatch.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Token used for extended profile lookups.
    pub fn profile_token(&self) -> &SecretString {
        self.slack.user_token.as_ref().unwrap_or(&self.slack.bot_token)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(slack) = patch.slack {
            if let Some(bot_token) = slack.bot_token {
                self.slack.bot_token = secret_value(bot_token);
            }
            if let Some(user_token) = slack.user_token {
                self.slack.user_token = Some(secret_value(user_token));
            }
            if let Some(signing_secret) = slack.signing_secret {
                self.slack.signing_secret = Some(secret_value(signing_secret));
            }
            if let Some(api_base_url) = slack.api_base_url {
                self.slack.api_base_url = api_base_url;
            }
            if let Some(channels) = slack.channels {
                self.slack.channels = channels;
            }
        }

        if let Some(gateway) = patch.gateway {
            if let Some(delay) = gateway.retry_initial_delay_ms {
                self.gateway.retry_initial_delay_ms = delay;
            }
            if let Some(step) = gateway.retry_step_ms {
                self.gateway.retry_step_ms = step;
            }
            if let Some(max_retries) = gateway.max_retries {
                self.gateway.max_retries = Some(max_retries);
            }
            if let Some(timeout_secs) = gateway.request_timeout_secs {
                self.gateway.request_timeout_secs = timeout_secs;
            }
        }

        if let Some(chatbot) = patch.chatbot {
            if let Some(product_url) = chatbot.product_url {
                self.chatbot.product_url = product_url;
            }
            if let Some(availability_url) = chatbot.availability_url {
                self.chatbot.availability_url = availability_url;
            }
            if let Some(show_empty_stars) = chatbot.show_empty_stars {
                self.chatbot.show_empty_stars = show_empty_stars;
            }
            if let Some(idle_timeout_secs) = chatbot.idle_timeout_secs {
                self.chatbot.idle_timeout_secs = Some(idle_timeout_secs);
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
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
        if let Some(value) = read_env("SKILLMATCH_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("SKILLMATCH_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("SKILLMATCH_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("SKILLMATCH_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("SKILLMATCH_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("SKILLMATCH_SLACK_BOT_TOKEN") {
            self.slack.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("SKILLMATCH_SLACK_USER_TOKEN") {
            self.slack.user_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("SKILLMATCH_SLACK_SIGNING_SECRET") {
            self.slack.signing_secret = Some(secret_value(value));
        }
        if let Some(value) = read_env("SKILLMATCH_SLACK_API_BASE_URL") {
            self.slack.api_base_url = value;
        }
        if let Some(value) = read_env("SKILLMATCH_SLACK_CHANNELS") {
            self.slack.channels = parse_list(&value);
        }

        if let Some(value) = read_env("SKILLMATCH_GATEWAY_RETRY_INITIAL_DELAY_MS") {
            self.gateway.retry_initial_delay_ms =
                parse_u64("SKILLMATCH_GATEWAY_RETRY_INITIAL_DELAY_MS", &value)?;
        }
        if let Some(value) = read_env("SKILLMATCH_GATEWAY_RETRY_STEP_MS") {
            self.gateway.retry_step_ms = parse_u64("SKILLMATCH_GATEWAY_RETRY_STEP_MS", &value)?;
        }
        if let Some(value) = read_env("SKILLMATCH_GATEWAY_MAX_RETRIES") {
            self.gateway.max_retries = Some(parse_u32("SKILLMATCH_GATEWAY_MAX_RETRIES", &value)?);
        }
        if let Some(value) = read_env("SKILLMATCH_GATEWAY_REQUEST_TIMEOUT_SECS") {
            self.gateway.request_timeout_secs =
                parse_u64("SKILLMATCH_GATEWAY_REQUEST_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("SKILLMATCH_CHATBOT_PRODUCT_URL") {
            self.chatbot.product_url = value;
        }
        if let Some(value) = read_env("SKILLMATCH_CHATBOT_AVAILABILITY_URL") {
            self.chatbot.availability_url = value;
        }
        if let Some(value) = read_env("SKILLMATCH_CHATBOT_SHOW_EMPTY_STARS") {
            self.chatbot.show_empty_stars =
                parse_bool("SKILLMATCH_CHATBOT_SHOW_EMPTY_STARS", &value)?;
        }
        if let Some(value) = read_env("SKILLMATCH_CHATBOT_IDLE_TIMEOUT_SECS") {
            self.chatbot.idle_timeout_secs =
                Some(parse_u64("SKILLMATCH_CHATBOT_IDLE_TIMEOUT_SECS", &value)?);
        }

        if let Some(value) = read_env("SKILLMATCH_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("SKILLMATCH_SERVER_PORT") {
            self.server.port = parse_u16("SKILLMATCH_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("SKILLMATCH_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("SKILLMATCH_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("SKILLMATCH_LOGGING_LEVEL").or_else(|| read_env("SKILLMATCH_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("SKILLMATCH_LOGGING_FORMAT").or_else(|| read_env("SKILLMATCH_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(bot_token) = overrides.slack_bot_token {
            self.slack.bot_token = secret_value(bot_token);
        }
        if let Some(signing_secret) = overrides.slack_signing_secret {
            self.slack.signing_secret = Some(secret_value(signing_secret));
        }
        if let Some(api_base_url) = overrides.slack_api_base_url {
            self.slack.api_base_url = api_base_url;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(max_retries) = overrides.gateway_max_retries {
            self.gateway.max_retries = Some(max_retries);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_slack(&self.slack)?;
        validate_gateway(&self.gateway)?;
        validate_chatbot(&self.chatbot)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("skillmatch.toml"), PathBuf::from("config/skillmatch.toml")]
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

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    let bot_token = slack.bot_token.expose_secret();
    if bot_token.is_empty() {
        return Err(ConfigError::Validation(
            "slack.bot_token is required. Get it from https://api.slack.com/apps > Your App > OAuth & Permissions > Bot User OAuth Token".to_string()
        ));
    }
    if !bot_token.starts_with("xoxb-") {
        let hint = if bot_token.starts_with("xoxp-") {
            " (hint: you may have used the user token instead of the bot token)"
        } else {
            ""
        };
        return Err(ConfigError::Validation(format!(
            "slack.bot_token must start with `xoxb-`{hint}. Get it from https://api.slack.com/apps"
        )));
    }

    if let Some(user_token) = &slack.user_token {
        if !user_token.expose_secret().starts_with("xoxp-") {
            return Err(ConfigError::Validation(
                "slack.user_token must start with `xoxp-` when set".to_string(),
            ));
        }
    }

    if let Some(signing_secret) = &slack.signing_secret {
        if signing_secret.expose_secret().trim().is_empty() {
            return Err(ConfigError::Validation(
                "slack.signing_secret must not be blank when set".to_string(),
            ));
        }
    }

    validate_http_url("slack.api_base_url", &slack.api_base_url)
}

fn validate_gateway(gateway: &GatewayConfig) -> Result<(), ConfigError> {
    if gateway.retry_initial_delay_ms == 0 {
        return Err(ConfigError::Validation(
            "gateway.retry_initial_delay_ms must be greater than zero".to_string(),
        ));
    }

    if gateway.request_timeout_secs == 0 || gateway.request_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "gateway.request_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_chatbot(chatbot: &ChatbotConfig) -> Result<(), ConfigError> {
    validate_http_url("chatbot.product_url", &chatbot.product_url)?;
    validate_http_url("chatbot.availability_url", &chatbot.availability_url)?;

    if chatbot.idle_timeout_secs == Some(0) {
        return Err(ConfigError::Validation(
            "chatbot.idle_timeout_secs must be greater than zero (omit it to disable eviction)"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
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

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
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
    database: Option<DatabasePatch>,
    slack: Option<SlackPatch>,
    gateway: Option<GatewayPatch>,
    chatbot: Option<ChatbotPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    bot_token: Option<String>,
    user_token: Option<String>,
    signing_secret: Option<String>,
    api_base_url: Option<String>,
    channels: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct GatewayPatch {
    retry_initial_delay_ms: Option<u64>,
    retry_step_ms: Option<u64>,
    max_retries: Option<u32>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatbotPatch {
    product_url: Option<String>,
    availability_url: Option<String>,
    show_empty_stars: Option<bool>,
    idle_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
