//! Rate-limit aware access to the Slack Web API.
//!
//! [`WebApiTransport`] performs a single HTTP exchange; [`SlackWebApi`] layers the retry loop,
//! cursor pagination and response decoding on top of it and exposes the [`PlatformGateway`]
//! capability the roster depends on.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use skillmatch_core::config::{AppConfig, GatewayConfig};
use skillmatch_core::errors::ApplicationError;

use crate::blocks::MessageTemplate;

const CHANNEL_PAGE_LIMIT: u32 = 1_000;
const EMPLOYEE_ID_LABEL: &str = "Employee ID";
const PROFILE_URL_LABEL: &str = "Bluepages Profile";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("slack transport failed: {0}")]
    Transport(String),
    #[error("slack kept rate limiting after {attempts} attempts")]
    RateLimited { attempts: u32 },
    #[error("slack method `{method}` failed: {error}")]
    Api { method: String, error: String },
    #[error("slack method `{method}` returned an unexpected body: {detail}")]
    Decode { method: String, detail: String },
    #[error("could not encode outbound message: {0}")]
    Encode(String),
}

impl From<GatewayError> for ApplicationError {
    fn from(error: GatewayError) -> Self {
        match error {
            GatewayError::RateLimited { attempts } => Self::PlatformRateLimited { attempts },
            other => Self::PlatformRequestFailed(other.to_string()),
        }
    }
}

/// Which credential a GET should carry. Custom profile labels are only visible to user tokens.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApiToken {
    Bot,
    Profile,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    fn is_rate_limited(&self) -> bool {
        self.status == 429
            || matches!(
                self.body.get("error").and_then(Value::as_str),
                Some("ratelimited" | "rate_limited")
            )
    }
}

#[async_trait]
pub trait WebApiTransport: Send + Sync {
    async fn post(&self, method: &str, payload: &Value) -> Result<ApiResponse, GatewayError>;

    async fn get(
        &self,
        method: &str,
        params: &[(&str, String)],
        token: ApiToken,
    ) -> Result<ApiResponse, GatewayError>;

    /// POST to an absolute URL handed out by Slack (interactive `response_url`).
    async fn post_url(&self, url: &str, payload: &Value) -> Result<ApiResponse, GatewayError>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
    bot_token: SecretString,
    profile_token: SecretString,
}

impl ReqwestTransport {
    pub fn from_config(config: &AppConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.gateway.request_timeout_secs))
            .build()
            .map_err(|error| GatewayError::Transport(error.to_string()))?;

        Ok(Self {
            client,
            base_url: config.slack.api_base_url.trim_end_matches('/').to_owned(),
            bot_token: config.slack.bot_token.clone(),
            profile_token: config.profile_token().clone(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }

    async fn read(response: reqwest::Response) -> Result<ApiResponse, GatewayError> {
        let status = response.status().as_u16();
        let text =
            response.text().await.map_err(|error| GatewayError::Transport(error.to_string()))?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        Ok(ApiResponse { status, body })
    }
}

#[async_trait]
impl WebApiTransport for ReqwestTransport {
    async fn post(&self, method: &str, payload: &Value) -> Result<ApiResponse, GatewayError> {
        let response = self
            .client
            .post(self.method_url(method))
            .bearer_auth(self.bot_token.expose_secret())
            .json(payload)
            .send()
            .await
            .map_err(|error| GatewayError::Transport(error.to_string()))?;
        Self::read(response).await
    }

    async fn get(
        &self,
        method: &str,
        params: &[(&str, String)],
        token: ApiToken,
    ) -> Result<ApiResponse, GatewayError> {
        let token = match token {
            ApiToken::Bot => &self.bot_token,
            ApiToken::Profile => &self.profile_token,
        };
        let response = self
            .client
            .get(self.method_url(method))
            .bearer_auth(token.expose_secret())
            .query(params)
            .send()
            .await
            .map_err(|error| GatewayError::Transport(error.to_string()))?;
        Self::read(response).await
    }

    async fn post_url(&self, url: &str, payload: &Value) -> Result<ApiResponse, GatewayError> {
        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|error| GatewayError::Transport(error.to_string()))?;
        Self::read(response).await
    }
}

/// Linear backoff: the n-th retry waits `initial + step * n`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub step: Duration,
    pub max_retries: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(2_000),
            step: Duration::from_millis(2_000),
            max_retries: None,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            initial_delay: Duration::from_millis(config.retry_initial_delay_ms),
            step: Duration::from_millis(config.retry_step_ms),
            max_retries: config.max_retries,
        }
    }

    pub fn delay(&self, retry: u32) -> Duration {
        self.initial_delay.saturating_add(self.step.saturating_mul(retry))
    }

    fn exhausted(&self, retries_done: u32) -> bool {
        self.max_retries.is_some_and(|max| retries_done >= max)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Channel {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserProfile {
    pub real_name: String,
    pub first_name: Option<String>,
}

/// `users.profile.get` result with custom fields flattened to `label -> value`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtendedProfile {
    pub real_name: String,
    pub first_name: Option<String>,
    pub fields: BTreeMap<String, String>,
}

impl ExtendedProfile {
    pub fn employee_id(&self) -> Option<String> {
        employee_id_from_fields(&self.fields)
    }
}

/// Employee ids are the profile serial without its three-character country suffix.
pub fn employee_id_from_fields(fields: &BTreeMap<String, String>) -> Option<String> {
    if let Some(serial) = fields.get(EMPLOYEE_ID_LABEL) {
        return Some(drop_suffix(serial));
    }
    fields.get(PROFILE_URL_LABEL).and_then(|url| employee_id_from_profile_url(url))
}

pub fn employee_id_from_profile_url(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    let uid = url.query_pairs().find(|(key, _)| key == "uid").map(|(_, value)| value)?;
    Some(drop_suffix(&uid))
}

fn drop_suffix(value: &str) -> String {
    let keep = value.chars().count().saturating_sub(3);
    value.chars().take(keep).collect()
}

#[async_trait]
pub trait PlatformGateway: Send + Sync {
    async fn list_channels(&self) -> Result<Vec<Channel>, GatewayError>;
    async fn list_members(&self, channel_id: &str) -> Result<Vec<String>, GatewayError>;
    async fn user_profile(&self, user_id: &str) -> Result<UserProfile, GatewayError>;
    /// `Ok(None)` when Slack answers but has no profile for the user.
    async fn extended_profile(
        &self,
        user_id: &str,
    ) -> Result<Option<ExtendedProfile>, GatewayError>;
    async fn post_message(
        &self,
        channel: &str,
        message: &MessageTemplate,
    ) -> Result<(), GatewayError>;
    async fn post_to_response_url(
        &self,
        response_url: &str,
        blocks: Vec<Value>,
    ) -> Result<(), GatewayError>;
}

pub struct SlackWebApi {
    transport: Arc<dyn WebApiTransport>,
    retry: RetryPolicy,
}

impl SlackWebApi {
    pub fn new(transport: Arc<dyn WebApiTransport>, retry: RetryPolicy) -> Self {
        Self { transport, retry }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, GatewayError> {
        let transport = ReqwestTransport::from_config(config)?;
        Ok(Self::new(Arc::new(transport), RetryPolicy::from_config(&config.gateway)))
    }

    pub async fn post(&self, method: &str, payload: &Value) -> Result<Value, GatewayError> {
        let mut retries = 0;
        loop {
            let response = self.transport.post(method, payload).await?;
            if !response.is_rate_limited() {
                return check_body(method, response);
            }
            self.back_off(method, &mut retries).await?;
        }
    }

    pub async fn get(
        &self,
        method: &str,
        params: &[(&str, String)],
        token: ApiToken,
    ) -> Result<Value, GatewayError> {
        let mut retries = 0;
        loop {
            let response = self.transport.get(method, params, token).await?;
            if !response.is_rate_limited() {
                return check_body(method, response);
            }
            self.back_off(method, &mut retries).await?;
        }
    }

    async fn back_off(&self, method: &str, retries: &mut u32) -> Result<(), GatewayError> {
        if self.retry.exhausted(*retries) {
            return Err(GatewayError::RateLimited { attempts: *retries + 1 });
        }
        let delay = self.retry.delay(*retries);
        warn!(
            event_name = "gateway.rate_limited",
            method,
            retry = *retries + 1,
            delay_ms = delay.as_millis() as u64,
            "slack rate limit reached, backing off"
        );
        tokio::time::sleep(delay).await;
        *retries += 1;
        Ok(())
    }

    /// Follows `response_metadata.next_cursor` until it is empty or a page comes back empty.
    async fn paginate(
        &self,
        method: &str,
        base_params: Vec<(&str, String)>,
        items_key: &str,
    ) -> Result<Vec<Value>, GatewayError> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut params = base_params.clone();
            if let Some(cursor) = &cursor {
                params.push(("cursor", cursor.clone()));
            }
            let body = self.get(method, &params, ApiToken::Bot).await?;
            let page = body.get(items_key).and_then(Value::as_array).cloned().unwrap_or_default();
            if page.is_empty() {
                break;
            }
            items.extend(page);

            match next_cursor(&body) {
                Some(next) => {
                    debug!(event_name = "gateway.page", method, cursor = %next, "following cursor");
                    cursor = Some(next);
                }
                None => break,
            }
        }
        Ok(items)
    }
}

fn check_body(method: &str, response: ApiResponse) -> Result<Value, GatewayError> {
    if !(200..300).contains(&response.status) {
        return Err(GatewayError::Api {
            method: method.to_owned(),
            error: format!("http status {}", response.status),
        });
    }
    if response.body.get("ok").and_then(Value::as_bool) == Some(false) {
        let error = response.body.get("error").and_then(Value::as_str).unwrap_or("unknown_error");
        return Err(GatewayError::Api { method: method.to_owned(), error: error.to_owned() });
    }
    Ok(response.body)
}

fn next_cursor(body: &Value) -> Option<String> {
    body.pointer("/response_metadata/next_cursor")
        .and_then(Value::as_str)
        .filter(|cursor| !cursor.is_empty())
        .map(str::to_owned)
}

fn string_at(value: &Value, pointer: &str) -> Option<String> {
    value.pointer(pointer).and_then(Value::as_str).filter(|text| !text.is_empty()).map(str::to_owned)
}

#[async_trait]
impl PlatformGateway for SlackWebApi {
    async fn list_channels(&self) -> Result<Vec<Channel>, GatewayError> {
        let pages = self
            .paginate(
                "conversations.list",
                vec![
                    ("exclude_archived", "true".to_owned()),
                    ("limit", CHANNEL_PAGE_LIMIT.to_string()),
                ],
                "channels",
            )
            .await?;

        Ok(pages
            .iter()
            .filter_map(|channel| {
                Some(Channel {
                    id: string_at(channel, "/id")?,
                    name: string_at(channel, "/name").unwrap_or_default(),
                })
            })
            .collect())
    }

    async fn list_members(&self, channel_id: &str) -> Result<Vec<String>, GatewayError> {
        let members = self
            .paginate("conversations.members", vec![("channel", channel_id.to_owned())], "members")
            .await?;
        Ok(members.iter().filter_map(Value::as_str).map(str::to_owned).collect())
    }

    async fn user_profile(&self, user_id: &str) -> Result<UserProfile, GatewayError> {
        let body = self.get("users.info", &[("user", user_id.to_owned())], ApiToken::Bot).await?;
        let real_name = string_at(&body, "/user/real_name")
            .or_else(|| string_at(&body, "/user/profile/real_name"))
            .ok_or_else(|| GatewayError::Decode {
                method: "users.info".to_owned(),
                detail: "missing user.real_name".to_owned(),
            })?;
        Ok(UserProfile { real_name, first_name: string_at(&body, "/user/profile/first_name") })
    }

    async fn extended_profile(
        &self,
        user_id: &str,
    ) -> Result<Option<ExtendedProfile>, GatewayError> {
        let body = self
            .get(
                "users.profile.get",
                &[("user", user_id.to_owned()), ("include_labels", "true".to_owned())],
                ApiToken::Profile,
            )
            .await?;
        let Some(profile) = body.get("profile") else {
            return Ok(None);
        };

        let fields = profile
            .get("fields")
            .and_then(Value::as_object)
            .map(|fields| {
                fields
                    .values()
                    .filter_map(|field| Some((string_at(field, "/label")?, string_at(field, "/value")?)))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Some(ExtendedProfile {
            real_name: string_at(profile, "/real_name").unwrap_or_default(),
            first_name: string_at(profile, "/first_name"),
            fields,
        }))
    }

    async fn post_message(
        &self,
        channel: &str,
        message: &MessageTemplate,
    ) -> Result<(), GatewayError> {
        let blocks = message.blocks_json().map_err(|error| GatewayError::Encode(error.to_string()))?;
        self.post(
            "chat.postMessage",
            &json!({
                "channel": channel,
                "blocks": blocks,
                "text": message.fallback_text,
                "as_user": true,
            }),
        )
        .await?;
        Ok(())
    }

    async fn post_to_response_url(
        &self,
        response_url: &str,
        blocks: Vec<Value>,
    ) -> Result<(), GatewayError> {
        let response = self.transport.post_url(response_url, &json!({ "blocks": blocks })).await?;
        if !(200..300).contains(&response.status) {
            return Err(GatewayError::Api {
                method: "response_url".to_owned(),
                error: format!("http status {}", response.status),
            });
        }
        Ok(())
    }
}
