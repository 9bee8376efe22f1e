//! Slack ingress routes.
//!
//! - `POST /api/slack`             : Events API: URL verification and `event_callback`
//! - `POST /api/slack/interactive` : Block Kit interactions (`payload` form field)
//! - `GET  /api/slack`             : `?value=skill|avail&channel=<name>` builds a roster and broadcasts
//! - `GET  /api/slack/channels`    : configured broadcast subscriptions
//!
//! Slack expects an answer within three seconds, so every route acknowledges first and does the
//! conversational work on a spawned task. When a signing secret is configured the two POST
//! routes require a valid `v0` signature.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use skillmatch_core::flows::ConversationMode;
use skillmatch_slack::events::SlackEnvelope;
use skillmatch_slack::{EventContext, EventDispatcher, RosterManager, SlackEvent};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::signing::{self, SignatureCheck, SIGNATURE_HEADER, TIMESTAMP_HEADER};

const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Clone)]
pub struct SlackState {
    roster: Arc<RosterManager>,
    dispatcher: Arc<EventDispatcher>,
    subscriptions: Arc<Vec<String>>,
    signing_secret: Option<SecretString>,
}

impl SlackState {
    pub fn new(
        roster: Arc<RosterManager>,
        dispatcher: Arc<EventDispatcher>,
        subscriptions: Vec<String>,
        signing_secret: Option<SecretString>,
    ) -> Self {
        Self { roster, dispatcher, subscriptions: Arc::new(subscriptions), signing_secret }
    }
}

#[derive(Debug, Deserialize)]
pub struct BroadcastQuery {
    pub value: String,
    pub channel: String,
}

#[derive(Debug, Deserialize)]
pub struct InteractiveForm {
    pub payload: String,
}

pub fn router(state: SlackState) -> Router {
    let signed = middleware::from_fn_with_state(state.clone(), verify_signature);

    Router::new()
        .route("/api/slack", get(broadcast).merge(post(events).route_layer(signed.clone())))
        .route("/api/slack/interactive", post(interactive).route_layer(signed))
        .route("/api/slack/channels", get(channels))
        .with_state(state)
}

async fn verify_signature(State(state): State<SlackState>, request: Request, next: Next) -> Response {
    let Some(secret) = state.signing_secret.as_ref() else {
        return next.run(request).await;
    };

    let (parts, body) = request.into_parts();
    let Ok(bytes) = axum::body::to_bytes(body, MAX_BODY_BYTES).await else {
        return StatusCode::PAYLOAD_TOO_LARGE.into_response();
    };

    let timestamp = parts.headers.get(TIMESTAMP_HEADER).and_then(|value| value.to_str().ok());
    let signature = parts.headers.get(SIGNATURE_HEADER).and_then(|value| value.to_str().ok());
    let check =
        signing::verify(secret.expose_secret(), timestamp, signature, &bytes, Utc::now().timestamp());
    if check != SignatureCheck::Valid {
        warn!(
            event_name = "ingress.slack.signature_rejected",
            path = %parts.uri.path(),
            check = ?check,
            "rejecting unsigned or mis-signed slack request"
        );
        return StatusCode::UNAUTHORIZED.into_response();
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

async fn events(State(state): State<SlackState>, Json(body): Json<Value>) -> Response {
    if let Some(challenge) = body.get("challenge").and_then(Value::as_str) {
        info!(event_name = "ingress.slack.url_verification", "answering url verification");
        return Json(json!({ "challenge": challenge })).into_response();
    }

    match body.get("type").and_then(Value::as_str) {
        Some("event_callback") => {
            let envelope_id = body
                .get("event_id")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            let event = body.get("event").map(SlackEvent::from_event_callback).unwrap_or(
                SlackEvent::Unsupported { event_type: "event_callback_without_event".to_owned() },
            );
            spawn_dispatch(state.dispatcher.clone(), SlackEnvelope { envelope_id, event });
        }
        other => {
            debug!(
                event_name = "ingress.slack.event_ignored",
                event_type = other.unwrap_or("missing"),
                "ignoring events api request"
            );
        }
    }
    StatusCode::OK.into_response()
}

async fn interactive(State(state): State<SlackState>, Form(form): Form<InteractiveForm>) -> Response {
    let payload: Value = match serde_json::from_str(&form.payload) {
        Ok(payload) => payload,
        Err(error) => {
            warn!(event_name = "ingress.slack.payload_invalid", error = %error, "interactive payload is not JSON");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    match SlackEvent::from_interactive_payload(&payload) {
        SlackEvent::Unsupported { event_type } => {
            info!(
                event_name = "ingress.slack.interaction_ignored",
                payload_type = %event_type,
                "ignoring non block_actions interaction"
            );
        }
        event => {
            let envelope_id = payload
                .get("trigger_id")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            spawn_dispatch(state.dispatcher.clone(), SlackEnvelope { envelope_id, event });
        }
    }
    StatusCode::OK.into_response()
}

async fn broadcast(
    State(state): State<SlackState>,
    Query(query): Query<BroadcastQuery>,
) -> Response {
    let mode = match query.value.parse::<ConversationMode>() {
        Ok(mode) => mode,
        Err(error) => {
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": error.to_string() })))
                .into_response();
        }
    };

    let roster = state.roster.clone();
    let channel = query.channel;
    tokio::spawn(async move {
        match roster.init_roster(&channel).await {
            Ok(_) => {
                roster.broadcast(mode).await;
            }
            Err(error) => {
                warn!(
                    event_name = "roster.init_failed",
                    channel = %channel,
                    error = %error,
                    "could not build roster; broadcast skipped"
                );
            }
        }
    });

    StatusCode::OK.into_response()
}

async fn channels(State(state): State<SlackState>) -> Json<Value> {
    Json(json!({ "channels": state.subscriptions.as_ref() }))
}

fn spawn_dispatch(dispatcher: Arc<EventDispatcher>, envelope: SlackEnvelope) {
    tokio::spawn(async move {
        let ctx = EventContext { correlation_id: envelope.envelope_id.clone() };
        match dispatcher.dispatch(&envelope, &ctx).await {
            Ok(result) => debug!(
                event_name = "ingress.slack.dispatched",
                correlation_id = %ctx.correlation_id,
                result = ?result,
                "slack event handled"
            ),
            Err(error) => warn!(
                event_name = "ingress.slack.dispatch_failed",
                correlation_id = %ctx.correlation_id,
                user_id = envelope.event.user_id().unwrap_or("unknown"),
                error = %error,
                "slack event could not be handled"
            ),
        }
    });
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use chrono::Utc;
    use serde_json::{json, Value};
    use skillmatch_core::domain::employee::{Employee, EmployeeId};
    use skillmatch_core::domain::skill::{SkillDefinition, SkillGroup, SkillGroupId, SkillId};
    use skillmatch_db::InMemoryEmployeeDirectory;
    use skillmatch_slack::blocks::MessageTemplate;
    use skillmatch_slack::gateway::{Channel, ExtendedProfile, UserProfile};
    use skillmatch_slack::{
        conversation_dispatcher, GatewayError, MessageFormatter, PlatformGateway, RosterManager,
    };
    use tower::ServiceExt;

    use super::{router, SlackState};
    use crate::signing;

    #[derive(Default)]
    struct RecordingGateway {
        posted: Mutex<Vec<(String, MessageTemplate)>>,
        responses: Mutex<Vec<(String, Vec<Value>)>>,
    }

    impl RecordingGateway {
        fn posted_to(&self) -> Vec<String> {
            self.posted.lock().expect("posted lock").iter().map(|(to, _)| to.clone()).collect()
        }

        fn response_count(&self) -> usize {
            self.responses.lock().expect("responses lock").len()
        }
    }

    #[async_trait]
    impl PlatformGateway for RecordingGateway {
        async fn list_channels(&self) -> Result<Vec<Channel>, GatewayError> {
            Ok(vec![Channel { id: "C1".to_owned(), name: "skillmatch".to_owned() }])
        }

        async fn list_members(&self, _channel_id: &str) -> Result<Vec<String>, GatewayError> {
            Ok(vec!["U1".to_owned()])
        }

        async fn user_profile(&self, _user_id: &str) -> Result<UserProfile, GatewayError> {
            Ok(UserProfile { real_name: "Jane Doe".to_owned(), first_name: Some("Jane".to_owned()) })
        }

        async fn extended_profile(
            &self,
            _user_id: &str,
        ) -> Result<Option<ExtendedProfile>, GatewayError> {
            Ok(None)
        }

        async fn post_message(
            &self,
            channel: &str,
            message: &MessageTemplate,
        ) -> Result<(), GatewayError> {
            self.posted.lock().expect("posted lock").push((channel.to_owned(), message.clone()));
            Ok(())
        }

        async fn post_to_response_url(
            &self,
            response_url: &str,
            blocks: Vec<Value>,
        ) -> Result<(), GatewayError> {
            self.responses.lock().expect("responses lock").push((response_url.to_owned(), blocks));
            Ok(())
        }
    }

    fn app(signing_secret: Option<&str>) -> (Router, Arc<RecordingGateway>) {
        let gateway = Arc::new(RecordingGateway::default());
        let directory = Arc::new(InMemoryEmployeeDirectory::new(
            vec![SkillGroup {
                id: SkillGroupId("grp-languages".to_owned()),
                name: "Languages".to_owned(),
                skills: vec![SkillDefinition {
                    id: SkillId("skl-rust".to_owned()),
                    name: "Rust".to_owned(),
                    hot: true,
                }],
            }],
            vec![Employee {
                id: EmployeeId("emp-jane-doe".to_owned()),
                name: "Jane Doe".to_owned(),
                roll_off_date: Some("2026-12-18".to_owned()),
                current_project: Some("Atlas Migration".to_owned()),
                skills: vec![],
            }],
        ));
        let roster = Arc::new(RosterManager::new(
            gateway.clone(),
            directory,
            Arc::new(MessageFormatter::default()),
        ));
        let dispatcher = Arc::new(conversation_dispatcher(roster.clone()));
        let state = SlackState::new(
            roster,
            dispatcher,
            vec!["skillmatch".to_owned()],
            signing_secret.map(|secret| secret.to_owned().into()),
        );
        (router(state), gateway)
    }

    async fn eventually(check: impl Fn() -> bool) -> bool {
        for _ in 0..200 {
            if check() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        check()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    fn json_post(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    fn form_encode(value: &str) -> String {
        value
            .bytes()
            .map(|byte| {
                if byte.is_ascii_alphanumeric() {
                    (byte as char).to_string()
                } else {
                    format!("%{byte:02X}")
                }
            })
            .collect()
    }

    fn interactive_post(payload: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/slack/interactive")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(format!("payload={}", form_encode(&payload.to_string()))))
            .expect("request")
    }

    #[tokio::test]
    async fn url_verification_echoes_the_challenge() {
        let (app, _) = app(None);

        let response = app
            .oneshot(json_post("/api/slack", &json!({ "type": "url_verification", "challenge": "abc123" })))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "challenge": "abc123" }));
    }

    #[tokio::test]
    async fn message_callbacks_are_answered_in_the_background() {
        let (app, gateway) = app(None);
        let body = json!({
            "type": "event_callback",
            "event_id": "Ev01",
            "event": { "type": "message", "user": "U9", "text": "hi", "channel": "D9" }
        });

        let response = app.oneshot(json_post("/api/slack", &body)).await.expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert!(eventually(|| gateway.posted_to() == vec!["U9"]).await);
    }

    #[tokio::test]
    async fn bot_messages_are_acknowledged_but_not_answered() {
        let (app, gateway) = app(None);
        let body = json!({
            "type": "event_callback",
            "event": { "type": "message", "user": "U9", "text": "hi", "bot_id": "B1" }
        });

        let response = app.oneshot(json_post("/api/slack", &body)).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(gateway.posted_to().is_empty());
    }

    #[tokio::test]
    async fn block_actions_reply_through_the_response_url() {
        let (app, gateway) = app(None);
        let payload = json!({
            "type": "block_actions",
            "user": { "id": "U9" },
            "response_url": "https://hooks.slack.test/actions/1",
            "trigger_id": "T-1",
            "message": { "blocks": [] },
            "actions": [{ "type": "button", "action_id": "add", "block_id": "menu", "value": "add" }]
        });

        let response = app.oneshot(interactive_post(&payload)).await.expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert!(eventually(|| gateway.response_count() == 1).await);
        assert!(gateway.posted_to().is_empty());
    }

    #[tokio::test]
    async fn other_interactions_are_acknowledged_and_ignored() {
        let (app, gateway) = app(None);
        let payload = json!({ "type": "view_submission", "user": { "id": "U9" } });

        let response = app.oneshot(interactive_post(&payload)).await.expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(gateway.response_count(), 0);
    }

    #[tokio::test]
    async fn broadcast_trigger_builds_the_roster_and_greets_members() {
        let (app, gateway) = app(None);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/slack?value=avail&channel=skillmatch")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert!(eventually(|| gateway.posted_to() == vec!["U1"]).await);
    }

    #[tokio::test]
    async fn broadcast_trigger_rejects_unknown_modes() {
        let (app, _) = app(None);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/slack?value=everything&channel=skillmatch")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn channels_lists_configured_subscriptions() {
        let (app, _) = app(None);

        let response = app
            .oneshot(Request::builder().uri("/api/slack/channels").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "channels": ["skillmatch"] }));
    }

    #[tokio::test]
    async fn signed_routes_reject_requests_without_a_valid_signature() {
        let (app, _) = app(Some("shhh"));
        let body = json!({ "type": "url_verification", "challenge": "abc123" });

        let unsigned = app.clone().oneshot(json_post("/api/slack", &body)).await.expect("response");
        assert_eq!(unsigned.status(), StatusCode::UNAUTHORIZED);

        let timestamp = Utc::now().timestamp().to_string();
        let signature =
            signing::sign("shhh", &timestamp, body.to_string().as_bytes()).expect("signature");
        let mut signed = json_post("/api/slack", &body);
        signed.headers_mut().insert(signing::TIMESTAMP_HEADER, timestamp.parse().expect("header"));
        signed.headers_mut().insert(signing::SIGNATURE_HEADER, signature.parse().expect("header"));

        let response = app.clone().oneshot(signed).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "challenge": "abc123" }));

        let channels = app
            .oneshot(Request::builder().uri("/api/slack/channels").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(channels.status(), StatusCode::OK);
    }
}
