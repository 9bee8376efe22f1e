use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::{blocks::MessageTemplate, roster::RosterError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub event: SlackEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    Message(MessageEvent),
    BlockAction(BlockActionEvent),
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::Message(_) => SlackEventType::Message,
            Self::BlockAction(_) => SlackEventType::BlockAction,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::Message(event) => Some(&event.user_id),
            Self::BlockAction(event) => Some(&event.user_id),
            Self::Unsupported { .. } => None,
        }
    }

    /// Decodes the `event` object of an Events API `event_callback`.
    pub fn from_event_callback(event: &Value) -> Self {
        let Ok(raw) = RawMessageEvent::deserialize(event) else {
            return Self::unsupported(event);
        };
        if raw.event_type != "message" {
            return Self::Unsupported { event_type: raw.event_type };
        }
        Self::Message(MessageEvent {
            user_id: raw.user.unwrap_or_default(),
            channel_id: raw.channel,
            text: raw.text.unwrap_or_default(),
            bot_id: raw.bot_id,
            subtype: raw.subtype,
        })
    }

    /// Decodes an interactive `payload`. Only the first action of a `block_actions` payload is
    /// used; a select contributes its selected option's value, a button its own value.
    pub fn from_interactive_payload(payload: &Value) -> Self {
        let Ok(raw) = RawInteractivePayload::deserialize(payload) else {
            return Self::unsupported(payload);
        };
        if raw.payload_type != "block_actions" {
            return Self::Unsupported { event_type: raw.payload_type };
        }
        let Some(action) = raw.actions.into_iter().next() else {
            return Self::Unsupported { event_type: "block_actions_without_action".to_owned() };
        };

        let value = if action.action_type == "static_select" {
            action.selected_option.map(|option| option.value)
        } else {
            action.value
        };

        Self::BlockAction(BlockActionEvent {
            user_id: raw.user.id,
            value: value.unwrap_or_default(),
            action_id: action.action_id,
            block_id: action.block_id,
            response_url: raw.response_url,
            message_blocks: raw.message.map(|message| message.blocks).unwrap_or_default(),
            bot_id: raw.bot_id,
        })
    }

    fn unsupported(value: &Value) -> Self {
        let event_type =
            value.get("type").and_then(Value::as_str).unwrap_or("malformed").to_owned();
        Self::Unsupported { event_type }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    Message,
    BlockAction,
    Unsupported,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MessageEvent {
    pub user_id: String,
    pub channel_id: Option<String>,
    pub text: String,
    pub bot_id: Option<String>,
    pub subtype: Option<String>,
}

impl MessageEvent {
    /// Bot echoes and edits/joins/other subtyped messages never reach a conversation.
    pub fn is_conversational(&self) -> bool {
        self.bot_id.is_none() && self.subtype.is_none() && !self.user_id.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockActionEvent {
    pub user_id: String,
    pub value: String,
    pub action_id: Option<String>,
    pub block_id: Option<String>,
    pub response_url: Option<String>,
    pub message_blocks: Vec<Value>,
    pub bot_id: Option<String>,
}

#[derive(Deserialize)]
struct RawMessageEvent {
    #[serde(rename = "type")]
    event_type: String,
    user: Option<String>,
    text: Option<String>,
    channel: Option<String>,
    bot_id: Option<String>,
    subtype: Option<String>,
}

#[derive(Deserialize)]
struct RawInteractivePayload {
    #[serde(rename = "type")]
    payload_type: String,
    user: RawUser,
    response_url: Option<String>,
    #[serde(default)]
    actions: Vec<RawAction>,
    message: Option<RawMessage>,
    bot_id: Option<String>,
}

#[derive(Deserialize)]
struct RawUser {
    id: String,
}

#[derive(Deserialize)]
struct RawAction {
    #[serde(rename = "type")]
    action_type: String,
    action_id: Option<String>,
    block_id: Option<String>,
    value: Option<String>,
    selected_option: Option<RawOption>,
}

#[derive(Deserialize)]
struct RawOption {
    value: String,
}

#[derive(Deserialize)]
struct RawMessage {
    #[serde(default)]
    blocks: Vec<Value>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(MessageTemplate),
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Roster(#[from] RosterError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> SlackEventType;
    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<SlackEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Dispatcher wired to a single service that handles both free-text and interactive input.
pub fn conversation_dispatcher<S>(service: Arc<S>) -> EventDispatcher
where
    S: MessageService + BlockActionService + 'static,
{
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(MessageHandler::new(service.clone()));
    dispatcher.register(BlockActionHandler::new(service));
    dispatcher
}

#[async_trait]
pub trait MessageService: Send + Sync {
    async fn handle_message(
        &self,
        event: &MessageEvent,
        ctx: &EventContext,
    ) -> Result<Option<MessageTemplate>, EventHandlerError>;
}

#[async_trait]
impl<T> MessageService for Arc<T>
where
    T: MessageService + ?Sized,
{
    async fn handle_message(
        &self,
        event: &MessageEvent,
        ctx: &EventContext,
    ) -> Result<Option<MessageTemplate>, EventHandlerError> {
        (**self).handle_message(event, ctx).await
    }
}

pub struct MessageHandler<S> {
    service: S,
}

impl<S> MessageHandler<S>
where
    S: MessageService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for MessageHandler<S>
where
    S: MessageService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::Message
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::Message(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        if !event.is_conversational() {
            return Ok(HandlerResult::Ignored);
        }

        let message = self.service.handle_message(event, ctx).await?;
        Ok(match message {
            Some(message) => HandlerResult::Responded(message),
            None => HandlerResult::Processed,
        })
    }
}

#[async_trait]
pub trait BlockActionService: Send + Sync {
    async fn handle_block_action(
        &self,
        event: &BlockActionEvent,
        ctx: &EventContext,
    ) -> Result<Option<MessageTemplate>, EventHandlerError>;
}

#[async_trait]
impl<T> BlockActionService for Arc<T>
where
    T: BlockActionService + ?Sized,
{
    async fn handle_block_action(
        &self,
        event: &BlockActionEvent,
        ctx: &EventContext,
    ) -> Result<Option<MessageTemplate>, EventHandlerError> {
        (**self).handle_block_action(event, ctx).await
    }
}

pub struct BlockActionHandler<S> {
    service: S,
}

impl<S> BlockActionHandler<S>
where
    S: BlockActionService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for BlockActionHandler<S>
where
    S: BlockActionService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::BlockAction
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::BlockAction(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        if event.bot_id.is_some() {
            return Ok(HandlerResult::Ignored);
        }

        let message = self.service.handle_block_action(event, ctx).await?;
        Ok(match message {
            Some(message) => HandlerResult::Responded(message),
            None => HandlerResult::Processed,
        })
    }
}
