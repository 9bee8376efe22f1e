//! Participant roster: who the bot talks to and the conversation each of them is in.
//!
//! The participant map sits behind a `RwLock` and every participant behind its own `Mutex`, so
//! different users advance concurrently while messages from the same user are serialized.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use skillmatch_core::directory::{DirectoryError, EmployeeDirectory};
use skillmatch_core::domain::employee::EmployeeId;
use skillmatch_core::errors::ApplicationError;
use skillmatch_core::flows::ConversationMode;

use crate::blocks::MessageTemplate;
use crate::conversation::{ConversationEngine, ParticipantIdentity};
use crate::events::{
    BlockActionEvent, BlockActionService, EventContext, EventHandlerError, MessageEvent,
    MessageService,
};
use crate::formatter::MessageFormatter;
use crate::gateway::{GatewayError, PlatformGateway};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RosterError {
    #[error("channel `{0}` was not found")]
    ChannelNotFound(String),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("employee directory unavailable: {0}")]
    Directory(#[from] DirectoryError),
    #[error("could not encode reply blocks: {0}")]
    Encode(String),
}

pub struct Participant {
    identity: ParticipantIdentity,
    engine: Option<ConversationEngine>,
    last_seen: Instant,
}

impl Participant {
    fn new(identity: ParticipantIdentity) -> Self {
        Self { identity, engine: None, last_seen: Instant::now() }
    }

    pub fn identity(&self) -> &ParticipantIdentity {
        &self.identity
    }

    pub fn engine(&self) -> Option<&ConversationEngine> {
        self.engine.as_ref()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RosterReport {
    pub channel_id: String,
    pub members: usize,
    pub resolved: usize,
    pub dropped: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
}

enum Delivery {
    Sent,
    Skipped,
    Failed,
}

pub struct RosterManager {
    gateway: Arc<dyn PlatformGateway>,
    directory: Arc<dyn EmployeeDirectory>,
    formatter: Arc<MessageFormatter>,
    participants: RwLock<HashMap<String, Arc<Mutex<Participant>>>>,
}

impl RosterManager {
    pub fn new(
        gateway: Arc<dyn PlatformGateway>,
        directory: Arc<dyn EmployeeDirectory>,
        formatter: Arc<MessageFormatter>,
    ) -> Self {
        Self { gateway, directory, formatter, participants: RwLock::new(HashMap::new()) }
    }

    pub async fn participant_count(&self) -> usize {
        self.participants.read().await.len()
    }

    pub async fn participant_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.participants.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn participant(&self, user_id: &str) -> Option<Arc<Mutex<Participant>>> {
        self.participants.read().await.get(user_id).cloned()
    }

    /// Rebuilds the roster from the members of `channel` (matched by name or id). The previous
    /// participants and their conversations are discarded.
    pub async fn init_roster(&self, channel: &str) -> Result<RosterReport, RosterError> {
        let channels = self.gateway.list_channels().await?;
        let channel_id = channels
            .iter()
            .find(|candidate| candidate.name == channel || candidate.id == channel)
            .map(|candidate| candidate.id.clone())
            .ok_or_else(|| RosterError::ChannelNotFound(channel.to_owned()))?;

        let members = self.gateway.list_members(&channel_id).await?;
        let employee_names = Arc::new(self.directory.list_employee_names().await?);

        let mut lookups = JoinSet::new();
        for user_id in members.iter().cloned() {
            let gateway = self.gateway.clone();
            let employee_names = employee_names.clone();
            lookups.spawn(async move { resolve_member(gateway, &employee_names, user_id).await });
        }

        let mut roster = HashMap::new();
        while let Some(joined) = lookups.join_next().await {
            match joined {
                Ok(Some(identity)) => {
                    roster.insert(
                        identity.user_id.clone(),
                        Arc::new(Mutex::new(Participant::new(identity))),
                    );
                }
                Ok(None) => {}
                Err(error) => {
                    warn!(event_name = "roster.member_task_failed", error = %error, "member lookup panicked");
                }
            }
        }

        let report = RosterReport {
            channel_id,
            members: members.len(),
            resolved: roster.len(),
            dropped: members.len().saturating_sub(roster.len()),
        };
        *self.participants.write().await = roster;

        info!(
            event_name = "roster.initialized",
            channel = %channel,
            channel_id = %report.channel_id,
            members = report.members,
            resolved = report.resolved,
            dropped = report.dropped,
            "roster rebuilt"
        );
        Ok(report)
    }

    /// Bootstraps every participant in `mode` and sends the opening message, one task each.
    pub async fn broadcast(&self, mode: ConversationMode) -> BroadcastReport {
        let participants: Vec<_> = self.participants.read().await.values().cloned().collect();

        let mut deliveries = JoinSet::new();
        for participant in participants {
            let gateway = self.gateway.clone();
            let directory = self.directory.clone();
            let formatter = self.formatter.clone();
            deliveries.spawn(async move {
                let mut participant = participant.lock().await;
                let user_id = participant.identity.user_id.clone();
                let identity = participant.identity.clone();
                let engine = participant
                    .engine
                    .get_or_insert_with(|| ConversationEngine::new(identity, directory, formatter));
                let message = engine.bootstrap(mode).await;
                participant.last_seen = Instant::now();
                drop(participant);

                if message.is_empty() {
                    return Delivery::Skipped;
                }
                match gateway.post_message(&user_id, &message).await {
                    Ok(()) => Delivery::Sent,
                    Err(error) => {
                        warn!(
                            event_name = "roster.broadcast_failed",
                            user_id = %user_id,
                            error_class = ApplicationError::from(error.clone()).error_class(),
                            error = %error,
                            "could not deliver opening message"
                        );
                        Delivery::Failed
                    }
                }
            });
        }

        let mut report = BroadcastReport::default();
        while let Some(joined) = deliveries.join_next().await {
            match joined {
                Ok(Delivery::Sent) => report.sent += 1,
                Ok(Delivery::Skipped) => report.skipped += 1,
                Ok(Delivery::Failed) | Err(_) => report.failed += 1,
            }
        }

        info!(
            event_name = "roster.broadcast",
            mode = %mode,
            sent = report.sent,
            skipped = report.skipped,
            failed = report.failed,
            "broadcast finished"
        );
        report
    }

    /// Drops participants not heard from within `max_idle`. Participants mid-step are kept.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut participants = self.participants.write().await;
        let before = participants.len();
        participants.retain(|_, participant| match participant.try_lock() {
            Ok(participant) => participant.last_seen.elapsed() <= max_idle,
            Err(_) => true,
        });
        let evicted = before - participants.len();
        if evicted > 0 {
            info!(event_name = "roster.evicted", evicted, "idle participants evicted");
        }
        evicted
    }

    /// Advances (or starts) the sender's conversation and returns the reply.
    async fn converse(&self, user_id: &str, input: &str) -> MessageTemplate {
        let participant = match self.participant(user_id).await {
            Some(participant) => participant,
            None => {
                info!(
                    event_name = "roster.participant_created",
                    user_id = %user_id,
                    "unknown sender; creating participant"
                );
                let identity = self.identify_sender(user_id).await;
                self.participants
                    .write()
                    .await
                    .entry(user_id.to_owned())
                    .or_insert_with(|| Arc::new(Mutex::new(Participant::new(identity))))
                    .clone()
            }
        };

        let mut participant = participant.lock().await;
        participant.last_seen = Instant::now();
        let identity = participant.identity.clone();
        match participant.engine.as_mut() {
            Some(engine) => engine.advance(input).await,
            None => {
                let engine = participant.engine.insert(ConversationEngine::new(
                    identity,
                    self.directory.clone(),
                    self.formatter.clone(),
                ));
                engine.bootstrap(ConversationMode::Skill).await
            }
        }
    }

    /// Identity for a sender who was not in the roster: extended profile first, basic profile
    /// as a fallback. A sender nobody can describe still gets a participant; the directory
    /// lookup will simply miss.
    async fn identify_sender(&self, user_id: &str) -> ParticipantIdentity {
        let mut identity = ParticipantIdentity { user_id: user_id.to_owned(), ..Default::default() };

        match self.gateway.extended_profile(user_id).await {
            Ok(Some(profile)) if !profile.real_name.is_empty() => {
                identity.employee_id = profile.employee_id().map(EmployeeId);
                identity.display_name = profile.real_name;
                identity.first_name = profile.first_name;
                return identity;
            }
            Ok(_) => {}
            Err(error) => {
                warn!(event_name = "roster.profile_failed", user_id = %user_id, error = %error, "extended profile unavailable");
            }
        }

        match self.gateway.user_profile(user_id).await {
            Ok(profile) => {
                identity.display_name = profile.real_name;
                identity.first_name = profile.first_name;
            }
            Err(error) => {
                warn!(event_name = "roster.profile_failed", user_id = %user_id, error = %error, "basic profile unavailable");
            }
        }
        identity
    }

    pub async fn handle_message(&self, event: &MessageEvent) -> Result<Option<MessageTemplate>, RosterError> {
        if !event.is_conversational() {
            debug!(event_name = "roster.event_ignored", user_id = %event.user_id, "bot or subtyped message");
            return Ok(None);
        }

        let reply = self.converse(&event.user_id, &event.text).await;
        if reply.is_empty() {
            return Ok(None);
        }
        self.gateway.post_message(&event.user_id, &reply).await?;
        Ok(Some(reply))
    }

    pub async fn handle_block_action(
        &self,
        event: &BlockActionEvent,
    ) -> Result<Option<MessageTemplate>, RosterError> {
        if event.bot_id.is_some() {
            return Ok(None);
        }

        let reply = self.converse(&event.user_id, &event.value).await;
        if reply.is_empty() {
            return Ok(None);
        }

        match &event.response_url {
            Some(response_url) => {
                let going_back = event.value == "back";
                let mut blocks =
                    truncate_for_response(&event.message_blocks, event.block_id.as_deref(), going_back);
                let reply_blocks =
                    reply.blocks_json().map_err(|error| RosterError::Encode(error.to_string()))?;
                if let Value::Array(reply_blocks) = reply_blocks {
                    blocks.extend(reply_blocks);
                }
                self.gateway.post_to_response_url(response_url, blocks).await?;
            }
            None => self.gateway.post_message(&event.user_id, &reply).await?,
        }
        Ok(Some(reply))
    }
}

async fn resolve_member(
    gateway: Arc<dyn PlatformGateway>,
    employee_names: &[String],
    user_id: String,
) -> Option<ParticipantIdentity> {
    let profile = match gateway.user_profile(&user_id).await {
        Ok(profile) => profile,
        Err(error) => {
            warn!(
                event_name = "roster.member_dropped",
                user_id = %user_id,
                error = %error,
                "member profile unavailable"
            );
            return None;
        }
    };

    let mut identity = ParticipantIdentity {
        user_id,
        display_name: profile.real_name,
        first_name: profile.first_name,
        employee_id: None,
    };
    if employee_names.contains(&identity.display_name) {
        return Some(identity);
    }

    debug!(
        event_name = "roster.name_unmatched",
        user_id = %identity.user_id,
        "real name not in directory, falling back to extended profile"
    );
    match gateway.extended_profile(&identity.user_id).await {
        Ok(Some(extended)) => identity.employee_id = extended.employee_id().map(EmployeeId),
        Ok(None) => {}
        Err(error) => {
            warn!(
                event_name = "roster.profile_failed",
                user_id = %identity.user_id,
                error = %error,
                "extended profile unavailable"
            );
        }
    }
    Some(identity)
}

/// Keeps the part of the original message that precedes the clicked block (one more block is
/// dropped when going back) and strips accessories from kept sections so stale buttons vanish.
/// A missing block counts as index -1 and negative ends count from the back of the list.
pub fn truncate_for_response(blocks: &[Value], block_id: Option<&str>, going_back: bool) -> Vec<Value> {
    let len = blocks.len() as i64;
    let index = block_id
        .and_then(|block_id| {
            blocks.iter().position(|block| block.get("block_id").and_then(Value::as_str) == Some(block_id))
        })
        .map_or(-1, |position| position as i64);
    let end = if going_back { index - 1 } else { index };
    let end = if end < 0 { (len + end).max(0) } else { end.min(len) };

    blocks
        .iter()
        .take(end as usize)
        .map(|block| {
            if block.get("type").and_then(Value::as_str) != Some("section") {
                return block.clone();
            }
            let mut kept = serde_json::Map::new();
            for key in ["type", "block_id", "text"] {
                if let Some(value) = block.get(key) {
                    kept.insert(key.to_owned(), value.clone());
                }
            }
            Value::Object(kept)
        })
        .collect()
}

#[async_trait]
impl MessageService for RosterManager {
    async fn handle_message(
        &self,
        event: &MessageEvent,
        ctx: &EventContext,
    ) -> Result<Option<MessageTemplate>, EventHandlerError> {
        debug!(event_name = "ingress.slack.message", correlation_id = %ctx.correlation_id, user_id = %event.user_id, "message event");
        Ok(RosterManager::handle_message(self, event).await?)
    }
}

#[async_trait]
impl BlockActionService for RosterManager {
    async fn handle_block_action(
        &self,
        event: &BlockActionEvent,
        ctx: &EventContext,
    ) -> Result<Option<MessageTemplate>, EventHandlerError> {
        debug!(
            event_name = "ingress.slack.block_action",
            correlation_id = %ctx.correlation_id,
            user_id = %event.user_id,
            action_id = event.action_id.as_deref().unwrap_or("none"),
            "block action event"
        );
        Ok(RosterManager::handle_block_action(self, event).await?)
    }
}
