//! Slack Integration - conversational skill and availability check-ins
//!
//! This crate provides the Slack interface for SkillMatch:
//! - **Gateway** (`gateway`) - Web API calls with linear rate-limit backoff
//! - **Roster** (`roster`) - channel members mapped to directory employees, one conversation each
//! - **Conversation** (`conversation`) - the per-user skill/availability state machine
//! - **Events** (`events`) - event callbacks and interactive payloads routed to handlers
//! - **Block Kit** (`blocks`, `formatter`) - message builders and the bot's wording
//!
//! # Architecture
//!
//! ```text
//! HTTP ingress → EventDispatcher → RosterManager → ConversationEngine → EmployeeDirectory
//!                                        ↓
//!                          PlatformGateway ← MessageFormatter
//! ```
//!
//! # Key Types
//!
//! - `RosterManager` - builds the roster, broadcasts openers, answers messages and actions
//! - `ConversationEngine` - advances one participant through the flows
//! - `SlackWebApi` - `PlatformGateway` over the Slack Web API
//! - `MessageBuilder` - Constructs rich Slack messages

pub mod blocks;
pub mod conversation;
pub mod events;
pub mod formatter;
pub mod gateway;
pub mod roster;

pub use conversation::{ConversationEngine, ParticipantIdentity};
pub use events::{conversation_dispatcher, EventContext, EventDispatcher, SlackEvent};
pub use formatter::MessageFormatter;
pub use gateway::{GatewayError, PlatformGateway, ReqwestTransport, RetryPolicy, SlackWebApi};
pub use roster::{BroadcastReport, RosterError, RosterManager, RosterReport};
