use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::flows::selection::{CandidateGroup, CandidateSkill};

/// Chosen when a conversation is bootstrapped and fixed for its lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationMode {
    Skill,
    #[serde(rename = "avail")]
    Availability,
}

impl ConversationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Skill => "skill",
            Self::Availability => "avail",
        }
    }
}

impl FromStr for ConversationMode {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "skill" => Ok(Self::Skill),
            "avail" => Ok(Self::Availability),
            other => Err(DomainError::UnknownConversationMode(other.to_owned())),
        }
    }
}

impl fmt::Display for ConversationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillFlow {
    Add,
    Update,
}

impl SkillFlow {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Update => "update",
        }
    }

    /// The subflow offered when this one has nothing to work on.
    pub fn alternative(self) -> Self {
        match self {
            Self::Add => Self::Update,
            Self::Update => Self::Add,
        }
    }
}

/// Where a participant is in the dialogue. Subflow variants carry the candidate groups computed
/// on entry, so nothing about the conversation position lives outside this value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConversationState {
    #[default]
    AwaitingBootstrap,
    SkillOverviewPrompt,
    AvailabilityPrompt,
    AwaitingFlowSwitch {
        from: SkillFlow,
    },
    AwaitingSkillGroupSelection {
        subflow: SkillFlow,
        candidates: Vec<CandidateGroup>,
    },
    AwaitingSkillSelection {
        subflow: SkillFlow,
        candidates: Vec<CandidateGroup>,
        group: CandidateGroup,
    },
    AwaitingLevelSelection {
        subflow: SkillFlow,
        candidates: Vec<CandidateGroup>,
        group: CandidateGroup,
        skill: CandidateSkill,
    },
    Terminal,
}

impl ConversationState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::AwaitingBootstrap => "awaiting_bootstrap",
            Self::SkillOverviewPrompt => "skill_overview_prompt",
            Self::AvailabilityPrompt => "availability_prompt",
            Self::AwaitingFlowSwitch { .. } => "awaiting_flow_switch",
            Self::AwaitingSkillGroupSelection { .. } => "awaiting_skill_group_selection",
            Self::AwaitingSkillSelection { .. } => "awaiting_skill_selection",
            Self::AwaitingLevelSelection { .. } => "awaiting_level_selection",
            Self::Terminal => "terminal",
        }
    }

    pub fn subflow(&self) -> Option<SkillFlow> {
        match self {
            Self::AwaitingSkillGroupSelection { subflow, .. }
            | Self::AwaitingSkillSelection { subflow, .. }
            | Self::AwaitingLevelSelection { subflow, .. } => Some(*subflow),
            _ => None,
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self, Self::SkillOverviewPrompt | Self::AvailabilityPrompt)
    }
}
