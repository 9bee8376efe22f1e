//! Per-participant dialogue driver.
//!
//! Each call to [`ConversationEngine::advance`] performs exactly one transition: it takes the
//! current [`ConversationState`], does whatever directory work the input calls for, stores the
//! next state and returns the reply. Input that can be rejected locally (an unknown group, a bad
//! level) re-prompts from the same state instead of failing.

use std::sync::Arc;

use tracing::{debug, info, warn};

use skillmatch_core::directory::EmployeeDirectory;
use skillmatch_core::domain::employee::{EmployeeId, EmployeeLookup, EmployeeSnapshot};
use skillmatch_core::domain::skill::SkillLevel;
use skillmatch_core::errors::ApplicationError;
use skillmatch_core::flows::intents::{
    classify_availability, classify_root, is_affirmative, is_back, AvailabilityIntent, RootIntent,
};
use skillmatch_core::flows::selection::{available_to_add, find_group, update_candidates};
use skillmatch_core::flows::{
    CandidateGroup, CandidateSkill, ConversationMode, ConversationState, SkillFlow,
};

use crate::blocks::MessageTemplate;
use crate::formatter::MessageFormatter;

/// Who the engine is talking to, as resolved by the roster.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParticipantIdentity {
    pub user_id: String,
    pub display_name: String,
    pub first_name: Option<String>,
    pub employee_id: Option<EmployeeId>,
}

impl ParticipantIdentity {
    pub fn lookup(&self) -> EmployeeLookup {
        EmployeeLookup::new(self.employee_id.clone(), self.display_name.clone())
    }

    fn greeting_name(&self) -> &str {
        self.first_name.as_deref().filter(|name| !name.is_empty()).unwrap_or(&self.display_name)
    }
}

pub struct ConversationEngine {
    identity: ParticipantIdentity,
    directory: Arc<dyn EmployeeDirectory>,
    formatter: Arc<MessageFormatter>,
    mode: ConversationMode,
    state: ConversationState,
    snapshot: EmployeeSnapshot,
}

impl ConversationEngine {
    pub fn new(
        identity: ParticipantIdentity,
        directory: Arc<dyn EmployeeDirectory>,
        formatter: Arc<MessageFormatter>,
    ) -> Self {
        Self {
            identity,
            directory,
            formatter,
            mode: ConversationMode::Skill,
            state: ConversationState::AwaitingBootstrap,
            snapshot: EmployeeSnapshot::default(),
        }
    }

    pub fn identity(&self) -> &ParticipantIdentity {
        &self.identity
    }

    pub fn mode(&self) -> ConversationMode {
        self.mode
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn snapshot(&self) -> &EmployeeSnapshot {
        &self.snapshot
    }

    /// Starts (or restarts) the conversation in `mode` and returns the opening message.
    pub async fn bootstrap(&mut self, mode: ConversationMode) -> MessageTemplate {
        self.mode = mode;
        let greeting = self.formatter.greeting(self.identity.greeting_name());

        if let Err(error) = self.refresh_snapshot().await {
            warn!(
                event_name = "conversation.bootstrap_failed",
                user_id = %self.identity.user_id,
                mode = %mode,
                error_class = error.error_class(),
                error = %error,
                "employee could not be resolved; conversation ends"
            );
            self.transition(ConversationState::Terminal);
            return self.formatter.not_found(&greeting, mode);
        }

        let (state, message) = match mode {
            ConversationMode::Skill => (
                ConversationState::SkillOverviewPrompt,
                self.formatter.skill_overview(&greeting, &self.snapshot),
            ),
            ConversationMode::Availability => (
                ConversationState::AvailabilityPrompt,
                self.formatter.availability(&greeting, &self.snapshot),
            ),
        };
        self.transition(state);
        message
    }

    /// Feeds one inbound text (typed or a button/select value) and returns the reply.
    pub async fn advance(&mut self, input: &str) -> MessageTemplate {
        let state = std::mem::take(&mut self.state);
        let previous = state.label();
        debug!(
            event_name = "conversation.input",
            user_id = %self.identity.user_id,
            state = previous,
            "advancing conversation"
        );

        let (next, message) = match state {
            ConversationState::AwaitingBootstrap | ConversationState::Terminal => {
                return self.bootstrap(self.mode).await;
            }
            ConversationState::SkillOverviewPrompt => self.on_root(input).await,
            ConversationState::AvailabilityPrompt => self.on_availability(input),
            ConversationState::AwaitingFlowSwitch { from } => {
                if is_affirmative(input) {
                    self.enter_subflow(from.alternative()).await
                } else {
                    (ConversationState::SkillOverviewPrompt, self.formatter.back_to_menu())
                }
            }
            ConversationState::AwaitingSkillGroupSelection { subflow, candidates } => {
                self.on_group(subflow, candidates, input)
            }
            ConversationState::AwaitingSkillSelection { subflow, candidates, group } => {
                self.on_skill(subflow, candidates, group, input)
            }
            ConversationState::AwaitingLevelSelection { subflow, candidates, group, skill } => {
                self.on_level(subflow, candidates, group, skill, input).await
            }
        };

        self.transition_from(previous, next);
        message
    }

    fn transition(&mut self, next: ConversationState) {
        self.transition_from(self.state.label(), next);
    }

    fn transition_from(&mut self, from: &'static str, next: ConversationState) {
        if from != next.label() {
            info!(
                event_name = "conversation.transition",
                user_id = %self.identity.user_id,
                mode = %self.mode,
                from,
                to = next.label(),
                "conversation state changed"
            );
        }
        self.state = next;
    }

    async fn refresh_snapshot(&mut self) -> Result<(), ApplicationError> {
        let lookup = self.identity.lookup();
        let not_found = || ApplicationError::IdentityNotFound { lookup: lookup.name.clone() };

        let employee = self.directory.find_employee(&lookup).await.map_err(|error| {
            warn!(
                event_name = "conversation.directory_error",
                user_id = %self.identity.user_id,
                error = %error,
                "employee lookup failed"
            );
            not_found()
        })?;
        let employee = employee.ok_or_else(not_found)?;
        let catalog = self.directory.find_all_skill_groups().await.map_err(|error| {
            ApplicationError::PlatformRequestFailed(format!("skill groups unavailable: {error}"))
        })?;

        self.snapshot = EmployeeSnapshot::from_records(&employee, &catalog);
        Ok(())
    }

    /// Refresh used after writes and on the root menu; a failure keeps the previous snapshot.
    async fn refresh_or_keep(&mut self) {
        if let Err(error) = self.refresh_snapshot().await {
            warn!(
                event_name = "conversation.refresh_failed",
                user_id = %self.identity.user_id,
                error_class = error.error_class(),
                error = %error,
                "keeping previous employee snapshot"
            );
        }
    }

    async fn on_root(&mut self, input: &str) -> (ConversationState, MessageTemplate) {
        match classify_root(input) {
            RootIntent::Add => self.enter_subflow(SkillFlow::Add).await,
            RootIntent::Update => self.enter_subflow(SkillFlow::Update).await,
            RootIntent::Decline => (ConversationState::Terminal, self.formatter.goodbye()),
            RootIntent::Refresh => {
                self.refresh_or_keep().await;
                let greeting = self.formatter.greeting(self.identity.greeting_name());
                (
                    ConversationState::SkillOverviewPrompt,
                    self.formatter.skill_overview(&greeting, &self.snapshot),
                )
            }
        }
    }

    fn on_availability(&self, input: &str) -> (ConversationState, MessageTemplate) {
        let reply = match classify_availability(input) {
            AvailabilityIntent::Greeting => self.formatter.availability_greeting(),
            AvailabilityIntent::Confirm => self.formatter.availability_confirmed(),
            AvailabilityIntent::Deny => self.formatter.availability_update_link(),
            AvailabilityIntent::Unknown => self.formatter.parse_error(),
        };
        (ConversationState::AvailabilityPrompt, reply)
    }

    async fn enter_subflow(&mut self, subflow: SkillFlow) -> (ConversationState, MessageTemplate) {
        let candidates = match subflow {
            SkillFlow::Add => match self.directory.find_all_skill_groups().await {
                Ok(catalog) => available_to_add(&catalog, &self.snapshot),
                Err(error) => {
                    self.log_failure(&ApplicationError::PlatformRequestFailed(error.to_string()));
                    return (ConversationState::SkillOverviewPrompt, self.formatter.write_failed());
                }
            },
            SkillFlow::Update => update_candidates(&self.snapshot),
        };

        if candidates.is_empty() {
            let message = match subflow {
                SkillFlow::Add => self.formatter.cannot_add_more(),
                SkillFlow::Update => self.formatter.no_skills_to_update(),
            };
            return (ConversationState::AwaitingFlowSwitch { from: subflow }, message);
        }

        let message = self.group_prompt(subflow, &candidates);
        (ConversationState::AwaitingSkillGroupSelection { subflow, candidates }, message)
    }

    fn on_group(
        &self,
        subflow: SkillFlow,
        candidates: Vec<CandidateGroup>,
        input: &str,
    ) -> (ConversationState, MessageTemplate) {
        let Some(group) = find_group(&candidates, input).cloned() else {
            self.log_ambiguous("selecting a skill group", input);
            let prompt = self.group_prompt(subflow, &candidates);
            let message = match subflow {
                SkillFlow::Add => prompt,
                SkillFlow::Update => self.formatter.group_not_found().then(prompt),
            };
            return (ConversationState::AwaitingSkillGroupSelection { subflow, candidates }, message);
        };

        let message = self.skill_prompt(subflow, &group);
        (ConversationState::AwaitingSkillSelection { subflow, candidates, group }, message)
    }

    fn on_skill(
        &self,
        subflow: SkillFlow,
        candidates: Vec<CandidateGroup>,
        group: CandidateGroup,
        input: &str,
    ) -> (ConversationState, MessageTemplate) {
        if is_back(input) {
            let message = self.group_prompt(subflow, &candidates);
            return (ConversationState::AwaitingSkillGroupSelection { subflow, candidates }, message);
        }

        let Some(skill) = group.find_skill(input).cloned() else {
            self.log_ambiguous("selecting a skill", input);
            let message = self.skill_prompt(subflow, &group);
            return (ConversationState::AwaitingSkillSelection { subflow, candidates, group }, message);
        };

        let message = self.level_prompt(subflow, &skill);
        (ConversationState::AwaitingLevelSelection { subflow, candidates, group, skill }, message)
    }

    async fn on_level(
        &mut self,
        subflow: SkillFlow,
        candidates: Vec<CandidateGroup>,
        group: CandidateGroup,
        skill: CandidateSkill,
        input: &str,
    ) -> (ConversationState, MessageTemplate) {
        if is_back(input) {
            let message = self.skill_prompt(subflow, &group);
            return (ConversationState::AwaitingSkillSelection { subflow, candidates, group }, message);
        }

        let level = match SkillLevel::parse(input) {
            Ok(level) => level,
            Err(error) => {
                self.log_failure(&ApplicationError::from(error));
                let message = self.level_prompt(subflow, &skill);
                return (
                    ConversationState::AwaitingLevelSelection { subflow, candidates, group, skill },
                    message,
                );
            }
        };

        let definition = match self.directory.find_all_skill_definitions().await {
            Ok(definitions) => definitions.into_iter().find(|definition| definition.name == skill.name),
            Err(error) => {
                self.log_failure(&ApplicationError::DirectoryWriteFailed(error.to_string()));
                return (ConversationState::SkillOverviewPrompt, self.formatter.write_failed());
            }
        };
        let Some(definition) = definition else {
            warn!(
                event_name = "conversation.skill_missing",
                user_id = %self.identity.user_id,
                skill = %skill.name,
                "selected skill is not in the catalog"
            );
            let message = self.level_prompt(subflow, &skill);
            return (
                ConversationState::AwaitingLevelSelection { subflow, candidates, group, skill },
                message,
            );
        };

        let lookup = self.identity.lookup();
        let written = match subflow {
            SkillFlow::Add => self.directory.add_skill_rating(&lookup, &definition.id, level).await,
            SkillFlow::Update => {
                self.directory.update_skill_rating(&lookup, &definition.id, level).await
            }
        };

        let message = match written {
            Ok(write) => {
                info!(
                    event_name = "conversation.rating_written",
                    user_id = %self.identity.user_id,
                    subflow = subflow.as_str(),
                    skill = %skill.name,
                    level = level.value(),
                    match_count = write.match_count,
                    modified_count = write.modified_count,
                    "skill rating write acknowledged"
                );
                match subflow {
                    SkillFlow::Add => self.formatter.add_result(&skill.name, level, write.outcome()),
                    SkillFlow::Update => self.formatter.update_result(
                        &skill.name,
                        skill.current,
                        level,
                        write.outcome(),
                    ),
                }
            }
            Err(error) => {
                self.log_failure(&ApplicationError::DirectoryWriteFailed(error.to_string()));
                self.formatter.write_failed()
            }
        };

        self.refresh_or_keep().await;
        (ConversationState::SkillOverviewPrompt, message)
    }

    fn group_prompt(&self, subflow: SkillFlow, candidates: &[CandidateGroup]) -> MessageTemplate {
        let prompt = match subflow {
            SkillFlow::Add => "Please select the type of skill you are looking for: ",
            SkillFlow::Update => "Please select the type of skill you want to update",
        };
        self.formatter.group_selection(candidates, prompt)
    }

    fn skill_prompt(&self, subflow: SkillFlow, group: &CandidateGroup) -> MessageTemplate {
        let (prompt, back) = match subflow {
            SkillFlow::Add => (
                format!("Please select the skill you want to add in *{}*", group.name),
                "Choose from another skill group",
            ),
            SkillFlow::Update => (
                format!("Please select the skill you want to update in *{}*", group.name),
                "Choose from other skill groups",
            ),
        };
        self.formatter.skill_selection(&group.skills, &prompt, back)
    }

    fn level_prompt(&self, subflow: SkillFlow, skill: &CandidateSkill) -> MessageTemplate {
        let prompt = match subflow {
            SkillFlow::Add => format!("Please select a level you want to add with *{}*", skill.name),
            SkillFlow::Update => {
                format!("Please select a level you want to modify for *{}*", skill.name)
            }
        };
        self.formatter.level_selection(&prompt, "Choose another skill")
    }

    fn log_ambiguous(&self, state: &str, input: &str) {
        self.log_failure(&ApplicationError::AmbiguousInput {
            state: state.to_owned(),
            input: input.to_owned(),
        });
    }

    fn log_failure(&self, error: &ApplicationError) {
        warn!(
            event_name = "conversation.recovered",
            user_id = %self.identity.user_id,
            error_class = error.error_class(),
            error = %error,
            "recoverable conversation error"
        );
    }
}
