//! Turns directory data into Slack messages. Everything here is pure; the conversation engine
//! decides which message to send and this module decides what it looks like.

use skillmatch_core::config::{AppConfig, ChatbotConfig};
use skillmatch_core::domain::employee::{EmployeeSnapshot, RatingWriteOutcome};
use skillmatch_core::domain::skill::SkillLevel;
use skillmatch_core::flows::{CandidateGroup, CandidateSkill, ConversationMode};

use crate::blocks::{
    text_message, ActionElement, ButtonElement, MessageBuilder, MessageTemplate, SelectElement,
};

const STAR: &str = ":star:";
const EMPTY_STAR: &str = ":starempty:";

const GREETING_SUFFIX: &str = "This is SkillMatch :slightly_smiling_face:\n";
const NOT_AVAILABLE: &str =
    "Hello there, SkillMatch bot is not available right now, please come back later";
const EMPLOYEE_NOT_FOUND: &str = "I could not find your profile in our database";
const NO_SKILLS_ON_FILE: &str = "I cannot find any skills that you have in the database.";
const PARSE_ERROR: &str = "Sorry I do not understand this message:disapointed_relieved:";
const WRITE_FAILED: &str =
    "Oops, it appears something wrong happened when updating your skill set:dissapointed_relieved:";
const PROFILE_NOT_MATCHED: &str =
    "Sorry we are not able to match your profile in our database, please try again later.";

pub const DEFAULT_MENU_PROMPT: &str = "Would you like to:";
pub const FOLLOW_UP_MENU_PROMPT: &str = "What else can I help you for?";
pub const DEFAULT_CONFIRM_PROMPT: &str = "Is this correct?";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageFormatter {
    product_url: String,
    availability_url: String,
    show_empty_stars: bool,
}

impl Default for MessageFormatter {
    fn default() -> Self {
        Self::from_config(&AppConfig::default().chatbot)
    }
}

impl MessageFormatter {
    pub fn from_config(config: &ChatbotConfig) -> Self {
        Self {
            product_url: config.product_url.clone(),
            availability_url: config.availability_url.clone(),
            show_empty_stars: config.show_empty_stars,
        }
    }

    pub fn greeting(&self, name: &str) -> String {
        format!("Hello {name}! {GREETING_SUFFIX}")
    }

    pub fn not_found(&self, greeting: &str, mode: ConversationMode) -> MessageTemplate {
        let reason = match mode {
            ConversationMode::Skill => EMPLOYEE_NOT_FOUND,
            ConversationMode::Availability => NOT_AVAILABLE,
        };
        text_message(format!("{greeting}{reason}"))
    }

    pub fn stars(&self, level: SkillLevel) -> String {
        let filled = usize::from(level.value());
        let mut stars = STAR.repeat(filled);
        if self.show_empty_stars {
            stars.push_str(&EMPTY_STAR.repeat(usize::from(SkillLevel::MAX) - filled));
        }
        stars
    }

    pub fn skill_overview(&self, greeting: &str, snapshot: &EmployeeSnapshot) -> MessageTemplate {
        text_message(format!("{greeting}Let's review your skills today. Your current skills: "))
            .then(self.overview_sections(snapshot))
            .then(self.actions_menu(DEFAULT_MENU_PROMPT))
    }

    /// One section per group the employee holds skills in.
    pub fn overview_sections(&self, snapshot: &EmployeeSnapshot) -> MessageTemplate {
        let mut builder = MessageBuilder::new("Your current skills");
        let mut rendered = 0;
        for (index, group) in snapshot.non_empty_groups().enumerate() {
            let mut text = format!("*{}*", group.name);
            for skill in &group.skills {
                text.push_str(&format!(
                    "\n- *{}*\t {}\t[{}]",
                    skill.name,
                    self.stars(skill.rating),
                    skill.rating.description()
                ));
            }
            builder = builder.section_with_id(format!("skillgroup-{index}"), |section| {
                section.mrkdwn(text);
            });
            rendered += 1;
        }

        if rendered == 0 {
            return text_message(NO_SKILLS_ON_FILE);
        }
        builder.build()
    }

    pub fn actions_menu(&self, prompt: &str) -> MessageTemplate {
        MessageBuilder::new(prompt)
            .section(|section| {
                section.mrkdwn(prompt);
            })
            .actions(|actions| {
                actions
                    .button(ButtonElement::new("Add a Skill").value("add"))
                    .button(ButtonElement::new("Update a Skill").value("update"))
                    .button(ButtonElement::new("Thanks, I'm good").value("no"));
            })
            .build()
    }

    pub fn yes_or_no(&self, prompt: &str) -> MessageTemplate {
        MessageBuilder::new(prompt)
            .section(|section| {
                section.mrkdwn(prompt);
            })
            .actions(|actions| {
                actions
                    .button(ButtonElement::new("Yes").value("yes"))
                    .button(ButtonElement::new("No").value("no"));
            })
            .build()
    }

    pub fn product_link(&self) -> MessageTemplate {
        text_message(format!("To manage your skills and more, please go to: {}", self.product_url))
    }

    pub fn goodbye(&self) -> MessageTemplate {
        text_message("Have a good day!").then(self.product_link())
    }

    /// Product link plus the follow-up menu; every subflow exit that is not a write ends here.
    pub fn back_to_menu(&self) -> MessageTemplate {
        self.product_link().then(self.actions_menu(FOLLOW_UP_MENU_PROMPT))
    }

    pub fn cannot_add_more(&self) -> MessageTemplate {
        text_message("Cannot add more skills").then(self.yes_or_no("Do you want to modify any skill?"))
    }

    pub fn no_skills_to_update(&self) -> MessageTemplate {
        text_message("You do not have any skills").then(self.yes_or_no("Do you want to add any skill?"))
    }

    pub fn group_not_found(&self) -> MessageTemplate {
        text_message("Cannot find this skill group.")
    }

    pub fn group_selection(&self, groups: &[CandidateGroup], prompt: &str) -> MessageTemplate {
        MessageBuilder::new(prompt)
            .section(|section| {
                section.mrkdwn(prompt);
            })
            .actions(|actions| {
                actions.select(
                    SelectElement::new("skillgroups", "Select a type")
                        .options(groups.iter().map(|group| group.name.clone())),
                );
            })
            .build()
    }

    pub fn skill_selection(
        &self,
        skills: &[CandidateSkill],
        prompt: &str,
        back_label: &str,
    ) -> MessageTemplate {
        MessageBuilder::new(prompt)
            .section(|section| {
                section.mrkdwn(prompt).accessory(back_button("skills-goback", back_label));
            })
            .actions(|actions| {
                actions.select(
                    SelectElement::new("skills", "Select a skill")
                        .options(skills.iter().map(|skill| skill.name.clone())),
                );
            })
            .build()
    }

    pub fn level_selection(&self, prompt: &str, back_label: &str) -> MessageTemplate {
        MessageBuilder::new(prompt)
            .section(|section| {
                section.mrkdwn(prompt).accessory(back_button("level-goback", back_label));
            })
            .actions(|actions| {
                for level in SkillLevel::all() {
                    actions.button(
                        ButtonElement::new(format!(
                            "{} [{}]",
                            self.stars(level),
                            level.description()
                        ))
                        .action_id(format!("skilllevel{level}"))
                        .value(level.to_string()),
                    );
                }
            })
            .build()
    }

    pub fn add_result(
        &self,
        skill: &str,
        level: SkillLevel,
        outcome: RatingWriteOutcome,
    ) -> MessageTemplate {
        let summary = match outcome {
            RatingWriteOutcome::Applied => format!(
                "We have successfully added *{skill}* to your skill set with level *{level}*!:white_check_mark:"
            ),
            RatingWriteOutcome::Unchanged => {
                format!("Unsuccessfully added *{skill}* to your skill set with level *{level}*")
            }
            RatingWriteOutcome::ProfileNotFound => PROFILE_NOT_MATCHED.to_owned(),
        };
        text_message(summary).then(self.back_to_menu())
    }

    pub fn update_result(
        &self,
        skill: &str,
        previous: Option<SkillLevel>,
        level: SkillLevel,
        outcome: RatingWriteOutcome,
    ) -> MessageTemplate {
        let summary = match (outcome, previous) {
            (RatingWriteOutcome::Applied, Some(previous)) => format!(
                "We have successfully changed your *{skill}* skill from level *{previous}* to level *{level}*!:white_check_mark:"
            ),
            (RatingWriteOutcome::Applied, None) => format!(
                "We have successfully changed your *{skill}* skill to level *{level}*!:white_check_mark:"
            ),
            (RatingWriteOutcome::Unchanged, _) => {
                format!("Unsuccessfully changed *{skill}* in your skill set.")
            }
            (RatingWriteOutcome::ProfileNotFound, _) => PROFILE_NOT_MATCHED.to_owned(),
        };
        text_message(summary).then(self.back_to_menu())
    }

    pub fn write_failed(&self) -> MessageTemplate {
        text_message(WRITE_FAILED).then(self.actions_menu(FOLLOW_UP_MENU_PROMPT))
    }

    pub fn availability(&self, greeting: &str, snapshot: &EmployeeSnapshot) -> MessageTemplate {
        let roll_off = snapshot.roll_off_date.as_deref().unwrap_or_default();
        let project = snapshot.current_project.as_deref().unwrap_or_default();
        text_message(greeting)
            .then(text_message(format!("Currently your availability date is: *{roll_off}*")))
            .then(text_message(format!("Your current project is *{project}*")))
            .then(self.yes_or_no(DEFAULT_CONFIRM_PROMPT))
    }

    pub fn availability_greeting(&self) -> MessageTemplate {
        text_message("greetings:)")
    }

    pub fn availability_confirmed(&self) -> MessageTemplate {
        text_message("Thanks for confirming!")
    }

    pub fn availability_update_link(&self) -> MessageTemplate {
        text_message(format!(
            "Please follow the link to update your information\n{}",
            self.availability_url
        ))
    }

    pub fn parse_error(&self) -> MessageTemplate {
        text_message(PARSE_ERROR)
    }
}

fn back_button(action_id: &str, label: &str) -> ActionElement {
    ActionElement::Button(ButtonElement::new(label).action_id(action_id).value("back"))
}

#[cfg(test)]
mod tests {
    use skillmatch_core::config::{AppConfig, ChatbotConfig};
    use skillmatch_core::domain::employee::{EmployeeSnapshot, RatingWriteOutcome};
    use skillmatch_core::domain::skill::{RatedSkill, RatedSkillGroup, SkillLevel};
    use skillmatch_core::flows::{CandidateSkill, ConversationMode};

    use super::MessageFormatter;
    use crate::blocks::{ActionElement, Block};

    fn level(value: u8) -> SkillLevel {
        SkillLevel::new(value).expect("level")
    }

    fn snapshot() -> EmployeeSnapshot {
        EmployeeSnapshot {
            roll_off_date: Some("2026-12-18".to_owned()),
            current_project: Some("Atlas Migration".to_owned()),
            groups: vec![
                RatedSkillGroup {
                    name: "Languages".to_owned(),
                    skills: vec![RatedSkill { name: "Go".to_owned(), hot: false, rating: level(2) }],
                },
                RatedSkillGroup { name: "Cloud".to_owned(), skills: vec![] },
            ],
        }
    }

    #[test]
    fn overview_renders_non_empty_groups_with_stars() {
        let formatter = MessageFormatter::default();
        let message = formatter.overview_sections(&snapshot());

        assert_eq!(message.blocks.len(), 1);
        let Block::Section { block_id, text, .. } = &message.blocks[0] else {
            panic!("expected section");
        };
        assert_eq!(block_id.as_deref(), Some("skillgroup-0"));
        assert_eq!(
            text.text(),
            "*Languages*\n- *Go*\t :star::star::starempty::starempty::starempty:\t[Some Experience]"
        );
    }

    #[test]
    fn overview_without_skills_says_so() {
        let formatter = MessageFormatter::default();
        let message = formatter.overview_sections(&EmployeeSnapshot::default());
        assert_eq!(message.texts(), vec!["I cannot find any skills that you have in the database."]);
    }

    #[test]
    fn empty_stars_can_be_hidden() {
        let formatter = MessageFormatter::from_config(&ChatbotConfig {
            show_empty_stars: false,
            ..AppConfig::default().chatbot
        });
        assert_eq!(formatter.stars(level(3)), ":star::star::star:");
    }

    #[test]
    fn skill_overview_ends_with_the_actions_menu() {
        let formatter = MessageFormatter::default();
        let greeting = formatter.greeting("Jane");
        let message = formatter.skill_overview(&greeting, &snapshot());
        let texts = message.texts();

        assert!(texts[0].starts_with("Hello Jane! This is SkillMatch"));
        assert!(texts[0].ends_with("Your current skills: "));
        assert_eq!(&texts[texts.len() - 4..], ["Would you like to:", "Add a Skill", "Update a Skill", "Thanks, I'm good"]);
    }

    #[test]
    fn level_selection_offers_five_levels_and_a_back_button() {
        let formatter = MessageFormatter::default();
        let message = formatter.level_selection("Pick a level", "Choose another skill");

        let Block::Section { accessory: Some(ActionElement::Button(back)), .. } = &message.blocks[0]
        else {
            panic!("expected back accessory");
        };
        assert_eq!(back.action_id.as_deref(), Some("level-goback"));
        assert_eq!(back.value.as_deref(), Some("back"));

        let Block::Actions { elements, .. } = &message.blocks[1] else {
            panic!("expected actions");
        };
        assert_eq!(elements.len(), 5);
        let ActionElement::Button(first) = &elements[0] else {
            panic!("expected button");
        };
        assert_eq!(first.action_id.as_deref(), Some("skilllevel1"));
        assert_eq!(first.value.as_deref(), Some("1"));
        assert_eq!(
            first.text.text(),
            ":star::starempty::starempty::starempty::starempty: [Acquiring Skill]"
        );
    }

    #[test]
    fn skill_selection_lists_candidates_in_a_select() {
        let formatter = MessageFormatter::default();
        let skills = vec![CandidateSkill { name: "Rust".to_owned(), hot: true, current: None }];
        let message = formatter.skill_selection(&skills, "Pick", "Back");
        let value = message.blocks_json().expect("serialize");
        assert_eq!(value[0]["accessory"]["action_id"], "skills-goback");
        assert_eq!(value[1]["elements"][0]["action_id"], "skills");
        assert_eq!(value[1]["elements"][0]["options"][0]["value"], "Rust");
    }

    #[test]
    fn write_results_follow_the_outcome() {
        let formatter = MessageFormatter::default();
        let applied = formatter.update_result("Go", Some(level(2)), level(4), RatingWriteOutcome::Applied);
        assert!(applied.texts()[0].contains("from level *2* to level *4*"));

        let unchanged = formatter.add_result("Rust", level(3), RatingWriteOutcome::Unchanged);
        assert_eq!(unchanged.texts()[0], "Unsuccessfully added *Rust* to your skill set with level *3*");

        let missing = formatter.add_result("Rust", level(3), RatingWriteOutcome::ProfileNotFound);
        assert!(missing.texts()[0].starts_with("Sorry we are not able to match your profile"));
        assert!(missing.texts().contains(&"What else can I help you for?"));
    }

    #[test]
    fn not_found_depends_on_mode() {
        let formatter = MessageFormatter::default();
        let greeting = formatter.greeting("Sam");
        assert!(formatter
            .not_found(&greeting, ConversationMode::Skill)
            .texts()[0]
            .ends_with("I could not find your profile in our database"));
        assert!(formatter
            .not_found(&greeting, ConversationMode::Availability)
            .texts()[0]
            .contains("SkillMatch bot is not available right now"));
    }

    #[test]
    fn availability_prompt_shows_roll_off_and_project() {
        let formatter = MessageFormatter::default();
        let message = formatter.availability("Hello Jane! ", &snapshot());
        let texts = message.texts();
        assert_eq!(texts[1], "Currently your availability date is: *2026-12-18*");
        assert_eq!(texts[2], "Your current project is *Atlas Migration*");
        assert_eq!(&texts[3..], ["Is this correct?", "Yes", "No"]);
    }
}
