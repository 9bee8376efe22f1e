use serde::{Deserialize, Serialize};

use crate::domain::employee::EmployeeSnapshot;
use crate::domain::skill::{SkillGroup, SkillLevel};
use crate::flows::intents::names_match;

/// A skill offered during a subflow. `current` is the employee's rating for update candidates
/// and `None` for add candidates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSkill {
    pub name: String,
    pub hot: bool,
    pub current: Option<SkillLevel>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateGroup {
    pub name: String,
    pub skills: Vec<CandidateSkill>,
}

impl CandidateGroup {
    pub fn find_skill(&self, input: &str) -> Option<&CandidateSkill> {
        self.skills.iter().find(|skill| names_match(input, &skill.name))
    }
}

pub fn find_group<'a>(candidates: &'a [CandidateGroup], input: &str) -> Option<&'a CandidateGroup> {
    candidates.iter().find(|group| names_match(input, &group.name))
}

/// Catalog skills the employee does not hold yet, compared by name. Groups left empty are
/// dropped.
pub fn available_to_add(catalog: &[SkillGroup], snapshot: &EmployeeSnapshot) -> Vec<CandidateGroup> {
    let held = snapshot.held_skill_names();
    catalog
        .iter()
        .map(|group| CandidateGroup {
            name: group.name.clone(),
            skills: group
                .skills
                .iter()
                .filter(|skill| !held.contains(&skill.name.as_str()))
                .map(|skill| CandidateSkill { name: skill.name.clone(), hot: skill.hot, current: None })
                .collect(),
        })
        .filter(|group| !group.skills.is_empty())
        .collect()
}

/// The employee's own skills, grouped, with empty groups dropped.
pub fn update_candidates(snapshot: &EmployeeSnapshot) -> Vec<CandidateGroup> {
    snapshot
        .non_empty_groups()
        .map(|group| CandidateGroup {
            name: group.name.clone(),
            skills: group
                .skills
                .iter()
                .map(|skill| CandidateSkill {
                    name: skill.name.clone(),
                    hot: skill.hot,
                    current: Some(skill.rating),
                })
                .collect(),
        })
        .collect()
}
