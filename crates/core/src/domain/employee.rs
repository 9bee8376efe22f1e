use serde::{Deserialize, Serialize};

use crate::domain::skill::{RatedSkill, RatedSkillGroup, SkillDefinition, SkillGroup, SkillLevel};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmployeeId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeSkill {
    pub skill: SkillDefinition,
    pub rating: SkillLevel,
}

/// Directory projection of an employee: only the fields the chatbot reads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub name: String,
    pub roll_off_date: Option<String>,
    pub current_project: Option<String>,
    pub skills: Vec<EmployeeSkill>,
}

/// "id-or-name" predicate used for every employee read and write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeLookup {
    pub id: Option<EmployeeId>,
    pub name: String,
}

impl EmployeeLookup {
    pub fn new(id: Option<EmployeeId>, name: impl Into<String>) -> Self {
        Self { id, name: name.into() }
    }

    pub fn matches(&self, employee: &Employee) -> bool {
        self.id.as_ref().is_some_and(|id| *id == employee.id) || employee.name == self.name
    }
}

/// Result shape of a rating write, mirroring a document store's update acknowledgement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingWrite {
    pub match_count: u64,
    pub modified_count: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RatingWriteOutcome {
    Applied,
    Unchanged,
    ProfileNotFound,
}

impl RatingWrite {
    pub fn outcome(&self) -> RatingWriteOutcome {
        match (self.match_count > 0, self.modified_count > 0) {
            (true, true) => RatingWriteOutcome::Applied,
            (true, false) => RatingWriteOutcome::Unchanged,
            (false, _) => RatingWriteOutcome::ProfileNotFound,
        }
    }
}

/// The chatbot's cached view of one employee, grouped by the skill catalog.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeSnapshot {
    pub roll_off_date: Option<String>,
    pub current_project: Option<String>,
    pub groups: Vec<RatedSkillGroup>,
}

impl EmployeeSnapshot {
    /// Every catalog group appears, possibly empty. Held skills that belong to no group are
    /// left out.
    pub fn from_records(employee: &Employee, catalog: &[SkillGroup]) -> Self {
        let groups = catalog
            .iter()
            .map(|group| RatedSkillGroup {
                name: group.name.clone(),
                skills: employee
                    .skills
                    .iter()
                    .filter(|held| group.contains_skill_named(&held.skill.name))
                    .map(|held| RatedSkill {
                        name: held.skill.name.clone(),
                        hot: held.skill.hot,
                        rating: held.rating,
                    })
                    .collect(),
            })
            .collect();

        Self {
            roll_off_date: employee.roll_off_date.clone(),
            current_project: employee.current_project.clone(),
            groups,
        }
    }

    pub fn held_skill_names(&self) -> Vec<&str> {
        self.groups
            .iter()
            .flat_map(|group| group.skills.iter().map(|skill| skill.name.as_str()))
            .collect()
    }

    pub fn non_empty_groups(&self) -> impl Iterator<Item = &RatedSkillGroup> {
        self.groups.iter().filter(|group| !group.skills.is_empty())
    }
}
