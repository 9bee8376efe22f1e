use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SkillId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SkillGroupId(pub String);

/// Catalog entry for a skill, independent of any employee's rating.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillDefinition {
    pub id: SkillId,
    pub name: String,
    pub hot: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillGroup {
    pub id: SkillGroupId,
    pub name: String,
    pub skills: Vec<SkillDefinition>,
}

impl SkillGroup {
    pub fn contains_skill_named(&self, name: &str) -> bool {
        self.skills.iter().any(|skill| skill.name == name)
    }
}

/// A self-assessed proficiency level in `1..=5`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SkillLevel(u8);

impl SkillLevel {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: u8) -> Result<Self, DomainError> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(DomainError::InvalidSkillLevel(value.to_string()))
        }
    }

    /// Parses raw chat input. Only plain integers in range are accepted, so `"2.5"`,
    /// `"6"` and `"three"` are all rejected.
    pub fn parse(input: &str) -> Result<Self, DomainError> {
        let trimmed = input.trim();
        trimmed
            .parse::<u8>()
            .map_err(|_| DomainError::InvalidSkillLevel(trimmed.to_owned()))
            .and_then(Self::new)
    }

    pub fn all() -> impl Iterator<Item = SkillLevel> {
        (Self::MIN..=Self::MAX).map(SkillLevel)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn description(self) -> &'static str {
        match self.0 {
            1 => "Acquiring Skill",
            2 => "Some Experience",
            3 => "Proficient",
            4 => "Highly Skilled",
            _ => "Expert",
        }
    }
}

impl TryFrom<u8> for SkillLevel {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SkillLevel> for u8 {
    fn from(level: SkillLevel) -> Self {
        level.0
    }
}

impl fmt::Display for SkillLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A skill as held by one employee.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatedSkill {
    pub name: String,
    pub hot: bool,
    pub rating: SkillLevel,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatedSkillGroup {
    pub name: String,
    pub skills: Vec<RatedSkill>,
}
