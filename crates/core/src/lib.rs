pub mod config;
pub mod directory;
pub mod domain;
pub mod errors;
pub mod flows;

pub use directory::{DirectoryError, EmployeeDirectory};
pub use domain::employee::{
    Employee, EmployeeId, EmployeeLookup, EmployeeSkill, EmployeeSnapshot, RatingWrite,
    RatingWriteOutcome,
};
pub use domain::skill::{
    RatedSkill, RatedSkillGroup, SkillDefinition, SkillGroup, SkillGroupId, SkillId, SkillLevel,
};
pub use errors::{ApplicationError, DomainError};
pub use flows::{CandidateGroup, CandidateSkill, ConversationMode, ConversationState, SkillFlow};
