use async_trait::async_trait;
use thiserror::Error;

use crate::domain::employee::{Employee, EmployeeLookup, RatingWrite};
use crate::domain::skill::{SkillDefinition, SkillGroup, SkillId, SkillLevel};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("directory backend unavailable: {0}")]
    Unavailable(String),
    #[error("directory record is malformed: {0}")]
    Malformed(String),
}

/// Read/write access to employee and skill records. The chatbot never owns this state; it is
/// injected into the roster and every conversation engine at construction.
#[async_trait]
pub trait EmployeeDirectory: Send + Sync {
    async fn find_employee(
        &self,
        lookup: &EmployeeLookup,
    ) -> Result<Option<Employee>, DirectoryError>;

    async fn list_employee_names(&self) -> Result<Vec<String>, DirectoryError>;

    /// Every group with its member skills populated, in catalog order.
    async fn find_all_skill_groups(&self) -> Result<Vec<SkillGroup>, DirectoryError>;

    async fn find_all_skill_definitions(&self) -> Result<Vec<SkillDefinition>, DirectoryError>;

    /// Appends a rating for a skill the employee does not hold yet.
    async fn add_skill_rating(
        &self,
        employee: &EmployeeLookup,
        skill_id: &SkillId,
        rating: SkillLevel,
    ) -> Result<RatingWrite, DirectoryError>;

    /// Changes the rating of a skill the employee already holds.
    async fn update_skill_rating(
        &self,
        employee: &EmployeeLookup,
        skill_id: &SkillId,
        rating: SkillLevel,
    ) -> Result<RatingWrite, DirectoryError>;
}
