use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;

use skillmatch_core::directory::{DirectoryError, EmployeeDirectory};
use skillmatch_core::domain::employee::{Employee, EmployeeLookup, EmployeeSkill, RatingWrite};
use skillmatch_core::domain::skill::{SkillDefinition, SkillGroup, SkillId, SkillLevel};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordedWrite {
    Add { employee: String, skill_id: SkillId, rating: SkillLevel },
    Update { employee: String, skill_id: SkillId, rating: SkillLevel },
}

/// Directory kept entirely in memory. Every rating write is recorded so conversation tests can
/// assert on exactly which calls were made.
#[derive(Default)]
pub struct InMemoryEmployeeDirectory {
    employees: RwLock<HashMap<String, Employee>>,
    groups: RwLock<Vec<SkillGroup>>,
    writes: RwLock<Vec<RecordedWrite>>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl InMemoryEmployeeDirectory {
    pub fn new(groups: Vec<SkillGroup>, employees: Vec<Employee>) -> Self {
        let employees =
            employees.into_iter().map(|employee| (employee.id.0.clone(), employee)).collect();
        Self { employees: RwLock::new(employees), groups: RwLock::new(groups), ..Self::default() }
    }

    pub async fn save_employee(&self, employee: Employee) {
        self.employees.write().await.insert(employee.id.0.clone(), employee);
    }

    pub async fn writes(&self) -> Vec<RecordedWrite> {
        self.writes.read().await.clone()
    }

    /// Makes every subsequent rating write fail with `DirectoryError::Unavailable`.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    fn check_reads(&self) -> Result<(), DirectoryError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(DirectoryError::Unavailable("in-memory reads disabled".to_string()));
        }
        Ok(())
    }

    fn check_writes(&self) -> Result<(), DirectoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DirectoryError::Unavailable("in-memory writes disabled".to_string()));
        }
        Ok(())
    }

    async fn definition(&self, skill_id: &SkillId) -> Option<SkillDefinition> {
        self.groups
            .read()
            .await
            .iter()
            .flat_map(|group| group.skills.iter())
            .find(|skill| skill.id == *skill_id)
            .cloned()
    }
}

fn find_key(employees: &HashMap<String, Employee>, lookup: &EmployeeLookup) -> Option<String> {
    let by_id = lookup.id.as_ref().filter(|id| employees.contains_key(&id.0)).map(|id| id.0.clone());
    by_id.or_else(|| {
        let mut matches: Vec<_> = employees
            .values()
            .filter(|employee| lookup.matches(employee))
            .map(|employee| employee.id.0.clone())
            .collect();
        matches.sort();
        matches.into_iter().next()
    })
}

#[async_trait::async_trait]
impl EmployeeDirectory for InMemoryEmployeeDirectory {
    async fn find_employee(
        &self,
        lookup: &EmployeeLookup,
    ) -> Result<Option<Employee>, DirectoryError> {
        self.check_reads()?;
        let employees = self.employees.read().await;
        Ok(find_key(&employees, lookup).and_then(|key| employees.get(&key).cloned()))
    }

    async fn list_employee_names(&self) -> Result<Vec<String>, DirectoryError> {
        self.check_reads()?;
        let mut names: Vec<_> =
            self.employees.read().await.values().map(|employee| employee.name.clone()).collect();
        names.sort();
        Ok(names)
    }

    async fn find_all_skill_groups(&self) -> Result<Vec<SkillGroup>, DirectoryError> {
        self.check_reads()?;
        Ok(self.groups.read().await.clone())
    }

    async fn find_all_skill_definitions(&self) -> Result<Vec<SkillDefinition>, DirectoryError> {
        self.check_reads()?;
        let mut definitions: Vec<_> = self
            .groups
            .read()
            .await
            .iter()
            .flat_map(|group| group.skills.iter().cloned())
            .collect();
        definitions.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(definitions)
    }

    async fn add_skill_rating(
        &self,
        employee: &EmployeeLookup,
        skill_id: &SkillId,
        rating: SkillLevel,
    ) -> Result<RatingWrite, DirectoryError> {
        self.check_writes()?;
        self.writes.write().await.push(RecordedWrite::Add {
            employee: employee.name.clone(),
            skill_id: skill_id.clone(),
            rating,
        });

        let definition = self.definition(skill_id).await;
        let mut employees = self.employees.write().await;
        let Some(record) = find_key(&employees, employee).and_then(|key| employees.get_mut(&key))
        else {
            return Ok(RatingWrite::default());
        };

        let already_held = record.skills.iter().any(|held| held.skill.id == *skill_id);
        match definition {
            Some(skill) if !already_held => {
                record.skills.push(EmployeeSkill { skill, rating });
                Ok(RatingWrite { match_count: 1, modified_count: 1 })
            }
            _ => Ok(RatingWrite { match_count: 1, modified_count: 0 }),
        }
    }

    async fn update_skill_rating(
        &self,
        employee: &EmployeeLookup,
        skill_id: &SkillId,
        rating: SkillLevel,
    ) -> Result<RatingWrite, DirectoryError> {
        self.check_writes()?;
        self.writes.write().await.push(RecordedWrite::Update {
            employee: employee.name.clone(),
            skill_id: skill_id.clone(),
            rating,
        });

        let mut employees = self.employees.write().await;
        let held = find_key(&employees, employee)
            .and_then(|key| employees.get_mut(&key))
            .and_then(|record| record.skills.iter_mut().find(|held| held.skill.id == *skill_id));

        match held {
            None => Ok(RatingWrite::default()),
            Some(held) if held.rating == rating => {
                Ok(RatingWrite { match_count: 1, modified_count: 0 })
            }
            Some(held) => {
                held.rating = rating;
                Ok(RatingWrite { match_count: 1, modified_count: 1 })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use skillmatch_core::directory::{DirectoryError, EmployeeDirectory};
    use skillmatch_core::domain::employee::{
        Employee, EmployeeId, EmployeeLookup, EmployeeSkill, RatingWriteOutcome,
    };
    use skillmatch_core::domain::skill::{
        SkillDefinition, SkillGroup, SkillGroupId, SkillId, SkillLevel,
    };

    use super::{InMemoryEmployeeDirectory, RecordedWrite};

    fn go() -> SkillDefinition {
        SkillDefinition { id: SkillId("skl-go".to_string()), name: "Go".to_string(), hot: false }
    }

    fn rust() -> SkillDefinition {
        SkillDefinition { id: SkillId("skl-rust".to_string()), name: "Rust".to_string(), hot: true }
    }

    fn level(value: u8) -> SkillLevel {
        SkillLevel::new(value).expect("level")
    }

    fn directory() -> InMemoryEmployeeDirectory {
        InMemoryEmployeeDirectory::new(
            vec![SkillGroup {
                id: SkillGroupId("grp-languages".to_string()),
                name: "Languages".to_string(),
                skills: vec![go(), rust()],
            }],
            vec![Employee {
                id: EmployeeId("emp-jane-doe".to_string()),
                name: "Jane Doe".to_string(),
                roll_off_date: None,
                current_project: None,
                skills: vec![EmployeeSkill { skill: go(), rating: level(2) }],
            }],
        )
    }

    #[tokio::test]
    async fn add_then_update_mutates_the_employee_record() {
        let directory = directory();
        let jane = EmployeeLookup::new(None, "Jane Doe");

        let added = directory.add_skill_rating(&jane, &rust().id, level(3)).await.expect("add");
        assert_eq!(added.outcome(), RatingWriteOutcome::Applied);

        let updated =
            directory.update_skill_rating(&jane, &rust().id, level(5)).await.expect("update");
        assert_eq!(updated.outcome(), RatingWriteOutcome::Applied);

        let employee = directory.find_employee(&jane).await.expect("find").expect("jane");
        assert_eq!(employee.skills.len(), 2);
        assert_eq!(employee.skills[1].rating.value(), 5);
        assert_eq!(
            directory.writes().await,
            vec![
                RecordedWrite::Add {
                    employee: "Jane Doe".to_string(),
                    skill_id: rust().id,
                    rating: level(3)
                },
                RecordedWrite::Update {
                    employee: "Jane Doe".to_string(),
                    skill_id: rust().id,
                    rating: level(5)
                },
            ]
        );
    }

    #[tokio::test]
    async fn failing_writes_surface_unavailable() {
        let directory = directory();
        directory.fail_writes(true);

        let error = directory
            .add_skill_rating(&EmployeeLookup::new(None, "Jane Doe"), &rust().id, level(1))
            .await
            .expect_err("writes disabled");
        assert!(matches!(error, DirectoryError::Unavailable(_)));
        assert!(directory.writes().await.is_empty());
    }

    #[tokio::test]
    async fn unknown_employee_matches_nothing() {
        let directory = directory();
        let write = directory
            .update_skill_rating(&EmployeeLookup::new(None, "Ghost"), &go().id, level(4))
            .await
            .expect("update");
        assert_eq!(write.outcome(), RatingWriteOutcome::ProfileNotFound);
    }
}
