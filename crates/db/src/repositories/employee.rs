use std::collections::HashMap;

use sqlx::Row;

use skillmatch_core::directory::{DirectoryError, EmployeeDirectory};
use skillmatch_core::domain::employee::{
    Employee, EmployeeId, EmployeeLookup, EmployeeSkill, RatingWrite,
};
use skillmatch_core::domain::skill::{
    SkillDefinition, SkillGroup, SkillGroupId, SkillId, SkillLevel,
};

use super::RepositoryError;
use crate::DbPool;

pub struct SqlEmployeeDirectory {
    pool: DbPool,
}

impl SqlEmployeeDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Resolves the id-or-name predicate to a primary key, preferring an id hit.
    async fn resolve_employee_id(
        &self,
        lookup: &EmployeeLookup,
    ) -> Result<Option<String>, RepositoryError> {
        let id = lookup.id.as_ref().map(|id| id.0.as_str());
        let resolved = sqlx::query_scalar::<_, String>(
            "SELECT id FROM employee
             WHERE id = ?1 OR name = ?2
             ORDER BY CASE WHEN id = ?1 THEN 0 ELSE 1 END
             LIMIT 1",
        )
        .bind(id)
        .bind(&lookup.name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(resolved)
    }

    async fn load_employee(&self, lookup: &EmployeeLookup) -> Result<Option<Employee>, RepositoryError> {
        let Some(employee_id) = self.resolve_employee_id(lookup).await? else {
            return Ok(None);
        };

        let row = sqlx::query(
            "SELECT id, name, roll_off_date, current_project FROM employee WHERE id = ?",
        )
        .bind(&employee_id)
        .fetch_one(&self.pool)
        .await?;

        let skills = sqlx::query(
            "SELECT s.id, s.name, s.hot, es.rating
             FROM employee_skill es
             JOIN skill s ON s.id = es.skill_id
             WHERE es.employee_id = ?
             ORDER BY s.name",
        )
        .bind(&employee_id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(|row| {
            Ok(EmployeeSkill { skill: row_to_definition(row)?, rating: decode_level(row)? })
        })
        .collect::<Result<Vec<_>, RepositoryError>>()?;

        Ok(Some(Employee {
            id: EmployeeId(decode(&row, "id")?),
            name: decode(&row, "name")?,
            roll_off_date: decode(&row, "roll_off_date")?,
            current_project: decode(&row, "current_project")?,
            skills,
        }))
    }

    async fn load_skill_groups(&self) -> Result<Vec<SkillGroup>, RepositoryError> {
        let group_rows =
            sqlx::query("SELECT id, name FROM skill_group ORDER BY position, name")
                .fetch_all(&self.pool)
                .await?;
        let member_rows = sqlx::query(
            "SELECT m.group_id, s.id, s.name, s.hot
             FROM skill_group_member m
             JOIN skill s ON s.id = m.skill_id
             ORDER BY m.group_id, m.position, s.name",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut members: HashMap<String, Vec<SkillDefinition>> = HashMap::new();
        for row in &member_rows {
            let group_id: String = decode(row, "group_id")?;
            members.entry(group_id).or_default().push(row_to_definition(row)?);
        }

        group_rows
            .iter()
            .map(|row| {
                let id: String = decode(row, "id")?;
                let skills = members.remove(&id).unwrap_or_default();
                Ok(SkillGroup { id: SkillGroupId(id), name: decode(row, "name")?, skills })
            })
            .collect()
    }

    async fn insert_rating(
        &self,
        lookup: &EmployeeLookup,
        skill_id: &SkillId,
        rating: SkillLevel,
    ) -> Result<RatingWrite, RepositoryError> {
        let Some(employee_id) = self.resolve_employee_id(lookup).await? else {
            return Ok(RatingWrite::default());
        };

        let result = sqlx::query(
            "INSERT OR IGNORE INTO employee_skill (employee_id, skill_id, rating) VALUES (?, ?, ?)",
        )
        .bind(&employee_id)
        .bind(&skill_id.0)
        .bind(i64::from(rating.value()))
        .execute(&self.pool)
        .await?;

        Ok(RatingWrite { match_count: 1, modified_count: result.rows_affected() })
    }

    async fn change_rating(
        &self,
        lookup: &EmployeeLookup,
        skill_id: &SkillId,
        rating: SkillLevel,
    ) -> Result<RatingWrite, RepositoryError> {
        let Some(employee_id) = self.resolve_employee_id(lookup).await? else {
            return Ok(RatingWrite::default());
        };

        let current = sqlx::query_scalar::<_, i64>(
            "SELECT rating FROM employee_skill WHERE employee_id = ? AND skill_id = ?",
        )
        .bind(&employee_id)
        .bind(&skill_id.0)
        .fetch_optional(&self.pool)
        .await?;

        // The rating write only matches when the employee already holds the skill.
        let Some(current) = current else {
            return Ok(RatingWrite::default());
        };
        if current == i64::from(rating.value()) {
            return Ok(RatingWrite { match_count: 1, modified_count: 0 });
        }

        let result = sqlx::query(
            "UPDATE employee_skill SET rating = ? WHERE employee_id = ? AND skill_id = ?",
        )
        .bind(i64::from(rating.value()))
        .bind(&employee_id)
        .bind(&skill_id.0)
        .execute(&self.pool)
        .await?;

        Ok(RatingWrite { match_count: 1, modified_count: result.rows_affected() })
    }
}

fn decode<'r, T>(row: &'r sqlx::sqlite::SqliteRow, column: &str) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(column).map_err(|e| RepositoryError::Decode(e.to_string()))
}

fn row_to_definition(row: &sqlx::sqlite::SqliteRow) -> Result<SkillDefinition, RepositoryError> {
    let hot: i64 = decode(row, "hot")?;
    Ok(SkillDefinition {
        id: SkillId(decode(row, "id")?),
        name: decode(row, "name")?,
        hot: hot != 0,
    })
}

fn decode_level(row: &sqlx::sqlite::SqliteRow) -> Result<SkillLevel, RepositoryError> {
    let raw: i64 = decode(row, "rating")?;
    u8::try_from(raw)
        .ok()
        .and_then(|value| SkillLevel::new(value).ok())
        .ok_or_else(|| RepositoryError::Decode(format!("rating {raw} is outside 1..=5")))
}

#[async_trait::async_trait]
impl EmployeeDirectory for SqlEmployeeDirectory {
    async fn find_employee(
        &self,
        lookup: &EmployeeLookup,
    ) -> Result<Option<Employee>, DirectoryError> {
        Ok(self.load_employee(lookup).await?)
    }

    async fn list_employee_names(&self) -> Result<Vec<String>, DirectoryError> {
        let names = sqlx::query_scalar::<_, String>("SELECT name FROM employee ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(names)
    }

    async fn find_all_skill_groups(&self) -> Result<Vec<SkillGroup>, DirectoryError> {
        Ok(self.load_skill_groups().await?)
    }

    async fn find_all_skill_definitions(&self) -> Result<Vec<SkillDefinition>, DirectoryError> {
        let rows = sqlx::query("SELECT id, name, hot FROM skill ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        let definitions =
            rows.iter().map(row_to_definition).collect::<Result<Vec<_>, RepositoryError>>()?;
        Ok(definitions)
    }

    async fn add_skill_rating(
        &self,
        employee: &EmployeeLookup,
        skill_id: &SkillId,
        rating: SkillLevel,
    ) -> Result<RatingWrite, DirectoryError> {
        Ok(self.insert_rating(employee, skill_id, rating).await?)
    }

    async fn update_skill_rating(
        &self,
        employee: &EmployeeLookup,
        skill_id: &SkillId,
        rating: SkillLevel,
    ) -> Result<RatingWrite, DirectoryError> {
        Ok(self.change_rating(employee, skill_id, rating).await?)
    }
}

#[cfg(test)]
mod tests {
    use skillmatch_core::directory::EmployeeDirectory;
    use skillmatch_core::domain::employee::{EmployeeId, EmployeeLookup, RatingWriteOutcome};
    use skillmatch_core::domain::skill::{SkillId, SkillLevel};

    use super::SqlEmployeeDirectory;
    use crate::fixtures::SeedDataset;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> SqlEmployeeDirectory {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SeedDataset::load(&pool).await.expect("seed");
        SqlEmployeeDirectory::new(pool)
    }

    fn jane() -> EmployeeLookup {
        EmployeeLookup::new(None, "Jane Doe")
    }

    fn level(value: u8) -> SkillLevel {
        SkillLevel::new(value).expect("level")
    }

    #[tokio::test]
    async fn find_employee_matches_by_name_or_id() {
        let directory = setup().await;

        let by_name = directory.find_employee(&jane()).await.expect("find").expect("jane");
        assert_eq!(by_name.id, EmployeeId("emp-jane-doe".to_string()));
        assert_eq!(by_name.skills.len(), 1);
        assert_eq!(by_name.skills[0].skill.name, "Go");
        assert_eq!(by_name.skills[0].rating.value(), 2);

        let by_id = directory
            .find_employee(&EmployeeLookup::new(Some(EmployeeId("emp-sam-lee".to_string())), "??"))
            .await
            .expect("find")
            .expect("sam");
        assert_eq!(by_id.name, "Sam Lee");

        let missing = directory
            .find_employee(&EmployeeLookup::new(None, "Nobody"))
            .await
            .expect("find");
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn skill_groups_are_returned_in_catalog_order_with_members() {
        let directory = setup().await;

        let groups = directory.find_all_skill_groups().await.expect("groups");
        let names: Vec<_> = groups.iter().map(|group| group.name.as_str()).collect();
        assert_eq!(names, vec!["Languages", "Cloud", "Data"]);

        let languages: Vec<_> = groups[0].skills.iter().map(|skill| skill.name.as_str()).collect();
        assert_eq!(languages, vec!["Go", "Rust", "Java"]);
        assert!(groups[0].skills[1].hot);
    }

    #[tokio::test]
    async fn add_rating_inserts_once_then_reports_unchanged() {
        let directory = setup().await;
        let rust = SkillId("skl-rust".to_string());

        let first = directory.add_skill_rating(&jane(), &rust, level(3)).await.expect("add");
        assert_eq!(first.outcome(), RatingWriteOutcome::Applied);

        let second = directory.add_skill_rating(&jane(), &rust, level(4)).await.expect("add");
        assert_eq!(second.outcome(), RatingWriteOutcome::Unchanged);

        let employee = directory.find_employee(&jane()).await.expect("find").expect("jane");
        let rust_rating = employee
            .skills
            .iter()
            .find(|held| held.skill.name == "Rust")
            .map(|held| held.rating.value());
        assert_eq!(rust_rating, Some(3));
    }

    #[tokio::test]
    async fn update_rating_requires_a_held_skill() {
        let directory = setup().await;
        let go = SkillId("skl-go".to_string());
        let kafka = SkillId("skl-kafka".to_string());

        let changed = directory.update_skill_rating(&jane(), &go, level(4)).await.expect("update");
        assert_eq!(changed.outcome(), RatingWriteOutcome::Applied);

        let same = directory.update_skill_rating(&jane(), &go, level(4)).await.expect("update");
        assert_eq!(same.outcome(), RatingWriteOutcome::Unchanged);

        let not_held =
            directory.update_skill_rating(&jane(), &kafka, level(2)).await.expect("update");
        assert_eq!(not_held.outcome(), RatingWriteOutcome::ProfileNotFound);
    }

    #[tokio::test]
    async fn writes_for_unknown_employee_match_nothing() {
        let directory = setup().await;
        let lookup = EmployeeLookup::new(None, "Ghost");

        let write = directory
            .add_skill_rating(&lookup, &SkillId("skl-go".to_string()), level(1))
            .await
            .expect("add");
        assert_eq!(write.outcome(), RatingWriteOutcome::ProfileNotFound);
    }

    #[tokio::test]
    async fn employee_names_and_definitions_are_listed() {
        let directory = setup().await;

        let names = directory.list_employee_names().await.expect("names");
        assert_eq!(names, vec!["Alex Kim", "Jane Doe", "Sam Lee"]);

        let definitions = directory.find_all_skill_definitions().await.expect("definitions");
        assert_eq!(definitions.len(), 7);
        assert!(definitions.iter().any(|skill| skill.name == "Kafka" && skill.hot));
    }
}
