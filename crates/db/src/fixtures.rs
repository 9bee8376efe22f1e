use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Expected row counts per seeded table, checked by [`SeedDataset::verify`].
const SEED_TABLES: &[SeedTableContract] = &[
    SeedTableContract { table: "skill_group", label: "skill-groups", expected_rows: 3 },
    SeedTableContract { table: "skill", label: "skills", expected_rows: 7 },
    SeedTableContract { table: "skill_group_member", label: "group-members", expected_rows: 7 },
    SeedTableContract { table: "employee", label: "employees", expected_rows: 3 },
    SeedTableContract { table: "employee_skill", label: "employee-skills", expected_rows: 4 },
];

const SEED_EMPLOYEES: &[SeedEmployee] = &[
    SeedEmployee { id: "emp-jane-doe", name: "Jane Doe", description: "holds Go at level 2" },
    SeedEmployee {
        id: "emp-sam-lee",
        name: "Sam Lee",
        description: "holds Rust, Kubernetes and Postgres",
    },
    SeedEmployee { id: "emp-new-hire", name: "Alex Kim", description: "holds no skills yet" },
];

/// Deterministic directory fixture: three skill groups, seven skills and three employees.
pub struct SeedDataset;

impl SeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/seed_data.sql");

    /// Loads the fixture. Every insert is `OR IGNORE`, so loading twice is a no-op.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult { employees_seeded: SEED_EMPLOYEES.to_vec() })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for contract in SEED_TABLES {
            let count: i64 =
                sqlx::query_scalar(&format!("SELECT COUNT(1) FROM {}", contract.table))
                    .fetch_one(pool)
                    .await?;
            checks.push((contract.label, count >= contract.expected_rows));
        }

        for employee in SEED_EMPLOYEES {
            let exists: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM employee WHERE id = ?1 AND name = ?2)",
            )
            .bind(employee.id)
            .bind(employee.name)
            .fetch_one(pool)
            .await?;
            checks.push((employee.id, exists == 1));
        }

        let jane_go: Option<i64> = sqlx::query_scalar(
            "SELECT rating FROM employee_skill WHERE employee_id = 'emp-jane-doe' AND skill_id = 'skl-go'",
        )
        .fetch_optional(pool)
        .await?;
        checks.push(("jane-go-rating", jane_go.is_some()));

        let all_present = checks.iter().all(|(_, passed)| *passed);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes everything the fixture inserted, children first.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;
        for contract in SEED_TABLES.iter().rev() {
            sqlx::query(&format!("DELETE FROM {}", contract.table)).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedTableContract {
    table: &'static str,
    label: &'static str,
    expected_rows: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedEmployee {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

#[derive(Debug)]
pub struct SeedResult {
    pub employees_seeded: Vec<SeedEmployee>,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

impl VerificationResult {
    pub fn failed_checks(&self) -> Vec<&'static str> {
        self.checks.iter().filter_map(|(check, passed)| (!passed).then_some(*check)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{connect_with_settings, migrations};

    #[test]
    fn sql_fixture_is_valid() {
        assert!(!SeedDataset::SQL.is_empty());
        assert!(SeedDataset::SQL.contains("INSERT OR IGNORE"));
    }

    #[tokio::test]
    async fn verify_seed_contract_and_idempotency() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect to test database");
        migrations::run_pending(&pool).await.expect("run migrations");

        let first = SeedDataset::load(&pool).await.expect("load seed fixtures");
        let first_verification = SeedDataset::verify(&pool).await.expect("verify seed fixtures");
        assert!(first_verification.all_present, "{:?}", first_verification.failed_checks());
        assert_eq!(first.employees_seeded.len(), 3);

        SeedDataset::load(&pool).await.expect("reload seed fixtures");
        let employee_count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM employee")
            .fetch_one(&pool)
            .await
            .expect("count employees");
        assert_eq!(employee_count, 3);

        let second_verification =
            SeedDataset::verify(&pool).await.expect("re-verify seed fixtures");
        assert_eq!(first_verification.checks, second_verification.checks);
    }

    #[tokio::test]
    async fn clean_removes_seeded_rows() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect to test database");
        migrations::run_pending(&pool).await.expect("run migrations");
        SeedDataset::load(&pool).await.expect("load seed fixtures");

        SeedDataset::clean(&pool).await.expect("clean seed fixtures");

        let verification = SeedDataset::verify(&pool).await.expect("verify after clean");
        assert!(!verification.all_present);
        assert!(verification.failed_checks().contains(&"employees"));
    }

    #[test]
    fn failed_checks_lists_only_failures() {
        let result = VerificationResult {
            all_present: false,
            checks: vec![("skills", true), ("employees", false), ("jane-go-rating", false)],
        };
        assert_eq!(result.failed_checks(), vec!["employees", "jane-go-rating"]);
    }
}
