use skillmatch_db::{SeedDataset, SeedEmployee};

use crate::commands::{with_migrated_pool, CommandResult};

pub fn run() -> CommandResult {
    let seeded = with_migrated_pool("seed", |pool| async move {
        let seed_result = SeedDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let verification = SeedDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;
        if !verification.all_present {
            return Err(("seed_verification", verification_message(&verification.failed_checks()), 6u8));
        }

        Ok(seed_result.employees_seeded)
    });

    match seeded {
        Ok(employees) => CommandResult::success("seed", summary(&employees)),
        Err(failure) => failure,
    }
}

fn summary(employees: &[SeedEmployee]) -> String {
    let lines: Vec<String> = employees
        .iter()
        .map(|employee| format!("  - {}: {} ({})", employee.id, employee.name, employee.description))
        .collect();
    format!("skill directory fixture loaded for {} employees:\n{}", employees.len(), lines.join("\n"))
}

fn verification_message(failed_checks: &[&str]) -> String {
    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}
