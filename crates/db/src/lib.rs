pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_from_config, connect_with_settings, DbPool};
pub use fixtures::{SeedDataset, SeedEmployee, SeedResult, VerificationResult};
pub use repositories::{
    InMemoryEmployeeDirectory, RecordedWrite, RepositoryError, SqlEmployeeDirectory,
};
