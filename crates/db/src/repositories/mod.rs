use thiserror::Error;

use skillmatch_core::directory::DirectoryError;

pub mod employee;
pub mod memory;

pub use employee::SqlEmployeeDirectory;
pub use memory::{InMemoryEmployeeDirectory, RecordedWrite};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for DirectoryError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Database(source) => DirectoryError::Unavailable(source.to_string()),
            RepositoryError::Decode(message) => DirectoryError::Malformed(message),
        }
    }
}
