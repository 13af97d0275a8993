//! RepoStats Database Layer
//!
//! SQLite-based, namespace-scoped storage for repositories, their per-repository
//! datasets and derived aggregate metrics.

mod models;
mod namespace;
mod queries;
mod schema;

pub use models::*;
pub use namespace::{Namespace, Tables};
pub use schema::Database;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Connection(#[from] sqlx::Error),

    #[error("Schema bootstrap failed: {0}")]
    Migration(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Invalid aggregate payload: {0}")]
    Payload(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DatabaseError>;
