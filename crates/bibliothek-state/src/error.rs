//! Error types for bibliothek-state

use thiserror::Error;

/// Errors raised while connecting to or preparing the catalog database
#[derive(Error, Debug)]
pub enum StateError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Database query error
    #[error("Database query failed: {0}")]
    Query(String),

    /// Schema setup error
    #[error("Schema setup failed: {0}")]
    SchemaSetup(String),

    /// Connection configuration could not be read or parsed
    #[error("Invalid configuration in {path}: {reason}")]
    Config { path: String, reason: String },
}

impl From<surrealdb::Error> for StateError {
    fn from(err: surrealdb::Error) -> Self {
        StateError::Query(err.to_string())
    }
}

/// Errors surfaced by [`crate::CatalogStore`] operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// A build with the same (project, version, number) identity exists.
    #[error("build {number} already exists for {project} {version}")]
    DuplicateBuild {
        project: String,
        version: String,
        number: u32,
    },

    /// A stored record could not be decoded into its domain type.
    #[error("corrupt {table} record: {reason}")]
    Corrupt { table: &'static str, reason: String },

    /// The store returned nothing where a record was required.
    #[error("{table} record missing after write: {key}")]
    Missing { table: &'static str, key: String },

    #[error("invalid digest: {digest}")]
    InvalidDigest { digest: String },

    /// Any other backend failure (unreachable server, query error, ...).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<surrealdb::Error> for StorageError {
    fn from(err: surrealdb::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

impl From<StateError> for StorageError {
    fn from(err: StateError) -> Self {
        StorageError::Backend(err.to_string())
    }
}
