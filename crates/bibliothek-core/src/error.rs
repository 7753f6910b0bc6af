//! Error taxonomy for the ingestion pipeline.
//!
//! Every variant is fatal to the invocation. Nothing retries and nothing is
//! rolled back: hierarchy records and copied files stay where they are.

use std::path::PathBuf;

use bibliothek_state::{StateError, StorageError};

/// Ingestion failures.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("artifact file not found for {artifact_type}: {}", path.display())]
    MissingArtifactFile {
        artifact_type: String,
        path: PathBuf,
    },

    #[error("more than one primary (unnamed) artifact: {first} and {second}")]
    DuplicatePrimaryArtifact { first: String, second: String },

    #[error("catalog store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("repository unavailable: {0}")]
    RepositoryUnavailable(String),

    #[error("build {number} already exists for {project} {version}")]
    DuplicateBuild {
        project: String,
        version: String,
        number: u32,
    },

    #[error("artifact already exists: {}", path.display())]
    ArtifactAlreadyExists { path: PathBuf },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StorageError> for IngestError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::DuplicateBuild {
                project,
                version,
                number,
            } => IngestError::DuplicateBuild {
                project,
                version,
                number,
            },
            other => IngestError::StoreUnavailable(other.to_string()),
        }
    }
}

impl From<StateError> for IngestError {
    fn from(err: StateError) -> Self {
        IngestError::StoreUnavailable(err.to_string())
    }
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_build_keeps_identity() {
        let err: IngestError = StorageError::DuplicateBuild {
            project: "paper".to_string(),
            version: "1.20.1".to_string(),
            number: 3,
        }
        .into();
        assert!(matches!(err, IngestError::DuplicateBuild { number: 3, .. }));
        assert_eq!(err.to_string(), "build 3 already exists for paper 1.20.1");
    }

    #[test]
    fn other_storage_errors_mean_store_unavailable() {
        let err: IngestError = StorageError::Backend("connection refused".to_string()).into();
        assert!(matches!(err, IngestError::StoreUnavailable(_)));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn state_errors_mean_store_unavailable() {
        let err: IngestError = StateError::Connection("timeout".to_string()).into();
        assert!(matches!(err, IngestError::StoreUnavailable(_)));
    }
}
