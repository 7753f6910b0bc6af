//! Bibliothek-State: SurrealDB Backend for the Build Catalog
//!
//! This crate provides the persistence layer for build ingestion. It owns
//! all I/O with SurrealDB, which is used as a black-box document store.
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: identity constraints and idempotent upserts.
//!
//! ## Key Components
//!
//! - `SurrealHandle`: Manages connection and catalog queries
//! - `CatalogStore`: Backend-agnostic trait used by the ingestion pipeline
//! - `ConnectionConfig`: Environment → config file → default resolution
//! - `fakes::MemoryCatalogStore`: In-memory implementation for tests

pub mod config;
mod error;
pub mod fakes;
mod handle;
pub mod migrations;
mod schema;
pub mod storage_traits;
mod surreal_catalog;

pub use config::{ConnectionConfig, ConnectionSource, Credentials};
pub use error::{StateError, StorageError};
pub use handle::SurrealHandle;
pub use schema::{BuildRecord, GroupRecord, ProjectRecord, VersionRecord};
pub use storage_traits::{
    Build, CatalogStore, Change, Channel, ContentDigest, DisplayMode, Download, NewBuild, Project,
    StorageResult, UnknownChannel, Version, VersionGroup,
};
pub use surreal_catalog::SurrealCatalogStore;

/// Result type for bibliothek-state operations
pub type Result<T> = std::result::Result<T, StateError>;
