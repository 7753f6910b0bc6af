//! SurrealDB schema migrations and initialization
//!
//! Sets up the four catalog tables with the uniqueness constraints the
//! ingestion pipeline relies on. Every statement is `IF NOT EXISTS`, so
//! running this on each connection is safe.

use crate::error::StateError;
use crate::Result;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

/// Initialize all catalog tables
pub async fn init_schema(db: &Surreal<Any>) -> Result<()> {
    info!("Initializing catalog schema");

    init_projects_table(db).await?;
    init_groups_table(db).await?;
    init_versions_table(db).await?;
    init_builds_table(db).await?;

    info!("Catalog schema initialization complete");
    Ok(())
}

async fn run(db: &Surreal<Any>, table: &str, sql: &str) -> Result<()> {
    db.query(sql)
        .await
        .and_then(|response| response.check())
        .map_err(|e| StateError::SchemaSetup(format!("{table}: {e}")))?;
    Ok(())
}

/// Initialize `projects` table
///
/// ```text
/// TABLE projects {
///   name:          STRING (unique)
///   friendlyName:  STRING
/// }
/// ```
async fn init_projects_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing projects table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS projects SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR select FULL
                FOR update NONE
                FOR delete NONE;

        DEFINE INDEX IF NOT EXISTS idx_project_name ON TABLE projects COLUMNS name UNIQUE;
    "#;

    run(db, "projects", sql).await
}

/// Initialize `groups` table
///
/// ```text
/// TABLE groups {
///   project:    RECORD<projects>
///   name:       STRING
///   timestamp:  DATETIME (set on insert)
/// }
/// ```
///
/// `(project, name)` is unique.
async fn init_groups_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing groups table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS groups SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR select FULL
                FOR update NONE
                FOR delete NONE;

        DEFINE INDEX IF NOT EXISTS idx_group_identity ON TABLE groups COLUMNS project, name UNIQUE;
    "#;

    run(db, "groups", sql).await
}

/// Initialize `versions` table
///
/// ```text
/// TABLE versions {
///   project:    RECORD<projects>
///   group:      RECORD<groups> (fixed on insert)
///   name:       STRING
///   timestamp:  DATETIME (set on insert)
/// }
/// ```
///
/// `(project, name)` is unique; a version belongs to exactly one group.
async fn init_versions_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing versions table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS versions SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR select FULL
                FOR update NONE
                FOR delete NONE;

        DEFINE INDEX IF NOT EXISTS idx_version_identity ON TABLE versions COLUMNS project, name UNIQUE;
    "#;

    run(db, "versions", sql).await
}

/// Initialize `builds` table
///
/// ```text
/// TABLE builds {
///   project:      RECORD<projects>
///   version:      RECORD<versions>
///   number:       INT (> 0)
///   timestamp:    DATETIME
///   changes:      ARRAY<{ commit, summary, message }> (newest first)
///   downloads:    OBJECT<type, { name, sha256 }>
///   displayMode:  STRING (HIDE | PROMOTE)
///   channel:      STRING (DEFAULT | EXPERIMENTAL)
/// }
/// ```
///
/// `(project, version, number)` is unique. This is the only guard against
/// two concurrent auto-numbered ingestions picking the same number.
/// Builds are immutable: updates are not permitted.
async fn init_builds_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing builds table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS builds SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR select FULL
                FOR update NONE
                FOR delete NONE;

        DEFINE INDEX IF NOT EXISTS idx_build_identity ON TABLE builds COLUMNS project, version, number UNIQUE;

        -- Latest-build lookups
        DEFINE INDEX IF NOT EXISTS idx_build_version ON TABLE builds COLUMNS project, version;
    "#;

    run(db, "builds", sql).await
}
