//! Record shapes for the catalog tables as stored in SurrealDB
//!
//! Tables:
//! - projects: `{ name, friendlyName }`
//! - groups: `{ project, name, timestamp }`
//! - versions: `{ project, group, name, timestamp }`
//! - builds: `{ project, version, number, timestamp, changes, downloads, displayMode, channel }`
//!
//! Record ids are derived from each record's identity tuple, see
//! `surreal_catalog` for the keying scheme.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::sql::Thing;

use crate::storage_traits::{
    Build, Change, Channel, DisplayMode, Download, Project, Version, VersionGroup,
};

/// Module for serializing chrono DateTime to SurrealDB datetime format
mod surreal_datetime {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let sd = SurrealDatetime::from(*date);
        serde::Serialize::serialize(&sd, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = SurrealDatetime::deserialize(deserializer)?;
        Ok(DateTime::from(sd))
    }
}

/// Row of the `projects` table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    pub id: Thing,
    pub name: String,
    pub friendly_name: String,
}

impl ProjectRecord {
    pub fn into_project(self) -> Project {
        Project {
            id: self.id.to_string(),
            name: self.name,
            friendly_name: self.friendly_name,
        }
    }
}

/// Row of the `groups` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupRecord {
    pub id: Thing,
    pub project: Thing,
    pub name: String,
    #[serde(with = "surreal_datetime")]
    pub timestamp: DateTime<Utc>,
}

impl GroupRecord {
    pub fn into_group(self) -> VersionGroup {
        VersionGroup {
            id: self.id.to_string(),
            project_id: self.project.to_string(),
            name: self.name,
            created_at: self.timestamp,
        }
    }
}

/// Row of the `versions` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionRecord {
    pub id: Thing,
    pub project: Thing,
    pub group: Thing,
    pub name: String,
    #[serde(with = "surreal_datetime")]
    pub timestamp: DateTime<Utc>,
}

impl VersionRecord {
    pub fn into_version(self) -> Version {
        Version {
            id: self.id.to_string(),
            project_id: self.project.to_string(),
            group_id: self.group.to_string(),
            name: self.name,
            created_at: self.timestamp,
        }
    }
}

/// Row of the `builds` table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRecord {
    pub id: Thing,
    pub project: Thing,
    pub version: Thing,
    pub number: u32,
    #[serde(with = "surreal_datetime")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub changes: Vec<Change>,
    #[serde(default)]
    pub downloads: BTreeMap<String, Download>,
    pub display_mode: DisplayMode,
    pub channel: Channel,
}

impl BuildRecord {
    pub fn into_build(self) -> Build {
        Build {
            id: self.id.to_string(),
            project_id: self.project.to_string(),
            version_id: self.version.to_string(),
            number: self.number,
            created_at: self.timestamp,
            changes: self.changes,
            downloads: self.downloads,
            display_mode: self.display_mode,
            channel: self.channel,
        }
    }
}
