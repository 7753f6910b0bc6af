//! Name rules shared with the serving layer.
//!
//! The serving layer only routes project, version and download names that
//! match these patterns, so anything else is rejected at ingestion time.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{IngestError, Result};

pub const PROJECT_NAME: &str = "[a-z]+";
pub const VERSION_NAME: &str = "[0-9.]+-?(?:pre|SNAPSHOT)?(?:[0-9.]+)?";
pub const ARTIFACT_NAME: &str = "[a-zA-Z0-9._-]+";

macro_rules! anchored {
    ($name:ident, $pattern:expr) => {
        static $name: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(&format!("^(?:{})$", $pattern)).unwrap());
    };
}

anchored!(PROJECT_RE, PROJECT_NAME);
anchored!(VERSION_RE, VERSION_NAME);
anchored!(ARTIFACT_RE, ARTIFACT_NAME);

fn check(what: &str, re: &Regex, value: &str) -> Result<()> {
    if re.is_match(value) {
        Ok(())
    } else {
        Err(IngestError::InvalidArgument(format!(
            "{what} \"{value}\" does not match {}",
            re.as_str()
        )))
    }
}

pub fn validate_project_name(name: &str) -> Result<()> {
    check("project name", &PROJECT_RE, name)
}

pub fn validate_version_name(name: &str) -> Result<()> {
    check("version name", &VERSION_RE, name)
}

/// Groups are routed with the version pattern.
pub fn validate_group_name(name: &str) -> Result<()> {
    check("version group", &VERSION_RE, name)
}

pub fn validate_artifact_name(name: &str) -> Result<()> {
    check("artifact name", &ARTIFACT_RE, name)
}
