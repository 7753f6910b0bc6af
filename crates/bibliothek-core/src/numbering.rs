//! Build number allocation.

use std::fmt;
use std::str::FromStr;

use bibliothek_state::{CatalogStore, Project, Version};
use tracing::{debug, instrument};

use crate::error::{IngestError, Result};

/// Requested build number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BuildNumber {
    /// One more than the highest existing number, or 1.
    #[default]
    Auto,
    Explicit(u32),
}

impl FromStr for BuildNumber {
    type Err = IngestError;

    /// Accepts a positive integer, `-1` or `auto`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s == "-1" || s.eq_ignore_ascii_case("auto") {
            return Ok(BuildNumber::Auto);
        }
        match s.parse::<u32>() {
            Ok(n) if n > 0 => Ok(BuildNumber::Explicit(n)),
            _ => Err(IngestError::InvalidArgument(format!(
                "build number \"{s}\" must be a positive integer, -1 or auto"
            ))),
        }
    }
}

impl fmt::Display for BuildNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildNumber::Auto => f.write_str("auto"),
            BuildNumber::Explicit(n) => write!(f, "{n}"),
        }
    }
}

/// Pick the number for a new build.
///
/// Explicit numbers are used as given; a collision surfaces later as
/// `DuplicateBuild`. `Auto` is a single read with no lock, so two
/// simultaneous auto allocations can pick the same number; the unique
/// build identity in the store rejects the second insert.
#[instrument(skip(store, project, version), fields(project = %project.name, version = %version.name))]
pub async fn allocate(
    store: &dyn CatalogStore,
    project: &Project,
    version: &Version,
    requested: BuildNumber,
) -> Result<u32> {
    let number = match requested {
        BuildNumber::Explicit(n) => n,
        BuildNumber::Auto => {
            let next = match store.latest_build(project, version).await? {
                None => 1,
                Some(latest) => latest.number.checked_add(1).ok_or_else(|| {
                    IngestError::InvalidArgument(format!(
                        "build {} is the highest possible number; no build can follow it",
                        latest.number
                    ))
                })?,
            };
            debug!(next, "Auto-allocated build number");
            next
        }
    };
    Ok(number)
}
