use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::{Result, SchemaError};
use crate::registry::SchemaRegistry;

/// `major.minor` schema version, ordered numerically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaVersion {
    pub major: u16,
    pub minor: u16,
}

/// Newest version the writer produces.
pub const LATEST_VERSION: SchemaVersion = SchemaVersion::new(2, 4);

impl SchemaVersion {
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for SchemaVersion {
    type Err = SchemaError;

    fn from_str(text: &str) -> Result<Self> {
        let (major, minor) = text
            .split_once('.')
            .ok_or_else(|| SchemaError::UnknownVersion(text.to_string()))?;
        let part = |value: &str| {
            value
                .parse::<u16>()
                .map_err(|_| SchemaError::UnknownVersion(text.to_string()))
        };
        Ok(Self::new(part(major)?, part(minor)?))
    }
}

impl Serialize for SchemaVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Decide which version to read a table with.
///
/// - no request: the file's own version
/// - `"~M.m"`: the file's version if its major is `M` and its minor is at least `m`
/// - `"M.m"`: only an exact match
///
/// Any other request, including one that is not a version at all, is
/// incompatible. The outcome must be a registered version.
pub fn resolve_version(requested: Option<&str>, file_version: &str) -> Result<SchemaVersion> {
    resolve_version_in(SchemaRegistry::builtin(), requested, file_version)
}

/// [`resolve_version`] against an explicit registry.
pub fn resolve_version_in(
    registry: &SchemaRegistry,
    requested: Option<&str>,
    file_version: &str,
) -> Result<SchemaVersion> {
    let file: SchemaVersion = file_version.parse()?;
    let incompatible = |requested: &str| SchemaError::IncompatibleVersion {
        requested: requested.to_string(),
        file: file_version.to_string(),
    };

    let resolved = match requested {
        None => file,
        Some(text) => match text.strip_prefix('~') {
            Some(floor) => {
                let floor: SchemaVersion = floor.parse().map_err(|_| incompatible(text))?;
                if floor.major != file.major || file.minor < floor.minor {
                    return Err(incompatible(text));
                }
                file
            }
            None => {
                if text.parse::<SchemaVersion>().ok() != Some(file) {
                    return Err(incompatible(text));
                }
                file
            }
        },
    };

    if !registry.contains(resolved) {
        return Err(SchemaError::UnknownVersion(resolved.to_string()));
    }
    Ok(resolved)
}
