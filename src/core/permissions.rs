//! Job permission model and the broadest-wins merger

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while building or merging permission maps
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PermissionError {
    #[error("unknown permission level '{0}': expected one of none, read, write")]
    UnknownLevel(String),

    #[error("cannot merge an empty list of permission maps")]
    NothingToMerge,
}

/// Access level requested for a single resource
///
/// Variants are declared in ascending order so that `Ord` is the
/// `none < read < write` lattice used by the merger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PermissionLevel {
    None,
    Read,
    Write,
}

impl PermissionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionLevel::None => "none",
            PermissionLevel::Read => "read",
            PermissionLevel::Write => "write",
        }
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionLevel {
    type Err = PermissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(PermissionLevel::None),
            "read" => Ok(PermissionLevel::Read),
            "write" => Ok(PermissionLevel::Write),
            other => Err(PermissionError::UnknownLevel(other.to_string())),
        }
    }
}

impl Serialize for PermissionLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PermissionLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Resource name (`contents`, `id-token`, `packages`, ...) to access level
pub type PermissionMap = BTreeMap<String, PermissionLevel>;

/// Build a permission map from `(resource, level)` pairs
pub fn permissions<'a, I>(entries: I) -> PermissionMap
where
    I: IntoIterator<Item = (&'a str, PermissionLevel)>,
{
    entries
        .into_iter()
        .map(|(resource, level)| (resource.to_string(), level))
        .collect()
}

/// Merge permission maps, keeping the broadest level requested per resource
pub fn merge_job_permissions<'a, I>(maps: I) -> Result<PermissionMap, PermissionError>
where
    I: IntoIterator<Item = &'a PermissionMap>,
{
    let mut maps = maps.into_iter().peekable();
    if maps.peek().is_none() {
        return Err(PermissionError::NothingToMerge);
    }

    let mut merged = PermissionMap::new();
    for map in maps {
        merge_into(&mut merged, map);
    }
    Ok(merged)
}

/// Fold `other` into `target` under the broadest-wins rule
pub fn merge_into(target: &mut PermissionMap, other: &PermissionMap) {
    for (resource, level) in other {
        target
            .entry(resource.clone())
            .and_modify(|current| *current = (*current).max(*level))
            .or_insert(*level);
    }
}

/// Parse a map of raw string levels, rejecting anything outside none/read/write
pub fn parse_permissions(
    raw: &BTreeMap<String, String>,
) -> Result<PermissionMap, PermissionError> {
    raw.iter()
        .map(|(resource, level)| Ok((resource.clone(), level.parse()?)))
        .collect()
}
