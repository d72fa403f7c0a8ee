//! Identity of the dataset a server instance serves.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Keyspace every harness run serves.
pub const HARNESS_KEYSPACE: &str = "vttest";

/// Shard every harness run serves.
pub const HARNESS_SHARD: &str = "0";

/// Role a tablet plays within its shard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TabletType {
    /// Accepts writes.
    #[default]
    Master,
    /// Serves reads and may be promoted.
    Replica,
    /// Serves reads only.
    Rdonly,
    /// Serves batch and analytics workloads.
    Batch,
}

impl fmt::Display for TabletType {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Master => "master",
            Self::Replica => "replica",
            Self::Rdonly => "rdonly",
            Self::Batch => "batch",
        };
        formatter.write_str(label)
    }
}

/// Error returned when parsing a tablet type fails.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unsupported tablet type: {0}")]
pub struct TabletTypeParseError(String);

impl TabletTypeParseError {
    /// Returns the offending value.
    #[must_use]
    pub fn value(&self) -> &str {
        self.0.as_str()
    }
}

impl FromStr for TabletType {
    type Err = TabletTypeParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "master" | "primary" => Ok(Self::Master),
            "replica" => Ok(Self::Replica),
            "rdonly" => Ok(Self::Rdonly),
            "batch" => Ok(Self::Batch),
            other => Err(TabletTypeParseError(other.to_owned())),
        }
    }
}

/// Keyspace, shard, and role served by one server instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Target {
    /// Logical keyspace.
    pub keyspace: String,
    /// Shard within the keyspace.
    pub shard: String,
    /// Role of the tablet.
    pub tablet_type: TabletType,
}

impl Target {
    /// Builds a target from its parts.
    #[must_use]
    pub fn new(
        keyspace: impl Into<String>,
        shard: impl Into<String>,
        tablet_type: TabletType,
    ) -> Self {
        Self {
            keyspace: keyspace.into(),
            shard: shard.into(),
            tablet_type,
        }
    }

    /// Target used by harness runs: the fixed keyspace and shard with the
    /// requested role.
    #[must_use]
    pub fn harness(tablet_type: TabletType) -> Self {
        Self::new(HARNESS_KEYSPACE, HARNESS_SHARD, tablet_type)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "{}/{} ({})",
            self.keyspace, self.shard, self.tablet_type
        )
    }
}
