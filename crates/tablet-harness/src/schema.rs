//! Schema override records passed through to the query service.
//!
//! Overrides are stored as a JSON array using the engine's field names:
//!
//! ```json
//! [{"Name": "vitess_view", "PKColumns": ["key2"],
//!   "Cache": {"Type": "RW", "Table": "vitess_part1"}}]
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Per-table override of the schema the engine discovers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SchemaOverride {
    /// Table or view the override applies to.
    pub name: String,
    /// Primary key columns to assume.
    #[serde(rename = "PKColumns", default)]
    pub pk_columns: Vec<String>,
    /// Row cache behaviour for the table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<OverrideCacheDesc>,
}

/// Row cache settings attached to a [`SchemaOverride`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct OverrideCacheDesc {
    /// Cache mode, for example `RW` or `W`.
    #[serde(rename = "Type")]
    pub cache_type: String,
    /// Key prefix for cached rows.
    #[serde(default)]
    pub prefix: String,
    /// Underlying table whose rows are cached.
    #[serde(default)]
    pub table: String,
}

/// Errors raised while loading an override file.
#[derive(Debug, Error)]
pub enum SchemaOverrideError {
    /// The file could not be read.
    #[error("failed to read schema overrides '{path}': {source}")]
    Read {
        /// Override file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The file was not a JSON array of overrides.
    #[error("failed to parse schema overrides '{path}': {source}")]
    Parse {
        /// Override file path.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
}

/// Reads a JSON array of overrides. An empty array means no overrides.
pub fn load_schema_overrides(path: &Path) -> Result<Vec<SchemaOverride>, SchemaOverrideError> {
    let content = fs::read_to_string(path).map_err(|source| SchemaOverrideError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| SchemaOverrideError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
