//! Database connection descriptors handed to the query service.
//!
//! The harness never opens these connections itself. It assembles the
//! descriptors once per run and passes them, unchanged, to the service's
//! start call and to the database process manager.

use std::fmt;
use std::str::FromStr;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default MySQL character set used by the harness.
pub const DEFAULT_CHARSET: &str = "utf8";

/// How to reach the backing database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConnParams {
    /// Database host name or address.
    pub host: String,
    /// Database TCP port.
    pub port: u16,
    /// User name.
    pub uname: String,
    /// Password. Never rendered by [`fmt::Display`].
    pub pass: String,
    /// Schema the connection selects.
    pub dbname: String,
    /// Unix socket path; takes precedence over `host`/`port` when set.
    pub unix_socket: Option<Utf8PathBuf>,
    /// Connection character set.
    pub charset: String,
}

impl ConnParams {
    /// Parameters for a TCP endpoint.
    #[must_use]
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            charset: DEFAULT_CHARSET.to_owned(),
            ..Self::default()
        }
    }

    /// Parameters for a Unix socket endpoint.
    #[must_use]
    pub fn unix(socket: impl Into<Utf8PathBuf>) -> Self {
        Self {
            unix_socket: Some(socket.into()),
            charset: DEFAULT_CHARSET.to_owned(),
            ..Self::default()
        }
    }

    /// Sets the credentials.
    #[must_use]
    pub fn with_credentials(mut self, uname: impl Into<String>, pass: impl Into<String>) -> Self {
        self.uname = uname.into();
        self.pass = pass.into();
        self
    }

    /// Sets the schema.
    #[must_use]
    pub fn with_dbname(mut self, dbname: impl Into<String>) -> Self {
        self.dbname = dbname.into();
        self
    }

    /// Returns true when neither a socket nor a host is configured.
    #[must_use]
    pub fn is_unset(&self) -> bool {
        self.unix_socket.is_none() && self.host.trim().is_empty()
    }
}

impl fmt::Display for ConnParams {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.uname.is_empty() {
            write!(formatter, "{}@", self.uname)?;
        }
        match &self.unix_socket {
            Some(socket) => write!(formatter, "unix({socket})")?,
            None => write!(formatter, "tcp({}:{})", self.host, self.port)?,
        }
        write!(formatter, "/{}", self.dbname)
    }
}

/// Connection parameters bound to the keyspace and shard they serve.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct DbConfig {
    /// Connection parameters for the application role.
    pub conn_params: ConnParams,
    /// Logical keyspace the database backs.
    pub keyspace: String,
    /// Shard within the keyspace.
    pub shard: String,
}

/// Role-labelled connection parameter sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct DbConfigs {
    /// Application connections used to serve queries.
    pub app: DbConfig,
    /// Administrative connections.
    pub dba: ConnParams,
    /// Replication connections.
    pub repl: ConnParams,
}

impl DbConfigs {
    /// Builds configs with only the application role populated.
    ///
    /// The administrative and replication roles stay at their defaults, which
    /// is all an embedded test server needs.
    #[must_use]
    pub fn for_app(
        conn_params: ConnParams,
        keyspace: impl Into<String>,
        shard: impl Into<String>,
    ) -> Self {
        Self {
            app: DbConfig {
                conn_params,
                keyspace: keyspace.into(),
                shard: shard.into(),
            },
            dba: ConnParams::default(),
            repl: ConnParams::default(),
        }
    }

    /// Parameters for the given role.
    #[must_use]
    pub fn params_for(&self, role: DbRole) -> &ConnParams {
        match role {
            DbRole::Dba => &self.dba,
            DbRole::App => &self.app.conn_params,
            DbRole::Repl => &self.repl,
        }
    }
}

/// Connection roles understood by the database process manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DbRole {
    /// Administrative connections.
    Dba,
    /// Application connections.
    App,
    /// Replication connections.
    Repl,
}

impl fmt::Display for DbRole {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Dba => "dba",
            Self::App => "app",
            Self::Repl => "repl",
        };
        formatter.write_str(label)
    }
}

/// Error returned when parsing a [`DbRole`] fails.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unsupported database role: {0}")]
pub struct DbRoleParseError(String);

impl FromStr for DbRole {
    type Err = DbRoleParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "dba" => Ok(Self::Dba),
            "app" => Ok(Self::App),
            "repl" => Ok(Self::Repl),
            other => Err(DbRoleParseError(other.to_owned())),
        }
    }
}
