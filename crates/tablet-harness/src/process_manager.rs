//! Descriptor for the database process manager.
//!
//! The harness only constructs this value and hands it to the query service.
//! It never calls into the manager itself.

use camino::Utf8PathBuf;

use crate::dbconfig::{ConnParams, DbConfigs, DbRole};

/// Minimal view of the database server's configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mycnf {
    /// Data directory, when the manager owns one.
    pub data_dir: Option<Utf8PathBuf>,
    /// Server socket file, when known.
    pub socket_file: Option<Utf8PathBuf>,
}

/// Role-labelled handle over the database processes backing the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseProcessManager {
    dba_label: DbRole,
    app_label: DbRole,
    mycnf: Mycnf,
    dba: ConnParams,
    app: ConnParams,
    repl: ConnParams,
}

impl DatabaseProcessManager {
    /// Builds a manager from explicit role labels and parameter sets.
    #[must_use]
    pub fn new(
        dba_label: DbRole,
        app_label: DbRole,
        mycnf: Mycnf,
        dba: &ConnParams,
        app: &ConnParams,
        repl: &ConnParams,
    ) -> Self {
        Self {
            dba_label,
            app_label,
            mycnf,
            dba: dba.clone(),
            app: app.clone(),
            repl: repl.clone(),
        }
    }

    /// Builds the manager the harness uses: `dba` and `app` labels with an
    /// empty configuration file descriptor.
    #[must_use]
    pub fn from_db_configs(dbconfigs: &DbConfigs) -> Self {
        Self::new(
            DbRole::Dba,
            DbRole::App,
            Mycnf::default(),
            &dbconfigs.dba,
            &dbconfigs.app.conn_params,
            &dbconfigs.repl,
        )
    }

    /// Label used for administrative connections.
    #[must_use]
    pub const fn dba_label(&self) -> DbRole {
        self.dba_label
    }

    /// Label used for application connections.
    #[must_use]
    pub const fn app_label(&self) -> DbRole {
        self.app_label
    }

    /// Configuration file descriptor.
    #[must_use]
    pub const fn mycnf(&self) -> &Mycnf {
        &self.mycnf
    }

    /// Parameters registered for `role`.
    #[must_use]
    pub const fn params_for(&self, role: DbRole) -> &ConnParams {
        match role {
            DbRole::Dba => &self.dba,
            DbRole::App => &self.app,
            DbRole::Repl => &self.repl,
        }
    }
}
