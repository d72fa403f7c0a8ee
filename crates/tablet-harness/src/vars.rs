//! Exported diagnostic variables served at `/debug/vars`.
//!
//! Services publish their counters here when they are registered. Each
//! harness run owns a fresh registry, so consecutive runs in one process
//! never see each other's variables.

use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::{Map, Value};
use thiserror::Error;

/// Name of the implicit variable holding the process arguments.
pub const CMDLINE_VAR: &str = "cmdline";

/// A value that can be rendered into the vars snapshot.
pub trait ExportedVar: Send + Sync {
    /// Current value as JSON.
    fn snapshot(&self) -> Value;
}

/// Monotonic integer counter.
#[derive(Debug, Clone, Default)]
pub struct Counter(Arc<AtomicI64>);

impl Counter {
    /// Builds a counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `delta`.
    pub fn add(&self, delta: i64) {
        self.0.fetch_add(delta, Ordering::SeqCst);
    }

    /// Current value.
    #[must_use]
    pub fn get(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

impl ExportedVar for Counter {
    fn snapshot(&self) -> Value {
        Value::from(self.get())
    }
}

/// Integer value that can move in either direction.
#[derive(Debug, Clone, Default)]
pub struct Gauge(Arc<AtomicI64>);

impl Gauge {
    /// Builds a gauge at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the value.
    pub fn set(&self, value: i64) {
        self.0.store(value, Ordering::SeqCst);
    }

    /// Current value.
    #[must_use]
    pub fn get(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

impl ExportedVar for Gauge {
    fn snapshot(&self) -> Value {
        Value::from(self.get())
    }
}

/// Settable string value.
#[derive(Debug, Clone, Default)]
pub struct StringVar(Arc<RwLock<String>>);

impl StringVar {
    /// Builds a variable holding `value`.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(Arc::new(RwLock::new(value.into())))
    }

    /// Replaces the value.
    pub fn set(&self, value: impl Into<String>) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = value.into();
    }

    /// Current value.
    #[must_use]
    pub fn get(&self) -> String {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl ExportedVar for StringVar {
    fn snapshot(&self) -> Value {
        Value::from(self.get())
    }
}

/// Errors raised when publishing variables.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VarsError {
    /// A variable with this name already exists.
    #[error("variable '{name}' is already published")]
    Duplicate {
        /// Conflicting name.
        name: String,
    },
}

/// Registry of exported variables for one server instance.
#[derive(Default)]
pub struct VarsRegistry {
    vars: RwLock<BTreeMap<String, Arc<dyn ExportedVar>>>,
}

impl fmt::Debug for VarsRegistry {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("VarsRegistry")
            .field("names", &self.names())
            .finish()
    }
}

impl VarsRegistry {
    /// Builds an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes `var` under `name`.
    ///
    /// Publishing the same name twice fails and leaves the first variable in
    /// place, so re-registration can never double-count.
    pub fn publish(
        &self,
        name: impl Into<String>,
        var: Arc<dyn ExportedVar>,
    ) -> Result<(), VarsError> {
        let name = name.into();
        let mut vars = self.vars.write().unwrap_or_else(PoisonError::into_inner);
        if name == CMDLINE_VAR || vars.contains_key(&name) {
            return Err(VarsError::Duplicate { name });
        }
        vars.insert(name, var);
        Ok(())
    }

    /// Names of the published variables, in order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.vars
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Number of published variables, excluding `cmdline`.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true when nothing has been published.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Renders every variable, plus `cmdline`, as a JSON object.
    #[must_use]
    pub fn snapshot(&self) -> Map<String, Value> {
        let mut snapshot = Map::new();
        snapshot.insert(
            CMDLINE_VAR.to_owned(),
            Value::from(env::args().collect::<Vec<_>>()),
        );
        let vars = self.vars.read().unwrap_or_else(PoisonError::into_inner);
        for (name, var) in vars.iter() {
            snapshot.insert(name.clone(), var.snapshot());
        }
        snapshot
    }
}
