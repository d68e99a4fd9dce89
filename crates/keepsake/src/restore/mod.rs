//! Restoring snapshots
//!
//! Parses snapshot text back into a [`Program`] and executes it against an
//! environment whose fixed namespace matches the one the snapshot was taken
//! from. Foreign objects are rebuilt by factories registered per
//! constructor tag.
//!
//! A failed restore leaves the environment partially written.

mod eval;
mod lexer;
mod parser;

use std::collections::HashMap;
use std::fmt;

use crate::config::SnapshotConfig;
use crate::environment::Environment;
use crate::error::RestoreError;
use crate::program::Program;
use crate::value::{ForeignObject, Table};

/// Builds a foreign object from the fields of its `Tag{...}` constructor.
pub type Factory = Box<dyn Fn(&Environment, &Table) -> Result<Box<dyn ForeignObject>, String>>;

/// Constructor tag → factory.
#[derive(Default)]
pub struct ForeignRegistry {
    factories: HashMap<String, Factory>,
}

impl ForeignRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for `tag`, replacing any earlier one.
    pub fn register<F>(&mut self, tag: impl Into<String>, factory: F)
    where
        F: Fn(&Environment, &Table) -> Result<Box<dyn ForeignObject>, String> + 'static,
    {
        self.factories.insert(tag.into(), Box::new(factory));
    }

    /// Register a factory (builder pattern).
    pub fn with<F>(mut self, tag: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&Environment, &Table) -> Result<Box<dyn ForeignObject>, String> + 'static,
    {
        self.register(tag, factory);
        self
    }

    /// Factory for `tag`
    pub fn get(&self, tag: &str) -> Option<&Factory> {
        self.factories.get(tag)
    }

    /// Check if `tag` has a factory
    pub fn contains(&self, tag: &str) -> bool {
        self.factories.contains_key(tag)
    }
}

impl fmt::Debug for ForeignRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<&String> = self.factories.keys().collect();
        tags.sort();
        f.debug_struct("ForeignRegistry").field("tags", &tags).finish()
    }
}

/// Parse `source` and execute it against `env`.
///
/// `local` temporaries are scoped to this call; bare names assign writable
/// globals; intrinsic calls (`setmetatable`, `setupvalue`, `spawn`, `on`) and
/// the `_ENV` override map onto the environment, using the names in
/// `config`.
///
/// # Example
///
/// ```
/// use keepsake::{restore, Environment, ForeignRegistry, SnapshotConfig, Value};
///
/// let mut env = Environment::with_prelude();
/// let text = "local __ref1 = {1, 2}\nlist = {__ref1, __ref1}\n";
/// restore(text, &mut env, &ForeignRegistry::new(), &SnapshotConfig::default()).unwrap();
///
/// let list = env.get_global("list");
/// let first = env.table_get(&list, 1).unwrap();
/// let second = env.table_get(&list, 2).unwrap();
/// assert_eq!(first, second); // same table, by identity
/// assert!(matches!(first, Value::Table(_)));
/// ```
pub fn restore(
    source: &str,
    env: &mut Environment,
    registry: &ForeignRegistry,
    config: &SnapshotConfig,
) -> Result<(), RestoreError> {
    let program = Program::parse(source)?;
    restore_program(&program, env, registry, config)
}

/// Execute an already parsed program against `env`.
pub fn restore_program(
    program: &Program,
    env: &mut Environment,
    registry: &ForeignRegistry,
    config: &SnapshotConfig,
) -> Result<(), RestoreError> {
    eval::Loader::new(env, registry, config).run(program)
}
