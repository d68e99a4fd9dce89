//! Live-state snapshots
//!
//! A snapshot walks everything reachable from the writable globals, the
//! live-object list, the registered callbacks and the entry environment, and
//! prints a [`Program`] that rebuilds it:
//!
//! 1. [`GlobalNames::scan`] names every engine singleton in the fixed
//!    namespace
//! 2. the [`Serializer`] turns each reachable value into a reference
//! 3. the printer orders the references so every name is defined before use
//!
//! # Example
//!
//! ```
//! use keepsake::{snapshot, Environment, SnapshotConfig, Table, Value};
//!
//! let mut env = Environment::with_prelude();
//! let root = env.alloc_table(Table::new().with("a", 1).with("b", "x"));
//! env.set_global("root", root);
//!
//! let program = snapshot(&env, &SnapshotConfig::default()).unwrap();
//! assert_eq!(program.to_string(), "root = {a = 1, b = \"x\"}\n");
//! ```

mod printer;
mod reference;
mod scanner;
mod serializer;

pub use reference::{
    DeferredSetter, FunctionReference, InlineField, LiteralReference, ObjectReference, Reference,
    ReferenceSet, Setter, LITERAL_DEPTH,
};
pub use scanner::GlobalNames;
pub use serializer::{Member, Parent, RootReference, Serializer};

use crate::config::SnapshotConfig;
use crate::environment::Environment;
use crate::error::Result;
use crate::program::Program;

/// Snapshot `env`, scanning its fixed namespace first.
pub fn snapshot(env: &Environment, config: &SnapshotConfig) -> Result<Program> {
    let names = GlobalNames::scan(env, config)?;
    snapshot_with_names(env, &names, config)
}

/// Snapshot `env` with a name table from an earlier [`GlobalNames::scan`].
///
/// The table stays valid as long as the fixed namespace is unchanged.
pub fn snapshot_with_names(
    env: &Environment,
    names: &GlobalNames,
    config: &SnapshotConfig,
) -> Result<Program> {
    let mut serializer = Serializer::new(env, names, config);

    serializer.add_globals()?;
    for object in env.live_objects() {
        serializer.add_root_call(&config.spawn_function, std::slice::from_ref(object))?;
    }
    for (event, callback) in env.callbacks() {
        serializer.add_root_call(
            &config.callback_function,
            &[crate::value::Value::string(event), callback.clone()],
        )?;
    }
    if let Some(value) = env.entry_env() {
        serializer.set_env_override(value)?;
    }

    Ok(serializer.finish())
}
