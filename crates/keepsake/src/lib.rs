//! # Keepsake
//!
//! A live-state serializer for scripted environments.
//!
//! Keepsake walks the object graph reachable from a script's writable
//! globals and emits a standalone initialization program that, when run
//! against the same engine, rebuilds an equivalent graph: same shapes, same
//! sharing, same cycles.
//!
//! ## Architecture
//!
//! - **Environment**: heap arena, two-level global namespace, live objects
//!   and callbacks
//! - **Scanner**: names every engine singleton in the fixed namespace
//! - **Serializer**: turns reachable values into references, detecting
//!   sharing and cycles by identity
//! - **Printer**: orders references so every name is defined before use
//! - **Restore**: parses and executes a snapshot program
//! - **Equivalence**: structural comparison used to check round trips
//!
//! ## Example
//!
//! ```
//! use keepsake::*;
//!
//! let mut env = Environment::with_prelude();
//! let p = env.new_table();
//! env.table_set(&p, "self", p.clone()).unwrap();
//! env.set_global("P", p);
//!
//! let config = SnapshotConfig::default();
//! let program = snapshot(&env, &config).unwrap();
//! assert_eq!(program.to_string(), "P = {}\nP.self = P\n");
//!
//! let mut restored = Environment::with_prelude();
//! restore(&program.to_string(), &mut restored, &ForeignRegistry::new(), &config).unwrap();
//! assert!(env.equivalent_globals(&restored));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod environment;
pub mod equivalence;
pub mod error;
pub mod heap;
pub mod literal;
pub mod program;
pub mod restore;
pub mod snapshot;
pub mod value;

// Re-export main types
pub use config::SnapshotConfig;
pub use environment::{Environment, Module, GLOBALS_NAME};
pub use equivalence::equivalent;
pub use error::{EnvironmentError, RestoreError, Result, SnapshotError};
pub use heap::{ForeignCell, Heap, HeapObject, ObjectId};
pub use program::{Expr, Field, Key, Path, Program, Statement};
pub use restore::{restore, restore_program, Factory, ForeignRegistry};
pub use snapshot::{snapshot, snapshot_with_names, GlobalNames, Serializer};
pub use value::{BuiltinFn, Closure, Coroutine, Describer, ForeignObject, Table, TableKey, Value};

/// Keepsake version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
