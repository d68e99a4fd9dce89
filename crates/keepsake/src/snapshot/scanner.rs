//! Global namespace scanner
//!
//! Walks the fixed namespace once and records a path for every value
//! already reachable from it. The serializer consults the result first, so
//! engine singletons are referenced by name and never reconstructed.

use std::collections::{HashMap, HashSet};

use crate::config::SnapshotConfig;
use crate::environment::Environment;
use crate::error::EnvironmentError;
use crate::heap::{HeapObject, ObjectId};
use crate::program::{Key, Path};
use crate::snapshot::reference::LiteralReference;
use crate::value::{Table, TableKey, Value};

/// Identity → global path table.
///
/// Read-only after [`scan`](GlobalNames::scan); can be reused across
/// snapshots of the same environment as long as the fixed namespace does
/// not change.
#[derive(Debug, Clone, Default)]
pub struct GlobalNames {
    names: HashMap<ObjectId, Path>,
    fixed_keys: HashSet<TableKey>,
}

impl GlobalNames {
    /// Scan the fixed namespace of `env`.
    pub fn scan(env: &Environment, config: &SnapshotConfig) -> Result<Self, EnvironmentError> {
        let mut scanner = Scanner {
            env,
            config,
            sentinel: env.globals_table(),
            names: HashMap::new(),
        };
        let fixed = env.heap().table(env.fixed_table())?;
        scanner.expand(None, fixed)?;

        tracing::debug!(names = scanner.names.len(), "scanned global namespace");
        Ok(Self {
            names: scanner.names,
            fixed_keys: fixed.iter().map(|(key, _)| key.clone()).collect(),
        })
    }

    /// Global path of a heap value, if it has one
    pub fn lookup(&self, id: ObjectId) -> Option<&Path> {
        self.names.get(&id)
    }

    /// Check if a writable global stored under `key` would hide a fixed
    /// entry, and with it every path rooted there.
    pub fn shadows(&self, key: &Value) -> bool {
        TableKey::new(key.clone()).is_ok_and(|key| self.fixed_keys.contains(&key))
    }

    /// Number of named values
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check if nothing was named
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

struct Scanner<'a> {
    env: &'a Environment,
    config: &'a SnapshotConfig,
    sentinel: ObjectId,
    names: HashMap<ObjectId, Path>,
}

impl<'a> Scanner<'a> {
    /// Register every entry of `table` under `prefix` (or at top level).
    fn expand(&mut self, prefix: Option<&Path>, table: &'a Table) -> Result<(), EnvironmentError> {
        for (key, value) in table.iter() {
            // Only primitive keys can be spelled in a path
            let Some(key) = LiteralReference::from_value(key.value()) else {
                continue;
            };
            let path = match (prefix, key.key_form()) {
                (Some(prefix), key) => prefix.clone().with(key),
                (None, Key::Name(name)) => Path::name(name),
                (None, key @ Key::Index(_)) => Path::name(&self.config.globals_name).with(key),
            };
            self.visit(path, value)?;
        }
        Ok(())
    }

    fn visit(&mut self, path: Path, value: &Value) -> Result<(), EnvironmentError> {
        let Some(id) = value.object_id() else {
            return Ok(());
        };
        if self.names.contains_key(&id) {
            return Ok(());
        }
        self.names.insert(id, path.clone());

        // The writable table is named (so it prints as `_G`) but its
        // contents are live state, never singletons.
        if id == self.sentinel {
            return Ok(());
        }

        let env = self.env;
        match env.heap().get(id)? {
            HeapObject::Table(_) => {
                if self.config.warn_mutable_globals {
                    tracing::warn!(
                        global = %path,
                        "plain table in the fixed namespace may change between scan and use; \
                         registered by name only"
                    );
                }
            }
            HeapObject::Foreign(cell) => {
                if let Some(index) = self.index_table(cell.metatable)? {
                    self.expand(Some(&path), index)?;
                }
            }
            HeapObject::Closure(_) | HeapObject::Builtin(_) | HeapObject::Thread(_) => {}
        }
        Ok(())
    }

    /// The `__index` table of a type metatable, if it has one.
    fn index_table(&self, metatable: Option<ObjectId>) -> Result<Option<&'a Table>, EnvironmentError> {
        let Some(mt) = metatable else {
            return Ok(None);
        };
        let env = self.env;
        match env.heap().table(mt)?.get_name("__index") {
            Value::Table(index) => Ok(Some(env.heap().table(index)?)),
            _ => Ok(None),
        }
    }
}
