//! Scripted environment: heap, global namespace, and live-object registries

mod prelude;

pub use prelude::Module;

use crate::error::EnvironmentError;
use crate::heap::{ForeignCell, Heap, HeapObject, ObjectId};
use crate::value::{BuiltinFn, Closure, Coroutine, ForeignObject, Table, TableKey, Value};

/// Name under which the fixed namespace exposes the writable global table.
pub const GLOBALS_NAME: &str = "_G";

/// The scripted environment a snapshot is taken from (or restored into).
///
/// The global namespace has two levels:
/// - the **fixed** table, filled by the engine before any script runs;
/// - the **writable** global table, whose metatable `__index` points at the
///   fixed table, so scripts see both but only ever write the second.
///
/// The fixed table holds `_G`, the writable table itself (the sentinel).
///
/// # Example
///
/// ```
/// use keepsake::{Environment, Value};
///
/// let mut env = Environment::new();
/// env.define("VERSION", Value::Integer(3));
/// env.set_global("score", Value::Integer(10));
///
/// assert_eq!(env.get_global("score"), Value::Integer(10));
/// assert_eq!(env.get_global("VERSION"), Value::Integer(3)); // falls through to fixed
/// assert_eq!(env.get_global("missing"), Value::Nil);
/// ```
#[derive(Debug)]
pub struct Environment {
    /// All heap objects
    heap: Heap,

    /// Engine-provided, read-only namespace
    fixed: ObjectId,

    /// Script-writable globals
    globals: ObjectId,

    /// Environment value installed for the entry script, if overridden
    entry_env: Option<Value>,

    /// Top-level live objects (re-added to the world on restore)
    live_objects: Vec<Value>,

    /// Registered event callbacks in registration order
    callbacks: Vec<(String, Value)>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    /// Create an environment with an empty global namespace.
    pub fn new() -> Self {
        let mut heap = Heap::new();
        let fixed = heap.alloc(HeapObject::Table(Table::new()));
        let lookup = heap.alloc(HeapObject::Table(Table::new().with("__index", Value::Table(fixed))));
        let globals = heap.alloc(HeapObject::Table(Table {
            metatable: Some(lookup),
            ..Table::new()
        }));

        let mut env = Self {
            heap,
            fixed,
            globals,
            entry_env: None,
            live_objects: Vec::new(),
            callbacks: Vec::new(),
        };
        env.define(GLOBALS_NAME, Value::Table(globals));
        env
    }

    // ═══════════════════════════════════════════════════════════════════
    // Namespace Access
    // ═══════════════════════════════════════════════════════════════════

    /// The object arena
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// The object arena, for mutation
    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    /// Handle of the fixed (engine) namespace table
    pub fn fixed_table(&self) -> ObjectId {
        self.fixed
    }

    /// Handle of the writable global table
    pub fn globals_table(&self) -> ObjectId {
        self.globals
    }

    /// Define an engine-provided name in the fixed namespace.
    pub fn define(&mut self, name: &str, value: Value) {
        self.raw_set(self.fixed, TableKey::name(name), value);
    }

    /// Assign a writable global.
    pub fn set_global(&mut self, name: &str, value: Value) {
        self.raw_set(self.globals, TableKey::name(name), value);
    }

    /// Look up a global, falling back to the fixed namespace.
    pub fn get_global(&self, name: &str) -> Value {
        let key = TableKey::name(name);
        for id in [self.globals, self.fixed] {
            if let Ok(table) = self.heap.table(id) {
                let value = table.get(&key);
                if !value.is_nil() {
                    return value;
                }
            }
        }
        Value::Nil
    }

    fn raw_set(&mut self, table: ObjectId, key: TableKey, value: Value) {
        // Both namespace tables are allocated in `new` and never replaced
        if let Ok(t) = self.heap.table_mut(table) {
            t.set(key, value);
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Allocation
    // ═══════════════════════════════════════════════════════════════════

    /// Allocate an empty table.
    pub fn new_table(&mut self) -> Value {
        self.alloc_table(Table::new())
    }

    /// Move a prepared table into the heap.
    pub fn alloc_table(&mut self, table: Table) -> Value {
        Value::Table(self.heap.alloc(HeapObject::Table(table)))
    }

    /// Parse and allocate a closure.
    pub fn closure(
        &mut self,
        source: &str,
        captures: Vec<(String, Value)>,
    ) -> Result<Value, EnvironmentError> {
        let closure = Closure::parse(source, captures)?;
        Ok(Value::Function(self.heap.alloc(HeapObject::Closure(closure))))
    }

    /// Allocate a native function.
    pub fn builtin(&mut self, name: &str, arity: i32) -> Value {
        Value::Function(self.heap.alloc(HeapObject::Builtin(BuiltinFn::new(name, arity))))
    }

    /// Allocate a foreign object without a type metatable.
    pub fn foreign(&mut self, object: impl ForeignObject + 'static) -> Value {
        self.foreign_with_metatable(Box::new(object), None)
    }

    /// Allocate a boxed foreign object with an optional type metatable.
    pub fn foreign_with_metatable(
        &mut self,
        object: Box<dyn ForeignObject>,
        metatable: Option<ObjectId>,
    ) -> Value {
        Value::Foreign(
            self.heap
                .alloc(HeapObject::Foreign(ForeignCell { object, metatable })),
        )
    }

    /// Allocate a coroutine handle.
    pub fn coroutine(&mut self, entry: Value) -> Value {
        Value::Thread(self.heap.alloc(HeapObject::Thread(Coroutine { entry })))
    }

    // ═══════════════════════════════════════════════════════════════════
    // Table Operations
    // ═══════════════════════════════════════════════════════════════════

    /// Assign `table[key] = value`.
    pub fn table_set(
        &mut self,
        table: &Value,
        key: impl Into<Value>,
        value: Value,
    ) -> Result<(), EnvironmentError> {
        let id = expect_table(table)?;
        let key = TableKey::new(key.into())?;
        self.heap.table_mut(id)?.set(key, value);
        Ok(())
    }

    /// Read `table[key]` without metatable lookup.
    pub fn table_get(&self, table: &Value, key: impl Into<Value>) -> Result<Value, EnvironmentError> {
        let id = expect_table(table)?;
        let key = TableKey::new(key.into())?;
        Ok(self.heap.table(id)?.get(&key))
    }

    /// Attach (or clear) a table's metatable.
    pub fn set_metatable(&mut self, table: &Value, metatable: &Value) -> Result<(), EnvironmentError> {
        let id = expect_table(table)?;
        let mt = match metatable {
            Value::Nil => None,
            other => Some(expect_table(other)?),
        };
        self.heap.table_mut(id)?.metatable = mt;
        Ok(())
    }

    /// Read `target[key]`, following `__index` tables through metatables.
    ///
    /// Works on tables and on foreign objects (through their type metatable).
    pub fn index(&self, target: &Value, key: &Value) -> Result<Value, EnvironmentError> {
        let key = TableKey::new(key.clone())?;
        let mut current = target.clone();
        // Bounded walk: a metatable chain longer than the heap must be a loop
        for _ in 0..=self.heap.len() {
            let metatable = match &current {
                Value::Table(id) => {
                    let table = self.heap.table(*id)?;
                    let raw = table.get(&key);
                    if !raw.is_nil() {
                        return Ok(raw);
                    }
                    table.metatable
                }
                Value::Foreign(id) => self.heap.foreign(*id)?.metatable,
                _ => None,
            };
            let next = match metatable {
                Some(mt) => self.heap.table(mt)?.get_name("__index"),
                None => Value::Nil,
            };
            if next.as_table().is_none() {
                return Ok(Value::Nil);
            }
            current = next;
        }
        Ok(Value::Nil)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Snapshot Roots
    // ═══════════════════════════════════════════════════════════════════

    /// Register a top-level live object.
    pub fn spawn(&mut self, object: Value) {
        self.live_objects.push(object);
    }

    /// Top-level live objects in spawn order
    pub fn live_objects(&self) -> &[Value] {
        &self.live_objects
    }

    /// Register an event callback.
    pub fn on(&mut self, event: &str, callback: Value) {
        self.callbacks.push((event.to_string(), callback));
    }

    /// Registered callbacks in registration order
    pub fn callbacks(&self) -> &[(String, Value)] {
        &self.callbacks
    }

    /// Override the environment seen by the entry script.
    pub fn set_entry_env(&mut self, env: Option<Value>) {
        self.entry_env = env;
    }

    /// The entry-script environment override
    pub fn entry_env(&self) -> Option<&Value> {
        self.entry_env.as_ref()
    }
}

fn expect_table(value: &Value) -> Result<ObjectId, EnvironmentError> {
    value.as_table().ok_or(EnvironmentError::TypeError {
        expected: "table",
        got: crate::error::type_name(value),
    })
}
