//! Object arena for heap-backed values
//!
//! Every table, function, foreign object and coroutine lives in the [`Heap`]
//! and is addressed by an [`ObjectId`]. The id *is* the identity of the
//! value: two `Value::Table(id)` are the same table exactly when their ids
//! match. Objects are never freed for the lifetime of an environment.

use std::fmt;

use crate::error::EnvironmentError;
use crate::value::{BuiltinFn, Closure, Coroutine, ForeignObject, Table};

/// Stable handle to a heap object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub(crate) u32);

impl ObjectId {
    /// The arena index behind this handle
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A foreign object together with its type metatable.
///
/// The metatable belongs to the native type, not to the instance, so it is
/// never serialized. The namespace scanner reads its `__index` entry.
#[derive(Debug)]
pub struct ForeignCell {
    /// The native object
    pub object: Box<dyn ForeignObject>,

    /// Type metatable, if the binding layer attached one
    pub metatable: Option<ObjectId>,
}

/// Everything that can live in the arena.
#[derive(Debug)]
pub enum HeapObject {
    /// Plain composite value
    Table(Table),
    /// Scripted function with captures
    Closure(Closure),
    /// Native function
    Builtin(BuiltinFn),
    /// Opaque native object
    Foreign(ForeignCell),
    /// Coroutine handle
    Thread(Coroutine),
}

impl HeapObject {
    /// Kind name for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            HeapObject::Table(_) => "table",
            HeapObject::Closure(_) => "closure",
            HeapObject::Builtin(_) => "builtin",
            HeapObject::Foreign(_) => "foreign",
            HeapObject::Thread(_) => "thread",
        }
    }
}

/// Arena of heap objects.
#[derive(Debug, Default)]
pub struct Heap {
    objects: Vec<HeapObject>,
}

impl Heap {
    /// Create an empty heap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Move an object into the arena and return its handle.
    pub fn alloc(&mut self, object: HeapObject) -> ObjectId {
        let id = ObjectId(self.objects.len() as u32);
        self.objects.push(object);
        id
    }

    /// Number of allocated objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Check if nothing has been allocated.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Look up any object.
    pub fn get(&self, id: ObjectId) -> Result<&HeapObject, EnvironmentError> {
        self.objects
            .get(id.index())
            .ok_or(EnvironmentError::DanglingObject(id))
    }

    fn get_mut(&mut self, id: ObjectId) -> Result<&mut HeapObject, EnvironmentError> {
        self.objects
            .get_mut(id.index())
            .ok_or(EnvironmentError::DanglingObject(id))
    }

    /// Look up a table.
    pub fn table(&self, id: ObjectId) -> Result<&Table, EnvironmentError> {
        match self.get(id)? {
            HeapObject::Table(t) => Ok(t),
            other => Err(mismatch("table", other)),
        }
    }

    /// Look up a table for mutation.
    pub fn table_mut(&mut self, id: ObjectId) -> Result<&mut Table, EnvironmentError> {
        match self.get_mut(id)? {
            HeapObject::Table(t) => Ok(t),
            other => Err(mismatch("table", other)),
        }
    }

    /// Look up a closure.
    pub fn closure(&self, id: ObjectId) -> Result<&Closure, EnvironmentError> {
        match self.get(id)? {
            HeapObject::Closure(c) => Ok(c),
            other => Err(mismatch("closure", other)),
        }
    }

    /// Look up a closure for mutation (capture patching).
    pub fn closure_mut(&mut self, id: ObjectId) -> Result<&mut Closure, EnvironmentError> {
        match self.get_mut(id)? {
            HeapObject::Closure(c) => Ok(c),
            other => Err(mismatch("closure", other)),
        }
    }

    /// Look up a foreign object and its type metatable.
    pub fn foreign(&self, id: ObjectId) -> Result<&ForeignCell, EnvironmentError> {
        match self.get(id)? {
            HeapObject::Foreign(f) => Ok(f),
            other => Err(mismatch("foreign", other)),
        }
    }

    /// Look up a foreign object for mutation.
    pub fn foreign_mut(&mut self, id: ObjectId) -> Result<&mut ForeignCell, EnvironmentError> {
        match self.get_mut(id)? {
            HeapObject::Foreign(f) => Ok(f),
            other => Err(mismatch("foreign", other)),
        }
    }
}

fn mismatch(expected: &'static str, got: &HeapObject) -> EnvironmentError {
    EnvironmentError::TypeError {
        expected,
        got: got.kind(),
    }
}
