//! Foreign object protocol
//!
//! Native component types (actors, cameras, tile data, ...) are opaque to the
//! serializer. They take part in snapshots by describing themselves through a
//! [`Describer`], and in restores by accepting setter calls.

use std::fmt;

use super::Value;
use crate::error::SnapshotError;

/// Callback surface handed to [`ForeignObject::describe`].
///
/// Implemented by the graph serializer (to build references) and by the
/// equivalence checker (to record descriptions for comparison).
pub trait Describer {
    /// Record a primitive field printed inside the constructor.
    ///
    /// `subtable` groups fields into a nested literal (`pos = {x = 1}`).
    fn inline(&mut self, subtable: Option<&str>, key: &str, value: &Value)
        -> Result<(), SnapshotError>;

    /// Record a list of primitives as one inline field.
    fn inline_list(
        &mut self,
        subtable: Option<&str>,
        key: &str,
        values: &[Value],
    ) -> Result<(), SnapshotError>;

    /// Record a child value of any kind.
    ///
    /// The child is printed inline under `key` when possible, or replayed
    /// afterwards as `obj:<setter>(child)` when it cannot be (cycles,
    /// closures).
    fn member(
        &mut self,
        subtable: Option<&str>,
        key: &str,
        setter: &str,
        child: &Value,
    ) -> Result<(), SnapshotError>;

    /// Record an unconditional deferred call `obj:<setter>(args...)`.
    fn setter(&mut self, setter: &str, args: &[Value]) -> Result<(), SnapshotError>;
}

/// A native object visible to scripts.
pub trait ForeignObject: fmt::Debug {
    /// Constructor tag: how the object is rebuilt (`Actor`, `Engine.Camera`).
    fn constructor(&self) -> &str;

    /// Describe the object's state. Must not keep the describer.
    fn describe(&self, describer: &mut dyn Describer) -> Result<(), SnapshotError>;

    /// Apply a deferred setter during restore.
    fn call_setter(&mut self, name: &str, _args: &[Value]) -> Result<(), String> {
        Err(format!("{} has no setter `{}`", self.constructor(), name))
    }
}
