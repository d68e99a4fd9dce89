//! Graph serializer: turns live values into references
//!
//! Visits every value reachable from the requested roots exactly once,
//! keyed by heap identity. Objects are registered as `Pending` before their
//! fields are walked, so a field that leads back to an object still under
//! construction is recognised as a cycle and deferred to a setter statement
//! instead of recursing.

use std::collections::HashMap;

use crate::config::SnapshotConfig;
use crate::environment::Environment;
use crate::error::{type_name, Result, SnapshotError};
use crate::heap::{HeapObject, ObjectId};
use crate::program::{Expr, Program};
use crate::snapshot::printer;
use crate::snapshot::reference::{
    DeferredSetter, FunctionReference, InlineField, LiteralReference, ObjectReference, Reference,
    ReferenceSet, Setter,
};
use crate::snapshot::scanner::GlobalNames;
use crate::value::{Closure, Describer, Table, Value};

/// Visited-map state of a heap value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    /// Fields still being walked
    Pending(Slot),
    /// Fully described
    Done(Slot),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Object(usize),
    Function(usize),
}

impl Slot {
    fn reference(self) -> Reference {
        match self {
            Slot::Object(i) => Reference::Object(i),
            Slot::Function(i) => Reference::Function(i),
        }
    }
}

/// Result of serializing one value.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    /// The reference standing in for the value
    pub reference: Reference,

    /// Can only be assigned through a deferred statement
    pub setter_only: bool,

    /// The value is still under construction (a cycle was closed)
    pub pending: bool,
}

impl Member {
    fn literal(literal: LiteralReference) -> Self {
        Self {
            reference: Reference::Literal(literal),
            setter_only: false,
            pending: false,
        }
    }
}

/// Owner of a member: the synthetic root (the global table) or an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parent {
    /// Top-level statements
    Root,
    /// Index into the object arena
    Object(usize),
}

/// Inline fields and deferred statements attached to the synthetic root.
#[derive(Debug, Clone, Default)]
pub struct RootReference {
    /// Global assignments that did not become named constructions
    pub fields: Vec<InlineField>,
    /// Root-level deferred statements
    pub deferred: Vec<DeferredSetter>,
    /// Assignments to globals that hide a fixed entry; printed after
    /// everything else so no fixed path is resolved through them
    pub shadowing: Vec<DeferredSetter>,
}

/// Traversal state for one snapshot.
///
/// Single-threaded and single-use: roots are added, then [`finish`]
/// consumes the serializer and prints the program.
///
/// [`finish`]: Serializer::finish
pub struct Serializer<'a> {
    env: &'a Environment,
    names: &'a GlobalNames,
    config: &'a SnapshotConfig,
    refs: ReferenceSet,
    visited: HashMap<ObjectId, Visit>,
    root: RootReference,
    env_override: Option<Reference>,
    skipped: usize,
}

impl<'a> Serializer<'a> {
    /// Create a serializer over `env` using a pre-computed name table.
    pub fn new(env: &'a Environment, names: &'a GlobalNames, config: &'a SnapshotConfig) -> Self {
        Self {
            env,
            names,
            config,
            refs: ReferenceSet::default(),
            visited: HashMap::new(),
            root: RootReference::default(),
            env_override: None,
            skipped: 0,
        }
    }

    /// References discovered so far
    pub fn references(&self) -> &ReferenceSet {
        &self.refs
    }

    /// Number of values skipped as unsupported
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    // ═══════════════════════════════════════════════════════════════════
    // Roots
    // ═══════════════════════════════════════════════════════════════════

    /// Serialize every entry of the writable global table.
    pub fn add_globals(&mut self) -> Result<()> {
        let env = self.env;
        let globals = env.heap().table(env.globals_table())?;
        for (key, value) in globals.iter() {
            self.serialize_member(Parent::Root, None, key.value(), value, None)?;
        }
        Ok(())
    }

    /// Record a root-level call `function(args...)`, replayed last.
    pub fn add_root_call(&mut self, function: &str, args: &[Value]) -> Result<()> {
        let args = self.serialize_args(1, args)?;
        self.root.deferred.push(DeferredSetter {
            setter: Setter::Call(function.to_string()),
            args,
        });
        Ok(())
    }

    /// Record the entry-script environment override.
    pub fn set_env_override(&mut self, value: &Value) -> Result<()> {
        if let Some(member) = self.serialize_value(1, false, value)? {
            self.refs.force_named(&member.reference);
            self.env_override = Some(member.reference);
        }
        Ok(())
    }

    /// Print the program and discard all traversal state.
    pub fn finish(mut self) -> Program {
        tracing::debug!(
            objects = self.refs.objects.len(),
            functions = self.refs.functions.len(),
            skipped = self.skipped,
            "snapshot traversal complete"
        );
        printer::print(&mut self.refs, &self.root, self.env_override.as_ref(), self.config)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Values
    // ═══════════════════════════════════════════════════════════════════

    /// Convert a value into a reference.
    ///
    /// Returns `None` for unsupported kinds (coroutines, builtins without a
    /// global name); those are skipped with a diagnostic.
    pub fn serialize_value(
        &mut self,
        depth: i64,
        inlinable: bool,
        value: &Value,
    ) -> Result<Option<Member>> {
        if let Some(path) = value.object_id().and_then(|id| self.names.lookup(id)) {
            return Ok(Some(Member::literal(LiteralReference::from(path))));
        }

        let env = self.env;
        match value {
            Value::Table(id) | Value::Foreign(id) => {
                self.serialize_object(depth, inlinable, *id).map(Some)
            }
            Value::Function(id) => match env.heap().get(*id)? {
                HeapObject::Closure(closure) => self.serialize_function(depth, *id, closure).map(Some),
                HeapObject::Builtin(builtin) => {
                    self.skip(value, &format!("builtin `{}` has no global name", builtin.name));
                    Ok(None)
                }
                other => Err(crate::error::EnvironmentError::TypeError {
                    expected: "function",
                    got: other.kind(),
                }
                .into()),
            },
            Value::Thread(_) => {
                self.skip(value, "coroutines cannot be serialized");
                Ok(None)
            }
            primitive => Ok(LiteralReference::from_value(primitive).map(Member::literal)),
        }
    }

    fn skip(&mut self, value: &Value, reason: &str) {
        self.skipped += 1;
        tracing::warn!(kind = type_name(value), value = ?value, "skipping value: {}", reason);
    }

    fn serialize_function(
        &mut self,
        depth: i64,
        id: ObjectId,
        closure: &'a Closure,
    ) -> Result<Member> {
        if let Some(visit) = self.visited.get(&id).copied() {
            return Ok(self.revisit(visit));
        }

        let index = self.refs.functions.len();
        self.refs.functions.push(FunctionReference {
            name: None,
            source: closure.source(),
            captures: Vec::new(),
            deferred: Vec::new(),
            depth,
        });
        self.visited.insert(id, Visit::Pending(Slot::Function(index)));
        tracing::trace!(id = %id, depth, "visiting closure");

        for (name, value) in &closure.captures {
            let capture_depth = self.refs.functions[index].depth + 1;
            let reference = match self.serialize_value(capture_depth, false, value)? {
                None => Reference::Literal(LiteralReference(Expr::Nil)),
                Some(member) if member.pending && matches!(member.reference, Reference::Function(_)) => {
                    // Closure still under construction: patch the capture afterwards
                    self.refs.functions[index].deferred.push(DeferredSetter {
                        setter: Setter::Upvalue(name.clone()),
                        args: vec![member.reference],
                    });
                    Reference::Literal(LiteralReference(Expr::Nil))
                }
                Some(member) => {
                    self.refs.force_named(&member.reference);
                    let captured_depth = self.refs.depth(&member.reference);
                    let function = &mut self.refs.functions[index];
                    if function.depth >= captured_depth {
                        function.depth = captured_depth - 1;
                    }
                    member.reference
                }
            };
            self.refs.functions[index].captures.push((name.clone(), reference));
        }

        self.visited.insert(id, Visit::Done(Slot::Function(index)));
        Ok(Member {
            reference: Reference::Function(index),
            setter_only: true,
            pending: false,
        })
    }

    fn serialize_object(&mut self, depth: i64, inlinable: bool, id: ObjectId) -> Result<Member> {
        if let Some(visit) = self.visited.get(&id).copied() {
            return Ok(self.revisit(visit));
        }

        let index = self.refs.objects.len();
        self.refs.objects.push(ObjectReference::new(depth, inlinable));
        self.visited.insert(id, Visit::Pending(Slot::Object(index)));
        tracing::trace!(id = %id, depth, inlinable, "visiting object");

        let env = self.env;
        match env.heap().get(id)? {
            HeapObject::Table(table) => self.serialize_subtable(index, table)?,
            HeapObject::Foreign(cell) => {
                let tag = cell.object.constructor();
                if tag.is_empty() {
                    return Err(SnapshotError::DescriptorContract {
                        type_name: format!("{:?}", cell.object),
                        message: "empty constructor tag".to_string(),
                    });
                }
                self.refs.objects[index].constructor = tag.to_string();
                let mut handle = DescriptorHandle {
                    serializer: self,
                    parent: index,
                    type_name: tag,
                };
                cell.object.describe(&mut handle)?;
            }
            other => {
                return Err(crate::error::EnvironmentError::TypeError {
                    expected: "table or foreign object",
                    got: other.kind(),
                }
                .into())
            }
        }

        self.visited.insert(id, Visit::Done(Slot::Object(index)));
        Ok(Member {
            reference: Reference::Object(index),
            setter_only: false,
            pending: false,
        })
    }

    /// A second visit: the value must be named; on-stack values are setter-only.
    fn revisit(&mut self, visit: Visit) -> Member {
        let (slot, pending) = match visit {
            Visit::Pending(slot) => (slot, true),
            Visit::Done(slot) => (slot, false),
        };
        let reference = slot.reference();
        self.refs.force_named(&reference);
        Member {
            setter_only: pending || matches!(slot, Slot::Function(_)),
            pending,
            reference,
        }
    }

    /// Walk a plain table's entries and metatable into its reference.
    fn serialize_subtable(&mut self, index: usize, table: &'a Table) -> Result<()> {
        for (key, value) in table.iter() {
            self.serialize_member(Parent::Object(index), None, key.value(), value, None)?;
        }

        if let Some(mt) = table.metatable {
            let depth = self.refs.objects[index].depth + 1;
            if let Some(member) = self.serialize_value(depth, false, &Value::Table(mt))? {
                self.defer(
                    Parent::Object(index),
                    DeferredSetter {
                        setter: Setter::Metatable,
                        args: vec![member.reference],
                    },
                );
            }
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════
    // Members
    // ═══════════════════════════════════════════════════════════════════

    fn parent_depth(&self, parent: Parent) -> i64 {
        match parent {
            Parent::Root => 0,
            Parent::Object(i) => self.refs.objects[i].depth,
        }
    }

    /// Serialize `parent[key] = value`.
    ///
    /// `method` names the setter used when the value has to be deferred;
    /// without one the deferred form is a plain field assignment.
    pub fn serialize_member(
        &mut self,
        parent: Parent,
        subtable: Option<&str>,
        key_value: &Value,
        value: &Value,
        method: Option<&str>,
    ) -> Result<()> {
        let depth = self.parent_depth(parent) + 1;

        let Some(key) = self.serialize_value(depth, false, key_value)? else {
            return Ok(());
        };
        let Some(member) = self.serialize_value(depth, true, value)? else {
            return Ok(());
        };
        self.refs.force_named(&key.reference);

        if parent == Parent::Root && self.names.shadows(key_value) {
            let deferred = DeferredSetter {
                setter: Setter::Field(key.reference),
                args: vec![member.reference],
            };
            self.root.shadowing.push(deferred);
            return Ok(());
        }

        if member.setter_only || key.setter_only {
            self.refs.force_named(&member.reference);
            let deferred = match method {
                Some(method) => DeferredSetter {
                    setter: Setter::Method(method.to_string()),
                    args: vec![member.reference],
                },
                None => DeferredSetter {
                    setter: Setter::Field(key.reference),
                    args: vec![member.reference],
                },
            };
            self.defer(parent, deferred);
            return Ok(());
        }

        match parent {
            Parent::Root => {
                if self.try_global_name(&key.reference, &member.reference) {
                    return Ok(());
                }
                self.root.fields.push(InlineField {
                    subtable: subtable.map(str::to_string),
                    key: key.reference,
                    value: member.reference,
                });
            }
            Parent::Object(index) => {
                let bound = self
                    .refs
                    .depth(&key.reference)
                    .min(self.refs.depth(&member.reference));
                let object = &mut self.refs.objects[index];
                if object.depth >= bound {
                    object.depth = bound - 1;
                }
                object.fields.push(InlineField {
                    subtable: subtable.map(str::to_string),
                    key: key.reference,
                    value: member.reference,
                });
            }
        }
        Ok(())
    }

    /// Give an object the name of the writable global it is stored in.
    ///
    /// First identifier key wins; later keys see the name as a taken slot.
    fn try_global_name(&mut self, key: &Reference, value: &Reference) -> bool {
        let (Reference::Literal(LiteralReference(Expr::String(bytes))), Reference::Object(index)) =
            (key, value)
        else {
            return false;
        };
        let Ok(name) = std::str::from_utf8(bytes) else {
            return false;
        };
        if !crate::literal::is_identifier(name)
            || self.config.is_reserved(name)
            || self.names.shadows(&Value::string(name))
        {
            return false;
        }
        let object = &mut self.refs.objects[*index];
        if object.name.is_some() {
            return false;
        }
        object.name = Some(name.to_string());
        object.temporary = false;
        object.inlinable = false;
        true
    }

    /// Attach a deferred statement. Everything it mentions must be named,
    /// including its target.
    fn defer(&mut self, parent: Parent, deferred: DeferredSetter) {
        for arg in &deferred.args {
            self.refs.force_named(arg);
        }
        match parent {
            Parent::Root => self.root.deferred.push(deferred),
            Parent::Object(index) => {
                let object = &mut self.refs.objects[index];
                object.inlinable = false;
                object.deferred.push(deferred);
            }
        }
    }

    fn serialize_args(&mut self, depth: i64, args: &[Value]) -> Result<Vec<Reference>> {
        let mut refs = Vec::with_capacity(args.len());
        for arg in args {
            let reference = match self.serialize_value(depth, false, arg)? {
                Some(member) => {
                    self.refs.force_named(&member.reference);
                    member.reference
                }
                None => Reference::Literal(LiteralReference(Expr::Nil)),
            };
            refs.push(reference);
        }
        Ok(refs)
    }
}

/// The describer handed to foreign objects while they are on the stack.
struct DescriptorHandle<'s, 'a> {
    serializer: &'s mut Serializer<'a>,
    parent: usize,
    type_name: &'a str,
}

impl DescriptorHandle<'_, '_> {
    fn violation(&self, message: String) -> SnapshotError {
        SnapshotError::DescriptorContract {
            type_name: self.type_name.to_string(),
            message,
        }
    }

    fn literal(&self, key: &str, value: &Value) -> Result<LiteralReference> {
        LiteralReference::from_value(value).ok_or_else(|| {
            self.violation(format!(
                "inline field `{}` must be a primitive, got {}",
                key,
                type_name(value)
            ))
        })
    }

    fn push_inline(&mut self, subtable: Option<&str>, key: &str, value: LiteralReference) {
        self.serializer.refs.objects[self.parent]
            .fields
            .push(InlineField {
                subtable: subtable.map(str::to_string),
                key: Reference::Literal(LiteralReference(Expr::string(key))),
                value: Reference::Literal(value),
            });
    }
}

impl Describer for DescriptorHandle<'_, '_> {
    fn inline(&mut self, subtable: Option<&str>, key: &str, value: &Value) -> Result<()> {
        let literal = self.literal(key, value)?;
        self.push_inline(subtable, key, literal);
        Ok(())
    }

    fn inline_list(&mut self, subtable: Option<&str>, key: &str, values: &[Value]) -> Result<()> {
        let fields = values
            .iter()
            .map(|v| {
                self.literal(key, v)
                    .map(|l| crate::program::Field::Positional(l.value_form()))
            })
            .collect::<Result<Vec<_>>>()?;
        let list = LiteralReference(Expr::Table {
            constructor: None,
            fields,
        });
        self.push_inline(subtable, key, list);
        Ok(())
    }

    fn member(
        &mut self,
        subtable: Option<&str>,
        key: &str,
        setter: &str,
        child: &Value,
    ) -> Result<()> {
        if setter.is_empty() {
            return Err(self.violation(format!("member `{}` registered without a setter", key)));
        }
        self.serializer.serialize_member(
            Parent::Object(self.parent),
            subtable,
            &Value::string(key),
            child,
            Some(setter),
        )
    }

    fn setter(&mut self, setter: &str, args: &[Value]) -> Result<()> {
        if setter.is_empty() {
            return Err(self.violation("setter registered without a name".to_string()));
        }
        let depth = self.serializer.refs.objects[self.parent].depth + 1;
        let args = self.serializer.serialize_args(depth, args)?;
        self.serializer.defer(
            Parent::Object(self.parent),
            DeferredSetter {
                setter: Setter::Method(setter.to_string()),
                args,
            },
        );
        Ok(())
    }
}
