//! Structural graph equivalence across two environments
//!
//! Two values are equivalent when there is a one-to-one mapping between the
//! heap objects reachable from them under which every pair has the same
//! kind and equivalent contents. Sharing and cycles therefore have to match
//! too: a table referenced twice on one side cannot correspond to two
//! distinct tables on the other.
//!
//! This is what a snapshot must preserve, so it is how round trips are
//! checked.

use std::collections::HashMap;

use crate::environment::Environment;
use crate::error::SnapshotError;
use crate::heap::{HeapObject, ObjectId};
use crate::value::{Describer, ForeignObject, Table, Value};

/// Check if `a` (in `env_a`) and `b` (in `env_b`) are equivalent graphs.
///
/// Primitives compare by value (NaN equals NaN, `-0.0` differs from `0.0`),
/// closures by source and captures, builtins by name, foreign objects by
/// constructor tag and description.
pub fn equivalent(env_a: &Environment, a: &Value, env_b: &Environment, b: &Value) -> bool {
    Checker::new(env_a, env_b).values(a, b)
}

impl Environment {
    /// Check if the writable globals, live objects, callbacks and entry
    /// environment of `self` and `other` are equivalent.
    ///
    /// Values in the fixed namespaces are matched by their global name.
    pub fn equivalent_globals(&self, other: &Environment) -> bool {
        let mut checker = Checker::new(self, other);
        checker.seed_fixed();

        let same_globals = match (
            self.heap().table(self.globals_table()),
            other.heap().table(other.globals_table()),
        ) {
            (Ok(a), Ok(b)) => checker.entries(a, b),
            _ => false,
        };
        if !same_globals {
            return false;
        }

        if self.live_objects().len() != other.live_objects().len()
            || self.callbacks().len() != other.callbacks().len()
        {
            return false;
        }
        let live = self
            .live_objects()
            .iter()
            .zip(other.live_objects())
            .all(|(a, b)| checker.values(a, b));
        let callbacks = self
            .callbacks()
            .iter()
            .zip(other.callbacks())
            .all(|((ea, fa), (eb, fb))| ea == eb && checker.values(fa, fb));
        let entry_env = match (self.entry_env(), other.entry_env()) {
            (None, None) => true,
            (Some(a), Some(b)) => checker.values(a, b),
            _ => false,
        };
        live && callbacks && entry_env
    }
}

#[derive(Clone)]
struct Checker<'a> {
    a: &'a Environment,
    b: &'a Environment,
    forward: HashMap<ObjectId, ObjectId>,
    backward: HashMap<ObjectId, ObjectId>,
}

impl<'a> Checker<'a> {
    fn new(a: &'a Environment, b: &'a Environment) -> Self {
        Self {
            a,
            b,
            forward: HashMap::new(),
            backward: HashMap::new(),
        }
    }

    /// Pair the two fixed namespaces and their direct entries by name.
    fn seed_fixed(&mut self) {
        let (a, b) = (self.a, self.b);
        self.bind(a.fixed_table(), b.fixed_table());
        let (Ok(fixed_a), Ok(fixed_b)) = (
            a.heap().table(a.fixed_table()),
            b.heap().table(b.fixed_table()),
        ) else {
            return;
        };
        for (key, va) in fixed_a.iter() {
            if let (Some(x), Some(y)) = (va.object_id(), fixed_b.get(key).object_id()) {
                if !self.forward.contains_key(&x) && !self.backward.contains_key(&y) {
                    self.bind(x, y);
                }
            }
        }
    }

    fn bind(&mut self, x: ObjectId, y: ObjectId) {
        self.forward.insert(x, y);
        self.backward.insert(y, x);
    }

    fn values(&mut self, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::Integer(x), Value::Integer(y)) => x == y,
            (Value::Number(x), Value::Number(y)) => {
                (x.is_nan() && y.is_nan()) || x.to_bits() == y.to_bits()
            }
            (Value::String(x), Value::String(y)) => x == y,
            (Value::Table(x), Value::Table(y))
            | (Value::Function(x), Value::Function(y))
            | (Value::Foreign(x), Value::Foreign(y))
            | (Value::Thread(x), Value::Thread(y)) => self.objects(*x, *y),
            _ => false,
        }
    }

    fn objects(&mut self, x: ObjectId, y: ObjectId) -> bool {
        if let Some(mapped) = self.forward.get(&x) {
            return *mapped == y;
        }
        if self.backward.contains_key(&y) {
            return false;
        }
        // Assume the pair matches while comparing contents, so cycles close
        self.bind(x, y);

        let (a, b) = (self.a, self.b);
        let (Ok(ox), Ok(oy)) = (a.heap().get(x), b.heap().get(y)) else {
            return false;
        };
        match (ox, oy) {
            (HeapObject::Table(tx), HeapObject::Table(ty)) => {
                self.entries(tx, ty) && self.metatables(tx.metatable, ty.metatable)
            }
            (HeapObject::Closure(cx), HeapObject::Closure(cy)) => {
                cx.source() == cy.source()
                    && cx.captures.len() == cy.captures.len()
                    && cx
                        .captures
                        .iter()
                        .zip(&cy.captures)
                        .all(|((nx, vx), (ny, vy))| nx == ny && self.values(vx, vy))
            }
            (HeapObject::Builtin(bx), HeapObject::Builtin(by)) => bx.name == by.name,
            (HeapObject::Foreign(fx), HeapObject::Foreign(fy)) => {
                self.foreign(fx.object.as_ref(), fy.object.as_ref())
            }
            (HeapObject::Thread(cx), HeapObject::Thread(cy)) => self.values(&cx.entry, &cy.entry),
            _ => false,
        }
    }

    fn metatables(&mut self, x: Option<ObjectId>, y: Option<ObjectId>) -> bool {
        match (x, y) {
            (None, None) => true,
            (Some(x), Some(y)) => self.objects(x, y),
            _ => false,
        }
    }

    /// Compare table entries (not metatables).
    ///
    /// Primitive keys are looked up directly; heap keys are paired with the
    /// first unmatched key that makes both key and value equivalent.
    fn entries(&mut self, x: &Table, y: &Table) -> bool {
        if x.len() != y.len() {
            return false;
        }
        let mut heap_keys = Vec::new();
        for (key, vx) in x.iter() {
            if key.value().is_primitive() {
                let vy = y.get(key);
                if vy.is_nil() || !self.values(vx, &vy) {
                    return false;
                }
            } else {
                heap_keys.push((key.value(), vx));
            }
        }

        let mut candidates: Vec<(&Value, &Value)> = y
            .iter()
            .filter(|(k, _)| !k.value().is_primitive())
            .map(|(k, v)| (k.value(), v))
            .collect();
        for (kx, vx) in heap_keys {
            let found = candidates.iter().position(|(ky, vy)| {
                let mut attempt = self.clone();
                if attempt.values(kx, ky) && attempt.values(vx, vy) {
                    *self = attempt;
                    true
                } else {
                    false
                }
            });
            match found {
                Some(i) => {
                    candidates.swap_remove(i);
                }
                None => return false,
            }
        }
        true
    }

    fn foreign(&mut self, x: &dyn ForeignObject, y: &dyn ForeignObject) -> bool {
        if x.constructor() != y.constructor() {
            return false;
        }
        let (Some(dx), Some(dy)) = (Recorder::record(x), Recorder::record(y)) else {
            return false;
        };
        dx.len() == dy.len() && dx.iter().zip(&dy).all(|(ex, ey)| self.descriptions(ex, ey))
    }

    fn descriptions(&mut self, x: &Description, y: &Description) -> bool {
        use Description::*;
        match (x, y) {
            (Inline(sx, kx, vx), Inline(sy, ky, vy)) => sx == sy && kx == ky && self.values(vx, vy),
            (List(sx, kx, vx), List(sy, ky, vy)) => {
                sx == sy
                    && kx == ky
                    && vx.len() == vy.len()
                    && vx.iter().zip(vy).all(|(a, b)| self.values(a, b))
            }
            (Member(sx, kx, mx, vx), Member(sy, ky, my, vy)) => {
                sx == sy && kx == ky && mx == my && self.values(vx, vy)
            }
            (Setter(mx, ax), Setter(my, ay)) => {
                mx == my && ax.len() == ay.len() && ax.iter().zip(ay).all(|(a, b)| self.values(a, b))
            }
            _ => false,
        }
    }
}

/// One recorded descriptor call.
#[derive(Debug, Clone)]
enum Description {
    Inline(Option<String>, String, Value),
    List(Option<String>, String, Vec<Value>),
    Member(Option<String>, String, String, Value),
    Setter(String, Vec<Value>),
}

/// A [`Describer`] that just records the calls it receives.
#[derive(Default)]
struct Recorder {
    entries: Vec<Description>,
}

impl Recorder {
    fn record(object: &dyn ForeignObject) -> Option<Vec<Description>> {
        let mut recorder = Recorder::default();
        object.describe(&mut recorder).ok()?;
        Some(recorder.entries)
    }
}

impl Describer for Recorder {
    fn inline(&mut self, subtable: Option<&str>, key: &str, value: &Value) -> Result<(), SnapshotError> {
        self.entries.push(Description::Inline(
            subtable.map(str::to_string),
            key.to_string(),
            value.clone(),
        ));
        Ok(())
    }

    fn inline_list(
        &mut self,
        subtable: Option<&str>,
        key: &str,
        values: &[Value],
    ) -> Result<(), SnapshotError> {
        self.entries.push(Description::List(
            subtable.map(str::to_string),
            key.to_string(),
            values.to_vec(),
        ));
        Ok(())
    }

    fn member(
        &mut self,
        subtable: Option<&str>,
        key: &str,
        setter: &str,
        child: &Value,
    ) -> Result<(), SnapshotError> {
        self.entries.push(Description::Member(
            subtable.map(str::to_string),
            key.to_string(),
            setter.to_string(),
            child.clone(),
        ));
        Ok(())
    }

    fn setter(&mut self, setter: &str, args: &[Value]) -> Result<(), SnapshotError> {
        self.entries
            .push(Description::Setter(setter.to_string(), args.to_vec()));
        Ok(())
    }
}
