//! Reference model: the emittable stand-ins for values
//!
//! A [`Reference`] is either a literal (printed verbatim, never constrains
//! ordering) or a handle into the [`ReferenceSet`] arena of objects and
//! functions discovered during one snapshot.

use crate::program::{Expr, Key, Path};
use crate::value::Value;

/// Depth of literals: they never constrain emission order.
pub const LITERAL_DEPTH: i64 = i64::MAX;

/// An emittable stand-in for a value.
#[derive(Debug, Clone, PartialEq)]
pub enum Reference {
    /// Literal or global name, printed as-is
    Literal(LiteralReference),
    /// Index into [`ReferenceSet::objects`]
    Object(usize),
    /// Index into [`ReferenceSet::functions`]
    Function(usize),
}

/// An immutable textual literal: a primitive value, a global path, or a raw
/// fragment such as an inline list.
#[derive(Debug, Clone, PartialEq)]
pub struct LiteralReference(pub Expr);

impl LiteralReference {
    /// Literal for a primitive value (`None` for heap values).
    pub fn from_value(value: &Value) -> Option<Self> {
        let expr = match value {
            Value::Nil => Expr::Nil,
            Value::Bool(b) => Expr::Bool(*b),
            Value::Integer(n) => Expr::Integer(*n),
            Value::Number(n) => Expr::Number(*n),
            Value::String(s) => Expr::String(s.clone()),
            _ => return None,
        };
        Some(Self(expr))
    }

    /// Form used as a table key: `.name` or `[literal]`
    pub fn key_form(&self) -> Key {
        Key::for_literal(self.0.clone())
    }

    /// Form used as an expression
    pub fn value_form(&self) -> Expr {
        self.0.clone()
    }
}

impl From<&Path> for LiteralReference {
    fn from(path: &Path) -> Self {
        LiteralReference(Expr::Path(path.clone()))
    }
}

/// A field printed inside its owner's constructor.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineField {
    /// Nested literal group (`pos = {x = .., y = ..}`)
    pub subtable: Option<String>,
    /// Key reference
    pub key: Reference,
    /// Value reference
    pub value: Reference,
}

/// How a deferred statement updates its target.
#[derive(Debug, Clone, PartialEq)]
pub enum Setter {
    /// `target.key = arg` / `target[key] = arg`
    Field(Reference),
    /// `target:name(args)`
    Method(String),
    /// `setmetatable(target, arg)`
    Metatable,
    /// `setupvalue(target, "name", arg)`
    Upvalue(String),
    /// `name(args)`: root-level call not bound to a target
    Call(String),
}

/// A statement replayed after every construction has been printed.
#[derive(Debug, Clone, PartialEq)]
pub struct DeferredSetter {
    /// Update kind
    pub setter: Setter,
    /// Arguments in order
    pub args: Vec<Reference>,
}

/// One composite or opaque runtime value.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectReference {
    /// Stable or temporary name, assigned at the latest by the printer
    pub name: Option<String>,

    /// Whether `name` was synthesized
    pub temporary: bool,

    /// Constructor tag; empty for plain tables
    pub constructor: String,

    /// Fields printed inside the constructor
    pub fields: Vec<InlineField>,

    /// Statements replayed after construction
    pub deferred: Vec<DeferredSetter>,

    /// Emission priority (larger prints earlier)
    pub depth: i64,

    /// Eligible to be printed as a nested literal
    pub inlinable: bool,
}

impl ObjectReference {
    /// A fresh, unnamed reference
    pub fn new(depth: i64, inlinable: bool) -> Self {
        Self {
            name: None,
            temporary: false,
            constructor: String::new(),
            fields: Vec::new(),
            deferred: Vec::new(),
            depth,
            inlinable,
        }
    }
}

/// A closure: source blob plus captured variables.
///
/// Always setter-only and always named.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionReference {
    /// Temporary name, assigned by the printer
    pub name: Option<String>,

    /// Verbatim source blob
    pub source: String,

    /// Captured variables in capture order
    pub captures: Vec<(String, Reference)>,

    /// Capture patches for captures that closed a cycle
    pub deferred: Vec<DeferredSetter>,

    /// Emission priority (larger prints earlier)
    pub depth: i64,
}

/// Arena owning every reference created by one snapshot.
///
/// Index order is discovery order, which breaks depth ties when printing.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSet {
    /// Object references in discovery order
    pub objects: Vec<ObjectReference>,
    /// Function references in discovery order
    pub functions: Vec<FunctionReference>,
}

impl ReferenceSet {
    /// Emission depth of any reference
    pub fn depth(&self, reference: &Reference) -> i64 {
        match reference {
            Reference::Literal(_) => LITERAL_DEPTH,
            Reference::Object(i) => self.objects[*i].depth,
            Reference::Function(i) => self.functions[*i].depth,
        }
    }

    /// Force a reference to be printed by name.
    pub fn force_named(&mut self, reference: &Reference) {
        if let Reference::Object(i) = reference {
            self.objects[*i].inlinable = false;
        }
    }
}
