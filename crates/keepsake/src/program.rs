//! Snapshot program representation
//!
//! The serializer produces a [`Program`]; its `Display` renders the textual
//! form, and [`restore`](crate::restore) parses that text back into the same
//! structure. All escaping lives in [`literal`](crate::literal).

use std::fmt;
use std::sync::Arc;

use crate::literal;

/// An ordered list of statements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    /// Statements in execution order
    pub statements: Vec<Statement>,
}

/// One top-level statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `target = value`, or `local target = value` for temporaries
    Assign {
        /// Declares a loader-local temporary
        local: bool,
        /// Assignment target
        target: Path,
        /// Assigned expression
        value: Expr,
    },

    /// `target:method(args)`
    Method {
        /// Receiver
        target: Path,
        /// Method (setter) name
        method: String,
        /// Arguments
        args: Vec<Expr>,
    },

    /// `function(args)`
    Call {
        /// Called function
        function: Path,
        /// Arguments
        args: Vec<Expr>,
    },
}

/// A name followed by field/index accesses: `a`, `a.b`, `a["x y"][1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    /// Leading name
    pub root: String,
    /// Accesses applied in order
    pub segments: Vec<Key>,
}

/// A table key as written in source.
#[derive(Debug, Clone, PartialEq)]
pub enum Key {
    /// Identifier key: `.name` in paths, `name = v` in constructors
    Name(String),
    /// Any other key: `[expr]`
    Index(Expr),
}

/// One entry of a table constructor.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    /// Next array slot
    Positional(Expr),
    /// Explicit key
    Keyed(Key, Expr),
}

/// An expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `nil`
    Nil,
    /// `true` / `false`
    Bool(bool),
    /// Integer literal
    Integer(i64),
    /// Float literal
    Number(f64),
    /// String literal (raw bytes)
    String(Arc<[u8]>),
    /// Name reference
    Path(Path),
    /// `{...}` or `Tag{...}`
    Table {
        /// Constructor tag for foreign objects
        constructor: Option<Path>,
        /// Entries in order
        fields: Vec<Field>,
    },
    /// `function(args)`
    Call {
        /// Called function
        function: Path,
        /// Arguments
        args: Vec<Expr>,
    },
}

impl Path {
    /// A bare name.
    pub fn name(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            segments: Vec::new(),
        }
    }

    /// Parse a dotted name such as `Engine.Actor`.
    pub fn dotted(text: &str) -> Self {
        let mut parts = text.split('.');
        let root = parts.next().unwrap_or_default().to_string();
        Self {
            root,
            segments: parts.map(|p| Key::Name(p.to_string())).collect(),
        }
    }

    /// Extend with one more access (builder pattern).
    pub fn with(mut self, key: Key) -> Self {
        self.segments.push(key);
        self
    }
}

impl Key {
    /// Pick the shortest key form for a literal: `.name` for identifier
    /// strings, `[literal]` for everything else.
    pub fn for_literal(expr: Expr) -> Self {
        if let Expr::String(bytes) = &expr {
            if let Ok(s) = std::str::from_utf8(bytes) {
                if literal::is_identifier(s) {
                    return Key::Name(s.to_string());
                }
            }
        }
        Key::Index(expr)
    }
}

impl Expr {
    /// Shorthand for a string literal.
    pub fn string(s: impl AsRef<[u8]>) -> Self {
        Expr::String(Arc::from(s.as_ref()))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Rendering
// ═══════════════════════════════════════════════════════════════════════

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for statement in &self.statements {
            writeln!(f, "{}", statement)?;
        }
        Ok(())
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Assign {
                local,
                target,
                value,
            } => {
                if *local {
                    write!(f, "local ")?;
                }
                write!(f, "{} = {}", target, value)
            }
            Statement::Method {
                target,
                method,
                args,
            } => {
                write!(f, "{}:{}(", target, method)?;
                write_list(f, args)?;
                write!(f, ")")
            }
            Statement::Call { function, args } => {
                write!(f, "{}(", function)?;
                write_list(f, args)?;
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)?;
        for segment in &self.segments {
            match segment {
                Key::Name(name) => write!(f, ".{}", name)?,
                Key::Index(expr) => write!(f, "[{}]", expr)?,
            }
        }
        Ok(())
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Nil => write!(f, "nil"),
            Expr::Bool(b) => write!(f, "{}", b),
            Expr::Integer(n) => write!(f, "{}", n),
            Expr::Number(n) => write!(f, "{}", literal::format_number(*n)),
            Expr::String(bytes) => literal::write_escaped(f, bytes),
            Expr::Path(path) => write!(f, "{}", path),
            Expr::Table {
                constructor,
                fields,
            } => {
                if let Some(tag) = constructor {
                    write!(f, "{}", tag)?;
                }
                if fields.is_empty() {
                    return write!(f, "{{}}");
                }
                write!(f, "{{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match field {
                        Field::Positional(value) => write!(f, "{}", value)?,
                        Field::Keyed(Key::Name(name), value) => write!(f, "{} = {}", name, value)?,
                        Field::Keyed(Key::Index(key), value) => write!(f, "[{}] = {}", key, value)?,
                    }
                }
                write!(f, "}}")
            }
            Expr::Call { function, args } => {
                write!(f, "{}(", function)?;
                write_list(f, args)?;
                write!(f, ")")
            }
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}
