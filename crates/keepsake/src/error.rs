//! Error types for snapshotting and restoring

use thiserror::Error;

use crate::heap::ObjectId;
use crate::value::Value;

/// Errors raised by the environment model (heap access, closure parsing).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnvironmentError {
    /// An `ObjectId` that does not belong to this heap
    #[error("Dangling object id {0}")]
    DanglingObject(ObjectId),

    /// The object exists but has a different kind than requested
    #[error("Type error: expected {expected}, got {got}")]
    TypeError {
        /// Expected kind
        expected: &'static str,
        /// Kind actually found
        got: &'static str,
    },

    /// `nil` or NaN used as a table key
    #[error("Invalid table key: {0}")]
    InvalidKey(&'static str),

    /// Closure source failed to parse
    #[error("Invalid closure source `{source_text}`: {message}")]
    InvalidClosure {
        /// The offending source
        source_text: String,
        /// Parser message
        message: String,
    },
}

/// Errors that abort a snapshot.
///
/// Per-value problems (unsupported kinds) are not errors: they are skipped
/// with a diagnostic. Everything here means the output must be discarded.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SnapshotError {
    /// A foreign object broke the descriptor protocol
    #[error("Descriptor contract violated by `{type_name}`: {message}")]
    DescriptorContract {
        /// Constructor tag (or a placeholder when the tag itself is missing)
        type_name: String,
        /// What went wrong
        message: String,
    },

    /// Heap access failed while walking the graph
    #[error(transparent)]
    Environment(#[from] EnvironmentError),
}

/// Errors raised while executing a snapshot program back into an environment.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RestoreError {
    /// Tokenizer failure
    #[error("Lex error at line {line}: {message}")]
    Lex {
        /// 1-based line number
        line: usize,
        /// Description
        message: String,
    },

    /// Grammar failure
    #[error("Parse error at line {line}: {message}")]
    Parse {
        /// 1-based line number
        line: usize,
        /// Description
        message: String,
    },

    /// A name that was never assigned
    #[error("Undefined name `{0}`")]
    UndefinedName(String),

    /// `Tag{...}` with no registered factory
    #[error("Unknown constructor `{0}`")]
    UnknownConstructor(String),

    /// Field access or assignment on a value that has no fields
    #[error("Cannot index a {0} value")]
    NotIndexable(&'static str),

    /// Call to something the loader does not know how to invoke
    #[error("Invalid call: {0}")]
    InvalidCall(String),

    /// A foreign factory or setter rejected its input
    #[error("Foreign object error: {0}")]
    Foreign(String),

    /// Heap access failed
    #[error(transparent)]
    Environment(#[from] EnvironmentError),
}

/// Result type alias for snapshot operations
pub type Result<T> = std::result::Result<T, SnapshotError>;

/// Human-readable kind of a value, for error messages and diagnostics.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Nil => "nil",
        Value::Bool(_) => "boolean",
        Value::Integer(_) => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Table(_) => "table",
        Value::Function(_) => "function",
        Value::Foreign(_) => "foreign",
        Value::Thread(_) => "thread",
    }
}
