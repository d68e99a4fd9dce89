//! Hashable wrapper for Value to enable use as table keys

use std::hash::{Hash, Hasher};

use super::Value;
use crate::error::EnvironmentError;

/// A value usable as a table key.
///
/// `nil` and NaN are rejected at construction. Floats with an exact integer
/// value are normalized to `Integer`, so `t[2]` and `t[2.0]` address the
/// same slot.
#[derive(Debug, Clone)]
pub struct TableKey(Value);

impl TableKey {
    /// Wrap a value, normalizing integral floats.
    pub fn new(value: Value) -> Result<Self, EnvironmentError> {
        match value {
            Value::Nil => Err(EnvironmentError::InvalidKey("nil")),
            Value::Number(n) if n.is_nan() => Err(EnvironmentError::InvalidKey("NaN")),
            Value::Number(n) if n.fract() == 0.0 && n >= -(2f64.powi(63)) && n < 2f64.powi(63) => {
                Ok(TableKey(Value::Integer(n as i64)))
            }
            other => Ok(TableKey(other)),
        }
    }

    /// Shorthand for a string key.
    pub fn name(name: &str) -> Self {
        TableKey(Value::string(name))
    }

    /// The wrapped value
    pub fn value(&self) -> &Value {
        &self.0
    }

    /// Unwrap into the key value
    pub fn into_value(self) -> Value {
        self.0
    }
}

impl Hash for TableKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(&self.0).hash(state);

        match &self.0 {
            Value::Nil => {}
            Value::Bool(b) => b.hash(state),
            Value::Integer(n) => n.hash(state),
            // -0.0 and 0.0 never reach here: both normalize to Integer(0)
            Value::Number(n) => n.to_bits().hash(state),
            Value::String(s) => s.hash(state),
            Value::Table(id) | Value::Function(id) | Value::Foreign(id) | Value::Thread(id) => {
                id.hash(state)
            }
        }
    }
}

impl PartialEq for TableKey {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for TableKey {}

impl From<&str> for TableKey {
    fn from(s: &str) -> Self {
        TableKey::name(s)
    }
}

impl From<i64> for TableKey {
    fn from(n: i64) -> Self {
        TableKey(Value::Integer(n))
    }
}

impl From<i32> for TableKey {
    fn from(n: i32) -> Self {
        TableKey(Value::Integer(i64::from(n)))
    }
}
