//! Display and Debug implementations for Value

use std::fmt;

use super::*;

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Number(n) => write!(f, "{:?}", n),
            Value::String(s) => write!(f, "{:?}", String::from_utf8_lossy(s)),

            Value::Table(id) => write!(f, "<table {}>", id),
            Value::Function(id) => write!(f, "<function {}>", id),
            Value::Foreign(id) => write!(f, "<foreign {}>", id),
            Value::Thread(id) => write!(f, "<thread {}>", id),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{}", String::from_utf8_lossy(s)), // No quotes for Display
            _ => fmt::Debug::fmt(self, f),
        }
    }
}
