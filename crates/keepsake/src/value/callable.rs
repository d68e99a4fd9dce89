//! Callable value types: closures, builtins, and coroutines

use proc_macro2::TokenStream;
use quote::ToTokens;

use super::Value;
use crate::error::EnvironmentError;

/// A scripted closure with captured variables.
///
/// The body is kept as a `syn` AST. Its token rendering is the closure's
/// source blob: the text written into snapshots and re-parsed on restore.
#[derive(Debug, Clone)]
pub struct Closure {
    /// Parameter names
    pub params: Vec<String>,

    /// The closure expression (parameters and body)
    pub expr: syn::ExprClosure,

    /// Captured variables in capture order (name -> value)
    pub captures: Vec<(String, Value)>,
}

impl Closure {
    /// Parse closure source such as `|x| x + offset`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidClosure` when the text is not a closure expression or
    /// uses a destructuring parameter pattern.
    pub fn parse(source: &str, captures: Vec<(String, Value)>) -> Result<Self, EnvironmentError> {
        let invalid = |message: String| EnvironmentError::InvalidClosure {
            source_text: source.to_string(),
            message,
        };

        let expr: syn::ExprClosure = syn::parse_str(source).map_err(|e| invalid(e.to_string()))?;
        let params = expr
            .inputs
            .iter()
            .map(|pat| param_name(pat).ok_or_else(|| invalid("unsupported parameter pattern".into())))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            params,
            expr,
            captures,
        })
    }

    /// Token stream of the closure expression
    pub fn tokens(&self) -> TokenStream {
        self.expr.to_token_stream()
    }

    /// The source blob: canonical token rendering of the closure.
    ///
    /// Rendering is stable under re-parsing, so a restored closure has the
    /// same blob as the original.
    pub fn source(&self) -> String {
        self.tokens().to_string()
    }

    /// Look up a captured variable
    pub fn capture(&self, name: &str) -> Option<&Value> {
        self.captures.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Replace a captured variable. Returns false if there is no such capture.
    pub fn set_capture(&mut self, name: &str, value: Value) -> bool {
        match self.captures.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => {
                slot.1 = value;
                true
            }
            None => false,
        }
    }
}

/// Extract a name from a closure parameter pattern.
fn param_name(pat: &syn::Pat) -> Option<String> {
    match pat {
        syn::Pat::Ident(pat_ident) => Some(pat_ident.ident.to_string()),
        syn::Pat::Wild(_) => Some("_".to_string()),
        syn::Pat::Reference(pat_ref) => param_name(&pat_ref.pat),
        syn::Pat::Type(pat_type) => param_name(&pat_type.pat),
        _ => None,
    }
}

/// A native function provided by the engine.
///
/// Builtins cannot be reconstructed from text; they serialize only through
/// their global name.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltinFn {
    /// Function name (for display/debugging)
    pub name: String,

    /// Arity (-1 for variadic)
    pub arity: i32,
}

impl BuiltinFn {
    /// Create a builtin descriptor
    pub fn new(name: impl Into<String>, arity: i32) -> Self {
        Self {
            name: name.into(),
            arity,
        }
    }
}

/// A suspended coroutine. Never serializable.
#[derive(Debug, Clone)]
pub struct Coroutine {
    /// The function the coroutine runs
    pub entry: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_extracts_params() {
        let c = Closure::parse("|a, _, b: i64| a + b", vec![]).unwrap();
        assert_eq!(c.params, vec!["a", "_", "b"]);
    }

    #[test]
    fn test_source_is_stable_under_reparse() {
        let c = Closure::parse("|x|   x+offset", vec![]).unwrap();
        let again = Closure::parse(&c.source(), vec![]).unwrap();
        assert_eq!(c.source(), again.source());
    }

    #[test]
    fn test_rejects_non_closure() {
        let err = Closure::parse("fn f() {}", vec![]).unwrap_err();
        assert!(matches!(err, EnvironmentError::InvalidClosure { .. }));
    }

    #[test]
    fn test_rejects_tuple_param() {
        assert!(Closure::parse("|(a, b)| a", vec![]).is_err());
    }

    #[test]
    fn test_set_capture() {
        let mut c = Closure::parse("|| n", vec![("n".into(), Value::Integer(1))]).unwrap();
        assert!(c.set_capture("n", Value::Integer(2)));
        assert!(!c.set_capture("m", Value::Nil));
        assert_eq!(c.capture("n"), Some(&Value::Integer(2)));
    }
}
