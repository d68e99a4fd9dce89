//! Engine prelude: builtins and module singletons in the fixed namespace

use super::Environment;
use crate::error::SnapshotError;
use crate::value::{Describer, ForeignObject, Table, Value};

/// An engine module (`math`, `string`, ...).
///
/// Modules are foreign singletons whose functions live in the `__index`
/// table of their type metatable. They are only ever referenced by their
/// global name, so describing one is a contract violation.
#[derive(Debug, Clone)]
pub struct Module {
    name: String,
}

impl Module {
    /// Create a module descriptor
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl ForeignObject for Module {
    fn constructor(&self) -> &str {
        &self.name
    }

    fn describe(&self, _describer: &mut dyn Describer) -> Result<(), SnapshotError> {
        Err(SnapshotError::DescriptorContract {
            type_name: self.name.clone(),
            message: "engine modules are not constructible; register them in the fixed namespace"
                .to_string(),
        })
    }
}

impl Environment {
    /// Create an environment with the standard engine prelude.
    pub fn with_prelude() -> Self {
        let mut env = Self::new();
        env.load_prelude();
        env
    }

    /// Load the standard prelude into the fixed namespace.
    pub fn load_prelude(&mut self) {
        // Free functions
        for (name, arity) in [
            ("print", -1),
            ("type", 1),
            ("tostring", 1),
            ("pairs", 1),
            ("setmetatable", 2),
        ] {
            let f = self.builtin(name, arity);
            self.define(name, f);
        }

        self.define_module(
            "math",
            &[("floor", 1), ("sqrt", 1), ("abs", 1), ("max", -1), ("min", -1)],
            &[("pi", Value::Number(std::f64::consts::PI))],
        );
        self.define_module(
            "string",
            &[("format", -1), ("rep", 2), ("byte", -1), ("char", -1)],
            &[],
        );
    }

    /// Define a module singleton with builtin functions and constants.
    ///
    /// Function names are qualified (`math.floor`) for debugging output.
    pub fn define_module(&mut self, name: &str, functions: &[(&str, i32)], constants: &[(&str, Value)]) {
        let mut index = Table::new();
        for (fname, arity) in functions {
            let f = self.builtin(&format!("{}.{}", name, fname), *arity);
            index = index.with(*fname, f);
        }
        for (cname, value) in constants {
            index = index.with(*cname, value.clone());
        }
        let index = self.alloc_table(index);
        let metatable = self.alloc_table(Table::new().with("__index", index));

        let module = self.foreign_with_metatable(Box::new(Module::new(name)), metatable.as_table());
        self.define(name, module);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_defines_builtins() {
        let env = Environment::with_prelude();
        assert!(env.get_global("print").is_function());
        assert!(matches!(env.get_global("math"), Value::Foreign(_)));
    }

    #[test]
    fn test_module_functions_reachable_through_index() {
        let env = Environment::with_prelude();
        let math = env.get_global("math");
        let floor = env.index(&math, &Value::string("floor")).unwrap();
        assert!(floor.is_function());
        let pi = env.index(&math, &Value::string("pi")).unwrap();
        assert_eq!(pi, Value::Number(std::f64::consts::PI));
    }
}
