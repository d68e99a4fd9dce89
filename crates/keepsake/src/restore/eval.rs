//! Loader: executes a parsed [`Program`] against an environment

use std::collections::HashMap;

use crate::config::SnapshotConfig;
use crate::environment::Environment;
use crate::error::{type_name, RestoreError};
use crate::program::{Expr, Field, Key, Path, Program, Statement};
use crate::restore::ForeignRegistry;
use crate::value::{Table, TableKey, Value};

/// Execution state for one restore.
pub(crate) struct Loader<'a> {
    env: &'a mut Environment,
    registry: &'a ForeignRegistry,
    config: &'a SnapshotConfig,
    /// `local` temporaries, scoped to this load
    locals: HashMap<String, Value>,
}

impl<'a> Loader<'a> {
    pub(crate) fn new(
        env: &'a mut Environment,
        registry: &'a ForeignRegistry,
        config: &'a SnapshotConfig,
    ) -> Self {
        Self {
            env,
            registry,
            config,
            locals: HashMap::new(),
        }
    }

    pub(crate) fn run(&mut self, program: &Program) -> Result<(), RestoreError> {
        for statement in &program.statements {
            self.execute(statement)?;
        }
        tracing::debug!(
            statements = program.statements.len(),
            temporaries = self.locals.len(),
            "restore complete"
        );
        Ok(())
    }

    fn execute(&mut self, statement: &Statement) -> Result<(), RestoreError> {
        match statement {
            Statement::Assign {
                local,
                target,
                value,
            } => {
                let value = self.eval(value)?;
                self.assign(*local, target, value)
            }
            Statement::Method {
                target,
                method,
                args,
            } => {
                let receiver = self.resolve(target)?;
                let args = self.eval_all(args)?;
                let id = match receiver {
                    Value::Foreign(id) => id,
                    other => {
                        return Err(RestoreError::InvalidCall(format!(
                            "`{}:{}` on a {} value",
                            target,
                            method,
                            type_name(&other)
                        )))
                    }
                };
                self.env
                    .heap_mut()
                    .foreign_mut(id)?
                    .object
                    .call_setter(method, &args)
                    .map_err(RestoreError::Foreign)
            }
            Statement::Call { function, args } => {
                let args = self.eval_all(args)?;
                self.call(function, args)
            }
        }
    }

    fn assign(&mut self, local: bool, target: &Path, value: Value) -> Result<(), RestoreError> {
        let Some((last, base)) = target.segments.split_last() else {
            let name = &target.root;
            if local || self.locals.contains_key(name) {
                self.locals.insert(name.clone(), value);
            } else if *name == self.config.env_override {
                self.env.set_entry_env(Some(value));
            } else {
                self.env.set_global(name, value);
            }
            return Ok(());
        };

        let owner = self.walk(&target.root, base)?;
        let key = self.key(last)?;
        match owner {
            Value::Table(_) => Ok(self.env.table_set(&owner, key, value)?),
            other => Err(RestoreError::NotIndexable(type_name(&other))),
        }
    }

    /// Root-level intrinsic calls.
    fn call(&mut self, function: &Path, args: Vec<Value>) -> Result<(), RestoreError> {
        let name = function.to_string();
        let config = self.config;
        let arity = |n: usize| {
            if args.len() == n {
                Ok(())
            } else {
                Err(RestoreError::InvalidCall(format!(
                    "`{}` expects {} arguments, got {}",
                    name,
                    n,
                    args.len()
                )))
            }
        };

        if name == config.metatable_setter {
            arity(2)?;
            self.env.set_metatable(&args[0], &args[1])?;
        } else if name == config.upvalue_setter {
            arity(3)?;
            let (Value::Function(id), Some(capture)) = (&args[0], args[1].as_str()) else {
                return Err(RestoreError::InvalidCall(format!(
                    "`{}` expects a closure and a capture name",
                    name
                )));
            };
            let closure = self.env.heap_mut().closure_mut(*id)?;
            if !closure.set_capture(capture, args[2].clone()) {
                return Err(RestoreError::InvalidCall(format!(
                    "closure has no capture `{}`",
                    capture
                )));
            }
        } else if name == config.spawn_function {
            arity(1)?;
            self.env.spawn(args[0].clone());
        } else if name == config.callback_function {
            arity(2)?;
            let Some(event) = args[0].as_str() else {
                return Err(RestoreError::InvalidCall(format!(
                    "`{}` expects an event name",
                    name
                )));
            };
            self.env.on(event, args[1].clone());
        } else {
            return Err(RestoreError::InvalidCall(format!("unknown function `{}`", name)));
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════
    // Expressions
    // ═══════════════════════════════════════════════════════════════════

    fn eval_all(&mut self, exprs: &[Expr]) -> Result<Vec<Value>, RestoreError> {
        exprs.iter().map(|e| self.eval(e)).collect()
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, RestoreError> {
        match expr {
            Expr::Nil => Ok(Value::Nil),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Integer(n) => Ok(Value::Integer(*n)),
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::String(bytes) => Ok(Value::String(bytes.clone())),
            Expr::Path(path) => self.resolve(path),
            Expr::Table {
                constructor: None,
                fields,
            } => {
                let table = self.build_table(fields)?;
                Ok(self.env.alloc_table(table))
            }
            Expr::Table {
                constructor: Some(tag),
                fields,
            } => {
                let tag = tag.to_string();
                let fields = self.build_table(fields)?;
                let registry = self.registry;
                let factory = registry
                    .get(&tag)
                    .ok_or_else(|| RestoreError::UnknownConstructor(tag.clone()))?;
                let object = factory(&*self.env, &fields).map_err(RestoreError::Foreign)?;
                Ok(self.env.foreign_with_metatable(object, None))
            }
            Expr::Call { function, args } => self.construct_closure(function, args),
        }
    }

    /// `closure("source", {name = value, ...})`
    ///
    /// Captures are read straight from the constructor so `nil` slots and
    /// their order survive.
    fn construct_closure(&mut self, function: &Path, args: &[Expr]) -> Result<Value, RestoreError> {
        let name = function.to_string();
        if name != self.config.closure_constructor {
            return Err(RestoreError::InvalidCall(format!(
                "`{}` cannot be called in an expression",
                name
            )));
        }
        let [Expr::String(source), Expr::Table {
            constructor: None,
            fields,
        }] = args
        else {
            return Err(RestoreError::InvalidCall(format!(
                "`{}` expects a source string and a capture table",
                name
            )));
        };

        let mut captures = Vec::with_capacity(fields.len());
        for field in fields {
            let (capture, value) = match field {
                Field::Keyed(Key::Name(capture), value) => (capture.clone(), value),
                Field::Keyed(Key::Index(Expr::String(bytes)), value) => {
                    (String::from_utf8_lossy(bytes).into_owned(), value)
                }
                _ => {
                    return Err(RestoreError::InvalidCall(
                        "closure captures must be keyed by name".to_string(),
                    ))
                }
            };
            captures.push((capture, self.eval(value)?));
        }

        let source = String::from_utf8_lossy(source);
        Ok(self.env.closure(&source, captures)?)
    }

    fn build_table(&mut self, fields: &[Field]) -> Result<Table, RestoreError> {
        let mut table = Table::new();
        let mut next = 1;
        for field in fields {
            let (key, value) = match field {
                Field::Positional(value) => {
                    let key = Value::Integer(next);
                    next += 1;
                    (key, value)
                }
                Field::Keyed(key, value) => (self.key(key)?, value),
            };
            let value = self.eval(value)?;
            table.set(TableKey::new(key)?, value);
        }
        Ok(table)
    }

    fn key(&mut self, key: &Key) -> Result<Value, RestoreError> {
        match key {
            Key::Name(name) => Ok(Value::string(name)),
            Key::Index(expr) => self.eval(expr),
        }
    }

    fn resolve(&mut self, path: &Path) -> Result<Value, RestoreError> {
        let value = self.walk(&path.root, &path.segments)?;
        if value.is_nil() {
            return Err(RestoreError::UndefinedName(path.to_string()));
        }
        Ok(value)
    }

    /// Look up `root` then apply `segments`, following `__index` lookups.
    fn walk(&mut self, root: &str, segments: &[Key]) -> Result<Value, RestoreError> {
        let mut current = match self.locals.get(root) {
            Some(value) => value.clone(),
            // Intrinsic, even when a writable global of that name exists
            None if root == self.config.globals_name => Value::Table(self.env.globals_table()),
            None => self.env.get_global(root),
        };
        if current.is_nil() {
            return Err(RestoreError::UndefinedName(root.to_string()));
        }
        for segment in segments {
            if !matches!(current, Value::Table(_) | Value::Foreign(_)) {
                return Err(RestoreError::NotIndexable(type_name(&current)));
            }
            let key = self.key(segment)?;
            current = self.env.index(&current, &key)?;
        }
        Ok(current)
    }
}
