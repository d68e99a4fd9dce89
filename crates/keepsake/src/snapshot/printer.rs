//! Output printer: references to statements
//!
//! Emission order:
//! 1. non-inlinable objects, deepest first
//! 2. closures, deepest first
//! 3. object deferred setters, then closure capture patches
//! 4. root inline assignments
//! 5. root deferred statements
//! 6. the environment override
//! 7. assignments to globals that hide a fixed entry
//!
//! Depth shrinking in the serializer guarantees that anything a
//! construction mentions by name is deeper, hence printed earlier.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use crate::config::SnapshotConfig;
use crate::program::{Expr, Field, Key, Path, Program, Statement};
use crate::snapshot::reference::{
    DeferredSetter, InlineField, LiteralReference, Reference, ReferenceSet, Setter,
};
use crate::snapshot::serializer::RootReference;

/// Name every non-inlined reference and print the program.
pub fn print(
    refs: &mut ReferenceSet,
    root: &RootReference,
    env_override: Option<&Reference>,
    config: &SnapshotConfig,
) -> Program {
    let mut objects: Vec<usize> = (0..refs.objects.len())
        .filter(|&i| !refs.objects[i].inlinable)
        .collect();
    objects.sort_by_key(|&i| Reverse(refs.objects[i].depth));

    let mut functions: Vec<usize> = (0..refs.functions.len()).collect();
    functions.sort_by_key(|&i| Reverse(refs.functions[i].depth));

    let mut counter = 0;
    let mut next_temporary = || {
        counter += 1;
        format!("{}{}", config.temp_prefix, counter)
    };
    for &i in &objects {
        let object = &mut refs.objects[i];
        if object.name.is_none() {
            object.name = Some(next_temporary());
            object.temporary = true;
        }
    }
    for &i in &functions {
        refs.functions[i].name = Some(next_temporary());
    }

    let printer = Printer { refs, config };
    let mut statements = Vec::new();

    for &i in &objects {
        let object = &refs.objects[i];
        statements.push(Statement::Assign {
            local: object.temporary,
            target: printer.object_path(i),
            value: printer.construct(i),
        });
    }
    for &i in &functions {
        statements.push(Statement::Assign {
            local: true,
            target: printer.function_path(i),
            value: printer.closure(i),
        });
    }

    for &i in &objects {
        let target = printer.object_path(i);
        for deferred in &refs.objects[i].deferred {
            statements.push(printer.deferred(Some(&target), deferred));
        }
    }
    for &i in &functions {
        let target = printer.function_path(i);
        for deferred in &refs.functions[i].deferred {
            statements.push(printer.deferred(Some(&target), deferred));
        }
    }

    for field in &root.fields {
        statements.push(Statement::Assign {
            local: false,
            target: printer.root_target(&field.key),
            value: printer.value_form(&field.value),
        });
    }
    for deferred in &root.deferred {
        statements.push(printer.deferred(None, deferred));
    }

    if let Some(value) = env_override {
        statements.push(Statement::Assign {
            local: false,
            target: Path::name(&config.env_override),
            value: printer.value_form(value),
        });
    }

    for deferred in &root.shadowing {
        statements.push(printer.deferred(None, deferred));
    }

    Program { statements }
}

struct Printer<'a> {
    refs: &'a ReferenceSet,
    config: &'a SnapshotConfig,
}

impl Printer<'_> {
    fn object_path(&self, index: usize) -> Path {
        Path::name(self.refs.objects[index].name.clone().unwrap_or_default())
    }

    fn function_path(&self, index: usize) -> Path {
        Path::name(self.refs.functions[index].name.clone().unwrap_or_default())
    }

    /// Expression form: nested constructor for inlinable objects, name
    /// otherwise.
    fn value_form(&self, reference: &Reference) -> Expr {
        match reference {
            Reference::Literal(literal) => literal.value_form(),
            Reference::Object(i) if self.refs.objects[*i].inlinable => self.construct(*i),
            Reference::Object(i) => Expr::Path(self.object_path(*i)),
            Reference::Function(i) => Expr::Path(self.function_path(*i)),
        }
    }

    fn key_form(&self, reference: &Reference) -> Key {
        match reference {
            Reference::Literal(literal) => literal.key_form(),
            other => Key::Index(self.value_form(other)),
        }
    }

    /// Assignment target for a writable global.
    ///
    /// Names that would collide with temporaries or intrinsics go through
    /// the global table explicitly.
    fn root_target(&self, key: &Reference) -> Path {
        match self.key_form(key) {
            Key::Name(name) if !self.config.is_reserved(&name) => Path::name(name),
            Key::Name(name) => Path::name(&self.config.globals_name)
                .with(Key::Index(Expr::string(name))),
            index => Path::name(&self.config.globals_name).with(index),
        }
    }

    fn construct(&self, index: usize) -> Expr {
        let object = &self.refs.objects[index];
        let constructor = if object.constructor.is_empty() {
            None
        } else {
            Some(Path::dotted(&object.constructor))
        };
        Expr::Table {
            constructor,
            fields: self.fields(&object.fields),
        }
    }

    /// Top-level fields first, then one nested literal per subtable in
    /// name order.
    fn fields(&self, fields: &[InlineField]) -> Vec<Field> {
        let mut top = Vec::new();
        let mut groups: BTreeMap<&str, Vec<&InlineField>> = BTreeMap::new();
        for field in fields {
            match &field.subtable {
                None => top.push(field),
                Some(name) => groups.entry(name.as_str()).or_default().push(field),
            }
        }

        let mut out = self.group(&top);
        for (name, group) in groups {
            out.push(Field::Keyed(
                Key::for_literal(Expr::string(name)),
                Expr::Table {
                    constructor: None,
                    fields: self.group(&group),
                },
            ));
        }
        out
    }

    /// Leading keys `1, 2, ..` print positionally.
    fn group(&self, fields: &[&InlineField]) -> Vec<Field> {
        let mut next = 1;
        let mut positional = true;
        fields
            .iter()
            .map(|field| {
                let value = self.value_form(&field.value);
                let is_next = matches!(
                    &field.key,
                    Reference::Literal(LiteralReference(Expr::Integer(n))) if *n == next
                );
                if positional && is_next {
                    next += 1;
                    Field::Positional(value)
                } else {
                    positional = false;
                    Field::Keyed(self.key_form(&field.key), value)
                }
            })
            .collect()
    }

    fn closure(&self, index: usize) -> Expr {
        let function = &self.refs.functions[index];
        let captures = function
            .captures
            .iter()
            .map(|(name, value)| {
                Field::Keyed(Key::for_literal(Expr::string(name)), self.value_form(value))
            })
            .collect();
        Expr::Call {
            function: Path::dotted(&self.config.closure_constructor),
            args: vec![
                Expr::string(&function.source),
                Expr::Table {
                    constructor: None,
                    fields: captures,
                },
            ],
        }
    }

    /// A deferred statement; `target` is `None` for the root.
    fn deferred(&self, target: Option<&Path>, deferred: &DeferredSetter) -> Statement {
        let args: Vec<Expr> = deferred.args.iter().map(|a| self.value_form(a)).collect();
        let first = args.first().cloned().unwrap_or(Expr::Nil);
        let target_expr = || match target {
            Some(path) => Expr::Path(path.clone()),
            None => Expr::Path(Path::name(&self.config.globals_name)),
        };

        match &deferred.setter {
            Setter::Field(key) => Statement::Assign {
                local: false,
                target: match target {
                    Some(path) => path.clone().with(self.key_form(key)),
                    None => self.root_target(key),
                },
                value: first,
            },
            Setter::Method(method) => match target {
                Some(path) => Statement::Method {
                    target: path.clone(),
                    method: method.clone(),
                    args,
                },
                None => Statement::Call {
                    function: Path::dotted(method),
                    args,
                },
            },
            Setter::Metatable => Statement::Call {
                function: Path::dotted(&self.config.metatable_setter),
                args: vec![target_expr(), first],
            },
            Setter::Upvalue(name) => Statement::Call {
                function: Path::dotted(&self.config.upvalue_setter),
                args: vec![target_expr(), Expr::string(name), first],
            },
            Setter::Call(function) => Statement::Call {
                function: Path::dotted(function),
                args,
            },
        }
    }
}
