//! Restore and round-trip tests

mod common;

use common::{registry, round_trip, snapshot_text, Actor};
use keepsake::*;
use pretty_assertions::assert_eq;

fn restore_text(text: &str) -> std::result::Result<Environment, RestoreError> {
    let mut env = Environment::with_prelude();
    restore(text, &mut env, &registry(), &SnapshotConfig::default())?;
    Ok(env)
}

// ═══════════════════════════════════════════════════════════════════════
// Round Trips
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_round_trip_acyclic() -> anyhow::Result<()> {
    let mut env = Environment::with_prelude();
    let deep = env.alloc_table(Table::new().with("v", true).with("n", 0.5));
    let list = env.alloc_table(Table::new().with(1, "a").with(2, "b"));
    let root = env.alloc_table(
        Table::new()
            .with("deep", deep)
            .with("list", list)
            .with("name", "root"),
    );
    env.set_global("root", root);
    env.set_global("count", Value::Integer(-4));

    let restored = round_trip(&env)?;
    assert!(env.equivalent_globals(&restored));
    Ok(())
}

#[test]
fn test_round_trip_preserves_sharing() -> anyhow::Result<()> {
    let mut env = Environment::with_prelude();
    let shared = env.new_table();
    let a = env.alloc_table(Table::new().with("x", shared.clone()));
    let b = env.alloc_table(Table::new().with("y", shared));
    env.set_global("a", a);
    env.set_global("b", b);

    let restored = round_trip(&env)?;
    assert!(env.equivalent_globals(&restored));

    let x = restored.table_get(&restored.get_global("a"), "x")?;
    let y = restored.table_get(&restored.get_global("b"), "y")?;
    assert_eq!(x, y);
    Ok(())
}

#[test]
fn test_round_trip_cycles() -> anyhow::Result<()> {
    let mut env = Environment::with_prelude();
    let p = env.new_table();
    let q = env.new_table();
    env.table_set(&p, "next", q.clone())?;
    env.table_set(&q, "next", p.clone())?;
    env.table_set(&p, p.clone(), Value::Bool(true))?;
    env.set_global("P", p);

    let restored = round_trip(&env)?;
    assert!(env.equivalent_globals(&restored));

    let p = restored.get_global("P");
    let q = restored.table_get(&p, "next")?;
    assert_eq!(restored.table_get(&q, "next")?, p);
    Ok(())
}

#[test]
fn test_round_trip_metatables() -> anyhow::Result<()> {
    let mut env = Environment::with_prelude();
    let base = env.alloc_table(Table::new().with("hp", 5));
    let mt = env.alloc_table(Table::new().with("__index", base.clone()));
    let obj = env.new_table();
    env.set_metatable(&obj, &mt)?;
    env.set_global("Base", base);
    env.set_global("obj", obj);

    let restored = round_trip(&env)?;
    assert!(env.equivalent_globals(&restored));

    let obj = restored.get_global("obj");
    assert_eq!(restored.index(&obj, &Value::string("hp"))?, Value::Integer(5));
    Ok(())
}

#[test]
fn test_round_trip_closures() -> anyhow::Result<()> {
    let mut env = Environment::with_prelude();
    let counter = env.alloc_table(Table::new().with("count", 0));
    let inc = env.closure("|| state.count + 1", vec![("state".into(), counter.clone())])?;
    let f = env.closure("|| g()", vec![("g".into(), Value::Nil)])?;
    let g = env.closure("|| f()", vec![("f".into(), f.clone())])?;
    let f_id = f.object_id().unwrap();
    env.heap_mut().closure_mut(f_id)?.set_capture("g", g.clone());
    env.set_global("counter", counter);
    env.set_global("inc", inc);
    env.set_global("f", f);
    env.set_global("g", g);

    let restored = round_trip(&env)?;
    assert!(env.equivalent_globals(&restored));

    let f = restored.get_global("f");
    let g = restored.get_global("g");
    let closure = restored.heap().closure(f.object_id().unwrap())?;
    assert_eq!(closure.capture("g"), Some(&g));
    Ok(())
}

#[test]
fn test_round_trip_actors() -> anyhow::Result<()> {
    let mut env = Environment::with_prelude();
    let pal = env.new_table();
    let a = env.foreign(Actor::new("a", 3).at(0.25, -1.0).with_tags(&["x", "y"]));
    let b = env.foreign(
        Actor::new("b", 7)
            .with_target(a.clone())
            .with_friend(pal.clone()),
    );
    let a_id = a.object_id().unwrap();
    env.heap_mut()
        .foreign_mut(a_id)?
        .object
        .call_setter("set_target", &[b.clone()])
        .map_err(anyhow::Error::msg)?;
    env.set_global("a", a.clone());
    env.set_global("b", b);
    env.set_global("pal", pal);
    env.spawn(a);

    let restored = round_trip(&env)?;
    assert!(env.equivalent_globals(&restored));
    assert_eq!(restored.live_objects().len(), 1);
    Ok(())
}

#[test]
fn test_round_trip_roots() -> anyhow::Result<()> {
    let mut env = Environment::with_prelude();
    let tick = env.closure("|dt| dt * 2", vec![])?;
    env.on("tick", tick.clone());
    env.on("tock", tick);
    let sandbox = env.alloc_table(Table::new().with("print", env.get_global("print")));
    env.set_entry_env(Some(sandbox));

    let restored = round_trip(&env)?;
    assert!(env.equivalent_globals(&restored));
    assert_eq!(restored.callbacks()[0].1, restored.callbacks()[1].1);
    Ok(())
}

#[test]
fn test_round_trip_awkward_primitives() -> anyhow::Result<()> {
    let mut env = Environment::with_prelude();
    let t = env.alloc_table(
        Table::new()
            .with("nan", f64::NAN)
            .with("ninf", f64::NEG_INFINITY)
            .with("negzero", -0.0)
            .with("min", i64::MIN)
            .with("bytes", Value::string([0u8, 255, b'7', b'\\', b'"']))
            .with("end", 1)
            .with(TableKey::new(Value::Number(2.5)).unwrap(), "float key"),
    );
    env.set_global("t", t);

    let restored = round_trip(&env)?;
    assert!(env.equivalent_globals(&restored));
    Ok(())
}

#[test]
fn test_restored_environment_snapshots_the_same() -> anyhow::Result<()> {
    let mut env = Environment::with_prelude();
    let hero = env.foreign(Actor::new("hero", 2));
    let shared = env.new_table();
    let t = env.alloc_table(Table::new().with(1, shared.clone()).with(2, shared));
    env.set_global("hero", hero);
    env.set_global("t", t);

    let restored = round_trip(&env)?;
    assert_eq!(snapshot_text(&restored), snapshot_text(&env));
    Ok(())
}

#[test]
fn test_round_trip_global_shadowing_a_builtin() -> anyhow::Result<()> {
    let mut env = Environment::with_prelude();
    let print = env.get_global("print");
    env.set_global("print", Value::Integer(5));
    env.set_global("keep", print);

    let restored = round_trip(&env)?;
    assert!(env.equivalent_globals(&restored));

    let fixed = Value::Table(restored.fixed_table());
    assert_eq!(restored.get_global("keep"), restored.table_get(&fixed, "print")?);
    assert_eq!(restored.get_global("print"), Value::Integer(5));
    Ok(())
}

#[test]
fn test_round_trip_global_shadowing_a_module() -> anyhow::Result<()> {
    let mut env = Environment::with_prelude();
    let math = env.get_global("math");
    let floor = env.index(&math, &Value::string("floor"))?;
    let shadow = env.new_table();
    env.set_global("math", shadow);
    let t = env.alloc_table(Table::new().with("f", floor));
    env.set_global("t", t);
    let tick = env.closure("|dt| dt", vec![])?;
    env.on("tick", tick);

    let restored = round_trip(&env)?;
    assert!(env.equivalent_globals(&restored));

    let fixed = Value::Table(restored.fixed_table());
    let fixed_math = restored.table_get(&fixed, "math")?;
    let f = restored.table_get(&restored.get_global("t"), "f")?;
    assert_eq!(f, restored.table_get(&fixed_math, "floor")?);
    assert_ne!(restored.get_global("math"), fixed_math);
    Ok(())
}

#[test]
fn test_round_trip_shadowed_globals_name() -> anyhow::Result<()> {
    let mut env = Environment::with_prelude();
    env.set_global("_G", Value::Integer(1));
    let globals = Value::Table(env.globals_table());
    let holder = env.alloc_table(Table::new().with("env", globals));
    env.set_global("holder", holder);

    let restored = round_trip(&env)?;
    assert!(env.equivalent_globals(&restored));

    let inner = restored.table_get(&restored.get_global("holder"), "env")?;
    assert_eq!(inner, Value::Table(restored.globals_table()));
    assert_eq!(restored.get_global("_G"), Value::Integer(1));
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
// Loader Semantics
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_locals_do_not_leak_into_globals() -> anyhow::Result<()> {
    let env = restore_text("local __ref1 = {}\nx = __ref1\n")?;
    assert!(matches!(env.get_global("x"), Value::Table(_)));
    assert_eq!(env.get_global("__ref1"), Value::Nil);
    Ok(())
}

#[test]
fn test_env_override_sets_entry_env() -> anyhow::Result<()> {
    let env = restore_text("_ENV = _G\n")?;
    assert_eq!(env.entry_env(), Some(&Value::Table(env.globals_table())));
    Ok(())
}

#[test]
fn test_global_index_assignment() -> anyhow::Result<()> {
    let env = restore_text("_G[\"a b\"] = 1\n_G[3] = true\n")?;
    let globals = Value::Table(env.globals_table());
    assert_eq!(env.table_get(&globals, "a b")?, Value::Integer(1));
    assert_eq!(env.table_get(&globals, 3)?, Value::Bool(true));
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_undefined_name() {
    assert_eq!(
        restore_text("x = nope\n").unwrap_err(),
        RestoreError::UndefinedName("nope".into())
    );
}

#[test]
fn test_unknown_constructor() {
    assert_eq!(
        restore_text("x = Ghost{}\n").unwrap_err(),
        RestoreError::UnknownConstructor("Ghost".into())
    );
}

#[test]
fn test_unknown_function() {
    assert!(matches!(
        restore_text("launch(1)\n"),
        Err(RestoreError::InvalidCall(_))
    ));
}

#[test]
fn test_field_on_primitive() {
    assert_eq!(
        restore_text("x = 1\nx.y = 2\n").unwrap_err(),
        RestoreError::NotIndexable("integer")
    );
}

#[test]
fn test_rejected_setter() {
    let err = restore_text(
        "hero = Actor{name = \"hero\", hp = 1, pos = {x = 0.0, y = 0.0}}\nhero:fly()\n",
    )
    .unwrap_err();
    assert_eq!(err, RestoreError::Foreign("Actor has no setter `fly`".into()));
}

#[test]
fn test_factory_error() {
    assert_eq!(
        restore_text("hero = Actor{hp = 1}\n").unwrap_err(),
        RestoreError::Foreign("missing name".into())
    );
}

#[test]
fn test_bad_closure_source() {
    assert!(matches!(
        restore_text("local f = closure(\"not a closure\", {})\n"),
        Err(RestoreError::Environment(EnvironmentError::InvalidClosure { .. }))
    ));
}

#[test]
fn test_upvalue_for_missing_capture() {
    assert!(matches!(
        restore_text("local f = closure(\"|| 1\", {})\nsetupvalue(f, \"x\", 1)\n"),
        Err(RestoreError::InvalidCall(_))
    ));
}
