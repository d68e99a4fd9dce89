//! Property tests over randomly wired object graphs
//!
//! Each case builds an environment from a [`Plan`]: tables, closures, actors
//! and a builtin, joined by field, key, metatable, capture, target and friend
//! edges. Globals may hide fixed names. Every snapshot must restore to an
//! equivalent environment and define each name before it is read.

mod common;

use std::collections::HashSet;

use common::{registry, Actor};
use keepsake::*;
use proptest::prelude::*;

const FIELD_NAMES: [&str; 4] = ["a", "b", "c", "next"];
const GLOBAL_NAMES: [&str; 6] = ["g0", "g1", "g2", "g3", "print", "math"];
const CAPTURES: [&str; 2] = ["c0", "c1"];

#[derive(Debug, Clone)]
enum Node {
    Table,
    Closure,
    Actor(i64),
    /// `math.floor` from the fixed namespace
    Floor,
}

#[derive(Debug, Clone)]
enum Key {
    Name(usize),
    Position(i64),
    Node(usize),
}

/// Node indices are taken modulo the number of nodes of the right kind.
#[derive(Debug, Clone)]
enum Edge {
    Field { table: usize, key: Key, value: usize },
    Metatable { table: usize, metatable: usize },
    Capture { closure: usize, slot: usize, value: usize },
    Target { actor: usize, value: usize },
    Friend { actor: usize, value: usize },
}

#[derive(Debug, Clone)]
struct Plan {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    globals: Vec<(usize, usize)>,
    score: Option<i64>,
    spawn: Option<usize>,
    callback: Option<usize>,
}

fn node() -> impl Strategy<Value = Node> {
    prop_oneof![
        3 => Just(Node::Table),
        2 => Just(Node::Closure),
        2 => (0i64..100).prop_map(Node::Actor),
        1 => Just(Node::Floor),
    ]
}

fn key() -> impl Strategy<Value = Key> {
    prop_oneof![
        2 => (0..FIELD_NAMES.len()).prop_map(Key::Name),
        1 => (1i64..4).prop_map(Key::Position),
        1 => any::<usize>().prop_map(Key::Node),
    ]
}

fn edge() -> impl Strategy<Value = Edge> {
    prop_oneof![
        4 => (any::<usize>(), key(), any::<usize>())
            .prop_map(|(table, key, value)| Edge::Field { table, key, value }),
        1 => (any::<usize>(), any::<usize>())
            .prop_map(|(table, metatable)| Edge::Metatable { table, metatable }),
        2 => (any::<usize>(), 0..CAPTURES.len(), any::<usize>())
            .prop_map(|(closure, slot, value)| Edge::Capture { closure, slot, value }),
        1 => (any::<usize>(), any::<usize>())
            .prop_map(|(actor, value)| Edge::Target { actor, value }),
        1 => (any::<usize>(), any::<usize>())
            .prop_map(|(actor, value)| Edge::Friend { actor, value }),
    ]
}

fn plan() -> impl Strategy<Value = Plan> {
    (
        proptest::collection::vec(node(), 1..8),
        proptest::collection::vec(edge(), 0..24),
        proptest::collection::vec((0..GLOBAL_NAMES.len(), any::<usize>()), 1..5),
        proptest::option::of(-5i64..5),
        proptest::option::of(any::<usize>()),
        proptest::option::of(any::<usize>()),
    )
        .prop_map(|(nodes, edges, globals, score, spawn, callback)| Plan {
            nodes,
            edges,
            globals,
            score,
            spawn,
            callback,
        })
}

fn pick(candidates: &[usize], raw: usize) -> Option<usize> {
    if candidates.is_empty() {
        None
    } else {
        Some(candidates[raw % candidates.len()])
    }
}

fn build(plan: &Plan) -> anyhow::Result<Environment> {
    let mut env = Environment::with_prelude();
    let fixed = Value::Table(env.fixed_table());
    let math = env.table_get(&fixed, "math")?;
    let floor = env.table_get(&math, "floor")?;

    let mut values = Vec::with_capacity(plan.nodes.len());
    for (i, node) in plan.nodes.iter().enumerate() {
        let value = match node {
            Node::Table => env.new_table(),
            Node::Closure => env.closure(
                "|| (c0, c1)",
                CAPTURES.iter().map(|c| (c.to_string(), Value::Nil)).collect(),
            )?,
            Node::Actor(hp) => env.foreign(Actor::new(&format!("actor{}", i), *hp)),
            Node::Floor => floor.clone(),
        };
        values.push(value);
    }

    let kind = |matches: fn(&Node) -> bool| -> Vec<usize> {
        (0..plan.nodes.len()).filter(|&i| matches(&plan.nodes[i])).collect()
    };
    let tables = kind(|n| matches!(n, Node::Table));
    let closures = kind(|n| matches!(n, Node::Closure));
    let actors = kind(|n| matches!(n, Node::Actor(_)));
    let any_node = |raw: usize| values[raw % values.len()].clone();

    for edge in &plan.edges {
        match edge {
            Edge::Field { table, key, value } => {
                let Some(table) = pick(&tables, *table) else { continue };
                let key = match key {
                    Key::Name(i) => Value::string(FIELD_NAMES[*i]),
                    Key::Position(n) => Value::Integer(*n),
                    Key::Node(raw) => any_node(*raw),
                };
                env.table_set(&values[table], key, any_node(*value))?;
            }
            Edge::Metatable { table, metatable } => {
                let (Some(table), Some(metatable)) = (pick(&tables, *table), pick(&tables, *metatable))
                else {
                    continue;
                };
                env.set_metatable(&values[table], &values[metatable])?;
            }
            Edge::Capture { closure, slot, value } => {
                let Some(closure) = pick(&closures, *closure) else { continue };
                let id = values[closure].object_id().unwrap();
                let value = any_node(*value);
                env.heap_mut().closure_mut(id)?.set_capture(CAPTURES[*slot], value);
            }
            Edge::Target { actor, value } | Edge::Friend { actor, value } => {
                let Some(actor) = pick(&actors, *actor) else { continue };
                let setter = if matches!(edge, Edge::Target { .. }) {
                    "set_target"
                } else {
                    "add_friend"
                };
                let id = values[actor].object_id().unwrap();
                let value = any_node(*value);
                env.heap_mut()
                    .foreign_mut(id)?
                    .object
                    .call_setter(setter, &[value])
                    .map_err(anyhow::Error::msg)?;
            }
        }
    }

    for (name, node) in &plan.globals {
        env.set_global(GLOBAL_NAMES[*name], any_node(*node));
    }
    if let Some(score) = plan.score {
        env.set_global("score", Value::Integer(score));
    }
    if let Some(actor) = plan.spawn.and_then(|raw| pick(&actors, raw)) {
        env.spawn(values[actor].clone());
    }
    if let Some(closure) = plan.callback.and_then(|raw| pick(&closures, raw)) {
        env.on("tick", values[closure].clone());
    }
    Ok(env)
}

/// Identifier-like words of a line, ignoring string literals.
fn words(line: &str) -> Vec<&str> {
    let mut words = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    let mut start = None;
    for (i, c) in line.char_indices() {
        if in_string {
            match (escaped, c) {
                (true, _) => escaped = false,
                (false, '\\') => escaped = true,
                (false, '"') => in_string = false,
                _ => {}
            }
            continue;
        }
        let word_char = c.is_ascii_alphanumeric() || c == '_';
        match (start, word_char) {
            (None, true) => start = Some(i),
            (Some(s), false) => {
                words.push(&line[s..i]);
                start = None;
            }
            _ => {}
        }
        if c == '"' {
            in_string = true;
        }
    }
    if let Some(s) = start {
        words.push(&line[s..]);
    }
    words
}

/// Every temporary and every plain global is first seen on its defining line.
fn assert_defined_before_use(text: &str) -> std::result::Result<(), TestCaseError> {
    let config = SnapshotConfig::default();
    let mut seen = HashSet::new();
    for line in text.lines() {
        for word in words(line) {
            let tracked = config.is_temporary(word) || GLOBAL_NAMES[..4].contains(&word);
            if !tracked || !seen.insert(word.to_string()) {
                continue;
            }
            let defines = line.starts_with(&format!("local {} = ", word))
                || line.starts_with(&format!("{} = ", word));
            prop_assert!(defines, "`{}` used before definition in `{}`\n{}", word, line, text);
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(96))]

    #[test]
    fn prop_random_graphs_round_trip(plan in plan()) {
        let env = build(&plan).expect("building the graph failed");
        let config = SnapshotConfig::default();
        let text = snapshot(&env, &config).expect("snapshot failed").to_string();
        assert_defined_before_use(&text)?;

        let mut restored = Environment::with_prelude();
        let result = restore(&text, &mut restored, &registry(), &config);
        prop_assert!(result.is_ok(), "restore failed: {:?}\n{}", result, text);
        prop_assert!(env.equivalent_globals(&restored), "not equivalent:\n{}", text);
    }

    #[test]
    fn prop_restored_graphs_snapshot_the_same(plan in plan()) {
        let env = build(&plan).expect("building the graph failed");
        let config = SnapshotConfig::default();
        let text = snapshot(&env, &config).expect("snapshot failed").to_string();

        let mut restored = Environment::with_prelude();
        restore(&text, &mut restored, &registry(), &config).expect("restore failed");
        let again = snapshot(&restored, &config).expect("snapshot failed").to_string();
        prop_assert!(env.equivalent_globals(&restored));
        let mut reloaded = Environment::with_prelude();
        restore(&again, &mut reloaded, &registry(), &config).expect("second restore failed");
        prop_assert!(restored.equivalent_globals(&reloaded), "{}\n---\n{}", text, again);
    }
}
