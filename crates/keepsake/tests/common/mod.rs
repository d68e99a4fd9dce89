//! Shared fixtures: foreign test types and round-trip helpers
#![allow(dead_code)]

use keepsake::*;

/// A scripted actor: inline scalars, a `pos` subtable, a tag list, a member
/// reference and a list of friends replayed through a setter.
#[derive(Debug, Clone, Default)]
pub struct Actor {
    pub name: String,
    pub hp: i64,
    pub x: f64,
    pub y: f64,
    pub tags: Vec<String>,
    pub target: Value,
    pub friends: Vec<Value>,
}

impl Actor {
    pub fn new(name: &str, hp: i64) -> Self {
        Self {
            name: name.to_string(),
            hp,
            ..Self::default()
        }
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_target(mut self, target: Value) -> Self {
        self.target = target;
        self
    }

    pub fn with_friend(mut self, friend: Value) -> Self {
        self.friends.push(friend);
        self
    }
}

impl ForeignObject for Actor {
    fn constructor(&self) -> &str {
        "Actor"
    }

    fn describe(&self, d: &mut dyn Describer) -> std::result::Result<(), SnapshotError> {
        d.inline(None, "name", &Value::string(&self.name))?;
        d.inline(None, "hp", &Value::Integer(self.hp))?;
        d.inline(Some("pos"), "x", &Value::Number(self.x))?;
        d.inline(Some("pos"), "y", &Value::Number(self.y))?;
        if !self.tags.is_empty() {
            let tags: Vec<Value> = self.tags.iter().map(Value::string).collect();
            d.inline_list(None, "tags", &tags)?;
        }
        if !self.target.is_nil() {
            d.member(None, "target", "set_target", &self.target)?;
        }
        for friend in &self.friends {
            d.setter("add_friend", std::slice::from_ref(friend))?;
        }
        Ok(())
    }

    fn call_setter(&mut self, name: &str, args: &[Value]) -> std::result::Result<(), String> {
        match (name, args) {
            ("set_target", [target]) => {
                self.target = target.clone();
                Ok(())
            }
            ("add_friend", [friend]) => {
                self.friends.push(friend.clone());
                Ok(())
            }
            _ => Err(format!("Actor has no setter `{}`", name)),
        }
    }
}

fn build_actor(env: &Environment, fields: &Table) -> std::result::Result<Box<dyn ForeignObject>, String> {
    let name = fields
        .get_name("name")
        .as_str()
        .ok_or("missing name")?
        .to_string();
    let hp = fields.get_name("hp").as_integer().ok_or("missing hp")?;

    let pos = fields.get_name("pos");
    let coord = |key: &str| -> std::result::Result<f64, String> {
        env.table_get(&pos, key)
            .map_err(|e| e.to_string())?
            .as_number()
            .ok_or_else(|| format!("missing pos.{}", key))
    };
    let (x, y) = (coord("x")?, coord("y")?);

    let mut tags = Vec::new();
    if let Some(id) = fields.get_name("tags").as_table() {
        let list = env.heap().table(id).map_err(|e| e.to_string())?;
        for (_, tag) in list.iter() {
            tags.push(tag.as_str().ok_or("tags must be strings")?.to_string());
        }
    }

    Ok(Box::new(Actor {
        name,
        hp,
        x,
        y,
        tags,
        target: fields.get_name("target"),
        friends: Vec::new(),
    }))
}

/// A foreign object that breaks the descriptor protocol.
#[derive(Debug)]
pub enum Broken {
    /// Reports no constructor tag
    NoTag,
    /// Passes a heap value to `inline`
    InlineTable(Value),
    /// Registers a member without a setter name
    NoSetter(Value),
}

impl ForeignObject for Broken {
    fn constructor(&self) -> &str {
        match self {
            Broken::NoTag => "",
            _ => "Broken",
        }
    }

    fn describe(&self, d: &mut dyn Describer) -> std::result::Result<(), SnapshotError> {
        match self {
            Broken::NoTag => Ok(()),
            Broken::InlineTable(value) => d.inline(None, "bad", value),
            Broken::NoSetter(value) => d.member(None, "child", "", value),
        }
    }
}

/// Registry knowing how to rebuild [`Actor`]s.
pub fn registry() -> ForeignRegistry {
    ForeignRegistry::new().with("Actor", build_actor)
}

/// Snapshot `env` with the default configuration and return the text.
pub fn snapshot_text(env: &Environment) -> String {
    snapshot(env, &SnapshotConfig::default())
        .expect("snapshot failed")
        .to_string()
}

/// Snapshot `env`, restore into a fresh prelude environment, and return it.
pub fn round_trip(env: &Environment) -> anyhow::Result<Environment> {
    let config = SnapshotConfig::default();
    let text = snapshot(env, &config)?.to_string();
    let mut restored = Environment::with_prelude();
    restore(&text, &mut restored, &registry(), &config)?;
    Ok(restored)
}
