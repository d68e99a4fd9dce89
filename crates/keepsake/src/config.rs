//! Snapshot configuration

use serde::{Deserialize, Serialize};

/// Names and switches controlling the generated program.
///
/// Every intrinsic the output calls is configurable so the text can target
/// whatever loader the host engine provides. The defaults match
/// [`restore`](crate::restore::restore).
///
/// Can be loaded from any serde format; missing fields take their default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Prefix for temporary names (`__ref1`, `__ref2`, ...)
    pub temp_prefix: String,

    /// Function building a closure from source and captures
    pub closure_constructor: String,

    /// Function attaching a metatable
    pub metatable_setter: String,

    /// Function patching a closure capture after construction
    pub upvalue_setter: String,

    /// Name of the writable global table (for non-identifier global keys)
    pub globals_name: String,

    /// Target of the entry-environment override statement
    pub env_override: String,

    /// Function re-adding a live object to the world
    pub spawn_function: String,

    /// Function re-registering an event callback
    pub callback_function: String,

    /// Warn about plain tables found in the fixed namespace
    pub warn_mutable_globals: bool,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            temp_prefix: "__ref".to_string(),
            closure_constructor: "closure".to_string(),
            metatable_setter: "setmetatable".to_string(),
            upvalue_setter: "setupvalue".to_string(),
            globals_name: "_G".to_string(),
            env_override: "_ENV".to_string(),
            spawn_function: "spawn".to_string(),
            callback_function: "on".to_string(),
            warn_mutable_globals: true,
        }
    }
}

impl SnapshotConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different temporary-name prefix.
    pub fn with_temp_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.temp_prefix = prefix.into();
        self
    }

    /// Use a different spawn function for live objects.
    pub fn with_spawn_function(mut self, name: impl Into<String>) -> Self {
        self.spawn_function = name.into();
        self
    }

    /// Use a different callback registration function.
    pub fn with_callback_function(mut self, name: impl Into<String>) -> Self {
        self.callback_function = name.into();
        self
    }

    /// Silence (or enable) the mutable-global warning.
    pub fn with_mutable_global_warnings(mut self, enabled: bool) -> Self {
        self.warn_mutable_globals = enabled;
        self
    }

    /// Check if a name belongs to the temporary namespace.
    pub fn is_temporary(&self, name: &str) -> bool {
        name.strip_prefix(self.temp_prefix.as_str())
            .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
    }

    /// Check if a global of this name would collide with the output's own
    /// names (temporaries and intrinsics).
    pub fn is_reserved(&self, name: &str) -> bool {
        self.is_temporary(name)
            || [
                &self.closure_constructor,
                &self.metatable_setter,
                &self.upvalue_setter,
                &self.globals_name,
                &self.env_override,
                &self.spawn_function,
                &self.callback_function,
            ]
            .iter()
            .any(|reserved| reserved.as_str() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_temporary() {
        let config = SnapshotConfig::default();
        assert!(config.is_temporary("__ref12"));
        assert!(!config.is_temporary("__ref"));
        assert!(!config.is_temporary("__refx"));
        assert!(!config.is_temporary("player"));
    }

    #[test]
    fn test_intrinsics_are_reserved() {
        let config = SnapshotConfig::default();
        assert!(config.is_reserved("spawn"));
        assert!(config.is_reserved("_G"));
        assert!(config.is_reserved("__ref3"));
        assert!(!config.is_reserved("spawner"));
    }

    #[test]
    fn test_builder() {
        let config = SnapshotConfig::new()
            .with_temp_prefix("_t")
            .with_mutable_global_warnings(false);
        assert_eq!(config.temp_prefix, "_t");
        assert!(!config.warn_mutable_globals);
    }
}
