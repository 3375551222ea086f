use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::executor::aggregates::{default_aggregates, AggregateRegistry};

/// Setting controlling whether aggregates over an empty set yield NULL.
pub const SETTING_AGGREGATE_FUNCTIONS_NULL_FOR_EMPTY: &str = "aggregate_functions_null_for_empty";
/// Setting controlling NULL handling inside `in(...)` membership tests.
pub const SETTING_TRANSFORM_NULL_IN: &str = "transform_null_in";
/// Upper bound on the rows of one block produced by the executor.
pub const SETTING_MAX_BLOCK_SIZE: &str = "max_block_size";

const DEFAULT_MAX_BLOCK_SIZE: usize = 65536;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("setting {name} is constrained and cannot be changed in this context")]
pub struct ConstrainedSetting {
    pub name: String,
}

/// Per-call execution context: a settings map with optional constraints and
/// the aggregate-function registry queries resolve against.
///
/// Contexts are cheap to copy; every internal query runs on its own copy so
/// callers never observe setting changes.
#[derive(Clone)]
pub struct ExecutionContext {
    settings: HashMap<String, Value>,
    constrained: HashSet<String>,
    aggregates: Arc<AggregateRegistry>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        let mut settings = HashMap::new();
        settings.insert(SETTING_AGGREGATE_FUNCTIONS_NULL_FOR_EMPTY.to_string(), Value::from(0));
        settings.insert(SETTING_TRANSFORM_NULL_IN.to_string(), Value::from(0));
        settings.insert(SETTING_MAX_BLOCK_SIZE.to_string(), Value::from(DEFAULT_MAX_BLOCK_SIZE));
        Self {
            settings,
            constrained: HashSet::new(),
            aggregates: default_aggregates(),
        }
    }

    /// Explicit copy, kept alongside `Clone` to mirror how call sites read:
    /// every execution starts from a copied context.
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Copy for an internally issued query; setting constraints do not apply
    /// to queries the engine runs on its own behalf.
    pub fn copy_for_internal_query(&self) -> Self {
        let mut copy = self.clone();
        copy.constrained.clear();
        copy
    }

    pub fn set_setting(&mut self, name: &str, value: Value) -> Result<(), ConstrainedSetting> {
        if self.constrained.contains(name) {
            return Err(ConstrainedSetting { name: name.to_string() });
        }
        self.settings.insert(name.to_string(), value);
        Ok(())
    }

    /// Forbid further changes to `name` through this context.
    pub fn add_constraint(&mut self, name: &str) {
        self.constrained.insert(name.to_string());
    }

    pub fn setting_bool(&self, name: &str) -> bool {
        match self.settings.get(name) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_i64().map(|i| i != 0).unwrap_or(false),
            _ => false,
        }
    }

    pub fn setting_usize(&self, name: &str) -> usize {
        match self.settings.get(name) {
            Some(Value::Number(n)) => n.as_u64().unwrap_or(0) as usize,
            _ => 0,
        }
    }

    pub fn aggregates(&self) -> &AggregateRegistry {
        &self.aggregates
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("settings", &self.settings)
            .field("constrained", &self.constrained)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_are_disabled() {
        let ctx = ExecutionContext::new();
        assert!(!ctx.setting_bool(SETTING_AGGREGATE_FUNCTIONS_NULL_FOR_EMPTY));
        assert!(!ctx.setting_bool(SETTING_TRANSFORM_NULL_IN));
        assert_eq!(ctx.setting_usize(SETTING_MAX_BLOCK_SIZE), DEFAULT_MAX_BLOCK_SIZE);
    }

    #[test]
    fn constrained_setting_rejects_change() {
        let mut ctx = ExecutionContext::new();
        ctx.add_constraint(SETTING_TRANSFORM_NULL_IN);
        assert!(ctx.set_setting(SETTING_TRANSFORM_NULL_IN, json!(1)).is_err());

        // an internal copy drops the constraint
        let mut internal = ctx.copy_for_internal_query();
        assert!(internal.set_setting(SETTING_TRANSFORM_NULL_IN, json!(1)).is_ok());
        assert!(internal.setting_bool(SETTING_TRANSFORM_NULL_IN));

        // the original context is untouched
        assert!(!ctx.setting_bool(SETTING_TRANSFORM_NULL_IN));
    }

    #[test]
    fn copies_are_independent() {
        let ctx = ExecutionContext::new();
        let mut copy = ctx.copy();
        copy.set_setting(SETTING_MAX_BLOCK_SIZE, json!(8)).unwrap();
        assert_eq!(copy.setting_usize(SETTING_MAX_BLOCK_SIZE), 8);
        assert_eq!(ctx.setting_usize(SETTING_MAX_BLOCK_SIZE), DEFAULT_MAX_BLOCK_SIZE);
    }
}
