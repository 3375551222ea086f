use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde_json::Value;

use crate::parser::analyzer::AnalyzerError;
use crate::table::ColumnType;

pub mod count;
pub use count::*;

pub mod minmax;
pub use minmax::*;

pub mod sum;
pub use sum::*;

pub mod avg;
pub use avg::*;

/// The per-group state.
/// The executor will:
///   1) evaluate the function's arguments per row into serde_json::Value
///   2) call `update(&mut self, &args)` (args.len() == call arity)
///   3) after all rows in the group, call `finalize()`
pub trait Accumulator: Send {
    /// Update the running state with the evaluated arguments of this row.
    fn update(&mut self, args: &[Value]) -> Result<(), AnalyzerError>;

    /// Produce the final result as a JSON value.
    fn finalize(&self) -> Value;
}

/// Per-aggregate metadata + factory.
/// One instance is registered globally per function name.
/// It is stateless and thread-safe to share.
pub trait AggregateImpl: Send + Sync {
    /// Canonical lowercase function name ("count", "sum", ...).
    fn name(&self) -> &'static str;

    /// Type inference: given the inferred (type, nullable) of each argument,
    /// return the (type, nullable) of the result.
    fn result_type(&self, args: &[(ColumnType, bool)])
        -> Result<(ColumnType, bool), AnalyzerError>;

    /// Create a fresh accumulator instance for one group.
    fn create_accumulator(&self) -> Box<dyn Accumulator>;
}

/// Case-insensitive registry of aggregates.
#[derive(Default)]
pub struct AggregateRegistry {
    by_name: HashMap<String, Arc<dyn AggregateImpl>>,
}

impl AggregateRegistry {
    pub fn new() -> Self {
        Self { by_name: HashMap::new() }
    }

    pub fn register<I: AggregateImpl + 'static>(&mut self, impl_: I) {
        self.by_name.insert(impl_.name().to_string(), Arc::new(impl_));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn AggregateImpl>> {
        self.by_name.get(&name.to_ascii_lowercase()).cloned()
    }

    pub fn list(&self) -> Vec<String> {
        let mut v: Vec<_> = self.by_name.keys().cloned().collect();
        v.sort();
        v
    }

    pub fn default_aggregate_registry() -> Self {
        let mut registry = Self::new();
        registry.register(CountImpl);
        registry.register(SumImpl);
        registry.register(AvgImpl);
        registry.register(MinImpl);
        registry.register(MaxImpl);
        registry
    }
}

static DEFAULT_AGGREGATES: Lazy<Arc<AggregateRegistry>> =
    Lazy::new(|| Arc::new(AggregateRegistry::default_aggregate_registry()));

/// Shared default registry; one instance serves every context.
pub fn default_aggregates() -> Arc<AggregateRegistry> {
    Arc::clone(&DEFAULT_AGGREGATES)
}
