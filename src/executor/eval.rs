use serde_json::{Map, Value};

use crate::parser::ast::ScalarExpr;
use crate::table::{ExecutionContext, SETTING_TRANSFORM_NULL_IN};

/// Settings that change scalar evaluation semantics.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvalSettings {
    /// When set, NULL participates in `in(...)` membership tests instead of
    /// poisoning them.
    pub transform_null_in: bool,
}

impl EvalSettings {
    pub fn from_context(context: &ExecutionContext) -> Self {
        Self { transform_null_in: context.setting_bool(SETTING_TRANSFORM_NULL_IN) }
    }
}

/// Scalar evaluation over one row.
///
/// Missing columns evaluate to NULL; scalar functions follow SQL three-valued
/// logic, so a NULL input generally yields a NULL output. Unknown functions
/// also yield NULL, the analyzer rejects them before execution.
pub struct Eval;

impl Eval {
    pub fn eval_scalar(
        expr: &ScalarExpr,
        row: &Map<String, Value>,
        settings: &EvalSettings,
    ) -> Value {
        match expr {
            ScalarExpr::Literal(l) => l.to_value(),
            ScalarExpr::Column(name) => row.get(name).cloned().unwrap_or(Value::Null),
            ScalarExpr::Function(f) => {
                let args: Vec<Value> = f
                    .args
                    .iter()
                    .map(|a| Self::eval_scalar(a, row, settings))
                    .collect();
                match f.name.as_str() {
                    "equals" => Self::equals(&args),
                    "modulo" | "moduloLegacy" => Self::modulo(&args),
                    "tuple" => Value::Array(args),
                    "in" => Self::membership(&args, settings),
                    _ => Value::Null,
                }
            }
        }
    }

    pub fn is_truthy(value: &Value) -> bool {
        match value {
            Value::Bool(b) => *b,
            Value::Number(n) => {
                n.as_i64().map(|i| i != 0).unwrap_or_else(|| {
                    n.as_f64().map(|f| f != 0.0).unwrap_or(false)
                })
            }
            _ => false,
        }
    }

    fn equals(args: &[Value]) -> Value {
        let [a, b] = args else { return Value::Null };
        match Self::value_equal(a, b) {
            Some(eq) => Value::Bool(eq),
            None => Value::Null,
        }
    }

    /// NULL-aware equality; `None` means the comparison involves NULL.
    fn value_equal(a: &Value, b: &Value) -> Option<bool> {
        use Value::*;
        match (a, b) {
            (Null, _) | (_, Null) => None,
            (Number(x), Number(y)) => Some(match (x.as_i64(), y.as_i64()) {
                (Some(ix), Some(iy)) => ix == iy,
                _ => x.as_f64() == y.as_f64(),
            }),
            _ => Some(a == b),
        }
    }

    fn modulo(args: &[Value]) -> Value {
        let [a, b] = args else { return Value::Null };
        let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) else {
            return Value::Null;
        };
        if y == 0 {
            return Value::Null;
        }
        Value::from(x % y)
    }

    fn membership(args: &[Value], settings: &EvalSettings) -> Value {
        let [needle, haystack] = args else { return Value::Null };
        let set: Vec<&Value> = match haystack {
            Value::Array(items) => items.iter().collect(),
            single => vec![single],
        };
        if matches!(needle, Value::Null) {
            if settings.transform_null_in {
                return Value::Bool(set.iter().any(|v| matches!(v, Value::Null)));
            }
            return Value::Null;
        }
        let mut saw_null = false;
        for candidate in set {
            match Self::value_equal(needle, candidate) {
                Some(true) => return Value::Bool(true),
                Some(false) => {}
                None => saw_null = true,
            }
        }
        if saw_null && !settings.transform_null_in {
            Value::Null
        } else {
            Value::Bool(false)
        }
    }
}
