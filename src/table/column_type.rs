use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Coarse-grained classification of the scalar values a block column can hold.
///
/// Blocks store `serde_json::Value` cells; this enum captures the primitive
/// kind used by schema description, type inference and promotion. Nested
/// values (arrays/objects) are not valid column cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    /// Only nulls observed so far
    Null,
    /// Boolean
    Bool,
    /// Integer number
    Int,
    /// Floating-point number
    Float,
    /// String (dates are ISO-8601 strings; lexicographic order is value order)
    String,
}

impl ColumnType {
    /// Classify a scalar `Value`. Returns `None` for arrays and objects,
    /// which cannot appear in a column.
    pub fn of_value(v: &Value) -> Option<ColumnType> {
        match v {
            Value::Null => Some(ColumnType::Null),
            Value::Bool(_) => Some(ColumnType::Bool),
            Value::Number(n) => {
                if n.is_i64() || n.is_u64() {
                    Some(ColumnType::Int)
                } else {
                    Some(ColumnType::Float)
                }
            }
            Value::String(_) => Some(ColumnType::String),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Promote two primitive types to a common representative.
    ///
    /// Numeric types promote `Int` + `Float` -> `Float`. `Null` yields to the
    /// other side (nullability is tracked separately); otherwise the first
    /// seen type wins.
    pub fn promote(a: ColumnType, b: ColumnType) -> ColumnType {
        use ColumnType::*;
        if a == b {
            return a;
        }
        match (a, b) {
            (Int, Float) | (Float, Int) => Float,
            (Null, y) => y,
            (x, _) => x,
        }
    }
}
