use serde_json::Value;

use crate::executor::aggregates::{Accumulator, AggregateImpl};
use crate::parser::analyzer::AnalyzerError;
use crate::table::ColumnType;

pub struct MinImpl;
pub struct MaxImpl;

fn extremum_result_type(
    name: &str,
    args: &[(ColumnType, bool)],
) -> Result<(ColumnType, bool), AnalyzerError> {
    match args {
        // nullable: the empty set has no extremum
        [(ty, _)] => Ok((*ty, true)),
        _ => Err(AnalyzerError::FunctionArgMismatch {
            name: name.to_string(),
            expected: format!("{name}(expr)"),
        }),
    }
}

impl AggregateImpl for MinImpl {
    fn name(&self) -> &'static str {
        "min"
    }
    fn result_type(
        &self,
        args: &[(ColumnType, bool)],
    ) -> Result<(ColumnType, bool), AnalyzerError> {
        extremum_result_type("min", args)
    }
    fn create_accumulator(&self) -> Box<dyn Accumulator> {
        Box::new(ExtremaAcc::new_min())
    }
}

impl AggregateImpl for MaxImpl {
    fn name(&self) -> &'static str {
        "max"
    }
    fn result_type(
        &self,
        args: &[(ColumnType, bool)],
    ) -> Result<(ColumnType, bool), AnalyzerError> {
        extremum_result_type("max", args)
    }
    fn create_accumulator(&self) -> Box<dyn Accumulator> {
        Box::new(ExtremaAcc::new_max())
    }
}

enum Mode {
    Min,
    Max,
}

struct ExtremaAcc {
    mode: Mode,
    current: Option<Value>,
}

impl ExtremaAcc {
    fn new_min() -> Self {
        Self { mode: Mode::Min, current: None }
    }
    fn new_max() -> Self {
        Self { mode: Mode::Max, current: None }
    }

    /// Whether `b` should replace the current extremum `a`.
    fn better(mode: &Mode, a: &Value, b: &Value) -> Result<bool, AnalyzerError> {
        use Value::*;
        let ord = match (a, b) {
            (Null, _) | (_, Null) => return Ok(false), // nulls ignored by caller
            (Bool(x), Bool(y)) => x.cmp(y),
            (Number(x), Number(y)) => {
                match (x.as_i64(), y.as_i64()) {
                    (Some(ix), Some(iy)) => ix.cmp(&iy),
                    _ => {
                        let fx = x.as_f64().ok_or_else(|| {
                            AnalyzerError::Other("min/max got non numeric number".into())
                        })?;
                        let fy = y.as_f64().ok_or_else(|| {
                            AnalyzerError::Other("min/max got non numeric number".into())
                        })?;
                        fx.partial_cmp(&fy)
                            .ok_or_else(|| AnalyzerError::Other("NaN in min/max".into()))?
                    }
                }
            }
            // ISO date strings compare correctly here
            (String(x), String(y)) => x.cmp(y),
            (Array(_), _) | (Object(_), _) | (_, Array(_)) | (_, Object(_)) => {
                return Err(AnalyzerError::Other("min/max unsupported type".into()))
            }
            _ => return Err(AnalyzerError::Other("min/max mixed types".into())),
        };
        Ok(match mode {
            Mode::Min => ord.is_gt(),
            Mode::Max => ord.is_lt(),
        })
    }
}

impl Accumulator for ExtremaAcc {
    fn update(&mut self, args: &[Value]) -> Result<(), AnalyzerError> {
        let [v] = args else {
            return Err(AnalyzerError::FunctionArgMismatch {
                name: "min/max".into(),
                expected: "min(expr) or max(expr)".into(),
            });
        };
        if matches!(v, Value::Null) {
            return Ok(());
        }
        match &mut self.current {
            None => self.current = Some(v.clone()),
            Some(cur) => {
                if Self::better(&self.mode, cur, v)? {
                    *cur = v.clone();
                }
            }
        }
        Ok(())
    }

    fn finalize(&self) -> Value {
        self.current.clone().unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_extrema() {
        let mut min = ExtremaAcc::new_min();
        let mut max = ExtremaAcc::new_max();
        for v in [json!(5), json!(2), Value::Null, json!(9)] {
            min.update(&[v.clone()]).unwrap();
            max.update(&[v]).unwrap();
        }
        assert_eq!(min.finalize(), json!(2));
        assert_eq!(max.finalize(), json!(9));
    }

    #[test]
    fn empty_set_finalizes_to_null() {
        let min = ExtremaAcc::new_min();
        assert_eq!(min.finalize(), Value::Null);
    }

    #[test]
    fn mixed_numeric_kinds_compare_as_floats() {
        let mut max = ExtremaAcc::new_max();
        max.update(&[json!(1)]).unwrap();
        max.update(&[json!(2.5)]).unwrap();
        assert_eq!(max.finalize(), json!(2.5));
    }
}
