use serde_json::Value;

use crate::executor::aggregates::{Accumulator, AggregateImpl};
use crate::parser::analyzer::AnalyzerError;
use crate::table::ColumnType;

pub struct SumImpl;

impl AggregateImpl for SumImpl {
    fn name(&self) -> &'static str {
        "sum"
    }

    fn result_type(
        &self,
        args: &[(ColumnType, bool)],
    ) -> Result<(ColumnType, bool), AnalyzerError> {
        match args {
            [(ColumnType::Int, _)] => Ok((ColumnType::Int, true)),
            [(ColumnType::Float, _)] => Ok((ColumnType::Float, true)),
            [(ColumnType::Null, _)] => Ok((ColumnType::Null, true)),
            _ => Err(AnalyzerError::FunctionArgMismatch {
                name: "sum".into(),
                expected: "sum(numeric)".into(),
            }),
        }
    }

    fn create_accumulator(&self) -> Box<dyn Accumulator> {
        Box::new(SumAcc::Empty)
    }
}

// Track the concrete numeric kind seen first.
enum SumAcc {
    Empty,
    Int(i128),
    Float(f64),
}

impl Accumulator for SumAcc {
    fn update(&mut self, args: &[Value]) -> Result<(), AnalyzerError> {
        let [v] = args else {
            return Err(AnalyzerError::FunctionArgMismatch {
                name: "sum".into(),
                expected: "sum(expr)".into(),
            });
        };
        if matches!(v, Value::Null) {
            return Ok(());
        }

        match (&mut *self, v) {
            (SumAcc::Empty, Value::Number(n)) => {
                if let Some(i) = n.as_i64() {
                    *self = SumAcc::Int(i as i128);
                } else if let Some(f) = n.as_f64() {
                    *self = SumAcc::Float(f);
                } else {
                    return Err(AnalyzerError::Other("sum got non numeric number".into()));
                }
            }
            (SumAcc::Int(acc), Value::Number(n)) => {
                if let Some(i) = n.as_i64() {
                    *acc += i as i128;
                } else {
                    return Err(AnalyzerError::Other(
                        "sum received float for integer aggregation".into(),
                    ));
                }
            }
            (SumAcc::Float(acc), Value::Number(n)) => {
                if let Some(i) = n.as_i64() {
                    *acc += i as f64;
                } else if let Some(f) = n.as_f64() {
                    *acc += f;
                } else {
                    return Err(AnalyzerError::Other("sum got non numeric number".into()));
                }
            }
            (_, other) => {
                return Err(AnalyzerError::Other(format!("sum got non numeric arg: {other:?}")))
            }
        }
        Ok(())
    }

    fn finalize(&self) -> Value {
        match self {
            // sum over all NULLs is NULL
            SumAcc::Empty => Value::Null,
            SumAcc::Int(i) => Value::Number(serde_json::Number::from(*i as i64)),
            SumAcc::Float(f) => {
                serde_json::Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sum_int_and_float_and_nulls() {
        let mut a = SumImpl.create_accumulator();
        a.update(&[Value::Null]).unwrap();
        a.update(&[json!(2)]).unwrap();
        a.update(&[json!(3)]).unwrap();
        assert_eq!(a.finalize(), json!(5));

        let mut b = SumImpl.create_accumulator();
        b.update(&[json!(1.5)]).unwrap();
        b.update(&[json!(2.25)]).unwrap();
        assert_eq!(b.finalize(), json!(3.75));
    }

    #[test]
    fn sum_mix_float_into_int_errors_strict() {
        let mut s = SumImpl.create_accumulator();
        s.update(&[json!(1)]).unwrap();
        assert!(s.update(&[json!(1.5)]).is_err());
    }

    #[test]
    fn sum_of_only_nulls_is_null() {
        let mut s = SumImpl.create_accumulator();
        s.update(&[Value::Null]).unwrap();
        assert_eq!(s.finalize(), Value::Null);
    }
}
