use serde_json::Value;

use crate::executor::aggregates::{Accumulator, AggregateImpl};
use crate::parser::analyzer::AnalyzerError;
use crate::table::ColumnType;

pub struct AvgImpl;

impl AggregateImpl for AvgImpl {
    fn name(&self) -> &'static str {
        "avg"
    }

    fn result_type(
        &self,
        args: &[(ColumnType, bool)],
    ) -> Result<(ColumnType, bool), AnalyzerError> {
        match args {
            [(ColumnType::Int | ColumnType::Float | ColumnType::Null, _)] => {
                Ok((ColumnType::Float, true))
            }
            _ => Err(AnalyzerError::FunctionArgMismatch {
                name: "avg".into(),
                expected: "avg(numeric)".into(),
            }),
        }
    }

    fn create_accumulator(&self) -> Box<dyn Accumulator> {
        Box::new(AvgAcc { sum: 0.0, cnt: 0 })
    }
}

struct AvgAcc {
    sum: f64,
    cnt: i64,
}

impl Accumulator for AvgAcc {
    fn update(&mut self, args: &[Value]) -> Result<(), AnalyzerError> {
        let [v] = args else {
            return Err(AnalyzerError::FunctionArgMismatch {
                name: "avg".into(),
                expected: "avg(expr)".into(),
            });
        };
        match v {
            Value::Null => {}
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    self.sum += i as f64;
                    self.cnt += 1;
                } else if let Some(f) = n.as_f64() {
                    self.sum += f;
                    self.cnt += 1;
                } else {
                    return Err(AnalyzerError::Other("avg got non numeric number".into()));
                }
            }
            _ => return Err(AnalyzerError::Other("avg got non numeric arg".into())),
        }
        Ok(())
    }

    fn finalize(&self) -> Value {
        if self.cnt == 0 {
            Value::Null
        } else {
            let avg = self.sum / (self.cnt as f64);
            serde_json::Number::from_f64(avg).map(Value::Number).unwrap_or(Value::Null)
        }
    }
}
