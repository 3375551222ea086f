use serde_json::Value;

use crate::executor::aggregates::{Accumulator, AggregateImpl};
use crate::parser::analyzer::AnalyzerError;
use crate::table::ColumnType;

pub struct CountImpl;

impl AggregateImpl for CountImpl {
    fn name(&self) -> &'static str {
        "count"
    }

    // count() | count(expr) -> Int, non-nullable
    fn result_type(
        &self,
        args: &[(ColumnType, bool)],
    ) -> Result<(ColumnType, bool), AnalyzerError> {
        if args.len() <= 1 {
            Ok((ColumnType::Int, false))
        } else {
            Err(AnalyzerError::FunctionArgMismatch {
                name: "count".into(),
                expected: "count() or count(expr)".into(),
            })
        }
    }

    fn create_accumulator(&self) -> Box<dyn Accumulator> {
        Box::new(CountAcc { cnt: 0 })
    }
}

struct CountAcc {
    cnt: i64,
}

impl Accumulator for CountAcc {
    fn update(&mut self, args: &[Value]) -> Result<(), AnalyzerError> {
        match args {
            // count() counts every row
            [] => self.cnt += 1,
            // count(expr) counts non-NULL values
            [v] => {
                if !matches!(v, Value::Null) {
                    self.cnt += 1;
                }
            }
            _ => {
                return Err(AnalyzerError::FunctionArgMismatch {
                    name: "count".into(),
                    expected: "count() or count(expr)".into(),
                })
            }
        }
        Ok(())
    }

    fn finalize(&self) -> Value {
        Value::Number(serde_json::Number::from(self.cnt))
    }
}
