use serde_json::Value;

use crate::executor::eval::{Eval, EvalSettings};
use crate::parser::analyzer::{infer_scalar, AnalyzerError};
use crate::parser::ast::ScalarExpr;
use crate::table::{Block, ColumnData, ColumnType, ExecutionContext, VirtualTable};

/// A compiled batch of scalar expressions, evaluated together over a block.
///
/// Aggregate calls are unwrapped to their arguments: the interesting action
/// for a stored projection is computing the values the aggregates will later
/// consume, not the aggregation itself.
#[derive(Debug, Clone)]
pub struct ExpressionActions {
    required_columns: Vec<String>,
    outputs: Vec<(String, ScalarExpr, ColumnType)>,
}

impl ExpressionActions {
    pub fn for_expressions(
        exprs: &[ScalarExpr],
        table: &VirtualTable,
        context: &ExecutionContext,
    ) -> Result<Self, AnalyzerError> {
        let registry = context.aggregates();
        let mut flat: Vec<ScalarExpr> = Vec::new();
        let mut stack: Vec<&ScalarExpr> = exprs.iter().rev().collect();
        while let Some(expr) = stack.pop() {
            if let ScalarExpr::Function(f) = expr {
                if registry.get(&f.name).is_some() {
                    stack.extend(f.args.iter().rev());
                    continue;
                }
            }
            flat.push(expr.clone());
        }

        let mut required_columns = Vec::new();
        let mut outputs: Vec<(String, ScalarExpr, ColumnType)> = Vec::new();
        for expr in flat {
            let name = expr.column_name();
            if outputs.iter().any(|(n, _, _)| *n == name) {
                continue;
            }
            let mut referenced = Vec::new();
            expr.collect_columns(&mut referenced);
            for column in referenced {
                if !required_columns.contains(&column) {
                    required_columns.push(column);
                }
            }
            let (ty, _) = infer_scalar(&expr, table.columns(), registry)?;
            outputs.push((name, expr, ty));
        }
        Ok(Self { required_columns, outputs })
    }

    pub fn required_columns(&self) -> &[String] {
        &self.required_columns
    }

    pub fn output_names(&self) -> Vec<String> {
        self.outputs.iter().map(|(name, _, _)| name.clone()).collect()
    }

    /// Evaluate every output expression over each row of `block`.
    pub fn execute(&self, block: &Block, context: &ExecutionContext) -> Block {
        let settings = EvalSettings::from_context(context);
        let rows = block.rows_as_maps();
        let columns = self
            .outputs
            .iter()
            .map(|(name, expr, ty)| {
                let values: Vec<Value> = rows
                    .iter()
                    .map(|row| Eval::eval_scalar(expr, row, &settings))
                    .collect();
                ColumnData::new(name, *ty, values)
            })
            .collect();
        Block::new(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Cursor;
    use crate::table::ColumnsDescription;
    use serde_json::json;

    fn expr(text: &str) -> ScalarExpr {
        ScalarExpr::parse(&mut Cursor::new(text)).unwrap()
    }

    fn table() -> VirtualTable {
        VirtualTable::new(&ColumnsDescription::from_pairs(&[
            ("id", ColumnType::Int),
            ("kind", ColumnType::String),
        ]))
    }

    #[test]
    fn aggregate_calls_contribute_their_arguments() {
        let actions = ExpressionActions::for_expressions(
            &[expr("min(id)"), expr("count()"), expr("kind")],
            &table(),
            &ExecutionContext::new(),
        )
        .unwrap();
        assert_eq!(actions.output_names(), vec!["id", "kind"]);
        assert_eq!(actions.required_columns(), ["id", "kind"]);
    }

    #[test]
    fn duplicate_expressions_collapse() {
        let actions = ExpressionActions::for_expressions(
            &[expr("modulo(id, 2)"), expr("modulo(id, 2)"), expr("min(id)")],
            &table(),
            &ExecutionContext::new(),
        )
        .unwrap();
        assert_eq!(actions.output_names(), vec!["modulo(id, 2)", "id"]);
    }

    #[test]
    fn execute_evaluates_per_row() {
        let actions = ExpressionActions::for_expressions(
            &[expr("modulo(id, 2)")],
            &table(),
            &ExecutionContext::new(),
        )
        .unwrap();
        let block = Block::new(vec![ColumnData::new(
            "id",
            ColumnType::Int,
            vec![json!(1), json!(2), json!(3)],
        )]);
        let result = actions.execute(&block, &ExecutionContext::new());
        assert_eq!(result.rows(), 3);
        assert_eq!(
            result.by_name("modulo(id, 2)").unwrap().values,
            vec![json!(1), json!(0), json!(1)]
        );
    }
}
