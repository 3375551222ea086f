use serde_json::Map;

use crate::executor::aggregates::AggregateRegistry;
use crate::executor::eval::{Eval, EvalSettings};
use crate::parser::analyzer::AnalyzerError;
use crate::parser::ast::{Literal, ScalarExpr, SelectQuery};
use crate::table::{ColumnInfo, ColumnType, ColumnsDescription, ExecutionContext, VirtualTable};

/// Knobs for one analysis pass. Projection declarations are analyzed with
/// both folds off so the declared expressions survive verbatim into the
/// stored description.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisOptions {
    pub fold_aliases: bool,
    pub fold_constants: bool,
}

impl AnalysisOptions {
    pub fn for_projection() -> Self {
        Self { fold_aliases: false, fold_constants: false }
    }
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self { fold_aliases: true, fold_constants: true }
    }
}

/// One column of an analyzed query's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputField {
    pub name: String,
    pub ty: ColumnType,
    pub nullable: bool,
    /// The column reads no source column at all.
    pub constant: bool,
}

/// A select-list entry after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzedIdentifier {
    pub expression: ScalarExpr,
    pub alias: Option<String>,
    pub ty: ColumnType,
    pub nullable: bool,
}

/// One GROUP BY key after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationKey {
    pub expression: ScalarExpr,
    pub name: String,
    pub ty: ColumnType,
    pub nullable: bool,
}

/// Where one output column's values come from during execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputSource {
    /// The value of aggregation key `i`.
    Key(usize),
    /// The finalized state of this aggregate call.
    Aggregate(ScalarExpr),
    /// A per-row scalar evaluation.
    Scalar(ScalarExpr),
}

/// Result of resolving a query against a column set.
///
/// `output` and `sources` are parallel: field `i` of the output is produced
/// from source `i`. For aggregating queries the aggregation keys come first
/// in the output, in GROUP BY order, followed by the aggregate select items
/// in select order.
#[derive(Debug, Clone)]
pub struct AnalyzedQuery {
    pub projection: Vec<AnalyzedIdentifier>,
    pub required_columns: Vec<String>,
    pub aggregation_keys: Vec<AggregationKey>,
    pub output: Vec<OutputField>,
    pub sources: Vec<OutputSource>,
    pub need_aggregate: bool,
}

/// Column set exposed by a query's output, resolvable like a table.
pub fn columns_from_output(fields: &[OutputField]) -> ColumnsDescription {
    let mut columns = ColumnsDescription::new();
    for field in fields {
        let info = if field.nullable {
            ColumnInfo::nullable(field.ty)
        } else {
            ColumnInfo::new(field.ty)
        };
        columns.insert(&field.name, info);
    }
    columns
}

pub fn analyze(
    query: &SelectQuery,
    table: &VirtualTable,
    options: &AnalysisOptions,
    context: &ExecutionContext,
) -> Result<AnalyzedQuery, AnalyzerError> {
    let registry = context.aggregates();
    let columns = table.columns();

    let mut select = query.select.clone();
    let mut where_clause = query.where_clause.clone();
    let mut group_by = query.group_by.clone();
    let mut order_exprs: Vec<ScalarExpr> =
        query.order_by.iter().map(|o| o.expr.clone()).collect();

    if options.fold_aliases {
        let aliases: Vec<(String, ScalarExpr)> = select
            .iter()
            .filter_map(|item| item.alias.clone().map(|a| (a, item.expr.clone())))
            .collect();
        if !aliases.is_empty() {
            where_clause = where_clause.map(|e| substitute_aliases(&e, &aliases));
            group_by = group_by.iter().map(|e| substitute_aliases(e, &aliases)).collect();
            order_exprs = order_exprs.iter().map(|e| substitute_aliases(e, &aliases)).collect();
        }
    }

    if options.fold_constants {
        for item in &mut select {
            item.expr = fold_constants(&item.expr, registry);
        }
        where_clause = where_clause.map(|e| fold_constants(&e, registry));
        group_by = group_by.iter().map(|e| fold_constants(e, registry)).collect();
    }

    if let Some(expr) = &where_clause {
        if expr.contains_aggregate(registry) {
            return Err(AnalyzerError::Other(
                "aggregate functions are not allowed in WHERE".to_string(),
            ));
        }
        infer_scalar(expr, columns, registry)?;
    }

    let mut required_columns: Vec<String> = Vec::new();
    let mut referenced = Vec::new();
    for item in &select {
        item.expr.collect_columns(&mut referenced);
    }
    if let Some(expr) = &where_clause {
        expr.collect_columns(&mut referenced);
    }
    for expr in group_by.iter().chain(order_exprs.iter()) {
        expr.collect_columns(&mut referenced);
    }
    for name in referenced {
        if required_columns.contains(&name) {
            continue;
        }
        if !columns.has(&name) {
            return Err(AnalyzerError::UnknownColumn {
                name,
                candidates: columns.names(),
            });
        }
        required_columns.push(name);
    }

    let need_aggregate = !group_by.is_empty()
        || select.iter().any(|item| item.expr.contains_aggregate(registry));

    let mut projection = Vec::new();
    for item in &select {
        let (ty, nullable) = infer_scalar(&item.expr, columns, registry)?;
        projection.push(AnalyzedIdentifier {
            expression: item.expr.clone(),
            alias: item.alias.clone(),
            ty,
            nullable,
        });
    }

    let mut aggregation_keys: Vec<AggregationKey> = Vec::new();
    let mut output: Vec<OutputField> = Vec::new();
    let mut sources: Vec<OutputSource> = Vec::new();

    if need_aggregate {
        for key_expr in &group_by {
            if key_expr.contains_aggregate(registry) {
                return Err(AnalyzerError::Other(
                    "aggregate functions are not allowed in GROUP BY".to_string(),
                ));
            }
            let name = key_expr.column_name();
            if aggregation_keys.iter().any(|k| k.name == name) {
                continue;
            }
            let (ty, nullable) = infer_scalar(key_expr, columns, registry)?;
            sources.push(OutputSource::Key(aggregation_keys.len()));
            output.push(OutputField {
                name: name.clone(),
                ty,
                nullable,
                constant: key_expr.is_constant(),
            });
            aggregation_keys.push(AggregationKey {
                expression: key_expr.clone(),
                name,
                ty,
                nullable,
            });
        }

        for (item, analyzed) in select.iter().zip(&projection) {
            let name = item.output_name();
            if output.iter().any(|f| f.name == name) {
                continue;
            }
            if let Some(pos) =
                aggregation_keys.iter().position(|k| k.expression == item.expr)
            {
                sources.push(OutputSource::Key(pos));
                output.push(OutputField {
                    name,
                    ty: analyzed.ty,
                    nullable: analyzed.nullable,
                    constant: item.expr.is_constant(),
                });
            } else if item.expr.is_aggregate_call(registry) {
                sources.push(OutputSource::Aggregate(item.expr.clone()));
                output.push(OutputField {
                    name,
                    ty: analyzed.ty,
                    nullable: analyzed.nullable,
                    constant: false,
                });
            } else if item.expr.contains_aggregate(registry) {
                return Err(AnalyzerError::Other(format!(
                    "expression {} mixes aggregate and scalar computation",
                    item.expr
                )));
            } else if item.expr.is_constant() {
                sources.push(OutputSource::Scalar(item.expr.clone()));
                output.push(OutputField {
                    name,
                    ty: analyzed.ty,
                    nullable: analyzed.nullable,
                    constant: true,
                });
            } else {
                return Err(AnalyzerError::NotAnAggregate(item.expr.column_name()));
            }
        }
    } else {
        for (item, analyzed) in select.iter().zip(&projection) {
            let name = item.output_name();
            if output.iter().any(|f| f.name == name) {
                continue;
            }
            sources.push(OutputSource::Scalar(item.expr.clone()));
            output.push(OutputField {
                name,
                ty: analyzed.ty,
                nullable: analyzed.nullable,
                constant: item.expr.is_constant(),
            });
        }
        // ORDER BY columns belong to the output even when not selected
        let mut order_columns = Vec::new();
        for expr in &order_exprs {
            expr.collect_columns(&mut order_columns);
        }
        for name in order_columns {
            if output.iter().any(|f| f.name == name) {
                continue;
            }
            let reference = ScalarExpr::Column(name.clone());
            let (ty, nullable) = infer_scalar(&reference, columns, registry)?;
            sources.push(OutputSource::Scalar(reference));
            output.push(OutputField { name, ty, nullable, constant: false });
        }
    }

    Ok(AnalyzedQuery {
        projection,
        required_columns,
        aggregation_keys,
        output,
        sources,
        need_aggregate,
    })
}

/// Type and nullability of one scalar expression over `columns`.
pub fn infer_scalar(
    expr: &ScalarExpr,
    columns: &ColumnsDescription,
    registry: &AggregateRegistry,
) -> Result<(ColumnType, bool), AnalyzerError> {
    match expr {
        ScalarExpr::Literal(l) => Ok(match l {
            Literal::Null => (ColumnType::Null, true),
            Literal::Bool(_) => (ColumnType::Bool, false),
            Literal::Int(_) => (ColumnType::Int, false),
            Literal::Float(_) => (ColumnType::Float, false),
            Literal::String(_) => (ColumnType::String, false),
        }),
        ScalarExpr::Column(name) => columns
            .get(name)
            .map(|info| (info.ty, info.nullable))
            .ok_or_else(|| AnalyzerError::UnknownColumn {
                name: name.clone(),
                candidates: columns.names(),
            }),
        ScalarExpr::Function(f) => {
            if let Some(aggregate) = registry.get(&f.name) {
                let mut args = Vec::new();
                for arg in &f.args {
                    args.push(infer_scalar(arg, columns, registry)?);
                }
                return aggregate.result_type(&args);
            }
            match f.name.as_str() {
                "equals" | "in" => {
                    expect_args(&f.name, &f.args, 2)?;
                    let (_, left_nullable) = infer_scalar(&f.args[0], columns, registry)?;
                    let (_, right_nullable) = infer_scalar(&f.args[1], columns, registry)?;
                    Ok((ColumnType::Bool, left_nullable || right_nullable))
                }
                // division by zero yields NULL, hence nullable
                "modulo" | "moduloLegacy" => {
                    expect_args(&f.name, &f.args, 2)?;
                    for arg in &f.args {
                        infer_scalar(arg, columns, registry)?;
                    }
                    Ok((ColumnType::Int, true))
                }
                "tuple" => Err(AnalyzerError::Other(
                    "tuple cannot be used as an output column".to_string(),
                )),
                _ => Err(AnalyzerError::FunctionNotFound(f.name.clone())),
            }
        }
    }
}

fn expect_args(name: &str, args: &[ScalarExpr], count: usize) -> Result<(), AnalyzerError> {
    if args.len() != count {
        return Err(AnalyzerError::FunctionArgMismatch {
            name: name.to_string(),
            expected: count.to_string(),
        });
    }
    Ok(())
}

fn substitute_aliases(expr: &ScalarExpr, aliases: &[(String, ScalarExpr)]) -> ScalarExpr {
    match expr {
        ScalarExpr::Column(name) => aliases
            .iter()
            .find(|(alias, _)| alias == name)
            .map(|(_, aliased)| aliased.clone())
            .unwrap_or_else(|| expr.clone()),
        ScalarExpr::Function(f) => ScalarExpr::call(
            &f.name,
            f.args.iter().map(|a| substitute_aliases(a, aliases)).collect(),
        ),
        ScalarExpr::Literal(_) => expr.clone(),
    }
}

fn is_foldable_scalar(name: &str) -> bool {
    matches!(name, "equals" | "in" | "modulo" | "moduloLegacy")
}

fn fold_constants(expr: &ScalarExpr, registry: &AggregateRegistry) -> ScalarExpr {
    match expr {
        ScalarExpr::Function(f) => {
            let folded = ScalarExpr::call(
                &f.name,
                f.args.iter().map(|a| fold_constants(a, registry)).collect(),
            );
            if is_foldable_scalar(&f.name) && folded.is_constant() {
                let value = Eval::eval_scalar(&folded, &Map::new(), &EvalSettings::default());
                if let Some(literal) = Literal::from_value(&value) {
                    return ScalarExpr::Literal(literal);
                }
            }
            folded
        }
        _ => expr.clone(),
    }
}
