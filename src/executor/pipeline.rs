use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::trace;

use crate::executor::aggregates::Accumulator;
use crate::executor::eval::{Eval, EvalSettings};
use crate::parser::analyzer::{
    analyze, AnalysisOptions, AnalyzerError, OutputField, OutputSource,
};
use crate::parser::ast::{ScalarExpr, SelectQuery};
use crate::table::{
    Block, ColumnData, ExecutionContext, VirtualTable,
    SETTING_AGGREGATE_FUNCTIONS_NULL_FOR_EMPTY, SETTING_MAX_BLOCK_SIZE,
};

/// How far a query is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Evaluate the select list per row; no aggregation is performed.
    FetchColumns,
    /// Run aggregation and emit per-group state, keys first.
    WithMergeableState,
}

/// Executed query output: a header plus zero or more blocks, each at most
/// `max_block_size` rows.
#[derive(Debug)]
pub struct QueryPipeline {
    pub header: Vec<OutputField>,
    blocks: Vec<Block>,
}

impl QueryPipeline {
    /// A zero-row block with the header's columns.
    pub fn empty_block(&self) -> Block {
        Block::new(
            self.header
                .iter()
                .map(|f| ColumnData::new(&f.name, f.ty, Vec::new()))
                .collect(),
        )
    }

    pub fn into_blocks(self) -> Vec<Block> {
        self.blocks
    }
}

/// Run `query` over `block` as its sole source.
pub fn build_pipeline(
    query: &SelectQuery,
    block: &Block,
    context: &ExecutionContext,
    stage: ProcessingStage,
) -> Result<QueryPipeline, AnalyzerError> {
    let table = VirtualTable::from_block(block);
    let analyzed = analyze(query, &table, &AnalysisOptions::for_projection(), context)?;
    let settings = EvalSettings::from_context(context);

    let mut rows: Vec<Map<String, Value>> = block.rows_as_maps();
    if let Some(filter) = &query.where_clause {
        rows.retain(|row| Eval::is_truthy(&Eval::eval_scalar(filter, row, &settings)));
    }
    trace!(input_rows = block.rows(), filtered_rows = rows.len(), "executing query over block");

    let aggregate = analyzed.need_aggregate && stage == ProcessingStage::WithMergeableState;
    let output_rows = if aggregate {
        aggregate_rows(&analyzed, &rows, context, &settings)?
    } else {
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut values = Vec::with_capacity(analyzed.sources.len());
            for source in &analyzed.sources {
                let expr = match source {
                    OutputSource::Key(i) => &analyzed.aggregation_keys[*i].expression,
                    OutputSource::Scalar(e) => e,
                    OutputSource::Aggregate(e) => {
                        return Err(AnalyzerError::Other(format!(
                            "aggregate {e} cannot be computed without aggregation"
                        )))
                    }
                };
                values.push(Eval::eval_scalar(expr, row, &settings));
            }
            out.push(values);
        }
        out
    };

    let max_block_size = context.setting_usize(SETTING_MAX_BLOCK_SIZE).max(1);
    let mut blocks = Vec::new();
    for chunk in output_rows.chunks(max_block_size) {
        let columns = analyzed
            .output
            .iter()
            .enumerate()
            .map(|(i, field)| {
                ColumnData::new(
                    &field.name,
                    field.ty,
                    chunk.iter().map(|row| row[i].clone()).collect(),
                )
            })
            .collect();
        blocks.push(Block::new(columns));
    }
    Ok(QueryPipeline { header: analyzed.output, blocks })
}

struct Group {
    key_values: Vec<Value>,
    accumulators: Vec<Box<dyn Accumulator>>,
    rows_seen: usize,
}

fn aggregate_rows(
    analyzed: &crate::parser::analyzer::AnalyzedQuery,
    rows: &[Map<String, Value>],
    context: &ExecutionContext,
    settings: &EvalSettings,
) -> Result<Vec<Vec<Value>>, AnalyzerError> {
    let registry = context.aggregates();

    // calls behind the Aggregate sources, in source order
    let aggregate_calls: Vec<&ScalarExpr> = analyzed
        .sources
        .iter()
        .filter_map(|s| match s {
            OutputSource::Aggregate(e) => Some(e),
            _ => None,
        })
        .collect();

    let make_accumulators = || -> Result<Vec<Box<dyn Accumulator>>, AnalyzerError> {
        aggregate_calls
            .iter()
            .map(|call| match call {
                ScalarExpr::Function(f) => registry
                    .get(&f.name)
                    .map(|agg| agg.create_accumulator())
                    .ok_or_else(|| AnalyzerError::FunctionNotFound(f.name.clone())),
                other => Err(AnalyzerError::Other(format!("{other} is not an aggregate call"))),
            })
            .collect()
    };

    let mut groups: IndexMap<String, Group> = IndexMap::new();

    // a global aggregation has exactly one group, present even without input
    if analyzed.aggregation_keys.is_empty() {
        groups.insert(
            Value::Array(Vec::new()).to_string(),
            Group { key_values: Vec::new(), accumulators: make_accumulators()?, rows_seen: 0 },
        );
    }

    for row in rows {
        let key_values: Vec<Value> = analyzed
            .aggregation_keys
            .iter()
            .map(|k| Eval::eval_scalar(&k.expression, row, settings))
            .collect();
        let group_key = Value::Array(key_values.clone()).to_string();
        if !groups.contains_key(&group_key) {
            let group = Group {
                key_values,
                accumulators: make_accumulators()?,
                rows_seen: 0,
            };
            groups.insert(group_key.clone(), group);
        }
        let Some(group) = groups.get_mut(&group_key) else {
            continue;
        };
        group.rows_seen += 1;
        for (accumulator, call) in group.accumulators.iter_mut().zip(&aggregate_calls) {
            let args: Vec<Value> = match call {
                ScalarExpr::Function(f) => f
                    .args
                    .iter()
                    .map(|a| Eval::eval_scalar(a, row, settings))
                    .collect(),
                _ => Vec::new(),
            };
            accumulator.update(&args)?;
        }
    }
    trace!(groups = groups.len(), "aggregation finished");

    let null_for_empty = context.setting_bool(SETTING_AGGREGATE_FUNCTIONS_NULL_FOR_EMPTY);
    let mut out = Vec::with_capacity(groups.len());
    for group in groups.values() {
        let mut aggregate_index = 0;
        let mut values = Vec::with_capacity(analyzed.sources.len());
        for source in &analyzed.sources {
            let value = match source {
                OutputSource::Key(i) => group.key_values[*i].clone(),
                OutputSource::Aggregate(_) => {
                    let v = if null_for_empty && group.rows_seen == 0 {
                        Value::Null
                    } else {
                        group.accumulators[aggregate_index].finalize()
                    };
                    aggregate_index += 1;
                    v
                }
                OutputSource::Scalar(e) => Eval::eval_scalar(e, &Map::new(), settings),
            };
            values.push(value);
        }
        out.push(values);
    }
    Ok(out)
}

/// Buffers small blocks until at least `min_rows` rows are pending, then
/// releases them for squashing.
pub struct PlanSquashing {
    min_rows: usize,
    pending: Vec<Block>,
    pending_rows: usize,
}

impl PlanSquashing {
    pub fn new(min_rows: usize) -> Self {
        Self { min_rows: min_rows.max(1), pending: Vec::new(), pending_rows: 0 }
    }

    pub fn add(&mut self, block: Block) -> Option<Vec<Block>> {
        self.pending_rows += block.rows();
        self.pending.push(block);
        if self.pending_rows >= self.min_rows {
            self.flush()
        } else {
            None
        }
    }

    pub fn flush(&mut self) -> Option<Vec<Block>> {
        if self.pending.is_empty() {
            return None;
        }
        self.pending_rows = 0;
        Some(std::mem::take(&mut self.pending))
    }
}

/// Concatenates a batch of same-layout blocks into one.
pub struct ApplySquashing;

impl ApplySquashing {
    pub fn squash(blocks: Vec<Block>) -> Option<Block> {
        let mut iter = blocks.into_iter();
        let mut squashed = iter.next()?;
        for block in iter {
            squashed.append(&block);
        }
        Some(squashed)
    }
}

/// Pull-based consumption of a pipeline's blocks.
pub struct PullingExecutor {
    blocks: std::vec::IntoIter<Block>,
}

impl PullingExecutor {
    pub fn new(pipeline: QueryPipeline) -> Self {
        Self { blocks: pipeline.into_blocks().into_iter() }
    }

    pub fn pull(&mut self) -> Option<Block> {
        self.blocks.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::ProjectionDeclaration;
    use crate::table::{ColumnType, SETTING_MAX_BLOCK_SIZE};
    use serde_json::json;

    fn source_block() -> Block {
        Block::new(vec![
            ColumnData::new("id", ColumnType::Int, (1..=6).map(|i| json!(i)).collect()),
            ColumnData::new(
                "kind",
                ColumnType::String,
                ["a", "b", "a", "b", "a", "b"].iter().map(|s| json!(s)).collect(),
            ),
        ])
    }

    fn query(text: &str) -> SelectQuery {
        ProjectionDeclaration::parse_str(&format!("p ({text})"))
            .unwrap()
            .query
            .to_select_query()
    }

    #[test]
    fn fetch_columns_evaluates_per_row() {
        let pipeline = build_pipeline(
            &query("SELECT kind, id"),
            &source_block(),
            &ExecutionContext::new(),
            ProcessingStage::FetchColumns,
        )
        .unwrap();
        let blocks = pipeline.into_blocks();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].rows(), 6);
        assert_eq!(blocks[0].column_names(), vec!["kind", "id"]);
        assert_eq!(blocks[0].value("kind", 0), Some(&json!("a")));
    }

    #[test]
    fn group_by_emits_keys_first() {
        let pipeline = build_pipeline(
            &query("SELECT count(), kind GROUP BY kind"),
            &source_block(),
            &ExecutionContext::new(),
            ProcessingStage::WithMergeableState,
        )
        .unwrap();
        let blocks = pipeline.into_blocks();
        assert_eq!(blocks.len(), 1);
        let block = &blocks[0];
        assert_eq!(block.column_names(), vec!["kind", "count()"]);
        assert_eq!(block.rows(), 2);
        // groups appear in first-seen order
        assert_eq!(block.value("kind", 0), Some(&json!("a")));
        assert_eq!(block.value("count()", 0), Some(&json!(3)));
        assert_eq!(block.value("kind", 1), Some(&json!("b")));
        assert_eq!(block.value("count()", 1), Some(&json!(3)));
    }

    #[test]
    fn global_aggregate_over_empty_input_emits_one_row() {
        let empty = Block::new(vec![ColumnData::new("id", ColumnType::Int, vec![])]);
        let pipeline = build_pipeline(
            &query("SELECT count(), min(id)"),
            &empty,
            &ExecutionContext::new(),
            ProcessingStage::WithMergeableState,
        )
        .unwrap();
        let blocks = pipeline.into_blocks();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].rows(), 1);
        assert_eq!(blocks[0].value("count()", 0), Some(&json!(0)));
        assert_eq!(blocks[0].value("min(id)", 0), Some(&Value::Null));
    }

    #[test]
    fn null_for_empty_turns_empty_aggregates_into_null() {
        let empty = Block::new(vec![ColumnData::new("id", ColumnType::Int, vec![])]);
        let mut context = ExecutionContext::new();
        context
            .set_setting(SETTING_AGGREGATE_FUNCTIONS_NULL_FOR_EMPTY, json!(1))
            .unwrap();
        let pipeline = build_pipeline(
            &query("SELECT count()"),
            &empty,
            &context,
            ProcessingStage::WithMergeableState,
        )
        .unwrap();
        let blocks = pipeline.into_blocks();
        assert_eq!(blocks[0].value("count()", 0), Some(&Value::Null));
    }

    #[test]
    fn where_clause_filters_rows() {
        let mut q = query("SELECT id");
        q.set_where(ScalarExpr::call(
            "equals",
            vec![
                ScalarExpr::column("kind"),
                ScalarExpr::parse(&mut crate::parser::Cursor::new("'a'")).unwrap(),
            ],
        ));
        let pipeline = build_pipeline(
            &q,
            &source_block(),
            &ExecutionContext::new(),
            ProcessingStage::FetchColumns,
        )
        .unwrap();
        let blocks = pipeline.into_blocks();
        assert_eq!(blocks[0].rows(), 3);
    }

    #[test]
    fn small_max_block_size_chunks_then_squashes_back() {
        let mut context = ExecutionContext::new();
        context.set_setting(SETTING_MAX_BLOCK_SIZE, json!(2)).unwrap();
        let pipeline = build_pipeline(
            &query("SELECT id"),
            &source_block(),
            &context,
            ProcessingStage::FetchColumns,
        )
        .unwrap();
        let blocks = pipeline.into_blocks();
        assert_eq!(blocks.len(), 3);

        let mut plan = PlanSquashing::new(6);
        let mut batches = Vec::new();
        for block in blocks {
            if let Some(batch) = plan.add(block) {
                batches.push(batch);
            }
        }
        if let Some(batch) = plan.flush() {
            batches.push(batch);
        }
        assert_eq!(batches.len(), 1);
        let squashed = ApplySquashing::squash(batches.remove(0)).unwrap();
        assert_eq!(squashed.rows(), 6);
    }

    #[test]
    fn empty_result_yields_header_block() {
        let empty = Block::new(vec![ColumnData::new("id", ColumnType::Int, vec![])]);
        let pipeline = build_pipeline(
            &query("SELECT id"),
            &empty,
            &ExecutionContext::new(),
            ProcessingStage::FetchColumns,
        )
        .unwrap();
        let header_block = pipeline.empty_block();
        assert_eq!(header_block.rows(), 0);
        assert_eq!(header_block.column_names(), vec!["id"]);
        assert!(pipeline.into_blocks().is_empty());
    }
}
