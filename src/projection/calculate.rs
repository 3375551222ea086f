use serde_json::json;
use tracing::debug;

use crate::executor::{
    build_pipeline, ApplySquashing, PlanSquashing, ProcessingStage, PullingExecutor,
};
use crate::parser::ast::{Literal, ScalarExpr};
use crate::projection::{ProjectionDescription, ProjectionError, ProjectionKind};
use crate::table::{
    Block, ExecutionContext, ROW_EXISTS_COLUMN, SETTING_AGGREGATE_FUNCTIONS_NULL_FOR_EMPTY,
    SETTING_TRANSFORM_NULL_IN,
};

impl ProjectionDescription {
    /// Evaluate this projection over one block of committed rows.
    ///
    /// Runs on a private copy of the context with the two NULL-handling
    /// settings disabled, so the stored projection data does not depend on
    /// session settings. Rows whose soft-delete marker is not 1 are skipped
    /// when the block carries the marker column.
    pub fn calculate(
        &self,
        block: &Block,
        context: &ExecutionContext,
    ) -> Result<Block, ProjectionError> {
        let mut context = context.copy_for_internal_query();
        context.set_setting(SETTING_AGGREGATE_FUNCTIONS_NULL_FOR_EMPTY, json!(0))?;
        context.set_setting(SETTING_TRANSFORM_NULL_IN, json!(0))?;

        let mut query = self.query.clone();
        if block.has(ROW_EXISTS_COLUMN) {
            query.set_where(ScalarExpr::call(
                "equals",
                vec![
                    ScalarExpr::column(ROW_EXISTS_COLUMN),
                    ScalarExpr::Literal(Literal::Int(1)),
                ],
            ));
        }

        let stage = match self.kind {
            ProjectionKind::Normal => ProcessingStage::FetchColumns,
            ProjectionKind::Aggregate => ProcessingStage::WithMergeableState,
        };
        debug!(projection = %self.name, rows = block.rows(), ?stage, "calculating projection");

        let pipeline = build_pipeline(&query, block, &context, stage)?;
        let header = pipeline.empty_block();

        // coalesce however many chunks execution produced into one block
        let mut plan = PlanSquashing::new(block.rows());
        let mut squashed: Vec<Block> = Vec::new();
        let mut executor = PullingExecutor::new(pipeline);
        while let Some(chunk) = executor.pull() {
            if let Some(batch) = plan.add(chunk) {
                if let Some(merged) = ApplySquashing::squash(batch) {
                    squashed.push(merged);
                }
            }
        }
        if let Some(batch) = plan.flush() {
            if let Some(merged) = ApplySquashing::squash(batch) {
                squashed.push(merged);
            }
        }

        let mut results = squashed.into_iter();
        let result = results.next().unwrap_or(header);
        if results.next().is_some() {
            return Err(ProjectionError::Internal(format!(
                "projection {} produced more than one output block. It's a bug",
                self.name
            )));
        }
        if result.rows() > block.rows() {
            return Err(ProjectionError::Internal(format!(
                "projection {} cannot increase the number of rows in a block. It's a bug",
                self.name
            )));
        }
        Ok(result)
    }
}
