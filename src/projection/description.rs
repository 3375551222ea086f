use std::fmt;

use tracing::debug;

use crate::parser::analyzer::{
    analyze, columns_from_output, AnalysisOptions, OutputField,
};
use crate::parser::ast::{ProjectionDeclaration, ScalarExpr, SelectQuery};
use crate::projection::ProjectionError;
use crate::table::{
    ColumnType, ColumnsDescription, ExecutionContext, KeyDescription, TableMetadata,
    VirtualTable,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionKind {
    /// Rows reordered by the projection's ORDER BY.
    Normal,
    /// Rows pre-aggregated by the projection's GROUP BY.
    Aggregate,
}

/// A validated projection: the declaration plus everything derived from it
/// against one concrete column set.
///
/// Descriptions are plain values; `Clone` yields a fully independent copy.
/// Equality is by name and canonical declaration text, so two descriptions
/// built from differently formatted but equivalent declarations compare
/// equal, while the derived schema is not part of identity.
#[derive(Debug, Clone)]
pub struct ProjectionDescription {
    pub name: String,
    pub kind: ProjectionKind,
    pub definition: ProjectionDeclaration,
    pub query: SelectQuery,
    pub required_columns: Vec<String>,
    pub output_schema: Vec<OutputField>,
    /// Number of leading output columns that form the key.
    pub key_size: usize,
    pub key_schema: Vec<(String, ColumnType)>,
    pub metadata: TableMetadata,
    pub primary_key_max_column_name: Option<String>,
    /// Output positions holding partition values, only set on the summary
    /// projection.
    pub partition_value_indices: Vec<usize>,
}

impl PartialEq for ProjectionDescription {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.definition.to_string() == other.definition.to_string()
    }
}

impl fmt::Display for ProjectionDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.definition)
    }
}

impl ProjectionDescription {
    pub fn from_declaration(
        declaration: &ProjectionDeclaration,
        columns: &ColumnsDescription,
        context: &ExecutionContext,
    ) -> Result<ProjectionDescription, ProjectionError> {
        if declaration.name.is_empty() {
            return Err(ProjectionError::InvalidDeclaration(
                "projection name cannot be empty".to_string(),
            ));
        }
        if declaration.query.select.is_empty() {
            return Err(ProjectionError::InvalidDeclaration(format!(
                "projection {} has an empty select list",
                declaration.name
            )));
        }

        let query = declaration.query.to_select_query();
        let table = VirtualTable::new(columns);
        let analyzed = analyze(&query, &table, &AnalysisOptions::for_projection(), context)?;

        let kind = if analyzed.need_aggregate {
            ProjectionKind::Aggregate
        } else {
            ProjectionKind::Normal
        };
        if kind == ProjectionKind::Aggregate && !query.order_by.is_empty() {
            return Err(ProjectionError::IllegalProjection(format!(
                "projection {} with aggregation cannot have ORDER BY",
                declaration.name
            )));
        }

        let mut output_schema = analyzed.output.clone();

        let sorting_key = match kind {
            ProjectionKind::Aggregate => {
                // keys become plain references to the leading output columns
                let key_refs: Vec<ScalarExpr> = analyzed
                    .aggregation_keys
                    .iter()
                    .map(|k| ScalarExpr::column(&k.name))
                    .collect();
                match key_refs.len() {
                    0 => KeyDescription::empty(),
                    1 => KeyDescription::from_expression(
                        &key_refs[0],
                        &columns_from_output(&output_schema),
                    )?,
                    _ => KeyDescription::from_expression(
                        &ScalarExpr::call("tuple", key_refs),
                        &columns_from_output(&output_schema),
                    )?,
                }
            }
            ProjectionKind::Normal => {
                // the sorting key may read source columns the select list
                // does not carry; those are added to the output
                let key = KeyDescription::from_order_by(&query.order_by, columns)?;
                for (name, info) in key.required_columns_with_info() {
                    if output_schema.iter().any(|f| f.name == *name) {
                        continue;
                    }
                    output_schema.push(OutputField {
                        name: name.clone(),
                        ty: info.ty,
                        nullable: info.nullable,
                        constant: false,
                    });
                }
                key
            }
        };

        for field in &output_schema {
            if field.constant {
                return Err(ProjectionError::Unsupported(format!(
                    "projections cannot contain constant columns: {}",
                    field.name
                )));
            }
        }

        // only grouping keys count; a Normal projection's sorting key is
        // carried in the metadata, not in the key schema
        let key_schema: Vec<(String, ColumnType)> = match kind {
            ProjectionKind::Aggregate => analyzed
                .aggregation_keys
                .iter()
                .map(|k| (k.name.clone(), k.ty))
                .collect(),
            ProjectionKind::Normal => Vec::new(),
        };
        let key_size = key_schema.len();

        let metadata = TableMetadata {
            columns: columns_from_output(&output_schema),
            primary_key: sorting_key.clone().without_definition(),
            sorting_key,
            partition_key: KeyDescription::empty(),
        };

        debug!(
            name = %declaration.name,
            kind = ?kind,
            columns = output_schema.len(),
            key_size,
            "built projection description"
        );

        Ok(ProjectionDescription {
            name: declaration.name.clone(),
            kind,
            definition: declaration.clone(),
            query,
            required_columns: analyzed.required_columns,
            output_schema,
            key_size,
            key_schema,
            metadata,
            primary_key_max_column_name: None,
            partition_value_indices: Vec::new(),
        })
    }

    /// Rebuild the derived state against a changed column set, keeping the
    /// declaration.
    pub fn recalculate(
        &mut self,
        columns: &ColumnsDescription,
        context: &ExecutionContext,
    ) -> Result<(), ProjectionError> {
        *self = Self::from_declaration(&self.definition, columns, context)?;
        Ok(())
    }
}
