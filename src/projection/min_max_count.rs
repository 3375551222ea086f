use tracing::debug;

use crate::parser::analyzer::{analyze, columns_from_output, AnalysisOptions, OutputSource};
use crate::parser::ast::{
    ProjectionDeclaration, ProjectionSelect, ScalarExpr, SelectItem,
};
use crate::projection::{ProjectionDescription, ProjectionError, ProjectionKind};
use crate::table::{
    ColumnsDescription, ExecutionContext, KeyDescription, TableMetadata, VirtualTable,
};

/// Reserved name of the automatic summary projection.
pub const MINMAX_COUNT_PROJECTION_NAME: &str = "_minmax_count_projection";

/// Rewrite `modulo` calls to `moduloLegacy` recursively. Partition
/// expressions predate the current modulo semantics and keep the legacy
/// spelling so stored partition values stay comparable.
pub fn modulo_to_modulo_legacy(expr: &ScalarExpr) -> ScalarExpr {
    match expr {
        ScalarExpr::Function(f) => {
            let name = if f.name == "modulo" { "moduloLegacy" } else { f.name.as_str() };
            ScalarExpr::call(name, f.args.iter().map(modulo_to_modulo_legacy).collect())
        }
        other => other.clone(),
    }
}

/// Synthesize the summary projection: per-column min/max, primary-key
/// min/max, and a row count, grouped by the partition expressions.
pub fn min_max_count_projection(
    columns: &ColumnsDescription,
    partition_expressions: &[ScalarExpr],
    minmax_columns: &[String],
    primary_key: &[ScalarExpr],
    context: &ExecutionContext,
) -> Result<ProjectionDescription, ProjectionError> {
    let mut select = Vec::new();
    for column in minmax_columns {
        select.push(SelectItem::expr(ScalarExpr::call(
            "min",
            vec![ScalarExpr::column(column)],
        )));
        select.push(SelectItem::expr(ScalarExpr::call(
            "max",
            vec![ScalarExpr::column(column)],
        )));
    }

    if let Some(pk) = primary_key.first() {
        let already_minmax =
            matches!(pk, ScalarExpr::Column(name) if minmax_columns.contains(name));
        if !already_minmax {
            select.push(SelectItem::expr(ScalarExpr::call("min", vec![pk.clone()])));
            select.push(SelectItem::expr(ScalarExpr::call("max", vec![pk.clone()])));
        }
    }
    select.push(SelectItem::expr(ScalarExpr::call("count", vec![])));

    let group_by: Vec<ScalarExpr> =
        partition_expressions.iter().map(modulo_to_modulo_legacy).collect();

    let definition = ProjectionDeclaration {
        name: MINMAX_COUNT_PROJECTION_NAME.to_string(),
        query: ProjectionSelect { select, group_by, order_by: Vec::new() },
    };

    let query = definition.query.to_select_query();
    let table = VirtualTable::new(columns);
    let analyzed = analyze(&query, &table, &AnalysisOptions::for_projection(), context)?;

    // constant partition values carry no information per block; drop them
    let mut output_schema = Vec::new();
    let mut partition_value_indices = Vec::new();
    for (field, source) in analyzed.output.iter().zip(&analyzed.sources) {
        if field.constant {
            continue;
        }
        if matches!(source, OutputSource::Key(_)) {
            partition_value_indices.push(output_schema.len());
        }
        output_schema.push(field.clone());
    }

    // positional convention: [keys..., minmax pairs..., min(pk), max(pk), count()]
    let expected = 2 * (minmax_columns.len() + usize::from(!primary_key.is_empty()))
        + 1
        + partition_value_indices.len();
    let primary_key_max_column_name = if !primary_key.is_empty()
        && output_schema.len() == expected
        && output_schema.len() >= 2
    {
        Some(output_schema[output_schema.len() - 2].name.clone())
    } else {
        None
    };

    debug!(
        columns = output_schema.len(),
        partition_values = partition_value_indices.len(),
        pk_max = ?primary_key_max_column_name,
        "built summary projection"
    );

    Ok(ProjectionDescription {
        name: MINMAX_COUNT_PROJECTION_NAME.to_string(),
        kind: ProjectionKind::Aggregate,
        query,
        required_columns: analyzed.required_columns,
        definition,
        key_size: 0,
        key_schema: Vec::new(),
        metadata: TableMetadata {
            columns: columns_from_output(&output_schema),
            sorting_key: KeyDescription::empty(),
            primary_key: KeyDescription::empty(),
            partition_key: KeyDescription::empty(),
        },
        output_schema,
        primary_key_max_column_name,
        partition_value_indices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ColumnType;

    fn columns() -> ColumnsDescription {
        ColumnsDescription::from_pairs(&[
            ("id", ColumnType::Int),
            ("event_date", ColumnType::String),
            ("region", ColumnType::String),
        ])
    }

    fn names(projection: &ProjectionDescription) -> Vec<&str> {
        projection.output_schema.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn shape_with_two_minmax_columns_and_primary_key() {
        let projection = min_max_count_projection(
            &columns(),
            &[],
            &["event_date".to_string(), "region".to_string()],
            &[ScalarExpr::column("id")],
            &ExecutionContext::new(),
        )
        .unwrap();
        assert_eq!(
            names(&projection),
            vec![
                "min(event_date)",
                "max(event_date)",
                "min(region)",
                "max(region)",
                "min(id)",
                "max(id)",
                "count()"
            ]
        );
        assert_eq!(projection.primary_key_max_column_name.as_deref(), Some("max(id)"));
        assert_eq!(projection.kind, ProjectionKind::Aggregate);
        assert!(projection.partition_value_indices.is_empty());
    }

    #[test]
    fn primary_key_already_in_minmax_is_not_repeated() {
        let projection = min_max_count_projection(
            &columns(),
            &[],
            &["event_date".to_string()],
            &[ScalarExpr::column("event_date")],
            &ExecutionContext::new(),
        )
        .unwrap();
        assert_eq!(names(&projection), vec!["min(event_date)", "max(event_date)", "count()"]);
        assert_eq!(projection.primary_key_max_column_name, None);
    }

    #[test]
    fn partition_expressions_become_group_keys_with_legacy_modulo() {
        let partition = ScalarExpr::call(
            "modulo",
            vec![ScalarExpr::column("id"), ScalarExpr::parse(
                &mut crate::parser::Cursor::new("4"),
            )
            .unwrap()],
        );
        let projection = min_max_count_projection(
            &columns(),
            &[partition],
            &["event_date".to_string()],
            &[],
            &ExecutionContext::new(),
        )
        .unwrap();
        assert_eq!(
            names(&projection),
            vec!["moduloLegacy(id, 4)", "min(event_date)", "max(event_date)", "count()"]
        );
        assert_eq!(projection.partition_value_indices, vec![0]);
        assert_eq!(projection.query.group_by[0].to_string(), "moduloLegacy(id, 4)");
    }

    #[test]
    fn no_primary_key_means_no_pk_max_column() {
        let projection = min_max_count_projection(
            &columns(),
            &[],
            &["event_date".to_string()],
            &[],
            &ExecutionContext::new(),
        )
        .unwrap();
        assert_eq!(names(&projection), vec!["min(event_date)", "max(event_date)", "count()"]);
        assert_eq!(projection.primary_key_max_column_name, None);
    }
}
