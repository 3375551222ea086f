use crate::parser::analyzer::AnalyzerError;
use crate::parser::ast::{OrderBy, ScalarExpr};
use crate::table::{ColumnInfo, ColumnsDescription};

/// Sorting/primary/partition key of a table or projection.
///
/// `definition` is the displayable form of the key; structural keys (the
/// derived primary key of a projection) carry none. `expressions` are the
/// individual key expressions, and `required` lists the columns the key
/// reads, resolved against the column set the key was built from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyDescription {
    pub definition: Option<ScalarExpr>,
    pub expressions: Vec<ScalarExpr>,
    pub required: Vec<(String, ColumnInfo)>,
}

impl KeyDescription {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.expressions.is_empty()
    }

    /// Build a key from one expression. A `tuple(...)` call is a composite
    /// key; its arguments become the individual key expressions.
    pub fn from_expression(
        expr: &ScalarExpr,
        columns: &ColumnsDescription,
    ) -> Result<Self, AnalyzerError> {
        let expressions = match expr {
            ScalarExpr::Function(f) if f.name == "tuple" => f.args.clone(),
            other => vec![other.clone()],
        };
        let required = Self::resolve_required(&expressions, columns)?;
        Ok(Self { definition: Some(expr.clone()), expressions, required })
    }

    /// Build a key from an ORDER BY list; an empty list yields the empty key.
    pub fn from_order_by(
        order_by: &[OrderBy],
        columns: &ColumnsDescription,
    ) -> Result<Self, AnalyzerError> {
        if order_by.is_empty() {
            return Ok(Self::empty());
        }
        let expressions: Vec<ScalarExpr> = order_by.iter().map(|o| o.expr.clone()).collect();
        let definition = if expressions.len() == 1 {
            expressions[0].clone()
        } else {
            ScalarExpr::call("tuple", expressions.clone())
        };
        let required = Self::resolve_required(&expressions, columns)?;
        Ok(Self { definition: Some(definition), expressions, required })
    }

    /// Drop the displayable definition, keeping the structure.
    pub fn without_definition(mut self) -> Self {
        self.definition = None;
        self
    }

    pub fn column_names(&self) -> Vec<String> {
        self.required.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn required_columns_with_info(&self) -> impl Iterator<Item = &(String, ColumnInfo)> {
        self.required.iter()
    }

    fn resolve_required(
        expressions: &[ScalarExpr],
        columns: &ColumnsDescription,
    ) -> Result<Vec<(String, ColumnInfo)>, AnalyzerError> {
        let mut required: Vec<(String, ColumnInfo)> = Vec::new();
        let mut names = Vec::new();
        for expr in expressions {
            expr.collect_columns(&mut names);
        }
        for name in names {
            if required.iter().any(|(n, _)| *n == name) {
                continue;
            }
            let info = columns.get(&name).ok_or_else(|| AnalyzerError::UnknownColumn {
                name: name.clone(),
                candidates: columns.names(),
            })?;
            required.push((name, *info));
        }
        Ok(required)
    }
}

/// Table-metadata-shaped description of a projection's output: its columns
/// and key structure, usable wherever table metadata is expected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableMetadata {
    pub columns: ColumnsDescription,
    pub sorting_key: KeyDescription,
    pub primary_key: KeyDescription,
    pub partition_key: KeyDescription,
}

impl TableMetadata {
    pub fn sorting_key_columns(&self) -> Vec<String> {
        self.sorting_key.column_names()
    }

    pub fn primary_key_columns(&self) -> Vec<String> {
        self.primary_key.column_names()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ColumnType;

    fn columns() -> ColumnsDescription {
        ColumnsDescription::from_pairs(&[
            ("a", ColumnType::Int),
            ("b", ColumnType::String),
        ])
    }

    #[test]
    fn key_from_single_expression() {
        let key = KeyDescription::from_expression(&ScalarExpr::column("a"), &columns()).unwrap();
        assert_eq!(key.expressions.len(), 1);
        assert_eq!(key.column_names(), vec!["a"]);
        assert!(key.definition.is_some());
    }

    #[test]
    fn key_from_tuple_splits_expressions() {
        let expr = ScalarExpr::call("tuple", vec![ScalarExpr::column("a"), ScalarExpr::column("b")]);
        let key = KeyDescription::from_expression(&expr, &columns()).unwrap();
        assert_eq!(key.expressions.len(), 2);
        assert_eq!(key.column_names(), vec!["a", "b"]);
    }

    #[test]
    fn key_from_unknown_column_fails() {
        let result = KeyDescription::from_expression(&ScalarExpr::column("nope"), &columns());
        assert!(matches!(result, Err(AnalyzerError::UnknownColumn { .. })));
    }

    #[test]
    fn empty_order_by_yields_empty_key() {
        let key = KeyDescription::from_order_by(&[], &columns()).unwrap();
        assert!(key.is_empty());
        assert!(key.definition.is_none());
    }

    #[test]
    fn without_definition_clears_display_form() {
        let key = KeyDescription::from_expression(&ScalarExpr::column("a"), &columns())
            .unwrap()
            .without_definition();
        assert!(key.definition.is_none());
        assert_eq!(key.column_names(), vec!["a"]);
    }
}
