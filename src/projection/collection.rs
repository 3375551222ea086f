use std::fmt;

use indexmap::IndexMap;
use tracing::debug;

use crate::executor::ExpressionActions;
use crate::parser::ast::{parse_declaration_list, ScalarExpr};
use crate::projection::{ProjectionDescription, ProjectionError};
use crate::table::{ColumnsDescription, ExecutionContext, VirtualTable};

/// Ordered, name-indexed set of projections of one table.
///
/// Order is observable and survives serialization; the canonical text of a
/// collection is the comma-separated canonical text of its members in order.
/// Not internally synchronized; callers serialize mutations.
#[derive(Debug, Clone, Default)]
pub struct ProjectionsCollection {
    projections: IndexMap<String, ProjectionDescription>,
}

impl PartialEq for ProjectionsCollection {
    fn eq(&self, other: &Self) -> bool {
        self.projections.len() == other.projections.len()
            && self
                .projections
                .iter()
                .zip(other.projections.iter())
                .all(|((an, av), (bn, bv))| an == bn && av == bv)
    }
}

impl fmt::Display for ProjectionsCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, projection) in self.projections.values().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{projection}")?;
        }
        Ok(())
    }
}

impl ProjectionsCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a canonical comma-separated declaration list and validate every
    /// declaration against `columns`.
    pub fn parse(
        text: &str,
        columns: &ColumnsDescription,
        context: &ExecutionContext,
    ) -> Result<Self, ProjectionError> {
        let mut collection = Self::new();
        for declaration in parse_declaration_list(text)? {
            let projection =
                ProjectionDescription::from_declaration(&declaration, columns, context)?;
            collection.add(projection, None, false, false)?;
        }
        Ok(collection)
    }

    pub fn has(&self, name: &str) -> bool {
        self.projections.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Result<&ProjectionDescription, ProjectionError> {
        self.projections.get(name).ok_or_else(|| ProjectionError::NoSuchProjection {
            name: name.to_string(),
            hints: self.hints_for(name),
        })
    }

    /// Insert a projection. `first` wins over `after_name`; an unmatched
    /// `after_name` appends at the end. A name collision fails unless
    /// `if_not_exists`, which leaves the collection untouched.
    pub fn add(
        &mut self,
        projection: ProjectionDescription,
        after_name: Option<&str>,
        first: bool,
        if_not_exists: bool,
    ) -> Result<(), ProjectionError> {
        if self.has(&projection.name) {
            if if_not_exists {
                return Ok(());
            }
            return Err(ProjectionError::IllegalProjection(format!(
                "cannot add projection {}: projection with this name already exists",
                projection.name
            )));
        }
        let position = if first {
            0
        } else if let Some(after) = after_name {
            match self.projections.get_index_of(after) {
                Some(i) => i + 1,
                None => self.projections.len(),
            }
        } else {
            self.projections.len()
        };
        debug!(name = %projection.name, position, "adding projection");
        self.projections.shift_insert(position, projection.name.clone(), projection);
        Ok(())
    }

    /// Remove a projection by name. A miss fails with name hints unless
    /// `if_exists`.
    pub fn remove(
        &mut self,
        name: &str,
        if_exists: bool,
    ) -> Result<Option<ProjectionDescription>, ProjectionError> {
        match self.projections.shift_remove(name) {
            Some(projection) => {
                debug!(name, "removed projection");
                Ok(Some(projection))
            }
            None if if_exists => Ok(None),
            None => Err(ProjectionError::NoSuchProjection {
                name: name.to_string(),
                hints: self.hints_for(name),
            }),
        }
    }

    /// Rebuild every projection against a changed column set.
    pub fn recalculate(
        &mut self,
        columns: &ColumnsDescription,
        context: &ExecutionContext,
    ) -> Result<(), ProjectionError> {
        for projection in self.projections.values_mut() {
            projection.recalculate(columns, context)?;
        }
        Ok(())
    }

    /// One combined action set computing the source expressions of every
    /// projection, for callers that materialize them all in one pass.
    pub fn single_expression(
        &self,
        columns: &ColumnsDescription,
        context: &ExecutionContext,
    ) -> Result<ExpressionActions, ProjectionError> {
        let mut expressions: Vec<ScalarExpr> = Vec::new();
        for projection in self.projections.values() {
            for item in &projection.query.select {
                expressions.push(item.expr.clone());
            }
            expressions.extend(projection.query.group_by.iter().cloned());
            for order in &projection.query.order_by {
                expressions.push(order.expr.clone());
            }
        }
        let table = VirtualTable::new(columns);
        Ok(ExpressionActions::for_expressions(&expressions, &table, context)?)
    }

    pub fn names(&self) -> Vec<String> {
        self.projections.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProjectionDescription> {
        self.projections.values()
    }

    pub fn len(&self) -> usize {
        self.projections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projections.is_empty()
    }

    fn hints_for(&self, name: &str) -> String {
        let close: Vec<String> = self
            .projections
            .keys()
            .filter(|candidate| levenshtein(name, candidate) <= 2)
            .cloned()
            .collect();
        if close.is_empty() {
            String::new()
        } else {
            let quoted: Vec<String> = close.iter().map(|n| format!("'{n}'")).collect();
            format!(". Maybe you meant: [{}]", quoted.join(", "))
        }
    }
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.iter().enumerate() {
        let mut current = vec![i + 1];
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current.push(substitution.min(previous[j + 1] + 1).min(current[j] + 1));
        }
        previous = current;
    }
    previous[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ColumnType;

    fn columns() -> ColumnsDescription {
        ColumnsDescription::from_pairs(&[
            ("id", ColumnType::Int),
            ("kind", ColumnType::String),
            ("event_date", ColumnType::String),
        ])
    }

    fn projection(text: &str) -> ProjectionDescription {
        let declaration =
            crate::parser::ast::ProjectionDeclaration::parse_str(text).unwrap();
        ProjectionDescription::from_declaration(
            &declaration,
            &columns(),
            &ExecutionContext::new(),
        )
        .unwrap()
    }

    fn sample() -> ProjectionsCollection {
        let mut c = ProjectionsCollection::new();
        c.add(projection("a (SELECT id ORDER BY id)"), None, false, false).unwrap();
        c.add(projection("b (SELECT kind, count() GROUP BY kind)"), None, false, false)
            .unwrap();
        c
    }

    #[test]
    fn canonical_text_round_trips() {
        let collection = sample();
        let text = collection.to_string();
        let reparsed =
            ProjectionsCollection::parse(&text, &columns(), &ExecutionContext::new()).unwrap();
        assert_eq!(reparsed.names(), collection.names());
        assert_eq!(reparsed, collection);
        assert_eq!(reparsed.to_string(), text);
    }

    #[test]
    fn empty_collection_renders_empty_text() {
        let collection = ProjectionsCollection::new();
        assert_eq!(collection.to_string(), "");
        let reparsed =
            ProjectionsCollection::parse("", &columns(), &ExecutionContext::new()).unwrap();
        assert!(reparsed.is_empty());
    }

    #[test]
    fn add_is_idempotent_with_if_not_exists() {
        let mut collection = sample();
        let before = collection.names();
        collection
            .add(projection("a (SELECT kind ORDER BY kind)"), None, false, true)
            .unwrap();
        assert_eq!(collection.names(), before);
        // the original definition survives
        assert_eq!(
            collection.get("a").unwrap().definition.to_string(),
            "a (SELECT id ORDER BY id)"
        );

        let err = collection
            .add(projection("a (SELECT kind ORDER BY kind)"), None, false, false)
            .unwrap_err();
        assert!(matches!(err, ProjectionError::IllegalProjection(_)));
    }

    #[test]
    fn add_after_name_places_right_after() {
        let mut collection = sample();
        collection
            .add(projection("c (SELECT event_date ORDER BY event_date)"), Some("a"), false, false)
            .unwrap();
        assert_eq!(collection.names(), vec!["a", "c", "b"]);
    }

    #[test]
    fn add_after_missing_name_appends() {
        let mut collection = sample();
        collection
            .add(projection("c (SELECT event_date ORDER BY event_date)"), Some("zzz"), false, false)
            .unwrap();
        assert_eq!(collection.names(), vec!["a", "b", "c"]);
    }

    #[test]
    fn add_first_prepends() {
        let mut collection = sample();
        collection
            .add(projection("c (SELECT event_date ORDER BY event_date)"), None, true, false)
            .unwrap();
        assert_eq!(collection.names(), vec!["c", "a", "b"]);
    }

    #[test]
    fn remove_miss_suggests_close_names() {
        let mut collection = sample();
        let err = collection.remove("ab", false).unwrap_err();
        match err {
            ProjectionError::NoSuchProjection { name, hints } => {
                assert_eq!(name, "ab");
                assert!(hints.contains("'a'"));
                assert!(hints.contains("'b'"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(collection.remove("zzzzzz", true).unwrap().is_none());

        let removed = collection.remove("a", false).unwrap().unwrap();
        assert_eq!(removed.name, "a");
        assert_eq!(collection.names(), vec!["b"]);
    }

    #[test]
    fn equality_is_order_sensitive() {
        let forward = sample();
        let mut reversed = ProjectionsCollection::new();
        reversed
            .add(projection("b (SELECT kind, count() GROUP BY kind)"), None, false, false)
            .unwrap();
        reversed.add(projection("a (SELECT id ORDER BY id)"), None, false, false).unwrap();
        assert_ne!(forward, reversed);
    }

    #[test]
    fn single_expression_unions_all_sources() {
        let collection = sample();
        let actions =
            collection.single_expression(&columns(), &ExecutionContext::new()).unwrap();
        let names = actions.output_names();
        assert!(names.contains(&"id".to_string()));
        assert!(names.contains(&"kind".to_string()));
    }

    #[test]
    fn single_expression_covers_order_by_only_columns() {
        let mut collection = sample();
        collection
            .add(projection("c (SELECT id ORDER BY event_date)"), None, false, false)
            .unwrap();
        let actions =
            collection.single_expression(&columns(), &ExecutionContext::new()).unwrap();
        // event_date is only referenced by the sorting key of c
        assert!(actions.output_names().contains(&"event_date".to_string()));
    }

    #[test]
    fn levenshtein_distances() {
        assert_eq!(levenshtein("abc", "abc"), 0);
        assert_eq!(levenshtein("abc", "abd"), 1);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
    }
}
