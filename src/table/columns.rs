use indexmap::IndexMap;

use crate::table::ColumnType;

/// Type and nullability of one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnInfo {
    pub ty: ColumnType,
    pub nullable: bool,
}

impl ColumnInfo {
    pub fn new(ty: ColumnType) -> Self {
        Self { ty, nullable: false }
    }

    pub fn nullable(ty: ColumnType) -> Self {
        Self { ty, nullable: true }
    }
}

/// Ordered description of a table's (or a projection output's) column set.
///
/// The `columns` map keeps insertion order, which is observable: output
/// schemas, required-column lists and canonical renderings all depend on it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnsDescription {
    /// Map of column name -> column metadata
    pub columns: IndexMap<String, ColumnInfo>,
}

impl ColumnsDescription {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a description from `(name, type)` pairs, all non-nullable.
    pub fn from_pairs(pairs: &[(&str, ColumnType)]) -> Self {
        let mut columns = IndexMap::new();
        for (name, ty) in pairs {
            columns.insert(name.to_string(), ColumnInfo::new(*ty));
        }
        Self { columns }
    }

    pub fn get(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn insert(&mut self, name: &str, info: ColumnInfo) {
        self.columns.insert(name.to_string(), info);
    }

    pub fn names(&self) -> Vec<String> {
        self.columns.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ColumnInfo)> {
        self.columns.iter()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_declaration_order() {
        let cols = ColumnsDescription::from_pairs(&[
            ("event_date", ColumnType::String),
            ("id", ColumnType::Int),
            ("value", ColumnType::Float),
        ]);
        assert_eq!(cols.names(), vec!["event_date", "id", "value"]);
        assert!(cols.has("id"));
        assert!(!cols.has("missing"));
        assert_eq!(cols.get("value").unwrap().ty, ColumnType::Float);
    }
}
