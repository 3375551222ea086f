use serde_json::{Map, Value};

use crate::table::{ColumnInfo, ColumnType, ColumnsDescription};

/// Reserved soft-delete marker column. A value of `1` means the row is
/// logically present; `calculate` filters on it when the column exists.
pub const ROW_EXISTS_COLUMN: &str = "_row_exists";

/// One named, typed column of values.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnData {
    pub name: String,
    pub ty: ColumnType,
    pub values: Vec<Value>,
}

impl ColumnData {
    pub fn new(name: &str, ty: ColumnType, values: Vec<Value>) -> Self {
        Self { name: name.to_string(), ty, values }
    }
}

/// An in-memory batch of rows laid out column-wise.
///
/// All columns hold the same number of values. An empty column list means an
/// empty block with zero rows; a block can also carry columns with zero
/// values (a header-only block).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    pub columns: Vec<ColumnData>,
}

impl Block {
    pub fn new(columns: Vec<ColumnData>) -> Self {
        Self { columns }
    }

    pub fn rows(&self) -> usize {
        self.columns.first().map(|c| c.values.len()).unwrap_or(0)
    }

    pub fn has(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn by_name(&self, name: &str) -> Option<&ColumnData> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Cell at `(column name, row index)`, if both exist.
    pub fn value(&self, name: &str, row: usize) -> Option<&Value> {
        self.by_name(name).and_then(|c| c.values.get(row))
    }

    /// One row as a name -> value map, for row-wise expression evaluation.
    pub fn row_as_map(&self, row: usize) -> Map<String, Value> {
        let mut map = Map::new();
        for column in &self.columns {
            if let Some(v) = column.values.get(row) {
                map.insert(column.name.clone(), v.clone());
            }
        }
        map
    }

    pub fn rows_as_maps(&self) -> Vec<Map<String, Value>> {
        (0..self.rows()).map(|i| self.row_as_map(i)).collect()
    }

    /// Append another block with the same column layout.
    pub fn append(&mut self, other: &Block) {
        debug_assert_eq!(self.column_names(), other.column_names());
        for (dst, src) in self.columns.iter_mut().zip(&other.columns) {
            dst.values.extend(src.values.iter().cloned());
        }
    }

    /// Describe this block's columns; a column observed with any null cell is
    /// reported nullable.
    pub fn columns_description(&self) -> ColumnsDescription {
        let mut description = ColumnsDescription::new();
        for column in &self.columns {
            let nullable = column.ty == ColumnType::Null
                || column.values.iter().any(|v| v.is_null());
            description.insert(&column.name, ColumnInfo { ty: column.ty, nullable });
        }
        description
    }
}
