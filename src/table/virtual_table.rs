use crate::table::{Block, ColumnsDescription};

/// Disposable in-memory table exposing a column set.
///
/// Projection queries are analyzed as if they ran over the owning table;
/// this adapter stands in for it, holding nothing but the column
/// description. One is built per analysis and dropped afterwards.
#[derive(Debug, Clone)]
pub struct VirtualTable {
    columns: ColumnsDescription,
}

impl VirtualTable {
    pub fn new(columns: &ColumnsDescription) -> Self {
        Self { columns: columns.clone() }
    }

    /// Adapter over a concrete block, used when executing a query with the
    /// block as its sole source.
    pub fn from_block(block: &Block) -> Self {
        Self { columns: block.columns_description() }
    }

    pub fn columns(&self) -> &ColumnsDescription {
        &self.columns
    }
}
