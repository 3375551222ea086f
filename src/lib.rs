pub mod parser;

pub mod table;
pub use table::{
    Block, ColumnData, ColumnInfo, ColumnType, ColumnsDescription, ExecutionContext,
    KeyDescription, TableMetadata, VirtualTable, ROW_EXISTS_COLUMN,
};

pub mod executor;

pub mod projection;
pub use projection::{
    min_max_count_projection, ProjectionDescription, ProjectionError, ProjectionKind,
    ProjectionsCollection, MINMAX_COUNT_PROJECTION_NAME,
};
