pub mod column_type;
pub use column_type::*;

pub mod columns;
pub use columns::*;

pub mod block;
pub use block::*;

pub mod metadata;
pub use metadata::*;

pub mod virtual_table;
pub use virtual_table::*;

pub mod context;
pub use context::*;
