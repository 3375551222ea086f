pub mod error;
pub use error::*;

pub mod description;
pub use description::*;

pub mod min_max_count;
pub use min_max_count::*;

pub mod calculate;

pub mod collection;
pub use collection::*;
