pub mod aggregates;

pub mod eval;
pub use eval::*;

pub mod pipeline;
pub use pipeline::*;

pub mod actions;
pub use actions::*;
