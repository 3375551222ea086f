pub mod analyzer_error;
pub use analyzer_error::*;

pub mod analyze;
pub use analyze::*;
