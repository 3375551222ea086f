pub mod literal;
pub use literal::*;

pub mod function;
pub use function::*;

pub mod scalar_expr;
pub use scalar_expr::*;

pub mod select;
pub use select::*;

pub mod declaration;
pub use declaration::*;
