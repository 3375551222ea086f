use thiserror::Error;

use crate::parser::analyzer::AnalyzerError;
use crate::parser::ParseError;
use crate::table::ConstrainedSetting;

#[derive(Debug, Error)]
pub enum ProjectionError {
    /// The declaration itself is malformed (empty name, empty select list).
    #[error("invalid projection declaration: {0}")]
    InvalidDeclaration(String),

    /// The declaration is well formed but not allowed as a projection.
    #[error("{0}")]
    IllegalProjection(String),

    /// The declaration asks for something projections do not support.
    #[error("{0}")]
    Unsupported(String),

    /// `hints` is either empty or a preformatted suggestion suffix.
    #[error("there is no projection {name} in table{hints}")]
    NoSuchProjection { name: String, hints: String },

    /// Broken internal invariant; messages end with "It's a bug".
    #[error("{0}")]
    Internal(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),
}

impl From<ConstrainedSetting> for ProjectionError {
    fn from(err: ConstrainedSetting) -> Self {
        ProjectionError::Internal(format!("{err}. It's a bug"))
    }
}
