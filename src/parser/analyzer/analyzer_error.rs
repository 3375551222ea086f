use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalyzerError {
    #[error("unknown column {name}; available columns: {}", candidates.join(", "))]
    UnknownColumn { name: String, candidates: Vec<String> },

    #[error("unknown function {0}")]
    FunctionNotFound(String),

    #[error("wrong number of arguments for {name}, expected {expected}")]
    FunctionArgMismatch { name: String, expected: String },

    #[error("column {0} is not under an aggregate function and not in GROUP BY")]
    NotAnAggregate(String),

    #[error("{0}")]
    Other(String),
}
