use crate::Record;
use std::sync::Arc;
use thiserror::Error;

/// Failures raised by the query layer itself.
///
/// They travel inside [`crate::Error`] (an `anyhow::Error`) like every other failure, use
/// `error.downcast_ref::<QueryError>()` to tell them apart from driver errors.
#[derive(Debug, Error)]
pub enum QueryError {
    /// A single row read matched more than one row.
    #[error("Expected at most one row, the query returned {0} or more")]
    TooManyResults(usize),

    /// The row returned by the store does not belong to the requested key.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A conditional write or delete was not applied.
    #[error("The condition `{condition}` was not met")]
    ConditionNotMet {
        condition: String,
        /// Current values of the row, when the store returned them.
        existing: Option<Box<Record>>,
    },

    /// An interceptor rejected the operation.
    #[error("Constraint violated: {0}")]
    Constraint(String),

    /// A value cannot be reconciled with the native type of its column.
    #[error("Column `{column}`: {message}")]
    SchemaMismatch { column: String, message: String },

    /// Misuse of a result stream.
    #[error("Stream error: {0}")]
    StreamState(String),

    /// A blocking call was made where it would stall the runtime.
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// The query data breaks one of its invariants.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Driver failure shared between every caller waiting on the same cache entry.
    #[error("{0:#}")]
    Driver(Arc<anyhow::Error>),
}

impl QueryError {
    pub fn schema_mismatch(column: impl Into<String>, message: impl Into<String>) -> Self {
        QueryError::SchemaMismatch {
            column: column.into(),
            message: message.into(),
        }
    }
    pub fn constraint(message: impl Into<String>) -> Self {
        QueryError::Constraint(message.into())
    }
    pub fn invalid(message: impl Into<String>) -> Self {
        QueryError::InvalidQuery(message.into())
    }
}

/// Shortcut to inspect the kind of an error.
pub fn query_error(error: &crate::Error) -> Option<&QueryError> {
    error.downcast_ref::<QueryError>()
}
