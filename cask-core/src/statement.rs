use crate::{ColumnSpec, truncate_long};
use bytes::Bytes;
use std::{
    fmt::{self, Display},
    sync::Arc,
};

/// Consistency level of a statement.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Consistency {
    Any,
    One,
    Two,
    Three,
    Quorum,
    All,
    #[default]
    LocalQuorum,
    EachQuorum,
    LocalOne,
}

/// Consistency level of the paxos phase of conditional statements.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SerialConsistency {
    Serial,
    #[default]
    LocalSerial,
}

/// Retry policy handed to the driver, this crate never retries by itself.
#[derive(Default, Debug, Clone, PartialEq, Eq, Hash)]
pub enum RetryPolicy {
    #[default]
    Default,
    Fallthrough,
    DowngradingConsistency,
    /// Policy registered in the driver under this name.
    Custom(String),
}

/// Opaque continuation token of a paginated result.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PagingState(pub Bytes);

impl PagingState {
    pub fn new(value: impl Into<Bytes>) -> Self {
        Self(value.into())
    }
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Statement prepared by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedStatement {
    pub id: Bytes,
    pub cql: String,
    /// Bind markers.
    pub variables: Arc<[ColumnSpec]>,
    /// Columns of the rows it returns.
    pub result_columns: Arc<[ColumnSpec]>,
}

impl Display for PreparedStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", truncate_long!(self.cql))
    }
}

/// Either raw CQL or a prepared statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Unprepared CQL text.
    Raw(String),
    /// Driver prepared handle.
    Prepared(PreparedStatement),
}

impl Query {
    pub fn is_prepared(&self) -> bool {
        matches!(self, Query::Prepared(..))
    }
    pub fn cql(&self) -> &str {
        match self {
            Query::Raw(v) => v,
            Query::Prepared(v) => &v.cql,
        }
    }
}

impl Default for Query {
    fn default() -> Self {
        Self::Raw(Default::default())
    }
}

impl From<&str> for Query {
    fn from(value: &str) -> Self {
        Query::Raw(value.into())
    }
}

impl From<String> for Query {
    fn from(value: String) -> Self {
        Query::Raw(value)
    }
}

impl From<PreparedStatement> for Query {
    fn from(value: PreparedStatement) -> Self {
        Query::Prepared(value)
    }
}

impl Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Raw(query) => write!(f, "{}", truncate_long!(query)),
            Query::Prepared(query) => query.fmt(f),
        }
    }
}

/// Knobs set on the statement when present.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct StatementOptions {
    pub consistency: Consistency,
    pub serial_consistency: SerialConsistency,
    /// Microseconds since the epoch.
    pub default_timestamp: Option<i64>,
    pub tracing: bool,
    pub retry_policy: Option<RetryPolicy>,
    pub fetch_size: Option<u32>,
    pub paging_state: Option<PagingState>,
}

/// Query with its serialized values, ready to be sent.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub query: Query,
    /// One cell per bind marker, `None` is null.
    pub values: Vec<Option<Bytes>>,
    pub options: StatementOptions,
}

impl Statement {
    pub fn new(query: impl Into<Query>, values: Vec<Option<Bytes>>) -> Self {
        Self {
            query: query.into(),
            values,
            options: Default::default(),
        }
    }
    pub fn with_options(mut self, options: StatementOptions) -> Self {
        self.options = options;
        self
    }
    pub fn cql(&self) -> &str {
        self.query.cql()
    }
}

impl Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.query.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchKind {
    /// Atomic.
    Logged,
    /// Best effort.
    Unlogged,
    Counter,
}

/// Several statements submitted at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchStatement {
    pub kind: BatchKind,
    pub statements: Vec<Statement>,
    pub options: StatementOptions,
}
