use crate::{
    ColumnType, Consistency, Error, Interceptor, Interceptors, PreparedStatement, QueryError,
    Result, RetryPolicy, SerialConsistency, Session, StatementOptions, TableRef, TypeRegistry,
    UdtDefinition, UdtRef,
};
use moka::future::Cache;
use std::{
    fmt::{self, Debug, Formatter},
    sync::Arc,
};

/// Capacity of the caches shared by every context derived from the same root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub prepared_statements: u64,
    pub column_metadata: u64,
    pub user_types: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prepared_statements: 1000,
            column_metadata: 1000,
            user_types: 100,
        }
    }
}

/// The only mutable state, loads happen once per key even under contention.
pub(crate) struct Caches {
    prepared: Cache<String, PreparedStatement>,
    columns: Cache<(TableRef, String), Option<ColumnType>>,
    user_types: Cache<String, Option<Arc<UdtDefinition>>>,
}

impl Caches {
    fn new(config: CacheConfig) -> Self {
        Self {
            prepared: Cache::builder()
                .max_capacity(config.prepared_statements)
                .build(),
            columns: Cache::builder().max_capacity(config.column_metadata).build(),
            user_types: Cache::builder().max_capacity(config.user_types).build(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Options {
    consistency: Consistency,
    serial_consistency: SerialConsistency,
    ttl: Option<u32>,
    writetime: Option<i64>,
    tracing: bool,
    retry_policy: Option<RetryPolicy>,
}

/// Immutable execution configuration.
///
/// Every `with_*` method returns a new context, the receiver is never modified. Derived contexts
/// share the session, the interceptors registered so far and the caches of their root.
///
/// ```rust,ignore
/// let ctx = ExecutionContext::new(session, TableRef::new("shop", "orders"));
/// let strong = ctx.with_consistency(Consistency::All);
/// assert_eq!(ctx.consistency(), Consistency::LocalQuorum);
/// ```
#[derive(Clone)]
pub struct ExecutionContext {
    session: Arc<dyn Session>,
    table: TableRef,
    options: Options,
    interceptors: Arc<Interceptors>,
    caches: Arc<Caches>,
}

impl ExecutionContext {
    pub fn new(session: Arc<dyn Session>, table: TableRef) -> Self {
        Self::with_cache_config(session, table, CacheConfig::default())
    }

    /// Root context with caches of the given capacity.
    pub fn with_cache_config(
        session: Arc<dyn Session>,
        table: TableRef,
        config: CacheConfig,
    ) -> Self {
        Self {
            session,
            table,
            options: Options {
                consistency: Default::default(),
                serial_consistency: Default::default(),
                ttl: None,
                writetime: None,
                tracing: false,
                retry_policy: None,
            },
            interceptors: Default::default(),
            caches: Arc::new(Caches::new(config)),
        }
    }

    pub fn session(&self) -> &Arc<dyn Session> {
        &self.session
    }
    pub fn table(&self) -> &TableRef {
        &self.table
    }
    pub fn consistency(&self) -> Consistency {
        self.options.consistency
    }
    pub fn serial_consistency(&self) -> SerialConsistency {
        self.options.serial_consistency
    }
    /// Seconds.
    pub fn ttl(&self) -> Option<u32> {
        self.options.ttl
    }
    /// Microseconds since the epoch.
    pub fn writetime(&self) -> Option<i64> {
        self.options.writetime
    }
    pub fn tracing(&self) -> bool {
        self.options.tracing
    }
    pub fn retry_policy(&self) -> Option<&RetryPolicy> {
        self.options.retry_policy.as_ref()
    }
    pub fn interceptors(&self) -> &Interceptors {
        &self.interceptors
    }

    pub fn with_table(&self, table: TableRef) -> Self {
        Self {
            table,
            ..self.clone()
        }
    }
    pub fn with_consistency(&self, consistency: Consistency) -> Self {
        let mut result = self.clone();
        result.options.consistency = consistency;
        result
    }
    pub fn with_serial_consistency(&self, serial_consistency: SerialConsistency) -> Self {
        let mut result = self.clone();
        result.options.serial_consistency = serial_consistency;
        result
    }
    pub fn with_ttl(&self, seconds: u32) -> Self {
        let mut result = self.clone();
        result.options.ttl = Some(seconds);
        result
    }
    pub fn with_writetime(&self, micros: i64) -> Self {
        let mut result = self.clone();
        result.options.writetime = Some(micros);
        result
    }
    pub fn with_tracing(&self, tracing: bool) -> Self {
        let mut result = self.clone();
        result.options.tracing = tracing;
        result
    }
    pub fn with_retry_policy(&self, retry_policy: RetryPolicy) -> Self {
        let mut result = self.clone();
        result.options.retry_policy = Some(retry_policy);
        result
    }
    /// Interceptors run in registration order.
    pub fn with_interceptor(&self, interceptor: impl Into<Interceptor>) -> Self {
        Self {
            interceptors: Arc::new(self.interceptors.with(interceptor.into())),
            ..self.clone()
        }
    }

    pub fn statement_options(&self) -> StatementOptions {
        StatementOptions {
            consistency: self.options.consistency,
            serial_consistency: self.options.serial_consistency,
            default_timestamp: self.options.writetime,
            tracing: self.options.tracing,
            retry_policy: self.options.retry_policy.clone(),
            fetch_size: None,
            paging_state: None,
        }
    }

    /// Prepared statement for `cql`, concurrent callers share a single prepare.
    pub async fn resolve_statement(&self, cql: &str) -> Result<PreparedStatement> {
        self.caches
            .prepared
            .try_get_with(cql.to_string(), async {
                log::debug!("Preparing {}", crate::truncate_long!(cql));
                self.session.prepare(cql).await
            })
            .await
            .map_err(|e| {
                let error = Error::new(QueryError::Driver(e))
                    .context(format!("While preparing {}", crate::truncate_long!(cql)));
                log::error!("{:#}", error);
                error
            })
    }

    /// Native type of a column of the context table.
    pub async fn column_type(&self, column: &str) -> Result<ColumnType> {
        self.column_type_of(&self.table, column)
            .await?
            .ok_or_else(|| {
                Error::new(QueryError::schema_mismatch(
                    column,
                    format!("the column does not exist in table {}", self.table),
                ))
            })
    }

    /// Native type of a column of any table, `None` when the column does not exist.
    pub async fn column_type_of(
        &self,
        table: &TableRef,
        column: &str,
    ) -> Result<Option<ColumnType>> {
        self.caches
            .columns
            .try_get_with((table.clone(), column.to_string()), async {
                self.session.column_type(table, column).await
            })
            .await
            .map_err(|e| {
                let error = Error::new(QueryError::Driver(e))
                    .context(format!("While loading the type of {table}.{column}"));
                log::error!("{:#}", error);
                error
            })
    }

    /// Definition of a user defined type.
    pub async fn user_type(&self, udt: &UdtRef) -> Result<Arc<UdtDefinition>> {
        self.caches
            .user_types
            .try_get_with(udt.full_name(), async {
                let definition = self.session.user_type(&udt.keyspace, &udt.name).await?;
                Ok::<_, Error>(definition.map(Arc::new))
            })
            .await
            .map_err(|e| {
                let error = Error::new(QueryError::Driver(e))
                    .context(format!("While loading the type {}", udt.full_name()));
                log::error!("{:#}", error);
                error
            })?
            .ok_or_else(|| {
                Error::new(QueryError::schema_mismatch(
                    udt.full_name(),
                    "the user defined type does not exist",
                ))
            })
    }

    /// Definitions of every user defined type reachable from `types`, including the ones nested
    /// inside other user defined types.
    pub async fn type_registry<'a>(
        &self,
        types: impl IntoIterator<Item = &'a ColumnType>,
    ) -> Result<TypeRegistry> {
        let mut registry = TypeRegistry::new();
        let mut pending: Vec<UdtRef> = Vec::new();
        for ty in types {
            let mut refs = Vec::new();
            ty.udt_refs(&mut refs);
            pending.extend(refs.into_iter().cloned());
        }
        while let Some(udt) = pending.pop() {
            if registry.contains(&udt) {
                continue;
            }
            let definition = self.user_type(&udt).await?;
            for (_, field) in &definition.fields {
                let mut refs = Vec::new();
                field.udt_refs(&mut refs);
                pending.extend(refs.into_iter().cloned());
            }
            registry.insert(definition);
        }
        Ok(registry)
    }
}

impl Debug for ExecutionContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("table", &self.table)
            .field("options", &self.options)
            .field("interceptors", &self.interceptors.len())
            .finish_non_exhaustive()
    }
}
