//! In-process [`cask_core::Session`] answering through caller supplied handlers.
//!
//! Nothing is stored: every statement is recorded and matched, by CQL substring, against the
//! handlers and the scripted page sequences registered on the session.

use bytes::Bytes;
use cask_core::{
    APPLIED_COLUMN, BatchStatement, ColumnSpec, ColumnType, Error, PagingState,
    PreparedStatement, Result, ResultPage, Statement, TableRef, TypeRegistry, UdtDefinition,
    Value, codec,
};
use futures::future::BoxFuture;
use log::LevelFilter;
use std::{
    collections::HashMap,
    env,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

pub fn init_logs() {
    let mut logger = env_logger::builder();
    logger
        .is_test(true)
        .format_file(true)
        .format_line_number(true);
    if env::var("RUST_LOG").is_err() {
        logger.filter_level(LevelFilter::Warn);
    }
    let _ = logger.try_init();
}

/// Run the code with logging disabled, for failures that are expected.
#[macro_export]
macro_rules! silent_logs {
    ($($code:tt)+) => {{
        let level = log::max_level();
        log::set_max_level(log::LevelFilter::Off);
        let result = { $($code)+ };
        log::set_max_level(level);
        result
    }};
}

type Handler = Arc<dyn Fn(&Statement) -> Result<ResultPage> + Send + Sync>;
type BatchHandler = Arc<dyn Fn(&BatchStatement) -> Result<ResultPage> + Send + Sync>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Builds a page of rows, the cells are serialized the way a driver would hand them over.
pub fn page<'a>(
    columns: impl IntoIterator<Item = (&'a str, ColumnType)>,
    rows: impl IntoIterator<Item = Vec<Value>>,
    types: &TypeRegistry,
) -> Result<ResultPage> {
    let columns: Arc<[ColumnSpec]> = columns
        .into_iter()
        .map(|(name, ty)| ColumnSpec::new(name, ty))
        .collect();
    let rows = rows
        .into_iter()
        .map(|row| {
            if row.len() != columns.len() {
                return Err(Error::msg(format!(
                    "Row has {} values but the page declares {} columns",
                    row.len(),
                    columns.len()
                )));
            }
            columns
                .iter()
                .zip(row.iter())
                .map(|(c, v)| codec::serialize(&c.name, v, &c.ty, types))
                .collect::<Result<Vec<_>>>()
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(ResultPage {
        columns,
        rows,
        paging_state: None,
    })
}

/// Answer of a conditional statement, `existing` is the row found when it was not applied.
pub fn applied(applied: bool, existing: Vec<(&str, ColumnType, Value)>) -> Result<ResultPage> {
    let mut columns = vec![(APPLIED_COLUMN, ColumnType::Boolean)];
    let mut row = vec![Value::Boolean(Some(applied))];
    for (name, ty, value) in existing {
        columns.push((name, ty));
        row.push(value);
    }
    page(columns, [row], &TypeRegistry::new())
}

fn page_index(paging_state: &PagingState) -> Result<usize> {
    let bytes: [u8; 4] = paging_state
        .as_bytes()
        .try_into()
        .map_err(|_| Error::msg("Unknown paging state"))?;
    Ok(u32::from_be_bytes(bytes) as usize)
}

fn paging_state(index: usize) -> PagingState {
    PagingState::new(Bytes::copy_from_slice(&(index as u32).to_be_bytes()))
}

#[derive(Default)]
struct Counters {
    prepare: AtomicUsize,
    execute: AtomicUsize,
    fetch_more: AtomicUsize,
    batch: AtomicUsize,
    column_type: AtomicUsize,
    user_type: AtomicUsize,
}

/// Scripted session.
///
/// ```rust,ignore
/// let session = MockSession::new()
///     .with_table(&table, [("id", ColumnType::Int), ("name", ColumnType::Text)]);
/// session.on("SELECT", |_| Ok(ResultPage::empty()));
/// let ctx = ExecutionContext::new(Arc::new(session), table);
/// ```
#[derive(Default)]
pub struct MockSession {
    columns: HashMap<(TableRef, String), ColumnType>,
    user_types: HashMap<(String, String), UdtDefinition>,
    prepare_delay: Option<Duration>,
    fail_prepare: Option<String>,
    handlers: Mutex<Vec<(String, Handler)>>,
    scripts: Mutex<Vec<(String, Arc<[ResultPage]>)>>,
    batch_handler: Mutex<Option<BatchHandler>>,
    statements: Mutex<Vec<Statement>>,
    batches: Mutex<Vec<BatchStatement>>,
    counters: Counters,
}

impl MockSession {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_column(mut self, table: &TableRef, column: &str, ty: ColumnType) -> Self {
        self.columns.insert((table.clone(), column.to_string()), ty);
        self
    }

    pub fn with_table<'a>(
        mut self,
        table: &TableRef,
        columns: impl IntoIterator<Item = (&'a str, ColumnType)>,
    ) -> Self {
        for (column, ty) in columns {
            self.columns.insert((table.clone(), column.to_string()), ty);
        }
        self
    }

    pub fn with_user_type(mut self, definition: UdtDefinition) -> Self {
        self.user_types.insert(
            (
                definition.keyspace.to_string(),
                definition.name.to_string(),
            ),
            definition,
        );
        self
    }

    /// Every prepare waits this long before answering.
    pub fn with_prepare_delay(mut self, delay: Duration) -> Self {
        self.prepare_delay = Some(delay);
        self
    }

    /// Every prepare fails with this message.
    pub fn with_failing_prepare(mut self, message: impl Into<String>) -> Self {
        self.fail_prepare = Some(message.into());
        self
    }

    /// Answers the statements whose CQL contains `fragment`, the first registered match wins.
    pub fn on(
        &self,
        fragment: impl Into<String>,
        handler: impl Fn(&Statement) -> Result<ResultPage> + Send + Sync + 'static,
    ) -> &Self {
        lock(&self.handlers).push((fragment.into(), Arc::new(handler)));
        self
    }

    /// Answers the statements whose CQL contains `fragment` with `pages` in order, the paging
    /// state is managed by the session.
    pub fn script_pages(
        &self,
        fragment: impl Into<String>,
        pages: impl IntoIterator<Item = ResultPage>,
    ) -> &Self {
        lock(&self.scripts).push((fragment.into(), pages.into_iter().collect()));
        self
    }

    pub fn on_batch(
        &self,
        handler: impl Fn(&BatchStatement) -> Result<ResultPage> + Send + Sync + 'static,
    ) -> &Self {
        *lock(&self.batch_handler) = Some(Arc::new(handler));
        self
    }

    /// Definitions known to the session, to build pages holding user defined types.
    pub fn registry(&self) -> TypeRegistry {
        let mut result = TypeRegistry::new();
        for definition in self.user_types.values() {
            result.insert(Arc::new(definition.clone()));
        }
        result
    }

    /// Statements executed so far, pagination requests included.
    pub fn statements(&self) -> Vec<Statement> {
        lock(&self.statements).clone()
    }

    pub fn batches(&self) -> Vec<BatchStatement> {
        lock(&self.batches).clone()
    }

    pub fn prepare_count(&self) -> usize {
        self.counters.prepare.load(Ordering::SeqCst)
    }

    pub fn execute_count(&self) -> usize {
        self.counters.execute.load(Ordering::SeqCst)
    }

    pub fn fetch_more_count(&self) -> usize {
        self.counters.fetch_more.load(Ordering::SeqCst)
    }

    pub fn batch_count(&self) -> usize {
        self.counters.batch.load(Ordering::SeqCst)
    }

    pub fn column_type_count(&self) -> usize {
        self.counters.column_type.load(Ordering::SeqCst)
    }

    pub fn user_type_count(&self) -> usize {
        self.counters.user_type.load(Ordering::SeqCst)
    }

    fn script(&self, cql: &str) -> Option<Arc<[ResultPage]>> {
        lock(&self.scripts)
            .iter()
            .find(|(fragment, _)| cql.contains(fragment.as_str()))
            .map(|(_, pages)| pages.clone())
    }

    fn scripted_page(pages: &[ResultPage], index: usize) -> Result<ResultPage> {
        let Some(page) = pages.get(index) else {
            return Err(Error::msg(format!("No page {} was scripted", index)));
        };
        let mut page = page.clone();
        page.paging_state = (index + 1 < pages.len()).then(|| paging_state(index + 1));
        Ok(page)
    }

    fn answer(&self, statement: &Statement) -> Result<ResultPage> {
        lock(&self.statements).push(statement.clone());
        let cql = statement.cql();
        if let Some(pages) = self.script(cql) {
            let index = match &statement.options.paging_state {
                Some(v) => page_index(v)?,
                None => 0,
            };
            return Self::scripted_page(&pages, index);
        }
        let handler = lock(&self.handlers)
            .iter()
            .find(|(fragment, _)| cql.contains(fragment.as_str()))
            .map(|(_, handler)| handler.clone());
        match handler {
            Some(handler) => handler(statement),
            None => Ok(ResultPage::empty()),
        }
    }
}

impl cask_core::Session for MockSession {
    fn prepare<'s>(&'s self, cql: &'s str) -> BoxFuture<'s, Result<PreparedStatement>> {
        Box::pin(async move {
            let n = self.counters.prepare.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.prepare_delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(message) = &self.fail_prepare {
                return Err(Error::msg(message.clone()));
            }
            Ok(PreparedStatement {
                id: Bytes::copy_from_slice(&(n as u64).to_be_bytes()),
                cql: cql.to_string(),
                variables: Arc::from([]),
                result_columns: Arc::from([]),
            })
        })
    }

    fn execute<'s>(&'s self, statement: &'s Statement) -> BoxFuture<'s, Result<ResultPage>> {
        Box::pin(async move {
            self.counters.execute.fetch_add(1, Ordering::SeqCst);
            self.answer(statement)
        })
    }

    fn fetch_more<'s>(
        &'s self,
        statement: &'s Statement,
        paging_state: &'s PagingState,
    ) -> BoxFuture<'s, Result<ResultPage>> {
        Box::pin(async move {
            self.counters.fetch_more.fetch_add(1, Ordering::SeqCst);
            let mut statement = statement.clone();
            statement.options.paging_state = Some(paging_state.clone());
            lock(&self.statements).push(statement.clone());
            let Some(pages) = self.script(statement.cql()) else {
                return Err(Error::msg(format!(
                    "No pages were scripted for {}",
                    statement
                )));
            };
            Self::scripted_page(&pages, page_index(paging_state)?)
        })
    }

    fn batch<'s>(&'s self, batch: &'s BatchStatement) -> BoxFuture<'s, Result<ResultPage>> {
        Box::pin(async move {
            self.counters.batch.fetch_add(1, Ordering::SeqCst);
            lock(&self.batches).push(batch.clone());
            let handler = lock(&self.batch_handler).clone();
            match handler {
                Some(handler) => handler(batch),
                None => Ok(ResultPage::empty()),
            }
        })
    }

    fn column_type<'s>(
        &'s self,
        table: &'s TableRef,
        column: &'s str,
    ) -> BoxFuture<'s, Result<Option<ColumnType>>> {
        Box::pin(async move {
            self.counters.column_type.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .columns
                .get(&(table.clone(), column.to_string()))
                .cloned())
        })
    }

    fn user_type<'s>(
        &'s self,
        keyspace: &'s str,
        name: &'s str,
    ) -> BoxFuture<'s, Result<Option<UdtDefinition>>> {
        Box::pin(async move {
            self.counters.user_type.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .user_types
                .get(&(keyspace.to_string(), name.to_string()))
                .cloned())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cask_core::Session;

    #[tokio::test]
    async fn scripted_pages_carry_paging_state() {
        let session = MockSession::new();
        let types = TypeRegistry::new();
        let first = page([("v", ColumnType::Int)], [vec![Value::Int(Some(1))]], &types).unwrap();
        let second = page([("v", ColumnType::Int)], [vec![Value::Int(Some(2))]], &types).unwrap();
        session.script_pages("FROM t", [first, second]);
        let statement = Statement::new("SELECT v FROM t", vec![]);
        let page = session.execute(&statement).await.unwrap();
        let state = page.paging_state.clone().expect("A second page should follow");
        assert_eq!(page.rows, vec![vec![Some(Bytes::from_static(&[0, 0, 0, 1]))]]);
        let page = session.fetch_more(&statement, &state).await.unwrap();
        assert!(!page.has_more_pages());
        assert_eq!(page.rows, vec![vec![Some(Bytes::from_static(&[0, 0, 0, 2]))]]);
        assert_eq!(session.execute_count(), 1);
        assert_eq!(session.fetch_more_count(), 1);
        assert_eq!(session.statements().len(), 2);
    }

    #[tokio::test]
    async fn first_matching_handler_answers() {
        let session = MockSession::new();
        session
            .on("INSERT", |_| applied(true, vec![]))
            .on("INSERT INTO t", |_| applied(false, vec![]));
        let page = session
            .execute(&Statement::new("INSERT INTO t (a) VALUES (?)", vec![]))
            .await
            .unwrap();
        assert_eq!(page.was_applied(), Some(true));
        let page = session
            .execute(&Statement::new("SELECT a FROM t", vec![]))
            .await
            .unwrap();
        assert_eq!(page, ResultPage::empty());
    }

    #[test]
    fn page_rejects_short_rows() {
        let result = page(
            [("a", ColumnType::Int), ("b", ColumnType::Text)],
            [vec![Value::Int(Some(1))]],
            &TypeRegistry::new(),
        );
        assert!(result.is_err());
    }
}
