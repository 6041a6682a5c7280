use crate::{
    BatchStatement, ColumnSpec, ColumnType, PagingState, PreparedStatement, Result, Statement,
    TableRef, UdtDefinition,
    writer::{CqlWriter, GenericCqlWriter},
};
use bytes::Bytes;
use futures::future::BoxFuture;
use std::sync::Arc;

/// Raw cells of a row, `None` is null.
pub type RawRow = Vec<Option<Bytes>>;

/// Label of the column a conditional statement uses to report whether it was applied.
pub const APPLIED_COLUMN: &str = "[applied]";

/// Page of rows as returned by the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultPage {
    pub columns: Arc<[ColumnSpec]>,
    pub rows: Vec<RawRow>,
    /// Present when more pages follow.
    pub paging_state: Option<PagingState>,
}

impl ResultPage {
    /// Page of a statement returning no rows.
    pub fn empty() -> Self {
        Self {
            columns: Arc::from([]),
            rows: Vec::new(),
            paging_state: None,
        }
    }

    pub fn has_more_pages(&self) -> bool {
        self.paging_state.is_some()
    }

    /// Value of the `[applied]` column of the first row, `None` when the statement was not
    /// conditional.
    pub fn was_applied(&self) -> Option<bool> {
        let i = self.columns.iter().position(|v| v.name == APPLIED_COLUMN)?;
        let cell = self.rows.first()?.get(i)?.as_ref()?;
        cell.first().map(|v| *v != 0)
    }
}

/// Asynchronous client of the store, the only boundary to the outside world.
///
/// Timeouts and transport failures are the responsibility of the implementation, they surface
/// as ordinary errors.
pub trait Session: Send + Sync {
    fn prepare<'s>(&'s self, cql: &'s str) -> BoxFuture<'s, Result<PreparedStatement>>;

    fn execute<'s>(&'s self, statement: &'s Statement) -> BoxFuture<'s, Result<ResultPage>>;

    /// Page that follows `paging_state`.
    fn fetch_more<'s>(
        &'s self,
        statement: &'s Statement,
        paging_state: &'s PagingState,
    ) -> BoxFuture<'s, Result<ResultPage>>;

    fn batch<'s>(&'s self, batch: &'s BatchStatement) -> BoxFuture<'s, Result<ResultPage>>;

    /// Live schema lookup, `None` when the column does not exist.
    fn column_type<'s>(
        &'s self,
        table: &'s TableRef,
        column: &'s str,
    ) -> BoxFuture<'s, Result<Option<ColumnType>>>;

    /// Live schema lookup, `None` when the type does not exist.
    fn user_type<'s>(
        &'s self,
        keyspace: &'s str,
        name: &'s str,
    ) -> BoxFuture<'s, Result<Option<UdtDefinition>>>;

    fn cql_writer(&self) -> &dyn CqlWriter {
        &GenericCqlWriter
    }
}
