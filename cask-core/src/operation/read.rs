use crate::{
    ColumnSpec, ExecutionContext, PagingState, QueryError, RawRow, ReadData, Record, RecordPage,
    Result, ResultPage, ResultStream, Statement, StatementBuilder,
    operation::{decode_page, execute, fetch_more},
};
use bytes::Bytes;
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Read of at most one row.
///
/// A key based read is checked against the row it returns: the raw bytes of the key columns
/// must be exactly the ones that were bound, otherwise the read fails with
/// [`QueryError::Protocol`].
#[derive(Debug, Clone)]
pub struct SingleReadQuery {
    ctx: ExecutionContext,
    data: ReadData,
}

impl SingleReadQuery {
    pub fn new(ctx: ExecutionContext, data: ReadData) -> Self {
        Self { ctx, data }
    }

    pub fn data(&self) -> &ReadData {
        &self.data
    }

    delegate!(
        column(column: impl Into<String>),
        column_with_metadata(column: impl Into<String>),
        allow_filtering(),
    );

    /// The row, `None` when nothing matched. More than one matching row is an error.
    pub async fn execute(&self) -> Result<Option<Record>> {
        let interceptors = self.ctx.interceptors();
        let data = interceptors
            .run_pre_read(&self.ctx, self.data.clone())
            .await?;
        let built = StatementBuilder::new(&self.ctx).read(&data, true).await?;
        let mut page = execute(&self.ctx, &built.statement).await?;
        let mut rows = std::mem::take(&mut page.rows);
        while rows.len() < 2 {
            let Some(paging_state) = page.paging_state.take() else {
                break;
            };
            let next = fetch_more(&self.ctx, &built.statement, &paging_state).await?;
            rows.extend(next.rows);
            page.paging_state = next.paging_state;
        }
        if rows.len() > 1 {
            let error = QueryError::TooManyResults(rows.len());
            log::debug!("{} for {}", error, built.statement);
            return Err(error.into());
        }
        let Some(row) = rows.pop() else {
            return Ok(None);
        };
        check_key(&page.columns, &row, &built.key)?;
        page.rows = vec![row];
        let Some(record) = decode_page(&self.ctx, &page).await?.pop() else {
            return Ok(None);
        };
        interceptors
            .run_post_read(&self.ctx, record)
            .await
            .map(Some)
    }

    /// Submit then block the calling thread until the row is available.
    pub fn execute_blocking(&self) -> Result<Option<Record>> {
        crate::block_on(self.execute())
    }
}

/// Compare the key cells of the returned row with the bound key.
fn check_key(
    columns: &[ColumnSpec],
    row: &RawRow,
    key: &[(String, Option<Bytes>)],
) -> Result<()> {
    for (column, expected) in key {
        let actual = columns
            .iter()
            .position(|v| v.name == *column)
            .and_then(|i| row.get(i));
        let Some(actual) = actual else {
            let error = QueryError::Protocol(format!(
                "the key column `{column}` is missing from the returned row"
            ));
            log::warn!("{}", error);
            return Err(error.into());
        };
        if actual != expected {
            let as_hex = |v: &Option<Bytes>| {
                v.as_deref()
                    .map(|v| format!("0x{}", hex::encode(v)))
                    .unwrap_or_else(|| "null".into())
            };
            log::warn!(
                "Key mismatch on column `{}`: requested {}, received {}",
                column,
                as_hex(expected),
                as_hex(actual),
            );
            return Err(QueryError::Protocol(format!(
                "the returned row does not belong to the requested key (column `{column}`)"
            ))
            .into());
        }
    }
    Ok(())
}

/// Read of any number of rows, either all at once, one page at a time or as a stream.
#[derive(Debug, Clone)]
pub struct ListReadQuery {
    ctx: ExecutionContext,
    data: ReadData,
}

impl ListReadQuery {
    pub fn new(ctx: ExecutionContext, data: ReadData) -> Self {
        Self { ctx, data }
    }

    pub fn data(&self) -> &ReadData {
        &self.data
    }

    delegate!(
        column(column: impl Into<String>),
        column_with_metadata(column: impl Into<String>),
        limit(limit: u32),
        allow_filtering(),
        fetch_size(fetch_size: u32),
        distinct(),
        paging_state(paging_state: Option<PagingState>),
    );

    async fn statement(&self) -> Result<Statement> {
        let data = self
            .ctx
            .interceptors()
            .run_pre_read(&self.ctx, self.data.clone())
            .await?;
        Ok(StatementBuilder::new(&self.ctx)
            .read(&data, false)
            .await?
            .statement)
    }

    async fn records(&self, page: &ResultPage) -> Result<Vec<Record>> {
        let interceptors = self.ctx.interceptors();
        let mut records = decode_page(&self.ctx, page).await?;
        if interceptors.has_post_read() {
            let mut result = Vec::with_capacity(records.len());
            for record in records {
                result.push(interceptors.run_post_read(&self.ctx, record).await?);
            }
            records = result;
        }
        Ok(records)
    }

    /// Every matching row in storage order, fetching all the pages.
    pub async fn execute(&self) -> Result<Vec<Record>> {
        let statement = self.statement().await?;
        let mut page = execute(&self.ctx, &statement).await?;
        let mut result = self.records(&page).await?;
        while let Some(paging_state) = page.paging_state.take() {
            page = fetch_more(&self.ctx, &statement, &paging_state).await?;
            result.extend(self.records(&page).await?);
        }
        Ok(result)
    }

    /// A single page, starting from the paging state of the query if any.
    pub async fn execute_page(&self) -> Result<RecordPage> {
        let statement = self.statement().await?;
        let page = execute(&self.ctx, &statement).await?;
        Ok(RecordPage {
            records: self.records(&page).await?,
            paging_state: page.paging_state,
        })
    }

    pub fn execute_blocking(&self) -> Result<Vec<Record>> {
        crate::block_on(self.execute())
    }

    /// Rows delivered on demand, pages are fetched only when the subscriber asks for more rows
    /// than the ones already buffered.
    pub fn stream(&self) -> ResultStream<Record> {
        self.stream_with(Ok)
    }

    pub(crate) fn stream_with<T, F>(&self, mapper: F) -> ResultStream<T>
    where
        T: Send + 'static,
        F: Fn(Record) -> Result<T> + Send + Sync + 'static,
    {
        let query = Arc::new(self.clone());
        let statement = Arc::new(OnceCell::<Statement>::new());
        ResultStream::new(
            move |paging_state: Option<PagingState>| -> BoxFuture<'static, Result<RecordPage>> {
                let query = query.clone();
                let statement = statement.clone();
                Box::pin(async move {
                    let statement = statement.get_or_try_init(|| query.statement()).await?;
                    let page = match &paging_state {
                        None => execute(&query.ctx, statement).await?,
                        Some(paging_state) => {
                            fetch_more(&query.ctx, statement, paging_state).await?
                        }
                    };
                    Ok(RecordPage {
                        records: query.records(&page).await?,
                        paging_state: page.paging_state,
                    })
                })
            },
            mapper,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ColumnType;

    #[test]
    fn key_check() {
        let columns = [
            ColumnSpec::new("id", ColumnType::Int),
            ColumnSpec::new("name", ColumnType::Text),
        ];
        let row: RawRow = vec![Some(Bytes::from_static(&[0, 0, 0, 7])), None];
        let key = [("id".to_string(), Some(Bytes::from_static(&[0, 0, 0, 7])))];
        assert!(check_key(&columns, &row, &key).is_ok());
        let key = [("id".to_string(), Some(Bytes::from_static(&[0, 0, 0, 8])))];
        let error = check_key(&columns, &row, &key).unwrap_err();
        assert!(matches!(
            error.downcast_ref::<QueryError>(),
            Some(QueryError::Protocol(..))
        ));
        let key = [("day".to_string(), None)];
        assert!(check_key(&columns, &row, &key).is_err());
    }
}
