use crate::{
    BatchComposer, BatchEntry, Batchable, ExecutionContext, Predicate, QueryError, Result,
    StatementBuilder, Value, WriteData, WriteOutcome,
    operation::{execute, write_outcome},
};
use futures::future::BoxFuture;
use std::sync::Arc;

/// Insert or update of a row, or of every row matching a where clause.
///
/// Built from [`ExecutionContext::write_with_key`] or [`ExecutionContext::write_where`]. The
/// builder methods return a modified copy, a query can be reused as a template.
///
/// ```rust,ignore
/// let outcome = ctx
///     .write_with_key([("id", 42)])
///     .set("name", "desk")
///     .add_to_set("tags", vec!["wood".to_string()])
///     .execute()
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct WriteQuery {
    ctx: ExecutionContext,
    data: WriteData,
    fail_on_conflict: bool,
    /// The pre-write hooks already ran on `data`.
    intercepted: bool,
}

impl WriteQuery {
    pub fn new(ctx: ExecutionContext, data: WriteData) -> Self {
        Self {
            ctx,
            data,
            fail_on_conflict: false,
            intercepted: false,
        }
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.ctx
    }
    pub fn data(&self) -> &WriteData {
        &self.data
    }

    delegate!(
        set(column: impl Into<String>, value: impl Into<Value>),
        unset(column: impl Into<String>),
        add_to_set(column: impl Into<String>, values: impl Into<Value>),
        remove_from_set(column: impl Into<String>, values: impl Into<Value>),
        append_to_list(column: impl Into<String>, values: impl Into<Value>),
        prepend_to_list(column: impl Into<String>, values: impl Into<Value>),
        remove_from_list(column: impl Into<String>, values: impl Into<Value>),
        put_in_map(column: impl Into<String>, entries: impl Into<Value>),
        remove_from_map(column: impl Into<String>, keys: impl Into<Value>),
        only_if(predicate: Predicate),
        if_not_exists(),
    );

    /// Report a conditional write that was not applied as [`QueryError::ConditionNotMet`]
    /// instead of an outcome with `applied == false`.
    pub fn fail_on_conflict(&self) -> Self {
        Self {
            fail_on_conflict: true,
            ..self.clone()
        }
    }

    pub async fn execute(&self) -> Result<WriteOutcome> {
        let interceptors = self.ctx.interceptors();
        let data = interceptors
            .run_pre_write(&self.ctx, self.data.clone())
            .await?;
        data.validate()?;
        let cascade = interceptors.run_cascade_on_write(&self.ctx, &data).await?;
        let query = Self {
            data,
            intercepted: true,
            ..self.clone()
        };
        let outcome = if cascade.is_empty() {
            let built = StatementBuilder::new(&self.ctx).write(&query.data).await?;
            let page = execute(&self.ctx, &built.statement).await?;
            write_outcome(&self.ctx, &page).await?
        } else {
            if query.data.is_conditional() {
                return Err(QueryError::invalid(
                    "a conditional write cannot be batched with cascading operations",
                )
                .into());
            }
            log::debug!(
                "Cascading {} operations in the batch of the write",
                cascade.len()
            );
            let head: Arc<dyn Batchable> = Arc::new(query.clone());
            BatchComposer::logged(self.ctx.clone())
                .with_items(std::iter::once(head).chain(cascade))
                .execute()
                .await?
        };
        if !outcome.applied && self.fail_on_conflict {
            let error = QueryError::ConditionNotMet {
                condition: query.data.condition(),
                existing: outcome.existing.map(Box::new),
            };
            log::info!("{}", error);
            return Err(error.into());
        }
        interceptors
            .run_post_write(&self.ctx, &query.data, outcome)
            .await
    }

    /// Submit then block the calling thread until the outcome is available.
    pub fn execute_blocking(&self) -> Result<WriteOutcome> {
        crate::block_on(self.execute())
    }
}

impl Batchable for WriteQuery {
    fn batch_entries<'a>(&'a self) -> BoxFuture<'a, Result<Vec<BatchEntry>>> {
        Box::pin(async move {
            let data = if self.intercepted {
                self.data.clone()
            } else {
                self.ctx
                    .interceptors()
                    .run_pre_write(&self.ctx, self.data.clone())
                    .await?
            };
            let built = StatementBuilder::new(&self.ctx).write(&data).await?;
            Ok(vec![BatchEntry {
                statement: built.statement,
                conditional: built.conditional,
            }])
        })
    }
}
