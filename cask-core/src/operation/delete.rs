use crate::{
    BatchComposer, BatchEntry, Batchable, DeleteData, ExecutionContext, Predicate, QueryError,
    Result, StatementBuilder, WriteOutcome,
    operation::{execute, write_outcome},
};
use futures::future::BoxFuture;
use std::sync::Arc;

/// Delete of a row (or some of its columns), or of every row matching a where clause.
#[derive(Debug, Clone)]
pub struct DeleteQuery {
    ctx: ExecutionContext,
    data: DeleteData,
    fail_on_conflict: bool,
    intercepted: bool,
}

impl DeleteQuery {
    pub fn new(ctx: ExecutionContext, data: DeleteData) -> Self {
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
    pub fn data(&self) -> &DeleteData {
        &self.data
    }

    delegate!(
        column(column: impl Into<String>),
        only_if(predicate: Predicate),
        if_exists(),
    );

    pub fn fail_on_conflict(&self) -> Self {
        Self {
            fail_on_conflict: true,
            ..self.clone()
        }
    }

    pub async fn execute(&self) -> Result<WriteOutcome> {
        let interceptors = self.ctx.interceptors();
        let data = interceptors
            .run_pre_delete(&self.ctx, self.data.clone())
            .await?;
        data.validate()?;
        let cascade = interceptors.run_cascade_on_delete(&self.ctx, &data).await?;
        let query = Self {
            data,
            intercepted: true,
            ..self.clone()
        };
        let outcome = if cascade.is_empty() {
            let built = StatementBuilder::new(&self.ctx).delete(&query.data).await?;
            let page = execute(&self.ctx, &built.statement).await?;
            write_outcome(&self.ctx, &page).await?
        } else {
            if query.data.is_conditional() {
                return Err(QueryError::invalid(
                    "a conditional delete cannot be batched with cascading operations",
                )
                .into());
            }
            log::debug!(
                "Cascading {} operations in the batch of the delete",
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
        Ok(outcome)
    }

    pub fn execute_blocking(&self) -> Result<WriteOutcome> {
        crate::block_on(self.execute())
    }
}

impl Batchable for DeleteQuery {
    fn batch_entries<'a>(&'a self) -> BoxFuture<'a, Result<Vec<BatchEntry>>> {
        Box::pin(async move {
            let data = if self.intercepted {
                self.data.clone()
            } else {
                self.ctx
                    .interceptors()
                    .run_pre_delete(&self.ctx, self.data.clone())
                    .await?
            };
            let built = StatementBuilder::new(&self.ctx).delete(&data).await?;
            Ok(vec![BatchEntry {
                statement: built.statement,
                conditional: built.conditional,
            }])
        })
    }
}
