use crate::{
    BatchEntry, CounterBatchable, CounterData, ExecutionContext, Result, StatementBuilder,
    operation::execute,
};
use futures::future::BoxFuture;

/// Increment or decrement of counter columns of a row.
///
/// Counter updates cannot share a batch with regular writes, they compose through
/// [`crate::CounterBatchComposer`] instead.
#[derive(Debug, Clone)]
pub struct CounterQuery {
    ctx: ExecutionContext,
    data: CounterData,
}

impl CounterQuery {
    pub fn new(ctx: ExecutionContext, data: CounterData) -> Self {
        Self { ctx, data }
    }

    pub fn data(&self) -> &CounterData {
        &self.data
    }

    delegate!(
        increment(column: impl Into<String>, delta: i64),
        decrement(column: impl Into<String>, delta: i64),
    );

    pub async fn execute(&self) -> Result<()> {
        let built = StatementBuilder::new(&self.ctx).counter(&self.data).await?;
        execute(&self.ctx, &built.statement).await?;
        Ok(())
    }

    pub fn execute_blocking(&self) -> Result<()> {
        crate::block_on(self.execute())
    }
}

impl CounterBatchable for CounterQuery {
    fn batch_entries<'a>(&'a self) -> BoxFuture<'a, Result<Vec<BatchEntry>>> {
        Box::pin(async move {
            let built = StatementBuilder::new(&self.ctx).counter(&self.data).await?;
            Ok(vec![BatchEntry {
                statement: built.statement,
                conditional: false,
            }])
        })
    }
}
