use crate::{
    BatchKind, BatchStatement, ExecutionContext, QueryError, Result, Statement, WriteOutcome,
    operation::{execute_batch, write_outcome},
};
use futures::future::BoxFuture;
use std::{
    fmt::{self, Debug, Formatter},
    sync::Arc,
};

/// Statement contributed to a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchEntry {
    pub statement: Statement,
    /// Carries an `IF` clause.
    pub conditional: bool,
}

/// Operation that can be folded into a logged or unlogged batch.
pub trait Batchable: Send + Sync {
    fn batch_entries<'a>(&'a self) -> BoxFuture<'a, Result<Vec<BatchEntry>>>;
}

/// Operation that can be folded into a counter batch.
pub trait CounterBatchable: Send + Sync {
    fn batch_entries<'a>(&'a self) -> BoxFuture<'a, Result<Vec<BatchEntry>>>;
}

async fn collect_entries<'a, I, F>(items: I, entries: F) -> Result<Vec<Statement>>
where
    I: IntoIterator,
    F: Fn(I::Item) -> BoxFuture<'a, Result<Vec<BatchEntry>>>,
{
    let mut statements = Vec::new();
    let mut conditional = None;
    for item in items {
        for entry in entries(item).await? {
            match conditional {
                Some(v) if v != entry.conditional => {
                    return Err(QueryError::invalid(
                        "a batch cannot mix conditional and unconditional statements",
                    )
                    .into());
                }
                _ => conditional = Some(entry.conditional),
            }
            statements.push(entry.statement);
        }
    }
    Ok(statements)
}

/// Accumulates writes and deletes submitted as a single batch.
///
/// ```rust,ignore
/// let outcome = BatchComposer::logged(ctx.clone())
///     .combined_with(ctx.write_with_key([("id", 1)]).set("name", "a"))
///     .combined_with(ctx.delete_with_key([("id", 2)]))
///     .execute()
///     .await?;
/// ```
#[derive(Clone)]
pub struct BatchComposer {
    ctx: ExecutionContext,
    kind: BatchKind,
    items: Vec<Arc<dyn Batchable>>,
}

impl BatchComposer {
    /// Atomic batch.
    pub fn logged(ctx: ExecutionContext) -> Self {
        Self {
            ctx,
            kind: BatchKind::Logged,
            items: Vec::new(),
        }
    }

    /// Best effort batch.
    pub fn unlogged(ctx: ExecutionContext) -> Self {
        Self {
            ctx,
            kind: BatchKind::Unlogged,
            items: Vec::new(),
        }
    }

    pub fn kind(&self) -> BatchKind {
        self.kind
    }

    /// New composer with `item` appended.
    pub fn combined_with(&self, item: impl Batchable + 'static) -> Self {
        self.with_items([Arc::new(item) as Arc<dyn Batchable>])
    }

    /// New composer with every item appended.
    pub fn with_items(&self, items: impl IntoIterator<Item = Arc<dyn Batchable>>) -> Self {
        let mut result = self.clone();
        result.items.extend(items);
        result
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Build one batch statement from the items in append order and submit it.
    pub async fn execute(&self) -> Result<WriteOutcome> {
        let statements = collect_entries(&self.items, |v| v.batch_entries()).await?;
        if statements.is_empty() {
            return Ok(WriteOutcome::applied());
        }
        let batch = BatchStatement {
            kind: self.kind,
            statements,
            options: self.ctx.statement_options(),
        };
        let page = execute_batch(&self.ctx, &batch).await?;
        write_outcome(&self.ctx, &page).await
    }

    pub fn execute_blocking(&self) -> Result<WriteOutcome> {
        crate::block_on(self.execute())
    }
}

impl Debug for BatchComposer {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchComposer")
            .field("kind", &self.kind)
            .field("items", &self.items.len())
            .finish()
    }
}

/// Accumulates counter updates submitted as a single counter batch.
#[derive(Clone)]
pub struct CounterBatchComposer {
    ctx: ExecutionContext,
    items: Vec<Arc<dyn CounterBatchable>>,
}

impl CounterBatchComposer {
    pub fn new(ctx: ExecutionContext) -> Self {
        Self {
            ctx,
            items: Vec::new(),
        }
    }

    pub fn combined_with(&self, item: impl CounterBatchable + 'static) -> Self {
        let mut result = self.clone();
        result.items.push(Arc::new(item));
        result
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub async fn execute(&self) -> Result<()> {
        let statements = collect_entries(&self.items, |v| v.batch_entries()).await?;
        if statements.is_empty() {
            return Ok(());
        }
        let batch = BatchStatement {
            kind: BatchKind::Counter,
            statements,
            options: self.ctx.statement_options(),
        };
        execute_batch(&self.ctx, &batch).await?;
        Ok(())
    }

    pub fn execute_blocking(&self) -> Result<()> {
        crate::block_on(self.execute())
    }
}

impl Debug for CounterBatchComposer {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("CounterBatchComposer")
            .field("items", &self.items.len())
            .finish()
    }
}
