use crate::{
    Batchable, DeleteData, ExecutionContext, ReadData, Record, Result, WriteData, WriteOutcome,
};
use futures::future::BoxFuture;
use std::{future::Future, sync::Arc};

/// Runs before a write, returns the data to use instead (possibly unmodified).
pub trait PreWrite: Send + Sync {
    fn pre_write(
        &self,
        ctx: ExecutionContext,
        data: WriteData,
    ) -> BoxFuture<'static, Result<WriteData>>;
}

/// Runs after a write was executed.
pub trait PostWrite: Send + Sync {
    fn post_write(
        &self,
        ctx: ExecutionContext,
        data: WriteData,
        outcome: WriteOutcome,
    ) -> BoxFuture<'static, Result<WriteOutcome>>;
}

/// Runs before a read statement is built.
pub trait PreRead: Send + Sync {
    fn pre_read(
        &self,
        ctx: ExecutionContext,
        data: ReadData,
    ) -> BoxFuture<'static, Result<ReadData>>;
}

/// Runs on every record a read returns, before it reaches the caller.
pub trait PostRead: Send + Sync {
    fn post_read(
        &self,
        ctx: ExecutionContext,
        record: Record,
    ) -> BoxFuture<'static, Result<Record>>;
}

/// Runs before a delete.
pub trait PreDelete: Send + Sync {
    fn pre_delete(
        &self,
        ctx: ExecutionContext,
        data: DeleteData,
    ) -> BoxFuture<'static, Result<DeleteData>>;
}

/// Operations executed in the same logged batch as the triggering write.
pub trait CascadeOnWrite: Send + Sync {
    fn cascade_on_write(
        &self,
        ctx: ExecutionContext,
        data: WriteData,
    ) -> BoxFuture<'static, Result<Vec<Arc<dyn Batchable>>>>;
}

/// Operations executed in the same logged batch as the triggering delete.
pub trait CascadeOnDelete: Send + Sync {
    fn cascade_on_delete(
        &self,
        ctx: ExecutionContext,
        data: DeleteData,
    ) -> BoxFuture<'static, Result<Vec<Arc<dyn Batchable>>>>;
}

impl<F, Fut> PreWrite for F
where
    F: Fn(ExecutionContext, WriteData) -> Fut + Send + Sync,
    Fut: Future<Output = Result<WriteData>> + Send + 'static,
{
    fn pre_write(
        &self,
        ctx: ExecutionContext,
        data: WriteData,
    ) -> BoxFuture<'static, Result<WriteData>> {
        Box::pin(self(ctx, data))
    }
}

impl<F, Fut> PostWrite for F
where
    F: Fn(ExecutionContext, WriteData, WriteOutcome) -> Fut + Send + Sync,
    Fut: Future<Output = Result<WriteOutcome>> + Send + 'static,
{
    fn post_write(
        &self,
        ctx: ExecutionContext,
        data: WriteData,
        outcome: WriteOutcome,
    ) -> BoxFuture<'static, Result<WriteOutcome>> {
        Box::pin(self(ctx, data, outcome))
    }
}

impl<F, Fut> PreRead for F
where
    F: Fn(ExecutionContext, ReadData) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ReadData>> + Send + 'static,
{
    fn pre_read(
        &self,
        ctx: ExecutionContext,
        data: ReadData,
    ) -> BoxFuture<'static, Result<ReadData>> {
        Box::pin(self(ctx, data))
    }
}

impl<F, Fut> PostRead for F
where
    F: Fn(ExecutionContext, Record) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Record>> + Send + 'static,
{
    fn post_read(
        &self,
        ctx: ExecutionContext,
        record: Record,
    ) -> BoxFuture<'static, Result<Record>> {
        Box::pin(self(ctx, record))
    }
}

impl<F, Fut> PreDelete for F
where
    F: Fn(ExecutionContext, DeleteData) -> Fut + Send + Sync,
    Fut: Future<Output = Result<DeleteData>> + Send + 'static,
{
    fn pre_delete(
        &self,
        ctx: ExecutionContext,
        data: DeleteData,
    ) -> BoxFuture<'static, Result<DeleteData>> {
        Box::pin(self(ctx, data))
    }
}

impl<F, Fut> CascadeOnWrite for F
where
    F: Fn(ExecutionContext, WriteData) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<Arc<dyn Batchable>>>> + Send + 'static,
{
    fn cascade_on_write(
        &self,
        ctx: ExecutionContext,
        data: WriteData,
    ) -> BoxFuture<'static, Result<Vec<Arc<dyn Batchable>>>> {
        Box::pin(self(ctx, data))
    }
}

impl<F, Fut> CascadeOnDelete for F
where
    F: Fn(ExecutionContext, DeleteData) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<Arc<dyn Batchable>>>> + Send + 'static,
{
    fn cascade_on_delete(
        &self,
        ctx: ExecutionContext,
        data: DeleteData,
    ) -> BoxFuture<'static, Result<Vec<Arc<dyn Batchable>>>> {
        Box::pin(self(ctx, data))
    }
}

/// Hook registered on a context, tagged by capability.
///
/// The constructors accept closures returning futures, implement the capability trait and wrap
/// it in the variant for anything more involved.
#[derive(Clone)]
pub enum Interceptor {
    PreWrite(Arc<dyn PreWrite>),
    PostWrite(Arc<dyn PostWrite>),
    PreRead(Arc<dyn PreRead>),
    PostRead(Arc<dyn PostRead>),
    PreDelete(Arc<dyn PreDelete>),
    CascadeOnWrite(Arc<dyn CascadeOnWrite>),
    CascadeOnDelete(Arc<dyn CascadeOnDelete>),
}

impl Interceptor {
    pub fn pre_write<F, Fut>(hook: F) -> Self
    where
        F: Fn(ExecutionContext, WriteData) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<WriteData>> + Send + 'static,
    {
        Interceptor::PreWrite(Arc::new(hook))
    }
    pub fn post_write<F, Fut>(hook: F) -> Self
    where
        F: Fn(ExecutionContext, WriteData, WriteOutcome) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<WriteOutcome>> + Send + 'static,
    {
        Interceptor::PostWrite(Arc::new(hook))
    }
    pub fn pre_read<F, Fut>(hook: F) -> Self
    where
        F: Fn(ExecutionContext, ReadData) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ReadData>> + Send + 'static,
    {
        Interceptor::PreRead(Arc::new(hook))
    }
    pub fn post_read<F, Fut>(hook: F) -> Self
    where
        F: Fn(ExecutionContext, Record) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Record>> + Send + 'static,
    {
        Interceptor::PostRead(Arc::new(hook))
    }
    pub fn pre_delete<F, Fut>(hook: F) -> Self
    where
        F: Fn(ExecutionContext, DeleteData) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<DeleteData>> + Send + 'static,
    {
        Interceptor::PreDelete(Arc::new(hook))
    }
    pub fn cascade_on_write<F, Fut>(hook: F) -> Self
    where
        F: Fn(ExecutionContext, WriteData) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<Arc<dyn Batchable>>>> + Send + 'static,
    {
        Interceptor::CascadeOnWrite(Arc::new(hook))
    }
    pub fn cascade_on_delete<F, Fut>(hook: F) -> Self
    where
        F: Fn(ExecutionContext, DeleteData) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<Arc<dyn Batchable>>>> + Send + 'static,
    {
        Interceptor::CascadeOnDelete(Arc::new(hook))
    }
}

/// Registered interceptors, one vector per capability in registration order.
#[derive(Default, Clone)]
pub struct Interceptors {
    pre_write: Vec<Arc<dyn PreWrite>>,
    post_write: Vec<Arc<dyn PostWrite>>,
    pre_read: Vec<Arc<dyn PreRead>>,
    post_read: Vec<Arc<dyn PostRead>>,
    pre_delete: Vec<Arc<dyn PreDelete>>,
    cascade_on_write: Vec<Arc<dyn CascadeOnWrite>>,
    cascade_on_delete: Vec<Arc<dyn CascadeOnDelete>>,
}

impl Interceptors {
    pub(crate) fn with(&self, interceptor: Interceptor) -> Self {
        let mut result = self.clone();
        match interceptor {
            Interceptor::PreWrite(v) => result.pre_write.push(v),
            Interceptor::PostWrite(v) => result.post_write.push(v),
            Interceptor::PreRead(v) => result.pre_read.push(v),
            Interceptor::PostRead(v) => result.post_read.push(v),
            Interceptor::PreDelete(v) => result.pre_delete.push(v),
            Interceptor::CascadeOnWrite(v) => result.cascade_on_write.push(v),
            Interceptor::CascadeOnDelete(v) => result.cascade_on_delete.push(v),
        }
        result
    }

    pub fn len(&self) -> usize {
        self.pre_write.len()
            + self.post_write.len()
            + self.pre_read.len()
            + self.post_read.len()
            + self.pre_delete.len()
            + self.cascade_on_write.len()
            + self.cascade_on_delete.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_post_read(&self) -> bool {
        !self.post_read.is_empty()
    }

    /// Each hook sees the data returned by the previous one, the first error stops the chain.
    pub async fn run_pre_write(
        &self,
        ctx: &ExecutionContext,
        mut data: WriteData,
    ) -> Result<WriteData> {
        for hook in &self.pre_write {
            data = hook.pre_write(ctx.clone(), data).await?;
        }
        Ok(data)
    }

    pub async fn run_post_write(
        &self,
        ctx: &ExecutionContext,
        data: &WriteData,
        mut outcome: WriteOutcome,
    ) -> Result<WriteOutcome> {
        for hook in &self.post_write {
            outcome = hook.post_write(ctx.clone(), data.clone(), outcome).await?;
        }
        Ok(outcome)
    }

    pub async fn run_pre_read(
        &self,
        ctx: &ExecutionContext,
        mut data: ReadData,
    ) -> Result<ReadData> {
        for hook in &self.pre_read {
            data = hook.pre_read(ctx.clone(), data).await?;
        }
        Ok(data)
    }

    pub async fn run_post_read(
        &self,
        ctx: &ExecutionContext,
        mut record: Record,
    ) -> Result<Record> {
        for hook in &self.post_read {
            record = hook.post_read(ctx.clone(), record).await?;
        }
        Ok(record)
    }

    pub async fn run_pre_delete(
        &self,
        ctx: &ExecutionContext,
        mut data: DeleteData,
    ) -> Result<DeleteData> {
        for hook in &self.pre_delete {
            data = hook.pre_delete(ctx.clone(), data).await?;
        }
        Ok(data)
    }

    pub async fn run_cascade_on_write(
        &self,
        ctx: &ExecutionContext,
        data: &WriteData,
    ) -> Result<Vec<Arc<dyn Batchable>>> {
        let mut result = Vec::new();
        for hook in &self.cascade_on_write {
            result.extend(hook.cascade_on_write(ctx.clone(), data.clone()).await?);
        }
        Ok(result)
    }

    pub async fn run_cascade_on_delete(
        &self,
        ctx: &ExecutionContext,
        data: &DeleteData,
    ) -> Result<Vec<Arc<dyn Batchable>>> {
        let mut result = Vec::new();
        for hook in &self.cascade_on_delete {
            result.extend(hook.cascade_on_delete(ctx.clone(), data.clone()).await?);
        }
        Ok(result)
    }
}
