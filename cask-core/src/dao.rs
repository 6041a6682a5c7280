use crate::{
    DeleteQuery, Entity, ExecutionContext, ListReadQuery, Predicate, ReadData, Result,
    ResultStream, SingleReadQuery, Value, WriteOutcome, WriteQuery,
};
use std::marker::PhantomData;

/// Typed access to the table of an entity.
///
/// Reads select exactly the columns declared by the entity and decode every row through
/// [`Entity::from_record`].
///
/// ```rust,ignore
/// let orders = ctx.entity::<Order>();
/// orders.save(&order).await?;
/// let found = orders.find([("id", order.id)]).await?;
/// ```
#[derive(Debug)]
pub struct EntityContext<E> {
    ctx: ExecutionContext,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for EntityContext<E> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> EntityContext<E> {
    pub fn new(ctx: &ExecutionContext) -> Self {
        Self {
            ctx: ctx.with_table(E::table_ref().clone()),
            _entity: PhantomData,
        }
    }

    /// Context bound to the table of the entity.
    pub fn context(&self) -> &ExecutionContext {
        &self.ctx
    }

    fn projection(data: ReadData) -> ReadData {
        E::fields()
            .iter()
            .fold(data, |data, field| data.column(field.name))
    }

    fn single(&self, data: ReadData) -> SingleReadQuery {
        SingleReadQuery::new(self.ctx.clone(), Self::projection(data))
    }

    fn many(&self, data: ReadData) -> ListReadQuery {
        ListReadQuery::new(self.ctx.clone(), Self::projection(data))
    }

    /// Insert of every column of `entity`, usable on its own or inside a batch.
    pub fn save_query(&self, entity: &E) -> WriteQuery {
        let mut data = crate::WriteData::new();
        for (name, value) in entity.row() {
            let is_key = E::fields().iter().any(|v| v.name == name && v.is_key());
            data = if is_key {
                data.key(name, value)
            } else {
                data.set(name, value)
            };
        }
        WriteQuery::new(self.ctx.clone(), data)
    }

    pub fn delete_query(&self, entity: &E) -> DeleteQuery {
        self.ctx.delete_with_key(entity.key())
    }

    pub async fn save(&self, entity: &E) -> Result<WriteOutcome> {
        self.save_query(entity).execute().await
    }

    /// Insert only when no row exists with the same key, `applied` is false otherwise.
    pub async fn save_if_not_exists(&self, entity: &E) -> Result<WriteOutcome> {
        self.save_query(entity).if_not_exists().execute().await
    }

    pub async fn find(
        &self,
        keys: impl IntoIterator<Item = (impl Into<String>, impl Into<Value>)>,
    ) -> Result<Option<E>> {
        let data = keys
            .into_iter()
            .fold(ReadData::new(), |data, (k, v)| data.key(k, v));
        self.single(data)
            .execute()
            .await?
            .map(E::from_record)
            .transpose()
    }

    pub async fn find_where(
        &self,
        predicates: impl IntoIterator<Item = Predicate>,
    ) -> Result<Option<E>> {
        let data = predicates
            .into_iter()
            .fold(ReadData::new(), |data, v| data.filter(v));
        self.single(data)
            .execute()
            .await?
            .map(E::from_record)
            .transpose()
    }

    /// Every entity matching the predicates, in storage order.
    pub async fn list(&self, predicates: impl IntoIterator<Item = Predicate>) -> Result<Vec<E>> {
        let data = predicates
            .into_iter()
            .fold(ReadData::new(), |data, v| data.filter(v));
        self.many(data)
            .execute()
            .await?
            .into_iter()
            .map(E::from_record)
            .collect()
    }

    /// Same as [`EntityContext::list`] but delivered on demand.
    pub fn stream(&self, predicates: impl IntoIterator<Item = Predicate>) -> ResultStream<E> {
        let data = predicates
            .into_iter()
            .fold(ReadData::new(), |data, v| data.filter(v));
        self.many(data).stream_with(E::from_record)
    }

    pub async fn delete(&self, entity: &E) -> Result<WriteOutcome> {
        self.delete_query(entity).execute().await
    }
}
