use crate::{
    Coercion, ColumnType, CounterData, DeleteData, Error, ExecutionContext, Query, QueryError,
    ReadData, Result, Statement, TypeRegistry, WriteData,
    writer::{Bind, BindShape, Context, Fragment},
};
use bytes::Bytes;

/// Statement with the information needed to interpret its response.
#[derive(Debug, Clone)]
pub struct BuiltStatement {
    pub statement: Statement,
    /// Serialized value of each column of the requested key, in marker order.
    pub key: Vec<(String, Option<Bytes>)>,
    pub conditional: bool,
}

/// Turns query data into a wire statement.
///
/// Key based statements are prepared (through the context cache), statements with a where
/// clause are sent as raw CQL since their shape is open ended. In both cases values are bound
/// positionally after going through the coercion against the type of their column.
pub struct StatementBuilder<'a> {
    ctx: &'a ExecutionContext,
}

impl<'a> StatementBuilder<'a> {
    pub fn new(ctx: &'a ExecutionContext) -> Self {
        Self { ctx }
    }

    pub async fn write(&self, data: &WriteData) -> Result<BuiltStatement> {
        data.validate()?;
        let mut context = Context::new(Fragment::None);
        let mut cql = String::with_capacity(256);
        self.ctx.session().cql_writer().write_write(
            &mut context,
            &mut cql,
            self.ctx.table(),
            data,
            self.ctx.ttl(),
        );
        self.build(cql, context, data.is_key_based(), data.is_conditional())
            .await
    }

    pub async fn delete(&self, data: &DeleteData) -> Result<BuiltStatement> {
        data.validate()?;
        let mut context = Context::new(Fragment::None);
        let mut cql = String::with_capacity(128);
        self.ctx
            .session()
            .cql_writer()
            .write_delete(&mut context, &mut cql, self.ctx.table(), data);
        self.build(cql, context, data.is_key_based(), data.is_conditional())
            .await
    }

    pub async fn read(&self, data: &ReadData, single: bool) -> Result<BuiltStatement> {
        data.validate(single)?;
        let mut context = Context::new(Fragment::None);
        let mut cql = String::with_capacity(128);
        self.ctx
            .session()
            .cql_writer()
            .write_select(&mut context, &mut cql, self.ctx.table(), data);
        let mut result = self.build(cql, context, data.is_key_based(), false).await?;
        result.statement.options.fetch_size = data.fetch_size;
        result.statement.options.paging_state = data.paging_state.clone();
        Ok(result)
    }

    pub async fn counter(&self, data: &CounterData) -> Result<BuiltStatement> {
        data.validate()?;
        let mut context = Context::new(Fragment::None);
        let mut cql = String::with_capacity(128);
        self.ctx.session().cql_writer().write_counter_update(
            &mut context,
            &mut cql,
            self.ctx.table(),
            data,
        );
        self.build(cql, context, true, false).await
    }

    /// Type of the value bound to a marker.
    async fn bind_type(&self, bind: &Bind) -> Result<ColumnType> {
        if let BindShape::Fixed(ty) = &bind.shape {
            return Ok(ty.clone());
        }
        let column = self.ctx.column_type(&bind.column).await?;
        let not_applicable = |what: &str| {
            Error::new(QueryError::schema_mismatch(
                &bind.column,
                format!("{what} does not apply to a {column} column"),
            ))
        };
        Ok(match (&bind.shape, &column) {
            (BindShape::ListOf, _) => ColumnType::List(Box::new(column.clone())),
            (BindShape::ElementOf, ColumnType::List(v) | ColumnType::Set(v)) => (**v).clone(),
            (BindShape::ElementOf, ColumnType::Map(_, v)) => (**v).clone(),
            (BindShape::ElementOf, _) => return Err(not_applicable("CONTAINS")),
            (BindShape::KeyOf, ColumnType::Map(k, _)) => (**k).clone(),
            (BindShape::KeyOf, _) => return Err(not_applicable("CONTAINS KEY")),
            (BindShape::KeySetOf, ColumnType::Map(k, _)) => ColumnType::Set(k.clone()),
            (BindShape::KeySetOf, _) => return Err(not_applicable("removing map keys")),
            _ => column.clone(),
        })
    }

    async fn build(
        &self,
        cql: String,
        context: Context,
        prepare: bool,
        conditional: bool,
    ) -> Result<BuiltStatement> {
        let mut types = Vec::with_capacity(context.binds.len());
        for bind in &context.binds {
            types.push(self.bind_type(bind).await?);
        }
        let registry = self.ctx.type_registry(&types).await?;
        let (values, key) = encode_binds(&registry, context.binds, &types)?;
        let query = if prepare {
            Query::Prepared(self.ctx.resolve_statement(&cql).await?)
        } else {
            Query::Raw(cql)
        };
        log::debug!("Built {}", query);
        Ok(BuiltStatement {
            statement: Statement::new(query, values).with_options(self.ctx.statement_options()),
            key,
            conditional,
        })
    }
}

fn encode_binds(
    registry: &TypeRegistry,
    binds: Vec<Bind>,
    types: &[ColumnType],
) -> Result<(Vec<Option<Bytes>>, Vec<(String, Option<Bytes>)>)> {
    let coercion = Coercion::new(registry);
    let mut values = Vec::with_capacity(binds.len());
    let mut key = Vec::new();
    for (bind, ty) in binds.into_iter().zip(types) {
        let cell = coercion.encode_cell(&bind.column, ty, bind.value)?;
        if bind.key {
            key.push((bind.column, cell.clone()));
        }
        values.push(cell);
    }
    Ok((values, key))
}
