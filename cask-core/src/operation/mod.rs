/// Builder methods forwarded to the query data.
macro_rules! delegate {
    ($($name:ident($($arg:ident: $ty:ty),*)),+ $(,)?) => {
        $(
            pub fn $name(&self, $($arg: $ty),*) -> Self {
                Self {
                    data: self.data.$name($($arg),*),
                    ..self.clone()
                }
            }
        )+
    };
}

mod counter;
mod delete;
mod read;
mod write;

pub use counter::*;
pub use delete::*;
pub use read::*;
pub use write::*;

use crate::{
    APPLIED_COLUMN, BatchStatement, Coercion, ColumnType, CounterData, DeleteData, Entity,
    EntityContext, Error, ExecutionContext, PagingState, Predicate, ReadData, Record, Result,
    ResultPage, Statement, Value, WriteData, codec, truncate_long,
};
use std::{collections::BTreeMap, sync::Arc};

/// Result of a write or a delete.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOutcome {
    /// Always true for unconditional statements.
    pub applied: bool,
    /// Current row returned by a conditional statement that was not applied.
    pub existing: Option<Record>,
}

impl WriteOutcome {
    pub fn applied() -> Self {
        Self {
            applied: true,
            existing: None,
        }
    }
}

/// Decoded rows of a page, with the state needed to fetch the next one.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordPage {
    pub records: Vec<Record>,
    pub paging_state: Option<PagingState>,
}

impl RecordPage {
    pub fn has_more_pages(&self) -> bool {
        self.paging_state.is_some()
    }
}

impl ExecutionContext {
    pub fn write_with_key(
        &self,
        keys: impl IntoIterator<Item = (impl Into<String>, impl Into<Value>)>,
    ) -> WriteQuery {
        let data = keys
            .into_iter()
            .fold(WriteData::new(), |data, (k, v)| data.key(k, v));
        WriteQuery::new(self.clone(), data)
    }

    pub fn write_where(&self, predicates: impl IntoIterator<Item = Predicate>) -> WriteQuery {
        let data = predicates
            .into_iter()
            .fold(WriteData::new(), |data, v| data.filter(v));
        WriteQuery::new(self.clone(), data)
    }

    pub fn read_with_key(
        &self,
        keys: impl IntoIterator<Item = (impl Into<String>, impl Into<Value>)>,
    ) -> SingleReadQuery {
        SingleReadQuery::new(self.clone(), key_read(keys))
    }

    pub fn read_where(&self, predicates: impl IntoIterator<Item = Predicate>) -> SingleReadQuery {
        SingleReadQuery::new(self.clone(), where_read(predicates))
    }

    pub fn list_with_key(
        &self,
        keys: impl IntoIterator<Item = (impl Into<String>, impl Into<Value>)>,
    ) -> ListReadQuery {
        ListReadQuery::new(self.clone(), key_read(keys))
    }

    /// Read every row matching the predicates, no predicate reads the whole table.
    pub fn list_where(&self, predicates: impl IntoIterator<Item = Predicate>) -> ListReadQuery {
        ListReadQuery::new(self.clone(), where_read(predicates))
    }

    pub fn delete_with_key(
        &self,
        keys: impl IntoIterator<Item = (impl Into<String>, impl Into<Value>)>,
    ) -> DeleteQuery {
        let data = keys
            .into_iter()
            .fold(DeleteData::new(), |data, (k, v)| data.key(k, v));
        DeleteQuery::new(self.clone(), data)
    }

    pub fn delete_where(&self, predicates: impl IntoIterator<Item = Predicate>) -> DeleteQuery {
        let data = predicates
            .into_iter()
            .fold(DeleteData::new(), |data, v| data.filter(v));
        DeleteQuery::new(self.clone(), data)
    }

    pub fn counter_with_key(
        &self,
        keys: impl IntoIterator<Item = (impl Into<String>, impl Into<Value>)>,
    ) -> CounterQuery {
        let data = keys
            .into_iter()
            .fold(CounterData::new(), |data, (k, v)| data.key(k, v));
        CounterQuery::new(self.clone(), data)
    }

    /// Typed access to the table of an entity.
    pub fn entity<E: Entity>(&self) -> EntityContext<E> {
        EntityContext::new(self)
    }
}

fn key_read(keys: impl IntoIterator<Item = (impl Into<String>, impl Into<Value>)>) -> ReadData {
    keys.into_iter()
        .fold(ReadData::new(), |data, (k, v)| data.key(k, v))
}

fn where_read(predicates: impl IntoIterator<Item = Predicate>) -> ReadData {
    predicates
        .into_iter()
        .fold(ReadData::new(), |data, v| data.filter(v))
}

pub(crate) async fn execute(ctx: &ExecutionContext, statement: &Statement) -> Result<ResultPage> {
    log::debug!("Executing {}", statement);
    ctx.session().execute(statement).await.map_err(|e| {
        let error = e.context(format!(
            "While executing {}",
            truncate_long!(statement.cql())
        ));
        log::error!("{:#}", error);
        error
    })
}

pub(crate) async fn fetch_more(
    ctx: &ExecutionContext,
    statement: &Statement,
    paging_state: &PagingState,
) -> Result<ResultPage> {
    log::trace!("Fetching the next page of {}", statement);
    ctx.session()
        .fetch_more(statement, paging_state)
        .await
        .map_err(|e| {
            let error = e.context(format!(
                "While fetching more rows of {}",
                truncate_long!(statement.cql())
            ));
            log::error!("{:#}", error);
            error
        })
}

pub(crate) async fn execute_batch(
    ctx: &ExecutionContext,
    batch: &BatchStatement,
) -> Result<ResultPage> {
    log::debug!(
        "Executing a {:?} batch of {} statements",
        batch.kind,
        batch.statements.len()
    );
    ctx.session().batch(batch).await.map_err(|e| {
        let error = e.context(format!(
            "While executing a batch of {} statements",
            batch.statements.len()
        ));
        log::error!("{:#}", error);
        error
    })
}

/// Outcome of a page returned by a write, delete or batch.
pub(crate) async fn write_outcome(
    ctx: &ExecutionContext,
    page: &ResultPage,
) -> Result<WriteOutcome> {
    let Some(applied) = page.was_applied() else {
        return Ok(WriteOutcome::applied());
    };
    let existing = if applied {
        None
    } else {
        decode_page(ctx, page)
            .await?
            .into_iter()
            .next()
            .filter(|v| !v.is_empty())
    };
    Ok(WriteOutcome { applied, existing })
}

enum Slot {
    Value,
    Writetime(String),
    Ttl(String),
    Skip,
}

/// `writetime(col)` and `ttl(col)` labels, matched case insensitively.
fn metadata_label<'a>(label: &'a str, function: &str) -> Option<&'a str> {
    let prefix = label.get(..function.len() + 1)?;
    if !prefix.ends_with('(') || !prefix[..function.len()].eq_ignore_ascii_case(function) {
        return None;
    }
    let column = label[function.len() + 1..].strip_suffix(')')?;
    Some(column.trim_matches('"'))
}

/// Decode the raw rows of a page into records.
pub(crate) async fn decode_page(ctx: &ExecutionContext, page: &ResultPage) -> Result<Vec<Record>> {
    let registry = ctx.type_registry(page.columns.iter().map(|v| &v.ty)).await?;
    let coercion = Coercion::new(&registry);
    let slots: Vec<Slot> = page
        .columns
        .iter()
        .map(|column| {
            if column.name == APPLIED_COLUMN {
                Slot::Skip
            } else if let Some(name) = metadata_label(&column.name, "writetime") {
                Slot::Writetime(name.to_string())
            } else if let Some(name) = metadata_label(&column.name, "ttl") {
                Slot::Ttl(name.to_string())
            } else {
                Slot::Value
            }
        })
        .collect();
    let labels: Arc<[String]> = page
        .columns
        .iter()
        .zip(&slots)
        .filter(|(_, slot)| matches!(slot, Slot::Value))
        .map(|(column, _)| column.name.clone())
        .collect();
    let mut result = Vec::with_capacity(page.rows.len());
    for row in &page.rows {
        if row.len() != page.columns.len() {
            return Err(Error::msg(format!(
                "The row has {} cells but the page declares {} columns",
                row.len(),
                page.columns.len()
            )));
        }
        let mut values = Vec::with_capacity(labels.len());
        let mut writetime = BTreeMap::new();
        let mut ttl = BTreeMap::new();
        for ((column, slot), cell) in page.columns.iter().zip(&slots).zip(row) {
            let cell = cell.as_deref();
            match slot {
                Slot::Value => values.push(coercion.decode_cell(&column.name, &column.ty, cell)?),
                Slot::Writetime(name) => {
                    if let Value::BigInt(Some(v)) =
                        codec::deserialize(&column.name, &ColumnType::BigInt, cell, &registry)?
                    {
                        writetime.insert(name.clone(), v);
                    }
                }
                Slot::Ttl(name) => {
                    if let Value::Int(Some(v)) =
                        codec::deserialize(&column.name, &ColumnType::Int, cell, &registry)?
                    {
                        ttl.insert(name.clone(), v);
                    }
                }
                Slot::Skip => {}
            }
        }
        result.push(Record::new(labels.clone(), values).with_metadata(writetime, ttl));
    }
    Ok(result)
}
