use crate::{ExecutionContext, Record, Result, TableRef, Value, WriteOutcome};
use std::future::Future;

/// Role of a field in the primary key.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    #[default]
    None,
    Partition,
    Clustering,
}

/// Descriptor of a domain field: column name, shape and key role.
///
/// The shape is a typed null [`Value`] (see [`crate::AsValue::as_empty_value`]). Decoding is
/// driven by the shape declared here, never by the runtime type of the object.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: &'static str,
    pub value: Value,
    pub key: KeyKind,
}

impl FieldDef {
    pub fn new(name: &'static str, value: Value, key: KeyKind) -> Self {
        Self { name, value, key }
    }
    pub fn is_key(&self) -> bool {
        self.key != KeyKind::None
    }
}

/// Row of a table mapped to a Rust struct, usually implemented with `#[derive(Entity)]`.
pub trait Entity: Send + Sync + Sized + 'static {
    fn table_ref() -> &'static TableRef;

    /// Every column in declaration order.
    fn fields() -> &'static [FieldDef];

    /// Partition key columns first, then clustering columns.
    fn key_fields() -> Vec<&'static FieldDef> {
        let fields = Self::fields();
        fields
            .iter()
            .filter(|v| v.key == KeyKind::Partition)
            .chain(fields.iter().filter(|v| v.key == KeyKind::Clustering))
            .collect()
    }

    /// Column name and value of every field.
    fn row(&self) -> Vec<(&'static str, Value)>;

    /// Column name and value of the key fields.
    fn key(&self) -> Vec<(&'static str, Value)> {
        let mut row = self.row();
        Self::key_fields()
            .into_iter()
            .filter_map(|field| {
                row.iter()
                    .position(|(name, _)| *name == field.name)
                    .map(|i| row.swap_remove(i))
            })
            .collect()
    }

    fn from_record(record: Record) -> Result<Self>;

    fn save(&self, ctx: &ExecutionContext) -> impl Future<Output = Result<WriteOutcome>> + Send {
        let query = ctx.entity::<Self>().save_query(self);
        async move { query.execute().await }
    }

    fn delete(&self, ctx: &ExecutionContext) -> impl Future<Output = Result<WriteOutcome>> + Send {
        let query = ctx.entity::<Self>().delete_query(self);
        async move { query.execute().await }
    }
}

/// User defined type mapped to a Rust struct, usually implemented with `#[derive(Udt)]`.
pub trait Composite: Sized {
    fn type_name() -> &'static str;
    fn fields() -> &'static [FieldDef];
    fn into_fields(self) -> Vec<(String, Value)>;
    fn from_fields(fields: Vec<(String, Value)>) -> Result<Self>;
}
