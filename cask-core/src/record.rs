use crate::{AsValue, Context, Entity, Error, QueryError, Result, Value};
use std::{collections::BTreeMap, sync::Arc};

/// Materialized row.
///
/// Values are already decoded to the native shape of their columns (a null collection reads as
/// an empty one). Write time and time to live are only present for the columns that asked for
/// them at read time.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    labels: Arc<[String]>,
    values: Box<[Value]>,
    writetime: BTreeMap<String, i64>,
    ttl: BTreeMap<String, i32>,
}

impl Record {
    pub fn new(labels: Arc<[String]>, values: impl Into<Box<[Value]>>) -> Self {
        Self {
            labels,
            values: values.into(),
            writetime: Default::default(),
            ttl: Default::default(),
        }
    }

    pub(crate) fn with_metadata(
        mut self,
        writetime: BTreeMap<String, i64>,
        ttl: BTreeMap<String, i32>,
    ) -> Self {
        self.writetime = writetime;
        self.ttl = ttl;
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.names().zip(self.values.iter())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.labels
            .iter()
            .position(|v| v == name)
            .map(|i| &self.values[i])
    }

    /// Decode a column into `T`, the column must be part of the record.
    pub fn get<T: AsValue>(&self, name: &str) -> Result<T> {
        let Some(value) = self.value(name) else {
            return Err(Error::new(QueryError::schema_mismatch(
                name,
                "the column is not part of the record",
            )));
        };
        T::try_from_value(value.clone())
            .with_context(|| format!("While decoding the column `{name}`"))
    }

    /// Decode a column into `T`, a column missing from the record reads as null.
    pub fn field<T: AsValue>(&self, name: &str) -> Result<T> {
        T::try_from_value(self.value(name).cloned().unwrap_or_default())
            .with_context(|| format!("While decoding the column `{name}`"))
    }

    /// Write time in microseconds since the epoch.
    pub fn writetime(&self, name: &str) -> Option<i64> {
        self.writetime.get(name).copied()
    }

    /// Remaining seconds before the value expires.
    pub fn ttl(&self, name: &str) -> Option<i32> {
        self.ttl.get(name).copied()
    }

    pub fn into_entity<E: Entity>(self) -> Result<E> {
        E::from_record(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> Record {
        Record::new(
            Arc::from(["id".to_string(), "tags".to_string()]),
            vec![
                Value::Int(Some(7)),
                Value::Set(Some(vec![]), Box::new(Value::Text(None))),
            ],
        )
    }

    #[test]
    fn access() {
        let record = record();
        assert_eq!(record.get::<i64>("id").unwrap(), 7);
        assert!(record.get::<Vec<String>>("tags").unwrap().is_empty());
        assert_eq!(record.field::<Option<String>>("missing").unwrap(), None);
        let error = record.get::<i32>("missing").unwrap_err();
        assert!(matches!(
            error.downcast_ref::<QueryError>(),
            Some(QueryError::SchemaMismatch { column, .. }) if column == "missing"
        ));
        assert_eq!(record.names().collect::<Vec<_>>(), ["id", "tags"]);
        assert_eq!(record.writetime("id"), None);
    }
}
