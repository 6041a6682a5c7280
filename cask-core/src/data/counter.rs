use crate::{QueryError, Result, Value};

/// Pending increment of counter columns.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct CounterData {
    pub keys: Vec<(String, Value)>,
    /// Column and delta, negative values decrement.
    pub deltas: Vec<(String, i64)>,
}

impl CounterData {
    pub fn new() -> Self {
        Default::default()
    }
    pub fn key(&self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut result = self.clone();
        result.keys.push((column.into(), value.into()));
        result
    }
    pub fn increment(&self, column: impl Into<String>, delta: i64) -> Self {
        let mut result = self.clone();
        result.deltas.push((column.into(), delta));
        result
    }
    pub fn decrement(&self, column: impl Into<String>, delta: i64) -> Self {
        self.increment(column, delta.saturating_neg())
    }

    pub fn validate(&self) -> Result<()> {
        if self.keys.is_empty() {
            return Err(QueryError::invalid("a counter update needs a key").into());
        }
        if self.deltas.is_empty() {
            return Err(QueryError::invalid("the counter update does not change any column").into());
        }
        Ok(())
    }
}
