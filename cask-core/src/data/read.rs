use crate::{Operator, PagingState, Predicate, QueryError, Result, Value};

/// Pending read, shared by single row and list reads.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct ReadData {
    pub keys: Vec<(String, Value)>,
    pub predicates: Vec<Predicate>,
    /// Named columns, the flag requests write time and time to live. Empty selects `*`.
    pub columns: Vec<(String, bool)>,
    pub limit: Option<u32>,
    pub allow_filtering: bool,
    pub fetch_size: Option<u32>,
    pub distinct: bool,
    pub paging_state: Option<PagingState>,
}

impl ReadData {
    pub fn new() -> Self {
        Default::default()
    }
    pub fn key(&self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut result = self.clone();
        result.keys.push((column.into(), value.into()));
        result
    }
    pub fn filter(&self, predicate: Predicate) -> Self {
        let mut result = self.clone();
        result.predicates.push(predicate);
        result
    }
    pub fn column(&self, column: impl Into<String>) -> Self {
        let mut result = self.clone();
        result.columns.push((column.into(), false));
        result
    }
    /// Select the column together with its write time and time to live.
    pub fn column_with_metadata(&self, column: impl Into<String>) -> Self {
        let mut result = self.clone();
        result.columns.push((column.into(), true));
        result
    }
    pub fn limit(&self, limit: u32) -> Self {
        let mut result = self.clone();
        result.limit = Some(limit);
        result
    }
    pub fn allow_filtering(&self) -> Self {
        let mut result = self.clone();
        result.allow_filtering = true;
        result
    }
    pub fn fetch_size(&self, fetch_size: u32) -> Self {
        let mut result = self.clone();
        result.fetch_size = Some(fetch_size);
        result
    }
    pub fn distinct(&self) -> Self {
        let mut result = self.clone();
        result.distinct = true;
        result
    }
    pub fn paging_state(&self, paging_state: Option<PagingState>) -> Self {
        let mut result = self.clone();
        result.paging_state = paging_state;
        result
    }

    pub fn is_key_based(&self) -> bool {
        !self.keys.is_empty()
    }

    /// Projection actually written: the requested columns followed by the key columns that
    /// were not requested. `None` selects every column.
    pub fn projection(&self) -> Option<Vec<(&str, bool)>> {
        if self.columns.is_empty() {
            return None;
        }
        let mut result: Vec<(&str, bool)> = self
            .columns
            .iter()
            .map(|(k, v)| (k.as_str(), *v))
            .collect();
        for (key, _) in &self.keys {
            if !result.iter().any(|(k, _)| *k == key.as_str()) {
                result.push((key.as_str(), false));
            }
        }
        Some(result)
    }

    /// `single` is true for reads expecting at most one row.
    pub fn validate(&self, single: bool) -> Result<()> {
        let error = |message: &str| -> Result<()> { Err(QueryError::invalid(message).into()) };
        if !self.keys.is_empty() && !self.predicates.is_empty() {
            return error("a read cannot have both a key and a where clause");
        }
        if single && self.keys.is_empty() && self.predicates.is_empty() {
            return error("a single row read needs either a key or a where clause");
        }
        if self.distinct && self.columns.iter().any(|(_, metadata)| *metadata) {
            return error("DISTINCT cannot select write time or time to live");
        }
        if self.limit == Some(0) {
            return error("LIMIT must be positive");
        }
        if self.fetch_size == Some(0) {
            return error("the fetch size must be positive");
        }
        if self.predicates.iter().any(|p| p.op == Operator::Ne) {
            return error("`!=` is only allowed in conditions");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projection_adds_keys() {
        let data = ReadData::new()
            .key("id", 1)
            .key("day", 2)
            .column("name")
            .column_with_metadata("day");
        assert_eq!(
            data.projection().unwrap(),
            [("name", false), ("day", true), ("id", false)]
        );
        assert!(ReadData::new().key("id", 1).projection().is_none());
    }

    #[test]
    fn validate() {
        assert!(ReadData::new().validate(false).is_ok());
        assert!(ReadData::new().validate(true).is_err());
        assert!(
            ReadData::new()
                .distinct()
                .column_with_metadata("a")
                .validate(false)
                .is_err()
        );
        assert!(ReadData::new().limit(0).validate(false).is_err());
    }
}
