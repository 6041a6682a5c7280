use crate::{Operator, Predicate, QueryError, Result, Value, data::predicates_text};

/// Pending delete of a whole row or of some of its columns.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct DeleteData {
    pub keys: Vec<(String, Value)>,
    pub predicates: Vec<Predicate>,
    /// Columns to delete, empty deletes the row.
    pub columns: Vec<String>,
    pub only_if: Vec<Predicate>,
    pub if_exists: bool,
}

impl DeleteData {
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
        result.columns.push(column.into());
        result
    }
    pub fn only_if(&self, predicate: Predicate) -> Self {
        let mut result = self.clone();
        result.only_if.push(predicate);
        result
    }
    pub fn if_exists(&self) -> Self {
        let mut result = self.clone();
        result.if_exists = true;
        result
    }

    pub fn is_conditional(&self) -> bool {
        self.if_exists || !self.only_if.is_empty()
    }

    pub fn is_key_based(&self) -> bool {
        !self.keys.is_empty()
    }

    pub fn condition(&self) -> String {
        if self.if_exists {
            return "IF EXISTS".into();
        }
        let mut out = String::from("IF ");
        predicates_text(&mut out, &self.only_if);
        out
    }

    pub fn validate(&self) -> Result<()> {
        let error = |message: &str| -> Result<()> { Err(QueryError::invalid(message).into()) };
        match (self.keys.is_empty(), self.predicates.is_empty()) {
            (true, true) => return error("a delete needs either a key or a where clause"),
            (false, false) => return error("a delete cannot have both a key and a where clause"),
            _ => {}
        }
        if self.if_exists && !self.only_if.is_empty() {
            return error("IF EXISTS and IF conditions are mutually exclusive");
        }
        if !self.predicates.is_empty() && self.is_conditional() {
            return error("a delete through a where clause cannot be conditional");
        }
        if self.predicates.iter().any(|p| p.op == Operator::Ne) {
            return error("`!=` is only allowed in conditions");
        }
        Ok(())
    }
}
