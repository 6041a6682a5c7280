use crate::{Operator, Predicate, QueryError, Result, Value, data::predicates_text};

/// Pending write.
///
/// Immutable: every method returns a modified copy and leaves `self` untouched.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct WriteData {
    pub keys: Vec<(String, Value)>,
    pub predicates: Vec<Predicate>,
    /// `None` deletes the column.
    pub values: Vec<(String, Option<Value>)>,
    pub set_add: Vec<(String, Value)>,
    pub set_remove: Vec<(String, Value)>,
    pub list_append: Vec<(String, Value)>,
    pub list_prepend: Vec<(String, Value)>,
    pub list_remove: Vec<(String, Value)>,
    pub map_put: Vec<(String, Value)>,
    /// Set of the keys to remove.
    pub map_remove: Vec<(String, Value)>,
    pub only_if: Vec<Predicate>,
    pub if_not_exists: bool,
}

/// Empty collection deltas are no-ops and are dropped.
macro_rules! push_delta {
    ($self:ident, $field:ident, $column:expr, $value:expr) => {{
        let mut result = $self.clone();
        let value: Value = $value;
        if !value.is_empty_collection() {
            result.$field.push(($column.into(), value));
        }
        result
    }};
}

macro_rules! push_entry {
    ($self:ident, $field:ident, $column:expr, $value:expr) => {{
        let mut result = $self.clone();
        result.$field.push(($column.into(), $value));
        result
    }};
}

impl WriteData {
    pub fn new() -> Self {
        Default::default()
    }
    pub fn key(&self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        push_entry!(self, keys, column, value.into())
    }
    pub fn filter(&self, predicate: Predicate) -> Self {
        let mut result = self.clone();
        result.predicates.push(predicate);
        result
    }
    /// Setting a column again replaces its value.
    pub fn set(&self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with_value(column.into(), Some(value.into()))
    }
    /// Delete the value of a column.
    pub fn unset(&self, column: impl Into<String>) -> Self {
        self.with_value(column.into(), None)
    }
    fn with_value(&self, column: String, value: Option<Value>) -> Self {
        let mut result = self.clone();
        match result.values.iter_mut().find(|(k, _)| *k == column) {
            Some((_, current)) => *current = value,
            None => result.values.push((column, value)),
        }
        result
    }
    pub fn add_to_set(&self, column: impl Into<String>, values: impl Into<Value>) -> Self {
        push_delta!(self, set_add, column, values.into())
    }
    pub fn remove_from_set(&self, column: impl Into<String>, values: impl Into<Value>) -> Self {
        push_delta!(self, set_remove, column, values.into())
    }
    pub fn append_to_list(&self, column: impl Into<String>, values: impl Into<Value>) -> Self {
        push_delta!(self, list_append, column, values.into())
    }
    pub fn prepend_to_list(&self, column: impl Into<String>, values: impl Into<Value>) -> Self {
        push_delta!(self, list_prepend, column, values.into())
    }
    pub fn remove_from_list(&self, column: impl Into<String>, values: impl Into<Value>) -> Self {
        push_delta!(self, list_remove, column, values.into())
    }
    pub fn put_in_map(&self, column: impl Into<String>, entries: impl Into<Value>) -> Self {
        push_delta!(self, map_put, column, entries.into())
    }
    pub fn remove_from_map(&self, column: impl Into<String>, keys: impl Into<Value>) -> Self {
        push_delta!(self, map_remove, column, keys.into())
    }
    pub fn only_if(&self, predicate: Predicate) -> Self {
        let mut result = self.clone();
        result.only_if.push(predicate);
        result
    }
    pub fn if_not_exists(&self) -> Self {
        let mut result = self.clone();
        result.if_not_exists = true;
        result
    }

    /// Collection deltas in the order they are written, paired with the shape of the update.
    pub fn deltas(&self) -> impl Iterator<Item = (Delta, &String, &Value)> {
        entries(Delta::SetAdd, &self.set_add)
            .chain(entries(Delta::SetRemove, &self.set_remove))
            .chain(entries(Delta::ListAppend, &self.list_append))
            .chain(entries(Delta::ListPrepend, &self.list_prepend))
            .chain(entries(Delta::ListRemove, &self.list_remove))
            .chain(entries(Delta::MapPut, &self.map_put))
            .chain(entries(Delta::MapRemove, &self.map_remove))
    }

    pub fn has_deltas(&self) -> bool {
        self.deltas().next().is_some()
    }

    pub fn is_conditional(&self) -> bool {
        self.if_not_exists || !self.only_if.is_empty()
    }

    pub fn is_key_based(&self) -> bool {
        !self.keys.is_empty()
    }

    /// True when the write is an `INSERT` rather than an `UPDATE`.
    pub fn is_insert(&self) -> bool {
        self.is_key_based()
            && (self.if_not_exists || (!self.has_deltas() && self.only_if.is_empty()))
    }

    /// Text of the condition, used in conflict errors.
    pub fn condition(&self) -> String {
        if self.if_not_exists {
            return "IF NOT EXISTS".into();
        }
        let mut out = String::from("IF ");
        predicates_text(&mut out, &self.only_if);
        out
    }

    pub fn validate(&self) -> Result<()> {
        let error = |message: &str| -> Result<()> { Err(QueryError::invalid(message).into()) };
        match (self.keys.is_empty(), self.predicates.is_empty()) {
            (true, true) => return error("a write needs either a key or a where clause"),
            (false, false) => return error("a write cannot have both a key and a where clause"),
            _ => {}
        }
        if !self.predicates.is_empty() && self.if_not_exists {
            return error("a write through a where clause cannot be IF NOT EXISTS");
        }
        if !self.predicates.is_empty() && !self.only_if.is_empty() {
            return error("a write through a where clause cannot have conditions");
        }
        if self.if_not_exists && !self.only_if.is_empty() {
            return error("IF NOT EXISTS and IF conditions are mutually exclusive");
        }
        if self.if_not_exists && self.has_deltas() {
            return error("IF NOT EXISTS cannot be combined with collection updates");
        }
        if !self.is_insert() && self.values.is_empty() && !self.has_deltas() {
            return error("the update does not change any column");
        }
        if let Some(p) = self.predicates.iter().find(|p| p.op == Operator::Ne) {
            return Err(QueryError::invalid(format!(
                "`!=` is only allowed in conditions, found in the where clause on `{}`",
                p.column
            ))
            .into());
        }
        Ok(())
    }
}

/// Kind of collection update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delta {
    SetAdd,
    SetRemove,
    ListAppend,
    ListPrepend,
    ListRemove,
    MapPut,
    MapRemove,
}

fn entries(
    delta: Delta,
    values: &[(String, Value)],
) -> impl Iterator<Item = (Delta, &String, &Value)> {
    values.iter().map(move |(column, value)| (delta, column, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immutable_setters() {
        let base = WriteData::new().key("id", 1);
        let changed = base.set("name", "x").if_not_exists();
        assert!(base.values.is_empty());
        assert!(!base.if_not_exists);
        assert_eq!(changed.values.len(), 1);
        assert!(changed.if_not_exists);
        assert_eq!(changed.keys, base.keys);

        let replaced = changed.set("name", "y").unset("note").set("name", "z");
        assert_eq!(
            replaced.values,
            [
                ("name".to_string(), Some(Value::from("z"))),
                ("note".to_string(), None),
            ]
        );
    }

    #[test]
    fn insert_or_update() {
        let data = WriteData::new().key("id", 1).set("name", "x");
        assert!(data.is_insert());
        assert!(!data.add_to_set("tags", vec!["a".to_string()]).is_insert());
        assert!(!data.only_if(Predicate::eq("name", "y")).is_insert());
        assert!(data.only_if(Predicate::eq("name", "y")).validate().is_ok());
        assert!(!WriteData::new().filter(Predicate::eq("id", 1)).set("a", 1).is_insert());
    }

    #[test]
    fn invalid() {
        let cases = [
            WriteData::new().set("a", 1),
            WriteData::new().key("id", 1).filter(Predicate::eq("id", 1)),
            WriteData::new()
                .filter(Predicate::eq("id", 1))
                .set("a", 1)
                .if_not_exists(),
            WriteData::new()
                .filter(Predicate::eq("id", 1))
                .set("a", 1)
                .only_if(Predicate::eq("a", 2)),
            WriteData::new()
                .key("id", 1)
                .if_not_exists()
                .only_if(Predicate::eq("a", 2)),
            WriteData::new()
                .key("id", 1)
                .append_to_list("l", vec![1])
                .if_not_exists(),
            WriteData::new().filter(Predicate::eq("id", 1)),
        ];
        for data in cases {
            let error = data.validate().unwrap_err();
            assert!(
                matches!(
                    error.downcast_ref::<QueryError>(),
                    Some(QueryError::InvalidQuery(..))
                ),
                "{data:?}"
            );
        }
    }

    #[test]
    fn condition_text() {
        assert_eq!(
            WriteData::new().key("id", 1).if_not_exists().condition(),
            "IF NOT EXISTS"
        );
        let data = WriteData::new()
            .key("id", 1)
            .set("a", 1)
            .only_if(Predicate::eq("a", 2));
        assert_eq!(data.condition(), "IF a = 2");
    }
}
