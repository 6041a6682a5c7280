use std::{
    borrow::Cow,
    fmt::{self, Display, Formatter},
};

/// Keyspace qualified table name.
#[derive(Default, Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub keyspace: Cow<'static, str>,
    pub name: Cow<'static, str>,
}

impl TableRef {
    pub const fn new(keyspace: &'static str, name: &'static str) -> Self {
        Self {
            keyspace: Cow::Borrowed(keyspace),
            name: Cow::Borrowed(name),
        }
    }
    pub fn owned(keyspace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            keyspace: Cow::Owned(keyspace.into()),
            name: Cow::Owned(name.into()),
        }
    }
    pub fn full_name(&self) -> String {
        let mut result = String::new();
        if !self.keyspace.is_empty() {
            result.push_str(&self.keyspace);
            result.push('.');
        }
        result.push_str(&self.name);
        result
    }
}

impl Display for TableRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}
