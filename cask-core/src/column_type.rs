use crate::{Error, QueryError, Result, Value};
use std::{
    collections::HashMap,
    fmt::{self, Display, Formatter},
    sync::Arc,
};

/// Native type of a column as declared by the store schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Boolean,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Counter,
    Float,
    Double,
    Decimal,
    Ascii,
    Text,
    Blob,
    Date,
    Time,
    Timestamp,
    Uuid,
    TimeUuid,
    Inet,
    List(Box<ColumnType>),
    Set(Box<ColumnType>),
    Map(Box<ColumnType>, Box<ColumnType>),
    /// Reference to a user defined type, the definition is looked up separately.
    Udt(UdtRef),
}

/// Name of a user defined type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UdtRef {
    pub keyspace: Arc<str>,
    pub name: Arc<str>,
}

impl UdtRef {
    pub fn new(keyspace: impl Into<Arc<str>>, name: impl Into<Arc<str>>) -> Self {
        Self {
            keyspace: keyspace.into(),
            name: name.into(),
        }
    }
    /// `keyspace.name`, the key used by the user type cache.
    pub fn full_name(&self) -> String {
        let mut result = String::with_capacity(self.keyspace.len() + self.name.len() + 1);
        if !self.keyspace.is_empty() {
            result.push_str(&self.keyspace);
            result.push('.');
        }
        result.push_str(&self.name);
        result
    }
}

/// Schema definition of a user defined type: ordered, named, typed fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdtDefinition {
    pub keyspace: Arc<str>,
    pub name: Arc<str>,
    pub fields: Vec<(String, ColumnType)>,
}

impl UdtDefinition {
    pub fn field(&self, name: &str) -> Option<&ColumnType> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }
}

/// Name and type of a column in a result set or among the bind markers of a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub ty: ColumnType,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Structural classification of a native type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeClass {
    Primitive,
    Collection,
    Composite,
}

impl ColumnType {
    pub fn class(&self) -> TypeClass {
        match self {
            ColumnType::List(..) | ColumnType::Set(..) | ColumnType::Map(..) => {
                TypeClass::Collection
            }
            ColumnType::Udt(..) => TypeClass::Composite,
            _ => TypeClass::Primitive,
        }
    }

    pub fn is_counter(&self) -> bool {
        matches!(self, ColumnType::Counter)
    }

    /// Every user defined type referenced by this type, at any depth of collection nesting.
    /// Types nested inside other user defined types are only known once their parent is resolved.
    pub fn udt_refs<'a>(&'a self, out: &mut Vec<&'a UdtRef>) {
        match self {
            ColumnType::List(v) | ColumnType::Set(v) => v.udt_refs(out),
            ColumnType::Map(k, v) => {
                k.udt_refs(out);
                v.udt_refs(out);
            }
            ColumnType::Udt(v) => out.push(v),
            _ => {}
        }
    }

    /// Empty value of the right shape.
    pub fn null_value(&self) -> Value {
        match self {
            ColumnType::Boolean => Value::Boolean(None),
            ColumnType::TinyInt => Value::TinyInt(None),
            ColumnType::SmallInt => Value::SmallInt(None),
            ColumnType::Int => Value::Int(None),
            ColumnType::BigInt => Value::BigInt(None),
            ColumnType::Counter => Value::Counter(None),
            ColumnType::Float => Value::Float(None),
            ColumnType::Double => Value::Double(None),
            ColumnType::Decimal => Value::Decimal(None),
            ColumnType::Ascii | ColumnType::Text => Value::Text(None),
            ColumnType::Blob => Value::Blob(None),
            ColumnType::Date => Value::Date(None),
            ColumnType::Time => Value::Time(None),
            ColumnType::Timestamp => Value::Timestamp(None),
            ColumnType::Uuid => Value::Uuid(None),
            ColumnType::TimeUuid => Value::TimeUuid(None),
            ColumnType::Inet => Value::Inet(None),
            ColumnType::List(v) => Value::List(None, v.null_value().into()),
            ColumnType::Set(v) => Value::Set(None, v.null_value().into()),
            ColumnType::Map(k, v) => Value::Map(None, k.null_value().into(), v.null_value().into()),
            ColumnType::Udt(v) => Value::Udt(None, v.name.to_string().into()),
        }
    }
}

impl Display for ColumnType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Boolean => f.write_str("boolean"),
            ColumnType::TinyInt => f.write_str("tinyint"),
            ColumnType::SmallInt => f.write_str("smallint"),
            ColumnType::Int => f.write_str("int"),
            ColumnType::BigInt => f.write_str("bigint"),
            ColumnType::Counter => f.write_str("counter"),
            ColumnType::Float => f.write_str("float"),
            ColumnType::Double => f.write_str("double"),
            ColumnType::Decimal => f.write_str("decimal"),
            ColumnType::Ascii => f.write_str("ascii"),
            ColumnType::Text => f.write_str("text"),
            ColumnType::Blob => f.write_str("blob"),
            ColumnType::Date => f.write_str("date"),
            ColumnType::Time => f.write_str("time"),
            ColumnType::Timestamp => f.write_str("timestamp"),
            ColumnType::Uuid => f.write_str("uuid"),
            ColumnType::TimeUuid => f.write_str("timeuuid"),
            ColumnType::Inet => f.write_str("inet"),
            ColumnType::List(v) => write!(f, "list<{v}>"),
            ColumnType::Set(v) => write!(f, "set<{v}>"),
            ColumnType::Map(k, v) => write!(f, "map<{k}, {v}>"),
            ColumnType::Udt(v) => write!(f, "frozen<{}>", v.name),
        }
    }
}

/// User defined type definitions resolved for a single operation.
///
/// Encoding and decoding run synchronously, every definition they could need is loaded
/// (through the context cache) before the work starts.
#[derive(Debug, Default, Clone)]
pub struct TypeRegistry {
    types: HashMap<String, Arc<UdtDefinition>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Default::default()
    }
    pub fn insert(&mut self, definition: Arc<UdtDefinition>) {
        let key = UdtRef::new(definition.keyspace.clone(), definition.name.clone()).full_name();
        self.types.insert(key, definition);
    }
    pub fn contains(&self, udt: &UdtRef) -> bool {
        self.types.contains_key(&udt.full_name())
    }
    pub fn get(&self, udt: &UdtRef) -> Result<&UdtDefinition> {
        self.types
            .get(&udt.full_name())
            .map(AsRef::as_ref)
            .ok_or_else(|| {
                Error::new(QueryError::SchemaMismatch {
                    column: udt.full_name(),
                    message: "the user defined type was not resolved".into(),
                })
            })
    }
    pub fn len(&self) -> usize {
        self.types.len()
    }
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
