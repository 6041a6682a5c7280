use rust_decimal::Decimal;
use std::{
    borrow::Cow,
    fmt::{self, Display, Formatter},
    mem::discriminant,
    net::IpAddr,
};
use time::{Date, OffsetDateTime, Time};
use uuid::Uuid;

/// Dynamically typed column value.
///
/// Every variant carries an `Option` payload: `Some` is an actual value, `None` is a typed null.
/// A `None` payload also works as a shape descriptor, this is how field descriptors declare the
/// type of a domain field (see [`crate::FieldDef`]).
#[derive(Default, Debug, Clone)]
pub enum Value {
    #[default]
    Null,
    Boolean(Option<bool>),
    TinyInt(Option<i8>),
    SmallInt(Option<i16>),
    Int(Option<i32>),
    BigInt(Option<i64>),
    Counter(Option<i64>),
    Float(Option<f32>),
    Double(Option<f64>),
    Decimal(Option<Decimal>),
    Text(Option<String>),
    Blob(Option<Box<[u8]>>),
    Date(Option<Date>),
    Time(Option<Time>),
    Timestamp(Option<OffsetDateTime>),
    Uuid(Option<Uuid>),
    TimeUuid(Option<Uuid>),
    Inet(Option<IpAddr>),
    List(Option<Vec<Value>>, /* element: */ Box<Value>),
    Set(Option<Vec<Value>>, /* element: */ Box<Value>),
    Map(
        Option<Vec<(Value, Value)>>,
        /* key: */ Box<Value>,
        /* value: */ Box<Value>,
    ),
    Udt(
        Option<Vec<(String, Value)>>,
        /* type name: */ Cow<'static, str>,
    ),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Boolean(l), Self::Boolean(r)) => l == r,
            (Self::TinyInt(l), Self::TinyInt(r)) => l == r,
            (Self::SmallInt(l), Self::SmallInt(r)) => l == r,
            (Self::Int(l), Self::Int(r)) => l == r,
            (Self::BigInt(l), Self::BigInt(r)) => l == r,
            (Self::Counter(l), Self::Counter(r)) => l == r,
            (Self::Float(l), Self::Float(r)) => l == r,
            (Self::Double(l), Self::Double(r)) => l == r,
            (Self::Decimal(l), Self::Decimal(r)) => l == r,
            (Self::Text(l), Self::Text(r)) => l == r,
            (Self::Blob(l), Self::Blob(r)) => l == r,
            (Self::Date(l), Self::Date(r)) => l == r,
            (Self::Time(l), Self::Time(r)) => l == r,
            (Self::Timestamp(l), Self::Timestamp(r)) => l == r,
            (Self::Uuid(l), Self::Uuid(r)) => l == r,
            (Self::TimeUuid(l), Self::TimeUuid(r)) => l == r,
            (Self::Inet(l), Self::Inet(r)) => l == r,
            (Self::List(l, ..), Self::List(r, ..)) => l == r && self.same_type(other),
            (Self::Set(l, ..), Self::Set(r, ..)) => l == r && self.same_type(other),
            (Self::Map(l, ..), Self::Map(r, ..)) => l == r && self.same_type(other),
            (Self::Udt(l, l_name), Self::Udt(r, r_name)) => l == r && l_name == r_name,
            _ => discriminant(self) == discriminant(other),
        }
    }
}

impl Value {
    /// Structural type equality, payloads are ignored.
    pub fn same_type(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::List(.., l), Self::List(.., r)) | (Self::Set(.., l), Self::Set(.., r)) => {
                l.same_type(r)
            }
            (Self::Map(.., l_key, l_value), Self::Map(.., r_key, r_value)) => {
                l_key.same_type(r_key) && l_value.same_type(r_value)
            }
            (Self::Udt(.., l), Self::Udt(.., r)) => l == r,
            _ => discriminant(self) == discriminant(other),
        }
    }

    /// True for `Null` and for every typed null.
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Boolean(v) => v.is_none(),
            Value::TinyInt(v) => v.is_none(),
            Value::SmallInt(v) => v.is_none(),
            Value::Int(v) => v.is_none(),
            Value::BigInt(v) | Value::Counter(v) => v.is_none(),
            Value::Float(v) => v.is_none(),
            Value::Double(v) => v.is_none(),
            Value::Decimal(v) => v.is_none(),
            Value::Text(v) => v.is_none(),
            Value::Blob(v) => v.is_none(),
            Value::Date(v) => v.is_none(),
            Value::Time(v) => v.is_none(),
            Value::Timestamp(v) => v.is_none(),
            Value::Uuid(v) | Value::TimeUuid(v) => v.is_none(),
            Value::Inet(v) => v.is_none(),
            Value::List(v, ..) | Value::Set(v, ..) => v.is_none(),
            Value::Map(v, ..) => v.is_none(),
            Value::Udt(v, ..) => v.is_none(),
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Value::List(..) | Value::Set(..) | Value::Map(..))
    }

    /// A collection that is present but holds no element.
    pub fn is_empty_collection(&self) -> bool {
        match self {
            Value::List(Some(v), ..) | Value::Set(Some(v), ..) => v.is_empty(),
            Value::Map(Some(v), ..) => v.is_empty(),
            _ => false,
        }
    }

    /// Same shape with the payload removed.
    pub fn as_null(&self) -> Value {
        match self {
            Value::Null => Value::Null,
            Value::Boolean(..) => Value::Boolean(None),
            Value::TinyInt(..) => Value::TinyInt(None),
            Value::SmallInt(..) => Value::SmallInt(None),
            Value::Int(..) => Value::Int(None),
            Value::BigInt(..) => Value::BigInt(None),
            Value::Counter(..) => Value::Counter(None),
            Value::Float(..) => Value::Float(None),
            Value::Double(..) => Value::Double(None),
            Value::Decimal(..) => Value::Decimal(None),
            Value::Text(..) => Value::Text(None),
            Value::Blob(..) => Value::Blob(None),
            Value::Date(..) => Value::Date(None),
            Value::Time(..) => Value::Time(None),
            Value::Timestamp(..) => Value::Timestamp(None),
            Value::Uuid(..) => Value::Uuid(None),
            Value::TimeUuid(..) => Value::TimeUuid(None),
            Value::Inet(..) => Value::Inet(None),
            Value::List(_, elem) => Value::List(None, elem.clone()),
            Value::Set(_, elem) => Value::Set(None, elem.clone()),
            Value::Map(_, key, value) => Value::Map(None, key.clone(), value.clone()),
            Value::Udt(_, name) => Value::Udt(None, name.clone()),
        }
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(..) => "boolean",
            Value::TinyInt(..) => "tinyint",
            Value::SmallInt(..) => "smallint",
            Value::Int(..) => "int",
            Value::BigInt(..) => "bigint",
            Value::Counter(..) => "counter",
            Value::Float(..) => "float",
            Value::Double(..) => "double",
            Value::Decimal(..) => "decimal",
            Value::Text(..) => "text",
            Value::Blob(..) => "blob",
            Value::Date(..) => "date",
            Value::Time(..) => "time",
            Value::Timestamp(..) => "timestamp",
            Value::Uuid(..) => "uuid",
            Value::TimeUuid(..) => "timeuuid",
            Value::Inet(..) => "inet",
            Value::List(..) => "list",
            Value::Set(..) => "set",
            Value::Map(..) => "map",
            Value::Udt(..) => "udt",
        }
    }

    /// Field of a user defined value, `None` when missing or when this is not a present UDT.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Udt(Some(fields), ..) => fields.iter().find(|(k, _)| k == name).map(|(_, v)| v),
            _ => None,
        }
    }
}

impl From<&'static str> for Value {
    fn from(value: &'static str) -> Self {
        Value::Text(Some(value.into()))
    }
}

fn write_list<'a>(
    f: &mut Formatter<'_>,
    open: &str,
    values: impl Iterator<Item = &'a Value>,
    close: &str,
) -> fmt::Result {
    f.write_str(open)?;
    for (i, v) in values.enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{v}")?;
    }
    f.write_str(close)
}

/// CQL literal like rendering, used in logs and error messages.
impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(Some(v)) => write!(f, "{v}"),
            Value::TinyInt(Some(v)) => write!(f, "{v}"),
            Value::SmallInt(Some(v)) => write!(f, "{v}"),
            Value::Int(Some(v)) => write!(f, "{v}"),
            Value::BigInt(Some(v)) | Value::Counter(Some(v)) => write!(f, "{v}"),
            Value::Float(Some(v)) => write!(f, "{v}"),
            Value::Double(Some(v)) => write!(f, "{v}"),
            Value::Decimal(Some(v)) => write!(f, "{v}"),
            Value::Text(Some(v)) => write!(f, "'{}'", v.replace('\'', "''")),
            Value::Blob(Some(v)) => write!(f, "0x{}", hex::encode(v)),
            Value::Date(Some(v)) => write!(f, "'{v}'"),
            Value::Time(Some(v)) => write!(f, "'{v}'"),
            Value::Timestamp(Some(v)) => write!(f, "'{v}'"),
            Value::Uuid(Some(v)) | Value::TimeUuid(Some(v)) => write!(f, "{v}"),
            Value::Inet(Some(v)) => write!(f, "'{v}'"),
            Value::List(Some(v), ..) => write_list(f, "[", v.iter(), "]"),
            Value::Set(Some(v), ..) => write_list(f, "{", v.iter(), "}"),
            Value::Map(Some(v), ..) => {
                f.write_str("{")?;
                for (i, (k, v)) in v.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
            Value::Udt(Some(v), ..) => {
                f.write_str("{")?;
                for (i, (k, v)) in v.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
            _ => f.write_str("null"),
        }
    }
}
