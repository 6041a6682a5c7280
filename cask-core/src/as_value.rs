use crate::{Error, Result, Value};
use rust_decimal::{Decimal, prelude::ToPrimitive};
use std::{
    any,
    borrow::Cow,
    collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque},
    hash::Hash,
    net::IpAddr,
    sync::Arc,
};
use time::{Date, OffsetDateTime, Time};
use uuid::Uuid;

/// Conversion between native Rust types and the dynamically typed [`Value`].
///
/// This is the domain side of the coercion: `as_value` produces the shape the Rust type
/// naturally has (a `Vec` is a list, a `BTreeSet` is a set, a `#[derive(Udt)]` struct is a
/// user defined value) and the [`crate::Coercion`] engine later reconciles that shape with the
/// column declared by the store.
///
/// # Implementing `AsValue` for custom types
/// Scalars usually wrap another implementation:
/// ```rust
/// use cask_core::{AsValue, Result, Value};
/// struct Email(String);
/// impl AsValue for Email {
///     fn as_empty_value() -> Value {
///         String::as_empty_value()
///     }
///     fn as_value(self) -> Value {
///         self.0.as_value()
///     }
///     fn try_from_value(value: Value) -> Result<Self> {
///         String::try_from_value(value).map(Email)
///     }
/// }
/// ```
///
/// # Error semantics
/// Range checks always occur before returning numeric conversions, the error message includes
/// both the offending value and the target type.
pub trait AsValue {
    /// Typed null of this type, used as a shape descriptor.
    fn as_empty_value() -> Value;
    /// Owned [`Value`] representation.
    fn as_value(self) -> Value;
    /// Attempt to convert a dynamic [`Value`] into `Self`.
    fn try_from_value(value: Value) -> Result<Self>
    where
        Self: Sized;
}

impl<T: AsValue> From<T> for Value {
    fn from(value: T) -> Self {
        value.as_value()
    }
}

fn mismatch<T>(value: &Value) -> Error {
    Error::msg(format!(
        "Cannot convert {value:?} to {}",
        any::type_name::<T>()
    ))
}

macro_rules! impl_as_value {
    ($source:ty, $destination:path $(, $pat_rest:pat => $expr_rest:expr)* $(,)?) => {
        impl AsValue for $source {
            fn as_empty_value() -> Value {
                $destination(None)
            }
            fn as_value(self) -> Value {
                $destination(Some(self as _))
            }
            fn try_from_value(value: Value) -> Result<Self> {
                match value {
                    $destination(Some(v), ..) => Ok(v as _),
                    $($pat_rest => $expr_rest,)*
                    #[allow(unreachable_patterns)]
                    Value::Int(Some(v), ..) => {
                        if (v as i128).clamp(<$source>::MIN as _, <$source>::MAX as _) != v as i128 {
                            return Err(Error::msg(format!(
                                "Value {v}: int is out of range for {}",
                                any::type_name::<Self>(),
                            )));
                        }
                        Ok(v as $source)
                    },
                    #[allow(unreachable_patterns)]
                    Value::BigInt(Some(v), ..) | Value::Counter(Some(v), ..) => {
                        if (v as i128).clamp(<$source>::MIN as _, <$source>::MAX as _) != v as i128 {
                            return Err(Error::msg(format!(
                                "Value {v}: bigint is out of range for {}",
                                any::type_name::<Self>(),
                            )));
                        }
                        Ok(v as $source)
                    }
                    _ => Err(mismatch::<Self>(&value)),
                }
            }
        }
    };
}
impl_as_value!(
    i8,
    Value::TinyInt,
    Value::SmallInt(Some(v), ..) => {
        let result = v as i8;
        if result as i16 != v {
            return Err(Error::msg(format!("Value {v}: smallint is out of range for i8")));
        }
        Ok(result)
    },
);
impl_as_value!(
    i16,
    Value::SmallInt,
    Value::TinyInt(Some(v), ..) => Ok(v as _),
);
impl_as_value!(
    i32,
    Value::Int,
    Value::SmallInt(Some(v), ..) => Ok(v as _),
    Value::TinyInt(Some(v), ..) => Ok(v as _),
    Value::Decimal(Some(v), ..) => {
        let error = Error::msg(format!("Value {v}: Decimal does not fit into i32"));
        if !v.is_integer() {
            return Err(error.context("The value is not a integer"));
        }
        v.to_i32().ok_or(error)
    }
);
impl_as_value!(
    i64,
    Value::BigInt,
    Value::Int(Some(v), ..) => Ok(v as _),
    Value::SmallInt(Some(v), ..) => Ok(v as _),
    Value::TinyInt(Some(v), ..) => Ok(v as _),
    Value::Decimal(Some(v), ..) => {
        let error = Error::msg(format!("Value {v}: Decimal does not fit into i64"));
        if !v.is_integer() {
            return Err(error.context("The value is not a integer"));
        }
        v.to_i64().ok_or(error)
    }
);
macro_rules! impl_as_value_unsigned {
    ($source:ty, $destination:path, $wide:ty) => {
        impl AsValue for $source {
            fn as_empty_value() -> Value {
                $destination(None)
            }
            fn as_value(self) -> Value {
                $destination(Some(self as $wide))
            }
            fn try_from_value(value: Value) -> Result<Self> {
                let v: i64 = match value {
                    Value::TinyInt(Some(v), ..) => v as _,
                    Value::SmallInt(Some(v), ..) => v as _,
                    Value::Int(Some(v), ..) => v as _,
                    Value::BigInt(Some(v), ..) | Value::Counter(Some(v), ..) => v,
                    _ => return Err(mismatch::<Self>(&value)),
                };
                <$source>::try_from(v).map_err(|_| {
                    Error::msg(format!(
                        "Value {v} is out of range for {}",
                        any::type_name::<Self>()
                    ))
                })
            }
        }
    };
}
impl_as_value_unsigned!(u8, Value::SmallInt, i16);
impl_as_value_unsigned!(u16, Value::Int, i32);
impl_as_value_unsigned!(u32, Value::BigInt, i64);

impl AsValue for bool {
    fn as_empty_value() -> Value {
        Value::Boolean(None)
    }
    fn as_value(self) -> Value {
        Value::Boolean(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Boolean(Some(v), ..) => Ok(v),
            Value::TinyInt(Some(v), ..) => Ok(v != 0),
            Value::SmallInt(Some(v), ..) => Ok(v != 0),
            Value::Int(Some(v), ..) => Ok(v != 0),
            Value::BigInt(Some(v), ..) => Ok(v != 0),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl AsValue for f32 {
    fn as_empty_value() -> Value {
        Value::Float(None)
    }
    fn as_value(self) -> Value {
        Value::Float(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float(Some(v), ..) => Ok(v),
            Value::Double(Some(v), ..) => {
                let result = v as f32;
                if result.is_finite() != v.is_finite() {
                    return Err(Error::msg(format!("Value {v}: double is out of range for f32")));
                }
                Ok(result)
            }
            Value::Decimal(Some(v), ..) => v
                .to_f32()
                .ok_or_else(|| Error::msg(format!("Value {v}: Decimal does not fit into f32"))),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl AsValue for f64 {
    fn as_empty_value() -> Value {
        Value::Double(None)
    }
    fn as_value(self) -> Value {
        Value::Double(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Double(Some(v), ..) => Ok(v),
            Value::Float(Some(v), ..) => Ok(v as _),
            Value::Int(Some(v), ..) => Ok(v as _),
            Value::SmallInt(Some(v), ..) => Ok(v as _),
            Value::TinyInt(Some(v), ..) => Ok(v as _),
            Value::Decimal(Some(v), ..) => v
                .to_f64()
                .ok_or_else(|| Error::msg(format!("Value {v}: Decimal does not fit into f64"))),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl AsValue for Decimal {
    fn as_empty_value() -> Value {
        Value::Decimal(None)
    }
    fn as_value(self) -> Value {
        Value::Decimal(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Decimal(Some(v), ..) => Ok(v),
            Value::TinyInt(Some(v), ..) => Ok(Decimal::new(v as i64, 0)),
            Value::SmallInt(Some(v), ..) => Ok(Decimal::new(v as i64, 0)),
            Value::Int(Some(v), ..) => Ok(Decimal::new(v as i64, 0)),
            Value::BigInt(Some(v), ..) => Ok(Decimal::new(v, 0)),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl AsValue for String {
    fn as_empty_value() -> Value {
        Value::Text(None)
    }
    fn as_value(self) -> Value {
        Value::Text(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Text(Some(v), ..) => Ok(v),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl<'a> AsValue for Cow<'a, str> {
    fn as_empty_value() -> Value {
        Value::Text(None)
    }
    fn as_value(self) -> Value {
        Value::Text(Some(self.into()))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        String::try_from_value(value).map(Into::into)
    }
}

impl AsValue for Box<[u8]> {
    fn as_empty_value() -> Value {
        Value::Blob(None)
    }
    fn as_value(self) -> Value {
        Value::Blob(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Blob(Some(v), ..) => Ok(v),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl AsValue for Date {
    fn as_empty_value() -> Value {
        Value::Date(None)
    }
    fn as_value(self) -> Value {
        Value::Date(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Date(Some(v), ..) => Ok(v),
            Value::Timestamp(Some(v), ..) => Ok(v.date()),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl AsValue for Time {
    fn as_empty_value() -> Value {
        Value::Time(None)
    }
    fn as_value(self) -> Value {
        Value::Time(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Time(Some(v), ..) => Ok(v),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl AsValue for OffsetDateTime {
    fn as_empty_value() -> Value {
        Value::Timestamp(None)
    }
    fn as_value(self) -> Value {
        Value::Timestamp(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Timestamp(Some(v), ..) => Ok(v),
            Value::Date(Some(v), ..) => Ok(v.midnight().assume_utc()),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl AsValue for Uuid {
    fn as_empty_value() -> Value {
        Value::Uuid(None)
    }
    fn as_value(self) -> Value {
        Value::Uuid(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Uuid(Some(v), ..) | Value::TimeUuid(Some(v), ..) => Ok(v),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl AsValue for IpAddr {
    fn as_empty_value() -> Value {
        Value::Inet(None)
    }
    fn as_value(self) -> Value {
        Value::Inet(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Inet(Some(v), ..) => Ok(v),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

/// Value of a counter column.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Counter(pub i64);

impl AsValue for Counter {
    fn as_empty_value() -> Value {
        Value::Counter(None)
    }
    fn as_value(self) -> Value {
        Value::Counter(Some(self.0))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Counter(Some(v), ..) | Value::BigInt(Some(v), ..) => Ok(Counter(v)),
            Value::Counter(None) | Value::Null => Ok(Counter(0)),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl<T: AsValue> AsValue for Option<T> {
    fn as_empty_value() -> Value {
        T::as_empty_value()
    }
    fn as_value(self) -> Value {
        match self {
            Some(v) => v.as_value(),
            None => T::as_empty_value(),
        }
    }
    fn try_from_value(value: Value) -> Result<Self> {
        Ok(if value.is_null() {
            None
        } else {
            Some(<T as AsValue>::try_from_value(value)?)
        })
    }
}

impl<T: AsValue> AsValue for Box<T> {
    fn as_empty_value() -> Value {
        T::as_empty_value()
    }
    fn as_value(self) -> Value {
        (*self).as_value()
    }
    fn try_from_value(value: Value) -> Result<Self> {
        Ok(Self::new(<T as AsValue>::try_from_value(value)?))
    }
}

impl<T: AsValue + Clone> AsValue for Arc<T> {
    fn as_empty_value() -> Value {
        T::as_empty_value()
    }
    fn as_value(self) -> Value {
        Arc::try_unwrap(self)
            .unwrap_or_else(|v| v.as_ref().clone())
            .as_value()
    }
    fn try_from_value(value: Value) -> Result<Self> {
        Ok(Arc::new(<T as AsValue>::try_from_value(value)?))
    }
}

/// Elements of a list or a set, a null collection is an empty one.
fn collection_elements<C>(value: Value) -> Result<Vec<Value>> {
    match value {
        Value::List(Some(v), ..) | Value::Set(Some(v), ..) => Ok(v),
        Value::List(None, ..) | Value::Set(None, ..) | Value::Null => Ok(Vec::new()),
        _ => Err(mismatch::<C>(&value)),
    }
}

macro_rules! impl_as_value {
    ($source:ident, $variant:path $(, $bound:ident)*) => {
        impl<T: AsValue $(+ $bound)*> AsValue for $source<T> {
            fn as_empty_value() -> Value {
                $variant(None, Box::new(T::as_empty_value()))
            }
            fn as_value(self) -> Value {
                $variant(
                    Some(self.into_iter().map(AsValue::as_value).collect()),
                    Box::new(T::as_empty_value()),
                )
            }
            fn try_from_value(value: Value) -> Result<Self> {
                collection_elements::<Self>(value)?
                    .into_iter()
                    .map(<T as AsValue>::try_from_value)
                    .collect()
            }
        }
    };
}
impl_as_value!(Vec, Value::List);
impl_as_value!(VecDeque, Value::List);
impl_as_value!(BTreeSet, Value::Set, Ord);
impl_as_value!(HashSet, Value::Set, Eq, Hash);

macro_rules! impl_as_value {
    ($source:ident, $($key_trait:ident),+) => {
        impl<K: AsValue $(+ $key_trait)+, V: AsValue> AsValue for $source<K, V> {
            fn as_empty_value() -> Value {
                Value::Map(None, K::as_empty_value().into(), V::as_empty_value().into())
            }
            fn as_value(self) -> Value {
                Value::Map(
                    Some(
                        self.into_iter()
                            .map(|(k, v)| (k.as_value(), v.as_value()))
                            .collect(),
                    ),
                    K::as_empty_value().into(),
                    V::as_empty_value().into(),
                )
            }
            fn try_from_value(value: Value) -> Result<Self> {
                match value {
                    Value::Map(Some(v), ..) => v
                        .into_iter()
                        .map(|(k, v)| {
                            Ok((
                                <K as AsValue>::try_from_value(k)?,
                                <V as AsValue>::try_from_value(v)?,
                            ))
                        })
                        .collect(),
                    Value::Map(None, ..) | Value::Null => Ok(Self::new()),
                    _ => Err(mismatch::<Self>(&value)),
                }
            }
        }
    };
}
impl_as_value!(BTreeMap, Ord);
impl_as_value!(HashMap, Eq, Hash);
