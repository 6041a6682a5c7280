use crate::{ColumnType, Error, QueryError, Result, TypeClass, TypeRegistry, Value, codec};
use bytes::Bytes;
use rust_decimal::{Decimal, prelude::FromPrimitive};

/// Recursive conversion between domain values and native column values.
///
/// The domain side is whatever [`crate::AsValue`] produced: its shape follows the Rust type,
/// not the column. `encode` reconciles that shape with the declared [`ColumnType`] (numeric
/// widening, list to set, user defined values laid out in schema field order) and `decode`
/// brings a native value back into canonical form.
///
/// # Empty collections
/// An empty collection is written as null, the store never keeps an empty collection marker.
/// Reading a null collection yields the empty collection of the declared type. After a round
/// trip an empty collection and an absent one are indistinguishable:
/// ```rust
/// use cask_core::{Coercion, ColumnType, TypeRegistry, Value};
/// let types = TypeRegistry::new();
/// let coercion = Coercion::new(&types);
/// let ty = ColumnType::Set(Box::new(ColumnType::Text));
/// let empty = Value::Set(Some(vec![]), Box::new(Value::Text(None)));
/// let stored = coercion.encode("tags", &ty, empty.clone()).unwrap();
/// assert!(stored.is_null());
/// assert_eq!(coercion.decode("tags", &ty, stored).unwrap(), empty);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Coercion<'a> {
    types: &'a TypeRegistry,
}

fn mismatch(column: &str, ty: &ColumnType, value: &Value) -> Error {
    Error::new(QueryError::schema_mismatch(
        column,
        format!("expected {ty}, found a {} value", value.kind()),
    ))
}

fn out_of_range(column: &str, ty: &ColumnType, value: impl std::fmt::Display) -> Error {
    Error::new(QueryError::schema_mismatch(
        column,
        format!("value {value} is out of range for {ty}"),
    ))
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::TinyInt(Some(v)) => Some(*v as _),
        Value::SmallInt(Some(v)) => Some(*v as _),
        Value::Int(Some(v)) => Some(*v as _),
        Value::BigInt(Some(v)) | Value::Counter(Some(v)) => Some(*v),
        _ => None,
    }
}

impl<'a> Coercion<'a> {
    pub fn new(types: &'a TypeRegistry) -> Self {
        Self { types }
    }

    /// Structural classification, computed from the column type and never from the value.
    pub fn classify(ty: &ColumnType) -> TypeClass {
        ty.class()
    }

    /// Value a null column reads as.
    pub fn empty_value(ty: &ColumnType) -> Value {
        match ty {
            ColumnType::List(elem) => Value::List(Some(Vec::new()), elem.null_value().into()),
            ColumnType::Set(elem) => Value::Set(Some(Vec::new()), elem.null_value().into()),
            ColumnType::Map(key, value) => Value::Map(
                Some(Vec::new()),
                key.null_value().into(),
                value.null_value().into(),
            ),
            _ => ty.null_value(),
        }
    }

    /// Domain value to native value of the column.
    pub fn encode(&self, column: &str, ty: &ColumnType, value: Value) -> Result<Value> {
        if value.is_null() || value.is_empty_collection() {
            return Ok(ty.null_value());
        }
        match Self::classify(ty) {
            TypeClass::Primitive => self.encode_primitive(column, ty, value),
            TypeClass::Collection => self.encode_collection(column, ty, value),
            TypeClass::Composite => self.encode_composite(column, ty, value),
        }
    }

    /// Encode then serialize, this is what gets bound to a statement.
    pub fn encode_cell(
        &self,
        column: &str,
        ty: &ColumnType,
        value: Value,
    ) -> Result<Option<Bytes>> {
        let value = self.encode(column, ty, value)?;
        codec::serialize(column, &value, ty, self.types)
    }

    fn encode_primitive(&self, column: &str, ty: &ColumnType, value: Value) -> Result<Value> {
        let result = match (ty, value) {
            (ColumnType::Boolean, v @ Value::Boolean(..)) => v,
            (ColumnType::TinyInt, v) if integer(&v).is_some() => {
                let v = integer(&v).unwrap_or_default();
                Value::TinyInt(Some(
                    i8::try_from(v).map_err(|_| out_of_range(column, ty, v))?,
                ))
            }
            (ColumnType::SmallInt, v) if integer(&v).is_some() => {
                let v = integer(&v).unwrap_or_default();
                Value::SmallInt(Some(
                    i16::try_from(v).map_err(|_| out_of_range(column, ty, v))?,
                ))
            }
            (ColumnType::Int, v) if integer(&v).is_some() => {
                let v = integer(&v).unwrap_or_default();
                Value::Int(Some(
                    i32::try_from(v).map_err(|_| out_of_range(column, ty, v))?,
                ))
            }
            (ColumnType::BigInt, v) if integer(&v).is_some() => Value::BigInt(integer(&v)),
            (ColumnType::Counter, v) if integer(&v).is_some() => Value::Counter(integer(&v)),
            (ColumnType::Float, v @ Value::Float(..)) => v,
            (ColumnType::Float, Value::Double(Some(v))) => {
                let result = v as f32;
                if result.is_finite() != v.is_finite() {
                    return Err(out_of_range(column, ty, v));
                }
                Value::Float(Some(result))
            }
            (ColumnType::Double, v @ Value::Double(..)) => v,
            (ColumnType::Double, Value::Float(Some(v))) => Value::Double(Some(v as f64)),
            (ColumnType::Double, v) if integer(&v).is_some() => {
                Value::Double(integer(&v).map(|v| v as f64))
            }
            (ColumnType::Decimal, v @ Value::Decimal(..)) => v,
            (ColumnType::Decimal, v) if integer(&v).is_some() => {
                Value::Decimal(integer(&v).map(Decimal::from))
            }
            (ColumnType::Decimal, Value::Double(Some(v))) => Value::Decimal(Some(
                Decimal::from_f64(v).ok_or_else(|| out_of_range(column, ty, v))?,
            )),
            (ColumnType::Decimal, Value::Float(Some(v))) => Value::Decimal(Some(
                Decimal::from_f32(v).ok_or_else(|| out_of_range(column, ty, v))?,
            )),
            (ColumnType::Ascii | ColumnType::Text, v @ Value::Text(..)) => v,
            (ColumnType::Blob, v @ Value::Blob(..)) => v,
            (ColumnType::Date, v @ Value::Date(..)) => v,
            (ColumnType::Time, v @ Value::Time(..)) => v,
            (ColumnType::Timestamp, v @ Value::Timestamp(..)) => v,
            (ColumnType::Timestamp, Value::Date(Some(v))) => {
                Value::Timestamp(Some(v.midnight().assume_utc()))
            }
            (ColumnType::Uuid, Value::Uuid(v) | Value::TimeUuid(v)) => Value::Uuid(v),
            (ColumnType::TimeUuid, Value::TimeUuid(v)) => Value::TimeUuid(v),
            (ColumnType::TimeUuid, Value::Uuid(Some(v))) => {
                if v.get_version_num() != 1 {
                    return Err(Error::new(QueryError::schema_mismatch(
                        column,
                        format!("{v} is not a time based uuid"),
                    )));
                }
                Value::TimeUuid(Some(v))
            }
            (ColumnType::Inet, v @ Value::Inet(..)) => v,
            (_, v) => return Err(mismatch(column, ty, &v)),
        };
        Ok(result)
    }

    fn encode_collection(&self, column: &str, ty: &ColumnType, value: Value) -> Result<Value> {
        let elements = |elem: &ColumnType, values: Vec<Value>| -> Result<Vec<Value>> {
            values
                .into_iter()
                .map(|v| {
                    if v.is_null() {
                        return Err(Error::new(QueryError::schema_mismatch(
                            column,
                            "collections cannot contain null elements",
                        )));
                    }
                    self.encode(column, elem, v)
                })
                .collect()
        };
        match (ty, value) {
            (ColumnType::List(elem), Value::List(Some(v), ..) | Value::Set(Some(v), ..)) => {
                Ok(Value::List(Some(elements(elem, v)?), elem.null_value().into()))
            }
            (ColumnType::Set(elem), Value::Set(Some(v), ..) | Value::List(Some(v), ..)) => {
                let mut result: Vec<Value> = Vec::with_capacity(v.len());
                for item in elements(elem, v)? {
                    if !result.contains(&item) {
                        result.push(item);
                    }
                }
                Ok(Value::Set(Some(result), elem.null_value().into()))
            }
            (ColumnType::Map(key, val), Value::Map(Some(v), ..)) => {
                let mut result = Vec::with_capacity(v.len());
                for (k, item) in v {
                    if k.is_null() {
                        return Err(Error::new(QueryError::schema_mismatch(
                            column,
                            "map keys cannot be null",
                        )));
                    }
                    let k = self.encode(column, key, k)?;
                    let item = self.encode(column, val, item)?;
                    match result.iter_mut().find(|(existing, _)| *existing == k) {
                        Some((_, existing)) => *existing = item,
                        None => result.push((k, item)),
                    }
                }
                Ok(Value::Map(
                    Some(result),
                    key.null_value().into(),
                    val.null_value().into(),
                ))
            }
            (_, v) => Err(mismatch(column, ty, &v)),
        }
    }

    fn encode_composite(&self, column: &str, ty: &ColumnType, value: Value) -> Result<Value> {
        let ColumnType::Udt(udt) = ty else {
            return Err(mismatch(column, ty, &value));
        };
        let mut fields = match value {
            Value::Udt(Some(v), ..) => v,
            v => return Err(mismatch(column, ty, &v)),
        };
        let definition = self.types.get(udt)?;
        if let Some((unknown, _)) = fields
            .iter()
            .find(|(name, _)| definition.field(name).is_none())
        {
            return Err(Error::new(QueryError::schema_mismatch(
                column,
                format!("field `{unknown}` does not exist in type {}", udt.full_name()),
            )));
        }
        let mut result = Vec::with_capacity(definition.fields.len());
        for (name, field_ty) in &definition.fields {
            let value = match fields.iter().position(|(k, _)| k == name) {
                Some(i) => fields.swap_remove(i).1,
                None => Value::Null,
            };
            let nested = format!("{column}.{name}");
            result.push((name.clone(), self.encode(&nested, field_ty, value)?));
        }
        Ok(Value::Udt(Some(result), definition.name.to_string().into()))
    }

    /// Native value to canonical form: null collections become empty ones and user defined
    /// values list every schema field in declaration order.
    pub fn decode(&self, column: &str, ty: &ColumnType, value: Value) -> Result<Value> {
        match Self::classify(ty) {
            TypeClass::Primitive => {
                if matches!(value, Value::Null) {
                    return Ok(ty.null_value());
                }
                Ok(value)
            }
            TypeClass::Collection => {
                if value.is_null() {
                    return Ok(Self::empty_value(ty));
                }
                match (ty, value) {
                    (ColumnType::List(elem), Value::List(Some(v), ..)) => Ok(Value::List(
                        Some(self.decode_all(column, elem, v)?),
                        elem.null_value().into(),
                    )),
                    (ColumnType::Set(elem), Value::Set(Some(v), ..)) => Ok(Value::Set(
                        Some(self.decode_all(column, elem, v)?),
                        elem.null_value().into(),
                    )),
                    (ColumnType::Map(key, val), Value::Map(Some(v), ..)) => {
                        let v = v
                            .into_iter()
                            .map(|(k, item)| {
                                Ok((
                                    self.decode(column, key, k)?,
                                    self.decode(column, val, item)?,
                                ))
                            })
                            .collect::<Result<_>>()?;
                        Ok(Value::Map(
                            Some(v),
                            key.null_value().into(),
                            val.null_value().into(),
                        ))
                    }
                    (_, v) => Err(mismatch(column, ty, &v)),
                }
            }
            TypeClass::Composite => {
                if value.is_null() {
                    return Ok(ty.null_value());
                }
                let ColumnType::Udt(udt) = ty else {
                    return Err(mismatch(column, ty, &value));
                };
                let mut fields = match value {
                    Value::Udt(Some(v), ..) => v,
                    v => return Err(mismatch(column, ty, &v)),
                };
                let definition = self.types.get(udt)?;
                let mut result = Vec::with_capacity(definition.fields.len());
                for (name, field_ty) in &definition.fields {
                    let value = match fields.iter().position(|(k, _)| k == name) {
                        Some(i) => fields.swap_remove(i).1,
                        None => Value::Null,
                    };
                    let nested = format!("{column}.{name}");
                    result.push((name.clone(), self.decode(&nested, field_ty, value)?));
                }
                Ok(Value::Udt(Some(result), definition.name.to_string().into()))
            }
        }
    }

    fn decode_all(&self, column: &str, ty: &ColumnType, values: Vec<Value>) -> Result<Vec<Value>> {
        values
            .into_iter()
            .map(|v| self.decode(column, ty, v))
            .collect()
    }

    /// Deserialize then decode a raw cell.
    pub fn decode_cell(&self, column: &str, ty: &ColumnType, raw: Option<&[u8]>) -> Result<Value> {
        let value = codec::deserialize(column, ty, raw, self.types)?;
        self.decode(column, ty, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AsValue, UdtDefinition, UdtRef};
    use std::{collections::BTreeMap, sync::Arc};

    fn registry() -> TypeRegistry {
        let mut types = TypeRegistry::new();
        types.insert(Arc::new(UdtDefinition {
            keyspace: "shop".into(),
            name: "address".into(),
            fields: vec![
                ("street".into(), ColumnType::Text),
                ("number".into(), ColumnType::Int),
            ],
        }));
        types
    }

    #[test]
    fn widening_and_range() {
        let types = TypeRegistry::new();
        let coercion = Coercion::new(&types);
        assert_eq!(
            coercion
                .encode("n", &ColumnType::BigInt, 5i32.as_value())
                .unwrap(),
            Value::BigInt(Some(5))
        );
        let error = coercion
            .encode("n", &ColumnType::TinyInt, 300i32.as_value())
            .unwrap_err();
        assert!(matches!(
            error.downcast_ref::<QueryError>(),
            Some(QueryError::SchemaMismatch { column, .. }) if column == "n"
        ));
        let error = coercion
            .encode("n", &ColumnType::Int, Value::from("text"))
            .unwrap_err();
        assert!(error.to_string().contains("Column `n`"));
    }

    #[test]
    fn list_into_set_deduplicates() {
        let types = TypeRegistry::new();
        let coercion = Coercion::new(&types);
        let ty = ColumnType::Set(Box::new(ColumnType::BigInt));
        let encoded = coercion
            .encode("s", &ty, vec![1i32, 2, 1].as_value())
            .unwrap();
        assert_eq!(
            encoded,
            Value::Set(
                Some(vec![Value::BigInt(Some(1)), Value::BigInt(Some(2))]),
                Box::new(Value::BigInt(None))
            )
        );
    }

    #[test]
    fn udt_field_order_and_unknown_field() {
        let types = registry();
        let coercion = Coercion::new(&types);
        let ty = ColumnType::Udt(UdtRef::new("shop", "address"));
        let value = Value::Udt(
            Some(vec![
                ("number".into(), Value::SmallInt(Some(3))),
                ("street".into(), Value::Text(Some("Main".into()))),
            ]),
            "Address".into(),
        );
        let encoded = coercion.encode("home", &ty, value).unwrap();
        assert_eq!(
            encoded,
            Value::Udt(
                Some(vec![
                    ("street".into(), Value::Text(Some("Main".into()))),
                    ("number".into(), Value::Int(Some(3))),
                ]),
                "address".into()
            )
        );
        let value = Value::Udt(
            Some(vec![("zip".into(), Value::Text(Some("0000".into())))]),
            "Address".into(),
        );
        let error = coercion.encode("home", &ty, value).unwrap_err();
        assert!(error.to_string().contains("zip"));
    }

    #[test]
    fn null_collection_decodes_empty() {
        let types = TypeRegistry::new();
        let coercion = Coercion::new(&types);
        let ty = ColumnType::Map(Box::new(ColumnType::Text), Box::new(ColumnType::Int));
        let decoded = coercion.decode_cell("m", &ty, None).unwrap();
        assert_eq!(decoded, Coercion::empty_value(&ty));
        let map = BTreeMap::<String, i32>::try_from_value(decoded).unwrap();
        assert!(map.is_empty());
        assert_eq!(
            coercion.decode_cell("t", &ColumnType::Text, None).unwrap(),
            Value::Text(None)
        );
    }

    #[test]
    fn classify() {
        assert_eq!(Coercion::classify(&ColumnType::Int), TypeClass::Primitive);
        assert_eq!(
            Coercion::classify(&ColumnType::List(Box::new(ColumnType::Int))),
            TypeClass::Collection
        );
        assert_eq!(
            Coercion::classify(&ColumnType::Udt(UdtRef::new("a", "b"))),
            TypeClass::Composite
        );
    }
}
