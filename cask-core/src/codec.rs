//! Native protocol (v4) byte layout of column values.
//!
//! Drivers hand rows over as raw cells, this module turns them into [`Value`]s and back. The
//! same bytes are compared by the key check of single row reads, so serialization must be
//! deterministic for a given value and type.

use crate::{ColumnType, Error, QueryError, Result, TypeRegistry, Value};
use bytes::{BufMut, Bytes, BytesMut};
use rust_decimal::Decimal;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use time::{Date, OffsetDateTime, Time};
use uuid::Uuid;

fn unix_epoch_julian_day() -> i32 {
    OffsetDateTime::UNIX_EPOCH.date().to_julian_day()
}

fn mismatch(column: &str, value: &Value, ty: &ColumnType) -> Error {
    Error::new(QueryError::schema_mismatch(
        column,
        format!("cannot serialize a {} value as {}", value.kind(), ty),
    ))
}

fn malformed(column: &str, ty: &ColumnType, detail: &str) -> Error {
    Error::new(QueryError::Protocol(format!(
        "malformed {ty} cell for column `{column}`: {detail}"
    )))
}

/// Serialize a value, `None` is the null cell.
pub fn serialize(
    column: &str,
    value: &Value,
    ty: &ColumnType,
    types: &TypeRegistry,
) -> Result<Option<Bytes>> {
    if value.is_null() {
        return Ok(None);
    }
    let mut out = BytesMut::with_capacity(16);
    write_value(&mut out, column, value, ty, types)?;
    Ok(Some(out.freeze()))
}

/// Length prefixed cell, -1 is null.
fn write_cell(
    out: &mut BytesMut,
    column: &str,
    value: &Value,
    ty: &ColumnType,
    types: &TypeRegistry,
) -> Result<()> {
    if value.is_null() {
        out.put_i32(-1);
        return Ok(());
    }
    let position = out.len();
    out.put_i32(0);
    write_value(out, column, value, ty, types)?;
    let len = (out.len() - position - 4) as i32;
    out[position..position + 4].copy_from_slice(&len.to_be_bytes());
    Ok(())
}

fn write_value(
    out: &mut BytesMut,
    column: &str,
    value: &Value,
    ty: &ColumnType,
    types: &TypeRegistry,
) -> Result<()> {
    match (ty, value) {
        (ColumnType::Boolean, Value::Boolean(Some(v))) => out.put_u8(*v as u8),
        (ColumnType::TinyInt, Value::TinyInt(Some(v))) => out.put_i8(*v),
        (ColumnType::SmallInt, Value::SmallInt(Some(v))) => out.put_i16(*v),
        (ColumnType::Int, Value::Int(Some(v))) => out.put_i32(*v),
        (
            ColumnType::BigInt | ColumnType::Counter,
            Value::BigInt(Some(v)) | Value::Counter(Some(v)),
        ) => out.put_i64(*v),
        (ColumnType::Float, Value::Float(Some(v))) => out.put_f32(*v),
        (ColumnType::Double, Value::Double(Some(v))) => out.put_f64(*v),
        (ColumnType::Decimal, Value::Decimal(Some(v))) => {
            out.put_i32(v.scale() as i32);
            write_varint(out, v.mantissa());
        }
        (ColumnType::Ascii, Value::Text(Some(v))) => {
            if !v.is_ascii() {
                return Err(Error::new(QueryError::schema_mismatch(
                    column,
                    "ascii columns accept only ascii text",
                )));
            }
            out.put_slice(v.as_bytes());
        }
        (ColumnType::Text, Value::Text(Some(v))) => out.put_slice(v.as_bytes()),
        (ColumnType::Blob, Value::Blob(Some(v))) => out.put_slice(v),
        (ColumnType::Date, Value::Date(Some(v))) => {
            let days = v.to_julian_day() - unix_epoch_julian_day();
            out.put_u32((days as i64 + (1i64 << 31)) as u32);
        }
        (ColumnType::Time, Value::Time(Some(v))) => {
            let (h, m, s, ns) = v.as_hms_nano();
            let nanos = (h as i64 * 3600 + m as i64 * 60 + s as i64) * 1_000_000_000 + ns as i64;
            out.put_i64(nanos);
        }
        (ColumnType::Timestamp, Value::Timestamp(Some(v))) => {
            out.put_i64(v.unix_timestamp_nanos().div_euclid(1_000_000) as i64)
        }
        (ColumnType::Uuid, Value::Uuid(Some(v)) | Value::TimeUuid(Some(v)))
        | (ColumnType::TimeUuid, Value::TimeUuid(Some(v))) => out.put_slice(v.as_bytes()),
        (ColumnType::Inet, Value::Inet(Some(v))) => match v {
            IpAddr::V4(v) => out.put_slice(&v.octets()),
            IpAddr::V6(v) => out.put_slice(&v.octets()),
        },
        (ColumnType::List(elem), Value::List(Some(v), ..) | Value::Set(Some(v), ..))
        | (ColumnType::Set(elem), Value::Set(Some(v), ..) | Value::List(Some(v), ..)) => {
            out.put_i32(v.len() as i32);
            for item in v {
                if item.is_null() {
                    return Err(Error::new(QueryError::schema_mismatch(
                        column,
                        "collections cannot contain null elements",
                    )));
                }
                write_cell(out, column, item, elem, types)?;
            }
        }
        (ColumnType::Map(key, val), Value::Map(Some(v), ..)) => {
            out.put_i32(v.len() as i32);
            for (k, item) in v {
                if k.is_null() {
                    return Err(Error::new(QueryError::schema_mismatch(
                        column,
                        "map keys cannot be null",
                    )));
                }
                write_cell(out, column, k, key, types)?;
                write_cell(out, column, item, val, types)?;
            }
        }
        (ColumnType::Udt(udt), Value::Udt(Some(fields), ..)) => {
            let definition = types.get(udt)?;
            for (name, field_ty) in &definition.fields {
                let field = fields
                    .iter()
                    .find(|(k, _)| k == name)
                    .map(|(_, v)| v)
                    .unwrap_or(&Value::Null);
                write_cell(out, column, field, field_ty, types)?;
            }
        }
        _ => return Err(mismatch(column, value, ty)),
    }
    Ok(())
}

/// Minimal two's complement big endian encoding.
fn write_varint(out: &mut BytesMut, value: i128) {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < bytes.len() - 1 {
        let (current, next) = (bytes[start], bytes[start + 1]);
        if (current == 0x00 && next & 0x80 == 0) || (current == 0xFF && next & 0x80 != 0) {
            start += 1;
        } else {
            break;
        }
    }
    out.put_slice(&bytes[start..]);
}

fn read_varint(column: &str, ty: &ColumnType, raw: &[u8]) -> Result<i128> {
    if raw.is_empty() || raw.len() > 16 {
        return Err(malformed(column, ty, "varint length out of range"));
    }
    let fill = if raw[0] & 0x80 != 0 { 0xFF } else { 0x00 };
    let mut bytes = [fill; 16];
    bytes[16 - raw.len()..].copy_from_slice(raw);
    Ok(i128::from_be_bytes(bytes))
}

fn take<'a>(
    input: &mut &'a [u8],
    len: usize,
    column: &str,
    ty: &ColumnType,
) -> Result<&'a [u8]> {
    if input.len() < len {
        return Err(malformed(column, ty, "unexpected end of input"));
    }
    let (head, tail) = input.split_at(len);
    *input = tail;
    Ok(head)
}

fn read_i32(input: &mut &[u8], column: &str, ty: &ColumnType) -> Result<i32> {
    let bytes = take(input, 4, column, ty)?;
    Ok(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Length prefixed cell, `None` when null.
fn read_cell<'a>(
    input: &mut &'a [u8],
    column: &str,
    ty: &ColumnType,
) -> Result<Option<&'a [u8]>> {
    let len = read_i32(input, column, ty)?;
    if len < 0 {
        return Ok(None);
    }
    take(input, len as usize, column, ty).map(Some)
}

fn fixed<const N: usize>(raw: &[u8], column: &str, ty: &ColumnType) -> Result<[u8; N]> {
    raw.try_into()
        .map_err(|_| malformed(column, ty, &format!("expected {N} bytes, got {}", raw.len())))
}

/// Deserialize a raw cell into a value of the native shape of `ty`.
pub fn deserialize(
    column: &str,
    ty: &ColumnType,
    raw: Option<&[u8]>,
    types: &TypeRegistry,
) -> Result<Value> {
    let Some(raw) = raw else {
        return Ok(ty.null_value());
    };
    Ok(match ty {
        ColumnType::Boolean => Value::Boolean(Some(fixed::<1>(raw, column, ty)?[0] != 0)),
        ColumnType::TinyInt => Value::TinyInt(Some(i8::from_be_bytes(fixed(raw, column, ty)?))),
        ColumnType::SmallInt => {
            Value::SmallInt(Some(i16::from_be_bytes(fixed(raw, column, ty)?)))
        }
        ColumnType::Int => Value::Int(Some(i32::from_be_bytes(fixed(raw, column, ty)?))),
        ColumnType::BigInt => Value::BigInt(Some(i64::from_be_bytes(fixed(raw, column, ty)?))),
        ColumnType::Counter => Value::Counter(Some(i64::from_be_bytes(fixed(raw, column, ty)?))),
        ColumnType::Float => Value::Float(Some(f32::from_be_bytes(fixed(raw, column, ty)?))),
        ColumnType::Double => Value::Double(Some(f64::from_be_bytes(fixed(raw, column, ty)?))),
        ColumnType::Decimal => {
            let mut input = raw;
            let scale = read_i32(&mut input, column, ty)?;
            let mut mantissa = read_varint(column, ty, input)?;
            if scale < 0 {
                // A negative scale multiplies the unscaled value
                mantissa = 10i128
                    .checked_pow(scale.unsigned_abs())
                    .and_then(|v| mantissa.checked_mul(v))
                    .ok_or_else(|| malformed(column, ty, "decimal out of range"))?;
            }
            let value = Decimal::try_from_i128_with_scale(mantissa, scale.max(0) as u32)
                .map_err(|e| malformed(column, ty, &e.to_string()))?;
            Value::Decimal(Some(value))
        }
        ColumnType::Ascii | ColumnType::Text => Value::Text(Some(
            String::from_utf8(raw.to_vec()).map_err(|e| malformed(column, ty, &e.to_string()))?,
        )),
        ColumnType::Blob => Value::Blob(Some(raw.into())),
        ColumnType::Date => {
            let days = u32::from_be_bytes(fixed(raw, column, ty)?) as i64 - (1i64 << 31);
            let date = Date::from_julian_day(unix_epoch_julian_day() + days as i32)
                .map_err(|e| malformed(column, ty, &e.to_string()))?;
            Value::Date(Some(date))
        }
        ColumnType::Time => {
            let nanos = i64::from_be_bytes(fixed(raw, column, ty)?);
            if !(0..86_400_000_000_000).contains(&nanos) {
                return Err(malformed(column, ty, "time out of range"));
            }
            let seconds = nanos / 1_000_000_000;
            let time = Time::from_hms_nano(
                (seconds / 3600) as u8,
                (seconds / 60 % 60) as u8,
                (seconds % 60) as u8,
                (nanos % 1_000_000_000) as u32,
            )
            .map_err(|e| malformed(column, ty, &e.to_string()))?;
            Value::Time(Some(time))
        }
        ColumnType::Timestamp => {
            let millis = i64::from_be_bytes(fixed(raw, column, ty)?);
            let value = OffsetDateTime::from_unix_timestamp_nanos(millis as i128 * 1_000_000)
                .map_err(|e| malformed(column, ty, &e.to_string()))?;
            Value::Timestamp(Some(value))
        }
        ColumnType::Uuid => Value::Uuid(Some(Uuid::from_bytes(fixed(raw, column, ty)?))),
        ColumnType::TimeUuid => Value::TimeUuid(Some(Uuid::from_bytes(fixed(raw, column, ty)?))),
        ColumnType::Inet => Value::Inet(Some(match raw.len() {
            4 => IpAddr::V4(Ipv4Addr::from(fixed::<4>(raw, column, ty)?)),
            16 => IpAddr::V6(Ipv6Addr::from(fixed::<16>(raw, column, ty)?)),
            _ => return Err(malformed(column, ty, "inet must be 4 or 16 bytes")),
        })),
        ColumnType::List(elem) | ColumnType::Set(elem) => {
            let mut input = raw;
            let len = read_i32(&mut input, column, ty)?;
            // Every element takes at least its length prefix
            let mut result = Vec::with_capacity((len.max(0) as usize).min(input.len() / 4));
            for _ in 0..len {
                let cell = read_cell(&mut input, column, ty)?;
                result.push(deserialize(column, elem, cell, types)?);
            }
            let elem = Box::new(elem.null_value());
            if matches!(ty, ColumnType::Set(..)) {
                Value::Set(Some(result), elem)
            } else {
                Value::List(Some(result), elem)
            }
        }
        ColumnType::Map(key, val) => {
            let mut input = raw;
            let len = read_i32(&mut input, column, ty)?;
            let mut result = Vec::with_capacity((len.max(0) as usize).min(input.len() / 8));
            for _ in 0..len {
                let k = read_cell(&mut input, column, ty)?;
                let v = read_cell(&mut input, column, ty)?;
                result.push((
                    deserialize(column, key, k, types)?,
                    deserialize(column, val, v, types)?,
                ));
            }
            Value::Map(
                Some(result),
                key.null_value().into(),
                val.null_value().into(),
            )
        }
        ColumnType::Udt(udt) => {
            let definition = types.get(udt)?;
            let mut input = raw;
            let mut fields = Vec::with_capacity(definition.fields.len());
            for (name, field_ty) in &definition.fields {
                // Fields added to the type after the value was written are missing at the end
                let cell = if input.is_empty() {
                    None
                } else {
                    read_cell(&mut input, column, ty)?
                };
                fields.push((name.clone(), deserialize(column, field_ty, cell, types)?));
            }
            Value::Udt(Some(fields), definition.name.to_string().into())
        }
    })
}
