//! Scalar values: bound parameters going in, normalized cells coming out.

use crate::error::{GateError, GateResult};
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use tokio_postgres::Row;
use tokio_postgres::types::{FromSql, IsNull, ToSql, Type, to_sql_checked};
use uuid::Uuid;

/// A single scalar value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Uuid(Uuid),
    /// `timestamptz`
    Timestamp(DateTime<Utc>),
    /// `timestamp` (no time zone)
    LocalTimestamp(NaiveDateTime),
    Date(NaiveDate),
    Json(serde_json::Value),
    Bytes(Vec<u8>),
    #[cfg(feature = "rust_decimal")]
    Decimal(rust_decimal::Decimal),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Value::Uuid(u) => Some(*u),
            Value::Text(s) => Uuid::parse_str(s).ok(),
            _ => None,
        }
    }

    /// Decode column `idx` of `row` according to its PostgreSQL type.
    pub(crate) fn decode(row: &Row, idx: usize) -> GateResult<Self> {
        let column = &row.columns()[idx];
        let name = column.name();
        let ty = column.type_();

        let value = match *ty {
            Type::BOOL => get::<bool>(row, idx, name)?.map(Value::Bool),
            Type::INT2 => get::<i16>(row, idx, name)?.map(|v| Value::Int(v.into())),
            Type::INT4 => get::<i32>(row, idx, name)?.map(|v| Value::Int(v.into())),
            Type::INT8 => get::<i64>(row, idx, name)?.map(Value::Int),
            Type::OID => get::<u32>(row, idx, name)?.map(|v| Value::Int(v.into())),
            Type::FLOAT4 => get::<f32>(row, idx, name)?.map(|v| Value::Float(v.into())),
            Type::FLOAT8 => get::<f64>(row, idx, name)?.map(Value::Float),
            Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
                get::<String>(row, idx, name)?.map(Value::Text)
            }
            Type::UUID => get::<Uuid>(row, idx, name)?.map(Value::Uuid),
            Type::TIMESTAMPTZ => get::<DateTime<Utc>>(row, idx, name)?.map(Value::Timestamp),
            Type::TIMESTAMP => get::<NaiveDateTime>(row, idx, name)?.map(Value::LocalTimestamp),
            Type::DATE => get::<NaiveDate>(row, idx, name)?.map(Value::Date),
            Type::JSON | Type::JSONB => get::<serde_json::Value>(row, idx, name)?.map(Value::Json),
            Type::BYTEA => get::<Vec<u8>>(row, idx, name)?.map(Value::Bytes),
            #[cfg(feature = "rust_decimal")]
            Type::NUMERIC => get::<rust_decimal::Decimal>(row, idx, name)?.map(Value::Decimal),
            _ => {
                return Err(GateError::decode(
                    name,
                    format!("unsupported column type '{ty}'; cast it in the select list"),
                ));
            }
        };
        Ok(value.unwrap_or(Value::Null))
    }
}

fn get<'a, T: FromSql<'a>>(row: &'a Row, idx: usize, name: &str) -> GateResult<Option<T>> {
    row.try_get::<_, Option<T>>(idx)
        .map_err(|e| GateError::decode(name, e.to_string()))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => f.write_str(s),
            Value::Uuid(u) => write!(f, "{u}"),
            Value::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
            Value::LocalTimestamp(t) => write!(f, "{t}"),
            Value::Date(d) => write!(f, "{d}"),
            Value::Json(j) => write!(f, "{j}"),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            #[cfg(feature = "rust_decimal")]
            Value::Decimal(d) => write!(f, "{d}"),
        }
    }
}

// ==================== Conversions ====================

macro_rules! impl_from {
    ($($ty:ty => $variant:ident $(via $conv:ident)?),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v $(.$conv())?)
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    i16 => Int via into,
    i32 => Int via into,
    i64 => Int,
    u32 => Int via into,
    f32 => Float via into,
    f64 => Float,
    String => Text,
    &str => Text via to_string,
    Uuid => Uuid,
    DateTime<Utc> => Timestamp,
    NaiveDateTime => LocalTimestamp,
    NaiveDate => Date,
    serde_json::Value => Json,
    Vec<u8> => Bytes,
}

#[cfg(feature = "rust_decimal")]
impl From<rust_decimal::Decimal> for Value {
    fn from(v: rust_decimal::Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

// ==================== Parameter binding ====================

impl ToSql for Value {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(b) => b.to_sql_checked(ty, out),
            Value::Int(i) => match *ty {
                Type::INT2 => i16::try_from(*i)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*i)?.to_sql(ty, out),
                Type::FLOAT4 => (*i as f32).to_sql(ty, out),
                Type::FLOAT8 => (*i as f64).to_sql(ty, out),
                #[cfg(feature = "rust_decimal")]
                Type::NUMERIC => rust_decimal::Decimal::from(*i).to_sql(ty, out),
                _ => i.to_sql_checked(ty, out),
            },
            Value::Float(x) => match *ty {
                Type::FLOAT4 => (*x as f32).to_sql(ty, out),
                // Through the shortest decimal form, so 9.99 binds as 9.99.
                #[cfg(feature = "rust_decimal")]
                Type::NUMERIC => x.to_string().parse::<rust_decimal::Decimal>()?.to_sql(ty, out),
                _ => x.to_sql_checked(ty, out),
            },
            // Text from JSON input binds into typed columns by parsing.
            Value::Text(s) => match *ty {
                Type::UUID => Uuid::parse_str(s.trim())?.to_sql(ty, out),
                Type::INT2 => s.trim().parse::<i16>()?.to_sql(ty, out),
                Type::INT4 => s.trim().parse::<i32>()?.to_sql(ty, out),
                Type::INT8 => s.trim().parse::<i64>()?.to_sql(ty, out),
                Type::FLOAT4 => s.trim().parse::<f32>()?.to_sql(ty, out),
                Type::FLOAT8 => s.trim().parse::<f64>()?.to_sql(ty, out),
                Type::BOOL => parse_bool(s)?.to_sql(ty, out),
                Type::DATE => s.trim().parse::<NaiveDate>()?.to_sql(ty, out),
                Type::TIMESTAMP => parse_local_timestamp(s)?.to_sql(ty, out),
                Type::TIMESTAMPTZ => s.trim().parse::<DateTime<Utc>>()?.to_sql(ty, out),
                #[cfg(feature = "rust_decimal")]
                Type::NUMERIC => s.trim().parse::<rust_decimal::Decimal>()?.to_sql(ty, out),
                _ => s.to_sql_checked(ty, out),
            },
            Value::Uuid(u) => match *ty {
                Type::TEXT | Type::VARCHAR | Type::BPCHAR => u.to_string().to_sql(ty, out),
                _ => u.to_sql_checked(ty, out),
            },
            Value::Timestamp(t) => t.to_sql_checked(ty, out),
            Value::LocalTimestamp(t) => t.to_sql_checked(ty, out),
            Value::Date(d) => d.to_sql_checked(ty, out),
            Value::Json(j) => j.to_sql_checked(ty, out),
            Value::Bytes(b) => b.to_sql_checked(ty, out),
            #[cfg(feature = "rust_decimal")]
            Value::Decimal(d) => d.to_sql_checked(ty, out),
        }
    }

    // Each variant checks the concrete type itself in `to_sql`.
    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// PostgreSQL boolean literals.
fn parse_bool(s: &str) -> Result<bool, Box<dyn Error + Sync + Send>> {
    match s.trim().to_ascii_lowercase().as_str() {
        "t" | "true" | "y" | "yes" | "on" | "1" => Ok(true),
        "f" | "false" | "n" | "no" | "off" | "0" => Ok(false),
        other => Err(format!("invalid boolean '{other}'").into()),
    }
}

/// `2024-02-29T13:05:00` or PostgreSQL's own `2024-02-29 13:05:00`.
fn parse_local_timestamp(s: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    let s = s.trim();
    s.parse::<NaiveDateTime>()
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
}

// ==================== serde ====================

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(x) => serializer.serialize_f64(*x),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Uuid(u) => u.serialize(serializer),
            Value::Timestamp(t) => t.serialize(serializer),
            Value::LocalTimestamp(t) => t.serialize(serializer),
            Value::Date(d) => d.serialize(serializer),
            Value::Json(j) => j.serialize(serializer),
            Value::Bytes(b) => serializer.serialize_bytes(b),
            #[cfg(feature = "rust_decimal")]
            Value::Decimal(d) => serializer.collect_str(d),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a scalar value, array or object")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Value, D::Error> {
        Value::deserialize(d)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        i64::try_from(v)
            .map(Value::Int)
            .map_err(|_| E::custom(format!("integer {v} does not fit in i64")))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::Text(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::Text(v))
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Value, E> {
        Ok(Value::Bytes(v.to_vec()))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, seq: A) -> Result<Value, A::Error> {
        let json = serde_json::Value::deserialize(de::value::SeqAccessDeserializer::new(seq))?;
        Ok(Value::Json(json))
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<Value, A::Error> {
        let json = serde_json::Value::deserialize(de::value::MapAccessDeserializer::new(map))?;
        Ok(Value::Json(json))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions() {
        assert_eq!(Value::from(5i32), Value::Int(5));
        assert_eq!(Value::from("a"), Value::Text("a".to_string()));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(true)), Value::Bool(true));
    }

    #[test]
    fn int_binds_into_narrow_columns() {
        let mut buf = BytesMut::new();
        let res = Value::Int(7).to_sql_checked(&Type::INT4, &mut buf).unwrap();
        assert!(matches!(res, IsNull::No));
        assert_eq!(&buf[..], &7i32.to_be_bytes());
    }

    #[test]
    fn int_overflow_is_rejected() {
        let mut buf = BytesMut::new();
        assert!(Value::Int(i64::MAX).to_sql_checked(&Type::INT2, &mut buf).is_err());
    }

    #[test]
    fn text_binds_into_uuid_column() {
        let id = Uuid::new_v4();
        let mut buf = BytesMut::new();
        Value::Text(id.to_string())
            .to_sql_checked(&Type::UUID, &mut buf)
            .unwrap();
        assert_eq!(&buf[..], id.as_bytes());
    }

    fn encode(value: &Value, ty: &Type) -> Vec<u8> {
        let mut buf = BytesMut::new();
        value.to_sql_checked(ty, &mut buf).unwrap();
        buf.to_vec()
    }

    fn encode_native<T: ToSql>(value: T, ty: &Type) -> Vec<u8> {
        let mut buf = BytesMut::new();
        value.to_sql(ty, &mut buf).unwrap();
        buf.to_vec()
    }

    #[test]
    fn text_binds_into_numeric_and_temporal_columns() {
        assert_eq!(encode(&Value::from("5"), &Type::INT4), encode_native(5i32, &Type::INT4));
        assert_eq!(encode(&Value::from(" 42 "), &Type::INT8), encode_native(42i64, &Type::INT8));
        assert_eq!(encode(&Value::from("7"), &Type::INT2), encode_native(7i16, &Type::INT2));
        assert_eq!(
            encode(&Value::from("2.5"), &Type::FLOAT8),
            encode_native(2.5f64, &Type::FLOAT8)
        );
        assert_eq!(encode(&Value::from("yes"), &Type::BOOL), encode_native(true, &Type::BOOL));
        assert_eq!(encode(&Value::from("f"), &Type::BOOL), encode_native(false, &Type::BOOL));

        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(encode(&Value::from("2024-02-29"), &Type::DATE), encode_native(date, &Type::DATE));

        let ts = date.and_hms_opt(13, 5, 0).unwrap();
        assert_eq!(
            encode(&Value::from("2024-02-29T13:05:00"), &Type::TIMESTAMP),
            encode_native(ts, &Type::TIMESTAMP)
        );
        assert_eq!(
            encode(&Value::from("2024-02-29 13:05:00"), &Type::TIMESTAMP),
            encode_native(ts, &Type::TIMESTAMP)
        );
        assert_eq!(
            encode(&Value::from("2024-02-29T13:05:00Z"), &Type::TIMESTAMPTZ),
            encode_native(ts.and_utc(), &Type::TIMESTAMPTZ)
        );
    }

    #[test]
    fn unparsable_text_is_an_error() {
        let mut buf = BytesMut::new();
        assert!(Value::from("five").to_sql_checked(&Type::INT4, &mut buf).is_err());
        assert!(Value::from("maybe").to_sql_checked(&Type::BOOL, &mut buf).is_err());
        assert!(Value::from("29/02/2024").to_sql_checked(&Type::DATE, &mut buf).is_err());
        assert!(Value::from("99999").to_sql_checked(&Type::INT2, &mut buf).is_err());
    }

    #[test]
    fn text_still_binds_into_text_columns() {
        assert_eq!(encode(&Value::from("5"), &Type::TEXT), b"5".to_vec());
        assert_eq!(encode(&Value::from("5"), &Type::VARCHAR), b"5".to_vec());
    }

    #[cfg(feature = "rust_decimal")]
    #[test]
    fn numbers_and_text_bind_into_numeric() {
        use rust_decimal::Decimal;

        let price = Decimal::new(999, 2);
        let expected = encode_native(price, &Type::NUMERIC);
        assert_eq!(encode(&Value::Float(9.99), &Type::NUMERIC), expected);
        assert_eq!(encode(&Value::from("9.99"), &Type::NUMERIC), expected);
        assert_eq!(encode(&Value::Decimal(price), &Type::NUMERIC), expected);
        assert_eq!(
            encode(&Value::Int(12), &Type::NUMERIC),
            encode_native(Decimal::from(12), &Type::NUMERIC)
        );

        let mut buf = BytesMut::new();
        assert!(Value::Float(f64::NAN).to_sql_checked(&Type::NUMERIC, &mut buf).is_err());
        assert!(Value::from("cheap").to_sql_checked(&Type::NUMERIC, &mut buf).is_err());
    }

    #[test]
    fn mismatched_type_is_an_error() {
        let mut buf = BytesMut::new();
        assert!(Value::Bool(true).to_sql_checked(&Type::INT8, &mut buf).is_err());
    }

    #[test]
    fn null_binds_to_anything() {
        let mut buf = BytesMut::new();
        let res = Value::Null.to_sql_checked(&Type::UUID, &mut buf).unwrap();
        assert!(matches!(res, IsNull::Yes));
    }

    #[test]
    fn deserializes_json_scalars() {
        let v: Vec<Value> = serde_json::from_str(r#"[null, true, 3, 2.5, "x", [1], {"a": 1}]"#).unwrap();
        assert_eq!(v[0], Value::Null);
        assert_eq!(v[1], Value::Bool(true));
        assert_eq!(v[2], Value::Int(3));
        assert_eq!(v[3], Value::Float(2.5));
        assert_eq!(v[4], Value::Text("x".to_string()));
        assert_eq!(v[5], Value::Json(serde_json::json!([1])));
        assert_eq!(v[6], Value::Json(serde_json::json!({"a": 1})));
    }

    #[test]
    fn serializes_as_plain_json() {
        let json = serde_json::to_string(&vec![Value::Null, Value::Int(1), Value::from("a")]).unwrap();
        assert_eq!(json, r#"[null,1,"a"]"#);
    }
}
