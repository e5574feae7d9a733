//! Closed, structurally comparable representation of pipeline output.

use std::{collections::BTreeMap, fmt};

use serde::{Serialize, Serializer, ser::SerializeMap};
use thiserror::Error;

use crate::value::{Key, Record, Value};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    #[error("unsupported result shape: {shape}")]
    Unsupported { shape: &'static str },

    #[error("unsupported result shape: {shape} inside {container}")]
    UnsupportedElement {
        shape: &'static str,
        container: &'static str,
    },
}

/// Numeric scalar; equality is by numeric value.
#[derive(Debug, Clone, Copy)]
pub enum Number {
    Integer(i64),
    Float(f64),
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Number::Integer(a), Number::Integer(b)) => a == b,
            (Number::Float(a), Number::Float(b)) => a == b,
            (Number::Integer(i), Number::Float(f)) | (Number::Float(f), Number::Integer(i)) => {
                // Compare exactly when the float holds an integral value in range
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 {
                    *i == *f as i64
                } else {
                    false
                }
            }
        }
    }
}

impl Number {
    /// Numeric view of a host value
    fn of(value: &Value) -> Option<Number> {
        match value {
            Value::Integer(n) => Some(Number::Integer(*n)),
            Value::Float(n) => Some(Number::Float(*n)),
            _ => None,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Integer(n) => write!(f, "{}", n),
            Number::Float(n) => write!(f, "{}", n),
        }
    }
}

/// Pipeline output.
///
/// Equality is structural: lists compare in order, maps by key set and then
/// per key, records field by field including the record type, numbers by
/// value. Values of different tags are never equal.
///
/// # Examples
///
/// ```
/// use streamy::{ResultValue, Value};
///
/// let int = ResultValue::of(Value::Integer(3)).unwrap();
/// let float = ResultValue::of(Value::Float(3.0)).unwrap();
/// assert_eq!(int, float);
///
/// assert!(ResultValue::of(Value::Boolean(true)).is_err());
/// ```
#[derive(Debug, Clone)]
pub enum ResultValue {
    Number(Number),
    Text(String),
    List(Vec<ResultValue>),
    Map(BTreeMap<Key, ResultValue>),
    Record(Record),
}

impl ResultValue {
    /// Convert a host value, rejecting shapes outside the closed set.
    pub fn of(value: Value) -> Result<ResultValue, ConversionError> {
        match value {
            Value::Integer(n) => Ok(ResultValue::Number(Number::Integer(n))),
            Value::Float(n) => Ok(ResultValue::Number(Number::Float(n))),
            Value::Text(s) => Ok(ResultValue::Text(s)),
            Value::Record(record) => Ok(ResultValue::Record(record)),
            Value::List(items) => items
                .into_iter()
                .map(|item| Self::element(item, "list"))
                .collect::<Result<Vec<_>, _>>()
                .map(ResultValue::List),
            Value::Map(map) => map
                .into_iter()
                .map(|(key, value)| Ok((key, Self::element(value, "map")?)))
                .collect::<Result<BTreeMap<_, _>, _>>()
                .map(ResultValue::Map),
            Value::Boolean(_) => Err(ConversionError::Unsupported { shape: "boolean" }),
        }
    }

    fn element(value: Value, container: &'static str) -> Result<ResultValue, ConversionError> {
        match value {
            Value::Boolean(_) => Err(ConversionError::UnsupportedElement {
                shape: "boolean",
                container,
            }),
            other => Self::of(other),
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            ResultValue::Number(_) => "number",
            ResultValue::Text(_) => "text",
            ResultValue::List(_) => "list",
            ResultValue::Map(_) => "map",
            ResultValue::Record(_) => "record",
        }
    }

    /// Render as a JSON value
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl PartialEq for ResultValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ResultValue::Number(a), ResultValue::Number(b)) => a == b,
            (ResultValue::Text(a), ResultValue::Text(b)) => a == b,
            (ResultValue::List(a), ResultValue::List(b)) => a == b,
            (ResultValue::Map(a), ResultValue::Map(b)) => a == b,
            (ResultValue::Record(a), ResultValue::Record(b)) => records_equal(a, b),
            _ => false,
        }
    }
}

/// Same record type, same field names in order, field values equal with
/// numbers compared by value.
fn records_equal(a: &Record, b: &Record) -> bool {
    if a.type_name() != b.type_name() {
        return false;
    }
    let (mut left, mut right) = (a.fields(), b.fields());
    loop {
        match (left.next(), right.next()) {
            (None, None) => return true,
            (Some((name_a, value_a)), Some((name_b, value_b))) => {
                if name_a != name_b || !values_equal(value_a, value_b) {
                    return false;
                }
            }
            _ => return false,
        }
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::List(a), Value::List(b)) => a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y)),
        (Value::Map(a), Value::Map(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|((ka, va), (kb, vb))| ka == kb && values_equal(va, vb))
        }
        (Value::Record(a), Value::Record(b)) => records_equal(a, b),
        _ => match (Number::of(a), Number::of(b)) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
    }
}

impl From<Number> for ResultValue {
    fn from(n: Number) -> Self {
        ResultValue::Number(n)
    }
}

impl fmt::Display for ResultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl Serialize for ResultValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ResultValue::Number(Number::Integer(n)) => serializer.serialize_i64(*n),
            ResultValue::Number(Number::Float(n)) => serializer.serialize_f64(*n),
            ResultValue::Text(s) => serializer.serialize_str(s),
            ResultValue::List(items) => serializer.collect_seq(items),
            ResultValue::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map {
                    out.serialize_entry(&key.to_string(), value)?;
                }
                out.end()
            }
            ResultValue::Record(record) => record.serialize(serializer),
        }
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut out = serializer.serialize_map(None)?;
        for (name, value) in self.fields() {
            match value {
                Value::Integer(n) => out.serialize_entry(name, n)?,
                Value::Float(n) => out.serialize_entry(name, n)?,
                Value::Boolean(b) => out.serialize_entry(name, b)?,
                Value::Text(s) => out.serialize_entry(name, s)?,
                // Record fields are scalar
                other => out.serialize_entry(name, &other.to_string())?,
            }
        }
        out.end()
    }
}
