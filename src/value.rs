use std::{
    collections::BTreeMap,
    fmt,
    hash::{Hash, Hasher},
    mem,
    sync::Arc,
};

use rustc_hash::FxHasher;

use crate::schema::RecordSchema;

/// A value computed by a pipeline.
///
/// This is the host representation the interpreter works with. It is wider
/// than [`ResultValue`](crate::result::ResultValue): booleans exist here so
/// predicates and record fields can use them, but a bare boolean is not an
/// acceptable pipeline output.
///
/// # Examples
///
/// ```
/// use streamy::Value;
///
/// let number = Value::Integer(42);
/// let text = Value::Text("Leo the Lion".to_string());
/// let list = Value::List(vec![Value::Integer(1), Value::Integer(2)]);
/// assert_eq!(list.type_name(), "list");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Integer number
    Integer(i64),

    /// Floating-point number (always finite)
    Float(f64),

    /// Boolean (predicates, record flags)
    Boolean(bool),

    /// UTF-8 text
    Text(String),

    /// Ordered list
    List(Vec<Value>),

    /// Key-ordered map, produced by grouping
    Map(BTreeMap<Key, Value>),

    /// Instance of a declared record type
    Record(Record),
}

impl Value {
    /// Human-readable type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Boolean(_) => "boolean",
            Value::Text(_) => "text",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Record(_) => "record",
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }

    /// Boolean value, without any truthiness coercion
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Text used when concatenating with `+`
    pub fn to_text(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Structural hash: equal values always share a fingerprint.
    ///
    /// Floats hash by bit pattern with `-0.0` folded into `0.0`, so values
    /// that differ only there still land together.
    pub(crate) fn fingerprint(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.hash_structure(&mut hasher);
        hasher.finish()
    }

    fn hash_structure<H: Hasher>(&self, state: &mut H) {
        mem::discriminant(self).hash(state);
        match self {
            Value::Integer(n) => n.hash(state),
            Value::Float(n) => {
                let n = if *n == 0.0 { 0.0 } else { *n };
                n.to_bits().hash(state);
            }
            Value::Boolean(b) => b.hash(state),
            Value::Text(s) => s.hash(state),
            Value::List(items) => {
                items.len().hash(state);
                for item in items {
                    item.hash_structure(state);
                }
            }
            Value::Map(map) => {
                map.len().hash(state);
                for (key, value) in map {
                    key.hash(state);
                    value.hash_structure(state);
                }
            }
            Value::Record(record) => {
                record.type_name().hash(state);
                for (_, value) in record.fields() {
                    value.hash_structure(state);
                }
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Text(s) => write!(f, "{:?}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
            Value::Record(record) => write!(f, "{}", record),
        }
    }
}

/// Map key: a stable, totally ordered primitive.
///
/// Floats, lists, maps and records cannot be keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    Boolean(bool),
    Integer(i64),
    Text(String),
}

impl Key {
    /// Decode a key from its textual form, as found in JSON object keys.
    ///
    /// Integers and booleans are recognized; anything else stays text.
    pub fn parse(raw: &str) -> Key {
        if let Ok(n) = raw.parse::<i64>() {
            return Key::Integer(n);
        }
        match raw {
            "true" => Key::Boolean(true),
            "false" => Key::Boolean(false),
            _ => Key::Text(raw.to_string()),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Boolean(b) => write!(f, "{}", b),
            Key::Integer(n) => write!(f, "{}", n),
            Key::Text(s) => write!(f, "{}", s),
        }
    }
}

impl TryFrom<Value> for Key {
    /// The offending value's type name
    type Error = &'static str;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Boolean(b) => Ok(Key::Boolean(b)),
            Value::Integer(n) => Ok(Key::Integer(n)),
            Value::Text(s) => Ok(Key::Text(s)),
            other => Err(other.type_name()),
        }
    }
}

impl From<Key> for Value {
    fn from(key: Key) -> Self {
        match key {
            Key::Boolean(b) => Value::Boolean(b),
            Key::Integer(n) => Value::Integer(n),
            Key::Text(s) => Value::Text(s),
        }
    }
}

/// Instance of a declared record type.
///
/// Field values are stored in schema order and always match the declared
/// field kinds; construct records through [`RecordSchema::record`].
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    schema: Arc<RecordSchema>,
    values: Vec<Value>,
}

impl Record {
    pub(crate) fn from_parts(schema: Arc<RecordSchema>, values: Vec<Value>) -> Self {
        Record { schema, values }
    }

    pub fn schema(&self) -> &Arc<RecordSchema> {
        &self.schema
    }

    pub fn type_name(&self) -> &str {
        &self.schema.name
    }

    /// Field value by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.schema.index_of(name).and_then(|i| self.values.get(i))
    }

    /// Fields in declaration order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.schema
            .fields
            .iter()
            .map(|field| field.name.as_str())
            .zip(self.values.iter())
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{", self.type_name())?;
        for (i, (name, value)) in self.fields().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", name, value)?;
        }
        write!(f, "}}")
    }
}
