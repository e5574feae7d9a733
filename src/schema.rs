//! Declared element types.
//!
//! A pipeline runs over a sequence of one element type drawn from a closed
//! set: numbers, text, or records with a fixed named-field shape.

use std::{fmt, sync::Arc};

use thiserror::Error;

use crate::value::{Record, Value};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("record {record} has no field '{field}'")]
    MissingField { record: String, field: String },

    #[error("record {record} does not declare field '{field}'")]
    UnexpectedField { record: String, field: String },

    #[error("field '{field}' of {record} must be {expected}, got {found}")]
    FieldKind {
        record: String,
        field: String,
        expected: FieldKind,
        found: &'static str,
    },

    #[error("record {record} expects {expected} fields, got {found}")]
    Arity {
        record: String,
        expected: usize,
        found: usize,
    },

    #[error("natural key '{0}' is not a declared field")]
    UnknownNaturalKey(String),

    #[error("cannot infer element type: {0}")]
    Inference(String),

    #[error("unsupported JSON value for {expected}: {found}")]
    Json { expected: String, found: String },
}

/// Kind of a record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Number,
    Text,
    Boolean,
}

impl FieldKind {
    pub fn admits(self, value: &Value) -> bool {
        match self {
            FieldKind::Number => value.is_number(),
            FieldKind::Text => matches!(value, Value::Text(_)),
            FieldKind::Boolean => matches!(value, Value::Boolean(_)),
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Number => write!(f, "number"),
            FieldKind::Text => write!(f, "text"),
            FieldKind::Boolean => write!(f, "boolean"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
}

/// Fixed named-field shape of a record type.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    pub name: String,
    pub fields: Vec<FieldDef>,
    /// Field used when records are sorted without a comparator
    pub natural_key: Option<String>,
}

impl RecordSchema {
    pub fn new(name: impl Into<String>, fields: Vec<(&str, FieldKind)>) -> Self {
        RecordSchema {
            name: name.into(),
            fields: fields
                .into_iter()
                .map(|(name, kind)| FieldDef {
                    name: name.to_string(),
                    kind,
                })
                .collect(),
            natural_key: None,
        }
    }

    pub fn with_natural_key(mut self, field: impl Into<String>) -> Result<Self, SchemaError> {
        let field = field.into();
        if self.index_of(&field).is_none() {
            return Err(SchemaError::UnknownNaturalKey(field));
        }
        self.natural_key = Some(field);
        Ok(self)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Build a record from values given in declaration order.
    pub fn record(self: &Arc<Self>, values: Vec<Value>) -> Result<Record, SchemaError> {
        if values.len() != self.fields.len() {
            return Err(SchemaError::Arity {
                record: self.name.clone(),
                expected: self.fields.len(),
                found: values.len(),
            });
        }
        for (field, value) in self.fields.iter().zip(&values) {
            if !field.kind.admits(value) {
                return Err(SchemaError::FieldKind {
                    record: self.name.clone(),
                    field: field.name.clone(),
                    expected: field.kind,
                    found: value.type_name(),
                });
            }
        }
        Ok(Record::from_parts(Arc::clone(self), values))
    }
}

/// Element type of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementType {
    Number,
    Text,
    Record(Arc<RecordSchema>),
}

impl ElementType {
    pub fn record_schema(&self) -> Option<&Arc<RecordSchema>> {
        match self {
            ElementType::Record(schema) => Some(schema),
            _ => None,
        }
    }

    /// Whether `value` is an element of this type
    pub fn admits(&self, value: &Value) -> bool {
        match (self, value) {
            (ElementType::Number, v) => v.is_number(),
            (ElementType::Text, Value::Text(_)) => true,
            (ElementType::Record(schema), Value::Record(record)) => record.schema() == schema,
            _ => false,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementType::Number => write!(f, "number"),
            ElementType::Text => write!(f, "text"),
            ElementType::Record(schema) => write!(f, "{}", schema.name),
        }
    }
}
