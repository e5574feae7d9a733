//! JSON <-> Streamy value conversion utilities

use std::{collections::BTreeMap, sync::Arc};

use serde_json::Value as Json;

use crate::{
    result::{Number, ResultValue},
    schema::{ElementType, FieldKind, RecordSchema, SchemaError},
    value::{Key, Record, Value},
};

/// Record type name used when a dataset does not name its records
pub const DEFAULT_RECORD_NAME: &str = "Record";

fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

fn unsupported(expected: impl Into<String>, json: &Json) -> SchemaError {
    SchemaError::Json {
        expected: expected.into(),
        found: json_kind(json).to_string(),
    }
}

fn number(json: &Json) -> Result<Value, SchemaError> {
    match json {
        Json::Number(n) => n
            .as_i64()
            .map(Value::Integer)
            .or_else(|| n.as_f64().map(Value::Float))
            .ok_or_else(|| unsupported("number", json)),
        _ => Err(unsupported("number", json)),
    }
}

/// Decode a record field or scalar element
fn scalar(json: &Json, kind: FieldKind) -> Result<Value, SchemaError> {
    match (kind, json) {
        (FieldKind::Number, _) => number(json),
        (FieldKind::Text, Json::String(s)) => Ok(Value::Text(s.clone())),
        (FieldKind::Boolean, Json::Bool(b)) => Ok(Value::Boolean(*b)),
        (kind, json) => Err(unsupported(kind.to_string(), json)),
    }
}

fn field_kind(json: &Json) -> Option<FieldKind> {
    match json {
        Json::Number(_) => Some(FieldKind::Number),
        Json::String(_) => Some(FieldKind::Text),
        Json::Bool(_) => Some(FieldKind::Boolean),
        _ => None,
    }
}

/// Infer the element type of a JSON dataset.
///
/// A dataset is all numbers, all strings, or objects sharing the fields of
/// the first object. An empty dataset is treated as numbers.
pub fn infer_element_type(
    items: &[Json],
    record_name: Option<&str>,
    natural_key: Option<&str>,
) -> Result<ElementType, SchemaError> {
    let Some(first) = items.first() else {
        return Ok(ElementType::Number);
    };

    match first {
        Json::Number(_) => Ok(ElementType::Number),
        Json::String(_) => Ok(ElementType::Text),
        Json::Object(fields) => {
            let mut defs = Vec::with_capacity(fields.len());
            for (name, value) in fields {
                let kind = field_kind(value).ok_or_else(|| {
                    SchemaError::Inference(format!(
                        "field '{}' holds {}, expected number, string or boolean",
                        name,
                        json_kind(value)
                    ))
                })?;
                defs.push((name.as_str(), kind));
            }

            let mut schema = RecordSchema::new(record_name.unwrap_or(DEFAULT_RECORD_NAME), defs);
            if let Some(key) = natural_key {
                schema = schema.with_natural_key(key)?;
            }
            Ok(ElementType::Record(Arc::new(schema)))
        }
        other => Err(SchemaError::Inference(format!(
            "elements must be numbers, strings or objects, got {}",
            json_kind(other)
        ))),
    }
}

/// Convert one JSON element to a value of the given element type
pub fn json_to_element(json: &Json, element_type: &ElementType) -> Result<Value, SchemaError> {
    match element_type {
        ElementType::Number => number(json),
        ElementType::Text => scalar(json, FieldKind::Text),
        ElementType::Record(schema) => json_to_record(json, schema).map(Value::Record),
    }
}

fn json_to_record(json: &Json, schema: &Arc<RecordSchema>) -> Result<Record, SchemaError> {
    let Json::Object(fields) = json else {
        return Err(unsupported(schema.name.clone(), json));
    };

    if let Some(extra) = fields.keys().find(|key| schema.field(key).is_none()) {
        return Err(SchemaError::UnexpectedField {
            record: schema.name.clone(),
            field: extra.clone(),
        });
    }

    let values = schema
        .fields
        .iter()
        .map(|def| {
            let json = fields.get(&def.name).ok_or_else(|| SchemaError::MissingField {
                record: schema.name.clone(),
                field: def.name.clone(),
            })?;
            scalar(json, def.kind)
        })
        .collect::<Result<Vec<_>, _>>()?;

    schema.record(values)
}

/// Decode a JSON array into a typed dataset
pub fn decode_dataset(
    json: &Json,
    record_name: Option<&str>,
    natural_key: Option<&str>,
) -> Result<(ElementType, Vec<Value>), SchemaError> {
    let Json::Array(items) = json else {
        return Err(unsupported("array of elements", json));
    };

    let element_type = infer_element_type(items, record_name, natural_key)?;
    let values = items
        .iter()
        .map(|item| json_to_element(item, &element_type))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((element_type, values))
}

/// Convert JSON to a result value.
///
/// Objects whose keys are exactly the fields of the dataset's record type
/// become records; other objects become maps.
pub fn json_to_result(json: &Json, element_type: &ElementType) -> Result<ResultValue, SchemaError> {
    match json {
        Json::Number(_) => match number(json)? {
            Value::Integer(n) => Ok(ResultValue::Number(Number::Integer(n))),
            Value::Float(n) => Ok(ResultValue::Number(Number::Float(n))),
            _ => Err(unsupported("number", json)),
        },
        Json::String(s) => Ok(ResultValue::Text(s.clone())),
        Json::Array(items) => items
            .iter()
            .map(|item| json_to_result(item, element_type))
            .collect::<Result<Vec<_>, _>>()
            .map(ResultValue::List),
        Json::Object(fields) => {
            if let Some(schema) = element_type.record_schema()
                && fields.len() == schema.fields.len()
                && fields.keys().all(|key| schema.field(key).is_some())
            {
                return json_to_record(json, schema).map(ResultValue::Record);
            }

            fields
                .iter()
                .map(|(key, value)| Ok((Key::parse(key), json_to_result(value, element_type)?)))
                .collect::<Result<BTreeMap<_, _>, SchemaError>>()
                .map(ResultValue::Map)
        }
        other => Err(unsupported("result value", other)),
    }
}
