use serde_json::{Map, Number};

use crate::collection::Document;
use crate::common::{
    Value, DATE_MARKER, DELETED_MARKER, DOC_ID, INDEX_CREATED_MARKER, INDEX_REMOVED_MARKER,
};
use crate::errors::{DocDbError, DocDbResult, ErrorKind};
use crate::index::IndexOptions;

use super::OperationRecord;

/// Converts a value to its JSON form. Timestamps become
/// `{"$$date": <millis>}`.
pub(crate) fn to_json(value: &Value) -> DocDbResult<serde_json::Value> {
    Ok(match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::I64(n) => serde_json::Value::Number(Number::from(*n)),
        Value::F64(n) => match Number::from_f64(*n) {
            Some(number) => serde_json::Value::Number(number),
            None => {
                log::error!("Cannot persist non-finite number {}", n);
                return Err(DocDbError::new(
                    &format!("Cannot persist non-finite number {}", n),
                    ErrorKind::EncodingError,
                ));
            }
        },
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Timestamp(t) => {
            let mut object = Map::new();
            object.insert(DATE_MARKER.to_string(), Number::from(t.timestamp_millis()).into());
            serde_json::Value::Object(object)
        }
        Value::Array(items) => serde_json::Value::Array(
            items.iter().map(to_json).collect::<DocDbResult<Vec<_>>>()?,
        ),
        Value::Document(doc) => serde_json::Value::Object(document_to_json(doc)?),
    })
}

pub(crate) fn document_to_json(doc: &Document) -> DocDbResult<Map<String, serde_json::Value>> {
    let mut object = Map::new();
    for (key, value) in doc.iter() {
        object.insert(key.clone(), to_json(value)?);
    }
    Ok(object)
}

/// Converts JSON back to a value. Integers that fit an `i64` stay
/// integers, every other number becomes a float.
pub(crate) fn from_json(json: serde_json::Value) -> DocDbResult<Value> {
    Ok(match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::I64(i),
            None => Value::F64(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(items) => Value::Array(
            items.into_iter().map(from_json).collect::<DocDbResult<Vec<_>>>()?,
        ),
        serde_json::Value::Object(object) => {
            if object.len() == 1 {
                if let Some(serde_json::Value::Number(millis)) = object.get(DATE_MARKER) {
                    let millis = millis.as_i64().ok_or_else(|| bad_date(millis))?;
                    return Ok(Value::from_millis(millis));
                }
            }
            Value::Document(document_from_json(object)?)
        }
    })
}

pub(crate) fn document_from_json(object: Map<String, serde_json::Value>) -> DocDbResult<Document> {
    let mut doc = Document::new();
    for (key, value) in object {
        doc.put_field(key, from_json(value)?);
    }
    Ok(doc)
}

fn bad_date(millis: &Number) -> DocDbError {
    log::error!("Invalid {} value {}", DATE_MARKER, millis);
    DocDbError::new(
        &format!("Invalid {} value {}", DATE_MARKER, millis),
        ErrorKind::EncodingError,
    )
}

/// Encodes a record as a single line of JSON, without the line break.
pub(crate) fn encode_record(record: &OperationRecord) -> DocDbResult<String> {
    let json = match record {
        OperationRecord::Upsert(doc) => serde_json::Value::Object(document_to_json(doc)?),
        OperationRecord::Delete(id) => serde_json::json!({ DELETED_MARKER: true, DOC_ID: id }),
        OperationRecord::IndexCreated(options) => {
            serde_json::json!({ INDEX_CREATED_MARKER: serde_json::to_value(options)? })
        }
        OperationRecord::IndexRemoved(field_name) => {
            serde_json::json!({ INDEX_REMOVED_MARKER: field_name })
        }
    };
    Ok(serde_json::to_string(&json)?)
}

/// Decodes one line of the data file.
pub(crate) fn decode_record(line: &str) -> DocDbResult<OperationRecord> {
    let serde_json::Value::Object(mut object) = serde_json::from_str(line)? else {
        return Err(corrupt_line(line));
    };

    if let Some(options) = object.remove(INDEX_CREATED_MARKER) {
        let options: IndexOptions = serde_json::from_value(options)?;
        return Ok(OperationRecord::IndexCreated(options));
    }

    if let Some(field_name) = object.remove(INDEX_REMOVED_MARKER) {
        return match field_name {
            serde_json::Value::String(field_name) => Ok(OperationRecord::IndexRemoved(field_name)),
            _ => Err(corrupt_line(line)),
        };
    }

    let deleted = matches!(object.get(DELETED_MARKER), Some(serde_json::Value::Bool(true)));
    let id = match object.get(DOC_ID) {
        Some(serde_json::Value::String(id)) => id.clone(),
        _ => return Err(corrupt_line(line)),
    };

    if deleted {
        Ok(OperationRecord::Delete(id))
    } else {
        Ok(OperationRecord::Upsert(document_from_json(object)?))
    }
}

fn corrupt_line(line: &str) -> DocDbError {
    log::warn!("Unrecognized record in data file: {}", line);
    DocDbError::new(
        &format!("Unrecognized record in data file: {}", line),
        ErrorKind::CorruptData,
    )
}
