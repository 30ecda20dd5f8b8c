//! JSON ⇄ BSON conversion at the HTTP boundary
//!
//! Request JSON is stored the way a JavaScript client would store it: small
//! integers as Int32, everything else as Double. Responses render ObjectIds
//! as hex strings and dates as ISO 8601 strings with milliseconds.

use chrono::SecondsFormat;
use mongodb::bson::{Bson, Document};
use serde_json::{Map, Value};

/// Convert a JSON value into BSON
pub fn json_to_bson(value: Value) -> Bson {
    match value {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(b),
        Value::Number(n) => match n.as_i64().map(i32::try_from) {
            Some(Ok(i)) => Bson::Int32(i),
            _ => n.as_f64().map_or(Bson::Null, Bson::Double),
        },
        Value::String(s) => Bson::String(s),
        Value::Array(items) => Bson::Array(items.into_iter().map(json_to_bson).collect()),
        Value::Object(map) => Bson::Document(map_to_document(map)),
    }
}

/// Convert a JSON object into a document; `None` for any other JSON type
pub fn json_to_document(value: Value) -> Option<Document> {
    match value {
        Value::Object(map) => Some(map_to_document(map)),
        _ => None,
    }
}

fn map_to_document(map: Map<String, Value>) -> Document {
    map.into_iter()
        .map(|(k, v)| (k, json_to_bson(v)))
        .collect()
}

/// Convert BSON into the JSON shape clients receive
pub fn bson_to_json(value: Bson) -> Value {
    match value {
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::DateTime(dt) => chrono::DateTime::from_timestamp_millis(dt.timestamp_millis())
            .map_or_else(
                || Value::from(dt.timestamp_millis()),
                |utc| Value::String(utc.to_rfc3339_opts(SecondsFormat::Millis, true)),
            ),
        Bson::Document(doc) => document_to_json(doc),
        Bson::Array(items) => Value::Array(items.into_iter().map(bson_to_json).collect()),
        other => other.into_relaxed_extjson(),
    }
}

/// Convert a document into a JSON object
pub fn document_to_json(doc: Document) -> Value {
    Value::Object(
        doc.into_iter()
            .map(|(k, v)| (k, bson_to_json(v)))
            .collect(),
    )
}
