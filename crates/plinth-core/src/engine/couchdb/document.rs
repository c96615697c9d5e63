//! Mapping between typed rows and JSON documents.
//!
//! Every field `f` of table `t` is stored under the key `t_f`. Documents
//! also carry `type` (the table name), `_id` and the store's `_rev` token.

use crate::{
    db::{response::ResultRow, revision::INITIAL_REVISION},
    error::InternalError,
    model::{BackendMetaDataList, FieldKind, ObjectField, ObjectFieldList, ObjectSchema},
    value::{Value, ValueData, ValueEnum, ValueSet},
};
use serde_json::{Map, Value as Json};

pub const TYPE_KEY: &str = "type";
pub const ID_KEY: &str = "_id";
pub const REV_KEY: &str = "_rev";

/// Document key of `table.field`.
#[must_use]
pub fn document_key(table: &str, field: &str) -> String {
    format!("{table}_{field}")
}

// ----------------------------------------------------------------------
// Encoding
// ----------------------------------------------------------------------

/// JSON form of a value. Enums are stored by code.
#[must_use]
pub fn value_to_json(value: &Value) -> Json {
    match value.data() {
        ValueData::Empty => Json::Null,
        ValueData::Int32(v) => Json::from(*v),
        ValueData::Uint32(v) => Json::from(*v),
        ValueData::Int64(v) => Json::from(*v),
        ValueData::Uint64(v) => Json::from(*v),
        ValueData::Text(v) => Json::from(v.as_str()),
        ValueData::Enum(v) => Json::from(v.code),
    }
}

/// Document id from a key value.
pub fn document_id(value: &Value) -> Result<String, InternalError> {
    match value.data() {
        ValueData::Text(v) if !v.is_empty() => Ok(v.clone()),
        ValueData::Int32(v) => Ok(v.to_string()),
        ValueData::Uint32(v) => Ok(v.to_string()),
        ValueData::Int64(v) => Ok(v.to_string()),
        ValueData::Uint64(v) => Ok(v.to_string()),
        _ => Err(InternalError::compile(format!(
            "{value} cannot be used as a document id"
        ))),
    }
}

/// Write `values` into `doc` under their `t_f` keys.
pub fn merge_payload(
    doc: &mut Map<String, Json>,
    schema: &ObjectSchema,
    fields: &ObjectFieldList,
    values: &ValueSet,
) {
    for (field, value) in fields.iter().zip(values.iter()) {
        doc.insert(
            document_key(schema.table(), &field.name),
            value_to_json(value),
        );
    }
}

/// Fresh document for a create: payload, `type`, `_id` when the primary key
/// is part of the payload, and the seeded revision.
pub fn new_document(
    schema: &ObjectSchema,
    fields: &ObjectFieldList,
    values: &ValueSet,
) -> Result<Map<String, Json>, InternalError> {
    let mut doc = Map::new();
    merge_payload(&mut doc, schema, fields, values);
    doc.insert(TYPE_KEY.to_string(), Json::from(schema.table()));

    if let Some(position) = fields.position(schema.primary_key()) {
        let key = &values[position];
        if !key.is_empty() {
            doc.insert(ID_KEY.to_string(), Json::from(document_id(key)?));
        }
    }
    if let Some(revision) = schema.revision_field() {
        doc.insert(
            document_key(schema.table(), &revision.name),
            Json::from(INITIAL_REVISION),
        );
    }

    Ok(doc)
}

/// True when `doc` is a row of `schema`'s table.
#[must_use]
pub fn belongs_to(schema: &ObjectSchema, doc: &Json) -> bool {
    doc.get(TYPE_KEY).and_then(Json::as_str) == Some(schema.table())
}

/// Stored revision counter of a document.
pub fn stored_revision(schema: &ObjectSchema, doc: &Map<String, Json>) -> Option<i64> {
    let revision = schema.revision_field()?;

    doc.get(&document_key(schema.table(), &revision.name))
        .and_then(Json::as_i64)
}

/// `_rev` token from a write acknowledgement (`rev`) or a document (`_rev`).
#[must_use]
pub fn revision_token(body: &Json) -> Option<&str> {
    body.get("rev")
        .or_else(|| body.get(REV_KEY))
        .and_then(Json::as_str)
}

// ----------------------------------------------------------------------
// Decoding
// ----------------------------------------------------------------------

/// Decode a stored document into schema order, with its `_rev` as metadata.
pub fn decode_document(schema: &ObjectSchema, doc: &Json) -> Result<ResultRow, InternalError> {
    let object = doc
        .as_object()
        .ok_or_else(|| InternalError::engine("document is not a JSON object"))?;

    let fields = schema.fields();
    let mut values = ValueSet::new(fields.len())?;
    for (index, field) in fields.iter().enumerate() {
        let mut stored = object.get(&document_key(schema.table(), &field.name));
        if field.name == schema.primary_key() && stored.is_none_or(Json::is_null) {
            stored = object.get(ID_KEY);
        }
        values.set(index, decode_field(field, stored)?)?;
    }

    let row = ResultRow::new(values);
    Ok(match object.get(REV_KEY).and_then(Json::as_str) {
        Some(token) => row.with_metadata(BackendMetaDataList::revision_token(token)),
        None => row,
    })
}

fn decode_field(field: &ObjectField, stored: Option<&Json>) -> Result<Value, InternalError> {
    let Some(json) = stored.filter(|json| !json.is_null()) else {
        return Ok(Value::new());
    };
    let mismatch = || {
        InternalError::engine(format!(
            "document value {json} does not fit {} field '{}'",
            field.kind.label(),
            field.name
        ))
    };

    let value = match &field.kind {
        FieldKind::PrimaryKey => {
            let key = match json {
                Json::String(text) => Value::from(text.as_str()),
                other => Value::from(other.as_i64().ok_or_else(mismatch)?),
            };
            key.into_primary_key()?
        }
        FieldKind::Int32 => {
            let v = json.as_i64().ok_or_else(mismatch)?;
            Value::from(i32::try_from(v).map_err(|_| mismatch())?)
        }
        FieldKind::Int64 | FieldKind::Revision => Value::from(json.as_i64().ok_or_else(mismatch)?),
        FieldKind::Uint32 => {
            let v = json.as_u64().ok_or_else(mismatch)?;
            Value::from(u32::try_from(v).map_err(|_| mismatch())?)
        }
        FieldKind::Uint64 => Value::from(json.as_u64().ok_or_else(mismatch)?),
        FieldKind::Text => Value::from(json.as_str().ok_or_else(mismatch)?),
        FieldKind::Enum(table) => {
            let code = json
                .as_i64()
                .and_then(|v| i32::try_from(v).ok())
                .ok_or_else(mismatch)?;
            let text = table.text(code).ok_or_else(mismatch)?;
            Value::from(ValueEnum::new(code, text))
        }
        FieldKind::Any => match json {
            Json::String(text) => Value::from(text.as_str()),
            Json::Number(n) => match (n.as_i64(), n.as_u64()) {
                (Some(v), _) => Value::from(v),
                (None, Some(v)) => Value::from(v),
                (None, None) => Value::from(n.to_string()),
            },
            other => Value::from(other.to_string()),
        },
    };

    Ok(value)
}

// ----------------------------------------------------------------------
// Paths
// ----------------------------------------------------------------------

/// Percent-encode one path segment; unreserved characters pass through.
#[must_use]
pub fn encode_segment(segment: &str) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";

    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            out.push(char::from(byte));
        } else {
            out.push('%');
            out.push(char::from(HEX[usize::from(byte >> 4)]));
            out.push(char::from(HEX[usize::from(byte & 0x0f)]));
        }
    }

    out
}

/// Path of one document.
#[must_use]
pub fn document_path(id: &str) -> String {
    format!("/{}", encode_segment(id))
}
