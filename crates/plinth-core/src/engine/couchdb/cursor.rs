use super::{
    document::{belongs_to, decode_document, document_path},
    status_error,
    transport::{DocumentTransport, Method},
};
use crate::{
    db::response::{ResultRow, RowCursor},
    error::InternalError,
    model::ObjectSchema,
};
use serde_json::Value as Json;
use std::sync::Arc;

///
/// PointCursor
///
/// Primary-key lookup that fetches one document per advance. Keys with no
/// document, or whose document belongs to another table, are skipped.
///

pub struct PointCursor {
    transport: Arc<dyn DocumentTransport>,
    schema: ObjectSchema,
    keys: std::vec::IntoIter<String>,
}

impl PointCursor {
    pub fn new(
        transport: Arc<dyn DocumentTransport>,
        schema: ObjectSchema,
        keys: Vec<String>,
    ) -> Self {
        Self {
            transport,
            schema,
            keys: keys.into_iter(),
        }
    }
}

impl RowCursor for PointCursor {
    fn next_row(&mut self) -> Result<Option<ResultRow>, InternalError> {
        for key in self.keys.by_ref() {
            let response = self
                .transport
                .send(Method::Get, &document_path(&key), None)?;

            match response.status {
                200 if belongs_to(&self.schema, &response.body) => {
                    return decode_document(&self.schema, &response.body).map(Some);
                }
                200 => tracing::trace!(
                    key,
                    table = self.schema.table(),
                    "point lookup hit a document of another table"
                ),
                404 => tracing::trace!(key, "point lookup miss"),
                _ => return Err(status_error("GET", &key, &response)),
            }
        }

        Ok(None)
    }
}

///
/// ViewCursor
/// Rows of one view response, decoded as they are pulled.
///

pub struct ViewCursor {
    schema: ObjectSchema,
    rows: std::vec::IntoIter<Json>,
}

impl ViewCursor {
    /// Take the `rows` array out of a view response body.
    pub fn from_body(schema: ObjectSchema, mut body: Json) -> Result<Self, InternalError> {
        let rows = match body.get_mut("rows").map(Json::take) {
            Some(Json::Array(rows)) => rows,
            _ => {
                return Err(InternalError::engine(
                    "view response carries no 'rows' array",
                ));
            }
        };

        Ok(Self {
            schema,
            rows: rows.into_iter(),
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RowCursor for ViewCursor {
    fn next_row(&mut self) -> Result<Option<ResultRow>, InternalError> {
        let Some(row) = self.rows.next() else {
            return Ok(None);
        };
        let doc = row
            .get("doc")
            .ok_or_else(|| InternalError::engine("view row has no 'doc'; include_docs missing"))?;

        decode_document(&self.schema, doc).map(Some)
    }
}
