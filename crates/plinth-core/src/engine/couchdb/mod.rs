//! Document-store engine speaking the CouchDB HTTP API.
//!
//! Reads pick one of three strategies from the clause list: primary-key
//! point lookups, the static per-table `all` view for unfiltered reads, or
//! a generated view whose design document is named by the SHA-256 of its
//! filter. Joins, counts and transactions are not available.
//!
//! Configuration keys: `url` (database URL, required) and `timeout`
//! (seconds, default 30).

pub mod cursor;
pub mod document;
pub mod transport;
pub mod view;


use crate::{
    config::ConfigurationList,
    db::{
        backend::{BackendEngine, EngineDescriptor},
        response::ResultList,
        revision::{self, next_revision},
    },
    engine::sql::statement::check_payload,
    error::{ErrorOrigin, InternalError},
    model::{BackendMetaDataList, ObjectFieldList, ObjectSchema, REVISION_TOKEN},
    query::{ClauseList, CompareOp, ComparePredicate, Connective, JoinList},
    value::ValueSet,
};
use cursor::{PointCursor, ViewCursor};
use document::{
    REV_KEY, belongs_to, document_id, document_key, document_path, encode_segment,
    merge_payload, new_document, revision_token, stored_revision,
};
use serde_json::{Map, Value as Json};
use std::sync::Arc;
use transport::{DocumentTransport, HttpResponse, HttpTransport, Method};
use view::{
    FILTER_VIEW, STATIC_VIEW, design_document, design_path, filter_expression, view_name,
    view_path,
};

// re-exports
pub use view::static_view_document;

/// Configuration name of this engine.
pub const ENGINE_NAME: &str = "couchdb";

/// Registry entry for the factory.
#[must_use]
pub fn descriptor() -> EngineDescriptor {
    EngineDescriptor::new(ENGINE_NAME, || Box::new(CouchEngine::new()))
}

/// Map a non-success response to an error of the matching class.
pub(crate) fn status_error(op: &str, target: &str, response: &HttpResponse) -> InternalError {
    let message = format!(
        "couchdb {op} '{target}' returned {}: {}",
        response.status,
        response.reason()
    );

    match response.status {
        404 => InternalError::not_found(ErrorOrigin::Engine, message),
        409 => InternalError::conflict(ErrorOrigin::Engine, message),
        _ => InternalError::engine(message),
    }
}

///
/// CouchEngine
///

#[derive(Default)]
pub struct CouchEngine {
    preset: Option<Arc<dyn DocumentTransport>>,
    transport: Option<Arc<dyn DocumentTransport>>,
}

impl CouchEngine {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            preset: None,
            transport: None,
        }
    }

    /// Engine that talks to `transport` instead of opening an HTTP client;
    /// `url` and `timeout` are then ignored.
    #[must_use]
    pub fn with_transport(transport: Arc<dyn DocumentTransport>) -> Self {
        Self {
            preset: Some(transport),
            transport: None,
        }
    }

    fn transport(&self) -> Result<&Arc<dyn DocumentTransport>, InternalError> {
        self.transport.as_ref().ok_or_else(|| {
            InternalError::invariant(ErrorOrigin::Engine, "couchdb transport is not connected")
        })
    }

    /// Stored document `id` of `schema`'s table; a document of another
    /// table is reported as missing.
    fn fetch_document(
        &self,
        schema: &ObjectSchema,
        id: &str,
    ) -> Result<Map<String, Json>, InternalError> {
        let response = self.transport()?.send(Method::Get, &document_path(id), None)?;
        if response.status != 200 {
            return Err(status_error("GET", id, &response));
        }
        if !belongs_to(schema, &response.body) {
            return Err(InternalError::not_found(
                ErrorOrigin::Engine,
                format!("document '{id}' is not a row of '{}'", schema.table()),
            ));
        }

        match response.body {
            Json::Object(doc) => Ok(doc),
            _ => Err(InternalError::engine(format!(
                "document '{id}' is not a JSON object"
            ))),
        }
    }

    /// Create the design document for `expression` unless it exists.
    fn ensure_view(&self, name: &str, expression: &str) -> Result<(), InternalError> {
        let design = design_document(name, expression);
        let response = self
            .transport()?
            .send(Method::Put, &design_path(name), Some(&design))?;

        match response.status {
            201 | 202 => {
                tracing::debug!(view = name, expression, "couchdb view created");
                Ok(())
            }
            409 => {
                tracing::trace!(view = name, "couchdb view already present");
                Ok(())
            }
            _ => Err(status_error("PUT", &design_path(name), &response)),
        }
    }

    fn query_view(
        &self,
        schema: &ObjectSchema,
        design: &str,
        view: &str,
    ) -> Result<ResultList, InternalError> {
        let path = view_path(design, view);
        let response = self.transport()?.send(Method::Get, &path, None)?;
        if response.status != 200 {
            return Err(status_error("GET", &path, &response));
        }

        let cursor = ViewCursor::from_body(schema.clone(), response.body)?;
        let size = cursor.len();

        Ok(ResultList::lazy(Box::new(cursor), size))
    }
}

impl BackendEngine for CouchEngine {
    fn connect(&mut self, config: &ConfigurationList) -> Result<(), InternalError> {
        let transport: Arc<dyn DocumentTransport> = match &self.preset {
            Some(preset) => Arc::clone(preset),
            None => Arc::new(HttpTransport::from_config(config)?),
        };
        self.transport = Some(transport);
        tracing::debug!(url = config.get("url"), "couchdb transport ready");

        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), InternalError> {
        self.transport = None;

        Ok(())
    }

    fn create(
        &mut self,
        schema: &ObjectSchema,
        fields: &ObjectFieldList,
        values: &ValueSet,
    ) -> Result<Option<BackendMetaDataList>, InternalError> {
        check_payload(schema, fields, values)?;
        let doc = Json::Object(new_document(schema, fields, values)?);

        let response = self.transport()?.send(Method::Post, "/", Some(&doc))?;
        match response.status {
            201 | 202 => Ok(Some(fresh_token(schema, &response)?)),
            _ => Err(status_error("POST", schema.table(), &response)),
        }
    }

    fn read(
        &mut self,
        schema: &ObjectSchema,
        _metadata: Option<&BackendMetaDataList>,
        joins: &JoinList,
        clauses: &ClauseList,
    ) -> Result<ResultList, InternalError> {
        if !joins.is_empty() {
            return Err(InternalError::unsupported(
                ErrorOrigin::Engine,
                "joins are not supported by the document store",
            ));
        }

        if clauses.is_empty() {
            return self.query_view(schema, schema.table(), STATIC_VIEW);
        }

        if let Some(keys) = point_keys(schema, clauses)? {
            let transport = Arc::clone(self.transport()?);
            let cursor = PointCursor::new(transport, schema.clone(), keys);

            return Ok(ResultList::lazy_unsized(Box::new(cursor)));
        }

        let expression = filter_expression(schema, clauses)?;
        let name = view_name(&expression);
        self.ensure_view(&name, &expression)?;

        self.query_view(schema, &name, FILTER_VIEW)
    }

    fn update(
        &mut self,
        schema: &ObjectSchema,
        metadata: Option<&BackendMetaDataList>,
        fields: &ObjectFieldList,
        values: &ValueSet,
        clauses: &ClauseList,
    ) -> Result<Option<BackendMetaDataList>, InternalError> {
        check_payload(schema, fields, values)?;
        let token = current_token(metadata, "update")?;
        let id = write_target(schema, clauses)?;
        let guard = revision::revision_guard(schema, clauses)?;

        let mut doc = self.fetch_document(schema, &id)?;
        check_stored_revision(schema, guard, &doc, &id)?;

        merge_payload(&mut doc, schema, fields, values);
        if let (Some(revision), Some(guard)) = (schema.revision_field(), guard) {
            doc.insert(
                document_key(schema.table(), &revision.name),
                Json::from(next_revision(&guard.value)?),
            );
        }
        doc.insert(REV_KEY.to_string(), Json::from(token));

        let body = Json::Object(doc);
        let response = self
            .transport()?
            .send(Method::Put, &document_path(&id), Some(&body))?;
        match response.status {
            201 | 202 => Ok(Some(fresh_token(schema, &response)?)),
            _ => Err(status_error("PUT", &id, &response)),
        }
    }

    fn delete(
        &mut self,
        schema: &ObjectSchema,
        metadata: Option<&BackendMetaDataList>,
        clauses: &ClauseList,
    ) -> Result<(), InternalError> {
        let token = current_token(metadata, "delete")?;
        let id = write_target(schema, clauses)?;
        let guard = revision::revision_guard(schema, clauses)?;
        let doc = self.fetch_document(schema, &id)?;
        check_stored_revision(schema, guard, &doc, &id)?;

        let path = format!("{}?rev={}", document_path(&id), encode_segment(token));
        let response = self.transport()?.send(Method::Delete, &path, None)?;
        match response.status {
            200 | 202 => Ok(()),
            _ => Err(status_error("DELETE", &id, &response)),
        }
    }
}

// ----------------------------------------------------------------------
// Clause analysis
// ----------------------------------------------------------------------

fn is_key_equality(schema: &ObjectSchema, leaf: &ComparePredicate) -> bool {
    leaf.op == CompareOp::Eq && leaf.table == schema.table() && leaf.field == schema.primary_key()
}

/// Document ids of a pure primary-key lookup: every top-level clause is an
/// equality on the key, alternatives joined by OR.
fn point_keys(
    schema: &ObjectSchema,
    clauses: &ClauseList,
) -> Result<Option<Vec<String>>, InternalError> {
    let mut keys = Vec::with_capacity(clauses.len());

    for (index, clause) in clauses.iter().enumerate() {
        let Some(leaf) = clause.as_compare() else {
            return Ok(None);
        };
        if !is_key_equality(schema, leaf) || (index > 0 && clause.connective() != Connective::Or)
        {
            return Ok(None);
        }
        keys.push(document_id(&leaf.value)?);
    }

    Ok((!keys.is_empty()).then_some(keys))
}

/// Id of the single document an update or delete addresses. Only a key
/// equality and the revision guard may appear, joined by AND.
fn write_target(schema: &ObjectSchema, clauses: &ClauseList) -> Result<String, InternalError> {
    let revision = schema.revision_field().map(|field| field.name.as_str());
    let mut id = None;

    for (index, clause) in clauses.iter().enumerate() {
        let leaf = clause
            .as_compare()
            .filter(|_| index == 0 || clause.connective() == Connective::And)
            .filter(|leaf| leaf.op == CompareOp::Eq && leaf.table == schema.table());

        match leaf {
            Some(leaf) if id.is_none() && is_key_equality(schema, leaf) => {
                id = Some(document_id(&leaf.value)?);
            }
            Some(leaf) if Some(leaf.field.as_str()) == revision => {}
            _ => {
                return Err(InternalError::unsupported(
                    ErrorOrigin::Engine,
                    format!(
                        "document writes on '{}' accept only '{}' and revision equality clauses",
                        schema.table(),
                        schema.primary_key()
                    ),
                ));
            }
        }
    }

    id.ok_or_else(|| {
        InternalError::compile(format!(
            "document write on '{}' needs an equality clause on '{}'",
            schema.table(),
            schema.primary_key()
        ))
    })
}

// ----------------------------------------------------------------------
// Revisions
// ----------------------------------------------------------------------

fn current_token<'m>(
    metadata: Option<&'m BackendMetaDataList>,
    op: &str,
) -> Result<&'m str, InternalError> {
    metadata
        .and_then(|meta| meta.get(REVISION_TOKEN))
        .ok_or_else(|| {
            InternalError::invariant(
                ErrorOrigin::Engine,
                format!("document {op} needs the object's {REVISION_TOKEN} metadata"),
            )
        })?
        .as_text()
}

fn check_stored_revision(
    schema: &ObjectSchema,
    guard: Option<&ComparePredicate>,
    doc: &Map<String, Json>,
    id: &str,
) -> Result<(), InternalError> {
    let Some(guard) = guard else {
        return Ok(());
    };
    let expected = guard.value.as_integer()?;
    let stored = stored_revision(schema, doc);

    if stored == Some(expected) {
        return Ok(());
    }
    tracing::debug!(id, expected, ?stored, "couchdb revision mismatch");

    Err(InternalError::conflict(
        ErrorOrigin::Engine,
        format!(
            "document '{id}' of '{}' is at revision {stored:?}, not {expected}",
            schema.table()
        ),
    ))
}

fn fresh_token(
    schema: &ObjectSchema,
    response: &HttpResponse,
) -> Result<BackendMetaDataList, InternalError> {
    revision_token(&response.body)
        .map(BackendMetaDataList::revision_token)
        .ok_or_else(|| {
            InternalError::engine(format!(
                "couchdb write to '{}' acknowledged without a revision token",
                schema.table()
            ))
        })
}
