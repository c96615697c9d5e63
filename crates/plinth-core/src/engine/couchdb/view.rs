//! Clause trees compiled into map-function filters.
//!
//! A filtered read becomes a JavaScript condition over `doc`. The SHA-256
//! of the exact condition text names the design document holding the view,
//! so the same filter always reuses the same index and any change to a
//! literal produces a new one.

use super::document::{TYPE_KEY, document_key, encode_segment, value_to_json};
use crate::{
    error::InternalError,
    model::ObjectSchema,
    query::{
        ClauseList, CompareOp, ComparePredicate, Connective, PredicateRenderer, StatementBuffer,
        render_clauses,
    },
};
use serde_json::{Value as Json, json};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;

/// View name inside every generated design document.
pub const FILTER_VIEW: &str = "view";

/// View name inside the static per-table design document.
pub const STATIC_VIEW: &str = "all";

///
/// ViewRenderer
/// Leaf comparisons as `doc.<table>_<field> <op> <literal>`.
///

struct ViewRenderer;

impl<'a> PredicateRenderer<'a> for ViewRenderer {
    fn connective(&self, connective: Connective) -> &'static str {
        match connective {
            Connective::And => "&&",
            Connective::Or => "||",
        }
    }

    fn leaf(
        &mut self,
        out: &mut StatementBuffer,
        predicate: &'a ComparePredicate,
    ) -> Result<(), InternalError> {
        let key = document_key(&predicate.table, &predicate.field);
        let key = member(&key)?;

        match predicate.op {
            CompareOp::IsNull => out.push_fmt(format_args!("doc.{key} == null")),
            CompareOp::IsNotNull => out.push_fmt(format_args!("doc.{key} != null")),
            op => out.push_fmt(format_args!(
                "doc.{key} {} {}",
                comparator(op),
                value_to_json(&predicate.value)
            )),
        }
    }
}

const fn comparator(op: CompareOp) -> &'static str {
    match op {
        CompareOp::Eq | CompareOp::IsNull => "==",
        CompareOp::Ne | CompareOp::IsNotNull => "!=",
        CompareOp::Lt => "<",
        CompareOp::Le => "<=",
        CompareOp::Ge => ">=",
        CompareOp::Gt => ">",
    }
}

/// Document keys are spliced into code as `doc.<key>`.
fn member(key: &str) -> Result<&str, InternalError> {
    let mut chars = key.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');

    if valid {
        Ok(key)
    } else {
        Err(InternalError::compile(format!(
            "'{key}' cannot be used as a document member name"
        )))
    }
}

// ----------------------------------------------------------------------
// Filter expression
// ----------------------------------------------------------------------

/// `doc.type == "<table>" && (<clauses>)`.
pub fn filter_expression(
    schema: &ObjectSchema,
    clauses: &ClauseList,
) -> Result<String, InternalError> {
    let mut out = StatementBuffer::new()?;
    out.push_fmt(format_args!(
        "doc.{TYPE_KEY} == {} && (",
        Json::from(schema.table())
    ))?;
    render_clauses(&mut ViewRenderer, clauses, &mut out)?;
    out.push(")")?;

    Ok(out.as_str().to_string())
}

/// Lower-case hex SHA-256 of the expression bytes.
#[must_use]
pub fn view_name(expression: &str) -> String {
    let digest = Sha256::digest(expression.as_bytes());

    let mut out = String::with_capacity(64);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

fn map_function(condition: &str) -> String {
    format!("function(doc) {{ if ({condition}) {{ emit(doc._id, null); }} }}")
}

/// Design document holding the filter view for `expression`.
#[must_use]
pub fn design_document(name: &str, expression: &str) -> Json {
    json!({
        "_id": format!("_design/{name}"),
        "language": "javascript",
        "views": {
            (FILTER_VIEW): { "map": map_function(expression) },
        },
    })
}

/// Design document with the unfiltered `all` view of one table. Deploy it
/// once per table; unfiltered reads query it.
#[must_use]
pub fn static_view_document(table: &str) -> Json {
    let condition = format!("doc.{TYPE_KEY} == {}", Json::from(table));

    json!({
        "_id": format!("_design/{table}"),
        "language": "javascript",
        "views": {
            (STATIC_VIEW): { "map": map_function(&condition) },
        },
    })
}

// ----------------------------------------------------------------------
// Paths
// ----------------------------------------------------------------------

#[must_use]
pub fn design_path(name: &str) -> String {
    format!("/_design/{}", encode_segment(name))
}

#[must_use]
pub fn view_path(design: &str, view: &str) -> String {
    format!(
        "/_design/{}/_view/{}?include_docs=true",
        encode_segment(design),
        encode_segment(view)
    )
}
