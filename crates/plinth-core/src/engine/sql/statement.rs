//! Parameterised statement builders for the relational engines.

use crate::{
    db::revision::{self, INITIAL_REVISION},
    error::InternalError,
    model::{ObjectFieldList, ObjectSchema},
    query::{
        ClauseList, CompareOp, ComparePredicate, Connective, JoinList, PredicateRenderer,
        StatementBuffer, render_clauses,
    },
    value::{Value, ValueSet},
};
use std::borrow::Cow;

///
/// CompiledStatement
///
/// Statement text plus its positional parameters in placeholder order.
/// Parameters borrow from the caller's payload and clauses; only synthetic
/// values (seeded and bumped revisions) are owned.
///

#[derive(Debug)]
pub struct CompiledStatement<'a> {
    pub text: StatementBuffer,
    pub params: Vec<Cow<'a, Value>>,
}

impl CompiledStatement<'_> {
    #[must_use]
    pub fn sql(&self) -> &str {
        self.text.as_str()
    }
}

///
/// SqlRenderer
/// Leaf comparisons as `table.field <op> ?`.
///

#[derive(Default)]
struct SqlRenderer<'a> {
    params: Vec<Cow<'a, Value>>,
}

impl<'a> PredicateRenderer<'a> for SqlRenderer<'a> {
    fn connective(&self, connective: Connective) -> &'static str {
        match connective {
            Connective::And => "AND",
            Connective::Or => "OR",
        }
    }

    fn leaf(
        &mut self,
        out: &mut StatementBuffer,
        predicate: &'a ComparePredicate,
    ) -> Result<(), InternalError> {
        let table = identifier(&predicate.table)?;
        let field = identifier(&predicate.field)?;

        match predicate.op {
            CompareOp::IsNull => out.push_fmt(format_args!("{table}.{field} IS NULL")),
            CompareOp::IsNotNull => out.push_fmt(format_args!("{table}.{field} IS NOT NULL")),
            op => {
                out.push_fmt(format_args!("{table}.{field} {} ?", comparator(op)))?;
                self.params.push(Cow::Borrowed(&predicate.value));
                Ok(())
            }
        }
    }
}

const fn comparator(op: CompareOp) -> &'static str {
    match op {
        CompareOp::Eq => "=",
        CompareOp::Ne => "<>",
        CompareOp::Lt => "<",
        CompareOp::Le => "<=",
        CompareOp::Ge => ">=",
        CompareOp::Gt => ">",
        CompareOp::IsNull => "IS NULL",
        CompareOp::IsNotNull => "IS NOT NULL",
    }
}

/// Accept only plain identifiers; names are spliced into statement text.
fn identifier(name: &str) -> Result<&str, InternalError> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid {
        Ok(name)
    } else {
        Err(InternalError::compile(format!(
            "'{name}' is not a valid SQL identifier"
        )))
    }
}

// ----------------------------------------------------------------------
// Shared pieces
// ----------------------------------------------------------------------

pub(crate) fn check_payload(
    schema: &ObjectSchema,
    fields: &ObjectFieldList,
    values: &ValueSet,
) -> Result<(), InternalError> {
    if fields.is_empty() {
        return Err(InternalError::compile(format!(
            "write to '{}' has no fields",
            schema.table()
        )));
    }
    if fields.len() != values.len() {
        return Err(InternalError::compile(format!(
            "write to '{}' has {} values for {} fields",
            schema.table(),
            values.len(),
            fields.len()
        )));
    }
    for field in fields {
        if schema.fields().field(&field.name).is_none() {
            return Err(InternalError::compile(format!(
                "field '{}' is not part of '{}'",
                field.name,
                schema.table()
            )));
        }
    }

    revision::reject_revision_payload(schema, fields)
}

fn push_where<'a>(
    out: &mut StatementBuffer,
    params: &mut Vec<Cow<'a, Value>>,
    clauses: &'a ClauseList,
) -> Result<(), InternalError> {
    if clauses.is_empty() {
        return Ok(());
    }

    let mut renderer = SqlRenderer::default();
    out.push(" WHERE ")?;
    render_clauses(&mut renderer, clauses, out)?;
    params.append(&mut renderer.params);

    Ok(())
}

fn push_joins(out: &mut StatementBuffer, joins: &JoinList) -> Result<(), InternalError> {
    for join in joins {
        out.push_fmt(format_args!(
            " INNER JOIN {to} ON {from}.{from_field} = {to}.{to_field}",
            to = identifier(&join.to_table)?,
            from = identifier(&join.from_table)?,
            from_field = identifier(&join.from_field)?,
            to_field = identifier(&join.to_field)?,
        ))?;
    }

    Ok(())
}

fn finish<'a>(text: StatementBuffer, params: Vec<Cow<'a, Value>>) -> CompiledStatement<'a> {
    tracing::trace!(sql = text.as_str(), params = params.len(), "statement compiled");

    CompiledStatement { text, params }
}

// ----------------------------------------------------------------------
// Builders
// ----------------------------------------------------------------------

/// `INSERT INTO t (f, …[, rev]) VALUES (?, …[, ?])`, payload order.
pub fn insert<'a>(
    schema: &ObjectSchema,
    fields: &ObjectFieldList,
    values: &'a ValueSet,
) -> Result<CompiledStatement<'a>, InternalError> {
    check_payload(schema, fields, values)?;

    let mut out = StatementBuffer::new()?;
    let mut params: Vec<Cow<'a, Value>> = values.iter().map(Cow::Borrowed).collect();

    out.push_fmt(format_args!("INSERT INTO {} (", identifier(schema.table())?))?;
    for (index, field) in fields.iter().enumerate() {
        if index > 0 {
            out.push(", ")?;
        }
        out.push(identifier(&field.name)?)?;
    }
    if let Some(revision) = schema.revision_field() {
        out.push_fmt(format_args!(", {}", identifier(&revision.name)?))?;
        params.push(Cow::Owned(Value::from(INITIAL_REVISION)));
    }

    out.push(") VALUES (")?;
    for index in 0..params.len() {
        out.push(if index == 0 { "?" } else { ", ?" })?;
    }
    out.push(")")?;

    Ok(finish(out, params))
}

/// `SELECT t.f, … FROM t [INNER JOIN …] [WHERE …]`, schema order.
pub fn select<'a>(
    schema: &ObjectSchema,
    joins: &JoinList,
    clauses: &'a ClauseList,
) -> Result<CompiledStatement<'a>, InternalError> {
    let table = identifier(schema.table())?;
    let mut out = StatementBuffer::new()?;
    let mut params = Vec::with_capacity(clauses.parameter_count());

    out.push("SELECT ")?;
    for (index, field) in schema.fields().iter().enumerate() {
        if index > 0 {
            out.push(", ")?;
        }
        out.push_fmt(format_args!("{table}.{}", identifier(&field.name)?))?;
    }
    out.push_fmt(format_args!(" FROM {table}"))?;
    push_joins(&mut out, joins)?;
    push_where(&mut out, &mut params, clauses)?;

    Ok(finish(out, params))
}

/// `UPDATE t SET f = ?, …[, rev = ?] [WHERE …]`.
pub fn update<'a>(
    schema: &ObjectSchema,
    fields: &ObjectFieldList,
    values: &'a ValueSet,
    clauses: &'a ClauseList,
) -> Result<CompiledStatement<'a>, InternalError> {
    check_payload(schema, fields, values)?;
    let guard = revision::revision_guard(schema, clauses)?;

    let mut out = StatementBuffer::new()?;
    let mut params: Vec<Cow<'a, Value>> = values.iter().map(Cow::Borrowed).collect();

    out.push_fmt(format_args!("UPDATE {} SET ", identifier(schema.table())?))?;
    for (index, field) in fields.iter().enumerate() {
        if index > 0 {
            out.push(", ")?;
        }
        out.push_fmt(format_args!("{} = ?", identifier(&field.name)?))?;
    }
    if let (Some(revision), Some(guard)) = (schema.revision_field(), guard) {
        out.push_fmt(format_args!(", {} = ?", identifier(&revision.name)?))?;
        params.push(Cow::Owned(Value::from(revision::next_revision(&guard.value)?)));
    }
    push_where(&mut out, &mut params, clauses)?;

    Ok(finish(out, params))
}

/// `DELETE FROM t [WHERE …]`.
pub fn delete<'a>(
    schema: &ObjectSchema,
    clauses: &'a ClauseList,
) -> Result<CompiledStatement<'a>, InternalError> {
    revision::revision_guard(schema, clauses)?;

    let mut out = StatementBuffer::new()?;
    let mut params = Vec::with_capacity(clauses.parameter_count());

    out.push_fmt(format_args!("DELETE FROM {}", identifier(schema.table())?))?;
    push_where(&mut out, &mut params, clauses)?;

    Ok(finish(out, params))
}

/// `SELECT COUNT(*) FROM t [INNER JOIN …] [WHERE …]`.
pub fn count<'a>(
    schema: &ObjectSchema,
    joins: &JoinList,
    clauses: &'a ClauseList,
) -> Result<CompiledStatement<'a>, InternalError> {
    let mut out = StatementBuffer::new()?;
    let mut params = Vec::with_capacity(clauses.parameter_count());

    out.push_fmt(format_args!("SELECT COUNT(*) FROM {}", identifier(schema.table())?))?;
    push_joins(&mut out, joins)?;
    push_where(&mut out, &mut params, clauses)?;

    Ok(finish(out, params))
}
