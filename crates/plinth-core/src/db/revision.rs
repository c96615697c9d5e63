//! Optimistic-concurrency rules shared by every engine.
//!
//! A schema declares at most one revision field. Inserts seed it with
//! [`INITIAL_REVISION`]; callers never write it directly. Updates and deletes
//! must filter on it with the value last read, and succeed only when at
//! least one row or document was affected.

use crate::{
    error::{ErrorOrigin, InternalError},
    model::{ObjectFieldList, ObjectSchema},
    query::{ClauseList, ClauseNode, CompareOp, ComparePredicate, Connective},
    value::Value,
};

/// Revision stored by a fresh create.
pub const INITIAL_REVISION: i64 = 1;

/// Reject a write payload that names the revision field.
pub fn reject_revision_payload(
    schema: &ObjectSchema,
    fields: &ObjectFieldList,
) -> Result<(), InternalError> {
    if let Some(revision) = schema.revision_field()
        && fields.field(&revision.name).is_some()
    {
        return Err(InternalError::invariant(
            ErrorOrigin::Query,
            format!(
                "revision field '{}' of '{}' is maintained by the engine and cannot be written",
                revision.name,
                schema.table()
            ),
        ));
    }

    Ok(())
}

/// Find the revision guard of an update or delete.
///
/// Returns `None` for schemas without a revision field. For schemas with
/// one, the clause tree must contain an equality test on it that every
/// matched row has to satisfy: the test and each enclosing group must sit in
/// a sibling list joined only by AND. A missing or OR-joined guard is a
/// compile failure.
pub fn revision_guard<'a>(
    schema: &ObjectSchema,
    clauses: &'a ClauseList,
) -> Result<Option<&'a ComparePredicate>, InternalError> {
    let Some(revision) = schema.revision_field() else {
        return Ok(None);
    };
    let is_guard = |leaf: &ComparePredicate| {
        leaf.op == CompareOp::Eq && leaf.field == revision.name && leaf.table == schema.table()
    };

    if let Some(guard) = required_leaf(clauses, &is_guard) {
        return Ok(Some(guard));
    }

    let reason = if clauses.leaves().into_iter().any(&is_guard) {
        "must be joined to the WHERE clauses with AND"
    } else {
        "missing from the WHERE clauses"
    };

    Err(InternalError::compile(format!(
        "revision field '{}' of '{}' {reason}",
        revision.name,
        schema.table()
    )))
}

/// First leaf matching `wanted` that every row selected by `list` satisfies.
fn required_leaf<'a>(
    list: &'a ClauseList,
    wanted: &impl Fn(&ComparePredicate) -> bool,
) -> Option<&'a ComparePredicate> {
    if list
        .iter()
        .skip(1)
        .any(|clause| clause.connective() == Connective::Or)
    {
        return None;
    }

    list.iter().find_map(|clause| match clause.node() {
        ClauseNode::Compare(leaf) => wanted(leaf).then_some(leaf),
        ClauseNode::Nested(children) => required_leaf(children, wanted),
    })
}

/// The revision written by an update that read `current`.
pub fn next_revision(current: &Value) -> Result<i64, InternalError> {
    let current = current.as_integer()?;

    current.checked_add(1).ok_or_else(|| {
        InternalError::invariant(ErrorOrigin::Query, format!("revision {current} overflows"))
    })
}

/// Turn an affected-row count into the operation's outcome.
///
/// Zero rows under a revision guard is a stale-revision conflict; zero rows
/// without one means nothing matched.
pub fn require_affected(
    schema: &ObjectSchema,
    op: &str,
    affected: u64,
) -> Result<(), InternalError> {
    if affected > 0 {
        return Ok(());
    }

    if let Some(revision) = schema.revision_field() {
        tracing::debug!(
            table = schema.table(),
            revision = %revision.name,
            op,
            "stale revision, no rows affected"
        );
        Err(InternalError::conflict(
            ErrorOrigin::Engine,
            format!(
                "{op} on '{}' affected no rows; revision is stale",
                schema.table()
            ),
        ))
    } else {
        Err(InternalError::not_found(
            ErrorOrigin::Engine,
            format!("{op} on '{}' matched no rows", schema.table()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ErrorClass,
        model::FieldKind,
        query::{Clause, ClauseList},
    };

    fn schema(with_revision: bool) -> ObjectSchema {
        let mut fields = ObjectFieldList::new()
            .with("id", FieldKind::PrimaryKey)
            .expect("id")
            .with("name", FieldKind::Text)
            .expect("name");
        if with_revision {
            fields = fields.with("rev", FieldKind::Revision).expect("rev");
        }
        ObjectSchema::new("users", "id", fields).expect("schema")
    }

    #[test]
    fn guard_found_inside_nested_clauses() {
        let schema = schema(true);
        let inner = ClauseList::new().and(Clause::equal("users", "rev", 3i64).expect("rev"));
        let clauses = ClauseList::new()
            .and(Clause::equal("users", "id", 1i64).expect("id"))
            .and(Clause::nested(inner).expect("nested"));

        let guard = revision_guard(&schema, &clauses)
            .expect("guard")
            .expect("present");
        assert_eq!(guard.value, Value::from(3i64));
    }

    #[test]
    fn missing_guard_is_a_compile_error() {
        let schema = schema(true);
        let clauses = ClauseList::new()
            .and(Clause::equal("users", "id", 1i64).expect("id"))
            .and(
                Clause::compare("users", "rev", CompareOp::Ge, Value::from(1i64)).expect("ge"),
            );

        let err = revision_guard(&schema, &clauses).expect_err("no eq guard");
        assert_eq!(err.class, ErrorClass::Compile);
    }

    #[test]
    fn guard_joined_by_or_is_rejected() {
        let schema = schema(true);
        let clauses = ClauseList::new()
            .and(Clause::equal("users", "rev", 1i64).expect("rev"))
            .or(Clause::equal("users", "id", 1i64).expect("id"));

        let err = revision_guard(&schema, &clauses).expect_err("or-joined guard");
        assert_eq!(err.class, ErrorClass::Compile);
        assert!(err.message.contains("AND"));
    }

    #[test]
    fn guard_inside_an_or_group_is_rejected() {
        let schema = schema(true);
        let either = ClauseList::new()
            .and(Clause::equal("users", "rev", 1i64).expect("rev"))
            .or(Clause::equal("users", "name", "ann").expect("name"));
        let clauses = ClauseList::new()
            .and(Clause::equal("users", "id", 1i64).expect("id"))
            .and(Clause::nested(either).expect("nested"));

        let err = revision_guard(&schema, &clauses).expect_err("guard is optional");
        assert_eq!(err.class, ErrorClass::Compile);
    }

    #[test]
    fn guard_group_joined_by_or_is_rejected() {
        let schema = schema(true);
        let inner = ClauseList::new().and(Clause::equal("users", "rev", 1i64).expect("rev"));
        let clauses = ClauseList::new()
            .and(Clause::equal("users", "id", 1i64).expect("id"))
            .or(Clause::nested(inner).expect("nested"));

        let err = revision_guard(&schema, &clauses).expect_err("group is optional");
        assert_eq!(err.class, ErrorClass::Compile);
    }

    #[test]
    fn no_revision_field_needs_no_guard() {
        let clauses = ClauseList::new();
        assert!(revision_guard(&schema(false), &clauses).expect("ok").is_none());
    }

    #[test]
    fn payload_may_not_carry_revision() {
        let schema = schema(true);
        let payload = ObjectFieldList::new()
            .with("rev", FieldKind::Revision)
            .expect("rev");

        assert!(reject_revision_payload(&schema, &payload).is_err());
        assert!(reject_revision_payload(&schema, schema.fields()).is_err());

        let payload = ObjectFieldList::new()
            .with("name", FieldKind::Text)
            .expect("name");
        reject_revision_payload(&schema, &payload).expect("allowed");
    }

    #[test]
    fn next_revision_widens_and_checks_overflow() {
        assert_eq!(next_revision(&Value::from(1i32)).expect("next"), 2);
        assert_eq!(next_revision(&Value::from(7u64)).expect("next"), 8);
        assert!(next_revision(&Value::from(i64::MAX)).is_err());
        assert!(next_revision(&Value::from("1")).is_err());
    }

    #[test]
    fn zero_rows_classified_by_guard() {
        let err = require_affected(&schema(true), "update", 0).expect_err("stale");
        assert!(err.is_conflict());

        let err = require_affected(&schema(false), "delete", 0).expect_err("none");
        assert!(err.is_not_found());

        require_affected(&schema(true), "update", 1).expect("affected");
    }
}
