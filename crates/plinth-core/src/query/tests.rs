use crate::{
    error::{ErrorClass, InternalError},
    query::{
        Clause, ClauseList, CompareOp, ComparePredicate, Connective, Join, JoinList,
        PredicateRenderer, StatementBuffer, render_clauses,
    },
    value::Value,
};

///
/// LabelRenderer
/// Writes `field:op` for each leaf and records visit order.
///

#[derive(Default)]
struct LabelRenderer<'a> {
    visited: Vec<&'a ComparePredicate>,
}

impl<'a> PredicateRenderer<'a> for LabelRenderer<'a> {
    fn connective(&self, connective: Connective) -> &'static str {
        match connective {
            Connective::And => "&",
            Connective::Or => "|",
        }
    }

    fn leaf(
        &mut self,
        out: &mut StatementBuffer,
        predicate: &'a ComparePredicate,
    ) -> Result<(), InternalError> {
        self.visited.push(predicate);
        out.push_fmt(format_args!("{}:{}", predicate.field, predicate.op.label()))
    }
}

fn render(clauses: &ClauseList) -> String {
    let mut renderer = LabelRenderer::default();
    let mut out = StatementBuffer::new().expect("buffer");
    render_clauses(&mut renderer, clauses, &mut out).expect("render");
    out.as_str().to_string()
}

#[test]
fn first_connective_is_never_rendered() {
    let clauses = ClauseList::new()
        .or(Clause::equal("t", "a", 1i32).expect("clause"))
        .and(Clause::is_null("t", "b").expect("clause"));

    assert_eq!(render(&clauses), "a:eq & b:is_null");
}

#[test]
fn nested_lists_are_parenthesised_in_place() {
    let inner = ClauseList::new()
        .and(Clause::equal("t", "b", 2i32).expect("clause"))
        .or(Clause::equal("t", "c", 3i32).expect("clause"));
    let clauses = ClauseList::new()
        .and(Clause::equal("t", "a", 1i32).expect("clause"))
        .and(Clause::nested(inner).expect("nested"))
        .or(Clause::is_not_null("t", "d").expect("clause"));

    assert_eq!(render(&clauses), "a:eq & (b:eq | c:eq) | d:is_not_null");
}

#[test]
fn leaves_are_visited_depth_first() {
    let deep = ClauseList::new().and(Clause::equal("t", "c", 3i32).expect("clause"));
    let mid = ClauseList::new()
        .and(Clause::equal("t", "b", 2i32).expect("clause"))
        .and(Clause::nested(deep).expect("nested"));
    let clauses = ClauseList::new()
        .and(Clause::nested(mid).expect("nested"))
        .and(Clause::equal("t", "d", 4i32).expect("clause"));

    let mut renderer = LabelRenderer::default();
    let mut out = StatementBuffer::new().expect("buffer");
    render_clauses(&mut renderer, &clauses, &mut out).expect("render");

    let order: Vec<_> = renderer.visited.iter().map(|p| p.field.as_str()).collect();
    assert_eq!(order, vec!["b", "c", "d"]);

    let leaves: Vec<_> = clauses.leaves().iter().map(|p| p.field.as_str()).collect();
    assert_eq!(leaves, order);
}

#[test]
fn comparison_needs_field_and_value() {
    let err = Clause::compare("t", "", CompareOp::Eq, Value::from(1i32)).expect_err("no field");
    assert_eq!(err.class, ErrorClass::InvariantViolation);

    assert!(Clause::compare("t", "a", CompareOp::Gt, Value::new()).is_err());
    assert!(Clause::compare("", "a", CompareOp::Gt, Value::from(1i32)).is_err());
}

#[test]
fn null_tests_drop_their_operand() {
    let clause = Clause::compare("t", "a", CompareOp::IsNull, Value::from(5i32)).expect("clause");
    let compare = clause.as_compare().expect("leaf");
    assert!(compare.value.is_empty());

    let clauses = ClauseList::new()
        .and(clause)
        .and(Clause::equal("t", "b", 1i32).expect("clause"));
    assert_eq!(clauses.parameter_count(), 1);
}

#[test]
fn nested_clause_needs_children() {
    assert!(Clause::nested(ClauseList::new()).is_err());
}

#[test]
fn join_edges_need_all_parts() {
    assert!(Join::new("users", "id", "orders", "").is_err());

    let joins = JoinList::new()
        .join(Join::new("users", "id", "orders", "user_id").expect("join"))
        .join(Join::new("orders", "sku", "items", "sku").expect("join"));
    assert_eq!(joins.len(), 2);
    assert_eq!(joins[1].to_table, "items");
}

#[test]
fn statement_buffer_overflow_is_a_compile_error() {
    let mut out = StatementBuffer::new().expect("buffer");
    let chunk = "x".repeat(1024);

    let mut result = Ok(());
    for _ in 0..64 {
        result = out.push(&chunk);
        if result.is_err() {
            break;
        }
    }

    let err = result.expect_err("buffer is bounded");
    assert_eq!(err.class, ErrorClass::Compile);
    assert!(out.len() <= crate::pool::STATEMENT_CELL_SIZE);
}
