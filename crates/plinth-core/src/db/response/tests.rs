use crate::{
    db::response::{ResultList, ResultRow, RowCursor, VecCursor},
    error::{ErrorClass, InternalError},
    model::BackendMetaDataList,
    value::{Value, ValueSet},
};
use proptest::prelude::*;
use std::{cell::Cell, rc::Rc};

fn row(id: i64) -> ResultRow {
    let values = ValueSet::from_values(vec![Value::from(id)]).expect("set");
    ResultRow::new(values)
}

fn ids(rows: &[ResultRow]) -> Vec<i64> {
    rows.iter()
        .map(|r| r.values[0].as_int64().expect("int64"))
        .collect()
}

///
/// TrackedCursor
/// Counts pulls and records when the engine side was released.
///

struct TrackedCursor {
    remaining: Vec<ResultRow>,
    pulls: Rc<Cell<usize>>,
    dropped: Rc<Cell<bool>>,
}

impl TrackedCursor {
    fn new(count: i64) -> (Self, Rc<Cell<usize>>, Rc<Cell<bool>>) {
        let pulls = Rc::new(Cell::new(0));
        let dropped = Rc::new(Cell::new(false));
        let mut remaining: Vec<_> = (1..=count).map(row).collect();
        remaining.reverse();

        (
            Self {
                remaining,
                pulls: Rc::clone(&pulls),
                dropped: Rc::clone(&dropped),
            },
            pulls,
            dropped,
        )
    }
}

impl RowCursor for TrackedCursor {
    fn next_row(&mut self) -> Result<Option<ResultRow>, InternalError> {
        self.pulls.set(self.pulls.get() + 1);
        Ok(self.remaining.pop())
    }
}

impl Drop for TrackedCursor {
    fn drop(&mut self) {
        self.dropped.set(true);
    }
}

struct FailingCursor;

impl RowCursor for FailingCursor {
    fn next_row(&mut self) -> Result<Option<ResultRow>, InternalError> {
        Err(InternalError::engine("fetch failed"))
    }
}

fn drain(list: &mut ResultList) -> Vec<i64> {
    let mut out = Vec::new();
    while let Some(row) = list.next().expect("next") {
        out.push(row.values[0].as_int64().expect("int64"));
    }
    out
}

#[test]
fn materialized_begin_rewinds() {
    let mut list = ResultList::materialized(vec![row(1), row(2)]);

    assert_eq!(drain(&mut list), vec![1, 2]);
    assert!(list.next().expect("next").is_none());

    list.begin().expect("begin");
    list.begin().expect("begin again");
    assert_eq!(drain(&mut list), vec![1, 2]);
}

#[test]
fn lazy_emptiness_follows_the_declared_size() {
    let none = ResultList::lazy(Box::new(VecCursor::new(Vec::new())), 0);
    assert!(none.is_empty());
    assert_eq!(none.len(), 0);

    let two = ResultList::lazy(Box::new(VecCursor::new(vec![row(1), row(2)])), 2);
    assert!(!two.is_empty());

    let unknown = ResultList::lazy_unsized(Box::new(VecCursor::new(vec![row(1)])));
    assert!(!unknown.is_empty());
    assert_eq!(unknown.len(), 0);
}

#[test]
fn lazy_begin_only_once() {
    let (cursor, _, _) = TrackedCursor::new(2);
    let mut list = ResultList::lazy_unsized(Box::new(cursor));

    list.begin().expect("first begin");
    let err = list.begin().expect_err("restart");
    assert_eq!(err.class, ErrorClass::InvariantViolation);
}

#[test]
fn lazy_next_counts_as_started() {
    let (cursor, _, _) = TrackedCursor::new(2);
    let mut list = ResultList::lazy(Box::new(cursor), 2);

    assert!(list.next().expect("next").is_some());
    assert!(list.begin().is_err());
}

#[test]
fn lazy_pulls_on_demand_and_releases_at_end() {
    let (cursor, pulls, dropped) = TrackedCursor::new(3);
    let mut list = ResultList::lazy(Box::new(cursor), 3);
    assert!(list.is_lazy());
    assert_eq!(list.len(), 3);

    assert_eq!(pulls.get(), 0);
    list.next().expect("next");
    assert_eq!(pulls.get(), 1);
    assert!(!dropped.get());

    assert_eq!(drain(&mut list), vec![2, 3]);
    assert!(dropped.get());
    assert!(list.next().expect("after end").is_none());
    assert_eq!(pulls.get(), 4);
}

#[test]
fn fetch_all_materializes_and_releases() {
    let (cursor, _, dropped) = TrackedCursor::new(4);
    let mut list = ResultList::lazy_unsized(Box::new(cursor));

    list.fetch_all().expect("fetch_all");
    assert!(dropped.get());
    assert!(!list.is_lazy());
    assert_eq!(list.len(), 4);

    list.begin().expect("begin after fetch_all");
    assert_eq!(drain(&mut list), vec![1, 2, 3, 4]);
    list.fetch_all().expect("idempotent");
}

#[test]
fn fetch_all_keeps_only_unread_rows() {
    let (cursor, _, _) = TrackedCursor::new(3);
    let mut list = ResultList::lazy_unsized(Box::new(cursor));
    list.next().expect("next");

    list.fetch_all().expect("fetch_all");
    assert_eq!(drain(&mut list), vec![2, 3]);
}

#[test]
fn dropping_lazy_list_releases_cursor() {
    let (cursor, _, dropped) = TrackedCursor::new(3);
    let list = ResultList::lazy_unsized(Box::new(cursor));
    drop(list);

    assert!(dropped.get());
}

#[test]
fn cursor_failure_propagates() {
    let mut list = ResultList::lazy_unsized(Box::new(FailingCursor));
    assert!(list.next().is_err());

    let list = ResultList::lazy_unsized(Box::new(FailingCursor));
    assert!(list.into_rows().is_err());
}

#[test]
fn one_and_one_opt() {
    let only = ResultList::materialized(vec![row(7)]).one("users").expect("one");
    assert_eq!(only.values[0], Value::from(7i64));

    let err = ResultList::empty().one("users").expect_err("none");
    assert_eq!(err.class, ErrorClass::NotFound);

    let err = ResultList::materialized(vec![row(1), row(2)])
        .one_opt("users")
        .expect_err("two");
    assert!(err.message.contains("found 2"));

    assert!(ResultList::empty().one_opt("users").expect("none").is_none());
}

#[test]
fn rows_carry_metadata() {
    let tagged = row(1).with_metadata(BackendMetaDataList::revision_token("1-abc"));
    let list = ResultList::lazy(Box::new(VecCursor::new(vec![tagged])), 1);

    let rows = list.into_rows().expect("rows");
    let meta = rows[0].metadata.as_ref().expect("metadata");
    assert_eq!(meta.get("_rev"), Some(&Value::from("1-abc")));
}

proptest! {
    #[test]
    fn fetch_all_matches_manual_drain(count in 0i64..40) {
        let rows = || Box::new(VecCursor::new((1..=count).map(row).collect()));
        let mut manual = ResultList::lazy_unsized(rows());
        let drained = drain(&mut manual);

        let mut bulk = ResultList::lazy_unsized(rows());
        bulk.fetch_all().expect("fetch_all");
        let fetched = ids(&bulk.into_rows().expect("rows"));

        prop_assert_eq!(drained, fetched);
    }
}
