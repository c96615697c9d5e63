use crate::{ErrorKind, ErrorOrigin, connect, load_config, prelude::*};
use plinth_core::error::{ErrorClass, ErrorOrigin as CoreErrorOrigin, InternalError};
use std::fs;

fn sqlite_config(dir: &tempfile::TempDir) -> ConfigurationList {
    let path = dir.path().join("facade.sqlite");
    rusqlite::Connection::open(&path)
        .expect("open")
        .execute_batch("CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT, rev INTEGER);")
        .expect("ddl");

    ConfigurationList::new()
        .with("backend", "sqlite")
        .expect("backend")
        .with("file", path.to_string_lossy())
        .expect("file")
}

fn notes() -> ObjectSchema {
    let fields = ObjectFieldList::new()
        .with("id", FieldKind::PrimaryKey)
        .and_then(|list| list.with("body", FieldKind::Text))
        .and_then(|list| list.with("rev", FieldKind::Revision))
        .expect("fields");

    ObjectSchema::new("notes", "id", fields).expect("schema")
}

#[test]
fn internal_classes_map_to_public_kinds() {
    let cases = [
        (ErrorClass::InvariantViolation, ErrorKind::Usage),
        (ErrorClass::Compile, ErrorKind::InvalidQuery),
        (ErrorClass::Engine, ErrorKind::Store),
        (ErrorClass::Conflict, ErrorKind::Conflict),
        (ErrorClass::NotFound, ErrorKind::NotFound),
        (ErrorClass::Unsupported, ErrorKind::Unsupported),
        (ErrorClass::Internal, ErrorKind::Internal),
    ];

    for (class, kind) in cases {
        let err: Error = InternalError::new(class, CoreErrorOrigin::Engine, "boom").into();
        assert_eq!(err.kind, kind);
        assert_eq!(err.origin, ErrorOrigin::Engine);
        assert_eq!(err.to_string(), "boom");
    }
}

#[test]
fn unknown_backend_is_not_found() {
    let config = ConfigurationList::new()
        .with("backend", "oracle")
        .expect("backend");

    let err = connect(&config).expect_err("not compiled in");
    assert!(err.is_not_found());
    assert_eq!(err.origin, ErrorOrigin::Backend);
}

#[test]
fn missing_backend_key_is_a_usage_error() {
    let err = connect(&ConfigurationList::new()).expect_err("backend is required");
    assert_eq!(err.kind, ErrorKind::Usage);
    assert_eq!(err.origin, ErrorOrigin::Config);
}

#[test]
fn config_loads_a_named_section() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("plinth.toml");
    fs::write(
        &path,
        "[primary]\nbackend = \"sqlite\"\nfile = \"a.sqlite\"\ntimeout = 250\n",
    )
    .expect("write");

    let config = load_config(&path, "primary").expect("load");
    assert_eq!(config.get("backend"), Some("sqlite"));
    assert_eq!(config.get("timeout"), Some("250"));

    let err = load_config(&path, "replica").expect_err("no such section");
    assert_eq!(err.origin, ErrorOrigin::Config);
}

#[test]
fn stale_writers_see_a_conflict_through_the_facade() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = sqlite_config(&dir);
    let connection = connect(&config).expect("connect");
    let mut object = Object::new(&connection, notes());

    let body = ObjectFieldList::new()
        .with("body", FieldKind::Text)
        .expect("body");
    object
        .create(&body, &ValueSet::from_values(vec![Value::from("draft")]).expect("values"))
        .expect("create");

    let guard = |rev: i64| {
        ClauseList::new()
            .and(Clause::equal("notes", "id", 1i64).expect("id"))
            .and(Clause::equal("notes", "rev", rev).expect("rev"))
    };
    let text = ValueSet::from_values(vec![Value::from("final")]).expect("values");

    object.update(&body, &text, &guard(1)).expect("update");
    let err: Error = object
        .update(&body, &text, &guard(1))
        .expect_err("revision moved on")
        .into();
    assert!(err.is_conflict());
}
