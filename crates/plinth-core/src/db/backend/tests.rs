use crate::{
    config::ConfigurationList,
    db::backend::{BackendEngine, BackendFactory, BackendState, EngineDescriptor},
    error::{ErrorClass, InternalError},
    model::{FieldKind, ObjectFieldList, ObjectSchema},
    query::{ClauseList, JoinList},
};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

type CallLog = Arc<Mutex<Vec<&'static str>>>;

///
/// RecordingEngine
/// Logs every call; only connect, disconnect and count are provided.
///

struct RecordingEngine {
    log: CallLog,
}

impl RecordingEngine {
    fn record(&self, call: &'static str) {
        self.log.lock().expect("log").push(call);
    }
}

impl BackendEngine for RecordingEngine {
    fn initialize(&mut self) -> Result<(), InternalError> {
        self.record("initialize");
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), InternalError> {
        self.record("shutdown");
        Ok(())
    }

    fn connect(&mut self, _config: &ConfigurationList) -> Result<(), InternalError> {
        self.record("connect");
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), InternalError> {
        self.record("disconnect");
        Ok(())
    }

    fn count(
        &mut self,
        _schema: &ObjectSchema,
        _joins: &JoinList,
        _clauses: &ClauseList,
    ) -> Result<u64, InternalError> {
        self.record("count");
        Ok(42)
    }
}

fn factory(log: &CallLog) -> BackendFactory {
    let log = Arc::clone(log);

    BackendFactory::new()
        .with(EngineDescriptor::new("recording", move || {
            Box::new(RecordingEngine {
                log: Arc::clone(&log),
            })
        }))
        .expect("register")
}

fn schema() -> ObjectSchema {
    let fields = ObjectFieldList::new()
        .with("id", FieldKind::PrimaryKey)
        .expect("id");
    ObjectSchema::new("things", "id", fields).expect("schema")
}

fn calls(log: &CallLog) -> Vec<&'static str> {
    log.lock().expect("log").clone()
}

#[test]
fn create_initializes_immediately() {
    let log = CallLog::default();
    let backend = factory(&log).create("recording").expect("create");

    assert_eq!(backend.name(), "recording");
    assert_eq!(backend.state(), BackendState::Initialized);
    assert_eq!(calls(&log), vec!["initialize"]);
}

#[test]
fn unknown_engine_is_not_found() {
    let log = CallLog::default();
    let err = factory(&log).create("oracle").expect_err("unknown");

    assert_eq!(err.class, ErrorClass::NotFound);
    assert!(err.message.contains("oracle"));
}

#[test]
fn duplicate_registration_rejected() {
    let log = CallLog::default();
    let mut factory = factory(&log);
    let err = factory
        .register(EngineDescriptor::new("recording", || unreachable!()))
        .expect_err("duplicate");

    assert_eq!(err.class, ErrorClass::InvariantViolation);
    assert_eq!(factory.names().collect::<Vec<_>>(), vec!["recording"]);
}

#[test]
fn operations_before_connect_fail_without_touching_engine() {
    let log = CallLog::default();
    let mut backend = factory(&log).create("recording").expect("create");

    let err = backend
        .count(&schema(), &JoinList::new(), &ClauseList::new())
        .expect_err("not connected");
    assert_eq!(err.class, ErrorClass::InvariantViolation);
    assert!(backend.disconnect().is_err());
    assert!(backend.initialize().is_err());

    assert_eq!(calls(&log), vec!["initialize"]);
}

#[test]
fn lifecycle_runs_in_order() {
    let log = CallLog::default();
    let mut backend = factory(&log).create("recording").expect("create");
    let config = ConfigurationList::new();

    backend.connect(&config).expect("connect");
    assert!(backend.connect(&config).is_err());
    assert_eq!(
        backend
            .count(&schema(), &JoinList::new(), &ClauseList::new())
            .expect("count"),
        42
    );
    backend.disconnect().expect("disconnect");
    backend.connect(&config).expect("reconnect");
    backend.shutdown().expect("shutdown");

    assert_eq!(backend.state(), BackendState::ShutDown);
    assert!(backend.shutdown().is_err());
    assert!(backend.connect(&config).is_err());
    assert_eq!(
        calls(&log),
        vec![
            "initialize",
            "connect",
            "count",
            "disconnect",
            "connect",
            "disconnect",
            "shutdown"
        ]
    );
}

#[test]
fn missing_operations_are_unsupported() {
    let log = CallLog::default();
    let mut backend = factory(&log).create("recording").expect("create");
    backend.connect(&ConfigurationList::new()).expect("connect");

    let err = backend
        .delete(&schema(), None, &ClauseList::new())
        .expect_err("delete");
    assert_eq!(err.class, ErrorClass::Unsupported);
    assert!(backend.txn_begin().expect_err("txn").is_unsupported());
}

#[test]
fn drop_disconnects_connected_backend() {
    let log = CallLog::default();
    {
        let mut backend = factory(&log).create("recording").expect("create");
        backend.connect(&ConfigurationList::new()).expect("connect");
    }

    assert_eq!(calls(&log), vec!["initialize", "connect", "disconnect"]);
}

static TEARDOWNS: AtomicUsize = AtomicUsize::new(0);

fn count_teardown() {
    TEARDOWNS.fetch_add(1, Ordering::SeqCst);
}

#[test]
fn factory_shutdown_tears_down_unused_engines() {
    let factory = BackendFactory::new()
        .with(EngineDescriptor::new("a", || unreachable!()).with_teardown(count_teardown))
        .expect("a")
        .with(EngineDescriptor::new("b", || unreachable!()).with_teardown(count_teardown))
        .expect("b");

    factory.shutdown();
    assert_eq!(TEARDOWNS.load(Ordering::SeqCst), 2);
}

#[test]
fn builtin_lists_compiled_engines() {
    let names: Vec<_> = BackendFactory::builtin().names().collect();

    #[cfg(feature = "sqlite")]
    assert!(names.contains(&"sqlite"));
    #[cfg(feature = "mysql")]
    assert!(names.contains(&"mysql"));
    #[cfg(feature = "couchdb")]
    assert!(names.contains(&"couchdb"));
    assert!(names.len() <= 3);
}
