//! Embedded relational engine over `rusqlite`.
//!
//! Configuration keys: `file` (path or `:memory:`), `timeout` (lock-wait
//! budget in milliseconds) and `usleep` (longest single wait in
//! microseconds).

mod busy;


use crate::{
    config::ConfigurationList,
    db::{
        backend::{BackendEngine, EngineDescriptor},
        response::ResultList,
        revision,
    },
    engine::sql::{
        CompiledStatement, ParamBinder, RawCell, RawRowCursor, bind_params, single_count,
        statement,
    },
    error::{ErrorOrigin, InternalError},
    model::{BackendMetaDataList, ObjectFieldList, ObjectSchema},
    query::{ClauseList, JoinList},
    value::ValueSet,
};
use rusqlite::{
    Connection, Statement,
    types::{Null, ValueRef},
};
use std::time::Duration;

// re-exports
pub use busy::{DEFAULT_SLICE, DEFAULT_TIMEOUT, broadcast};

/// Configuration name of this engine.
pub const ENGINE_NAME: &str = "sqlite";

/// Registry entry for the factory.
#[must_use]
pub fn descriptor() -> EngineDescriptor {
    EngineDescriptor::new(ENGINE_NAME, || Box::new(SqliteEngine::new())).with_teardown(broadcast)
}

///
/// SqliteEngine
///

pub struct SqliteEngine {
    conn: Option<Connection>,
    timeout: Duration,
    slice: Duration,
}

impl SqliteEngine {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            conn: None,
            timeout: DEFAULT_TIMEOUT,
            slice: DEFAULT_SLICE,
        }
    }

    fn connection(&self) -> Result<&Connection, InternalError> {
        self.conn.as_ref().ok_or_else(|| {
            InternalError::invariant(ErrorOrigin::Engine, "sqlite connection is not open")
        })
    }

    /// Run a statement that returns no rows; yields the affected-row count.
    fn execute(&self, stmt: &CompiledStatement<'_>) -> Result<u64, InternalError> {
        let conn = self.connection()?;
        busy::arm(self.timeout, self.slice);

        let result = run_execute(conn, stmt);
        busy::broadcast();

        result
    }

    /// Step a query to completion and copy its rows out.
    fn query(&self, stmt: &CompiledStatement<'_>) -> Result<Vec<Vec<RawCell>>, InternalError> {
        let conn = self.connection()?;
        busy::arm(self.timeout, self.slice);

        let result = run_query(conn, stmt);
        busy::broadcast();

        result
    }

    fn batch(&self, sql: &str) -> Result<(), InternalError> {
        let conn = self.connection()?;
        busy::arm(self.timeout, self.slice);

        let result = conn.execute_batch(sql).map_err(InternalError::from);
        busy::broadcast();
        tracing::debug!(sql, ok = result.is_ok(), "sqlite transaction control");

        result
    }
}

impl Default for SqliteEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendEngine for SqliteEngine {
    fn connect(&mut self, config: &ConfigurationList) -> Result<(), InternalError> {
        let file = config.require("file")?;
        let timeout_ms: u64 = config.parse_or("timeout", 5000)?;
        let slice_us: u64 = config.parse_or("usleep", 10_000)?;
        if slice_us == 0 {
            return Err(InternalError::config("usleep must be greater than zero"));
        }

        let conn = Connection::open(file)?;
        conn.busy_handler(Some(busy::busy_wait))?;

        self.timeout = Duration::from_millis(timeout_ms);
        self.slice = Duration::from_micros(slice_us);
        self.conn = Some(conn);
        tracing::debug!(file, timeout_ms, slice_us, "sqlite connection opened");

        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), InternalError> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        let result = conn.close().map_err(|(_, err)| InternalError::from(err));
        busy::broadcast();

        result
    }

    fn create(
        &mut self,
        schema: &ObjectSchema,
        fields: &ObjectFieldList,
        values: &ValueSet,
    ) -> Result<Option<BackendMetaDataList>, InternalError> {
        let stmt = statement::insert(schema, fields, values)?;
        let affected = self.execute(&stmt)?;
        if affected == 0 {
            return Err(InternalError::engine(format!(
                "insert into '{}' affected no rows",
                schema.table()
            )));
        }

        Ok(None)
    }

    fn read(
        &mut self,
        schema: &ObjectSchema,
        _metadata: Option<&BackendMetaDataList>,
        joins: &JoinList,
        clauses: &ClauseList,
    ) -> Result<ResultList, InternalError> {
        let stmt = statement::select(schema, joins, clauses)?;
        let rows = self.query(&stmt)?;
        let size = rows.len();
        let cursor = RawRowCursor::new(schema.fields().clone(), rows);

        Ok(ResultList::lazy(Box::new(cursor), size))
    }

    fn update(
        &mut self,
        schema: &ObjectSchema,
        _metadata: Option<&BackendMetaDataList>,
        fields: &ObjectFieldList,
        values: &ValueSet,
        clauses: &ClauseList,
    ) -> Result<Option<BackendMetaDataList>, InternalError> {
        let stmt = statement::update(schema, fields, values, clauses)?;
        let affected = self.execute(&stmt)?;
        revision::require_affected(schema, "update", affected)?;

        Ok(None)
    }

    fn delete(
        &mut self,
        schema: &ObjectSchema,
        _metadata: Option<&BackendMetaDataList>,
        clauses: &ClauseList,
    ) -> Result<(), InternalError> {
        let stmt = statement::delete(schema, clauses)?;
        let affected = self.execute(&stmt)?;

        revision::require_affected(schema, "delete", affected)
    }

    fn count(
        &mut self,
        schema: &ObjectSchema,
        joins: &JoinList,
        clauses: &ClauseList,
    ) -> Result<u64, InternalError> {
        let stmt = statement::count(schema, joins, clauses)?;
        let rows = self.query(&stmt)?;

        single_count(&rows)
    }

    fn txn_begin(&mut self) -> Result<(), InternalError> {
        self.batch("BEGIN IMMEDIATE")
    }

    fn txn_commit(&mut self) -> Result<(), InternalError> {
        self.batch("COMMIT")
    }

    fn txn_rollback(&mut self) -> Result<(), InternalError> {
        self.batch("ROLLBACK")
    }
}

// ----------------------------------------------------------------------
// Statement execution
// ----------------------------------------------------------------------
//
// Both helpers finalize their prepared statement before returning, so the
// caller's broadcast always follows finalization.

fn prepare<'c>(
    conn: &'c Connection,
    stmt: &CompiledStatement<'_>,
) -> Result<Statement<'c>, InternalError> {
    let mut prepared = conn.prepare(stmt.sql())?;
    bind_params(&mut SqliteBinder { stmt: &mut prepared }, &stmt.params)?;

    Ok(prepared)
}

fn run_execute(conn: &Connection, stmt: &CompiledStatement<'_>) -> Result<u64, InternalError> {
    let mut prepared = prepare(conn, stmt)?;
    let affected = prepared.raw_execute()?;

    u64::try_from(affected).map_err(|_| InternalError::engine("affected-row count overflow"))
}

fn run_query(
    conn: &Connection,
    stmt: &CompiledStatement<'_>,
) -> Result<Vec<Vec<RawCell>>, InternalError> {
    let mut prepared = prepare(conn, stmt)?;
    let columns = prepared.column_count();
    let mut rows = prepared.raw_query();
    let mut out = Vec::new();

    while let Some(row) = rows.next()? {
        let mut cells = Vec::with_capacity(columns);
        for column in 0..columns {
            cells.push(raw_cell(row.get_ref(column)?));
        }
        out.push(cells);
    }

    Ok(out)
}

fn raw_cell(value: ValueRef<'_>) -> RawCell {
    match value {
        ValueRef::Null => RawCell::Null,
        ValueRef::Integer(v) => RawCell::Integer(v),
        ValueRef::Real(v) => RawCell::Real(v),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => RawCell::Bytes(bytes.to_vec()),
    }
}

///
/// SqliteBinder
///

struct SqliteBinder<'s, 'c> {
    stmt: &'s mut Statement<'c>,
}

impl ParamBinder for SqliteBinder<'_, '_> {
    fn bind_null(&mut self, index: usize) -> Result<(), InternalError> {
        Ok(self.stmt.raw_bind_parameter(index, Null)?)
    }

    fn bind_i32(&mut self, index: usize, value: i32) -> Result<(), InternalError> {
        Ok(self.stmt.raw_bind_parameter(index, value)?)
    }

    fn bind_u32(&mut self, index: usize, value: u32) -> Result<(), InternalError> {
        Ok(self.stmt.raw_bind_parameter(index, i64::from(value))?)
    }

    fn bind_i64(&mut self, index: usize, value: i64) -> Result<(), InternalError> {
        Ok(self.stmt.raw_bind_parameter(index, value)?)
    }

    fn bind_u64(&mut self, index: usize, value: u64) -> Result<(), InternalError> {
        let value = i64::try_from(value).map_err(|_| {
            InternalError::engine(format!("parameter {index}: {value} exceeds sqlite integer range"))
        })?;

        Ok(self.stmt.raw_bind_parameter(index, value)?)
    }

    fn bind_text(&mut self, index: usize, value: &str) -> Result<(), InternalError> {
        Ok(self.stmt.raw_bind_parameter(index, value)?)
    }
}
