//! Client/server relational engine over the synchronous `mysql` driver.
//!
//! Configuration keys: `host` (required), `port` (default 3306), `user`,
//! `pass`, `db` and `timeout` (connect, read and write timeout in seconds,
//! default 30).


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
use mysql::{
    Conn, OptsBuilder, Params, Row, Value as WireValue, consts::CapabilityFlags, prelude::Queryable,
};
use std::time::Duration;

/// Configuration name of this engine.
pub const ENGINE_NAME: &str = "mysql";

pub const DEFAULT_PORT: u16 = 3306;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Registry entry for the factory.
#[must_use]
pub fn descriptor() -> EngineDescriptor {
    EngineDescriptor::new(ENGINE_NAME, || Box::new(MysqlEngine::new()))
}

/// Driver options from a configuration list. Affected-row counts report
/// matched rows, so an update that rewrites identical values still counts.
pub fn options(config: &ConfigurationList) -> Result<OptsBuilder, InternalError> {
    let host = config.require("host")?;
    let port: u16 = config.parse_or("port", DEFAULT_PORT)?;
    let timeout = Duration::from_secs(config.parse_or("timeout", DEFAULT_TIMEOUT_SECS)?);

    Ok(OptsBuilder::new()
        .ip_or_hostname(Some(host))
        .tcp_port(port)
        .user(config.get("user"))
        .pass(config.get("pass"))
        .db_name(config.get("db"))
        .additional_capabilities(CapabilityFlags::CLIENT_FOUND_ROWS)
        .tcp_connect_timeout(Some(timeout))
        .read_timeout(Some(timeout))
        .write_timeout(Some(timeout)))
}

///
/// MysqlEngine
///

#[derive(Default)]
pub struct MysqlEngine {
    conn: Option<Conn>,
}

impl MysqlEngine {
    #[must_use]
    pub const fn new() -> Self {
        Self { conn: None }
    }

    fn connection(&mut self) -> Result<&mut Conn, InternalError> {
        self.conn.as_mut().ok_or_else(|| {
            InternalError::invariant(ErrorOrigin::Engine, "mysql connection is not open")
        })
    }

    fn execute(&mut self, stmt: &CompiledStatement<'_>) -> Result<u64, InternalError> {
        let params = wire_params(stmt)?;
        let conn = self.connection()?;
        conn.exec_drop(stmt.sql(), params)?;

        Ok(conn.affected_rows())
    }

    fn query(&mut self, stmt: &CompiledStatement<'_>) -> Result<Vec<Vec<RawCell>>, InternalError> {
        let params = wire_params(stmt)?;
        let rows: Vec<Row> = self.connection()?.exec(stmt.sql(), params)?;

        Ok(rows
            .into_iter()
            .map(|row| row.unwrap_raw().into_iter().map(raw_cell).collect())
            .collect())
    }

    fn control(&mut self, sql: &str) -> Result<(), InternalError> {
        self.connection()?.query_drop(sql)?;
        tracing::debug!(sql, "mysql transaction control");

        Ok(())
    }
}

impl BackendEngine for MysqlEngine {
    fn connect(&mut self, config: &ConfigurationList) -> Result<(), InternalError> {
        let opts = options(config)?;
        let conn = Conn::new(opts)?;
        self.conn = Some(conn);
        tracing::debug!(host = config.get("host"), db = config.get("db"), "mysql connected");

        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), InternalError> {
        if self.conn.take().is_some() {
            tracing::debug!("mysql disconnected");
        }

        Ok(())
    }

    fn create(
        &mut self,
        schema: &ObjectSchema,
        fields: &ObjectFieldList,
        values: &ValueSet,
    ) -> Result<Option<BackendMetaDataList>, InternalError> {
        let stmt = statement::insert(schema, fields, values)?;
        if self.execute(&stmt)? == 0 {
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

        Ok(ResultList::lazy(
            Box::new(RawRowCursor::new(schema.fields().clone(), rows)),
            size,
        ))
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

        single_count(&self.query(&stmt)?)
    }

    fn txn_begin(&mut self) -> Result<(), InternalError> {
        self.control("START TRANSACTION")
    }

    fn txn_commit(&mut self) -> Result<(), InternalError> {
        self.control("COMMIT")
    }

    fn txn_rollback(&mut self) -> Result<(), InternalError> {
        self.control("ROLLBACK")
    }
}

// ----------------------------------------------------------------------
// Wire conversion
// ----------------------------------------------------------------------

fn wire_params(stmt: &CompiledStatement<'_>) -> Result<Params, InternalError> {
    if stmt.params.is_empty() {
        return Ok(Params::Empty);
    }

    let mut binder = WireBinder {
        values: vec![WireValue::NULL; stmt.params.len()],
    };
    bind_params(&mut binder, &stmt.params)?;

    Ok(Params::Positional(binder.values))
}

/// Driver cell to engine-neutral cell; temporal values arrive as text.
pub(crate) fn raw_cell(value: Option<WireValue>) -> RawCell {
    match value {
        None | Some(WireValue::NULL) => RawCell::Null,
        Some(WireValue::Int(v)) => RawCell::Integer(v),
        Some(WireValue::UInt(v)) => RawCell::Unsigned(v),
        Some(WireValue::Float(v)) => RawCell::Real(f64::from(v)),
        Some(WireValue::Double(v)) => RawCell::Real(v),
        Some(WireValue::Bytes(bytes)) => RawCell::Bytes(bytes),
        Some(WireValue::Date(y, mo, d, h, mi, s, us)) => RawCell::Bytes(
            format!("{y:04}-{mo:02}-{d:02} {h:02}:{mi:02}:{s:02}.{us:06}").into_bytes(),
        ),
        Some(WireValue::Time(negative, days, h, mi, s, us)) => {
            let sign = if negative { "-" } else { "" };
            let hours = days * 24 + u32::from(h);
            RawCell::Bytes(format!("{sign}{hours:02}:{mi:02}:{s:02}.{us:06}").into_bytes())
        }
    }
}

///
/// WireBinder
///

struct WireBinder {
    values: Vec<WireValue>,
}

impl WireBinder {
    fn slot(&mut self, index: usize) -> Result<&mut WireValue, InternalError> {
        index
            .checked_sub(1)
            .and_then(|i| self.values.get_mut(i))
            .ok_or_else(|| InternalError::engine(format!("parameter index {index} out of range")))
    }

    fn put(&mut self, index: usize, value: WireValue) -> Result<(), InternalError> {
        *self.slot(index)? = value;

        Ok(())
    }
}

impl ParamBinder for WireBinder {
    fn bind_null(&mut self, index: usize) -> Result<(), InternalError> {
        self.put(index, WireValue::NULL)
    }

    fn bind_i32(&mut self, index: usize, value: i32) -> Result<(), InternalError> {
        self.put(index, WireValue::Int(i64::from(value)))
    }

    fn bind_u32(&mut self, index: usize, value: u32) -> Result<(), InternalError> {
        self.put(index, WireValue::UInt(u64::from(value)))
    }

    fn bind_i64(&mut self, index: usize, value: i64) -> Result<(), InternalError> {
        self.put(index, WireValue::Int(value))
    }

    fn bind_u64(&mut self, index: usize, value: u64) -> Result<(), InternalError> {
        self.put(index, WireValue::UInt(value))
    }

    fn bind_text(&mut self, index: usize, value: &str) -> Result<(), InternalError> {
        self.put(index, WireValue::Bytes(value.as_bytes().to_vec()))
    }
}
