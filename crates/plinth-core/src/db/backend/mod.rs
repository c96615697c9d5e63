//! Engine contract and lifecycle-checked dispatch.

mod factory;

#[cfg(test)]
mod tests;

use crate::{
    config::ConfigurationList,
    db::response::ResultList,
    error::{ErrorOrigin, InternalError},
    model::{BackendMetaDataList, ObjectFieldList, ObjectSchema},
    query::{ClauseList, JoinList},
    value::ValueSet,
};
use std::fmt;

// re-exports
pub use factory::{BackendFactory, BackendFactoryError, EngineDescriptor};

///
/// BackendEngine
///
/// One storage engine instance with its private state. Operations an engine
/// does not provide keep the default body, which reports `Unsupported`
/// without side effects.
///
/// `create` and `update` return fresh engine annotations (such as a new
/// document revision token) for the caller's object, or `None` when the
/// engine has nothing to report.
///

pub trait BackendEngine: Send {
    fn initialize(&mut self) -> Result<(), InternalError> {
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), InternalError> {
        Ok(())
    }

    fn connect(&mut self, config: &ConfigurationList) -> Result<(), InternalError>;

    fn disconnect(&mut self) -> Result<(), InternalError>;

    fn create(
        &mut self,
        schema: &ObjectSchema,
        _fields: &ObjectFieldList,
        _values: &ValueSet,
    ) -> Result<Option<BackendMetaDataList>, InternalError> {
        Err(unsupported("create", schema))
    }

    fn read(
        &mut self,
        schema: &ObjectSchema,
        _metadata: Option<&BackendMetaDataList>,
        _joins: &JoinList,
        _clauses: &ClauseList,
    ) -> Result<ResultList, InternalError> {
        Err(unsupported("read", schema))
    }

    fn update(
        &mut self,
        schema: &ObjectSchema,
        _metadata: Option<&BackendMetaDataList>,
        _fields: &ObjectFieldList,
        _values: &ValueSet,
        _clauses: &ClauseList,
    ) -> Result<Option<BackendMetaDataList>, InternalError> {
        Err(unsupported("update", schema))
    }

    fn delete(
        &mut self,
        schema: &ObjectSchema,
        _metadata: Option<&BackendMetaDataList>,
        _clauses: &ClauseList,
    ) -> Result<(), InternalError> {
        Err(unsupported("delete", schema))
    }

    fn count(
        &mut self,
        schema: &ObjectSchema,
        _joins: &JoinList,
        _clauses: &ClauseList,
    ) -> Result<u64, InternalError> {
        Err(unsupported("count", schema))
    }

    fn txn_begin(&mut self) -> Result<(), InternalError> {
        Err(InternalError::unsupported(
            ErrorOrigin::Backend,
            "transactions are not supported by this engine",
        ))
    }

    fn txn_commit(&mut self) -> Result<(), InternalError> {
        Err(InternalError::unsupported(
            ErrorOrigin::Backend,
            "transactions are not supported by this engine",
        ))
    }

    fn txn_rollback(&mut self) -> Result<(), InternalError> {
        Err(InternalError::unsupported(
            ErrorOrigin::Backend,
            "transactions are not supported by this engine",
        ))
    }
}

fn unsupported(op: &str, schema: &ObjectSchema) -> InternalError {
    InternalError::unsupported(
        ErrorOrigin::Backend,
        format!("{op} on '{}' is not supported by this engine", schema.table()),
    )
}

///
/// BackendState
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BackendState {
    Unbound,
    Initialized,
    Connected,
    Disconnected,
    ShutDown,
}

impl fmt::Display for BackendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unbound => "unbound",
            Self::Initialized => "initialized",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::ShutDown => "shut down",
        };
        write!(f, "{label}")
    }
}

///
/// Backend
///
/// Named engine plus its lifecycle state. Only [`BackendFactory`] builds
/// one. Every call checks the state before the engine is touched, so an
/// out-of-order call fails with no side effects.
///

pub struct Backend {
    name: &'static str,
    engine: Box<dyn BackendEngine>,
    state: BackendState,
}

impl Backend {
    pub(crate) fn new(name: &'static str, engine: Box<dyn BackendEngine>) -> Self {
        Self {
            name,
            engine,
            state: BackendState::Unbound,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub const fn state(&self) -> BackendState {
        self.state
    }

    fn require(&self, op: &str, allowed: &[BackendState]) -> Result<(), InternalError> {
        if allowed.contains(&self.state) {
            return Ok(());
        }

        Err(InternalError::invariant(
            ErrorOrigin::Backend,
            format!(
                "{op} called on backend '{}' while {}",
                self.name, self.state
            ),
        ))
    }

    fn require_connected(&self, op: &str) -> Result<(), InternalError> {
        self.require(op, &[BackendState::Connected])
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    pub fn initialize(&mut self) -> Result<(), InternalError> {
        self.require("initialize", &[BackendState::Unbound])?;
        self.engine.initialize()?;
        self.state = BackendState::Initialized;

        Ok(())
    }

    pub fn connect(&mut self, config: &ConfigurationList) -> Result<(), InternalError> {
        self.require(
            "connect",
            &[BackendState::Initialized, BackendState::Disconnected],
        )?;
        self.engine.connect(config)?;
        self.state = BackendState::Connected;
        tracing::debug!(backend = self.name, "backend connected");

        Ok(())
    }

    pub fn disconnect(&mut self) -> Result<(), InternalError> {
        self.require_connected("disconnect")?;
        // the handle is unusable afterwards even if the engine complains
        self.state = BackendState::Disconnected;
        self.engine.disconnect()?;
        tracing::debug!(backend = self.name, "backend disconnected");

        Ok(())
    }

    pub fn shutdown(&mut self) -> Result<(), InternalError> {
        self.require(
            "shutdown",
            &[
                BackendState::Unbound,
                BackendState::Initialized,
                BackendState::Connected,
                BackendState::Disconnected,
            ],
        )?;
        if self.state == BackendState::Connected {
            self.disconnect()?;
        }
        self.state = BackendState::ShutDown;
        self.engine.shutdown()
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    pub fn create(
        &mut self,
        schema: &ObjectSchema,
        fields: &ObjectFieldList,
        values: &ValueSet,
    ) -> Result<Option<BackendMetaDataList>, InternalError> {
        self.require_connected("create")?;
        self.engine.create(schema, fields, values)
    }

    pub fn read(
        &mut self,
        schema: &ObjectSchema,
        metadata: Option<&BackendMetaDataList>,
        joins: &JoinList,
        clauses: &ClauseList,
    ) -> Result<ResultList, InternalError> {
        self.require_connected("read")?;
        self.engine.read(schema, metadata, joins, clauses)
    }

    pub fn update(
        &mut self,
        schema: &ObjectSchema,
        metadata: Option<&BackendMetaDataList>,
        fields: &ObjectFieldList,
        values: &ValueSet,
        clauses: &ClauseList,
    ) -> Result<Option<BackendMetaDataList>, InternalError> {
        self.require_connected("update")?;
        self.engine.update(schema, metadata, fields, values, clauses)
    }

    pub fn delete(
        &mut self,
        schema: &ObjectSchema,
        metadata: Option<&BackendMetaDataList>,
        clauses: &ClauseList,
    ) -> Result<(), InternalError> {
        self.require_connected("delete")?;
        self.engine.delete(schema, metadata, clauses)
    }

    pub fn count(
        &mut self,
        schema: &ObjectSchema,
        joins: &JoinList,
        clauses: &ClauseList,
    ) -> Result<u64, InternalError> {
        self.require_connected("count")?;
        self.engine.count(schema, joins, clauses)
    }

    pub fn txn_begin(&mut self) -> Result<(), InternalError> {
        self.require_connected("txn_begin")?;
        self.engine.txn_begin()
    }

    pub fn txn_commit(&mut self) -> Result<(), InternalError> {
        self.require_connected("txn_commit")?;
        self.engine.txn_commit()
    }

    pub fn txn_rollback(&mut self) -> Result<(), InternalError> {
        self.require_connected("txn_rollback")?;
        self.engine.txn_rollback()
    }
}

impl Drop for Backend {
    fn drop(&mut self) {
        if self.state == BackendState::Connected
            && let Err(err) = self.disconnect()
        {
            tracing::warn!(backend = self.name, error = %err, "disconnect on drop failed");
        }
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("name", &self.name)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
