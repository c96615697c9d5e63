use crate::{
    config::{BACKEND_KEY, ConfigurationList},
    db::{
        backend::{Backend, BackendFactory},
        response::ResultList,
    },
    error::{ErrorOrigin, InternalError},
    model::{BackendMetaDataList, ObjectFieldList, ObjectSchema},
    query::{ClauseList, JoinList},
    value::ValueSet,
};
use std::{
    cell::{RefCell, RefMut},
    fmt,
};

///
/// Connection
///
/// Borrowed configuration plus the backend it selects. Created empty;
/// [`Connection::setup`] binds and connects the backend exactly once and
/// every other call forwards to it.
///
/// Several `Object`s may share one connection on the same thread. The type
/// is `!Sync`; use one connection per thread.
///

pub struct Connection<'cfg> {
    config: &'cfg ConfigurationList,
    factory: &'cfg BackendFactory,
    backend: RefCell<Option<Backend>>,
}

impl<'cfg> Connection<'cfg> {
    /// Connection resolved against the built-in engine registry.
    #[must_use]
    pub fn new(config: &'cfg ConfigurationList) -> Self {
        Self::with_factory(config, BackendFactory::builtin())
    }

    #[must_use]
    pub const fn with_factory(
        config: &'cfg ConfigurationList,
        factory: &'cfg BackendFactory,
    ) -> Self {
        Self {
            config,
            factory,
            backend: RefCell::new(None),
        }
    }

    /// Instantiate and connect the backend named by the `backend` key.
    pub fn setup(&self) -> Result<(), InternalError> {
        let mut slot = self.slot()?;
        if let Some(existing) = slot.as_ref() {
            return Err(InternalError::invariant(
                ErrorOrigin::Backend,
                format!("connection already bound to backend '{}'", existing.name()),
            ));
        }

        let name = self.config.require(BACKEND_KEY)?;
        let mut backend = self.factory.create(name)?;
        backend.connect(self.config)?;
        *slot = Some(backend);

        Ok(())
    }

    /// Setup builder: a connection that is already bound.
    pub fn open(config: &'cfg ConfigurationList) -> Result<Self, InternalError> {
        let connection = Self::new(config);
        connection.setup()?;

        Ok(connection)
    }

    #[must_use]
    pub const fn config(&self) -> &'cfg ConfigurationList {
        self.config
    }

    #[must_use]
    pub fn is_setup(&self) -> bool {
        self.backend
            .try_borrow()
            .is_ok_and(|backend| backend.is_some())
    }

    /// Name of the bound backend, if any.
    #[must_use]
    pub fn backend_name(&self) -> Option<&'static str> {
        self.backend
            .try_borrow()
            .ok()
            .and_then(|backend| backend.as_ref().map(Backend::name))
    }

    /// Disconnect and shut down the bound backend, surfacing any error that
    /// `Drop` would only log.
    pub fn close(&self) -> Result<(), InternalError> {
        let mut slot = self.slot()?;
        match slot.take() {
            Some(mut backend) => backend.shutdown(),
            None => Ok(()),
        }
    }

    fn slot(&self) -> Result<RefMut<'_, Option<Backend>>, InternalError> {
        self.backend.try_borrow_mut().map_err(|_| {
            InternalError::invariant(
                ErrorOrigin::Backend,
                "connection is already in use by another call",
            )
        })
    }

    fn with_backend<R>(
        &self,
        f: impl FnOnce(&mut Backend) -> Result<R, InternalError>,
    ) -> Result<R, InternalError> {
        let mut slot = self.slot()?;
        let backend = slot.as_mut().ok_or_else(|| {
            InternalError::invariant(ErrorOrigin::Backend, "connection has not been set up")
        })?;

        f(backend)
    }

    // ------------------------------------------------------------------
    // Forwarding
    // ------------------------------------------------------------------

    pub fn create(
        &self,
        schema: &ObjectSchema,
        fields: &ObjectFieldList,
        values: &ValueSet,
    ) -> Result<Option<BackendMetaDataList>, InternalError> {
        self.with_backend(|backend| backend.create(schema, fields, values))
    }

    pub fn read(
        &self,
        schema: &ObjectSchema,
        metadata: Option<&BackendMetaDataList>,
        joins: &JoinList,
        clauses: &ClauseList,
    ) -> Result<ResultList, InternalError> {
        self.with_backend(|backend| backend.read(schema, metadata, joins, clauses))
    }

    pub fn update(
        &self,
        schema: &ObjectSchema,
        metadata: Option<&BackendMetaDataList>,
        fields: &ObjectFieldList,
        values: &ValueSet,
        clauses: &ClauseList,
    ) -> Result<Option<BackendMetaDataList>, InternalError> {
        self.with_backend(|backend| backend.update(schema, metadata, fields, values, clauses))
    }

    pub fn delete(
        &self,
        schema: &ObjectSchema,
        metadata: Option<&BackendMetaDataList>,
        clauses: &ClauseList,
    ) -> Result<(), InternalError> {
        self.with_backend(|backend| backend.delete(schema, metadata, clauses))
    }

    pub fn count(
        &self,
        schema: &ObjectSchema,
        joins: &JoinList,
        clauses: &ClauseList,
    ) -> Result<u64, InternalError> {
        self.with_backend(|backend| backend.count(schema, joins, clauses))
    }

    pub fn txn_begin(&self) -> Result<(), InternalError> {
        self.with_backend(Backend::txn_begin)
    }

    pub fn txn_commit(&self) -> Result<(), InternalError> {
        self.with_backend(Backend::txn_commit)
    }

    pub fn txn_rollback(&self) -> Result<(), InternalError> {
        self.with_backend(Backend::txn_rollback)
    }
}

impl fmt::Debug for Connection<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("backend", &self.backend_name())
            .finish_non_exhaustive()
    }
}
