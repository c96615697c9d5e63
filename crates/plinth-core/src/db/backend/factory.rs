use crate::{
    db::backend::{Backend, BackendEngine},
    error::{ErrorClass, ErrorOrigin, InternalError},
};
use std::{fmt, sync::OnceLock};
use thiserror::Error as ThisError;

///
/// BackendFactoryError
///

#[derive(Debug, ThisError)]
pub enum BackendFactoryError {
    #[error("backend engine '{0}' is not compiled in")]
    UnknownEngine(String),

    #[error("backend engine '{0}' already registered")]
    AlreadyRegistered(&'static str),
}

impl BackendFactoryError {
    pub(crate) const fn class(&self) -> ErrorClass {
        match self {
            Self::UnknownEngine(_) => ErrorClass::NotFound,
            Self::AlreadyRegistered(_) => ErrorClass::InvariantViolation,
        }
    }
}

impl From<BackendFactoryError> for InternalError {
    fn from(err: BackendFactoryError) -> Self {
        Self::new(err.class(), ErrorOrigin::Backend, err.to_string())
    }
}

type Constructor = Box<dyn Fn() -> Box<dyn BackendEngine> + Send + Sync>;

///
/// EngineDescriptor
///
/// Registered engine: its configuration name, a constructor for fresh
/// instances and an optional process-level teardown hook.
///

pub struct EngineDescriptor {
    name: &'static str,
    construct: Constructor,
    teardown: Option<fn()>,
}

impl EngineDescriptor {
    pub fn new<F>(name: &'static str, construct: F) -> Self
    where
        F: Fn() -> Box<dyn BackendEngine> + Send + Sync + 'static,
    {
        Self {
            name,
            construct: Box::new(construct),
            teardown: None,
        }
    }

    #[must_use]
    pub fn with_teardown(mut self, teardown: fn()) -> Self {
        self.teardown = Some(teardown);
        self
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for EngineDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineDescriptor")
            .field("name", &self.name)
            .field("teardown", &self.teardown.is_some())
            .finish_non_exhaustive()
    }
}

///
/// BackendFactory
///
/// Name → engine registry. `create` instantiates and initializes a backend;
/// `shutdown` runs the teardown of every registered engine, used or not.
///

#[derive(Debug, Default)]
pub struct BackendFactory {
    engines: Vec<EngineDescriptor>,
}

impl BackendFactory {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            engines: Vec::new(),
        }
    }

    /// Process-wide registry of every engine compiled into this build.
    pub fn builtin() -> &'static Self {
        static BUILTIN: OnceLock<BackendFactory> = OnceLock::new();

        BUILTIN.get_or_init(|| {
            let compiled: &[fn() -> EngineDescriptor] = &[
                #[cfg(feature = "sqlite")]
                crate::engine::sqlite::descriptor,
                #[cfg(feature = "mysql")]
                crate::engine::mysql::descriptor,
                #[cfg(feature = "couchdb")]
                crate::engine::couchdb::descriptor,
            ];

            Self {
                engines: compiled.iter().map(|descriptor| descriptor()).collect(),
            }
        })
    }

    pub fn register(&mut self, descriptor: EngineDescriptor) -> Result<(), InternalError> {
        if self.descriptor(descriptor.name).is_some() {
            return Err(BackendFactoryError::AlreadyRegistered(descriptor.name).into());
        }
        self.engines.push(descriptor);

        Ok(())
    }

    /// Builder form of [`Self::register`].
    pub fn with(mut self, descriptor: EngineDescriptor) -> Result<Self, InternalError> {
        self.register(descriptor)?;

        Ok(self)
    }

    /// Registered engine names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.engines.iter().map(|engine| engine.name)
    }

    fn descriptor(&self, name: &str) -> Option<&EngineDescriptor> {
        self.engines.iter().find(|engine| engine.name == name)
    }

    /// Instantiate the engine registered as `name` and run its `initialize`.
    pub fn create(&self, name: &str) -> Result<Backend, InternalError> {
        let descriptor = self
            .descriptor(name)
            .ok_or_else(|| BackendFactoryError::UnknownEngine(name.to_string()))?;

        let mut backend = Backend::new(descriptor.name, (descriptor.construct)());
        backend.initialize()?;
        tracing::debug!(backend = descriptor.name, "backend initialized");

        Ok(backend)
    }

    /// Run every engine's process-level teardown.
    pub fn shutdown(&self) {
        for engine in &self.engines {
            if let Some(teardown) = engine.teardown {
                teardown();
            }
            tracing::debug!(backend = engine.name, "backend engine shut down");
        }
    }
}
