//! Connection configuration: ordered key/value pairs.

mod load;


use crate::error::InternalError;
use derive_more::{Deref, IntoIterator};
use std::str::FromStr;

// re-exports
pub use load::ENV_PREFIX;

/// Key naming the engine a `Connection` binds to.
pub const BACKEND_KEY: &str = "backend";

///
/// Configuration
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Configuration {
    pub key: String,
    pub value: String,
}

///
/// ConfigurationList
///
/// Ordered key → string pairs. Keys are unique; a `Connection` only ever
/// borrows the list, so it is read-only for the life of the connection.
///

#[derive(Clone, Debug, Default, Deref, Eq, IntoIterator, PartialEq)]
#[deref(forward)]
#[into_iterator(owned, ref)]
pub struct ConfigurationList {
    entries: Vec<Configuration>,
}

impl ConfigurationList {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append a new pair. Empty or repeated keys are rejected.
    pub fn push(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), InternalError> {
        let key = key.into();
        if key.is_empty() {
            return Err(InternalError::config("configuration key must not be empty"));
        }
        if self.get(&key).is_some() {
            return Err(InternalError::config(format!(
                "configuration key '{key}' set twice"
            )));
        }
        self.entries.push(Configuration {
            key,
            value: value.into(),
        });

        Ok(())
    }

    /// Builder form of [`Self::push`].
    pub fn with(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, InternalError> {
        self.push(key, value)?;

        Ok(self)
    }

    /// Insert or overwrite a pair, keeping the original position.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();

        match self.entries.iter_mut().find(|entry| entry.key == key) {
            Some(entry) => entry.value = value,
            None => self.entries.push(Configuration { key, value }),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.value.as_str())
    }

    /// Look up a key that must be present and non-empty.
    pub fn require(&self, key: &str) -> Result<&str, InternalError> {
        match self.get(key) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(InternalError::config(format!(
                "missing configuration key '{key}'"
            ))),
        }
    }

    /// Parse an optional key, falling back to `default` when absent.
    pub fn parse_or<T>(&self, key: &str, default: T) -> Result<T, InternalError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let Some(raw) = self.get(key) else {
            return Ok(default);
        };

        raw.trim().parse().map_err(|err| {
            InternalError::config(format!("configuration key '{key}' = '{raw}': {err}"))
        })
    }
}
