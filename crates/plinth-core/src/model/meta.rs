use crate::{
    error::{ErrorOrigin, InternalError},
    value::Value,
};
use derive_more::{Deref, IntoIterator};

/// Metadata name under which the document store keeps its revision token.
pub const REVISION_TOKEN: &str = "_rev";

///
/// BackendMetaData
/// One named engine annotation attached to an object or a result row.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BackendMetaData {
    pub name: String,
    pub value: Value,
}

impl BackendMetaData {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

///
/// BackendMetaDataList
/// Named annotations with unique names.
///

#[derive(Clone, Debug, Default, Deref, Eq, IntoIterator, PartialEq)]
#[deref(forward)]
#[into_iterator(owned, ref)]
pub struct BackendMetaDataList {
    entries: Vec<BackendMetaData>,
}

impl BackendMetaDataList {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add a new annotation; a duplicate name is rejected.
    pub fn insert(&mut self, meta: BackendMetaData) -> Result<(), InternalError> {
        if self.get(&meta.name).is_some() {
            return Err(InternalError::invariant(
                ErrorOrigin::Backend,
                format!("metadata '{}' already present", meta.name),
            ));
        }
        self.entries.push(meta);

        Ok(())
    }

    /// Insert or overwrite an annotation.
    pub fn replace(&mut self, meta: BackendMetaData) {
        match self.entries.iter_mut().find(|entry| entry.name == meta.name) {
            Some(entry) => entry.value = meta.value,
            None => self.entries.push(meta),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| &entry.value)
    }

    /// Single-entry list holding a document revision token.
    #[must_use]
    pub fn revision_token(token: impl Into<String>) -> Self {
        Self {
            entries: vec![BackendMetaData::new(
                REVISION_TOKEN,
                Value::from(token.into()),
            )],
        }
    }
}
