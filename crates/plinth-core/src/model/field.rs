use crate::error::{ErrorOrigin, InternalError};
use derive_more::{Deref, IntoIterator};
use std::sync::Arc;

///
/// EnumCodeTable
///
/// Immutable code ↔ display-text table shared by every enum field that
/// references it.
///

#[derive(Debug, Eq, PartialEq)]
pub struct EnumCodeTable {
    name: String,
    entries: Vec<(i32, String)>,
}

impl EnumCodeTable {
    /// Build a table; codes and texts must both be unique.
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        entries: impl IntoIterator<Item = (i32, S)>,
    ) -> Result<Arc<Self>, InternalError> {
        let name = name.into();
        let mut table: Vec<(i32, String)> = Vec::new();

        for (code, text) in entries {
            let text = text.into();
            if table.iter().any(|(c, t)| *c == code || *t == text) {
                return Err(InternalError::invariant(
                    ErrorOrigin::Schema,
                    format!("enum table '{name}' has a duplicate entry ({code}, {text})"),
                ));
            }
            table.push((code, text));
        }

        Ok(Arc::new(Self {
            name,
            entries: table,
        }))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn text(&self, code: i32) -> Option<&str> {
        self.entries
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, text)| text.as_str())
    }

    #[must_use]
    pub fn code(&self, text: &str) -> Option<i32> {
        self.entries
            .iter()
            .find(|(_, t)| t == text)
            .map(|(code, _)| *code)
    }
}

///
/// FieldKind
///
/// Semantic type of one schema field.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FieldKind {
    PrimaryKey,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Text,
    Enum(Arc<EnumCodeTable>),
    /// Optimistic-concurrency counter; at most one per schema.
    Revision,
    /// Decoded from whatever the engine returns.
    Any,
}

impl FieldKind {
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::PrimaryKey => "primary_key",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Text => "text",
            Self::Enum(_) => "enum",
            Self::Revision => "revision",
            Self::Any => "any",
        }
    }

    #[must_use]
    pub const fn is_revision(&self) -> bool {
        matches!(self, Self::Revision)
    }
}

///
/// ObjectField
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ObjectField {
    pub name: String,
    pub kind: FieldKind,
}

impl ObjectField {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

///
/// ObjectFieldList
///
/// Ordered schema descriptor. Declaration order is the column order of
/// every statement and every decoded row.
///

#[derive(Clone, Debug, Default, Deref, Eq, IntoIterator, PartialEq)]
#[deref(forward)]
#[into_iterator(owned, ref)]
pub struct ObjectFieldList {
    fields: Vec<ObjectField>,
}

impl ObjectFieldList {
    #[must_use]
    pub const fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Append a field; the list takes ownership.
    pub fn push(&mut self, field: ObjectField) -> Result<(), InternalError> {
        if field.name.is_empty() {
            return Err(InternalError::invariant(
                ErrorOrigin::Schema,
                "field name must not be empty",
            ));
        }
        if self.position(&field.name).is_some() {
            return Err(InternalError::invariant(
                ErrorOrigin::Schema,
                format!("field '{}' declared twice", field.name),
            ));
        }
        if field.kind.is_revision()
            && let Some(existing) = self.revision_field()
        {
            return Err(InternalError::invariant(
                ErrorOrigin::Schema,
                format!(
                    "revision field '{}' conflicts with existing revision field '{}'",
                    field.name, existing.name
                ),
            ));
        }
        self.fields.push(field);

        Ok(())
    }

    /// Builder form of [`Self::push`].
    pub fn with(mut self, name: impl Into<String>, kind: FieldKind) -> Result<Self, InternalError> {
        self.push(ObjectField::new(name, kind))?;

        Ok(self)
    }

    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&ObjectField> {
        self.fields.iter().find(|field| field.name == name)
    }

    #[must_use]
    pub fn revision_field(&self) -> Option<&ObjectField> {
        self.fields.iter().find(|field| field.kind.is_revision())
    }
}
