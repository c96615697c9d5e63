//! Schema descriptors: fields, object schemas and engine metadata.

pub mod field;
pub mod meta;


use crate::error::{ErrorOrigin, InternalError};

// re-exports
pub use field::{EnumCodeTable, FieldKind, ObjectField, ObjectFieldList};
pub use meta::{BackendMetaData, BackendMetaDataList, REVISION_TOKEN};

///
/// ObjectSchema
///
/// Table name, primary-key field name and the full field list of one
/// mapped entity. Engines receive this by reference for every operation.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ObjectSchema {
    table: String,
    primary_key: String,
    fields: ObjectFieldList,
}

impl ObjectSchema {
    /// Validate and build a schema. The primary key must be one of `fields`.
    pub fn new(
        table: impl Into<String>,
        primary_key: impl Into<String>,
        fields: ObjectFieldList,
    ) -> Result<Self, InternalError> {
        let table = table.into();
        let primary_key = primary_key.into();

        if table.is_empty() {
            return Err(InternalError::invariant(
                ErrorOrigin::Schema,
                "table name must not be empty",
            ));
        }
        let Some(key_field) = fields.field(&primary_key) else {
            return Err(InternalError::invariant(
                ErrorOrigin::Schema,
                format!("primary key '{primary_key}' is not a field of '{table}'"),
            ));
        };
        if matches!(key_field.kind, FieldKind::Revision | FieldKind::Enum(_)) {
            return Err(InternalError::invariant(
                ErrorOrigin::Schema,
                format!(
                    "primary key '{primary_key}' cannot be a {} field",
                    key_field.kind.label()
                ),
            ));
        }

        Ok(Self {
            table,
            primary_key,
            fields,
        })
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    #[must_use]
    pub const fn fields(&self) -> &ObjectFieldList {
        &self.fields
    }

    #[must_use]
    pub fn revision_field(&self) -> Option<&ObjectField> {
        self.fields.revision_field()
    }
}
