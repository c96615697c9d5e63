use crate::{
    db::{
        Connection,
        response::{ResultList, ResultRow},
    },
    error::InternalError,
    model::{BackendMetaDataList, ObjectFieldList, ObjectSchema},
    query::{ClauseList, JoinList},
    value::ValueSet,
};

///
/// Object
///
/// One mapped table handle: a borrowed connection, the schema, and the
/// engine annotations (document revision token) carried between a read and
/// the following update or delete.
///

#[derive(Debug)]
pub struct Object<'c> {
    connection: &'c Connection<'c>,
    schema: ObjectSchema,
    metadata: Option<BackendMetaDataList>,
}

impl<'c> Object<'c> {
    #[must_use]
    pub const fn new(connection: &'c Connection<'c>, schema: ObjectSchema) -> Self {
        Self {
            connection,
            schema,
            metadata: None,
        }
    }

    #[must_use]
    pub const fn schema(&self) -> &ObjectSchema {
        &self.schema
    }

    #[must_use]
    pub const fn metadata(&self) -> Option<&BackendMetaDataList> {
        self.metadata.as_ref()
    }

    /// Attach engine annotations; the object takes ownership.
    pub fn set_metadata(&mut self, metadata: BackendMetaDataList) {
        self.metadata = Some(metadata);
    }

    /// Take over the annotations a read returned for `row`.
    pub fn adopt_row_metadata(&mut self, row: &ResultRow) {
        self.metadata.clone_from(&row.metadata);
    }

    pub fn clear_metadata(&mut self) {
        self.metadata = None;
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    /// Insert one row. Fresh engine annotations replace the current ones.
    pub fn create(
        &mut self,
        fields: &ObjectFieldList,
        values: &ValueSet,
    ) -> Result<(), InternalError> {
        let fresh = self.connection.create(&self.schema, fields, values)?;
        if fresh.is_some() {
            self.metadata = fresh;
        }

        Ok(())
    }

    pub fn read(
        &self,
        joins: &JoinList,
        clauses: &ClauseList,
    ) -> Result<ResultList, InternalError> {
        self.connection.read(&self.schema, self.metadata.as_ref(), joins, clauses)
    }

    /// Update matching rows. `clauses` must carry the revision guard when the
    /// schema declares a revision field.
    pub fn update(
        &mut self,
        fields: &ObjectFieldList,
        values: &ValueSet,
        clauses: &ClauseList,
    ) -> Result<(), InternalError> {
        let fresh = self.connection.update(
            &self.schema,
            self.metadata.as_ref(),
            fields,
            values,
            clauses,
        )?;
        if fresh.is_some() {
            self.metadata = fresh;
        }

        Ok(())
    }

    pub fn delete(&mut self, clauses: &ClauseList) -> Result<(), InternalError> {
        self.connection.delete(&self.schema, self.metadata.as_ref(), clauses)?;
        self.metadata = None;

        Ok(())
    }

    pub fn count(&self, joins: &JoinList, clauses: &ClauseList) -> Result<u64, InternalError> {
        self.connection.count(&self.schema, joins, clauses)
    }
}
