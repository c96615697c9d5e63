use crate::error::{ErrorOrigin, InternalError};
use derive_more::{Deref, IntoIterator};

///
/// Join
/// One inner-join edge: `from_table.from_field = to_table.to_field`.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Join {
    pub from_table: String,
    pub from_field: String,
    pub to_table: String,
    pub to_field: String,
}

impl Join {
    pub fn new(
        from_table: impl Into<String>,
        from_field: impl Into<String>,
        to_table: impl Into<String>,
        to_field: impl Into<String>,
    ) -> Result<Self, InternalError> {
        let join = Self {
            from_table: from_table.into(),
            from_field: from_field.into(),
            to_table: to_table.into(),
            to_field: to_field.into(),
        };

        if [
            &join.from_table,
            &join.from_field,
            &join.to_table,
            &join.to_field,
        ]
        .iter()
        .any(|part| part.is_empty())
        {
            return Err(InternalError::invariant(
                ErrorOrigin::Query,
                "join edge needs both tables and both fields",
            ));
        }

        Ok(join)
    }
}

///
/// JoinList
/// Join edges applied left to right.
///

#[derive(Clone, Debug, Default, Deref, Eq, IntoIterator, PartialEq)]
#[deref(forward)]
#[into_iterator(owned, ref)]
pub struct JoinList {
    joins: Vec<Join>,
}

impl JoinList {
    #[must_use]
    pub const fn new() -> Self {
        Self { joins: Vec::new() }
    }

    pub fn push(&mut self, join: Join) {
        self.joins.push(join);
    }

    #[must_use]
    pub fn join(mut self, join: Join) -> Self {
        self.push(join);
        self
    }
}
