//! Row sequences returned by reads.
//!
//! A [`ResultList`] is either materialized (owned rows plus a position) or
//! lazy (a boxed [`RowCursor`] pulled one row at a time). Cursors release
//! engine resources on `Drop`, so an abandoned lazy list needs no explicit
//! close call.

#[cfg(test)]
mod tests;

use crate::{
    error::{ErrorClass, ErrorOrigin, InternalError},
    model::BackendMetaDataList,
    value::ValueSet,
};
use std::fmt;
use thiserror::Error as ThisError;

///
/// ResponseError
/// Errors related to consuming a result list.
///

#[derive(Debug, ThisError)]
pub enum ResponseError {
    #[error("lazy result list cannot be restarted; query again")]
    LazyRestart,

    #[error("expected exactly one row, found 0 (table {table})")]
    NotFound { table: String },

    #[error("expected exactly one row, found {count} (table {table})")]
    NotUnique { table: String, count: usize },
}

impl ResponseError {
    const fn class(&self) -> ErrorClass {
        match self {
            Self::LazyRestart | Self::NotUnique { .. } => ErrorClass::InvariantViolation,
            Self::NotFound { .. } => ErrorClass::NotFound,
        }
    }
}

impl From<ResponseError> for InternalError {
    fn from(err: ResponseError) -> Self {
        Self::new(err.class(), ErrorOrigin::Cursor, err.to_string())
    }
}

///
/// ResultRow
/// One decoded row plus the engine annotations that came with it.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResultRow {
    pub values: ValueSet,
    pub metadata: Option<BackendMetaDataList>,
}

impl ResultRow {
    #[must_use]
    pub const fn new(values: ValueSet) -> Self {
        Self {
            values,
            metadata: None,
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: BackendMetaDataList) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

///
/// RowCursor
///
/// Engine-side row producer behind a lazy list. `next_row` returns
/// `Ok(None)` once exhausted; dropping the cursor releases whatever the
/// engine still holds.
///

pub trait RowCursor {
    fn next_row(&mut self) -> Result<Option<ResultRow>, InternalError>;
}

///
/// ResultList
///

pub struct ResultList {
    shape: Shape,
}

enum Shape {
    Materialized {
        rows: Vec<ResultRow>,
        position: usize,
    },
    Lazy {
        cursor: Option<Box<dyn RowCursor>>,
        size: Option<usize>,
        started: bool,
        current: Option<ResultRow>,
    },
}

impl ResultList {
    #[must_use]
    pub const fn empty() -> Self {
        Self::materialized(Vec::new())
    }

    #[must_use]
    pub const fn materialized(rows: Vec<ResultRow>) -> Self {
        Self {
            shape: Shape::Materialized { rows, position: 0 },
        }
    }

    /// Wrap an engine cursor that knows its row count up front.
    #[must_use]
    pub fn lazy(cursor: Box<dyn RowCursor>, size: usize) -> Self {
        Self::lazy_with(cursor, Some(size))
    }

    /// Wrap an engine cursor whose row count is only known once drained.
    #[must_use]
    pub fn lazy_unsized(cursor: Box<dyn RowCursor>) -> Self {
        Self::lazy_with(cursor, None)
    }

    fn lazy_with(cursor: Box<dyn RowCursor>, size: Option<usize>) -> Self {
        Self {
            shape: Shape::Lazy {
                cursor: Some(cursor),
                size,
                started: false,
                current: None,
            },
        }
    }

    #[must_use]
    pub const fn is_lazy(&self) -> bool {
        matches!(self.shape, Shape::Lazy { .. })
    }

    /// Row count for materialized lists; the declared size for lazy ones,
    /// zero when none was declared.
    #[must_use]
    pub const fn len(&self) -> usize {
        match &self.shape {
            Shape::Materialized { rows, .. } => rows.len(),
            Shape::Lazy { size: Some(size), .. } => *size,
            Shape::Lazy { size: None, .. } => 0,
        }
    }

    /// True when the list is known to hold no rows. An unsized lazy list
    /// is never reported empty before it is drained.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        match &self.shape {
            Shape::Materialized { rows, .. } => rows.is_empty(),
            Shape::Lazy { size, .. } => matches!(size, Some(0)),
        }
    }

    //
    // Iteration
    //

    /// Rewind to the first row. A lazy list may only be started once.
    pub fn begin(&mut self) -> Result<(), InternalError> {
        match &mut self.shape {
            Shape::Materialized { position, .. } => {
                *position = 0;
                Ok(())
            }
            Shape::Lazy { started, .. } => {
                if *started {
                    return Err(ResponseError::LazyRestart.into());
                }
                *started = true;
                Ok(())
            }
        }
    }

    /// Advance and borrow the next row, or `None` at the end.
    pub fn next(&mut self) -> Result<Option<&ResultRow>, InternalError> {
        match &mut self.shape {
            Shape::Materialized { rows, position } => {
                let row = rows.get(*position);
                if row.is_some() {
                    *position += 1;
                }
                Ok(row)
            }
            Shape::Lazy {
                cursor,
                started,
                current,
                ..
            } => {
                *started = true;
                *current = match cursor {
                    Some(active) => active.next_row()?,
                    None => None,
                };
                if current.is_none() {
                    // exhausted: release the engine side now
                    *cursor = None;
                }
                Ok(current.as_ref())
            }
        }
    }

    /// Drain the remaining rows of a lazy list and become materialized.
    /// No-op on a materialized list.
    pub fn fetch_all(&mut self) -> Result<(), InternalError> {
        let Shape::Lazy { cursor, .. } = &mut self.shape else {
            return Ok(());
        };

        let mut rows = Vec::new();
        if let Some(mut active) = cursor.take() {
            while let Some(row) = active.next_row()? {
                rows.push(row);
            }
        }
        self.shape = Shape::Materialized { rows, position: 0 };

        Ok(())
    }

    /// Consume the list, draining a lazy cursor first.
    pub fn into_rows(mut self) -> Result<Vec<ResultRow>, InternalError> {
        self.fetch_all()?;

        match self.shape {
            Shape::Materialized { rows, .. } => Ok(rows),
            Shape::Lazy { .. } => Ok(Vec::new()),
        }
    }

    //
    // Exact cardinality helpers
    //

    /// Require exactly one row.
    pub fn one(self, table: &str) -> Result<ResultRow, InternalError> {
        let mut rows = self.into_rows()?;

        match rows.len() {
            0 => Err(ResponseError::NotFound {
                table: table.to_string(),
            }
            .into()),
            1 => Ok(rows.remove(0)),
            count => Err(ResponseError::NotUnique {
                table: table.to_string(),
                count,
            }
            .into()),
        }
    }

    /// Require at most one row.
    pub fn one_opt(self, table: &str) -> Result<Option<ResultRow>, InternalError> {
        let mut rows = self.into_rows()?;

        match rows.len() {
            0 => Ok(None),
            1 => Ok(Some(rows.remove(0))),
            count => Err(ResponseError::NotUnique {
                table: table.to_string(),
                count,
            }
            .into()),
        }
    }
}

impl fmt::Debug for ResultList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.shape {
            Shape::Materialized { rows, position } => f
                .debug_struct("ResultList")
                .field("rows", &rows.len())
                .field("position", position)
                .finish(),
            Shape::Lazy { size, started, .. } => f
                .debug_struct("ResultList")
                .field("lazy_size", size)
                .field("started", started)
                .finish_non_exhaustive(),
        }
    }
}

///
/// VecCursor
/// Cursor over rows already held in memory, yielded front to back.
///

pub struct VecCursor {
    rows: std::vec::IntoIter<ResultRow>,
}

impl VecCursor {
    #[must_use]
    pub fn new(rows: Vec<ResultRow>) -> Self {
        Self {
            rows: rows.into_iter(),
        }
    }
}

impl RowCursor for VecCursor {
    fn next_row(&mut self) -> Result<Option<ResultRow>, InternalError> {
        Ok(self.rows.next())
    }
}
