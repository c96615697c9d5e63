//! Column fetch and row decoding for the relational engines.
//!
//! Variable-length columns are read with a retry-on-truncation protocol:
//! the first attempt goes into one `FETCH_POOL` cell; if the source reports
//! that the column is longer, exactly the reported length is allocated and
//! that single column is fetched again.
//!
//! Both engines hand over rows already copied out of the driver as
//! [`RawCell`] values, so the "source" here is an in-memory row: the retry
//! copies from bytes the row already holds rather than reading the column
//! from the driver a second time.

use crate::{
    db::response::{ResultRow, RowCursor},
    error::InternalError,
    model::{FieldKind, ObjectField, ObjectFieldList},
    pool::FETCH_POOL,
    value::{Value, ValueEnum, ValueSet},
};

///
/// FetchStatus
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FetchStatus {
    Null,
    /// The column fit; this many bytes were written.
    Complete(usize),
    /// The buffer was too small; the column needs `required` bytes.
    Truncated { required: usize },
}

///
/// ColumnShape
/// Native storage class of one fetched column.
///

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ColumnShape {
    Null,
    Integer(i64),
    Unsigned(u64),
    Real(f64),
    /// Variable length; read through [`RowSource::fetch`].
    Text,
}

///
/// RowSource
/// One fetched row as a relational driver exposes it.
///

pub trait RowSource {
    fn column_count(&self) -> usize;

    fn shape(&self, column: usize) -> Result<ColumnShape, InternalError>;

    /// Copy the column's bytes into `buf`, reporting truncation instead of
    /// failing when `buf` is too short.
    fn fetch(&self, column: usize, buf: &mut [u8]) -> Result<FetchStatus, InternalError>;
}

///
/// RawCell
/// Driver-independent copy of one column taken while a statement was live.
///

#[derive(Clone, Debug, PartialEq)]
pub enum RawCell {
    Null,
    Integer(i64),
    Unsigned(u64),
    Real(f64),
    Bytes(Vec<u8>),
}

impl RowSource for [RawCell] {
    fn column_count(&self) -> usize {
        self.len()
    }

    fn shape(&self, column: usize) -> Result<ColumnShape, InternalError> {
        let shape = match self.get(column).ok_or_else(|| missing_column(column))? {
            RawCell::Null => ColumnShape::Null,
            RawCell::Integer(v) => ColumnShape::Integer(*v),
            RawCell::Unsigned(v) => ColumnShape::Unsigned(*v),
            RawCell::Real(v) => ColumnShape::Real(*v),
            RawCell::Bytes(_) => ColumnShape::Text,
        };

        Ok(shape)
    }

    fn fetch(&self, column: usize, buf: &mut [u8]) -> Result<FetchStatus, InternalError> {
        let rendered;
        let bytes: &[u8] = match self.get(column).ok_or_else(|| missing_column(column))? {
            RawCell::Null => return Ok(FetchStatus::Null),
            RawCell::Bytes(bytes) => bytes,
            RawCell::Integer(v) => {
                rendered = v.to_string();
                rendered.as_bytes()
            }
            RawCell::Unsigned(v) => {
                rendered = v.to_string();
                rendered.as_bytes()
            }
            RawCell::Real(v) => {
                rendered = v.to_string();
                rendered.as_bytes()
            }
        };

        Ok(copy_into(bytes, buf))
    }
}

/// Copy `bytes` into `buf` if they fit.
#[must_use]
pub fn copy_into(bytes: &[u8], buf: &mut [u8]) -> FetchStatus {
    if bytes.len() > buf.len() {
        return FetchStatus::Truncated {
            required: bytes.len(),
        };
    }
    buf[..bytes.len()].copy_from_slice(bytes);

    FetchStatus::Complete(bytes.len())
}

fn missing_column(column: usize) -> InternalError {
    InternalError::engine(format!("column {column} not present in fetched row"))
}

// ----------------------------------------------------------------------
// Text fetch
// ----------------------------------------------------------------------

/// Fetch one variable-length column as text; `None` for SQL NULL.
pub fn fetch_text<S>(source: &S, column: usize) -> Result<Option<String>, InternalError>
where
    S: RowSource + ?Sized,
{
    let mut cell = FETCH_POOL
        .allocate()
        .ok_or_else(|| InternalError::engine("fetch buffer pool exhausted"))?;

    let required = match source.fetch(column, &mut cell)? {
        FetchStatus::Null => return Ok(None),
        FetchStatus::Complete(len) => return utf8(&cell[..len], column).map(Some),
        FetchStatus::Truncated { required } => required,
    };
    drop(cell);

    let mut exact = Vec::new();
    exact.try_reserve_exact(required).map_err(|_| {
        InternalError::engine(format!("cannot allocate {required} bytes for column {column}"))
    })?;
    exact.resize(required, 0u8);
    tracing::trace!(column, required, "column truncated, re-fetching");

    match source.fetch(column, &mut exact)? {
        FetchStatus::Null => Ok(None),
        FetchStatus::Complete(len) => {
            exact.truncate(len);
            String::from_utf8(exact)
                .map(Some)
                .map_err(|_| not_utf8(column))
        }
        FetchStatus::Truncated { required: again } => Err(InternalError::engine(format!(
            "column {column} reported {required} bytes, then {again} on re-fetch"
        ))),
    }
}

fn utf8(bytes: &[u8], column: usize) -> Result<String, InternalError> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|_| not_utf8(column))
}

fn not_utf8(column: usize) -> InternalError {
    InternalError::engine(format!("column {column} is not valid UTF-8"))
}

// ----------------------------------------------------------------------
// Row decoding
// ----------------------------------------------------------------------

/// Decode one row into schema order.
pub fn decode_row<S>(fields: &ObjectFieldList, source: &S) -> Result<ValueSet, InternalError>
where
    S: RowSource + ?Sized,
{
    if source.column_count() != fields.len() {
        return Err(InternalError::engine(format!(
            "row has {} columns for {} fields",
            source.column_count(),
            fields.len()
        )));
    }

    let mut values = ValueSet::new(fields.len())?;
    for (column, field) in fields.iter().enumerate() {
        values.set(column, decode_column(field, source, column)?)?;
    }

    Ok(values)
}

fn decode_column<S>(field: &ObjectField, source: &S, column: usize) -> Result<Value, InternalError>
where
    S: RowSource + ?Sized,
{
    let shape = source.shape(column)?;
    if shape == ColumnShape::Null {
        return Ok(Value::new());
    }

    let value = match &field.kind {
        FieldKind::PrimaryKey => {
            let key = if shape == ColumnShape::Text {
                Value::from(required_text(source, column)?)
            } else {
                Value::from(narrow::<i64>(field, integer(source, shape, column)?)?)
            };
            key.into_primary_key()?
        }
        FieldKind::Int32 => Value::from(narrow::<i32>(field, integer(source, shape, column)?)?),
        FieldKind::Int64 | FieldKind::Revision => {
            Value::from(narrow::<i64>(field, integer(source, shape, column)?)?)
        }
        FieldKind::Uint32 => Value::from(narrow::<u32>(field, integer(source, shape, column)?)?),
        FieldKind::Uint64 => Value::from(narrow::<u64>(field, integer(source, shape, column)?)?),
        FieldKind::Text => Value::from(required_text(source, column)?),
        FieldKind::Enum(table) => {
            let code = narrow::<i32>(field, integer(source, shape, column)?)?;
            let text = table.text(code).ok_or_else(|| {
                InternalError::engine(format!(
                    "code {code} of field '{}' is not in enum table '{}'",
                    field.name,
                    table.name()
                ))
            })?;
            Value::from(ValueEnum::new(code, text))
        }
        FieldKind::Any => match shape {
            ColumnShape::Integer(v) => Value::from(v),
            ColumnShape::Unsigned(v) => Value::from(v),
            ColumnShape::Real(_) | ColumnShape::Text | ColumnShape::Null => {
                Value::from(required_text(source, column)?)
            }
        },
    };

    Ok(value)
}

fn required_text<S>(source: &S, column: usize) -> Result<String, InternalError>
where
    S: RowSource + ?Sized,
{
    fetch_text(source, column)?.ok_or_else(|| {
        InternalError::engine(format!("column {column} became NULL while fetching"))
    })
}

fn integer<S>(source: &S, shape: ColumnShape, column: usize) -> Result<i128, InternalError>
where
    S: RowSource + ?Sized,
{
    match shape {
        ColumnShape::Integer(v) => Ok(i128::from(v)),
        ColumnShape::Unsigned(v) => Ok(i128::from(v)),
        ColumnShape::Text => {
            let text = required_text(source, column)?;
            text.trim().parse().map_err(|_| {
                InternalError::engine(format!("column {column} value '{text}' is not an integer"))
            })
        }
        ColumnShape::Real(v) => Err(InternalError::engine(format!(
            "column {column} holds real {v} where an integer was expected"
        ))),
        ColumnShape::Null => Err(InternalError::engine(format!("column {column} is NULL"))),
    }
}

fn narrow<T: TryFrom<i128>>(field: &ObjectField, value: i128) -> Result<T, InternalError> {
    T::try_from(value).map_err(|_| {
        InternalError::engine(format!(
            "value {value} out of range for {} field '{}'",
            field.kind.label(),
            field.name
        ))
    })
}

// ----------------------------------------------------------------------
// Cursor
// ----------------------------------------------------------------------

///
/// RawRowCursor
///
/// Lazy cursor over rows copied out of a finished statement. Each row is
/// decoded only when the caller advances to it.
///

pub struct RawRowCursor {
    fields: ObjectFieldList,
    rows: std::vec::IntoIter<Vec<RawCell>>,
}

impl RawRowCursor {
    #[must_use]
    pub fn new(fields: ObjectFieldList, rows: Vec<Vec<RawCell>>) -> Self {
        Self {
            fields,
            rows: rows.into_iter(),
        }
    }
}

impl RowCursor for RawRowCursor {
    fn next_row(&mut self) -> Result<Option<ResultRow>, InternalError> {
        self.rows
            .next()
            .map(|row| decode_row(&self.fields, row.as_slice()).map(ResultRow::new))
            .transpose()
    }
}

/// Read a single integer result such as `COUNT(*)`.
pub fn single_count(rows: &[Vec<RawCell>]) -> Result<u64, InternalError> {
    match rows.first().and_then(|row| row.first()) {
        Some(RawCell::Integer(v)) => u64::try_from(*v)
            .map_err(|_| InternalError::engine(format!("negative count {v}"))),
        Some(RawCell::Unsigned(v)) => Ok(*v),
        Some(RawCell::Bytes(bytes)) => std::str::from_utf8(bytes)
            .ok()
            .and_then(|text| text.trim().parse().ok())
            .ok_or_else(|| InternalError::engine("count result is not an integer")),
        _ => Err(InternalError::engine("count returned no value")),
    }
}
