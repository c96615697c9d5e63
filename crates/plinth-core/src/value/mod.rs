mod set;
mod tag;


use crate::error::{ErrorOrigin, InternalError};
use std::fmt;

// re-exports
pub use set::{VALUE_SET_SIZE_CLASSES, ValueSet, size_class};
pub use tag::ValueTag;

///
/// Value
///
/// Closed tagged scalar plus an orthogonal primary-key marker.
///
/// A value starts empty and is populated exactly once by a `set_*` call;
/// after that the tag is fixed until `reset`. Accessors are type-checked
/// and fail on tag mismatch rather than converting.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Value {
    data: ValueData,
    primary_key: bool,
}

///
/// ValueData
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum ValueData {
    #[default]
    Empty,
    Int32(i32),
    Uint32(u32),
    Int64(i64),
    Uint64(u64),
    Text(String),
    Enum(ValueEnum),
}

///
/// ValueEnum
/// Enumerated value: numeric code plus its display text.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ValueEnum {
    pub code: i32,
    pub text: String,
}

impl ValueEnum {
    pub fn new(code: i32, text: impl Into<String>) -> Self {
        Self {
            code,
            text: text.into(),
        }
    }
}

impl Value {
    /// Create an empty value.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            data: ValueData::Empty,
            primary_key: false,
        }
    }

    #[must_use]
    pub const fn data(&self) -> &ValueData {
        &self.data
    }

    #[must_use]
    pub const fn tag(&self) -> ValueTag {
        tag::canonical_tag(&self.data)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self.data, ValueData::Empty)
    }

    #[must_use]
    pub const fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    // ------------------------------------------------------------------
    // Population
    // ------------------------------------------------------------------

    pub fn set_int32(&mut self, value: i32) -> Result<(), InternalError> {
        self.populate(ValueData::Int32(value))
    }

    pub fn set_uint32(&mut self, value: u32) -> Result<(), InternalError> {
        self.populate(ValueData::Uint32(value))
    }

    pub fn set_int64(&mut self, value: i64) -> Result<(), InternalError> {
        self.populate(ValueData::Int64(value))
    }

    pub fn set_uint64(&mut self, value: u64) -> Result<(), InternalError> {
        self.populate(ValueData::Uint64(value))
    }

    pub fn set_text(&mut self, value: impl Into<String>) -> Result<(), InternalError> {
        self.populate(ValueData::Text(value.into()))
    }

    pub fn set_enum(&mut self, code: i32, text: impl Into<String>) -> Result<(), InternalError> {
        self.populate(ValueData::Enum(ValueEnum::new(code, text)))
    }

    fn populate(&mut self, data: ValueData) -> Result<(), InternalError> {
        if !self.is_empty() {
            return Err(InternalError::invariant(
                ErrorOrigin::Value,
                format!(
                    "value already holds {}; reset before assigning {}",
                    self.tag().label(),
                    tag::canonical_tag(&data).label()
                ),
            ));
        }
        self.data = data;

        Ok(())
    }

    /// Flag this value as a primary key. Only non-empty, non-enum values qualify.
    pub fn mark_primary_key(&mut self) -> Result<(), InternalError> {
        match self.data {
            ValueData::Empty | ValueData::Enum(_) => Err(InternalError::invariant(
                ErrorOrigin::Value,
                format!(
                    "primary-key marker not allowed on {} values",
                    self.tag().label()
                ),
            )),
            _ => {
                self.primary_key = true;
                Ok(())
            }
        }
    }

    /// Builder form of [`Self::mark_primary_key`].
    pub fn into_primary_key(mut self) -> Result<Self, InternalError> {
        self.mark_primary_key()?;

        Ok(self)
    }

    /// Drop the payload (freeing owned text) and the primary-key marker.
    pub fn reset(&mut self) {
        self.data = ValueData::Empty;
        self.primary_key = false;
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn as_int32(&self) -> Result<i32, InternalError> {
        match self.data {
            ValueData::Int32(v) => Ok(v),
            _ => Err(self.mismatch(ValueTag::Int32)),
        }
    }

    pub fn as_uint32(&self) -> Result<u32, InternalError> {
        match self.data {
            ValueData::Uint32(v) => Ok(v),
            _ => Err(self.mismatch(ValueTag::Uint32)),
        }
    }

    pub fn as_int64(&self) -> Result<i64, InternalError> {
        match self.data {
            ValueData::Int64(v) => Ok(v),
            _ => Err(self.mismatch(ValueTag::Int64)),
        }
    }

    pub fn as_uint64(&self) -> Result<u64, InternalError> {
        match self.data {
            ValueData::Uint64(v) => Ok(v),
            _ => Err(self.mismatch(ValueTag::Uint64)),
        }
    }

    pub fn as_text(&self) -> Result<&str, InternalError> {
        match &self.data {
            ValueData::Text(v) => Ok(v),
            _ => Err(self.mismatch(ValueTag::Text)),
        }
    }

    pub fn as_enum(&self) -> Result<&ValueEnum, InternalError> {
        match &self.data {
            ValueData::Enum(v) => Ok(v),
            _ => Err(self.mismatch(ValueTag::Enum)),
        }
    }

    /// Widen any integer tag to `i64`. Used where the stored width is not
    /// known in advance, such as revision counters.
    pub fn as_integer(&self) -> Result<i64, InternalError> {
        match self.data {
            ValueData::Int32(v) => Ok(i64::from(v)),
            ValueData::Uint32(v) => Ok(i64::from(v)),
            ValueData::Int64(v) => Ok(v),
            ValueData::Uint64(v) => i64::try_from(v).map_err(|_| {
                InternalError::invariant(
                    ErrorOrigin::Value,
                    format!("uint64 value {v} does not fit in int64"),
                )
            }),
            _ => Err(InternalError::invariant(
                ErrorOrigin::Value,
                format!("expected an integer value, found {}", self.tag().label()),
            )),
        }
    }

    fn mismatch(&self, expected: ValueTag) -> InternalError {
        InternalError::invariant(
            ErrorOrigin::Value,
            format!(
                "value type mismatch: expected {}, found {}",
                expected.label(),
                self.tag().label()
            ),
        )
    }
}

impl From<ValueData> for Value {
    fn from(data: ValueData) -> Self {
        Self {
            data,
            primary_key: false,
        }
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        ValueData::Int32(value).into()
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        ValueData::Uint32(value).into()
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        ValueData::Int64(value).into()
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        ValueData::Uint64(value).into()
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        ValueData::Text(value.to_string()).into()
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        ValueData::Text(value).into()
    }
}

impl From<ValueEnum> for Value {
    fn from(value: ValueEnum) -> Self {
        ValueData::Enum(value).into()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data {
            ValueData::Empty => f.write_str("<empty>"),
            ValueData::Int32(v) => write!(f, "{v}"),
            ValueData::Uint32(v) => write!(f, "{v}"),
            ValueData::Int64(v) => write!(f, "{v}"),
            ValueData::Uint64(v) => write!(f, "{v}"),
            ValueData::Text(v) => write!(f, "{v:?}"),
            ValueData::Enum(v) => write!(f, "{}({})", v.text, v.code),
        }
    }
}
