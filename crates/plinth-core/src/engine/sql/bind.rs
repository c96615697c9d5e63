use crate::{
    error::InternalError,
    value::{Value, ValueData},
};
use std::borrow::Cow;

///
/// ParamBinder
///
/// Native bind calls of one relational driver. `index` is the 1-based
/// placeholder position.
///

pub trait ParamBinder {
    fn bind_null(&mut self, index: usize) -> Result<(), InternalError>;

    fn bind_i32(&mut self, index: usize, value: i32) -> Result<(), InternalError>;

    fn bind_u32(&mut self, index: usize, value: u32) -> Result<(), InternalError>;

    fn bind_i64(&mut self, index: usize, value: i64) -> Result<(), InternalError>;

    fn bind_u64(&mut self, index: usize, value: u64) -> Result<(), InternalError>;

    fn bind_text(&mut self, index: usize, value: &str) -> Result<(), InternalError>;
}

/// Bind one value, dispatching on its tag. Enums bind their numeric code.
pub fn bind_value<B>(binder: &mut B, index: usize, value: &Value) -> Result<(), InternalError>
where
    B: ParamBinder + ?Sized,
{
    match value.data() {
        ValueData::Empty => binder.bind_null(index),
        ValueData::Int32(v) => binder.bind_i32(index, *v),
        ValueData::Uint32(v) => binder.bind_u32(index, *v),
        ValueData::Int64(v) => binder.bind_i64(index, *v),
        ValueData::Uint64(v) => binder.bind_u64(index, *v),
        ValueData::Text(v) => binder.bind_text(index, v),
        ValueData::Enum(v) => binder.bind_i32(index, v.code),
    }
}

/// Bind every parameter in placeholder order; returns the number bound.
pub fn bind_params<B>(binder: &mut B, params: &[Cow<'_, Value>]) -> Result<usize, InternalError>
where
    B: ParamBinder + ?Sized,
{
    for (offset, value) in params.iter().enumerate() {
        bind_value(binder, offset + 1, value)?;
    }

    Ok(params.len())
}
