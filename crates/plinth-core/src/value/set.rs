use crate::{
    error::{ErrorOrigin, InternalError},
    value::Value,
};
use derive_more::{Deref, IntoIterator};

/// Slot counts a value set may be allocated with.
pub const VALUE_SET_SIZE_CLASSES: [usize; 8] = [4, 8, 12, 16, 24, 32, 64, 128];

/// Smallest size class holding `len` slots.
#[must_use]
pub fn size_class(len: usize) -> Option<usize> {
    VALUE_SET_SIZE_CLASSES
        .iter()
        .copied()
        .find(|class| len <= *class)
}

///
/// ValueSet
///
/// Fixed-length ordered row of values, index-aligned with an
/// `ObjectFieldList`. The length is chosen at creation and never changes.
///

#[derive(Clone, Debug, Deref, Eq, IntoIterator, PartialEq)]
#[deref(forward)]
#[into_iterator(owned, ref)]
pub struct ValueSet {
    values: Vec<Value>,
}

impl ValueSet {
    /// Create `len` empty slots.
    pub fn new(len: usize) -> Result<Self, InternalError> {
        let class = Self::checked_class(len)?;
        let mut values = Vec::with_capacity(class);
        values.resize_with(len, Value::new);

        Ok(Self { values })
    }

    /// Take ownership of already-populated values.
    pub fn from_values(values: Vec<Value>) -> Result<Self, InternalError> {
        let class = Self::checked_class(values.len())?;
        let mut slots = Vec::with_capacity(class);
        slots.extend(values);

        Ok(Self { values: slots })
    }

    fn checked_class(len: usize) -> Result<usize, InternalError> {
        if len == 0 {
            return Err(InternalError::invariant(
                ErrorOrigin::Value,
                "value set must hold at least one slot",
            ));
        }

        size_class(len).ok_or_else(|| {
            InternalError::invariant(
                ErrorOrigin::Value,
                format!(
                    "value set of {len} slots exceeds the largest size class ({})",
                    VALUE_SET_SIZE_CLASSES[VALUE_SET_SIZE_CLASSES.len() - 1]
                ),
            )
        })
    }

    /// Size class this set was allocated from.
    #[must_use]
    pub fn capacity_class(&self) -> usize {
        size_class(self.values.len()).unwrap_or(self.values.len())
    }

    /// Borrow one slot, failing on out-of-range access.
    pub fn value(&self, index: usize) -> Result<&Value, InternalError> {
        self.values
            .get(index)
            .ok_or_else(|| out_of_range(index, self.values.len()))
    }

    pub fn value_mut(&mut self, index: usize) -> Result<&mut Value, InternalError> {
        let len = self.values.len();
        self.values
            .get_mut(index)
            .ok_or_else(|| out_of_range(index, len))
    }

    /// Replace one slot; the set takes ownership of `value`.
    pub fn set(&mut self, index: usize, value: Value) -> Result<(), InternalError> {
        *self.value_mut(index)? = value;

        Ok(())
    }
}

fn out_of_range(index: usize, len: usize) -> InternalError {
    InternalError::invariant(
        ErrorOrigin::Value,
        format!("value set index {index} out of range (len {len})"),
    )
}
