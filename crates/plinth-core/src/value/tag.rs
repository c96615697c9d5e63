use crate::value::ValueData;

///
/// ValueTag
///
/// Stable value-variant tag used by binders, renderers and diagnostics.
///

#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ValueTag {
    Empty = 0,
    Int32 = 1,
    Uint32 = 2,
    Int64 = 3,
    Uint64 = 4,
    Text = 5,
    Enum = 6,
}

impl ValueTag {
    #[must_use]
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Stable human-readable value kind label for diagnostics.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Empty => "Empty",
            Self::Int32 => "Int32",
            Self::Uint32 => "Uint32",
            Self::Int64 => "Int64",
            Self::Uint64 => "Uint64",
            Self::Text => "Text",
            Self::Enum => "Enum",
        }
    }

    /// True for the four fixed-width integer tags.
    #[must_use]
    pub const fn is_integer(self) -> bool {
        matches!(self, Self::Int32 | Self::Uint32 | Self::Int64 | Self::Uint64)
    }
}

/// Canonical tag for one payload.
#[must_use]
pub(crate) const fn canonical_tag(data: &ValueData) -> ValueTag {
    match data {
        ValueData::Empty => ValueTag::Empty,
        ValueData::Int32(_) => ValueTag::Int32,
        ValueData::Uint32(_) => ValueTag::Uint32,
        ValueData::Int64(_) => ValueTag::Int64,
        ValueData::Uint64(_) => ValueTag::Uint64,
        ValueData::Text(_) => ValueTag::Text,
        ValueData::Enum(_) => ValueTag::Enum,
    }
}
