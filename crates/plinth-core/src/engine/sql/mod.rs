//! Relational compiler shared by the embedded and client/server engines:
//! statement builders, parameter binding and truncation-aware fetch.

pub mod bind;
pub mod fetch;
pub mod statement;


// re-exports
pub use bind::{ParamBinder, bind_params, bind_value};
pub use fetch::{
    ColumnShape, FetchStatus, RawCell, RawRowCursor, RowSource, decode_row, fetch_text,
    single_count,
};
pub use statement::CompiledStatement;
