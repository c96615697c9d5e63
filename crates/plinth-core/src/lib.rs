//! Core runtime for plinth: the typed value and clause model, the backend
//! contract, the per-engine query compilers and the row cursor.
//!
//! ## Layout
//! - `pool`: fixed-size-class allocator backing statement text and column
//!   fetch buffers.
//! - `value`, `model`, `query`: what callers describe (scalars, schemas,
//!   predicate trees and joins).
//! - `db`: connections, table handles, backends, result lists and the
//!   revision protocol.
//! - `engine`: the relational compiler and the `sqlite`, `mysql` and
//!   `couchdb` engines.
//! - `config`: ordered key/value configuration, optionally loaded from TOML.

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod model;
pub mod pool;
pub mod query;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_support;

///
/// Prelude
///
/// Vocabulary needed to describe a table and query it. Engines, renderers
/// and the allocator stay in their modules.
///

pub mod prelude {
    pub use crate::{
        config::ConfigurationList,
        db::{Connection, Object, ResultList, ResultRow},
        model::{EnumCodeTable, FieldKind, ObjectField, ObjectFieldList, ObjectSchema},
        query::{Clause, ClauseList, CompareOp, Join, JoinList},
        value::{Value, ValueEnum, ValueSet},
    };
}
