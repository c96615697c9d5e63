//! Connections, table handles, result lists and the engine contract.

pub mod backend;
mod connection;
mod object;
pub mod response;
pub mod revision;


// re-exports
pub use backend::{Backend, BackendEngine, BackendFactory, BackendState, EngineDescriptor};
pub use connection::Connection;
pub use object::Object;
pub use response::{ResultList, ResultRow, RowCursor};
