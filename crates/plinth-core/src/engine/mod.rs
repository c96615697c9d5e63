//! Storage engines behind the `BackendEngine` contract.
//!
//! `sql` holds the relational compiler shared by `sqlite` and `mysql`; each
//! concrete engine is gated by the cargo feature of the same name.

pub mod sql;

#[cfg(feature = "couchdb")]
pub mod couchdb;
#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "sqlite")]
pub mod sqlite;
