//! Backend-agnostic table access over embedded, client/server and document
//! stores.
//!
//! Describe a table with an [`model::ObjectSchema`], open a
//! [`db::Connection`] from a [`config::ConfigurationList`] whose `backend`
//! key names the engine, then drive reads and writes through a
//! [`db::Object`]. Engines are selected by cargo feature: `sqlite`, `mysql`
//! and `couchdb` (all on by default).
//!
//! ```ignore
//! use plinth::prelude::*;
//!
//! let config = ConfigurationList::new()
//!     .with("backend", "sqlite")?
//!     .with("file", "app.sqlite")?;
//! let connection = plinth::connect(&config)?;
//! let users = Object::new(&connection, schema);
//! let rows = users.read(&JoinList::new(), &ClauseList::new())?;
//! ```

mod error;

#[cfg(test)]
mod tests;

pub use plinth_core as core;
pub use plinth_core::{config, db, engine, model, query, value};

// re-exports
pub use error::{Error, ErrorKind, ErrorOrigin};

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Open a connection to the engine named by the `backend` key.
pub fn connect(config: &config::ConfigurationList) -> Result<db::Connection<'_>, Error> {
    Ok(db::Connection::open(config)?)
}

/// Load a TOML section, apply `PLINTH_<KEY>` overrides from the
/// environment, and return the resulting configuration.
pub fn load_config(
    path: impl AsRef<std::path::Path>,
    section: &str,
) -> Result<config::ConfigurationList, Error> {
    Ok(config::ConfigurationList::from_toml_file_section(path, section)?.with_env_overrides())
}

///
/// Prelude
///

pub mod prelude {
    pub use crate::{Error, ErrorKind, connect};
    pub use plinth_core::prelude::*;
}
