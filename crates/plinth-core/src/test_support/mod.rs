//! In-crate doubles for engine tests.

pub mod couch;
