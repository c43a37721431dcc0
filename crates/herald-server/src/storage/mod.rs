//! SQLite storage for Herald.
//!
//! Provides persistence for applications, the Android channel hierarchy,
//! devices and their tags.

mod db;
mod models;
mod queries_applications;
mod queries_devices;

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests;

pub use db::HeraldDatabase;
pub use herald_core::db::DatabaseError;
pub use models::*;
