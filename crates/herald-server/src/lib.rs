//! Herald push backend.
//!
//! Keeps the device registry and per-device tags in sync with client SDKs,
//! and serves each application's Android notification-channel configuration
//! from a read-through cache.

pub mod cache;
pub mod channels;
pub mod error;
pub mod identity;
pub mod services;
pub mod storage;
pub mod tags;

pub use error::{ErrorKind, ServiceError};
