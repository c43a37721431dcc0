//! Ephemeral OAuth state tokens.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;

use super::{CacheError, KeyValueCache};

/// Lifetime of an issued state token.
pub const STATE_TTL: Duration = Duration::from_secs(30 * 60);

const STATE_KEY_BYTES: usize = 32;

/// OAuth state tokens handed to the dashboard's authorization redirect and
/// read back by its callback handler.
#[derive(Clone)]
pub struct StateStore<C> {
    store: C,
}

impl<C: KeyValueCache> StateStore<C> {
    pub const fn new(store: C) -> Self {
        Self { store }
    }

    /// Store `value` under a fresh random key and return the key.
    pub async fn issue_state(&self, value: &str) -> Result<String, CacheError> {
        let mut bytes = [0u8; STATE_KEY_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        let key = URL_SAFE_NO_PAD.encode(bytes);
        self.set_state(&key, value).await?;
        Ok(key)
    }

    pub async fn set_state(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.store.set(key, value, Some(STATE_TTL)).await
    }

    /// `Ok(None)` when the key was never issued or has expired.
    pub async fn get_state(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.store.get(key).await
    }
}
