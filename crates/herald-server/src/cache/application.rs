//! Typed access to the cached channel configuration.

use tracing::debug;

use super::{CacheError, KeyValueCache};
use crate::channels::ApplicationCachedDataModel;

/// Cache key of the Android channel configuration for an application.
pub fn android_params_key(app_uuid: &str) -> String {
    format!("App:{app_uuid}:AndroidParams")
}

/// JSON (de)serialising layer over a [`KeyValueCache`].
#[derive(Clone)]
pub struct ApplicationCache<C> {
    store: C,
}

impl<C: KeyValueCache> ApplicationCache<C> {
    pub const fn new(store: C) -> Self {
        Self { store }
    }

    /// Read the cached projection. `Ok(None)` means it was never built (or
    /// was evicted); a built-but-empty projection comes back as `Some`.
    pub async fn get_application_data(
        &self,
        app_uuid: &str,
    ) -> Result<Option<ApplicationCachedDataModel>, CacheError> {
        let Some(raw) = self.store.get(&android_params_key(app_uuid)).await? else {
            return Ok(None);
        };
        let model = serde_json::from_str(&raw)?;
        Ok(Some(model))
    }

    /// Write the projection with no expiry.
    pub async fn set_application_data(
        &self,
        app_uuid: &str,
        model: &ApplicationCachedDataModel,
    ) -> Result<(), CacheError> {
        let raw = serde_json::to_string(model)?;
        self.store
            .set(&android_params_key(app_uuid), &raw, None)
            .await?;
        debug!(app_uuid, channels = model.channel_list.len(), "Channel config cached");
        Ok(())
    }
}
