//! Device sync service.
//!
//! Every operation resolves the owning application by UUID first, so devices
//! are only ever reached through their application.

use std::collections::BTreeMap;

use tracing::{debug, info, instrument, warn};

use crate::error::ServiceError;
use crate::identity::verify_identity_hash;
use crate::storage::{Application, Device, DevicePatch, DeviceRegistration, HeraldDatabase};

pub struct DeviceService {
    db: HeraldDatabase,
    max_page_size: u32,
}

impl DeviceService {
    pub const fn new(db: HeraldDatabase, max_page_size: u32) -> Self {
        Self { db, max_page_size }
    }

    /// Register a device or overwrite the one with the same
    /// `(identifier, adid)`, merging its tags.
    ///
    /// When the application requires identity verification and the payload
    /// names an external user, the supplied hash must match or the call fails
    /// with `Unauthorized`.
    #[instrument(skip(self, reg), fields(identifier = %reg.identifier))]
    pub async fn upsert(
        &self,
        reg: &DeviceRegistration,
        app_uuid: &str,
    ) -> Result<Device, ServiceError> {
        let app = self.db.get_application_by_uuid(app_uuid).await?;
        check_identity(&app, reg)?;

        let device = self.db.upsert_device(app.id, reg).await?;
        info!(
            app_uuid,
            device_id = device.id,
            tags = reg.tags.len(),
            "Device upserted"
        );
        Ok(device)
    }

    /// Write only the fields present in `patch`.
    #[instrument(skip(self, patch))]
    pub async fn update_partial(
        &self,
        device_uuid: &str,
        patch: &DevicePatch,
    ) -> Result<Device, ServiceError> {
        let device = self.db.update_device_partial(device_uuid, patch).await?;
        debug!(device_id = device.id, "Device partially updated");
        Ok(device)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, device_uuid: &str, app_uuid: &str) -> Result<Device, ServiceError> {
        let app = self.db.get_application_by_uuid(app_uuid).await?;
        Ok(self.db.get_device(device_uuid, app.id).await?)
    }

    /// Keyset page of devices with `id > last_id`.
    ///
    /// `limit` is clamped to `1..=max_page_size`; `0` asks for a full page.
    #[instrument(skip(self))]
    pub async fn get_list(
        &self,
        app_uuid: &str,
        last_id: i64,
        limit: u32,
    ) -> Result<Vec<Device>, ServiceError> {
        let app = self.db.get_application_by_uuid(app_uuid).await?;
        let limit = self.page_limit(limit);
        let devices = self.db.get_devices(app.id, last_id, limit).await?;
        debug!(count = devices.len(), limit, "Device page loaded");
        Ok(devices)
    }

    /// Merge `tags` into every device of the application linked to
    /// `external_user_id`. Returns the number of devices touched.
    #[instrument(skip(self, tags), fields(tags = tags.len()))]
    pub async fn update_user_tags(
        &self,
        app_uuid: &str,
        external_user_id: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<u64, ServiceError> {
        if external_user_id.is_empty() {
            return Err(ServiceError::BadRequest(
                "external_user_id is required".into(),
            ));
        }

        let app = self.db.get_application_by_uuid(app_uuid).await?;
        let touched = self
            .db
            .update_device_tags_by_user(app.id, external_user_id, tags)
            .await?;
        info!(app_uuid, devices = touched, "User tags updated");
        Ok(touched)
    }

    fn page_limit(&self, requested: u32) -> u32 {
        let max = self.max_page_size.max(1);
        if requested == 0 { max } else { requested.min(max) }
    }
}

fn check_identity(app: &Application, reg: &DeviceRegistration) -> Result<(), ServiceError> {
    if !app.identity_verification || reg.external_user_id.is_empty() {
        return Ok(());
    }
    if verify_identity_hash(
        &reg.external_user_id,
        &reg.external_user_id_hash,
        &app.auth_key,
    ) {
        Ok(())
    } else {
        warn!(app_uuid = %app.uuid, "External user ID hash mismatch");
        Err(ServiceError::Unauthorized(
            "external_user_id_hash does not match".into(),
        ))
    }
}
