//! Device and tag queries.
//!
//! Every write that touches both the device row and its tags runs in a single
//! transaction, so a failed tag statement rolls the device write back too.

use std::collections::{BTreeMap, HashMap};

use sqlx::SqliteConnection;
use tracing::debug;

use herald_core::db::{DatabaseError, unix_timestamp};

use super::db::HeraldDatabase;
use super::models::{Device, DevicePatch, DeviceRegistration};
use crate::tags::{apply_tag_operations, load_tags, plan_tag_merge};

/// Conflict-aware insert keyed on `(identifier, adid)`.
///
/// On conflict the mutable fields are overwritten (last write wins), but only
/// when the existing row belongs to the same application; otherwise nothing is
/// updated and `RETURNING` yields no row. `created_at` and `updated_at` are
/// outside the overwrite set, so an identical payload leaves the row as it was.
const UPSERT_DEVICE_SQL: &str = "INSERT INTO devices \
     (uuid, application_id, device_type, identifier, language, timezone, app_version, \
      device_vendor, device_model, device_os, device_os_version, adid, sdk, session_count, \
      notification_types, longitude, latitude, country, external_user_id, created_at, updated_at) \
     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
     ON CONFLICT(identifier, adid) DO UPDATE SET \
       language = excluded.language, \
       timezone = excluded.timezone, \
       app_version = excluded.app_version, \
       device_vendor = excluded.device_vendor, \
       device_model = excluded.device_model, \
       device_os = excluded.device_os, \
       device_os_version = excluded.device_os_version, \
       sdk = excluded.sdk, \
       session_count = excluded.session_count, \
       notification_types = excluded.notification_types, \
       longitude = excluded.longitude, \
       latitude = excluded.latitude, \
       country = excluded.country, \
       external_user_id = excluded.external_user_id \
     WHERE devices.application_id = excluded.application_id \
     RETURNING id";

const UPDATE_DEVICE_SQL: &str = "UPDATE devices SET \
     device_type = ?, identifier = ?, language = ?, timezone = ?, app_version = ?, \
     device_vendor = ?, device_model = ?, device_os = ?, device_os_version = ?, adid = ?, \
     sdk = ?, session_count = ?, notification_types = ?, longitude = ?, latitude = ?, \
     country = ?, external_user_id = ?, badge_count = ?, amount_spent = ?, updated_at = ? \
     WHERE id = ?";

/// Load one device row plus its tags on an open connection.
async fn fetch_device(conn: &mut SqliteConnection, id: i64) -> Result<Device, DatabaseError> {
    let mut device = sqlx::query_as::<_, Device>("SELECT * FROM devices WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("Device #{id}")))?;
    device.tags = load_tags(conn, id).await?;
    Ok(device)
}

impl HeraldDatabase {
    /// Insert or overwrite a device keyed on `(identifier, adid)` and merge its
    /// tags, all in one transaction.
    ///
    /// Fails with [`DatabaseError::Conflict`] when the key pair is already
    /// registered under a different application.
    pub async fn upsert_device(
        &self,
        application_id: i64,
        reg: &DeviceRegistration,
    ) -> Result<Device, DatabaseError> {
        let now = unix_timestamp();
        let uuid = uuid::Uuid::new_v4().to_string();

        let mut tx = self.pool().begin().await?;

        let row: Option<(i64,)> = sqlx::query_as(UPSERT_DEVICE_SQL)
            .bind(&uuid)
            .bind(application_id)
            .bind(&reg.device_type)
            .bind(&reg.identifier)
            .bind(&reg.language)
            .bind(reg.timezone)
            .bind(&reg.app_version)
            .bind(&reg.device_vendor)
            .bind(&reg.device_model)
            .bind(&reg.device_os)
            .bind(&reg.device_os_version)
            .bind(&reg.adid)
            .bind(&reg.sdk)
            .bind(reg.session_count)
            .bind(reg.notification_types)
            .bind(reg.longitude)
            .bind(reg.latitude)
            .bind(&reg.country)
            .bind(&reg.external_user_id)
            .bind(now)
            .bind(now)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| DatabaseError::Query(format!("failed to upsert device record: {e}")))?;

        let Some((device_id,)) = row else {
            return Err(DatabaseError::Conflict(format!(
                "device {} is registered to another application",
                reg.identifier
            )));
        };

        let ops = plan_tag_merge(device_id, &reg.tags);
        apply_tag_operations(&mut *tx, &ops).await?;

        let device = fetch_device(&mut *tx, device_id).await?;

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Query(format!("failed to commit device upsert: {e}")))?;

        debug!(device_id, tag_ops = ops.len(), "Device upserted");
        Ok(device)
    }

    /// Apply a partial update to the device `uuid`.
    ///
    /// The read, the overlay of present fields, the write and the tag merge
    /// all happen in one transaction.
    pub async fn update_device_partial(
        &self,
        uuid: &str,
        patch: &DevicePatch,
    ) -> Result<Device, DatabaseError> {
        let mut tx = self.pool().begin().await?;

        let mut device = sqlx::query_as::<_, Device>("SELECT * FROM devices WHERE uuid = ?")
            .bind(uuid)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Device {uuid}")))?;

        patch.apply_to(&mut device);

        sqlx::query(UPDATE_DEVICE_SQL)
            .bind(&device.device_type)
            .bind(&device.identifier)
            .bind(&device.language)
            .bind(device.timezone)
            .bind(&device.app_version)
            .bind(&device.device_vendor)
            .bind(&device.device_model)
            .bind(&device.device_os)
            .bind(&device.device_os_version)
            .bind(&device.adid)
            .bind(&device.sdk)
            .bind(device.session_count)
            .bind(device.notification_types)
            .bind(device.longitude)
            .bind(device.latitude)
            .bind(&device.country)
            .bind(&device.external_user_id)
            .bind(device.badge_count)
            .bind(device.amount_spent)
            .bind(unix_timestamp())
            .bind(device.id)
            .execute(&mut *tx)
            .await
            .map_err(|e| DatabaseError::Query(format!("failed to update device {uuid}: {e}")))?;

        if let Some(tags) = &patch.tags {
            let ops = plan_tag_merge(device.id, tags);
            apply_tag_operations(&mut *tx, &ops).await?;
        }

        let updated = fetch_device(&mut *tx, device.id).await?;

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Query(format!("failed to commit device update: {e}")))?;

        Ok(updated)
    }

    /// Get a device by UUID, scoped to its owning application.
    pub async fn get_device(&self, uuid: &str, application_id: i64) -> Result<Device, DatabaseError> {
        let mut conn = self.pool().acquire().await?;

        let mut device = sqlx::query_as::<_, Device>(
            "SELECT * FROM devices WHERE uuid = ? AND application_id = ?",
        )
        .bind(uuid)
        .bind(application_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("Device {uuid}")))?;

        device.tags = load_tags(&mut *conn, device.id).await?;
        Ok(device)
    }

    /// Keyset page of an application's devices: `id > last_id`, ascending,
    /// at most `limit` rows.
    pub async fn get_devices(
        &self,
        application_id: i64,
        last_id: i64,
        limit: u32,
    ) -> Result<Vec<Device>, DatabaseError> {
        let mut tx = self.pool().begin().await?;

        let mut devices = sqlx::query_as::<_, Device>(
            "SELECT * FROM devices WHERE application_id = ? AND id > ? ORDER BY id ASC LIMIT ?",
        )
        .bind(application_id)
        .bind(last_id)
        .bind(limit)
        .fetch_all(&mut *tx)
        .await?;

        if let (Some(first), Some(last)) = (devices.first(), devices.last()) {
            let rows: Vec<(i64, String, String)> = sqlx::query_as(
                "SELECT t.device_id, t.key, t.value FROM tags t \
                 JOIN devices d ON d.id = t.device_id \
                 WHERE d.application_id = ? AND t.device_id BETWEEN ? AND ?",
            )
            .bind(application_id)
            .bind(first.id)
            .bind(last.id)
            .fetch_all(&mut *tx)
            .await?;

            let mut by_device: HashMap<i64, BTreeMap<String, String>> = HashMap::new();
            for (device_id, key, value) in rows {
                by_device.entry(device_id).or_default().insert(key, value);
            }
            for device in &mut devices {
                device.tags = by_device.remove(&device.id).unwrap_or_default();
            }
        }

        tx.commit().await?;
        Ok(devices)
    }

    /// Merge `tags` into every device of `application_id` linked to
    /// `external_user_id`, as one transaction.
    ///
    /// Returns the number of devices touched.
    pub async fn update_device_tags_by_user(
        &self,
        application_id: i64,
        external_user_id: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<u64, DatabaseError> {
        let mut tx = self.pool().begin().await?;

        let ids: Vec<(i64,)> = sqlx::query_as(
            "SELECT id FROM devices WHERE application_id = ? AND external_user_id = ? ORDER BY id",
        )
        .bind(application_id)
        .bind(external_user_id)
        .fetch_all(&mut *tx)
        .await?;

        for (device_id,) in &ids {
            let ops = plan_tag_merge(*device_id, tags);
            apply_tag_operations(&mut *tx, &ops).await?;
        }

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Query(format!("failed to commit user tag update: {e}")))?;

        Ok(ids.len() as u64)
    }
}
