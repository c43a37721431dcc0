//! Application and Android channel hierarchy queries.

use std::collections::HashMap;

use herald_core::db::{DatabaseError, unix_timestamp};

use super::db::HeraldDatabase;
use super::models::{
    AndroidGroup, AndroidGroupCategory, Application, CategorySettings, NewApplication,
};

const UPDATE_CATEGORY_SQL: &str = "UPDATE android_group_categories SET \
     name = ?, description = ?, priority = ?, sound = ?, sound_name = ?, vibration = ?, \
     vibration_pattern = ?, led = ?, led_color = ?, enable_badge = ?, lock_screen = ?, \
     updated_at = ? \
     WHERE uuid = ? AND android_group_id = ? RETURNING *";

impl HeraldDatabase {
    // =========================================================================
    // Application queries
    // =========================================================================

    /// Create an application owned by `account_id`.
    ///
    /// A duplicate `auth_key` or non-empty `fcm_sender_id` yields
    /// [`DatabaseError::Conflict`].
    pub async fn create_application(
        &self,
        account_id: i64,
        app: &NewApplication,
        auth_key: &str,
    ) -> Result<Application, DatabaseError> {
        let now = unix_timestamp();
        let uuid = uuid::Uuid::new_v4().to_string();

        sqlx::query_as::<_, Application>(
            "INSERT INTO applications \
             (uuid, account_id, name, fcm_sender_id, fcm_admin_json, url, auth_key, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING *",
        )
        .bind(&uuid)
        .bind(account_id)
        .bind(&app.name)
        .bind(&app.fcm_sender_id)
        .bind(&app.fcm_admin_json)
        .bind(&app.url)
        .bind(auth_key)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool())
        .await
        .map_err(|e| DatabaseError::from_insert(e, "Application"))
    }

    /// Get an application by its external UUID.
    pub async fn get_application_by_uuid(&self, uuid: &str) -> Result<Application, DatabaseError> {
        sqlx::query_as::<_, Application>("SELECT * FROM applications WHERE uuid = ?")
            .bind(uuid)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Application {uuid}")))
    }

    /// Get an application by UUID, scoped to its owning account.
    pub async fn get_account_application_by_uuid(
        &self,
        account_id: i64,
        uuid: &str,
    ) -> Result<Application, DatabaseError> {
        sqlx::query_as::<_, Application>(
            "SELECT * FROM applications WHERE uuid = ? AND account_id = ?",
        )
        .bind(uuid)
        .bind(account_id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("Application {uuid}")))
    }

    /// List the applications of an account.
    pub async fn list_applications(&self, account_id: i64) -> Result<Vec<Application>, DatabaseError> {
        let apps = sqlx::query_as::<_, Application>(
            "SELECT * FROM applications WHERE account_id = ? ORDER BY id",
        )
        .bind(account_id)
        .fetch_all(self.pool())
        .await?;

        Ok(apps)
    }

    /// List every application.
    pub async fn list_all_applications(&self) -> Result<Vec<Application>, DatabaseError> {
        let apps = sqlx::query_as::<_, Application>("SELECT * FROM applications ORDER BY id")
            .fetch_all(self.pool())
            .await?;

        Ok(apps)
    }

    /// Replace the auth key of an application.
    pub async fn update_auth_key(
        &self,
        account_id: i64,
        uuid: &str,
        auth_key: &str,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "UPDATE applications SET auth_key = ?, updated_at = ? WHERE account_id = ? AND uuid = ?",
        )
        .bind(auth_key)
        .bind(unix_timestamp())
        .bind(account_id)
        .bind(uuid)
        .execute(self.pool())
        .await
        .map_err(|e| DatabaseError::from_insert(e, "Auth key"))?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("Application {uuid}")));
        }
        Ok(())
    }

    /// Toggle identity verification for an application.
    pub async fn update_identity_verification(
        &self,
        account_id: i64,
        uuid: &str,
        enabled: bool,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "UPDATE applications SET identity_verification = ?, updated_at = ? \
             WHERE account_id = ? AND uuid = ?",
        )
        .bind(enabled)
        .bind(unix_timestamp())
        .bind(account_id)
        .bind(uuid)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("Application {uuid}")));
        }
        Ok(())
    }

    /// Delete an application of `account_id`. Groups, categories, devices
    /// and tags go with it by cascade.
    ///
    /// Returns `true` if a row was deleted.
    pub async fn delete_application(&self, account_id: i64, uuid: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM applications WHERE account_id = ? AND uuid = ?")
            .bind(account_id)
            .bind(uuid)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Android group queries
    // =========================================================================

    /// Load every group of an application together with its categories.
    ///
    /// Groups and categories are read inside one transaction so the result is
    /// a consistent snapshot of the hierarchy.
    pub async fn get_android_groups(
        &self,
        application_id: i64,
    ) -> Result<Vec<AndroidGroup>, DatabaseError> {
        let mut tx = self.pool().begin().await?;

        let mut groups = sqlx::query_as::<_, AndroidGroup>(
            "SELECT * FROM android_groups WHERE application_id = ? ORDER BY id",
        )
        .bind(application_id)
        .fetch_all(&mut *tx)
        .await?;

        let categories = sqlx::query_as::<_, AndroidGroupCategory>(
            "SELECT c.* FROM android_group_categories c \
             JOIN android_groups g ON g.id = c.android_group_id \
             WHERE g.application_id = ? ORDER BY c.id",
        )
        .bind(application_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let mut by_group: HashMap<i64, Vec<AndroidGroupCategory>> = HashMap::new();
        for category in categories {
            by_group
                .entry(category.android_group_id)
                .or_default()
                .push(category);
        }
        for group in &mut groups {
            group.categories = by_group.remove(&group.id).unwrap_or_default();
        }

        Ok(groups)
    }

    /// Get a group by UUID within an application (without categories).
    pub async fn get_android_group(
        &self,
        application_id: i64,
        group_uuid: &str,
    ) -> Result<AndroidGroup, DatabaseError> {
        sqlx::query_as::<_, AndroidGroup>(
            "SELECT * FROM android_groups WHERE uuid = ? AND application_id = ?",
        )
        .bind(group_uuid)
        .bind(application_id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("Android group {group_uuid}")))
    }

    /// Create a group under an application.
    pub async fn create_android_group(
        &self,
        application_id: i64,
        name: &str,
    ) -> Result<AndroidGroup, DatabaseError> {
        let now = unix_timestamp();
        let uuid = uuid::Uuid::new_v4().to_string();

        sqlx::query_as::<_, AndroidGroup>(
            "INSERT INTO android_groups (uuid, application_id, name, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?) RETURNING *",
        )
        .bind(&uuid)
        .bind(application_id)
        .bind(name)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool())
        .await
        .map_err(|e| DatabaseError::from_insert(e, "Android group"))
    }

    /// Rename a group.
    pub async fn rename_android_group(
        &self,
        application_id: i64,
        group_uuid: &str,
        name: &str,
    ) -> Result<AndroidGroup, DatabaseError> {
        sqlx::query_as::<_, AndroidGroup>(
            "UPDATE android_groups SET name = ?, updated_at = ? \
             WHERE uuid = ? AND application_id = ? RETURNING *",
        )
        .bind(name)
        .bind(unix_timestamp())
        .bind(group_uuid)
        .bind(application_id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("Android group {group_uuid}")))
    }

    /// Delete a group; its categories are removed by cascade.
    ///
    /// Returns `true` if a row was deleted.
    pub async fn delete_android_group(
        &self,
        application_id: i64,
        group_uuid: &str,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM android_groups WHERE uuid = ? AND application_id = ?")
            .bind(group_uuid)
            .bind(application_id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Android category queries
    // =========================================================================

    /// Create a category under the group `group_uuid` of an application.
    pub async fn create_android_category(
        &self,
        application_id: i64,
        group_uuid: &str,
        settings: &CategorySettings,
    ) -> Result<AndroidGroupCategory, DatabaseError> {
        let group = self.get_android_group(application_id, group_uuid).await?;
        let now = unix_timestamp();
        let uuid = uuid::Uuid::new_v4().to_string();

        sqlx::query_as::<_, AndroidGroupCategory>(
            "INSERT INTO android_group_categories \
             (uuid, android_group_id, name, description, priority, sound, sound_name, vibration, \
              vibration_pattern, led, led_color, enable_badge, lock_screen, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING *",
        )
        .bind(&uuid)
        .bind(group.id)
        .bind(&settings.name)
        .bind(&settings.description)
        .bind(&settings.priority)
        .bind(settings.sound)
        .bind(&settings.sound_name)
        .bind(settings.vibration)
        .bind(&settings.vibration_pattern)
        .bind(settings.led)
        .bind(&settings.led_color)
        .bind(settings.enable_badge)
        .bind(settings.lock_screen)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool())
        .await
        .map_err(|e| DatabaseError::from_insert(e, "Android category"))
    }

    /// Overwrite every setting of a category.
    pub async fn update_android_category(
        &self,
        application_id: i64,
        group_uuid: &str,
        category_uuid: &str,
        settings: &CategorySettings,
    ) -> Result<AndroidGroupCategory, DatabaseError> {
        let group = self.get_android_group(application_id, group_uuid).await?;

        sqlx::query_as::<_, AndroidGroupCategory>(UPDATE_CATEGORY_SQL)
            .bind(&settings.name)
            .bind(&settings.description)
            .bind(&settings.priority)
            .bind(settings.sound)
            .bind(&settings.sound_name)
            .bind(settings.vibration)
            .bind(&settings.vibration_pattern)
            .bind(settings.led)
            .bind(&settings.led_color)
            .bind(settings.enable_badge)
            .bind(settings.lock_screen)
            .bind(unix_timestamp())
            .bind(category_uuid)
            .bind(group.id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Android category {category_uuid}")))
    }

    /// Delete a category. Returns `true` if a row was deleted.
    pub async fn delete_android_category(
        &self,
        application_id: i64,
        group_uuid: &str,
        category_uuid: &str,
    ) -> Result<bool, DatabaseError> {
        let group = self.get_android_group(application_id, group_uuid).await?;

        let result = sqlx::query(
            "DELETE FROM android_group_categories WHERE uuid = ? AND android_group_id = ?",
        )
        .bind(category_uuid)
        .bind(group.id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
