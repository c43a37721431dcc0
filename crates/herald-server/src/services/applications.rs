//! Application management and the Android group/category hierarchy.
//!
//! Mutations here never touch the cached channel configuration. A changed
//! hierarchy becomes visible to SDKs only after
//! [`ChannelConfigService::rebuild_android_params`](super::ChannelConfigService::rebuild_android_params).

use tracing::{info, instrument, warn};

use crate::error::ServiceError;
use crate::identity::generate_auth_key;
use crate::storage::{
    AndroidGroup, AndroidGroupCategory, Application, CategorySettings, HeraldDatabase,
    NewApplication,
};

pub struct ApplicationService {
    db: HeraldDatabase,
}

impl ApplicationService {
    pub const fn new(db: HeraldDatabase) -> Self {
        Self { db }
    }

    /// Create an application with a freshly generated auth key.
    #[instrument(skip(self, app), fields(name = %app.name))]
    pub async fn create(
        &self,
        account_id: i64,
        app: &NewApplication,
    ) -> Result<Application, ServiceError> {
        if app.name.is_empty() {
            return Err(ServiceError::BadRequest("name is required".into()));
        }
        let created = self
            .db
            .create_application(account_id, app, &generate_auth_key())
            .await?;
        info!(app_uuid = %created.uuid, "Application created");
        Ok(created)
    }

    pub async fn list(&self, account_id: i64) -> Result<Vec<Application>, ServiceError> {
        Ok(self.db.list_applications(account_id).await?)
    }

    pub async fn details(&self, account_id: i64, uuid: &str) -> Result<Application, ServiceError> {
        Ok(self.db.get_account_application_by_uuid(account_id, uuid).await?)
    }

    /// Every application across all accounts, for operator tooling.
    pub async fn list_all(&self) -> Result<Vec<Application>, ServiceError> {
        Ok(self.db.list_all_applications().await?)
    }

    /// Delete an application with its channel hierarchy and devices.
    ///
    /// A cached channel configuration for the UUID is left in place.
    #[instrument(skip(self))]
    pub async fn delete(&self, account_id: i64, uuid: &str) -> Result<(), ServiceError> {
        if self.db.delete_application(account_id, uuid).await? {
            info!("Application deleted");
            Ok(())
        } else {
            Err(ServiceError::NotFound(format!("Application {uuid}")))
        }
    }

    /// Replace the auth key and return the new one. Identity hashes computed
    /// with the old key stop verifying immediately.
    #[instrument(skip(self))]
    pub async fn rotate_auth_key(&self, account_id: i64, uuid: &str) -> Result<String, ServiceError> {
        let key = generate_auth_key();
        self.db.update_auth_key(account_id, uuid, &key).await?;
        info!("Auth key rotated");
        Ok(key)
    }

    #[instrument(skip(self))]
    pub async fn set_identity_verification(
        &self,
        account_id: i64,
        uuid: &str,
        enabled: bool,
    ) -> Result<(), ServiceError> {
        self.db
            .update_identity_verification(account_id, uuid, enabled)
            .await?;
        Ok(())
    }

    /// Authenticate an SDK request carrying the application's auth key.
    pub async fn check_application_token(
        &self,
        auth_key: &str,
        uuid: &str,
    ) -> Result<Application, ServiceError> {
        let app = self.db.get_application_by_uuid(uuid).await?;
        if app.auth_key.is_empty() || app.auth_key != auth_key {
            warn!(app_uuid = %uuid, "Invalid application auth key");
            return Err(ServiceError::Unauthorized("invalid application token".into()));
        }
        Ok(app)
    }

    // =========================================================================
    // Android groups
    // =========================================================================

    pub async fn get_android_groups(&self, app_uuid: &str) -> Result<Vec<AndroidGroup>, ServiceError> {
        let app = self.db.get_application_by_uuid(app_uuid).await?;
        Ok(self.db.get_android_groups(app.id).await?)
    }

    #[instrument(skip(self))]
    pub async fn create_android_group(
        &self,
        account_id: i64,
        app_uuid: &str,
        name: &str,
    ) -> Result<AndroidGroup, ServiceError> {
        let app = self.db.get_account_application_by_uuid(account_id, app_uuid).await?;
        Ok(self.db.create_android_group(app.id, name).await?)
    }

    #[instrument(skip(self))]
    pub async fn rename_android_group(
        &self,
        account_id: i64,
        app_uuid: &str,
        group_uuid: &str,
        name: &str,
    ) -> Result<AndroidGroup, ServiceError> {
        let app = self.db.get_account_application_by_uuid(account_id, app_uuid).await?;
        Ok(self.db.rename_android_group(app.id, group_uuid, name).await?)
    }

    /// Delete a group and, by cascade, its categories.
    #[instrument(skip(self))]
    pub async fn delete_android_group(
        &self,
        account_id: i64,
        app_uuid: &str,
        group_uuid: &str,
    ) -> Result<(), ServiceError> {
        let app = self.db.get_account_application_by_uuid(account_id, app_uuid).await?;
        if self.db.delete_android_group(app.id, group_uuid).await? {
            Ok(())
        } else {
            Err(ServiceError::NotFound(format!("Android group {group_uuid}")))
        }
    }

    // =========================================================================
    // Android categories
    // =========================================================================

    #[instrument(skip(self, settings))]
    pub async fn create_android_category(
        &self,
        account_id: i64,
        app_uuid: &str,
        group_uuid: &str,
        settings: &CategorySettings,
    ) -> Result<AndroidGroupCategory, ServiceError> {
        let app = self.db.get_account_application_by_uuid(account_id, app_uuid).await?;
        Ok(self
            .db
            .create_android_category(app.id, group_uuid, settings)
            .await?)
    }

    #[instrument(skip(self, settings))]
    pub async fn update_android_category(
        &self,
        account_id: i64,
        app_uuid: &str,
        group_uuid: &str,
        category_uuid: &str,
        settings: &CategorySettings,
    ) -> Result<AndroidGroupCategory, ServiceError> {
        let app = self.db.get_account_application_by_uuid(account_id, app_uuid).await?;
        Ok(self
            .db
            .update_android_category(app.id, group_uuid, category_uuid, settings)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn delete_android_category(
        &self,
        account_id: i64,
        app_uuid: &str,
        group_uuid: &str,
        category_uuid: &str,
    ) -> Result<(), ServiceError> {
        let app = self.db.get_account_application_by_uuid(account_id, app_uuid).await?;
        if self
            .db
            .delete_android_category(app.id, group_uuid, category_uuid)
            .await?
        {
            Ok(())
        } else {
            Err(ServiceError::NotFound(format!(
                "Android category {category_uuid}"
            )))
        }
    }
}
