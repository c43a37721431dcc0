//! Cache-aside access to the per-application Android channel configuration.
//!
//! A cached projection is served as-is with no freshness check. Hierarchy
//! mutations do not invalidate it; the only way to refresh an existing entry
//! is [`ChannelConfigService::rebuild_android_params`].

use tracing::{debug, info, instrument};

use crate::cache::{ApplicationCache, KeyValueCache};
use crate::channels::{ApplicationCachedDataModel, build_channel_config};
use crate::error::ServiceError;
use crate::storage::HeraldDatabase;

pub struct ChannelConfigService<C> {
    db: HeraldDatabase,
    cache: ApplicationCache<C>,
}

impl<C: KeyValueCache> ChannelConfigService<C> {
    pub const fn new(db: HeraldDatabase, cache: ApplicationCache<C>) -> Self {
        Self { db, cache }
    }

    /// Return the cached projection, building and caching it on a miss.
    #[instrument(skip(self))]
    pub async fn get_android_params(
        &self,
        app_uuid: &str,
    ) -> Result<ApplicationCachedDataModel, ServiceError> {
        if let Some(cached) = self.cache.get_application_data(app_uuid).await? {
            debug!("Channel config cache hit");
            return Ok(cached);
        }

        debug!("Channel config cache miss");
        self.build_and_store(app_uuid).await
    }

    /// Rebuild the projection from the relational store and overwrite the
    /// cached entry, whether or not one exists.
    #[instrument(skip(self))]
    pub async fn rebuild_android_params(
        &self,
        app_uuid: &str,
    ) -> Result<ApplicationCachedDataModel, ServiceError> {
        let model = self.build_and_store(app_uuid).await?;
        info!(channels = model.channel_list.len(), "Channel config rebuilt");
        Ok(model)
    }

    async fn build_and_store(
        &self,
        app_uuid: &str,
    ) -> Result<ApplicationCachedDataModel, ServiceError> {
        let app = self.db.get_application_by_uuid(app_uuid).await?;
        let groups = self.db.get_android_groups(app.id).await?;
        let model = build_channel_config(&app, &groups);
        self.cache.set_application_data(app_uuid, &model).await?;
        Ok(model)
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::cache::{CacheError, MemoryCache, android_params_key};
    use crate::error::ErrorKind;
    use crate::storage::{Application, CategorySettings, NewApplication};

    struct Fixture {
        db: HeraldDatabase,
        store: MemoryCache,
        svc: ChannelConfigService<MemoryCache>,
        app: Application,
        group_uuid: String,
        category_uuid: String,
    }

    async fn setup() -> Fixture {
        let db = HeraldDatabase::open_in_memory().await.unwrap();
        let app = db
            .create_application(
                1,
                &NewApplication {
                    name: "Demo".into(),
                    fcm_sender_id: "sender-1".into(),
                    ..NewApplication::default()
                },
                "secret",
            )
            .await
            .unwrap();
        let group = db.create_android_group(app.id, "Marketing").await.unwrap();
        let category = db
            .create_android_category(
                app.id,
                &group.uuid,
                &CategorySettings {
                    name: "Promotions".into(),
                    led: 2,
                    led_color: "FF0000FF".into(),
                    ..CategorySettings::default()
                },
            )
            .await
            .unwrap();

        let store = MemoryCache::new();
        let svc = ChannelConfigService::new(db.clone(), ApplicationCache::new(store.clone()));
        Fixture {
            db,
            store,
            svc,
            app,
            group_uuid: group.uuid,
            category_uuid: category.uuid,
        }
    }

    #[tokio::test]
    async fn miss_builds_and_caches_projection() {
        let f = setup().await;
        let model = f.svc.get_android_params(&f.app.uuid).await.unwrap();

        assert_eq!(model.fcm_id, "sender-1");
        assert!(model.receive_receipt);
        assert!(!model.firebase_analytics);
        assert_eq!(model.channel_list.len(), 1);

        let entry = &model.channel_list[0];
        assert_eq!(entry.channel.name, "Promotions");
        assert_eq!(entry.channel.group_name, "Marketing");
        assert_eq!(entry.led_color.as_deref(), Some("FF0000FF"));
        assert_eq!(entry.sound_name, None);
        assert_eq!(entry.priority, None);

        let raw = f
            .store
            .get(&android_params_key(&f.app.uuid))
            .await
            .unwrap()
            .unwrap();
        let cached: ApplicationCachedDataModel = serde_json::from_str(&raw).unwrap();
        assert_eq!(cached, model);
    }

    #[tokio::test]
    async fn hit_does_not_touch_database() {
        let f = setup().await;
        let first = f.svc.get_android_params(&f.app.uuid).await.unwrap();

        sqlx::query("DELETE FROM applications WHERE id = ?")
            .bind(f.app.id)
            .execute(f.db.pool())
            .await
            .unwrap();

        let second = f.svc.get_android_params(&f.app.uuid).await.unwrap();
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn category_change_is_not_visible_until_rebuild() {
        let f = setup().await;
        let before = f.svc.get_android_params(&f.app.uuid).await.unwrap();

        f.db
            .update_android_category(
                f.app.id,
                &f.group_uuid,
                &f.category_uuid,
                &CategorySettings {
                    name: "Promotions".into(),
                    ..CategorySettings::default()
                },
            )
            .await
            .unwrap();

        let stale = f.svc.get_android_params(&f.app.uuid).await.unwrap();
        assert_eq!(stale, before);
        assert!(stale.channel_list[0].led_color.is_some());

        let rebuilt = f.svc.rebuild_android_params(&f.app.uuid).await.unwrap();
        assert_eq!(rebuilt.channel_list[0].led_color, None);

        let fresh = f.svc.get_android_params(&f.app.uuid).await.unwrap();
        assert_eq!(fresh, rebuilt);
    }

    #[tokio::test]
    async fn application_without_groups_caches_empty_list() {
        let f = setup().await;
        let bare = f
            .db
            .create_application(1, &NewApplication::default(), "bare-secret")
            .await
            .unwrap();

        let model = f.svc.get_android_params(&bare.uuid).await.unwrap();
        assert!(model.channel_list.is_empty());
        assert!(
            f.store
                .get(&android_params_key(&bare.uuid))
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn unknown_application_is_not_found_and_not_cached() {
        let f = setup().await;
        let err = f.svc.get_android_params("missing").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(f.store.is_empty().await);
    }

    struct FailingCache;

    impl KeyValueCache for FailingCache {
        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Backend("connection refused".into()))
        }

        async fn set(
            &self,
            _key: &str,
            _value: &str,
            _ttl: Option<Duration>,
        ) -> Result<(), CacheError> {
            Err(CacheError::Backend("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn cache_failure_is_internal_error() {
        let f = setup().await;
        let svc = ChannelConfigService::new(f.db.clone(), ApplicationCache::new(FailingCache));
        let err = svc.get_android_params(&f.app.uuid).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InternalServerError);
        assert!(matches!(err, ServiceError::Cache(_)));
    }
}
