//! Storage layer tests for Herald.

use std::collections::BTreeMap;

use super::db::HeraldDatabase;
use super::models::{CategorySettings, DevicePatch, DeviceRegistration, NewApplication};
use herald_core::db::DatabaseError;

async fn test_db() -> HeraldDatabase {
    HeraldDatabase::open_in_memory().await.unwrap()
}

fn tags(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

fn new_app(name: &str) -> NewApplication {
    NewApplication {
        name: name.into(),
        ..NewApplication::default()
    }
}

fn registration(identifier: &str, adid: &str) -> DeviceRegistration {
    DeviceRegistration {
        device_type: "android".into(),
        identifier: identifier.into(),
        adid: adid.into(),
        language: "fa".into(),
        timezone: 12600,
        app_version: "2.1.1".into(),
        device_vendor: "Samsung".into(),
        device_model: "SM-989F".into(),
        device_os: "Android".into(),
        device_os_version: "8.0".into(),
        sdk: "1.0".into(),
        session_count: 1,
        notification_types: 1,
        ..DeviceRegistration::default()
    }
}

// === Application tests ===

#[tokio::test]
async fn create_and_get_application() {
    let db = test_db().await;
    let app = db
        .create_application(7, &new_app("Demo"), "key-1")
        .await
        .unwrap();

    assert_eq!(app.account_id, 7);
    assert_eq!(app.name, "Demo");
    assert!(!app.identity_verification);

    let by_uuid = db.get_application_by_uuid(&app.uuid).await.unwrap();
    assert_eq!(by_uuid.id, app.id);

    let scoped = db.get_account_application_by_uuid(8, &app.uuid).await;
    assert!(matches!(scoped, Err(DatabaseError::NotFound(_))));
}

#[tokio::test]
async fn missing_application_is_not_found() {
    let db = test_db().await;
    let err = db.get_application_by_uuid("nope").await.unwrap_err();
    assert!(matches!(err, DatabaseError::NotFound(_)));
}

#[tokio::test]
async fn duplicate_sender_id_conflicts() {
    let db = test_db().await;
    let app = NewApplication {
        fcm_sender_id: "sender-1".into(),
        ..new_app("A")
    };
    db.create_application(1, &app, "key-1").await.unwrap();

    let err = db.create_application(2, &app, "key-2").await.unwrap_err();
    assert!(matches!(err, DatabaseError::Conflict(_)));

    // Empty sender IDs are not unique.
    db.create_application(1, &new_app("B"), "key-3").await.unwrap();
    db.create_application(1, &new_app("C"), "key-4").await.unwrap();
    assert_eq!(db.list_applications(1).await.unwrap().len(), 3);
    assert_eq!(db.list_all_applications().await.unwrap().len(), 4);
}

#[tokio::test]
async fn update_auth_key_and_identity_flag() {
    let db = test_db().await;
    let app = db.create_application(1, &new_app("A"), "old").await.unwrap();

    db.update_auth_key(1, &app.uuid, "new").await.unwrap();
    db.update_identity_verification(1, &app.uuid, true)
        .await
        .unwrap();

    let reloaded = db.get_application_by_uuid(&app.uuid).await.unwrap();
    assert_eq!(reloaded.auth_key, "new");
    assert!(reloaded.identity_verification);

    let err = db.update_auth_key(2, &app.uuid, "x").await.unwrap_err();
    assert!(matches!(err, DatabaseError::NotFound(_)));
}

#[tokio::test]
async fn deleting_application_cascades_to_everything_it_owns() {
    let db = test_db().await;
    let app = db.create_application(1, &new_app("A"), "ka").await.unwrap();
    let other = db.create_application(1, &new_app("B"), "kb").await.unwrap();

    let group = db.create_android_group(app.id, "G").await.unwrap();
    db.create_android_category(app.id, &group.uuid, &CategorySettings::default())
        .await
        .unwrap();
    let mut reg = registration("token-a", "ad-1");
    reg.tags = tags(&[("level", "3")]);
    db.upsert_device(app.id, &reg).await.unwrap();
    let kept = db
        .upsert_device(other.id, &registration("token-b", "ad-1"))
        .await
        .unwrap();

    assert!(!db.delete_application(2, &app.uuid).await.unwrap());
    assert!(db.delete_application(1, &app.uuid).await.unwrap());

    for table in ["android_groups", "android_group_categories", "tags"] {
        let (n,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(n, 0, "{table} not emptied");
    }
    let (devices,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM devices")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(devices, 1);
    assert_eq!(db.get_device(&kept.uuid, other.id).await.unwrap().id, kept.id);
}

// === Android hierarchy tests ===

#[tokio::test]
async fn groups_load_with_their_categories() {
    let db = test_db().await;
    let app = db.create_application(1, &new_app("A"), "k").await.unwrap();

    let g1 = db.create_android_group(app.id, "Marketing").await.unwrap();
    let g2 = db.create_android_group(app.id, "Orders").await.unwrap();
    let settings = CategorySettings {
        name: "Promotions".into(),
        ..CategorySettings::default()
    };
    db.create_android_category(app.id, &g1.uuid, &settings)
        .await
        .unwrap();
    db.create_android_category(app.id, &g1.uuid, &settings)
        .await
        .unwrap();

    let groups = db.get_android_groups(app.id).await.unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].uuid, g1.uuid);
    assert_eq!(groups[0].categories.len(), 2);
    assert_eq!(groups[1].uuid, g2.uuid);
    assert!(groups[1].categories.is_empty());

    let c = &groups[0].categories[0];
    assert_eq!(c.priority, "3");
    assert_eq!(c.sound, 1);
    assert_eq!(c.lock_screen, 0);
}

#[tokio::test]
async fn update_and_delete_category() {
    let db = test_db().await;
    let app = db.create_application(1, &new_app("A"), "k").await.unwrap();
    let group = db.create_android_group(app.id, "G").await.unwrap();
    let category = db
        .create_android_category(app.id, &group.uuid, &CategorySettings::default())
        .await
        .unwrap();

    let updated = db
        .update_android_category(
            app.id,
            &group.uuid,
            &category.uuid,
            &CategorySettings {
                led: 2,
                led_color: "FF00FF00".into(),
                ..CategorySettings::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.led, 2);
    assert_eq!(updated.led_color, "FF00FF00");

    assert!(
        db.delete_android_category(app.id, &group.uuid, &category.uuid)
            .await
            .unwrap()
    );
    assert!(
        !db.delete_android_category(app.id, &group.uuid, &category.uuid)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn group_scoped_to_application() {
    let db = test_db().await;
    let a = db.create_application(1, &new_app("A"), "ka").await.unwrap();
    let b = db.create_application(1, &new_app("B"), "kb").await.unwrap();
    let group = db.create_android_group(a.id, "G").await.unwrap();

    let err = db
        .create_android_category(b.id, &group.uuid, &CategorySettings::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DatabaseError::NotFound(_)));

    let renamed = db
        .rename_android_group(a.id, &group.uuid, "Renamed")
        .await
        .unwrap();
    assert_eq!(renamed.name, "Renamed");
    assert!(!db.delete_android_group(b.id, &group.uuid).await.unwrap());
}

#[tokio::test]
async fn deleting_group_cascades_to_categories() {
    let db = test_db().await;
    let app = db.create_application(1, &new_app("A"), "k").await.unwrap();
    let group = db.create_android_group(app.id, "G").await.unwrap();
    db.create_android_category(app.id, &group.uuid, &CategorySettings::default())
        .await
        .unwrap();

    assert!(db.delete_android_group(app.id, &group.uuid).await.unwrap());

    let (remaining,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM android_group_categories")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}

// === Device tests ===

#[tokio::test]
async fn upsert_creates_then_overwrites_same_row() {
    let db = test_db().await;
    let app = db.create_application(1, &new_app("A"), "k").await.unwrap();

    let first = db
        .upsert_device(app.id, &registration("token-a", "ad-1"))
        .await
        .unwrap();

    let mut again = registration("token-a", "ad-1");
    again.app_version = "2.2.0".into();
    again.session_count = 5;
    let second = db.upsert_device(app.id, &again).await.unwrap();

    assert_eq!(second.id, first.id);
    assert_eq!(second.uuid, first.uuid);
    assert_eq!(second.created_at, first.created_at);
    assert_eq!(second.app_version, "2.2.0");
    assert_eq!(second.session_count, 5);

    let page = db.get_devices(app.id, 0, 10).await.unwrap();
    assert_eq!(page.len(), 1);
}

#[tokio::test]
async fn upsert_is_idempotent() {
    let db = test_db().await;
    let app = db.create_application(1, &new_app("A"), "k").await.unwrap();
    let mut reg = registration("token-a", "ad-1");
    reg.tags = tags(&[("level", "3")]);

    let first = db.upsert_device(app.id, &reg).await.unwrap();
    // Cross a second boundary so a rewritten timestamp would show.
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
    let second = db.upsert_device(app.id, &reg).await.unwrap();

    assert_eq!(second, first);
}

#[tokio::test]
async fn upsert_does_not_change_device_type() {
    let db = test_db().await;
    let app = db.create_application(1, &new_app("A"), "k").await.unwrap();
    db.upsert_device(app.id, &registration("token-a", "ad-1"))
        .await
        .unwrap();

    let mut ios = registration("token-a", "ad-1");
    ios.device_type = "ios".into();
    let device = db.upsert_device(app.id, &ios).await.unwrap();
    assert_eq!(device.device_type, "android");
}

#[tokio::test]
async fn upsert_across_applications_conflicts() {
    let db = test_db().await;
    let a = db.create_application(1, &new_app("A"), "ka").await.unwrap();
    let b = db.create_application(2, &new_app("B"), "kb").await.unwrap();

    let original = db
        .upsert_device(a.id, &registration("token-a", "ad-1"))
        .await
        .unwrap();

    let mut hijack = registration("token-a", "ad-1");
    hijack.language = "en".into();
    let err = db.upsert_device(b.id, &hijack).await.unwrap_err();
    assert!(matches!(err, DatabaseError::Conflict(_)));

    let untouched = db.get_device(&original.uuid, a.id).await.unwrap();
    assert_eq!(untouched.language, "fa");
    assert_eq!(untouched.application_id, a.id);
}

#[tokio::test]
async fn upsert_merges_tags_and_empty_value_deletes() {
    let db = test_db().await;
    let app = db.create_application(1, &new_app("A"), "k").await.unwrap();

    let mut reg = registration("token-a", "ad-1");
    reg.tags = tags(&[("level", "3"), ("vip", "yes")]);
    let device = db.upsert_device(app.id, &reg).await.unwrap();
    assert_eq!(device.tags, tags(&[("level", "3"), ("vip", "yes")]));

    reg.tags = tags(&[("vip", ""), ("plan", "gold")]);
    let device = db.upsert_device(app.id, &reg).await.unwrap();
    assert_eq!(device.tags, tags(&[("level", "3"), ("plan", "gold")]));
}

#[tokio::test]
async fn partial_update_writes_only_present_fields() {
    let db = test_db().await;
    let app = db.create_application(1, &new_app("A"), "k").await.unwrap();
    let mut reg = registration("token-a", "ad-1");
    reg.tags = tags(&[("level", "3")]);
    let before = db.upsert_device(app.id, &reg).await.unwrap();

    let patch = DevicePatch {
        badge_count: Some(4),
        ..DevicePatch::default()
    };
    let after = db.update_device_partial(&before.uuid, &patch).await.unwrap();

    assert_eq!(after.badge_count, 4);
    assert_eq!(after.timezone, before.timezone);
    assert_eq!(after.language, before.language);
    assert_eq!(after.session_count, before.session_count);
    assert_eq!(after.tags, before.tags);
}

#[tokio::test]
async fn partial_update_merges_tags_when_present() {
    let db = test_db().await;
    let app = db.create_application(1, &new_app("A"), "k").await.unwrap();
    let mut reg = registration("token-a", "ad-1");
    reg.tags = tags(&[("level", "3"), ("vip", "yes")]);
    let device = db.upsert_device(app.id, &reg).await.unwrap();

    let patch = DevicePatch {
        tags: Some(tags(&[("vip", "")])),
        ..DevicePatch::default()
    };
    let after = db.update_device_partial(&device.uuid, &patch).await.unwrap();
    assert_eq!(after.tags, tags(&[("level", "3")]));
}

#[tokio::test]
async fn partial_update_of_unknown_device_is_not_found() {
    let db = test_db().await;
    let err = db
        .update_device_partial("missing", &DevicePatch::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DatabaseError::NotFound(_)));
}

#[tokio::test]
async fn get_device_is_scoped_to_application() {
    let db = test_db().await;
    let a = db.create_application(1, &new_app("A"), "ka").await.unwrap();
    let b = db.create_application(1, &new_app("B"), "kb").await.unwrap();
    let device = db
        .upsert_device(a.id, &registration("token-a", "ad-1"))
        .await
        .unwrap();

    assert_eq!(db.get_device(&device.uuid, a.id).await.unwrap().id, device.id);
    let err = db.get_device(&device.uuid, b.id).await.unwrap_err();
    assert!(matches!(err, DatabaseError::NotFound(_)));
}

#[tokio::test]
async fn get_devices_pages_by_ascending_id() {
    let db = test_db().await;
    let app = db.create_application(1, &new_app("A"), "ka").await.unwrap();
    let other = db.create_application(1, &new_app("B"), "kb").await.unwrap();

    let mut ids = Vec::new();
    for i in 0..5 {
        let n = i.to_string();
        let mut reg = registration(&format!("token-{i}"), "ad");
        reg.tags = tags(&[("n", n.as_str())]);
        ids.push(db.upsert_device(app.id, &reg).await.unwrap().id);
        db.upsert_device(other.id, &registration(&format!("other-{i}"), "ad"))
            .await
            .unwrap();
    }

    let first = db.get_devices(app.id, 0, 2).await.unwrap();
    assert_eq!(first.iter().map(|d| d.id).collect::<Vec<_>>(), ids[..2]);
    assert_eq!(first[1].tags, tags(&[("n", "1")]));

    let rest = db.get_devices(app.id, first[1].id, 10).await.unwrap();
    assert_eq!(rest.iter().map(|d| d.id).collect::<Vec<_>>(), ids[2..]);
    assert!(rest.iter().all(|d| d.application_id == app.id));

    let empty = db.get_devices(app.id, ids[4], 10).await.unwrap();
    assert!(empty.is_empty());
}

#[tokio::test]
async fn user_tags_fan_out_within_application_and_user() {
    let db = test_db().await;
    let a = db.create_application(1, &new_app("A"), "ka").await.unwrap();
    let b = db.create_application(1, &new_app("B"), "kb").await.unwrap();

    let mut phone = registration("phone", "ad");
    phone.external_user_id = "u-12".into();
    let mut tablet = registration("tablet", "ad");
    tablet.external_user_id = "u-12".into();
    let mut stranger = registration("stranger", "ad");
    stranger.external_user_id = "u-99".into();
    let mut elsewhere = registration("elsewhere", "ad");
    elsewhere.external_user_id = "u-12".into();

    let phone = db.upsert_device(a.id, &phone).await.unwrap();
    let tablet = db.upsert_device(a.id, &tablet).await.unwrap();
    let stranger = db.upsert_device(a.id, &stranger).await.unwrap();
    let elsewhere = db.upsert_device(b.id, &elsewhere).await.unwrap();

    let touched = db
        .update_device_tags_by_user(a.id, "u-12", &tags(&[("plan", "gold")]))
        .await
        .unwrap();
    assert_eq!(touched, 2);

    for uuid in [&phone.uuid, &tablet.uuid] {
        let d = db.get_device(uuid, a.id).await.unwrap();
        assert_eq!(d.tags, tags(&[("plan", "gold")]));
    }
    assert!(db.get_device(&stranger.uuid, a.id).await.unwrap().tags.is_empty());
    assert!(db.get_device(&elsewhere.uuid, b.id).await.unwrap().tags.is_empty());
}
