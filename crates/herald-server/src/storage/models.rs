//! Data models for Herald storage.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A tenant's registered product.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Application {
    pub id: i64,
    pub uuid: String,
    pub account_id: i64,
    pub name: String,
    pub fcm_sender_id: String,
    #[serde(skip_serializing)]
    pub fcm_admin_json: String,
    pub url: String,
    pub auth_key: String,
    pub identity_verification: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Input for creating an application. The auth key is generated by the
/// application service, never supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct NewApplication {
    pub name: String,
    pub fcm_sender_id: String,
    pub fcm_admin_json: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AndroidGroup {
    pub id: i64,
    pub uuid: String,
    pub application_id: i64,
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
    #[sqlx(skip)]
    pub categories: Vec<AndroidGroupCategory>,
}

/// Notification-channel presentation settings for one category.
///
/// `sound`, `vibration`, `led` and `enable_badge` use `1` for "platform
/// default"; `priority` uses `"3"`; `lock_screen` defaults to `0`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AndroidGroupCategory {
    pub id: i64,
    pub uuid: String,
    pub android_group_id: i64,
    pub name: String,
    pub description: String,
    pub priority: String,
    pub sound: i64,
    pub sound_name: String,
    pub vibration: i64,
    pub vibration_pattern: String,
    pub led: i64,
    pub led_color: String,
    pub enable_badge: i64,
    pub lock_screen: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Writable category settings, used for both create and update.
#[derive(Debug, Clone)]
pub struct CategorySettings {
    pub name: String,
    pub description: String,
    pub priority: String,
    pub sound: i64,
    pub sound_name: String,
    pub vibration: i64,
    pub vibration_pattern: String,
    pub led: i64,
    pub led_color: String,
    pub enable_badge: i64,
    pub lock_screen: i64,
}

impl Default for CategorySettings {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            priority: "3".to_string(),
            sound: 1,
            sound_name: String::new(),
            vibration: 1,
            vibration_pattern: String::new(),
            led: 1,
            led_color: String::new(),
            enable_badge: 1,
            lock_screen: 0,
        }
    }
}

/// A registered client endpoint (push token, email or phone number).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Device {
    pub id: i64,
    pub uuid: String,
    pub application_id: i64,
    pub device_type: String,
    pub identifier: String,
    pub language: String,
    pub timezone: i64,
    pub app_version: String,
    pub device_vendor: String,
    pub device_model: String,
    pub device_os: String,
    pub device_os_version: String,
    pub adid: String,
    pub sdk: String,
    pub session_count: i64,
    pub notification_types: i64,
    pub longitude: f64,
    pub latitude: f64,
    pub country: String,
    pub external_user_id: String,
    pub badge_count: i64,
    pub amount_spent: f64,
    pub created_at: i64,
    pub updated_at: i64,
    #[sqlx(skip)]
    pub tags: BTreeMap<String, String>,
}

/// Full device payload for an upsert keyed on `(identifier, adid)`.
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistration {
    pub device_type: String,
    pub identifier: String,
    pub language: String,
    pub timezone: i64,
    pub app_version: String,
    pub device_vendor: String,
    pub device_model: String,
    pub device_os: String,
    pub device_os_version: String,
    pub adid: String,
    pub sdk: String,
    pub session_count: i64,
    pub notification_types: i64,
    pub longitude: f64,
    pub latitude: f64,
    pub country: String,
    pub external_user_id: String,
    /// Hex HMAC of `external_user_id`, checked when the application requires
    /// identity verification. Never persisted.
    pub external_user_id_hash: String,
    pub tags: BTreeMap<String, String>,
}

/// Partial device update. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct DevicePatch {
    pub device_type: Option<String>,
    pub identifier: Option<String>,
    pub language: Option<String>,
    pub timezone: Option<i64>,
    pub app_version: Option<String>,
    pub device_vendor: Option<String>,
    pub device_model: Option<String>,
    pub device_os: Option<String>,
    pub device_os_version: Option<String>,
    pub adid: Option<String>,
    pub sdk: Option<String>,
    pub session_count: Option<i64>,
    pub notification_types: Option<i64>,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub country: Option<String>,
    pub external_user_id: Option<String>,
    pub badge_count: Option<i64>,
    pub amount_spent: Option<f64>,
    pub tags: Option<BTreeMap<String, String>>,
}

impl DevicePatch {
    /// Overlay every present field onto `device`.
    pub fn apply_to(&self, device: &mut Device) {
        fn set<T: Clone>(slot: &mut T, value: Option<&T>) {
            if let Some(v) = value {
                slot.clone_from(v);
            }
        }

        set(&mut device.device_type, self.device_type.as_ref());
        set(&mut device.identifier, self.identifier.as_ref());
        set(&mut device.language, self.language.as_ref());
        set(&mut device.timezone, self.timezone.as_ref());
        set(&mut device.app_version, self.app_version.as_ref());
        set(&mut device.device_vendor, self.device_vendor.as_ref());
        set(&mut device.device_model, self.device_model.as_ref());
        set(&mut device.device_os, self.device_os.as_ref());
        set(&mut device.device_os_version, self.device_os_version.as_ref());
        set(&mut device.adid, self.adid.as_ref());
        set(&mut device.sdk, self.sdk.as_ref());
        set(&mut device.session_count, self.session_count.as_ref());
        set(&mut device.notification_types, self.notification_types.as_ref());
        set(&mut device.longitude, self.longitude.as_ref());
        set(&mut device.latitude, self.latitude.as_ref());
        set(&mut device.country, self.country.as_ref());
        set(&mut device.external_user_id, self.external_user_id.as_ref());
        set(&mut device.badge_count, self.badge_count.as_ref());
        set(&mut device.amount_spent, self.amount_spent.as_ref());
    }
}
