//! Derived notification-channel configuration.
//!
//! Client SDKs fetch this projection often, over constrained links, so every
//! presentation setting still at its platform default is left out. Each
//! setting has its own "use default" sentinel; the encodings are inherited
//! from stored data and are deliberately not unified.

use serde::{Deserialize, Serialize};

use crate::storage::{AndroidGroup, AndroidGroupCategory, Application};

/// `sound == 1` means "platform default sound".
pub const SOUND_DEFAULT: i64 = 1;
/// `vibration == 1` means "platform default vibration".
pub const VIBRATION_DEFAULT: i64 = 1;
/// `led == 1` means "platform default LED".
pub const LED_DEFAULT: i64 = 1;
/// `enable_badge == 1` means "platform default badge behaviour".
pub const BADGE_DEFAULT: i64 = 1;
/// Default importance tier.
pub const PRIORITY_DEFAULT: &str = "3";

/// Identity of one channel and the group it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDataModel {
    pub id: String,
    pub name: String,
    pub description: String,
    pub group_id: String,
    pub group_name: String,
}

/// One channel entry carrying only non-default settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelListDataModel {
    pub channel: ChannelDataModel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub led_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vibration_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
}

/// Cached per-application channel configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationCachedDataModel {
    pub channel_list: Vec<ChannelListDataModel>,
    pub use_identity_verification: bool,
    pub fcm_id: String,
    pub receive_receipt: bool,
    pub firebase_analytics: bool,
    pub clean_group_on_summary_click: bool,
}

impl Default for ApplicationCachedDataModel {
    fn default() -> Self {
        Self {
            channel_list: Vec::new(),
            use_identity_verification: false,
            fcm_id: String::new(),
            receive_receipt: true,
            firebase_analytics: false,
            clean_group_on_summary_click: false,
        }
    }
}

/// Build the channel entry for one category of `group`.
pub fn build_channel(group: &AndroidGroup, category: &AndroidGroupCategory) -> ChannelListDataModel {
    ChannelListDataModel {
        channel: ChannelDataModel {
            id: category.uuid.clone(),
            name: category.name.clone(),
            description: category.description.clone(),
            group_id: group.uuid.clone(),
            group_name: group.name.clone(),
        },
        sound_name: (category.sound != SOUND_DEFAULT).then(|| category.sound_name.clone()),
        led_color: (category.led != LED_DEFAULT).then(|| category.led_color.clone()),
        vibration_pattern: (category.vibration != VIBRATION_DEFAULT)
            .then(|| category.vibration_pattern.clone()),
        priority: (category.priority != PRIORITY_DEFAULT).then(|| category.priority.clone()),
        badge: (category.enable_badge != BADGE_DEFAULT).then(|| category.enable_badge.to_string()),
    }
}

/// Project an application and its group/category hierarchy.
///
/// Analytics and summary-click behaviour are not stored per application yet,
/// so they carry fixed values.
pub fn build_channel_config(app: &Application, groups: &[AndroidGroup]) -> ApplicationCachedDataModel {
    let channel_list = groups
        .iter()
        .flat_map(|group| group.categories.iter().map(move |c| build_channel(group, c)))
        .collect();

    ApplicationCachedDataModel {
        channel_list,
        use_identity_verification: app.identity_verification,
        fcm_id: app.fcm_sender_id.clone(),
        ..ApplicationCachedDataModel::default()
    }
}
