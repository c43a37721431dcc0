//! Service layer: classified operations over storage and cache.

mod applications;
mod channel_config;
mod devices;

pub use applications::ApplicationService;
pub use channel_config::ChannelConfigService;
pub use devices::DeviceService;
