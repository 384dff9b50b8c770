//! DRM/KMS display management

pub mod buffer;
pub mod catalog;
pub mod device;
pub mod display;
pub mod kms;
#[cfg(test)]
pub mod mock;
pub mod mode;

pub use buffer::{allocate, map_buffer, MappedBuffer};
pub use catalog::{find_connector, list_connectors};
pub use device::Device;
pub use display::{bind, find_crtc, Binding};
pub use kms::{ConnectorRecord, KmsDevice, ModeRecord};
pub use mode::select_preferred_mode;
