//! Global constants for kms-splash
//!
//! Defaults and pixel format parameters shared by the display pipeline.

// ============================================================================
// Defaults
// ============================================================================

/// DRM device opened when the config file does not name one
pub const DEFAULT_DRI_DEVICE: &str = "/dev/dri/card0";

/// Connector used when the config file does not name one
pub const DEFAULT_CONNECTOR: &str = "HDMI-A-1";

/// System-wide configuration file
pub const SYSTEM_CONFIG_PATH: &str = "/etc/kms-splash/config.toml";

// ============================================================================
// Pixel Format
// ============================================================================

/// Bits per pixel of the dumb buffer (XRGB8888)
pub const BITS_PER_PIXEL: u32 = 32;

/// Colour depth registered with ADDFB (alpha byte unused)
pub const COLOR_DEPTH: u32 = 24;
