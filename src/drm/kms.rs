//! Kernel mode-setting seam
//!
//! `KmsDevice` is the narrow set of DRM calls the display pipeline needs.
//! The real implementation lives in `device.rs`; tests use `mock.rs`.
//! Everything crossing the seam is plain data keyed by kernel object ids.

use std::fmt;
use std::io;
use std::ops::DerefMut;

use bitflags::bitflags;
use drm::control::Mode;

bitflags! {
    /// Mode type bits (DRM_MODE_TYPE_*)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ModeType: u32 {
        const BUILTIN = 1 << 0;
        const CLOCK_C = (1 << 1) | (1 << 0);
        const CRTC_C = (1 << 2) | (1 << 0);
        const PREFERRED = 1 << 3;
        const DEFAULT = 1 << 4;
        const USERDEF = 1 << 5;
        const DRIVER = 1 << 6;
    }
}

/// Display timing as reported by the kernel (drm_mode_modeinfo)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeRecord {
    /// The kernel's own mode, handed back unchanged on SetCrtc.
    /// `None` for modes that were not read from a device.
    pub native: Option<Mode>,
    pub name: String,
    pub clock: u32,
    pub hdisplay: u16,
    pub hsync_start: u16,
    pub hsync_end: u16,
    pub htotal: u16,
    pub hskew: u16,
    pub vdisplay: u16,
    pub vsync_start: u16,
    pub vsync_end: u16,
    pub vtotal: u16,
    pub vscan: u16,
    pub vrefresh: u32,
    pub flags: u32,
    pub mode_type: ModeType,
}

impl ModeRecord {
    /// Visible size in pixels (width, height)
    pub fn size(&self) -> (u32, u32) {
        (self.hdisplay as u32, self.vdisplay as u32)
    }

    pub fn is_preferred(&self) -> bool {
        self.mode_type.contains(ModeType::PREFERRED)
    }
}

impl fmt::Display for ModeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} @ {}Hz", self.hdisplay, self.vdisplay, self.vrefresh)
    }
}

/// Connector query result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorRecord {
    pub id: u32,
    /// DRM_MODE_CONNECTOR_* code
    pub type_code: u32,
    /// Kernel-assigned per-type instance counter (the "1" in HDMI-A-1)
    pub type_index: u32,
    pub connected: bool,
    /// Encoder currently driving this connector
    pub encoder_id: Option<u32>,
    /// Encoders able to drive this connector
    pub encoders: Vec<u32>,
    pub modes: Vec<ModeRecord>,
}

/// Encoder query result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderRecord {
    pub id: u32,
    /// CRTC currently fed by this encoder
    pub crtc_id: Option<u32>,
    /// CRTCs this encoder can be routed to, in resource order
    pub possible_crtcs: Vec<u32>,
}

/// CRTC query result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrtcRecord {
    pub id: u32,
    pub fb_id: Option<u32>,
    pub position: (u32, u32),
    pub mode: Option<ModeRecord>,
}

/// Object ids known to the device
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceIds {
    pub connectors: Vec<u32>,
    pub encoders: Vec<u32>,
    pub crtcs: Vec<u32>,
    pub framebuffers: Vec<u32>,
}

/// Geometry of a dumb buffer as allocated by the kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumbBufferInfo {
    pub handle: u32,
    pub width: u32,
    pub height: u32,
    pub bpp: u32,
    /// Bytes per scanline, may exceed width * bpp / 8
    pub pitch: u32,
    /// Total byte size
    pub size: u64,
}

/// DRM device operations used by the display pipeline
pub trait KmsDevice {
    /// Shared read/write view of a dumb buffer; unmapped on drop
    type Mapping: DerefMut<Target = [u8]>;
    /// Device-side dumb buffer object
    type Dumb: Copy;

    fn query_resources(&self) -> io::Result<ResourceIds>;
    fn query_connector(&self, id: u32) -> io::Result<ConnectorRecord>;
    fn query_encoder(&self, id: u32) -> io::Result<EncoderRecord>;
    fn query_crtc(&self, id: u32) -> io::Result<CrtcRecord>;

    fn create_dumb(
        &self,
        width: u32,
        height: u32,
        bpp: u32,
    ) -> io::Result<(Self::Dumb, DumbBufferInfo)>;
    fn destroy_dumb(&self, buffer: Self::Dumb) -> io::Result<()>;

    /// Register a dumb buffer as a framebuffer object, returns the fb id
    fn add_fb(&self, buffer: &Self::Dumb, depth: u32, bpp: u32) -> io::Result<u32>;
    fn remove_fb(&self, fb_id: u32) -> io::Result<()>;

    /// Ask the kernel for the fake mmap offset of a dumb buffer
    fn map_offset(&self, buffer: &Self::Dumb) -> io::Result<u64>;
    fn map_shared(&self, offset: u64, len: usize) -> io::Result<Self::Mapping>;

    fn set_master(&self) -> io::Result<()>;
    fn drop_master(&self) -> io::Result<()>;

    /// SetCrtc; `fb_id = None` with no connectors and no mode disables the CRTC
    fn set_crtc_config(
        &self,
        crtc_id: u32,
        fb_id: Option<u32>,
        position: (u32, u32),
        connectors: &[u32],
        mode: Option<&ModeRecord>,
    ) -> io::Result<()>;
}
