//! DRM device management
//!
//! Opens the DRM device (/dev/dri/card*) and implements `KmsDevice` on it
//! through the drm crate. Only the dumb buffer mapping is done by hand: the
//! kernel hands out a fake offset and the buffer is mapped with memmap2.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::io::{AsFd, AsRawFd, BorrowedFd};
use std::path::Path;

use drm::buffer::{Buffer, DrmFourcc};
use drm::control::dumbbuffer::DumbBuffer;
use drm::control::{connector, crtc, encoder, framebuffer, Device as ControlDevice, Mode};
use drm::Device as BasicDevice;
use log::{debug, info};
use memmap2::{MmapMut, MmapOptions};

use super::kms::{
    ConnectorRecord, CrtcRecord, DumbBufferInfo, EncoderRecord, KmsDevice, ModeRecord, ModeType,
    ResourceIds,
};
use crate::error::DisplayError;

/// DRM device wrapper
pub struct Device {
    file: File,
}

// Trait implementations required by drm crate
impl AsFd for Device {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

impl BasicDevice for Device {}
impl ControlDevice for Device {}

impl Device {
    /// Open DRM device
    ///
    /// # Arguments
    /// * `path` - Device path (e.g., "/dev/dri/card0")
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DisplayError> {
        let path = path.as_ref();
        info!("Opening DRM device: {}", path.display());

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| DisplayError::DeviceOpen {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self { file })
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        debug!("Closing DRM device fd {}", self.file.as_raw_fd());
    }
}

fn handle<T: From<drm::control::RawResourceHandle>>(kind: &str, id: u32) -> io::Result<T> {
    drm::control::from_u32(id).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} id {} is not a valid handle", kind, id),
        )
    })
}

fn mode_record(mode: &Mode) -> ModeRecord {
    let (hdisplay, vdisplay) = mode.size();
    let (hsync_start, hsync_end, htotal) = mode.hsync();
    let (vsync_start, vsync_end, vtotal) = mode.vsync();
    ModeRecord {
        native: Some(*mode),
        name: mode.name().to_string_lossy().into_owned(),
        clock: mode.clock(),
        hdisplay,
        hsync_start,
        hsync_end,
        htotal,
        hskew: mode.hskew(),
        vdisplay,
        vsync_start,
        vsync_end,
        vtotal,
        vscan: mode.vscan(),
        vrefresh: mode.vrefresh(),
        flags: mode.flags().bits(),
        mode_type: ModeType::from_bits_retain(mode.mode_type().bits()),
    }
}

/// The kernel mode behind a record; SetCrtc only accepts modes it reported
fn native_mode(mode: &ModeRecord) -> io::Result<Mode> {
    mode.native.ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("mode {} was not read from this device", mode.name),
        )
    })
}

impl KmsDevice for Device {
    type Mapping = MmapMut;
    type Dumb = DumbBuffer;

    fn query_resources(&self) -> io::Result<ResourceIds> {
        let resources = self.resource_handles()?;
        debug!(
            "DRM resources: connectors={}, crtcs={}, encoders={}, framebuffers={}",
            resources.connectors().len(),
            resources.crtcs().len(),
            resources.encoders().len(),
            resources.framebuffers().len()
        );
        Ok(ResourceIds {
            connectors: resources.connectors().iter().map(|&h| u32::from(h)).collect(),
            encoders: resources.encoders().iter().map(|&h| u32::from(h)).collect(),
            crtcs: resources.crtcs().iter().map(|&h| u32::from(h)).collect(),
            framebuffers: resources
                .framebuffers()
                .iter()
                .map(|&h| u32::from(h))
                .collect(),
        })
    }

    fn query_connector(&self, id: u32) -> io::Result<ConnectorRecord> {
        let h: connector::Handle = handle("connector", id)?;
        // No forced probe: report what the kernel already knows
        let info = self.get_connector(h, false)?;
        Ok(ConnectorRecord {
            id,
            type_code: u32::from(info.interface()),
            type_index: info.interface_id(),
            connected: info.state() == connector::State::Connected,
            encoder_id: info.current_encoder().map(u32::from),
            encoders: info.encoders().iter().map(|&e| u32::from(e)).collect(),
            modes: info.modes().iter().map(mode_record).collect(),
        })
    }

    fn query_encoder(&self, id: u32) -> io::Result<EncoderRecord> {
        let h: encoder::Handle = handle("encoder", id)?;
        let info = self.get_encoder(h)?;
        let resources = self.resource_handles()?;
        Ok(EncoderRecord {
            id,
            crtc_id: info.crtc().map(u32::from),
            possible_crtcs: resources
                .filter_crtcs(info.possible_crtcs())
                .into_iter()
                .map(u32::from)
                .collect(),
        })
    }

    fn query_crtc(&self, id: u32) -> io::Result<CrtcRecord> {
        let h: crtc::Handle = handle("CRTC", id)?;
        let info = self.get_crtc(h)?;
        Ok(CrtcRecord {
            id,
            fb_id: info.framebuffer().map(u32::from),
            position: info.position(),
            mode: info.mode().as_ref().map(mode_record),
        })
    }

    fn create_dumb(
        &self,
        width: u32,
        height: u32,
        bpp: u32,
    ) -> io::Result<(DumbBuffer, DumbBufferInfo)> {
        let buffer = self.create_dumb_buffer((width, height), DrmFourcc::Xrgb8888, bpp)?;
        let (width, height) = buffer.size();
        let info = DumbBufferInfo {
            handle: u32::from(buffer.handle()),
            width,
            height,
            bpp,
            pitch: buffer.pitch(),
            size: buffer.pitch() as u64 * height as u64,
        };
        Ok((buffer, info))
    }

    fn destroy_dumb(&self, buffer: DumbBuffer) -> io::Result<()> {
        self.destroy_dumb_buffer(buffer)
    }

    fn add_fb(&self, buffer: &DumbBuffer, depth: u32, bpp: u32) -> io::Result<u32> {
        let fb = self.add_framebuffer(buffer, depth, bpp)?;
        Ok(u32::from(fb))
    }

    fn remove_fb(&self, fb_id: u32) -> io::Result<()> {
        let fb: framebuffer::Handle = handle("framebuffer", fb_id)?;
        self.destroy_framebuffer(fb)
    }

    fn map_offset(&self, buffer: &DumbBuffer) -> io::Result<u64> {
        let map = drm_ffi::mode::dumbbuffer::map(self.as_fd(), buffer.handle().into(), 0, 0)?;
        Ok(map.offset)
    }

    fn map_shared(&self, offset: u64, len: usize) -> io::Result<MmapMut> {
        // SAFETY: the range is a dumb buffer owned by this process; nothing
        // else maps it while the returned view is alive.
        unsafe { MmapOptions::new().offset(offset).len(len).map_mut(&self.file) }
    }

    fn set_master(&self) -> io::Result<()> {
        self.acquire_master_lock()
    }

    fn drop_master(&self) -> io::Result<()> {
        self.release_master_lock()
    }

    fn set_crtc_config(
        &self,
        crtc_id: u32,
        fb_id: Option<u32>,
        position: (u32, u32),
        connectors: &[u32],
        mode: Option<&ModeRecord>,
    ) -> io::Result<()> {
        let crtc: crtc::Handle = handle("CRTC", crtc_id)?;
        let fb = fb_id
            .map(|id| handle::<framebuffer::Handle>("framebuffer", id))
            .transpose()?;
        let connectors = connectors
            .iter()
            .map(|&id| handle::<connector::Handle>("connector", id))
            .collect::<io::Result<Vec<_>>>()?;
        let mode = mode.map(native_mode).transpose()?;
        self.set_crtc(crtc, fb, position, &connectors, mode)
    }
}
