//! In-memory DRM device for tests
//!
//! Keeps CRTC state, counts every acquire/release per resource type and
//! fails on request at any kernel call.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

use super::kms::{
    ConnectorRecord, CrtcRecord, DumbBufferInfo, EncoderRecord, KmsDevice, ModeRecord, ModeType,
    ResourceIds,
};

/// Kernel call that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    Resources,
    Connector(u32),
    Encoder,
    Crtc,
    CreateDumb,
    AddFb,
    MapOffset,
    MapShared,
    SetMaster,
    /// Fails the n-th SetCrtc call (0-based)
    SetCrtc(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCrtcCall {
    pub crtc_id: u32,
    pub fb_id: Option<u32>,
    pub connectors: Vec<u32>,
    pub mode: Option<ModeRecord>,
}

#[derive(Debug, Default)]
pub struct MockState {
    pub connectors: Vec<ConnectorRecord>,
    pub encoders: Vec<EncoderRecord>,
    pub crtcs: HashMap<u32, CrtcRecord>,
    pub crtc_order: Vec<u32>,
    pub framebuffers: Vec<u32>,
    pub fail: Vec<FailPoint>,

    /// Connector queries issued. Each returns an owned `ConnectorRecord`
    /// with nothing to release, so callers cannot leak one; the count only
    /// shows how many were looked at.
    pub connector_queries: usize,
    pub dumb_created: usize,
    pub dumb_destroyed: usize,
    pub fb_added: usize,
    pub fb_removed: usize,
    pub mapped: usize,
    pub unmapped: usize,
    pub master_acquired: usize,
    pub master_dropped: usize,
    pub closed: usize,
    pub set_crtc_calls: Vec<SetCrtcCall>,
    /// Order of release calls, for teardown-order assertions
    pub releases: Vec<&'static str>,

    next_handle: u32,
    is_master: bool,
    live_dumb: Vec<u32>,
}

impl MockState {
    fn should_fail(&self, point: FailPoint) -> bool {
        self.fail.contains(&point)
    }

    /// Every acquired kernel object has been released
    pub fn balanced(&self) -> bool {
        self.dumb_created == self.dumb_destroyed
            && self.fb_added == self.fb_removed
            && self.mapped == self.unmapped
            && self.master_acquired == self.master_dropped
    }
}

fn injected() -> io::Error {
    io::Error::from_raw_os_error(libc::EINVAL)
}

pub fn mode(width: u16, height: u16, refresh: u32, preferred: bool) -> ModeRecord {
    let mut mode_type = ModeType::DRIVER;
    if preferred {
        mode_type |= ModeType::PREFERRED;
    }
    ModeRecord {
        native: None,
        name: format!("{}x{}", width, height),
        clock: 148500,
        hdisplay: width,
        hsync_start: width + 88,
        hsync_end: width + 132,
        htotal: width + 280,
        hskew: 0,
        vdisplay: height,
        vsync_start: height + 4,
        vsync_end: height + 9,
        vtotal: height + 45,
        vscan: 0,
        vrefresh: refresh,
        flags: 0,
        mode_type,
    }
}

pub fn connector(
    id: u32,
    type_code: u32,
    type_index: u32,
    modes: Vec<ModeRecord>,
) -> ConnectorRecord {
    ConnectorRecord {
        id,
        type_code,
        type_index,
        connected: !modes.is_empty(),
        encoder_id: None,
        encoders: Vec::new(),
        modes,
    }
}

/// Mapping that reports its own unmap
pub struct MockMapping {
    bytes: Vec<u8>,
    state: Rc<RefCell<MockState>>,
}

impl Deref for MockMapping {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

impl DerefMut for MockMapping {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

impl Drop for MockMapping {
    fn drop(&mut self) {
        let mut state = self.state.borrow_mut();
        state.unmapped += 1;
        state.releases.push("unmap");
    }
}

pub struct MockDevice {
    state: Rc<RefCell<MockState>>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(MockState {
                next_handle: 1,
                ..MockState::default()
            })),
        }
    }

    /// One HDMI-A-1 connector (id 40) with a preferred 1920x1080 mode,
    /// driven by encoder 30 on CRTC 20 which scans out fb 7 at 1280x720.
    pub fn hdmi_1080p() -> Self {
        let device = Self::new();
        {
            let mut state = device.state.borrow_mut();
            let mut hdmi = connector(
                40,
                11,
                1,
                vec![mode(1280, 720, 60, false), mode(1920, 1080, 60, true)],
            );
            hdmi.encoder_id = Some(30);
            hdmi.encoders = vec![30];
            state.connectors.push(connector(41, 10, 1, Vec::new()));
            state.connectors.push(hdmi);
            state.encoders.push(EncoderRecord {
                id: 30,
                crtc_id: Some(20),
                possible_crtcs: vec![20, 21],
            });
            state.crtc_order = vec![20, 21];
            state.crtcs.insert(
                20,
                CrtcRecord {
                    id: 20,
                    fb_id: Some(7),
                    position: (0, 0),
                    mode: Some(mode(1280, 720, 60, false)),
                },
            );
            state.crtcs.insert(
                21,
                CrtcRecord {
                    id: 21,
                    fb_id: None,
                    position: (0, 0),
                    mode: None,
                },
            );
            state.framebuffers.push(7);
        }
        device
    }

    /// Shared handle to the state, usable after the device is moved
    pub fn state(&self) -> Rc<RefCell<MockState>> {
        Rc::clone(&self.state)
    }

    pub fn fail_at(&self, point: FailPoint) {
        self.state.borrow_mut().fail.push(point);
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        let mut state = self.state.borrow_mut();
        state.closed += 1;
        state.releases.push("close");
    }
}

impl KmsDevice for MockDevice {
    type Mapping = MockMapping;
    type Dumb = DumbBufferInfo;

    fn query_resources(&self) -> io::Result<ResourceIds> {
        let state = self.state.borrow();
        if state.should_fail(FailPoint::Resources) {
            return Err(injected());
        }
        Ok(ResourceIds {
            connectors: state.connectors.iter().map(|c| c.id).collect(),
            encoders: state.encoders.iter().map(|e| e.id).collect(),
            crtcs: state.crtc_order.clone(),
            framebuffers: state.framebuffers.clone(),
        })
    }

    fn query_connector(&self, id: u32) -> io::Result<ConnectorRecord> {
        let mut state = self.state.borrow_mut();
        state.connector_queries += 1;
        if state.should_fail(FailPoint::Connector(id)) {
            return Err(injected());
        }
        state
            .connectors
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| io::Error::from_raw_os_error(libc::ENOENT))
    }

    fn query_encoder(&self, id: u32) -> io::Result<EncoderRecord> {
        let state = self.state.borrow();
        if state.should_fail(FailPoint::Encoder) {
            return Err(injected());
        }
        state
            .encoders
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| io::Error::from_raw_os_error(libc::ENOENT))
    }

    fn query_crtc(&self, id: u32) -> io::Result<CrtcRecord> {
        let state = self.state.borrow();
        if state.should_fail(FailPoint::Crtc) {
            return Err(injected());
        }
        state
            .crtcs
            .get(&id)
            .cloned()
            .ok_or_else(|| io::Error::from_raw_os_error(libc::ENOENT))
    }

    fn create_dumb(
        &self,
        width: u32,
        height: u32,
        bpp: u32,
    ) -> io::Result<(DumbBufferInfo, DumbBufferInfo)> {
        let mut state = self.state.borrow_mut();
        if state.should_fail(FailPoint::CreateDumb) {
            return Err(injected());
        }
        state.dumb_created += 1;
        let handle = state.next_handle;
        state.next_handle += 1;
        // Align scanlines to 64 bytes like most drivers do
        let pitch = (width * bpp / 8 + 63) & !63;
        let info = DumbBufferInfo {
            handle,
            width,
            height,
            bpp,
            pitch,
            size: pitch as u64 * height as u64,
        };
        state.live_dumb.push(handle);
        Ok((info, info))
    }

    fn destroy_dumb(&self, buffer: DumbBufferInfo) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        if !state.live_dumb.contains(&buffer.handle) {
            return Err(io::Error::from_raw_os_error(libc::ENOENT));
        }
        state.live_dumb.retain(|&h| h != buffer.handle);
        state.dumb_destroyed += 1;
        state.releases.push("destroy_dumb");
        Ok(())
    }

    fn add_fb(&self, buffer: &DumbBufferInfo, _depth: u32, _bpp: u32) -> io::Result<u32> {
        let mut state = self.state.borrow_mut();
        if state.should_fail(FailPoint::AddFb) {
            return Err(injected());
        }
        if !state.live_dumb.contains(&buffer.handle) {
            return Err(io::Error::from_raw_os_error(libc::ENOENT));
        }
        state.fb_added += 1;
        let fb_id = 100 + state.next_handle;
        state.next_handle += 1;
        state.framebuffers.push(fb_id);
        Ok(fb_id)
    }

    fn remove_fb(&self, fb_id: u32) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        state.fb_removed += 1;
        state.framebuffers.retain(|&id| id != fb_id);
        state.releases.push("remove_fb");
        Ok(())
    }

    fn map_offset(&self, buffer: &DumbBufferInfo) -> io::Result<u64> {
        let state = self.state.borrow();
        if state.should_fail(FailPoint::MapOffset) {
            return Err(injected());
        }
        Ok((buffer.handle as u64) << 12)
    }

    fn map_shared(&self, _offset: u64, len: usize) -> io::Result<MockMapping> {
        let mut state = self.state.borrow_mut();
        if state.should_fail(FailPoint::MapShared) {
            return Err(io::Error::from_raw_os_error(libc::ENOMEM));
        }
        state.mapped += 1;
        Ok(MockMapping {
            bytes: vec![0; len],
            state: Rc::clone(&self.state),
        })
    }

    fn set_master(&self) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        if state.should_fail(FailPoint::SetMaster) {
            return Err(io::Error::from_raw_os_error(libc::EACCES));
        }
        state.master_acquired += 1;
        state.is_master = true;
        Ok(())
    }

    fn drop_master(&self) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        if !state.is_master {
            return Err(injected());
        }
        state.master_dropped += 1;
        state.is_master = false;
        state.releases.push("drop_master");
        Ok(())
    }

    fn set_crtc_config(
        &self,
        crtc_id: u32,
        fb_id: Option<u32>,
        position: (u32, u32),
        connectors: &[u32],
        mode: Option<&ModeRecord>,
    ) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        let call_index = state.set_crtc_calls.len();
        state.set_crtc_calls.push(SetCrtcCall {
            crtc_id,
            fb_id,
            connectors: connectors.to_vec(),
            mode: mode.cloned(),
        });
        if !state.is_master {
            return Err(io::Error::from_raw_os_error(libc::EACCES));
        }
        if state.should_fail(FailPoint::SetCrtc(call_index)) {
            return Err(injected());
        }
        let crtc = state
            .crtcs
            .get_mut(&crtc_id)
            .ok_or_else(|| io::Error::from_raw_os_error(libc::ENOENT))?;
        crtc.fb_id = fb_id;
        crtc.position = position;
        crtc.mode = mode.cloned();
        Ok(())
    }
}
