//! Display lifecycle
//!
//! Drives the acquisition sequence
//!
//! ```text
//! Empty → DeviceOpen → ConnectorResolved → ModeResolved
//!       → BufferAllocated → BufferMapped → Bound → Displaying → Unwound
//! ```
//!
//! Each step hands back a guard owning what it acquired. A failing step
//! returns early and the guards of the earlier steps drop in reverse
//! order, so `Unwound` is reached on every path with nothing left behind.

use log::{debug, info};

use crate::constants::BITS_PER_PIXEL;
use crate::drm::{
    allocate, bind, find_connector, find_crtc, map_buffer, select_preferred_mode, Binding,
    ConnectorRecord, KmsDevice, MappedBuffer, ModeRecord,
};
use crate::error::DisplayError;
use crate::shutdown::{Termination, TerminationCause};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Empty,
    DeviceOpen,
    ConnectorResolved,
    ModeResolved,
    BufferAllocated,
    BufferMapped,
    Bound,
    Displaying,
    Unwound,
}

/// A framebuffer on screen
///
/// Only exists fully acquired. Dropping it restores the CRTC, unmaps,
/// removes the framebuffer and destroys the dumb buffer, in that order.
pub struct DisplayHandle<'d, D: KmsDevice> {
    binding: Binding<'d, D>,
    buffer: MappedBuffer<'d, D>,
    connector: ConnectorRecord,
    mode: ModeRecord,
}

impl<D: KmsDevice> DisplayHandle<'_, D> {
    pub fn connector(&self) -> &ConnectorRecord {
        &self.connector
    }

    pub fn mode(&self) -> &ModeRecord {
        &self.mode
    }

    pub fn framebuffer_id(&self) -> u32 {
        self.binding.framebuffer_id()
    }

    /// Mapped size of the pixel buffer in bytes
    pub fn byte_size(&self) -> usize {
        self.buffer.len()
    }

    /// Single bulk copy of the picture into the scanout buffer
    pub fn write_payload(&mut self, payload: &[u8]) -> Result<(), DisplayError> {
        debug!("Loading image ({} bytes)", payload.len());
        self.buffer.write(payload)
    }
}

pub struct LifecycleController {
    connector_name: String,
    state: LifecycleState,
    history: Vec<LifecycleState>,
}

impl LifecycleController {
    pub fn new(connector_name: impl Into<String>) -> Self {
        Self {
            connector_name: connector_name.into(),
            state: LifecycleState::Empty,
            history: vec![LifecycleState::Empty],
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Every state entered so far, in order
    pub fn history(&self) -> &[LifecycleState] {
        &self.history
    }

    fn advance(&mut self, next: LifecycleState) {
        debug!("Lifecycle: {:?} -> {:?}", self.state, next);
        self.state = next;
        self.history.push(next);
    }

    /// Open the device, show `payload` until `termination` fires, then
    /// release everything. Ends in `Unwound` whatever happens.
    pub fn run<D, F>(
        &mut self,
        open: F,
        payload: &[u8],
        termination: &dyn Termination,
    ) -> Result<TerminationCause, DisplayError>
    where
        D: KmsDevice,
        F: FnOnce() -> Result<D, DisplayError>,
    {
        let result = self.open_and_display(open, payload, termination);
        self.advance(LifecycleState::Unwound);
        result
    }

    fn open_and_display<D, F>(
        &mut self,
        open: F,
        payload: &[u8],
        termination: &dyn Termination,
    ) -> Result<TerminationCause, DisplayError>
    where
        D: KmsDevice,
        F: FnOnce() -> Result<D, DisplayError>,
    {
        let device = open()?;
        self.advance(LifecycleState::DeviceOpen);

        // Declared after `device`, so dropped before it
        let mut handle = self.acquire(&device)?;
        handle.write_payload(payload)?;
        self.advance(LifecycleState::Displaying);
        info!(
            "Showing picture on {} at {} (fb {}, {} bytes)",
            handle.connector().name(),
            handle.mode(),
            handle.framebuffer_id(),
            handle.byte_size()
        );

        let cause = termination.wait()?;
        info!("{} received, restoring display", cause);
        Ok(cause)
    }

    /// Acquire everything up to `Bound` on an open device.
    pub fn acquire<'d, D: KmsDevice>(
        &mut self,
        device: &'d D,
    ) -> Result<DisplayHandle<'d, D>, DisplayError> {
        let connector = find_connector(device, &self.connector_name)?;
        self.advance(LifecycleState::ConnectorResolved);

        let mode = select_preferred_mode(&connector)?;
        self.advance(LifecycleState::ModeResolved);

        let (width, height) = mode.size();
        let allocation = allocate(device, width, height, BITS_PER_PIXEL)?;
        self.advance(LifecycleState::BufferAllocated);

        // Captured before anything is bound and kept unchanged for restore
        let crtc = find_crtc(device, &connector)?;

        let buffer = map_buffer(device, allocation)?;
        self.advance(LifecycleState::BufferMapped);

        let binding = bind(device, crtc, &connector, buffer.framebuffer_id(), &mode)?;
        self.advance(LifecycleState::Bound);

        info!(
            "Display acquired: {} at {}, {} bytes (pitch {})",
            connector.name(),
            mode,
            buffer.len(),
            buffer.info().pitch
        );

        Ok(DisplayHandle {
            binding,
            buffer,
            connector,
            mode,
        })
    }
}
