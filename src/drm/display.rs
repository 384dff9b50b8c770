//! DRM display management
//!
//! CRTC discovery, mode setting and restoring the original CRTC configuration

use log::{debug, info, warn};

use super::kms::{ConnectorRecord, CrtcRecord, KmsDevice, ModeRecord};
use crate::error::DisplayError;

/// Find CRTC for connector
///
/// Prefers the CRTC the connector is currently routed to, otherwise the
/// first one any of its encoders can drive.
pub fn find_crtc<D: KmsDevice>(
    device: &D,
    connector: &ConnectorRecord,
) -> Result<CrtcRecord, DisplayError> {
    // First check current encoder
    if let Some(encoder_id) = connector.encoder_id {
        let encoder = device
            .query_encoder(encoder_id)
            .map_err(|e| DisplayError::query(format!("encoder {}", encoder_id), e))?;
        if let Some(crtc_id) = encoder.crtc_id {
            debug!("Encoder {} drives CRTC {}", encoder.id, crtc_id);
            return query_crtc(device, crtc_id);
        }
    }

    // Find available encoder and CRTC
    for &encoder_id in &connector.encoders {
        let encoder = device
            .query_encoder(encoder_id)
            .map_err(|e| DisplayError::query(format!("encoder {}", encoder_id), e))?;
        if let Some(&crtc_id) = encoder.possible_crtcs.first() {
            return query_crtc(device, crtc_id);
        }
    }

    Err(DisplayError::CrtcNotFound(connector.name()))
}

fn query_crtc<D: KmsDevice>(device: &D, crtc_id: u32) -> Result<CrtcRecord, DisplayError> {
    let crtc = device
        .query_crtc(crtc_id)
        .map_err(|e| DisplayError::query(format!("CRTC {}", crtc_id), e))?;
    debug!(
        "CRTC {}: fb={:?}, mode={}",
        crtc.id,
        crtc.fb_id,
        crtc.mode
            .as_ref()
            .map(|m| m.to_string())
            .unwrap_or_else(|| "none".to_string())
    );
    Ok(crtc)
}

/// CRTC configuration as it was before this process touched it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedCrtc {
    crtc: CrtcRecord,
    connector_id: u32,
}

impl SavedCrtc {
    pub fn new(crtc: CrtcRecord, connector_id: u32) -> Self {
        Self { crtc, connector_id }
    }

    /// SetCrtc back to the saved framebuffer and mode. A CRTC that was
    /// off is switched off again.
    fn apply<D: KmsDevice>(&self, device: &D) -> std::io::Result<()> {
        match self.crtc.fb_id {
            Some(fb) => device.set_crtc_config(
                self.crtc.id,
                Some(fb),
                self.crtc.position,
                &[self.connector_id],
                self.crtc.mode.as_ref(),
            ),
            None => device.set_crtc_config(self.crtc.id, None, (0, 0), &[], None),
        }
    }
}

/// DRM master held for the duration of a mode set
struct MasterGuard<'d, D: KmsDevice> {
    device: &'d D,
}

impl<'d, D: KmsDevice> MasterGuard<'d, D> {
    fn acquire(device: &'d D) -> Result<Self, DisplayError> {
        device
            .set_master()
            .map_err(|source| DisplayError::MasterAcquire { source })?;
        debug!("DRM master acquired");
        Ok(Self { device })
    }
}

impl<D: KmsDevice> Drop for MasterGuard<'_, D> {
    fn drop(&mut self) {
        // Other display clients need master to add their framebuffers
        match self.device.drop_master() {
            Ok(()) => debug!("DRM master dropped"),
            Err(e) => warn!("Failed to drop DRM master: {}", e),
        }
    }
}

/// Framebuffer bound to a CRTC; the saved configuration is restored on drop
pub struct Binding<'d, D: KmsDevice> {
    device: &'d D,
    saved: SavedCrtc,
    fb_id: u32,
}

impl<D: KmsDevice> Binding<'_, D> {
    pub fn framebuffer_id(&self) -> u32 {
        self.fb_id
    }
}

impl<D: KmsDevice> Drop for Binding<'_, D> {
    fn drop(&mut self) {
        restore(self.device, &self.saved);
    }
}

/// Show framebuffer `fb_id` on `crtc` through `connector` at `mode`.
///
/// Master is held only across the two SetCrtc calls. The CRTC is first
/// cleared with a null framebuffer, which some drivers need before they
/// accept a new buffer. If the real SetCrtc fails the saved configuration
/// is put back before returning.
pub fn bind<'d, D: KmsDevice>(
    device: &'d D,
    crtc: CrtcRecord,
    connector: &ConnectorRecord,
    fb_id: u32,
    mode: &ModeRecord,
) -> Result<Binding<'d, D>, DisplayError> {
    let saved = SavedCrtc::new(crtc, connector.id);
    let crtc_id = saved.crtc.id;

    let master = MasterGuard::acquire(device)?;

    device
        .set_crtc_config(crtc_id, None, (0, 0), &[], None)
        .map_err(|source| DisplayError::Bind {
            crtc: crtc_id,
            source,
        })?;

    if let Err(source) =
        device.set_crtc_config(crtc_id, Some(fb_id), (0, 0), &[connector.id], Some(mode))
    {
        if let Err(e) = saved.apply(device) {
            warn!("Failed to restore CRTC {} after bind failure: {}", crtc_id, e);
        }
        return Err(DisplayError::Bind {
            crtc: crtc_id,
            source,
        });
    }
    drop(master);

    info!(
        "Framebuffer {} on CRTC {} ({}, {})",
        fb_id,
        crtc_id,
        connector.name(),
        mode
    );
    Ok(Binding {
        device,
        saved,
        fb_id,
    })
}

/// Put the saved CRTC configuration back.
///
/// Master is re-acquired first. If that fails the SetCrtc is still tried;
/// the current master is then responsible for the screen.
pub fn restore<D: KmsDevice>(device: &D, saved: &SavedCrtc) {
    let master = match MasterGuard::acquire(device) {
        Ok(guard) => Some(guard),
        Err(e) => {
            warn!("{}, restoring CRTC anyway", e);
            None
        }
    };

    match saved.apply(device) {
        Ok(()) => debug!("CRTC {} restored to fb {:?}", saved.crtc.id, saved.crtc.fb_id),
        Err(e) => warn!("Failed to restore CRTC {}: {}", saved.crtc.id, e),
    }
    drop(master);
}
