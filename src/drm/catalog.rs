//! Connector catalog
//!
//! Names connectors the way the kernel does ("HDMI-A-1", "eDP-1", ...),
//! finds one by name, and produces the `-l` resource listing.

use std::fmt;

use log::debug;

use super::kms::{ConnectorRecord, KmsDevice};
use crate::error::DisplayError;

/// Connector type names indexed by DRM_MODE_CONNECTOR_* code
const CONNECTOR_TYPE_NAMES: [&str; 21] = [
    "unknown",
    "VGA",
    "DVI-I",
    "DVI-D",
    "DVI-A",
    "composite",
    "s-video",
    "LVDS",
    "component",
    "9-pin DIN",
    "DP",
    "HDMI-A",
    "HDMI-B",
    "TV",
    "eDP",
    "Virtual",
    "DSI",
    "DPI",
    "Writeback",
    "SPI",
    "USB",
];

pub fn connector_type_name(type_code: u32) -> &'static str {
    CONNECTOR_TYPE_NAMES
        .get(type_code as usize)
        .copied()
        .unwrap_or("INVALID")
}

impl ConnectorRecord {
    /// "<type-name>-<type-instance-index>"
    pub fn name(&self) -> String {
        format!("{}-{}", connector_type_name(self.type_code), self.type_index)
    }
}

/// Find the connector whose derived name is exactly `name`.
///
/// Records of non-matching connectors are dropped as soon as they are
/// compared; only the match is handed to the caller.
pub fn find_connector<D: KmsDevice>(
    device: &D,
    name: &str,
) -> Result<ConnectorRecord, DisplayError> {
    let resources = device
        .query_resources()
        .map_err(|e| DisplayError::query("resources", e))?;

    for &id in &resources.connectors {
        let connector = match device.query_connector(id) {
            Ok(connector) => connector,
            Err(e) => {
                debug!("Skipping connector {}: {}", id, e);
                continue;
            }
        };

        if connector.name() == name {
            debug!(
                "Found connector {} (id {}, {})",
                name,
                id,
                if connector.connected {
                    "connected"
                } else {
                    "disconnected"
                }
            );
            return Ok(connector);
        }
    }

    Err(DisplayError::ConnectorNotFound(name.to_string()))
}

/// One line of the connector listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorEntry {
    pub id: u32,
    pub name: Option<String>,
    pub encoder_id: Option<u32>,
    pub crtc_id: Option<u32>,
}

/// Read-only snapshot of the device for `-l`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceListing {
    pub connectors: Vec<ConnectorEntry>,
    pub framebuffers: Vec<u32>,
    pub crtcs: Vec<u32>,
    pub encoders: Vec<u32>,
}

/// Enumerate connectors and object ids. Performs queries only.
pub fn list_connectors<D: KmsDevice>(device: &D) -> Result<ResourceListing, DisplayError> {
    let resources = device
        .query_resources()
        .map_err(|e| DisplayError::query("resources", e))?;

    let connectors = resources
        .connectors
        .iter()
        .map(|&id| {
            let mut entry = ConnectorEntry {
                id,
                name: None,
                encoder_id: None,
                crtc_id: None,
            };
            let Ok(connector) = device.query_connector(id) else {
                return entry;
            };
            entry.name = Some(connector.name());
            entry.encoder_id = connector.encoder_id;
            entry.crtc_id = connector
                .encoder_id
                .and_then(|enc| device.query_encoder(enc).ok())
                .and_then(|encoder| encoder.crtc_id);
            entry
        })
        .collect();

    Ok(ResourceListing {
        connectors,
        framebuffers: resources.framebuffers,
        crtcs: resources.crtcs,
        encoders: resources.encoders,
    })
}

impl fmt::Display for ResourceListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connectors:")?;
        for entry in &self.connectors {
            write!(f, "\nNumber: {} ", entry.id)?;
            let Some(name) = &entry.name else { continue };
            write!(f, "Name: {} ", name)?;
            write!(f, "Encoder: {} ", entry.encoder_id.unwrap_or(0))?;
            if let Some(crtc) = entry.crtc_id {
                write!(f, "Crtc: {}", crtc)?;
            }
        }

        write!(f, "\nFramebuffers: ")?;
        for id in &self.framebuffers {
            write!(f, "{} ", id)?;
        }
        write!(f, "\nCRTCs: ")?;
        for id in &self.crtcs {
            write!(f, "{} ", id)?;
        }
        write!(f, "\nencoders: ")?;
        for id in &self.encoders {
            write!(f, "{} ", id)?;
        }
        writeln!(f)
    }
}
