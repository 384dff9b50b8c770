//! Resolution selection

use log::debug;

use super::kms::{ConnectorRecord, ModeRecord};
use crate::error::DisplayError;

/// First mode the device flags as preferred.
///
/// No preferred mode is an error; there is no fallback to the first
/// listed mode.
pub fn select_preferred_mode(connector: &ConnectorRecord) -> Result<ModeRecord, DisplayError> {
    let mode = connector
        .modes
        .iter()
        .find(|m| m.is_preferred())
        .cloned()
        .ok_or_else(|| DisplayError::ModeNotFound(connector.name()))?;

    debug!("Preferred mode of {}: {}", connector.name(), mode);
    Ok(mode)
}
