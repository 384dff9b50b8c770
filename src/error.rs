//! Error taxonomy for display acquisition
//!
//! Every failing step of the acquisition sequence maps to one variant.
//! The kernel's own error code travels along as the `source`.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("Could not open dri device {}", path.display())]
    DeviceOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Could not get drm {what}")]
    ResourceQuery {
        what: String,
        #[source]
        source: io::Error,
    },

    #[error("Could not find matching connector {0}")]
    ConnectorNotFound(String),

    #[error("Could not find preferred resolution for connector {0}")]
    ModeNotFound(String),

    #[error("Could not find a CRTC for connector {0}")]
    CrtcNotFound(String),

    #[error("Could not {step}")]
    Allocation {
        step: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("Mode map dumb framebuffer failed ({step})")]
    Map {
        step: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("Could not get master role for DRM")]
    MasterAcquire {
        #[source]
        source: io::Error,
    },

    #[error("Could not set CRTC {crtc}")]
    Bind {
        crtc: u32,
        #[source]
        source: io::Error,
    },

    #[error("Picture is {payload} bytes but the framebuffer only holds {capacity}")]
    PayloadTooLarge { payload: usize, capacity: usize },

    #[error("Waiting for termination signal failed")]
    Wait {
        #[source]
        source: io::Error,
    },
}

impl DisplayError {
    pub(crate) fn query(what: impl Into<String>, source: io::Error) -> Self {
        DisplayError::ResourceQuery {
            what: what.into(),
            source,
        }
    }
}
