//! Dumb buffer allocation and mapping
//!
//! Each kernel object is held by a guard that releases it on drop, so a
//! failure part-way through leaves nothing registered. Struct fields are
//! declared in release order.

use log::{debug, warn};

use super::kms::{DumbBufferInfo, KmsDevice};
use crate::constants::COLOR_DEPTH;
use crate::error::DisplayError;

/// Kernel dumb buffer, destroyed on drop
pub struct DumbBuffer<'d, D: KmsDevice> {
    device: &'d D,
    object: D::Dumb,
    info: DumbBufferInfo,
}

impl<D: KmsDevice> DumbBuffer<'_, D> {
    pub fn info(&self) -> &DumbBufferInfo {
        &self.info
    }
}

impl<D: KmsDevice> Drop for DumbBuffer<'_, D> {
    fn drop(&mut self) {
        match self.device.destroy_dumb(self.object) {
            Ok(()) => debug!("Dumb buffer {} destroyed", self.info.handle),
            Err(e) => warn!("Failed to destroy dumb buffer {}: {}", self.info.handle, e),
        }
    }
}

/// Framebuffer object, removed on drop
pub struct Framebuffer<'d, D: KmsDevice> {
    device: &'d D,
    id: u32,
}

impl<D: KmsDevice> Framebuffer<'_, D> {
    pub fn id(&self) -> u32 {
        self.id
    }
}

impl<D: KmsDevice> Drop for Framebuffer<'_, D> {
    fn drop(&mut self) {
        match self.device.remove_fb(self.id) {
            Ok(()) => debug!("Framebuffer {} removed", self.id),
            Err(e) => warn!("Failed to remove framebuffer {}: {}", self.id, e),
        }
    }
}

/// A dumb buffer registered as exactly one framebuffer object
pub struct Allocation<'d, D: KmsDevice> {
    framebuffer: Framebuffer<'d, D>,
    buffer: DumbBuffer<'d, D>,
}

impl<D: KmsDevice> Allocation<'_, D> {
    pub fn framebuffer_id(&self) -> u32 {
        self.framebuffer.id()
    }

    pub fn buffer(&self) -> &DumbBufferInfo {
        self.buffer.info()
    }
}

/// Create a dumb buffer and register it as a framebuffer (depth 24).
pub fn allocate<'d, D: KmsDevice>(
    device: &'d D,
    width: u32,
    height: u32,
    bpp: u32,
) -> Result<Allocation<'d, D>, DisplayError> {
    let (object, info) = device
        .create_dumb(width, height, bpp)
        .map_err(|source| DisplayError::Allocation {
            step: "create dumb framebuffer",
            source,
        })?;
    let buffer = DumbBuffer {
        device,
        object,
        info,
    };
    debug!(
        "Dumb buffer created: handle={}, {}x{}x{}, pitch={}, size={}",
        info.handle, width, height, info.bpp, info.pitch, info.size
    );

    // On failure `buffer` drops here and the dumb buffer is destroyed
    let id = device
        .add_fb(&object, COLOR_DEPTH, bpp)
        .map_err(|source| DisplayError::Allocation {
            step: "add framebuffer to drm",
            source,
        })?;
    debug!("Framebuffer created: id={}", id);

    Ok(Allocation {
        framebuffer: Framebuffer { device, id },
        buffer,
    })
}

/// Allocation with its pixels mapped into this process
pub struct MappedBuffer<'d, D: KmsDevice> {
    mapping: D::Mapping,
    allocation: Allocation<'d, D>,
}

/// Map the whole buffer shared read/write. Consumes the allocation so a
/// mapping failure releases it.
pub fn map_buffer<'d, D: KmsDevice>(
    device: &'d D,
    allocation: Allocation<'d, D>,
) -> Result<MappedBuffer<'d, D>, DisplayError> {
    let info = *allocation.buffer();
    let offset = device
        .map_offset(&allocation.buffer.object)
        .map_err(|source| DisplayError::Map {
            step: "map offset",
            source,
        })?;
    let len = usize::try_from(info.size).map_err(|_| DisplayError::Map {
        step: "buffer size",
        source: std::io::Error::from_raw_os_error(libc::EOVERFLOW),
    })?;
    let mapping = device
        .map_shared(offset, len)
        .map_err(|source| DisplayError::Map {
            step: "mmap",
            source,
        })?;
    debug!("Dumb buffer {} mapped: {} bytes", info.handle, len);

    Ok(MappedBuffer {
        mapping,
        allocation,
    })
}

impl<D: KmsDevice> MappedBuffer<'_, D> {
    pub fn framebuffer_id(&self) -> u32 {
        self.allocation.framebuffer_id()
    }

    pub fn info(&self) -> &DumbBufferInfo {
        self.allocation.buffer()
    }

    /// Mapped byte size
    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    #[cfg(test)]
    pub fn pixels(&self) -> &[u8] {
        &self.mapping
    }

    /// Copy `payload` to the start of the buffer in one go.
    /// A payload larger than the buffer is rejected before anything is written.
    pub fn write(&mut self, payload: &[u8]) -> Result<(), DisplayError> {
        let capacity = self.mapping.len();
        if payload.len() > capacity {
            return Err(DisplayError::PayloadTooLarge {
                payload: payload.len(),
                capacity,
            });
        }
        self.mapping[..payload.len()].copy_from_slice(payload);
        Ok(())
    }
}
