use crate::foundation::error::EncodeError;

/// Fixed output resolution and frame rate of an offline render.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RenderTarget {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Output frames per second.
    pub fps: u32,
}

impl Default for RenderTarget {
    fn default() -> Self {
        Self {
            width: 1920 * 2,
            height: 1080 * 2,
            fps: 60,
        }
    }
}

impl RenderTarget {
    /// Create a target without validating it.
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        Self { width, height, fps }
    }

    /// Reject zero-sized or oversized targets and a zero frame rate.
    pub fn validate(&self) -> Result<(), EncodeError> {
        if self.width == 0 || self.height == 0 {
            return Err(EncodeError::InvalidTarget(
                "width/height must be non-zero".to_string(),
            ));
        }
        check_frame_size(self.width, self.height).map_err(EncodeError::InvalidTarget)?;
        if self.fps == 0 {
            return Err(EncodeError::InvalidTarget("fps must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Simulation delta of one offline tick, in seconds.
    pub fn delta(&self) -> f32 {
        1.0 / self.fps as f32
    }

    /// Bytes in one tightly packed RGBA8 frame of this size.
    pub fn frame_len(&self) -> usize {
        rgba_len(self.width, self.height)
    }
}

/// Largest accepted frame edge, in pixels.
pub const MAX_FRAME_DIM: u32 = 16_384;

const MAX_FRAME_LEN: usize = 1024 * 1024 * 1024;

/// Bytes in a `width` x `height` RGBA8 frame, or `None` on overflow.
pub fn checked_rgba_len(width: u32, height: u32) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(4)
}

/// Check a frame of this size can be allocated and addressed by the frame ABI.
pub fn check_frame_size(width: u32, height: u32) -> Result<(), String> {
    if width > MAX_FRAME_DIM || height > MAX_FRAME_DIM {
        return Err(format!(
            "{width}x{height} exceeds the {MAX_FRAME_DIM}-pixel limit per side"
        ));
    }
    match checked_rgba_len(width, height) {
        Some(len) if len <= MAX_FRAME_LEN => Ok(()),
        _ => Err(format!(
            "{width}x{height} frame exceeds the {MAX_FRAME_LEN}-byte limit"
        )),
    }
}

// Saturates instead of wrapping; sizes past the limit are rejected before anything allocates.
pub(crate) fn rgba_len(width: u32, height: u32) -> usize {
    checked_rgba_len(width, height).unwrap_or(usize::MAX)
}

/// Tightly packed, row-major RGBA8 pixel buffer.
///
/// The buffer is scratch space: the controller keeps one per surface and lets the frame source
/// overwrite it every tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl FrameBuffer {
    /// Allocate a zeroed (transparent black) buffer.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; rgba_len(width, height)],
        }
    }

    /// Wrap existing RGBA8 bytes. Returns `None` when the length does not match.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        (data.len() == rgba_len(width, height)).then_some(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Bytes in one row.
    pub fn stride(&self) -> usize {
        self.width as usize * 4
    }

    /// Resize in place. Contents are unspecified afterwards; the allocation is reused when the
    /// size does not change.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.width == width && self.height == height {
            return;
        }
        self.width = width;
        self.height = height;
        self.data.resize(rgba_len(width, height), 0);
    }

    /// Rows from the bottom of the image to the top.
    pub fn rows_bottom_up(&self) -> impl Iterator<Item = &[u8]> {
        let stride = self.stride().max(1);
        self.data.chunks_exact(stride).rev()
    }

    /// Copy the image into `dst` with its rows in reverse order.
    pub fn write_flipped(&self, dst: &mut Vec<u8>) {
        dst.clear();
        dst.reserve(self.data.len());
        for row in self.rows_bottom_up() {
            dst.extend_from_slice(row);
        }
    }
}
