use std::path::Path;

use anyhow::Context as _;

use crate::foundation::core::FrameBuffer;
use crate::foundation::error::PanimResult;

/// Where interactive frames go.
///
/// Window management lives outside the host; a presenter only reports the current viewport size
/// and receives finished frames.
pub trait Presenter {
    /// Current viewport size in pixels.
    fn viewport(&self) -> (u32, u32);

    /// Show one interactive frame.
    fn present(&mut self, frame: &FrameBuffer) -> PanimResult<()>;

    /// Called once per offline tick instead of `present`, with the number of frames sent so far.
    fn rendering(&mut self, _frames_sent: u64) {}
}

/// Presenter without a screen. Keeps the last frame for inspection.
#[derive(Debug, Clone)]
pub struct HeadlessPresenter {
    viewport: (u32, u32),
    presented: u64,
    last: Option<FrameBuffer>,
    keep_last: bool,
}

impl HeadlessPresenter {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            viewport: (width, height),
            presented: 0,
            last: None,
            keep_last: false,
        }
    }

    /// Retain a copy of every presented frame's pixels (the latest one only).
    pub fn keeping_last_frame(mut self) -> Self {
        self.keep_last = true;
        self
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
    }

    pub fn presented(&self) -> u64 {
        self.presented
    }

    pub fn last_frame(&self) -> Option<&FrameBuffer> {
        self.last.as_ref()
    }
}

impl Presenter for HeadlessPresenter {
    fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    fn present(&mut self, frame: &FrameBuffer) -> PanimResult<()> {
        self.presented += 1;
        if self.keep_last {
            match self.last.as_mut() {
                Some(last) => last.clone_from(frame),
                None => self.last = Some(frame.clone()),
            }
        }
        Ok(())
    }
}

/// Write `frame` as a PNG, rows flipped like the encoder stream.
pub fn write_png(frame: &FrameBuffer, path: &Path) -> PanimResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create capture dir '{}'", parent.display()))?;
    }
    let mut flipped = Vec::new();
    frame.write_flipped(&mut flipped);
    image::save_buffer_with_format(
        path,
        &flipped,
        frame.width(),
        frame.height(),
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", path.display()))?;
    Ok(())
}
