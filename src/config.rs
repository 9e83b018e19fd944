//! Host configuration, loaded from JSON and overridden from the command line.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::encode::EncoderConfig;
use crate::foundation::core::{RenderTarget, check_frame_size};
use crate::foundation::error::{PanimError, PanimResult};
use crate::playback::ControllerOpts;

/// Everything the `panim` binary needs besides the plugin path.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
    /// Offline render resolution and frame rate.
    pub render: RenderTarget,
    /// Initial interactive viewport size.
    pub viewport: Viewport,
    /// Interactive tick rate.
    pub tick_rate: u32,
    pub encoder: EncoderConfig,
    /// Output of the capture command.
    pub capture_path: PathBuf,
    /// Output of the screenshot command.
    pub screenshot_path: PathBuf,
    /// Stop offline renders after this many frames.
    pub frame_limit: Option<u64>,
    /// Directory for plugin shadow copies. Defaults to a folder in the system temp dir.
    pub shadow_dir: Option<PathBuf>,
}

/// Interactive viewport size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 16 * 100,
            height: 9 * 100,
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            render: RenderTarget::default(),
            viewport: Viewport::default(),
            tick_rate: 60,
            encoder: EncoderConfig::default(),
            capture_path: PathBuf::from("capture.png"),
            screenshot_path: PathBuf::from("screenshot.png"),
            frame_limit: None,
            shadow_dir: None,
        }
    }
}

impl HostConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn from_path(path: impl AsRef<Path>) -> PanimResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).with_context(|| format!("open config '{}'", path.display()))?;
        let cfg: Self = serde_json::from_reader(BufReader::new(f))
            .with_context(|| format!("parse config '{}'", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> PanimResult<()> {
        self.encoder
            .validate_target(&self.render)
            .map_err(|e| PanimError::validation(e.to_string()))?;
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(PanimError::validation("viewport width/height must be non-zero"));
        }
        check_frame_size(self.viewport.width, self.viewport.height)
            .map_err(|e| PanimError::validation(format!("viewport {e}")))?;
        if self.tick_rate == 0 {
            return Err(PanimError::validation("tick_rate must be non-zero"));
        }
        if self.frame_limit == Some(0) {
            return Err(PanimError::validation("frame_limit must be non-zero when set"));
        }
        Ok(())
    }

    pub fn controller_opts(&self) -> ControllerOpts {
        ControllerOpts {
            render: self.render,
            capture_path: self.capture_path.clone(),
            screenshot_path: self.screenshot_path.clone(),
            frame_limit: self.frame_limit,
        }
    }
}
