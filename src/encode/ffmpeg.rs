use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use crate::foundation::core::RenderTarget;
use crate::foundation::error::EncodeError;

/// How the encoder process is invoked.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncoderConfig {
    /// Encoder executable, looked up on `PATH` when not absolute.
    pub program: PathBuf,
    /// Output video file.
    pub out_path: PathBuf,
    /// Overwrite `out_path` if it already exists.
    pub overwrite: bool,
    /// Value for `-loglevel`.
    pub loglevel: String,
    pub video_codec: String,
    /// Value for `-vb`.
    pub video_bitrate: String,
    /// Audio options are passed through even though the pipe carries no audio.
    pub audio_codec: String,
    /// Value for `-ab`.
    pub audio_bitrate: String,
    pub crf: u32,
    pub preset: String,
    /// Output pixel format. `yuv420p` needs even dimensions.
    pub pix_fmt: String,
    /// How long `finish` waits for a natural exit before killing the child. `None` waits forever.
    pub exit_timeout_ms: Option<u64>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
            out_path: PathBuf::from("output.mp4"),
            overwrite: true,
            loglevel: "error".to_string(),
            video_codec: "libx264".to_string(),
            video_bitrate: "2500k".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate: "200k".to_string(),
            crf: 18,
            preset: "veryfast".to_string(),
            pix_fmt: "yuv420p".to_string(),
            exit_timeout_ms: Some(30_000),
        }
    }
}

impl EncoderConfig {
    pub fn with_out_path(mut self, out_path: impl Into<PathBuf>) -> Self {
        self.out_path = out_path.into();
        self
    }

    pub fn exit_timeout(&self) -> Option<Duration> {
        self.exit_timeout_ms.map(Duration::from_millis)
    }

    /// Check `target` can be encoded with these settings.
    pub fn validate_target(&self, target: &RenderTarget) -> Result<(), EncodeError> {
        target.validate()?;
        if self.pix_fmt == "yuv420p"
            && (!target.width.is_multiple_of(2) || !target.height.is_multiple_of(2))
        {
            return Err(EncodeError::InvalidTarget(
                "width/height must be even (required for yuv420p output)".to_string(),
            ));
        }
        Ok(())
    }

    /// Arguments for reading raw RGBA8 frames of `target` from stdin.
    pub fn args(&self, target: &RenderTarget) -> Vec<OsString> {
        let resolution = format!("{}x{}", target.width, target.height);
        let fps = target.fps.to_string();
        let mut args: Vec<OsString> = Vec::with_capacity(32);
        let mut push = |s: &str| args.push(OsString::from(s));

        push("-loglevel");
        push(&self.loglevel);
        push(if self.overwrite { "-y" } else { "-n" });
        // Input: tightly packed RGBA8 on stdin.
        push("-f");
        push("rawvideo");
        push("-pix_fmt");
        push("rgba");
        push("-s");
        push(&resolution);
        push("-r");
        push(&fps);
        push("-i");
        push("-");
        // Output.
        push("-r");
        push(&fps);
        push("-c:v");
        push(&self.video_codec);
        push("-vb");
        push(&self.video_bitrate);
        push("-c:a");
        push(&self.audio_codec);
        push("-ab");
        push(&self.audio_bitrate);
        push("-pix_fmt");
        push(&self.pix_fmt);
        push("-crf");
        push(&self.crf.to_string());
        push("-preset");
        push(&self.preset);
        args.push(self.out_path.clone().into_os_string());
        args
    }

    /// Build the encoder command for `target`. Stdio is configured by the session.
    pub fn command(&self, target: &RenderTarget) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.args(target));
        cmd
    }
}

/// Return `true` when `program -version` runs successfully.
pub fn is_encoder_on_path(program: &Path) -> bool {
    Command::new(program)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> Result<(), EncodeError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| EncodeError::Output {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}
