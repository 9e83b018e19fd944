use std::io::{self, Write as _};
use std::process::{ChildStdin, Command, Stdio};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::encode::ffmpeg::{EncoderConfig, ensure_parent_dir};
use crate::encode::process::{ChildGuard, exit_failure, join_stderr, spawn_stderr_drain};
use crate::foundation::core::{FrameBuffer, RenderTarget};
use crate::foundation::error::EncodeError;

/// Lifecycle of a live session. A session that is not alive at all is the `Idle` state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Pipe open, frames may be sent.
    Rendering,
    /// Pipe closed after a write failure. Only `finish(true)` remains.
    Closed,
}

/// Summary of a successfully finished session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FinishReport {
    pub frames_written: u64,
}

/// One external encoder process fed raw RGBA8 frames through its stdin.
pub struct EncoderSession {
    target: RenderTarget,
    child: ChildGuard,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<JoinHandle<io::Result<Vec<u8>>>>,
    scratch: Vec<u8>,
    frames_written: u64,
    exit_timeout: Option<Duration>,
}

impl EncoderSession {
    /// Spawn the encoder described by `cfg` for `target`.
    pub fn start(cfg: &EncoderConfig, target: RenderTarget) -> Result<Self, EncodeError> {
        cfg.validate_target(&target)?;
        ensure_parent_dir(&cfg.out_path)?;
        Self::spawn(cfg.command(&target), target, cfg.exit_timeout())
    }

    /// Spawn an arbitrary command that reads raw frames of `target` from stdin.
    ///
    /// Stdio of `cmd` is overridden: stdin is piped, stdout discarded, stderr captured.
    pub fn spawn(
        mut cmd: Command,
        target: RenderTarget,
        exit_timeout: Option<Duration>,
    ) -> Result<Self, EncodeError> {
        target.validate()?;
        let program = cmd.get_program().to_string_lossy().into_owned();
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|source| EncodeError::Spawn {
                program: program.clone(),
                source,
            })?;
        let stdin = child.stdin.take();
        let stderr = child.stderr.take();
        let child = ChildGuard::new(child);
        let Some(stdin) = stdin else {
            return Err(EncodeError::Spawn {
                program,
                source: io::Error::other("encoder stdin was not captured"),
            });
        };

        tracing::info!(
            pid = child.pid(),
            program = %program,
            width = target.width,
            height = target.height,
            fps = target.fps,
            "encoder started"
        );

        Ok(Self {
            target,
            child,
            stdin: Some(stdin),
            stderr_drain: stderr.map(spawn_stderr_drain),
            scratch: Vec::with_capacity(target.frame_len()),
            frames_written: 0,
            exit_timeout,
        })
    }

    pub fn target(&self) -> RenderTarget {
        self.target
    }

    pub fn state(&self) -> SessionState {
        if self.stdin.is_some() {
            SessionState::Rendering
        } else {
            SessionState::Closed
        }
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn pid(&self) -> u32 {
        self.child.pid()
    }

    /// Write one frame, bottom row first. Blocks until the encoder has accepted all bytes.
    ///
    /// A write failure closes the pipe and moves the session to [`SessionState::Closed`].
    pub fn send_frame(&mut self, frame: &FrameBuffer) -> Result<(), EncodeError> {
        let expected = self.target.frame_len();
        if frame.width() != self.target.width
            || frame.height() != self.target.height
            || frame.as_bytes().len() != expected
        {
            return Err(EncodeError::FrameSize {
                got: frame.as_bytes().len(),
                expected,
            });
        }
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(EncodeError::Closed);
        };

        frame.write_flipped(&mut self.scratch);
        if let Err(e) = stdin.write_all(&self.scratch) {
            tracing::error!(
                pid = self.child.pid(),
                frame = self.frames_written,
                error = %e,
                "failed to write frame into encoder pipe"
            );
            self.stdin = None;
            return Err(EncodeError::Io(e));
        }
        self.frames_written += 1;
        Ok(())
    }

    /// Close the pipe and wait for the encoder to exit.
    ///
    /// With `cancel`, the child is killed first and the result is always
    /// [`EncodeError::Cancelled`], whatever the child's exit status.
    pub fn finish(mut self, cancel: bool) -> Result<FinishReport, EncodeError> {
        let pid = self.child.pid();
        if cancel {
            self.child.kill();
        }
        drop(self.stdin.take());

        let waited = self.child.wait(self.exit_timeout);
        let stderr = join_stderr(self.stderr_drain.take());
        let frames = self.frames_written;

        if cancel {
            match &waited {
                Ok(status) => tracing::info!(pid, frames, %status, "encoder cancelled"),
                Err(e) => tracing::warn!(pid, frames, error = %e, "encoder cancelled"),
            }
            return Err(EncodeError::Cancelled { frames });
        }

        let status = waited?;
        if let Some(err) = exit_failure(status, stderr) {
            tracing::error!(pid, frames, error = %err, "encoder failed");
            return Err(err);
        }
        tracing::info!(pid, frames, "encoder finished");
        Ok(FinishReport {
            frames_written: frames,
        })
    }
}

impl std::fmt::Debug for EncoderSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncoderSession")
            .field("pid", &self.child.pid())
            .field("target", &self.target)
            .field("state", &self.state())
            .field("frames_written", &self.frames_written)
            .finish()
    }
}
