//! Streaming rendered frames into an external encoder process.
//!
//! One [`EncoderSession`] owns one child process. Frames are written synchronously through the
//! child's stdin, so the renderer can never get more than one frame ahead of the encoder.

/// `ffmpeg` command-line configuration.
pub mod ffmpeg;
mod process;
/// Encoder session lifecycle.
pub mod session;

pub use ffmpeg::{EncoderConfig, is_encoder_on_path};
pub use session::{EncoderSession, FinishReport, SessionState};
