//! panim hosts hot-reloadable animation plugins and renders them to video.
//!
//! - Load a plugin module with [`PluginHost::load`] and hot-swap it with [`PluginHost::reload`];
//!   its state survives the swap and grows when newer builds append fields.
//! - Stream frames into an external encoder with [`EncoderSession`].
//! - Drive both from a tick loop with [`PlaybackController`].

pub mod config;
/// Streaming frames to an encoder subprocess.
pub mod encode;
mod foundation;
/// Interactive and offline playback.
pub mod playback;
/// Plugin modules, their ABI and the host that owns them.
pub mod plugin;
/// Plugin state storage and migration.
pub mod state;

pub use crate::config::HostConfig;
pub use crate::encode::{EncoderConfig, EncoderSession, FinishReport, SessionState};
pub use crate::foundation::core::{FrameBuffer, RenderTarget};
pub use crate::foundation::error::{EncodeError, LoadError, PanimError, PanimResult, StateError};
pub use crate::playback::{
    ControlEvent, ControllerOpts, EncoderLauncher, HeadlessPresenter, PlaybackController,
    PlaybackMode, Presenter, TickEvent, TickReport,
};
pub use crate::plugin::{
    DylibLoader, DylibModule, FrameSource, FrameTarget, ModuleLoader, PluginHost, ReloadReport,
    Tick,
};
pub use crate::state::{Migration, StateBlob, StateHeader, StateLayout};
