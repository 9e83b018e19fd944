//! Interactive/offline mode state machine.

/// Tick loop and mode transitions.
pub mod controller;
/// Frame presentation and PNG capture.
pub mod present;

pub use controller::{
    ControlEvent, ControllerOpts, EncoderLauncher, PlaybackController, PlaybackMode, TickEvent,
    TickReport,
};
pub use present::{HeadlessPresenter, Presenter, write_png};
