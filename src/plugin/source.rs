use std::path::Path;

use crate::foundation::core::FrameBuffer;
use crate::foundation::error::LoadError;
use crate::plugin::abi::Tick;
use crate::state::{StateBlob, StateLayout};

/// The entry-point contract of an animation module.
///
/// A value of this type only exists once every entry point has been resolved, so callers never
/// see a partially loaded module. State is always passed in by the host; implementations keep no
/// reference to it between calls.
pub trait FrameSource {
    /// Statically known state requirements of this build.
    fn layout(&self) -> StateLayout;
    /// First-time setup of a freshly allocated, zeroed blob. Called once per host.
    fn init(&mut self, state: &mut StateBlob);
    /// Reset time-dependent fields. Must not change the schema.
    fn reset(&mut self, state: &mut StateBlob);
    /// Advance by `tick.dt` and render into `target`.
    fn update(&mut self, state: &mut StateBlob, tick: Tick, target: &mut FrameBuffer);
    /// `true` once the animation has run to its end.
    fn finished(&mut self, state: &mut StateBlob) -> bool;
    /// Release module-held external resources before the code image goes away.
    fn pre_reload(&mut self, state: &mut StateBlob);
    /// Adopt a (possibly migrated) blob and reacquire resources.
    fn post_reload(&mut self, state: &mut StateBlob);
}

/// Opens modules by path.
pub trait ModuleLoader {
    type Module: FrameSource;

    /// Open the module at `path` and resolve all of its entry points.
    fn open(&mut self, path: &Path) -> Result<Self::Module, LoadError>;
}
