//! C ABI between the host and plugin modules.
//!
//! Every entry point receives the host-owned state blob as `(ptr, len)`. The pointer is at least
//! 8-byte aligned and starts with a [`StateHeader`](crate::state::StateHeader); module fields
//! follow at [`STATE_HEADER_LEN`](crate::state::STATE_HEADER_LEN).

use crate::state::StateLayout;

/// Bumped whenever a signature below changes.
pub const PANIM_ABI_VERSION: u32 = 1;

/// Parameters of one render step.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tick {
    /// Simulated seconds since the previous tick. Zero while paused.
    pub dt: f32,
    /// Target width in pixels.
    pub width: u32,
    /// Target height in pixels.
    pub height: u32,
    /// `true` when the frame goes to the encoder rather than the screen.
    pub offline: bool,
}

/// Off-screen RGBA8 surface the module renders into.
#[repr(C)]
#[derive(Debug)]
pub struct FrameTarget {
    pub pixels: *mut u8,
    /// Length of `pixels` in bytes, `stride * height`.
    pub len: usize,
    pub width: u32,
    pub height: u32,
    /// Bytes per row.
    pub stride: u32,
}

pub type AbiVersionFn = extern "C" fn() -> u32;
pub type StateLayoutFn = extern "C" fn() -> StateLayout;
pub type StateFn = unsafe extern "C" fn(state: *mut u8, len: usize);
pub type UpdateFn =
    unsafe extern "C" fn(state: *mut u8, len: usize, tick: *const Tick, target: *mut FrameTarget);
pub type FinishedFn = unsafe extern "C" fn(state: *mut u8, len: usize) -> bool;

/// Exported symbol names.
pub mod symbols {
    pub const ABI_VERSION: &str = "panim_abi_version";
    pub const STATE_LAYOUT: &str = "panim_state_layout";
    pub const INIT: &str = "panim_init";
    pub const RESET: &str = "panim_reset";
    pub const UPDATE: &str = "panim_update";
    pub const FINISHED: &str = "panim_finished";
    pub const PRE_RELOAD: &str = "panim_pre_reload";
    pub const POST_RELOAD: &str = "panim_post_reload";

    /// Every symbol a module must export.
    pub const REQUIRED: [&str; 8] = [
        ABI_VERSION,
        STATE_LAYOUT,
        INIT,
        RESET,
        UPDATE,
        FINISHED,
        PRE_RELOAD,
        POST_RELOAD,
    ];
}
