//! Helpers for writing plugin modules in Rust.
//!
//! A plugin crate (`crate-type = ["cdylib"]`) implements [`Animation`] and invokes
//! [`export_animation!`](crate::export_animation) once:
//!
//! ```ignore
//! #[repr(C)]
//! #[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
//! struct Pulse { time: f32, phase: f32 }
//!
//! struct PulseAnimation;
//!
//! impl panim::plugin::sdk::Animation for PulseAnimation {
//!     type State = Pulse;
//!     const SCHEMA_VERSION: u32 = 1;
//!
//!     fn reset(state: &mut Pulse) { state.time = 0.0; }
//!
//!     fn update(state: &mut Pulse, tick: &panim::Tick, frame: &mut panim::plugin::sdk::FrameView<'_>) {
//!         state.time += tick.dt;
//!         frame.fill([0, 0, 0, 255]);
//!     }
//! }
//!
//! panim::export_animation!(PulseAnimation);
//! ```
//!
//! `State` holds only the module's own fields; the SDK places it after the
//! [`StateHeader`]. Newer builds may append fields to `State` but must keep existing ones at the
//! same offsets. Appended fields start out zeroed.

use crate::plugin::abi::{FrameTarget, Tick};
use crate::state::{STATE_HEADER_LEN, StateHeader, StateLayout};

/// Safe-Rust side of the plugin entry-point contract.
pub trait Animation: 'static {
    /// Module-private state. Must be valid when all-zero and at most 16-byte aligned.
    type State: bytemuck::Pod;

    /// Schema version of `State`. Bump when the meaning of existing bytes changes.
    const SCHEMA_VERSION: u32;

    /// Called once on a zeroed state when the host first loads the module.
    fn init(state: &mut Self::State) {
        Self::reset(state);
    }

    /// Reset time-dependent fields.
    fn reset(state: &mut Self::State);

    /// Advance by `tick.dt` and draw one frame.
    fn update(state: &mut Self::State, tick: &Tick, frame: &mut FrameView<'_>);

    fn finished(_state: &Self::State) -> bool {
        false
    }

    /// Release external resources before the library is unloaded.
    fn pre_reload(_state: &mut Self::State) {}

    /// Called on the new build. `from_version` is the schema the bytes were last written with;
    /// appended fields are already zeroed.
    fn post_reload(_state: &mut Self::State, _from_version: u32) {}
}

/// Mutable view of the host's frame target.
pub struct FrameView<'a> {
    pixels: &'a mut [u8],
    width: u32,
    height: u32,
    stride: usize,
}

impl<'a> FrameView<'a> {
    pub fn new(pixels: &'a mut [u8], width: u32, height: u32) -> Option<Self> {
        let stride = width as usize * 4;
        (pixels.len() >= stride * height as usize).then_some(Self {
            pixels,
            width,
            height,
            stride,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn fill(&mut self, rgba: [u8; 4]) {
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
    }

    /// Set one pixel. Out-of-bounds coordinates are ignored.
    pub fn put(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let at = y as usize * self.stride + x as usize * 4;
        self.pixels[at..at + 4].copy_from_slice(&rgba);
    }

    pub fn row_mut(&mut self, y: u32) -> Option<&mut [u8]> {
        if y >= self.height {
            return None;
        }
        let at = y as usize * self.stride;
        Some(&mut self.pixels[at..at + self.stride])
    }
}

/// Layout reported by a module built from `A`.
pub fn layout_of<A: Animation>() -> StateLayout {
    StateLayout::new(
        STATE_HEADER_LEN + std::mem::size_of::<A::State>(),
        A::SCHEMA_VERSION,
    )
}

/// Split a raw blob into its header version and typed module state.
///
/// # Safety
/// `ptr` must be valid for reads and writes of `len` bytes for `'s` and not aliased.
pub unsafe fn state_from_raw<'s, A: Animation>(
    ptr: *mut u8,
    len: usize,
) -> Option<(u32, &'s mut A::State)> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: guaranteed by the caller.
    let bytes = unsafe { std::slice::from_raw_parts_mut(ptr, len) };
    state_from_bytes::<A>(bytes)
}

/// Safe counterpart of [`state_from_raw`] over a byte slice.
pub fn state_from_bytes<A: Animation>(bytes: &mut [u8]) -> Option<(u32, &mut A::State)> {
    let size = std::mem::size_of::<A::State>();
    if bytes.len() < STATE_HEADER_LEN + size {
        return None;
    }
    let (head, rest) = bytes.split_at_mut(STATE_HEADER_LEN);
    let header: StateHeader = bytemuck::pod_read_unaligned(head);
    let state = bytemuck::try_from_bytes_mut::<A::State>(&mut rest[..size]).ok()?;
    Some((header.schema_version, state))
}

/// Borrow the pixel memory described by `target`.
///
/// # Safety
/// `target` must be null or point to a valid [`FrameTarget`] whose `pixels` are valid for `len`
/// bytes and not aliased for `'f`.
pub unsafe fn frame_from_raw<'f>(target: *mut FrameTarget) -> Option<FrameView<'f>> {
    // SAFETY: guaranteed by the caller.
    let target = unsafe { target.as_mut() }?;
    if target.pixels.is_null() {
        return None;
    }
    // SAFETY: guaranteed by the caller.
    let pixels = unsafe { std::slice::from_raw_parts_mut(target.pixels, target.len) };
    FrameView::new(pixels, target.width, target.height)
}

/// Export the C entry points of an [`Animation`] implementation.
#[macro_export]
macro_rules! export_animation {
    ($anim:ty) => {
        #[unsafe(no_mangle)]
        pub extern "C" fn panim_abi_version() -> u32 {
            $crate::plugin::abi::PANIM_ABI_VERSION
        }

        #[unsafe(no_mangle)]
        pub extern "C" fn panim_state_layout() -> $crate::state::StateLayout {
            $crate::plugin::sdk::layout_of::<$anim>()
        }

        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn panim_init(state: *mut u8, len: usize) {
            if let Some((_, s)) =
                unsafe { $crate::plugin::sdk::state_from_raw::<$anim>(state, len) }
            {
                <$anim as $crate::plugin::sdk::Animation>::init(s);
            }
        }

        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn panim_reset(state: *mut u8, len: usize) {
            if let Some((_, s)) =
                unsafe { $crate::plugin::sdk::state_from_raw::<$anim>(state, len) }
            {
                <$anim as $crate::plugin::sdk::Animation>::reset(s);
            }
        }

        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn panim_update(
            state: *mut u8,
            len: usize,
            tick: *const $crate::plugin::abi::Tick,
            target: *mut $crate::plugin::abi::FrameTarget,
        ) {
            let Some((_, s)) =
                (unsafe { $crate::plugin::sdk::state_from_raw::<$anim>(state, len) })
            else {
                return;
            };
            let Some(tick) = (unsafe { tick.as_ref() }) else {
                return;
            };
            let Some(mut frame) = (unsafe { $crate::plugin::sdk::frame_from_raw(target) }) else {
                return;
            };
            <$anim as $crate::plugin::sdk::Animation>::update(s, tick, &mut frame);
        }

        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn panim_finished(state: *mut u8, len: usize) -> bool {
            match unsafe { $crate::plugin::sdk::state_from_raw::<$anim>(state, len) } {
                Some((_, s)) => <$anim as $crate::plugin::sdk::Animation>::finished(s),
                None => true,
            }
        }

        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn panim_pre_reload(state: *mut u8, len: usize) {
            if let Some((_, s)) =
                unsafe { $crate::plugin::sdk::state_from_raw::<$anim>(state, len) }
            {
                <$anim as $crate::plugin::sdk::Animation>::pre_reload(s);
            }
        }

        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn panim_post_reload(state: *mut u8, len: usize) {
            if let Some((version, s)) =
                unsafe { $crate::plugin::sdk::state_from_raw::<$anim>(state, len) }
            {
                <$anim as $crate::plugin::sdk::Animation>::post_reload(s, version);
            }
        }
    };
}
