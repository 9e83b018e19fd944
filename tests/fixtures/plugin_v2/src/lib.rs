//! Second build of the reload fixture. Keeps the v1 fields and appends three more.

use panim::Tick;
use panim::plugin::sdk::{Animation, FrameView};

const MAGIC: u64 = 0x00c0_ffee;

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Counters {
    frames: u64,
    elapsed_us: u64,
    resets: u64,
    post_reloads: u64,
    /// Schema the state was written with when this build took over.
    from_version: u64,
    magic: u64,
}

pub struct CounterAnimation;

impl Animation for CounterAnimation {
    type State = Counters;
    const SCHEMA_VERSION: u32 = 2;

    fn init(state: &mut Counters) {
        *state = bytemuck::Zeroable::zeroed();
        state.from_version = u64::from(Self::SCHEMA_VERSION);
        state.magic = MAGIC;
    }

    fn reset(state: &mut Counters) {
        state.frames = 0;
        state.elapsed_us = 0;
        state.resets += 1;
    }

    fn update(state: &mut Counters, tick: &Tick, frame: &mut FrameView<'_>) {
        state.frames += 1;
        state.elapsed_us += (tick.dt * 1_000_000.0) as u64;
        frame.fill([0x44, 0x55, 0x66, 0xff]);
    }

    fn finished(state: &Counters) -> bool {
        state.frames >= 10
    }

    fn post_reload(state: &mut Counters, from_version: u32) {
        state.post_reloads += 1;
        state.from_version = u64::from(from_version);
        if state.magic == 0 {
            state.magic = MAGIC;
        }
    }
}

panim::export_animation!(CounterAnimation);
