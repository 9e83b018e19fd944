//! First build of the reload fixture: three counters after the header.

use panim::Tick;
use panim::plugin::sdk::{Animation, FrameView};

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Counters {
    frames: u64,
    elapsed_us: u64,
    resets: u64,
}

pub struct CounterAnimation;

impl Animation for CounterAnimation {
    type State = Counters;
    const SCHEMA_VERSION: u32 = 1;

    fn init(state: &mut Counters) {
        *state = bytemuck::Zeroable::zeroed();
    }

    fn reset(state: &mut Counters) {
        state.frames = 0;
        state.elapsed_us = 0;
        state.resets += 1;
    }

    fn update(state: &mut Counters, tick: &Tick, frame: &mut FrameView<'_>) {
        state.frames += 1;
        state.elapsed_us += (tick.dt * 1_000_000.0) as u64;
        frame.fill([0x11, 0x22, 0x33, 0xff]);
    }

    fn finished(state: &Counters) -> bool {
        state.frames >= 10
    }
}

panim::export_animation!(CounterAnimation);
