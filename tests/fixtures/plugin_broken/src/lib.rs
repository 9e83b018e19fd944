//! A build that forgot to export `panim_finished`.

#![allow(dead_code)]

#[repr(C)]
pub struct StateLayout {
    len: u64,
    schema_version: u32,
    reserved: u32,
}

#[repr(C)]
pub struct Tick {
    dt: f32,
    width: u32,
    height: u32,
    offline: bool,
}

#[repr(C)]
pub struct FrameTarget {
    pixels: *mut u8,
    len: usize,
    width: u32,
    height: u32,
    stride: u32,
}

const HEADER_LEN: usize = 16;

#[repr(C)]
struct State {
    frames: u64,
    elapsed_us: u64,
    resets: u64,
}

const COLOR: [u8; 4] = [0x11, 0x22, 0x33, 0xff];

unsafe fn state<'a>(ptr: *mut u8, len: usize) -> Option<&'a mut State> {
    if ptr.is_null() || len < HEADER_LEN + size_of::<State>() {
        return None;
    }
    unsafe { ptr.add(HEADER_LEN).cast::<State>().as_mut() }
}

#[unsafe(no_mangle)]
pub extern "C" fn panim_abi_version() -> u32 {
    1
}

#[unsafe(no_mangle)]
pub extern "C" fn panim_state_layout() -> StateLayout {
    StateLayout {
        len: (HEADER_LEN + size_of::<State>()) as u64,
        schema_version: 1,
        reserved: 0,
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn panim_init(ptr: *mut u8, len: usize) {
    if let Some(s) = unsafe { state(ptr, len) } {
        s.frames = 0;
        s.elapsed_us = 0;
        s.resets = 0;
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn panim_reset(ptr: *mut u8, len: usize) {
    if let Some(s) = unsafe { state(ptr, len) } {
        s.frames = 0;
        s.elapsed_us = 0;
        s.resets += 1;
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn panim_update(
    ptr: *mut u8,
    len: usize,
    tick: *const Tick,
    target: *mut FrameTarget,
) {
    let (Some(s), Some(tick), Some(target)) =
        (unsafe { state(ptr, len) }, unsafe { tick.as_ref() }, unsafe { target.as_mut() })
    else {
        return;
    };
    s.frames += 1;
    s.elapsed_us += (tick.dt * 1_000_000.0) as u64;
    if target.pixels.is_null() {
        return;
    }
    let pixels = unsafe { std::slice::from_raw_parts_mut(target.pixels, target.len) };
    for px in pixels.chunks_exact_mut(4) {
        px.copy_from_slice(&COLOR);
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn panim_pre_reload(_ptr: *mut u8, _len: usize) {}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn panim_post_reload(_ptr: *mut u8, _len: usize) {}
