#![allow(dead_code)]

pub mod fixtures;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use panim::{FrameBuffer, FrameSource, LoadError, ModuleLoader, StateBlob, StateLayout, Tick};

/// Offset of the fake modules' frame counter (first field after the header).
pub const COUNTER_AT: usize = 16;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Init(&'static str),
    Reset(&'static str),
    Update(&'static str),
    PreReload(&'static str),
    PostReload(&'static str),
}

/// A module the fake loader can hand out.
#[derive(Clone, Copy, Debug)]
pub struct ModuleDef {
    pub name: &'static str,
    pub layout: StateLayout,
    /// Report `finished` once the counter reaches this value.
    pub finish_after: Option<u64>,
    pub color: [u8; 4],
    /// Overwrite the host-owned header length during `update`.
    pub corrupt_header: bool,
}

impl ModuleDef {
    pub fn new(name: &'static str, len: usize, schema_version: u32) -> Self {
        Self {
            name,
            layout: StateLayout::new(len, schema_version),
            finish_after: None,
            color: [10, 20, 30, 255],
            corrupt_header: false,
        }
    }

    pub fn finishing_after(mut self, frames: u64) -> Self {
        self.finish_after = Some(frames);
        self
    }

    pub fn corrupting_header(mut self) -> Self {
        self.corrupt_header = true;
        self
    }
}

/// In-process loader keyed by path. Unknown paths fail to open.
#[derive(Clone, Default)]
pub struct FakeLoader {
    defs: HashMap<PathBuf, ModuleDef>,
    pub calls: Arc<Mutex<Vec<Call>>>,
}

impl FakeLoader {
    pub fn with(mut self, path: impl Into<PathBuf>, def: ModuleDef) -> Self {
        self.defs.insert(path.into(), def);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

impl ModuleLoader for FakeLoader {
    type Module = FakeModule;

    fn open(&mut self, path: &Path) -> Result<FakeModule, LoadError> {
        let def = self
            .defs
            .get(path)
            .copied()
            .ok_or_else(|| LoadError::cannot_open(path, "no such fake module"))?;
        Ok(FakeModule {
            def,
            calls: Arc::clone(&self.calls),
        })
    }
}

pub struct FakeModule {
    pub def: ModuleDef,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl FakeModule {
    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

pub fn counter(state: &StateBlob) -> u64 {
    let bytes: [u8; 8] = state.as_bytes()[COUNTER_AT..COUNTER_AT + 8]
        .try_into()
        .unwrap();
    u64::from_ne_bytes(bytes)
}

fn set_counter(state: &mut StateBlob, value: u64) {
    state.as_mut_bytes()[COUNTER_AT..COUNTER_AT + 8].copy_from_slice(&value.to_ne_bytes());
}

impl FrameSource for FakeModule {
    fn layout(&self) -> StateLayout {
        self.def.layout
    }

    fn init(&mut self, state: &mut StateBlob) {
        self.record(Call::Init(self.def.name));
        set_counter(state, 0);
    }

    fn reset(&mut self, state: &mut StateBlob) {
        self.record(Call::Reset(self.def.name));
        set_counter(state, 0);
    }

    fn update(&mut self, state: &mut StateBlob, _tick: Tick, target: &mut FrameBuffer) {
        self.record(Call::Update(self.def.name));
        set_counter(state, counter(state) + 1);
        if self.def.corrupt_header {
            state.as_mut_bytes()[..8].copy_from_slice(&7u64.to_ne_bytes());
        }
        for px in target.as_mut_bytes().chunks_exact_mut(4) {
            px.copy_from_slice(&self.def.color);
        }
    }

    fn finished(&mut self, state: &mut StateBlob) -> bool {
        self.def
            .finish_after
            .is_some_and(|frames| counter(state) >= frames)
    }

    fn pre_reload(&mut self, _state: &mut StateBlob) {
        self.record(Call::PreReload(self.def.name));
    }

    fn post_reload(&mut self, _state: &mut StateBlob) {
        self.record(Call::PostReload(self.def.name));
    }
}
