use std::path::{Path, PathBuf};
use std::time::Duration;

use libloading::Library;

use crate::foundation::core::FrameBuffer;
use crate::foundation::error::LoadError;
use crate::plugin::abi::{
    AbiVersionFn, FinishedFn, FrameTarget, PANIM_ABI_VERSION, StateFn, StateLayoutFn, Tick,
    UpdateFn, symbols,
};
use crate::plugin::shadow::{ShadowCleanupReport, ShadowCopy, cleanup_stale_shadows};
use crate::plugin::source::{FrameSource, ModuleLoader};
use crate::state::{StateBlob, StateLayout};

const SHADOW_CLEANUP_GRACE_PERIOD: Duration = Duration::from_secs(60 * 60);

/// Loads plugin modules from shared libraries (`.so`, `.dylib`, `.dll`).
#[derive(Debug)]
pub struct DylibLoader {
    shadow_dir: PathBuf,
    generation: u64,
}

impl Default for DylibLoader {
    fn default() -> Self {
        Self::new(std::env::temp_dir().join("panim-shadow"))
    }
}

impl DylibLoader {
    /// Create a loader that keeps its shadow copies in `shadow_dir`.
    pub fn new(shadow_dir: impl Into<PathBuf>) -> Self {
        Self {
            shadow_dir: shadow_dir.into(),
            generation: 0,
        }
    }

    pub fn shadow_dir(&self) -> &Path {
        &self.shadow_dir
    }

    /// Best-effort removal of shadow copies left behind by crashed hosts.
    pub fn cleanup_stale_shadows(&self) -> ShadowCleanupReport {
        let report = cleanup_stale_shadows(&self.shadow_dir, SHADOW_CLEANUP_GRACE_PERIOD);
        if !report.is_empty() {
            tracing::debug!(
                plugin_shadow_scanned = report.scanned,
                plugin_shadow_deleted = report.deleted,
                plugin_shadow_failed = report.failed,
                plugin_shadow_skipped_recent = report.skipped_recent,
                "plugin shadow cleanup completed"
            );
        }
        report
    }
}

impl ModuleLoader for DylibLoader {
    type Module = DylibModule;

    fn open(&mut self, path: &Path) -> Result<DylibModule, LoadError> {
        if !path.is_file() {
            return Err(LoadError::cannot_open(path, "module file not found"));
        }
        let shadow = ShadowCopy::create(&self.shadow_dir, path, self.generation)
            .map_err(|e| LoadError::cannot_open(path, format!("failed to create shadow copy: {e}")))?;
        self.generation += 1;

        // SAFETY: Loading a foreign library runs its initializers; plugins are trusted code.
        let lib = unsafe { Library::new(shadow.path()) }
            .map_err(|e| LoadError::cannot_open(path, e.to_string()))?;

        let entry = EntryPoints::resolve(&lib, path)?;
        let abi = (entry.abi_version)();
        if abi != PANIM_ABI_VERSION {
            return Err(LoadError::AbiMismatch {
                path: path.to_path_buf(),
                module: abi,
                host: PANIM_ABI_VERSION,
            });
        }
        let layout = (entry.state_layout)();
        layout.validate().map_err(|reason| LoadError::InvalidLayout {
            path: path.to_path_buf(),
            reason,
        })?;

        tracing::debug!(
            path = %path.display(),
            shadow = %shadow.path().display(),
            state_len = layout.len,
            schema_version = layout.schema_version,
            "opened plugin module"
        );

        Ok(DylibModule {
            entry,
            layout,
            path: path.to_path_buf(),
            _lib: lib,
            _shadow: shadow,
        })
    }
}

#[derive(Clone, Copy)]
struct EntryPoints {
    abi_version: AbiVersionFn,
    state_layout: StateLayoutFn,
    init: StateFn,
    reset: StateFn,
    update: UpdateFn,
    finished: FinishedFn,
    pre_reload: StateFn,
    post_reload: StateFn,
}

impl EntryPoints {
    /// Resolve every required symbol or fail as a whole.
    fn resolve(lib: &Library, path: &Path) -> Result<Self, LoadError> {
        fn get<T: Copy>(lib: &Library, path: &Path, symbol: &'static str) -> Result<T, LoadError> {
            // SAFETY: `T` is the function pointer type the ABI declares for `symbol`; the pointer
            // is only called while `lib` stays loaded (both live in `DylibModule`).
            unsafe { lib.get::<T>(symbol.as_bytes()) }
                .map(|sym| *sym)
                .map_err(|_| LoadError::MissingSymbol {
                    path: path.to_path_buf(),
                    symbol,
                })
        }

        Ok(Self {
            abi_version: get(lib, path, symbols::ABI_VERSION)?,
            state_layout: get(lib, path, symbols::STATE_LAYOUT)?,
            init: get(lib, path, symbols::INIT)?,
            reset: get(lib, path, symbols::RESET)?,
            update: get(lib, path, symbols::UPDATE)?,
            finished: get(lib, path, symbols::FINISHED)?,
            pre_reload: get(lib, path, symbols::PRE_RELOAD)?,
            post_reload: get(lib, path, symbols::POST_RELOAD)?,
        })
    }
}

/// A loaded shared-library module with all entry points resolved.
pub struct DylibModule {
    entry: EntryPoints,
    layout: StateLayout,
    path: PathBuf,
    // Field order matters: the library must be closed before its shadow file is deleted.
    _lib: Library,
    _shadow: ShadowCopy,
}

impl DylibModule {
    /// Path the module was opened from (not the shadow copy).
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn call_state(&self, f: StateFn, state: &mut StateBlob) {
        let len = state.len();
        // SAFETY: the blob pointer is valid for `len` bytes and exclusively borrowed for the call.
        unsafe { f(state.as_mut_ptr(), len) }
    }
}

impl std::fmt::Debug for DylibModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DylibModule")
            .field("path", &self.path)
            .field("layout", &self.layout)
            .finish()
    }
}

impl FrameSource for DylibModule {
    fn layout(&self) -> StateLayout {
        self.layout
    }

    fn init(&mut self, state: &mut StateBlob) {
        self.call_state(self.entry.init, state);
    }

    fn reset(&mut self, state: &mut StateBlob) {
        self.call_state(self.entry.reset, state);
    }

    fn update(&mut self, state: &mut StateBlob, tick: Tick, target: &mut FrameBuffer) {
        let mut raw = FrameTarget {
            len: target.as_bytes().len(),
            width: target.width(),
            height: target.height(),
            stride: target.width().saturating_mul(4),
            pixels: target.as_mut_bytes().as_mut_ptr(),
        };
        let len = state.len();
        // SAFETY: state and pixel pointers are valid for their lengths and exclusively borrowed
        // for the duration of the call; `tick` and `raw` outlive it.
        unsafe { (self.entry.update)(state.as_mut_ptr(), len, &tick, &mut raw) }
    }

    fn finished(&mut self, state: &mut StateBlob) -> bool {
        let len = state.len();
        // SAFETY: see `call_state`.
        unsafe { (self.entry.finished)(state.as_mut_ptr(), len) }
    }

    fn pre_reload(&mut self, state: &mut StateBlob) {
        self.call_state(self.entry.pre_reload, state);
    }

    fn post_reload(&mut self, state: &mut StateBlob) {
        self.call_state(self.entry.post_reload, state);
    }
}
