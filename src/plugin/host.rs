use std::path::{Path, PathBuf};

use crate::foundation::core::FrameBuffer;
use crate::foundation::error::{LoadError, PanimResult};
use crate::plugin::abi::Tick;
use crate::plugin::source::{FrameSource, ModuleLoader};
use crate::state::{Migration, MigrationPlan, StateBlob, StateLayout};

/// Result of a successful [`PluginHost::reload`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReloadReport {
    /// Number of reloads performed by this host, this one included.
    pub generation: u64,
    pub migration: Migration,
}

/// Owns the single active plugin module and the state blob it animates.
///
/// The host is the only owner of both; the module sees the blob only for the duration of an
/// entry-point call.
pub struct PluginHost<L: ModuleLoader> {
    loader: L,
    path: PathBuf,
    module: L::Module,
    state: StateBlob,
    generation: u64,
}

impl<L: ModuleLoader> PluginHost<L> {
    /// Open the module at `path`, allocate its state and run `init` once.
    #[tracing::instrument(skip(loader, path), fields(path = %path.as_ref().display()))]
    pub fn load(mut loader: L, path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let mut module = loader.open(path)?;
        let layout = checked_layout(&module, path)?;

        let mut state = StateBlob::new(layout);
        module.init(&mut state);
        tracing::info!(
            state_len = state.len(),
            schema_version = layout.schema_version,
            "initialized plugin"
        );

        Ok(Self {
            loader,
            path: path.to_path_buf(),
            module,
            state,
            generation: 0,
        })
    }

    /// Swap in the module at `path`, carrying the current state across.
    ///
    /// The new module is opened and fully resolved before the old one is told anything, so on
    /// error the old module keeps running with its state untouched.
    #[tracing::instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub fn reload(&mut self, path: impl AsRef<Path>) -> PanimResult<ReloadReport> {
        let path = path.as_ref();
        let next = self.loader.open(path)?;
        let layout = checked_layout(&next, path)?;
        let plan = MigrationPlan::new(&self.state, layout)?;

        self.module.pre_reload(&mut self.state);
        drop(std::mem::replace(&mut self.module, next));

        let migration = plan.apply(&mut self.state);
        self.module.post_reload(&mut self.state);
        migration.stamp(&mut self.state);

        self.path = path.to_path_buf();
        self.generation += 1;
        tracing::info!(
            generation = self.generation,
            from_len = migration.from_len,
            to_len = migration.to_len,
            from_version = migration.from_version,
            to_version = migration.to_version,
            "reloaded plugin"
        );
        Ok(ReloadReport {
            generation: self.generation,
            migration,
        })
    }

    /// Reload from the path the current module was opened from.
    pub fn reload_in_place(&mut self) -> PanimResult<ReloadReport> {
        let path = self.path.clone();
        self.reload(path)
    }

    pub fn reset(&mut self) -> PanimResult<()> {
        self.ensure_upgraded()?;
        self.module.reset(&mut self.state);
        Ok(())
    }

    pub fn update(&mut self, tick: Tick, target: &mut FrameBuffer) -> PanimResult<()> {
        self.ensure_upgraded()?;
        target.resize(tick.width, tick.height);
        self.module.update(&mut self.state, tick, target);
        Ok(())
    }

    pub fn finished(&mut self) -> PanimResult<bool> {
        self.ensure_upgraded()?;
        Ok(self.module.finished(&mut self.state))
    }

    pub fn state(&self) -> &StateBlob {
        &self.state
    }

    pub fn layout(&self) -> StateLayout {
        self.module.layout()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn module(&self) -> &L::Module {
        &self.module
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    fn ensure_upgraded(&self) -> PanimResult<()> {
        self.state.ensure_fits(self.module.layout())?;
        Ok(())
    }
}

fn checked_layout<M: FrameSource>(module: &M, path: &Path) -> Result<StateLayout, LoadError> {
    let layout = module.layout();
    layout.validate().map_err(|reason| LoadError::InvalidLayout {
        path: path.to_path_buf(),
        reason,
    })?;
    Ok(layout)
}
