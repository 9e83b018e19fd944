use crate::foundation::error::StateError;
use crate::state::blob::{StateBlob, StateLayout};

/// A validated, not-yet-applied migration of a blob towards a new module layout.
///
/// Planning is side-effect free so a reload can bail out before touching the old module.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MigrationPlan {
    from_len: usize,
    to_len: usize,
    from_version: u32,
    to_version: u32,
}

/// Outcome of applying a [`MigrationPlan`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Migration {
    pub from_len: usize,
    pub to_len: usize,
    pub from_version: u32,
    pub to_version: u32,
}

impl Migration {
    /// `true` when the blob was reallocated.
    pub fn grew(&self) -> bool {
        self.to_len > self.from_len
    }
}

impl MigrationPlan {
    /// Validate `blob` and compute the migration towards `layout`.
    ///
    /// Only growth is planned. A blob already at least as long as the layout expects keeps its
    /// length and trailing bytes. The schema version never decreases.
    pub fn new(blob: &StateBlob, layout: StateLayout) -> Result<Self, StateError> {
        blob.validate()?;
        let from_len = blob.len();
        let from_version = blob.schema_version();
        Ok(Self {
            from_len,
            to_len: from_len.max(layout.len_bytes()),
            from_version,
            to_version: from_version.max(layout.schema_version),
        })
    }

    /// Grow the blob. The stored schema version is left untouched so the new module can see
    /// which schema the bytes were written with; call [`Migration::stamp`] afterwards.
    pub fn apply(self, blob: &mut StateBlob) -> Migration {
        debug_assert_eq!(blob.len(), self.from_len);
        if self.to_len > self.from_len {
            tracing::info!(
                from_len = self.from_len,
                to_len = self.to_len,
                "migrating plugin state schema"
            );
            blob.grow_to(self.to_len);
        }
        Migration {
            from_len: self.from_len,
            to_len: self.to_len,
            from_version: self.from_version,
            to_version: self.to_version,
        }
    }
}

impl Migration {
    /// Record the post-migration schema version in the blob header.
    pub fn stamp(&self, blob: &mut StateBlob) {
        if blob.schema_version() != self.to_version {
            blob.set_schema_version(self.to_version);
        }
    }
}

/// Plan, apply and stamp in one step, for callers with no module hook in between.
pub fn migrate(blob: &mut StateBlob, layout: StateLayout) -> Result<Migration, StateError> {
    let migration = MigrationPlan::new(blob, layout)?.apply(blob);
    migration.stamp(blob);
    Ok(migration)
}
