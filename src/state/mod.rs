//! Host-owned plugin state and its additive schema migration.
//!
//! A plugin never allocates its own animation state. The host allocates a [`StateBlob`] sized to
//! the module's [`StateLayout`], hands it to every entry point, and grows it when a newer module
//! appends fields.

/// State storage and header layout.
pub mod blob;
/// Grow-only migration between module versions.
pub mod migrate;

pub use blob::{STATE_HEADER_LEN, StateBlob, StateHeader, StateLayout};
pub use migrate::{Migration, MigrationPlan};
