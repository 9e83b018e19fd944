//! Loading, reloading and calling into animation plugin modules.
//!
//! - [`abi`] is the C ABI shared by host and plugin.
//! - [`source`] declares the entry-point contract as the [`FrameSource`] trait.
//! - [`dylib`] implements it over shared libraries.
//! - [`host`] owns the active module and its state across reloads.
//! - [`sdk`] lets plugin crates implement the ABI in safe Rust.

pub mod abi;
pub mod dylib;
pub mod host;
pub mod sdk;
mod shadow;
pub mod source;

pub use abi::{FrameTarget, PANIM_ABI_VERSION, Tick};
pub use dylib::{DylibLoader, DylibModule};
pub use host::{PluginHost, ReloadReport};
pub use shadow::ShadowCleanupReport;
pub use source::{FrameSource, ModuleLoader};
