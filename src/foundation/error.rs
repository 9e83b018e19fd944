use std::path::PathBuf;
use std::time::Duration;

/// Crate-wide result alias.
pub type PanimResult<T> = Result<T, PanimError>;

/// Top-level error type surfaced by the host.
#[derive(thiserror::Error, Debug)]
pub enum PanimError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("plugin load error: {0}")]
    Load(#[from] LoadError),

    #[error("plugin state error: {0}")]
    State(#[from] StateError),

    #[error("encoder error: {0}")]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PanimError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

/// Failure to open a plugin module or to resolve its entry points.
#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("cannot open module '{}': {reason}", path.display())]
    CannotOpen { path: PathBuf, reason: String },

    #[error("module '{}' does not export required symbol `{symbol}`", path.display())]
    MissingSymbol { path: PathBuf, symbol: &'static str },

    #[error("module '{}' was built against abi v{module}, host speaks v{host}", path.display())]
    AbiMismatch { path: PathBuf, module: u32, host: u32 },

    #[error("module '{}' reports an invalid state layout: {reason}", path.display())]
    InvalidLayout { path: PathBuf, reason: String },
}

impl LoadError {
    pub fn cannot_open(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CannotOpen {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Violations of the state blob contract.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("state header reports {stored} bytes but the host holds {allocated}")]
    CorruptHeader { stored: u64, allocated: usize },

    #[error("state is {stored} bytes, active module expects at least {expected}")]
    NotUpgraded { stored: usize, expected: usize },
}

/// Failures of the encoder subprocess and its pipe.
#[derive(thiserror::Error, Debug)]
pub enum EncodeError {
    #[error("invalid render target: {0}")]
    InvalidTarget(String),

    #[error("failed to spawn encoder '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to prepare output directory '{}': {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("frame size mismatch: got {got} bytes, expected {expected}")]
    FrameSize { got: usize, expected: usize },

    #[error("failed to write frame to encoder pipe: {0}")]
    Io(#[source] std::io::Error),

    #[error("encoder session is closed")]
    Closed,

    #[error("failed to wait for encoder to exit: {0}")]
    Wait(#[source] std::io::Error),

    #[error("encoder exited with code {code}: {stderr}")]
    Exit { code: i32, stderr: String },

    #[error("encoder was terminated by signal {signal}: {stderr}")]
    Signaled { signal: i32, stderr: String },

    #[error("encoder did not exit within {after:?} and was killed")]
    TimedOut { after: Duration },

    #[error("render cancelled after {frames} frames")]
    Cancelled { frames: u64 },
}
