//! Error taxonomy. Every fallible engine operation returns
//! `Result<T, EngineError>`; library code never panics on bad *external*
//! input, but programmer errors (invalid extent, duplicate layer id, ...)
//! are still reported through `Err`, not swallowed, and additionally fire a
//! `debug_assert!` so misuse surfaces immediately in development builds.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// An in-flight operation was cancelled because its owning node/target
    /// became irrelevant (invisible, disposed, reset). Handlers must treat
    /// this as a no-op, not a failure: no logging, no state-machine penalty.
    #[error("cancelled")]
    Cancelled,

    /// Transient network failure; the vector pipeline arms backoff on this,
    /// the raster pipeline just retries opportunistically next frame.
    #[error("network error: {0}")]
    Network(String),

    /// Transient parse failure (malformed response body that might succeed
    /// on retry, e.g. a truncated download). Same retry semantics as
    /// `Network`.
    #[error("parse error: {0}")]
    Parse(String),

    /// Permanent, non-retryable data problem: invalid CRS, missing tileset
    /// root, unsupported content type. Blocks all future attempts for the
    /// affected node/layer.
    #[error("definitive data error: {0}")]
    DefinitiveData(String),

    /// Caller passed invalid input to a synchronous API: invalid extent,
    /// unknown layer attribute, duplicate layer id, illegal state
    /// transition. Returned synchronously, never deferred.
    #[error("programmer error: {0}")]
    Programmer(String),

    /// The render target pool or GPU backend reported context loss. Entities
    /// must repaint from scratch when they next see `on_rendering_context_restored`.
    #[error("render context lost")]
    ContextLost,

    #[error("io error: {0}")]
    Io(String),
}

impl EngineError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, EngineError::Cancelled)
    }

    pub fn is_definitive(&self) -> bool {
        matches!(self, EngineError::DefinitiveData(_) | EngineError::Programmer(_))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Raises a [`EngineError::Programmer`] and asserts in debug builds — the
/// idiom used at API boundaries that must reject bad caller input loudly.
macro_rules! programmer_error {
    ($($arg:tt)*) => {{
        let msg = format!($($arg)*);
        debug_assert!(false, "programmer error: {msg}");
        $crate::error::EngineError::Programmer(msg)
    }};
}
pub(crate) use programmer_error;
