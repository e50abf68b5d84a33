//! Typed error variants for IR construction, distinct from the driver-level
//! `anyhow::Error` used for user/IO errors (see `driver`).
//!
//! Per spec §7, internal invariant violations during IR build are bugs, not
//! expected runtime errors: a well-typed AST must never trigger them. They
//! are kept as a typed enum (rather than an immediate panic) so callers --
//! notably tests -- can assert on *which* invariant tripped, but the driver
//! treats any `BuildError::Internal` as fatal and aborts with a backtrace.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("internal error: {0}")]
    Internal(String),

    #[error("unsupported construct: {0}")]
    Unsupported(String),

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("undefined label `{0}`")]
    UndefinedLabel(String),

    #[error("`break` or `continue` outside any loop or switch")]
    DanglingJump,
}

pub type BuildResult<T> = Result<T, BuildError>;

/// Raise an internal-invariant error. A well-typed AST must never reach
/// this; it exists so construction can propagate `Result` instead of
/// panicking deep inside a recursive lowering call, while still being fatal
/// once it surfaces at the driver.
#[macro_export]
macro_rules! ice {
    ($($arg:tt)*) => {
        $crate::error::BuildError::Internal(format!($($arg)*))
    };
}
