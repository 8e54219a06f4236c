//! Error type shared by every spark-net crate.
//!
//! Grounded in `spark-core::error::CoreError` from the teacher, scaled
//! down: the teacher's version is a `no_std`-compatible builder struct with
//! metadata maps, which is more machinery than a single-purpose reactor
//! needs. What's kept is the idea a stable string code, not a bare
//! `io::Error`, is what callers and logs should key off of.

use std::fmt;
use std::io;

/// Broad bucket a [`CoreError`] falls into, used by the selector's failure
/// model (spec §7): `Io`/`Protocol` errors are channel-scoped and close just
/// the offending channel, `Timeout` errors close the channel whose deadline
/// fired, and `Config` errors are fatal at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Io,
    Protocol,
    Config,
    Timeout,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCategory::Io => "io",
            ErrorCategory::Protocol => "protocol",
            ErrorCategory::Config => "config",
            ErrorCategory::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

/// The error type shared across the workspace.
///
/// Carries a stable `code` (safe to key dashboards/log queries off of, unlike
/// the `Display` text) plus the category used to route the failure.
#[derive(thiserror::Error, Debug)]
#[error("[{code}] {message}")]
pub struct CoreError {
    code: &'static str,
    category: ErrorCategory,
    message: String,
    #[source]
    source: Option<io::Error>,
}

impl CoreError {
    pub fn new(code: &'static str, category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            code,
            category,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: io::Error) -> Self {
        self.source = Some(source);
        self
    }

    pub fn io(code: &'static str, source: io::Error) -> Self {
        Self::new(code, ErrorCategory::Io, source.to_string()).with_source(source)
    }

    pub fn protocol(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(code, ErrorCategory::Protocol, message)
    }

    pub fn config(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(code, ErrorCategory::Config, message)
    }

    pub fn timeout(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(code, ErrorCategory::Timeout, message)
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    /// Whether this failure should only take down the channel that raised
    /// it, as opposed to the whole selector.
    pub fn is_channel_scoped(&self) -> bool {
        matches!(
            self.category,
            ErrorCategory::Io | ErrorCategory::Protocol | ErrorCategory::Timeout
        )
    }
}

impl From<io::Error> for CoreError {
    fn from(source: io::Error) -> Self {
        CoreError::io("io.unclassified", source)
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
