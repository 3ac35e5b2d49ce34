//! error types.
//!
//! only [`StartupError`] is fatal. everything a reader reports is recovered from by omitting the
//! dependent panel for the current tick; the next tick is the retry.

use {
    crate::reader::ReaderKind,
    std::{fmt, io, path::PathBuf, string::FromUtf8Error, time::Duration},
    thiserror::Error,
};

/// a reader could not produce a sample this tick.
#[derive(Debug, Error)]
pub enum ReaderError {
    /// a kernel interface does not exist or may not be read.
    #[error("cannot read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// the external helper is missing, refused to run, or failed.
    #[error("helper `{program}` is unavailable: {source}")]
    HelperUnavailable {
        program: String,
        #[source]
        source: HelperError,
    },
    /// the external helper did not answer within its soft time budget.
    #[error("helper `{program}` did not finish within {budget:?}")]
    TimedOut { program: String, budget: Duration },
}

/// an external helper command failed.
#[derive(Debug, Error)]
pub enum HelperError {
    #[error("could not be started: {0}")]
    Spawn(#[source] io::Error),
    #[error("could not be waited for: {0}")]
    Wait(#[source] io::Error),
    #[error("printed invalid utf-8: {0}")]
    Encoding(#[source] FromUtf8Error),
    #[error("exited unsuccessfully ({}): {stderr}", code.map_or_else(|| "signal".to_owned(), |c| c.to_string()))]
    Failed { code: Option<i32>, stderr: String },
    #[error("did not finish within {0:?}")]
    TimedOut(Duration),
}

/// one entity of a kernel text interface could not be parsed.
///
/// this never fails a whole sample; the entity is dropped for the tick.
#[derive(Debug, Eq, PartialEq, Error)]
pub enum ParseError {
    #[error("expected at least {expected} fields, found {found}")]
    Truncated { expected: usize, found: usize },
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("invalid value {value:?} for `{field}`")]
    InvalidNumber { field: &'static str, value: String },
    #[error("malformed line: {0:?}")]
    Malformed(String),
}

/// the command line described an unusable configuration.
#[derive(Debug, Eq, PartialEq, Error)]
pub enum ConfigError {
    #[error("column width must be at least {min}, got {got}")]
    ColumnWidth { min: u16, got: u16 },
    #[error("refresh interval must be at least {min:?}, got {got:?}")]
    Interval { min: Duration, got: Duration },
    #[error("the cache helper command is empty")]
    EmptyHelper,
}

/// the monitor cannot start.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("mandatory source `{kind}` is unavailable: {source}")]
    Mandatory {
        kind: ReaderKind,
        #[source]
        source: ReaderError,
    },
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("cannot install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),
    #[error("terminal error: {0}")]
    Terminal(#[from] io::Error),
    #[error("cannot render a frame")]
    Render(#[from] fmt::Error),
}

// === impl ReaderError ===

impl ReaderError {
    /// returns true if the failure is expected to clear up on its own by the next tick.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }

    pub(crate) fn unreadable(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Unreadable {
            path: path.into(),
            source,
        }
    }
}
