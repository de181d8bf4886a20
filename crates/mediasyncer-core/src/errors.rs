//! Error classification for the auction core.
//!
//! Three classes: recoverable-and-skipped conditions never reach here (callers just
//! `log::warn!` and move on), transport failures are bubbled as
//! [`MediaSyncerError::Transport`]/[`MediaSyncerError::Io`], and programmer / protocol
//! violations are [`MediaSyncerError::Fatal`] — the caller is expected to treat those as
//! unrecoverable for the current process.

use std::fmt;

/// Category of a `MediaSyncerError`, used by callers deciding whether to keep looping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A peer or filesystem hiccup; the operation can be retried or simply dropped.
    Recoverable,
    /// A protocol or local invariant was violated; the process should not continue.
    Fatal,
}

#[derive(Debug)]
pub enum MediaSyncerError {
    /// The local filesystem (or an in-memory stand-in for it) returned an error.
    Io(std::io::Error),
    /// A `Transport::send`/`broadcast` failed.
    Transport(String),
    /// A protocol or local-invariant violation: malformed timestamp, volume-id mismatch,
    /// an unexpected stat error, listener bind failure. Not safe to continue past.
    Fatal(String),
}

impl MediaSyncerError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            MediaSyncerError::Io(_) | MediaSyncerError::Transport(_) => ErrorCategory::Recoverable,
            MediaSyncerError::Fatal(_) => ErrorCategory::Fatal,
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        MediaSyncerError::Fatal(message.into())
    }

    pub fn transport(message: impl Into<String>) -> Self {
        MediaSyncerError::Transport(message.into())
    }
}

impl fmt::Display for MediaSyncerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaSyncerError::Io(err) => write!(f, "io error: {err}"),
            MediaSyncerError::Transport(msg) => write!(f, "transport error: {msg}"),
            MediaSyncerError::Fatal(msg) => write!(f, "fatal: {msg}"),
        }
    }
}

impl std::error::Error for MediaSyncerError {}

impl From<std::io::Error> for MediaSyncerError {
    fn from(err: std::io::Error) -> Self {
        MediaSyncerError::Io(err)
    }
}

pub type Result<T> = std::result::Result<T, MediaSyncerError>;
