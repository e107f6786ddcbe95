//! FTP-specific error type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Categorised FTP error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FtpError {
    pub kind: FtpErrorKind,
    pub message: String,
    /// FTP reply code that triggered the error, if any.
    pub code: Option<u16>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FtpErrorKind {
    /// Control or data channel could not be established, or login failed.
    Connection,
    /// Malformed or unexpected reply on the control channel.
    Protocol,
    /// Malformed directory-listing line.
    Parse,
    /// Propagated transport read/write failure (includes EOF).
    Transport,
}

pub type FtpResult<T> = Result<T, FtpError>;

impl FtpError {
    pub fn new(kind: FtpErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: u16) -> Self {
        self.code = Some(code);
        self
    }

    // ── Convenience constructors ─────────────────────────────────

    pub fn connection(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::Connection, msg)
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::Protocol, msg)
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::Parse, msg)
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::Transport, msg)
    }

    /// A command drew a reply code other than the one it requires.
    pub fn unexpected_reply(verb: &str, want: u16, got: u16) -> Self {
        Self::new(
            FtpErrorKind::Protocol,
            format!("{}: expected {}, got {}", verb, want, got),
        )
        .with_code(got)
    }
}

impl fmt::Display for FtpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = self.code {
            write!(f, "[FTP {:?} {}] {}", self.kind, code, self.message)
        } else {
            write!(f, "[FTP {:?}] {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for FtpError {}

impl From<std::io::Error> for FtpError {
    fn from(e: std::io::Error) -> Self {
        Self::transport(e.to_string())
    }
}
