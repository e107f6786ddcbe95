//! # ftpfs-core — FTP client core for a mountable remote filesystem
//!
//! Implements the client side of FTP (RFC 959) the way a filesystem
//! driver needs it: a bounded pool of long-lived connections, passive
//! data channels that stay open between reads so sequential I/O resumes
//! without renegotiation, and a strict Unix listing parser.
//!
//! Architecture:
//! - `types` — configuration, replies, directory entries, mode bits
//! - `error` — FTP-specific error type with failure-class kinds
//! - `transport` — stream-dialing seam (TCP in production, in-memory in tests)
//! - `protocol` — low-level command/reply codec, PASV endpoint parsing
//! - `connection` — one control + optional data channel, ABOR handling
//! - `pool` — bounded connection pool with three-tier selection
//! - `parser` — Unix `LIST -al` output parsing
//! - `file_ops` — read, write, list, rename, create, delete, mkdir, rmdir
//!
//! The wire verbs are intentionally mirrored: [`FtpPool::read`] issues
//! `STOR` and [`FtpPool::write`] issues `RETR`, matching servers that
//! name transfers from their own point of view.

pub mod connection;
pub mod error;
pub mod file_ops;
pub mod parser;
pub mod pool;
pub mod protocol;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod testutil;

// Re-exports for lib.rs consumers
pub use error::{FtpError, FtpErrorKind, FtpResult};
pub use pool::{FtpPool, PooledConn};
pub use transport::{TcpTransport, Transport};
pub use types::*;
