//! Shared types for the FTP core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Pool configuration ──────────────────────────────────────────────

/// Endpoint and credentials for one mounted FTP server.
///
/// Immutable for the lifetime of the pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Upper bound on simultaneously claimed connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_port() -> u16 {
    21
}
fn default_max_connections() -> usize {
    4
}

impl PoolConfig {
    /// `host:port` form used for the control-channel connect.
    pub fn control_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            username: "anonymous".into(),
            password: "anonymous@".into(),
            max_connections: default_max_connections(),
        }
    }
}

// ─── FTP reply ───────────────────────────────────────────────────────

/// A parsed control-channel reply.
///
/// For multi-line replies `line` holds the *opening* line; the
/// continuation lines are consumed and discarded by the codec.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FtpReply {
    pub code: u16,
    pub line: String,
}

// ─── Directory listing entries ───────────────────────────────────────

/// POSIX file-type and permission bits used in `FileEntry::mode`.
pub mod mode {
    pub const S_IFREG: u32 = 0o100000;
    pub const S_IFDIR: u32 = 0o040000;
    pub const S_IFLNK: u32 = 0o120000;
    pub const S_IFMT: u32 = 0o170000;

    pub const S_IRUSR: u32 = 0o400;
    pub const S_IWUSR: u32 = 0o200;
    pub const S_IXUSR: u32 = 0o100;
    pub const S_IRGRP: u32 = 0o040;
    pub const S_IWGRP: u32 = 0o020;
    pub const S_IXGRP: u32 = 0o010;
    pub const S_IROTH: u32 = 0o004;
    pub const S_IWOTH: u32 = 0o002;
    pub const S_IXOTH: u32 = 0o001;
}

/// Type of a remote filesystem entry, derived from the mode bits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
}

/// One entry from a `LIST -al` directory listing.
///
/// `name` is the literal remainder of the line after the first eight
/// fields; for symlinks it still contains the ` -> target` suffix.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    /// POSIX type + permission bits (see [`mode`]).
    pub mode: u32,
    pub nlink: u32,
    pub size: u64,
    pub mtime: DateTime<Utc>,
    pub name: String,
}

impl FileEntry {
    pub fn kind(&self) -> EntryKind {
        match self.mode & mode::S_IFMT {
            mode::S_IFDIR => EntryKind::Directory,
            mode::S_IFLNK => EntryKind::Symlink,
            _ => EntryKind::File,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind() == EntryKind::Directory
    }
}

// ─── Pool statistics ─────────────────────────────────────────────────

/// Snapshot of the connection pool, for the driver layer's diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStats {
    /// Idle connections holding an open control channel.
    pub connected: u32,
    /// Idle connections holding an open data channel.
    pub data_open: u32,
    /// Connections currently claimed by a file operation.
    pub claimed: u32,
    pub max_connections: u32,
}
