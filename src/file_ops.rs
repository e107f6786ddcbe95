//! File operations — each acquires a pooled connection, drives the
//! command exchange, and releases the connection on every exit path
//! (the pool guard restores the slot on drop).
//!
//! Command verbs follow the deployed counterpart exactly, including the
//! reversed data verbs: *reading* a file issues `STOR ./<path>` and
//! receives bytes, *writing* issues `RETR ./<path>` and sends bytes.
//! Swapping them would break interoperability with the server this
//! core was built against.

use crate::connection::Connection;
use crate::error::{FtpError, FtpResult};
use crate::parser::parse_listing_line;
use crate::pool::FtpPool;
use crate::transport::Transport;
use crate::types::FileEntry;
use chrono::{Datelike, Utc};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

impl<T: Transport> FtpPool<T> {
    /// Read at most `buf.len()` bytes of `path` starting at `offset`.
    ///
    /// Returns the number of bytes actually received in this call; a
    /// short read is the caller's cue to call again at the advanced
    /// offset, which reuses the already-positioned data channel.
    pub async fn read(&self, path: &str, offset: u64, buf: &mut [u8]) -> FtpResult<usize> {
        let command = format!("STOR ./{}", path);
        let mut conn = self.acquire_data(&command, offset).await?;
        let result = {
            let Some(data) = conn.data_mut() else {
                return Err(FtpError::connection("data channel not open"));
            };
            data.stream.read(buf).await
        };
        match result {
            Ok(n) => {
                if let Some(data) = conn.data_mut() {
                    data.offset += n as u64;
                }
                Ok(n)
            }
            Err(e) => {
                conn.abort_data().await;
                Err(e.into())
            }
        }
    }

    /// Write bytes of `path` starting at `offset`.
    ///
    /// Returns the number of bytes actually sent in this call; partial
    /// writes are legal, retry at the advanced offset.
    pub async fn write(&self, path: &str, offset: u64, buf: &[u8]) -> FtpResult<usize> {
        let command = format!("RETR ./{}", path);
        let mut conn = self.acquire_data(&command, offset).await?;
        let result = {
            let Some(data) = conn.data_mut() else {
                return Err(FtpError::connection("data channel not open"));
            };
            data.stream.write(buf).await
        };
        match result {
            Ok(n) => {
                if let Some(data) = conn.data_mut() {
                    data.offset += n as u64;
                }
                Ok(n)
            }
            Err(e) => {
                conn.abort_data().await;
                Err(e.into())
            }
        }
    }

    /// List `path` via `LIST -al`, parsing every line strictly.
    ///
    /// A single malformed line discards the whole listing. The data
    /// channel must close cleanly and the server must confirm with 226.
    pub async fn list(&self, path: &str) -> FtpResult<Vec<FileEntry>> {
        let command = format!("LIST -al ./{}", path);
        let mut conn = self.acquire_data(&command, 0).await?;
        let result = read_listing(&mut conn).await;
        conn.abort_data().await;
        result
    }

    /// Rename (or move) a file or directory.
    pub async fn rename(&self, from: &str, to: &str) -> FtpResult<()> {
        let mut conn = self.acquire().await?;
        conn.expect(&format!("RNFR ./{}", from), "RNFR", 350).await?;
        conn.expect(&format!("RNTO ./{}", to), "RNTO", 250).await?;
        Ok(())
    }

    /// Create an empty file: open a `STOR` data channel and abort it
    /// immediately, then require the 226 completion.
    pub async fn create_file(&self, path: &str) -> FtpResult<()> {
        let command = format!("STOR ./{}", path);
        let mut conn = self.acquire_data(&command, 0).await?;
        conn.abort_data().await;
        let reply = conn.recv().await?;
        if reply.code != 226 {
            return Err(FtpError::unexpected_reply("STOR (create)", 226, reply.code));
        }
        Ok(())
    }

    pub async fn remove_file(&self, path: &str) -> FtpResult<()> {
        let mut conn = self.acquire().await?;
        conn.expect(&format!("DELE ./{}", path), "DELE", 250).await?;
        Ok(())
    }

    pub async fn make_dir(&self, path: &str) -> FtpResult<()> {
        let mut conn = self.acquire().await?;
        conn.expect(&format!("MKD ./{}", path), "MKD", 257).await?;
        Ok(())
    }

    pub async fn remove_dir(&self, path: &str) -> FtpResult<()> {
        let mut conn = self.acquire().await?;
        conn.expect(&format!("RMD ./{}", path), "RMD", 250).await?;
        Ok(())
    }
}

/// Drain the data channel line by line into entries, then require the
/// terminating 226. Any failure discards the partial result.
async fn read_listing<S>(conn: &mut Connection<S>) -> FtpResult<Vec<FileEntry>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let current_year = Utc::now().year();
    let mut entries = Vec::with_capacity(16);
    {
        let Some(data) = conn.data_mut() else {
            return Err(FtpError::connection("data channel not open"));
        };
        let mut reader = BufReader::new(&mut data.stream);
        let mut line = String::new();
        loop {
            line.clear();
            let n = reader.read_line(&mut line).await?;
            if n == 0 {
                break; // clean close of the data channel
            }
            entries.push(parse_listing_line(&line, current_year)?);
        }
    }
    let reply = conn.recv().await?;
    if reply.code != 226 {
        return Err(FtpError::unexpected_reply("LIST", 226, reply.code));
    }
    Ok(entries)
}
