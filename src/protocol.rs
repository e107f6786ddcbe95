//! Low-level FTP command/reply codec (RFC 959 §4).
//!
//! Handles:
//! - Sending FTP commands terminated with `\r\n`
//! - Reading single-line and multi-line replies
//! - Parsing the 3-digit reply code
//! - Parsing the `(h1,h2,h3,h4,p1,p2)` endpoint out of a PASV reply

use crate::error::{FtpError, FtpResult};
use crate::types::FtpReply;
use lazy_static::lazy_static;
use regex::Regex;
use std::net::Ipv4Addr;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf,
};

/// The command/reply codec over one control channel.
pub struct ControlChannel<S> {
    reader: BufReader<ReadHalf<S>>,
    writer: WriteHalf<S>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> ControlChannel<S> {
    pub fn new(stream: S) -> Self {
        let (rd, wr) = tokio::io::split(stream);
        Self {
            reader: BufReader::new(rd),
            writer: wr,
        }
    }

    /// Send a raw FTP command (without trailing CRLF — we add it).
    ///
    /// `write_all` flushes the framed command fully; a partial-write
    /// failure surfaces as a transport error and the caller tears the
    /// connection down.
    pub async fn send_command(&mut self, cmd: &str) -> FtpResult<()> {
        let line = format!("{}\r\n", cmd);
        self.writer.write_all(line.as_bytes()).await?;
        log::trace!(">>> {}", cmd);
        Ok(())
    }

    /// Read one line from the control channel, without the terminator.
    async fn read_line_raw(&mut self) -> FtpResult<String> {
        let mut buf = String::new();
        let n = self.reader.read_line(&mut buf).await?;
        if n == 0 {
            return Err(FtpError::transport("server closed control connection"));
        }
        Ok(buf.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Read a complete FTP reply (possibly multi-line).
    ///
    /// Multi-line replies look like:
    /// ```text
    /// 220-Welcome
    /// 220-Second line
    /// 220 Ready
    /// ```
    /// Continuation lines are discarded; the returned reply carries the
    /// closing code and the *opening* line's text.
    pub async fn read_reply(&mut self) -> FtpResult<FtpReply> {
        let first = self.read_line_raw().await?;
        let (code, sep) = split_reply_line(&first)?;

        if sep == b'-' {
            let digits = &first.as_bytes()[..3];
            loop {
                let next = self.read_line_raw().await?;
                let b = next.as_bytes();
                if b.len() >= 4 && &b[..3] == digits && b[3] == b' ' {
                    break;
                }
            }
        }

        log::trace!("<<< {}", first);
        Ok(FtpReply { code, line: first })
    }
}

/// Validate a reply line and return its code and separator.
///
/// A well-formed line carries a 3-digit code (first digit non-zero)
/// followed by `' '` (final line) or `'-'` (opening of a multi-line
/// reply) at position 4.
fn split_reply_line(line: &str) -> FtpResult<(u16, u8)> {
    let b = line.as_bytes();
    if b.len() < 4
        || !b[0].is_ascii_digit()
        || !b[1].is_ascii_digit()
        || !b[2].is_ascii_digit()
        || b[0] == b'0'
        || (b[3] != b' ' && b[3] != b'-')
    {
        return Err(FtpError::protocol(format!("malformed reply line: '{}'", line)));
    }
    let code = (b[0] - b'0') as u16 * 100 + (b[1] - b'0') as u16 * 10 + (b[2] - b'0') as u16;
    Ok((code, b[3]))
}

// ─── PASV reply ──────────────────────────────────────────────────────

lazy_static! {
    // Each number must be bordered by non-digits (or the ends of the
    // text) so an over-long value like `1000` fails outright instead
    // of being re-segmented into a shorter match.
    static ref PASV_ENDPOINT: Regex = Regex::new(
        r"(?:^|\D)(\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3})(?:\D|$)"
    )
    .unwrap();
}

/// Parse the data endpoint out of a 227 reply.
///
/// Scans the text for the first run of six comma-separated byte values
/// `(h1,h2,h3,h4,p1,p2)`; each must fit in `[0,255]`. The endpoint is
/// `h1.h2.h3.h4` : `p1*256+p2`.
pub fn parse_pasv_reply(text: &str) -> FtpResult<(Ipv4Addr, u16)> {
    let caps = PASV_ENDPOINT
        .captures(text)
        .ok_or_else(|| FtpError::protocol(format!("cannot parse PASV reply: '{}'", text)))?;

    let mut seg = [0u8; 6];
    for (i, slot) in seg.iter_mut().enumerate() {
        *slot = caps[i + 1]
            .parse::<u8>()
            .map_err(|_| FtpError::protocol("PASV endpoint byte out of range"))?;
    }

    let ip = Ipv4Addr::new(seg[0], seg[1], seg[2], seg[3]);
    let port = (seg[4] as u16) * 256 + seg[5] as u16;
    Ok((ip, port))
}
