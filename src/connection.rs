//! One pooled FTP connection: a control channel plus an optional data
//! channel and the metadata describing what the data channel serves.
//!
//! Invariants: a data channel is only present while a control channel
//! is present, and always carries the command it was opened with.
//! Every transport or framing failure on the control channel tears the
//! whole connection down so it returns to the pool in a well-defined
//! idle state.

use crate::error::{FtpError, FtpResult};
use crate::protocol::ControlChannel;
use crate::types::FtpReply;
use tokio::io::{AsyncRead, AsyncWrite};

/// The data channel and what it is currently serving.
pub struct DataChannel<S> {
    pub stream: S,
    /// The command that opened this channel, e.g. `STOR ./notes.txt`.
    pub command: String,
    /// Byte offset the command was opened at, advanced as bytes flow.
    pub offset: u64,
}

/// One slot's connection state. Both channels start absent and are
/// established lazily.
pub struct Connection<S> {
    pub(crate) control: Option<ControlChannel<S>>,
    pub(crate) data: Option<DataChannel<S>>,
}

impl<S> Default for Connection<S> {
    fn default() -> Self {
        Self {
            control: None,
            data: None,
        }
    }
}

// Pure state accessors, no I/O bounds needed — the pool's selection
// scan calls these on a bare `Connection<S>`.
impl<S> Connection<S> {
    pub fn has_control(&self) -> bool {
        self.control.is_some()
    }

    pub fn data(&self) -> Option<&DataChannel<S>> {
        self.data.as_ref()
    }

    pub fn data_mut(&mut self) -> Option<&mut DataChannel<S>> {
        self.data.as_mut()
    }

    /// Tear down both channels. Dropping the streams closes them.
    pub fn close(&mut self) {
        self.control = None;
        self.data = None;
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Connection<S> {
    /// Send one command over the control channel; any failure tears
    /// down both channels.
    pub async fn send(&mut self, cmd: &str) -> FtpResult<()> {
        let Some(ctrl) = self.control.as_mut() else {
            return Err(FtpError::connection("control channel not open"));
        };
        if let Err(e) = ctrl.send_command(cmd).await {
            self.close();
            return Err(e);
        }
        Ok(())
    }

    /// Read one reply from the control channel; any transport or
    /// framing failure tears down both channels.
    pub async fn recv(&mut self) -> FtpResult<FtpReply> {
        let Some(ctrl) = self.control.as_mut() else {
            return Err(FtpError::connection("control channel not open"));
        };
        match ctrl.read_reply().await {
            Ok(reply) => Ok(reply),
            Err(e) => {
                self.close();
                Err(e)
            }
        }
    }

    /// Send a command and require an exact reply code. An unexpected
    /// code is an error but leaves the connection intact; the server
    /// has spoken coherently, it just said no.
    pub async fn expect(&mut self, cmd: &str, verb: &str, want: u16) -> FtpResult<FtpReply> {
        self.send(cmd).await?;
        let reply = self.recv().await?;
        if reply.code != want {
            return Err(FtpError::unexpected_reply(verb, want, reply.code));
        }
        Ok(reply)
    }

    /// Discard the current data transfer via the ABOR sequence.
    ///
    /// The server must answer with 426 or 226 and then 225 or 226, in
    /// that order; any deviation is unrecoverable for this connection
    /// and both channels are torn down. On the clean path only the data
    /// channel is closed and the control channel stays reusable.
    pub async fn abort_data(&mut self) {
        if self.data.is_none() {
            return;
        }
        if self.send("ABOR").await.is_err() {
            return; // send already tore everything down
        }
        let first = match self.recv().await {
            Ok(r) => r.code,
            Err(_) => return,
        };
        if first != 426 && first != 226 {
            self.close();
            return;
        }
        let second = match self.recv().await {
            Ok(r) => r.code,
            Err(_) => return,
        };
        if second != 225 && second != 226 {
            self.close();
            return;
        }
        self.data = None;
    }
}
