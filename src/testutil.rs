//! Test-only in-memory FTP server and transport.
//!
//! `FakeServer` speaks just enough of the control protocol to exercise
//! the pool, the codec and the file operations end-to-end over
//! `tokio::io::duplex` pairs. PASV hands out fake `10.0.0.1:<port>`
//! endpoints; `FakeTransport` routes connects to those endpoints back
//! to the stream the server prepared.

use crate::transport::Transport;
use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{duplex, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, DuplexStream};

pub struct FakeServer {
    /// Greeting sent on every control connect.
    pub greeting: String,
    /// Reply to USER. `331 …` makes the client send PASS; `230 …` logs
    /// it straight in.
    pub user_reply: String,
    /// Lines served (CRLF-terminated) on any LIST.
    pub listing: Vec<String>,
    /// Body served on STOR — the read path of the reversed verbs.
    pub file_body: Vec<u8>,
    /// Replies to ABOR, in order.
    pub abort_replies: Vec<String>,
    /// Send one extra `226` after the abort sequence when the aborted
    /// command was a STOR (the create-file completion reply).
    pub stor_abort_completion: bool,
    /// Answer PASV with text that carries no endpoint.
    pub garble_pasv: bool,

    pub control_connects: AtomicUsize,
    pub(crate) commands: Mutex<Vec<String>>,
    pub(crate) uploaded: Mutex<Vec<u8>>,
    pub(crate) pending: Mutex<Pending>,
}

pub(crate) struct Pending {
    next_port: u16,
    data: HashMap<u16, DuplexStream>,
}

impl Default for FakeServer {
    fn default() -> Self {
        Self {
            greeting: "220 fake ftpd ready".into(),
            user_reply: "331 Please specify the password".into(),
            listing: Vec::new(),
            file_body: Vec::new(),
            abort_replies: vec![
                "426 Transfer aborted".into(),
                "226 ABOR command successful".into(),
            ],
            stor_abort_completion: false,
            garble_pasv: false,
            control_connects: AtomicUsize::new(0),
            commands: Mutex::new(Vec::new()),
            uploaded: Mutex::new(Vec::new()),
            pending: Mutex::new(Pending {
                next_port: 4000,
                data: HashMap::new(),
            }),
        }
    }
}

impl FakeServer {
    pub fn transport(self: &Arc<Self>) -> FakeTransport {
        FakeTransport {
            server: Arc::clone(self),
        }
    }

    /// Every command line received, across all control sessions.
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn count_verb(&self, verb: &str) -> usize {
        self.commands()
            .iter()
            .filter(|c| c.split(' ').next() == Some(verb))
            .count()
    }

    pub fn uploaded(&self) -> Vec<u8> {
        self.uploaded.lock().unwrap().clone()
    }

    fn register_data(&self, stream: DuplexStream) -> u16 {
        let mut pending = self.pending.lock().unwrap();
        let port = pending.next_port;
        pending.next_port += 1;
        pending.data.insert(port, stream);
        port
    }

    fn take_data(&self, port: u16) -> Option<DuplexStream> {
        self.pending.lock().unwrap().data.remove(&port)
    }
}

pub struct FakeTransport {
    server: Arc<FakeServer>,
}

#[async_trait]
impl Transport for FakeTransport {
    type Stream = DuplexStream;

    async fn connect(&self, addr: &str) -> io::Result<DuplexStream> {
        if let Some(port) = addr.strip_prefix("10.0.0.1:") {
            let port: u16 = port
                .parse()
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "bad port"))?;
            return self.server.take_data(port).ok_or_else(|| {
                io::Error::new(io::ErrorKind::ConnectionRefused, "no pending data channel")
            });
        }
        self.server.control_connects.fetch_add(1, Ordering::SeqCst);
        let (client, server_side) = duplex(1 << 16);
        let srv = Arc::clone(&self.server);
        tokio::spawn(control_session(srv, server_side));
        Ok(client)
    }
}

async fn say(w: &mut (impl AsyncWriteExt + Unpin), line: &str) {
    let _ = w.write_all(format!("{}\r\n", line).as_bytes()).await;
}

async fn control_session(srv: Arc<FakeServer>, stream: DuplexStream) {
    let (rd, mut w) = tokio::io::split(stream);
    let mut r = BufReader::new(rd);
    say(&mut w, &srv.greeting).await;

    // server side of the endpoint handed out by the last PASV
    let mut pasv_data: Option<DuplexStream> = None;
    let mut rest_offset: usize = 0;
    let mut active_stor = false;

    loop {
        let mut line = String::new();
        match r.read_line(&mut line).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let line = line.trim_end().to_string();
        srv.commands.lock().unwrap().push(line.clone());
        let verb = line.split(' ').next().unwrap_or("");
        let arg = line.split_once(' ').map(|(_, a)| a).unwrap_or("");

        match verb {
            "USER" => say(&mut w, &srv.user_reply).await,
            "PASS" => say(&mut w, "230 Login successful").await,
            "TYPE" => say(&mut w, "200 Switching to Binary mode").await,
            "REST" => {
                rest_offset = arg.parse().unwrap_or(0);
                say(&mut w, "350 Restart position accepted").await;
            }
            "PASV" => {
                if srv.garble_pasv {
                    say(&mut w, "227 Entering Passive Mode.").await;
                    continue;
                }
                let (client_side, server_side) = duplex(1 << 16);
                let port = srv.register_data(client_side);
                pasv_data = Some(server_side);
                say(
                    &mut w,
                    &format!(
                        "227 Entering Passive Mode (10,0,0,1,{},{}).",
                        port / 256,
                        port % 256
                    ),
                )
                .await;
            }
            "LIST" => {
                say(&mut w, "150 Here comes the directory listing").await;
                if let Some(mut d) = pasv_data.take() {
                    for l in &srv.listing {
                        let _ = d.write_all(format!("{}\r\n", l).as_bytes()).await;
                    }
                    // dropping d closes the data stream
                }
                say(&mut w, "226 Directory send OK").await;
            }
            "STOR" => {
                // Reversed verbs: the client reads file bytes on STOR.
                say(&mut w, "150 Opening data connection").await;
                if let Some(mut d) = pasv_data.take() {
                    let body = &srv.file_body;
                    let off = rest_offset.min(body.len());
                    let _ = d.write_all(&body[off..]).await;
                }
                rest_offset = 0;
                active_stor = true;
            }
            "RETR" => {
                // Reversed verbs: the client sends file bytes on RETR.
                say(&mut w, "150 Opening data connection").await;
                if let Some(d) = pasv_data.take() {
                    let srv2 = Arc::clone(&srv);
                    tokio::spawn(async move {
                        let mut d = d;
                        let mut buf = [0u8; 4096];
                        loop {
                            match d.read(&mut buf).await {
                                Ok(0) | Err(_) => break,
                                Ok(n) => {
                                    srv2.uploaded.lock().unwrap().extend_from_slice(&buf[..n]);
                                }
                            }
                        }
                    });
                }
                rest_offset = 0;
            }
            "ABOR" => {
                for reply in &srv.abort_replies {
                    say(&mut w, reply).await;
                }
                if active_stor && srv.stor_abort_completion {
                    say(&mut w, "226 Transfer complete").await;
                }
                active_stor = false;
                pasv_data = None;
            }
            "RNFR" => say(&mut w, "350 Ready for RNTO").await,
            "RNTO" => say(&mut w, "250 Rename successful").await,
            "DELE" => say(&mut w, "250 Delete operation successful").await,
            "MKD" => say(&mut w, &format!("257 \"{}\" created", arg)).await,
            "RMD" => say(&mut w, "250 Remove directory operation successful").await,
            _ => say(&mut w, "502 Command not implemented").await,
        }
    }
}
