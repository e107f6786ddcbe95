//! The transport capability consumed by the core.
//!
//! The core never opens sockets itself; everything network-facing goes
//! through a [`Transport`]. Callers that need timeouts or address
//! rewriting wrap this trait — the core has no cancellation layer.

use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// Factory for byte-stream connections.
///
/// `addr` is in `host:port` form, both for the control endpoint from
/// [`PoolConfig`](crate::types::PoolConfig) and for the `h1.h2.h3.h4:port`
/// endpoint announced in a PASV reply.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    async fn connect(&self, addr: &str) -> io::Result<Self::Stream>;
}

/// Plain-TCP transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpTransport;

#[async_trait]
impl Transport for TcpTransport {
    type Stream = TcpStream;

    async fn connect(&self, addr: &str) -> io::Result<TcpStream> {
        let tcp = TcpStream::connect(addr).await?;
        tcp.set_nodelay(true).ok();
        Ok(tcp)
    }
}
