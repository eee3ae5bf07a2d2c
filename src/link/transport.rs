use crate::models::Endpoint;
use std::future::Future;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// Opens byte streams to an instrument
///
/// The link applies its own timeouts around `connect`, so implementations
/// only need to produce a usable stream or an I/O error.
pub trait Connector: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    fn connect(&self, endpoint: &Endpoint) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

/// Raw TCP socket connector
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, endpoint: &Endpoint) -> io::Result<TcpStream> {
        let stream = TcpStream::connect((endpoint.host.as_str(), endpoint.port)).await?;

        // Commands are tiny and latency bound
        stream.set_nodelay(true)?;

        tracing::debug!("TCP stream open to {}", endpoint);
        Ok(stream)
    }
}
