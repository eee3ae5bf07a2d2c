use crate::link::error::ConnectionError;
use crate::link::transport::{Connector, TcpConnector};
use crate::metrics::Metrics;
use crate::models::{Endpoint, InstrumentIdentity};
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep, timeout};

/// Switches the instrument to remote control after connecting
pub const REMOTE_COMMAND: &str = "syst:rem";

/// Returns the instrument to front panel control before disconnecting
pub const LOCAL_COMMAND: &str = "syst:loc";

/// Identification query
pub const IDENTIFY_COMMAND: &str = "*IDN?";

/// Upper bound of a single reply read
pub const READ_BUFFER_SIZE: usize = 1024;

/// Timing of connection attempts and exchanges
///
/// Defaults match a meter on a local network: short connect attempts with a
/// linear one second backoff, and a generous command timeout because some
/// measurement functions take several seconds to settle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkTimings {
    /// Maximum number of connection attempts (at least one is always made)
    pub max_attempts: u32,

    /// Bound on each connection attempt, including the remote-mode write
    pub connect_timeout: Duration,

    /// Pause between failed attempts
    pub retry_delay: Duration,

    /// Pause after `syst:rem` so the instrument can switch modes
    pub settle_delay: Duration,

    /// Bound on each write and read of an exchange
    pub command_timeout: Duration,

    /// Bound on the `syst:loc` write during disconnect
    pub disconnect_timeout: Duration,
}

impl Default for LinkTimings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            connect_timeout: Duration::from_secs(2),
            retry_delay: Duration::from_secs(1),
            settle_delay: Duration::from_millis(500),
            command_timeout: Duration::from_secs(10),
            disconnect_timeout: Duration::from_secs(1),
        }
    }
}

/// Successful outcome of [`InstrumentLink::connect`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connected {
    pub endpoint: Endpoint,

    /// Attempts used; zero when the link was already connected
    pub attempts: u32,
}

/// A serialized command/reply primitive
///
/// `None` means "no reply": either nothing is connected or the exchange
/// failed. Callers decide what a missing reply means for them.
pub trait Exchange: Send + Sync + 'static {
    fn ask(&self, command: &str) -> impl Future<Output = Option<String>> + Send;
}

/// One stream connection to an instrument
///
/// All transport I/O happens while holding `stream`'s lock, so the polling
/// loop and one-off queries (such as `*IDN?`) can share the link without
/// interleaving their bytes. The handle is either absent or fully usable.
///
/// Connection attempts run outside that lock and are serialized by
/// `connecting` instead, so asking a link that is still connecting returns
/// `None` at once rather than waiting out the retries.
pub struct InstrumentLink<C: Connector = TcpConnector> {
    endpoint: Endpoint,
    connector: C,
    timings: LinkTimings,
    stream: Mutex<Option<C::Stream>>,
    connecting: Mutex<()>,
    metrics: Arc<Metrics>,
}

impl InstrumentLink<TcpConnector> {
    /// Create a disconnected link that will use a raw TCP socket
    pub fn tcp(endpoint: Endpoint, timings: LinkTimings) -> Self {
        Self::with_connector(endpoint, TcpConnector, timings)
    }
}

impl<C: Connector> InstrumentLink<C> {
    /// Create a disconnected link with a custom connector
    pub fn with_connector(endpoint: Endpoint, connector: C, timings: LinkTimings) -> Self {
        Self {
            endpoint,
            connector,
            timings,
            stream: Mutex::new(None),
            connecting: Mutex::new(()),
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn timings(&self) -> &LinkTimings {
        &self.timings
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    pub async fn is_connected(&self) -> bool {
        self.stream.lock().await.is_some()
    }

    /// Connect to the instrument and switch it to remote mode
    ///
    /// Makes up to `max_attempts` attempts, sleeping `retry_delay` between
    /// them. Each attempt opens the stream, sends `syst:rem` and waits
    /// `settle_delay`; a failure anywhere in that sequence drops the stream
    /// before the next attempt, so a failed call leaves the link disconnected.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] carrying the last transport error once
    /// every attempt has failed.
    pub async fn connect(&self) -> Result<Connected, ConnectionError> {
        let _connecting = self.connecting.lock().await;
        if self.stream.lock().await.is_some() {
            tracing::debug!("Already connected to {}", self.endpoint);
            return Ok(Connected {
                endpoint: self.endpoint.clone(),
                attempts: 0,
            });
        }

        let max_attempts = self.timings.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            tracing::info!(
                "Connection attempt {}/{} to {}",
                attempt,
                max_attempts,
                self.endpoint
            );
            self.metrics.record_connect_attempt();

            match self.open().await {
                Ok(opened) => {
                    // Only a fully opened stream ever becomes visible
                    *self.stream.lock().await = Some(opened);
                    tracing::info!("Connected to {}, instrument in remote mode", self.endpoint);
                    return Ok(Connected {
                        endpoint: self.endpoint.clone(),
                        attempts: attempt,
                    });
                }
                Err(e) => {
                    tracing::warn!("Attempt {} failed: {}", attempt, e);
                    last_error = Some(e);

                    if attempt < max_attempts {
                        sleep(self.timings.retry_delay).await;
                    }
                }
            }
        }

        let error = ConnectionError {
            endpoint: self.endpoint.clone(),
            attempts: max_attempts,
            source: last_error.unwrap_or_else(|| io::Error::other("no connection attempt made")),
        };
        tracing::error!("{}", error);
        Err(error)
    }

    /// One connection attempt: open, request remote mode, settle
    async fn open(&self) -> io::Result<C::Stream> {
        let limit = self.timings.connect_timeout;

        let mut stream = bounded(limit, self.connector.connect(&self.endpoint)).await?;
        bounded(limit, send_line(&mut stream, REMOTE_COMMAND)).await?;

        sleep(self.timings.settle_delay).await;
        Ok(stream)
    }

    /// Send `command` and return the trimmed reply
    ///
    /// Returns `None` without touching the transport when disconnected, and
    /// `None` (logged) on timeout, I/O error or a closed stream. A failed
    /// exchange does not disconnect the link.
    pub async fn ask(&self, command: &str) -> Option<String> {
        let mut guard = self.stream.lock().await;
        let stream = guard.as_mut()?;

        let started = Instant::now();
        match exchange(stream, command, self.timings.command_timeout).await {
            Ok(reply) => {
                self.metrics.record_exchange(started.elapsed());
                tracing::trace!("'{}' -> '{}'", command, reply);
                Some(reply)
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                self.metrics.record_exchange_timeout();
                tracing::warn!(
                    "Command '{}': TIMEOUT, instrument did not answer in time",
                    command
                );
                None
            }
            Err(e) => {
                self.metrics.record_exchange_failed();
                tracing::warn!("Command '{}' failed: {}", command, e);
                None
            }
        }
    }

    /// Query `*IDN?` and parse the reply
    pub async fn identify(&self) -> Option<InstrumentIdentity> {
        let reply = self.ask(IDENTIFY_COMMAND).await?;
        InstrumentIdentity::parse(&reply)
    }

    /// Return the instrument to local mode and close the stream
    ///
    /// Best effort: errors while sending `syst:loc` or closing are logged and
    /// swallowed, since the instrument may already be gone. Calling this on a
    /// disconnected link does nothing.
    pub async fn disconnect(&self) {
        let mut guard = self.stream.lock().await;
        let Some(mut stream) = guard.take() else {
            tracing::debug!("Disconnect requested but {} is not connected", self.endpoint);
            return;
        };

        tracing::info!("Disconnecting from {}", self.endpoint);

        let limit = self.timings.disconnect_timeout;
        if let Err(e) = bounded(limit, send_line(&mut stream, LOCAL_COMMAND)).await {
            tracing::warn!("Ignoring error while returning to local mode (normal if the instrument is gone): {}", e);
        }

        if let Err(e) = bounded(limit, stream.shutdown()).await {
            tracing::debug!("Ignoring error while closing stream: {}", e);
        }
    }
}

impl<C: Connector> Exchange for InstrumentLink<C> {
    fn ask(&self, command: &str) -> impl Future<Output = Option<String>> + Send {
        InstrumentLink::ask(self, command)
    }
}

/// Run `operation`, turning an elapsed deadline into `ErrorKind::TimedOut`
async fn bounded<T>(limit: Duration, operation: impl Future<Output = io::Result<T>>) -> io::Result<T> {
    match timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("no progress within {:?}", limit),
        )),
    }
}

async fn send_line<S>(stream: &mut S, command: &str) -> io::Result<()>
where
    S: tokio::io::AsyncWrite + Unpin,
{
    let line = format!("{}\n", command);
    stream.write_all(line.as_bytes()).await?;
    stream.flush().await
}

/// One write-then-read pair; each half gets the full `limit`
async fn exchange<S>(stream: &mut S, command: &str, limit: Duration) -> io::Result<String>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    bounded(limit, send_line(stream, command)).await?;

    let mut buf = [0u8; READ_BUFFER_SIZE];
    let n = bounded(limit, stream.read(&mut buf)).await?;
    if n == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "instrument closed the connection",
        ));
    }

    Ok(String::from_utf8_lossy(&buf[..n]).trim().to_string())
}
