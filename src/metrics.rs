// Session metrics module
//
// Lightweight counters for the link and the polling loop

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Per-session counters
///
/// Uses atomic operations for thread-safe metric tracking without locks.
/// The link records connection attempts and exchange outcomes; the polling
/// controller records what it delivered to the notifier. Logged on shutdown.
#[derive(Debug)]
pub struct Metrics {
    /// Connection attempts made by `connect()` (successful or not)
    pub connect_attempts: AtomicUsize,

    /// Exchanges that returned a reply
    pub exchanges_ok: AtomicU64,

    /// Exchanges that failed with an I/O error or a closed stream
    pub exchanges_failed: AtomicU64,

    /// Exchanges abandoned because the instrument did not answer in time
    pub exchange_timeouts: AtomicU64,

    /// Total time spent in successful exchanges, in milliseconds
    pub total_exchange_time_ms: AtomicU64,

    /// Readings that parsed as numbers
    pub readings_numeric: AtomicU64,

    /// Readings forwarded verbatim because they did not parse
    pub readings_raw: AtomicU64,

    /// Polling runs ended by a failed exchange
    pub connection_losses: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            connect_attempts: AtomicUsize::new(0),
            exchanges_ok: AtomicU64::new(0),
            exchanges_failed: AtomicU64::new(0),
            exchange_timeouts: AtomicU64::new(0),
            total_exchange_time_ms: AtomicU64::new(0),
            readings_numeric: AtomicU64::new(0),
            readings_raw: AtomicU64::new(0),
            connection_losses: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_connect_attempt(&self) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed exchange and how long it took
    pub fn record_exchange(&self, duration: Duration) {
        self.exchanges_ok.fetch_add(1, Ordering::Relaxed);
        self.total_exchange_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_exchange_failed(&self) {
        self.exchanges_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_exchange_timeout(&self) {
        self.exchange_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reading(&self, numeric: bool) {
        if numeric {
            self.readings_numeric.fetch_add(1, Ordering::Relaxed);
        } else {
            self.readings_raw.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_connection_lost(&self) {
        self.connection_losses.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average round trip of successful exchanges in milliseconds
    pub fn avg_exchange_time_ms(&self) -> f64 {
        let total = self.total_exchange_time_ms.load(Ordering::Relaxed);
        let count = self.exchanges_ok.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    /// Connection and exchange counters, as recorded by the link
    pub fn link_summary(&self) -> String {
        format!(
            "Connect attempts: {}; exchanges: {} ok, {} failed, {} timed out (avg: {:.2}ms)",
            self.connect_attempts.load(Ordering::Relaxed),
            self.exchanges_ok.load(Ordering::Relaxed),
            self.exchanges_failed.load(Ordering::Relaxed),
            self.exchange_timeouts.load(Ordering::Relaxed),
            self.avg_exchange_time_ms()
        )
    }

    /// Reading counters, as recorded by the polling controller
    pub fn polling_summary(&self) -> String {
        format!(
            "Readings: {} numeric, {} raw; connection losses: {}",
            self.readings_numeric.load(Ordering::Relaxed),
            self.readings_raw.load(Ordering::Relaxed),
            self.connection_losses.load(Ordering::Relaxed)
        )
    }

    /// Log the link's counters
    pub fn log_link_summary(&self) {
        tracing::info!("=== Link metrics (uptime {:.2}s) ===", self.uptime().as_secs_f64());
        tracing::info!("{}", self.link_summary());
    }

    /// Log the polling controller's counters
    pub fn log_polling_summary(&self) {
        tracing::info!("=== Polling metrics (uptime {:.2}s) ===", self.uptime().as_secs_f64());
        tracing::info!("{}", self.polling_summary());
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
