// meterlink - polling client for line-based SCPI multimeters over TCP
//
// This is the library crate containing the instrument link, the polling
// controller and the configuration model.
// The binary crate (main.rs) provides a headless console front end.

pub mod config;
pub mod link;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod polling;
pub mod state;

// Re-export commonly used types for convenience
pub use crate::config::ConfigManager;
pub use link::{ConnectionError, Exchange, InstrumentLink, LinkTimings};
pub use models::{Endpoint, MeasurementMode, MeterConfig, QuerySelection};
pub use polling::{ChannelNotifier, Notification, Notifier, PollError, PollSettings, PollingController};
pub use state::{RunSnapshot, RunState, RunStateManager};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
