use crate::link::LinkTimings;
use crate::models::{Endpoint, MeasurementMode, ModeParseError, QuerySelection, DEFAULT_HOST, DEFAULT_PORT};
use crate::polling::PollSettings;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete configuration from `meterlink.yaml`
///
/// Every section falls back to its defaults, so an empty or partial file is valid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeterConfig {
    pub instrument: InstrumentSettings,
    pub link: LinkSettings,
    pub polling: PollingSettings,
    pub logging: LoggingSettings,
}

/// Where the instrument lives on the network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentSettings {
    pub host: String,
    pub port: u16,
}

impl Default for InstrumentSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl InstrumentSettings {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port)
    }
}

/// Connection and exchange timing, in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkSettings {
    pub max_attempts: u32,
    pub connect_timeout_ms: u64,
    pub retry_delay_ms: u64,
    pub settle_delay_ms: u64,
    pub command_timeout_ms: u64,
    pub disconnect_timeout_ms: u64,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self::from(LinkTimings::default())
    }
}

impl From<LinkTimings> for LinkSettings {
    fn from(timings: LinkTimings) -> Self {
        Self {
            max_attempts: timings.max_attempts,
            connect_timeout_ms: timings.connect_timeout.as_millis() as u64,
            retry_delay_ms: timings.retry_delay.as_millis() as u64,
            settle_delay_ms: timings.settle_delay.as_millis() as u64,
            command_timeout_ms: timings.command_timeout.as_millis() as u64,
            disconnect_timeout_ms: timings.disconnect_timeout.as_millis() as u64,
        }
    }
}

impl LinkSettings {
    pub fn timings(&self) -> LinkTimings {
        LinkTimings {
            max_attempts: self.max_attempts,
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            command_timeout: Duration::from_millis(self.command_timeout_ms),
            disconnect_timeout: Duration::from_millis(self.disconnect_timeout_ms),
        }
    }
}

/// Which measurement to poll and how often
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    /// Preset name: DCV, ACV, DCA, ACA, OHM or FREQ
    pub mode: String,
    pub interval_ms: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            mode: MeasurementMode::default().name().to_string(),
            interval_ms: PollSettings::default().interval.as_millis() as u64,
        }
    }
}

impl PollingSettings {
    pub fn selection(&self) -> Result<QuerySelection, ModeParseError> {
        let mode: MeasurementMode = self.mode.parse()?;
        Ok(mode.into())
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(self.interval_ms),
        }
    }
}

/// Log file location and verbosity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub dir: String,
    pub prefix: String,
    pub debug: bool,
    pub console: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            dir: "logs".to_string(),
            prefix: "meterlink".to_string(),
            debug: false,
            console: true,
        }
    }
}
