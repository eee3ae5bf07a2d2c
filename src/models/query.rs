use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Measurement functions offered by the front panel presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MeasurementMode {
    /// DC voltage
    #[default]
    Dcv,
    /// AC voltage
    Acv,
    /// DC current
    Dca,
    /// AC current
    Aca,
    /// 2-wire resistance
    Ohm,
    /// Frequency
    Freq,
}

impl MeasurementMode {
    /// Every preset, in front panel order
    pub const ALL: [MeasurementMode; 6] = [
        MeasurementMode::Dcv,
        MeasurementMode::Acv,
        MeasurementMode::Dca,
        MeasurementMode::Aca,
        MeasurementMode::Ohm,
        MeasurementMode::Freq,
    ];

    /// Short mode name shown to the user (e.g. "DCV")
    pub fn name(self) -> &'static str {
        match self {
            MeasurementMode::Dcv => "DCV",
            MeasurementMode::Acv => "ACV",
            MeasurementMode::Dca => "DCA",
            MeasurementMode::Aca => "ACA",
            MeasurementMode::Ohm => "OHM",
            MeasurementMode::Freq => "FREQ",
        }
    }

    /// Query command sent on every polling iteration
    pub fn command(self) -> &'static str {
        match self {
            MeasurementMode::Dcv => "meas:volt:dc?",
            MeasurementMode::Acv => "meas:volt:ac?",
            MeasurementMode::Dca => "meas:curr:dc?",
            MeasurementMode::Aca => "meas:curr:ac?",
            MeasurementMode::Ohm => "meas:res?",
            MeasurementMode::Freq => "meas:freq?",
        }
    }

    /// Unit label appended to every reading
    pub fn unit(self) -> &'static str {
        match self {
            MeasurementMode::Dcv | MeasurementMode::Acv => "V",
            MeasurementMode::Dca | MeasurementMode::Aca => "A",
            MeasurementMode::Ohm => "Ω",
            MeasurementMode::Freq => "Hz",
        }
    }
}

impl fmt::Display for MeasurementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a mode name does not match any preset
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown measurement mode: {0}")]
pub struct ModeParseError(pub String);

impl FromStr for MeasurementMode {
    type Err = ModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        MeasurementMode::ALL
            .into_iter()
            .find(|mode| mode.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ModeParseError(s.to_string()))
    }
}

/// The query the polling loop issues, together with its display labels
///
/// Name, command and unit always travel together so that a reading is never
/// labelled with the unit of a different selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySelection {
    pub name: String,
    pub command: String,
    pub unit: String,
}

impl QuerySelection {
    pub fn new(name: impl Into<String>, command: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            unit: unit.into(),
        }
    }
}

impl From<MeasurementMode> for QuerySelection {
    fn from(mode: MeasurementMode) -> Self {
        Self::new(mode.name(), mode.command(), mode.unit())
    }
}

impl Default for QuerySelection {
    fn default() -> Self {
        MeasurementMode::default().into()
    }
}
