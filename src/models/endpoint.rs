use serde::{Deserialize, Serialize};
use std::fmt;

/// Default instrument address on the bench network
pub const DEFAULT_HOST: &str = "192.168.0.188";

/// Default raw-socket port of the instrument's LAN interface
pub const DEFAULT_PORT: u16 = 3490;

/// Network address of an instrument
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Identification fields reported by `*IDN?`
///
/// The reply is a comma separated list `manufacturer,model,serial,firmware`.
/// Fields the instrument leaves out are empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InstrumentIdentity {
    pub manufacturer: String,
    pub model: String,
    pub serial: String,
    pub firmware: String,
}

impl InstrumentIdentity {
    /// Parse an `*IDN?` reply
    ///
    /// A reply without any comma is taken to be the model name alone and is
    /// kept verbatim, whatever the instrument is; no fixed model name is
    /// substituted. Returns `None` for an empty reply.
    pub fn parse(reply: &str) -> Option<Self> {
        let reply = reply.trim();
        if reply.is_empty() {
            return None;
        }

        if !reply.contains(',') {
            return Some(Self {
                model: reply.to_string(),
                ..Self::default()
            });
        }

        let mut fields = reply.split(',').map(|f| f.trim().to_string());
        Some(Self {
            manufacturer: fields.next().unwrap_or_default(),
            model: fields.next().unwrap_or_default(),
            serial: fields.next().unwrap_or_default(),
            firmware: fields.next().unwrap_or_default(),
        })
    }
}

impl fmt::Display for InstrumentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.manufacturer.is_empty(), self.model.is_empty()) {
            (false, false) => write!(f, "{} {}", self.manufacturer, self.model),
            (true, false) => write!(f, "{}", self.model),
            (false, true) => write!(f, "{}", self.manufacturer),
            (true, true) => write!(f, "unknown instrument"),
        }
    }
}
