//! Data models for the meterlink crate.
//!
//! This module contains the plain data structures shared by the link, the
//! polling controller and the front end:
//! - [`Endpoint`]: The (host, port) pair identifying the instrument's network interface
//! - [`QuerySelection`] / [`MeasurementMode`]: What the polling loop asks for and how it labels the reply
//! - [`InstrumentIdentity`]: Parsed `*IDN?` reply
//! - [`MeterConfig`]: Configuration loaded from `meterlink.yaml` and the environment
//!
//! # Architecture Note
//!
//! The models are designed to be:
//! - **Serializable**: Config structs derive `Serialize`/`Deserialize` for YAML persistence
//! - **Cloneable**: Selections are snapshotted by value once per polling iteration
//! - **Immutable**: An [`Endpoint`] never changes after the link is built

pub mod config;
pub mod endpoint;
pub mod query;

pub use self::config::{InstrumentSettings, LinkSettings, LoggingSettings, MeterConfig, PollingSettings};
pub use endpoint::{Endpoint, InstrumentIdentity, DEFAULT_HOST, DEFAULT_PORT};
pub use query::{MeasurementMode, ModeParseError, QuerySelection};
