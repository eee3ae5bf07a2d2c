//! Instrument link - the transport half of the client.
//!
//! This module owns the single stream connection to an instrument and exposes
//! a serialized request/response primitive on top of it.
//!
//! # Components
//!
//! - [`InstrumentLink`]: Connection lifetime (connect with bounded retries,
//!   disconnect back to local mode) and the locked `ask` exchange
//! - [`Connector`] / [`TcpConnector`]: How a stream to an [`Endpoint`](crate::models::Endpoint)
//!   is opened; tests substitute scripted connectors
//! - [`Exchange`]: The `ask` seam the polling controller depends on
//! - [`ConnectionError`]: The only error the link ever returns
//!
//! # Wire Protocol
//!
//! Plain ASCII commands terminated by `\n`. Every reply is a single read of
//! at most [`READ_BUFFER_SIZE`] bytes, decoded as text and trimmed. There are
//! no request identifiers, so correctness depends on strictly alternating
//! write/read pairs, which the link's mutex enforces.

pub mod error;
pub mod instrument;
pub mod transport;

pub use error::ConnectionError;
pub use instrument::{
    Connected, Exchange, InstrumentLink, LinkTimings, IDENTIFY_COMMAND, LOCAL_COMMAND,
    READ_BUFFER_SIZE, REMOTE_COMMAND,
};
pub use transport::{Connector, TcpConnector};
