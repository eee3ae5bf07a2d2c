use crate::models::Endpoint;
use std::io;
use thiserror::Error;

/// Connecting to the instrument failed on every attempt
///
/// Carries the transport error of the final attempt. Recoverable by calling
/// `connect()` again later.
#[derive(Error, Debug)]
#[error("Could not connect to {endpoint} after {attempts} attempts: {source}")]
pub struct ConnectionError {
    pub endpoint: Endpoint,
    pub attempts: u32,
    #[source]
    pub source: io::Error,
}

impl ConnectionError {
    /// Kind of the last underlying transport error
    pub fn kind(&self) -> io::ErrorKind {
        self.source.kind()
    }
}
