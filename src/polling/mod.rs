//! Polling - the cancellable measurement loop.
//!
//! This module repeatedly asks an [`Exchange`](crate::link::Exchange) for the
//! selected measurement and reports every outcome to a [`Notifier`]. It has no
//! knowledge of any UI toolkit: front ends adapt the three [`Notification`]
//! variants to whatever widgets they have.
//!
//! # Components
//!
//! - [`PollingController`]: start/stop/select-query surface and the spawned loop
//! - [`Notifier`] / [`Notification`] / [`ChannelNotifier`]: the outbound event surface
//! - [`format_reading`]: turns a raw reply into the text shown to the user
//!
//! # Loop Semantics
//!
//! While Running, each iteration snapshots the selection, performs one
//! exchange, delivers an `Update` and sleeps the poll interval. A missing
//! reply is fatal to the run: one `ConnectionLost` is delivered and the loop
//! ends. Every run ends with exactly one `Stopped`.

pub mod controller;
pub mod notifier;

pub use controller::{PollError, PollSettings, PollingController};
pub use notifier::{ChannelNotifier, Notification, Notifier};

/// Format a reply for display
///
/// Numeric replies are rendered with six decimal places; anything else (such
/// as an overload marker) is passed through verbatim. The unit is appended
/// after a single space in both cases.
///
/// # Returns
/// The display text and whether the reply parsed as a number
pub fn format_reading(raw: &str, unit: &str) -> (String, bool) {
    match raw.trim().parse::<f64>() {
        Ok(value) => (format!("{:.6} {}", value, unit), true),
        Err(_) => (format!("{} {}", raw, unit), false),
    }
}
