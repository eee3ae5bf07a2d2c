// Notification surface between the polling loop and a front end
//
// The loop calls `Notifier::notify` synchronously and in production order, so
// an implementation must hand the event off without blocking.

use tokio::sync::mpsc;

/// Event delivered by the polling loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A new reading, already formatted with its unit
    Update(String),

    /// An exchange failed; the run is over and the link is likely dead
    ConnectionLost,

    /// The run has ended (always the last event of a run)
    Stopped,
}

/// Receives polling events
#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, notification: Notification);
}

impl<F> Notifier for F
where
    F: Fn(Notification) + Send + Sync + 'static,
{
    fn notify(&self, notification: Notification) {
        self(notification)
    }
}

/// Forwards notifications into an unbounded channel
///
/// Unbounded so that a slow consumer can never make the loop block or drop a
/// `Stopped`; the loop produces at most a few events per second.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiver that drains it
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            tracing::debug!("Notification dropped - receiver has gone away");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_channel_notifier_preserves_order() {
        let (notifier, mut rx) = ChannelNotifier::new();

        notifier.notify(Notification::Update("1.000000 V".to_string()));
        notifier.notify(Notification::ConnectionLost);
        notifier.notify(Notification::Stopped);

        assert_eq!(rx.try_recv().unwrap(), Notification::Update("1.000000 V".to_string()));
        assert_eq!(rx.try_recv().unwrap(), Notification::ConnectionLost);
        assert_eq!(rx.try_recv().unwrap(), Notification::Stopped);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_notifier_without_receiver() {
        let (notifier, rx) = ChannelNotifier::new();
        drop(rx);

        // Must not panic
        notifier.notify(Notification::Stopped);
    }

    #[test]
    fn test_closure_notifier() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let notifier = move |n: Notification| sink.lock().unwrap().push(n);

        notifier.notify(Notification::Stopped);

        assert_eq!(*seen.lock().unwrap(), vec![Notification::Stopped]);
    }
}
