// Run-state management module
//
// This module provides the RunStateManager which owns the polling controller's
// state machine (Idle / Running / StoppingOnError) together with the active
// query selection, and publishes every change through a tokio watch channel.

use crate::models::QuerySelection;
use std::fmt;
use tokio::sync::watch;

/// Polling loop life cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    /// No loop is polling; the selection may be changed
    #[default]
    Idle,

    /// A loop is polling the instrument
    Running,

    /// An exchange failed; the loop is reporting the loss and winding down
    StoppingOnError,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => f.write_str("idle"),
            RunState::Running => f.write_str("running"),
            RunState::StoppingOnError => f.write_str("stopping on error"),
        }
    }
}

/// Snapshot of the controller state
///
/// `epoch` increases on every successful start, so a loop can tell whether
/// the state it observes still belongs to its own run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunSnapshot {
    pub state: RunState,
    pub epoch: u64,
    pub selection: QuerySelection,
}

impl RunSnapshot {
    /// True while the run identified by `epoch` should keep polling
    pub fn is_running(&self, epoch: u64) -> bool {
        self.state == RunState::Running && self.epoch == epoch
    }
}

/// Thread-safe run state with change notification
///
/// Every transition is a single check-and-set on the watch channel, so two
/// threads racing to start (or one starting while another changes the
/// selection) always observe a consistent state. Subscribers are woken on
/// each effective change; rejected transitions wake nobody.
///
/// # Usage
///
/// - [`try_start()`](Self::try_start) / [`request_stop()`](Self::request_stop) from the controller's callers
/// - [`mark_failed()`](Self::mark_failed) / [`finish()`](Self::finish) from the polling loop
/// - [`subscribe()`](Self::subscribe) for anyone who wants to await transitions
#[derive(Debug)]
pub struct RunStateManager {
    tx: watch::Sender<RunSnapshot>,
}

impl RunStateManager {
    pub fn new(selection: QuerySelection) -> Self {
        let (tx, _) = watch::channel(RunSnapshot {
            selection,
            ..RunSnapshot::default()
        });
        Self { tx }
    }

    /// Get a copy of the current state
    pub fn snapshot(&self) -> RunSnapshot {
        self.tx.borrow().clone()
    }

    pub fn state(&self) -> RunState {
        self.tx.borrow().state
    }

    pub fn selection(&self) -> QuerySelection {
        self.tx.borrow().selection.clone()
    }

    /// Idle -> Running
    ///
    /// # Returns
    /// The epoch of the new run, or `None` if the state was not Idle
    pub fn try_start(&self) -> Option<u64> {
        let mut started = None;
        self.tx.send_if_modified(|snapshot| {
            if snapshot.state != RunState::Idle {
                return false;
            }
            snapshot.state = RunState::Running;
            snapshot.epoch += 1;
            started = Some(snapshot.epoch);
            true
        });
        started
    }

    /// Running -> Idle
    ///
    /// # Returns
    /// `true` if a running loop was asked to stop
    pub fn request_stop(&self) -> bool {
        self.tx.send_if_modified(|snapshot| {
            if snapshot.state != RunState::Running {
                return false;
            }
            snapshot.state = RunState::Idle;
            true
        })
    }

    /// Running -> StoppingOnError, only for the run identified by `epoch`
    pub fn mark_failed(&self, epoch: u64) -> bool {
        self.tx.send_if_modified(|snapshot| {
            if !snapshot.is_running(epoch) {
                return false;
            }
            snapshot.state = RunState::StoppingOnError;
            true
        })
    }

    /// StoppingOnError -> Idle, once the failed run has finished reporting
    pub fn finish(&self, epoch: u64) -> bool {
        self.tx.send_if_modified(|snapshot| {
            if snapshot.epoch != epoch || snapshot.state != RunState::StoppingOnError {
                return false;
            }
            snapshot.state = RunState::Idle;
            true
        })
    }

    /// Replace the selection, allowed only while Idle
    ///
    /// # Returns
    /// `false` (selection untouched) if a run is active
    pub fn set_selection(&self, selection: QuerySelection) -> bool {
        let mut accepted = false;
        self.tx.send_if_modified(|snapshot| {
            if snapshot.state != RunState::Idle {
                return false;
            }
            accepted = true;
            if snapshot.selection == selection {
                return false;
            }
            snapshot.selection = selection;
            true
        });
        accepted
    }

    /// Subscribe to state transitions
    pub fn subscribe(&self) -> watch::Receiver<RunSnapshot> {
        self.tx.subscribe()
    }
}

impl Default for RunStateManager {
    fn default() -> Self {
        Self::new(QuerySelection::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MeasurementMode;
    use std::sync::Arc;

    #[test]
    fn test_new_manager_is_idle() {
        let manager = RunStateManager::default();
        let snapshot = manager.snapshot();

        assert_eq!(snapshot.state, RunState::Idle);
        assert_eq!(snapshot.epoch, 0);
        assert_eq!(snapshot.selection, QuerySelection::default());
    }

    #[test]
    fn test_start_and_stop() {
        let manager = RunStateManager::default();

        assert_eq!(manager.try_start(), Some(1));
        assert_eq!(manager.state(), RunState::Running);
        assert!(manager.snapshot().is_running(1));

        assert!(manager.request_stop());
        assert_eq!(manager.state(), RunState::Idle);
        assert!(!manager.snapshot().is_running(1));
    }

    #[test]
    fn test_start_while_running_is_rejected() {
        let manager = RunStateManager::default();
        manager.try_start();

        assert_eq!(manager.try_start(), None);
        assert_eq!(manager.snapshot().epoch, 1);
    }

    #[test]
    fn test_stop_while_idle_is_noop() {
        let manager = RunStateManager::default();
        let rx = manager.subscribe();

        assert!(!manager.request_stop());
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_failure_path() {
        let manager = RunStateManager::default();
        let epoch = manager.try_start().unwrap();

        assert!(manager.mark_failed(epoch));
        assert_eq!(manager.state(), RunState::StoppingOnError);

        // Cannot start or stop while the failed run is winding down
        assert_eq!(manager.try_start(), None);
        assert!(!manager.request_stop());

        assert!(manager.finish(epoch));
        assert_eq!(manager.state(), RunState::Idle);
    }

    #[test]
    fn test_stale_epoch_cannot_fail_new_run() {
        let manager = RunStateManager::default();
        let first = manager.try_start().unwrap();
        manager.request_stop();
        let second = manager.try_start().unwrap();

        assert!(!manager.mark_failed(first));
        assert!(!manager.finish(first));
        assert_eq!(manager.state(), RunState::Running);
        assert!(manager.snapshot().is_running(second));
    }

    #[test]
    fn test_selection_rejected_while_running() {
        let manager = RunStateManager::default();
        manager.try_start();

        assert!(!manager.set_selection(MeasurementMode::Ohm.into()));
        assert_eq!(manager.selection(), QuerySelection::default());

        manager.request_stop();
        assert!(manager.set_selection(MeasurementMode::Ohm.into()));
        assert_eq!(manager.selection().command, "meas:res?");
    }

    #[test]
    fn test_same_selection_is_accepted_without_notifying() {
        let manager = RunStateManager::default();
        let rx = manager.subscribe();

        assert!(manager.set_selection(QuerySelection::default()));
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_subscribe_to_changes() {
        let manager = RunStateManager::default();
        let mut rx = manager.subscribe();

        manager.try_start();

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().state, RunState::Running);
    }

    #[test]
    fn test_concurrent_starts_yield_one_run() {
        let manager = Arc::new(RunStateManager::default());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = Arc::clone(&manager);
                std::thread::spawn(move || manager.try_start())
            })
            .collect();

        let started = handles
            .into_iter()
            .filter_map(|h| h.join().unwrap())
            .count();

        assert_eq!(started, 1);
        assert_eq!(manager.snapshot().epoch, 1);
    }
}
