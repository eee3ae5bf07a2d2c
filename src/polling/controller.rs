// Polling controller - start/stop surface and the measurement loop
//
// The controller owns a RunStateManager (state machine + selection) and at
// most one spawned loop task. Start and stop only flip state; the loop reads
// it once per iteration and also watches it while sleeping so that a stop
// request cuts the inter-poll pause short. An exchange in flight is never
// cancelled: dropping it halfway would leave a reply unread on the transport.

use crate::link::Exchange;
use crate::metrics::Metrics;
use crate::models::QuerySelection;
use crate::polling::format_reading;
use crate::polling::notifier::{Notification, Notifier};
use crate::state::{RunSnapshot, RunState, RunStateManager};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Errors returned by the controller's request methods
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PollError {
    #[error("Polling is {0}; stop it before changing the measurement")]
    Busy(RunState),
}

/// Loop cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Pause after each exchange; the period is exchange time plus this
    pub interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
        }
    }
}

/// Runs a cancellable polling loop against an [`Exchange`]
///
/// Created once per session and reused across many start/stop cycles. All
/// methods are non-blocking except [`stop_and_wait`](Self::stop_and_wait).
///
/// # Example
/// ```ignore
/// let link = Arc::new(InstrumentLink::tcp(endpoint, LinkTimings::default()));
/// link.connect().await?;
///
/// let (notifier, mut events) = ChannelNotifier::new();
/// let controller = PollingController::new(
///     tokio::runtime::Handle::current(),
///     link,
///     Arc::new(notifier),
///     PollSettings::default(),
/// );
/// controller.select_query(MeasurementMode::Ohm.into())?;
/// controller.start();
/// ```
pub struct PollingController<L: Exchange> {
    /// Runtime the loop task is spawned on
    handle: tokio::runtime::Handle,

    link: Arc<L>,
    notifier: Arc<dyn Notifier>,
    settings: PollSettings,
    state: Arc<RunStateManager>,
    metrics: Arc<Metrics>,

    /// Most recently spawned loop task
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<L: Exchange> PollingController<L> {
    pub fn new(
        handle: tokio::runtime::Handle,
        link: Arc<L>,
        notifier: Arc<dyn Notifier>,
        settings: PollSettings,
    ) -> Self {
        Self {
            handle,
            link,
            notifier,
            settings,
            state: Arc::new(RunStateManager::default()),
            metrics: Arc::new(Metrics::new()),
            task: Mutex::new(None),
        }
    }

    pub fn run_state(&self) -> RunState {
        self.state.state()
    }

    pub fn is_running(&self) -> bool {
        self.state.state() == RunState::Running
    }

    pub fn selection(&self) -> QuerySelection {
        self.state.selection()
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    /// Watch run-state transitions
    pub fn subscribe(&self) -> watch::Receiver<RunSnapshot> {
        self.state.subscribe()
    }

    /// Change the measurement polled by the next run
    ///
    /// # Errors
    ///
    /// [`PollError::Busy`] unless Idle, so that no iteration can pair the
    /// command of one selection with the unit of another.
    pub fn select_query(&self, selection: QuerySelection) -> Result<(), PollError> {
        let name = selection.name.clone();
        if self.state.set_selection(selection) {
            tracing::info!("Measurement mode: {}", name);
            Ok(())
        } else {
            let state = self.state.state();
            tracing::warn!("Rejected mode change to {} while {}", name, state);
            Err(PollError::Busy(state))
        }
    }

    /// Start polling
    ///
    /// No-op unless Idle. The loop is spawned on the runtime; if the previous
    /// run's task has not finished yet the new task waits for it first, so
    /// runs never overlap and their notifications never interleave.
    ///
    /// # Returns
    /// `true` if a new run was started
    pub fn start(&self) -> bool {
        let Some(epoch) = self.state.try_start() else {
            tracing::debug!("Start ignored - polling is {}", self.state.state());
            return false;
        };

        tracing::info!("Polling started (run {})", epoch);

        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = task.take();

        let poll_loop = PollLoop {
            epoch,
            link: Arc::clone(&self.link),
            notifier: Arc::clone(&self.notifier),
            state: Arc::clone(&self.state),
            metrics: Arc::clone(&self.metrics),
            interval: self.settings.interval,
        };

        *task = Some(self.handle.spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            poll_loop.run().await;
        }));

        true
    }

    /// Ask the loop to stop after its current exchange
    ///
    /// Does not wait for the loop. While Idle this is a no-op and no
    /// `Stopped` notification follows.
    ///
    /// # Returns
    /// `true` if a running loop was asked to stop
    pub fn stop(&self) -> bool {
        let stopped = self.state.request_stop();
        if stopped {
            tracing::info!("Polling stop requested");
        }
        stopped
    }

    /// Stop and wait until the loop task has delivered `Stopped` and exited
    pub async fn stop_and_wait(&self) {
        self.stop();

        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::error!("Polling task ended abnormally: {}", e);
            }
        }
    }
}

impl<L: Exchange> Drop for PollingController<L> {
    /// A loop never outlives its controller; it ends after its current exchange
    fn drop(&mut self) {
        if self.state.request_stop() {
            tracing::info!("Polling controller dropped while running, stopping");
        }
    }
}

/// Everything one run of the loop needs, moved into its task
struct PollLoop<L: Exchange> {
    epoch: u64,
    link: Arc<L>,
    notifier: Arc<dyn Notifier>,
    state: Arc<RunStateManager>,
    metrics: Arc<Metrics>,
    interval: Duration,
}

impl<L: Exchange> PollLoop<L> {
    async fn run(self) {
        let mut state_rx = self.state.subscribe();

        loop {
            let selection = {
                let snapshot = state_rx.borrow_and_update();
                if !snapshot.is_running(self.epoch) {
                    break;
                }
                snapshot.selection.clone()
            };

            let Some(raw) = self.link.ask(&selection.command).await else {
                self.state.mark_failed(self.epoch);
                self.metrics.record_connection_lost();
                tracing::error!(
                    "No reply to '{}' - connection lost, polling stops",
                    selection.command
                );
                self.notifier.notify(Notification::ConnectionLost);
                break;
            };

            let (text, numeric) = format_reading(&raw, &selection.unit);
            if !numeric {
                tracing::debug!("Non-numeric reply '{}' shown verbatim", raw);
            }
            self.metrics.record_reading(numeric);
            self.notifier.notify(Notification::Update(text));

            let epoch = self.epoch;
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = state_rx.wait_for(|s| !s.is_running(epoch)) => {}
            }
        }

        self.state.finish(self.epoch);
        tracing::info!("Polling stopped (run {})", self.epoch);
        self.notifier.notify(Notification::Stopped);
    }
}
