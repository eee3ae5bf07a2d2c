//! meterlink - headless console front end
//!
//! Connects to the configured multimeter, polls the configured measurement
//! and prints every reading to stdout until Ctrl+C or a lost connection.
//!
//! # Execution Flow
//!
//! 1. Load `meterlink.yaml` (plus `METERLINK_*` overrides) from the config
//!    directory given as the first argument, default `config/`
//! 2. Initialize logging -> logs/meterlink.<date>
//! 3. Create the tokio runtime
//! 4. Connect (`syst:rem`), identify (`*IDN?`)
//! 5. Select the configured mode and start polling
//! 6. Print readings until Stopped
//! 7. Wait for the loop, disconnect (`syst:loc`), log metrics

use anyhow::{Context, Result};
use meterlink::models::InstrumentIdentity;
use meterlink::{
    APP_NAME, ChannelNotifier, ConfigManager, InstrumentLink, MeterConfig, Notification,
    PollingController, VERSION,
};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

const DEFAULT_CONFIG_DIR: &str = "config";

fn main() -> Result<()> {
    let config_dir = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_DIR.to_string());

    let config_manager = ConfigManager::new(&config_dir)?;
    let config = config_manager.load_config()?;

    // Held until exit so buffered log lines are flushed
    let _log_guard = meterlink::logging::setup_logging(&config.logging)?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("meterlink-worker")
        .build()
        .context("Failed to create tokio runtime")?;

    let result = runtime.block_on(run(config));

    tracing::info!("Shutdown complete");
    result
}

async fn run(config: MeterConfig) -> Result<()> {
    let endpoint = config.instrument.endpoint();
    let selection = config.polling.selection()?;

    let link = Arc::new(InstrumentLink::tcp(endpoint, config.link.timings()));

    let connected = link.connect().await?;
    tracing::info!(
        "Link to {} established after {} attempt(s)",
        connected.endpoint,
        connected.attempts
    );

    match link.identify().await {
        Some(identity) => tracing::info!("Connected: {}", connected_label(&identity)),
        None => tracing::info!("Connected"),
    }

    let (notifier, events) = ChannelNotifier::new();
    let controller = PollingController::new(
        tokio::runtime::Handle::current(),
        Arc::clone(&link),
        Arc::new(notifier),
        config.polling.poll_settings(),
    );

    controller.select_query(selection)?;
    controller.start();

    print_readings(&controller, events).await;

    controller.stop_and_wait().await;
    link.disconnect().await;

    link.metrics().log_link_summary();
    controller.metrics().log_polling_summary();
    Ok(())
}

/// Print events until the run reports Stopped; Ctrl+C requests a stop
async fn print_readings(
    controller: &PollingController<InstrumentLink>,
    mut events: UnboundedReceiver<Notification>,
) {
    let mut interrupted = false;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(Notification::Update(text)) => println!("{}", text),
                Some(Notification::ConnectionLost) => {
                    tracing::error!("Connection to the instrument lost - Disconnected");
                }
                Some(Notification::Stopped) | None => break,
            },
            signal = tokio::signal::ctrl_c(), if !interrupted => {
                if let Err(e) = signal {
                    tracing::warn!("Ctrl+C handler failed: {}", e);
                }
                interrupted = true;
                tracing::info!("Interrupted, stopping");
                controller.stop();
            }
        }
    }
}

/// Model name when the instrument reports one, otherwise the full identity
fn connected_label(identity: &InstrumentIdentity) -> String {
    if identity.model.is_empty() {
        identity.to_string()
    } else {
        identity.model.clone()
    }
}
