//! Integration tests for PollingController driving a real InstrumentLink
//!
//! These tests verify:
//! - Readings flow from a fake instrument to the notifier, formatted with units
//! - A dead instrument ends the run with ConnectionLost then Stopped
//! - A stopped controller can be reconfigured and restarted on the same link

use meterlink::{
    ChannelNotifier, Endpoint, InstrumentLink, LinkTimings, MeasurementMode, Notification,
    PollSettings, PollingController, RunState,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

fn fast_timings() -> LinkTimings {
    LinkTimings {
        max_attempts: 1,
        connect_timeout: Duration::from_secs(2),
        retry_delay: Duration::ZERO,
        settle_delay: Duration::ZERO,
        command_timeout: Duration::from_secs(2),
        disconnect_timeout: Duration::from_secs(1),
    }
}

fn fast_polling() -> PollSettings {
    PollSettings {
        interval: Duration::from_millis(10),
    }
}

/// Fake meter that answers `answers` queries, then hangs up
async fn spawn_meter(answers: usize) -> Endpoint {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();
        let mut answered = 0;

        while let Ok(Some(line)) = lines.next_line().await {
            let reply = match line.trim() {
                "meas:volt:dc?" => "1.234567",
                "meas:freq?" => "OVERLOAD",
                _ => continue,
            };
            if answered == answers {
                break;
            }
            answered += 1;
            if writer.write_all(format!("{}\n", reply).as_bytes()).await.is_err() {
                break;
            }
        }
    });

    Endpoint::new("127.0.0.1", port)
}

async fn next_event(rx: &mut UnboundedReceiver<Notification>) -> Notification {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("Timeout waiting for notification")
        .expect("Notification channel closed")
}

async fn connected_controller(
    answers: usize,
) -> (
    Arc<InstrumentLink>,
    PollingController<InstrumentLink>,
    UnboundedReceiver<Notification>,
) {
    let link = Arc::new(InstrumentLink::tcp(spawn_meter(answers).await, fast_timings()));
    link.connect().await.unwrap();

    let (notifier, rx) = ChannelNotifier::new();
    let controller = PollingController::new(
        tokio::runtime::Handle::current(),
        Arc::clone(&link),
        Arc::new(notifier),
        fast_polling(),
    );
    (link, controller, rx)
}

#[tokio::test]
async fn test_readings_are_formatted_with_unit() {
    let (link, controller, mut rx) = connected_controller(usize::MAX).await;

    assert!(controller.start());
    for _ in 0..3 {
        assert_eq!(
            next_event(&mut rx).await,
            Notification::Update("1.234567 V".to_string())
        );
    }

    controller.stop_and_wait().await;

    // Drain any update that raced with the stop, then expect the final event
    let mut last = next_event(&mut rx).await;
    while last != Notification::Stopped {
        assert!(matches!(last, Notification::Update(_)));
        last = next_event(&mut rx).await;
    }
    assert!(rx.try_recv().is_err());

    link.disconnect().await;
}

#[tokio::test]
async fn test_instrument_hangup_ends_run() {
    let (link, controller, mut rx) = connected_controller(2).await;

    controller.start();

    assert_eq!(next_event(&mut rx).await, Notification::Update("1.234567 V".to_string()));
    assert_eq!(next_event(&mut rx).await, Notification::Update("1.234567 V".to_string()));
    assert_eq!(next_event(&mut rx).await, Notification::ConnectionLost);
    assert_eq!(next_event(&mut rx).await, Notification::Stopped);

    controller.stop_and_wait().await;
    assert_eq!(controller.run_state(), RunState::Idle);
    assert!(rx.try_recv().is_err());

    // A failed exchange does not disconnect the link by itself
    assert!(link.is_connected().await);
    link.disconnect().await;
}

#[tokio::test]
async fn test_restart_with_new_selection() {
    let (link, controller, mut rx) = connected_controller(usize::MAX).await;

    controller.start();
    assert_eq!(next_event(&mut rx).await, Notification::Update("1.234567 V".to_string()));
    controller.stop_and_wait().await;
    while next_event(&mut rx).await != Notification::Stopped {}

    controller
        .select_query(MeasurementMode::Freq.into())
        .unwrap();
    assert!(controller.start());

    assert_eq!(next_event(&mut rx).await, Notification::Update("OVERLOAD Hz".to_string()));
    assert_eq!(controller.subscribe().borrow().epoch, 2);

    controller.stop_and_wait().await;
    link.disconnect().await;
}
