//! Push-channel connection manager.
//!
//! Owns the lifecycle of one logical WebSocket connection: connect,
//! subscribe, pump frames, and reconnect with exponential backoff when the
//! transport drops. State changes and parsed frames are surfaced to the app
//! loop over a channel; outbound requests queue the other way and are
//! discarded unless the socket is open.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};

use crate::protocol::{Inbound, Outbound};
use crate::types::ConnState;

/// Events surfaced to the app loop.
#[derive(Debug)]
pub enum PushEvent {
    State(ConnState),
    Frame(Inbound),
}

/// Reconnect delay schedule: geometric growth up to a ceiling, reset to the
/// floor as soon as a connection opens.
#[derive(Debug, Clone)]
pub struct Backoff {
    floor: Duration,
    ceiling: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(floor: Duration, ceiling: Duration) -> Self {
        Self {
            floor,
            ceiling,
            current: floor,
        }
    }

    /// Delay before the next attempt; grows the schedule for the one after.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.ceiling);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.floor;
    }

    pub fn current(&self) -> Duration {
        self.current
    }
}

#[derive(Debug, Clone)]
pub struct PushConfig {
    pub url: String,
    /// Cadence of the list-subscription refresh while open (survives
    /// server-side subscription expiry).
    pub subscribe_refresh: Duration,
    pub backoff_floor: Duration,
    pub backoff_ceiling: Duration,
}

/// Handle owned by the app loop; the connection itself lives in a task.
pub struct PushChannel {
    events: mpsc::UnboundedReceiver<PushEvent>,
    outbound: mpsc::UnboundedSender<Outbound>,
    stop: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl PushChannel {
    pub fn spawn(cfg: PushConfig) -> Self {
        let (event_tx, events) = mpsc::unbounded_channel();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let stop = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(run(cfg, event_tx, outbound_rx, stop.clone()));
        Self {
            events,
            outbound,
            stop,
            task,
        }
    }

    /// Next pending event, if any. The app drains these every tick.
    pub fn try_event(&mut self) -> Option<PushEvent> {
        self.events.try_recv().ok()
    }

    /// Queue an outbound request. The connection task discards queued
    /// requests unless the socket is open, making this a no-op otherwise.
    pub fn send(&self, msg: Outbound) {
        let _ = self.outbound.send(msg);
    }

    /// Tear down: the stop flag is set before the socket dies so no
    /// reconnect can race the shutdown.
    pub fn shutdown(self) {
        self.stop.store(true, Ordering::SeqCst);
        self.task.abort();
    }
}

async fn run(
    cfg: PushConfig,
    events: mpsc::UnboundedSender<PushEvent>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    stop: Arc<AtomicBool>,
) {
    let mut backoff = Backoff::new(cfg.backoff_floor, cfg.backoff_ceiling);

    loop {
        if stop.load(Ordering::SeqCst) {
            return;
        }
        // Anything queued while we were down would arrive out of context.
        while outbound.try_recv().is_ok() {}

        let _ = events.send(PushEvent::State(ConnState::Connecting));
        let ws = match connect_async(cfg.url.as_str()).await {
            Ok((ws, _)) => ws,
            Err(err) => {
                warn!("push connect to {} failed: {err}", cfg.url);
                let _ = events.send(PushEvent::State(ConnState::Error));
                sleep(backoff.next_delay()).await;
                continue;
            }
        };

        backoff.reset();
        let _ = events.send(PushEvent::State(ConnState::Open));

        let (mut sink, mut stream) = ws.split();
        let mut refresh = interval(cfg.subscribe_refresh);

        // The first interval tick fires immediately and doubles as the
        // initial list subscription.
        'conn: loop {
            tokio::select! {
                _ = refresh.tick() => {
                    let sub = Outbound::ListSubscribe { include_disabled: false };
                    if sink.send(Message::Text(sub.encode())).await.is_err() {
                        break 'conn;
                    }
                }
                Some(out) = outbound.recv() => {
                    if sink.send(Message::Text(out.encode())).await.is_err() {
                        break 'conn;
                    }
                }
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => match Inbound::parse(&text) {
                        Some(msg) => { let _ = events.send(PushEvent::Frame(msg)); }
                        None => debug!("discarding unrecognized push frame"),
                    },
                    Some(Ok(Message::Close(_))) | None => break 'conn,
                    Some(Ok(_)) => {} // binary/ping/pong
                    Some(Err(err)) => {
                        warn!("push transport error: {err}");
                        break 'conn;
                    }
                },
            }
        }

        let _ = events.send(PushEvent::State(ConnState::Closed));
        if stop.load(Ordering::SeqCst) {
            // Clean shutdown: never reconnect.
            return;
        }
        sleep(backoff.next_delay()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_monotonically_to_the_ceiling() {
        let mut b = Backoff::new(Duration::from_secs(1), Duration::from_secs(30));
        let mut last = Duration::ZERO;
        for _ in 0..10 {
            let d = b.next_delay();
            assert!(d >= last, "backoff must be non-decreasing");
            assert!(d <= Duration::from_secs(30));
            last = d;
        }
        assert_eq!(last, Duration::from_secs(30));
    }

    #[test]
    fn backoff_resets_to_the_floor() {
        let mut b = Backoff::new(Duration::from_secs(1), Duration::from_secs(30));
        for _ in 0..6 {
            b.next_delay();
        }
        assert!(b.current() > Duration::from_secs(1));
        b.reset();
        assert_eq!(b.current(), Duration::from_secs(1));
        assert_eq!(b.next_delay(), Duration::from_secs(1));
    }
}
