//! Reload notification broker.
//!
//! A single dispatcher task owns the client registry. Registration, removal and
//! fan-out all travel through one ordered command queue, so a payload reaches
//! exactly the clients that registered before it was published.
//!
//! Each client has a bounded outbound buffer. Fan-out never waits: when a
//! client's buffer is full the new payload is dropped for that client only.

use axum::http::{header, HeaderName, HeaderValue};
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use tokio_stream::Stream;

use crate::config::DevConfig;

/// Stream tuning for reload clients.
#[derive(Debug, Clone, Copy)]
pub struct BrokerSettings {
    /// Outbound buffer per client
    pub client_buffer: usize,
    /// Interval between `event: ping` frames
    pub ping_interval: Duration,
    /// `retry:` hint sent once after connect
    pub retry: Duration,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            client_buffer: 16,
            ping_interval: Duration::from_secs(10),
            retry: Duration::from_millis(10_000),
        }
    }
}

impl From<&DevConfig> for BrokerSettings {
    fn from(config: &DevConfig) -> Self {
        Self {
            client_buffer: config.client_buffer,
            ping_interval: config.ping_interval(),
            retry: config.retry(),
        }
    }
}

enum Command {
    Register {
        id: u64,
        tx: mpsc::Sender<Arc<str>>,
    },
    Unregister(u64),
    Publish(Arc<str>),
}

/// Handle to the dispatcher. Cheap to clone.
#[derive(Clone)]
pub struct Broker {
    commands: mpsc::UnboundedSender<Command>,
    next_id: Arc<AtomicU64>,
    clients: watch::Receiver<usize>,
    settings: BrokerSettings,
}

impl Broker {
    /// Spawn the dispatcher task. Must be called inside a Tokio runtime.
    pub fn new(settings: BrokerSettings) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let (count_tx, clients) = watch::channel(0);
        tokio::spawn(dispatch(rx, count_tx));

        Self {
            commands,
            next_id: Arc::new(AtomicU64::new(1)),
            clients,
            settings,
        }
    }

    /// Publish `payload` to every client registered so far. Never blocks.
    pub fn notify(&self, payload: impl Into<Arc<str>>) {
        // Only fails once the dispatcher is gone, at which point nobody listens.
        let _ = self.commands.send(Command::Publish(payload.into()));
    }

    /// Register a new client. Dropping the subscription unregisters it.
    pub fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.settings.client_buffer.max(1));
        let _ = self.commands.send(Command::Register { id, tx });

        Subscription {
            id,
            rx,
            commands: self.commands.clone(),
        }
    }

    /// Number of clients in the registry as of the last processed command.
    pub fn client_count(&self) -> usize {
        *self.clients.borrow()
    }

    /// Watch the registry size; updated after every processed command.
    pub fn clients(&self) -> watch::Receiver<usize> {
        self.clients.clone()
    }

    /// Long-lived `text/event-stream` response for one browser.
    ///
    /// Writes the `retry` preamble, then one `data:` frame per published payload,
    /// interleaved with `event: ping` frames carrying the current unix time.
    pub fn sse_response(&self) -> impl IntoResponse {
        let stream = event_stream(self.subscribe(), self.settings);

        (
            [
                (
                    HeaderName::from_static("x-accel-buffering"),
                    HeaderValue::from_static("no"),
                ),
                (
                    header::ACCESS_CONTROL_ALLOW_ORIGIN,
                    HeaderValue::from_static("*"),
                ),
            ],
            Sse::new(stream),
        )
    }
}

/// One registered client.
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<Arc<str>>,
    commands: mpsc::UnboundedSender<Command>,
}

impl Subscription {
    /// Next payload, or `None` once the broker is gone.
    pub async fn recv(&mut self) -> Option<Arc<str>> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Unregister(self.id));
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

async fn dispatch(mut commands: mpsc::UnboundedReceiver<Command>, count: watch::Sender<usize>) {
    let mut clients: HashMap<u64, mpsc::Sender<Arc<str>>> = HashMap::new();

    while let Some(command) = commands.recv().await {
        match command {
            Command::Register { id, tx } => {
                clients.insert(id, tx);
                tracing::debug!(client = id, total = clients.len(), "reload client connected");
            }
            Command::Unregister(id) => {
                if clients.remove(&id).is_some() {
                    tracing::debug!(
                        client = id,
                        total = clients.len(),
                        "reload client disconnected"
                    );
                }
            }
            Command::Publish(payload) => {
                clients.retain(|id, tx| match tx.try_send(Arc::clone(&payload)) {
                    Ok(()) => true,
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!(client = *id, "reload client is not keeping up, event dropped");
                        true
                    }
                    Err(TrySendError::Closed(_)) => false,
                });
            }
        }
        count.send_replace(clients.len());
    }
}

fn event_stream(
    mut subscription: Subscription,
    settings: BrokerSettings,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        yield Ok(Event::default().retry(settings.retry));

        let start = tokio::time::Instant::now() + settings.ping_interval;
        let mut ticker = tokio::time::interval_at(start, settings.ping_interval);

        loop {
            let event = tokio::select! {
                payload = subscription.recv() => match payload {
                    Some(payload) => Event::default().data(&*payload),
                    None => break,
                },
                _ = ticker.tick() => ping_event(),
            };
            yield Ok(event);
        }
    }
}

fn ping_event() -> Event {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    Event::default()
        .event("ping")
        .data(serde_json::json!({ "time": now }).to_string())
}
