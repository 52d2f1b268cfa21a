// src/bus.rs

//! Build event bus.
//!
//! The engine publishes one [`BusEvent::Task`] per visited task. Listeners
//! (a file watcher resetting its state, a progress printer, tests) subscribe
//! through the [`EventBus`] handed to the build session, so nothing outlives
//! the bus it was registered on.

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;
use tracing::{trace, warn};

const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Event published by a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    /// A task finished. `code` is `None` when nothing was launched.
    Task { name: String, code: Option<i32> },
}

impl BusEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            BusEvent::Task { .. } => "task",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<BusEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish `event`. Returns how many subscribers will see it.
    pub fn emit(&self, event: BusEvent) -> usize {
        trace!(event = event.event_name(), ?event, "emitting");
        // No subscribers is not an error.
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Call `handler` for every event until the returned subscription is
    /// dropped. Needs a running tokio runtime.
    pub fn on<F>(&self, mut handler: F) -> Subscription
    where
        F: FnMut(BusEvent) + Send + 'static,
    {
        let mut receiver = self.subscribe();
        let handle = tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                handler(event);
            }
        });
        Subscription { handle }
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

pub struct EventReceiver {
    receiver: broadcast::Receiver<BusEvent>,
}

impl EventReceiver {
    /// Next event, or `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<BusEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(n)) => {
                    warn!(skipped = n, "event receiver lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next already-published event, without waiting.
    pub fn try_recv(&mut self) -> Option<BusEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(n)) => {
                    warn!(skipped = n, "event receiver lagged");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }
}

/// Handle of a listener registered with [`EventBus::on`]. Dropping it stops
/// the listener.
pub struct Subscription {
    handle: JoinHandle<()>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
