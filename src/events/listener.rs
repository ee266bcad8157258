use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use crate::error::ConnectError;
use crate::types::Device;

/// Receives changes to the compatible device set
///
/// Callbacks run on the dispatcher task, one at a time. They should return
/// quickly; long work belongs on a spawned task.
pub trait DiscoveryListener: Send + Sync {
    /// A device became compatible (or was replayed to a new listener)
    fn on_device_added(&self, device: &Device);

    /// A compatible device changed
    fn on_device_updated(&self, device: &Device);

    /// A device stopped being compatible or disappeared
    fn on_device_removed(&self, device: &Device);

    /// Discovery could not run
    fn on_discovery_failed(&self, error: &ConnectError) {
        tracing::debug!(%error, "Discovery failed");
    }
}

/// Identifies a registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Discovery callback as a value
#[derive(Debug, Clone)]
pub enum DiscoveryEvent {
    /// A device became compatible
    Added(Device),
    /// A compatible device changed
    Updated(Device),
    /// A device left the compatible set
    Removed(Device),
    /// Discovery could not run
    Failed(ConnectError),
}

impl DiscoveryEvent {
    /// Device carried by the event, if any
    #[must_use]
    pub fn device(&self) -> Option<&Device> {
        match self {
            Self::Added(d) | Self::Updated(d) | Self::Removed(d) => Some(d),
            Self::Failed(_) => None,
        }
    }
}

/// Listener that forwards every callback into a channel
#[derive(Debug, Clone)]
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<DiscoveryEvent>,
}

impl ChannelListener {
    /// Create a listener and the receiving end of its channel
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DiscoveryEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, event: DiscoveryEvent) {
        // Receiver dropped
        let _ = self.tx.send(event);
    }
}

impl DiscoveryListener for ChannelListener {
    fn on_device_added(&self, device: &Device) {
        self.forward(DiscoveryEvent::Added(device.clone()));
    }

    fn on_device_updated(&self, device: &Device) {
        self.forward(DiscoveryEvent::Updated(device.clone()));
    }

    fn on_device_removed(&self, device: &Device) {
        self.forward(DiscoveryEvent::Removed(device.clone()));
    }

    fn on_discovery_failed(&self, error: &ConnectError) {
        self.forward(DiscoveryEvent::Failed(error.clone()));
    }
}

/// Stream of discovery events for one subscription
pub struct DiscoveryStream {
    id: ListenerId,
    rx: mpsc::UnboundedReceiver<DiscoveryEvent>,
}

impl DiscoveryStream {
    pub(crate) fn new(id: ListenerId, rx: mpsc::UnboundedReceiver<DiscoveryEvent>) -> Self {
        Self { id, rx }
    }

    /// Listener id, for `remove_listener`
    #[must_use]
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Receive the next event
    pub async fn recv(&mut self) -> Option<DiscoveryEvent> {
        self.rx.recv().await
    }
}

impl Stream for DiscoveryStream {
    type Item = DiscoveryEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
