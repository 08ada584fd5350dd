//! Store change notifications.
//!
//! Stores publish on a broadcast channel after every mutation; front ends
//! subscribe to refresh badges or to redirect to the login page. Publishing
//! never fails: with no subscribers the event is simply dropped.

use tokio::sync::broadcast;

/// Channel capacity. Slow subscribers lag and skip older events.
const EVENT_CAPACITY: usize = 64;

/// Something observable changed in the storefront.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// The current cart partition changed; `count` is its total quantity.
    CartChanged { count: u32 },

    /// The server-side wishlist changed; `count` is the refreshed item count.
    WishlistChanged { count: u64 },

    /// An action needs a logged-in user. `return_to` is where to resume.
    LoginRequired { return_to: Option<String> },
}

/// Sending half shared by all stores.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<StoreEvent>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    /// Publish an event to current subscribers.
    pub fn publish(&self, event: StoreEvent) {
        tracing::trace!(?event, "Publishing store event");
        // No receivers is not an error
        let _ = self.sender.send(event);
    }

    /// Receive events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
