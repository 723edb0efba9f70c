use tokio::sync::broadcast;

use orch_types::OrchestratorEvent;

/// Fan-out for `OrchestratorEvent`s (workflow/TDD transitions, task results,
/// approvals, supervisor-level errors). Built on a broadcast channel rather
/// than a bespoke per-subscriber queue: a lagging subscriber sees
/// `Err(Lagged(n))` on its next `recv` and resumes from the oldest message
/// still in the ring, instead of stalling the publisher.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<OrchestratorEvent>,
}

/// Ring capacity per subscriber. Chosen generously relative to expected
/// event rates (a handful of transitions per second per project) so a
/// subscriber only lags under sustained unresponsiveness.
const CHANNEL_CAPACITY: usize = 2048;

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.tx.subscribe()
    }

    /// Publishes to all current subscribers. Returns without error when there
    /// are none — events are fire-and-forget, not queued for future
    /// subscribers.
    pub fn publish(&self, event: OrchestratorEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
