//! In-process change fan-out
//!
//! A [`ChangeHub`] is a cloneable handle to one `tokio::sync::broadcast`
//! channel. Producers (the PostgreSQL listener or the in-memory store)
//! publish; every SSE connection holds its own receiver. A receiver that
//! falls more than [`DEFAULT_CAPACITY`] events behind gets
//! `RecvError::Lagged` and should refetch instead of replaying.

use tokio::sync::broadcast;
use tracing::trace;

use super::ChangeEvent;

pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct ChangeHub {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Sends to every current subscriber; returns how many received it
    pub fn publish(&self, event: ChangeEvent) -> usize {
        let delivered = self.sender.send(event).unwrap_or(0);
        trace!(
            kind = ?event.kind,
            task_id = %event.task_id,
            delivered,
            "Published change event"
        );
        delivered
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ChangeKind;
    use tokio::sync::broadcast::error::RecvError;
    use uuid::Uuid;

    fn event() -> ChangeEvent {
        ChangeEvent::new(ChangeKind::Insert, Uuid::new_v4(), Uuid::new_v4())
    }

    #[test]
    fn test_publish_without_subscribers() {
        let hub = ChangeHub::default();
        assert_eq!(hub.publish(event()), 0);
    }

    #[tokio::test]
    async fn test_fan_out() {
        let hub = ChangeHub::default();
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 2);

        let sent = event();
        assert_eq!(hub.publish(sent), 2);

        assert_eq!(a.recv().await.unwrap(), sent);
        assert_eq!(b.recv().await.unwrap(), sent);
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags() {
        let hub = ChangeHub::new(2);
        let mut rx = hub.subscribe();

        for _ in 0..5 {
            hub.publish(event());
        }

        assert!(matches!(rx.recv().await, Err(RecvError::Lagged(3))));
        assert!(rx.recv().await.is_ok());
    }
}
