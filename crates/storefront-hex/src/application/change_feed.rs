use storefront_types::domain::change::{ChangeEvent, ChangeKind, Table};
use tokio::sync::broadcast;
use uuid::Uuid;

const DEFAULT_CAPACITY: usize = 256;

/// In-process fan-out of row change notifications.
#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: ChangeEvent) {
        // No receivers is fine; nobody is watching.
        let receivers = self.tx.send(event).unwrap_or(0);
        tracing::trace!(receivers, "change published");
    }

    /// Subscribe to changes on rows owned by `user_id`.
    pub fn subscribe(&self, user_id: Uuid) -> Subscription {
        Subscription {
            user_id,
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

pub struct Subscription {
    user_id: Uuid,
    rx: broadcast::Receiver<ChangeEvent>,
}

impl Subscription {
    /// Next event for this user. A lagged receiver yields one `Resync` event
    /// in place of whatever it missed. `None` once the feed is gone.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.user_id == self.user_id => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(user_id = %self.user_id, skipped, "change subscriber lagged");
                    return Some(ChangeEvent::new(
                        Table::CartItems,
                        ChangeKind::Resync,
                        self.user_id,
                        None,
                    ));
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_only_sees_own_rows() {
        let feed = ChangeFeed::default();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let mut sub = feed.subscribe(alice);

        feed.publish(ChangeEvent::new(Table::CartItems, ChangeKind::Insert, bob, None));
        feed.publish(ChangeEvent::new(Table::CartItems, ChangeKind::Update, alice, None));

        let event = sub.next().await.unwrap();
        assert_eq!(event.user_id, alice);
        assert_eq!(event.kind, ChangeKind::Update);
    }

    #[tokio::test]
    async fn lagging_subscriber_gets_resync() {
        let feed = ChangeFeed::new(2);
        let user = Uuid::new_v4();
        let mut sub = feed.subscribe(user);
        for _ in 0..5 {
            feed.publish(ChangeEvent::new(Table::CartItems, ChangeKind::Update, user, None));
        }
        let event = sub.next().await.unwrap();
        assert_eq!(event.kind, ChangeKind::Resync);
    }

    #[tokio::test]
    async fn closed_feed_ends_subscription() {
        let feed = ChangeFeed::default();
        let mut sub = feed.subscribe(Uuid::new_v4());
        drop(feed);
        assert!(sub.next().await.is_none());
    }

    #[test]
    fn publish_without_subscribers_is_silent() {
        let feed = ChangeFeed::default();
        feed.publish(ChangeEvent::new(
            Table::Orders,
            ChangeKind::Insert,
            Uuid::new_v4(),
            None,
        ));
    }
}
