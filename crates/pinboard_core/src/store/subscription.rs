//! Change-notification subscription handle.
//!
//! A subscription is a scoped resource: it stays registered with its store
//! while the value is alive and is released when dropped.

use crate::config::BoardId;
use crate::store::NoteChange;
use log::debug;
use tokio::sync::broadcast;

/// What a subscription yields besides closing.
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionEvent {
    /// Next change, in store commit order.
    Change(NoteChange),
    /// The receiver fell behind and this many changes were dropped. Local
    /// state can no longer be trusted and must be reloaded.
    Lagged(u64),
}

/// Live registration for one board's change stream.
pub struct Subscription {
    board_id: BoardId,
    receiver: broadcast::Receiver<NoteChange>,
}

impl Subscription {
    /// Wraps a broadcast receiver. Stores build subscriptions through this.
    pub fn new(board_id: BoardId, receiver: broadcast::Receiver<NoteChange>) -> Self {
        Self { board_id, receiver }
    }

    pub fn board_id(&self) -> &BoardId {
        &self.board_id
    }

    /// Waits for the next event.
    ///
    /// Returns `None` once the store side has gone away.
    pub async fn next(&mut self) -> Option<SubscriptionEvent> {
        match self.receiver.recv().await {
            Ok(change) => Some(SubscriptionEvent::Change(change)),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                Some(SubscriptionEvent::Lagged(skipped))
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        debug!(
            "event=unsubscribe module=store status=ok board_id={}",
            self.board_id
        );
    }
}

#[cfg(test)]
mod tests {
    use super::{Subscription, SubscriptionEvent};
    use crate::config::BoardId;
    use crate::store::NoteChange;
    use tokio::sync::broadcast;
    use uuid::Uuid;

    #[tokio::test]
    async fn yields_changes_in_order_then_closes() {
        let (tx, rx) = broadcast::channel(8);
        let mut subscription = Subscription::new(BoardId::default(), rx);
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        tx.send(NoteChange::Deleted { id: first }).unwrap();
        tx.send(NoteChange::Deleted { id: second }).unwrap();
        drop(tx);

        assert_eq!(
            subscription.next().await,
            Some(SubscriptionEvent::Change(NoteChange::Deleted { id: first }))
        );
        assert_eq!(
            subscription.next().await,
            Some(SubscriptionEvent::Change(NoteChange::Deleted { id: second }))
        );
        assert_eq!(subscription.next().await, None);
    }

    #[tokio::test]
    async fn reports_lag_when_buffer_overflows() {
        let (tx, rx) = broadcast::channel(2);
        let mut subscription = Subscription::new(BoardId::default(), rx);
        for _ in 0..5 {
            tx.send(NoteChange::Deleted { id: Uuid::new_v4() }).unwrap();
        }

        assert_eq!(subscription.next().await, Some(SubscriptionEvent::Lagged(3)));
        assert!(matches!(
            subscription.next().await,
            Some(SubscriptionEvent::Change(_))
        ));
    }

    #[test]
    fn dropping_releases_the_receiver() {
        let (tx, rx) = broadcast::channel::<NoteChange>(2);
        let subscription = Subscription::new(BoardId::default(), rx);
        assert_eq!(tx.receiver_count(), 1);
        drop(subscription);
        assert_eq!(tx.receiver_count(), 0);
    }
}
