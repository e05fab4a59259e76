//! Change notification bus.
//!
//! Engine-scoped publish/subscribe over a tokio broadcast channel. Local
//! mutations and remote push signals both publish [`Topic::DataChanged`];
//! presentation code subscribes and refreshes.
//!
//! Delivery is at-least-once: a subscriber that falls behind gets one
//! coalesced delivery instead of losing the signal.

use itemsync_types::{RemoteChangeSignal, Topic};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::task::JoinHandle;

/// Default number of buffered notifications per subscriber.
const DEFAULT_CAPACITY: usize = 64;

/// Typed change notification bus.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<Topic>,
}

impl ChangeNotifier {
    /// Create a notifier buffering up to `capacity` notifications.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish `topic` to all subscribers.
    ///
    /// Returns the number of subscribers it was delivered to.
    pub fn publish(&self, topic: Topic) -> usize {
        match self.tx.send(topic) {
            Ok(count) => count,
            Err(_) => 0, // No active subscribers
        }
    }

    /// Subscribe to `topic`.
    pub fn subscribe(&self, topic: Topic) -> Subscription {
        Subscription {
            topic,
            rx: self.tx.subscribe(),
        }
    }

    /// Run `handler` for every delivery of `topic` on a background task.
    ///
    /// The task ends when every notifier handle is dropped. Must be called
    /// from within a tokio runtime.
    pub fn subscribe_with<F>(&self, topic: Topic, handler: F) -> JoinHandle<()>
    where
        F: Fn(Topic) + Send + Sync + 'static,
    {
        let mut subscription = self.subscribe(topic);
        tokio::spawn(async move {
            while let Some(topic) = subscription.recv().await {
                handler(topic);
            }
        })
    }

    /// Ingest a remote push signal.
    ///
    /// Publishes [`Topic::DataChanged`] when the signal reports a data
    /// change; other signals are ignored. Returns whether it published.
    pub fn on_remote_change_signal(&self, signal: &RemoteChangeSignal) -> bool {
        if !signal.is_data_change() {
            tracing::debug!("Ignoring remote signal {:?}", signal.kind);
            return false;
        }
        let delivered = self.publish(Topic::DataChanged);
        tracing::debug!(
            "Remote {:?} signal delivered to {} subscribers",
            signal.kind,
            delivered
        );
        true
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// A subscription to one topic.
#[derive(Debug)]
pub struct Subscription {
    topic: Topic,
    rx: broadcast::Receiver<Topic>,
}

impl Subscription {
    /// The subscribed topic.
    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Wait for the next delivery.
    ///
    /// Returns `None` once every notifier handle is dropped.
    pub async fn recv(&mut self) -> Option<Topic> {
        loop {
            match self.rx.recv().await {
                Ok(topic) if topic == self.topic => return Some(topic),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => return Some(self.coalesce(skipped)),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Take a pending delivery without waiting.
    pub fn try_recv(&mut self) -> Option<Topic> {
        loop {
            match self.rx.try_recv() {
                Ok(topic) if topic == self.topic => return Some(topic),
                Ok(_) => continue,
                Err(TryRecvError::Lagged(skipped)) => return Some(self.coalesce(skipped)),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Fold a lag and everything still buffered into one delivery.
    fn coalesce(&mut self, skipped: u64) -> Topic {
        let mut folded = skipped;
        while self.rx.try_recv().is_ok() {
            folded += 1;
        }
        tracing::debug!("Subscriber lagged, coalesced {} notifications", folded);
        self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itemsync_types::SignalKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn publish_without_subscribers_delivers_nowhere() {
        let notifier = ChangeNotifier::default();
        assert_eq!(notifier.subscriber_count(), 0);
        assert_eq!(notifier.publish(Topic::DataChanged), 0);
    }

    #[tokio::test]
    async fn every_subscriber_receives() {
        let notifier = ChangeNotifier::new(8);
        let mut a = notifier.subscribe(Topic::DataChanged);
        let mut b = notifier.subscribe(Topic::DataChanged);

        assert_eq!(notifier.publish(Topic::DataChanged), 2);

        assert_eq!(a.recv().await, Some(Topic::DataChanged));
        assert_eq!(b.recv().await, Some(Topic::DataChanged));
        assert_eq!(a.try_recv(), None);
    }

    #[tokio::test]
    async fn lagged_subscriber_gets_one_coalesced_delivery() {
        let notifier = ChangeNotifier::new(2);
        let mut sub = notifier.subscribe(Topic::DataChanged);

        for _ in 0..5 {
            notifier.publish(Topic::DataChanged);
        }

        assert_eq!(sub.recv().await, Some(Topic::DataChanged));
        assert_eq!(sub.try_recv(), None);
    }

    #[tokio::test]
    async fn recv_ends_when_notifier_dropped() {
        let notifier = ChangeNotifier::new(4);
        let mut sub = notifier.subscribe(Topic::DataChanged);
        drop(notifier);

        assert_eq!(sub.recv().await, None);
    }

    #[tokio::test]
    async fn subscribe_with_runs_handler() {
        let notifier = ChangeNotifier::new(8);
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        let task = notifier.subscribe_with(Topic::DataChanged, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        notifier.publish(Topic::DataChanged);
        notifier.publish(Topic::DataChanged);
        drop(notifier);

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn remote_signals_filtered_by_kind() {
        let notifier = ChangeNotifier::new(8);
        let mut sub = notifier.subscribe(Topic::DataChanged);

        assert!(!notifier.on_remote_change_signal(&RemoteChangeSignal::new(
            SignalKind::ReadNotification
        )));
        assert_eq!(sub.try_recv(), None);

        assert!(notifier.on_remote_change_signal(&RemoteChangeSignal::new(SignalKind::RecordZone)));
        assert_eq!(sub.recv().await, Some(Topic::DataChanged));
    }
}
