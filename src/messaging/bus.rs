use crossbeam_channel::{unbounded, Receiver, Sender, TrySendError};
use parking_lot::RwLock;
/// Event bus for pub/sub messaging
///
/// Components publish coordinator events; listeners (the CLI, the export
/// reporter, tests) subscribe and drain their own unbounded queue.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::events::Event;

/// Subscriber ID for tracking subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(usize);

struct Subscriber {
    id: SubscriberId,
    sender: Sender<Event>,
}

/// Event bus for broadcasting events to subscribers. Clones share subscribers.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<RwLock<Vec<Subscriber>>>,
    next_id: Arc<AtomicUsize>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to events, returns a receiver and subscription ID
    pub fn subscribe(&self) -> (Receiver<Event>, SubscriberId) {
        let (tx, rx) = unbounded();
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().push(Subscriber { id, sender: tx });
        (rx, id)
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        self.subscribers.write().retain(|s| s.id != id);
    }

    /// Publish an event to all subscribers without blocking.
    ///
    /// Subscribers whose receiver was dropped are removed.
    pub fn publish(&self, event: Event) {
        let mut disconnected = Vec::new();
        {
            let subscribers = self.subscribers.read();
            for subscriber in subscribers.iter() {
                if let Err(TrySendError::Disconnected(_)) =
                    subscriber.sender.try_send(event.clone())
                {
                    disconnected.push(subscriber.id);
                }
            }
        }

        if !disconnected.is_empty() {
            tracing::trace!(
                "Dropping {} closed subscriber(s) on {}",
                disconnected.len(),
                event.name()
            );
            self.subscribers
                .write()
                .retain(|s| !disconnected.contains(&s.id));
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn clear(&self) {
        self.subscribers.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_bus_subscribe() {
        let bus = EventBus::new();
        let (_rx, _id) = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn test_event_bus_unsubscribe() {
        let bus = EventBus::new();
        let (_rx, id) = bus.subscribe();
        bus.unsubscribe(id);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_event_bus_publish() {
        let bus = EventBus::new();
        let (rx, _id) = bus.subscribe();

        bus.publish(Event::TrackSelected {
            index: 2,
            title: "Amazing Grace".to_string(),
        });

        match rx.try_recv().unwrap() {
            Event::TrackSelected { index, .. } => assert_eq!(index, 2),
            other => panic!("Wrong event type received: {:?}", other),
        }
    }

    #[test]
    fn test_event_bus_multiple_subscribers() {
        let bus = EventBus::new();
        let (rx1, _id1) = bus.subscribe();
        let (rx2, _id2) = bus.subscribe();

        bus.publish(Event::Shutdown);

        assert_eq!(rx1.try_recv().unwrap(), Event::Shutdown);
        assert_eq!(rx2.try_recv().unwrap(), Event::Shutdown);
    }

    #[test]
    fn test_dropped_receiver_is_pruned() {
        let bus = EventBus::new();
        let (rx, _id) = bus.subscribe();
        let (_kept, _id2) = bus.subscribe();
        drop(rx);

        bus.publish(Event::MusicPauseChanged { paused: true });
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn test_event_bus_clone() {
        let bus1 = EventBus::new();
        let bus2 = bus1.clone();

        let (_rx, _id) = bus1.subscribe();
        assert_eq!(bus2.subscriber_count(), 1);

        bus2.clear();
        assert_eq!(bus1.subscriber_count(), 0);
    }
}
