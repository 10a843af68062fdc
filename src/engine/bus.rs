//! Event bus with per-consumer ordering guarantees.
//!
//! Every subscriber owns a FIFO queue. `publish` appends the event to all of
//! them, so consumers drain independently and may lag each other, but each sees
//! events in submission order.

use std::collections::VecDeque;
use std::sync::Arc;

use super::events::Event;

pub type SubscriberId = usize;

/// Event tagged with its submission sequence number
#[derive(Debug, Clone)]
pub struct Sequenced {
    pub seq: u64,
    pub event: Arc<Event>,
}

#[derive(Debug)]
struct Subscriber {
    name: String,
    queue: VecDeque<Sequenced>,
    delivered: u64,
}

#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Vec<Subscriber>,
    seq_counter: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a consumer. Only events published afterwards are delivered to it.
    pub fn subscribe(&mut self, name: &str) -> SubscriberId {
        self.subscribers.push(Subscriber {
            name: name.to_string(),
            queue: VecDeque::new(),
            delivered: 0,
        });
        self.subscribers.len() - 1
    }

    /// Push an event onto every subscriber queue; returns its sequence number.
    pub fn publish(&mut self, event: Event) -> u64 {
        self.seq_counter += 1;
        let event = Arc::new(event);
        for sub in &mut self.subscribers {
            sub.queue.push_back(Sequenced {
                seq: self.seq_counter,
                event: Arc::clone(&event),
            });
        }
        self.seq_counter
    }

    /// Pop the oldest pending event for one subscriber
    pub fn drain_one(&mut self, id: SubscriberId) -> Option<Sequenced> {
        let sub = self.subscribers.get_mut(id)?;
        let next = sub.queue.pop_front();
        if next.is_some() {
            sub.delivered += 1;
        }
        next
    }

    pub fn pending(&self, id: SubscriberId) -> usize {
        self.subscribers.get(id).map(|s| s.queue.len()).unwrap_or(0)
    }

    pub fn delivered(&self, id: SubscriberId) -> u64 {
        self.subscribers.get(id).map(|s| s.delivered).unwrap_or(0)
    }

    pub fn name(&self, id: SubscriberId) -> Option<&str> {
        self.subscribers.get(id).map(|s| s.name.as_str())
    }

    /// Events still waiting across all subscribers
    pub fn total_pending(&self) -> usize {
        self.subscribers.iter().map(|s| s.queue.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_pending() == 0
    }

    /// Last sequence number handed out
    pub fn last_seq(&self) -> u64 {
        self.seq_counter
    }

    /// Drop everything queued; subscriptions stay.
    pub fn clear(&mut self) {
        for sub in &mut self.subscribers {
            sub.queue.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::events::Payload;

    fn like(id: &str, ts: u64) -> Event {
        Event::new(id, ts, Payload::Like { count: Some(1) })
    }

    #[test]
    fn test_submission_order_not_timestamp_order() {
        let mut bus = EventBus::new();
        let sub = bus.subscribe("metrics");

        bus.publish(like("a", 3000));
        bus.publish(like("b", 1000));
        bus.publish(like("c", 2000));

        assert_eq!(bus.drain_one(sub).unwrap().event.id, "a");
        assert_eq!(bus.drain_one(sub).unwrap().event.id, "b");
        assert_eq!(bus.drain_one(sub).unwrap().event.id, "c");
        assert!(bus.drain_one(sub).is_none());
    }

    #[test]
    fn test_consumers_lag_independently() {
        let mut bus = EventBus::new();
        let fast = bus.subscribe("fast");
        let slow = bus.subscribe("slow");

        for i in 0..5 {
            bus.publish(like(&format!("e{}", i), i));
        }
        for _ in 0..5 {
            bus.drain_one(fast);
        }
        assert_eq!(bus.pending(fast), 0);
        assert_eq!(bus.pending(slow), 5);
        assert_eq!(bus.delivered(fast), 5);

        let first = bus.drain_one(slow).unwrap();
        assert_eq!(first.seq, 1);
        assert_eq!(first.event.id, "e0");
    }

    #[test]
    fn test_late_subscriber_sees_only_new_events() {
        let mut bus = EventBus::new();
        let early = bus.subscribe("early");
        bus.publish(like("old", 1));
        let late = bus.subscribe("late");
        bus.publish(like("new", 2));

        assert_eq!(bus.pending(early), 2);
        assert_eq!(bus.pending(late), 1);
        assert_eq!(bus.name(late), Some("late"));
        bus.clear();
        assert!(bus.is_empty());
        assert_eq!(bus.last_seq(), 2);
    }
}
