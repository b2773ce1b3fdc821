//! Per-session FIFO of spoken responses waiting for the upstream service.

use crate::sequencer::ResponseState;
use std::collections::VecDeque;

/// Identifier assigned to every spoken request, in enqueue order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResponseTicket(pub u64);

impl std::fmt::Display for ResponseTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Text waiting to be spoken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedResponse {
    pub ticket: ResponseTicket,
    pub text: String,
}

/// Unbounded FIFO of [`QueuedResponse`]s.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    items: VecDeque<QueuedResponse>,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends to the tail.
    pub fn enqueue(&mut self, item: QueuedResponse) {
        self.items.push_back(item);
    }

    /// Removes and returns the head, but only while nothing is in flight.
    pub fn dequeue_if_idle(&mut self, state: &ResponseState) -> Option<QueuedResponse> {
        if state.is_active() {
            return None;
        }
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Queued items, head first.
    pub fn iter(&self) -> impl Iterator<Item = &QueuedResponse> {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(n: u64, text: &str) -> QueuedResponse {
        QueuedResponse {
            ticket: ResponseTicket(n),
            text: text.to_string(),
        }
    }

    #[test]
    fn dequeues_in_insertion_order_when_idle() {
        let mut queue = OutboundQueue::new();
        queue.enqueue(item(1, "first"));
        queue.enqueue(item(2, "second"));

        let idle = ResponseState::Idle;
        assert_eq!(queue.dequeue_if_idle(&idle).unwrap().text, "first");
        assert_eq!(queue.dequeue_if_idle(&idle).unwrap().text, "second");
        assert!(queue.dequeue_if_idle(&idle).is_none());
    }

    #[test]
    fn holds_items_while_dispatching() {
        let mut queue = OutboundQueue::new();
        queue.enqueue(item(1, "waiting"));

        let busy = ResponseState::Dispatching {
            ticket: Some(ResponseTicket(0)),
        };
        assert!(queue.dequeue_if_idle(&busy).is_none());
        assert_eq!(queue.len(), 1);

        queue.clear();
        assert!(queue.is_empty());
    }
}
