use crate::collectable::NodePtr;
use crossbeam_queue::ArrayQueue;

/// Event queue capacity of the process-wide collector.
pub(crate) const EVENT_QUEUE_CAPACITY: usize = 32_000;

/// One atomic edit to the collector's shadow of the object graph.
///
/// The pointers are plain values here; nothing is dereferenced until the
/// collector applies the event under its mutex.
#[derive(Clone, Copy)]
pub(crate) enum Event {
    /// A root handle took a reference to the node.
    AddRoot(NodePtr),
    /// A root handle released its reference to the node.
    RemoveRoot(NodePtr),
    /// An edge handle established `owner -> target`.
    Connect(NodePtr, NodePtr),
    /// An edge handle released `owner -> target`.
    Disconnect(NodePtr, NodePtr),
}

// safety: the nodes an event names stay alive at least until the collector
// has both applied the event and swept them.
unsafe impl Send for Event {}

/// Bounded lock-free queue carrying events from mutator threads to the
/// collector.
pub(crate) struct EventQueue(ArrayQueue<Event>);

impl EventQueue {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self(ArrayQueue::new(capacity))
    }

    /// Enqueue an event, spinning while the queue is full.
    ///
    /// Dropping an event would silently corrupt the collector's graph, so a
    /// full queue stalls the producer instead. Each retry is reported; a
    /// queue that fills up regularly is undersized.
    pub(crate) fn push(&self, event: Event) {
        let mut event = event;
        while let Err(rejected) = self.0.push(event) {
            log::warn!("collector event queue is full");
            event = rejected;
        }
    }

    /// Dequeue the next event. FIFO per producing thread.
    #[inline]
    pub(crate) fn pop(&self) -> Option<Event> {
        self.0.pop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectable::{Collectable, GcHeader};
    use std::ptr::NonNull;

    struct Node(GcHeader);

    impl Collectable for Node {
        fn gc_header(&self) -> &GcHeader {
            &self.0
        }
    }

    fn leak_node() -> NodePtr {
        NonNull::from(Box::leak(Box::new(Node(GcHeader::new()))))
    }

    #[test]
    fn test_fifo_per_producer() {
        let queue = EventQueue::with_capacity(8);
        let a = leak_node();
        let b = leak_node();
        queue.push(Event::AddRoot(a));
        queue.push(Event::Connect(a, b));
        queue.push(Event::Disconnect(a, b));
        queue.push(Event::RemoveRoot(a));
        assert!(matches!(queue.pop(), Some(Event::AddRoot(_))));
        assert!(matches!(queue.pop(), Some(Event::Connect(..))));
        assert!(matches!(queue.pop(), Some(Event::Disconnect(..))));
        assert!(matches!(queue.pop(), Some(Event::RemoveRoot(_))));
        assert!(queue.pop().is_none());
        // The queue never owned the nodes.
        unsafe {
            drop(Box::from_raw(a.as_ptr()));
            drop(Box::from_raw(b.as_ptr()));
        }
    }
}
