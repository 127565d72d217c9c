use crate::collectable::{node_addr, Collectable, GcHeader, NodePtr};
use crate::event::{Event, EventQueue, EVENT_QUEUE_CAPACITY};
use parking_lot::Mutex;
use std::cell::Cell;
use std::collections::HashMap;
use std::sync::OnceLock;

static COLLECTOR: OnceLock<Collector> = OnceLock::new();

thread_local!(static IN_GC: Cell<bool> = Cell::new(false));

/// The mark-sweep collector.
///
/// The collector keeps its own copy of the object graph, assembled from the
/// events emitted by [`Root`](crate::Root) and [`Edge`](crate::Edge)
/// handles, and reclaims every node it has seen that is no longer reachable
/// from a rooted node. Handles talk to the process-wide instance returned
/// by [`Collector::instance`].
pub struct Collector {
    /// Edits reported by mutator threads, not yet applied.
    queue: EventQueue,

    /// The shadow graph. The mutex also serializes collections.
    shadow: Mutex<Shadow>,
}

struct Shadow {
    /// Every node the collector has been told about, keyed by address.
    nodes: HashMap<usize, NodePtr>,

    /// Mark stamp of the current collection round. Only increases.
    epoch: u64,

    /// Whether any event was applied since the last sweep.
    graph_changed: bool,
}

// safety: the shadow graph is only touched while the collection mutex is
// held; the raw node pointers never leave the collector.
unsafe impl Send for Shadow {}

impl Collector {
    /// The process-wide collector.
    pub fn instance() -> &'static Collector {
        COLLECTOR.get_or_init(|| Collector::with_capacity(EVENT_QUEUE_CAPACITY))
    }

    pub(crate) fn with_capacity(capacity: usize) -> Collector {
        Collector {
            queue: EventQueue::with_capacity(capacity),
            shadow: Mutex::new(Shadow {
                nodes: HashMap::new(),
                epoch: 0,
                graph_changed: false,
            }),
        }
    }

    pub(crate) fn add_root(&self, node: NodePtr) {
        self.queue.push(Event::AddRoot(node));
    }

    pub(crate) fn remove_root(&self, node: NodePtr) {
        self.queue.push(Event::RemoveRoot(node));
    }

    pub(crate) fn connect(&self, owner: NodePtr, target: NodePtr) {
        self.queue.push(Event::Connect(owner, target));
    }

    pub(crate) fn disconnect(&self, owner: NodePtr, target: NodePtr) {
        self.queue.push(Event::Disconnect(owner, target));
    }

    /// Apply all queued events to the shadow graph without sweeping.
    ///
    /// Calling this is optional. When mutator threads generate many edits
    /// between collections it keeps the queue drained and the next
    /// collection cheap.
    pub fn process_events(&self) {
        let mut shadow = self.shadow.lock();
        shadow.apply_events(&self.queue);
    }

    /// Apply all queued events, then reclaim every known node that is not
    /// reachable from a rooted node.
    ///
    /// Concurrent calls serialize on the collection mutex. While a thread
    /// is inside this call its [`in_gc`] flag is true.
    pub fn collect(&self) {
        let mut shadow = self.shadow.lock();
        IN_GC.with(|flag| flag.set(true));
        shadow.apply_events(&self.queue);
        if shadow.graph_changed {
            shadow.mark_sweep();
            shadow.graph_changed = false;
        }
        IN_GC.with(|flag| flag.set(false));
    }
}

#[cfg(test)]
impl Collector {
    pub(crate) fn epoch(&self) -> u64 {
        self.shadow.lock().epoch
    }

    pub(crate) fn graph_changed(&self) -> bool {
        self.shadow.lock().graph_changed
    }

    pub(crate) fn node_count(&self) -> usize {
        self.shadow.lock().nodes.len()
    }
}

impl Shadow {
    fn apply_events(&mut self, queue: &EventQueue) {
        while let Some(event) = queue.pop() {
            self.graph_changed = true;
            match event {
                Event::AddRoot(node) => {
                    self.nodes.entry(node_addr(node)).or_insert(node);
                    header(node).inc_root();
                }
                Event::RemoveRoot(node) => {
                    let count = header(node).dec_root();
                    debug_assert!(count >= 0, "root count went negative");
                }
                Event::Connect(owner, target) => {
                    header(owner).push_edge(target);
                }
                Event::Disconnect(owner, target) => {
                    let removed = header(owner).remove_edge(target);
                    debug_assert!(removed, "disconnected an edge that was never connected");
                }
            }
        }
    }

    /// One collection round over the shadow graph.
    fn mark_sweep(&mut self) {
        self.epoch += 1;
        let epoch = self.epoch;

        // Seed the stack with every rooted node.
        let mut stack: Vec<NodePtr> = self
            .nodes
            .values()
            .copied()
            .filter(|&node| header(node).root_count() > 0)
            .collect();

        // Mark.
        while let Some(node) = stack.pop() {
            let node_header = header(node);
            if node_header.mark_epoch() != epoch {
                node_header.set_mark_epoch(epoch);
                node_header.for_each_edge(|target| stack.push(target));
            }
        }

        // Sweep. Destructors may drop edge handles owned by the dying node;
        // those observe the in_gc flag and stay silent.
        let before = self.nodes.len();
        self.nodes.retain(|_, node| {
            let node = *node;
            if header(node).mark_epoch() == epoch {
                true
            } else {
                // safety: the node was allocated by the handle layer via
                // Box, and it is unreachable, so no live handle names it.
                drop(unsafe { Box::from_raw(node.as_ptr()) });
                false
            }
        });
        log::debug!("swept {} of {} nodes", before - self.nodes.len(), before);
    }
}

#[inline]
fn header<'a>(node: NodePtr) -> &'a GcHeader {
    // safety: a node stays alive until the sweep that removes it from the
    // node set, and no event names a reclaimed node.
    unsafe { node.as_ref() }.gc_header()
}

/// Run a collection on the process-wide collector.
///
/// See [`Collector::collect`].
pub fn collect() {
    Collector::instance().collect()
}

/// Apply queued graph edits on the process-wide collector without sweeping.
///
/// See [`Collector::process_events`].
pub fn process_events() {
    Collector::instance().process_events()
}

/// True while the calling thread is inside [`collect`].
///
/// Edge handle destructors use this to tell a user-initiated drop from a
/// drop caused by the sweep reclaiming their owner. False on any thread
/// that has never run a collection.
pub fn in_gc() -> bool {
    IN_GC.with(|flag| flag.get())
}
