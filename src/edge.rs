use crate::collect::{in_gc, Collector};
use crate::collectable::{node_addr, Collectable, NodePtr};
use crate::root::Root;
use std::cmp::Ordering;
use std::ptr::NonNull;

/// A handle modeling an owned edge in the object graph.
///
/// Any managed reference stored as a field inside another managed value
/// must be an `Edge` whose owner is the containing value; the collector
/// learns the graph topology from nothing else. The owner is fixed at
/// construction and outlives the handle, which holds for fields.
///
/// An `Edge` does not by itself keep its target alive; it makes the target
/// exactly as reachable as its owner. Convert to a [`Root`] with
/// [`to_root`](Edge::to_root) before handing the target across a call
/// boundary.
#[derive(Debug)]
pub struct Edge<T: Collectable> {
    owner: NodePtr,
    target: Option<NonNull<T>>,
}

// safety: similar to `std::sync::Arc`. Edges move between threads inside
// their owner.
unsafe impl<T: Collectable + Sync> Send for Edge<T> {}
unsafe impl<T: Collectable + Sync> Sync for Edge<T> {}

impl<T: Collectable> Edge<T> {
    /// An edge out of `owner` with no target yet. Reports nothing.
    pub fn new(owner: &dyn Collectable) -> Edge<T> {
        Edge {
            owner: NonNull::from(owner),
            target: None,
        }
    }

    /// An edge from `owner` to the target of `root`.
    pub fn with_target(owner: &dyn Collectable, root: &Root<T>) -> Edge<T> {
        let mut edge = Edge::new(owner);
        edge.connect(root.target());
        edge
    }

    /// Retarget this edge at the target of `root`.
    ///
    /// A no-op when the target is unchanged; otherwise the old edge is
    /// disconnected before the new one is connected.
    pub fn set(&mut self, root: &Root<T>) {
        let target = root.target();
        if self.addr() == target.map_or(0, node_addr) {
            return;
        }
        self.disconnect();
        self.connect(target);
    }

    /// Copy the target of another edge with the same owner.
    pub fn assign(&mut self, other: &Edge<T>) {
        debug_assert!(
            node_addr(self.owner) == node_addr(other.owner),
            "edges can only be assigned between handles with the same owner"
        );
        if self.addr() == other.addr() {
            return;
        }
        self.disconnect();
        self.connect(other.target);
    }

    /// A rooted handle to this edge's target.
    pub fn to_root(&self) -> Root<T> {
        Root::from_target(self.target)
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.target.is_none()
    }

    fn connect(&mut self, target: Option<NonNull<T>>) {
        self.target = target;
        if let Some(target) = target {
            Collector::instance().connect(self.owner, target);
        }
    }

    fn disconnect(&mut self) {
        if let Some(target) = self.target.take() {
            Collector::instance().disconnect(self.owner, target);
        }
    }

    #[inline]
    fn addr(&self) -> usize {
        self.target.map_or(0, node_addr)
    }
}

impl<T: Collectable> Drop for Edge<T> {
    fn drop(&mut self) {
        // A sweep drops edges as a side effect of reclaiming their owner.
        // The owner's adjacency dies with it, so those drops stay silent;
        // reporting them would name nodes the collector is in the middle
        // of destroying.
        if !in_gc() {
            self.disconnect();
        }
    }
}

impl<T: Collectable> From<&Edge<T>> for Root<T> {
    fn from(edge: &Edge<T>) -> Root<T> {
        edge.to_root()
    }
}

impl<T: Collectable> PartialEq for Edge<T> {
    #[inline]
    fn eq(&self, other: &Edge<T>) -> bool {
        self.addr() == other.addr()
    }
}

impl<T: Collectable> Eq for Edge<T> {}

impl<T: Collectable> PartialOrd for Edge<T> {
    #[inline]
    fn partial_cmp(&self, other: &Edge<T>) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Collectable> Ord for Edge<T> {
    #[inline]
    fn cmp(&self, other: &Edge<T>) -> Ordering {
        self.addr().cmp(&other.addr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect;
    use crate::testutil::{new_node, TestNode};
    use std::sync::atomic::{AtomicUsize, Ordering::SeqCst};
    use std::sync::Arc;

    #[test]
    fn test_empty_edge_reports_nothing() {
        let drops = Arc::new(AtomicUsize::new(0));
        let owner = new_node(&drops);
        let edge: Edge<TestNode> = Edge::new(&*owner);
        assert!(edge.is_null());
        assert!(edge.to_root().is_null());
        drop(edge);
        drop(owner);
        collect();
        assert_eq!(drops.load(SeqCst), 1);
    }

    #[test]
    fn test_assign_between_sibling_edges() {
        let drops = Arc::new(AtomicUsize::new(0));
        let owner = new_node(&drops);
        {
            let x = new_node(&drops);
            let y = new_node(&drops);
            let mut first = Edge::with_target(&*owner, &x);
            let second = Edge::with_target(&*owner, &y);
            assert_ne!(first, second);
            first.assign(&second);
            assert_eq!(first, second);
            assert!(!first.is_null());
        }
        collect();
        assert_eq!(drops.load(SeqCst), 2);
        drop(owner);
        collect();
        assert_eq!(drops.load(SeqCst), 3);
    }
}
