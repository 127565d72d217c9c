//! Test utilities.

use crate::{collect, Collectable, Edge, GcHeader, Root};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering::SeqCst};
use std::sync::Arc;

/// A managed node that counts its drops and can hold edges to other nodes.
#[derive(Debug)]
pub struct TestNode {
    header: GcHeader,
    children: Mutex<Vec<Edge<TestNode>>>,
    drop_count: Arc<AtomicUsize>,
}

impl Collectable for TestNode {
    fn gc_header(&self) -> &GcHeader {
        &self.header
    }
}

impl Drop for TestNode {
    fn drop(&mut self) {
        self.drop_count.fetch_add(1, SeqCst);
    }
}

/// Create a node whose drop bumps `drop_count`.
pub fn new_node(drop_count: &Arc<AtomicUsize>) -> Root<TestNode> {
    Root::new(TestNode {
        header: GcHeader::new(),
        children: Mutex::new(Vec::new()),
        drop_count: drop_count.clone(),
    })
}

/// Store an edge `parent -> child` inside `parent`.
pub fn link(parent: &Root<TestNode>, child: &Root<TestNode>) {
    let parent = parent.get().expect("link needs a non-empty parent");
    let edge = Edge::with_target(parent, child);
    parent.children.lock().push(edge);
}

/// Drop one stored edge `parent -> child`, if any.
pub fn unlink(parent: &Root<TestNode>, child: &Root<TestNode>) {
    let parent = parent.get().expect("unlink needs a non-empty parent");
    let mut children = parent.children.lock();
    if let Some(index) = children.iter().position(|edge| edge.to_root() == *child) {
        children.remove(index);
    }
}

/// Drop the last stored edge of `parent`. Returns false if there was none.
pub fn pop_link(parent: &Root<TestNode>) -> bool {
    let parent = parent.get().expect("pop_link needs a non-empty parent");
    parent.children.lock().pop().is_some()
}

/// A rooted handle to the first stored child of `parent`; empty if none.
pub fn first_child(parent: &Root<TestNode>) -> Root<TestNode> {
    let parent = parent.get().expect("first_child needs a non-empty parent");
    let children = parent.children.lock();
    children
        .first()
        .map(|edge| edge.to_root())
        .unwrap_or_default()
}

/// Retarget the first stored edge of `parent` at `child`, creating the
/// edge if the node has none yet.
pub fn set_only_child(parent: &Root<TestNode>, child: &Root<TestNode>) {
    let parent = parent.get().expect("set_only_child needs a non-empty parent");
    let mut children = parent.children.lock();
    match children.first_mut() {
        Some(edge) => edge.set(child),
        None => children.push(Edge::with_target(parent, child)),
    }
}

/// Exercise a graph of `n` nodes (1 <= n <= 16) against the process-wide
/// collector.
///
/// Each byte of `edges` encodes one edge, from the node indexed by the high
/// nibble to the node indexed by the low nibble (both modulo `n`).
/// `unroot_bits` selects, per node, whether its root is dropped before the
/// interleaved collections; `collect_bits` selects whether a collection
/// runs after visiting that node. All remaining roots are dropped at the
/// end, and the final collection must have reclaimed every node exactly
/// once.
pub fn test_graph(n: usize, edges: &[u8], unroot_bits: u16, collect_bits: u16) {
    assert!(n >= 1 && n <= 16);
    let drop_count = Arc::new(AtomicUsize::new(0));
    {
        let mut roots: Vec<Option<Root<TestNode>>> =
            (0..n).map(|_| Some(new_node(&drop_count))).collect();
        for &edge in edges {
            let from = ((edge as usize) >> 4) % n;
            let to = ((edge as usize) & 15) % n;
            let from_root = roots[from].as_ref().expect("roots are intact while linking");
            let to_root = roots[to].as_ref().expect("roots are intact while linking");
            link(from_root, to_root);
        }
        for i in 0..n {
            if (unroot_bits >> i) & 1 != 0 {
                roots[i] = None;
            }
            if (collect_bits >> i) & 1 != 0 {
                collect();
            }
        }
    }
    collect();
    assert_eq!(drop_count.load(SeqCst), n);
}
