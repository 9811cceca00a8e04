use replica_common::Box2;

use crate::tree::{NULL_NODE, Node};

/// Lazy traversal over the items whose box passes a test.
///
/// Subtrees whose fattened box fails the test are pruned; leaves are reported
/// only when their tight box passes. Obtained from
/// [`DynamicTree::query_point`](crate::DynamicTree::query_point) or
/// [`DynamicTree::query_box`](crate::DynamicTree::query_box).
pub struct Query<'a, T, F> {
    nodes: &'a [Node<T>],
    stack: Vec<usize>,
    hit: F,
}

impl<'a, T, F> Query<'a, T, F>
where
    F: Fn(&Box2) -> bool,
{
    pub(crate) fn new(nodes: &'a [Node<T>], root: usize, hit: F) -> Self {
        let mut stack = Vec::with_capacity(32);
        if root != NULL_NODE {
            stack.push(root);
        }
        Self { nodes, stack, hit }
    }
}

impl<T, F> Iterator for Query<'_, T, F>
where
    T: Copy,
    F: Fn(&Box2) -> bool,
{
    type Item = T;

    fn next(&mut self) -> Option<T> {
        while let Some(index) = self.stack.pop() {
            let node = &self.nodes[index];
            if !(self.hit)(&node.fat) {
                continue;
            }
            if node.is_leaf() {
                if (self.hit)(&node.tight) {
                    if let Some(item) = node.item {
                        return Some(item);
                    }
                }
            } else {
                self.stack.push(node.child1);
                self.stack.push(node.child2);
            }
        }
        None
    }
}
