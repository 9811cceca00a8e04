use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use glam::Vec2;
use replica_common::Box2;

use crate::query::Query;

/// Default fattening applied to every leaf box.
pub const DEFAULT_AABB_MARGIN: f32 = 1.0 / 32.0;

/// Maps the current node capacity to the next one when the arena is full.
pub type GrowthFn = Box<dyn Fn(usize) -> usize>;

pub(crate) const NULL_NODE: usize = usize::MAX;

#[derive(Debug, Clone)]
pub(crate) struct Node<T> {
    pub(crate) item: Option<T>,
    pub(crate) tight: Box2,
    pub(crate) fat: Box2,
    /// Parent index, or the next free slot while the node is on the free list.
    parent: usize,
    pub(crate) child1: usize,
    pub(crate) child2: usize,
    /// 0 for leaves, -1 for free slots.
    height: i32,
}

impl<T> Node<T> {
    fn free(next: usize) -> Self {
        Self {
            item: None,
            tight: Box2::default(),
            fat: Box2::default(),
            parent: next,
            child1: NULL_NODE,
            child2: NULL_NODE,
            height: -1,
        }
    }

    pub(crate) fn is_leaf(&self) -> bool {
        self.child1 == NULL_NODE
    }
}

/// Dynamic AABB tree keyed by item.
///
/// Each item owns one leaf. The leaf keeps the item's tight box and a copy
/// enlarged by the margin; small movements that stay inside the enlarged box
/// only refresh the tight box and never restructure the tree.
pub struct DynamicTree<T> {
    nodes: Vec<Node<T>>,
    root: usize,
    free_list: usize,
    node_count: usize,
    proxies: HashMap<T, usize>,
    margin: f32,
    growth: GrowthFn,
}

impl<T: Copy + Eq + Hash> DynamicTree<T> {
    /// Tree with 256 preallocated nodes that doubles when full.
    pub fn new() -> Self {
        Self::with_capacity(256, DEFAULT_AABB_MARGIN, |capacity| capacity * 2)
    }

    /// Tree with `capacity` preallocated nodes. When the arena runs out,
    /// `growth` is called with the current capacity to pick the next one.
    pub fn with_capacity(
        capacity: usize,
        margin: f32,
        growth: impl Fn(usize) -> usize + 'static,
    ) -> Self {
        let mut tree = Self {
            nodes: Vec::with_capacity(capacity),
            root: NULL_NODE,
            free_list: NULL_NODE,
            node_count: 0,
            proxies: HashMap::new(),
            margin,
            growth: Box::new(growth),
        };
        tree.extend_free_list(capacity);
        tree
    }

    /// Number of items in the tree.
    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    /// Number of node slots currently allocated, used or free.
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    /// Height of the root; 0 for an empty or single-leaf tree.
    pub fn height(&self) -> usize {
        if self.root == NULL_NODE {
            0
        } else {
            self.nodes[self.root].height as usize
        }
    }

    pub fn margin(&self) -> f32 {
        self.margin
    }

    pub fn contains(&self, item: &T) -> bool {
        self.proxies.contains_key(item)
    }

    /// Tight box last reported for `item`.
    pub fn tight_box(&self, item: &T) -> Option<Box2> {
        self.proxies.get(item).map(|&p| self.nodes[p].tight)
    }

    /// Fattened box currently stored for `item`.
    pub fn fat_box(&self, item: &T) -> Option<Box2> {
        self.proxies.get(item).map(|&p| self.nodes[p].fat)
    }

    /// All items, in no particular order.
    pub fn items(&self) -> impl Iterator<Item = T> + '_ {
        self.proxies.keys().copied()
    }

    /// Insert `item` with its current tight box. Returns `false` and leaves
    /// the tree untouched if the item is already present.
    pub fn add(&mut self, item: T, tight: Box2) -> bool {
        if self.proxies.contains_key(&item) {
            return false;
        }
        let leaf = self.allocate_node();
        {
            let node = &mut self.nodes[leaf];
            node.item = Some(item);
            node.tight = tight;
            node.fat = tight.enlarged(self.margin);
            node.height = 0;
        }
        self.insert_leaf(leaf);
        self.proxies.insert(item, leaf);
        true
    }

    /// Remove `item`. Returns `false` if it was not present.
    pub fn remove(&mut self, item: &T) -> bool {
        let Some(leaf) = self.proxies.remove(item) else {
            return false;
        };
        self.remove_leaf(leaf);
        self.free_node(leaf);
        true
    }

    /// Refresh `item` with a new tight box.
    ///
    /// Returns `true` only when the box escaped the stored fattened box and
    /// the leaf was reinserted. Returns `false` for absent items and for
    /// movements that stay inside the fattened box.
    pub fn update(&mut self, item: &T, tight: Box2) -> bool {
        let Some(&leaf) = self.proxies.get(item) else {
            return false;
        };
        self.nodes[leaf].tight = tight;
        if self.nodes[leaf].fat.contains(&tight) {
            return false;
        }
        self.remove_leaf(leaf);
        self.nodes[leaf].fat = tight.enlarged(self.margin);
        self.insert_leaf(leaf);
        true
    }

    /// Remove every item, keeping the allocated capacity.
    pub fn clear(&mut self) {
        let capacity = self.nodes.len();
        self.nodes.clear();
        self.proxies.clear();
        self.root = NULL_NODE;
        self.free_list = NULL_NODE;
        self.node_count = 0;
        self.extend_free_list(capacity);
    }

    /// Items whose tight box contains `point`.
    pub fn query_point(&self, point: Vec2) -> Query<'_, T, impl Fn(&Box2) -> bool> {
        Query::new(&self.nodes, self.root, move |b: &Box2| b.contains_point(point))
    }

    /// Items whose tight box intersects `region`.
    pub fn query_box(&self, region: Box2) -> Query<'_, T, impl Fn(&Box2) -> bool> {
        Query::new(&self.nodes, self.root, move |b: &Box2| b.intersects(&region))
    }

    /// Structural self-check: parent links, heights, enclosing boxes, the
    /// free list and the item map must all agree.
    pub fn validate(&self) -> bool {
        let mut free = 0;
        let mut index = self.free_list;
        while index != NULL_NODE {
            free += 1;
            if free > self.nodes.len() {
                return false;
            }
            index = self.nodes[index].parent;
        }
        if free + self.node_count != self.nodes.len() {
            return false;
        }

        let all_mapped = self
            .proxies
            .iter()
            .all(|(item, &leaf)| self.nodes[leaf].item.as_ref() == Some(item));
        if !all_mapped {
            return false;
        }

        if self.root == NULL_NODE {
            return self.node_count == 0 && self.proxies.is_empty();
        }
        if self.nodes[self.root].parent != NULL_NODE {
            return false;
        }
        let mut leaves = 0;
        self.validate_node(self.root, &mut leaves) && leaves == self.proxies.len()
    }

    fn validate_node(&self, index: usize, leaves: &mut usize) -> bool {
        let node = &self.nodes[index];
        if node.is_leaf() {
            *leaves += 1;
            return node.height == 0
                && node.child2 == NULL_NODE
                && node.item.is_some()
                && node.fat.contains(&node.tight);
        }
        let (c1, c2) = (node.child1, node.child2);
        if c2 == NULL_NODE || self.nodes[c1].parent != index || self.nodes[c2].parent != index {
            return false;
        }
        let expected_height = 1 + self.nodes[c1].height.max(self.nodes[c2].height);
        if node.height != expected_height || node.fat != self.union_of(c1, c2) {
            return false;
        }
        self.validate_node(c1, leaves) && self.validate_node(c2, leaves)
    }

    fn extend_free_list(&mut self, new_capacity: usize) {
        let old = self.nodes.len();
        if new_capacity <= old {
            return;
        }
        self.nodes.reserve(new_capacity - old);
        for i in old..new_capacity {
            let next = if i + 1 < new_capacity { i + 1 } else { self.free_list };
            self.nodes.push(Node::free(next));
        }
        self.free_list = old;
    }

    fn allocate_node(&mut self) -> usize {
        if self.free_list == NULL_NODE {
            let old = self.nodes.len();
            let mut new_capacity = (self.growth)(old);
            if new_capacity <= old {
                new_capacity = old + 1;
            }
            tracing::debug!(old, new_capacity, "growing spatial tree");
            self.extend_free_list(new_capacity);
        }
        let index = self.free_list;
        let node = &mut self.nodes[index];
        self.free_list = node.parent;
        node.parent = NULL_NODE;
        node.child1 = NULL_NODE;
        node.child2 = NULL_NODE;
        node.height = 0;
        node.item = None;
        self.node_count += 1;
        index
    }

    fn free_node(&mut self, index: usize) {
        self.nodes[index] = Node::free(self.free_list);
        self.free_list = index;
        self.node_count -= 1;
    }

    fn union_of(&self, a: usize, b: usize) -> Box2 {
        self.nodes[a].fat.union(&self.nodes[b].fat)
    }

    /// Area growth of placing `leaf_box` under `child`.
    fn descend_cost(&self, child: usize, leaf_box: &Box2) -> f32 {
        let node = &self.nodes[child];
        let merged = node.fat.union(leaf_box).area();
        if node.is_leaf() {
            merged
        } else {
            merged - node.fat.area()
        }
    }

    fn insert_leaf(&mut self, leaf: usize) {
        if self.root == NULL_NODE {
            self.root = leaf;
            self.nodes[leaf].parent = NULL_NODE;
            return;
        }

        // Greedy descent towards the cheapest sibling.
        let leaf_box = self.nodes[leaf].fat;
        let mut index = self.root;
        while !self.nodes[index].is_leaf() {
            let (c1, c2) = (self.nodes[index].child1, self.nodes[index].child2);
            let area = self.nodes[index].fat.area();
            let combined_area = self.nodes[index].fat.union(&leaf_box).area();

            let cost = 2.0 * combined_area;
            let inheritance = 2.0 * (combined_area - area);
            let cost1 = self.descend_cost(c1, &leaf_box) + inheritance;
            let cost2 = self.descend_cost(c2, &leaf_box) + inheritance;

            if cost < cost1 && cost < cost2 {
                break;
            }
            index = if cost1 < cost2 { c1 } else { c2 };
        }

        let sibling = index;
        let old_parent = self.nodes[sibling].parent;
        let new_parent = self.allocate_node();
        {
            let sibling_node = &self.nodes[sibling];
            let fat = leaf_box.union(&sibling_node.fat);
            let height = sibling_node.height + 1;
            let node = &mut self.nodes[new_parent];
            node.parent = old_parent;
            node.fat = fat;
            node.height = height;
            node.child1 = sibling;
            node.child2 = leaf;
        }
        if old_parent == NULL_NODE {
            self.root = new_parent;
        } else if self.nodes[old_parent].child1 == sibling {
            self.nodes[old_parent].child1 = new_parent;
        } else {
            self.nodes[old_parent].child2 = new_parent;
        }
        self.nodes[sibling].parent = new_parent;
        self.nodes[leaf].parent = new_parent;

        self.refit_ancestors(new_parent);
    }

    fn remove_leaf(&mut self, leaf: usize) {
        if leaf == self.root {
            self.root = NULL_NODE;
            return;
        }

        let parent = self.nodes[leaf].parent;
        let grand_parent = self.nodes[parent].parent;
        let sibling = if self.nodes[parent].child1 == leaf {
            self.nodes[parent].child2
        } else {
            self.nodes[parent].child1
        };

        if grand_parent == NULL_NODE {
            self.root = sibling;
            self.nodes[sibling].parent = NULL_NODE;
            self.free_node(parent);
            return;
        }

        if self.nodes[grand_parent].child1 == parent {
            self.nodes[grand_parent].child1 = sibling;
        } else {
            self.nodes[grand_parent].child2 = sibling;
        }
        self.nodes[sibling].parent = grand_parent;
        self.free_node(parent);

        self.refit_ancestors(grand_parent);
    }

    /// Walk to the root, rebalancing and refreshing heights and boxes.
    fn refit_ancestors(&mut self, mut index: usize) {
        while index != NULL_NODE {
            index = self.balance(index);
            let (c1, c2) = (self.nodes[index].child1, self.nodes[index].child2);
            self.nodes[index].height = 1 + self.nodes[c1].height.max(self.nodes[c2].height);
            self.nodes[index].fat = self.union_of(c1, c2);
            index = self.nodes[index].parent;
        }
    }

    /// Rotate the taller child of `a` up if the subtree is out of balance.
    /// Returns the index now at `a`'s position.
    fn balance(&mut self, a: usize) -> usize {
        if self.nodes[a].is_leaf() || self.nodes[a].height < 2 {
            return a;
        }
        let b = self.nodes[a].child1;
        let c = self.nodes[a].child2;
        let diff = self.nodes[c].height - self.nodes[b].height;

        if diff > 1 {
            self.rotate_right_up(a, b, c)
        } else if diff < -1 {
            self.rotate_left_up(a, b, c)
        } else {
            a
        }
    }

    fn replace_child(&mut self, parent: usize, old: usize, new: usize) {
        if parent == NULL_NODE {
            self.root = new;
        } else if self.nodes[parent].child1 == old {
            self.nodes[parent].child1 = new;
        } else {
            self.nodes[parent].child2 = new;
        }
    }

    /// `c` (right child of `a`) takes `a`'s place.
    fn rotate_right_up(&mut self, a: usize, b: usize, c: usize) -> usize {
        let f = self.nodes[c].child1;
        let g = self.nodes[c].child2;

        let a_parent = self.nodes[a].parent;
        self.nodes[c].child1 = a;
        self.nodes[c].parent = a_parent;
        self.nodes[a].parent = c;
        self.replace_child(a_parent, a, c);

        let (up, down) = if self.nodes[f].height > self.nodes[g].height {
            (f, g)
        } else {
            (g, f)
        };
        self.nodes[c].child2 = up;
        self.nodes[a].child2 = down;
        self.nodes[down].parent = a;

        self.nodes[a].fat = self.union_of(b, down);
        self.nodes[c].fat = self.union_of(a, up);
        self.nodes[a].height = 1 + self.nodes[b].height.max(self.nodes[down].height);
        self.nodes[c].height = 1 + self.nodes[a].height.max(self.nodes[up].height);
        c
    }

    /// `b` (left child of `a`) takes `a`'s place.
    fn rotate_left_up(&mut self, a: usize, b: usize, c: usize) -> usize {
        let d = self.nodes[b].child1;
        let e = self.nodes[b].child2;

        let a_parent = self.nodes[a].parent;
        self.nodes[b].child1 = a;
        self.nodes[b].parent = a_parent;
        self.nodes[a].parent = b;
        self.replace_child(a_parent, a, b);

        let (up, down) = if self.nodes[d].height > self.nodes[e].height {
            (d, e)
        } else {
            (e, d)
        };
        self.nodes[b].child2 = up;
        self.nodes[a].child1 = down;
        self.nodes[down].parent = a;

        self.nodes[a].fat = self.union_of(c, down);
        self.nodes[b].fat = self.union_of(a, up);
        self.nodes[a].height = 1 + self.nodes[c].height.max(self.nodes[down].height);
        self.nodes[b].height = 1 + self.nodes[a].height.max(self.nodes[up].height);
        b
    }
}

impl<T: Copy + Eq + Hash> Default for DynamicTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for DynamicTree<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicTree")
            .field("items", &self.proxies.len())
            .field("nodes", &self.node_count)
            .field("capacity", &self.nodes.len())
            .field("margin", &self.margin)
            .finish()
    }
}
