//! A Fibonacci heap over dense item ids with `f64` keys.
//!
//! Nodes live in an arena indexed by item id, one slot per id, allocated once
//! at construction. Child lists are circular doubly-linked lists expressed as
//! indices (a lone node links to itself). Roots are not kept in a list:
//! `trees[r]` holds the single root of rank `r` and `sum_tree` has bit `r` set
//! while that slot is occupied. Melding a tree into the root table links
//! equal-rank roots pairwise, carrying like binary addition, so after every
//! operation at most one root of each rank exists.
//!
//! Equal keys are ordered by item id (lowest first). Operations that name an
//! id outside the capacity, an id that is not in the heap, or a key increase
//! are ignored; they report it through their return value and a `debug`
//! event instead of an error.
//!
//! ```rust
//! use sgobject::FibonacciHeap;
//!
//! let mut heap = FibonacciHeap::new(3);
//! heap.insert(0, 5.0);
//! heap.insert(1, 2.0);
//! heap.insert(2, 8.0);
//! assert_eq!(heap.delete_min(), Some(1));
//! heap.decrease_key(2, 1.0);
//! assert_eq!(heap.delete_min(), Some(2));
//! assert_eq!(heap.delete_min(), Some(0));
//! assert_eq!(heap.delete_min(), None);
//! ```

use std::cmp::Ordering;

use tracing::debug;

const MAX_RANK: usize = 64;

#[derive(Debug, Clone)]
struct Node {
    key: f64,
    parent: Option<usize>,
    child: Option<usize>,
    left: usize,
    right: usize,
    rank: usize,
    marked: bool,
    in_heap: bool,
}

impl Node {
    fn vacant(id: usize) -> Self {
        Self {
            key: 0.0,
            parent: None,
            child: None,
            left: id,
            right: id,
            rank: 0,
            marked: false,
            in_heap: false,
        }
    }
}

/// A fixed-capacity Fibonacci heap.
#[derive(Debug, Clone)]
pub struct FibonacciHeap {
    nodes: Vec<Node>,
    trees: [Option<usize>; MAX_RANK],
    sum_tree: u64,
    num_items: usize,
}

impl FibonacciHeap {
    /// Creates a heap accepting item ids `0..capacity`.
    pub fn new(capacity: usize) -> Self {
        Self {
            nodes: (0..capacity).map(Node::vacant).collect(),
            trees: [None; MAX_RANK],
            sum_tree: 0,
            num_items: 0,
        }
    }

    /// Number of ids the heap can hold.
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    /// Number of items currently in the heap.
    pub fn len(&self) -> usize {
        self.num_items
    }

    /// True when the heap holds no items.
    pub fn is_empty(&self) -> bool {
        self.num_items == 0
    }

    /// True when `item` is currently in the heap.
    pub fn contains(&self, item: usize) -> bool {
        self.nodes.get(item).is_some_and(|n| n.in_heap)
    }

    /// Current key of `item`.
    pub fn get_key(&self, item: usize) -> Option<f64> {
        self.nodes.get(item).filter(|n| n.in_heap).map(|n| n.key)
    }

    /// Removes every item.
    pub fn clear(&mut self) {
        for (id, node) in self.nodes.iter_mut().enumerate() {
            *node = Node::vacant(id);
        }
        self.trees = [None; MAX_RANK];
        self.sum_tree = 0;
        self.num_items = 0;
    }

    /// Inserts `item` with `key`.
    ///
    /// Returns false (and changes nothing) when `item` is out of range or
    /// already in the heap.
    pub fn insert(&mut self, item: usize, key: f64) -> bool {
        let Some(node) = self.nodes.get_mut(item) else {
            debug!(item, capacity = self.capacity(), "heap insert ignored: id out of range");
            return false;
        };
        if node.in_heap {
            debug!(item, "heap insert ignored: id already present");
            return false;
        }
        *node = Node {
            key,
            in_heap: true,
            ..Node::vacant(item)
        };
        self.num_items += 1;
        self.meld(item);
        true
    }

    /// Removes the item with the smallest key and returns its id.
    pub fn delete_min(&mut self) -> Option<usize> {
        self.extract_min().map(|(item, _)| item)
    }

    /// Removes the item with the smallest key and returns its id and key.
    pub fn extract_min(&mut self) -> Option<(usize, f64)> {
        if self.num_items == 0 {
            return None;
        }
        let highest = (u64::BITS - 1 - self.sum_tree.leading_zeros()) as usize;
        let mut min: Option<usize> = None;
        for root in self.trees[..=highest].iter().flatten().copied() {
            if min.map_or(true, |m| self.less(root, m)) {
                min = Some(root);
            }
        }
        let min = min?;
        self.detach_root(min);

        if let Some(child) = self.nodes[min].child.take() {
            self.meld(child);
        }
        let key = self.nodes[min].key;
        self.nodes[min] = Node::vacant(min);
        self.num_items -= 1;
        Some((min, key))
    }

    /// Lowers the key of `item` to `new_key`.
    ///
    /// Returns false (and changes nothing) when `item` is not in the heap or
    /// `new_key` is larger than the current key.
    pub fn decrease_key(&mut self, item: usize, new_key: f64) -> bool {
        if !self.contains(item) {
            debug!(item, "heap decrease_key ignored: id not in heap");
            return false;
        }
        if new_key.total_cmp(&self.nodes[item].key) == Ordering::Greater {
            debug!(item, new_key, "heap decrease_key ignored: key would increase");
            return false;
        }
        self.nodes[item].key = new_key;

        let Some(mut parent) = self.nodes[item].parent else {
            return true;
        };
        if !self.less(item, parent) {
            return true;
        }

        let mut cut = vec![item];
        let mut node = item;
        loop {
            if self.nodes[parent].parent.is_none() {
                // The root loses a child, so it moves to a lower rank slot.
                self.detach_root(parent);
                self.cut(node, parent);
                cut.push(parent);
                break;
            }
            self.cut(node, parent);
            if !self.nodes[parent].marked {
                self.nodes[parent].marked = true;
                break;
            }
            node = parent;
            match self.nodes[parent].parent {
                Some(p) => parent = p,
                None => break,
            }
            cut.push(node);
        }
        for root in cut {
            self.meld(root);
        }
        true
    }

    fn less(&self, a: usize, b: usize) -> bool {
        match self.nodes[a].key.total_cmp(&self.nodes[b].key) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => a < b,
        }
    }

    fn detach_root(&mut self, root: usize) {
        let rank = self.nodes[root].rank;
        if self.trees[rank] == Some(root) {
            self.trees[rank] = None;
            self.sum_tree &= !(1u64 << rank);
        }
    }

    /// Unlinks `node` from the child list of `parent` and makes it a lone tree.
    fn cut(&mut self, node: usize, parent: usize) {
        let (left, right) = (self.nodes[node].left, self.nodes[node].right);
        if right == node {
            self.nodes[parent].child = None;
        } else {
            self.nodes[left].right = right;
            self.nodes[right].left = left;
            if self.nodes[parent].child == Some(node) {
                self.nodes[parent].child = Some(right);
            }
        }
        self.nodes[parent].rank -= 1;
        let n = &mut self.nodes[node];
        n.left = node;
        n.right = node;
        n.parent = None;
        n.marked = false;
    }

    /// Makes the larger of two equal-rank roots a child of the smaller one.
    fn link(&mut self, a: usize, b: usize) -> usize {
        let (parent, child) = if self.less(a, b) { (a, b) } else { (b, a) };
        match self.nodes[parent].child {
            None => {
                self.nodes[child].left = child;
                self.nodes[child].right = child;
            }
            Some(first) => {
                let last = self.nodes[first].left;
                self.nodes[child].left = last;
                self.nodes[child].right = first;
                self.nodes[last].right = child;
                self.nodes[first].left = child;
            }
        }
        self.nodes[parent].child = Some(child);
        self.nodes[child].parent = Some(parent);
        self.nodes[child].marked = false;
        self.nodes[parent].rank += 1;
        parent
    }

    /// Adds every tree of the circular list starting at `list` to the root
    /// table, linking equal ranks until each rank holds one root.
    fn meld(&mut self, list: usize) {
        let mut current = list;
        loop {
            let next = self.nodes[current].right;
            let n = &mut self.nodes[current];
            n.left = current;
            n.right = current;
            n.parent = None;
            n.marked = false;

            let mut root = current;
            loop {
                let rank = self.nodes[root].rank;
                match self.trees[rank].take() {
                    Some(other) => {
                        self.sum_tree &= !(1u64 << rank);
                        root = self.link(root, other);
                    }
                    None => {
                        self.trees[rank] = Some(root);
                        self.sum_tree |= 1u64 << rank;
                        break;
                    }
                }
            }

            if next == list {
                break;
            }
            current = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(heap: &mut FibonacciHeap) -> Vec<usize> {
        std::iter::from_fn(|| heap.delete_min()).collect()
    }

    #[test]
    fn documented_scenario() {
        let mut heap = FibonacciHeap::new(3);
        assert!(heap.insert(0, 5.0));
        assert!(heap.insert(1, 2.0));
        assert!(heap.insert(2, 8.0));
        assert_eq!(heap.delete_min(), Some(1));
        assert!(heap.decrease_key(2, 1.0));
        assert_eq!(heap.delete_min(), Some(2));
        assert_eq!(heap.delete_min(), Some(0));
        assert!(heap.is_empty());
    }

    #[test]
    fn ties_go_to_lowest_id() {
        let mut heap = FibonacciHeap::new(4);
        for id in [3, 1, 2, 0] {
            heap.insert(id, 1.0);
        }
        assert_eq!(drain(&mut heap), vec![0, 1, 2, 3]);
    }

    #[test]
    fn misuse_is_ignored() {
        let mut heap = FibonacciHeap::new(2);
        assert!(!heap.insert(2, 1.0));
        assert!(heap.insert(0, 1.0));
        assert!(!heap.insert(0, 0.5));
        assert!(!heap.decrease_key(1, 0.0));
        assert!(!heap.decrease_key(0, 3.0));
        assert_eq!(heap.get_key(0), Some(1.0));
        assert_eq!(heap.len(), 1);
    }

    #[test]
    fn cascading_cuts_keep_order() {
        let mut heap = FibonacciHeap::new(32);
        for id in 0..32 {
            heap.insert(id, 100.0 + id as f64);
        }
        // Build deep trees, then cut from the bottom repeatedly.
        assert_eq!(heap.delete_min(), Some(0));
        for id in (16..32).rev() {
            assert!(heap.decrease_key(id, id as f64 - 40.0));
        }
        let order = drain(&mut heap);
        let mut expected: Vec<usize> = (16..32).collect();
        expected.extend(1..16);
        assert_eq!(order, expected);
    }

    #[test]
    fn reinsert_after_removal() {
        let mut heap = FibonacciHeap::new(1);
        heap.insert(0, 1.0);
        assert_eq!(heap.extract_min(), Some((0, 1.0)));
        assert!(!heap.contains(0));
        assert!(heap.insert(0, 2.0));
        heap.clear();
        assert_eq!(heap.delete_min(), None);
    }
}
