//! Node arena with an intrusive free list.

use alloc::vec::Vec;

/// Index of a node in the arena.
pub(super) type NodeIdx = u32;

#[derive(Debug, Clone, Copy, Default)]
pub(super) struct Node {
    pub key: u32,
    pub value: u32,
    /// Left child while in a tree, next free node while on the free list.
    pub left: Option<NodeIdx>,
    pub right: Option<NodeIdx>,
}

/// Every node the store will ever hand out, allocated once.
#[derive(Debug)]
pub(super) struct Pool {
    nodes: Vec<Node>,
    free: Option<NodeIdx>,
    in_use: usize,
}

impl Pool {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.min(NodeIdx::MAX as usize);
        let mut nodes = Vec::with_capacity(capacity);
        nodes.resize(capacity, Node::default());
        let mut pool = Self {
            nodes,
            free: None,
            in_use: 0,
        };
        pool.rebuild_free_list();
        pool
    }

    /// Put every node back on the free list.
    pub fn rebuild_free_list(&mut self) {
        let count = self.nodes.len();
        for (idx, node) in self.nodes.iter_mut().enumerate() {
            let next = idx + 1;
            *node = Node {
                left: (next < count).then_some(next as NodeIdx),
                ..Node::default()
            };
        }
        self.free = (count > 0).then_some(0);
        self.in_use = 0;
    }

    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    pub fn in_use(&self) -> usize {
        self.in_use
    }

    /// Take a node off the free list.
    pub fn alloc(&mut self, key: u32) -> Option<NodeIdx> {
        let idx = self.free?;
        let node = &mut self.nodes[idx as usize];
        self.free = node.left;
        *node = Node {
            key,
            ..Node::default()
        };
        self.in_use += 1;
        Some(idx)
    }

    pub fn release(&mut self, idx: NodeIdx) {
        self.nodes[idx as usize] = Node {
            left: self.free,
            ..Node::default()
        };
        self.free = Some(idx);
        self.in_use -= 1;
    }

    pub fn node(&self, idx: NodeIdx) -> &Node {
        &self.nodes[idx as usize]
    }

    pub fn node_mut(&mut self, idx: NodeIdx) -> &mut Node {
        &mut self.nodes[idx as usize]
    }
}
