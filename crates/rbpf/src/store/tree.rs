//! Unbalanced binary search trees threaded through the [`Pool`].
//!
//! A tree is just an optional root index; every tree shares the pool's
//! nodes. Keys are unique within a tree.

use alloc::vec::Vec;

use super::pool::{NodeIdx, Pool};

enum Link {
    Root,
    Left(NodeIdx),
    Right(NodeIdx),
}

/// Find `key`, inserting a zero-valued node if it is missing.
///
/// Returns `None` only when the key is missing and the pool is exhausted.
pub(super) fn find_or_insert(pool: &mut Pool, root: &mut Option<NodeIdx>, key: u32) -> Option<NodeIdx> {
    let mut link = Link::Root;
    let mut cur = *root;

    while let Some(idx) = cur {
        let node = pool.node(idx);
        if key == node.key {
            return Some(idx);
        }
        if key < node.key {
            link = Link::Left(idx);
            cur = node.left;
        } else {
            link = Link::Right(idx);
            cur = node.right;
        }
    }

    let idx = pool.alloc(key)?;
    match link {
        Link::Root => *root = Some(idx),
        Link::Left(parent) => pool.node_mut(parent).left = Some(idx),
        Link::Right(parent) => pool.node_mut(parent).right = Some(idx),
    }
    Some(idx)
}

/// Return every node of a tree to the pool.
///
/// Left children are rotated up until the current node has none, then the
/// node is freed and the walk continues to its right. No recursion and no
/// auxiliary stack.
pub(super) fn release(pool: &mut Pool, root: &mut Option<NodeIdx>) -> usize {
    let mut freed = 0;
    let mut cur = root.take();

    while let Some(idx) = cur {
        match pool.node(idx).left {
            Some(left) => {
                let left_right = pool.node(left).right;
                pool.node_mut(idx).left = left_right;
                pool.node_mut(left).right = Some(idx);
                cur = Some(left);
            }
            None => {
                cur = pool.node(idx).right;
                pool.release(idx);
                freed += 1;
            }
        }
    }
    freed
}

/// Visit every entry in ascending key order.
pub(super) fn for_each(pool: &Pool, root: Option<NodeIdx>, mut f: impl FnMut(u32, u32)) {
    let mut stack = Vec::new();
    let mut cur = root;
    loop {
        while let Some(idx) = cur {
            stack.push(idx);
            cur = pool.node(idx).left;
        }
        let Some(idx) = stack.pop() else { break };
        let node = pool.node(idx);
        f(node.key, node.value);
        cur = node.right;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(pool: &Pool, root: Option<NodeIdx>) -> Vec<(u32, u32)> {
        let mut out = Vec::new();
        for_each(pool, root, |k, v| out.push((k, v)));
        out
    }

    #[test]
    fn insert_and_find() {
        let mut pool = Pool::new(8);
        let mut root = None;
        for key in [5, 2, 8, 1, 9, 3] {
            let idx = find_or_insert(&mut pool, &mut root, key).unwrap();
            pool.node_mut(idx).value = key * 10;
        }
        assert_eq!(pool.in_use(), 6);

        let again = find_or_insert(&mut pool, &mut root, 8).unwrap();
        assert_eq!(pool.node(again).value, 80);
        assert_eq!(pool.in_use(), 6);

        let keys: Vec<u32> = collect(&pool, root).into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, [1, 2, 3, 5, 8, 9]);
    }

    #[test]
    fn release_returns_everything() {
        let mut pool = Pool::new(64);
        let mut root = None;
        // Degenerate on both sides.
        for key in (0..20).chain((100..120).rev()) {
            find_or_insert(&mut pool, &mut root, key).unwrap();
        }
        assert_eq!(pool.in_use(), 40);
        assert_eq!(release(&mut pool, &mut root), 40);
        assert_eq!(root, None);
        assert_eq!(pool.in_use(), 0);

        // Every node is reusable.
        for key in 0..64 {
            find_or_insert(&mut pool, &mut root, key).unwrap();
        }
        assert_eq!(find_or_insert(&mut pool, &mut root, 1000), None);
    }

    #[test]
    fn trees_share_the_pool() {
        let mut pool = Pool::new(4);
        let mut a = None;
        let mut b = None;
        find_or_insert(&mut pool, &mut a, 1).unwrap();
        find_or_insert(&mut pool, &mut a, 2).unwrap();
        find_or_insert(&mut pool, &mut b, 1).unwrap();
        assert_eq!(pool.in_use(), 3);

        release(&mut pool, &mut a);
        assert_eq!(collect(&pool, b), [(1, 0)]);
        assert_eq!(pool.in_use(), 1);
    }
}
