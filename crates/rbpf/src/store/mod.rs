//! Key/Value Store
//!
//! Scripts keep state between runs in a fixed pool of nodes shared by one
//! global tree and one tree per VM instance:
//!
//! ```text
//!   KvStore
//!   ├── Pool: [node; capacity]   allocated once, free list via `left`
//!   ├── global root ──► BST of (u32 key, u32 value)
//!   └── LocalTree (one per Vm) ──► BST in the same pool
//! ```
//!
//! Fetching a missing key creates it with value 0, so fetch can fail with
//! [`StoreError::Exhausted`] just like store. All access goes through one
//! spin lock; no node is allocated after construction.

mod pool;
mod tree;

use alloc::vec::Vec;

use log::{trace, warn};
use spin::Mutex;
use thiserror::Error;

use self::pool::{NodeIdx, Pool};
use crate::profile::{ActiveProfile, PhysicalProfile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Every node in the pool is in use.
    #[error("key/value pool exhausted ({capacity} entries)")]
    Exhausted { capacity: usize },
}

/// The tree owned by one VM instance.
///
/// Created empty; its nodes are returned to the pool by
/// [`KvStore::release_local`]. A tree that outlives a [`KvStore::reset`]
/// reads as empty.
#[derive(Debug, Default)]
pub struct LocalTree {
    root: Option<NodeIdx>,
    generation: u32,
}

impl LocalTree {
    pub const fn new() -> Self {
        Self {
            root: None,
            generation: 0,
        }
    }
}

#[derive(Debug)]
struct Inner {
    pool: Pool,
    global: Option<NodeIdx>,
    generation: u32,
}

impl Inner {
    /// Root of a local tree, forgetting it if the pool was reset since.
    fn local_root<'t>(&self, local: &'t mut LocalTree) -> &'t mut Option<NodeIdx> {
        if local.generation != self.generation {
            local.root = None;
            local.generation = self.generation;
        }
        &mut local.root
    }

    fn exhausted(&self) -> StoreError {
        StoreError::Exhausted {
            capacity: self.pool.capacity(),
        }
    }
}

/// Fixed-capacity store shared by every VM of a runtime.
#[derive(Debug)]
pub struct KvStore {
    inner: Mutex<Inner>,
}

impl KvStore {
    /// Create a store with room for `capacity` entries across all trees.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                pool: Pool::new(capacity),
                global: None,
                generation: 0,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().pool.capacity()
    }

    /// Entries in use across all trees.
    pub fn in_use(&self) -> usize {
        self.inner.lock().pool.in_use()
    }

    pub fn available(&self) -> usize {
        let inner = self.inner.lock();
        inner.pool.capacity() - inner.pool.in_use()
    }

    pub fn store_global(&self, key: u32, value: u32) -> Result<(), StoreError> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let idx = tree::find_or_insert(&mut inner.pool, &mut inner.global, key)
            .ok_or_else(|| inner.exhausted())?;
        inner.pool.node_mut(idx).value = value;
        trace!("global[{:#x}] = {}", key, value);
        Ok(())
    }

    pub fn fetch_global(&self, key: u32) -> Result<u32, StoreError> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let idx = tree::find_or_insert(&mut inner.pool, &mut inner.global, key)
            .ok_or_else(|| inner.exhausted())?;
        Ok(inner.pool.node(idx).value)
    }

    pub fn store_local(&self, local: &mut LocalTree, key: u32, value: u32) -> Result<(), StoreError> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let root = inner.local_root(local);
        let idx = tree::find_or_insert(&mut inner.pool, root, key).ok_or_else(|| inner.exhausted())?;
        inner.pool.node_mut(idx).value = value;
        Ok(())
    }

    pub fn fetch_local(&self, local: &mut LocalTree, key: u32) -> Result<u32, StoreError> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let root = inner.local_root(local);
        let idx = tree::find_or_insert(&mut inner.pool, root, key).ok_or_else(|| inner.exhausted())?;
        Ok(inner.pool.node(idx).value)
    }

    /// Return every node of a local tree to the pool.
    pub fn release_local(&self, local: &mut LocalTree) -> usize {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let root = inner.local_root(local);
        let freed = tree::release(&mut inner.pool, root);
        if freed > 0 {
            trace!("released {} local entries", freed);
        }
        freed
    }

    /// Visit global entries in ascending key order.
    ///
    /// The store is locked for the duration; `f` must not call back into it.
    pub fn for_each_global(&self, f: impl FnMut(u32, u32)) {
        let inner = self.inner.lock();
        tree::for_each(&inner.pool, inner.global, f);
    }

    pub fn global_entries(&self) -> Vec<(u32, u32)> {
        let mut entries = Vec::new();
        self.for_each_global(|key, value| entries.push((key, value)));
        entries
    }

    /// Visit a local tree's entries in ascending key order.
    pub fn for_each_local(&self, local: &LocalTree, f: impl FnMut(u32, u32)) {
        let inner = self.inner.lock();
        if local.generation == inner.generation {
            tree::for_each(&inner.pool, local.root, f);
        }
    }

    /// Drop every entry of every tree.
    ///
    /// Local trees still held by VMs read as empty afterwards.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        if inner.pool.in_use() > 0 {
            warn!("resetting store with {} live entries", inner.pool.in_use());
        }
        inner.pool.rebuild_free_list();
        inner.global = None;
        inner.generation = inner.generation.wrapping_add(1);
    }
}

impl Default for KvStore {
    fn default() -> Self {
        Self::new(ActiveProfile::STORE_CAPACITY)
    }
}
