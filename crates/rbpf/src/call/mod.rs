//! Host Call Dispatch
//!
//! A program reaches the host only through `call imm`. The immediate is looked
//! up in a [`CallTable`], the one list of recognized IDs: the verifier rejects
//! any ID without a bound handler, and the engine dispatches through the same
//! table, so the two can never disagree.
//!
//! Handlers are plain function pointers. They receive a [`CallContext`] for
//! the running VM (its checked address space and key/value trees) and the
//! five argument registers r1-r5, and return the value placed in r0.

mod builtins;

use core::fmt;

use rbpf_abi::{CallId, RegionFlags};

use crate::memory::{AccessDenied, MemoryMap};
use crate::store::{KvStore, LocalTree};

pub use builtins::{PRINTF_MAX_LEN, fetch_global, fetch_local, memcpy, printf, store_global, store_local};

/// Value a handler returns to signal failure, `-1` in r0.
pub const CALL_FAILED: u64 = -1i64 as u64;

/// A host function callable from a program.
pub type HostFn = fn(&mut CallContext<'_, '_>, [u64; 5]) -> u64;

/// What a host function can see of the VM that called it.
pub struct CallContext<'c, 'm> {
    memory: &'c mut MemoryMap<'m>,
    store: &'c KvStore,
    local: &'c mut LocalTree,
}

impl<'c, 'm> CallContext<'c, 'm> {
    pub fn new(memory: &'c mut MemoryMap<'m>, store: &'c KvStore, local: &'c mut LocalTree) -> Self {
        Self {
            memory,
            store,
            local,
        }
    }

    /// The caller's address space. Every access is region-checked.
    pub fn memory(&self) -> &MemoryMap<'m> {
        &*self.memory
    }

    pub fn memory_mut(&mut self) -> &mut MemoryMap<'m> {
        &mut *self.memory
    }

    pub fn store(&self) -> &KvStore {
        self.store
    }

    /// The shared store together with the caller's own tree.
    pub fn store_and_local(&mut self) -> (&KvStore, &mut LocalTree) {
        (self.store, &mut *self.local)
    }

    /// Write a 32-bit value to a writable address in host byte order.
    pub fn write_u32(&mut self, addr: u64, value: u32) -> Result<(), AccessDenied> {
        self.memory.write_bytes(addr, &value.to_ne_bytes())
    }

    /// Check that `len` bytes at `addr` may be written, without writing.
    pub fn check_writable(&self, addr: u64, len: usize) -> Result<(), AccessDenied> {
        self.memory.check(addr, len, RegionFlags::WRITE)
    }
}

/// Mapping from call ID to host function.
#[derive(Clone, Copy)]
pub struct CallTable {
    handlers: [Option<HostFn>; CallId::COUNT],
}

impl CallTable {
    /// A table with nothing bound; every call fails preflight.
    pub const fn empty() -> Self {
        Self {
            handlers: [None; CallId::COUNT],
        }
    }

    /// A table with the library built-ins bound: the stdlib and
    /// key/value blocks.
    pub fn with_builtins() -> Self {
        let mut table = Self::empty();
        table
            .bind(CallId::Printf, printf)
            .bind(CallId::Memcpy, memcpy)
            .bind(CallId::StoreLocal, store_local)
            .bind(CallId::StoreGlobal, store_global)
            .bind(CallId::FetchLocal, fetch_local)
            .bind(CallId::FetchGlobal, fetch_global);
        table
    }

    /// Bind a handler, replacing any previous one.
    pub fn bind(&mut self, id: CallId, handler: HostFn) -> &mut Self {
        self.handlers[id.index()] = Some(handler);
        self
    }

    pub fn unbind(&mut self, id: CallId) -> Option<HostFn> {
        self.handlers[id.index()].take()
    }

    pub fn is_bound(&self, id: CallId) -> bool {
        self.handlers[id.index()].is_some()
    }

    /// Handler for a raw call immediate, if one is bound.
    #[inline]
    pub fn lookup(&self, raw: i32) -> Option<HostFn> {
        let id = CallId::from_raw(u32::try_from(raw).ok()?)?;
        self.handlers[id.index()]
    }

    /// Whether a program may call `raw`.
    pub fn is_recognized(&self, raw: i32) -> bool {
        self.lookup(raw).is_some()
    }

    /// IDs with a bound handler, in ID order.
    pub fn bound(&self) -> impl Iterator<Item = CallId> + '_ {
        CallId::ALL.into_iter().filter(|&id| self.is_bound(id))
    }
}

impl Default for CallTable {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for CallTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.bound()).finish()
    }
}
