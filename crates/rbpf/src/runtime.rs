use rbpf_abi::CallId;

use crate::call::{CallTable, HostFn};
use crate::profile::{ActiveProfile, PhysicalProfile};
use crate::store::KvStore;

/// State shared by every VM of one host: the key/value store and the call
/// table.
///
/// Bind host calls before creating VMs; a VM borrows the runtime for its
/// whole life, so the table cannot change under a verified program.
#[derive(Debug)]
pub struct Runtime {
    store: KvStore,
    calls: CallTable,
}

impl Runtime {
    /// A runtime with the built-in calls bound and a store of the profile's
    /// default capacity.
    pub fn new() -> Self {
        Self::with_capacity(ActiveProfile::STORE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            store: KvStore::new(capacity),
            calls: CallTable::with_builtins(),
        }
    }

    /// Bind an additional host call.
    pub fn with_call(mut self, id: CallId, handler: HostFn) -> Self {
        self.calls.bind(id, handler);
        self
    }

    pub fn calls(&self) -> &CallTable {
        &self.calls
    }

    pub fn calls_mut(&mut self) -> &mut CallTable {
        &mut self.calls
    }

    pub fn store(&self) -> &KvStore {
        &self.store
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}
