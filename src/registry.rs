//! Per-root-hub endpoint table keyed by pipe handle.

use crate::model::{EndpointDescriptor, PipeHandle};
use log::{debug, trace, warn};
use spin::Mutex;
use std::collections::HashMap;

/// Number of entries preallocated when no capacity is configured.
pub const DEFAULT_CAPACITY: usize = 64;

/// Endpoint descriptors of one root hub.
///
/// A single table-wide spin lock guards the map. Callers may run in contexts
/// that must not sleep, so critical sections only copy a descriptor in or out;
/// logging happens after the lock is released. The table is preallocated;
/// inserting a new pipe into a full table reallocates while the lock is held,
/// so `registry_capacity` should cover every pipe a root hub configures. Such
/// an insert is logged at `warn`.
#[derive(Debug)]
pub struct EndpointRegistry {
    table: Mutex<HashMap<PipeHandle, EndpointDescriptor>>,
}

impl Default for EndpointRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            table: Mutex::new(HashMap::with_capacity(capacity)),
        }
    }

    /// Descriptor currently registered for `pipe`, copied out of the table.
    ///
    /// A miss is a normal outcome: transfers on pipes configured before the
    /// analyzer attached are never registered.
    pub fn lookup(&self, pipe: PipeHandle) -> Option<EndpointDescriptor> {
        let found = self.table.lock().get(&pipe).copied();

        match &found {
            Some(endpoint) => trace!("Found endpoint info for pipe {}: {}", pipe, endpoint),
            None => debug!("Unable to find endpoint info for pipe {}", pipe),
        }
        found
    }

    /// Store `endpoint` under `pipe`, returning the descriptor it replaced.
    pub fn insert_or_replace(
        &self,
        pipe: PipeHandle,
        endpoint: EndpointDescriptor,
    ) -> Option<EndpointDescriptor> {
        let (previous, grown_from) = {
            let mut table = self.table.lock();
            let full = table.len() == table.capacity() && !table.contains_key(&pipe);
            let grown_from = full.then_some(table.capacity());
            (table.insert(pipe, endpoint), grown_from)
        };

        if let Some(capacity) = grown_from {
            warn!(
                "Endpoint table for pipe {} grew past its capacity of {}; raise registry_capacity",
                pipe, capacity
            );
        }
        if let Some(previous) = &previous
            && previous != &endpoint
        {
            debug!("Pipe {} reconfigured: {} -> {}", pipe, previous, endpoint);
        }
        previous
    }

    pub fn len(&self) -> usize {
        self.table.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries the table holds before the next new pipe reallocates it.
    pub fn capacity(&self) -> usize {
        self.table.lock().capacity()
    }

    /// Copy of all entries ordered by pipe handle, for display.
    pub fn snapshot(&self) -> Vec<EndpointDescriptor> {
        let mut entries: Vec<EndpointDescriptor> = self.table.lock().values().copied().collect();
        entries.sort_by_key(|endpoint| endpoint.pipe);
        entries
    }
}
