//! Root hubs and their independent endpoint registries.

use crate::analyzer::{Phase, UrbAnalyzer};
use crate::registry::{DEFAULT_CAPACITY, EndpointRegistry};
use crate::sink::RecordSink;
use crate::urb::Urb;
use log::info;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Registries of all attached root hubs, by root hub number.
///
/// Pipe handles are only unique under one root hub, so each gets its own
/// table.
#[derive(Debug)]
pub struct RootHubs {
    hubs: BTreeMap<u8, Arc<EndpointRegistry>>,
    capacity: usize,
    dump_buffers: bool,
}

impl Default for RootHubs {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl RootHubs {
    /// `capacity` is the number of endpoints preallocated per root hub.
    pub fn new(capacity: usize) -> Self {
        Self {
            hubs: BTreeMap::new(),
            capacity,
            dump_buffers: false,
        }
    }

    pub fn with_buffer_dumps(mut self, enabled: bool) -> Self {
        self.dump_buffers = enabled;
        self
    }

    /// Registry of `root_hub`, created on first attach.
    pub fn attach(&mut self, root_hub: u8) -> Arc<EndpointRegistry> {
        let capacity = self.capacity;
        self.hubs
            .entry(root_hub)
            .or_insert_with(|| {
                info!("Attached root hub usb{}", root_hub);
                Arc::new(EndpointRegistry::with_capacity(capacity))
            })
            .clone()
    }

    /// Drop a root hub's registry. Returns false if it was not attached.
    pub fn detach(&mut self, root_hub: u8) -> bool {
        let removed = self.hubs.remove(&root_hub).is_some();
        if removed {
            info!("Detached root hub usb{}", root_hub);
        }
        removed
    }

    pub fn get(&self, root_hub: u8) -> Option<&Arc<EndpointRegistry>> {
        self.hubs.get(&root_hub)
    }

    /// Attached root hubs in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, &Arc<EndpointRegistry>)> {
        self.hubs.iter().map(|(id, registry)| (*id, registry))
    }

    pub fn len(&self) -> usize {
        self.hubs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hubs.is_empty()
    }

    /// Analyze a request seen on `root_hub` and pass the record to `sink`.
    pub fn observe(&mut self, root_hub: u8, urb: &Urb<'_>, phase: Phase, sink: &mut dyn RecordSink) {
        let registry = self.attach(root_hub);
        let record = UrbAnalyzer::new(&registry)
            .with_buffer_dumps(self.dump_buffers)
            .analyze(urb, phase);
        sink.emit(root_hub, &record);
    }

    /// Like [`RootHubs::observe`] for unparsed bytes. Bytes that do not parse
    /// still produce a (malformed) record.
    pub fn observe_raw(&mut self, root_hub: u8, raw: &[u8], phase: Phase, sink: &mut dyn RecordSink) {
        let registry = self.attach(root_hub);
        let record = UrbAnalyzer::new(&registry)
            .with_buffer_dumps(self.dump_buffers)
            .analyze_raw(raw, phase);
        sink.emit(root_hub, &record);
    }
}
