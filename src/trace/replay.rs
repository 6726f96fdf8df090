use super::{Trace, TraceError};
use crate::roothub::RootHubs;
use crate::sink::RecordSink;
use crate::urb::Urb;
use log::{debug, info};

/// Counters from one replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub events: usize,
    pub records: usize,
    pub malformed: usize,
}

/// Feeds trace events through the root hub registries.
pub struct Replay<'t> {
    trace: &'t Trace,
    strict: bool,
}

impl<'t> Replay<'t> {
    pub fn new(trace: &'t Trace) -> Self {
        Self {
            trace,
            strict: false,
        }
    }

    /// Stop at the first event that does not parse instead of recording it
    /// as malformed.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn run(&self, hubs: &mut RootHubs, sink: &mut dyn RecordSink) -> Result<ReplayStats, TraceError> {
        let mut stats = ReplayStats::default();

        for (index, event) in self.trace.events.iter().enumerate() {
            stats.events += 1;
            let raw = event.urb.encode()?;
            match Urb::parse(&raw) {
                Ok(urb) => hubs.observe(event.root_hub, &urb, event.phase.into(), sink),
                Err(source) if self.strict => return Err(TraceError::Urb { index, source }),
                Err(_) => {
                    debug!("Event {} does not parse", index);
                    stats.malformed += 1;
                    hubs.observe_raw(event.root_hub, &raw, event.phase.into(), sink);
                }
            }
            stats.records += 1;
        }

        info!(
            "Replayed {} events: {} records, {} malformed",
            stats.events, stats.records, stats.malformed
        );
        Ok(stats)
    }
}
