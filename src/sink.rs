//! Destinations for analyzed records.

use crate::analyzer::TransferRecord;
use log::debug;

/// Receives one record per analyzed request.
pub trait RecordSink {
    fn emit(&mut self, root_hub: u8, record: &TransferRecord<'_>);
}

/// Writes records to the log at debug level.
#[derive(Debug, Default)]
pub struct LogSink;

impl RecordSink for LogSink {
    fn emit(&mut self, root_hub: u8, record: &TransferRecord<'_>) {
        debug!("usb{} {}", root_hub, record);
    }
}

/// A record kept by [`CollectSink`].
#[derive(Debug, Clone)]
pub struct CollectedRecord {
    pub root_hub: u8,
    pub record: TransferRecord<'static>,
}

/// Keeps owned copies of every record.
#[derive(Debug)]
pub struct CollectSink {
    pub records: Vec<CollectedRecord>,
    max_capture_bytes: usize,
}

impl CollectSink {
    /// Buffers longer than `max_capture_bytes` are truncated when copied.
    pub fn new(max_capture_bytes: usize) -> Self {
        Self {
            records: Vec::new(),
            max_capture_bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordSink for CollectSink {
    fn emit(&mut self, root_hub: u8, record: &TransferRecord<'_>) {
        self.records.push(CollectedRecord {
            root_hub,
            record: record.clone().into_owned(self.max_capture_bytes),
        });
    }
}

/// Forwards every record to two sinks.
pub struct Tee<A, B>(pub A, pub B);

impl<A: RecordSink, B: RecordSink> RecordSink for Tee<A, B> {
    fn emit(&mut self, root_hub: u8, record: &TransferRecord<'_>) {
        self.0.emit(root_hub, record);
        self.1.emit(root_hub, record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{Phase, TransferKind};
    use crate::model::UrbFunction;
    use crate::urb::TransferFlags;
    use std::borrow::Cow;

    #[test]
    fn test_collect_truncates_buffers() {
        let data = vec![0x55u8; 100];
        let record = TransferRecord {
            buffer_length: Some(100),
            buffer: Some(Cow::Borrowed(&data[..])),
            ..TransferRecord::bare(
                Phase::Submit,
                UrbFunction::BulkOrInterruptTransfer,
                0,
                TransferKind::BulkOrInterrupt {
                    flags: TransferFlags::empty(),
                },
            )
        };

        let mut sink = Tee(CollectSink::new(16), LogSink);
        sink.emit(2, &record);
        let collected = &sink.0.records[0];
        assert_eq!(collected.root_hub, 2);
        assert_eq!(collected.record.buffer.as_deref().map(<[u8]>::len), Some(16));
        assert_eq!(collected.record.buffer_length, Some(100));
    }
}
