//! Request classification and endpoint correlation.

pub mod record;
pub mod walker;

pub use record::{ConfigurationOutcome, Phase, TransferKind, TransferRecord};
pub use walker::{DescriptorWalker, InterfaceRecord, Interfaces, PipeRecord, WalkError, WalkSummary};

use crate::hexdump;
use crate::model::{DeviceAddress, EndpointDescriptor, PipeHandle, UrbFunction};
use crate::registry::EndpointRegistry;
use crate::urb::{ByteCursor, Urb, UrbBody, UrbError};
use log::{debug, warn};
use std::borrow::Cow;

/// Classifies requests of one root hub and keeps its endpoint registry
/// current.
pub struct UrbAnalyzer<'r> {
    registry: &'r EndpointRegistry,
    device_address: DeviceAddress,
    dump_buffers: bool,
}

impl<'r> UrbAnalyzer<'r> {
    pub fn new(registry: &'r EndpointRegistry) -> Self {
        Self {
            registry,
            device_address: DeviceAddress::Unresolved,
            dump_buffers: false,
        }
    }

    /// Device address recorded for pipes registered from now on.
    ///
    /// Select-configuration requests do not identify the device by address,
    /// so without this every pipe is registered as unresolved.
    pub fn with_device_address(mut self, device_address: DeviceAddress) -> Self {
        self.device_address = device_address;
        self
    }

    /// Log setup packets and transfer buffers at trace level.
    pub fn with_buffer_dumps(mut self, enabled: bool) -> Self {
        self.dump_buffers = enabled;
        self
    }

    pub fn registry(&self) -> &'r EndpointRegistry {
        self.registry
    }

    /// Produce the record for one request observed in `phase`.
    ///
    /// Every request yields exactly one record. Select-configuration requests
    /// update the registry on the way back; transfers look their pipe up in it.
    pub fn analyze<'a>(&self, urb: &Urb<'a>, phase: Phase) -> TransferRecord<'a> {
        let header = &urb.header;
        let bare = |kind| TransferRecord::bare(phase, header.function, header.status, kind);

        match &urb.body {
            UrbBody::SelectConfiguration(select) => {
                if !phase.is_post() {
                    // Pipe handles are filled in by the host controller driver.
                    return bare(TransferKind::SelectConfiguration(ConfigurationOutcome::Pending));
                }
                debug!(
                    "SELECT_CONFIGURATION header len {} interfaces len {}",
                    header.length,
                    select.interfaces.len()
                );
                let walker = DescriptorWalker::new(self.registry, self.device_address);
                let outcome = match walker.walk(select.interfaces) {
                    Ok(summary) => ConfigurationOutcome::Registered(summary),
                    Err(err) => {
                        warn!("Ignoring malformed configuration: {}", err);
                        ConfigurationOutcome::Rejected(err)
                    }
                };
                bare(TransferKind::SelectConfiguration(outcome))
            }
            UrbBody::ControlTransfer(transfer) => {
                debug!("{} pipe {}", header.function, transfer.pipe);
                self.dump("Setup Packet", &transfer.setup.0);
                self.dump_opt("Transfer Buffer", transfer.buffer);
                TransferRecord {
                    pipe: Some(transfer.pipe),
                    endpoint: self.resolve(transfer.pipe),
                    buffer_length: Some(transfer.buffer_length),
                    buffer: transfer.buffer.map(Cow::Borrowed),
                    ..bare(TransferKind::Control {
                        setup: transfer.setup,
                        flags: transfer.flags,
                        timeout_ms: transfer.timeout_ms,
                    })
                }
            }
            UrbBody::BulkOrInterruptTransfer(transfer) => {
                debug!(
                    "BULK_OR_INTERRUPT_TRANSFER pipe {} flags {:#x} len {}",
                    transfer.pipe,
                    transfer.flags.bits(),
                    transfer.buffer_length
                );
                self.dump_opt("Transfer Buffer", transfer.buffer);
                TransferRecord {
                    pipe: Some(transfer.pipe),
                    endpoint: self.resolve(transfer.pipe),
                    buffer_length: Some(transfer.buffer_length),
                    buffer: transfer.buffer.map(Cow::Borrowed),
                    ..bare(TransferKind::BulkOrInterrupt {
                        flags: transfer.flags,
                    })
                }
            }
            UrbBody::IsochTransfer(transfer) => {
                debug!(
                    "ISOCH_TRANSFER pipe {} flags {:#x} packets {}",
                    transfer.pipe,
                    transfer.flags.bits(),
                    transfer.number_of_packets
                );
                TransferRecord {
                    pipe: Some(transfer.pipe),
                    endpoint: self.resolve(transfer.pipe),
                    buffer_length: Some(transfer.buffer_length),
                    ..bare(TransferKind::Isochronous {
                        flags: transfer.flags,
                        packet_count: transfer.number_of_packets,
                        start_frame: transfer.start_frame,
                        error_count: transfer.error_count,
                    })
                }
            }
            UrbBody::DescriptorRequest(request) => {
                debug!(
                    "{} type {} lang {:#06x} len {}",
                    request.kind, request.descriptor_type, request.language_id, request.buffer_length
                );
                self.dump_opt("Transfer Buffer", request.buffer);
                TransferRecord {
                    buffer_length: Some(request.buffer_length),
                    buffer: request.buffer.map(Cow::Borrowed),
                    ..bare(TransferKind::Descriptor {
                        request: request.kind,
                        descriptor_type: request.descriptor_type,
                        index: request.index,
                        language_id: request.language_id,
                    })
                }
            }
            UrbBody::Unknown(_) => {
                debug!("Unknown URB type {}", header.function);
                bare(TransferKind::Unknown {
                    function: header.function.code(),
                })
            }
        }
    }

    /// Produce the record for a raw request buffer.
    ///
    /// Unlike [`Urb::parse`] this never fails: bytes that do not fit the
    /// layout of their function code give a [`TransferKind::Malformed`]
    /// record. A buffer too short to carry a function code is recorded as
    /// `UNKNOWN(0xffff)`.
    pub fn analyze_raw<'a>(&self, raw: &'a [u8], phase: Phase) -> TransferRecord<'a> {
        match Urb::parse(raw) {
            Ok(urb) => self.analyze(&urb, phase),
            Err(error) => self.malformed(raw, phase, error),
        }
    }

    fn malformed(&self, raw: &[u8], phase: Phase, error: UrbError) -> TransferRecord<'static> {
        let mut cursor = ByteCursor::new(raw);
        let _length = cursor.u16();
        let code = cursor.u16().ok();
        let status = cursor.u32().unwrap_or(0);

        let function = code.map_or(UrbFunction::Unknown(u16::MAX), UrbFunction::from);
        warn!("Malformed {} request ({} bytes): {}", function, raw.len(), error);
        if self.dump_buffers {
            hexdump::log_buffer("Request", raw);
        }
        TransferRecord::bare(
            phase,
            function,
            status,
            TransferKind::Malformed {
                function: code,
                error,
            },
        )
    }

    /// Best-effort endpoint context. Null handles address the default
    /// control pipe, which is never registered.
    fn resolve(&self, pipe: PipeHandle) -> Option<EndpointDescriptor> {
        if pipe.is_null() {
            return None;
        }
        self.registry.lookup(pipe)
    }

    fn dump(&self, label: &str, bytes: &[u8]) {
        if self.dump_buffers {
            hexdump::log_buffer(label, bytes);
        }
    }

    fn dump_opt(&self, label: &str, bytes: Option<&[u8]>) {
        if let Some(bytes) = bytes {
            self.dump(label, bytes);
        }
    }
}

/// Analyze one request against a root hub's registry.
///
/// `post` is false while the request travels to the bus driver and true when
/// it returns.
pub fn analyze_urb<'a>(urb: &Urb<'a>, post: bool, registry: &EndpointRegistry) -> TransferRecord<'a> {
    UrbAnalyzer::new(registry).analyze(urb, Phase::from_post(post))
}

/// [`analyze_urb`] on unparsed bytes; always yields a record.
pub fn analyze_bytes<'a>(raw: &'a [u8], post: bool, registry: &EndpointRegistry) -> TransferRecord<'a> {
    UrbAnalyzer::new(registry).analyze_raw(raw, Phase::from_post(post))
}
