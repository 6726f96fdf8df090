//! Encoder producing request buffers in the layout read by [`Urb::parse`].
//!
//! Used by the replay trace format to turn structured events into requests,
//! and by tests.
//!
//! [`Urb::parse`]: super::Urb::parse

use super::TransferFlags;
use super::layout::*;
use crate::model::{
    DescriptorRequestKind, DescriptorType, PipeHandle, TransferType, function::code,
};
use thiserror::Error;

/// A request that cannot be expressed in the layout's length fields.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("{field} of {length} bytes does not fit a 16-bit length field")]
    LengthOverflow { field: &'static str, length: usize },
}

fn length_field(field: &'static str, length: usize) -> Result<u16, EncodeError> {
    u16::try_from(length).map_err(|_| EncodeError::LengthOverflow { field, length })
}

/// Placeholder written to pointer fields when a buffer is attached.
const BUFFER_POINTER: u64 = 0xFFFF_A000_0000_1000;
const CONFIGURATION_POINTER: u64 = 0xFFFF_A000_0000_2000;

/// One pipe record of a select-configuration request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipeSpec {
    pub handle: u64,
    pub endpoint_address: u8,
    pub transfer_type: TransferType,
    pub max_packet_size: u16,
    pub interval: u8,
}

impl PipeSpec {
    pub fn new(handle: u64, endpoint_address: u8, transfer_type: TransferType) -> Self {
        Self {
            handle,
            endpoint_address,
            transfer_type,
            max_packet_size: 64,
            interval: 0,
        }
    }
}

/// One interface record of a select-configuration request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InterfaceSpec {
    pub number: u8,
    pub alternate_setting: u8,
    pub class: u8,
    pub subclass: u8,
    pub protocol: u8,
    pub handle: u64,
    pub pipes: Vec<PipeSpec>,
    /// Overrides the record's declared length. Without it the length covers
    /// exactly the header and the pipes.
    pub declared_length: Option<u16>,
}

impl InterfaceSpec {
    pub fn new(pipes: Vec<PipeSpec>) -> Self {
        Self {
            pipes,
            ..Self::default()
        }
    }

    fn encoded_len(&self) -> usize {
        INTERFACE_HEADER_LEN + self.pipes.len() * PIPE_RECORD_LEN
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        let length = match self.declared_length {
            Some(length) => length,
            None => length_field("interface record", self.encoded_len())?,
        };
        out.extend_from_slice(&length.to_le_bytes());
        out.extend_from_slice(&[
            self.number,
            self.alternate_setting,
            self.class,
            self.subclass,
            self.protocol,
            0,
        ]);
        out.extend_from_slice(&self.handle.to_le_bytes());
        out.extend_from_slice(&(self.pipes.len() as u32).to_le_bytes());
        out.extend_from_slice(&[0; 4]);

        for pipe in &self.pipes {
            out.extend_from_slice(&pipe.max_packet_size.to_le_bytes());
            out.push(pipe.endpoint_address);
            out.push(pipe.interval);
            out.extend_from_slice(&pipe.transfer_type.pipe_type().to_le_bytes());
            out.extend_from_slice(&pipe.handle.to_le_bytes());
            out.extend_from_slice(&(pipe.max_packet_size as u32).to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes());
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum TransferKind {
    Control {
        setup: [u8; 8],
        timeout: Option<u32>,
    },
    Bulk,
    Isoch {
        start_frame: u32,
        packets: u32,
        error_count: u32,
    },
    Descriptor {
        kind: DescriptorRequestKind,
        descriptor_type: DescriptorType,
        index: u8,
        language_id: u16,
    },
}

/// Builder for transfer requests.
#[derive(Debug, Clone)]
pub struct UrbBuilder {
    kind: TransferKind,
    status: u32,
    device_handle: u64,
    pipe: PipeHandle,
    flags: TransferFlags,
    buffer: Option<Vec<u8>>,
    buffer_length: Option<u32>,
}

impl UrbBuilder {
    fn transfer(kind: TransferKind, pipe: PipeHandle) -> Self {
        Self {
            kind,
            status: 0,
            device_handle: 0,
            pipe,
            flags: TransferFlags::empty(),
            buffer: None,
            buffer_length: None,
        }
    }

    pub fn control(pipe: PipeHandle, setup: [u8; 8]) -> Self {
        Self::transfer(
            TransferKind::Control {
                setup,
                timeout: None,
            },
            pipe,
        )
    }

    pub fn bulk(pipe: PipeHandle) -> Self {
        Self::transfer(TransferKind::Bulk, pipe)
    }

    pub fn isoch(pipe: PipeHandle, packets: u32) -> Self {
        Self::transfer(
            TransferKind::Isoch {
                start_frame: 0,
                packets,
                error_count: 0,
            },
            pipe,
        )
    }

    pub fn descriptor(
        kind: DescriptorRequestKind,
        descriptor_type: DescriptorType,
        index: u8,
        language_id: u16,
    ) -> Self {
        Self::transfer(
            TransferKind::Descriptor {
                kind,
                descriptor_type,
                index,
                language_id,
            },
            PipeHandle(0),
        )
    }

    pub fn status(mut self, status: u32) -> Self {
        self.status = status;
        self
    }

    pub fn device_handle(mut self, handle: u64) -> Self {
        self.device_handle = handle;
        self
    }

    pub fn flags(mut self, flags: TransferFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Attach buffer contents; the pointer field becomes non-null.
    pub fn buffer(mut self, data: &[u8]) -> Self {
        self.buffer = Some(data.to_vec());
        self
    }

    /// Override the length field (for example, with a null buffer).
    pub fn buffer_length(mut self, length: u32) -> Self {
        self.buffer_length = Some(length);
        self
    }

    /// Switch a control transfer to the extended form. Ignored otherwise.
    pub fn timeout(mut self, timeout_ms: u32) -> Self {
        if let TransferKind::Control { timeout, .. } = &mut self.kind {
            *timeout = Some(timeout_ms);
        }
        self
    }

    /// Set isochronous start frame and error count. Ignored otherwise.
    pub fn frames(mut self, start: u32, errors: u32) -> Self {
        if let TransferKind::Isoch {
            start_frame,
            error_count,
            ..
        } = &mut self.kind
        {
            *start_frame = start;
            *error_count = errors;
        }
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let (function, fixed_len) = match &self.kind {
            TransferKind::Control { timeout: None, .. } => (code::CONTROL_TRANSFER, CONTROL_DATA),
            TransferKind::Control { .. } => (code::CONTROL_TRANSFER_EX, CONTROL_EX_DATA),
            TransferKind::Bulk => (code::BULK_OR_INTERRUPT_TRANSFER, BULK_DATA),
            TransferKind::Isoch { .. } => (code::ISOCH_TRANSFER, ISOCH_FIXED_END),
            TransferKind::Descriptor { kind, .. } => (kind.function(), DESCRIPTOR_DATA),
        };

        let data = self.buffer.as_deref().unwrap_or_default();
        let mut out = Vec::with_capacity(fixed_len + data.len());
        push_header(&mut out, fixed_len as u16, function, self.status, self.device_handle);

        let buffer_length = self.buffer_length.unwrap_or(data.len() as u32);
        let pointer = if self.buffer.is_some() { BUFFER_POINTER } else { 0 };
        out.extend_from_slice(&self.pipe.0.to_le_bytes());
        out.extend_from_slice(&self.flags.bits().to_le_bytes());
        out.extend_from_slice(&buffer_length.to_le_bytes());
        out.extend_from_slice(&pointer.to_le_bytes());
        out.extend_from_slice(&0u64.to_le_bytes());

        match &self.kind {
            TransferKind::Control {
                setup,
                timeout: None,
            } => out.extend_from_slice(setup),
            TransferKind::Control {
                setup,
                timeout: Some(timeout),
            } => {
                out.extend_from_slice(&timeout.to_le_bytes());
                out.extend_from_slice(&[0; 4]);
                out.extend_from_slice(setup);
            }
            TransferKind::Bulk => {}
            TransferKind::Isoch {
                start_frame,
                packets,
                error_count,
            } => {
                out.extend_from_slice(&start_frame.to_le_bytes());
                out.extend_from_slice(&packets.to_le_bytes());
                out.extend_from_slice(&error_count.to_le_bytes());
                out.extend_from_slice(&[0; 4]);
            }
            TransferKind::Descriptor {
                descriptor_type,
                index,
                language_id,
                ..
            } => {
                out.push(*index);
                out.push(descriptor_type.raw());
                out.extend_from_slice(&language_id.to_le_bytes());
                out.extend_from_slice(&[0; 4]);
            }
        }

        debug_assert_eq!(out.len(), fixed_len);
        out.extend_from_slice(data);
        out
    }

    /// Select-configuration request carrying the given interfaces.
    pub fn select_configuration(interfaces: &[InterfaceSpec]) -> Result<Vec<u8>, EncodeError> {
        let body_len: usize = interfaces.iter().map(InterfaceSpec::encoded_len).sum();
        let total = SELECT_CONFIGURATION_INTERFACES + body_len;
        let length = length_field("select configuration", total)?;
        let mut out = Vec::with_capacity(total);
        push_header(&mut out, length, code::SELECT_CONFIGURATION, 0, 0);

        let descriptor = if interfaces.is_empty() {
            0
        } else {
            CONFIGURATION_POINTER
        };
        out.extend_from_slice(&descriptor.to_le_bytes());
        out.extend_from_slice(&0u64.to_le_bytes());
        for interface in interfaces {
            interface.encode(&mut out)?;
        }
        Ok(out)
    }

    /// Request with an arbitrary function code and body.
    pub fn unknown(function: u16, body: &[u8]) -> Result<Vec<u8>, EncodeError> {
        let length = length_field("request", HEADER_LEN + body.len())?;
        let mut out = Vec::with_capacity(HEADER_LEN + body.len());
        push_header(&mut out, length, function, 0, 0);
        out.extend_from_slice(body);
        Ok(out)
    }
}

fn push_header(out: &mut Vec<u8>, length: u16, function: u16, status: u32, device_handle: u64) {
    out.extend_from_slice(&length.to_le_bytes());
    out.extend_from_slice(&function.to_le_bytes());
    out.extend_from_slice(&status.to_le_bytes());
    out.extend_from_slice(&device_handle.to_le_bytes());
}
