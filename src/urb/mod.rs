//! USB request blocks: typed views over raw request buffers.

pub mod builder;
pub mod cursor;
pub mod layout;
mod parser;

pub use builder::{EncodeError, InterfaceSpec, PipeSpec, UrbBuilder};
pub use cursor::ByteCursor;

use crate::model::{DescriptorRequestKind, DescriptorType, Direction, PipeHandle, UrbFunction};
use bitflags::bitflags;
use std::fmt;
use thiserror::Error;

/// Errors that can occur while parsing a request buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrbError {
    #[error("truncated at offset {offset}: need {needed} bytes, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("{function}: declared length {declared} is {reason}")]
    BadLength {
        function: UrbFunction,
        declared: u16,
        reason: &'static str,
    },
}

bitflags! {
    /// `TransferFlags` field of transfer requests.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TransferFlags: u32 {
        const DIRECTION_IN = 0x0000_0001;
        const SHORT_TRANSFER_OK = 0x0000_0002;
        const START_ISO_TRANSFER_ASAP = 0x0000_0004;
    }
}

impl TransferFlags {
    pub fn direction(&self) -> Direction {
        if self.contains(Self::DIRECTION_IN) {
            Direction::In
        } else {
            Direction::Out
        }
    }
}

/// The 8-byte control setup packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SetupPacket(pub [u8; 8]);

impl SetupPacket {
    pub fn request_type(&self) -> u8 {
        self.0[0]
    }

    pub fn request(&self) -> u8 {
        self.0[1]
    }

    pub fn value(&self) -> u16 {
        u16::from_le_bytes([self.0[2], self.0[3]])
    }

    pub fn index(&self) -> u16 {
        u16::from_le_bytes([self.0[4], self.0[5]])
    }

    pub fn length(&self) -> u16 {
        u16::from_le_bytes([self.0[6], self.0[7]])
    }

    /// Data stage direction from bit 7 of bmRequestType.
    pub fn direction(&self) -> Direction {
        Direction::from_endpoint_address(self.request_type())
    }
}

impl fmt::Display for SetupPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bmRequestType={:#04x} bRequest={:#04x} wValue={:#06x} wIndex={:#06x} wLength={}",
            self.request_type(),
            self.request(),
            self.value(),
            self.index(),
            self.length()
        )
    }
}

/// Common request header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UrbHeader {
    pub length: u16,
    pub function: UrbFunction,
    pub status: u32,
    pub device_handle: u64,
}

/// Select-configuration request. The interface records stay raw until the
/// descriptor walker visits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectConfiguration<'a> {
    /// Null when the request unconfigures the device.
    pub configuration_descriptor: u64,
    pub configuration_handle: u64,
    pub interfaces: &'a [u8],
}

/// Control transfer, plain or extended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlTransfer<'a> {
    pub pipe: PipeHandle,
    pub flags: TransferFlags,
    pub buffer_length: u32,
    /// `None` when the buffer pointer is null.
    pub buffer: Option<&'a [u8]>,
    pub setup: SetupPacket,
    /// Only present on the extended variant.
    pub timeout_ms: Option<u32>,
}

/// Bulk or interrupt transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkOrInterruptTransfer<'a> {
    pub pipe: PipeHandle,
    pub flags: TransferFlags,
    pub buffer_length: u32,
    pub buffer: Option<&'a [u8]>,
}

/// Isochronous transfer. Packet descriptors and data are not decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IsochTransfer {
    pub pipe: PipeHandle,
    pub flags: TransferFlags,
    pub buffer_length: u32,
    pub start_frame: u32,
    pub number_of_packets: u32,
    pub error_count: u32,
}

/// Get/set descriptor request to a device, endpoint or interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorRequest<'a> {
    pub kind: DescriptorRequestKind,
    pub index: u8,
    pub descriptor_type: DescriptorType,
    pub language_id: u16,
    pub buffer_length: u32,
    pub buffer: Option<&'a [u8]>,
}

/// Kind-specific part of a request, selected by the function code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrbBody<'a> {
    SelectConfiguration(SelectConfiguration<'a>),
    ControlTransfer(ControlTransfer<'a>),
    BulkOrInterruptTransfer(BulkOrInterruptTransfer<'a>),
    IsochTransfer(IsochTransfer),
    DescriptorRequest(DescriptorRequest<'a>),
    /// Function code the analyzer does not decode; the bytes after the header.
    Unknown(&'a [u8]),
}

/// A parsed request borrowing from the caller's buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Urb<'a> {
    pub header: UrbHeader,
    pub body: UrbBody<'a>,
}

impl<'a> Urb<'a> {
    pub fn function(&self) -> UrbFunction {
        self.header.function
    }

    /// Pipe handle targeted by the request, if the request kind has one.
    pub fn pipe(&self) -> Option<PipeHandle> {
        match &self.body {
            UrbBody::ControlTransfer(t) => Some(t.pipe),
            UrbBody::BulkOrInterruptTransfer(t) => Some(t.pipe),
            UrbBody::IsochTransfer(t) => Some(t.pipe),
            UrbBody::SelectConfiguration(_)
            | UrbBody::DescriptorRequest(_)
            | UrbBody::Unknown(_) => None,
        }
    }
}
