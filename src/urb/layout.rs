//! Byte offsets of the request layouts.
//!
//! Requests follow the 64-bit URB structures: little-endian fields, 8-byte
//! pointers and handles. When a transfer buffer pointer is non-null, the
//! buffer contents follow the fixed part of the request.
//!
//! ```text
//! Header (all requests)
//! 0   2  Length            total request length
//! 2   2  Function
//! 4   4  Status
//! 8   8  UsbdDeviceHandle
//!
//! Transfers (control, bulk/interrupt, isoch, descriptor)
//! 16  8  PipeHandle        (reserved for descriptor requests)
//! 24  4  TransferFlags     (reserved for descriptor requests)
//! 28  4  TransferBufferLength
//! 32  8  TransferBuffer
//! 40  8  TransferBufferMDL
//! 48  .. kind-specific
//! ```

/// Size of the common request header.
pub const HEADER_LEN: usize = 16;

/// Offset of the first interface record in a select-configuration request,
/// after the configuration descriptor pointer and configuration handle.
pub const SELECT_CONFIGURATION_INTERFACES: usize = 32;

/// Fixed part of an interface record, before its pipe records.
pub const INTERFACE_HEADER_LEN: usize = 24;

/// Size of one pipe record.
pub const PIPE_RECORD_LEN: usize = 24;

/// End of the fields shared by all transfer requests.
pub const TRANSFER_COMMON_END: usize = 48;

/// Setup packet size.
pub const SETUP_PACKET_LEN: usize = 8;

/// Where the transfer buffer starts, per request kind.
pub const CONTROL_DATA: usize = 56;
pub const CONTROL_EX_DATA: usize = 64;
pub const BULK_DATA: usize = 48;
pub const ISOCH_FIXED_END: usize = 64;
pub const DESCRIPTOR_DATA: usize = 56;
