//! Validated parse step from raw bytes to [`Urb`].

use super::layout::*;
use super::{
    BulkOrInterruptTransfer, ByteCursor, ControlTransfer, DescriptorRequest, IsochTransfer,
    SelectConfiguration, SetupPacket, TransferFlags, Urb, UrbBody, UrbError, UrbHeader,
};
use crate::model::{DescriptorRequestKind, DescriptorType, PipeHandle, UrbFunction};

/// Fields shared by every transfer request.
struct TransferCommon {
    pipe: PipeHandle,
    flags: TransferFlags,
    buffer_length: u32,
    buffer_pointer: u64,
}

impl TransferCommon {
    fn read(cursor: &mut ByteCursor<'_>) -> Result<Self, UrbError> {
        let pipe = PipeHandle(cursor.u64()?);
        let flags = TransferFlags::from_bits_retain(cursor.u32()?);
        let buffer_length = cursor.u32()?;
        let buffer_pointer = cursor.u64()?;
        let _mdl = cursor.u64()?;
        Ok(Self {
            pipe,
            flags,
            buffer_length,
            buffer_pointer,
        })
    }

    /// Transfer buffer contents, which follow the fixed fields at `offset`.
    fn buffer<'a>(&self, raw: &'a [u8], offset: usize) -> Result<Option<&'a [u8]>, UrbError> {
        if self.buffer_pointer == 0 {
            return Ok(None);
        }
        let mut cursor = ByteCursor::at(raw, offset)?;
        cursor.bytes(self.buffer_length as usize).map(Some)
    }
}

impl<'a> Urb<'a> {
    /// Parse a request. The function code alone selects the variant.
    pub fn parse(raw: &'a [u8]) -> Result<Self, UrbError> {
        let mut cursor = ByteCursor::new(raw);
        let header = UrbHeader {
            length: cursor.u16()?,
            function: UrbFunction::from(cursor.u16()?),
            status: cursor.u32()?,
            device_handle: cursor.u64()?,
        };

        let body = match header.function {
            UrbFunction::SelectConfiguration => {
                UrbBody::SelectConfiguration(parse_select_configuration(&header, raw, cursor)?)
            }
            UrbFunction::ControlTransfer => {
                let common = TransferCommon::read(&mut cursor)?;
                let setup = SetupPacket(cursor.array()?);
                UrbBody::ControlTransfer(ControlTransfer {
                    pipe: common.pipe,
                    flags: common.flags,
                    buffer_length: common.buffer_length,
                    buffer: common.buffer(raw, CONTROL_DATA)?,
                    setup,
                    timeout_ms: None,
                })
            }
            UrbFunction::ControlTransferEx => {
                let common = TransferCommon::read(&mut cursor)?;
                let timeout = cursor.u32()?;
                cursor.skip(4)?;
                let setup = SetupPacket(cursor.array()?);
                UrbBody::ControlTransfer(ControlTransfer {
                    pipe: common.pipe,
                    flags: common.flags,
                    buffer_length: common.buffer_length,
                    buffer: common.buffer(raw, CONTROL_EX_DATA)?,
                    setup,
                    timeout_ms: Some(timeout),
                })
            }
            UrbFunction::BulkOrInterruptTransfer => {
                let common = TransferCommon::read(&mut cursor)?;
                UrbBody::BulkOrInterruptTransfer(BulkOrInterruptTransfer {
                    pipe: common.pipe,
                    flags: common.flags,
                    buffer_length: common.buffer_length,
                    buffer: common.buffer(raw, BULK_DATA)?,
                })
            }
            UrbFunction::IsochTransfer => {
                let common = TransferCommon::read(&mut cursor)?;
                let start_frame = cursor.u32()?;
                let number_of_packets = cursor.u32()?;
                let error_count = cursor.u32()?;
                cursor.skip(4)?;
                UrbBody::IsochTransfer(IsochTransfer {
                    pipe: common.pipe,
                    flags: common.flags,
                    buffer_length: common.buffer_length,
                    start_frame,
                    number_of_packets,
                    error_count,
                })
            }
            UrbFunction::Descriptor(kind) => {
                UrbBody::DescriptorRequest(parse_descriptor_request(kind, raw, &mut cursor)?)
            }
            UrbFunction::Unknown(_) => UrbBody::Unknown(cursor.rest()),
        };

        Ok(Self { header, body })
    }
}

fn parse_select_configuration<'a>(
    header: &UrbHeader,
    raw: &'a [u8],
    mut cursor: ByteCursor<'a>,
) -> Result<SelectConfiguration<'a>, UrbError> {
    let declared = header.length as usize;
    if declared < SELECT_CONFIGURATION_INTERFACES {
        return Err(UrbError::BadLength {
            function: header.function,
            declared: header.length,
            reason: "shorter than the fixed select-configuration fields",
        });
    }
    if declared > raw.len() {
        return Err(UrbError::Truncated {
            offset: 0,
            needed: declared,
            available: raw.len(),
        });
    }

    let configuration_descriptor = cursor.u64()?;
    let configuration_handle = cursor.u64()?;
    Ok(SelectConfiguration {
        configuration_descriptor,
        configuration_handle,
        interfaces: &raw[SELECT_CONFIGURATION_INTERFACES..declared],
    })
}

fn parse_descriptor_request<'a>(
    kind: DescriptorRequestKind,
    raw: &'a [u8],
    cursor: &mut ByteCursor<'a>,
) -> Result<DescriptorRequest<'a>, UrbError> {
    // Descriptor requests reuse the transfer layout with the pipe handle and
    // flags reserved.
    let common = TransferCommon::read(cursor)?;
    let index = cursor.u8()?;
    let descriptor_type = DescriptorType::from(cursor.u8()?);
    let language_id = cursor.u16()?;
    cursor.skip(4)?;

    Ok(DescriptorRequest {
        kind,
        index,
        descriptor_type,
        language_id,
        buffer_length: common.buffer_length,
        buffer: common.buffer(raw, DESCRIPTOR_DATA)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DescriptorTarget, TransferType};
    use crate::urb::{InterfaceSpec, PipeSpec, UrbBuilder};

    #[test]
    fn test_parse_header_only_unknown() {
        let raw = UrbBuilder::unknown(0x0002, &[0xAB, 0xCD]).unwrap();
        let urb = Urb::parse(&raw).unwrap();
        assert_eq!(urb.function(), UrbFunction::Unknown(0x0002));
        assert_eq!(urb.body, UrbBody::Unknown(&[0xAB, 0xCD]));
    }

    #[test]
    fn test_parse_truncated_header() {
        let raw = [0u8; 10];
        assert!(matches!(
            Urb::parse(&raw),
            Err(UrbError::Truncated { offset: 8, .. })
        ));
    }

    #[test]
    fn test_parse_control_transfer() {
        let setup = [0x80, 0x06, 0x00, 0x01, 0x00, 0x00, 0x12, 0x00];
        let raw = UrbBuilder::control(PipeHandle(0), setup)
            .flags(TransferFlags::DIRECTION_IN)
            .buffer(&[1, 2, 3, 4])
            .build();
        let urb = Urb::parse(&raw).unwrap();
        let UrbBody::ControlTransfer(transfer) = urb.body else {
            panic!("expected control transfer, got {:?}", urb.body);
        };
        assert_eq!(transfer.setup.request(), 0x06);
        assert_eq!(transfer.setup.value(), 0x0100);
        assert_eq!(transfer.setup.length(), 18);
        assert_eq!(transfer.buffer, Some(&[1u8, 2, 3, 4][..]));
        assert_eq!(transfer.buffer_length, 4);
        assert_eq!(transfer.timeout_ms, None);
    }

    #[test]
    fn test_parse_control_transfer_ex() {
        let raw = UrbBuilder::control(PipeHandle(0x10), [0; 8])
            .timeout(500)
            .build();
        let urb = Urb::parse(&raw).unwrap();
        assert_eq!(urb.function(), UrbFunction::ControlTransferEx);
        let UrbBody::ControlTransfer(transfer) = urb.body else {
            panic!("expected control transfer");
        };
        assert_eq!(transfer.timeout_ms, Some(500));
        assert_eq!(transfer.buffer, None);
    }

    #[test]
    fn test_parse_missing_buffer_contents() {
        let mut raw = UrbBuilder::bulk(PipeHandle(0x20))
            .buffer(&[0u8; 16])
            .build();
        raw.truncate(raw.len() - 4);
        assert!(matches!(
            Urb::parse(&raw),
            Err(UrbError::Truncated {
                offset: 48,
                needed: 16,
                available: 12,
            })
        ));
    }

    #[test]
    fn test_parse_null_buffer_with_length() {
        // Length is reported even when the buffer pointer is null (MDL transfers).
        let raw = UrbBuilder::bulk(PipeHandle(0x20)).buffer_length(512).build();
        let urb = Urb::parse(&raw).unwrap();
        let UrbBody::BulkOrInterruptTransfer(transfer) = urb.body else {
            panic!("expected bulk transfer");
        };
        assert_eq!(transfer.buffer_length, 512);
        assert_eq!(transfer.buffer, None);
    }

    #[test]
    fn test_parse_isoch() {
        let raw = UrbBuilder::isoch(PipeHandle(0x30), 8)
            .flags(TransferFlags::START_ISO_TRANSFER_ASAP | TransferFlags::DIRECTION_IN)
            .build();
        let urb = Urb::parse(&raw).unwrap();
        let UrbBody::IsochTransfer(transfer) = urb.body else {
            panic!("expected isoch transfer");
        };
        assert_eq!(transfer.number_of_packets, 8);
        assert!(transfer.flags.contains(TransferFlags::START_ISO_TRANSFER_ASAP));
    }

    #[test]
    fn test_parse_descriptor_request() {
        let kind = DescriptorRequestKind {
            set: false,
            target: DescriptorTarget::Device,
        };
        let raw = UrbBuilder::descriptor(kind, DescriptorType::String, 2, 0x0409)
            .buffer(&[4, 3, b'h', 0])
            .build();
        let urb = Urb::parse(&raw).unwrap();
        let UrbBody::DescriptorRequest(request) = urb.body else {
            panic!("expected descriptor request");
        };
        assert_eq!(request.kind, kind);
        assert_eq!(request.index, 2);
        assert_eq!(request.descriptor_type, DescriptorType::String);
        assert_eq!(request.language_id, 0x0409);
        assert_eq!(request.buffer.map(|b| b.len()), Some(4));
    }

    #[test]
    fn test_parse_select_configuration_bounds() {
        let raw = UrbBuilder::select_configuration(&[InterfaceSpec::new(vec![PipeSpec::new(
            0x100,
            0x81,
            TransferType::Bulk,
        )])]).unwrap();
        let urb = Urb::parse(&raw).unwrap();
        let UrbBody::SelectConfiguration(select) = urb.body else {
            panic!("expected select configuration");
        };
        assert_eq!(select.interfaces.len(), 24 + 24);

        // Declared length larger than the buffer.
        let short = &raw[..raw.len() - 1];
        assert!(matches!(Urb::parse(short), Err(UrbError::Truncated { .. })));

        // Declared length too small to hold the fixed fields.
        let mut bad = raw.clone();
        bad[0..2].copy_from_slice(&20u16.to_le_bytes());
        assert!(matches!(Urb::parse(&bad), Err(UrbError::BadLength { .. })));
    }
}
