//! Walks the interface records of a select-configuration request and
//! registers one endpoint per pipe.

use crate::model::{DeviceAddress, EndpointDescriptor, PipeHandle, TransferType};
use crate::registry::EndpointRegistry;
use crate::urb::layout::{INTERFACE_HEADER_LEN, PIPE_RECORD_LEN};
use crate::urb::{ByteCursor, UrbError};
use log::debug;
use thiserror::Error;

/// Errors that abort a configuration walk.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalkError {
    #[error("interface at offset {offset} declares zero length")]
    ZeroLength { offset: usize },
    #[error("interface at offset {offset} declares {length} bytes, only {remaining} remain")]
    Overrun {
        offset: usize,
        length: usize,
        remaining: usize,
    },
    #[error("interface at offset {offset} declares {length} bytes, too short for {pipes} pipe(s)")]
    PipesOverflow {
        offset: usize,
        length: usize,
        pipes: u32,
    },
    #[error("pipe {pipe} at offset {offset} has unknown pipe type {value}")]
    UnknownPipeType {
        offset: usize,
        pipe: PipeHandle,
        value: u32,
    },
    #[error("malformed interface record: {0}")]
    Record(#[from] UrbError),
}

/// One interface record, validated against its declared length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceRecord<'a> {
    pub offset: usize,
    pub length: usize,
    pub number: u8,
    pub alternate_setting: u8,
    pub class: u8,
    pub subclass: u8,
    pub protocol: u8,
    pub handle: u64,
    pipes: &'a [u8],
}

impl<'a> InterfaceRecord<'a> {
    pub fn pipe_count(&self) -> usize {
        self.pipes.len() / PIPE_RECORD_LEN
    }

    pub fn pipes(&self) -> impl Iterator<Item = Result<PipeRecord, WalkError>> + 'a {
        let base = self.offset + INTERFACE_HEADER_LEN;
        self.pipes
            .chunks_exact(PIPE_RECORD_LEN)
            .enumerate()
            .map(move |(i, chunk)| PipeRecord::parse(chunk, base + i * PIPE_RECORD_LEN))
    }
}

/// One pipe record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipeRecord {
    pub max_packet_size: u16,
    pub endpoint_address: u8,
    pub interval: u8,
    pub transfer_type: TransferType,
    pub handle: PipeHandle,
    pub max_transfer_size: u32,
}

impl PipeRecord {
    fn parse(chunk: &[u8], offset: usize) -> Result<Self, WalkError> {
        let mut cursor = ByteCursor::new(chunk);
        let max_packet_size = cursor.u16()?;
        let endpoint_address = cursor.u8()?;
        let interval = cursor.u8()?;
        let pipe_type = cursor.u32()?;
        let handle = PipeHandle(cursor.u64()?);
        let max_transfer_size = cursor.u32()?;

        let transfer_type =
            TransferType::from_pipe_type(pipe_type).ok_or(WalkError::UnknownPipeType {
                offset,
                pipe: handle,
                value: pipe_type,
            })?;

        Ok(Self {
            max_packet_size,
            endpoint_address,
            interval,
            transfer_type,
            handle,
            max_transfer_size,
        })
    }

    pub fn endpoint(&self, device_address: DeviceAddress) -> EndpointDescriptor {
        EndpointDescriptor {
            address: self.endpoint_address,
            transfer_type: self.transfer_type,
            device_address,
            pipe: self.handle,
        }
    }
}

/// Iterator over the interface records of a configuration payload.
///
/// The remaining byte count shrinks by each interface's declared length and
/// iteration stops when it reaches zero. Any length that would not make
/// progress or would leave the payload yields an error and ends iteration.
#[derive(Debug, Clone)]
pub struct Interfaces<'a> {
    data: &'a [u8],
    offset: usize,
    done: bool,
}

impl<'a> Interfaces<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            offset: 0,
            done: false,
        }
    }

    fn next_record(&mut self) -> Result<InterfaceRecord<'a>, WalkError> {
        let offset = self.offset;
        let remaining = self.data.len() - offset;
        let mut cursor = ByteCursor::at(self.data, offset)?;

        let length = cursor.u16()? as usize;
        if length == 0 {
            return Err(WalkError::ZeroLength { offset });
        }
        if length > remaining {
            return Err(WalkError::Overrun {
                offset,
                length,
                remaining,
            });
        }

        let number = cursor.u8()?;
        let alternate_setting = cursor.u8()?;
        let class = cursor.u8()?;
        let subclass = cursor.u8()?;
        let protocol = cursor.u8()?;
        cursor.skip(1)?;
        let handle = cursor.u64()?;
        let pipes = cursor.u32()?;
        cursor.skip(4)?;

        let pipes_len = (pipes as usize).saturating_mul(PIPE_RECORD_LEN);
        if INTERFACE_HEADER_LEN.saturating_add(pipes_len) > length {
            return Err(WalkError::PipesOverflow {
                offset,
                length,
                pipes,
            });
        }

        let start = offset + INTERFACE_HEADER_LEN;
        self.offset += length;
        Ok(InterfaceRecord {
            offset,
            length,
            number,
            alternate_setting,
            class,
            subclass,
            protocol,
            handle,
            pipes: &self.data[start..start + pipes_len],
        })
    }
}

impl<'a> Iterator for Interfaces<'a> {
    type Item = Result<InterfaceRecord<'a>, WalkError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.offset == self.data.len() {
            return None;
        }
        let record = self.next_record();
        self.done = record.is_err();
        Some(record)
    }
}

/// Counts from a completed walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WalkSummary {
    pub interfaces: usize,
    pub pipes: usize,
}

/// Registers the pipes of a configuration payload in a registry.
pub struct DescriptorWalker<'r> {
    registry: &'r EndpointRegistry,
    device_address: DeviceAddress,
}

impl<'r> DescriptorWalker<'r> {
    pub fn new(registry: &'r EndpointRegistry, device_address: DeviceAddress) -> Self {
        Self {
            registry,
            device_address,
        }
    }

    /// Validate the whole payload, then register every pipe in it.
    ///
    /// A malformed payload registers nothing, so a rejected configuration
    /// never leaves entries derived from corrupted records behind. Walking the
    /// same payload again leaves the registry unchanged.
    pub fn walk(&self, interfaces: &[u8]) -> Result<WalkSummary, WalkError> {
        let summary = Self::validate(interfaces)?;

        for interface in Interfaces::new(interfaces) {
            let interface = interface?;
            debug!(
                "Interface {} alt {} len {} class {:02x} subclass {:02x} protocol {:02x} pipes {}",
                interface.number,
                interface.alternate_setting,
                interface.length,
                interface.class,
                interface.subclass,
                interface.protocol,
                interface.pipe_count()
            );

            for pipe in interface.pipes() {
                let pipe = pipe?;
                debug!(
                    "Pipe {} EP{:02X} {} max packet {} interval {}",
                    pipe.handle,
                    pipe.endpoint_address,
                    pipe.transfer_type,
                    pipe.max_packet_size,
                    pipe.interval
                );
                self.registry
                    .insert_or_replace(pipe.handle, pipe.endpoint(self.device_address));
            }
        }

        Ok(summary)
    }

    /// Check every interface and pipe record without touching the registry.
    pub fn validate(interfaces: &[u8]) -> Result<WalkSummary, WalkError> {
        let mut summary = WalkSummary::default();
        for interface in Interfaces::new(interfaces) {
            let interface = interface?;
            for pipe in interface.pipes() {
                pipe?;
                summary.pipes += 1;
            }
            summary.interfaces += 1;
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::urb::layout::SELECT_CONFIGURATION_INTERFACES;
    use crate::urb::{InterfaceSpec, PipeSpec, UrbBuilder};

    fn payload(interfaces: &[InterfaceSpec]) -> Vec<u8> {
        UrbBuilder::select_configuration(interfaces).unwrap()[SELECT_CONFIGURATION_INTERFACES..].to_vec()
    }

    fn two_interfaces() -> Vec<InterfaceSpec> {
        vec![
            InterfaceSpec::new(vec![
                PipeSpec::new(0xA0, 0x81, TransferType::Bulk),
                PipeSpec::new(0xB0, 0x02, TransferType::Bulk),
            ]),
            InterfaceSpec {
                number: 1,
                ..InterfaceSpec::new(vec![PipeSpec::new(0xC0, 0x83, TransferType::Interrupt)])
            },
        ]
    }

    #[test]
    fn test_empty_payload() {
        let registry = EndpointRegistry::new();
        let summary = DescriptorWalker::new(&registry, DeviceAddress::Unresolved)
            .walk(&[])
            .unwrap();
        assert_eq!(summary, WalkSummary::default());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_walk_registers_every_pipe() {
        let registry = EndpointRegistry::new();
        let data = payload(&two_interfaces());
        let summary = DescriptorWalker::new(&registry, DeviceAddress::Unresolved)
            .walk(&data)
            .unwrap();

        assert_eq!(
            summary,
            WalkSummary {
                interfaces: 2,
                pipes: 3,
            }
        );
        let ep = registry.lookup(PipeHandle(0xC0)).unwrap();
        assert_eq!(ep.address, 0x83);
        assert_eq!(ep.transfer_type, TransferType::Interrupt);
        assert_eq!(ep.device_address, DeviceAddress::Unresolved);
    }

    #[test]
    fn test_interface_with_padding() {
        // Declared length may exceed the pipe records; the cursor still
        // advances by the declared length.
        let mut interfaces = two_interfaces();
        interfaces[0].declared_length = Some(24 + 2 * 24 + 8);
        let mut data = Vec::new();
        let raw = payload(&interfaces[..1]);
        data.extend_from_slice(&raw);
        data.extend_from_slice(&[0xEE; 8]);
        data.extend_from_slice(&payload(&interfaces[1..]));

        let summary = DescriptorWalker::validate(&data).unwrap();
        assert_eq!(summary.interfaces, 2);
        assert_eq!(summary.pipes, 3);
    }

    #[test]
    fn test_zero_length_interface() {
        let mut interfaces = two_interfaces();
        interfaces[1].declared_length = Some(0);
        let data = payload(&interfaces);
        assert_eq!(
            DescriptorWalker::validate(&data),
            Err(WalkError::ZeroLength { offset: 72 })
        );
    }

    #[test]
    fn test_overrun_registers_nothing() {
        let registry = EndpointRegistry::new();
        let mut interfaces = two_interfaces();
        interfaces[1].declared_length = Some(200);
        let data = payload(&interfaces);

        let result = DescriptorWalker::new(&registry, DeviceAddress::Unresolved).walk(&data);
        assert_eq!(
            result,
            Err(WalkError::Overrun {
                offset: 72,
                length: 200,
                remaining: 48,
            })
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_pipes_exceed_interface() {
        let mut interfaces = two_interfaces();
        interfaces[0].declared_length = Some(24 + 24);
        // Trim the payload so the shortened record is followed by valid data.
        let data = payload(&interfaces[..1]);
        assert!(matches!(
            DescriptorWalker::validate(&data),
            Err(WalkError::PipesOverflow { pipes: 2, .. })
        ));
    }

    #[test]
    fn test_truncated_interface_header() {
        let data = [8u8, 0, 0, 0, 0, 0, 0, 0];
        assert!(matches!(
            DescriptorWalker::validate(&data),
            Err(WalkError::Record(UrbError::Truncated { .. }))
        ));
    }

    #[test]
    fn test_unknown_pipe_type() {
        let mut data = payload(&two_interfaces());
        // Pipe type of the first pipe.
        data[24 + 4] = 9;
        assert!(matches!(
            DescriptorWalker::validate(&data),
            Err(WalkError::UnknownPipeType { value: 9, .. })
        ));

        // The other pipes are valid but the configuration is rejected whole.
        let registry = EndpointRegistry::new();
        assert!(DescriptorWalker::new(&registry, DeviceAddress::Unresolved).walk(&data).is_err());
        assert!(registry.is_empty());
    }
}
