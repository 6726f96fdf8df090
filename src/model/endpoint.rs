//! Endpoint descriptors as recorded at configuration time.

use std::fmt;

/// USB transfer types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferType {
    Control,
    Isochronous,
    Bulk,
    Interrupt,
}

impl TransferType {
    /// Parse from the `PipeType` field of a pipe record.
    pub fn from_pipe_type(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Control),
            1 => Some(Self::Isochronous),
            2 => Some(Self::Bulk),
            3 => Some(Self::Interrupt),
            _ => None,
        }
    }

    /// Value written to the `PipeType` field.
    pub fn pipe_type(&self) -> u32 {
        match self {
            Self::Control => 0,
            Self::Isochronous => 1,
            Self::Bulk => 2,
            Self::Interrupt => 3,
        }
    }

    /// Returns true for the periodic transfer types.
    pub fn is_periodic(&self) -> bool {
        matches!(self, Self::Interrupt | Self::Isochronous)
    }
}

impl fmt::Display for TransferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Control => "Control",
            Self::Isochronous => "Isochronous",
            Self::Bulk => "Bulk",
            Self::Interrupt => "Interrupt",
        };
        write!(f, "{}", name)
    }
}

/// Transfer direction, relative to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    /// Direction encoded in bit 7 of an endpoint address.
    pub fn from_endpoint_address(address: u8) -> Self {
        if address & 0x80 != 0 { Self::In } else { Self::Out }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::In => write!(f, "IN"),
            Self::Out => write!(f, "OUT"),
        }
    }
}

/// Opaque pipe handle assigned by the host controller driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipeHandle(pub u64);

impl PipeHandle {
    /// A zero handle, as found in requests that do not target a pipe.
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for PipeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// USB device address of the device owning a pipe.
///
/// Select-configuration requests do not carry the device address, so pipes
/// registered from them start out as [`DeviceAddress::Unresolved`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeviceAddress {
    #[default]
    Unresolved,
    Resolved(u8),
}

impl DeviceAddress {
    /// Raw value used by capture formats, where 255 marks an unknown address.
    pub const UNRESOLVED_RAW: u8 = 255;

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    /// The address, if known.
    pub fn get(&self) -> Option<u8> {
        match self {
            Self::Resolved(address) => Some(*address),
            Self::Unresolved => None,
        }
    }

    /// Value for capture formats that cannot express the sentinel.
    pub fn raw(&self) -> u8 {
        self.get().unwrap_or(Self::UNRESOLVED_RAW)
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolved(address) => write!(f, "{}", address),
            Self::Unresolved => write!(f, "unresolved"),
        }
    }
}

/// One USB pipe as currently known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointDescriptor {
    /// Endpoint address (e.g., 0x81 = IN endpoint 1, 0x02 = OUT endpoint 2).
    pub address: u8,
    /// Transfer type.
    pub transfer_type: TransferType,
    /// Owning device.
    pub device_address: DeviceAddress,
    /// Handle the descriptor is registered under.
    pub pipe: PipeHandle,
}

impl EndpointDescriptor {
    /// Endpoint number (address without direction bit).
    pub fn number(&self) -> u8 {
        self.address & 0x0F
    }

    pub fn direction(&self) -> Direction {
        Direction::from_endpoint_address(self.address)
    }
}

impl fmt::Display for EndpointDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EP{:02X} {} {} dev {}",
            self.address,
            self.transfer_type,
            self.direction(),
            self.device_address
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipe_type_mapping() {
        assert_eq!(TransferType::from_pipe_type(0), Some(TransferType::Control));
        assert_eq!(TransferType::from_pipe_type(2), Some(TransferType::Bulk));
        assert_eq!(TransferType::from_pipe_type(3), Some(TransferType::Interrupt));
        assert_eq!(TransferType::from_pipe_type(4), None);
        assert_eq!(TransferType::Isochronous.pipe_type(), 1);
    }

    #[test]
    fn test_endpoint_direction() {
        let ep = EndpointDescriptor {
            address: 0x81,
            transfer_type: TransferType::Bulk,
            device_address: DeviceAddress::Unresolved,
            pipe: PipeHandle(0x1000),
        };
        assert_eq!(ep.direction(), Direction::In);
        assert_eq!(ep.number(), 1);
        assert_eq!(ep.to_string(), "EP81 Bulk IN dev unresolved");
    }

    #[test]
    fn test_device_address_sentinel() {
        assert!(!DeviceAddress::Unresolved.is_resolved());
        assert_eq!(DeviceAddress::Unresolved.get(), None);
        assert_eq!(DeviceAddress::Unresolved.raw(), 255);
        assert_eq!(DeviceAddress::Resolved(7).raw(), 7);
    }
}
