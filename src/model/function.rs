//! URB function codes and descriptor request kinds.

use std::fmt;

/// Function codes handled by the analyzer.
pub mod code {
    pub const SELECT_CONFIGURATION: u16 = 0x0000;
    pub const CONTROL_TRANSFER: u16 = 0x0008;
    pub const BULK_OR_INTERRUPT_TRANSFER: u16 = 0x0009;
    pub const ISOCH_TRANSFER: u16 = 0x000A;
    pub const GET_DESCRIPTOR_FROM_DEVICE: u16 = 0x000B;
    pub const SET_DESCRIPTOR_TO_DEVICE: u16 = 0x000C;
    pub const GET_DESCRIPTOR_FROM_ENDPOINT: u16 = 0x0024;
    pub const SET_DESCRIPTOR_TO_ENDPOINT: u16 = 0x0025;
    pub const GET_DESCRIPTOR_FROM_INTERFACE: u16 = 0x0028;
    pub const SET_DESCRIPTOR_TO_INTERFACE: u16 = 0x0029;
    pub const CONTROL_TRANSFER_EX: u16 = 0x0032;
}

/// Recipient of a descriptor request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorTarget {
    Device,
    Endpoint,
    Interface,
}

/// Which of the six descriptor request functions was used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorRequestKind {
    pub set: bool,
    pub target: DescriptorTarget,
}

impl DescriptorRequestKind {
    pub fn function(&self) -> u16 {
        match (self.set, self.target) {
            (false, DescriptorTarget::Device) => code::GET_DESCRIPTOR_FROM_DEVICE,
            (true, DescriptorTarget::Device) => code::SET_DESCRIPTOR_TO_DEVICE,
            (false, DescriptorTarget::Endpoint) => code::GET_DESCRIPTOR_FROM_ENDPOINT,
            (true, DescriptorTarget::Endpoint) => code::SET_DESCRIPTOR_TO_ENDPOINT,
            (false, DescriptorTarget::Interface) => code::GET_DESCRIPTOR_FROM_INTERFACE,
            (true, DescriptorTarget::Interface) => code::SET_DESCRIPTOR_TO_INTERFACE,
        }
    }
}

impl fmt::Display for DescriptorRequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = if self.set { "SET" } else { "GET" };
        let target = match self.target {
            DescriptorTarget::Device => "DEVICE",
            DescriptorTarget::Endpoint => "ENDPOINT",
            DescriptorTarget::Interface => "INTERFACE",
        };
        write!(f, "{}_DESCRIPTOR/{}", verb, target)
    }
}

/// Classification of a URB by its function code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrbFunction {
    SelectConfiguration,
    ControlTransfer,
    ControlTransferEx,
    BulkOrInterruptTransfer,
    IsochTransfer,
    Descriptor(DescriptorRequestKind),
    Unknown(u16),
}

impl From<u16> for UrbFunction {
    fn from(value: u16) -> Self {
        use DescriptorTarget::*;

        let descriptor = |set, target| Self::Descriptor(DescriptorRequestKind { set, target });
        match value {
            code::SELECT_CONFIGURATION => Self::SelectConfiguration,
            code::CONTROL_TRANSFER => Self::ControlTransfer,
            code::CONTROL_TRANSFER_EX => Self::ControlTransferEx,
            code::BULK_OR_INTERRUPT_TRANSFER => Self::BulkOrInterruptTransfer,
            code::ISOCH_TRANSFER => Self::IsochTransfer,
            code::GET_DESCRIPTOR_FROM_DEVICE => descriptor(false, Device),
            code::SET_DESCRIPTOR_TO_DEVICE => descriptor(true, Device),
            code::GET_DESCRIPTOR_FROM_ENDPOINT => descriptor(false, Endpoint),
            code::SET_DESCRIPTOR_TO_ENDPOINT => descriptor(true, Endpoint),
            code::GET_DESCRIPTOR_FROM_INTERFACE => descriptor(false, Interface),
            code::SET_DESCRIPTOR_TO_INTERFACE => descriptor(true, Interface),
            other => Self::Unknown(other),
        }
    }
}

impl UrbFunction {
    /// Raw function code.
    pub fn code(&self) -> u16 {
        match self {
            Self::SelectConfiguration => code::SELECT_CONFIGURATION,
            Self::ControlTransfer => code::CONTROL_TRANSFER,
            Self::ControlTransferEx => code::CONTROL_TRANSFER_EX,
            Self::BulkOrInterruptTransfer => code::BULK_OR_INTERRUPT_TRANSFER,
            Self::IsochTransfer => code::ISOCH_TRANSFER,
            Self::Descriptor(kind) => kind.function(),
            Self::Unknown(code) => *code,
        }
    }
}

/// Symbolic name of any function code defined by the USB driver interface,
/// including the ones the analyzer treats as unknown.
pub fn function_name(code: u16) -> Option<&'static str> {
    let name = match code {
        0x0000 => "SELECT_CONFIGURATION",
        0x0001 => "SELECT_INTERFACE",
        0x0002 => "ABORT_PIPE",
        0x0003 => "TAKE_FRAME_LENGTH_CONTROL",
        0x0004 => "RELEASE_FRAME_LENGTH_CONTROL",
        0x0005 => "GET_FRAME_LENGTH",
        0x0006 => "SET_FRAME_LENGTH",
        0x0007 => "GET_CURRENT_FRAME_NUMBER",
        0x0008 => "CONTROL_TRANSFER",
        0x0009 => "BULK_OR_INTERRUPT_TRANSFER",
        0x000A => "ISOCH_TRANSFER",
        0x000B => "GET_DESCRIPTOR_FROM_DEVICE",
        0x000C => "SET_DESCRIPTOR_TO_DEVICE",
        0x000D => "SET_FEATURE_TO_DEVICE",
        0x000E => "SET_FEATURE_TO_INTERFACE",
        0x000F => "SET_FEATURE_TO_ENDPOINT",
        0x0010 => "CLEAR_FEATURE_TO_DEVICE",
        0x0011 => "CLEAR_FEATURE_TO_INTERFACE",
        0x0012 => "CLEAR_FEATURE_TO_ENDPOINT",
        0x0013 => "GET_STATUS_FROM_DEVICE",
        0x0014 => "GET_STATUS_FROM_INTERFACE",
        0x0015 => "GET_STATUS_FROM_ENDPOINT",
        0x0017 => "VENDOR_DEVICE",
        0x0018 => "VENDOR_INTERFACE",
        0x0019 => "VENDOR_ENDPOINT",
        0x001A => "CLASS_DEVICE",
        0x001B => "CLASS_INTERFACE",
        0x001C => "CLASS_ENDPOINT",
        0x001E => "SYNC_RESET_PIPE_AND_CLEAR_STALL",
        0x001F => "CLASS_OTHER",
        0x0020 => "VENDOR_OTHER",
        0x0021 => "GET_STATUS_FROM_OTHER",
        0x0022 => "CLEAR_FEATURE_TO_OTHER",
        0x0023 => "SET_FEATURE_TO_OTHER",
        0x0024 => "GET_DESCRIPTOR_FROM_ENDPOINT",
        0x0025 => "SET_DESCRIPTOR_TO_ENDPOINT",
        0x0026 => "GET_CONFIGURATION",
        0x0027 => "GET_INTERFACE",
        0x0028 => "GET_DESCRIPTOR_FROM_INTERFACE",
        0x0029 => "SET_DESCRIPTOR_TO_INTERFACE",
        0x002A => "GET_MS_FEATURE_DESCRIPTOR",
        0x0030 => "SYNC_RESET_PIPE",
        0x0031 => "SYNC_CLEAR_STALL",
        0x0032 => "CONTROL_TRANSFER_EX",
        0x0035 => "OPEN_STATIC_STREAMS",
        0x0036 => "CLOSE_STATIC_STREAMS",
        0x0037 => "BULK_OR_INTERRUPT_TRANSFER_USING_CHAINED_MDL",
        0x0038 => "ISOCH_TRANSFER_USING_CHAINED_MDL",
        _ => return None,
    };
    Some(name)
}

impl fmt::Display for UrbFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match function_name(self.code()) {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "UNKNOWN({:#06x})", self.code()),
        }
    }
}

/// Descriptor type requested by a descriptor request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorType {
    Device,
    Configuration,
    String,
    Other(u8),
}

impl From<u8> for DescriptorType {
    fn from(value: u8) -> Self {
        match value {
            0x01 => Self::Device,
            0x02 => Self::Configuration,
            0x03 => Self::String,
            other => Self::Other(other),
        }
    }
}

impl DescriptorType {
    pub fn raw(&self) -> u8 {
        match self {
            Self::Device => 0x01,
            Self::Configuration => 0x02,
            Self::String => 0x03,
            Self::Other(value) => *value,
        }
    }
}

impl fmt::Display for DescriptorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Device => write!(f, "DEVICE"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::String => write!(f, "STRING"),
            Self::Other(value) => write!(f, "{:#04x}", value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_code_roundtrip() {
        for value in 0..=0x40u16 {
            assert_eq!(UrbFunction::from(value).code(), value);
        }
    }

    #[test]
    fn test_descriptor_functions() {
        assert_eq!(
            UrbFunction::from(0x0028),
            UrbFunction::Descriptor(DescriptorRequestKind {
                set: false,
                target: DescriptorTarget::Interface,
            })
        );
        assert_eq!(UrbFunction::from(0x0001), UrbFunction::Unknown(0x0001));
    }

    #[test]
    fn test_function_display() {
        assert_eq!(UrbFunction::from(0x0001).to_string(), "SELECT_INTERFACE");
        assert_eq!(UrbFunction::from(0x7777).to_string(), "UNKNOWN(0x7777)");
        assert_eq!(DescriptorType::from(9).to_string(), "0x09");
    }
}
