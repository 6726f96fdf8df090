//! USB data model types.

pub mod endpoint;
pub mod function;

pub use endpoint::{DeviceAddress, Direction, EndpointDescriptor, PipeHandle, TransferType};
pub use function::{
    DescriptorRequestKind, DescriptorTarget, DescriptorType, UrbFunction, function_name,
};
