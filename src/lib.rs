//! USB request block analyzer
//!
//! A library and CLI tool for classifying USB request blocks and correlating
//! transfers with the endpoints announced by select-configuration requests.

pub mod analyzer;
pub mod config;
pub mod hexdump;
pub mod logger;
pub mod model;
pub mod registry;
pub mod roothub;
pub mod sink;
pub mod trace;
pub mod ui;
pub mod urb;

pub use analyzer::{
    DescriptorWalker, Phase, TransferRecord, UrbAnalyzer, analyze_bytes, analyze_urb,
};
pub use config::Config;
pub use model::{EndpointDescriptor, PipeHandle, TransferType, UrbFunction};
pub use registry::EndpointRegistry;
pub use roothub::RootHubs;
pub use urb::{Urb, UrbError};
