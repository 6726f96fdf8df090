//! Replay traces: recorded request sequences described in TOML.
//!
//! ```toml
//! [[event]]
//! root_hub = 1
//! phase = "complete"
//! [event.urb]
//! kind = "select_configuration"
//! [[event.urb.interfaces]]
//! pipes = [
//!     { handle = "0xffffa00000001000", endpoint = 0x81, type = "bulk" },
//! ]
//!
//! [[event]]
//! phase = "submit"
//! urb = { kind = "bulk", pipe = "0xffffa00000001000", length = 512 }
//!
//! [[event]]
//! urb = { kind = "raw", bytes = "1000 0100 00000000 0000000000000000" }
//! ```

mod replay;

pub use replay::{Replay, ReplayStats};

use crate::analyzer::Phase;
use crate::model::{
    DescriptorRequestKind, DescriptorTarget, DescriptorType, PipeHandle, TransferType,
};
use crate::urb::{EncodeError, InterfaceSpec, PipeSpec, TransferFlags, UrbBuilder, UrbError};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Trace loading and encoding errors.
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid hex string '{0}'")]
    Hex(String),
    #[error("Invalid number '{0}'")]
    Number(String),
    #[error("Cannot encode request: {0}")]
    Encode(#[from] EncodeError),
    #[error("Setup packet must be 8 bytes, got {0}")]
    SetupLength(usize),
    #[error("Event {index}: {source}")]
    Urb {
        index: usize,
        #[source]
        source: UrbError,
    },
}

/// A whole trace file.
#[derive(Debug, Deserialize, Default)]
pub struct Trace {
    #[serde(default, rename = "event")]
    pub events: Vec<TraceEvent>,
}

impl Trace {
    pub fn load(path: &Path) -> Result<Self, TraceError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, TraceError> {
        Ok(toml::from_str(content)?)
    }
}

/// One observation of a request.
#[derive(Debug, Deserialize)]
pub struct TraceEvent {
    #[serde(default = "default_root_hub")]
    pub root_hub: u8,
    #[serde(default)]
    pub phase: PhaseSpec,
    pub urb: RequestSpec,
}

fn default_root_hub() -> u8 {
    1
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PhaseSpec {
    Submit,
    #[default]
    Complete,
}

impl From<PhaseSpec> for Phase {
    fn from(spec: PhaseSpec) -> Self {
        match spec {
            PhaseSpec::Submit => Phase::Submit,
            PhaseSpec::Complete => Phase::Complete,
        }
    }
}

/// Integer given either as a TOML integer or as a (hex) string, since pipe
/// handles do not fit TOML's signed integers.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum NumberSpec {
    Int(u64),
    Text(String),
}

impl NumberSpec {
    pub fn value(&self) -> Result<u64, TraceError> {
        match self {
            Self::Int(value) => Ok(*value),
            Self::Text(text) => {
                let trimmed = text.trim();
                let parsed = match trimmed
                    .strip_prefix("0x")
                    .or_else(|| trimmed.strip_prefix("0X"))
                {
                    Some(digits) => u64::from_str_radix(&digits.replace('_', ""), 16),
                    None => trimmed.replace('_', "").parse(),
                };
                parsed.map_err(|_| TraceError::Number(text.clone()))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransferTypeSpec {
    Control,
    Isochronous,
    Bulk,
    Interrupt,
}

impl From<TransferTypeSpec> for TransferType {
    fn from(spec: TransferTypeSpec) -> Self {
        match spec {
            TransferTypeSpec::Control => TransferType::Control,
            TransferTypeSpec::Isochronous => TransferType::Isochronous,
            TransferTypeSpec::Bulk => TransferType::Bulk,
            TransferTypeSpec::Interrupt => TransferType::Interrupt,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TargetSpec {
    Device,
    Endpoint,
    Interface,
}

impl From<TargetSpec> for DescriptorTarget {
    fn from(spec: TargetSpec) -> Self {
        match spec {
            TargetSpec::Device => DescriptorTarget::Device,
            TargetSpec::Endpoint => DescriptorTarget::Endpoint,
            TargetSpec::Interface => DescriptorTarget::Interface,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PipeEntry {
    pub handle: NumberSpec,
    pub endpoint: u8,
    #[serde(rename = "type")]
    pub transfer_type: TransferTypeSpec,
    #[serde(default)]
    pub max_packet_size: Option<u16>,
    #[serde(default)]
    pub interval: u8,
}

#[derive(Debug, Deserialize, Default)]
pub struct InterfaceEntry {
    #[serde(default)]
    pub number: u8,
    #[serde(default)]
    pub alternate_setting: u8,
    #[serde(default)]
    pub class: u8,
    #[serde(default)]
    pub subclass: u8,
    #[serde(default)]
    pub protocol: u8,
    /// Declared record length, to reproduce corrupted configurations.
    #[serde(default)]
    pub length: Option<u16>,
    #[serde(default)]
    pub pipes: Vec<PipeEntry>,
}

/// Fields shared by transfer requests.
#[derive(Debug, Deserialize, Default)]
pub struct TransferEntry {
    #[serde(default)]
    pub pipe: Option<NumberSpec>,
    #[serde(default)]
    pub flags: u32,
    #[serde(default)]
    pub status: u32,
    /// Buffer contents in hex; absent means a null buffer pointer.
    #[serde(default)]
    pub data: Option<String>,
    /// Length field; defaults to the data length.
    #[serde(default)]
    pub length: Option<u32>,
}

/// Request description.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RequestSpec {
    SelectConfiguration {
        #[serde(default)]
        interfaces: Vec<InterfaceEntry>,
    },
    Control {
        setup: String,
        #[serde(default)]
        timeout: Option<u32>,
        #[serde(flatten)]
        transfer: TransferEntry,
    },
    Bulk {
        #[serde(flatten)]
        transfer: TransferEntry,
    },
    Isoch {
        packets: u32,
        #[serde(default)]
        start_frame: u32,
        #[serde(default)]
        error_count: u32,
        #[serde(flatten)]
        transfer: TransferEntry,
    },
    Descriptor {
        #[serde(default)]
        set: bool,
        target: TargetSpec,
        descriptor_type: u8,
        #[serde(default)]
        index: u8,
        #[serde(default)]
        language_id: u16,
        #[serde(flatten)]
        transfer: TransferEntry,
    },
    Unknown {
        function: u16,
        #[serde(default)]
        body: Option<String>,
    },
    Raw {
        bytes: String,
    },
}

impl RequestSpec {
    /// Encode into the request layout.
    pub fn encode(&self) -> Result<Vec<u8>, TraceError> {
        match self {
            Self::SelectConfiguration { interfaces } => {
                let specs = interfaces
                    .iter()
                    .map(InterfaceEntry::to_spec)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(UrbBuilder::select_configuration(&specs)?)
            }
            Self::Control {
                setup,
                timeout,
                transfer,
            } => {
                let setup_bytes = parse_hex(setup)?;
                let setup: [u8; 8] = setup_bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| TraceError::SetupLength(setup_bytes.len()))?;
                let mut builder = UrbBuilder::control(transfer.pipe()?, setup);
                if let Some(timeout) = timeout {
                    builder = builder.timeout(*timeout);
                }
                Ok(transfer.apply(builder)?.build())
            }
            Self::Bulk { transfer } => {
                Ok(transfer.apply(UrbBuilder::bulk(transfer.pipe()?))?.build())
            }
            Self::Isoch {
                packets,
                start_frame,
                error_count,
                transfer,
            } => {
                let builder = UrbBuilder::isoch(transfer.pipe()?, *packets)
                    .frames(*start_frame, *error_count);
                Ok(transfer.apply(builder)?.build())
            }
            Self::Descriptor {
                set,
                target,
                descriptor_type,
                index,
                language_id,
                transfer,
            } => {
                let kind = DescriptorRequestKind {
                    set: *set,
                    target: (*target).into(),
                };
                let builder = UrbBuilder::descriptor(
                    kind,
                    DescriptorType::from(*descriptor_type),
                    *index,
                    *language_id,
                );
                Ok(transfer.apply(builder)?.build())
            }
            Self::Unknown { function, body } => {
                let body = body.as_deref().map(parse_hex).transpose()?.unwrap_or_default();
                Ok(UrbBuilder::unknown(*function, &body)?)
            }
            Self::Raw { bytes } => parse_hex(bytes),
        }
    }
}

impl TransferEntry {
    fn pipe(&self) -> Result<PipeHandle, TraceError> {
        match &self.pipe {
            Some(pipe) => pipe.value().map(PipeHandle),
            None => Ok(PipeHandle(0)),
        }
    }

    fn apply(&self, mut builder: UrbBuilder) -> Result<UrbBuilder, TraceError> {
        builder = builder
            .flags(TransferFlags::from_bits_retain(self.flags))
            .status(self.status);
        if let Some(data) = &self.data {
            builder = builder.buffer(&parse_hex(data)?);
        }
        if let Some(length) = self.length {
            builder = builder.buffer_length(length);
        }
        Ok(builder)
    }
}

impl InterfaceEntry {
    fn to_spec(&self) -> Result<InterfaceSpec, TraceError> {
        let pipes = self
            .pipes
            .iter()
            .map(|pipe| {
                let mut spec =
                    PipeSpec::new(pipe.handle.value()?, pipe.endpoint, pipe.transfer_type.into());
                if let Some(size) = pipe.max_packet_size {
                    spec.max_packet_size = size;
                }
                spec.interval = pipe.interval;
                Ok(spec)
            })
            .collect::<Result<Vec<_>, TraceError>>()?;

        Ok(InterfaceSpec {
            number: self.number,
            alternate_setting: self.alternate_setting,
            class: self.class,
            subclass: self.subclass,
            protocol: self.protocol,
            handle: 0,
            pipes,
            declared_length: self.length,
        })
    }
}

/// Decode hex bytes, ignoring whitespace and `:` separators.
pub fn parse_hex(text: &str) -> Result<Vec<u8>, TraceError> {
    let digits: Vec<u8> = text
        .bytes()
        .filter(|b| !b.is_ascii_whitespace() && *b != b':')
        .collect();
    if digits.len() % 2 != 0 {
        return Err(TraceError::Hex(text.to_string()));
    }

    digits
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .ok_or_else(|| TraceError::Hex(text.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::urb::{Urb, UrbBody};

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("80 06 00:01").unwrap(), vec![0x80, 0x06, 0x00, 0x01]);
        assert_eq!(parse_hex("").unwrap(), Vec::<u8>::new());
        assert!(parse_hex("abc").is_err());
        assert!(parse_hex("zz").is_err());
    }

    #[test]
    fn test_number_spec() {
        assert_eq!(NumberSpec::Int(42).value().unwrap(), 42);
        assert_eq!(
            NumberSpec::Text("0xffffa000_00001000".into()).value().unwrap(),
            0xFFFF_A000_0000_1000
        );
        assert_eq!(NumberSpec::Text("17".into()).value().unwrap(), 17);
        assert!(NumberSpec::Text("0xgg".into()).value().is_err());
    }

    #[test]
    fn test_trace_events_encode() {
        let trace = Trace::from_toml(
            r#"
            [[event]]
            root_hub = 2
            [event.urb]
            kind = "select_configuration"
            [[event.urb.interfaces]]
            class = 3
            pipes = [
                { handle = "0xffffa00000001000", endpoint = 0x81, type = "interrupt" },
            ]

            [[event]]
            phase = "submit"
            urb = { kind = "control", setup = "80 06 00 01 00 00 12 00", timeout = 100 }

            [[event]]
            urb = { kind = "descriptor", target = "device", descriptor_type = 3, language_id = 0x409, data = "0403" }
            "#,
        )
        .unwrap();

        assert_eq!(trace.events.len(), 3);
        assert_eq!(trace.events[0].root_hub, 2);
        assert_eq!(trace.events[0].phase, PhaseSpec::Complete);
        assert_eq!(trace.events[1].phase, PhaseSpec::Submit);

        let raw = trace.events[1].urb.encode().unwrap();
        let urb = Urb::parse(&raw).unwrap();
        let UrbBody::ControlTransfer(control) = urb.body else {
            panic!("expected control transfer");
        };
        assert_eq!(control.timeout_ms, Some(100));
        assert_eq!(control.setup.request(), 0x06);

        let raw = trace.events[2].urb.encode().unwrap();
        let UrbBody::DescriptorRequest(request) = Urb::parse(&raw).unwrap().body else {
            panic!("expected descriptor request");
        };
        assert_eq!(request.descriptor_type, DescriptorType::String);
        assert_eq!(request.buffer, Some(&[0x04, 0x03][..]));
    }

    #[test]
    fn test_oversized_configuration_fails_to_encode() {
        let pipes = (0..2731u64)
            .map(|i| PipeEntry {
                handle: NumberSpec::Int(0x1000 + i),
                endpoint: 0x81,
                transfer_type: TransferTypeSpec::Bulk,
                max_packet_size: None,
                interval: 0,
            })
            .collect();
        let spec = RequestSpec::SelectConfiguration {
            interfaces: vec![InterfaceEntry {
                pipes,
                ..InterfaceEntry::default()
            }],
        };
        assert!(matches!(
            spec.encode(),
            Err(TraceError::Encode(EncodeError::LengthOverflow { length: 65600, .. }))
        ));
    }

    #[test]
    fn test_bad_setup_length() {
        let spec = RequestSpec::Control {
            setup: "8006".into(),
            timeout: None,
            transfer: TransferEntry::default(),
        };
        assert!(matches!(spec.encode(), Err(TraceError::SetupLength(2))));
    }
}
