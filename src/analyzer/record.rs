//! Normalized description of one observed request.

use super::walker::{WalkError, WalkSummary};
use crate::model::{
    DescriptorRequestKind, DescriptorType, Direction, EndpointDescriptor, PipeHandle, UrbFunction,
};
use crate::urb::{SetupPacket, TransferFlags, UrbError};
use std::borrow::Cow;
use std::fmt;

/// Which leg of its round trip a request was observed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// On the way down to the bus driver.
    Submit,
    /// Returning from the bus driver.
    Complete,
}

impl Phase {
    /// `post` is false on the way down and true on the way back.
    pub fn from_post(post: bool) -> Self {
        if post { Self::Complete } else { Self::Submit }
    }

    pub fn is_post(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::Submit => "submit",
            Self::Complete => "complete",
        })
    }
}

/// What happened to a select-configuration request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationOutcome {
    /// Seen on the way down; pipe handles are not assigned yet.
    Pending,
    Registered(WalkSummary),
    Rejected(WalkError),
}

/// Kind-specific fields of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferKind {
    SelectConfiguration(ConfigurationOutcome),
    Control {
        setup: SetupPacket,
        flags: TransferFlags,
        /// Only set for the extended variant.
        timeout_ms: Option<u32>,
    },
    BulkOrInterrupt {
        flags: TransferFlags,
    },
    Isochronous {
        flags: TransferFlags,
        packet_count: u32,
        start_frame: u32,
        error_count: u32,
    },
    Descriptor {
        request: DescriptorRequestKind,
        descriptor_type: DescriptorType,
        index: u8,
        language_id: u16,
    },
    Unknown {
        function: u16,
    },
    /// The bytes did not fit the layout of their function code. `function`
    /// is `None` when the buffer is too short to hold one.
    Malformed {
        function: Option<u16>,
        error: UrbError,
    },
}

impl TransferKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SelectConfiguration(_) => "SELECT_CONFIGURATION",
            Self::Control {
                timeout_ms: Some(_),
                ..
            } => "CONTROL_EX",
            Self::Control { .. } => "CONTROL",
            Self::BulkOrInterrupt { .. } => "BULK_OR_INTERRUPT",
            Self::Isochronous { .. } => "ISOCH",
            Self::Descriptor { .. } => "DESCRIPTOR",
            Self::Unknown { .. } => "UNKNOWN",
            Self::Malformed { .. } => "MALFORMED",
        }
    }

    /// Transfer direction, where the request kind carries one.
    pub fn direction(&self) -> Option<Direction> {
        match self {
            Self::Control { setup, .. } => Some(setup.direction()),
            Self::BulkOrInterrupt { flags } | Self::Isochronous { flags, .. } => {
                Some(flags.direction())
            }
            Self::Descriptor { request, .. } => Some(if request.set {
                Direction::Out
            } else {
                Direction::In
            }),
            Self::SelectConfiguration(_) | Self::Unknown { .. } | Self::Malformed { .. } => None,
        }
    }
}

/// One analyzed request.
///
/// Borrows the transfer buffer from the request it describes; use
/// [`TransferRecord::into_owned`] to keep it past the request's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRecord<'a> {
    pub phase: Phase,
    pub function: UrbFunction,
    pub status: u32,
    pub pipe: Option<PipeHandle>,
    /// Registry entry for `pipe`, when one was found.
    pub endpoint: Option<EndpointDescriptor>,
    /// `TransferBufferLength` as found in the request.
    pub buffer_length: Option<u32>,
    /// Buffer contents; `None` for a null buffer pointer.
    pub buffer: Option<Cow<'a, [u8]>>,
    pub kind: TransferKind,
}

impl<'a> TransferRecord<'a> {
    /// Record with no pipe, buffer or endpoint context.
    pub fn bare(phase: Phase, function: UrbFunction, status: u32, kind: TransferKind) -> Self {
        Self {
            phase,
            function,
            status,
            pipe: None,
            endpoint: None,
            buffer_length: None,
            buffer: None,
            kind,
        }
    }

    /// Detach from the request buffer, keeping at most `max_bytes` of it.
    pub fn into_owned(self, max_bytes: usize) -> TransferRecord<'static> {
        TransferRecord {
            phase: self.phase,
            function: self.function,
            status: self.status,
            pipe: self.pipe,
            endpoint: self.endpoint,
            buffer_length: self.buffer_length,
            buffer: self.buffer.map(|data| {
                let keep = data.len().min(max_bytes);
                Cow::Owned(data[..keep].to_vec())
            }),
            kind: self.kind,
        }
    }

    pub fn direction(&self) -> Option<Direction> {
        self.kind.direction()
    }
}

impl fmt::Display for TransferRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<8} {:<18}", self.phase, self.kind.name())?;
        if let Some(pipe) = self.pipe {
            write!(f, " pipe {}", pipe)?;
        }
        match &self.endpoint {
            Some(endpoint) => write!(f, " [{}]", endpoint)?,
            None if self.pipe.is_some_and(|p| !p.is_null()) => write!(f, " [unknown endpoint]")?,
            None => {}
        }
        if let Some(length) = self.buffer_length {
            write!(f, " len {}", length)?;
            if self.buffer.is_none() {
                write!(f, " (no buffer)")?;
            }
        }
        match &self.kind {
            TransferKind::SelectConfiguration(ConfigurationOutcome::Pending) => {
                write!(f, " pending")?
            }
            TransferKind::SelectConfiguration(ConfigurationOutcome::Registered(summary)) => write!(
                f,
                " {} interface(s), {} pipe(s)",
                summary.interfaces, summary.pipes
            )?,
            TransferKind::SelectConfiguration(ConfigurationOutcome::Rejected(err)) => {
                write!(f, " rejected: {}", err)?
            }
            TransferKind::Control { setup, .. } => write!(f, " {}", setup)?,
            TransferKind::Isochronous { packet_count, .. } => {
                write!(f, " packets {}", packet_count)?
            }
            TransferKind::Descriptor {
                request,
                descriptor_type,
                index,
                language_id,
            } => write!(
                f,
                " {} type {} index {} lang {:#06x}",
                request, descriptor_type, index, language_id
            )?,
            TransferKind::Unknown { .. } => write!(f, " {}", self.function)?,
            TransferKind::Malformed {
                function: Some(_),
                error,
            } => write!(f, " {}: {}", self.function, error)?,
            TransferKind::Malformed { error, .. } => write!(f, " {}", error)?,
            TransferKind::BulkOrInterrupt { .. } => {}
        }
        if self.status != 0 {
            write!(f, " status {:#010x}", self.status)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_from_post() {
        assert_eq!(Phase::from_post(false), Phase::Submit);
        assert_eq!(Phase::from_post(true), Phase::Complete);
        assert!(Phase::Complete.is_post());
    }

    #[test]
    fn test_into_owned_caps_buffer() {
        let data = [0u8; 32];
        let record = TransferRecord {
            buffer_length: Some(32),
            buffer: Some(Cow::Borrowed(&data[..])),
            ..TransferRecord::bare(
                Phase::Complete,
                UrbFunction::BulkOrInterruptTransfer,
                0,
                TransferKind::BulkOrInterrupt {
                    flags: TransferFlags::DIRECTION_IN,
                },
            )
        };
        let owned = record.into_owned(8);
        assert_eq!(owned.buffer.as_deref().map(<[u8]>::len), Some(8));
        assert_eq!(owned.buffer_length, Some(32));
        assert_eq!(owned.direction(), Some(Direction::In));
    }

    #[test]
    fn test_display_unknown() {
        let record = TransferRecord::bare(
            Phase::Submit,
            UrbFunction::Unknown(0x0002),
            0,
            TransferKind::Unknown { function: 0x0002 },
        );
        assert_eq!(record.to_string(), "submit   UNKNOWN            ABORT_PIPE");
    }

    #[test]
    fn test_display_malformed() {
        let record = TransferRecord::bare(
            Phase::Complete,
            UrbFunction::BulkOrInterruptTransfer,
            0,
            TransferKind::Malformed {
                function: Some(0x0009),
                error: UrbError::Truncated {
                    offset: 16,
                    needed: 8,
                    available: 4,
                },
            },
        );
        assert_eq!(
            record.to_string(),
            "complete MALFORMED          BULK_OR_INTERRUPT_TRANSFER: truncated at offset 16: need 8 bytes, 4 available"
        );
        assert_eq!(record.direction(), None);
    }
}
