//! Target descriptors as the engine expects them: a one byte discriminant and
//! a packed payload.

use crate::error::{DecodeError, ScanError};
use crate::network::target::Target;

use super::{WireReader, WireWriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TargetKind {
    Ipv4 = 0,
    Ipv6 = 1,
    Ipv4Network = 2,
    Ipv6Network = 3,
    Hostname = 4,
}

impl TryFrom<u8> for TargetKind {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TargetKind::Ipv4),
            1 => Ok(TargetKind::Ipv6),
            2 => Ok(TargetKind::Ipv4Network),
            3 => Ok(TargetKind::Ipv6Network),
            4 => Ok(TargetKind::Hostname),
            value => Err(DecodeError::Discriminant {
                field: "target kind",
                value,
            }),
        }
    }
}

/// A target in engine format.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EncodedTarget {
    pub kind: TargetKind,
    pub payload: Vec<u8>,
}

impl EncodedTarget {
    pub(crate) fn write(&self, writer: &mut WireWriter) {
        writer
            .write_u8(self.kind as u8)
            .write_buffer(Some(self.payload.as_slice()));
    }

    pub(crate) fn read(reader: &mut WireReader<'_>) -> Result<Self, DecodeError> {
        let kind = TargetKind::try_from(reader.read_u8()?)?;
        let payload = reader
            .read_buffer()?
            .map(<[u8]>::to_vec)
            .unwrap_or_default();
        Ok(Self { kind, payload })
    }
}

/// Packs a target. Hostnames are copied byte for byte, whatever they hold.
pub fn encode_target(target: &Target) -> EncodedTarget {
    let (kind, payload) = match target {
        Target::Ipv4(addr) => (TargetKind::Ipv4, addr.octets().to_vec()),
        Target::Ipv6(addr) => (TargetKind::Ipv6, addr.octets().to_vec()),
        Target::Ipv4Network(network) => {
            let mut payload = network.ip().octets().to_vec();
            payload.push(network.prefix());
            (TargetKind::Ipv4Network, payload)
        }
        Target::Ipv6Network(network) => {
            let mut payload = network.ip().octets().to_vec();
            payload.push(network.prefix());
            (TargetKind::Ipv6Network, payload)
        }
        Target::Hostname(hostname) => (TargetKind::Hostname, hostname.as_bytes().to_vec()),
    };
    EncodedTarget { kind, payload }
}

impl TryFrom<&EncodedTarget> for Target {
    type Error = ScanError;

    /// Rebuilds a target through the byte-level constructors.
    fn try_from(encoded: &EncodedTarget) -> Result<Self, Self::Error> {
        let payload = encoded.payload.as_slice();
        match encoded.kind {
            TargetKind::Ipv4 => Target::new_ip_v4_address(payload),
            TargetKind::Ipv6 => Target::new_ip_v6_address(payload),
            TargetKind::Ipv4Network | TargetKind::Ipv6Network => {
                let (prefix, address) = payload.split_last().ok_or(ScanError::InvalidLength)?;
                if encoded.kind == TargetKind::Ipv4Network {
                    Target::new_ip_v4_network(address, *prefix)
                } else {
                    Target::new_ip_v6_network(address, *prefix)
                }
            }
            TargetKind::Hostname => Target::new_hostname(payload),
        }
    }
}

/// Unpacks a target, applying the same checks as the [`Target`] constructors.
pub fn decode_target(encoded: &EncodedTarget) -> Result<Target, DecodeError> {
    Target::try_from(encoded).map_err(|e| match e {
        ScanError::InvalidUtf8 => DecodeError::InvalidUtf8 { field: "hostname" },
        _ => invalid_length(encoded),
    })
}

fn invalid_length(encoded: &EncodedTarget) -> DecodeError {
    DecodeError::Length {
        what: "target payload",
        len: encoded.payload.len(),
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
