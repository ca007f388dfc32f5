//! Report buffers. Layout, in order:
//!
//! ```text
//! target      u8 kind, buffer payload
//! instance    u8 tag (0 none, 4 IPv4, 6 IPv6), then the octets
//! status      i8, 0 for success
//! ping        u8, 0xFF when absent          (success only)
//! ports       array of port reports          (success only)
//! ```

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::error::{DecodeError, STATUS_OK, ScanError};
use crate::report::{
    Certainty, PingResult, PortReport, PortStatus, Report, ReportContents,
    ServiceDetectionConclusion,
};

use super::target::{EncodedTarget, decode_target, encode_target};
use super::{WireReader, WireWriter};

const INSTANCE_NONE: u8 = 0;
const INSTANCE_V4: u8 = 4;
const INSTANCE_V6: u8 = 6;
const PING_ABSENT: u8 = 0xFF;

/// Serializes a report the way an engine hands it over.
pub fn encode_report(report: &Report) -> Vec<u8> {
    let mut writer = WireWriter::new();
    encode_target(&report.target).write(&mut writer);

    match report.instance {
        None => {
            writer.write_u8(INSTANCE_NONE);
        }
        Some(IpAddr::V4(addr)) => {
            writer.write_u8(INSTANCE_V4).write_bytes(&addr.octets());
        }
        Some(IpAddr::V6(addr)) => {
            writer.write_u8(INSTANCE_V6).write_bytes(&addr.octets());
        }
    }

    match &report.contents {
        Err(e) => {
            writer.write_i8(e.code());
        }
        Ok(contents) => {
            writer.write_i8(STATUS_OK);
            writer.write_u8(contents.ping_result.map_or(PING_ABSENT, ping_tag));
            let ports: Vec<&PortReport> = contents.ports.values().collect();
            writer.write_seq(Some(ports.as_slice()), |w, port| write_port(w, port));
        }
    }

    writer.into_bytes()
}

/// Parses a report buffer. The buffer must be consumed exactly.
pub fn decode_report(buffer: &[u8]) -> Result<Report, DecodeError> {
    let mut reader = WireReader::new(buffer);
    let target = decode_target(&EncodedTarget::read(&mut reader)?)?;
    let instance = read_instance(&mut reader)?;

    let contents = match reader.read_i8()? {
        STATUS_OK => Ok(read_contents(&mut reader)?),
        code => Err(ScanError::from_code(code)),
    };

    reader.finish("report")?;
    Ok(Report {
        target,
        instance,
        contents,
    })
}

fn read_instance(reader: &mut WireReader<'_>) -> Result<Option<IpAddr>, DecodeError> {
    match reader.read_u8()? {
        INSTANCE_NONE => Ok(None),
        INSTANCE_V4 => {
            let octets: [u8; 4] = reader
                .read_bytes(4)?
                .try_into()
                .map_err(|_| DecodeError::Length { what: "instance", len: 4 })?;
            Ok(Some(IpAddr::V4(Ipv4Addr::from(octets))))
        }
        INSTANCE_V6 => {
            let octets: [u8; 16] = reader
                .read_bytes(16)?
                .try_into()
                .map_err(|_| DecodeError::Length { what: "instance", len: 16 })?;
            Ok(Some(IpAddr::V6(Ipv6Addr::from(octets))))
        }
        value => Err(DecodeError::Discriminant {
            field: "instance",
            value,
        }),
    }
}

fn read_contents(reader: &mut WireReader<'_>) -> Result<ReportContents, DecodeError> {
    let ping_result = match reader.read_u8()? {
        PING_ABSENT => None,
        tag => Some(ping_from_tag(tag)?),
    };

    // A null port array means the engine never got to the port scan
    let mut ports = BTreeMap::new();
    for port in reader.read_seq(read_port)?.unwrap_or_default() {
        let number = port.port;
        if ports.insert(number, port).is_some() {
            return Err(DecodeError::DuplicatePort(number));
        }
    }

    Ok(ReportContents { ping_result, ports })
}

fn read_port(reader: &mut WireReader<'_>) -> Result<PortReport, DecodeError> {
    let port = reader.read_u16()?;
    let status = match reader.read_u8()? {
        0 => PortStatus::Open,
        1 => PortStatus::Closed,
        value => {
            return Err(DecodeError::Discriminant {
                field: "port status",
                value,
            });
        }
    };
    let service_detection_conclusions = reader.read_seq(read_conclusion)?;
    Ok(PortReport {
        port,
        status,
        service_detection_conclusions,
    })
}

fn write_port(writer: &mut WireWriter, port: &PortReport) {
    let status = match port.status {
        PortStatus::Open => 0,
        PortStatus::Closed => 1,
    };
    writer.write_u16(port.port).write_u8(status);
    writer.write_seq(port.service_detection_conclusions.as_deref(), write_conclusion);
}

fn read_conclusion(reader: &mut WireReader<'_>) -> Result<ServiceDetectionConclusion, DecodeError> {
    let certainty = match reader.read_u8()? {
        0 => Certainty::Advertised,
        1 => Certainty::High,
        2 => Certainty::Medium,
        3 => Certainty::Low,
        value => {
            return Err(DecodeError::Discriminant {
                field: "certainty",
                value,
            });
        }
    };
    let service_name = reader.read_string("service_name")?.unwrap_or_default();
    let service_version = reader.read_string("service_version")?;
    Ok(ServiceDetectionConclusion {
        certainty,
        service_name,
        service_version,
    })
}

fn write_conclusion(writer: &mut WireWriter, conclusion: &ServiceDetectionConclusion) {
    let certainty = match conclusion.certainty {
        Certainty::Advertised => 0,
        Certainty::High => 1,
        Certainty::Medium => 2,
        Certainty::Low => 3,
    };
    writer
        .write_u8(certainty)
        .write_string(Some(conclusion.service_name.as_str()))
        .write_string(conclusion.service_version.as_deref());
}

fn ping_tag(ping: PingResult) -> u8 {
    match ping {
        PingResult::ReceivedReply => 0,
        PingResult::IoError => 1,
        PingResult::Timeout => 2,
    }
}

fn ping_from_tag(tag: u8) -> Result<PingResult, DecodeError> {
    match tag {
        0 => Ok(PingResult::ReceivedReply),
        1 => Ok(PingResult::IoError),
        2 => Ok(PingResult::Timeout),
        value => Err(DecodeError::Discriminant {
            field: "ping result",
            value,
        }),
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
