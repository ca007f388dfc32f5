//! # Scan Results
//!
//! Everything a consumer receives from a scan. A session produces a stream of
//! [`StreamItem`]s: one [`Report`] per scanned instance, runtime errors as
//! they happen, and exactly one [`StreamItem::Finished`] at the very end.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::net::IpAddr;

use crate::error::ScanError;
use crate::network::target::Target;

/// Outcome of pinging a host. Only present when ping was enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PingResult {
    ReceivedReply,
    IoError,
    Timeout,
}

/// How sure a service detection conclusion is.
///
/// Variants are declared from most to least confident, so sorting ascending
/// puts the strongest conclusion first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Certainty {
    /// Taken from a banner or version header. Could still be spoofed.
    Advertised,
    High,
    Medium,
    /// More likely than not.
    Low,
}

/// One guess about the service listening on a port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceDetectionConclusion {
    pub certainty: Certainty,
    pub service_name: String,
    pub service_version: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortStatus {
    Open,
    Closed,
}

/// The status of an individual port that was scanned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortReport {
    pub port: u16,
    pub status: PortStatus,
    /// `None` when detection was not requested. `Some(vec![])` when it ran
    /// and could not conclude anything.
    pub service_detection_conclusions: Option<Vec<ServiceDetectionConclusion>>,
}

/// Detailed results for a target that was actually scanned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportContents {
    pub ping_result: Option<PingResult>,
    /// One entry per scanned port.
    pub ports: BTreeMap<u16, PortReport>,
}

impl ReportContents {
    /// Looks up a port. Ports that were never configured have no entry.
    pub fn port(&self, port: u16) -> Option<&PortReport> {
        self.ports.get(&port)
    }

    pub fn open_ports(&self) -> impl Iterator<Item = &PortReport> {
        self.ports
            .values()
            .filter(|report| report.status == PortStatus::Open)
    }
}

/// What happened to one instance of a target.
///
/// `contents` is either fully populated or an error, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// The target as the caller configured it.
    pub target: Target,
    /// The address that was actually scanned. Absent when a hostname
    /// never resolved.
    pub instance: Option<IpAddr>,
    pub contents: Result<ReportContents, ScanError>,
}

/// One unit of the result stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamItem {
    Report(Report),
    /// A recoverable error. The stream keeps going after it.
    Error(ScanError),
    /// Terminal marker, always the last item of a stream.
    Finished,
}

impl StreamItem {
    pub fn is_finished(&self) -> bool {
        matches!(self, StreamItem::Finished)
    }
}

impl Display for PingResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            PingResult::ReceivedReply => "reply received",
            PingResult::IoError => "i/o error",
            PingResult::Timeout => "timed out",
        };
        f.write_str(s)
    }
}

impl Display for Certainty {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            Certainty::Advertised => "advertised",
            Certainty::High => "high",
            Certainty::Medium => "medium",
            Certainty::Low => "low",
        };
        f.write_str(s)
    }
}

impl Display for ServiceDetectionConclusion {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.service_name)?;
        if let Some(version) = &self.service_version {
            write!(f, " {version}")?;
        }
        write!(f, " ({})", self.certainty)
    }
}

impl Display for PortStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PortStatus::Open => f.write_str("open"),
            PortStatus::Closed => f.write_str("closed"),
        }
    }
}

impl Display for PortReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/tcp {}", self.port, self.status)?;
        if let Some(best) = self
            .service_detection_conclusions
            .as_ref()
            .and_then(|conclusions| conclusions.iter().min_by_key(|c| c.certainty))
        {
            write!(f, " {best}")?;
        }
        Ok(())
    }
}

impl Display for Report {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.target)?;
        if let Some(instance) = self.instance {
            if self.target != Target::from(instance) {
                write!(f, " ({instance})")?;
            }
        }
        match &self.contents {
            Err(e) => write!(f, ": {e}"),
            Ok(contents) => {
                if let Some(ping) = contents.ping_result {
                    write!(f, " ping {ping}")?;
                }
                for port in contents.ports.values() {
                    write!(f, "\n  {port}")?;
                }
                Ok(())
            }
        }
    }
}

impl Display for StreamItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            StreamItem::Report(report) => report.fmt(f),
            StreamItem::Error(e) => write!(f, "scan error: {e}"),
            StreamItem::Finished => f.write_str("scan finished"),
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn port(port: u16, status: PortStatus) -> PortReport {
        PortReport {
            port,
            status,
            service_detection_conclusions: None,
        }
    }

    #[test]
    fn certainty_orders_most_confident_first() {
        let mut levels = vec![Certainty::Low, Certainty::Advertised, Certainty::Medium, Certainty::High];
        levels.sort();
        assert_eq!(
            levels,
            vec![Certainty::Advertised, Certainty::High, Certainty::Medium, Certainty::Low]
        );
    }

    #[test]
    fn unconfigured_port_has_no_entry() {
        let mut contents = ReportContents::default();
        contents.ports.insert(80, port(80, PortStatus::Open));
        contents.ports.insert(1337, port(1337, PortStatus::Closed));

        assert_eq!(contents.port(80).map(|p| p.status), Some(PortStatus::Open));
        assert!(contents.port(123).is_none());
        assert_eq!(contents.open_ports().count(), 1);
    }

    #[test]
    fn report_display() {
        let mut contents = ReportContents {
            ping_result: Some(PingResult::ReceivedReply),
            ..Default::default()
        };
        let mut http = port(80, PortStatus::Open);
        http.service_detection_conclusions = Some(vec![
            ServiceDetectionConclusion {
                certainty: Certainty::Low,
                service_name: "http".to_string(),
                service_version: None,
            },
            ServiceDetectionConclusion {
                certainty: Certainty::Advertised,
                service_name: "nginx".to_string(),
                service_version: Some("1.25.3".to_string()),
            },
        ]);
        contents.ports.insert(80, http);

        let addr = Ipv4Addr::new(192, 168, 56, 3);
        let report = Report {
            target: Target::Ipv4(addr),
            instance: Some(addr.into()),
            contents: Ok(contents),
        };
        assert_eq!(
            report.to_string(),
            "192.168.56.3 ping reply received\n  80/tcp open nginx 1.25.3 (advertised)"
        );

        let failed = Report {
            target: Target::Hostname("nowhere.invalid".to_string()),
            instance: None,
            contents: Err(ScanError::FailedToResolveHostname),
        };
        assert_eq!(failed.to_string(), "nowhere.invalid: failed to resolve hostname");
    }
}
