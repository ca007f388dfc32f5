#![cfg(test)]
use portstream_common::{
    Certainty, PingResult, PortReport, PortStatus, Report, ReportContents, ScanConfig,
    ServiceDetectionConclusion, StreamItem, Target,
};
use portstream_core::{ScanStream, SessionError};
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};

pub const HOST: Ipv4Addr = Ipv4Addr::new(192, 168, 56, 3);

pub fn config_for(target: Target, ports: Vec<u16>) -> ScanConfig {
    let mut config = ScanConfig::new();
    config.add_target(target).set_port_list(ports);
    config
}

pub fn port(port: u16, status: PortStatus) -> PortReport {
    PortReport {
        port,
        status,
        service_detection_conclusions: None,
    }
}

pub fn report(ping_result: Option<PingResult>, ports: Vec<PortReport>) -> Report {
    let ports: BTreeMap<u16, PortReport> = ports.into_iter().map(|p| (p.port, p)).collect();
    Report {
        target: Target::Ipv4(HOST),
        instance: Some(IpAddr::V4(HOST)),
        contents: Ok(ReportContents { ping_result, ports }),
    }
}

pub fn nginx(version: &str) -> ServiceDetectionConclusion {
    ServiceDetectionConclusion {
        certainty: Certainty::Advertised,
        service_name: "nginx HTTP server".to_string(),
        service_version: Some(version.to_string()),
    }
}

/// Pulls items until the stream finishes or fails.
pub async fn drain(stream: &mut ScanStream) -> Result<Vec<StreamItem>, SessionError> {
    let mut items = Vec::new();
    loop {
        let item = stream.next().await?;
        let finished = item.is_finished();
        items.push(item);
        if finished {
            return Ok(items);
        }
    }
}
