use std::net::IpAddr;

use colored::*;
use portstream_common::{PortReport, PortStatus, Report};

use crate::terminal::colors;

type Detail = (String, ColoredString);

/// "target" or "target (instance)" when they differ.
pub fn report_title(report: &Report) -> String {
    let target = report.target.to_string();
    match report.instance {
        Some(instance) if instance.to_string() != target => format!("{target} ({instance})"),
        _ => target,
    }
}

pub fn report_details(report: &Report) -> Vec<Detail> {
    let mut details: Vec<Detail> = Vec::new();

    if let Some(instance) = report.instance {
        details.push(ip_to_detail(instance));
    }

    let contents = match &report.contents {
        Ok(contents) => contents,
        Err(e) => {
            details.push(("Error".to_string(), e.to_string().red().bold()));
            return details;
        }
    };

    if let Some(ping_result) = contents.ping_result {
        details.push(("Ping".to_string(), ping_result.to_string().normal()));
    }

    if contents.ports.is_empty() {
        details.push(("Ports".to_string(), "not scanned".dimmed()));
    }

    for port in contents.ports.values() {
        details.push(port_to_detail(port));
    }

    details
}

fn ip_to_detail(ip: IpAddr) -> Detail {
    match ip {
        IpAddr::V4(ipv4_addr) => (
            String::from("IPv4"),
            ipv4_addr.to_string().color(colors::IPV4_ADDR),
        ),
        IpAddr::V6(ipv6_addr) => (
            String::from("IPv6"),
            ipv6_addr.to_string().color(colors::IPV6_ADDR),
        ),
    }
}

fn port_to_detail(port: &PortReport) -> Detail {
    let key = format!("{}/tcp", port.port);
    let status = match port.status {
        PortStatus::Open => "open".color(colors::PORT_OPEN).bold(),
        PortStatus::Closed => "closed".color(colors::PORT_CLOSED),
    };

    let best = port
        .service_detection_conclusions
        .as_ref()
        .and_then(|conclusions| conclusions.iter().min_by_key(|c| c.certainty));

    match best {
        Some(conclusion) => {
            let service = conclusion.to_string().color(colors::SERVICE);
            (key, format!("{status} {service}").normal())
        }
        None => (key, status),
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
