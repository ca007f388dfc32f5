use std::time::{Duration, Instant};

use anyhow::{Context, bail};
use colored::*;
use portstream_common::{Report, ScanConfig, StreamItem};
use portstream_core::{ConnectEngine, ScanStream};
use tracing::{debug, info_span, warn};

use super::ScanArgs;
use crate::terminal::{colors, format, print};

pub async fn scan(args: ScanArgs) -> anyhow::Result<()> {
    let config = build_config(&args)?;
    let engine = ConnectEngine::with_connect_timeout(Duration::from_millis(args.timeout));

    let start_time = Instant::now();
    let mut stream = ScanStream::start_in(&config, engine, info_span!("scan"))
        .context("scan did not start")?;
    debug!(session = stream.session().id(), "scan running");

    let mut summary = Summary::default();
    loop {
        match stream.next().await? {
            StreamItem::Report(report) => {
                summary.record(&report);
                print_report(summary.reports, &report);
            }
            StreamItem::Error(e) => {
                summary.errors += 1;
                warn!("engine reported an error: {e}");
            }
            StreamItem::Finished => break,
        }
    }

    print_summary(&summary, start_time.elapsed());
    Ok(())
}

fn build_config(args: &ScanArgs) -> anyhow::Result<ScanConfig> {
    let mut config = ScanConfig::new();
    for target in &args.targets {
        config.add_target(target.clone());
    }
    config
        .set_port_list(parse_ports(&args.ports)?)
        .set_ping(args.ping)
        .set_run_service_detection(args.service_detection)
        .set_tracing(args.trace);
    if let Some(throttle) = args.throttle {
        config.set_throttle(throttle.min_ms, throttle.max_ms)?;
    }
    if let Some(max_in_flight) = args.max_in_flight {
        config.set_max_in_flight(max_in_flight)?;
    }
    Ok(config)
}

/// Parses "22,80,8000-8080" into a list of ports, keeping the given order.
pub fn parse_ports(list: &str) -> anyhow::Result<Vec<u16>> {
    let mut ports: Vec<u16> = Vec::new();
    for part in list.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        match part.split_once('-') {
            Some((first, last)) => {
                let first: u16 = first.trim().parse().with_context(|| format!("bad port '{first}'"))?;
                let last: u16 = last.trim().parse().with_context(|| format!("bad port '{last}'"))?;
                if first > last {
                    bail!("port range {first}-{last} is reversed");
                }
                ports.extend(first..=last);
            }
            None => ports.push(part.parse().with_context(|| format!("bad port '{part}'"))?),
        }
    }
    if ports.is_empty() {
        bail!("no ports given");
    }
    Ok(ports)
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Summary {
    reports: usize,
    unreachable: usize,
    open_ports: usize,
    errors: usize,
}

impl Summary {
    fn record(&mut self, report: &Report) {
        self.reports += 1;
        match &report.contents {
            Ok(contents) => self.open_ports += contents.open_ports().count(),
            Err(_) => self.unreachable += 1,
        }
    }
}

fn print_report(idx: usize, report: &Report) {
    print::tree_head(idx, &format::report_title(report));
    print::as_tree_one_level(format::report_details(report));
}

fn print_summary(summary: &Summary, total_time: Duration) {
    if summary.reports == 0 {
        print::header("nothing to report");
        return;
    }

    let open_ports: ColoredString = format!("{} open ports", summary.open_ports).bold().green();
    let reports: ColoredString = format!("{} instances", summary.reports).bold();
    let total_time: ColoredString = format!("{:.2}s", total_time.as_secs_f64()).bold().yellow();
    let output = format!("Scan Complete: {open_ports} across {reports} in {total_time}")
        .color(colors::TEXT_DEFAULT);

    print::fat_separator();
    print::centerln(&output.to_string());
    if summary.unreachable + summary.errors > 0 {
        warn!(
            "{} instance(s) could not be scanned, {} error(s) reported",
            summary.unreachable, summary.errors
        );
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
