//! A full-open TCP scan engine.
//!
//! Each target is expanded into its instances (resolved hostname addresses,
//! network hosts), optionally pinged, and then scanned port by port with a
//! plain `connect`. Results are wire-encoded before they reach the callback,
//! the same way a foreign engine would hand them over.

use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use portstream_common::error::ScanError;
use portstream_common::wire::encode_report;
use portstream_common::{
    PingResult, PortReport, PortStatus, Report, ReportContents, Target, Throttle,
};
use rand::seq::SliceRandom;
use tokio::sync::Semaphore;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinSet;
use tracing::{debug, error, info, trace, warn};

use super::{EngineConfig, RawStreamItem, ScanEngine};
use crate::network::{http, icmp, tcp};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(1_000);
/// Upper bound on the hosts taken from a single network target.
const MAX_NETWORK_HOSTS: usize = 1 << 16;

pub struct ConnectEngine {
    connect_timeout: Duration,
    plan: Option<ScanPlan>,
}

/// A started scan, with every target already decoded.
#[derive(Debug, Clone)]
struct ScanPlan {
    targets: Vec<Target>,
    ports: Vec<u16>,
    ping: bool,
    run_service_detection: bool,
    tracing: bool,
    throttle: Option<Throttle>,
    max_in_flight: usize,
    connect_timeout: Duration,
}

impl Default for ConnectEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectEngine {
    pub fn new() -> Self {
        Self::with_connect_timeout(DEFAULT_CONNECT_TIMEOUT)
    }

    /// How long a single connect, ping or HTTP exchange may take.
    pub fn with_connect_timeout(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            plan: None,
        }
    }
}

impl ScanEngine for ConnectEngine {
    fn start_scan(&mut self, config: EngineConfig) -> Result<(), ScanError> {
        if config.ping() && !is_root::is_root() {
            warn!("ICMP ping needs raw sockets, run as root or disable ping");
            return Err(ScanError::InsufficientPermission);
        }

        let targets = config
            .targets()
            .iter()
            .map(Target::try_from)
            .collect::<Result<Vec<_>, _>>()
            .inspect_err(|e| debug!("rejecting target: {e}"))?;

        let max_in_flight = config
            .max_in_flight()
            .map_or(Semaphore::MAX_PERMITS, |n| n.get() as usize)
            .min(Semaphore::MAX_PERMITS);

        self.plan = Some(ScanPlan {
            targets,
            ports: config.ports().to_vec(),
            ping: config.ping(),
            run_service_detection: config.run_service_detection(),
            tracing: config.tracing(),
            throttle: config.throttle(),
            max_in_flight,
            connect_timeout: self.connect_timeout,
        });
        Ok(())
    }

    fn run(&mut self, callback: &mut dyn FnMut(RawStreamItem) -> ControlFlow<()>) {
        let Some(plan) = self.plan.take() else {
            error!("run called before a successful start");
            abort_scan(callback);
            return;
        };

        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                error!("failed to build scan runtime: {e}");
                abort_scan(callback);
                return;
            }
        };

        info!(
            "scanning {} target(s) on {} port(s)",
            plan.targets.len(),
            plan.ports.len()
        );

        let stopped = runtime.block_on(async {
            let (tx, mut rx) = mpsc::unbounded_channel();
            let scan = tokio::spawn(scan_all(plan, tx));

            while let Some(report) = rx.recv().await {
                if callback(RawStreamItem::report(encode_report(&report))).is_break() {
                    scan.abort();
                    return true;
                }
            }

            match scan.await {
                Ok(()) => false,
                Err(e) => {
                    error!("scan task failed: {e}");
                    callback(RawStreamItem::error(ScanError::UnknownError)).is_break()
                }
            }
        });

        if stopped {
            debug!("session asked to stop, abandoning outstanding connections");
            runtime.shutdown_background();
            return;
        }

        let _ = callback(RawStreamItem::complete());
    }
}

/// Reports a scan that could not run at all.
fn abort_scan(callback: &mut dyn FnMut(RawStreamItem) -> ControlFlow<()>) {
    if callback(RawStreamItem::error(ScanError::UnknownError)).is_continue() {
        let _ = callback(RawStreamItem::complete());
    }
}

async fn scan_all(plan: ScanPlan, tx: UnboundedSender<Report>) {
    let plan = Arc::new(plan);
    let permits = Arc::new(Semaphore::new(plan.max_in_flight));
    let mut instances = JoinSet::new();

    for target in &plan.targets {
        let addrs = match expand(target).await {
            Ok(addrs) => addrs,
            Err(e) => {
                let _ = tx.send(Report {
                    target: target.clone(),
                    instance: None,
                    contents: Err(e),
                });
                continue;
            }
        };

        for addr in addrs {
            let plan = Arc::clone(&plan);
            let permits = Arc::clone(&permits);
            let tx = tx.clone();
            let target = target.clone();
            instances.spawn(async move {
                let contents = scan_instance(&plan, &target, addr, &permits).await;
                let _ = tx.send(Report {
                    target,
                    instance: Some(addr),
                    contents: Ok(contents),
                });
            });
        }
    }

    while let Some(joined) = instances.join_next().await {
        if let Err(e) = joined {
            error!("instance scan panicked: {e}");
        }
    }
}

/// Turns a target into the addresses to scan.
async fn expand(target: &Target) -> Result<Vec<IpAddr>, ScanError> {
    match target {
        Target::Ipv4(addr) => Ok(vec![IpAddr::V4(*addr)]),
        Target::Ipv6(addr) => Ok(vec![IpAddr::V6(*addr)]),
        Target::Ipv4Network(network) => {
            let skip_edges = network.prefix() < 31;
            let hosts = network
                .iter()
                .filter(|ip| !skip_edges || (*ip != network.network() && *ip != network.broadcast()))
                .map(IpAddr::V4);
            Ok(take_hosts(target, hosts))
        }
        Target::Ipv6Network(network) => Ok(take_hosts(target, network.iter().map(IpAddr::V6))),
        Target::Hostname(hostname) => resolve(hostname).await,
    }
}

fn take_hosts(target: &Target, hosts: impl Iterator<Item = IpAddr>) -> Vec<IpAddr> {
    let mut hosts = hosts.take(MAX_NETWORK_HOSTS + 1).collect::<Vec<_>>();
    if hosts.len() > MAX_NETWORK_HOSTS {
        warn!("{target} is larger than {MAX_NETWORK_HOSTS} hosts, scanning the first ones only");
        hosts.truncate(MAX_NETWORK_HOSTS);
    }
    hosts
}

async fn resolve(hostname: &str) -> Result<Vec<IpAddr>, ScanError> {
    let resolved = tokio::net::lookup_host((hostname, 0)).await.map_err(|e| {
        debug!("resolving {hostname} failed: {e}");
        ScanError::FailedToResolveHostname
    })?;

    let mut addrs: Vec<IpAddr> = Vec::new();
    for addr in resolved.map(|socket_addr| socket_addr.ip()) {
        if !addrs.contains(&addr) {
            addrs.push(addr);
        }
    }

    if addrs.is_empty() {
        return Err(ScanError::FailedToResolveHostname);
    }
    Ok(addrs)
}

async fn scan_instance(
    plan: &ScanPlan,
    target: &Target,
    addr: IpAddr,
    permits: &Arc<Semaphore>,
) -> ReportContents {
    let mut contents = ReportContents::default();

    if plan.ping {
        let wait = plan.connect_timeout;
        let ping_result = tokio::task::spawn_blocking(move || icmp::ping(addr, wait))
            .await
            .unwrap_or(PingResult::IoError);
        if plan.tracing {
            trace!("ping {addr}: {ping_result}");
        }
        contents.ping_result = Some(ping_result);
        if ping_result == PingResult::IoError {
            return contents;
        }
    }

    let host = match target {
        Target::Hostname(hostname) => hostname.clone(),
        _ => addr.to_string(),
    };

    let mut ports = plan.ports.clone();
    ports.shuffle(&mut rand::rng());

    let mut checks = JoinSet::new();
    for port in ports {
        if let Some(throttle) = plan.throttle {
            let pause = rand::random_range(throttle.as_range());
            tokio::time::sleep(Duration::from_millis(pause)).await;
        }

        let Ok(permit) = Arc::clone(permits).acquire_owned().await else {
            break;
        };
        let host = host.clone();
        let connect_timeout = plan.connect_timeout;
        let run_service_detection = plan.run_service_detection;
        let tracing = plan.tracing;

        checks.spawn(async move {
            let socket_addr = SocketAddr::new(addr, port);
            let status = tcp::try_connect(socket_addr, connect_timeout).await;
            if tracing {
                trace!("{socket_addr}: {status}");
            }

            let service_detection_conclusions = if !run_service_detection {
                None
            } else if status == PortStatus::Open {
                Some(http::detect_service(socket_addr, &host, connect_timeout).await)
            } else {
                Some(Vec::new())
            };
            drop(permit);

            PortReport {
                port,
                status,
                service_detection_conclusions,
            }
        });
    }

    let mut ports = BTreeMap::new();
    while let Some(joined) = checks.join_next().await {
        match joined {
            Ok(report) => {
                ports.insert(report.port, report);
            }
            Err(e) => error!("check on {addr} panicked: {e}"),
        }
    }
    contents.ports = ports;
    contents
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
