#![cfg(test)]
use crate::fixtures::{self, HOST};
use portstream_common::{ConfigError, PingResult, PortStatus, ScanConfig, StreamItem, Target};
use portstream_common::wire::TargetKind;
use portstream_core::{ScanStream, ScriptedEngine, SessionState};
use std::net::{IpAddr, Ipv4Addr};

/// One host, one open and one closed port. Ports that were never configured
/// have no entry at all.
#[tokio::test]
async fn single_host_reports_open_and_closed_ports() {
    let config = fixtures::config_for(Target::Ipv4(HOST), vec![80, 1337]);
    let report = fixtures::report(
        None,
        vec![
            fixtures::port(80, PortStatus::Open),
            fixtures::port(1337, PortStatus::Closed),
        ],
    );
    let engine = ScriptedEngine::new().report(&report).finish();

    let mut stream = ScanStream::start(&config, engine).unwrap();

    let StreamItem::Report(first) = stream.next().await.unwrap() else {
        panic!("expected a report first");
    };
    assert_eq!(first.instance, Some(IpAddr::V4(HOST)));
    let contents = first.contents.unwrap();
    assert_eq!(contents.port(80).unwrap().status, PortStatus::Open);
    assert_eq!(contents.port(1337).unwrap().status, PortStatus::Closed);
    assert!(contents.port(123).is_none());

    assert_eq!(stream.next().await.unwrap(), StreamItem::Finished);
    assert_eq!(stream.state(), SessionState::Finished);
}

/// Two targets with ping enabled come back in the order the engine sent
/// them, each report tied to its own target and instance.
#[tokio::test]
async fn ping_results_keep_engine_order() {
    let other = Ipv4Addr::new(192, 168, 56, 4);
    let mut config = fixtures::config_for(Target::Ipv4(HOST), vec![22]);
    config.add_target(Target::Ipv4(other)).set_ping(true);

    let replied = fixtures::report(
        Some(PingResult::ReceivedReply),
        vec![fixtures::port(22, PortStatus::Open)],
    );
    let mut silent = fixtures::report(Some(PingResult::Timeout), Vec::new());
    silent.target = Target::Ipv4(other);
    silent.instance = Some(IpAddr::V4(other));

    let engine = ScriptedEngine::new().report(&replied).report(&silent).finish();
    let mut stream = ScanStream::start(&config, engine).unwrap();
    let items = fixtures::drain(&mut stream).await.unwrap();

    let seen: Vec<(Target, Option<IpAddr>, Option<PingResult>)> = items
        .iter()
        .filter_map(|item| match item {
            StreamItem::Report(report) => Some((
                report.target.clone(),
                report.instance,
                report.contents.as_ref().unwrap().ping_result,
            )),
            _ => None,
        })
        .collect();
    assert_eq!(
        seen,
        vec![
            (
                Target::Ipv4(HOST),
                Some(IpAddr::V4(HOST)),
                Some(PingResult::ReceivedReply)
            ),
            (
                Target::Ipv4(other),
                Some(IpAddr::V4(other)),
                Some(PingResult::Timeout)
            ),
        ]
    );
    assert_eq!(items.last(), Some(&StreamItem::Finished));
}

/// A detected service on a hostname target comes back with its advertised
/// name and version, and the report keeps the hostname it was asked for.
#[tokio::test]
async fn service_detection_reports_nginx() {
    let web_host = Target::Hostname("web".to_string());
    let mut config = fixtures::config_for(web_host.clone(), vec![80]);
    config.set_run_service_detection(true);

    let mut web = fixtures::port(80, PortStatus::Open);
    web.service_detection_conclusions = Some(vec![fixtures::nginx("1.25.3")]);
    let mut scanned = fixtures::report(None, vec![web]);
    scanned.target = web_host.clone();
    let engine = ScriptedEngine::new().report(&scanned).finish();
    let started_with = engine.started_with();

    let mut stream = ScanStream::start(&config, engine).unwrap();
    let StreamItem::Report(report) = stream.next().await.unwrap() else {
        panic!("expected a report first");
    };
    assert_eq!(report.target, web_host);
    assert_eq!(report.instance, Some(IpAddr::V4(HOST)));
    let contents = report.contents.unwrap();
    let conclusions = contents
        .port(80)
        .and_then(|port| port.service_detection_conclusions.as_ref())
        .unwrap();
    assert_eq!(conclusions[0].service_name, "nginx HTTP server");
    assert_eq!(conclusions[0].service_version.as_deref(), Some("1.25.3"));

    let native = started_with.lock().unwrap().clone().unwrap();
    assert_eq!(native.targets()[0].kind, TargetKind::Hostname);
    assert_eq!(native.targets()[0].payload, b"web".to_vec());
}

/// A reversed throttle range is refused on the spot and nothing is started.
#[tokio::test]
async fn reversed_throttle_fails_before_any_scan() {
    let mut config = ScanConfig::new();
    config.add_target(Target::Ipv4(HOST));

    assert_eq!(
        config.set_throttle(50, 10).err(),
        Some(ConfigError::InvalidThrottleRange { min: 50, max: 10 })
    );
    assert!(config.throttle().is_none());

    let engine = ScriptedEngine::new().finish();
    let started_with = engine.started_with();
    let mut stream = ScanStream::start(&config, engine).unwrap();
    assert_eq!(stream.next().await.unwrap(), StreamItem::Finished);

    let native = started_with.lock().unwrap().clone().unwrap();
    assert_eq!(native.throttle(), None);
}
