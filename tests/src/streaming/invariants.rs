#![cfg(test)]
use crate::fixtures::{self, HOST};
use portstream_common::wire::{encode_target, EncodedTarget};
use portstream_common::{PortStatus, ScanError, StreamItem, Target};
use portstream_core::{RawStreamItem, ScanStream, ScriptedEngine, SessionError, SessionState};
use std::num::NonZeroU32;
use std::sync::atomic::Ordering;
use std::time::Duration;

#[tokio::test]
async fn finished_arrives_once_and_last() {
    let config = fixtures::config_for(Target::Ipv4(HOST), vec![80]);
    let report = fixtures::report(None, vec![fixtures::port(80, PortStatus::Open)]);
    let engine = ScriptedEngine::new()
        .report(&report)
        .report(&report)
        .finish()
        .finish();

    let mut stream = ScanStream::start(&config, engine).unwrap();
    let items = fixtures::drain(&mut stream).await.unwrap();

    assert_eq!(items.iter().filter(|item| item.is_finished()).count(), 1);
    assert_eq!(items.len(), 3);
    assert_eq!(items.last(), Some(&StreamItem::Finished));
    assert_eq!(stream.next().await, Err(SessionError::StreamFinished));
    assert_eq!(stream.next().await, Err(SessionError::StreamFinished));
}

#[tokio::test]
async fn runtime_errors_do_not_end_the_stream() {
    let config = fixtures::config_for(Target::Hostname("printer.lan".to_string()), vec![80]);
    let report = fixtures::report(None, vec![fixtures::port(80, PortStatus::Closed)]);
    let engine = ScriptedEngine::new()
        .error(ScanError::FailedToResolveHostname)
        .report(&report)
        .raw(RawStreamItem {
            complete: false,
            status_code: -42,
            payload: None,
        })
        .finish();

    let mut stream = ScanStream::start(&config, engine).unwrap();
    let items = fixtures::drain(&mut stream).await.unwrap();

    assert_eq!(items[0], StreamItem::Error(ScanError::FailedToResolveHostname));
    assert!(matches!(items[1], StreamItem::Report(_)));
    assert_eq!(items[2], StreamItem::Error(ScanError::UnknownError));
    assert_eq!(items[3], StreamItem::Finished);
}

#[tokio::test]
async fn configuration_reaches_the_engine_unchanged() {
    let mut config = fixtures::config_for(Target::Ipv4(HOST), vec![443, 22, 8080]);
    let hostname = Target::Hostname("nas.lan".to_string());
    config
        .add_target(hostname.clone())
        .set_run_service_detection(true)
        .set_tracing(true);
    config.set_throttle(5, 20).unwrap();
    config.set_max_in_flight(64).unwrap();

    let engine = ScriptedEngine::new().finish();
    let started_with = engine.started_with();
    let mut stream = ScanStream::start(&config, engine).unwrap();
    fixtures::drain(&mut stream).await.unwrap();

    let native = started_with.lock().unwrap().clone().unwrap();
    let expected_targets: Vec<EncodedTarget> =
        vec![encode_target(&Target::Ipv4(HOST)), encode_target(&hostname)];
    assert_eq!(native.targets(), expected_targets.as_slice());
    assert_eq!(native.ports(), &[443, 22, 8080]);
    assert!(!native.ping());
    assert!(native.run_service_detection());
    assert!(native.tracing());
    let throttle = native.throttle().unwrap();
    assert_eq!((throttle.min_ms, throttle.max_ms), (5, 20));
    assert_eq!(native.max_in_flight(), NonZeroU32::new(64));
}

#[tokio::test]
async fn malformed_payload_aborts_the_session() {
    let config = fixtures::config_for(Target::Ipv4(HOST), vec![80]);
    let report = fixtures::report(None, vec![fixtures::port(80, PortStatus::Open)]);
    let engine = ScriptedEngine::new()
        .report(&report)
        .raw(RawStreamItem::report(vec![0x00, 0x04]))
        .report(&report)
        .finish();

    let mut stream = ScanStream::start(&config, engine).unwrap();
    assert!(matches!(stream.next().await, Ok(StreamItem::Report(_))));

    let failure = stream.next().await.unwrap_err();
    assert!(matches!(failure, SessionError::Contract(_)));
    assert_eq!(stream.state(), SessionState::Failed);
    assert_eq!(stream.next().await, Err(failure));
}

#[tokio::test]
async fn rejected_start_surfaces_once_and_releases() {
    let config = fixtures::config_for(Target::Ipv4(HOST), vec![80]);
    let engine = ScriptedEngine::new()
        .reject_start(ScanError::InsufficientPermission)
        .finish();
    let releases = engine.release_count();

    let result = ScanStream::start(&config, engine);
    assert!(matches!(
        result,
        Err(SessionError::Startup(ScanError::InsufficientPermission))
    ));
    assert_eq!(releases.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn abandoned_stream_still_releases_the_engine() {
    let config = fixtures::config_for(Target::Ipv4(HOST), vec![80]);
    let report = fixtures::report(None, vec![fixtures::port(80, PortStatus::Open)]);
    let engine = ScriptedEngine::new().report(&report).report(&report).finish();
    let releases = engine.release_count();

    let mut stream = ScanStream::start(&config, engine).unwrap();
    stream.next().await.unwrap();
    drop(stream);

    for _ in 0..200 {
        if releases.load(Ordering::SeqCst) == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(releases.load(Ordering::SeqCst), 1);
}
