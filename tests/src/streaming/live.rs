#![cfg(test)]
use crate::fixtures;
use portstream_common::{Certainty, PortStatus, StreamItem, Target};
use portstream_core::{ConnectEngine, ScanStream, SessionState};
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const NGINX_RESPONSE: &[u8] =
    b"HTTP/1.1 200 OK\r\nServer: nginx/1.25.3\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

/// Binds a port, then frees it, so nothing is listening there.
async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

#[tokio::test]
async fn connect_engine_scans_loopback() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let open = listener.local_addr().unwrap().port();
    let closed = closed_port().await;

    let config = fixtures::config_for(Target::Ipv4(Ipv4Addr::LOCALHOST), vec![open, closed]);
    let engine = ConnectEngine::with_connect_timeout(Duration::from_millis(500));
    let mut stream = ScanStream::start(&config, engine).unwrap();
    let items = fixtures::drain(&mut stream).await.unwrap();

    assert_eq!(items.len(), 2);
    let StreamItem::Report(report) = &items[0] else {
        panic!("expected a report, got {:?}", items[0]);
    };
    assert_eq!(report.instance, Some(IpAddr::V4(Ipv4Addr::LOCALHOST)));
    let contents = report.contents.as_ref().unwrap();
    assert_eq!(contents.port(open).unwrap().status, PortStatus::Open);
    assert_eq!(contents.port(closed).unwrap().status, PortStatus::Closed);
    assert_eq!(contents.ports.len(), 2);
    assert_eq!(stream.state(), SessionState::Finished);
}

#[tokio::test]
async fn connect_engine_detects_http_banner() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(async move {
        // The connect check and the HTTP check each open a connection
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let mut request = [0u8; 1024];
                let _ = socket.read(&mut request).await;
                let _ = socket.write_all(NGINX_RESPONSE).await;
            });
        }
    });

    let mut config = fixtures::config_for(Target::Ipv4(Ipv4Addr::LOCALHOST), vec![port]);
    config.set_run_service_detection(true);
    let engine = ConnectEngine::with_connect_timeout(Duration::from_secs(2));
    let mut stream = ScanStream::start(&config, engine).unwrap();
    let items = fixtures::drain(&mut stream).await.unwrap();
    server.abort();

    let StreamItem::Report(report) = &items[0] else {
        panic!("expected a report, got {:?}", items[0]);
    };
    let conclusions = report
        .contents
        .as_ref()
        .unwrap()
        .port(port)
        .and_then(|port| port.service_detection_conclusions.clone())
        .unwrap();
    assert_eq!(conclusions[0], fixtures::nginx("1.25.3"));
    assert!(conclusions
        .iter()
        .any(|c| c.certainty == Certainty::High && c.service_name == "HTTP"));
}

#[tokio::test]
#[ignore]
async fn connect_engine_resolves_hostnames() {
    let config = fixtures::config_for(Target::Hostname("localhost".to_string()), vec![1]);
    let engine = ConnectEngine::with_connect_timeout(Duration::from_millis(500));
    let mut stream = ScanStream::start(&config, engine).unwrap();
    let items = fixtures::drain(&mut stream).await.unwrap();

    assert!(items.iter().any(|item| matches!(
        item,
        StreamItem::Report(report) if report.instance.is_some_and(|ip| ip.is_loopback())
    )));
}
