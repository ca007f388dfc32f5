//! # Engine Boundary
//!
//! The contract between a session and the component that actually scans the
//! network. An engine is handed a native configuration, is driven on a
//! dedicated worker thread, and reports every scan event through a
//! synchronous callback as a [`RawStreamItem`].
//!
//! Ownership replaces the manual `free_*` calls of a C ABI:
//! * [`EngineConfig`] is released when dropped.
//! * each [`RawStreamItem`] is moved into the callback and released by the
//!   session right after it has been decoded.
//! * the scan handle is released through [`ScanEngine::free_scan`], which the
//!   session calls exactly once.

use std::num::NonZeroU32;
use std::ops::ControlFlow;

use portstream_common::error::{ConfigError, STATUS_OK, ScanError};
use portstream_common::wire::{EncodedTarget, encode_target};
use portstream_common::{ScanConfig, Throttle};

pub mod connect;
pub mod scripted;

pub use connect::ConnectEngine;
pub use scripted::ScriptedEngine;

/// One callback payload: a completion marker, an error status, or a
/// successful status with a report buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStreamItem {
    pub complete: bool,
    pub status_code: i8,
    pub payload: Option<Vec<u8>>,
}

impl RawStreamItem {
    /// A successful item holding an encoded report.
    pub fn report(buffer: Vec<u8>) -> Self {
        Self {
            complete: false,
            status_code: STATUS_OK,
            payload: Some(buffer),
        }
    }

    pub fn error(error: ScanError) -> Self {
        Self {
            complete: false,
            status_code: error.code(),
            payload: None,
        }
    }

    /// The marker an engine sends exactly once, last.
    pub fn complete() -> Self {
        Self {
            complete: true,
            status_code: STATUS_OK,
            payload: None,
        }
    }

    pub fn payload_len(&self) -> usize {
        self.payload.as_ref().map_or(0, Vec::len)
    }
}

/// The native configuration handle, filled the way a caller would fill it
/// through the engine ABI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    targets: Vec<EncodedTarget>,
    ports: Vec<u16>,
    ping: bool,
    run_service_detection: bool,
    tracing: bool,
    throttle: Option<Throttle>,
    max_in_flight: Option<NonZeroU32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self {
            targets: Vec::new(),
            ports: Vec::new(),
            ping: false,
            run_service_detection: false,
            tracing: false,
            throttle: None,
            max_in_flight: None,
        }
    }

    /// Translates a validated [`ScanConfig`] into engine format.
    pub fn from_config(config: &ScanConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut native = Self::new();
        for target in config.targets() {
            native.add_target(encode_target(target));
        }
        native.set_port_list(config.ports());
        native.set_ping(config.ping());
        native.set_run_service_detection(config.run_service_detection());
        native.set_tracing(config.tracing());
        if let Some(throttle) = config.throttle() {
            native.set_throttle(throttle.min_ms, throttle.max_ms)?;
        }
        native.set_max_in_flight(config.max_in_flight());
        Ok(native)
    }

    pub fn add_target(&mut self, target: EncodedTarget) {
        self.targets.push(target);
    }

    pub fn set_port_list(&mut self, ports: &[u16]) {
        self.ports = ports.to_vec();
    }

    pub fn set_ping(&mut self, ping: bool) {
        self.ping = ping;
    }

    pub fn set_run_service_detection(&mut self, run_service_detection: bool) {
        self.run_service_detection = run_service_detection;
    }

    pub fn set_tracing(&mut self, tracing: bool) {
        self.tracing = tracing;
    }

    pub fn set_throttle(&mut self, min_ms: u64, max_ms: u64) -> Result<(), ConfigError> {
        self.throttle = Some(Throttle::new(min_ms, max_ms)?);
        Ok(())
    }

    pub fn set_max_in_flight(&mut self, max_in_flight: NonZeroU32) {
        self.max_in_flight = Some(max_in_flight);
    }

    pub fn targets(&self) -> &[EncodedTarget] {
        &self.targets
    }

    pub fn ports(&self) -> &[u16] {
        &self.ports
    }

    pub fn ping(&self) -> bool {
        self.ping
    }

    pub fn run_service_detection(&self) -> bool {
        self.run_service_detection
    }

    pub fn tracing(&self) -> bool {
        self.tracing
    }

    pub fn throttle(&self) -> Option<Throttle> {
        self.throttle
    }

    pub fn max_in_flight(&self) -> Option<NonZeroU32> {
        self.max_in_flight
    }
}

/// A scan engine as seen from a session.
///
/// The session calls [`start_scan`](ScanEngine::start_scan) on the caller's
/// thread, then moves the engine onto its worker thread and calls
/// [`run`](ScanEngine::run) once. `run` must invoke the callback zero or more
/// times and then exactly once with [`RawStreamItem::complete`]. The callback
/// never blocks. When it answers [`ControlFlow::Break`] the session has no use
/// for further items and `run` should return as soon as it can.
pub trait ScanEngine: Send + 'static {
    /// Accepts or rejects a configuration before any item is produced.
    fn start_scan(&mut self, config: EngineConfig) -> Result<(), ScanError>;

    /// Runs the scan loop to completion, or until the callback breaks.
    fn run(&mut self, callback: &mut dyn FnMut(RawStreamItem) -> ControlFlow<()>);

    /// Releases the scan handle and everything the engine still holds.
    fn free_scan(self)
    where
        Self: Sized,
    {
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
