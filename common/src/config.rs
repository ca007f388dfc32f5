//! # Scan Configuration
//!
//! A mutable builder that collects everything an engine needs before a scan
//! starts. Invalid values are rejected at the setter, so a [`ScanConfig`] that
//! reaches a session is already consistent.

use std::num::NonZeroU32;
use std::ops::RangeInclusive;

use crate::error::ConfigError;
use crate::network::target::Target;
use crate::wire::EncodedTarget;

const DEFAULT_PORT: u16 = 80;
const DEFAULT_MAX_IN_FLIGHT: NonZeroU32 = NonZeroU32::new(500_000).unwrap();

/// Bounds, in milliseconds, of the random pause an engine takes between connection attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throttle {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl Throttle {
    pub fn new(min_ms: u64, max_ms: u64) -> Result<Self, ConfigError> {
        if min_ms > max_ms {
            return Err(ConfigError::InvalidThrottleRange {
                min: min_ms,
                max: max_ms,
            });
        }
        Ok(Self { min_ms, max_ms })
    }

    pub fn as_range(&self) -> RangeInclusive<u64> {
        self.min_ms..=self.max_ms
    }
}

/// All parameters for a scan.
///
/// The defaults are the defaults for every caller: port 80, no ping, no
/// service detection, no throttle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    targets: Vec<Target>,
    ports: Vec<u16>,
    ping: bool,
    run_service_detection: bool,
    tracing: bool,
    throttle: Option<Throttle>,
    max_in_flight: NonZeroU32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            ports: vec![DEFAULT_PORT],
            ping: false,
            run_service_detection: false,
            tracing: false,
            throttle: None,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

impl ScanConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a target given in engine format. A malformed payload is a
    /// configuration error and leaves the target list untouched.
    pub fn add_encoded_target(&mut self, encoded: &EncodedTarget) -> Result<&mut Self, ConfigError> {
        let target = Target::try_from(encoded).map_err(ConfigError::InvalidTarget)?;
        Ok(self.add_target(target))
    }

    /// Adds a target. Duplicates are kept.
    pub fn add_target(&mut self, target: Target) -> &mut Self {
        self.targets.push(target);
        self
    }

    /// Replaces the list of ports scanned on each target.
    pub fn set_port_list(&mut self, ports: Vec<u16>) -> &mut Self {
        self.ports = ports;
        self
    }

    /// Whether each target is pinged before its ports are scanned.
    pub fn set_ping(&mut self, ping: bool) -> &mut Self {
        self.ping = ping;
        self
    }

    /// Whether open ports are fingerprinted.
    pub fn set_run_service_detection(&mut self, run_service_detection: bool) -> &mut Self {
        self.run_service_detection = run_service_detection;
        self
    }

    /// Enables very detailed diagnostics for the session and the engine.
    pub fn set_tracing(&mut self, tracing: bool) -> &mut Self {
        self.tracing = tracing;
        self
    }

    /// Sets the pause range between connection attempts in milliseconds.
    ///
    /// `(0, 0)` clears any previous throttle. `min > max` fails immediately
    /// and leaves the current setting untouched.
    pub fn set_throttle(&mut self, min_ms: u64, max_ms: u64) -> Result<&mut Self, ConfigError> {
        if min_ms == 0 && max_ms == 0 {
            return Ok(self.clear_throttle());
        }
        self.throttle = Some(Throttle::new(min_ms, max_ms)?);
        Ok(self)
    }

    pub fn clear_throttle(&mut self) -> &mut Self {
        self.throttle = None;
        self
    }

    /// Bounds the number of connection attempts in flight at once. Zero is rejected.
    pub fn set_max_in_flight(&mut self, max_in_flight: u32) -> Result<&mut Self, ConfigError> {
        self.max_in_flight = NonZeroU32::new(max_in_flight).ok_or(ConfigError::InvalidMaxInFlight)?;
        Ok(self)
    }

    /// Checks the configuration as a whole. Run before a scan starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }
        if let Some(throttle) = self.throttle {
            Throttle::new(throttle.min_ms, throttle.max_ms)?;
        }
        Ok(())
    }

    pub fn targets(&self) -> &[Target] {
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

    pub fn max_in_flight(&self) -> NonZeroU32 {
        self.max_in_flight
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
