//! Shared domain model for portstream: targets, configuration, scan results,
//! the error taxonomy and the wire codec spoken with scan engines.

pub mod config;
pub mod error;
pub mod network;
pub mod report;
pub mod wire;

pub use config::{ScanConfig, Throttle};
pub use error::{ConfigError, DecodeError, ScanError};
pub use network::target::Target;
pub use report::{
    Certainty, PingResult, PortReport, PortStatus, Report, ReportContents,
    ServiceDetectionConclusion, StreamItem,
};
