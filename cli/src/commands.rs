pub mod scan;

use std::str::FromStr;

use clap::{Args, Parser, Subcommand};
use portstream_common::Target;

#[derive(Parser)]
#[command(name = "portstream")]
#[command(about = "Scans ports and prints every result as soon as it arrives.")]
pub struct CommandLine {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan one or more targets
    #[command(alias = "s")]
    Scan(ScanArgs),
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// IP addresses, CIDR networks or hostnames
    #[arg(required = true)]
    pub targets: Vec<Target>,
    /// Ports to scan, e.g. "22,80,8000-8080"
    #[arg(short, long, default_value = "80")]
    pub ports: String,
    /// Ping every instance first (needs root)
    #[arg(long)]
    pub ping: bool,
    /// Try to identify the service behind open ports
    #[arg(short = 's', long)]
    pub service_detection: bool,
    /// Random pause between connection attempts, in milliseconds, as MIN-MAX
    #[arg(long)]
    pub throttle: Option<ThrottleRange>,
    /// Upper bound on connection attempts running at once
    #[arg(long)]
    pub max_in_flight: Option<u32>,
    /// Log every engine callback
    #[arg(long)]
    pub trace: bool,
    /// Per-connection timeout in milliseconds
    #[arg(long, default_value_t = 1_000)]
    pub timeout: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl FromStr for ThrottleRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (min, max) = s
            .split_once('-')
            .ok_or_else(|| format!("expected MIN-MAX, got '{s}'"))?;
        let parse = |value: &str| {
            value
                .trim()
                .parse::<u64>()
                .map_err(|e| format!("invalid throttle bound '{value}': {e}"))
        };
        Ok(Self {
            min_ms: parse(min)?,
            max_ms: parse(max)?,
        })
    }
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
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
