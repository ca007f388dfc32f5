//! A deterministic engine that replays a prepared list of callbacks.
//!
//! Useful for exercising consumers of a [`ScanStream`](crate::ScanStream)
//! without touching the network.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

use portstream_common::error::ScanError;
use portstream_common::wire::encode_report;
use portstream_common::Report;

use super::{EngineConfig, RawStreamItem, ScanEngine};

#[derive(Default)]
pub struct ScriptedEngine {
    items: Vec<RawStreamItem>,
    reject: Option<ScanError>,
    gate: Option<Receiver<()>>,
    config: Arc<Mutex<Option<EngineConfig>>>,
    starts: Arc<AtomicUsize>,
    releases: Arc<AtomicUsize>,
}

/// Lets a test decide when a gated engine may emit its next callback.
pub struct Gate {
    tx: Sender<()>,
}

impl Gate {
    /// Allows `count` more callbacks through.
    pub fn release(&self, count: usize) {
        for _ in 0..count {
            let _ = self.tx.send(());
        }
    }
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful report.
    pub fn report(self, report: &Report) -> Self {
        self.raw(RawStreamItem::report(encode_report(report)))
    }

    /// Queues a runtime error item.
    pub fn error(self, error: ScanError) -> Self {
        self.raw(RawStreamItem::error(error))
    }

    /// Queues the completion marker.
    pub fn finish(self) -> Self {
        self.raw(RawStreamItem::complete())
    }

    /// Queues an arbitrary payload, well-formed or not.
    pub fn raw(mut self, item: RawStreamItem) -> Self {
        self.items.push(item);
        self
    }

    /// Makes `start_scan` fail with `error`.
    pub fn reject_start(mut self, error: ScanError) -> Self {
        self.reject = Some(error);
        self
    }

    /// Holds every callback until the returned [`Gate`] lets it through.
    /// Dropping the gate opens it for good.
    pub fn gated(mut self) -> (Self, Gate) {
        let (tx, rx) = mpsc::channel();
        self.gate = Some(rx);
        (self, Gate { tx })
    }

    /// The configuration the engine was started with, once started.
    pub fn started_with(&self) -> Arc<Mutex<Option<EngineConfig>>> {
        Arc::clone(&self.config)
    }

    pub fn start_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.starts)
    }

    /// How many times the scan handle was released.
    pub fn release_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.releases)
    }
}

impl ScanEngine for ScriptedEngine {
    fn start_scan(&mut self, config: EngineConfig) -> Result<(), ScanError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.reject {
            return Err(e);
        }
        if let Ok(mut slot) = self.config.lock() {
            *slot = Some(config);
        }
        Ok(())
    }

    fn run(&mut self, callback: &mut dyn FnMut(RawStreamItem) -> ControlFlow<()>) {
        for item in self.items.drain(..) {
            if let Some(gate) = &self.gate {
                if gate.recv().is_err() {
                    self.gate = None;
                }
            }
            if callback(item).is_break() {
                break;
            }
        }
    }

    fn free_scan(self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}
