//! # Scan Session
//!
//! Owns one run of an engine, from start to the completion marker.
//!
//! ```text
//! Idle ──start──▶ Running ──Finished item──▶ Finished
//!   │                 │
//!   └─start refused──▶ Failed ◀──contract violation / engine hung up
//! ```
//!
//! The engine runs on a dedicated worker thread. Its callback decodes each
//! payload, releases it, and pushes the typed result into an unbounded FIFO
//! channel. Nothing else crosses the thread boundary. Once the stream is over
//! (completion marker, contract violation, or nobody left reading) the callback
//! answers `Break`, the engine returns, and the worker releases the scan
//! handle exactly once.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use portstream_common::error::DecodeError;
use portstream_common::{ScanConfig, StreamItem};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError};
use tracing::{Span, debug, error, info, info_span, trace, warn};

use crate::decoder;
use crate::engine::{EngineConfig, RawStreamItem, ScanEngine};
use crate::error::SessionError;

static SESSION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// What travels from the worker to the consumer.
type Delivery = Result<StreamItem, DecodeError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Finished,
    Failed,
}

/// A running scan and the receiving end of its result channel.
pub struct ScanSession {
    id: u64,
    state: SessionState,
    failure: Option<SessionError>,
    rx: UnboundedReceiver<Delivery>,
    span: Span,
    _worker: JoinHandle<()>,
}

impl ScanSession {
    /// Validates `config`, starts `engine` and launches the worker thread.
    ///
    /// Diagnostics go to a fresh `scan_session` span.
    pub fn start<E: ScanEngine>(config: &ScanConfig, engine: E) -> Result<Self, SessionError> {
        Self::start_in(config, engine, Span::current())
    }

    /// Like [`start`](Self::start), with the session span nested under `parent`.
    pub fn start_in<E: ScanEngine>(
        config: &ScanConfig,
        mut engine: E,
        parent: Span,
    ) -> Result<Self, SessionError> {
        let id = SESSION_COUNTER.fetch_add(1, Ordering::Relaxed);
        let span = info_span!(parent: &parent, "scan_session", id);
        let _guard = span.enter();

        let mut state = SessionState::Idle;
        debug!(?state, "session created");

        let native = EngineConfig::from_config(config)?;
        if let Err(e) = engine.start_scan(native) {
            state = SessionState::Failed;
            error!(?state, "engine refused to start: {e}");
            engine.free_scan();
            return Err(SessionError::Startup(e));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = ScanHandle {
            engine: Some(engine),
        };
        let worker_span = span.clone();
        let verbose = config.tracing();
        let worker = thread::Builder::new()
            .name(format!("portstream-session-{id}"))
            .spawn(move || worker_span.in_scope(|| run_worker(handle, tx, verbose)))
            .map_err(|e| {
                error!("failed to spawn session worker: {e}");
                SessionError::EngineDisconnected
            })?;

        state = SessionState::Running;
        info!(?state, targets = config.targets().len(), "scan started");
        drop(_guard);

        Ok(Self {
            id,
            state,
            failure: None,
            rx,
            span,
            _worker: worker,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Returns the next item if one is already waiting, without suspending.
    ///
    /// `None` means the session is still running and nothing has arrived yet.
    pub fn try_next(&mut self) -> Option<Result<StreamItem, SessionError>> {
        if let Some(terminal) = self.terminal() {
            return Some(Err(terminal));
        }
        match self.rx.try_recv() {
            Ok(delivery) => Some(self.accept(Some(delivery))),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(self.accept(None)),
        }
    }

    /// The error every call gets once the session is over.
    pub(crate) fn terminal(&self) -> Option<SessionError> {
        match self.state {
            SessionState::Finished => Some(SessionError::StreamFinished),
            SessionState::Failed => Some(
                self.failure
                    .clone()
                    .unwrap_or(SessionError::EngineDisconnected),
            ),
            SessionState::Idle | SessionState::Running => None,
        }
    }

    pub(crate) async fn recv(&mut self) -> Option<Delivery> {
        self.rx.recv().await
    }

    /// Applies one delivery (or the end of the channel) to the state machine.
    pub(crate) fn accept(&mut self, delivery: Option<Delivery>) -> Result<StreamItem, SessionError> {
        let span = self.span.clone();
        let _guard = span.enter();
        match delivery {
            Some(Ok(StreamItem::Finished)) => {
                self.state = SessionState::Finished;
                info!(state = ?self.state, "scan finished");
                Ok(StreamItem::Finished)
            }
            Some(Ok(item)) => Ok(item),
            Some(Err(e)) => self.fail(SessionError::Contract(e)),
            None => self.fail(SessionError::EngineDisconnected),
        }
    }

    fn fail(&mut self, e: SessionError) -> Result<StreamItem, SessionError> {
        self.state = SessionState::Failed;
        error!(state = ?self.state, "session aborted: {e}");
        self.failure = Some(e.clone());
        Err(e)
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        if self.state == SessionState::Running {
            let _guard = self.span.enter();
            debug!("session dropped while running, engine finishes in the background");
        }
    }
}

/// Holds the engine on the worker and releases it exactly once.
struct ScanHandle<E: ScanEngine> {
    engine: Option<E>,
}

impl<E: ScanEngine> Drop for ScanHandle<E> {
    fn drop(&mut self) {
        if let Some(engine) = self.engine.take() {
            engine.free_scan();
            debug!("scan handle released");
        }
    }
}

/// Why the worker stopped forwarding items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    Completed,
    ContractViolated,
    ConsumerGone,
}

fn run_worker<E: ScanEngine>(mut handle: ScanHandle<E>, tx: UnboundedSender<Delivery>, verbose: bool) {
    let mut stop: Option<Stop> = None;

    let mut callback = |raw: RawStreamItem| {
        if verbose {
            trace!(
                complete = raw.complete,
                status = raw.status_code,
                payload_len = raw.payload_len(),
                "engine callback"
            );
        }

        match stop {
            Some(Stop::Completed) => {
                warn!("engine delivered an item after completion, dropping it");
                return ControlFlow::Break(());
            }
            Some(Stop::ContractViolated) => {
                warn!("engine delivered an item after a contract violation, dropping it");
                return ControlFlow::Break(());
            }
            Some(Stop::ConsumerGone) => return ControlFlow::Break(()),
            None => {}
        }

        let delivery = decoder::decode(&raw);
        drop(raw);

        match &delivery {
            Ok(StreamItem::Finished) => stop = Some(Stop::Completed),
            Ok(_) => {}
            Err(e) => {
                error!("undecodable engine payload: {e}");
                stop = Some(Stop::ContractViolated);
            }
        }

        if tx.send(delivery).is_err() {
            trace!("consumer is gone, stopping the engine");
            if stop.is_none() {
                stop = Some(Stop::ConsumerGone);
            }
        }

        match stop {
            Some(_) => ControlFlow::Break(()),
            None => ControlFlow::Continue(()),
        }
    };

    if let Some(engine) = handle.engine.as_mut() {
        engine.run(&mut callback);
    }

    match stop {
        None => warn!("engine returned without a completion marker"),
        Some(Stop::ContractViolated) => debug!("engine stopped after a contract violation"),
        Some(Stop::Completed) | Some(Stop::ConsumerGone) => {}
    }
    drop(handle);
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ScriptedEngine;
    use portstream_common::error::{ConfigError, ScanError};
    use portstream_common::Target;
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn config() -> ScanConfig {
        let mut config = ScanConfig::default();
        config.add_target(Target::Ipv4(Ipv4Addr::LOCALHOST));
        config
    }

    /// Polls without suspending until something arrives.
    fn next_blocking(session: &mut ScanSession) -> Result<StreamItem, SessionError> {
        loop {
            if let Some(item) = session.try_next() {
                return item;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn startup_failure_releases_engine() {
        let engine = ScriptedEngine::new().reject_start(ScanError::InsufficientPermission);
        let released = engine.release_count();

        let result = ScanSession::start(&config(), engine);
        assert_eq!(
            result.err(),
            Some(SessionError::Startup(ScanError::InsufficientPermission))
        );
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn config_errors_never_reach_the_engine() {
        let engine = ScriptedEngine::new().finish();
        let started = engine.start_count();

        let result = ScanSession::start(&ScanConfig::default(), engine);
        assert_eq!(
            result.err(),
            Some(SessionError::Config(ConfigError::NoTargets))
        );
        assert_eq!(started.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn sessions_get_distinct_ids() {
        let first = ScanSession::start(&config(), ScriptedEngine::new().finish()).unwrap();
        let second = ScanSession::start(&config(), ScriptedEngine::new().finish()).unwrap();
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn finished_is_terminal() {
        let engine = ScriptedEngine::new().error(ScanError::UnknownError).finish();
        let released = engine.release_count();
        let mut session = ScanSession::start(&config(), engine).unwrap();
        assert_eq!(session.state(), SessionState::Running);

        assert_eq!(
            next_blocking(&mut session),
            Ok(StreamItem::Error(ScanError::UnknownError))
        );
        assert_eq!(next_blocking(&mut session), Ok(StreamItem::Finished));
        assert_eq!(session.state(), SessionState::Finished);
        assert_eq!(session.try_next(), Some(Err(SessionError::StreamFinished)));
        assert_eq!(session.try_next(), Some(Err(SessionError::StreamFinished)));

        // The worker releases right after the engine returns
        for _ in 0..1_000 {
            if released.load(Ordering::SeqCst) == 1 {
                break;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn items_after_completion_are_dropped() {
        let engine = ScriptedEngine::new()
            .finish()
            .error(ScanError::InvalidLength)
            .finish();
        let mut session = ScanSession::start(&config(), engine).unwrap();

        assert_eq!(next_blocking(&mut session), Ok(StreamItem::Finished));
        assert_eq!(session.try_next(), Some(Err(SessionError::StreamFinished)));
    }

    #[test]
    fn missing_completion_marker_fails_the_session() {
        let engine = ScriptedEngine::new().error(ScanError::FailedToResolveHostname);
        let mut session = ScanSession::start(&config(), engine).unwrap();

        assert_eq!(
            next_blocking(&mut session),
            Ok(StreamItem::Error(ScanError::FailedToResolveHostname))
        );
        assert_eq!(
            next_blocking(&mut session),
            Err(SessionError::EngineDisconnected)
        );
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(
            session.try_next(),
            Some(Err(SessionError::EngineDisconnected))
        );
    }

    fn wait_for_release(released: &AtomicUsize) -> usize {
        for _ in 0..1_000 {
            if released.load(Ordering::SeqCst) == 1 {
                break;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        released.load(Ordering::SeqCst)
    }

    #[test]
    fn contract_violation_releases_engine_immediately() {
        let (engine, gate) = ScriptedEngine::new()
            .raw(RawStreamItem {
                complete: false,
                status_code: 0,
                payload: None,
            })
            .error(ScanError::UnknownError)
            .finish()
            .gated();
        let released = engine.release_count();
        let mut session = ScanSession::start(&config(), engine).unwrap();

        gate.release(1);
        assert_eq!(
            next_blocking(&mut session),
            Err(SessionError::Contract(DecodeError::MissingPayload))
        );
        assert_eq!(session.state(), SessionState::Failed);

        // The remaining items are still held back by the gate
        assert_eq!(wait_for_release(&released), 1);
        drop(gate);
    }

    /// Keeps calling back no matter what the session answers.
    struct DeafEngine {
        items: Vec<RawStreamItem>,
        delivered: Arc<AtomicUsize>,
    }

    impl ScanEngine for DeafEngine {
        fn start_scan(&mut self, _config: EngineConfig) -> Result<(), ScanError> {
            Ok(())
        }

        fn run(&mut self, callback: &mut dyn FnMut(RawStreamItem) -> ControlFlow<()>) {
            for item in self.items.drain(..) {
                self.delivered.fetch_add(1, Ordering::SeqCst);
                let _ = callback(item);
            }
        }
    }

    #[test]
    fn items_after_a_contract_violation_never_reach_the_consumer() {
        let delivered = Arc::new(AtomicUsize::new(0));
        let engine = DeafEngine {
            items: vec![
                RawStreamItem::report(vec![0xff]),
                RawStreamItem::error(ScanError::UnknownError),
                RawStreamItem::complete(),
            ],
            delivered: Arc::clone(&delivered),
        };
        let mut session = ScanSession::start(&config(), engine).unwrap();

        assert!(matches!(
            next_blocking(&mut session),
            Err(SessionError::Contract(_))
        ));
        for _ in 0..1_000 {
            if delivered.load(Ordering::SeqCst) == 3 {
                break;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(delivered.load(Ordering::SeqCst), 3);
        assert!(matches!(
            session.try_next(),
            Some(Err(SessionError::Contract(_)))
        ));
    }

    #[test]
    fn dropping_a_running_session_still_releases() {
        let engine = ScriptedEngine::new()
            .error(ScanError::UnknownError)
            .error(ScanError::UnknownError)
            .finish();
        let released = engine.release_count();
        let session = ScanSession::start(&config(), engine).unwrap();
        drop(session);

        for _ in 0..1_000 {
            if released.load(Ordering::SeqCst) == 1 {
                break;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}
