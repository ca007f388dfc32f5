//! Async pull interface over a [`ScanSession`].

use portstream_common::{ScanConfig, StreamItem};
use tracing::Span;

use crate::engine::ScanEngine;
use crate::error::SessionError;
use crate::session::{ScanSession, SessionState};

/// Yields scan results one at a time, in the order the engine produced them.
///
/// Call [`next`](ScanStream::next) in a loop until it returns
/// [`StreamItem::Finished`]. Calling it again afterwards is a caller error and
/// returns [`SessionError::StreamFinished`] immediately.
pub struct ScanStream {
    session: ScanSession,
}

impl ScanStream {
    /// Starts a scan. Configuration and startup failures are returned here,
    /// before any item is produced.
    pub fn start<E: ScanEngine>(config: &ScanConfig, engine: E) -> Result<Self, SessionError> {
        ScanSession::start(config, engine).map(Self::from)
    }

    /// Starts a scan whose diagnostics are recorded under `span`.
    pub fn start_in<E: ScanEngine>(
        config: &ScanConfig,
        engine: E,
        span: Span,
    ) -> Result<Self, SessionError> {
        ScanSession::start_in(config, engine, span).map(Self::from)
    }

    /// Waits for the next item.
    ///
    /// Suspends only while the session is running and nothing has arrived.
    /// Once the session has finished or failed this returns the terminal
    /// error without suspending.
    pub async fn next(&mut self) -> Result<StreamItem, SessionError> {
        if let Some(terminal) = self.session.terminal() {
            return Err(terminal);
        }
        let delivery = self.session.recv().await;
        self.session.accept(delivery)
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn session(&self) -> &ScanSession {
        &self.session
    }
}

impl From<ScanSession> for ScanStream {
    fn from(session: ScanSession) -> Self {
        Self { session }
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
