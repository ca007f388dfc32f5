use portstream_common::error::{ConfigError, DecodeError, ScanError};
use thiserror::Error;

/// Everything a session consumer can be told besides a stream item.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The configuration was rejected before the engine was touched.
    #[error("configuration rejected: {0}")]
    Config(#[from] ConfigError),
    /// The engine refused to start. The session never ran.
    #[error("engine failed to start: {0}")]
    Startup(#[source] ScanError),
    /// The engine broke the wire contract. The session is aborted.
    #[error("engine contract violation: {0}")]
    Contract(#[from] DecodeError),
    /// The engine stopped producing without a completion marker.
    #[error("engine stopped without a completion marker")]
    EngineDisconnected,
    /// `next()` was called after the stream already finished.
    #[error("stream already finished")]
    StreamFinished,
}
