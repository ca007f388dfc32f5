//! Bridges a callback-driven scan engine into an ordered stream of results.
//!
//! A [`ScanSession`] starts an engine on its own worker thread and collects
//! everything the engine reports through a channel. [`ScanStream`] exposes
//! that as an async `next()` that yields [`StreamItem`](portstream_common::StreamItem)s
//! until the single terminal `Finished` item.

pub mod decoder;
pub mod engine;
pub mod error;
pub mod network;
pub mod session;
pub mod stream;

pub use engine::{ConnectEngine, EngineConfig, RawStreamItem, ScanEngine, ScriptedEngine};
pub use error::SessionError;
pub use session::{ScanSession, SessionState};
pub use stream::ScanStream;
