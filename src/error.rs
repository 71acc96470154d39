//! Adapter-level error kinds.

use thiserror::Error;

/// Failures surfaced by the protocol loop.
///
/// Protocol violations are fatal: the process logs the error, emits a
/// best-effort `output` event and exits nonzero. A closed peer stream is a
/// normal way for a session to end and maps to a clean exit. Debuggee load
/// and runtime failures are not represented here; they are recovered locally
/// by the launcher and reported to the editor as `output` events.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed frame, bad JSON, unknown command or missing required field.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The editor closed its end of the stream.
    #[error("peer closed the stream")]
    PeerClosed,

    /// An I/O fault on the underlying streams.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
