//! # lua-dap
//!
//! A Debug Adapter Protocol server for scripts running in an embedded
//! Lua-subset interpreter. An editor launches the adapter as a child process
//! and speaks framed DAP messages over stdio; the adapter loads the target
//! script, runs it under a per-line hook, and surfaces breakpoints, stack
//! frames, scopes and variables back to the editor.
//!
//! Everything is single-threaded and cooperative. When a breakpoint fires,
//! the line hook re-enters the message pump from inside the debuggee's call
//! stack; `continue` lets the pump return and the interpreter resume in
//! place. The run/pause stack in [`session`] makes the nesting explicit.

pub mod breakpoints;
pub mod engine;
pub mod error;
pub mod hook;
pub mod launch;
pub mod protocol;
pub mod session;
pub mod snapshot;
pub mod transport;
pub mod vm;

use std::io::{BufRead, Write};

pub use error::Error;

use engine::Engine;
use launch::EngineLauncher;
use session::Session;

/// Serve one complete debug session on the given streams (testable with
/// in-memory transports). Returns when the debuggee has exited cleanly, with
/// [`Error::PeerClosed`] when the editor goes away, or with a fatal
/// [`Error::Protocol`] — in which case a best-effort `output` event has
/// already been sent.
pub fn run_adapter_on<R: BufRead, W: Write, E: Engine>(
    reader: R,
    writer: W,
    engine: &mut E,
) -> Result<(), Error> {
    let mut session = Session::new(reader, writer);
    let mut launcher = EngineLauncher::new(engine);
    let result = session.serve(&mut launcher);
    if let Err(Error::Protocol(ref message)) = result {
        let _ = session.send_output("console", format!("fatal: {message}\n"));
    }
    result
}
