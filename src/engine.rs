//! The seam between the adapter and the embedded interpreter.
//!
//! The adapter never manipulates interpreter state directly; it needs exactly
//! the capabilities below, and anything providing them can sit behind the
//! session. The bundled interpreter in [`crate::vm`] is one such provider;
//! the unit tests drive the adapter with scripted stand-ins.

use std::path::Path;

use thiserror::Error;

/// Locals slot name the interpreter uses for compiler-internal temporaries.
/// The snapshot builder filters these out of the innermost frame.
pub const TEMPORARY_NAME: &str = "(*temporary)";

/// Source label of the synthetic root frame the launcher runs chunks under.
/// Frames at or past it belong to the adapter, not the debuggee.
pub const SHIM_SOURCE: &str = "=[lua-dap]";

/// Whether a raw interpreter source string marks an adapter-owned frame.
pub fn is_adapter_source(source: &str) -> bool {
    source.ends_with("[lua-dap]")
}

/// Handle to a loaded, not-yet-run chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkId(pub usize);

/// One frame of the interpreter call stack, as the interpreter reports it.
#[derive(Debug, Clone)]
pub struct FrameInfo {
    /// Function name, or the interpreter's label for the main chunk.
    pub name: String,
    /// Raw source string: `@<path>` for chunks loaded from a file, `=<label>`
    /// for synthetic chunks, `None` for native frames.
    pub source: Option<String>,
    /// Current 1-based line.
    pub line: i64,
}

/// One local variable slot.
#[derive(Debug, Clone)]
pub struct LocalInfo {
    pub name: String,
    /// The interpreter's default stringification of the value.
    pub value: String,
    pub type_name: String,
}

/// Read access to the suspended interpreter stack, available inside the line
/// hook. Level 1 is the innermost frame; levels grow outward.
pub trait StackView {
    fn frame(&self, level: usize) -> Option<FrameInfo>;

    /// Local slot `index` (1-based) of the frame at `level`; `None` once the
    /// slots are exhausted.
    fn local(&self, level: usize, index: usize) -> Option<LocalInfo>;
}

/// A failure raised by the host from inside a hook. The interpreter aborts
/// the running script with it, without unwinding the adapter.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct HostFault(pub String);

/// Callbacks the interpreter drives while a chunk runs. The line hook fires
/// at every executed line; `print` in the sandboxed environment routes to
/// `on_print` instead of the process stdout, which the protocol owns.
pub trait Host {
    fn on_line(&mut self, stack: &dyn StackView, line: i64) -> Result<(), HostFault>;
    fn on_print(&mut self, text: &str) -> Result<(), HostFault>;
}

/// Loading or running a chunk failed.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The file could not be read or compiled.
    #[error("cannot load {path}: {message}")]
    Load { path: String, message: String },
    /// The script failed while running. Caught by the interpreter and
    /// returned, never unwound through the adapter.
    #[error("{0}")]
    Runtime(String),
}

/// The embedded interpreter, as the adapter sees it.
pub trait Engine {
    /// Load the file at `path` as an invocable chunk in a sandboxed
    /// environment (with `print` routed to the host).
    fn load(&mut self, path: &Path) -> Result<ChunkId, EngineError>;

    /// Run a loaded chunk with positional arguments under the host's hooks.
    /// Returns the script's exit code: its numeric return value, else 0.
    fn run(
        &mut self,
        chunk: ChunkId,
        args: &[serde_json::Value],
        host: &mut dyn Host,
    ) -> Result<i64, EngineError>;
}
