//! Debug session state machine and message pump.
//!
//! The session owns the two protocol streams, the outgoing sequence counter,
//! the breakpoint registry, the deferred-action queue and the run/pause
//! stack. The pump is reentrant by design: the top-level activation runs
//! before and after the debuggee, and each breakpoint or step pushes a new
//! activation that serves requests while the debuggee sits suspended
//! mid-call-stack. Resuming is nothing more than the nested pump returning.

use std::collections::VecDeque;
use std::io::{BufRead, Write};
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::breakpoints::BreakpointTable;
use crate::error::Error;
use crate::protocol::{
    Capabilities, Event, LaunchArguments, Request, Response, ScopesArguments,
    SetBreakpointsArguments, SetBreakpointsResponseBody, ScopesResponseBody, Source,
    StackTraceResponseBody, Thread, ThreadsResponseBody, VariablesArguments,
    VariablesResponseBody, BreakpointInfo, OutputEventBody,
};
use crate::snapshot::Snapshot;
use crate::transport::{FrameReader, FrameWriter};

/// What to debug; immutable once set by `launch`.
#[derive(Debug, Clone)]
pub struct DebuggeeConfig {
    pub program: PathBuf,
    pub args: Vec<serde_json::Value>,
}

/// Work a handler defers until its response has gone out. The pump drains
/// these at the top of each iteration, before blocking on a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    /// Send the `initialized` event (queued by `initialize`).
    EmitInitialized,
    /// Start the debuggee (queued by `configurationDone`).
    LaunchDebuggee,
}

/// Runs the debuggee when the pump drains a launch action. Only the
/// top-level pump activation holds an engine; see [`HoldLaunch`].
pub trait Launcher<R: BufRead, W: Write> {
    fn launch(
        &mut self,
        session: &mut Session<R, W>,
        config: &DebuggeeConfig,
    ) -> Result<(), Error>;
}

/// The nested pump's launcher: a debuggee cannot start while another one is
/// suspended, so the action is re-queued for the top-level pump.
pub(crate) struct HoldLaunch;

impl<R: BufRead, W: Write> Launcher<R, W> for HoldLaunch {
    fn launch(
        &mut self,
        session: &mut Session<R, W>,
        _config: &DebuggeeConfig,
    ) -> Result<(), Error> {
        session.actions.push_back(Action::LaunchDebuggee);
        Ok(())
    }
}

pub struct Session<R, W: Write> {
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
    next_seq: i64,
    pub(crate) breakpoints: BreakpointTable,
    /// One `true` per active pump activation; flipping the top to `false`
    /// ends that activation.
    run_stack: Vec<bool>,
    actions: VecDeque<Action>,
    pub(crate) snapshot: Option<Snapshot>,
    pub(crate) step_pending: bool,
    config: Option<DebuggeeConfig>,
}

impl<R: BufRead, W: Write> Session<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: FrameReader::new(reader),
            writer: FrameWriter::new(writer),
            next_seq: 1,
            breakpoints: BreakpointTable::new(),
            run_stack: vec![true],
            actions: VecDeque::new(),
            snapshot: None,
            step_pending: false,
            config: None,
        }
    }

    /// Serve the session to completion: until the debuggee exits cleanly,
    /// the peer disconnects, or a protocol error aborts everything.
    pub fn serve<L: Launcher<R, W>>(&mut self, launcher: &mut L) -> Result<(), Error> {
        self.pump(launcher)
    }

    /// One pump activation. Runs until the top of the run/pause stack flips
    /// to `false`, then pops that frame and returns.
    pub(crate) fn pump<L: Launcher<R, W>>(&mut self, launcher: &mut L) -> Result<(), Error> {
        loop {
            self.drain_actions(launcher)?;
            if !self.top_running() {
                break;
            }
            let body = self.reader.read_frame()?;
            let request: Request = serde_json::from_str(&body)
                .map_err(|err| Error::Protocol(format!("malformed request: {err}")))?;
            if request.kind != "request" {
                return Err(Error::Protocol(format!(
                    "unexpected message type {:?}",
                    request.kind
                )));
            }
            self.dispatch(request)?;
        }
        self.run_stack.pop();
        Ok(())
    }

    fn drain_actions<L: Launcher<R, W>>(&mut self, launcher: &mut L) -> Result<(), Error> {
        // Only what was queued when the iteration started; a re-queued
        // launch must not spin.
        let pending = self.actions.len();
        for _ in 0..pending {
            let Some(action) = self.actions.pop_front() else {
                break;
            };
            match action {
                Action::EmitInitialized => self.send_event(Event::new("initialized"))?,
                Action::LaunchDebuggee => {
                    let config = self.config.clone().ok_or_else(|| {
                        Error::Protocol("configurationDone received before launch".to_string())
                    })?;
                    launcher.launch(self, &config)?;
                }
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, request: Request) -> Result<(), Error> {
        debug!(command = %request.command, seq = request.seq, depth = self.depth(), "request");
        match request.command.as_str() {
            "initialize" => {
                let body = Capabilities {
                    supports_configuration_done_request: true,
                };
                self.send_response(Response::with_body(&request, body))?;
                self.actions.push_back(Action::EmitInitialized);
            }
            "launch" => {
                let args: LaunchArguments = decode_arguments(&request)?;
                self.config = Some(DebuggeeConfig {
                    program: PathBuf::from(args.program),
                    args: args.args,
                });
                self.send_response(Response::success(&request))?;
            }
            "setBreakpoints" => {
                let args: SetBreakpointsArguments = decode_arguments(&request)?;
                let path = args.source.path.ok_or_else(|| {
                    Error::Protocol("setBreakpoints: source.path is required".to_string())
                })?;
                let breakpoints = args
                    .breakpoints
                    .iter()
                    .map(|requested| {
                        let placed = self.breakpoints.add(&path, requested.line);
                        BreakpointInfo {
                            id: Some(placed.id),
                            verified: placed.verified,
                            line: Some(placed.line),
                            source: Some(Source {
                                name: None,
                                path: Some(placed.source_path),
                            }),
                        }
                    })
                    .collect();
                self.send_response(Response::with_body(
                    &request,
                    SetBreakpointsResponseBody { breakpoints },
                ))?;
            }
            "configurationDone" => {
                self.send_response(Response::success(&request))?;
                self.actions.push_back(Action::LaunchDebuggee);
            }
            "threads" => {
                let body = ThreadsResponseBody {
                    threads: vec![Thread {
                        id: 0,
                        name: "main".to_string(),
                    }],
                };
                self.send_response(Response::with_body(&request, body))?;
            }
            "stackTrace" => {
                let stack_frames = self
                    .snapshot
                    .as_ref()
                    .map(|snapshot| snapshot.frames().to_vec())
                    .unwrap_or_default();
                let body = StackTraceResponseBody {
                    total_frames: stack_frames.len() as i64,
                    stack_frames,
                };
                self.send_response(Response::with_body(&request, body))?;
            }
            "scopes" => {
                let args: ScopesArguments = decode_arguments(&request)?;
                let scopes = self
                    .snapshot
                    .as_ref()
                    .map(|snapshot| snapshot.scopes_for(args.frame_id))
                    .unwrap_or_default();
                self.send_response(Response::with_body(&request, ScopesResponseBody { scopes }))?;
            }
            "variables" => {
                let args: VariablesArguments = decode_arguments(&request)?;
                let variables = self
                    .snapshot
                    .as_ref()
                    .map(|snapshot| snapshot.variables_for(args.variables_reference))
                    .unwrap_or_default();
                self.send_response(Response::with_body(
                    &request,
                    VariablesResponseBody { variables },
                ))?;
            }
            "continue" => {
                self.send_response(Response::success(&request))?;
                self.resume_top();
            }
            "next" => {
                self.step_pending = true;
                self.send_response(Response::success(&request))?;
                self.resume_top();
            }
            other => {
                return Err(Error::Protocol(format!("unrecognized command {other:?}")));
            }
        }
        Ok(())
    }

    fn top_running(&self) -> bool {
        self.run_stack.last().copied().unwrap_or(false)
    }

    /// Depth of the run/pause stack; equals the number of active pump
    /// activations.
    pub fn depth(&self) -> usize {
        self.run_stack.len()
    }

    /// Enter a pause: called by the hook driver before re-entering the pump.
    pub(crate) fn push_pause(&mut self) {
        self.run_stack.push(true);
    }

    /// `continue`/`next`: the current activation winds down.
    fn resume_top(&mut self) {
        if let Some(top) = self.run_stack.last_mut() {
            *top = false;
        }
    }

    /// Debuggee finished: the top-level activation winds down too.
    pub(crate) fn stop_bottom(&mut self) {
        if let Some(bottom) = self.run_stack.first_mut() {
            *bottom = false;
        }
    }

    fn take_seq(&mut self) -> i64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    pub(crate) fn send_response(&mut self, mut response: Response) -> Result<(), Error> {
        response.seq = self.take_seq();
        let body = serde_json::to_string(&response)
            .map_err(|err| Error::Protocol(format!("cannot encode response: {err}")))?;
        self.writer.write_frame(&body)
    }

    pub(crate) fn send_event(&mut self, mut event: Event) -> Result<(), Error> {
        event.seq = self.take_seq();
        let body = serde_json::to_string(&event)
            .map_err(|err| Error::Protocol(format!("cannot encode event: {err}")))?;
        self.writer.write_frame(&body)
    }

    /// Emit an `output` event of the given category.
    pub(crate) fn send_output(&mut self, category: &str, output: String) -> Result<(), Error> {
        self.send_event(Event::with_body(
            "output",
            OutputEventBody {
                category: category.to_string(),
                output,
            },
        ))
    }
}

fn decode_arguments<T: DeserializeOwned>(request: &Request) -> Result<T, Error> {
    let value = request.arguments.clone().unwrap_or(serde_json::Value::Null);
    serde_json::from_value(value)
        .map_err(|err| Error::Protocol(format!("{} arguments: {err}", request.command)))
}
