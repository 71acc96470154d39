//! Line-hook driver.
//!
//! The interpreter calls [`Host::on_line`] on every executed line while the
//! debuggee runs. The driver decides between continuing silently and pausing:
//! a pause materializes the stack snapshot, emits `stopped`, pushes a run
//! frame and re-enters the session pump *from inside the debuggee's call
//! stack*. When `continue` or `next` flips that frame, the nested pump
//! returns, the hook returns, and the interpreter picks up exactly where it
//! stopped — no unwinding, no threads.

use std::io::{BufRead, Write};

use tracing::debug;

use crate::engine::{is_adapter_source, Host, HostFault, StackView};
use crate::error::Error;
use crate::protocol::{Event, StoppedEventBody};
use crate::session::{HoldLaunch, Session};
use crate::snapshot::Snapshot;

pub struct HookDriver<'a, R, W: Write> {
    session: &'a mut Session<R, W>,
    failure: Option<Error>,
}

impl<'a, R: BufRead, W: Write> HookDriver<'a, R, W> {
    pub fn new(session: &'a mut Session<R, W>) -> Self {
        Self {
            session,
            failure: None,
        }
    }

    /// The first transport or protocol failure seen inside a hook, if any.
    /// The engine only learns a [`HostFault`] happened; the launcher
    /// retrieves the real error here after the run winds down.
    pub fn take_failure(&mut self) -> Option<Error> {
        self.failure.take()
    }

    fn pause(
        &mut self,
        stack: &dyn StackView,
        reason: &str,
        hit: Option<Vec<i64>>,
    ) -> Result<(), Error> {
        debug!(reason, depth = self.session.depth(), "pausing debuggee");
        self.session.snapshot = Some(Snapshot::capture(stack));
        self.session.send_event(Event::with_body(
            "stopped",
            StoppedEventBody {
                reason: reason.to_string(),
                thread_id: 0,
                all_threads_stopped: true,
                hit_breakpoint_ids: hit,
            },
        ))?;
        self.session.push_pause();
        let pumped = self.session.pump(&mut HoldLaunch);
        // The snapshot is only valid for the pause window.
        self.session.snapshot = None;
        pumped
    }

    fn record(&mut self, result: Result<(), Error>) -> Result<(), HostFault> {
        match result {
            Ok(()) => Ok(()),
            Err(err) => {
                let fault = HostFault(format!("debug session failed: {err}"));
                self.failure = Some(err);
                Err(fault)
            }
        }
    }
}

impl<R: BufRead, W: Write> Host for HookDriver<'_, R, W> {
    fn on_line(&mut self, stack: &dyn StackView, line: i64) -> Result<(), HostFault> {
        let current = stack.frame(1);
        // Never pause on the adapter's own frames.
        if current
            .as_ref()
            .and_then(|frame| frame.source.as_deref())
            .is_some_and(is_adapter_source)
        {
            return Ok(());
        }

        if self.session.step_pending {
            self.session.step_pending = false;
            let result = self
                .session
                .send_output("console", format!("step: line {line}\n"))
                .and_then(|()| self.pause(stack, "step", None));
            return self.record(result);
        }

        let hit = current
            .and_then(|frame| frame.source)
            .as_deref()
            .and_then(|source| source.strip_prefix('@'))
            .and_then(|path| self.session.breakpoints.find(path, line))
            .map(|breakpoint| breakpoint.id);
        match hit {
            Some(id) => {
                let result = self.pause(stack, "breakpoint", Some(vec![id]));
                self.record(result)
            }
            None => Ok(()),
        }
    }

    fn on_print(&mut self, text: &str) -> Result<(), HostFault> {
        let result = self.session.send_output("stdout", text.to_string());
        self.record(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{FrameInfo, LocalInfo, SHIM_SOURCE};
    use crate::session::test_support::{decode_output, frame_requests};
    use std::io::Cursor;

    /// A debuggee frame over the adapter shim, with a couple of locals.
    struct ScriptedStack {
        source: &'static str,
        line: i64,
    }

    impl StackView for ScriptedStack {
        fn frame(&self, level: usize) -> Option<FrameInfo> {
            match level {
                1 => Some(FrameInfo {
                    name: "main chunk".to_string(),
                    source: Some(self.source.to_string()),
                    line: self.line,
                }),
                2 => Some(FrameInfo {
                    name: "[lua-dap]".to_string(),
                    source: Some(SHIM_SOURCE.to_string()),
                    line: 0,
                }),
                _ => None,
            }
        }

        fn local(&self, level: usize, index: usize) -> Option<LocalInfo> {
            if level == 1 && index == 1 {
                Some(LocalInfo {
                    name: "x".to_string(),
                    value: "1".to_string(),
                    type_name: "number".to_string(),
                })
            } else {
                None
            }
        }
    }

    fn session_over<'a>(
        requests: &[serde_json::Value],
        output: &'a mut Vec<u8>,
    ) -> Session<Cursor<Vec<u8>>, &'a mut Vec<u8>> {
        Session::new(Cursor::new(frame_requests(requests)), output)
    }

    #[test]
    fn breakpoint_hit_pauses_and_resumes_on_continue() {
        let mut output = Vec::new();
        let mut session = session_over(
            &[
                serde_json::json!({ "seq": 1, "type": "request", "command": "stackTrace",
                    "arguments": { "threadId": 0 } }),
                serde_json::json!({ "seq": 2, "type": "request", "command": "continue",
                    "arguments": { "threadId": 0 } }),
            ],
            &mut output,
        );
        session.breakpoints.add("/x/t.lua", 10);

        let stack = ScriptedStack {
            source: "@/x/t.lua",
            line: 10,
        };
        let mut driver = HookDriver::new(&mut session);
        driver.on_line(&stack, 10).unwrap();
        assert!(driver.take_failure().is_none());
        drop(driver);
        assert!(session.snapshot.is_none(), "snapshot must die with the pause");
        assert_eq!(session.depth(), 1);
        drop(session);

        let messages = decode_output(&output);
        assert_eq!(messages[0]["event"], "stopped");
        assert_eq!(messages[0]["body"]["reason"], "breakpoint");
        assert_eq!(messages[0]["body"]["hitBreakpointIds"], serde_json::json!([1]));
        // Served from the snapshot while paused.
        assert_eq!(messages[1]["command"], "stackTrace");
        assert_eq!(messages[1]["body"]["stackFrames"][0]["line"], 10);
        assert_eq!(
            messages[1]["body"]["stackFrames"][0]["source"]["path"],
            "/x/t.lua"
        );
        assert_eq!(messages[2]["command"], "continue");
    }

    #[test]
    fn no_breakpoint_means_no_traffic() {
        let mut output = Vec::new();
        let mut session = session_over(&[], &mut output);
        session.breakpoints.add("/x/t.lua", 10);

        let stack = ScriptedStack {
            source: "@/x/t.lua",
            line: 11,
        };
        let mut driver = HookDriver::new(&mut session);
        driver.on_line(&stack, 11).unwrap();
        drop(driver);
        drop(session);
        assert!(output.is_empty());
    }

    #[test]
    fn adapter_frames_are_never_paused_on() {
        let mut output = Vec::new();
        let mut session = session_over(&[], &mut output);
        // Even with a breakpoint that would otherwise match the line.
        session.breakpoints.add("[lua-dap]", 1);
        session.step_pending = true;

        let stack = ScriptedStack {
            source: SHIM_SOURCE,
            line: 1,
        };
        let mut driver = HookDriver::new(&mut session);
        driver.on_line(&stack, 1).unwrap();
        drop(driver);
        // The step stays pending for the next debuggee line.
        assert!(session.step_pending);
        drop(session);
        assert!(output.is_empty());
    }

    #[test]
    fn pending_step_pauses_with_console_note() {
        let mut output = Vec::new();
        let mut session = session_over(
            &[serde_json::json!({ "seq": 1, "type": "request", "command": "continue",
                "arguments": { "threadId": 0 } })],
            &mut output,
        );
        session.step_pending = true;

        let stack = ScriptedStack {
            source: "@/x/t.lua",
            line: 11,
        };
        let mut driver = HookDriver::new(&mut session);
        driver.on_line(&stack, 11).unwrap();
        drop(driver);
        assert!(!session.step_pending);
        drop(session);

        let messages = decode_output(&output);
        assert_eq!(messages[0]["event"], "output");
        assert_eq!(messages[0]["body"]["category"], "console");
        assert_eq!(messages[1]["event"], "stopped");
        assert_eq!(messages[1]["body"]["reason"], "step");
        assert!(messages[1]["body"].get("hitBreakpointIds").is_none());
    }

    #[test]
    fn peer_loss_during_a_pause_surfaces_as_failure() {
        let mut output = Vec::new();
        // No requests at all: the nested pump hits end-of-stream.
        let mut session = session_over(&[], &mut output);
        session.breakpoints.add("/x/t.lua", 10);

        let stack = ScriptedStack {
            source: "@/x/t.lua",
            line: 10,
        };
        let mut driver = HookDriver::new(&mut session);
        let fault = driver.on_line(&stack, 10);
        assert!(fault.is_err());
        assert!(matches!(driver.take_failure(), Some(Error::PeerClosed)));
    }
}
