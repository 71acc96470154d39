//! Debuggee launcher.
//!
//! Drains the deferred launch action: loads the configured script through
//! the engine, runs it under the hook driver, and turns the outcome into
//! protocol events. Load and runtime failures are recovered locally — the
//! editor gets `output` events, never a torn-down adapter.

use std::io::{BufRead, Write};

use tracing::{info, warn};

use crate::engine::Engine;
use crate::error::Error;
use crate::hook::HookDriver;
use crate::protocol::{Event, ExitedEventBody};
use crate::session::{DebuggeeConfig, Launcher, Session};

/// The top-level pump's launcher: holds the engine for the session's
/// lifetime and runs debuggees on demand.
pub struct EngineLauncher<'e, E: Engine> {
    engine: &'e mut E,
}

impl<'e, E: Engine> EngineLauncher<'e, E> {
    pub fn new(engine: &'e mut E) -> Self {
        Self { engine }
    }
}

impl<R: BufRead, W: Write, E: Engine> Launcher<R, W> for EngineLauncher<'_, E> {
    fn launch(
        &mut self,
        session: &mut Session<R, W>,
        config: &DebuggeeConfig,
    ) -> Result<(), Error> {
        run_debuggee(self.engine, session, config)
    }
}

/// Load and run the debuggee, reporting the outcome to the editor.
///
/// Normal completion emits `exited` with the script's return value and winds
/// down the top-level pump. A runtime failure emits the quoted error on the
/// console and then `exited` with code 1, so the editor is never left
/// waiting on a debuggee that will not continue. A load failure only gets
/// the console message; the session keeps serving.
pub fn run_debuggee<E: Engine, R: BufRead, W: Write>(
    engine: &mut E,
    session: &mut Session<R, W>,
    config: &DebuggeeConfig,
) -> Result<(), Error> {
    info!(program = %config.program.display(), "launching debuggee");
    let chunk = match engine.load(&config.program) {
        Ok(chunk) => chunk,
        Err(err) => {
            warn!(%err, "debuggee failed to load");
            session.send_output("console", format!("{:?}\n", err.to_string()))?;
            return Ok(());
        }
    };

    let mut driver = HookDriver::new(session);
    let outcome = engine.run(chunk, &config.args, &mut driver);
    let failure = driver.take_failure();
    drop(driver);
    if let Some(err) = failure {
        // The hook lost the editor mid-pause; the engine's abort is only a
        // symptom of that.
        return Err(err);
    }

    match outcome {
        Ok(exit_code) => {
            info!(exit_code, "debuggee finished");
            session.send_event(Event::with_body("exited", ExitedEventBody { exit_code }))?;
            session.stop_bottom();
        }
        Err(err) => {
            let message = err.to_string();
            warn!(error = %message, "debuggee failed");
            session.send_output("console", format!("{message:?}\n"))?;
            session.send_event(Event::with_body("exited", ExitedEventBody { exit_code: 1 }))?;
        }
    }
    Ok(())
}
