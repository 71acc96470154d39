//! lua-dap — Debug Adapter Protocol server over stdio.

use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use lua_dap::vm::Vm;
use lua_dap::Error;

#[derive(Parser)]
#[command(
    name = "lua-dap",
    version,
    about = "Debug Adapter Protocol server for embedded Lua scripts",
    long_about = "Speaks DAP over stdin/stdout; the editor provides the target \
                  script through the launch request."
)]
struct Cli {
    /// Write a protocol trace to the side log file.
    #[arg(long = "DEBUG")]
    debug: bool,

    /// Where the trace log goes when --DEBUG is set.
    #[arg(long, default_value = "lua-dap.log")]
    log_file: PathBuf,
}

fn init_logging(path: &Path) -> tracing_appender::non_blocking::WorkerGuard {
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "lua-dap.log".to_string());

    let appender = tracing_appender::rolling::never(directory, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_ansi(false)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .init();
    guard
}

fn main() {
    let cli = Cli::parse();
    let _guard = cli.debug.then(|| init_logging(&cli.log_file));
    info!("lua-dap starting");

    let mut vm = Vm::new();
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let result = lua_dap::run_adapter_on(stdin.lock(), stdout.lock(), &mut vm);

    match result {
        Ok(()) => info!("session finished"),
        Err(Error::PeerClosed) => info!("editor disconnected"),
        Err(err) => {
            error!(%err, "session failed");
            std::process::exit(1);
        }
    }
}
