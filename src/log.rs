// src/log.rs
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::fs::OpenOptions;
use std::io::Write;
use std::panic;
use std::path::{Path, PathBuf};
use std::sync::Once;

use env_logger::{Builder, Target};
use log::LevelFilter;
use thiserror::Error;

use crate::file::{FileError, ensure_directory};

/// Chatty at debug; capped unless the filter names them explicitly.
const QUIET_MODULES: [&str; 4] = ["reqwest", "hyper", "hyper_util", "rustls"];

#[derive(Debug, Error)]
pub enum LogError {
    #[error(transparent)]
    Dir(#[from] FileError),
    #[error("could not open log file '{}': {source}", path.display())]
    Open { path: PathBuf, source: std::io::Error },
    #[error(transparent)]
    Init(#[from] log::SetLoggerError),
}

/// Install the global logger.
///
/// `filter` uses `RUST_LOG` syntax ("info", "market_watch=debug", ...).
/// Lines look like `2025-01-31T08:00:00Z - INFO     - message`.
/// With `file`, lines are appended there instead of stderr.
pub fn init(filter: &str, file: Option<&Path>) -> Result<(), LogError> {
    let mut builder = Builder::new();
    for module in QUIET_MODULES {
        builder.filter_module(module, LevelFilter::Warn);
    }
    builder.parse_filters(filter).format(|buf, record| {
        writeln!(buf, "{} - {:<8} - {}", buf.timestamp_seconds(), record.level(), record.args())
    });

    match file {
        Some(path) => {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                ensure_directory(dir)?;
            }
            let out = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| LogError::Open { path: path.to_path_buf(), source })?;
            builder.target(Target::Pipe(Box::new(out)));
        }
        None => {
            builder.target(Target::Stderr);
        }
    }

    builder.try_init()?;
    Ok(())
}

thread_local! {
    static LAST_PANIC: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Chain a panic hook that keeps message and backtrace of the last panic on
/// the panicking thread. Whoever catches the unwind logs it via
/// [`take_panic_trace`]; the previous hook still runs.
pub fn capture_panic_traces() {
    static INSTALLED: Once = Once::new();
    INSTALLED.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let trace = format!("{info}\n{}", Backtrace::force_capture());
            LAST_PANIC.with(|slot| *slot.borrow_mut() = Some(trace));
            previous(info);
        }));
    });
}

/// Trace of the last panic on this thread, if the hook caught one.
pub fn take_panic_trace() -> Option<String> {
    LAST_PANIC.with(|slot| slot.borrow_mut().take())
}
