//! Logging bootstrap and line format.
//!
//! # Responsibility
//! - Start the rolling file logger once per process.
//! - Prefix every line with the session bound to the emitting thread.
//!
//! # Invariants
//! - A second `init_logging` with the same level and directory is a no-op;
//!   any other combination is refused.
//! - Logging initialization must not panic.
//! - Message bodies are single-line and capped at `MAX_LOG_MESSAGE_CHARS`.

use crate::session::SessionId;
use flexi_logger::{
    Cleanup, Criterion, DeferredNow, Duplicate, FileSpec, FlexiLoggerError, Logger,
    LoggerHandle, Naming, WriteMode, TS_DASHES_BLANK_COLONS_DOT_BLANK,
};
use log::{error, info, Record};
use once_cell::sync::OnceCell;
use std::cell::Cell;
use std::fmt::{Display, Formatter};
use std::io::Write;
use std::path::{Path, PathBuf};

const LOG_FILE_BASENAME: &str = "diarylens";
const ROTATE_AT_BYTES: u64 = 10 * 1024 * 1024;
const KEEP_LOG_FILES: usize = 5;
const MAX_PANIC_PAYLOAD_CHARS: usize = 160;
const MAX_LOG_MESSAGE_CHARS: usize = 1000;
const NO_SESSION_TAG: &str = "NO_SESSION";
const LEVELS: &str = "trace|debug|info|warn|error";

static ACTIVE_LOGGER: OnceCell<ActiveLogger> = OnceCell::new();

thread_local! {
    static BOUND_SESSION: Cell<Option<SessionId>> = const { Cell::new(None) };
}

struct ActiveLogger {
    level: &'static str,
    dir: PathBuf,
    _handle: LoggerHandle,
}

/// Failures while starting the file logger.
#[derive(Debug)]
pub enum LoggingError {
    UnsupportedLevel(String),
    InvalidDirectory(String),
    CreateDirectory {
        dir: PathBuf,
        source: std::io::Error,
    },
    Backend(FlexiLoggerError),
    /// Logging is already running with a different level or directory.
    AlreadyActive {
        level: &'static str,
        dir: PathBuf,
    },
}

impl Display for LoggingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedLevel(level) => {
                write!(f, "unsupported log level `{level}`; expected {LEVELS}")
            }
            Self::InvalidDirectory(reason) => write!(f, "invalid log directory: {reason}"),
            Self::CreateDirectory { dir, source } => {
                write!(f, "cannot create log directory `{}`: {source}", dir.display())
            }
            Self::Backend(err) => write!(f, "logger backend failed to start: {err}"),
            Self::AlreadyActive { level, dir } => write!(
                f,
                "logging already active at level `{level}` in `{}`",
                dir.display()
            ),
        }
    }
}

impl std::error::Error for LoggingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::CreateDirectory { source, .. } => Some(source),
            Self::Backend(err) => Some(err),
            _ => None,
        }
    }
}

/// Starts rolling file logs under the absolute directory `log_dir`.
///
/// # Errors
/// - [`LoggingError::UnsupportedLevel`] / [`LoggingError::InvalidDirectory`]
///   on bad arguments.
/// - [`LoggingError::AlreadyActive`] when a different configuration is live.
/// - [`LoggingError::CreateDirectory`] / [`LoggingError::Backend`] when the
///   logger cannot start.
pub fn init_logging(level: &str, log_dir: &str) -> Result<(), LoggingError> {
    let level = parse_level(level)?;
    let dir = parse_log_dir(log_dir)?;

    let active = ACTIVE_LOGGER.get_or_try_init(|| start_logger(level, &dir))?;
    if active.level != level || active.dir != dir {
        return Err(LoggingError::AlreadyActive {
            level: active.level,
            dir: active.dir.clone(),
        });
    }
    Ok(())
}

fn start_logger(level: &'static str, dir: &Path) -> Result<ActiveLogger, LoggingError> {
    std::fs::create_dir_all(dir).map_err(|source| LoggingError::CreateDirectory {
        dir: dir.to_path_buf(),
        source,
    })?;

    let handle = Logger::try_with_str(level)
        .map_err(LoggingError::Backend)?
        .log_to_file(FileSpec::default().directory(dir).basename(LOG_FILE_BASENAME))
        .rotate(
            Criterion::Size(ROTATE_AT_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(KEEP_LOG_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .duplicate_to_stderr(Duplicate::Warn)
        .format(session_format)
        .start()
        .map_err(LoggingError::Backend)?;

    install_panic_hook();
    info!(
        "event=logging_init module=core status=ok level={level} log_dir={} version={}",
        dir.display(),
        env!("CARGO_PKG_VERSION")
    );

    Ok(ActiveLogger {
        level,
        dir: dir.to_path_buf(),
        _handle: handle,
    })
}

/// Keeps a session bound to the current thread until dropped.
#[must_use = "the session is unbound as soon as the binding is dropped"]
#[derive(Debug)]
pub struct SessionBinding {
    previous: Option<SessionId>,
}

impl Drop for SessionBinding {
    fn drop(&mut self) {
        BOUND_SESSION.with(|bound| bound.set(self.previous));
    }
}

/// Tags log lines emitted on the current thread with `session`.
pub fn bind_session(session: SessionId) -> SessionBinding {
    let previous = BOUND_SESSION.with(|bound| bound.replace(Some(session)));
    SessionBinding { previous }
}

/// Session tag lines on the current thread are written with.
pub fn session_tag() -> String {
    BOUND_SESSION
        .with(Cell::get)
        .map_or_else(|| NO_SESSION_TAG.to_string(), |session| session.short())
}

/// Line format: `module: timestamp - LEVEL - ID: session - message`.
pub fn session_format(
    w: &mut dyn Write,
    now: &mut DeferredNow,
    record: &Record<'_>,
) -> std::io::Result<()> {
    write!(
        w,
        "{}: {} - {} - ID: {} - {}",
        record.module_path().unwrap_or("<unnamed>"),
        now.format(TS_DASHES_BLANK_COLONS_DOT_BLANK),
        record.level(),
        session_tag(),
        single_line(&record.args().to_string(), MAX_LOG_MESSAGE_CHARS)
    )
}

/// `debug` for debug builds, `info` otherwise.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn parse_level(level: &str) -> Result<&'static str, LoggingError> {
    let level = level.trim().to_ascii_lowercase();
    let wanted = if level == "warning" { "warn" } else { level.as_str() };
    let known = LEVELS.split('|').find(|known| *known == wanted);
    known.ok_or(LoggingError::UnsupportedLevel(level))
}

fn parse_log_dir(log_dir: &str) -> Result<PathBuf, LoggingError> {
    let trimmed = log_dir.trim();
    if trimmed.is_empty() {
        return Err(LoggingError::InvalidDirectory("path is empty".to_string()));
    }
    let path = PathBuf::from(trimmed);
    if !path.is_absolute() {
        return Err(LoggingError::InvalidDirectory(format!(
            "`{trimmed}` is not absolute"
        )));
    }
    Ok(path)
}

fn install_panic_hook() {
    let previous_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        // Payload may quote entry text.
        let location = panic_info
            .location()
            .map_or_else(|| "unknown".to_string(), |loc| format!("{}:{}", loc.file(), loc.line()));
        let payload = panic_info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| panic_info.payload().downcast_ref::<String>().map(String::as_str))
            .unwrap_or("non-string panic payload");
        error!(
            "event=panic_captured module=core status=error location={location} payload={}",
            single_line(payload, MAX_PANIC_PAYLOAD_CHARS)
        );
        previous_hook(panic_info);
    }));
}

fn single_line(value: &str, max_chars: usize) -> String {
    let mut chars = value.chars().map(|c| if c == '\n' || c == '\r' { ' ' } else { c });
    let mut line = chars.by_ref().take(max_chars).collect::<String>();
    if chars.next().is_some() {
        line.push_str("...");
    }
    line
}
