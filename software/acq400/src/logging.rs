//! Terminal and file logging for capture sessions.

use std::{
    fs::{self, File, OpenOptions},
    path::{Path, PathBuf},
    sync::{Mutex, OnceLock},
};

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

use crate::{Acq400Error, Result};

type FileLayer = fmt::Layer<
    Registry,
    fmt::format::DefaultFields,
    fmt::format::Format<fmt::format::Full, fmt::time::ChronoUtc>,
    NonBlocking,
>;

static LOGGING_GUARDS: OnceLock<LoggingGuards> = OnceLock::new();

/// Writer thread handles for the log targets. Flushed when dropped,
/// so they live in a static for the rest of the process.
pub struct LoggingGuards {
    _stdout: Mutex<WorkerGuard>,
    file: Mutex<WorkerGuard>,
    file_reload: reload::Handle<FileLayer, Registry>,
}

impl LoggingGuards {
    /// Point the file logger at a different session's file.
    fn update_file_layer(&self, logfile: File) -> Result<()> {
        let (file_writer, file_guard) = tracing_appender::non_blocking(logfile);
        let file_layer = build_file_layer(file_writer);

        let mut guard = self
            .file
            .lock()
            .map_err(|_| Acq400Error::Config("logging file guard lock poisoned".into()))?;

        self.file_reload
            .modify(|layer| *layer = file_layer)
            .map_err(|e| Acq400Error::Config(format!("failed to reload file logger: {e}")))?;

        *guard = file_guard;
        Ok(())
    }
}

fn build_file_layer(file_writer: NonBlocking) -> FileLayer {
    fmt::layer::<Registry>()
        .with_timer(fmt::time::ChronoUtc::rfc_3339())
        .with_writer(file_writer)
        .with_ansi(false)
}

/// Log to the terminal and to `{op_dir}/logs/{op_name}.log`.
///
/// The level comes from `RUST_LOG`, defaulting to `info`. Calling this again
/// for a new session keeps the terminal logger and moves the file logger.
pub fn init_logging(op_dir: &Path, op_name: &str) -> Result<(PathBuf, &'static LoggingGuards)> {
    let log_dir = op_dir.join("logs");
    fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join(format!("{op_name}.log"));
    let logfile = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    if let Some(guards) = LOGGING_GUARDS.get() {
        guards.update_file_layer(logfile)?;
        return Ok((log_path, guards));
    }

    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let (file_writer, file_guard) = tracing_appender::non_blocking(logfile);

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| Acq400Error::Config(format!("bad log filter: {e}")))?;

    let stdout_layer = fmt::layer()
        .with_timer(fmt::time::ChronoUtc::rfc_3339())
        .with_writer(stdout_writer)
        .with_target(false);

    let (file_layer, file_reload) =
        reload::Layer::<FileLayer, Registry>::new(build_file_layer(file_writer));

    tracing_subscriber::registry()
        .with(file_layer)
        .with(env_filter)
        .with(stdout_layer)
        .try_init()
        .map_err(|e| Acq400Error::Config(format!("failed to initialize logging: {e}")))?;

    let guards = LOGGING_GUARDS.get_or_init(|| LoggingGuards {
        _stdout: Mutex::new(stdout_guard),
        file: Mutex::new(file_guard),
        file_reload,
    });

    Ok((log_path, guards))
}
